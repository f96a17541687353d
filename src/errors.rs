use std::io;

use thiserror::Error;

use crate::types::{MediaUrl, StreamId};

/// Error type for configuration, upstream API, and probe failures.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Invalid configuration; raised before any request is made.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Search or count request failed (transport, timeout, non-2xx).
    #[error("upstream request for stream '{stream_id}' failed: {reason}")]
    UpstreamRequest { stream_id: StreamId, reason: String },
    /// Search payload could not be decoded.
    #[error("upstream response for stream '{stream_id}' could not be decoded: {reason}")]
    MalformedResponse { stream_id: StreamId, reason: String },
    /// Header-only probe for one media URL failed.
    #[error("content-type probe for '{url}' failed: {reason}")]
    ContentProbe { url: MediaUrl, reason: String },
    /// Reading a configuration file failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StreamError {
    /// Returns `true` when the error concerns a single record and the stream
    /// that produced it can keep going.
    pub fn is_record_level(&self) -> bool {
        matches!(self, StreamError::ContentProbe { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_failures_are_record_level() {
        let probe = StreamError::ContentProbe {
            url: "https://example.org/a.jpg".into(),
            reason: "connection refused".into(),
        };
        assert!(probe.is_record_level());

        let page = StreamError::UpstreamRequest {
            stream_id: "speciesKey=1".into(),
            reason: "http status: 503".into(),
        };
        assert!(!page.is_record_level());
        assert!(page.to_string().contains("speciesKey=1"));
        assert!(!StreamError::Configuration("bad".into()).is_record_level());
    }
}
