//! Occurrence API interfaces and built-in implementations.
//!
//! Ownership model:
//! - `OccurrenceApi` is the collaborator every emitter and counter talks to.
//!   It is shared (`Arc`) across all streams of one run, so it must be
//!   `Send + Sync` and keep any cache behind its own locks.
//! - `SearchRequest` is one fully-specified page request; emitters own the
//!   paging cursor and build a fresh request per page.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::MediaType;
use crate::data::{Occurrence, SearchPage};
use crate::errors::StreamError;
use crate::types::{ContentType, FieldName, MediaUrl, Query, StreamId};
use crate::utils::expand_param_values;

/// HTTP client for the public occurrence search API.
pub mod gbif;

pub use gbif::GbifClient;

/// One page request against the occurrence search endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchRequest {
    /// Stream this request belongs to (used in errors and logs).
    pub stream_id: StreamId,
    /// Search filters.
    pub query: Query,
    /// Media type filter.
    pub mediatype: MediaType,
    /// Offset of the first record.
    pub offset: u64,
    /// Page size; `0` requests only the count metadata.
    pub limit: u32,
}

impl SearchRequest {
    /// Flatten the request into query parameters (arrays become repeated params).
    pub fn params(&self) -> Vec<(FieldName, String)> {
        use crate::constants::api::{PARAM_LIMIT, PARAM_MEDIA_TYPE, PARAM_OFFSET};

        let mut params = Vec::new();
        for (field, value) in &self.query {
            for rendered in expand_param_values(value) {
                params.push((field.clone(), rendered));
            }
        }
        params.push((PARAM_MEDIA_TYPE.to_string(), self.mediatype.to_string()));
        params.push((PARAM_OFFSET.to_string(), self.offset.to_string()));
        params.push((PARAM_LIMIT.to_string(), self.limit.to_string()));
        params
    }
}

/// Upstream occurrence search collaborator.
pub trait OccurrenceApi: Send + Sync {
    /// Fetch one page of search results.
    fn search(&self, request: &SearchRequest) -> Result<SearchPage, StreamError>;

    /// Header-only probe for a media URL's content type.
    ///
    /// The header value is returned as sent (case and parameters intact).
    /// `Ok(None)` means the server answered without a content-type header.
    fn probe_content_type(&self, url: &str) -> Result<Option<ContentType>, StreamError>;

    /// Total number of records matching `query`, without fetching any.
    fn count(
        &self,
        stream_id: &str,
        query: &Query,
        mediatype: MediaType,
    ) -> Result<u64, StreamError> {
        let request = SearchRequest {
            stream_id: stream_id.to_string(),
            query: query.clone(),
            mediatype,
            offset: 0,
            limit: 0,
        };
        Ok(self.search(&request)?.count)
    }
}

/// In-memory occurrence API for tests and offline demos.
///
/// Filters records by exact field match (array query values match any
/// element), pages them by offset/limit, and answers probes from a fixed map.
/// Unknown probe URLs fail like an unreachable host.
pub struct InMemoryOccurrenceApi {
    records: Vec<Occurrence>,
    content_types: HashMap<MediaUrl, ContentType>,
    search_calls: AtomicUsize,
    count_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    failing_streams: Mutex<Vec<StreamId>>,
}

impl InMemoryOccurrenceApi {
    /// Create an API serving `records`.
    pub fn new(records: Vec<Occurrence>) -> Self {
        Self {
            records,
            content_types: HashMap::new(),
            search_calls: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            failing_streams: Mutex::new(Vec::new()),
        }
    }

    /// Register the content type returned when `url` is probed.
    pub fn with_content_type(
        mut self,
        url: impl Into<MediaUrl>,
        content_type: impl Into<ContentType>,
    ) -> Self {
        self.content_types.insert(url.into(), content_type.into());
        self
    }

    /// Make every paging request (limit > 0) of `stream_id` fail.
    pub fn fail_stream(&self, stream_id: impl Into<StreamId>) {
        self.failing_streams
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(stream_id.into());
    }

    /// Number of paging requests served (count-only requests excluded).
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Number of count-only (`limit == 0`) requests served.
    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    /// Number of content-type probes served.
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    fn matches(occurrence: &Occurrence, query: &Query) -> bool {
        query.iter().all(|(field, wanted)| {
            let wanted = expand_param_values(wanted);
            if wanted.is_empty() {
                return true;
            }
            let Some(actual) = occurrence.fields.get(field) else {
                return false;
            };
            let actual = expand_param_values(actual);
            actual.iter().any(|value| wanted.contains(value))
        })
    }
}

impl OccurrenceApi for InMemoryOccurrenceApi {
    fn search(&self, request: &SearchRequest) -> Result<SearchPage, StreamError> {
        if request.limit == 0 {
            self.count_calls.fetch_add(1, Ordering::SeqCst);
        } else {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failing_streams
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if failing.contains(&request.stream_id) {
                return Err(StreamError::UpstreamRequest {
                    stream_id: request.stream_id.clone(),
                    reason: "scripted failure".into(),
                });
            }
        }
        let matching: Vec<&Occurrence> = self
            .records
            .iter()
            .filter(|occurrence| Self::matches(occurrence, &request.query))
            .collect();
        let count = matching.len() as u64;
        let start = (request.offset as usize).min(matching.len());
        let end = start
            .saturating_add(request.limit as usize)
            .min(matching.len());
        let results = matching[start..end]
            .iter()
            .map(|occurrence| (*occurrence).clone())
            .collect();
        Ok(SearchPage {
            offset: request.offset,
            limit: u64::from(request.limit),
            end_of_records: end as u64 >= count,
            count,
            results,
        })
    }

    fn probe_content_type(&self, url: &str) -> Result<Option<ContentType>, StreamError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.content_types
            .get(url)
            .cloned()
            .map(Some)
            .ok_or_else(|| StreamError::ContentProbe {
                url: url.to_string(),
                reason: "host unreachable".into(),
            })
    }
}

/// Build an occurrence carrying `fields` and one media entry per `(url, format)`.
///
/// Convenience for tests and demos that assemble in-memory corpora.
pub fn occurrence_with_media(
    fields: &[(&str, Value)],
    media: &[(&str, Option<&str>)],
) -> Occurrence {
    use crate::data::MediaItem;

    Occurrence {
        media: media
            .iter()
            .map(|(url, format)| MediaItem {
                identifier: Some((*url).to_string()),
                format: format.map(str::to_string),
                media_type: None,
            })
            .collect(),
        fields: fields
            .iter()
            .map(|(field, value)| ((*field).to_string(), value.clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn corpus() -> Vec<Occurrence> {
        (0..5)
            .map(|idx| {
                let species = if idx < 3 { 1 } else { 2 };
                let url = format!("https://media/{idx}.jpg");
                occurrence_with_media(
                    &[("speciesKey", json!(species)), ("key", json!(idx))],
                    &[(url.as_str(), Some("image/jpeg"))],
                )
            })
            .collect()
    }

    fn request(query: Query, offset: u64, limit: u32) -> SearchRequest {
        SearchRequest {
            stream_id: "test".into(),
            query,
            mediatype: MediaType::StillImage,
            offset,
            limit,
        }
    }

    #[test]
    fn params_repeat_arrays_and_append_paging() {
        let mut query = Query::new();
        query.insert("speciesKey".into(), json!([1, 2]));
        query.insert("country".into(), json!("DE"));
        query.insert("year".into(), Value::Null);
        let params = request(query, 600, 300).params();
        assert_eq!(
            params,
            vec![
                ("speciesKey".to_string(), "1".to_string()),
                ("speciesKey".to_string(), "2".to_string()),
                ("country".to_string(), "DE".to_string()),
                ("mediaType".to_string(), "StillImage".to_string()),
                ("offset".to_string(), "600".to_string()),
                ("limit".to_string(), "300".to_string()),
            ]
        );
    }

    #[test]
    fn in_memory_api_filters_and_pages() {
        let api = InMemoryOccurrenceApi::new(corpus());
        let mut query = Query::new();
        query.insert("speciesKey".into(), json!(1));

        let first = api.search(&request(query.clone(), 0, 2)).unwrap();
        assert_eq!(first.count, 3);
        assert_eq!(first.results.len(), 2);
        assert!(!first.end_of_records);

        let second = api.search(&request(query.clone(), 2, 2)).unwrap();
        assert_eq!(second.results.len(), 1);
        assert!(second.end_of_records);
        assert_eq!(api.search_calls(), 2);

        assert_eq!(
            api.count("test", &query, MediaType::StillImage).unwrap(),
            3
        );
        assert_eq!(api.count_calls(), 1);
        assert_eq!(api.search_calls(), 2);
    }

    #[test]
    fn in_memory_api_probes_and_scripted_failures() {
        let api = InMemoryOccurrenceApi::new(corpus()).with_content_type("https://m/a", "image/png");
        assert_eq!(
            api.probe_content_type("https://m/a").unwrap().as_deref(),
            Some("image/png")
        );
        assert!(matches!(
            api.probe_content_type("https://m/b"),
            Err(StreamError::ContentProbe { .. })
        ));
        assert_eq!(api.probe_calls(), 2);

        api.fail_stream("test");
        assert!(api.search(&request(Query::new(), 0, 1)).is_err());
        assert!(api.search(&request(Query::new(), 0, 0)).is_ok());
    }
}
