//! Paging emitter that turns one fully-specified query into descriptors.

use rand::seq::IndexedRandom;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use crate::config::MediaType;
use crate::data::{Descriptor, MediaItem, Occurrence};
use crate::errors::StreamError;
use crate::rng::DeterministicRng;
use crate::source::{OccurrenceApi, SearchRequest};
use crate::types::{FieldName, Query, StreamId};

/// Lazy descriptor sequence for a single sub-query.
///
/// Each `next()` may block on one search page request or one content-type
/// probe. Errors are yielded in place:
/// - a failed probe yields `Err` for that record only; the next call moves on;
/// - a failed page request yields `Err` once and ends the sequence.
pub struct RecordEmitter {
    api: Arc<dyn OccurrenceApi>,
    stream_id: StreamId,
    query: Query,
    mediatype: MediaType,
    label_field: FieldName,
    page_size: u32,
    offset: u64,
    pending: VecDeque<Occurrence>,
    finished: bool,
    rng: DeterministicRng,
}

impl RecordEmitter {
    /// Create an emitter; no request is made until the first `next()`.
    pub fn new(
        api: Arc<dyn OccurrenceApi>,
        stream_id: impl Into<StreamId>,
        query: Query,
        mediatype: MediaType,
        label_field: impl Into<FieldName>,
        page_size: u32,
        rng: DeterministicRng,
    ) -> Self {
        Self {
            api,
            stream_id: stream_id.into(),
            query,
            mediatype,
            label_field: label_field.into(),
            page_size,
            offset: 0,
            pending: VecDeque::new(),
            finished: false,
            rng,
        }
    }

    /// Stream this emitter belongs to.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Offset of the next page to request.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn fetch_page(&mut self) -> Result<(), StreamError> {
        let request = SearchRequest {
            stream_id: self.stream_id.clone(),
            query: self.query.clone(),
            mediatype: self.mediatype,
            offset: self.offset,
            limit: self.page_size,
        };
        let page = self.api.search(&request)?;
        debug!(
            stream_id = %self.stream_id,
            offset = self.offset,
            results = page.results.len(),
            end_of_records = page.end_of_records,
            "fetched search page"
        );
        self.offset = page.offset + u64::from(self.page_size);
        if page.end_of_records || page.results.is_empty() {
            self.finished = true;
        }
        self.pending.extend(page.results);
        Ok(())
    }

    /// Media entries that can be downloaded for the requested media type.
    fn eligible_media<'a>(&self, occurrence: &'a Occurrence) -> Vec<&'a MediaItem> {
        occurrence
            .media
            .iter()
            .filter(|item| item.identifier.as_deref().is_some_and(|url| !url.is_empty()))
            .filter(|item| {
                item.media_type
                    .as_deref()
                    .is_none_or(|kind| kind == self.mediatype.as_str())
            })
            .collect()
    }

    /// Build a descriptor for one occurrence, or `Ok(None)` when it carries no usable media.
    fn describe(&mut self, occurrence: &Occurrence) -> Result<Option<Descriptor>, StreamError> {
        let candidates = self.eligible_media(occurrence);
        let Some(media) = candidates.choose(&mut self.rng) else {
            return Ok(None);
        };
        let Some(url) = media.identifier.as_deref() else {
            return Ok(None);
        };
        let content_type = match media.format.as_deref() {
            Some(format) if !format.trim().is_empty() => Some(format.to_string()),
            _ => self.api.probe_content_type(url)?,
        };
        let label = occurrence.label_value(&self.label_field);
        Ok(Some(Descriptor::new(url, label, content_type)))
    }
}

impl Iterator for RecordEmitter {
    type Item = Result<Descriptor, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(occurrence) = self.pending.pop_front() {
                match self.describe(&occurrence) {
                    Ok(Some(descriptor)) => return Some(Ok(descriptor)),
                    Ok(None) => continue,
                    Err(err) => return Some(Err(err)),
                }
            }
            if self.finished {
                return None;
            }
            if let Err(err) = self.fetch_page() {
                self.finished = true;
                return Some(Err(err));
            }
        }
    }
}
