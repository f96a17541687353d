use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::descriptor::MISSING_LABEL;
use crate::hash::content_basename;
use crate::utils::{guess_suffix, value_to_param};

pub use crate::types::{Basename, ContentType, LabelValue, MediaUrl, StreamId, Suffix};

/// One downloadable media item, ready for a downstream fetcher.
///
/// Produced once per eligible occurrence and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Media URL (the API's media identifier).
    pub url: MediaUrl,
    /// Lowercase hex SHA-1 of `url`.
    pub basename: Basename,
    /// Stringified value of the configured label field.
    pub label: LabelValue,
    /// Declared or probed content type, if any.
    pub content_type: Option<ContentType>,
    /// File suffix guessed from `content_type`, with a leading dot.
    pub suffix: Option<Suffix>,
}

impl Descriptor {
    /// Build a descriptor, deriving `basename` from the URL and `suffix` from the content type.
    pub fn new(
        url: impl Into<MediaUrl>,
        label: impl Into<LabelValue>,
        content_type: Option<ContentType>,
    ) -> Self {
        let url = url.into();
        let basename = content_basename(&url);
        let suffix = content_type.as_deref().and_then(guess_suffix);
        Self {
            url,
            basename,
            label: label.into(),
            content_type,
            suffix,
        }
    }

    /// File name (`basename` plus `suffix`) a downloader would write to.
    pub fn file_name(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}{}", self.basename, suffix),
            None => self.basename.clone(),
        }
    }
}

/// Media entry attached to an occurrence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Media URL. Entries without one cannot be downloaded.
    #[serde(default)]
    pub identifier: Option<MediaUrl>,
    /// Declared MIME format, often missing.
    #[serde(default)]
    pub format: Option<ContentType>,
    /// Declared media type (`StillImage`, `MovingImage`, `Sound`).
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
}

/// One occurrence record from a search page.
///
/// Only `media` is modeled; every other field is kept as raw JSON so any field
/// can serve as the label.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Attached media entries; empty when the record has none.
    #[serde(default)]
    pub media: Vec<MediaItem>,
    /// Every other field of the record, as returned by the API.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Occurrence {
    /// Stringified value of `field`, or [`MISSING_LABEL`] when absent or null.
    pub fn label_value(&self, field: &str) -> LabelValue {
        self.fields
            .get(field)
            .and_then(value_to_param)
            .unwrap_or_else(|| MISSING_LABEL.to_string())
    }
}

/// One page of occurrence search results.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    /// Offset this page starts at.
    #[serde(default)]
    pub offset: u64,
    /// Page size the API applied.
    #[serde(default)]
    pub limit: u64,
    /// `true` when no records follow this page.
    pub end_of_records: bool,
    /// Total number of records matching the query.
    #[serde(default)]
    pub count: u64,
    /// Occurrences on this page.
    #[serde(default)]
    pub results: Vec<Occurrence>,
}
