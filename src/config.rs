use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::api::{
    DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_ENDPOINT, DEFAULT_TIMEOUT_SECS, MAX_PAGE_SIZE,
};
use crate::constants::descriptor::DEFAULT_LABEL_FIELD;
use crate::constants::streams::{BALANCED_BUDGET_SENTINEL, DEFAULT_SEED};
use crate::errors::StreamError;
use crate::types::{FieldName, Query};

/// Media type filter understood by the occurrence search API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    /// Photographs and other images.
    #[default]
    StillImage,
    /// Video.
    MovingImage,
    /// Audio recordings.
    Sound,
}

impl MediaType {
    /// Name used on the wire and in media entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::StillImage => "StillImage",
            MediaType::MovingImage => "MovingImage",
            MediaType::Sound => "Sound",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = StreamError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "StillImage" => Ok(MediaType::StillImage),
            "MovingImage" => Ok(MediaType::MovingImage),
            "Sound" => Ok(MediaType::Sound),
            other => Err(StreamError::Configuration(format!(
                "unsupported mediatype '{other}', expected StillImage, MovingImage or Sound"
            ))),
        }
    }
}

/// Field(s) to split the base query by. A single name is shorthand for a one-element list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SplitFields {
    One(FieldName),
    Many(Vec<FieldName>),
}

impl SplitFields {
    /// Field names in split order.
    pub fn to_vec(&self) -> Vec<FieldName> {
        match self {
            SplitFields::One(field) => vec![field.clone()],
            SplitFields::Many(fields) => fields.clone(),
        }
    }
}

/// What to do when a stream hits an error that ends it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Yield the error, then end the whole balanced sequence.
    #[default]
    Abort,
    /// Log the error, drop the stream from the active set, and keep going.
    DropStream,
}

/// Global sample budget resolved from `nb_samples`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleBudget {
    /// Run until every stream is exhausted.
    Unbounded,
    /// Stop after exactly this many descriptors (or earlier on exhaustion).
    Exact(u64),
    /// `min(population) * stream_count`, computed before streaming.
    Balanced,
}

/// Typed limits produced by [`StreamConfig::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamLimits {
    /// Maximum descriptors drawn from each stream.
    pub per_stream_cap: Option<u64>,
    /// Global budget across all streams.
    pub budget: SampleBudget,
    /// Split fields, empty when no splitting is requested.
    pub split_fields: Vec<FieldName>,
}

/// Caller-facing configuration for building a descriptor stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    /// Search filters passed to the occurrence API.
    pub queries: Query,
    /// Occurrence field used as the descriptor label.
    #[serde(default = "default_label")]
    pub label: FieldName,
    /// Field(s) whose candidate lists become separate streams.
    #[serde(default)]
    pub split_streams_by: Option<SplitFields>,
    /// Maximum descriptors per stream (`None` = until exhausted).
    #[serde(default)]
    pub nb_samples_per_stream: Option<i64>,
    /// Global budget; `-1` with splitting requests the minimum balanced budget.
    #[serde(default)]
    pub nb_samples: Option<i64>,
    /// Draw streams proportionally to their population counts.
    #[serde(default)]
    pub weighted_streams: bool,
    /// Memoize identical search requests in the API client.
    #[serde(default)]
    pub cache_requests: bool,
    /// Media type filter.
    #[serde(default)]
    pub mediatype: MediaType,
    /// Records requested per search page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Seed for media selection and stream interleaving.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Behavior when one stream fails in a balanced sequence.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_label() -> FieldName {
    DEFAULT_LABEL_FIELD.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queries: Query::new(),
            label: default_label(),
            split_streams_by: None,
            nb_samples_per_stream: None,
            nb_samples: None,
            weighted_streams: false,
            cache_requests: false,
            mediatype: MediaType::default(),
            page_size: DEFAULT_PAGE_SIZE,
            seed: DEFAULT_SEED,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl StreamConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, StreamError> {
        serde_json::from_str(raw)
            .map_err(|err| StreamError::Configuration(format!("invalid stream config: {err}")))
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Check caps, page size and split fields and resolve them into typed limits.
    pub fn validate(&self) -> Result<StreamLimits, StreamError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(StreamError::Configuration(format!(
                "page_size must be within 1..={MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        let per_stream_cap = match self.nb_samples_per_stream {
            None => None,
            Some(value) if value >= 0 => Some(value as u64),
            Some(value) => {
                return Err(StreamError::Configuration(format!(
                    "nb_samples_per_stream must be non-negative, got {value}"
                )));
            }
        };
        let budget = match self.nb_samples {
            None => SampleBudget::Unbounded,
            Some(BALANCED_BUDGET_SENTINEL) => SampleBudget::Balanced,
            Some(value) if value >= 0 => SampleBudget::Exact(value as u64),
            Some(value) => {
                return Err(StreamError::Configuration(format!(
                    "nb_samples must be non-negative or {BALANCED_BUDGET_SENTINEL}, got {value}"
                )));
            }
        };
        let split_fields = self
            .split_streams_by
            .as_ref()
            .map(SplitFields::to_vec)
            .unwrap_or_default();
        Ok(StreamLimits {
            per_stream_cap,
            budget,
            split_fields,
        })
    }
}

/// Connection settings for the HTTP occurrence client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GbifClientConfig {
    /// Occurrence search endpoint.
    pub endpoint: String,
    /// End-to-end timeout per request.
    pub timeout: Duration,
    /// Memoize identical search requests for the lifetime of the client.
    pub cache_requests: bool,
}

impl Default for GbifClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_requests: false,
        }
    }
}
