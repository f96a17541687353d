#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line runners behind the `gbif-stream` and `gbif-budget` binaries.
pub mod apps;
/// Stream configuration types.
pub mod config;
/// Centralized constants for the search API, descriptors, and balancing.
pub mod constants;
/// Population counting via zero-size searches.
pub mod counter;
/// Descriptor and occurrence payload types.
pub mod data;
/// Paging record emitter for one sub-query.
pub mod emitter;
mod hash;
/// Budget and weighting helpers.
pub mod heuristics;
/// Aggregate metrics helpers.
pub mod metrics;
/// Stochastic multiplexer over descriptor streams.
pub mod mux;
/// Planning and assembly of configured descriptor streams.
pub mod pipeline;
/// Deterministic RNG threaded through emitters and the mux.
pub mod rng;
/// Occurrence API trait, HTTP client, and in-memory fake.
pub mod source;
/// Query splitting into per-stream sub-queries.
pub mod splitter;
/// Capped descriptor streams.
pub mod stream;
/// Shared type aliases.
pub mod types;
/// Content-type and query-value helpers.
pub mod utils;

mod errors;

pub use config::{
    FailurePolicy, GbifClientConfig, MediaType, SampleBudget, SplitFields, StreamConfig,
    StreamLimits,
};
pub use data::{Descriptor, MediaItem, Occurrence, SearchPage};
pub use emitter::RecordEmitter;
pub use errors::StreamError;
pub use hash::content_basename;
pub use mux::{StreamMux, StreamStats};
pub use pipeline::{BalancePlan, DescriptorStream, balance, build_stream, plan_streams};
pub use rng::DeterministicRng;
pub use source::{GbifClient, InMemoryOccurrenceApi, OccurrenceApi, SearchRequest};
pub use splitter::{SubQuery, split_query};
pub use stream::CappedStream;
pub use types::{
    Basename, ContentType, FieldName, LabelValue, MediaUrl, Query, StreamId, Suffix,
};
