//! Population counts: zero-size searches read only for their `count` metadata.

use rayon::prelude::*;
use tracing::debug;

use crate::config::MediaType;
use crate::errors::StreamError;
use crate::source::OccurrenceApi;
use crate::splitter::SubQuery;

/// Total number of records matching one sub-query.
pub fn count_population(
    api: &dyn OccurrenceApi,
    sub_query: &SubQuery,
    mediatype: MediaType,
) -> Result<u64, StreamError> {
    let count = api.count(&sub_query.id, &sub_query.query, mediatype)?;
    debug!(stream_id = %sub_query.id, count, "population counted");
    Ok(count)
}

/// Population count for every sub-query, in input order.
///
/// Requests run in parallel; the first failure is returned.
pub fn count_populations(
    api: &dyn OccurrenceApi,
    sub_queries: &[SubQuery],
    mediatype: MediaType,
) -> Result<Vec<u64>, StreamError> {
    sub_queries
        .par_iter()
        .map(|sub_query| count_population(api, sub_query, mediatype))
        .collect()
}
