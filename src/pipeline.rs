//! Assembly of configured descriptor streams.
//!
//! [`plan_streams`] resolves a [`StreamConfig`] into sub-queries, population
//! counts, a global budget and draw weights. [`build_stream`] turns the plan
//! into a lazy [`DescriptorStream`]: either one capped emitter (no split) or a
//! [`StreamMux`] over one capped emitter per sub-query.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{SampleBudget, StreamConfig, StreamLimits};
use crate::constants::streams::{MUX_SEED_OFFSET, SINGLE_STREAM_ID};
use crate::counter::count_populations;
use crate::data::Descriptor;
use crate::emitter::RecordEmitter;
use crate::errors::StreamError;
use crate::heuristics::{balanced_sample_budget, normalized_weights, single_stream_cap};
use crate::mux::StreamMux;
use crate::rng::DeterministicRng;
use crate::source::OccurrenceApi;
use crate::splitter::{SubQuery, split_query};
use crate::stream::CappedStream;
use crate::types::StreamId;

/// Everything decided before the first descriptor is pulled.
#[derive(Clone, Debug, PartialEq)]
pub struct BalancePlan {
    /// One entry per stream, in split order.
    pub sub_queries: Vec<SubQuery>,
    /// Population count per sub-query, when counting was needed.
    pub populations: Option<Vec<u64>>,
    /// Cap applied to each stream.
    pub per_stream_cap: Option<u64>,
    /// Global budget across all streams (`None` = until exhausted).
    pub budget: Option<u64>,
    /// Normalized draw weights (`None` = uniform draws).
    pub weights: Option<Vec<f64>>,
}

impl BalancePlan {
    /// `true` when no splitting was requested.
    pub fn is_single(&self) -> bool {
        matches!(self.sub_queries.as_slice(), [only] if only.id == SINGLE_STREAM_ID)
    }
}

/// Resolve `config` into a [`BalancePlan`].
///
/// Without split fields the plan is a single stream bounded by the smaller of
/// the explicit caps, and the API is not contacted. With split fields the
/// population of each sub-query is counted once when the balanced budget or
/// weighting needs it.
pub fn plan_streams(
    config: &StreamConfig,
    api: &dyn OccurrenceApi,
) -> Result<BalancePlan, StreamError> {
    let StreamLimits {
        per_stream_cap,
        budget,
        split_fields,
    } = config.validate()?;

    if split_fields.is_empty() {
        let exact = match budget {
            SampleBudget::Exact(limit) => Some(limit),
            SampleBudget::Unbounded | SampleBudget::Balanced => None,
        };
        if config.weighted_streams {
            warn!("weighted_streams has no effect without split_streams_by");
        }
        return Ok(BalancePlan {
            sub_queries: vec![SubQuery::whole(&config.queries)],
            populations: None,
            per_stream_cap: single_stream_cap(per_stream_cap, exact),
            budget: None,
            weights: None,
        });
    }

    let sub_queries = split_query(&config.queries, &split_fields)?;
    let needs_counts = budget == SampleBudget::Balanced || config.weighted_streams;
    let populations = if needs_counts {
        Some(count_populations(api, &sub_queries, config.mediatype)?)
    } else {
        None
    };

    let budget = match (budget, populations.as_deref()) {
        (SampleBudget::Unbounded, _) => None,
        (SampleBudget::Exact(limit), _) => Some(limit),
        (SampleBudget::Balanced, Some(counts)) => {
            let inferred = balanced_sample_budget(counts);
            info!(
                streams = counts.len(),
                budget = inferred,
                "inferred balanced sample budget"
            );
            Some(inferred)
        }
        (SampleBudget::Balanced, None) => None,
    };

    let weights = match (config.weighted_streams, populations.as_deref()) {
        (true, Some(counts)) => {
            let weights = normalized_weights(counts);
            if weights.is_none() {
                warn!("every stream population is zero; drawing streams uniformly");
            }
            weights
        }
        _ => None,
    };

    Ok(BalancePlan {
        sub_queries,
        populations,
        per_stream_cap,
        budget,
        weights,
    })
}

fn capped_emitter(
    api: &Arc<dyn OccurrenceApi>,
    config: &StreamConfig,
    sub_query: &SubQuery,
    cap: Option<u64>,
    root: &DeterministicRng,
) -> CappedStream {
    let emitter = RecordEmitter::new(
        Arc::clone(api),
        sub_query.id.clone(),
        sub_query.query.clone(),
        config.mediatype,
        config.label.clone(),
        config.page_size,
        root.fork(&sub_query.id),
    );
    CappedStream::new(sub_query.id.clone(), Box::new(emitter), cap)
}

/// Interleave one capped emitter per sub-query of `plan`.
pub fn balance(
    config: &StreamConfig,
    api: Arc<dyn OccurrenceApi>,
    plan: BalancePlan,
) -> Result<StreamMux, StreamError> {
    let root = DeterministicRng::new(config.seed);
    let streams = plan
        .sub_queries
        .iter()
        .map(|sub_query| capped_emitter(&api, config, sub_query, plan.per_stream_cap, &root))
        .collect();
    StreamMux::new(
        streams,
        plan.weights,
        plan.budget,
        config.failure_policy,
        DeterministicRng::new(config.seed ^ MUX_SEED_OFFSET),
    )
}

/// Lazy descriptor sequence produced by [`build_stream`].
pub enum DescriptorStream {
    /// No splitting: one capped emitter.
    Single(CappedStream),
    /// One stream per sub-query behind the balancer.
    Balanced(StreamMux),
}

impl DescriptorStream {
    /// Descriptors emitted so far, per stream.
    pub fn emitted_per_stream(&self) -> HashMap<StreamId, u64> {
        match self {
            DescriptorStream::Single(stream) => {
                HashMap::from([(stream.id().to_string(), stream.yielded())])
            }
            DescriptorStream::Balanced(mux) => mux.emitted_per_stream(),
        }
    }

    /// Number of streams still able to produce descriptors.
    pub fn active_streams(&self) -> usize {
        match self {
            DescriptorStream::Single(stream) => usize::from(!stream.is_exhausted()),
            DescriptorStream::Balanced(mux) => mux.active_count(),
        }
    }
}

impl Iterator for DescriptorStream {
    type Item = Result<Descriptor, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            DescriptorStream::Single(stream) => stream.next(),
            DescriptorStream::Balanced(mux) => mux.next(),
        }
    }
}

/// Build the descriptor sequence described by `config`.
///
/// Planning (validation, splitting, counting) happens eagerly; descriptors are
/// fetched lazily as the result is iterated.
pub fn build_stream(
    config: &StreamConfig,
    api: Arc<dyn OccurrenceApi>,
) -> Result<DescriptorStream, StreamError> {
    let plan = plan_streams(config, api.as_ref())?;
    if plan.is_single() {
        let root = DeterministicRng::new(config.seed);
        let sub_query = &plan.sub_queries[0];
        info!(cap = ?plan.per_stream_cap, "building single descriptor stream");
        return Ok(DescriptorStream::Single(capped_emitter(
            &api,
            config,
            sub_query,
            plan.per_stream_cap,
            &root,
        )));
    }
    info!(
        streams = plan.sub_queries.len(),
        budget = ?plan.budget,
        weighted = plan.weights.is_some(),
        "building balanced descriptor stream"
    );
    Ok(DescriptorStream::Balanced(balance(config, api, plan)?))
}
