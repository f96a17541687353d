use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::FailurePolicy;
use crate::data::Descriptor;
use crate::errors::StreamError;
use crate::rng::DeterministicRng;
use crate::stream::CappedStream;
use crate::types::StreamId;

#[derive(Clone, Debug, Default, PartialEq)]
/// Draw telemetry captured per stream.
pub struct StreamStats {
    /// Descriptors this stream contributed to the output.
    pub emitted: u64,
    /// Errors (record-level or fatal) this stream produced.
    pub error_count: u64,
    /// Most recent error message, if any.
    pub last_error: Option<String>,
    /// `true` once the stream left the active set.
    pub exhausted: bool,
    /// Normalized draw weight, when weighting is enabled.
    pub weight: Option<f64>,
}

/// Per-stream mux runtime state.
struct StreamState {
    stream: CappedStream,
    stats: StreamStats,
}

/// Stochastic multiplexer over independent descriptor streams.
///
/// All streams start active. Each pull picks one active stream at random
/// (uniformly, or proportionally to its weight) and forwards its next item.
/// A stream that ends leaves the active set for good. The mux ends when no
/// stream is active or the global budget has been emitted.
pub struct StreamMux {
    streams: Vec<StreamState>,
    active: Vec<usize>,
    weights: Option<Vec<f64>>,
    budget: Option<u64>,
    emitted: u64,
    policy: FailurePolicy,
    halted: bool,
    rng: DeterministicRng,
}

impl StreamMux {
    /// Build a mux over `streams`.
    ///
    /// `weights`, when given, must hold one non-negative weight per stream,
    /// fixed for the lifetime of the mux. `budget == None` runs until every
    /// stream is exhausted.
    pub fn new(
        streams: Vec<CappedStream>,
        weights: Option<Vec<f64>>,
        budget: Option<u64>,
        policy: FailurePolicy,
        rng: DeterministicRng,
    ) -> Result<Self, StreamError> {
        if let Some(weights) = weights.as_ref() {
            if weights.len() != streams.len() {
                return Err(StreamError::Configuration(format!(
                    "expected {} stream weights, got {}",
                    streams.len(),
                    weights.len()
                )));
            }
            if weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
                return Err(StreamError::Configuration(
                    "stream weights must be finite and non-negative".into(),
                ));
            }
        }
        let active = (0..streams.len())
            .filter(|idx| !streams[*idx].is_exhausted())
            .collect();
        let streams = streams
            .into_iter()
            .enumerate()
            .map(|(idx, stream)| {
                let exhausted = stream.is_exhausted();
                StreamState {
                    stream,
                    stats: StreamStats {
                        exhausted,
                        weight: weights.as_ref().map(|weights| weights[idx]),
                        ..StreamStats::default()
                    },
                }
            })
            .collect();
        info!(
            budget = ?budget,
            weighted = weights.is_some(),
            policy = ?policy,
            "stream mux ready"
        );
        Ok(Self {
            streams,
            active,
            weights,
            budget,
            emitted: 0,
            policy,
            halted: false,
            rng,
        })
    }

    /// Descriptors emitted so far across all streams.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Global budget, if any.
    pub fn budget(&self) -> Option<u64> {
        self.budget
    }

    /// Number of streams still eligible for draws.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Ids of the streams still eligible for draws, in registration order.
    pub fn active_ids(&self) -> Vec<StreamId> {
        self.active
            .iter()
            .map(|idx| self.streams[*idx].stream.id().to_string())
            .collect()
    }

    /// Telemetry for every stream, in registration order.
    pub fn stream_stats(&self) -> Vec<(StreamId, StreamStats)> {
        self.streams
            .iter()
            .map(|state| (state.stream.id().to_string(), state.stats.clone()))
            .collect()
    }

    /// Emitted descriptor count per stream.
    pub fn emitted_per_stream(&self) -> HashMap<StreamId, u64> {
        self.streams
            .iter()
            .map(|state| (state.stream.id().to_string(), state.stats.emitted))
            .collect()
    }

    fn budget_reached(&self) -> bool {
        self.budget.is_some_and(|budget| self.emitted >= budget)
    }

    /// Pick a position in `self.active`.
    fn pick_active(&mut self) -> usize {
        if let Some(weights) = self.weights.as_ref() {
            let total: f64 = self.active.iter().map(|idx| weights[*idx]).sum();
            if total > 0.0 {
                let mut target = self.rng.random::<f64>() * total;
                let mut last_positive = 0;
                for (slot, idx) in self.active.iter().enumerate() {
                    let weight = weights[*idx];
                    if weight <= 0.0 {
                        continue;
                    }
                    last_positive = slot;
                    if target < weight {
                        return slot;
                    }
                    target -= weight;
                }
                return last_positive;
            }
        }
        self.rng.random_range(0..self.active.len())
    }

    fn deactivate(&mut self, slot: usize) {
        let idx = self.active.remove(slot);
        let state = &mut self.streams[idx];
        state.stats.exhausted = true;
        debug!(
            stream_id = %state.stream.id(),
            emitted = state.stats.emitted,
            remaining_active = self.active.len(),
            "stream exhausted"
        );
    }
}

impl Iterator for StreamMux {
    type Item = Result<Descriptor, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.halted || self.budget_reached() || self.active.is_empty() {
                return None;
            }
            let slot = self.pick_active();
            let idx = self.active[slot];
            match self.streams[idx].stream.next() {
                Some(Ok(descriptor)) => {
                    self.emitted += 1;
                    self.streams[idx].stats.emitted += 1;
                    if self.streams[idx].stream.is_exhausted() {
                        self.deactivate(slot);
                    }
                    return Some(Ok(descriptor));
                }
                Some(Err(err)) => {
                    let stats = &mut self.streams[idx].stats;
                    stats.error_count = stats.error_count.saturating_add(1);
                    stats.last_error = Some(err.to_string());
                    if err.is_record_level() {
                        return Some(Err(err));
                    }
                    self.deactivate(slot);
                    match self.policy {
                        FailurePolicy::Abort => {
                            self.halted = true;
                            return Some(Err(err));
                        }
                        FailurePolicy::DropStream => {
                            warn!(
                                stream_id = %self.streams[idx].stream.id(),
                                error = %err,
                                "dropping failed stream"
                            );
                            continue;
                        }
                    }
                }
                None => {
                    self.deactivate(slot);
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::DescriptorSource;

    fn labeled(label: &str, count: usize) -> DescriptorSource {
        let label = label.to_string();
        Box::new(
            (0..count)
                .map(move |idx| Ok(Descriptor::new(format!("https://m/{label}/{idx}"), label.clone(), None))),
        )
    }

    fn stream(label: &str, count: usize, cap: Option<u64>) -> CappedStream {
        CappedStream::new(label, labeled(label, count), cap)
    }

    fn labels(mux: StreamMux) -> Vec<String> {
        mux.map(|item| item.unwrap().label).collect()
    }

    #[test]
    fn drains_every_stream_without_budget() {
        let mux = StreamMux::new(
            vec![stream("a", 3, None), stream("b", 5, None)],
            None,
            None,
            FailurePolicy::Abort,
            DeterministicRng::new(1),
        )
        .unwrap();
        let out = labels(mux);
        assert_eq!(out.iter().filter(|label| *label == "a").count(), 3);
        assert_eq!(out.iter().filter(|label| *label == "b").count(), 5);
    }

    #[test]
    fn budget_bounds_total_output() {
        for budget in [0u64, 1, 4, 7, 100] {
            let mux = StreamMux::new(
                vec![stream("a", 3, None), stream("b", 4, None)],
                None,
                Some(budget),
                FailurePolicy::Abort,
                DeterministicRng::new(budget),
            )
            .unwrap();
            assert_eq!(labels(mux).len() as u64, budget.min(7));
        }
    }

    #[test]
    fn per_stream_caps_are_respected() {
        let mux = StreamMux::new(
            vec![stream("a", 10, Some(2)), stream("b", 10, Some(3))],
            None,
            None,
            FailurePolicy::Abort,
            DeterministicRng::new(5),
        )
        .unwrap();
        let out = labels(mux);
        assert_eq!(out.iter().filter(|label| *label == "a").count(), 2);
        assert_eq!(out.iter().filter(|label| *label == "b").count(), 3);
    }

    #[test]
    fn interleaving_is_not_strict_round_robin_and_is_seeded() {
        let build = |seed| {
            StreamMux::new(
                vec![stream("a", 50, None), stream("b", 50, None)],
                None,
                None,
                FailurePolicy::Abort,
                DeterministicRng::new(seed),
            )
            .unwrap()
        };
        let first = labels(build(11));
        let second = labels(build(11));
        assert_eq!(first, second);
        let alternating = first.windows(2).all(|pair| pair[0] != pair[1]);
        assert!(!alternating);
    }

    #[test]
    fn exhausted_streams_leave_the_active_set_for_good() {
        let mut mux = StreamMux::new(
            vec![stream("a", 1, None), stream("b", 20, None)],
            None,
            None,
            FailurePolicy::Abort,
            DeterministicRng::new(3),
        )
        .unwrap();
        let mut seen_a = 0;
        while mux.active_ids().contains(&"a".to_string()) {
            if mux.next().unwrap().unwrap().label == "a" {
                seen_a += 1;
            }
        }
        assert_eq!(seen_a, 1);
        assert_eq!(mux.active_ids(), vec!["b".to_string()]);
        for item in mux.by_ref() {
            assert_eq!(item.unwrap().label, "b");
        }
        let stats = mux.stream_stats();
        assert!(stats.iter().all(|(_, stats)| stats.exhausted));
        assert_eq!(mux.emitted(), 21);
    }

    #[test]
    fn weighted_draws_follow_population_ratio() {
        let mux = StreamMux::new(
            vec![stream("big", 5_000, None), stream("small", 5_000, None)],
            Some(vec![1.0, 0.1]),
            Some(3_300),
            FailurePolicy::Abort,
            DeterministicRng::new(2024),
        )
        .unwrap();
        let out = labels(mux);
        let big = out.iter().filter(|label| *label == "big").count() as f64;
        let small = out.iter().filter(|label| *label == "small").count() as f64;
        let ratio = big / small;
        assert!((7.0..14.0).contains(&ratio), "ratio was {ratio}");
    }

    #[test]
    fn zero_weight_streams_drain_after_positive_ones() {
        let mux = StreamMux::new(
            vec![stream("a", 3, None), stream("z", 2, None)],
            Some(vec![1.0, 0.0]),
            None,
            FailurePolicy::Abort,
            DeterministicRng::new(8),
        )
        .unwrap();
        let out = labels(mux);
        assert_eq!(out, vec!["a", "a", "a", "z", "z"]);
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let err = StreamMux::new(
            vec![stream("a", 1, None)],
            Some(vec![1.0, 2.0]),
            None,
            FailurePolicy::Abort,
            DeterministicRng::new(0),
        );
        assert!(matches!(err, Err(StreamError::Configuration(_))));
        let err = StreamMux::new(
            vec![stream("a", 1, None)],
            Some(vec![f64::NAN]),
            None,
            FailurePolicy::Abort,
            DeterministicRng::new(0),
        );
        assert!(matches!(err, Err(StreamError::Configuration(_))));
    }

    fn failing(label: &str, before: usize) -> CappedStream {
        let label = label.to_string();
        let id = label.clone();
        let items = (0..before)
            .map(move |idx| Ok(Descriptor::new(format!("https://m/{label}/{idx}"), label.clone(), None)))
            .chain(std::iter::once(Err(StreamError::UpstreamRequest {
                stream_id: id.clone(),
                reason: "http status: 500".into(),
            })));
        CappedStream::new(id, Box::new(items), None)
    }

    #[test]
    fn abort_policy_ends_the_sequence_after_a_fatal_error() {
        let mux = StreamMux::new(
            vec![failing("bad", 0), stream("good", 100, None)],
            None,
            None,
            FailurePolicy::Abort,
            DeterministicRng::new(4),
        )
        .unwrap();
        let items: Vec<Result<Descriptor, StreamError>> = mux.collect();
        assert!(items.last().unwrap().is_err());
        assert_eq!(items.iter().filter(|item| item.is_err()).count(), 1);
        assert!(items.len() < 101);
    }

    #[test]
    fn drop_policy_continues_with_remaining_streams() {
        let mut mux = StreamMux::new(
            vec![failing("bad", 2), stream("good", 10, None)],
            None,
            None,
            FailurePolicy::DropStream,
            DeterministicRng::new(4),
        )
        .unwrap();
        let items: Vec<Result<Descriptor, StreamError>> = mux.by_ref().collect();
        assert!(items.iter().all(|item| item.is_ok()));
        assert_eq!(items.len(), 12);
        let stats: HashMap<StreamId, StreamStats> = mux.stream_stats().into_iter().collect();
        assert_eq!(stats["bad"].error_count, 1);
        assert!(stats["bad"].last_error.as_deref().unwrap().contains("500"));
    }

    #[test]
    fn record_level_errors_keep_the_stream_active() {
        let items: Vec<Result<Descriptor, StreamError>> = vec![
            Err(StreamError::ContentProbe {
                url: "https://m/x".into(),
                reason: "refused".into(),
            }),
            Ok(Descriptor::new("https://m/1", "only", None)),
        ];
        let mux = StreamMux::new(
            vec![CappedStream::new("only", Box::new(items.into_iter()), None)],
            None,
            None,
            FailurePolicy::Abort,
            DeterministicRng::new(0),
        )
        .unwrap();
        let items: Vec<Result<Descriptor, StreamError>> = mux.collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_err());
        assert!(items[1].is_ok());
    }
}
