use crate::types::StreamId;

/// Balance summary of how many descriptors each stream contributed.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamSkew {
    /// Descriptors across all streams.
    pub total: u64,
    /// Number of streams summarized.
    pub streams: usize,
    /// Smallest per-stream count.
    pub min: u64,
    /// Largest per-stream count.
    pub max: u64,
    /// Mean per-stream count.
    pub mean: f64,
    /// Share of `total` held by the largest stream.
    pub max_share: f64,
    /// Share of `total` held by the smallest stream.
    pub min_share: f64,
    /// `max / min`; infinite when some stream contributed nothing.
    pub ratio: f64,
    /// Per-stream entries, largest first, ties by id.
    pub per_stream: Vec<StreamShare>,
}

/// One stream's contribution to the output.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamShare {
    /// Stream the count belongs to.
    pub stream_id: StreamId,
    /// Descriptors the stream contributed.
    pub count: u64,
    /// `count / total`, `0.0` when nothing was emitted.
    pub share: f64,
}

impl StreamSkew {
    /// `true` when every stream's share is within `tolerance` of an even split.
    pub fn is_even_within(&self, tolerance: f64) -> bool {
        let even = 1.0 / self.streams as f64;
        self.per_stream
            .iter()
            .all(|entry| (entry.share - even).abs() <= tolerance)
    }
}

/// Summarize `(stream id, count)` pairs; `None` when there are no streams.
pub fn stream_skew<'a, I>(counts: I) -> Option<StreamSkew>
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let mut per_stream: Vec<StreamShare> = counts
        .into_iter()
        .map(|(stream_id, count)| StreamShare {
            stream_id: stream_id.to_string(),
            count,
            share: 0.0,
        })
        .collect();
    per_stream.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.stream_id.cmp(&b.stream_id))
    });
    let max = per_stream.first()?.count;
    let min = per_stream.last()?.count;
    let total = per_stream
        .iter()
        .fold(0u64, |acc, entry| acc.saturating_add(entry.count));
    let share = |count: u64| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };
    for entry in &mut per_stream {
        entry.share = share(entry.count);
    }
    let streams = per_stream.len();
    Some(StreamSkew {
        total,
        streams,
        min,
        max,
        mean: total as f64 / streams as f64,
        max_share: share(max),
        min_share: share(min),
        ratio: if min == 0 {
            f64::INFINITY
        } else {
            max as f64 / min as f64
        },
        per_stream,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_output_has_unit_ratio() {
        let skew = stream_skew([("speciesKey=1", 30), ("speciesKey=2", 30)]).unwrap();
        assert_eq!(skew.total, 60);
        assert_eq!(skew.streams, 2);
        assert!((skew.max_share - 0.5).abs() < 1e-6);
        assert!((skew.ratio - 1.0).abs() < 1e-6);
        assert!(skew.is_even_within(1e-6));
    }

    #[test]
    fn uneven_output_is_sorted_largest_first() {
        let skew = stream_skew([("B", 2), ("C", 0), ("A", 4)]).unwrap();
        assert_eq!(skew.total, 6);
        assert_eq!((skew.min, skew.max), (0, 4));
        assert!(skew.ratio.is_infinite());
        let order: Vec<&str> = skew
            .per_stream
            .iter()
            .map(|entry| entry.stream_id.as_str())
            .collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert!(!skew.is_even_within(0.1));
    }

    #[test]
    fn nothing_emitted_has_zero_shares() {
        let skew = stream_skew([("A", 0), ("B", 0)]).unwrap();
        assert_eq!(skew.total, 0);
        assert!(skew.per_stream.iter().all(|entry| entry.share == 0.0));
    }

    #[test]
    fn no_streams_has_no_skew() {
        assert!(stream_skew(std::iter::empty::<(&str, u64)>()).is_none());
    }
}
