use crate::data::Descriptor;
use crate::errors::StreamError;
use crate::types::StreamId;

/// Boxed descriptor sequence backing a [`CappedStream`].
pub type DescriptorSource = Box<dyn Iterator<Item = Result<Descriptor, StreamError>> + Send>;

/// A descriptor sequence with an optional per-stream cap and a sticky
/// exhaustion flag.
///
/// Only successful descriptors count toward the cap. Once the cap is reached
/// or the source ends, the inner source is never polled again.
pub struct CappedStream {
    id: StreamId,
    source: DescriptorSource,
    cap: Option<u64>,
    yielded: u64,
    exhausted: bool,
}

impl CappedStream {
    /// Wrap `source`; `cap == None` means no limit.
    pub fn new(id: impl Into<StreamId>, source: DescriptorSource, cap: Option<u64>) -> Self {
        let exhausted = cap == Some(0);
        Self {
            id: id.into(),
            source,
            cap,
            yielded: 0,
            exhausted,
        }
    }

    /// Stream identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Descriptors yielded so far.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Per-stream cap, if any.
    pub fn cap(&self) -> Option<u64> {
        self.cap
    }

    /// `true` once the source ended or the cap was reached.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl Iterator for CappedStream {
    type Item = Result<Descriptor, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.source.next() {
            Some(Ok(descriptor)) => {
                self.yielded += 1;
                if self.cap.is_some_and(|cap| self.yielded >= cap) {
                    self.exhausted = true;
                }
                Some(Ok(descriptor))
            }
            Some(Err(err)) => Some(Err(err)),
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(count: usize) -> DescriptorSource {
        Box::new(
            (0..count)
                .map(|idx| Ok(Descriptor::new(format!("https://m/{idx}"), "x", None))),
        )
    }

    #[test]
    fn cap_limits_yield_for_every_size() {
        for cap in 0..6u64 {
            let stream = CappedStream::new("s", source(4), Some(cap));
            assert_eq!(stream.count() as u64, cap.min(4));
        }
    }

    #[test]
    fn exhaustion_is_sticky() {
        let mut stream = CappedStream::new("s", source(1), None);
        assert!(stream.next().is_some());
        assert!(!stream.is_exhausted());
        assert!(stream.next().is_none());
        assert!(stream.is_exhausted());
        assert!(stream.next().is_none());
        assert_eq!(stream.yielded(), 1);
    }

    #[test]
    fn errors_pass_through_without_counting() {
        let items: Vec<Result<Descriptor, StreamError>> = vec![
            Err(StreamError::ContentProbe {
                url: "https://m/x".into(),
                reason: "refused".into(),
            }),
            Ok(Descriptor::new("https://m/1", "x", None)),
            Ok(Descriptor::new("https://m/2", "x", None)),
        ];
        let mut stream = CappedStream::new("s", Box::new(items.into_iter()), Some(1));
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().unwrap().is_ok());
        assert!(stream.is_exhausted());
        assert!(stream.next().is_none());
    }

    #[test]
    fn zero_cap_never_polls_source() {
        let polled = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = polled.clone();
        let source: DescriptorSource = Box::new(std::iter::from_fn(move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            None
        }));
        let mut stream = CappedStream::new("s", source, Some(0));
        assert!(stream.next().is_none());
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }
}
