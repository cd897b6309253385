// src/umi_aware.rs

use std::collections::VecDeque;

use crate::config::UmiConfig;
use crate::error::{Result, UmiError};
use crate::metrics::UmiMetrics;
use crate::types::{DuplicateSet, TaggedRecord};
use crate::umi_graph::UmiGraph;
use crate::umi_stats::UmiStats;

/// An ordered, single-pass supply of duplicate sets.
pub trait DuplicateSetSource {
    type Record: TaggedRecord;

    /// The next duplicate set, or `None` once the source is exhausted.
    fn next_set(&mut self) -> Result<Option<DuplicateSet<Self::Record>>>;

    /// Releases the source. Called at most once by the adapter.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Adapts any iterator of duplicate sets into a `DuplicateSetSource`.
pub struct IterSource<I> {
    inner: I,
}

impl<I> IterSource<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<I, R> DuplicateSetSource for IterSource<I>
where
    I: Iterator<Item = DuplicateSet<R>>,
    R: TaggedRecord,
{
    type Record = R;

    fn next_set(&mut self) -> Result<Option<DuplicateSet<R>>> {
        Ok(self.inner.next())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    /// Upstream ran dry or a fatal error occurred; nothing more will be produced.
    Exhausted,
    Closed,
}

/// Wraps a stream of duplicate sets and splits each one by UMI, allowing
/// up to `max_edit_distance_to_join` mismatches between UMIs of the same
/// molecule. Statistics about the UMIs are gathered along the way and turned
/// into `UmiMetrics` when the stream is closed.
pub struct UmiAwareDuplicateSets<S: DuplicateSetSource> {
    source: S,
    config: UmiConfig,
    buffer: VecDeque<DuplicateSet<S::Record>>,
    state: State,
    stats: UmiStats,
    metrics: Option<UmiMetrics>,
}

impl<S: DuplicateSetSource> UmiAwareDuplicateSets<S> {
    pub fn new(source: S, config: UmiConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            buffer: VecDeque::new(),
            state: State::Open,
            stats: UmiStats::new(),
            metrics: None,
        })
    }

    /// Running totals so far.
    pub fn stats(&self) -> &UmiStats {
        &self.stats
    }

    /// Final metrics; `None` until `close` has run on a stream that carried UMIs.
    pub fn metrics(&self) -> Option<&UmiMetrics> {
        self.metrics.as_ref()
    }

    /// Whether another output set is available, pulling and splitting the next
    /// input set if the buffer is empty.
    pub fn has_next(&mut self) -> Result<bool> {
        while self.buffer.is_empty() {
            if self.state != State::Open {
                return Ok(false);
            }
            let next = match self.source.next_set() {
                Ok(next) => next,
                Err(e) => return Err(self.fail(e)),
            };
            match next {
                Some(set) => {
                    if let Err(e) = self.process(set) {
                        return Err(self.fail(e));
                    }
                }
                None => self.state = State::Exhausted,
            }
        }
        Ok(true)
    }

    pub fn next_set(&mut self) -> Result<Option<DuplicateSet<S::Record>>> {
        if !self.has_next()? {
            return Ok(None);
        }
        Ok(self.buffer.pop_front())
    }

    /// Computes the final metrics if any UMI was seen, then closes the
    /// upstream source. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        if self.stats.umi_length > 0 && self.metrics.is_none() {
            self.metrics = Some(UmiMetrics::from_stats(&self.stats));
        }
        self.state = State::Closed;
        self.buffer.clear();
        self.source.close()
    }

    /// Splits one input set and refills the buffer with the result.
    fn process(&mut self, set: DuplicateSet<S::Record>) -> Result<()> {
        if !self.buffer.is_empty() {
            return Err(UmiError::BufferNotDrained);
        }

        let graph = UmiGraph::new(set, &self.config.umi_tag, self.config.allow_missing_umis)?;
        if let Some(length) = graph.umi_length() {
            if self.stats.umi_length > 0 && length != self.stats.umi_length {
                let umi = graph.distinct_umis()[0].clone();
                return Err(UmiError::UmiLengthMismatch {
                    umi,
                    expected: self.stats.umi_length,
                    found: length,
                });
            }
        }

        let sets = graph.join_umis_into_duplicate_sets(
            self.config.max_edit_distance_to_join,
            &self.config.inferred_umi_tag,
        )?;

        self.stats.record_split(
            &sets,
            &self.config.umi_tag,
            &self.config.inferred_umi_tag,
            self.config.max_edit_distance_to_join,
        )?;

        self.buffer.extend(sets);
        Ok(())
    }

    fn fail(&mut self, error: UmiError) -> UmiError {
        log::error!("Aborting UMI-aware stream: {error}");
        self.buffer.clear();
        self.state = State::Exhausted;
        error
    }
}

impl<S: DuplicateSetSource> Iterator for UmiAwareDuplicateSets<S> {
    type Item = Result<DuplicateSet<S::Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_set().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Read;

    fn set_of(prefix: &str, umis: &[&str]) -> DuplicateSet<Read> {
        let reads = umis
            .iter()
            .enumerate()
            .map(|(i, umi)| {
                let read = Read::new(format!("{prefix}{i}"));
                if umi.is_empty() {
                    read
                } else {
                    read.with_tag("RX", *umi)
                }
            })
            .collect();
        DuplicateSet::new(reads).unwrap()
    }

    fn adapter(
        sets: Vec<DuplicateSet<Read>>,
        config: UmiConfig,
    ) -> UmiAwareDuplicateSets<IterSource<std::vec::IntoIter<DuplicateSet<Read>>>> {
        UmiAwareDuplicateSets::new(IterSource::new(sets.into_iter()), config).unwrap()
    }

    /// Records close calls so tests can check forwarding.
    struct CountingSource {
        sets: std::vec::IntoIter<DuplicateSet<Read>>,
        closes: usize,
    }

    impl DuplicateSetSource for CountingSource {
        type Record = Read;

        fn next_set(&mut self) -> Result<Option<DuplicateSet<Read>>> {
            Ok(self.sets.next())
        }

        fn close(&mut self) -> Result<()> {
            self.closes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_all_same_umi() {
        let sets = vec![set_of("q", &["AAAA", "AAAA", "AAAA"])];
        let mut stream = adapter(sets, UmiConfig::default());
        let sets: Vec<_> = stream.by_ref().collect::<Result<_>>().unwrap();
        stream.close().unwrap();

        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].representative().get_tag("MI"), Some("AAAA"));
        let metrics = stream.metrics().unwrap();
        assert_eq!(metrics.umi_length, 4);
        assert_eq!(metrics.observed_base_errors, 0);
        assert_eq!(metrics.umi_base_qualities, f64::INFINITY);
    }

    #[test]
    fn test_splits_flattened_in_order() {
        let config = UmiConfig::default().with_max_edit_distance(0);
        let mut stream = adapter(
            vec![set_of("a", &["AAAA", "AAAT"]), set_of("b", &["CCCC"])],
            config,
        );

        let mut sizes = Vec::new();
        while stream.has_next().unwrap() {
            let set = stream.next_set().unwrap().unwrap();
            sizes.push((set.representative().name().to_string(), set.len()));
        }
        assert_eq!(
            sizes,
            vec![("a0".to_string(), 1), ("a1".to_string(), 1), ("b0".to_string(), 1)]
        );
        assert!(stream.next_set().unwrap().is_none());

        let stats = stream.stats();
        assert_eq!(stats.duplicate_sets_with_umi, 3);
        assert_eq!(stats.duplicate_sets_without_umi, 2);
    }

    #[test]
    fn test_collision_accumulated_per_set() {
        let config = UmiConfig::default().with_max_edit_distance(0);
        let mut stream = adapter(
            vec![set_of("a", &["AAAA", "CCCC"]), set_of("b", &["GGGG", "TTTT", "ACGT"])],
            config,
        );
        while stream.next_set().unwrap().is_some() {}

        // Z = 1 for D = 0
        let p = 1.0 / 256.0;
        let expected = 2.0 * p + 3.0 * (1.0 - (1.0 - p) * (1.0 - p));
        assert!((stream.stats().expected_collisions - expected).abs() < 1e-12);
    }

    #[test]
    fn test_close_is_idempotent_and_forwards() {
        let source = CountingSource { sets: vec![set_of("q", &["ACGT"])].into_iter(), closes: 0 };
        let mut stream = UmiAwareDuplicateSets::new(source, UmiConfig::default()).unwrap();
        while stream.next_set().unwrap().is_some() {}

        stream.close().unwrap();
        let first = stream.metrics().cloned();
        stream.close().unwrap();

        assert_eq!(stream.source.closes, 1);
        assert!(first.is_some());
        assert_eq!(stream.metrics().cloned(), first);
        assert!(!stream.has_next().unwrap());
    }

    struct FailingCloseSource {
        sets: std::vec::IntoIter<DuplicateSet<Read>>,
    }

    impl DuplicateSetSource for FailingCloseSource {
        type Record = Read;

        fn next_set(&mut self) -> Result<Option<DuplicateSet<Read>>> {
            Ok(self.sets.next())
        }

        fn close(&mut self) -> Result<()> {
            Err(std::io::Error::other("close failed").into())
        }
    }

    #[test]
    fn test_metrics_survive_failed_upstream_close() {
        let source = FailingCloseSource { sets: vec![set_of("q", &["ACGT"])].into_iter() };
        let mut stream = UmiAwareDuplicateSets::new(source, UmiConfig::default()).unwrap();
        while stream.next_set().unwrap().is_some() {}

        assert!(matches!(stream.close(), Err(UmiError::Io(_))));
        assert_eq!(stream.metrics().map(|m| m.umi_length), Some(4));

        assert!(stream.close().is_ok());
        assert_eq!(stream.metrics().map(|m| m.umi_length), Some(4));
    }

    #[test]
    fn test_close_without_umis_skips_metrics() {
        let config = UmiConfig::default().with_allow_missing_umis(true);
        let mut stream = adapter(vec![set_of("q", &["", ""])], config);
        let sets: Vec<_> = stream.by_ref().collect::<Result<_>>().unwrap();
        stream.close().unwrap();

        assert_eq!(sets.len(), 1);
        assert_eq!(stream.stats().umi_length, 0);
        assert!(stream.metrics().is_none());
    }

    #[test]
    fn test_close_empty_stream() {
        let mut stream = adapter(Vec::new(), UmiConfig::default());
        assert!(!stream.has_next().unwrap());
        stream.close().unwrap();
        assert!(stream.metrics().is_none());
    }

    #[test]
    fn test_length_change_across_sets_is_fatal() {
        let mut stream = adapter(
            vec![set_of("a", &["AAAA"]), set_of("b", &["AAAAAA"]), set_of("c", &["CCCC"])],
            UmiConfig::default(),
        );
        assert!(stream.next_set().unwrap().is_some());
        let err = stream.next_set().unwrap_err();
        assert!(matches!(err, UmiError::UmiLengthMismatch { expected: 4, found: 6, .. }));
        assert!(!stream.has_next().unwrap());
    }

    #[test]
    fn test_missing_umi_is_fatal_by_default() {
        let mut stream = adapter(vec![set_of("q", &["AAAA", ""])], UmiConfig::default());
        let err = stream.next().unwrap().unwrap_err();
        assert!(matches!(err, UmiError::MissingUmi { ref read_name, .. } if read_name == "q1"));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = UmiConfig { inferred_umi_tag: "RX".to_string(), ..UmiConfig::default() };
        let source = IterSource::new(Vec::<DuplicateSet<Read>>::new().into_iter());
        let result = UmiAwareDuplicateSets::new(source, config);
        assert!(result.is_err());
    }

    #[test]
    fn test_process_with_undrained_buffer() {
        let mut stream = adapter(vec![set_of("a", &["AAAA", "CCCC"])], UmiConfig::default());
        assert!(stream.has_next().unwrap());
        let err = stream.process(set_of("b", &["GGGG"])).unwrap_err();
        assert!(matches!(err, UmiError::BufferNotDrained));
    }
}
