// src/lib.rs
pub mod config;
pub mod error;
pub mod metrics;
pub mod tsv;
pub mod types;
pub mod umi_aware;
pub mod umi_graph;
pub mod umi_stats;

use std::fmt::Write as FmtWrite;

pub use crate::config::UmiConfig;
pub use crate::error::{Result, UmiError};
pub use crate::metrics::UmiMetrics;
pub use crate::types::{DuplicateSet, Read, TaggedRecord};
pub use crate::umi_aware::{DuplicateSetSource, IterSource, UmiAwareDuplicateSets};

/// Everything a full pass over a duplicate-set stream produces.
pub struct RefinementResults<R> {
    /// Output duplicate sets, in stream order.
    pub duplicate_sets: Vec<DuplicateSet<R>>,

    /// `None` when no read in the stream carried a UMI.
    pub metrics: Option<UmiMetrics>,

    /// Tags the reads were grouped and stamped with
    pub umi_tag: String,
    pub inferred_umi_tag: String,
}

impl<R: TaggedRecord> RefinementResults<R> {
    /// One line per read: output set index, read name, observed UMI, inferred UMI.
    pub fn get_grouped_reads_text(&self) -> String {
        let mut output = String::new();
        output.push_str("set\tread\tumi\tinferred_umi\n");
        for (index, set) in self.duplicate_sets.iter().enumerate() {
            for rec in set.records() {
                writeln!(
                    output,
                    "{}\t{}\t{}\t{}",
                    index,
                    rec.name(),
                    rec.umi(&self.umi_tag).unwrap_or(tsv::NO_UMI),
                    rec.umi(&self.inferred_umi_tag).unwrap_or(tsv::NO_UMI)
                )
                .unwrap();
            }
        }
        output
    }

    /// Metrics report text, if metrics were computed.
    pub fn get_metrics_report(&self) -> Option<String> {
        self.metrics.as_ref().map(UmiMetrics::to_text)
    }
}

/// Runs a source through the UMI-aware adapter to completion and closes it.
pub fn refine_duplicate_sets<S: DuplicateSetSource>(
    source: S,
    config: UmiConfig,
) -> Result<RefinementResults<S::Record>> {
    let umi_tag = config.umi_tag.clone();
    let inferred_umi_tag = config.inferred_umi_tag.clone();

    // 1. Drain the stream
    let mut stream = UmiAwareDuplicateSets::new(source, config)?;
    let mut duplicate_sets = Vec::new();
    while let Some(set) = stream.next_set()? {
        duplicate_sets.push(set);
    }

    // 2. Close, which finalizes the metrics
    stream.close()?;
    let metrics = stream.metrics().cloned();

    Ok(RefinementResults { duplicate_sets, metrics, umi_tag, inferred_umi_tag })
}
