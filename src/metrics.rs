// src/metrics.rs

use std::fmt::Write as FmtWrite;

use crate::umi_stats::UmiStats;

/// Converts an error rate given as `errors / total` to a Phred score.
///
/// Degenerate inputs are explicit: no errors gives `f64::INFINITY`, and a
/// zero `total` (nothing observed) gives `f64::NAN`.
pub fn phred_from_rate(errors: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return f64::NAN;
    }
    if errors <= 0.0 {
        return f64::INFINITY;
    }
    -10.0 * (errors / total).log10()
}

/// Summary of the UMIs seen over a whole stream, computed once when the
/// stream is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct UmiMetrics {
    /// Number of bases in each UMI.
    pub umi_length: usize,
    /// Distinct UMI sequences observed.
    pub observed_unique_umis: u64,
    /// Distinct inferred UMI sequences.
    pub inferred_unique_umis: u64,
    /// Mismatches between observed and inferred UMIs.
    pub observed_base_errors: u64,
    /// Duplicate sets before taking UMIs into account.
    pub duplicate_sets_without_umi: u64,
    /// Duplicate sets after taking UMIs into account.
    pub duplicate_sets_with_umi: u64,
    /// Base-4 entropy of the observed UMIs. Much lower than `umi_length`
    /// means the UMIs are far from uniformly distributed.
    pub observed_umi_entropy: f64,
    /// Base-4 entropy of the inferred UMIs.
    pub inferred_umi_entropy: f64,
    /// Phred-scaled per-base UMI quality.
    pub umi_base_qualities: f64,
    /// Expected number of reads falsely placed in a duplicate set through a UMI
    /// collision, accumulated over every duplicate set.
    pub umi_collision_est: f64,
    /// Phred-scaled collision rate.
    pub umi_collision_q: f64,
}

impl UmiMetrics {
    /// Column names, in the order `to_text` writes them.
    pub const HEADER: [&'static str; 11] = [
        "UMI_LENGTH",
        "OBSERVED_UNIQUE_UMIS",
        "INFERRED_UNIQUE_UMIS",
        "OBSERVED_BASE_ERRORS",
        "DUPLICATE_SETS_WITHOUT_UMI",
        "DUPLICATE_SETS_WITH_UMI",
        "OBSERVED_UMI_ENTROPY",
        "INFERRED_UMI_ENTROPY",
        "UMI_BASE_QUALITIES",
        "UMI_COLLISION_EST",
        "UMI_COLLISION_Q",
    ];

    /// Derives the metrics from running totals. Pure, so calling it again on
    /// the same totals gives the same answer.
    pub fn from_stats(stats: &UmiStats) -> Self {
        let inferred_unique_umis = stats.inferred_umis.len() as u64;

        let metrics = Self {
            umi_length: stats.umi_length,
            observed_unique_umis: stats.observed_umis.len() as u64,
            inferred_unique_umis,
            observed_base_errors: stats.observed_base_errors,
            duplicate_sets_without_umi: stats.duplicate_sets_without_umi,
            duplicate_sets_with_umi: stats.duplicate_sets_with_umi,
            observed_umi_entropy: stats.observed_umis.entropy_base4(),
            inferred_umi_entropy: stats.inferred_umis.entropy_base4(),
            umi_base_qualities: phred_from_rate(
                stats.observed_base_errors as f64,
                stats.observed_umi_bases as f64,
            ),
            umi_collision_est: stats.expected_collisions,
            umi_collision_q: phred_from_rate(
                stats.expected_collisions,
                inferred_unique_umis as f64,
            ),
        };

        log::info!(
            "UMI metrics: length={} observed_unique={} inferred_unique={} base_q={:.2} \
             collision_q={:.2}",
            metrics.umi_length,
            metrics.observed_unique_umis,
            metrics.inferred_unique_umis,
            metrics.umi_base_qualities,
            metrics.umi_collision_q
        );
        metrics
    }

    /// Tab-separated header line followed by one line of values.
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        output.push_str(&Self::HEADER.join("\t"));
        output.push('\n');
        writeln!(
            output,
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
            self.umi_length,
            self.observed_unique_umis,
            self.inferred_unique_umis,
            self.observed_base_errors,
            self.duplicate_sets_without_umi,
            self.duplicate_sets_with_umi,
            self.observed_umi_entropy,
            self.inferred_umi_entropy,
            self.umi_base_qualities,
            self.umi_collision_est,
            self.umi_collision_q
        )
        .unwrap();
        output
    }
}
