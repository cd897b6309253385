// src/umi_stats.rs

use ahash::AHashMap;

use crate::error::{Result, UmiError};
use crate::types::{DuplicateSet, TaggedRecord};
use crate::umi_graph::hamming_distance;

/// Occurrence counts keyed by UMI string.
#[derive(Debug, Clone, Default)]
pub struct UmiHistogram {
    counts: AHashMap<String, u64>,
    total: u64,
}

impl UmiHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, umi: &str) {
        match self.counts.get_mut(umi) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(umi.to_string(), 1);
            }
        }
        self.total += 1;
    }

    /// Number of distinct UMIs.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.total
    }

    #[cfg(test)]
    pub fn get(&self, umi: &str) -> u64 {
        self.counts.get(umi).copied().unwrap_or(0)
    }

    /// Shannon entropy in base 4, i.e. the effective number of DNA bases
    /// needed to encode the observed distribution. Zero for an empty histogram.
    pub fn entropy_base4(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        // Sorted so the floating-point sum does not depend on hash order
        let mut counts: Vec<u64> = self.counts.values().copied().collect();
        counts.sort_unstable();

        let total = self.total as f64;
        let h = counts.iter().fold(0.0, |h, &count| {
            let p = count as f64 / total;
            h - p * p.ln()
        });
        h / 4f64.ln()
    }
}

/// Binomial coefficient as a float; zero when `k > n`.
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Number of UMIs of length `umi_length` within `max_edit_distance` substitutions
/// of a fixed UMI over the four-letter alphabet: `sum_{k=0..=D} C(L,k) * 3^k`.
pub fn neighborhood_size(umi_length: usize, max_edit_distance: u32) -> f64 {
    if umi_length == 0 {
        return 0.0;
    }
    (0..=max_edit_distance as usize)
        .map(|k| binomial(umi_length, k) * 3f64.powi(k as i32))
        .sum()
}

/// Expected number of reads in a duplicate set split into `num_sets` molecules
/// that share a UMI neighbourhood with another molecule by chance:
/// `n * (1 - (1 - Z / 4^L)^(n - 1))`.
pub fn expected_collisions(num_sets: usize, umi_length: usize, max_edit_distance: u32) -> f64 {
    if num_sets == 0 {
        return 0.0;
    }
    let z = neighborhood_size(umi_length, max_edit_distance);
    let p = z / 4f64.powi(umi_length as i32);
    let n = num_sets as f64;
    n * (1.0 - (1.0 - p).powi(num_sets as i32 - 1))
}

/// Running totals gathered while streaming duplicate sets. Owned by a single
/// adapter for the lifetime of its stream.
#[derive(Debug, Clone, Default)]
pub struct UmiStats {
    /// Set by the first UMI seen; zero until then.
    pub umi_length: usize,
    pub observed_umis: UmiHistogram,
    pub inferred_umis: UmiHistogram,
    /// Mismatches between observed and inferred UMIs, summed over reads.
    pub observed_base_errors: u64,
    /// Number of UMI bases compared when counting `observed_base_errors`.
    pub observed_umi_bases: u64,
    pub duplicate_sets_with_umi: u64,
    pub duplicate_sets_without_umi: u64,
    pub expected_collisions: f64,
}

impl UmiStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds in the output sets produced from one input set.
    ///
    /// Every output set counts towards `duplicate_sets_with_umi`, while the
    /// input set counts once towards `duplicate_sets_without_umi`.
    pub fn record_split<R: TaggedRecord>(
        &mut self,
        sets: &[DuplicateSet<R>],
        umi_tag: &str,
        inferred_umi_tag: &str,
        max_edit_distance: u32,
    ) -> Result<()> {
        for set in sets {
            let inferred = set.representative().umi(inferred_umi_tag);

            for rec in set.records() {
                let Some(observed) = rec.umi(umi_tag) else {
                    continue;
                };
                if self.umi_length == 0 {
                    self.umi_length = observed.len();
                    log::debug!("UMI length set to {} by read '{}'", self.umi_length, rec.name());
                } else if observed.len() != self.umi_length {
                    return Err(UmiError::UmiLengthMismatch {
                        umi: observed.to_string(),
                        expected: self.umi_length,
                        found: observed.len(),
                    });
                }

                // A barcode-bearing read always lands in a set whose representative is stamped
                let inferred = inferred.unwrap_or(observed);
                self.observed_base_errors += hamming_distance(observed, inferred) as u64;
                self.observed_umi_bases += self.umi_length as u64;
                self.observed_umis.increment(observed);
                self.inferred_umis.increment(inferred);
            }

            self.duplicate_sets_with_umi += 1;
        }
        self.duplicate_sets_without_umi += 1;

        self.expected_collisions +=
            expected_collisions(sets.len(), self.umi_length, max_edit_distance);
        Ok(())
    }
}
