//src/umi_graph.rs

use ahash::AHashMap;

use crate::error::{Result, UmiError};
use crate::types::{DuplicateSet, TaggedRecord};

/// Number of positions at which two equal-length UMIs differ.
///
/// Callers must check lengths first; extra trailing bytes of the longer
/// string are ignored.
pub fn hamming_distance(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count()
}

/// Disjoint-set forest with path halving and union by size.
#[derive(Debug)]
struct DisjointSets {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect(), size: vec![1; n] }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}

/// Graph over the distinct UMIs of one duplicate set. Two UMIs are adjacent
/// when their Hamming distance is at most the join threshold; each connected
/// component becomes one output duplicate set.
pub struct UmiGraph<R> {
    records: Vec<R>,
    representative: usize,
    /// Distinct observed UMIs, in order of first appearance.
    umis: Vec<String>,
    /// Number of records carrying each distinct UMI.
    counts: Vec<usize>,
    /// Index into `umis` for each record, `None` when the record has no UMI.
    record_umis: Vec<Option<usize>>,
}

impl<R: TaggedRecord> UmiGraph<R> {
    /// Collects the distinct UMIs of `set`.
    ///
    /// Fails on a record without a UMI unless `allow_missing_umis` is set, and
    /// on UMIs whose lengths disagree within the set.
    pub fn new(set: DuplicateSet<R>, umi_tag: &str, allow_missing_umis: bool) -> Result<Self> {
        let representative = set.representative_index();
        let records = set.into_records();

        let mut index: AHashMap<String, usize> = AHashMap::with_capacity(records.len());
        let mut umis: Vec<String> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        let mut record_umis = Vec::with_capacity(records.len());

        for rec in &records {
            let Some(umi) = rec.umi(umi_tag) else {
                if !allow_missing_umis {
                    return Err(UmiError::MissingUmi {
                        read_name: rec.name().to_string(),
                        tag: umi_tag.to_string(),
                    });
                }
                record_umis.push(None);
                continue;
            };

            let id = match index.get(umi) {
                Some(&id) => id,
                None => {
                    if let Some(first) = umis.first() {
                        if first.len() != umi.len() {
                            return Err(UmiError::UmiLengthMismatch {
                                umi: umi.to_string(),
                                expected: first.len(),
                                found: umi.len(),
                            });
                        }
                    }
                    let id = umis.len();
                    index.insert(umi.to_string(), id);
                    umis.push(umi.to_string());
                    counts.push(0);
                    id
                }
            };
            counts[id] += 1;
            record_umis.push(Some(id));
        }

        Ok(Self { records, representative, umis, counts, record_umis })
    }

    /// Length of the UMIs in this set, if any record carries one.
    pub fn umi_length(&self) -> Option<usize> {
        self.umis.first().map(String::len)
    }

    pub fn distinct_umis(&self) -> &[String] {
        &self.umis
    }

    /// Splits the records into one duplicate set per connected component and
    /// stamps each record with its component's consensus UMI under `inferred_umi_tag`.
    ///
    /// The consensus is the UMI carried by the most records, ties going to the
    /// lexicographically smallest. Sets are ordered by the position of their
    /// first record; reads without a UMI come last, as their own set, with any
    /// existing inferred UMI tag removed.
    pub fn join_umis_into_duplicate_sets(
        self,
        max_edit_distance_to_join: u32,
        inferred_umi_tag: &str,
    ) -> Result<Vec<DuplicateSet<R>>> {
        let Self { records, representative, umis, counts, record_umis } = self;
        let max_distance = max_edit_distance_to_join as usize;

        // 1. Union every pair of UMIs within the threshold
        let mut forest = DisjointSets::new(umis.len());
        for i in 0..umis.len() {
            for j in (i + 1)..umis.len() {
                if hamming_distance(&umis[i], &umis[j]) <= max_distance {
                    forest.union(i, j);
                }
            }
        }

        // 2. Consensus per component root
        let mut consensus: AHashMap<usize, usize> = AHashMap::new();
        for (id, umi) in umis.iter().enumerate() {
            let root = forest.find(id);
            let best = consensus.entry(root).or_insert(id);
            let better = counts[id] > counts[*best]
                || (counts[id] == counts[*best] && umi.as_str() < umis[*best].as_str());
            if better {
                *best = id;
            }
        }

        // 3. Partition records by component, in order of first appearance
        let mut group_of_root: AHashMap<usize, usize> = AHashMap::new();
        let mut groups: Vec<(Vec<R>, Option<usize>)> = Vec::new();
        let mut missing: (Vec<R>, Option<usize>) = (Vec::new(), None);

        for (position, (mut rec, umi_id)) in records.into_iter().zip(record_umis).enumerate() {
            let target = match umi_id {
                Some(id) => {
                    let root = forest.find(id);
                    let inferred = &umis[consensus[&root]];
                    rec.set_tag(inferred_umi_tag, inferred.clone());

                    let next = groups.len();
                    let group = *group_of_root.entry(root).or_insert(next);
                    if group == next {
                        groups.push((Vec::new(), None));
                    }
                    &mut groups[group]
                }
                None => {
                    rec.remove_tag(inferred_umi_tag);
                    &mut missing
                }
            };
            if position == representative {
                target.1 = Some(target.0.len());
            }
            target.0.push(rec);
        }

        if !missing.0.is_empty() {
            log::warn!("{} read(s) without a UMI kept as their own duplicate set", missing.0.len());
            groups.push(missing);
        }

        let sets = groups
            .into_iter()
            .map(|(members, rep)| DuplicateSet::with_representative(members, rep.unwrap_or(0)))
            .collect::<Result<Vec<_>>>()?;

        if sets.len() > 1 {
            log::debug!(
                "Split duplicate set of {} distinct UMI(s) into {} set(s)",
                umis.len(),
                sets.len()
            );
        }
        Ok(sets)
    }
}
