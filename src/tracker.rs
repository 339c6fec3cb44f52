//! Chromosome-scoped duplicate detection.
//!
//! Reads are duplicates when they share a 5' position, a UMI and a strand
//! within one chromosome block. Because input is coordinate-sorted, the index
//! only ever covers the chromosome currently being read and is thrown away as
//! soon as the next chromosome starts.

use std::collections::{HashMap, HashSet};

/// Identity of a molecule at a given 5' position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub umi: String,
    pub reverse: bool,
}

impl DuplicateKey {
    pub fn new(umi: impl Into<String>, reverse: bool) -> Self {
        Self { umi: umi.into(), reverse }
    }
}

/// Outcome of offering a read to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Drop,
}

/// UMIs seen at one position, split by strand so lookups can borrow the UMI.
#[derive(Debug, Default)]
struct StrandedUmis {
    forward: HashSet<String>,
    reverse: HashSet<String>,
}

impl StrandedUmis {
    fn strand(&self, reverse: bool) -> &HashSet<String> {
        if reverse {
            &self.reverse
        } else {
            &self.forward
        }
    }

    fn strand_mut(&mut self, reverse: bool) -> &mut HashSet<String> {
        if reverse {
            &mut self.reverse
        } else {
            &mut self.forward
        }
    }
}

/// 5' position -> molecules already emitted at that position.
#[derive(Debug, Default)]
pub struct PositionIndex {
    seen: HashMap<i64, StrandedUmis>,
}

impl PositionIndex {
    /// Record `key` at `position`. Returns false if it was already present.
    pub fn insert(&mut self, position: i64, key: DuplicateKey) -> bool {
        self.seen.entry(position).or_default().strand_mut(key.reverse).insert(key.umi)
    }

    /// Membership test without building a [`DuplicateKey`].
    pub fn contains(&self, position: i64, umi: &str, reverse: bool) -> bool {
        self.seen
            .get(&position)
            .is_some_and(|umis| umis.strand(reverse).contains(umi))
    }

    /// Number of distinct positions indexed.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Duplicate index bound to a single chromosome.
#[derive(Debug, Default)]
pub struct DuplicateTracker {
    scope: Option<String>,
    index: PositionIndex,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chromosome the index currently covers, if any.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Replace the index with an empty one scoped to `chrom`.
    pub fn reset(&mut self, chrom: &str) {
        self.scope = Some(chrom.to_string());
        self.index = PositionIndex::default();
    }

    /// Decide whether a read at `position` with `umi` and strand is new within
    /// the current scope. Only [`Decision::Keep`] modifies the index, and only
    /// it allocates.
    pub fn consider(&mut self, position: i64, umi: &str, reverse: bool) -> Decision {
        if self.index.contains(position, umi, reverse) {
            return Decision::Drop;
        }
        self.index.insert(position, DuplicateKey::new(umi, reverse));
        Decision::Keep
    }

    pub fn index(&self) -> &PositionIndex {
        &self.index
    }
}
