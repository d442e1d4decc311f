//! Compound hits: 1 to 3 runs that together explain one query.

use crate::record::RunHit;
use crate::types::{MAX_GAP_FOR_SINGLE_RECORD, MAX_SEGMENTS, MIN_RESIDUAL_RANGE};

/// A sorted, deduplicated set of at most `MAX_SEGMENTS` runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompoundHit {
    hits: Vec<RunHit>,
}

impl CompoundHit {
    pub fn new(seed: RunHit) -> Self {
        Self { hits: vec![seed] }
    }

    pub fn from_hits<I: IntoIterator<Item = RunHit>>(hits: I) -> Self {
        let mut compound = Self { hits: Vec::new() };
        for hit in hits {
            compound.push(hit);
        }
        compound
    }

    /// Add a run; false when it is already present or the set is full.
    pub fn push(&mut self, hit: RunHit) -> bool {
        if self.hits.len() >= MAX_SEGMENTS {
            return false;
        }
        match self.hits.binary_search(&hit) {
            Ok(_) => false,
            Err(at) => {
                self.hits.insert(at, hit);
                true
            }
        }
    }

    pub fn hits(&self) -> &[RunHit] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.hits.len() >= MAX_SEGMENTS
    }

    pub fn contains(&self, hit: &RunHit) -> bool {
        self.hits.binary_search(hit).is_ok()
    }

    pub fn is_subset_of(&self, other: &CompoundHit) -> bool {
        self.hits.iter().all(|h| other.contains(h))
    }

    /// Whether the runs can be written as one multi-block record: one strand,
    /// close together, and no criss-crossing between query and genome order.
    pub fn is_valid_single_record(&self) -> bool {
        let first = match self.hits.first() {
            Some(first) => first,
            None => return false,
        };
        let same_strand_and_close = self.hits.iter().all(|h| {
            h.is_reverse() == first.is_reverse()
                && h.coordinate().abs_diff(first.coordinate()) <= MAX_GAP_FOR_SINGLE_RECORD
        });
        if !same_strand_and_close {
            return false;
        }

        let mut by_coordinate: Vec<&RunHit> = self.hits.iter().collect();
        by_coordinate.sort_by_key(|h| h.coordinate());
        by_coordinate
            .windows(2)
            .all(|w| w[0].position.query_offset() <= w[1].position.query_offset())
    }

    /// Runs ordered by forward query start.
    pub fn by_query_position(&self, query_length: usize) -> Vec<RunHit> {
        let mut ordered = self.hits.clone();
        ordered.sort_by_key(|h| (h.forward_start(query_length), *h));
        ordered
    }

    /// Query bases covered by the union of the runs.
    pub fn bases_covered(&self, query_length: usize) -> usize {
        let mut covered = 0;
        let mut last_stop = 0;
        for hit in self.by_query_position(query_length) {
            let (start, end) = hit.query_extent(query_length);
            let end = end.min(query_length);
            if end > last_stop {
                covered += end - start.max(last_stop);
                last_stop = end;
            }
        }
        covered
    }

    /// Uncovered query stretches long enough to hold another segment.
    pub fn remaining_ranges(&self, query_length: usize) -> Vec<(usize, usize)> {
        if query_length.saturating_sub(self.bases_covered(query_length)) <= MIN_RESIDUAL_RANGE {
            return Vec::new();
        }
        let mut ranges = Vec::new();
        let mut last_stop = 0;
        for hit in self.by_query_position(query_length) {
            let (start, end) = hit.query_extent(query_length);
            if start > last_stop && start - last_stop > MIN_RESIDUAL_RANGE {
                ranges.push((last_stop, start));
            }
            last_stop = last_stop.max(end);
        }
        if query_length > last_stop && query_length - last_stop > MIN_RESIDUAL_RANGE {
            ranges.push((last_stop, query_length));
        }
        ranges
    }
}
