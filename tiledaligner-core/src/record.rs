//! Per-query run table
//!
//! Built once from the probe rows of both strands and read-only afterwards.

use crate::extend::aggregate_runs;
use crate::index::TileHits;
use crate::packed::{PackedLengthMismatch, PackedPosition};
use crate::types::{GenomicPos, TILE_LENGTH};
use std::collections::BTreeMap;

/// One maximal run: its key and where it sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunHit {
    pub key: PackedLengthMismatch,
    pub position: PackedPosition,
}

impl RunHit {
    pub fn new(key: PackedLengthMismatch, position: PackedPosition) -> Self {
        Self { key, position }
    }

    pub fn tile_count(&self) -> usize {
        self.key.tile_count()
    }

    /// Bases covered by the run.
    pub fn span(&self) -> usize {
        self.key.exact_length()
    }

    pub fn coordinate(&self) -> GenomicPos {
        self.position.coordinate()
    }

    pub fn is_reverse(&self) -> bool {
        self.position.is_reverse()
    }

    pub fn forward_start(&self, query_length: usize) -> usize {
        self.position.forward_start_offset(self.tile_count(), query_length)
    }

    /// `[start, end)` in forward query coordinates.
    pub fn query_extent(&self, query_length: usize) -> (usize, usize) {
        let start = self.forward_start(query_length);
        (start, start + self.span())
    }

    /// `[start, end)` in global genomic coordinates.
    pub fn genomic_extent(&self) -> (GenomicPos, GenomicPos) {
        let start = self.coordinate();
        (start, start + self.span() as GenomicPos)
    }
}

#[derive(Debug, Clone)]
pub struct QueryRunTable {
    sequence: String,
    runs: BTreeMap<PackedLengthMismatch, Vec<PackedPosition>>,
}

impl QueryRunTable {
    pub fn new(sequence: String, runs: BTreeMap<PackedLengthMismatch, Vec<PackedPosition>>) -> Self {
        Self { sequence, runs }
    }

    /// Aggregate the probe rows of the query and of its reverse complement.
    pub fn from_rows(sequence: String, forward: &[TileHits], reverse: &[TileHits]) -> Self {
        let mut runs = BTreeMap::new();
        aggregate_runs(forward, false, &mut runs);
        aggregate_runs(reverse, true, &mut runs);
        Self::new(sequence, runs)
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn query_length(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn runs(&self) -> &BTreeMap<PackedLengthMismatch, Vec<PackedPosition>> {
        &self.runs
    }

    /// Keys from worst to best.
    pub fn ranked_keys(&self) -> Vec<PackedLengthMismatch> {
        self.runs.keys().copied().collect()
    }

    pub fn positions(&self, key: PackedLengthMismatch) -> &[PackedPosition] {
        self.runs.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn best_key(&self) -> Option<PackedLengthMismatch> {
        self.runs.keys().next_back().copied()
    }

    pub fn highest_run(&self) -> Option<RunHit> {
        let (key, positions) = self.runs.iter().next_back()?;
        positions.first().map(|&p| RunHit::new(*key, p))
    }

    /// Runs spanning the whole query without mismatches.
    pub fn perfect_matches(&self) -> Vec<PackedPosition> {
        let full = self.query_length().saturating_sub(TILE_LENGTH - 1);
        self.runs
            .iter()
            .filter(|(k, _)| k.tile_count() == full && k.mismatches() == 0)
            .flat_map(|(_, p)| p.iter().copied())
            .collect()
    }

    pub fn distinct_position_count(&self) -> usize {
        self.runs.values().map(Vec::len).sum()
    }

    /// Whether split search has anything to combine.
    pub fn is_multi_locus(&self) -> bool {
        self.runs.len() > 1 || self.runs.values().next().map_or(false, |p| p.len() > 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(u16, u16, &[PackedPosition])]) -> QueryRunTable {
        let mut runs = BTreeMap::new();
        for &(tiles, mm, positions) in entries {
            runs.insert(PackedLengthMismatch::new(tiles, mm), positions.to_vec());
        }
        QueryRunTable::new("A".repeat(50), runs)
    }

    #[test]
    fn test_highest_run_prefers_fewer_mismatches() {
        let a = PackedPosition::new(100, 0, false);
        let b = PackedPosition::new(900, 2, true);
        let t = table(&[(30, 2, &[a]), (28, 0, &[b])]);

        let best = t.highest_run().unwrap();
        assert_eq!(best.position, b);
        assert_eq!(t.ranked_keys().len(), 2);
        assert_eq!(t.distinct_position_count(), 2);
    }

    #[test]
    fn test_perfect_matches() {
        let a = PackedPosition::new(400, 0, false);
        let t = table(&[(38, 0, &[a]), (20, 0, &[PackedPosition::new(7, 0, false)])]);
        assert_eq!(t.perfect_matches(), vec![a]);
    }

    #[test]
    fn test_multi_locus_gate() {
        let a = PackedPosition::new(1, 0, false);
        let b = PackedPosition::new(2, 0, false);
        assert!(!table(&[(20, 0, &[a])]).is_multi_locus());
        assert!(table(&[(20, 0, &[a, b])]).is_multi_locus());
        assert!(table(&[(20, 0, &[a]), (10, 0, &[b])]).is_multi_locus());
        assert!(!table(&[]).is_multi_locus());
    }

    #[test]
    fn test_run_hit_extents() {
        let hit = RunHit::new(PackedLengthMismatch::new(20, 0), PackedPosition::new(5000, 10, true));
        assert_eq!(hit.span(), 32);
        assert_eq!(hit.query_extent(100), (58, 90));
        assert_eq!(hit.genomic_extent(), (5000, 5032));
    }
}
