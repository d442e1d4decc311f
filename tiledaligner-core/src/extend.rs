//! Run extension over probed tile rows
//!
//! Starting from one seed tile hit, walk forward one tile at a time as long as
//! each next tile hits the next genomic coordinate. A single substituted base
//! knocks out exactly `TILE_LENGTH` consecutive tiles, so when the next tile
//! misses we look `TILE_LENGTH` rows ahead for the coordinate that would line
//! up after the substitution and charge one mismatch if it does. Frequent
//! tiles carry no position information and neither extend nor end a run.

use crate::index::TileHits;
use crate::packed::{PackedLengthMismatch, PackedPosition};
use crate::types::{GenomicPos, TILE_LENGTH};
use std::collections::{BTreeMap, HashMap};

/// Runs of this many tiles or fewer are noise.
const MIN_RECORDED_TILES: usize = 5;

/// Extend the run seeded at row `seed_row`, genomic coordinate `coordinate`.
pub fn extend(rows: &[TileHits], seed_row: usize, coordinate: GenomicPos) -> PackedLengthMismatch {
    let start = seed_row + 1;
    let len = rows.len();
    let mut tally = 1usize;
    let mut common = 0usize;
    let mut mismatches = 0usize;

    let mut i = 0usize;
    while start + i < len {
        let expected = coordinate + i as GenomicPos + 1;
        let hits = &rows[start + i];
        if hits.is_frequent() {
            common += 1;
        } else if hits.contains(expected) {
            tally += 1;
            if common > 0 {
                tally += common;
                common = 0;
            }
        } else {
            let skip_row = start + i + TILE_LENGTH;
            let skip_coordinate = expected + TILE_LENGTH as GenomicPos;
            if skip_row < len {
                let after_skip = &rows[skip_row];
                if after_skip.contains(skip_coordinate) {
                    i += TILE_LENGTH + 1;
                    tally += TILE_LENGTH + 1;
                    mismatches += 1;
                    continue;
                }
                // A frequent tile straight after the substitution is tolerated
                if after_skip.is_frequent()
                    && skip_row + 1 < len
                    && rows[skip_row + 1].contains(skip_coordinate + 1)
                {
                    common += 1;
                    i += TILE_LENGTH + 2;
                    tally += TILE_LENGTH + 1;
                    mismatches += 1;
                    continue;
                }
            }
            break;
        }
        i += 1;
    }

    if common > 0 && tally > common {
        tally += common;
    }

    PackedLengthMismatch::new(clamp_u16(tally), clamp_u16(mismatches))
}

fn clamp_u16(value: usize) -> u16 {
    value.min(u16::MAX as usize) as u16
}

/// Extend from every non-frequent hit and group the maximal runs by key.
///
/// A run is dropped when an equivalent run starting closer to its true origin
/// has already been recorded.
pub fn aggregate_runs(
    rows: &[TileHits],
    reverse: bool,
    runs: &mut BTreeMap<PackedLengthMismatch, Vec<PackedPosition>>,
) {
    let mut recorded: HashMap<GenomicPos, usize> = HashMap::new();

    for (row, hits) in rows.iter().enumerate().take(rows.len().saturating_sub(1)) {
        for &coordinate in hits.positions() {
            let key = extend(rows, row, coordinate);
            let tiles = key.tile_count();
            if tiles <= MIN_RECORDED_TILES {
                continue;
            }

            let already_represented = (0..=row).any(|z| {
                coordinate
                    .checked_sub(z as GenomicPos)
                    .and_then(|c| recorded.get(&c))
                    .map_or(false, |&seen| seen >= tiles + z)
            });
            if already_represented {
                continue;
            }

            runs.entry(key)
                .or_default()
                .push(PackedPosition::new(coordinate, row as u16, reverse));
            recorded.insert(coordinate, tiles);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rows for a query aligning exactly to `start..` with `len` tiles.
    fn contiguous_rows(start: GenomicPos, len: usize) -> Vec<TileHits> {
        (0..len)
            .map(|i| TileHits::Positions(vec![start + i as GenomicPos]))
            .collect()
    }

    #[test]
    fn test_extend_contiguous_run() {
        let rows = contiguous_rows(1000, 40);
        let key = extend(&rows, 0, 1000);
        assert_eq!(key.tile_count(), 40);
        assert_eq!(key.mismatches(), 0);
    }

    #[test]
    fn test_extend_over_single_substitution() {
        // 100 base query, base 60 substituted: tiles 48..=60 miss
        let mut rows = contiguous_rows(5000, 88);
        for row in rows.iter_mut().take(61).skip(48) {
            *row = TileHits::Absent;
        }
        rows[50] = TileHits::Positions(vec![77]);

        let key = extend(&rows, 0, 5000);
        assert_eq!(key.tile_count(), 88);
        assert_eq!(key.mismatches(), 1);
    }

    #[test]
    fn test_extend_stops_at_unresolvable_gap() {
        let mut rows = contiguous_rows(200, 30);
        rows[10] = TileHits::Positions(vec![9999]);
        rows[23] = TileHits::Positions(vec![9999]);
        let key = extend(&rows, 0, 200);
        assert_eq!(key.tile_count(), 10);
        assert_eq!(key.mismatches(), 0);
    }

    #[test]
    fn test_extend_folds_frequent_rows() {
        let mut rows = contiguous_rows(300, 20);
        rows[4] = TileHits::Frequent;
        rows[5] = TileHits::Frequent;
        let key = extend(&rows, 0, 300);
        assert_eq!(key.tile_count(), 20);
    }

    #[test]
    fn test_extend_monotone_in_supporting_hits() {
        let mut sparse = contiguous_rows(0, 30);
        sparse[15] = TileHits::Positions(vec![12345]);
        let mut dense = sparse.clone();
        dense[15] = TileHits::Positions(vec![15, 12345]);

        let narrow = extend(&sparse, 0, 0).tile_count();
        let wide = extend(&dense, 0, 0).tile_count();
        assert!(wide >= narrow);
        assert_eq!(wide, 30);
    }

    #[test]
    fn test_aggregate_keeps_one_run_per_locus() {
        let rows = contiguous_rows(1000, 38);
        let mut runs = BTreeMap::new();
        aggregate_runs(&rows, false, &mut runs);

        assert_eq!(runs.len(), 1);
        let (key, positions) = runs.iter().next().unwrap();
        assert_eq!(key.tile_count(), 38);
        assert_eq!(positions, &vec![PackedPosition::new(1000, 0, false)]);
    }

    #[test]
    fn test_aggregate_tags_reverse_hits() {
        let rows = contiguous_rows(50, 12);
        let mut runs = BTreeMap::new();
        aggregate_runs(&rows, true, &mut runs);
        let position = runs.values().next().unwrap()[0];
        assert!(position.is_reverse());
        assert_eq!(position.coordinate(), 50);
    }

    #[test]
    fn test_aggregate_drops_short_runs() {
        let rows = contiguous_rows(50, 5);
        let mut runs = BTreeMap::new();
        aggregate_runs(&rows, false, &mut runs);
        assert!(runs.is_empty());
    }
}
