//! Tile index probing
//!
//! Turns a query into one `TileHits` row per tile start offset.

use crate::index::{TileHits, TileIndex};
use crate::types::{GenomicPos, TILE_LENGTH};

const SUBSTITUTES: [char; 4] = ['A', 'C', 'G', 'T'];

/// Look up every tile of `query` (already uppercase).
///
/// Returns `len - TILE_LENGTH + 1` rows, or none for queries shorter than a tile.
pub fn probe(index: &dyn TileIndex, query: &str) -> Vec<TileHits> {
    if query.len() < TILE_LENGTH {
        return Vec::new();
    }
    (0..=query.len() - TILE_LENGTH)
        .map(|i| probe_tile(index, &query[i..i + TILE_LENGTH]))
        .collect()
}

fn probe_tile(index: &dyn TileIndex, tile: &str) -> TileHits {
    let n_at = match tile.find('N') {
        Some(at) => at,
        None => return index.lookup(tile),
    };

    // Only the first ambiguous base is expanded
    let mut merged: Vec<GenomicPos> = Vec::new();
    for base in SUBSTITUTES {
        let mut variant = String::with_capacity(TILE_LENGTH);
        variant.push_str(&tile[..n_at]);
        variant.push(base);
        variant.push_str(&tile[n_at + 1..]);
        match index.lookup(&variant) {
            TileHits::Frequent => return TileHits::Frequent,
            TileHits::Positions(p) => merged.extend(p),
            TileHits::Absent => {}
        }
    }

    if merged.is_empty() {
        TileHits::Absent
    } else {
        merged.sort_unstable();
        merged.dedup();
        TileHits::Positions(merged)
    }
}

/// Offsets whose tile is flagged frequent.
pub fn frequent_offsets(rows: &[TileHits]) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, r)| r.is_frequent())
        .map(|(i, _)| i)
        .collect()
}

/// Number of consecutive frequent rows at the start of the query.
pub fn leading_frequent_count(rows: &[TileHits]) -> usize {
    rows.iter().take_while(|r| r.is_frequent()).count()
}

/// First-row coordinates whose tiles line up exactly with the last row.
///
/// Each one is a candidate full-length alignment, mismatches permitted in between.
pub fn shortcut_positions(rows: &[TileHits]) -> Vec<GenomicPos> {
    let (first, last) = match (rows.first(), rows.last()) {
        (Some(first), Some(last)) if rows.len() > 1 => (first, last),
        _ => return Vec::new(),
    };
    let span = (rows.len() - 1) as GenomicPos;
    first
        .positions()
        .iter()
        .copied()
        .filter(|&c| last.contains(c + span))
        .collect()
}

/// First-row coordinates with a last-row partner further downstream than an
/// exact run would put it, but no more than `max_gap` bases beyond.
///
/// Returns `(coordinate, reference bases to cover)` pairs.
pub fn split_shortcut_positions(rows: &[TileHits], max_gap: GenomicPos) -> Vec<(GenomicPos, GenomicPos)> {
    let (first, last) = match (rows.first(), rows.last()) {
        (Some(first), Some(last)) if rows.len() > 1 => (first, last),
        _ => return Vec::new(),
    };
    let span = (rows.len() - 1) as GenomicPos;
    let last_positions = last.positions();
    let mut shortcuts = Vec::new();
    for &c in first.positions() {
        let earliest = c + span + 1;
        let at = last_positions.partition_point(|&p| p < earliest);
        if let Some(&partner) = last_positions.get(at) {
            if partner - (c + span) <= max_gap {
                shortcuts.push((c, partner - c + TILE_LENGTH as GenomicPos));
            }
        }
    }
    shortcuts
}
