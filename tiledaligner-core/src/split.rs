//! Split-alignment search
//!
//! Looks for 2 or 3 runs at different loci that together cover a query no
//! single run explains, such as a contig straddling a structural breakpoint.
//! Seeds come from the top three ranked keys; every seed leaves up to two
//! uncovered query ranges, each filled with the best fitting run of equal or
//! lower rank, and the loop repeats over whatever is still uncovered until the
//! compound is full or nothing fits.

use crate::pairs::CompoundHit;
use crate::packed::PackedLengthMismatch;
use crate::record::{QueryRunTable, RunHit};
use crate::types::{GenomicPos, MIN_RESIDUAL_RANGE, MIN_TILE_COUNT, TILE_LENGTH};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Number of top-ranked keys that may seed a split.
const SEED_KEY_RANKS: usize = 3;

/// Fewest new query bases a third segment must contribute.
const MIN_FILL: usize = 10;

/// Accepted compounds keyed by query bases covered.
pub type SplitCandidates = BTreeMap<usize, BTreeSet<CompoundHit>>;

pub fn find_split_candidates(table: &QueryRunTable) -> SplitCandidates {
    let mut results = SplitCandidates::new();
    if !table.is_multi_locus() {
        return results;
    }

    let query_length = table.query_length();
    let keys = table.ranked_keys();
    let best = match keys.last() {
        Some(&best) => best,
        None => return results,
    };
    if best.length() < (query_length / 4) as i64 {
        log::debug!(
            "Best run ({:?}) too short to seed a split of a {} base query",
            best,
            query_length
        );
        return results;
    }

    let buffer = range_buffer(query_length);
    let lowest_seed = keys.len().saturating_sub(SEED_KEY_RANKS);

    for key_index in (lowest_seed..keys.len()).rev() {
        let key = keys[key_index];
        if key.tile_count() < MIN_TILE_COUNT {
            continue;
        }
        let eligible = &keys[..=key_index];

        for &position in table.positions(key) {
            let seed = RunHit::new(key, position);
            if let Some(compound) = grow_from_seed(table, seed, eligible, buffer) {
                let already_covered = results
                    .values()
                    .flat_map(|set| set.iter())
                    .any(|existing| compound.is_subset_of(existing));
                if already_covered {
                    continue;
                }
                results
                    .entry(compound.bases_covered(query_length))
                    .or_default()
                    .insert(compound);
            }
        }

        if results.contains_key(&query_length) {
            break;
        }
    }

    results
}

/// Slack allowed when fitting a candidate into a residual range.
pub fn range_buffer(query_length: usize) -> usize {
    (query_length as f64 * 0.4) as usize + 1
}

/// Residual ranges either side of a seed's query extent.
pub fn possible_ranges(query_length: usize, start: usize, span: usize) -> Vec<(usize, usize)> {
    let end = start + span;
    let mut ranges = Vec::with_capacity(2);
    if start >= MIN_RESIDUAL_RANGE {
        ranges.push((0, start));
    }
    if end + MIN_RESIDUAL_RANGE < query_length {
        ranges.push((end, query_length));
    }
    ranges
}

fn grow_from_seed(
    table: &QueryRunTable,
    seed: RunHit,
    eligible: &[PackedLengthMismatch],
    buffer: usize,
) -> Option<CompoundHit> {
    let query_length = table.query_length();
    let (seed_start, _) = seed.query_extent(query_length);
    let ranges = possible_ranges(query_length, seed_start, seed.span());
    if ranges.is_empty() {
        return None;
    }

    let candidate_lists: Vec<Vec<RunHit>> = ranges
        .iter()
        .map(|&range| fitting_runs(table, &seed, range, eligible, buffer))
        .collect();
    if candidate_lists.iter().all(Vec::is_empty) {
        return None;
    }

    let mut compound = CompoundHit::new(seed);
    for candidates in &candidate_lists {
        if let Some(&best) = candidates.first() {
            compound.push(best);
        }
    }

    while !compound.is_full() {
        let mut added = false;
        for range in compound.remaining_ranges(query_length) {
            let candidates: Vec<RunHit> = fitting_runs(table, &seed, range, eligible, buffer)
                .into_iter()
                .filter(|c| !compound.contains(c))
                .collect();
            if !candidates.is_empty() && add_best(&mut compound, &candidates, query_length) {
                added = true;
            }
            if compound.is_full() {
                break;
            }
        }
        if !added {
            break;
        }
    }

    Some(compound)
}

/// Add every candidate, best first, that keeps the compound a single record
/// and contributes enough new bases; an already-invalid compound takes the
/// top one only.
fn add_best(compound: &mut CompoundHit, candidates: &[RunHit], query_length: usize) -> bool {
    if !compound.is_valid_single_record() {
        return candidates.first().map_or(false, |&c| compound.push(c));
    }

    let mut added = false;
    for &candidate in candidates {
        if compound.is_full() {
            break;
        }
        let covered = compound.bases_covered(query_length);
        let mut trial = compound.clone();
        if !trial.push(candidate) {
            continue;
        }
        if trial.bases_covered(query_length) >= covered + MIN_FILL && trial.is_valid_single_record() {
            *compound = trial;
            added = true;
        }
    }
    added
}

/// Runs whose query extent fits `range` and whose genomic extent stays clear
/// of the seed, best first.
fn fitting_runs(
    table: &QueryRunTable,
    seed: &RunHit,
    range: (usize, usize),
    eligible: &[PackedLengthMismatch],
    buffer: usize,
) -> Vec<RunHit> {
    let query_length = table.query_length();
    let range_length = range.1 - range.0;
    let (seed_gstart, seed_gend) = seed.genomic_extent();
    let seed_span = seed.span() as GenomicPos;

    let mut fits = Vec::new();
    for &key in eligible {
        let tiles = key.tile_count();
        if tiles < MIN_TILE_COUNT || tiles + TILE_LENGTH - 1 > range_length + buffer {
            continue;
        }
        for &position in table.positions(key) {
            let candidate = RunHit::new(key, position);
            if candidate == *seed {
                continue;
            }
            let (start, end) = candidate.query_extent(query_length);
            if overlap(range.0, range.1, start, end) <= TILE_LENGTH
                || start + buffer < range.0
                || end > range.1 + buffer
            {
                continue;
            }

            let (gstart, gend) = candidate.genomic_extent();
            let genomic_overlap = overlap_u64(seed_gstart, seed_gend, gstart, gend);
            let candidate_span = gend - gstart;
            // A candidate left with a tile or less outside the seed's locus adds nothing
            if genomic_overlap > 0
                && (candidate_span - genomic_overlap.min(candidate_span) <= TILE_LENGTH as GenomicPos
                    || genomic_overlap >= (seed_span / 2).max(candidate_span / 2))
            {
                continue;
            }
            fits.push(candidate);
        }
    }

    fits.sort_by(|a, b| compare_candidates(seed, a, b));
    fits
}

/// Ordering of fill candidates relative to a seed, best first.
fn compare_candidates(seed: &RunHit, a: &RunHit, b: &RunHit) -> Ordering {
    let valid = |c: &RunHit| CompoundHit::from_hits([*seed, *c]).is_valid_single_record();
    let same_strand = |c: &RunHit| c.is_reverse() == seed.is_reverse();
    let distance = |c: &RunHit| c.coordinate().abs_diff(seed.coordinate());

    valid(b)
        .cmp(&valid(a))
        .then_with(|| b.key.net().cmp(&a.key.net()))
        .then_with(|| a.key.mismatches().cmp(&b.key.mismatches()))
        .then_with(|| same_strand(b).cmp(&same_strand(a)))
        .then_with(|| distance(a).cmp(&distance(b)))
        .then_with(|| a.cmp(b))
}

fn overlap(s1: usize, e1: usize, s2: usize, e2: usize) -> usize {
    e1.min(e2).saturating_sub(s1.max(s2))
}

fn overlap_u64(s1: GenomicPos, e1: GenomicPos, s2: GenomicPos, e2: GenomicPos) -> GenomicPos {
    e1.min(e2).saturating_sub(s1.max(s2))
}
