//! Per-query alignment pipeline
//!
//! probe both strands -> run table -> perfect match, split search or
//! local-alignment fallback -> range completion -> ranked psl records.

use crate::blat::BlatRecord;
use crate::builder::{
    combined_non_overlapping_score, exact_segments, find_record_in_range, from_compound, from_exact_segments,
    from_run_hit, from_sw_diffs, merge_records, perfect_match, remove_overlapping_records,
};
use crate::coords::CoordinateMapper;
use crate::error::{AlignError, AlignResult};
use crate::fallback::intelligent_sw_diffs;
use crate::index::{TileHits, TileIndex};
use crate::packed::PackedLengthMismatch;
use crate::probe::{frequent_offsets, leading_frequent_count, probe, shortcut_positions, split_shortcut_positions};
use crate::record::{QueryRunTable, RunHit};
use crate::reference::ReferenceProvider;
use crate::sequence::{complexity, first_invalid_base, is_repetitive, n_count, reverse_complement};
use crate::split::find_split_candidates;
use crate::sw::{AlignmentDiff, LocalAligner, SmithWatermanGotoh};
use crate::types::{ChrPosition, GenomicPos, Strand, MIN_BLAT_SCORE, TILE_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extra reference bases either side when confirming a perfect match.
const PERFECT_MATCH_SLACK: GenomicPos = 10;

/// Uncovered query stretches shorter than this are not chased.
const MIN_MISSING_RANGE: u32 = 10;

const MAX_SPLIT_NS: usize = 5;
const MAX_FREQUENT_FRACTION: f64 = 0.1;
const SPLIT_MAX_BEST_FRACTION: f64 = 0.7;
const SPLIT_MIN_BEST_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerParams {
    /// Perfect-match records reported before short-circuiting.
    pub max_perfect_matches: usize,
    /// Reference bases added around a run before local alignment.
    pub sw_buffer: u64,
    /// Mismatches allowed per query base.
    pub mismatch_rate: f64,
    pub max_gap_blocks: usize,
    /// Fraction of the query length a record must score to stop searching.
    pub passing_fraction: f64,
    pub split_accept_fraction: f64,
    pub max_sw_calls: usize,
    pub enable_split_search: bool,
    pub enable_split_shortcut: bool,
    pub max_split_shortcut_gap: u64,
    pub max_split_shortcuts: usize,
}

impl Default for AlignerParams {
    fn default() -> Self {
        Self {
            max_perfect_matches: 5,
            sw_buffer: 60,
            mismatch_rate: 0.1,
            max_gap_blocks: 6,
            passing_fraction: 0.95,
            split_accept_fraction: 0.9,
            max_sw_calls: 80,
            enable_split_search: true,
            enable_split_shortcut: true,
            max_split_shortcut_gap: 500_000,
            max_split_shortcuts: 5,
        }
    }
}

/// Both orientations of the query and their probe rows.
struct Query<'q> {
    name: &'q str,
    forward: String,
    reverse: String,
    forward_rows: Vec<TileHits>,
    reverse_rows: Vec<TileHits>,
}

impl Query<'_> {
    fn len(&self) -> usize {
        self.forward.len()
    }

    fn oriented(&self, strand: Strand) -> &str {
        if strand.is_reverse() {
            &self.reverse
        } else {
            &self.forward
        }
    }

    fn rows(&self, strand: Strand) -> &[TileHits] {
        if strand.is_reverse() {
            &self.reverse_rows
        } else {
            &self.forward_rows
        }
    }
}

enum WindowOutcome {
    Recorded,
    Duplicate,
    NoAlignment,
}

/// Mutable bookkeeping of one fallback pass.
#[derive(Default)]
struct FallbackState {
    records: Vec<BlatRecord>,
    /// Windows already aligned and whether they produced a record.
    windows: HashMap<(String, GenomicPos, GenomicPos, Strand), bool>,
    sw_calls: usize,
}

impl FallbackState {
    fn best_score(&self) -> i64 {
        self.records.iter().map(BlatRecord::score).max().unwrap_or(i64::MIN)
    }
}

/// Turn a reference lookup failure into a dropped candidate.
fn recoverable<T>(result: AlignResult<T>) -> AlignResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AlignError::ReferenceLookupFailed(message)) => {
            log::debug!("Dropping candidate: {}", message);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

pub struct TiledAligner<'a> {
    index: &'a dyn TileIndex,
    reference: &'a dyn ReferenceProvider,
    mapper: &'a dyn CoordinateMapper,
    local_aligner: Box<dyn LocalAligner>,
    params: AlignerParams,
}

impl<'a> TiledAligner<'a> {
    pub fn new(
        index: &'a dyn TileIndex,
        reference: &'a dyn ReferenceProvider,
        mapper: &'a dyn CoordinateMapper,
    ) -> Self {
        Self {
            index,
            reference,
            mapper,
            local_aligner: Box::new(SmithWatermanGotoh),
            params: AlignerParams::default(),
        }
    }

    pub fn with_params(mut self, params: AlignerParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_local_aligner(mut self, aligner: Box<dyn LocalAligner>) -> Self {
        self.local_aligner = aligner;
        self
    }

    pub fn params(&self) -> &AlignerParams {
        &self.params
    }

    /// Align one query; records come back worst to best.
    ///
    /// An empty result means nothing aligned. Queries holding anything but
    /// IUPAC nucleotide codes, and queries shorter than a tile or longer than
    /// the packed offset field, fail with `InvalidInput`.
    pub fn align(&self, name: &str, sequence: &str) -> AlignResult<Vec<BlatRecord>> {
        let forward = sequence.to_ascii_uppercase();
        if let Some((at, base)) = first_invalid_base(&forward) {
            return Err(AlignError::invalid_input(format!(
                "{}: unexpected character {:?} at position {}",
                name, base, at
            )));
        }
        if forward.len() < TILE_LENGTH {
            return Err(AlignError::invalid_input(format!(
                "{}: query of {} bases is shorter than a {} base tile",
                name,
                forward.len(),
                TILE_LENGTH
            )));
        }
        if forward.len() > u16::MAX as usize {
            return Err(AlignError::invalid_input(format!(
                "{}: query of {} bases exceeds the {} base limit",
                name,
                forward.len(),
                u16::MAX
            )));
        }
        if is_repetitive(&forward) {
            log::debug!("{}: skipping homopolymer-dominated query", name);
            return Ok(Vec::new());
        }

        let reverse = reverse_complement(&forward);
        let query = Query {
            name,
            forward_rows: probe(self.index, &forward),
            reverse_rows: probe(self.index, &reverse),
            forward,
            reverse,
        };
        let table = QueryRunTable::from_rows(query.forward.clone(), &query.forward_rows, &query.reverse_rows);
        if table.is_empty() {
            log::debug!("{}: no tile runs", name);
            return Ok(Vec::new());
        }
        log::trace!(
            "{}: {} run keys over {} positions",
            name,
            table.ranked_keys().len(),
            table.distinct_position_count()
        );

        let perfect = self.perfect_matches(&query, &table)?;
        if !perfect.is_empty() {
            log::debug!("{}: {} perfect match(es)", name, perfect.len());
            return Ok(finalize(perfect));
        }

        if self.params.enable_split_search && self.split_worth_trying(&query, &table) {
            if let Some(records) = self.split_records(&query, &table)? {
                log::debug!("{}: accepted split alignment", name);
                return Ok(finalize(records));
            }
        }

        let mut records = self.fallback(&query, &table)?;
        records.sort();
        if let Some(group) = self.complete_ranges(&mut records, query.len()) {
            return Ok(finalize(group));
        }
        Ok(finalize(records))
    }

    fn passing_score(&self, query_length: usize) -> f64 {
        self.params.passing_fraction * query_length as f64
    }

    fn keeps(&self, record: &BlatRecord, query_length: usize) -> bool {
        record.score() > MIN_BLAT_SCORE as i64
            && record.mismatches as f64 <= self.params.mismatch_rate * query_length as f64
            && record.block_count() <= self.params.max_gap_blocks
    }

    fn perfect_matches(&self, query: &Query<'_>, table: &QueryRunTable) -> AlignResult<Vec<BlatRecord>> {
        let len = query.len();
        let distinct = complexity(&query.forward);
        if n_count(&query.forward) > 0 || len <= MIN_BLAT_SCORE || !(distinct == 4 || (distinct >= 2 && len >= 50)) {
            return Ok(Vec::new());
        }

        let tiles = len - TILE_LENGTH + 1;
        let mut records = Vec::new();
        for strand in [Strand::Forward, Strand::Reverse] {
            let leading = leading_frequent_count(query.rows(strand));
            if leading * 2 >= tiles {
                continue;
            }
            let key = PackedLengthMismatch::new((tiles - leading) as u16, 0);
            let oriented = query.oriented(strand);

            for position in table.positions(key).iter().filter(|p| p.strand() == strand) {
                if records.len() >= self.params.max_perfect_matches {
                    return Ok(records);
                }
                let start = match position.coordinate().checked_sub(position.query_offset() as GenomicPos) {
                    Some(start) => start,
                    None => continue,
                };
                let target = match recoverable(self.mapper.to_chr_position(start))? {
                    Some(target) => target,
                    None => continue,
                };
                let window_start = target.start.saturating_sub(PERFECT_MATCH_SLACK);
                let window_end = target.start + len as GenomicPos + PERFECT_MATCH_SLACK;
                let bases = match recoverable(self.reference.get_reference(&target.chromosome, window_start, window_end))? {
                    Some(bases) => bases,
                    None => continue,
                };
                match bases.find(oriented) {
                    Some(at) => {
                        let confirmed = ChrPosition {
                            start: window_start + at as GenomicPos,
                            ..target
                        };
                        records.push(perfect_match(query.name, len, strand, &confirmed));
                    }
                    None => log::debug!("{}: perfect match at {} not confirmed by the reference", query.name, target),
                }
            }
        }
        Ok(records)
    }

    fn split_worth_trying(&self, query: &Query<'_>, table: &QueryRunTable) -> bool {
        let len = query.len() as f64;
        let best = match table.best_key() {
            Some(best) => best.exact_length() as f64,
            None => return false,
        };
        best < SPLIT_MAX_BEST_FRACTION * len
            && best >= SPLIT_MIN_BEST_FRACTION * len
            && (frequent_offsets(&query.forward_rows).len() as f64) < MAX_FREQUENT_FRACTION * len
            && n_count(&query.forward) <= MAX_SPLIT_NS
    }

    fn split_records(&self, query: &Query<'_>, table: &QueryRunTable) -> AlignResult<Option<Vec<BlatRecord>>> {
        let len = query.len();
        let accept = self.params.split_accept_fraction * len as f64;
        let candidates = find_split_candidates(table);

        for compounds in candidates.values().rev() {
            for compound in compounds {
                let records = if compound.is_valid_single_record() {
                    match recoverable(from_compound(query.name, len, compound, self.mapper))? {
                        Some(Some(record)) => vec![record],
                        _ => continue,
                    }
                } else {
                    let mut records = Vec::with_capacity(compound.len());
                    for hit in compound.hits() {
                        if let Some(record) = recoverable(from_run_hit(query.name, len, hit, self.mapper))? {
                            records.push(record);
                        }
                    }
                    records
                };

                if records.iter().any(|r| r.score() as f64 > accept) {
                    return Ok(Some(records));
                }
            }
        }
        Ok(None)
    }

    fn fallback(&self, query: &Query<'_>, table: &QueryRunTable) -> AlignResult<Vec<BlatRecord>> {
        let len = query.len();
        let passing = self.passing_score(len);
        let mut state = FallbackState::default();

        for strand in [Strand::Forward, Strand::Reverse] {
            let shortcuts = shortcut_positions(query.rows(strand));
            for &coordinate in &shortcuts {
                if state.sw_calls >= self.params.max_sw_calls {
                    break;
                }
                if let Some(window) =
                    recoverable(self.mapper.buffered_interval(coordinate, len as GenomicPos, 0, 0))?
                {
                    self.align_window(query, strand, window, &mut state)?;
                }
            }
            if shortcuts.is_empty() && self.params.enable_split_shortcut {
                self.split_shortcuts(query, strand, &mut state)?;
            }
        }

        let mut ranks_after_pass = usize::from(state.best_score() as f64 >= passing);
        for key in table.ranked_keys().into_iter().rev() {
            if state.sw_calls >= self.params.max_sw_calls {
                log::debug!("{}: local alignment budget spent", query.name);
                break;
            }
            for &position in table.positions(key) {
                if state.sw_calls >= self.params.max_sw_calls {
                    break;
                }
                self.align_run(query, RunHit::new(key, position), &mut state)?;
            }
            if state.best_score() as f64 >= passing {
                ranks_after_pass += 1;
                if ranks_after_pass > 1 {
                    break;
                }
            }
        }

        Ok(state.records)
    }

    /// Chain exact segments between a first-row hit and a downstream last-row hit.
    fn split_shortcuts(&self, query: &Query<'_>, strand: Strand, state: &mut FallbackState) -> AlignResult<()> {
        let len = query.len();
        let oriented = query.oriented(strand);
        let candidates = split_shortcut_positions(query.rows(strand), self.params.max_split_shortcut_gap);

        for (coordinate, span) in candidates.into_iter().take(self.params.max_split_shortcuts) {
            let window = match recoverable(self.mapper.buffered_interval(coordinate, span, 0, 0))? {
                Some(window) => window,
                None => continue,
            };
            let bases = match recoverable(self.reference.get_reference(&window.chromosome, window.start, window.end))? {
                Some(bases) => bases,
                None => continue,
            };
            let segments = exact_segments(&bases, oriented);
            match from_exact_segments(query.name, len, strand, &segments, &window) {
                Some(record) if self.keeps(&record, len) => {
                    log::debug!("{}: split shortcut over {} in {} blocks", query.name, window, record.block_count());
                    state.records.push(record);
                }
                _ => log::trace!("{}: split shortcut at {} rejected", query.name, window),
            }
        }
        Ok(())
    }

    fn align_run(&self, query: &Query<'_>, hit: RunHit, state: &mut FallbackState) -> AlignResult<()> {
        let len = query.len();
        let offset = hit.position.query_offset() as usize;
        let span = hit.span();
        let buffer = self.params.sw_buffer;
        let left = if offset == 0 { 0 } else { offset as GenomicPos + buffer };
        let right = if offset + span >= len {
            0
        } else {
            buffer + (len - offset - span) as GenomicPos
        };

        let window = match recoverable(self.mapper.buffered_interval(hit.coordinate(), span as GenomicPos, left, right))? {
            Some(window) => window,
            None => return Ok(()),
        };
        if let WindowOutcome::NoAlignment = self.align_window(query, hit.position.strand(), window, state)? {
            if hit.key.length() > MIN_BLAT_SCORE as i64 {
                if let Some(record) = recoverable(from_run_hit(query.name, len, &hit, self.mapper))? {
                    if self.keeps(&record, len) {
                        state.records.push(record);
                    }
                }
            }
        }
        Ok(())
    }

    fn align_window(
        &self,
        query: &Query<'_>,
        strand: Strand,
        window: ChrPosition,
        state: &mut FallbackState,
    ) -> AlignResult<WindowOutcome> {
        let key = (window.chromosome.clone(), window.start, window.end, strand);
        if let Some(&recorded) = state.windows.get(&key) {
            return Ok(if recorded {
                WindowOutcome::Duplicate
            } else {
                WindowOutcome::NoAlignment
            });
        }
        state.windows.insert(key.clone(), false);
        let bases = match recoverable(self.reference.get_reference(&window.chromosome, window.start, window.end))? {
            Some(bases) => bases,
            None => return Ok(WindowOutcome::NoAlignment),
        };

        let len = query.len();
        let oriented = query.oriented(strand);
        let diff = if bases.contains(oriented) {
            AlignmentDiff::perfect(oriented)
        } else {
            state.sw_calls += 1;
            intelligent_sw_diffs(
                self.local_aligner.as_ref(),
                &bases,
                oriented,
                self.params.mismatch_rate * len as f64,
                self.params.max_gap_blocks,
                None,
            )
        };

        match from_sw_diffs(query.name, oriented, strand, &diff, &window, &bases) {
            Some(record) if self.keeps(&record, len) => {
                state.records.push(record);
                state.windows.insert(key, true);
                Ok(WindowOutcome::Recorded)
            }
            _ => {
                log::trace!("{}: no acceptable alignment in {}", query.name, window);
                Ok(WindowOutcome::NoAlignment)
            }
        }
    }

    /// When the best record falls short, look for records explaining the
    /// uncovered query ranges. A merged record joins `records` if it beats
    /// the best; otherwise a group covering enough of the query is returned.
    fn complete_ranges(&self, records: &mut Vec<BlatRecord>, query_length: usize) -> Option<Vec<BlatRecord>> {
        let best = records.last()?.clone();
        if best.score() as f64 >= self.passing_score(query_length) {
            return None;
        }

        let mut missing = Vec::with_capacity(2);
        if best.q_start >= MIN_MISSING_RANGE {
            missing.push((0, best.q_start));
        }
        let q_size = query_length as u32;
        if q_size.saturating_sub(best.q_end) >= MIN_MISSING_RANGE {
            missing.push((best.q_end, q_size));
        }

        let mut partials: Vec<BlatRecord> = Vec::new();
        for (start, end) in missing {
            if let Some(found) = find_record_in_range(records, start, end) {
                if *found != best && !partials.contains(found) {
                    partials.push(found.clone());
                }
            }
        }
        if partials.is_empty() {
            return None;
        }

        let mut group: Vec<&BlatRecord> = vec![&best];
        group.extend(partials.iter());
        match merge_records(&group) {
            Some(merged) if merged.score() > best.score() => {
                log::debug!("{}: merged {} records into one", best.q_name, group.len());
                records.push(merged);
                None
            }
            Some(_) => None,
            None => {
                let (coverage, overlap) = combined_non_overlapping_score(&group);
                if coverage as f64 > self.passing_score(query_length) && coverage > overlap * 2 {
                    Some(group.into_iter().cloned().collect())
                } else {
                    None
                }
            }
        }
    }
}

/// Minimum score, exact duplicates, target overlaps; sorted worst to best.
fn finalize(records: Vec<BlatRecord>) -> Vec<BlatRecord> {
    let mut records: Vec<BlatRecord> = records
        .into_iter()
        .filter(|r| r.score() > MIN_BLAT_SCORE as i64)
        .collect();
    records.sort();
    records.dedup();
    let mut records = remove_overlapping_records(records);
    records.sort();
    records
}
