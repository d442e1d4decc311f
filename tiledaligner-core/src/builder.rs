//! psl record construction
//!
//! Every builder reduces its input to a list of gap-free blocks in
//! strand-oriented query coordinates and contig-local target coordinates,
//! then derives the summary columns from those blocks.

use crate::blat::BlatRecord;
use crate::coords::CoordinateMapper;
use crate::error::AlignResult;
use crate::pairs::CompoundHit;
use crate::record::RunHit;
use crate::sequence::n_count;
use crate::sw::{AlignmentDiff, GAP_BASE};
use crate::types::{ChrPosition, GenomicPos, Strand, MAX_GAP_FOR_SINGLE_RECORD, TILE_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    q_start: u32,
    t_start: GenomicPos,
    length: u32,
    mismatches: u32,
}

impl Block {
    fn q_end(&self) -> u32 {
        self.q_start + self.length
    }

    fn t_end(&self) -> GenomicPos {
        self.t_start + self.length as GenomicPos
    }

    fn is_within(&self, other: &Block) -> bool {
        (self.q_start >= other.q_start && self.q_end() <= other.q_end())
            || (self.t_start >= other.t_start && self.t_end() <= other.t_end())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    matches: u32,
    mismatches: u32,
    n_count: u32,
    q_num_insert: u32,
    q_base_insert: u32,
    t_num_insert: u32,
    t_base_insert: u32,
}

/// Query coordinates of an alignment, kept apart from the target.
struct QuerySide<'a> {
    name: &'a str,
    size: u32,
    strand: Strand,
}

fn forward_extent(strand: Strand, q_size: u32, start: u32, end: u32) -> (u32, u32) {
    if strand.is_reverse() {
        (q_size.saturating_sub(end), q_size.saturating_sub(start))
    } else {
        (start, end)
    }
}

fn build(
    query: &QuerySide<'_>,
    target: &ChrPosition,
    blocks: &[Block],
    first: &Block,
    last: &Block,
    counts: Counts,
) -> BlatRecord {
    let (q_start, q_end) = forward_extent(query.strand, query.size, first.q_start, last.q_end());
    BlatRecord {
        matches: counts.matches,
        mismatches: counts.mismatches,
        rep_matches: 0,
        n_count: counts.n_count,
        q_num_insert: counts.q_num_insert,
        q_base_insert: counts.q_base_insert,
        t_num_insert: counts.t_num_insert,
        t_base_insert: counts.t_base_insert,
        strand: query.strand,
        q_name: query.name.to_string(),
        q_size: query.size,
        q_start,
        q_end,
        t_name: target.chromosome.clone(),
        t_size: target.contig_length,
        t_start: first.t_start,
        t_end: last.t_end(),
        block_sizes: blocks.iter().map(|b| b.length).collect(),
        q_starts: blocks.iter().map(|b| b.q_start).collect(),
        t_starts: blocks.iter().map(|b| b.t_start).collect(),
    }
}

fn finish(query: &QuerySide<'_>, target: &ChrPosition, blocks: &[Block], counts: Counts) -> Option<BlatRecord> {
    let first = blocks.first()?;
    let last = blocks.last()?;
    Some(build(query, target, blocks, first, last, counts))
}

fn single_block(query: &QuerySide<'_>, target: &ChrPosition, block: Block) -> BlatRecord {
    let counts = Counts {
        matches: block.length - block.mismatches,
        mismatches: block.mismatches,
        ..Counts::default()
    };
    build(query, target, &[block], &block, &block, counts)
}

/// Derive counts from ordered blocks. Gap counts are 0/1 flags unless
/// `count_gap_events` asks for one per gap.
fn assemble(
    query: &QuerySide<'_>,
    target: &ChrPosition,
    blocks: &[Block],
    n_count: u32,
    count_gap_events: bool,
) -> Option<BlatRecord> {
    let mut counts = Counts {
        n_count,
        ..Counts::default()
    };
    let total: u32 = blocks.iter().map(|b| b.length).sum();
    counts.mismatches = blocks.iter().map(|b| b.mismatches).sum::<u32>().min(total);
    counts.matches = total - counts.mismatches;

    for pair in blocks.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.q_start > prev.q_end() {
            counts.q_num_insert += 1;
            counts.q_base_insert += cur.q_start - prev.q_end();
        }
        if cur.t_start > prev.t_end() {
            counts.t_num_insert += 1;
            counts.t_base_insert += (cur.t_start - prev.t_end()).min(u32::MAX as GenomicPos) as u32;
        }
    }
    if !count_gap_events {
        counts.q_num_insert = counts.q_num_insert.min(1);
        counts.t_num_insert = counts.t_num_insert.min(1);
    }
    finish(query, target, blocks, counts)
}

/// Resolve overlaps between neighbouring blocks by shortening the larger one,
/// the earlier block on a tie. False when a trim would consume a whole block.
fn trim_overlaps(blocks: &mut [Block]) -> bool {
    for i in 1..blocks.len() {
        let prev = blocks[i - 1];
        let cur = blocks[i];
        let q_overlap = prev.q_end().saturating_sub(cur.q_start) as GenomicPos;
        let t_overlap = prev.t_end().saturating_sub(cur.t_start);
        let overlap = q_overlap.max(t_overlap);
        if overlap == 0 {
            continue;
        }
        if prev.length >= cur.length {
            if overlap >= prev.length as GenomicPos {
                log::debug!("Overlap of {} would erase a {} base block", overlap, prev.length);
                return false;
            }
            let block = &mut blocks[i - 1];
            block.length -= overlap as u32;
            block.mismatches = block.mismatches.min(block.length);
        } else {
            if overlap >= cur.length as GenomicPos {
                log::debug!("Overlap of {} would erase a {} base block", overlap, cur.length);
                return false;
            }
            let block = &mut blocks[i];
            block.q_start += overlap as u32;
            block.t_start += overlap;
            block.length -= overlap as u32;
            block.mismatches = block.mismatches.min(block.length);
        }
    }
    true
}

fn has_nested_block(blocks: &[Block]) -> bool {
    blocks
        .iter()
        .enumerate()
        .any(|(i, a)| blocks.iter().enumerate().any(|(j, b)| i != j && a.is_within(b)))
}

/// Single block covering the whole query at `target.start`.
pub fn perfect_match(name: &str, query_length: usize, strand: Strand, target: &ChrPosition) -> BlatRecord {
    let block = Block {
        q_start: 0,
        t_start: target.start,
        length: query_length as u32,
        mismatches: 0,
    };
    let query = QuerySide {
        name,
        size: query_length as u32,
        strand,
    };
    single_block(&query, target, block)
}

fn hit_block(hit: &RunHit, t_start: GenomicPos) -> Block {
    let length = hit.span() as u32;
    Block {
        q_start: hit.position.query_offset() as u32,
        t_start,
        length,
        mismatches: (hit.key.mismatches() as u32).min(length),
    }
}

/// Single-block record straight from a run's tile count.
pub fn from_run_hit(
    name: &str,
    query_length: usize,
    hit: &RunHit,
    mapper: &dyn CoordinateMapper,
) -> AlignResult<BlatRecord> {
    let target = mapper.to_chr_position(hit.coordinate())?;
    let block = hit_block(hit, target.start);
    let query = QuerySide {
        name,
        size: query_length as u32,
        strand: hit.position.strand(),
    };
    Ok(single_block(&query, &target, block))
}

/// One multi-block record from a compound valid as a single record.
///
/// `None` for degenerate geometry: runs on different contigs, a block nested
/// inside another, or an overlap that would swallow a block.
pub fn from_compound(
    name: &str,
    query_length: usize,
    compound: &CompoundHit,
    mapper: &dyn CoordinateMapper,
) -> AlignResult<Option<BlatRecord>> {
    let first = match compound.hits().first() {
        Some(first) => first,
        None => return Ok(None),
    };
    let strand = first.position.strand();
    let target = mapper.to_chr_position(first.coordinate())?;

    let mut blocks = Vec::with_capacity(compound.len());
    for hit in compound.hits() {
        let position = mapper.to_chr_position(hit.coordinate())?;
        if position.chromosome != target.chromosome || hit.position.strand() != strand {
            log::debug!("Compound spans {} and {}, not a single record", target, position);
            return Ok(None);
        }
        blocks.push(hit_block(hit, position.start));
    }
    blocks.sort_by_key(|b| (b.q_start, b.t_start));

    if has_nested_block(&blocks) {
        log::debug!("Compound for {} has a nested block", name);
        return Ok(None);
    }
    if !trim_overlaps(&mut blocks) {
        return Ok(None);
    }

    let query = QuerySide {
        name,
        size: query_length as u32,
        strand,
    };
    Ok(assemble(&query, &target, &blocks, 0, false))
}

/// Record from a three-line diff of `query` (already strand-oriented)
/// against `window_reference`, the bases of `window`.
pub fn from_sw_diffs(
    name: &str,
    query: &str,
    strand: Strand,
    diff: &AlignmentDiff,
    window: &ChrPosition,
    window_reference: &str,
) -> Option<BlatRecord> {
    if diff.is_empty() {
        return None;
    }
    let aligned_query = diff.aligned_query();
    let aligned_reference = diff.aligned_reference();
    let seq_offset = query.find(&aligned_query)?;
    let t_start = window.start + window_reference.find(&aligned_reference)? as GenomicPos;

    let mut counts = Counts::default();
    let ns = n_count(&aligned_query) as u32;
    counts.matches = diff.match_count() as u32;
    counts.mismatches = diff.mismatch_count() as u32;
    if counts.mismatches > 0 && ns > 0 {
        counts.mismatches = counts.mismatches.saturating_sub(ns);
    }
    counts.n_count = ns;

    let gap = GAP_BASE as u8;
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;
    let (mut q, mut t) = (seq_offset as u32, t_start);
    let (mut in_q_insert, mut in_t_insert) = (false, false);

    for (r, qb) in diff.reference.bytes().zip(diff.query.bytes()) {
        if r == gap || qb == gap {
            blocks.extend(current.take());
            if r == gap {
                counts.q_base_insert += 1;
                if !in_q_insert {
                    counts.q_num_insert += 1;
                }
                in_q_insert = true;
                in_t_insert = false;
                q += 1;
            } else {
                counts.t_base_insert += 1;
                if !in_t_insert {
                    counts.t_num_insert += 1;
                }
                in_t_insert = true;
                in_q_insert = false;
                t += 1;
            }
            continue;
        }
        in_q_insert = false;
        in_t_insert = false;
        match current.as_mut() {
            Some(block) => block.length += 1,
            None => {
                current = Some(Block {
                    q_start: q,
                    t_start: t,
                    length: 1,
                    mismatches: 0,
                })
            }
        }
        q += 1;
        t += 1;
    }
    blocks.extend(current.take());

    let side = QuerySide {
        name,
        size: query.len() as u32,
        strand,
    };
    finish(&side, window, &blocks, counts)
}

/// An exactly matching stretch of query against a reference window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExactSegment {
    pub query_start: usize,
    pub reference_start: usize,
    pub length: usize,
}

/// Chain exact substrings of `query` through `reference` left to right: each
/// segment is anchored on one tile and extended while the bases agree, and
/// the next anchor is searched for downstream of the previous segment.
pub fn exact_segments(reference: &str, query: &str) -> Vec<ExactSegment> {
    let r = reference.as_bytes();
    let q = query.as_bytes();
    let mut segments = Vec::new();
    let mut qi = 0;
    let mut search_from = 0;

    while qi + TILE_LENGTH <= q.len() && search_from < r.len() {
        let anchor = &q[qi..qi + TILE_LENGTH];
        match r[search_from..].windows(TILE_LENGTH).position(|w| w == anchor) {
            Some(relative) => {
                let ri = search_from + relative;
                let mut length = TILE_LENGTH;
                while qi + length < q.len() && ri + length < r.len() && q[qi + length] == r[ri + length] {
                    length += 1;
                }
                segments.push(ExactSegment {
                    query_start: qi,
                    reference_start: ri,
                    length,
                });
                qi += length;
                search_from = ri + length;
            }
            None => qi += 1,
        }
    }
    segments
}

/// Record from chained exact segments, counting every gap.
pub fn from_exact_segments(
    name: &str,
    query_length: usize,
    strand: Strand,
    segments: &[ExactSegment],
    window: &ChrPosition,
) -> Option<BlatRecord> {
    let blocks: Vec<Block> = segments
        .iter()
        .map(|s| Block {
            q_start: s.query_start as u32,
            t_start: window.start + s.reference_start as GenomicPos,
            length: s.length as u32,
            mismatches: 0,
        })
        .collect();
    let query = QuerySide {
        name,
        size: query_length as u32,
        strand,
    };
    assemble(&query, window, &blocks, 0, true)
}

/// Record best explaining query range `[start, end)`: largest overlap less
/// mismatches and query gaps, positive only. `records` run worst to best.
pub fn find_record_in_range(records: &[BlatRecord], start: u32, end: u32) -> Option<&BlatRecord> {
    let mut best: Option<(&BlatRecord, i64)> = None;
    for record in records.iter().rev() {
        let overlap = record.q_end.min(end).saturating_sub(record.q_start.max(start)) as i64;
        let value = overlap - record.mismatches as i64 - record.q_num_insert as i64;
        if value > 0 && best.map_or(true, |(_, v)| value > v) {
            best = Some((record, value));
        }
    }
    best.map(|(record, _)| record)
}

/// Fold single-block records from one locus into one multi-block record.
pub fn merge_records(records: &[&BlatRecord]) -> Option<BlatRecord> {
    let first = *records.first()?;
    if records.iter().any(|r| r.block_count() != 1) {
        return None;
    }
    let compatible = records.iter().all(|a| {
        records.iter().all(|b| {
            a.t_name == b.t_name
                && a.strand == b.strand
                && a.t_start.abs_diff(b.t_start) <= MAX_GAP_FOR_SINGLE_RECORD
        })
    });
    if !compatible {
        return None;
    }

    let mut sorted: Vec<&BlatRecord> = records.to_vec();
    sorted.sort_by_key(|r| (r.t_start, r.q_starts[0]));
    let mut blocks: Vec<Block> = sorted
        .iter()
        .map(|r| Block {
            q_start: r.q_starts[0],
            t_start: r.t_starts[0],
            length: r.block_sizes[0],
            mismatches: r.mismatches,
        })
        .collect();
    if blocks.windows(2).any(|w| w[1].q_start < w[0].q_start) {
        return None;
    }
    if !trim_overlaps(&mut blocks) {
        return None;
    }

    let target = ChrPosition {
        chromosome: first.t_name.clone(),
        start: blocks[0].t_start,
        end: blocks[0].t_start,
        contig_length: first.t_size,
    };
    let query = QuerySide {
        name: &first.q_name,
        size: first.q_size,
        strand: first.strand,
    };
    let n_count = sorted.iter().map(|r| r.n_count).sum();
    assemble(&query, &target, &blocks, n_count, false)
}

/// Query bases covered by the union of the records, and bases covered twice.
pub fn combined_non_overlapping_score(records: &[&BlatRecord]) -> (u32, u32) {
    let mut extents: Vec<(u32, u32)> = records.iter().map(|r| (r.q_start, r.q_end)).collect();
    extents.sort_unstable();
    let (mut coverage, mut overlap, mut last_stop) = (0, 0, 0);
    for (start, end) in extents {
        if start >= last_stop {
            coverage += end - start;
        } else {
            overlap += end.min(last_stop) - start;
            coverage += end.saturating_sub(last_stop);
        }
        last_stop = last_stop.max(end);
    }
    (coverage, overlap)
}

/// Drop records whose target interval overlaps a better one. Input runs
/// worst to best; the survivors keep that order.
pub fn remove_overlapping_records(records: Vec<BlatRecord>) -> Vec<BlatRecord> {
    let mut kept: Vec<BlatRecord> = Vec::with_capacity(records.len());
    for record in records.into_iter().rev() {
        let clashes = kept
            .iter()
            .any(|k| k.overlaps_target(&record) || record.overlaps_target(k));
        if !clashes {
            kept.push(record);
        }
    }
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packed::{PackedLengthMismatch, PackedPosition};
    use crate::types::GenomeInfo;

    fn genome() -> GenomeInfo {
        let mut genome = GenomeInfo::new();
        genome.add_contig("chr1".to_string(), 10_000);
        genome.add_contig("chr2".to_string(), 10_000);
        genome
    }

    fn hit(tiles: u16, mm: u16, coordinate: GenomicPos, offset: u16, reverse: bool) -> RunHit {
        RunHit::new(
            PackedLengthMismatch::new(tiles, mm),
            PackedPosition::new(coordinate, offset, reverse),
        )
    }

    fn window(start: GenomicPos, end: GenomicPos) -> ChrPosition {
        ChrPosition {
            chromosome: "chr1".to_string(),
            start,
            end,
            contig_length: 10_000,
        }
    }

    #[test]
    fn test_perfect_match() {
        let record = perfect_match("q", 50, Strand::Forward, &window(400, 400));
        assert_eq!(record.matches, 50);
        assert_eq!((record.q_start, record.q_end), (0, 50));
        assert_eq!((record.t_start, record.t_end), (400, 450));
        assert_eq!(record.block_count(), 1);
        assert_eq!(record.score(), 50);
    }

    #[test]
    fn test_from_run_hit_strands() {
        let genome = genome();
        let forward = from_run_hit("q", 100, &hit(20, 0, 10_500, 10, false), &genome).unwrap();
        assert_eq!(forward.t_name, "chr2");
        assert_eq!((forward.q_start, forward.q_end), (10, 42));
        assert_eq!((forward.t_start, forward.t_end), (500, 532));

        let reverse = from_run_hit("q", 100, &hit(20, 1, 500, 10, true), &genome).unwrap();
        assert_eq!(reverse.strand, Strand::Reverse);
        assert_eq!((reverse.q_start, reverse.q_end), (58, 90));
        assert_eq!(reverse.q_starts, vec![10]);
        assert_eq!((reverse.matches, reverse.mismatches), (31, 1));
    }

    #[test]
    fn test_compound_two_blocks() {
        let genome = genome();
        let compound = CompoundHit::from_hits([hit(48, 0, 100, 0, false), hit(48, 0, 1200, 60, false)]);
        let record = from_compound("q", 120, &compound, &genome).unwrap().unwrap();
        assert_eq!(record.block_sizes, vec![60, 60]);
        assert_eq!(record.t_starts, vec![100, 1200]);
        assert_eq!(record.q_starts, vec![0, 60]);
        assert_eq!(record.matches, 120);
        assert_eq!((record.t_num_insert, record.t_base_insert), (1, 1040));
        assert_eq!(record.q_num_insert, 0);
        assert_eq!(record.score(), 119);
    }

    #[test]
    fn test_compound_trims_larger_block() {
        let genome = genome();
        // 60 base block then a 50 base block sharing 5 query bases
        let compound = CompoundHit::from_hits([hit(48, 0, 1000, 0, false), hit(38, 0, 5055, 55, false)]);
        let record = from_compound("q", 105, &compound, &genome).unwrap().unwrap();
        assert_eq!(record.block_sizes, vec![55, 50]);
        assert_eq!(record.q_starts, vec![0, 55]);
        assert_eq!(record.matches, 105);
    }

    #[test]
    fn test_compound_nested_block_rejected() {
        let genome = genome();
        let compound = CompoundHit::from_hits([hit(48, 0, 1000, 0, false), hit(20, 0, 1010, 10, false)]);
        assert!(from_compound("q", 60, &compound, &genome).unwrap().is_none());
    }

    #[test]
    fn test_compound_across_contigs_rejected() {
        let genome = genome();
        let compound = CompoundHit::from_hits([hit(48, 0, 9000, 0, false), hit(48, 0, 10_200, 60, false)]);
        assert!(from_compound("q", 120, &compound, &genome).unwrap().is_none());
    }

    #[test]
    fn test_trim_equal_to_block_rejects() {
        // genomic overlap equals the later block's length
        let mut blocks = vec![
            Block { q_start: 0, t_start: 100, length: 20, mismatches: 0 },
            Block { q_start: 25, t_start: 100, length: 20, mismatches: 0 },
        ];
        assert!(!trim_overlaps(&mut blocks));
    }

    #[test]
    fn test_trim_equal_lengths_shortens_earlier_block() {
        let mut blocks = vec![
            Block { q_start: 0, t_start: 100, length: 30, mismatches: 0 },
            Block { q_start: 25, t_start: 1000, length: 30, mismatches: 0 },
        ];
        assert!(trim_overlaps(&mut blocks));
        assert_eq!((blocks[0].q_start, blocks[0].length), (0, 25));
        assert_eq!((blocks[1].q_start, blocks[1].t_start, blocks[1].length), (25, 1000, 30));
    }

    #[test]
    fn test_from_sw_diffs_with_gaps() {
        let window_reference = "TTTTGATTACAGGCAAGTCCATGACGTTTT";
        let diff = AlignmentDiff::new(
            "GATTACAGGCAAGTCCATG--ACG".to_string(),
            "||||||.|||  |||||||  |||".to_string(),
            "GATTACTGGC--GTCCATGTTACG".to_string(),
        );
        let query = "CCGATTACTGGCGTCCATGTTACG";
        let record = from_sw_diffs("q", query, Strand::Forward, &diff, &window(100, 130), window_reference).unwrap();

        assert_eq!(record.matches, 19);
        assert_eq!(record.mismatches, 1);
        assert_eq!((record.q_num_insert, record.q_base_insert), (1, 2));
        assert_eq!((record.t_num_insert, record.t_base_insert), (1, 2));
        assert_eq!(record.block_sizes, vec![10, 7, 3]);
        assert_eq!(record.q_starts, vec![2, 12, 21]);
        assert_eq!(record.t_starts, vec![104, 116, 123]);
        assert_eq!((record.q_start, record.q_end), (2, 24));
        assert_eq!((record.t_start, record.t_end), (104, 126));
    }

    #[test]
    fn test_from_sw_diffs_reverse_query_extent() {
        let diff = AlignmentDiff::perfect("GATTACAGGC");
        let query = "GATTACAGGCAA";
        let record = from_sw_diffs("q", query, Strand::Reverse, &diff, &window(0, 20), "CGATTACAGGCT").unwrap();
        assert_eq!(record.q_starts, vec![0]);
        assert_eq!((record.q_start, record.q_end), (2, 12));
        assert_eq!(record.t_start, 1);
    }

    #[test]
    fn test_exact_segments_skip_multibyte_reference_text() {
        let query = "GATTACAGGCTTACCGATG";
        let reference = format!("TTÄ{}TT", query);
        let segments = exact_segments(&reference, query);
        assert_eq!(segments, vec![ExactSegment { query_start: 0, reference_start: 4, length: 19 }]);
    }

    #[test]
    fn test_exact_segments_chain() {
        let left = "GATTACAGGCTTACCGATGCAAG";
        let right = "TCCATGACGTTAGCCTAGGCATC";
        let reference = format!("{}{}{}", left, "A".repeat(40), right);
        let query = format!("{}{}", left, right);
        let segments = exact_segments(&reference, &query);
        assert_eq!(
            segments,
            vec![
                ExactSegment { query_start: 0, reference_start: 0, length: 23 },
                ExactSegment { query_start: 23, reference_start: 63, length: 23 },
            ]
        );

        let record = from_exact_segments("q", query.len(), Strand::Forward, &segments, &window(1000, 1086)).unwrap();
        assert_eq!(record.t_starts, vec![1000, 1063]);
        assert_eq!((record.t_num_insert, record.t_base_insert), (1, 40));
        assert_eq!(record.q_num_insert, 0);
        assert_eq!(record.matches, 46);
    }

    #[test]
    fn test_find_record_in_range() {
        let mut a = crate::blat::tests::record("q", "chr1", 40, 0, Strand::Forward);
        a.q_start = 0;
        a.q_end = 40;
        let mut b = crate::blat::tests::record("q", "chr1", 30, 2, Strand::Forward);
        b.q_start = 60;
        b.q_end = 92;
        let records = vec![b.clone(), a.clone()];
        assert_eq!(find_record_in_range(&records, 60, 100), Some(&b));
        assert_eq!(find_record_in_range(&records, 30, 50), Some(&a));
        assert_eq!(find_record_in_range(&records, 45, 55), None);
    }

    fn one_block_record(q_start: u32, t_start: GenomicPos, length: u32) -> BlatRecord {
        let mut r = crate::blat::tests::record("q", "chr1", length, 0, Strand::Forward);
        r.q_size = 120;
        r.q_start = q_start;
        r.q_end = q_start + length;
        r.t_start = t_start;
        r.t_end = t_start + length as GenomicPos;
        r.q_starts = vec![q_start];
        r.t_starts = vec![t_start];
        r
    }

    #[test]
    fn test_merge_records_trims_overlap() {
        let first = one_block_record(0, 100, 60);
        let second = one_block_record(55, 1195, 65);
        let merged = merge_records(&[&second, &first]).unwrap();
        assert_eq!(merged.block_sizes, vec![60, 60]);
        assert_eq!(merged.q_starts, vec![0, 60]);
        assert_eq!(merged.t_starts, vec![100, 1200]);
        assert_eq!(merged.matches, 120);
        assert_eq!((merged.q_start, merged.q_end), (0, 120));
        assert_eq!(merged.score(), 119);
    }

    #[test]
    fn test_merge_records_rejects_distant_or_crossed() {
        let first = one_block_record(0, 100, 60);
        let far = one_block_record(60, 700_000, 60);
        assert!(merge_records(&[&first, &far]).is_none());

        let crossed = one_block_record(60, 50, 30);
        let later = one_block_record(0, 400, 50);
        assert!(merge_records(&[&crossed, &later]).is_none());
    }

    #[test]
    fn test_combined_non_overlapping_score() {
        let a = one_block_record(0, 100, 60);
        let b = one_block_record(50, 1000, 40);
        let c = one_block_record(100, 3000, 10);
        assert_eq!(combined_non_overlapping_score(&[&a, &b, &c]), (100, 10));
    }

    #[test]
    fn test_remove_overlapping_records_keeps_best() {
        let mut worse = one_block_record(0, 100, 40);
        worse.mismatches = 3;
        let better = one_block_record(0, 120, 60);
        let elsewhere = one_block_record(0, 5000, 30);
        let kept = remove_overlapping_records(vec![elsewhere.clone(), worse, better.clone()]);
        assert_eq!(kept, vec![elsewhere, better]);
    }
}
