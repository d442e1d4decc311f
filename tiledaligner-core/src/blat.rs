//! BLAT/psl alignment records
//!
//! A record carries the 21 psl columns in the standard order:
//! matches, misMatches, repMatches, nCount, qNumInsert, qBaseInsert,
//! tNumInsert, tBaseInsert, strand, qName, qSize, qStart, qEnd, tName, tSize,
//! tStart, tEnd, blockCount, blockSizes, qStarts, tStarts.
//!
//! Coordinates are 0-based half-open. For `-` strand records `q_start`/`q_end`
//! are forward-strand coordinates while `q_starts` are given on the reverse
//! complement, as psl does.

use crate::error::{AlignError, AlignResult};
use crate::types::{GenomicPos, Strand};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const FIELD_COUNT: usize = 21;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlatRecord {
    pub matches: u32,
    pub mismatches: u32,
    pub rep_matches: u32,
    pub n_count: u32,
    pub q_num_insert: u32,
    pub q_base_insert: u32,
    pub t_num_insert: u32,
    pub t_base_insert: u32,
    pub strand: Strand,
    pub q_name: String,
    pub q_size: u32,
    pub q_start: u32,
    pub q_end: u32,
    pub t_name: String,
    pub t_size: GenomicPos,
    pub t_start: GenomicPos,
    pub t_end: GenomicPos,
    pub block_sizes: Vec<u32>,
    pub q_starts: Vec<u32>,
    pub t_starts: Vec<GenomicPos>,
}

impl BlatRecord {
    /// Ranking score: matches less mismatches and one point per gap.
    pub fn score(&self) -> i64 {
        self.matches as i64
            - self.mismatches as i64
            - self.q_num_insert as i64
            - self.t_num_insert as i64
    }

    pub fn block_count(&self) -> usize {
        self.block_sizes.len()
    }

    /// Target intervals overlap on the same contig.
    pub fn overlaps_target(&self, other: &BlatRecord) -> bool {
        self.t_name == other.t_name
            && ((other.t_start >= self.t_start && other.t_start < self.t_end)
                || (other.t_end > self.t_start && other.t_end <= self.t_end))
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        (self.t_start, self.t_end, self.q_start, self.q_end, self.mismatches)
            .cmp(&(other.t_start, other.t_end, other.q_start, other.q_end, other.mismatches))
            .then_with(|| {
                (self.q_num_insert, self.q_base_insert, self.t_num_insert, self.t_base_insert)
                    .cmp(&(other.q_num_insert, other.q_base_insert, other.t_num_insert, other.t_base_insert))
            })
            .then_with(|| {
                (self.rep_matches, self.n_count, self.q_size, self.t_size)
                    .cmp(&(other.rep_matches, other.n_count, other.q_size, other.t_size))
            })
            .then_with(|| self.block_sizes.cmp(&other.block_sizes))
            .then_with(|| self.q_starts.cmp(&other.q_starts))
            .then_with(|| self.t_starts.cmp(&other.t_starts))
    }
}

/// Query name, then score, then `+` above `-`, then target name and match
/// count with lower values ranked higher; every remaining field breaks ties.
impl Ord for BlatRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        let strand_rank = |s: Strand| if s == Strand::Forward { 1 } else { 0 };
        self.q_name
            .cmp(&other.q_name)
            .then_with(|| self.score().cmp(&other.score()))
            .then_with(|| strand_rank(self.strand).cmp(&strand_rank(other.strand)))
            .then_with(|| other.t_name.cmp(&self.t_name))
            .then_with(|| other.matches.cmp(&self.matches))
            .then_with(|| self.tie_break(other))
    }
}

impl PartialOrd for BlatRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

impl fmt::Display for BlatRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.matches,
            self.mismatches,
            self.rep_matches,
            self.n_count,
            self.q_num_insert,
            self.q_base_insert,
            self.t_num_insert,
            self.t_base_insert,
            self.strand,
            self.q_name,
            self.q_size,
            self.q_start,
            self.q_end,
            self.t_name,
            self.t_size,
            self.t_start,
            self.t_end,
            self.block_count(),
            join(&self.block_sizes),
            join(&self.q_starts),
            join(&self.t_starts),
        )
    }
}

fn parse_field<T: FromStr>(fields: &[&str], i: usize) -> AlignResult<T> {
    fields[i]
        .parse()
        .map_err(|_| AlignError::parse(format!("psl column {}: invalid value '{}'", i + 1, fields[i])))
}

fn parse_list<T: FromStr>(field: &str, column: usize) -> AlignResult<Vec<T>> {
    field
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| AlignError::parse(format!("psl column {}: invalid value '{}'", column, s)))
        })
        .collect()
}

impl FromStr for BlatRecord {
    type Err = AlignError;

    fn from_str(line: &str) -> AlignResult<Self> {
        let fields: Vec<&str> = line.trim_end_matches(['\n', '\r']).split('\t').collect();
        if fields.len() != FIELD_COUNT {
            return Err(AlignError::parse(format!(
                "expected {} psl columns, found {}",
                FIELD_COUNT,
                fields.len()
            )));
        }
        let strand = fields[8]
            .chars()
            .next()
            .and_then(|c| Strand::try_from(c).ok())
            .ok_or_else(|| AlignError::parse(format!("invalid strand '{}'", fields[8])))?;

        let record = BlatRecord {
            matches: parse_field(&fields, 0)?,
            mismatches: parse_field(&fields, 1)?,
            rep_matches: parse_field(&fields, 2)?,
            n_count: parse_field(&fields, 3)?,
            q_num_insert: parse_field(&fields, 4)?,
            q_base_insert: parse_field(&fields, 5)?,
            t_num_insert: parse_field(&fields, 6)?,
            t_base_insert: parse_field(&fields, 7)?,
            strand,
            q_name: fields[9].to_string(),
            q_size: parse_field(&fields, 10)?,
            q_start: parse_field(&fields, 11)?,
            q_end: parse_field(&fields, 12)?,
            t_name: fields[13].to_string(),
            t_size: parse_field(&fields, 14)?,
            t_start: parse_field(&fields, 15)?,
            t_end: parse_field(&fields, 16)?,
            block_sizes: parse_list(fields[18], 19)?,
            q_starts: parse_list(fields[19], 20)?,
            t_starts: parse_list(fields[20], 21)?,
        };

        let block_count: usize = parse_field(&fields, 17)?;
        if record.block_sizes.len() != block_count
            || record.q_starts.len() != block_count
            || record.t_starts.len() != block_count
        {
            return Err(AlignError::parse(format!(
                "block count {} does not match block lists",
                block_count
            )));
        }
        Ok(record)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(name: &str, t_name: &str, matches: u32, mismatches: u32, strand: Strand) -> BlatRecord {
        BlatRecord {
            matches,
            mismatches,
            rep_matches: 0,
            n_count: 0,
            q_num_insert: 0,
            q_base_insert: 0,
            t_num_insert: 0,
            t_base_insert: 0,
            strand,
            q_name: name.to_string(),
            q_size: matches + mismatches,
            q_start: 0,
            q_end: matches + mismatches,
            t_name: t_name.to_string(),
            t_size: 10_000,
            t_start: 100,
            t_end: 100 + (matches + mismatches) as GenomicPos,
            block_sizes: vec![matches + mismatches],
            q_starts: vec![0],
            t_starts: vec![100],
        }
    }

    #[test]
    fn test_score_counts_gap_events() {
        let mut r = record("q", "chr1", 90, 3, Strand::Forward);
        r.q_num_insert = 1;
        r.q_base_insert = 12;
        r.t_num_insert = 2;
        assert_eq!(r.score(), 84);
    }

    #[test]
    fn test_display_column_order() {
        let mut r = record("read1", "chr7", 48, 2, Strand::Reverse);
        r.block_sizes = vec![20, 30];
        r.q_starts = vec![0, 20];
        r.t_starts = vec![100, 150];
        assert_eq!(
            r.to_string(),
            "48\t2\t0\t0\t0\t0\t0\t0\t-\tread1\t50\t0\t50\tchr7\t10000\t100\t150\t2\t20,30\t0,20\t100,150"
        );
    }

    #[test]
    fn test_parse_display_output() {
        let r = record("read1", "chr7", 48, 2, Strand::Reverse);
        let parsed: BlatRecord = r.to_string().parse().unwrap();
        assert_eq!(parsed, r);

        assert!("1\t2\t3".parse::<BlatRecord>().is_err());
    }

    #[test]
    fn test_ordering() {
        let low = record("q", "chr1", 50, 5, Strand::Forward);
        let high = record("q", "chr1", 60, 0, Strand::Forward);
        assert!(low < high);

        let minus = record("q", "chr1", 60, 0, Strand::Reverse);
        assert!(minus < high);

        let other_name = record("p", "chr1", 100, 0, Strand::Forward);
        assert!(other_name < low);

        let chr2 = record("q", "chr2", 60, 0, Strand::Forward);
        assert!(chr2 < high);
    }

    #[test]
    fn test_target_overlap() {
        let a = record("q", "chr1", 50, 0, Strand::Forward);
        let mut b = record("q", "chr1", 50, 0, Strand::Forward);
        b.t_start = 140;
        b.t_end = 190;
        assert!(a.overlaps_target(&b));
        b.t_start = 150;
        b.t_end = 200;
        assert!(!a.overlaps_target(&b));
        b.t_name = "chr2".to_string();
        b.t_start = 120;
        assert!(!a.overlaps_target(&b));
    }
}
