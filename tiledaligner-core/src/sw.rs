//! Smith-Waterman local alignment and its three-line diff.

use bio::alignment::pairwise::{Aligner, MatchParams};
use bio::alignment::AlignmentOperation;

pub const MATCH: char = '|';
pub const MISMATCH: char = '.';
pub const GAP: char = ' ';
pub const GAP_BASE: char = '-';

/// Affine scoring; `gap_open` and `gap_extend` are positive costs and a gap of
/// length k costs `gap_open + (k - 1) * gap_extend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPreset {
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl ScoringPreset {
    pub const LENIENT: ScoringPreset = ScoringPreset {
        match_score: 5,
        mismatch_score: -4,
        gap_open: 16,
        gap_extend: 4,
    };

    pub const STRICT: ScoringPreset = ScoringPreset {
        match_score: 4,
        mismatch_score: -14,
        gap_open: 14,
        gap_extend: 1,
    };
}

/// Aligned reference, markup and aligned query, all the same width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentDiff {
    pub reference: String,
    pub markup: String,
    pub query: String,
}

impl AlignmentDiff {
    pub fn new(reference: String, markup: String, query: String) -> Self {
        Self {
            reference,
            markup,
            query,
        }
    }

    /// Gap-free diff of a sequence against itself.
    pub fn perfect(sequence: &str) -> Self {
        Self {
            reference: sequence.to_string(),
            markup: MATCH.to_string().repeat(sequence.len()),
            query: sequence.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markup.is_empty()
    }

    pub fn match_count(&self) -> usize {
        self.markup.chars().filter(|&c| c == MATCH).count()
    }

    pub fn mismatch_count(&self) -> usize {
        self.markup.chars().filter(|&c| c == MISMATCH).count()
    }

    pub fn gap_column_count(&self) -> usize {
        self.markup.chars().filter(|&c| c == GAP).count()
    }

    /// Runs of consecutive gap columns.
    pub fn gap_block_count(&self) -> usize {
        let mut blocks = 0;
        let mut in_gap = false;
        for c in self.markup.chars() {
            if c == GAP {
                if !in_gap {
                    blocks += 1;
                }
                in_gap = true;
            } else {
                in_gap = false;
            }
        }
        blocks
    }

    pub fn score(&self) -> f64 {
        self.match_count() as f64 - self.mismatch_count() as f64 - 1.5 * self.gap_column_count() as f64
    }

    pub fn aligned_query(&self) -> String {
        self.query.chars().filter(|&c| c != GAP_BASE).collect()
    }

    pub fn aligned_reference(&self) -> String {
        self.reference.chars().filter(|&c| c != GAP_BASE).collect()
    }

    pub(crate) fn prepend(&mut self, reference: &str, markup: &str, query: &str) {
        self.reference.insert_str(0, reference);
        self.markup.insert_str(0, markup);
        self.query.insert_str(0, query);
    }

    pub(crate) fn append(&mut self, reference: &str, markup: &str, query: &str) {
        self.reference.push_str(reference);
        self.markup.push_str(markup);
        self.query.push_str(query);
    }
}

pub trait LocalAligner: Send + Sync {
    fn align(&self, reference: &str, query: &str, preset: &ScoringPreset) -> AlignmentDiff;
}

/// Gotoh affine-gap local alignment via `bio`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmithWatermanGotoh;

impl LocalAligner for SmithWatermanGotoh {
    fn align(&self, reference: &str, query: &str, preset: &ScoringPreset) -> AlignmentDiff {
        let x = reference.as_bytes();
        let y = query.as_bytes();
        if x.is_empty() || y.is_empty() {
            return AlignmentDiff::default();
        }

        let scoring = MatchParams::new(preset.match_score, preset.mismatch_score);
        let mut aligner = Aligner::with_capacity(
            x.len(),
            y.len(),
            -(preset.gap_open - preset.gap_extend),
            -preset.gap_extend,
            scoring,
        );
        let alignment = aligner.local(x, y);

        let width = alignment.operations.len();
        let mut diff = AlignmentDiff {
            reference: String::with_capacity(width),
            markup: String::with_capacity(width),
            query: String::with_capacity(width),
        };
        let (mut xi, mut yi) = (alignment.xstart, alignment.ystart);
        for op in &alignment.operations {
            match op {
                AlignmentOperation::Match | AlignmentOperation::Subst => {
                    diff.reference.push(x[xi] as char);
                    diff.query.push(y[yi] as char);
                    diff.markup.push(if matches!(op, AlignmentOperation::Match) {
                        MATCH
                    } else {
                        MISMATCH
                    });
                    xi += 1;
                    yi += 1;
                }
                AlignmentOperation::Ins => {
                    diff.reference.push(x[xi] as char);
                    diff.markup.push(GAP);
                    diff.query.push(GAP_BASE);
                    xi += 1;
                }
                AlignmentOperation::Del => {
                    diff.reference.push(GAP_BASE);
                    diff.markup.push(GAP);
                    diff.query.push(y[yi] as char);
                    yi += 1;
                }
                AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => {}
            }
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_counts() {
        let diff = AlignmentDiff::new(
            "ACGTAC--GTA".to_string(),
            "||.|||  |||".to_string(),
            "ACCTACTTGTA".to_string(),
        );
        assert_eq!(diff.match_count(), 8);
        assert_eq!(diff.mismatch_count(), 1);
        assert_eq!(diff.gap_block_count(), 1);
        assert_eq!(diff.gap_column_count(), 2);
        assert_eq!(diff.score(), 4.0);
        assert_eq!(diff.aligned_reference(), "ACGTACGTA");
    }

    #[test]
    fn test_sw_exact_substring() {
        let reference = "TTTTTTTTGATTACAGGCTTACCGATGCAAGTTTTTTTT";
        let query = "GATTACAGGCTTACCGATGCAAG";
        let diff = SmithWatermanGotoh.align(reference, query, &ScoringPreset::LENIENT);
        assert_eq!(diff.query, query);
        assert_eq!(diff.reference, query);
        assert_eq!(diff.mismatch_count(), 0);
        assert_eq!(diff.gap_block_count(), 0);
    }

    #[test]
    fn test_sw_single_substitution() {
        let reference = "GATTACAGGCTTACCGATGCAAGTCCATGACG";
        let query = "GATTACAGGCTTACCTATGCAAGTCCATGACG";
        let diff = SmithWatermanGotoh.align(reference, query, &ScoringPreset::LENIENT);
        assert_eq!(diff.mismatch_count(), 1);
        assert_eq!(diff.match_count(), query.len() - 1);
        assert_eq!(diff.markup.find(MISMATCH), Some(15));
    }

    #[test]
    fn test_sw_deletion_in_query() {
        let reference = "GATTACAGGCTTACCGATGCAAGTCCATGACGTTAGCC";
        let query = "GATTACAGGCTTACCGATGCCATGACGTTAGCC";
        let diff = SmithWatermanGotoh.align(reference, query, &ScoringPreset::LENIENT);
        assert_eq!(diff.gap_block_count(), 1);
        assert_eq!(diff.gap_column_count(), 5);
        assert_eq!(diff.aligned_query(), query);
        assert!(diff.query.contains("-----"));
    }

    #[test]
    fn test_empty_input() {
        assert!(SmithWatermanGotoh.align("", "ACGT", &ScoringPreset::STRICT).is_empty());
    }
}
