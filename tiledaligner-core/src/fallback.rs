//! Local-alignment fallback
//!
//! Runs the Smith-Waterman aligner under the lenient and strict presets,
//! reclaims query ends the aligner clipped, and keeps a diff only when its
//! mismatch and gap-block counts are under the caller's cutoffs.

use crate::sequence::n_count;
use crate::sw::{AlignmentDiff, LocalAligner, ScoringPreset, MATCH, MISMATCH};

/// Queries with more Ns than this prefer the lenient preset.
const LENIENT_N_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetPreference {
    Lenient,
    Strict,
}

impl PresetPreference {
    fn preset(self) -> ScoringPreset {
        match self {
            PresetPreference::Lenient => ScoringPreset::LENIENT,
            PresetPreference::Strict => ScoringPreset::STRICT,
        }
    }

    fn other(self) -> Self {
        match self {
            PresetPreference::Lenient => PresetPreference::Strict,
            PresetPreference::Strict => PresetPreference::Lenient,
        }
    }
}

/// Both cutoffs are exclusive; `max_mismatches` may be fractional.
pub fn accepts(diff: &AlignmentDiff, max_mismatches: f64, max_gap_blocks: usize) -> bool {
    !diff.is_empty() && (diff.mismatch_count() as f64) < max_mismatches && diff.gap_block_count() < max_gap_blocks
}

/// Best accepted diff of `query` against `reference`, or an empty diff.
///
/// `max_mismatches` is raised by the number of Ns in the query.
pub fn intelligent_sw_diffs(
    aligner: &dyn LocalAligner,
    reference: &str,
    query: &str,
    max_mismatches: f64,
    max_gap_blocks: usize,
    preference: Option<PresetPreference>,
) -> AlignmentDiff {
    let ns = n_count(query);
    let max_mismatches = max_mismatches + ns as f64;
    let preference = preference.or(if ns > LENIENT_N_THRESHOLD {
        Some(PresetPreference::Lenient)
    } else {
        None
    });

    let run = |p: PresetPreference| {
        let diff = aligner.align(reference, query, &p.preset());
        rescue(diff, reference, query)
    };

    match preference {
        None => {
            let lenient = run(PresetPreference::Lenient);
            let strict = run(PresetPreference::Strict);
            match (
                accepts(&lenient, max_mismatches, max_gap_blocks),
                accepts(&strict, max_mismatches, max_gap_blocks),
            ) {
                (true, true) if strict.score() > lenient.score() => strict,
                (true, _) => lenient,
                (false, true) => strict,
                (false, false) => AlignmentDiff::default(),
            }
        }
        Some(preferred) => {
            let first = run(preferred);
            if accepts(&first, max_mismatches, max_gap_blocks) {
                return first;
            }
            log::trace!("{:?} preset rejected, trying {:?}", preferred, preferred.other());
            let second = run(preferred.other());
            if accepts(&second, max_mismatches, max_gap_blocks) {
                second
            } else {
                AlignmentDiff::default()
            }
        }
    }
}

/// Extend a diff over query bases the aligner left off either end, taking
/// the flanking reference bases directly when enough are available.
pub fn rescue(mut diff: AlignmentDiff, reference: &str, query: &str) -> AlignmentDiff {
    if diff.is_empty() {
        return diff;
    }
    let aligned_query = diff.aligned_query();
    if aligned_query.len() >= query.len() {
        return diff;
    }
    let aligned_reference = diff.aligned_reference();
    let (q_at, r_at) = match (query.find(&aligned_query), reference.find(&aligned_reference)) {
        (Some(q), Some(r)) => (q, r),
        _ => return diff,
    };

    if q_at > 0 && r_at >= q_at {
        let q_prefix = &query[..q_at];
        let r_prefix = &reference[r_at - q_at..r_at];
        diff.prepend(r_prefix, &markup(r_prefix, q_prefix), q_prefix);
    }

    let q_end = q_at + aligned_query.len();
    let r_end = r_at + aligned_reference.len();
    let missing = query.len() - q_end;
    if missing > 0 && reference.len() - r_end >= missing {
        let q_suffix = &query[q_end..];
        let r_suffix = &reference[r_end..r_end + missing];
        diff.append(r_suffix, &markup(r_suffix, q_suffix), q_suffix);
    }
    diff
}

fn markup(reference: &str, query: &str) -> String {
    reference
        .bytes()
        .zip(query.bytes())
        .map(|(r, q)| if r == q { MATCH } else { MISMATCH })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hands back a fixed diff per preset and counts calls.
    struct Canned {
        lenient: AlignmentDiff,
        strict: AlignmentDiff,
        calls: AtomicUsize,
    }

    impl Canned {
        fn new(lenient: AlignmentDiff, strict: AlignmentDiff) -> Self {
            Self {
                lenient,
                strict,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LocalAligner for Canned {
        fn align(&self, _reference: &str, _query: &str, preset: &ScoringPreset) -> AlignmentDiff {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if *preset == ScoringPreset::LENIENT {
                self.lenient.clone()
            } else {
                self.strict.clone()
            }
        }
    }

    fn diff(reference: &str, markup: &str, query: &str) -> AlignmentDiff {
        AlignmentDiff::new(reference.to_string(), markup.to_string(), query.to_string())
    }

    #[test]
    fn test_acceptance_cutoff_is_strict() {
        let two_mm = diff("ACGTACGTAC", "|.|||.||||", "AGGTAGGTAC");
        assert!(!accepts(&two_mm, 2.0, 6));
        assert!(accepts(&two_mm, 3.0, 6));

        let gapped = diff("ACG--TACGTAC", "|||  |||||||", "ACGTTTACGTAC");
        assert!(!accepts(&gapped, 5.0, 1));
        assert!(accepts(&gapped, 5.0, 2));
        assert!(!accepts(&AlignmentDiff::default(), 5.0, 5));
    }

    #[test]
    fn test_fractional_cutoff_is_not_truncated() {
        // 10% of a 45 base query allows four mismatches
        let reference = "ACGT".repeat(11) + "A";
        let query = "AGGTAGGTAGGTAGGTACGTACGTACGTACGTACGTACGTACGTA";
        let markup = "|.|||.|||.|||.|||||||||||||||||||||||||||||||";
        let four_mm = diff(&reference, markup, query);
        assert_eq!(four_mm.mismatch_count(), 4);
        assert!(accepts(&four_mm, 0.1 * 45.0, 6));
        assert!(!accepts(&four_mm, 4.0, 6));

        let aligner = Canned::new(four_mm.clone(), AlignmentDiff::default());
        assert_eq!(intelligent_sw_diffs(&aligner, &reference, query, 0.1 * 45.0, 6, None), four_mm);
    }

    #[test]
    fn test_higher_score_wins_without_preference() {
        let query = "ACGTACGTAC";
        let lenient = diff("ACGTACGTAC", "|.|||.||||", query);
        let strict = diff("ACGTACGTAC", "||||||||||", query);
        let aligner = Canned::new(lenient, strict.clone());
        let chosen = intelligent_sw_diffs(&aligner, "ACGTACGTAC", query, 3.0, 6, None);
        assert_eq!(chosen, strict);
        assert_eq!(aligner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tie_goes_to_lenient() {
        let query = "ACGTACGTAC";
        let lenient = diff("ACGTACGTAC", "||||||||.|", query);
        let strict = diff("ACGTACGTAC", "|.||||||||", query);
        let aligner = Canned::new(lenient.clone(), strict);
        assert_eq!(intelligent_sw_diffs(&aligner, "ACGTACGTAC", query, 3.0, 6, None), lenient);
    }

    #[test]
    fn test_preferred_preset_falls_back() {
        let query = "ACGTACGTAC";
        let bad = diff("ACGTACGTAC", "|.|.|.||||", query);
        let good = diff("ACGTACGTAC", "||||||||||", query);
        let aligner = Canned::new(good.clone(), bad);
        let chosen = intelligent_sw_diffs(&aligner, "ACGTACGTAC", query, 2.0, 6, Some(PresetPreference::Strict));
        assert_eq!(chosen, good);
        assert_eq!(aligner.calls.load(Ordering::SeqCst), 2);

        let aligner = Canned::new(good.clone(), good.clone());
        intelligent_sw_diffs(&aligner, "ACGTACGTAC", query, 2.0, 6, Some(PresetPreference::Strict));
        assert_eq!(aligner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nothing_accepted() {
        let query = "ACGTACGTAC";
        let bad = diff("ACGTACGTAC", "|.|.|.||||", query);
        let aligner = Canned::new(bad.clone(), bad);
        assert!(intelligent_sw_diffs(&aligner, "ACGTACGTAC", query, 2.0, 6, None).is_empty());
    }

    #[test]
    fn test_ns_raise_cutoff_and_prefer_lenient() {
        let query = "ACNNNCGTAC";
        let lenient = diff("ACGTACGTAC", "||...|||||", query);
        let strict = diff("ACGTACGTAC", "||||||||||", query);
        let aligner = Canned::new(lenient.clone(), strict);
        let chosen = intelligent_sw_diffs(&aligner, "ACGTACGTAC", query, 1.0, 6, None);
        assert_eq!(chosen, lenient);
        assert_eq!(aligner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rescue_reclaims_both_ends() {
        let reference = "TTGATTACAGGCTTAGG";
        let query = "GATTACAGGCTTACC";
        let clipped = diff("TTACAGGCTTA", "|||||||||||", "TTACAGGCTTA");
        let rescued = rescue(clipped, reference, query);
        assert_eq!(rescued.aligned_query(), query);
        assert_eq!(rescued.reference, "GATTACAGGCTTAGG");
        assert_eq!(rescued.markup, "|||||||||||||..");
    }

    #[test]
    fn test_rescue_needs_reference_room() {
        let reference = "ATTACAGG";
        let query = "GATTACAGG";
        let clipped = diff("ATTACAGG", "||||||||", "ATTACAGG");
        let rescued = rescue(clipped.clone(), reference, query);
        assert_eq!(rescued, clipped);
    }
}
