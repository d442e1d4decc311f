//! Small helpers over nucleotide strings.

/// Homopolymer runs at least this long count towards the repeat fraction.
const HOMOPOLYMER_WINDOW: usize = 23;
const MAX_REPEAT_FRACTION: f64 = 0.25;
const IUPAC_CODES: &[u8] = b"ACGTUNRYSWKMBDHV";

pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'a' => b't',
        b't' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        other => other,
    }
}

pub fn reverse_complement(sequence: &str) -> String {
    sequence
        .bytes()
        .rev()
        .map(|b| complement(b) as char)
        .collect()
}

pub fn n_count(sequence: &str) -> usize {
    sequence.bytes().filter(|&b| b == b'N' || b == b'n').count()
}

/// Number of distinct unambiguous bases present.
pub fn complexity(sequence: &str) -> usize {
    let mut seen = [false; 4];
    for b in sequence.bytes() {
        match b.to_ascii_uppercase() {
            b'A' => seen[0] = true,
            b'C' => seen[1] = true,
            b'G' => seen[2] = true,
            b'T' => seen[3] = true,
            _ => {}
        }
    }
    seen.iter().filter(|&&s| s).count()
}

/// Fraction of the sequence covered by long homopolymer runs.
pub fn homopolymer_fraction(sequence: &str) -> f64 {
    let bytes = sequence.as_bytes();
    if bytes.is_empty() {
        return 0.0;
    }
    let mut covered = 0usize;
    let mut run_start = 0usize;
    for i in 1..=bytes.len() {
        if i == bytes.len() || bytes[i] != bytes[run_start] {
            let run = i - run_start;
            if run >= HOMOPOLYMER_WINDOW && bytes[run_start] != b'N' {
                covered += run;
            }
            run_start = i;
        }
    }
    covered as f64 / bytes.len() as f64
}

pub fn is_repetitive(sequence: &str) -> bool {
    homopolymer_fraction(sequence) > MAX_REPEAT_FRACTION
}

/// First character that is not an IUPAC nucleotide code, with its byte offset.
pub fn first_invalid_base(sequence: &str) -> Option<(usize, char)> {
    sequence
        .char_indices()
        .find(|&(_, c)| !c.is_ascii() || !IUPAC_CODES.contains(&(c.to_ascii_uppercase() as u8)))
}
