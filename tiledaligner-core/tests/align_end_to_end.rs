use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tiledaligner_core::sequence::reverse_complement;
use tiledaligner_core::{BlatRecord, InMemoryTileIndex, ReferenceCache, Strand, TiledAligner};

fn random_reference(length: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..length).map(|_| b"ACGT"[rng.gen_range(0..4)] as char).collect()
}

struct Genome {
    reference: String,
    index: InMemoryTileIndex,
    cache: ReferenceCache,
}

/// Junction bases pinned so the runs either side of each breakpoint used
/// below cannot extend across it.
const JUNCTIONS: [(usize, u8); 8] = [
    (159, b'A'),
    (1199, b'C'),
    (160, b'G'),
    (1260, b'T'),
    (559, b'A'),
    (569, b'C'),
    (560, b'G'),
    (570, b'T'),
];

fn genome(length: usize) -> Genome {
    let mut bases = random_reference(length, 42).into_bytes();
    for &(at, base) in JUNCTIONS.iter().filter(|(at, _)| *at < length) {
        bases[at] = base;
    }
    let reference = String::from_utf8(bases).unwrap();
    let index = InMemoryTileIndex::from_contigs(vec![("chr1", reference.as_bytes())], 100);
    let cache = ReferenceCache::from_sequences(vec![("chr1", reference.as_bytes().to_vec())]);
    Genome { reference, index, cache }
}

fn align(genome: &Genome, name: &str, query: &str) -> Vec<BlatRecord> {
    let aligner = TiledAligner::new(&genome.index, &genome.cache, genome.index.genome());
    aligner.align(name, query).expect("alignment")
}

fn substitute(sequence: &str, at: usize) -> String {
    let mut bytes = sequence.as_bytes().to_vec();
    bytes[at] = match bytes[at] {
        b'A' => b'C',
        b'C' => b'G',
        b'G' => b'T',
        _ => b'A',
    };
    String::from_utf8(bytes).unwrap()
}

#[test]
fn perfect_match_single_record() {
    let g = genome(1000);
    let query = &g.reference[400..450];
    let records = align(&g, "perfect", query);

    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.matches, 50);
    assert_eq!(r.mismatches, 0);
    assert_eq!(r.block_count(), 1);
    assert_eq!(r.score(), 50);
    assert_eq!(r.t_name, "chr1");
    assert_eq!((r.t_start, r.t_end), (400, 450));
    assert_eq!(r.strand, Strand::Forward);
}

#[test]
fn perfect_match_reverse_strand() {
    let g = genome(1000);
    let query = reverse_complement(&g.reference[600..680]);
    let records = align(&g, "minus", &query);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].strand, Strand::Reverse);
    assert_eq!((records[0].t_start, records[0].t_end), (600, 680));
    assert_eq!(records[0].score(), 80);
}

#[test]
fn single_mismatch_through_local_alignment() {
    let g = genome(1000);
    let query = substitute(&g.reference[300..400], 50);
    let records = align(&g, "snp", &query);

    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.matches, 99);
    assert_eq!(r.mismatches, 1);
    assert_eq!(r.block_count(), 1);
    assert_eq!((r.t_start, r.t_end), (300, 400));
    assert_eq!((r.q_start, r.q_end), (0, 100));
}

#[test]
fn split_alignment_two_loci() {
    let g = genome(2000);
    let query = format!("{}{}", &g.reference[100..160], &g.reference[1200..1260]);
    let records = align(&g, "split", &query);

    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.block_sizes, vec![60, 60]);
    assert_eq!(r.q_starts, vec![0, 60]);
    assert_eq!(r.t_starts, vec![100, 1200]);
    assert_eq!(r.matches, 120);
    assert_eq!((r.t_num_insert, r.t_base_insert), (1, 1040));
    assert_eq!(r.score(), 119);
}

#[test]
fn short_deletion_becomes_target_gap() {
    let g = genome(2000);
    let query = format!("{}{}", &g.reference[500..560], &g.reference[570..630]);
    let records = align(&g, "deletion", &query);

    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.t_starts, vec![500, 570]);
    assert_eq!(r.t_base_insert, 10);
    assert_eq!(r.q_base_insert, 0);
    assert_eq!(r.matches, 120);
}

#[test]
fn unrelated_query_has_no_records() {
    let g = genome(1000);
    let query = random_reference(80, 7);
    assert!(align(&g, "nothing", &query).is_empty());
}

#[test]
fn repeated_alignment_is_identical() {
    let g = genome(2000);
    let query = format!("{}{}", &g.reference[100..160], &g.reference[1200..1260]);
    let snp = substitute(&g.reference[300..400], 50);

    for q in [query.as_str(), snp.as_str()] {
        let first = align(&g, "q", q);
        let second = align(&g, "q", q);
        assert_eq!(first, second);
    }
}

#[test]
fn psl_line_parses_back() {
    let g = genome(2000);
    let query = format!("{}{}", &g.reference[100..160], &g.reference[1200..1260]);
    let record = align(&g, "split", &query).pop().unwrap();

    let line = record.to_string();
    assert_eq!(line.split('\t').count(), 21);
    let parsed: BlatRecord = line.parse().unwrap();
    assert_eq!(parsed, record);
}
