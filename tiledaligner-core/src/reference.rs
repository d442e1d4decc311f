//! Reference sequence access
//!
//! `ReferenceCache` holds uppercase contig sequences keyed by name. It is
//! filled eagerly from a FASTA file or from in-memory sequences, or lazily one
//! contig at a time on first request. Lookups only take the read lock.

use crate::error::{AlignError, AlignResult};
use crate::types::{GenomeInfo, GenomicPos};
use needletail::{parse_fastx_file, parse_fastx_reader};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub trait ReferenceProvider: Send + Sync {
    /// Forward-strand uppercase bases of `[start, end)`, clamped to the contig end.
    fn get_reference(&self, chromosome: &str, start: GenomicPos, end: GenomicPos) -> AlignResult<String>;
}

/// A named sequence read from FASTA/FASTQ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSequence {
    pub name: String,
    pub sequence: String,
}

/// Read every record of a FASTA/FASTQ file (gzip detected by needletail).
/// Names are cut at the first whitespace and sequences uppercased.
pub fn read_fasta<P: AsRef<Path>>(path: P) -> AlignResult<Vec<NamedSequence>> {
    let mut reader = parse_fastx_file(path.as_ref()).map_err(|e| {
        AlignError::parse(format!("{}: {}", path.as_ref().display(), e))
    })?;
    let mut records = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| AlignError::parse(e.to_string()))?;
        records.push(to_named(record.id(), &record.seq()));
    }
    Ok(records)
}

pub fn read_fasta_from<R: Read + Send>(reader: R) -> AlignResult<Vec<NamedSequence>> {
    let mut fastx = parse_fastx_reader(reader).map_err(|e| AlignError::parse(e.to_string()))?;
    let mut records = Vec::new();
    while let Some(record) = fastx.next() {
        let record = record.map_err(|e| AlignError::parse(e.to_string()))?;
        records.push(to_named(record.id(), &record.seq()));
    }
    Ok(records)
}

fn to_named(id: &[u8], seq: &[u8]) -> NamedSequence {
    let id = String::from_utf8_lossy(id);
    let name = id.split_whitespace().next().unwrap_or_default().to_string();
    let sequence = String::from_utf8_lossy(seq).to_ascii_uppercase();
    NamedSequence { name, sequence }
}

#[derive(Debug, Default)]
struct CacheState {
    order: Vec<String>,
    sequences: HashMap<String, Arc<Vec<u8>>>,
}

impl CacheState {
    fn insert(&mut self, name: String, mut sequence: Vec<u8>) {
        sequence.make_ascii_uppercase();
        if !self.sequences.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.sequences.insert(name, Arc::new(sequence));
    }
}

#[derive(Debug, Default)]
pub struct ReferenceCache {
    source: Option<PathBuf>,
    state: RwLock<CacheState>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sequences<I, S>(sequences: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: Into<String>,
    {
        let mut state = CacheState::default();
        for (name, sequence) in sequences {
            state.insert(name.into(), sequence);
        }
        Self {
            source: None,
            state: RwLock::new(state),
        }
    }

    /// Load every contig of a FASTA file up front.
    pub fn load_all<P: AsRef<Path>>(path: P) -> AlignResult<Self> {
        let records = read_fasta(&path)?;
        log::info!(
            "Loaded {} reference contigs from {}",
            records.len(),
            path.as_ref().display()
        );
        let cache = Self::from_sequences(records.into_iter().map(|r| (r.name, r.sequence.into_bytes())));
        Ok(Self {
            source: Some(path.as_ref().to_path_buf()),
            ..cache
        })
    }

    /// Read contigs from `path` only when first requested.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            source: Some(path.as_ref().to_path_buf()),
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Cached contigs in load order.
    pub fn contigs(&self) -> Vec<(String, Arc<Vec<u8>>)> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .order
            .iter()
            .filter_map(|name| state.sequences.get(name).map(|s| (name.clone(), Arc::clone(s))))
            .collect()
    }

    /// Contig table laying the cached contigs end to end in load order.
    pub fn genome_info(&self) -> GenomeInfo {
        let mut genome = GenomeInfo::new();
        for (name, sequence) in self.contigs() {
            genome.add_contig(name, sequence.len() as GenomicPos);
        }
        genome
    }

    fn sequence(&self, chromosome: &str) -> AlignResult<Arc<Vec<u8>>> {
        {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            if let Some(sequence) = state.sequences.get(chromosome) {
                return Ok(Arc::clone(sequence));
            }
        }

        let path = self
            .source
            .as_ref()
            .ok_or_else(|| AlignError::lookup(format!("unknown chromosome '{}'", chromosome)))?;
        log::debug!("Loading {} from {}", chromosome, path.display());

        let mut reader = parse_fastx_file(path).map_err(|e| AlignError::lookup(e.to_string()))?;
        while let Some(record) = reader.next() {
            let record = record.map_err(|e| AlignError::lookup(e.to_string()))?;
            let named = to_named(record.id(), &record.seq());
            if named.name == chromosome {
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.insert(named.name, named.sequence.into_bytes());
                return state
                    .sequences
                    .get(chromosome)
                    .cloned()
                    .ok_or_else(|| AlignError::lookup(chromosome.to_string()));
            }
        }
        Err(AlignError::lookup(format!(
            "chromosome '{}' not found in {}",
            chromosome,
            path.display()
        )))
    }
}

impl ReferenceProvider for ReferenceCache {
    fn get_reference(&self, chromosome: &str, start: GenomicPos, end: GenomicPos) -> AlignResult<String> {
        let sequence = self.sequence(chromosome)?;
        let end = (end as usize).min(sequence.len());
        let start = (start as usize).min(end);
        Ok(String::from_utf8_lossy(&sequence[start..end]).into_owned())
    }
}
