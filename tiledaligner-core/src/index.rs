//! Genome tile index
//!
//! Maps every 13-base tile of the reference to the global coordinates where it
//! occurs, or flags it as too frequent to be useful. The on-disk form is a text
//! file (optionally gzip-compressed):
//!
//! ```text
//! ##chr1:249250621:0
//! ##chr2:243199373:249250621
//! ACGTACGTACGTA	1034,99812,2500001
//! AAAAAAAAAAAAA	C1843112
//! ```
//!
//! Header lines give `contig:length:globalOffset`; data lines give the tile and
//! either a comma-separated coordinate list or `C<count>` for frequent tiles.

use crate::error::{AlignError, AlignResult};
use crate::types::{GenomeInfo, GenomicPos, TILE_LENGTH};
use flate2::read::GzDecoder;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Result of looking up one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileHits {
    Absent,
    Frequent,
    /// Sorted global coordinates
    Positions(Vec<GenomicPos>),
}

impl TileHits {
    pub fn is_frequent(&self) -> bool {
        matches!(self, TileHits::Frequent)
    }

    pub fn contains(&self, coordinate: GenomicPos) -> bool {
        match self {
            TileHits::Positions(p) => p.binary_search(&coordinate).is_ok(),
            _ => false,
        }
    }

    pub fn positions(&self) -> &[GenomicPos] {
        match self {
            TileHits::Positions(p) => p,
            _ => &[],
        }
    }
}

/// Read-only tile lookup shared across concurrent queries.
pub trait TileIndex: Send + Sync {
    fn lookup(&self, tile: &str) -> TileHits;
}

/// 2-bit packing of an ACGT tile; `None` for ambiguous bases.
pub fn encode_tile(tile: &[u8]) -> Option<u32> {
    if tile.len() != TILE_LENGTH {
        return None;
    }
    let mut key = 0u32;
    for (i, &b) in tile.iter().enumerate() {
        let code = match b.to_ascii_uppercase() {
            b'A' => 0,
            b'C' => 1,
            b'G' => 2,
            b'T' => 3,
            _ => return None,
        };
        key |= code << (2 * i);
    }
    Some(key)
}

#[derive(Debug, Clone)]
enum TileEntry {
    Frequent(u64),
    Positions(Vec<GenomicPos>),
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTileIndex {
    tiles: HashMap<u32, TileEntry>,
    genome: GenomeInfo,
}

impl InMemoryTileIndex {
    pub fn new(genome: GenomeInfo) -> Self {
        Self {
            tiles: HashMap::new(),
            genome,
        }
    }

    /// Index the forward strand of small references held in memory.
    ///
    /// Contigs are laid out end to end from global coordinate 0. Tiles seen more
    /// than `frequent_threshold` times are collapsed to frequent.
    pub fn from_contigs<'a, I>(contigs: I, frequent_threshold: usize) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut index = Self::default();
        for (name, sequence) in contigs {
            index.genome.add_contig(name.to_string(), sequence.len() as GenomicPos);
            let offset = index.genome.contigs.last().map(|c| c.offset).unwrap_or(0);
            if sequence.len() < TILE_LENGTH {
                continue;
            }
            for i in 0..=sequence.len() - TILE_LENGTH {
                if let Some(key) = encode_tile(&sequence[i..i + TILE_LENGTH]) {
                    index.insert_key(key, offset + i as GenomicPos);
                }
            }
        }

        for entry in index.tiles.values_mut() {
            if let TileEntry::Positions(p) = entry {
                if p.len() > frequent_threshold {
                    *entry = TileEntry::Frequent(p.len() as u64);
                }
            }
        }
        log::debug!(
            "Built in-memory tile index: {} distinct tiles over {} contigs",
            index.tiles.len(),
            index.genome.contigs.len()
        );
        index
    }

    pub fn genome(&self) -> &GenomeInfo {
        &self.genome
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn insert(&mut self, tile: &str, coordinate: GenomicPos) -> AlignResult<()> {
        let key = encode_tile(tile.as_bytes())
            .ok_or_else(|| AlignError::invalid_input(format!("not an ACGT tile: {}", tile)))?;
        self.insert_key(key, coordinate);
        Ok(())
    }

    pub fn mark_frequent(&mut self, tile: &str, count: u64) -> AlignResult<()> {
        let key = encode_tile(tile.as_bytes())
            .ok_or_else(|| AlignError::invalid_input(format!("not an ACGT tile: {}", tile)))?;
        self.tiles.insert(key, TileEntry::Frequent(count));
        Ok(())
    }

    fn insert_key(&mut self, key: u32, coordinate: GenomicPos) {
        match self
            .tiles
            .entry(key)
            .or_insert_with(|| TileEntry::Positions(Vec::new()))
        {
            TileEntry::Positions(p) => {
                // Callers mostly insert in ascending order
                match p.last() {
                    Some(&last) if last >= coordinate => {
                        if let Err(at) = p.binary_search(&coordinate) {
                            p.insert(at, coordinate);
                        }
                    }
                    _ => p.push(coordinate),
                }
            }
            TileEntry::Frequent(count) => *count += 1,
        }
    }

    /// Load a tile file, gzip-compressed when the name ends in `.gz`.
    pub fn load<P: AsRef<Path>>(path: P) -> AlignResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let index = if path.extension().map_or(false, |e| e == "gz") {
            Self::read_from(BufReader::new(GzDecoder::new(file)))?
        } else {
            Self::read_from(BufReader::new(file))?
        };
        log::info!(
            "Loaded {} tiles and {} contigs from {}",
            index.tiles.len(),
            index.genome.contigs.len(),
            path.display()
        );
        Ok(index)
    }

    pub fn read_from<R: BufRead>(reader: R) -> AlignResult<Self> {
        let header = Regex::new(r"^##(.+):(\d+):(\d+)$").map_err(|e| AlignError::parse(e.to_string()))?;
        let mut index = Self::default();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                if let Some(caps) = header.captures(line) {
                    let length = parse_number(&caps[2], line_no)?;
                    let offset = parse_number(&caps[3], line_no)?;
                    index.genome.add_contig_at(caps[1].to_string(), length, offset);
                }
                continue;
            }

            let (tile, hits) = line.split_once('\t').ok_or_else(|| {
                AlignError::parse(format!("line {}: expected <tile>\\t<positions>", line_no + 1))
            })?;
            let key = match encode_tile(tile.as_bytes()) {
                Some(key) => key,
                None => {
                    log::trace!("Skipping ambiguous tile {} on line {}", tile, line_no + 1);
                    continue;
                }
            };

            let entry = if let Some(count) = hits.strip_prefix('C') {
                TileEntry::Frequent(parse_number(count, line_no)?)
            } else {
                let mut positions = hits
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| parse_number(s, line_no))
                    .collect::<AlignResult<Vec<_>>>()?;
                positions.sort_unstable();
                positions.dedup();
                TileEntry::Positions(positions)
            };
            index.tiles.insert(key, entry);
        }

        Ok(index)
    }
}

fn parse_number(field: &str, line_no: usize) -> AlignResult<u64> {
    field
        .trim()
        .parse()
        .map_err(|_| AlignError::parse(format!("line {}: invalid number '{}'", line_no + 1, field)))
}

impl TileIndex for InMemoryTileIndex {
    fn lookup(&self, tile: &str) -> TileHits {
        let key = match encode_tile(tile.as_bytes()) {
            Some(key) => key,
            None => return TileHits::Absent,
        };
        match self.tiles.get(&key) {
            Some(TileEntry::Frequent(_)) => TileHits::Frequent,
            Some(TileEntry::Positions(p)) if !p.is_empty() => TileHits::Positions(p.clone()),
            _ => TileHits::Absent,
        }
    }
}
