use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type GenomicPos = u64;

/// Number of bases in one index tile.
pub const TILE_LENGTH: usize = 13;

/// Records scoring at or below this are never reported.
pub const MIN_BLAT_SCORE: usize = 20;

/// Smallest tile count a run needs before it can seed or join a split.
pub const MIN_TILE_COUNT: usize = MIN_BLAT_SCORE - TILE_LENGTH;

/// Residual query ranges shorter than this are not worth a second segment.
pub const MIN_RESIDUAL_RANGE: usize = MIN_BLAT_SCORE - 5;

/// Furthest apart two hits may be and still form a single record.
pub const MAX_GAP_FOR_SINGLE_RECORD: GenomicPos = 500_000;

/// Upper bound on the number of runs in a compound hit.
pub const MAX_SEGMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContigInfo {
    pub id: u32,
    pub name: String,
    pub length: GenomicPos,
    pub offset: GenomicPos, // Global coordinate offset
}

impl ContigInfo {
    pub fn end(&self) -> GenomicPos {
        self.offset.saturating_add(self.length)
    }
}

/// Contig table for the concatenated whole-genome coordinate space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenomeInfo {
    /// Sorted by global offset
    pub contigs: Vec<ContigInfo>,
    pub total_length: GenomicPos,
    pub contig_map: HashMap<String, u32>,
}

impl GenomeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a contig directly after the last one.
    pub fn add_contig(&mut self, name: String, length: GenomicPos) -> u32 {
        let offset = self.contigs.last().map(|c| c.end()).unwrap_or(0);
        self.add_contig_at(name, length, offset)
    }

    /// Register a contig at an explicit global offset (as listed in a tile file header).
    pub fn add_contig_at(&mut self, name: String, length: GenomicPos, offset: GenomicPos) -> u32 {
        let id = self.contigs.len() as u32;
        let insert_at = self.contigs.partition_point(|c| c.offset <= offset);
        self.contigs.insert(
            insert_at,
            ContigInfo {
                id,
                name: name.clone(),
                length,
                offset,
            },
        );
        self.contig_map.insert(name, id);
        self.total_length = self.total_length.max(offset.saturating_add(length));
        id
    }

    pub fn get_contig(&self, id: u32) -> Option<&ContigInfo> {
        self.contigs.iter().find(|c| c.id == id)
    }

    pub fn get_contig_by_name(&self, name: &str) -> Option<&ContigInfo> {
        self.contig_map.get(name).and_then(|&id| self.get_contig(id))
    }

    /// Contig holding `global_pos` and the 0-based offset within it.
    pub fn global_to_local(&self, global_pos: GenomicPos) -> Option<(&ContigInfo, GenomicPos)> {
        let idx = self.contigs.partition_point(|c| c.offset <= global_pos);
        let contig = self.contigs.get(idx.checked_sub(1)?)?;
        if global_pos < contig.end() {
            Some((contig, global_pos - contig.offset))
        } else {
            None
        }
    }

    pub fn local_to_global(&self, name: &str, position: GenomicPos) -> Option<GenomicPos> {
        self.get_contig_by_name(name).and_then(|contig| {
            if position < contig.length {
                Some(contig.offset + position)
            } else {
                None
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    #[serde(rename = "+")]
    Forward,
    #[serde(rename = "-")]
    Reverse,
}

impl Strand {
    pub fn is_reverse(self) -> bool {
        matches!(self, Strand::Reverse)
    }
}

impl From<bool> for Strand {
    fn from(forward: bool) -> Self {
        if forward {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }
}

impl From<Strand> for bool {
    fn from(strand: Strand) -> Self {
        matches!(strand, Strand::Forward)
    }
}

impl TryFrom<char> for Strand {
    type Error = char;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            '+' => Ok(Strand::Forward),
            '-' => Ok(Strand::Reverse),
            other => Err(other),
        }
    }
}

impl From<Strand> for char {
    fn from(strand: Strand) -> Self {
        match strand {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}

/// A 0-based half-open interval on a named contig.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChrPosition {
    pub chromosome: String,
    pub start: GenomicPos,
    pub end: GenomicPos,
    pub contig_length: GenomicPos,
}

impl ChrPosition {
    pub fn len(&self) -> GenomicPos {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for ChrPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}
