//! Packed hit encodings
//!
//! A tile hit is carried around as one `u64` holding the genomic coordinate,
//! the tile's offset in the query and a reverse-complement flag. Run summaries
//! are a `u32` holding the tile count and the mismatch count. Both are wrapped
//! in newtypes so the bit layout never leaks out of this module.

use crate::types::{GenomicPos, Strand, TILE_LENGTH};
use std::cmp::Ordering;
use std::fmt;

const COORDINATE_BITS: u32 = 40;
const COORDINATE_MASK: u64 = (1 << COORDINATE_BITS) - 1;
const QUERY_OFFSET_SHIFT: u32 = 40;
const QUERY_OFFSET_MASK: u64 = 0xFFFF;
const REVERSE_COMPLEMENT_BIT: u32 = 62;

/// Largest coordinate representable in the packed space.
pub const MAX_COORDINATE: GenomicPos = COORDINATE_MASK;

/// Genomic coordinate + query offset + strand flag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackedPosition(u64);

impl PackedPosition {
    pub fn new(coordinate: GenomicPos, query_offset: u16, reverse: bool) -> Self {
        let mut raw = (coordinate & COORDINATE_MASK) | ((query_offset as u64) << QUERY_OFFSET_SHIFT);
        if reverse {
            raw |= 1 << REVERSE_COMPLEMENT_BIT;
        }
        Self(raw)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn coordinate(self) -> GenomicPos {
        self.0 & COORDINATE_MASK
    }

    /// Offset of the tile within the query as it was tiled (reverse-complemented for reverse hits).
    pub fn query_offset(self) -> u16 {
        ((self.0 >> QUERY_OFFSET_SHIFT) & QUERY_OFFSET_MASK) as u16
    }

    pub fn is_reverse(self) -> bool {
        self.0 & (1 << REVERSE_COMPLEMENT_BIT) != 0
    }

    pub fn strand(self) -> Strand {
        Strand::from(!self.is_reverse())
    }

    /// Start of a run of `tile_count` tiles in forward query coordinates.
    pub fn forward_start_offset(self, tile_count: usize, query_length: usize) -> usize {
        let offset = self.query_offset() as usize;
        if self.is_reverse() {
            query_length.saturating_sub(offset + tile_count + TILE_LENGTH - 1)
        } else {
            offset
        }
    }
}

impl fmt::Debug for PackedPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PackedPosition({}@{}{})",
            self.coordinate(),
            self.query_offset(),
            self.strand()
        )
    }
}

/// Tile count and mismatch count of one extended run.
///
/// Ordering ranks runs: ascending by `tile_count - mismatches`, then by
/// mismatches descending, so the most trustworthy key sorts last.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedLengthMismatch(u32);

impl PackedLengthMismatch {
    pub fn new(tile_count: u16, mismatches: u16) -> Self {
        Self(((tile_count as u32) << 16) | mismatches as u32)
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn tile_count(self) -> usize {
        (self.0 >> 16) as usize
    }

    pub fn mismatches(self) -> usize {
        (self.0 & 0xFFFF) as usize
    }

    /// Tile count net of mismatches.
    pub fn net(self) -> i64 {
        self.tile_count() as i64 - self.mismatches() as i64
    }

    /// Bases spanned by the run, mismatched bases included.
    pub fn exact_length(self) -> usize {
        self.tile_count() + TILE_LENGTH - 1
    }

    /// Bases spanned net of mismatches; the figure split search gates on.
    pub fn length(self) -> i64 {
        self.net() + TILE_LENGTH as i64 - 1
    }
}

impl Ord for PackedLengthMismatch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.net()
            .cmp(&other.net())
            .then_with(|| other.mismatches().cmp(&self.mismatches()))
    }
}

impl PartialOrd for PackedLengthMismatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for PackedLengthMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackedLengthMismatch({}t/{}mm)", self.tile_count(), self.mismatches())
    }
}
