//! Mapping from the concatenated coordinate space onto named contigs.

use crate::error::{AlignError, AlignResult};
use crate::types::{ChrPosition, GenomeInfo, GenomicPos};

pub trait CoordinateMapper: Send + Sync {
    /// Contig and local offset of a global coordinate, as a zero-length interval.
    fn to_chr_position(&self, coordinate: GenomicPos) -> AlignResult<ChrPosition>;

    /// `[local - left, local + match_length + right)` clamped to the contig.
    fn buffered_interval(
        &self,
        coordinate: GenomicPos,
        match_length: GenomicPos,
        left: GenomicPos,
        right: GenomicPos,
    ) -> AlignResult<ChrPosition>;
}

impl CoordinateMapper for GenomeInfo {
    fn to_chr_position(&self, coordinate: GenomicPos) -> AlignResult<ChrPosition> {
        let (contig, local) = self
            .global_to_local(coordinate)
            .ok_or_else(|| AlignError::lookup(format!("coordinate {} is outside every contig", coordinate)))?;
        Ok(ChrPosition {
            chromosome: contig.name.clone(),
            start: local,
            end: local,
            contig_length: contig.length,
        })
    }

    fn buffered_interval(
        &self,
        coordinate: GenomicPos,
        match_length: GenomicPos,
        left: GenomicPos,
        right: GenomicPos,
    ) -> AlignResult<ChrPosition> {
        let mut position = self.to_chr_position(coordinate)?;
        let local = position.start;
        position.start = local.saturating_sub(left);
        position.end = local
            .saturating_add(match_length)
            .saturating_add(right)
            .min(position.contig_length);
        Ok(position)
    }
}
