//! TiledAligner Core Library
//!
//! Tile index probing, run extension, split-alignment search, local-alignment
//! fallback and BLAT/psl record building for the TiledAligner.

pub mod types;
pub mod error;
pub mod packed;
pub mod sequence;
pub mod index;
pub mod probe;
pub mod extend;
pub mod record;
pub mod pairs;
pub mod split;
pub mod blat;
pub mod builder;
pub mod sw;
pub mod fallback;
pub mod coords;
pub mod reference;
pub mod aligner;

// Re-export commonly used types and functions
pub use types::{ChrPosition, GenomeInfo, GenomicPos, Strand, TILE_LENGTH};
pub use error::{AlignError, AlignResult};
pub use index::{InMemoryTileIndex, TileHits, TileIndex};
pub use blat::BlatRecord;
pub use coords::CoordinateMapper;
pub use reference::{read_fasta, NamedSequence, ReferenceCache, ReferenceProvider};
pub use sw::{AlignmentDiff, LocalAligner, ScoringPreset, SmithWatermanGotoh};
pub use aligner::{AlignerParams, TiledAligner};

/// Version information for the TiledAligner core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
