//! Align command implementation - place queries on the reference and emit psl records

use anyhow::{Result, Context, anyhow};
use clap::ValueEnum;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tiledaligner_core::{
    read_fasta, AlignError, BlatRecord, InMemoryTileIndex, NamedSequence, ReferenceCache, TiledAligner,
};

use crate::config::Config;
use crate::error::CliError;
use crate::OutputFormat;

pub fn execute(
    config: &Config,
    reference: PathBuf,
    query: PathBuf,
    tiles: Option<PathBuf>,
    out: Option<PathBuf>,
    format: Option<OutputFormat>,
) -> Result<()> {
    let format = match format {
        Some(f) => f,
        None => OutputFormat::from_str(&config.general.format, true)
            .map_err(|e| CliError::validation(format!("general.format: {}", e)))?,
    };
    log::info!("Reference: {}", reference.display());
    log::info!("Query: {}", query.display());

    for path in [Some(&reference), Some(&query), tiles.as_ref()].into_iter().flatten() {
        if !path.exists() {
            return Err(CliError::file_not_found(path.clone()).into());
        }
    }

    log::info!("Loading reference sequences");
    let cache = ReferenceCache::load_all(&reference)
        .with_context(|| format!("Failed to load reference: {}", reference.display()))?;

    let index = load_index(config, &cache, tiles.as_deref())?;
    log::info!(
        "Tile index holds {} distinct tiles over {} contigs",
        index.tile_count(),
        index.genome().contigs.len()
    );

    let queries = read_fasta(&query)
        .with_context(|| format!("Failed to parse query file: {}", query.display()))?;
    if queries.is_empty() {
        return Err(anyhow!("No sequences found in file: {}", query.display()));
    }
    log::info!("Aligning {} queries", queries.len());

    let aligner = TiledAligner::new(&index, &cache, index.genome()).with_params(config.aligner.clone());
    let records = align_queries(&aligner, &queries)?;
    log::info!("Produced {} records", records.len());

    let written = match &out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            write_records(&records, format, BufWriter::new(file))
        }
        None => write_records(&records, format, BufWriter::new(std::io::stdout().lock())),
    };
    written.context("Failed to write alignment output")?;

    log::info!("Alignment completed successfully");
    Ok(())
}

/// Tile index from `--tiles`, or built over the cached reference contigs.
///
/// Either way the index's contig table is the coordinate space the aligner
/// maps through.
fn load_index(config: &Config, cache: &ReferenceCache, tiles: Option<&Path>) -> Result<InMemoryTileIndex> {
    match tiles {
        Some(path) => {
            log::info!("Loading tile index from {}", path.display());
            InMemoryTileIndex::load(path).map_err(|e| match e {
                AlignError::Parse(message) => {
                    anyhow::Error::from(CliError::invalid_format(format!("{}: {}", path.display(), message)))
                }
                other => anyhow::Error::from(other)
                    .context(format!("Failed to load tile index: {}", path.display())),
            })
        }
        None => {
            log::info!(
                "Building tile index from the reference (frequent above {})",
                config.index.frequent_threshold
            );
            let contigs = cache.contigs();
            Ok(InMemoryTileIndex::from_contigs(
                contigs.iter().map(|(name, sequence)| (name.as_str(), sequence.as_slice())),
                config.index.frequent_threshold,
            ))
        }
    }
}

/// Align queries in parallel, keeping input order.
fn align_queries(aligner: &TiledAligner<'_>, queries: &[NamedSequence]) -> Result<Vec<BlatRecord>> {
    let per_query = queries
        .par_iter()
        .map(|q| match aligner.align(&q.name, &q.sequence) {
            Ok(records) => {
                log::debug!("{}: {} records", q.name, records.len());
                Ok(records)
            }
            Err(AlignError::InvalidInput(message)) => {
                log::warn!("Skipping query: {}", message);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        })
        .collect::<Result<Vec<_>, AlignError>>()
        .context("Alignment failed")?;

    Ok(per_query.into_iter().flatten().collect())
}

fn write_records<W: Write>(records: &[BlatRecord], format: OutputFormat, mut writer: W) -> Result<()> {
    match format {
        OutputFormat::Psl => {
            for record in records {
                writeln!(writer, "{}", record)?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, records)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// 2000 bases of deterministic ACGT text with every 13-mer unique on
    /// both strands.
    fn contig() -> String {
        let mut state: u64 = 11;
        (0..2000)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                b"ACGT"[((state >> 33) % 4) as usize] as char
            })
            .collect()
    }

    struct Fixture {
        dir: TempDir,
        reference: PathBuf,
        query: PathBuf,
    }

    fn fixture(queries: &[(&str, String)]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let reference = dir.path().join("ref.fa");
        fs::write(&reference, format!(">chr1 test contig\n{}\n", contig())).unwrap();

        let query = dir.path().join("query.fa");
        let body: String = queries
            .iter()
            .map(|(name, seq)| format!(">{}\n{}\n", name, seq))
            .collect();
        fs::write(&query, body).unwrap();

        Fixture { dir, reference, query }
    }

    #[test]
    fn test_align_writes_psl() {
        let chr = contig();
        let fx = fixture(&[("amplicon", chr[200..260].to_string()), ("tiny", "ACGTAC".to_string())]);
        let out = fx.dir.path().join("hits.psl");

        execute(
            &Config::default(),
            fx.reference.clone(),
            fx.query.clone(),
            None,
            Some(out.clone()),
            Some(OutputFormat::Psl),
        )
        .unwrap();

        let psl = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = psl.lines().collect();
        assert_eq!(lines.len(), 1);
        let fields: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(fields.len(), 21);
        assert_eq!(fields[0], "60");
        assert_eq!(fields[8], "+");
        assert_eq!(fields[9], "amplicon");
        assert_eq!(fields[13], "chr1");
        assert_eq!(fields[15], "200");
        assert_eq!(fields[16], "260");
    }

    #[test]
    fn test_align_json_from_config_format() {
        let chr = contig();
        let fx = fixture(&[("fwd", chr[900..980].to_string())]);
        let out = fx.dir.path().join("hits.json");
        let mut config = Config::default();
        config.general.format = "json".to_string();

        execute(&config, fx.reference.clone(), fx.query.clone(), None, Some(out.clone()), None).unwrap();

        let records: Vec<BlatRecord> = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].q_name, "fwd");
        assert_eq!(records[0].t_start, 900);
        assert_eq!(records[0].matches, 80);
    }

    #[test]
    fn test_missing_tile_file_is_reported() {
        let chr = contig();
        let fx = fixture(&[("q", chr[0..50].to_string())]);
        let missing = fx.dir.path().join("absent.tiles");

        let err = execute(
            &Config::default(),
            fx.reference.clone(),
            fx.query.clone(),
            Some(missing),
            None,
            Some(OutputFormat::Psl),
        )
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::FileNotFound { .. })));
    }

    #[test]
    fn test_malformed_tile_file_is_invalid_format() {
        let chr = contig();
        let fx = fixture(&[("q", chr[0..50].to_string())]);
        let tiles = fx.dir.path().join("bad.tiles");
        fs::write(&tiles, "##chr1:2000:0\nACGTACGTACGTA\tnot-a-number\n").unwrap();

        let err = execute(
            &Config::default(),
            fx.reference.clone(),
            fx.query.clone(),
            Some(tiles),
            None,
            Some(OutputFormat::Psl),
        )
        .unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::InvalidFormat { .. })));
    }
}
