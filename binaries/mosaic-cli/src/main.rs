//! Mosaic CLI
//!
//! Builds a corpus index and re-assembles patterns from it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use mosaic_config::MosaicConfig;
use mosaic_construct::{assemble_stream, assemble_windows, Constructor, HitObject};
use mosaic_core::{parse_entries, DataPoint};
use mosaic_index::Corpus;
use mosaic_match::{Matcher, ShapeJudge};

#[derive(Parser)]
#[command(name = "mosaic")]
#[command(about = "Mosaic - re-assemble a pattern from pieces of a corpus")]
#[command(version)]
struct Cli {
    /// Config file (falls back to MOSAIC_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a corpus file and save the index
    Build {
        /// Corpus file, entries separated by blank lines
        #[arg(short, long)]
        data: PathBuf,

        /// Where to write the index
        #[arg(short, long)]
        output: PathBuf,

        /// Also index the mirrored variant of every entry
        #[arg(long)]
        mirror: bool,
    },

    /// Re-assemble a pattern from the corpus
    Convert {
        /// Corpus file
        #[arg(short, long)]
        data: PathBuf,

        /// Pattern file
        #[arg(short, long)]
        input: PathBuf,

        /// Object tokens, one per line (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Saved index built from the same corpus file
        #[arg(long)]
        index: Option<PathBuf>,

        /// Save the freshly built index here
        #[arg(long, conflicts_with = "index")]
        save_index: Option<PathBuf>,

        /// Existing object tokens to continue from
        #[arg(long)]
        objects: Option<PathBuf>,

        /// The corpus was indexed with --mirror
        #[arg(long)]
        mirror: bool,

        /// Place whole windows through the score-ordering filter
        #[arg(long)]
        windows: bool,

        /// Filter buffer size (defaults to the config value)
        #[arg(long, requires = "windows")]
        buffer: Option<usize>,

        /// Write slider velocity changes here, one `time,velocity` per line
        #[arg(long)]
        velocities: Option<PathBuf>,
    },

    /// Show corpus statistics and the effective config
    Inspect {
        /// Corpus file
        #[arg(short, long)]
        data: PathBuf,

        /// Saved index to verify against the corpus
        #[arg(long)]
        index: Option<PathBuf>,

        #[arg(long)]
        mirror: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mosaic=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = MosaicConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Build { data, output, mirror } => cmd_build(&config, &data, &output, mirror),
        Commands::Convert {
            data,
            input,
            output,
            index,
            save_index,
            objects,
            mirror,
            windows,
            buffer,
            velocities,
        } => {
            let corpus = open_corpus(&config, &data, index.as_deref(), mirror)?;
            if let Some(path) = save_index {
                corpus.save_index(&path).context("Failed to save index")?;
            }
            let buffer = windows.then(|| buffer.unwrap_or(config.filter.buffer_size));
            let paths = ConvertPaths {
                input: &input,
                existing: objects.as_deref(),
                output: output.as_deref(),
                velocities: velocities.as_deref(),
            };
            cmd_convert(&config, &corpus, paths, buffer)
        }
        Commands::Inspect { data, index, mirror } => cmd_inspect(&config, &data, index.as_deref(), mirror),
    }
}

fn cmd_build(config: &MosaicConfig, data: &Path, output: &Path, mirror: bool) -> Result<()> {
    let corpus = open_corpus(config, data, None, mirror)?;
    corpus.save_index(output).context("Failed to save index")?;

    println!("Indexed {}", data.display());
    println!("  {}", corpus.stats());
    println!("  Fingerprint: {}", corpus.fingerprint());
    println!("  Saved to {}", output.display());
    Ok(())
}

struct ConvertPaths<'a> {
    input: &'a Path,
    existing: Option<&'a Path>,
    output: Option<&'a Path>,
    velocities: Option<&'a Path>,
}

fn cmd_convert(config: &MosaicConfig, corpus: &Corpus, paths: ConvertPaths<'_>, buffer: Option<usize>) -> Result<()> {
    let pattern: Vec<DataPoint> = read_entries(paths.input, false)?.into_iter().flatten().collect();
    let mut objects = match paths.existing {
        Some(path) => read_objects(path)?,
        None => Vec::new(),
    };
    let before = objects.len();
    let mut velocities = Vec::new();

    let matcher = Matcher::with_config(corpus, ShapeJudge, config.matcher.clone());
    let constructor = Constructor::with_config(&config.construct);

    match buffer {
        Some(buffer_size) => {
            let stats = assemble_windows(&matcher, &pattern, &constructor, buffer_size, &mut objects, &mut velocities);
            tracing::info!("Window assembly finished: {}", stats);
        }
        None => {
            let stats = assemble_stream(&matcher, &pattern, &constructor, &mut objects, &mut velocities);
            tracing::info!("Stream assembly finished: {}", stats);
        }
    }

    let mut text = String::new();
    for object in &objects {
        text.push_str(&object.encode());
        text.push('\n');
    }

    if let Some(path) = paths.velocities {
        let lines: String = velocities.iter().map(|change| format!("{}\n", change)).collect();
        std::fs::write(path, lines).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Wrote {} velocity changes to {}", velocities.len(), path.display());
    }

    match paths.output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Wrote {} objects ({} new) to {}",
                objects.len(),
                objects.len() - before,
                path.display()
            );
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn cmd_inspect(config: &MosaicConfig, data: &Path, index: Option<&Path>, mirror: bool) -> Result<()> {
    let corpus = open_corpus(config, data, index, mirror)?;

    println!("Corpus: {}", data.display());
    println!("  {}", corpus.stats());
    println!("  Fingerprint: {}", corpus.fingerprint());
    if let Some(path) = index {
        println!("  Index {} matches", path.display());
    }
    println!();
    println!("Config:");
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn read_entries(path: &Path, mirror: bool) -> Result<Vec<Vec<DataPoint>>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let entries = parse_entries(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
    if !mirror {
        return Ok(entries);
    }

    // Same order as Corpus::add_entry_with_mirror
    Ok(entries
        .into_iter()
        .flat_map(|entry| {
            let mirrored = entry.iter().map(DataPoint::mirrored).collect();
            [entry, mirrored]
        })
        .collect())
}

fn read_objects(path: &Path) -> Result<Vec<HitObject>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| HitObject::decode(line).map_err(anyhow::Error::from))
        .collect()
}

fn open_corpus(config: &MosaicConfig, data: &Path, index: Option<&Path>, mirror: bool) -> Result<Corpus> {
    let entries = read_entries(data, mirror)?;
    match index {
        Some(path) => Corpus::load_index(entries, &config.encoder, config.index.max_depth, path)
            .with_context(|| format!("Failed to load index {}", path.display())),
        None => {
            let mut corpus = Corpus::with_config(config);
            corpus.extend(entries);
            Ok(corpus)
        }
    }
}
