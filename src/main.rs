use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use turnlabel::{
    analyze_protocol, execute_stage3, unpack_archives, validate_protocol_dirs, write_tsv,
    CorpusConfig,
};

#[derive(Parser)]
#[command(name = "turnlabel")]
#[command(author, version, about = "Build a speaker-turn label dataset from CATMA annotation exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the protocol archives
    Unpack {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding the *.tar.gz exports
        #[arg(long)]
        archives: Option<PathBuf>,

        /// Directory to unpack into
        #[arg(long)]
        unpacked: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Build the labeled speaker-turn dataset
    Build {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory of unpacked protocols
        #[arg(long)]
        unpacked: Option<PathBuf>,

        /// Output TSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output file for the JSON run summary
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Render newlines as two spaces and tabs as one before measuring offsets
        #[arg(long)]
        remove_new_line_and_tab: bool,

        /// Characters of context to add around each turn
        #[arg(long)]
        context_size: Option<usize>,

        /// Reject protocols with several annotation exports instead of keeping the longest
        #[arg(long)]
        strict: bool,

        /// Stop at the first protocol that fails
        #[arg(long)]
        fail_fast: bool,

        /// Unpack the archives before building
        #[arg(long)]
        unpack: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Analyze a single protocol directory without writing output
    Analyze {
        /// Protocol directory
        #[arg(short, long)]
        protocol_dir: PathBuf,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Unpack {
            config,
            archives,
            unpacked,
            verbose,
        } => {
            setup_logging(verbose);
            let mut config = CorpusConfig::load_or_default(config.as_deref())?;
            if let Some(archives) = archives {
                config.archives_dir = archives;
            }
            if let Some(unpacked) = unpacked {
                config.unpacked_dir = unpacked;
            }
            unpack(&config)
        }
        Commands::Build {
            config,
            unpacked,
            output,
            summary,
            remove_new_line_and_tab,
            context_size,
            strict,
            fail_fast,
            unpack: unpack_first,
            verbose,
        } => {
            setup_logging(verbose);
            let mut config = CorpusConfig::load_or_default(config.as_deref())?;
            if let Some(unpacked) = unpacked {
                config.unpacked_dir = unpacked;
            }
            if let Some(output) = output {
                config.output_path = output;
            }
            if summary.is_some() {
                config.summary_path = summary;
            }
            if let Some(context_size) = context_size {
                config.context_size = context_size;
            }
            config.remove_new_line_and_tab |= remove_new_line_and_tab;
            config.tolerant &= !strict;
            config.fail_fast |= fail_fast;

            if unpack_first {
                unpack(&config)?;
            }
            build_corpus(&config)
        }
        Commands::Analyze {
            protocol_dir,
            config,
            verbose,
        } => {
            setup_logging(verbose);
            let config = CorpusConfig::load_or_default(config.as_deref())?;
            analyze(protocol_dir, &config)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn unpack(config: &CorpusConfig) -> Result<()> {
    let count = unpack_archives(&config.archives_dir, &config.unpacked_dir)
        .context("Failed to unpack protocol archives")?;
    info!("Unpacked {} archives", count);
    Ok(())
}

fn build_corpus(config: &CorpusConfig) -> Result<()> {
    info!("Validating protocol dirs in {:?}", config.unpacked_dir);
    let report = validate_protocol_dirs(&config.unpacked_dir, &config.validation_options())
        .context("Failed to validate protocol dirs")?;
    if report.valid.is_empty() {
        warn!("No valid protocol dirs in {:?}", config.unpacked_dir);
    }

    let result = execute_stage3(&report.valid, &config.stage3_config())
        .context("Failed to assemble corpus")?;

    write_tsv(&result.rows, &config.output_path)
        .with_context(|| format!("Failed to write dataset: {:?}", config.output_path))?;
    info!("Dataset written to {:?}", config.output_path);

    if let Some(summary_path) = &config.summary_path {
        result.summary.write_json(summary_path)?;
        info!("Run summary written to {:?}", summary_path);
    }

    info!(
        "Complete: {} rows from {} protocols ({} skipped, {} failed, {} invalid dirs)",
        result.summary.rows_written,
        result.summary.protocols_processed,
        result.summary.skipped.len(),
        result.summary.failed.len(),
        report.invalid_count()
    );

    Ok(())
}

fn analyze(protocol_dir: PathBuf, config: &CorpusConfig) -> Result<()> {
    info!("Analyzing protocol dir {:?}", protocol_dir);
    let analysis = analyze_protocol(&protocol_dir, &config.stage3_config())
        .context("Failed to analyze protocol")?;

    println!("Protocol Analysis");
    println!("=================");
    println!(
        "Committee: {}",
        analysis.committee.as_deref().unwrap_or("(not found)")
    );
    println!(
        "Protocol number: {}",
        analysis.protocol_number.as_deref().unwrap_or("(not found)")
    );
    println!("Speaker turns: {}", analysis.speakers.len());
    println!("Label spans: {}", analysis.label_span_count());
    println!("Untagged spans: {}", analysis.untagged_span_count());
    println!("Reconciled rows: {}", analysis.turns.len());
    println!();

    println!("Taxonomy");
    println!("--------");
    match &analysis.annotations {
        Some(annotations) => {
            for (label_type, name) in annotations.taxonomy.iter() {
                println!("{}: {}", label_type, name);
            }
        }
        None => println!("(no annotations)"),
    }
    println!();

    println!("Label Counts");
    println!("------------");
    for (label, count) in analysis.label_counts() {
        println!("{}: {}", label, count);
    }

    Ok(())
}
