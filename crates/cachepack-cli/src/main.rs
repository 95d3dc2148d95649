//! cachepack-cli - Command-line interface for cachepack
//!
//! Packs build-cache directories into compressed tar streams and restores
//! them. Archives can be written to stdout and read from stdin with `-`.

use anyhow::{Context, Result};
use cachepack_core::config::Config;
use cachepack_core::{from_format, Format, Options};
use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// cachepack - streaming archives for build caches
#[derive(Parser)]
#[command(name = "cachepack")]
#[command(author, version, about = "Streaming tar archives for build caches", long_about = None)]
struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, env = "CACHEPACK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack paths into an archive
    Create {
        /// Files or directories to archive
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output archive file, `-` for stdout
        #[arg(short, long)]
        output: PathBuf,

        /// Directory entry names are made relative to
        #[arg(long)]
        root: Option<PathBuf>,

        /// Archive format (tar, gzip, zstd)
        #[arg(short, long)]
        format: Option<Format>,

        /// Compression level, negative for the codec default
        #[arg(long, allow_hyphen_values = true)]
        level: Option<i32>,

        /// Leave symlinks out of the archive
        #[arg(long)]
        skip_symlinks: bool,
    },

    /// Restore an archive into a directory
    Extract {
        /// Archive file to extract, `-` for stdin
        archive: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Archive format (tar, gzip, zstd)
        #[arg(short, long)]
        format: Option<Format>,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(long, conflicts_with = "path")]
        show: bool,

        /// Show configuration file path
        #[arg(long, conflicts_with = "show")]
        path: bool,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout may carry archive data
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let result = run();

    match result {
        Ok(_) => process::exit(0),
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("cachepack: {:#}", e);

            let exit_code = map_error_to_exit_code(&e);
            process::exit(exit_code);
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Create {
            paths,
            output,
            root,
            format,
            level,
            skip_symlinks,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let format = format
                .or_else(|| Format::from_path(&output))
                .unwrap_or(config.archive.format);
            let root = absolute(&root.unwrap_or_else(|| config.archive.root.clone()))?;
            let options = Options {
                compression_level: level.unwrap_or(config.archive.compression_level),
                skip_symlinks: skip_symlinks || config.archive.skip_symlinks,
            };
            let srcs = paths
                .iter()
                .map(|p| absolute(p))
                .collect::<Result<Vec<_>>>()?;

            info!("Creating {} archive from {} path(s)", format, srcs.len());
            debug!(?root, level = options.compression_level, skip_symlinks = options.skip_symlinks);
            let archive = from_format(format, root, options);

            let written = if is_stdio(&output) {
                let mut out = BufWriter::new(io::stdout().lock());
                let written = archive.create(&srcs, &mut out)?;
                out.flush().context("Failed to flush stdout")?;
                written
            } else {
                let file = File::create(&output)
                    .with_context(|| format!("Failed to create {}", output.display()))?;
                let mut out = BufWriter::new(file);
                let result = archive
                    .create(&srcs, &mut out)
                    .map_err(anyhow::Error::from)
                    .and_then(|written| {
                        out.flush()
                            .with_context(|| format!("Failed to write {}", output.display()))?;
                        Ok(written)
                    });
                if result.is_err() {
                    drop(out);
                    if let Err(e) = fs::remove_file(&output) {
                        warn!("Failed to remove partial archive {}: {}", output.display(), e);
                    }
                }
                result?
            };

            info!("Archived {} bytes", written);
        }

        Commands::Extract {
            archive: input,
            output,
            format,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let format = format
                .or_else(|| Format::from_path(&input))
                .unwrap_or(config.archive.format);
            let dest = output.unwrap_or_else(|| PathBuf::from("."));

            info!("Extracting {} archive into {}", format, dest.display());
            let archive = from_format(format, config.archive.root.clone(), config.archive.options());

            let written = if is_stdio(&input) {
                let mut source = BufReader::new(io::stdin().lock());
                archive.extract(&dest, &mut source)?
            } else {
                let file = File::open(&input)
                    .with_context(|| format!("Failed to open {}", input.display()))?;
                archive.extract(&dest, &mut BufReader::new(file))?
            };

            info!("Restored {} bytes", written);
        }

        Commands::Config { show, path } => {
            let config_path = match &cli.config {
                Some(path) => path.clone(),
                None => Config::default_path()?,
            };

            if path {
                println!("{}", config_path.display());
            } else if show {
                let config = load_config(cli.config.as_deref())?;
                print!("{}", config.to_toml()?);
            } else {
                eprintln!("Please specify --show or --path");
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load()?,
    };
    Ok(config)
}

fn is_stdio(path: &Path) -> bool {
    path == Path::new("-")
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        Ok(cwd.join(path))
    }
}

fn map_error_to_exit_code(err: &anyhow::Error) -> i32 {
    use cachepack_core::Error;

    if let Some(core_err) = err.downcast_ref::<Error>() {
        match core_err.root_cause() {
            Error::Config(_) => 1,
            Error::Io(_) | Error::Walk(_) => 2,
            Error::InvalidPath(_) | Error::UnsupportedFormat(_) | Error::UnsupportedEntry { .. } => 3,
            Error::EncoderConstruction(_) | Error::DecoderConstruction(_) | Error::NotReadable(_) => 4,
            Error::Aborted { .. } => 4,
        }
    } else if err.is::<io::Error>() {
        2
    } else {
        1
    }
}
