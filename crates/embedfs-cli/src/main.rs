//! embedfs binary.
//!
//! Loads a directory into memory the way an embed step would, then answers
//! queries through the embedded filesystem module.
//!
//! Usage:
//!   # Stat a file; `site/files` is rebased so `files/` is not needed
//!   embedfs site/files stat /index.html
//!
//!   # List a directory, or cat a file
//!   embedfs site/files ls css
//!   embedfs site/files cat css/site.css
//!
//!   # Use a different wrapping folder name
//!   embedfs --root-folder public site/public ls

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use embedfs::{
    DirEntry, Dispenser, EmbedConfig, FileAttr, MODULE_ID, MemoryStore, ModuleRegistry, ReadOnlyFs,
    UnmarshalDirectives,
};

/// Query a directory through the embedded filesystem.
#[derive(Parser, Debug)]
#[command(name = "embedfs")]
#[command(about = "Serve a directory as a read-only embedded filesystem")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Top-level folder to rebase onto (overrides the config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// Load the directory's contents at the root instead of under its name
    #[arg(long)]
    flat: bool,

    /// Directory to load
    dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a path's attributes
    Stat { path: String },
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Write a file's contents to stdout
    Cat { path: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<EmbedConfig> {
    let mut config = match &args.config {
        Some(path) => EmbedConfig::load(path)?,
        None => EmbedConfig::default(),
    };
    if let Some(name) = &args.root_folder {
        config = config.with_root_folder(name.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    let store = if args.flat {
        MemoryStore::load_dir(&args.dir).await
    } else {
        MemoryStore::embed_dir(&args.dir).await
    }
    .with_context(|| format!("loading {}", args.dir.display()))?;
    tracing::debug!(entries = store.len(), "store ready");

    let registry = ModuleRegistry::new();
    embedfs::register_with_config(&registry, Arc::new(store), config)?;
    let mut fs = registry.instantiate(MODULE_ID).await?;
    fs.unmarshal_directives(&mut Dispenser::parse("fs embedded"))?;

    let mut out = std::io::stdout().lock();
    match args.command {
        Command::Stat { path } => {
            let attr = fs.stat(&path).await?;
            writeln!(out, "{}", format_attr(&attr, &path))?;
        }
        Command::Ls { path } => {
            for entry in fs.read_dir(&path).await.with_context(|| format!("ls {path}"))? {
                writeln!(out, "{}", format_entry(&entry))?;
            }
        }
        Command::Cat { path } => {
            let data = fs.read_all(&path).await.with_context(|| format!("cat {path}"))?;
            out.write_all(&data)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// `ls -l` style line: mode, size, mtime (unix seconds), name.
fn format_attr(attr: &FileAttr, name: &str) -> String {
    let mtime = attr
        .mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{} {:>10} {:>12} {}", attr.mode_string(), attr.size, mtime, name)
}

fn format_entry(entry: &DirEntry) -> String {
    if entry.is_dir() {
        format!("{}/", entry.name)
    } else {
        entry.name.clone()
    }
}
