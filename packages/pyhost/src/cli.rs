//! The `pyhost` command line.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nu_ansi_term::Color;
use pyhost_resolve::{DirectoryPicker, FixedDirectoryPicker, ResolveError, SourceResolver};
use pyhost_runtime::{LoadError, RuntimeConfig, RuntimeError, VirtualFileWriter};
use pyhost_vfs::MemoryFs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::prompt::PromptDirectoryPicker;

/// pyhost - resolve interpreter sources from a server or a local directory
#[derive(Parser, Debug)]
#[command(name = "pyhost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL, overriding the configuration
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Source directory; asked for interactively when omitted
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Persistent cache file, overriding the configuration
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve one module path and print its text
    Resolve {
        /// Module path, e.g. lib/pkg/mod.py
        path: String,
    },
    /// Write module paths into an in-memory interpreter filesystem and print it
    Materialize {
        /// Target paths; `target=source` fetches from a different source path
        #[arg(required = true)]
        entries: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{path}: {status} {status_text}")]
    Status {
        path: String,
        status: u16,
        status_text: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CliResult<T> = std::result::Result<T, CliError>;

/// Run using the current process arguments.
pub async fn run() -> CliResult<()> {
    run_with_args(std::env::args_os()).await
}

/// Run using the provided argument iterator.
pub async fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let mut stdout = std::io::stdout().lock();
    execute(cli, &mut stdout).await
}

/// Execute a parsed command, writing results to `out`.
pub async fn execute(cli: Cli, out: &mut dyn Write) -> CliResult<()> {
    let resolver = Arc::new(build_resolver(&cli)?);

    match cli.command {
        Command::Resolve { path } => resolve(&resolver, &path, out).await,
        Command::Materialize { entries } => materialize(resolver, &entries, out).await,
    }
}

fn build_resolver(cli: &Cli) -> CliResult<SourceResolver> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(cache) = &cli.cache {
        config.cache_path = Some(cache.clone());
    }

    let picker: Arc<dyn DirectoryPicker> = match &cli.root {
        Some(root) => Arc::new(FixedDirectoryPicker::from_path(root)),
        None => Arc::new(PromptDirectoryPicker::stdio()),
    };
    Ok(config.build_resolver(picker)?)
}

async fn resolve(resolver: &SourceResolver, path: &str, out: &mut dyn Write) -> CliResult<()> {
    let source = resolver.safe_fetch(path).await?;

    let status = format!("{} {}", source.status(), source.status_text());
    let status = if source.is_ok() {
        Color::Green.paint(status)
    } else {
        Color::Red.paint(status)
    };
    eprintln!("{} {} ({})", status, path, Color::DarkGray.paint(source.origin().to_string()));

    if !source.is_ok() {
        return Err(CliError::Status {
            path: path.to_string(),
            status: source.status(),
            status_text: source.status_text().to_string(),
        });
    }

    out.write_all(source.text().await?.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Split `target=source`; a bare target is its own source.
pub fn split_entry(entry: &str) -> (&str, &str) {
    entry.split_once('=').unwrap_or((entry, entry))
}

async fn materialize(
    resolver: Arc<SourceResolver>,
    entries: &[String],
    out: &mut dyn Write,
) -> CliResult<()> {
    let fs = Arc::new(MemoryFs::new());
    let writer = VirtualFileWriter::new(fs.clone(), resolver);

    for entry in entries {
        let (target, source) = split_entry(entry);
        writer.load_from_file(target, source).await?;
        eprintln!("{} {}", Color::Green.paint("wrote"), target);
    }

    for path in fs.tree() {
        let depth = path.trim_end_matches('/').matches('/').count();
        let name = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        if path.ends_with('/') {
            writeln!(out, "{}{}/", "  ".repeat(depth), name)?;
        } else {
            writeln!(out, "{}{}", "  ".repeat(depth), name)?;
        }
    }
    Ok(())
}
