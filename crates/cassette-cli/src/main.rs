//! Cassette CLI
//!
//! Command-line interface for inspecting and managing recordings stored by
//! the filesystem backend

use anyhow::{Context, bail};
use cassette_core::{PersisterConfig, RecordingDocument};
use cassette_persister::Persister;
use cassette_storage::{FileConfigLoader, FilesystemBackend};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "cassette")]
#[command(about = "Cassette - inspect recorded HTTP interactions", long_about = None)]
struct Cli {
    /// Recordings directory (overrides the config file)
    #[arg(long, global = true, env = "CASSETTE_RECORDINGS_DIR")]
    dir: Option<PathBuf>,

    /// Persister config file (JSON, YAML or TOML)
    #[arg(long, global = true, env = "CASSETTE_CONFIG")]
    config: Option<PathBuf>,

    /// Default log level (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List stored recording IDs
    List,
    /// Show a recording's metadata and entries
    Show {
        recording_id: String,
    },
    /// Print a single entry as JSON
    Entry {
        recording_id: String,
        /// Request ID (`_id`)
        id: String,
        /// Request order (`_order`)
        order: u32,
    },
    /// Delete a recording
    Delete {
        recording_id: String,
    },
    /// Load and validate a config file
    CheckConfig {
        path: PathBuf,
    },
}

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_config(config: Option<&Path>, dir: Option<&Path>) -> anyhow::Result<PersisterConfig> {
    let mut config = match config {
        Some(path) => FileConfigLoader::new(path)
            .load()
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PersisterConfig::default(),
    };

    if let Some(dir) = dir {
        config.recordings_dir = dir.to_path_buf();
    }
    Ok(config)
}

fn open_persister(cli: &Cli) -> anyhow::Result<Persister<FilesystemBackend>> {
    let config = load_config(cli.config.as_deref(), cli.dir.as_deref())?;
    let backend = FilesystemBackend::new(&config.recordings_dir);
    tracing::debug!(dir = %backend.base_path().display(), "Using recordings directory");
    Ok(Persister::with_config(backend, config))
}

/// Load and validate a config file on its own, ignoring `--dir`
fn check_config(path: &Path) -> anyhow::Result<PersisterConfig> {
    FileConfigLoader::new(path)
        .load()
        .with_context(|| format!("invalid config {}", path.display()))
}

fn render_recording(recording_id: &str, recording: &RecordingDocument) -> String {
    let log = &recording.log;
    let mut out = format!(
        "{} ({})\ncreator: {} {}\nentries: {}\n",
        log.recording_name,
        recording_id,
        log.creator.name,
        log.creator.version,
        log.entries.len()
    );
    for entry in &log.entries {
        out.push_str(&format!(
            "  {} #{}  {} {} -> {}\n",
            entry.id, entry.order, entry.request.method, entry.request.url, entry.response.status
        ));
    }
    out
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match &cli.command {
        Commands::List => {
            let persister = open_persister(&cli)?;
            for id in persister.backend().list_recordings().await? {
                println!("{}", id);
            }
        }
        Commands::Show { recording_id } => {
            let persister = open_persister(&cli)?;
            let Some(recording) = persister.find(recording_id).await? else {
                bail!("recording '{}' not found", recording_id);
            };
            print!("{}", render_recording(recording_id, &recording));
        }
        Commands::Entry {
            recording_id,
            id,
            order,
        } => {
            let persister = open_persister(&cli)?;
            let Some(recording) = persister.find(recording_id).await? else {
                bail!("recording '{}' not found", recording_id);
            };
            let Some(entry) = recording.log.entry(id, *order) else {
                bail!("no entry {} #{} in recording '{}'", id, order, recording_id);
            };
            println!("{}", serde_json::to_string_pretty(entry)?);
        }
        Commands::Delete { recording_id } => {
            let persister = open_persister(&cli)?;
            persister.delete(recording_id).await?;
            println!("Deleted {}", recording_id);
        }
        Commands::CheckConfig { path } => {
            let config = check_config(path)?;
            println!("{} is valid", path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
