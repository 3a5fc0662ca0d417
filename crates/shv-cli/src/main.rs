//! shv: shardvault CLI
//!
//! Commands:
//!   upload <path> --owner <id>   - fragment, encrypt, and store a file
//!   download <id> [--out <path>] - verify password, fetch, and reassemble
//!   delete <id>                  - remove fragments, then the record
//!   list --owner <id>            - files owned by an identity
//!   status                       - storage backend health
//!   config show                  - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use shv_core::config::{ShvConfig, StorageBackend};
use shv_core::{FileId, VaultError};
use shv_storage::{JsonRecordStore, OpendalFragmentStore};
use shv_vault::{Vault, VaultOptions};

type CliVault = Vault<OpendalFragmentStore, JsonRecordStore>;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "shv",
    version,
    about = "shardvault client",
    long_about = "shv: store password-encrypted files as fragments in object storage"
)]
struct Cli {
    /// Path to shardvault.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SHV_CONFIG",
        default_value = "/etc/shardvault/config.toml"
    )]
    config: PathBuf,

    /// Log level filter (overrides [log].level)
    #[arg(long, env = "SHV_LOG")]
    log: Option<String>,

    /// Log format (overrides [log].format)
    #[arg(long, env = "SHV_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fragment, encrypt, and upload a local file
    ///
    /// The password is read from SHV_PASSWORD, or prompted for.
    Upload {
        /// Local file
        path: PathBuf,
        /// Owner identity recorded with the file
        #[arg(long, env = "SHV_OWNER")]
        owner: String,
        /// Name stored in the record (default: the local file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Download and reassemble a stored file
    Download {
        /// File id printed by `upload`
        id: String,
        /// Destination path (default: stored name in the current directory)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Delete a stored file and all of its fragments
    Delete {
        /// File id printed by `upload`
        id: String,
    },

    /// List files owned by an identity
    List {
        #[arg(long, env = "SHV_OWNER")]
        owner: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show storage backend and record store status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ShvConfig::load(&cli.config).map_err(public)?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    match cli.command {
        Commands::Upload { path, owner, name } => {
            cmd_upload(&config, &path, &owner, name.as_deref()).await
        }
        Commands::Download { id, out } => cmd_download(&config, &id, out.as_deref()).await,
        Commands::Delete { id } => cmd_delete(&config, &id).await,
        Commands::List { owner, json } => cmd_list(&config, &owner, json),
        Commands::Status => cmd_status(&config).await,
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Vault errors shown to the caller; unknown ids and bad passwords read the same.
fn public(err: VaultError) -> anyhow::Error {
    anyhow::anyhow!(err.public_message())
}

// ── Vault assembly ────────────────────────────────────────────────────────────

/// S3 credentials: standard AWS variables first, then SHV_-prefixed ones.
fn credentials_from_env() -> Option<(String, String)> {
    let access_key = std::env::var("AWS_ACCESS_KEY_ID")
        .or_else(|_| std::env::var("SHV_ACCESS_KEY_ID"))
        .ok()?;
    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .or_else(|_| std::env::var("SHV_SECRET_ACCESS_KEY"))
        .ok()?;
    Some((access_key, secret_key))
}

fn build_operator(config: &ShvConfig) -> Result<opendal::Operator> {
    let creds = match config.storage.backend {
        StorageBackend::S3 => Some(credentials_from_env().context(
            "S3 credentials not set\n\
             Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.",
        )?),
        _ => None,
    };
    let creds = creds.as_ref().map(|(a, s)| (a.as_str(), s.as_str()));
    shv_storage::build_from_core_config(&config.storage, creds).context("building storage operator")
}

fn open_vault(config: &ShvConfig) -> Result<CliVault> {
    let op = build_operator(config)?;
    let db_path = expand_tilde(&config.vault.record_db);
    let records = JsonRecordStore::open(&db_path)
        .with_context(|| format!("opening record store: {}", db_path.display()))?;
    Vault::new(
        OpendalFragmentStore::new(op),
        records,
        VaultOptions::from_config(config),
    )
    .map_err(public)
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

/// SHV_PASSWORD, or an interactive prompt (asked twice when `confirm`).
fn read_password(confirm: bool) -> Result<SecretString> {
    if let Ok(pw) = std::env::var("SHV_PASSWORD") {
        return Ok(SecretString::from(pw));
    }
    let pw = rpassword::prompt_password("Password: ").context("reading password")?;
    if confirm {
        let again = rpassword::prompt_password("Confirm password: ").context("reading password")?;
        if again != pw {
            anyhow::bail!("passwords do not match");
        }
    }
    Ok(SecretString::from(pw))
}

fn parse_id(id: &str) -> Result<FileId> {
    id.parse()
        .map_err(|_| anyhow::anyhow!("not a file id: {id}"))
}

// ── Progress helpers ──────────────────────────────────────────────────────────

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── `shv upload` ──────────────────────────────────────────────────────────────

async fn cmd_upload(
    config: &ShvConfig,
    path: &Path,
    owner: &str,
    name: Option<&str>,
) -> Result<()> {
    let vault = open_vault(config)?;
    let name = match name {
        Some(n) => n.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("no file name in {}", path.display()))?,
    };
    let password = read_password(true)?;

    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;

    let pb = make_spinner("upload");
    pb.set_message(name.clone());
    let result = vault.upload(file, &name, Some(&password), owner).await;
    pb.finish_and_clear();

    let receipt = result.map_err(public)?;
    println!("{}", receipt.file_id);
    println!("  name:      {}", receipt.name);
    println!("  fragments: {}", receipt.fragments);
    println!("  bytes:     {}", fmt_bytes(receipt.bytes));
    Ok(())
}

// ── `shv download` ────────────────────────────────────────────────────────────

async fn cmd_download(config: &ShvConfig, id: &str, out: Option<&Path>) -> Result<()> {
    let vault = open_vault(config)?;
    let file_id = parse_id(id)?;
    let password = read_password(false)?;

    let pb = make_spinner("download");
    pb.set_message(file_id.to_string());
    let result = vault.download(&file_id, Some(&password)).await;
    pb.finish_and_clear();
    let file = result.map_err(public)?;

    let dest = match out {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(
            Path::new(&file.name)
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| file_id.to_string().into()),
        ),
    };
    write_atomic(&dest, &file.bytes).await?;

    info!(file_id = %file_id, dest = %dest.display(), "written");
    println!("{} → {} ({})", file.name, dest.display(), fmt_bytes(file.bytes.len() as u64));
    Ok(())
}

/// Write to a sibling temp file, then rename over `dest`.
async fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file_name = dest
        .file_name()
        .with_context(|| format!("no file name in {}", dest.display()))?;
    let tmp = dest.with_file_name(format!(".{}.shv-tmp", file_name.to_string_lossy()));

    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, dest).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("renaming into {}", dest.display()));
    }
    Ok(())
}

// ── `shv delete` ──────────────────────────────────────────────────────────────

async fn cmd_delete(config: &ShvConfig, id: &str) -> Result<()> {
    let vault = open_vault(config)?;
    let file_id = parse_id(id)?;
    vault.delete(&file_id).await.map_err(public)?;
    println!("deleted {file_id}");
    Ok(())
}

// ── `shv list` ────────────────────────────────────────────────────────────────

fn cmd_list(config: &ShvConfig, owner: &str, json: bool) -> Result<()> {
    // Listing reads records only, so no storage operator (or S3 credentials)
    let db_path = expand_tilde(&config.vault.record_db);
    let records = JsonRecordStore::open(&db_path)
        .with_context(|| format!("opening record store: {}", db_path.display()))?;
    let files = shv_vault::list_files(&records, owner).map_err(public)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&files).context("serializing file list")?
        );
        return Ok(());
    }

    if files.is_empty() {
        println!("no files for {owner}");
        return Ok(());
    }
    println!("{:<36}  {:>10}  {:>5}  NAME", "ID", "SIZE", "FRAGS");
    for f in &files {
        println!(
            "{:<36}  {:>10}  {:>5}  {}",
            f.id,
            fmt_bytes(f.size),
            f.fragments,
            f.name
        );
    }
    Ok(())
}

// ── `shv status` ──────────────────────────────────────────────────────────────

async fn cmd_status(config: &ShvConfig) -> Result<()> {
    let storage = &config.storage;
    let backend = match storage.backend {
        StorageBackend::S3 => format!("s3 {} (bucket {})", storage.endpoint, storage.bucket),
        StorageBackend::Fs => format!("fs {}", storage.root.display()),
        StorageBackend::Memory => "memory".to_string(),
    };

    let health = match build_operator(config) {
        Ok(op) => match shv_storage::check_health(&op).await {
            Ok(h) => format!("ok, {} ms", h.latency.as_millis()),
            Err(e) => format!("UNREACHABLE ({e:#})"),
        },
        Err(e) => format!("NOT CONFIGURED ({e:#})"),
    };

    let db_path = expand_tilde(&config.vault.record_db);
    let records = if db_path.exists() {
        match JsonRecordStore::open(&db_path) {
            Ok(_) => "ok".to_string(),
            Err(e) => format!("UNREADABLE ({e:#})"),
        }
    } else {
        "not created yet".to_string()
    };

    println!("shv v{}", env!("CARGO_PKG_VERSION"));
    println!("  storage:    {backend} [{health}]");
    println!("  records:    {} [{records}]", db_path.display());
    println!("  chunk size: {}", fmt_bytes(config.vault.chunk_size as u64));
    println!("  in flight:  {}", config.vault.max_in_flight);
    Ok(())
}

// ── `shv config show` ─────────────────────────────────────────────────────────

fn cmd_config_show(config: &ShvConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
