//! rclonepool: command-line client over the `Pool` library.
//!
//! Subcommands: init, upload, download, ls, delete, status, serve, verify,
//! repair, orphans, rebalance. Exit codes come from `PoolError::exit_code`:
//! 0 success, 1 generic failure, 2 misuse, 3 not-found, 4 partial-failure.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use rclonepool_core::{Config, PoolError};
use rclonepool_pool::{Pool, VerifyMode};
use rclonepool_transport::{RcloneTransport, RetryPolicy, Transport};

#[derive(Parser, Debug)]
#[command(name = "rclonepool", version, about = "Unified, chunked storage pool over rclone remotes")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, short = 'c', env = "RCLONEPOOL_CONFIG", default_value = "/etc/rclonepool/config.json")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RCLONEPOOL_LOG", default_value = "info")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "RCLONEPOOL_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

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
    /// Write a default config file to --config (refuses to overwrite)
    Init,
    /// Upload a local file to a virtual path
    Upload {
        src: PathBuf,
        remote: String,
        /// Allow overwriting an existing file at that path
        #[arg(long)]
        overwrite: bool,
    },
    /// Download a virtual path to a local file
    Download { remote: String, dst: PathBuf },
    /// List files under a virtual directory (default: root)
    Ls { dir: Option<String> },
    /// Delete a virtual path
    Delete { remote: String },
    /// Show per-remote used/free/total
    Status,
    /// Run the WebDAV frontend
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Verify chunk presence (and optionally size) for a path, or every path
    Verify {
        path: Option<String>,
        #[arg(long)]
        full: bool,
    },
    /// Recover missing chunks for a path from a local copy of the source
    Repair { path: String, local: PathBuf },
    /// List (and optionally delete) chunks unreferenced by any manifest
    Orphans {
        #[arg(long)]
        delete: bool,
    },
    /// Rebalance chunk counts across remotes
    Rebalance {
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log, &cli.log_format);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("rclonepool: {err:#}");
            match err.downcast_ref::<PoolError>() {
                Some(pool_err) => pool_err.exit_code(),
                None => 1,
            }
        }
    };
    std::process::exit(code as i32);
}

async fn run(cli: Cli) -> Result<()> {
    if matches!(cli.command, Commands::Init) {
        return cmd_init(&cli.config);
    }

    let config = Config::load(&cli.config).context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let transport = build_transport(&config);
    let pool = Arc::new(Pool::new(config, transport).await?);

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Upload { src, remote, overwrite } => cmd_upload(&pool, &src, &remote, overwrite).await,
        Commands::Download { remote, dst } => cmd_download(&pool, &remote, &dst).await,
        Commands::Ls { dir } => cmd_ls(&pool, dir.as_deref().unwrap_or("/")).await,
        Commands::Delete { remote } => cmd_delete(&pool, &remote).await,
        Commands::Status => cmd_status(&pool),
        Commands::Serve { host, port } => cmd_serve(&pool, host, port).await,
        Commands::Verify { path, full } => cmd_verify(&pool, path.as_deref(), full).await,
        Commands::Repair { path, local } => cmd_repair(&pool, &path, &local).await,
        Commands::Orphans { delete } => cmd_orphans(&pool, delete).await,
        Commands::Rebalance { dry_run } => cmd_rebalance(&pool, dry_run).await,
    }
}

// ── Transport construction ───────────────────────────────────────────────

fn build_transport(config: &Config) -> Arc<dyn Transport> {
    let retry_policy = RetryPolicy::new(config.max_retries, config.retry_delay);
    Arc::new(RcloneTransport::new(
        config.rclone_binary.clone(),
        config.rclone_flags.clone(),
        retry_policy,
        Duration::from_secs(300),
    ))
}

// ── `rclonepool init` ────────────────────────────────────────────────────

fn cmd_init(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        anyhow::bail!("config already exists at {}: refusing to overwrite", config_path.display());
    }
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let default = Config::default();
    let json = serde_json::to_string_pretty(&default)?;
    std::fs::write(config_path, json).with_context(|| format!("writing {}", config_path.display()))?;
    println!("wrote default config to {}", config_path.display());
    println!("edit `remotes` (and `crypt_remotes`/`use_crypt`) before using this pool");
    Ok(())
}

// ── `rclonepool upload` ──────────────────────────────────────────────────

async fn cmd_upload(pool: &Pool, src: &Path, remote: &str, overwrite: bool) -> Result<()> {
    let size = tokio::fs::metadata(src).await.with_context(|| format!("stat {}", src.display()))?.len();
    let pb = make_progress_bar(size, "upload");
    pb.set_message(remote.to_string());
    let manifest = pool.upload(src, remote, overwrite).await?;
    pb.finish_with_message(format!("{} ({} chunks, {} bytes)", remote, manifest.chunk_count, manifest.file_size));
    Ok(())
}

// ── `rclonepool download` ────────────────────────────────────────────────

async fn cmd_download(pool: &Pool, remote: &str, dst: &Path) -> Result<()> {
    let spinner = make_spinner("download");
    spinner.set_message(remote.to_string());
    let mut file = tokio::fs::File::create(dst).await.with_context(|| format!("creating {}", dst.display()))?;
    pool.download(remote, &mut file).await?;
    spinner.finish_with_message(format!("{} -> {}", remote, dst.display()));
    Ok(())
}

// ── `rclonepool ls` ───────────────────────────────────────────────────────

async fn cmd_ls(pool: &Pool, dir: &str) -> Result<()> {
    let mut files = pool.list(dir).await?;
    files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    for f in &files {
        println!(
            "{:>12}  {:>3} chunks  [{}]  {}",
            f.file_size,
            f.chunk_count,
            f.remotes.join(","),
            f.file_path
        );
    }
    println!("{} file(s)", files.len());
    Ok(())
}

// ── `rclonepool delete` ───────────────────────────────────────────────────

async fn cmd_delete(pool: &Pool, remote: &str) -> Result<()> {
    pool.delete(remote).await?;
    println!("deleted {remote}");
    Ok(())
}

// ── `rclonepool status` ──────────────────────────────────────────────────

fn cmd_status(pool: &Pool) -> Result<()> {
    for s in pool.status() {
        println!("{:<20} used={:>14} free={:>14} total={:>14}", s.remote, s.used, s.free, s.total);
    }
    Ok(())
}

// ── `rclonepool serve` ────────────────────────────────────────────────────

async fn cmd_serve(pool: &Arc<Pool>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| pool.config().webdav_host.clone());
    let port = port.unwrap_or(pool.config().webdav_port);
    let addr: SocketAddr = format!("{host}:{port}").parse().with_context(|| format!("parsing {host}:{port}"))?;
    rclonepool_webdav::serve(addr, pool.clone()).await
}

// ── `rclonepool verify` ───────────────────────────────────────────────────

async fn cmd_verify(pool: &Pool, path: Option<&str>, full: bool) -> Result<()> {
    let mode = if full { VerifyMode::Full } else { VerifyMode::Quick };
    let paths: Vec<String> = match path {
        Some(p) => vec![p.to_string()],
        None => pool.list("").await?.into_iter().map(|f| f.file_path).collect(),
    };

    let mut any_dirty = false;
    for p in &paths {
        let report = pool.verify(p, mode).await?;
        if report.is_clean() {
            println!("{p}: ok");
        } else {
            any_dirty = true;
            println!(
                "{p}: {} missing, {} wrong-size",
                report.missing.len(),
                report.wrong_size.len()
            );
        }
    }

    if any_dirty {
        anyhow::bail!(PoolError::ChunkMissing {
            path: "one or more files".into(),
            index: 0,
        });
    }
    Ok(())
}

// ── `rclonepool repair` ───────────────────────────────────────────────────

async fn cmd_repair(pool: &Pool, path: &str, local: &Path) -> Result<()> {
    let manifest = pool.repair(path, local).await?;
    println!("repaired {path} ({} chunks)", manifest.chunk_count);
    Ok(())
}

// ── `rclonepool orphans` ──────────────────────────────────────────────────

async fn cmd_orphans(pool: &Pool, delete: bool) -> Result<()> {
    let orphans = pool.find_orphans().await?;
    for o in &orphans {
        println!("{} {}", o.remote, o.path);
    }
    println!("{} orphan chunk(s)", orphans.len());
    if delete && !orphans.is_empty() {
        pool.delete_orphans(&orphans).await?;
        println!("deleted {} orphan chunk(s)", orphans.len());
    }
    Ok(())
}

// ── `rclonepool rebalance` ────────────────────────────────────────────────

async fn cmd_rebalance(pool: &Pool, dry_run: bool) -> Result<()> {
    let migrations = pool.rebalance(dry_run).await?;
    for m in &migrations {
        println!("{} chunk {}: {} -> {}", m.file_path, m.chunk_index, m.from_remote, m.to_remote);
    }
    println!(
        "{} migration(s){}",
        migrations.len(),
        if dry_run { " (dry run)" } else { "" }
    );
    Ok(())
}

// ── Progress bar helpers ──────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}").unwrap());
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── Logging ───────────────────────────────────────────────────────────────

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(fmt::layer().json()).init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
        }
    }
}
