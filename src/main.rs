//! fileward - root-confined file operations with trash, action log and undo.
//!
//! Usage:
//!   fileward roots set DIR...        Allow operations inside DIR...
//!   fileward ls [PATH]               List a directory
//!   fileward mv SRC... DEST          Move items into DEST
//!   fileward rm PATH...              Move items to the trash
//!   fileward undo                    Reverse the most recent batch
//!   fileward --help                  Show help

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Context, Result};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use fileward_core::{ActionKind, BatchResult, EngineConfig, FileEntry};
use fileward_ops::Engine;

#[derive(Parser)]
#[command(
    name = "fileward",
    version,
    about = "Root-confined file operations with trash, action log and undo",
    long_about = "fileward moves, renames, creates and trashes files inside a set of \
                  allowed roots. Every change is logged, and the most recent batch \
                  can be undone with `fileward undo`."
)]
struct Cli {
    /// Directory holding the action log, settings and trash
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show details of one path
    Stat { path: PathBuf },

    /// Create a directory
    Mkdir {
        /// Parent directory
        base: PathBuf,
        /// Name of the new directory
        name: String,
    },

    /// Rename a file or directory within its parent
    Rename { src: PathBuf, new_name: String },

    /// Move items into a directory (last argument is the destination)
    Mv {
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Move items to the trash
    Rm {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Reverse the most recent batch
    Undo,

    /// Find entries whose name contains QUERY (case-insensitive)
    Search {
        query: String,
        /// Directory to search in
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show or replace favorite locations
    Favorites {
        #[command(subcommand)]
        action: Option<SetPaths>,
    },

    /// Show or replace the allowed roots
    Roots {
        #[command(subcommand)]
        action: Option<SetPaths>,
    },

    /// Show recent action log entries
    Log {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Show every entry of one batch instead
        #[arg(long, conflicts_with = "limit")]
        batch: Option<String>,
    },

    /// Show what is in the trash
    Trash,
}

#[derive(Subcommand)]
enum SetPaths {
    /// Replace the whole list
    Set { paths: Vec<PathBuf> },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();

    let data_dir = match &cli.data_dir {
        Some(dir) => absolute(dir)?,
        None => EngineConfig::default_data_dir(),
    };
    let engine = Engine::open(EngineConfig::new(data_dir)).context("Failed to open engine")?;
    tracing::debug!(
        data_dir = %engine.config().data_dir.display(),
        trash = %engine.config().trash_root().display(),
        "engine ready"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    runtime.block_on(run(&engine, cli.command, cli.json))
}

/// Log to stderr, filtered by `FILEWARD_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("FILEWARD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(engine: &Engine, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Ls { path } => {
            let entries = engine.list_dir(absolute(&path)?).await?;
            if json {
                print_json(&entries)?;
            } else {
                print_entries(&entries);
            }
        }
        Command::Stat { path } => {
            let stat = engine.stat_path(absolute(&path)?).await?;
            if json {
                print_json(&stat)?;
            } else {
                println!(" {}", stat.path);
                println!("   kind:        {}", if stat.is_dir { "directory" } else { "file" });
                println!("   size:        {}", format_size(stat.size));
                println!("   modified:    {}", stat.modified);
                println!("   created:     {}", stat.created);
                if let Some(permissions) = &stat.permissions {
                    println!("   permissions: {permissions}");
                }
            }
        }
        Command::Mkdir { base, name } => {
            let result = engine.make_dir(absolute(&base)?, &name).await?;
            if json {
                print_json(&result)?;
            } else {
                println!("Created {}", result.path);
            }
        }
        Command::Rename { src, new_name } => {
            let result = engine.rename_path(absolute(&src)?, &new_name).await?;
            if json {
                print_json(&result)?;
            } else {
                println!("Renamed {} -> {}", result.old_path, result.new_path);
            }
        }
        Command::Mv { mut paths } => {
            let Some(dest) = paths.pop() else {
                bail!("Missing destination");
            };
            let sources = paths.iter().map(|p| absolute(p)).collect::<Result<Vec<_>>>()?;
            let result = engine.move_paths(sources, absolute(&dest)?).await?;
            report_batch(&result, ActionKind::Move, json)?;
        }
        Command::Rm { paths } => {
            let targets = paths.iter().map(|p| absolute(p)).collect::<Result<Vec<_>>>()?;
            let result = engine.soft_delete(targets).await?;
            report_batch(&result, ActionKind::Delete, json)?;
        }
        Command::Undo => {
            let result = engine.undo_last_action().await?;
            if json {
                print_json(&result)?;
            } else {
                println!("{}", result.message.as_deref().unwrap_or("Done"));
            }
        }
        Command::Search { query, path } => {
            let entries = engine.search(absolute(&path)?, &query).await?;
            if json {
                print_json(&entries)?;
            } else {
                for entry in &entries {
                    println!("{}", entry.path);
                }
                eprintln!("{} match(es)", entries.len());
            }
        }
        Command::Favorites { action } => {
            if let Some(SetPaths::Set { paths }) = action {
                let paths = paths.iter().map(|p| absolute(p)).collect::<Result<Vec<_>>>()?;
                engine.set_favorites(paths).await?;
            }
            let favorites = engine.get_favorites().await?;
            print_paths(&favorites, json)?;
        }
        Command::Roots { action } => {
            if let Some(SetPaths::Set { paths }) = action {
                let paths = paths.iter().map(|p| absolute(p)).collect::<Result<Vec<_>>>()?;
                engine.set_allowed_roots(paths).await?;
            }
            print_paths(&engine.allowed_roots(), json)?;
        }
        Command::Log { limit, batch } => {
            let entries = match batch {
                Some(batch_id) => engine.get_batch_logs(&batch_id).await?,
                None => engine.get_recent_logs(limit).await?,
            };
            if json {
                print_json(&entries)?;
            } else {
                for entry in &entries {
                    let paths = match (&entry.src_path, &entry.dst_path) {
                        (Some(src), Some(dst)) => format!("{src} -> {dst}"),
                        (Some(path), None) | (None, Some(path)) => path.clone(),
                        (None, None) => String::new(),
                    };
                    println!(
                        "{:>5}  {}  {:<10} {:<7} {}",
                        entry.id, entry.timestamp, entry.action, entry.status, paths
                    );
                    if let Some(message) = &entry.message {
                        println!("       {message}");
                    }
                }
            }
        }
        Command::Trash => {
            let records = engine.trash_contents().await?;
            if json {
                print_json(&records)?;
            } else if records.is_empty() {
                println!(" Trash is empty.");
            } else {
                for record in &records {
                    println!(
                        " {}  {}  (as {})",
                        record.deleted_at,
                        record.original_path.display(),
                        record.staged_name
                    );
                }
            }
        }
    }

    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path: {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_entries(entries: &[FileEntry]) {
    for entry in entries {
        let size = if entry.is_dir {
            "-".to_string()
        } else {
            format_size(entry.size)
        };
        let marker = if entry.is_dir { "/" } else { "" };
        println!(" {:>10}  {}  {}{}", size, entry.modified, entry.name, marker);
    }
}

fn print_paths(paths: &[PathBuf], json: bool) -> Result<()> {
    if json {
        return print_json(paths);
    }
    if paths.is_empty() {
        println!(" (none)");
    }
    for path in paths {
        println!(" {}", path.display());
    }
    Ok(())
}

fn report_batch(result: &BatchResult, action: ActionKind, json: bool) -> Result<()> {
    if json {
        return print_json(result);
    }
    for item in result.results.iter().filter(|item| !item.success) {
        println!(
            " failed: {} ({})",
            item.path,
            item.message.as_deref().unwrap_or("unknown error")
        );
    }
    println!("{}", result.summary(action));
    Ok(())
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
