//! vault-reader: Offline-first reader for vaults mirrored from a remote hierarchy.
//!
//! The remote is a local directory (`--remote`); everything read through it
//! is cached under `--cache-dir` and stays readable when the remote is gone.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vault_cache::{BrowseOptions, CacheStatus, EmbedResolution, RemoteSource, SortOrder, VaultReader};
use vault_reader::{Config, DirectoryRemote};

#[derive(Parser, Debug)]
#[command(name = "vault-reader")]
#[command(about = "Offline-first reader for remote vaults")]
struct Args {
    /// Directory for the local cache (defaults to the platform cache dir)
    #[arg(long, env = "VAULT_READER_CACHE_DIR")]
    cache_dir: Option<String>,

    /// Directory acting as the remote hierarchy
    #[arg(long, env = "VAULT_READER_REMOTE")]
    remote: String,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select a folder of the remote as the active vault
    Select {
        /// Remote path of the vault root
        root: String,
    },
    /// Deselect the vault and drop its cached data
    Clear,
    /// Drop all cached data but keep the vault selected
    ClearCache,
    /// Show the selected vault and cache sizes
    Status,
    /// Index the vault (or one folder of it) from the remote
    Sync {
        /// Vault-relative folder; the whole tree when omitted
        folder: Option<String>,
    },
    /// List indexed files in a folder
    Ls {
        #[arg(default_value = "")]
        folder: String,

        /// Only names containing this (case-insensitive)
        #[arg(long)]
        query: Option<String>,

        /// newest, oldest, name-asc or name-desc
        #[arg(long, default_value = "newest")]
        sort: SortOrder,
    },
    /// Print a note by vault-relative path
    Read { path: String },
    /// Resolve a wiki link to its slug and note
    Link { name: String },
    /// Find the note a slug belongs to
    Slug { slug: String },
    /// Resolve an embedded-resource reference
    Embed {
        raw: String,

        /// Vault-relative path of the note containing the reference
        #[arg(long)]
        from: String,
    },
    /// List queued write-back operations
    Pending,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,vault_cache=debug"
    } else {
        "info,vault_cache=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(args.cache_dir.as_deref(), &args.remote).context("Failed to load configuration")?;
    info!("Cache directory: {:?}", config.cache_dir);

    let remote = Arc::new(DirectoryRemote::new(config.remote_root.clone()));
    let reader = VaultReader::open(config.store_dir(), remote, config.cache.clone())
        .await
        .with_context(|| format!("Failed to open cache at {:?}", config.store_dir()))?;

    run(&reader, args.command).await
}

async fn run<R: RemoteSource>(reader: &VaultReader<R>, command: Command) -> Result<()> {
    match command {
        Command::Select { root } => {
            let item = reader
                .remote()
                .fetch_by_path(&root)
                .await
                .with_context(|| format!("Cannot select '{}'", root))?;
            if !item.is_folder {
                bail!("'{}' is not a folder", root);
            }
            let boundary = reader.boundary().select(&root, &item.name, &item.id).await?;
            println!("Selected vault {} ({})", boundary.root_name, boundary.root_path);
        }
        Command::Clear => {
            reader.boundary().clear().await?;
            println!("Vault deselected");
        }
        Command::ClearCache => {
            reader.boundary().clear_cache().await?;
            println!("Cache cleared");
        }
        Command::Status => {
            match reader.boundary().current().await {
                Some(vault) => println!(
                    "Vault: {} ({}), selected {}",
                    vault.root_name,
                    vault.root_path,
                    vault.selected_at.format("%Y-%m-%d %H:%M")
                ),
                None => println!("Vault: none selected"),
            }
            let store = reader.store();
            println!("Indexed entries: {}", store.files.len().await);
            println!("Cached notes: {}", store.content.len().await);
            println!("Cached attachments: {}", store.attachments.len().await);
            println!("Pending operations: {}", store.pending.len().await);
        }
        Command::Sync { folder } => match folder {
            Some(folder) => {
                let rows = reader.index().sync_folder(&folder).await?;
                println!("Indexed {} entries in '{}'", rows.len(), folder);
            }
            None => {
                let report = reader.index().sync_tree().await?;
                println!("Indexed {} files in {} folders", report.files, report.folders);
            }
        },
        Command::Ls { folder, query, sort } => {
            let files = reader.index().browse(&folder, &BrowseOptions { query, sort }).await;
            for file in files {
                let status = match reader.index().cache_status(&file.remote_id).await {
                    CacheStatus::Fresh => "cached",
                    CacheStatus::Stale => "stale",
                    CacheStatus::Missing => "-",
                };
                let modified = file
                    .last_modified
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{:<8} {:>10} {:<16} {}",
                    status,
                    file.size.map(|s| s.to_string()).unwrap_or_default(),
                    modified,
                    file.name
                );
            }
        }
        Command::Read { path } => {
            let note = reader
                .open_note_at(&path)
                .await
                .with_context(|| format!("Cannot read '{}'", path))?;
            print!("{}", note.content);
        }
        Command::Link { name } => match reader.links().resolve_document(&name).await {
            Some(doc) => {
                let slug = reader.links().resolve(&name).await.unwrap_or_default();
                println!("{}\t{}", slug, doc.path);
            }
            None => bail!("No note named '{}'", name),
        },
        Command::Slug { slug } => match reader.links().slug_to_id(&slug).await {
            Some(id) => {
                let path = reader.index().get(&id).await.map(|f| f.path).unwrap_or_default();
                println!("{}\t{}", id, path);
            }
            None => bail!("No note with slug '{}'", slug),
        },
        Command::Embed { raw, from } => match reader.embeds().resolve(&raw, &from).await {
            EmbedResolution::Resolved(handle) => {
                println!("{}\t{}\t{} bytes", handle.path, handle.mime_type, handle.len());
                handle.revoke();
            }
            EmbedResolution::Unresolved { path } => bail!("Unresolved embed: {}", path),
        },
        Command::Pending => {
            for op in reader.pending().list().await {
                println!(
                    "{}\t{}\t{}\t{}\tretries={}",
                    op.id,
                    op.change.kind(),
                    op.remote_id,
                    op.timestamp.to_rfc3339(),
                    op.retry_count
                );
            }
        }
    }

    Ok(())
}
