use std::collections::HashSet;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guildvault::capture::{CaptureOptions, Exclude, ImageMode, capture};
use guildvault::config::VaultConfig;
use guildvault::remote::http::HttpGuildHost;
use guildvault::restore::{RestoreOptions, restore};
use guildvault::snapshot::storage::SnapshotStore;

#[derive(Parser)]
#[command(name = "guildvault", version, about = "Snapshot and restore guild workspaces")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "guildvault.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture a guild into a stored snapshot.
    Backup {
        guild_id: String,
        /// Most recent messages kept per channel (default 10).
        #[arg(long)]
        max_messages: Option<usize>,
        /// Also record the member list.
        #[arg(long)]
        members: bool,
        /// Download images into the document instead of storing URLs.
        #[arg(long)]
        inline_images: bool,
        /// Sections to skip: bans, roles, emojis, channels.
        #[arg(long, value_delimiter = ',')]
        skip: Vec<String>,
    },
    /// Replay a stored snapshot onto a target guild.
    Restore {
        snapshot_id: String,
        guild_id: String,
        /// Keep existing entities instead of clearing the guild first.
        #[arg(long)]
        keep_existing: bool,
        /// Most recent messages replayed per channel (default 100).
        #[arg(long)]
        max_messages: Option<usize>,
    },
    /// List stored snapshot ids.
    List,
    /// Show details of a stored snapshot.
    Info { snapshot_id: String },
    /// Delete a stored snapshot.
    Delete { snapshot_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = VaultConfig::load(&cli.config);
    let store = SnapshotStore::new(&config.storage.dir);

    match cli.command {
        Command::Backup {
            guild_id,
            max_messages,
            members,
            inline_images,
            skip,
        } => {
            let host = connect(&config, &guild_id)?;
            let options = CaptureOptions {
                max_messages_per_channel: max_messages.unwrap_or(10),
                include_members: members,
                image_mode: if inline_images {
                    ImageMode::Inline
                } else {
                    ImageMode::Url
                },
                exclude: parse_excludes(&skip)?,
            };
            let document = capture(&host, &options).await?;
            let path = store.save(&document)?;
            info!(id = %document.id, path = %path.display(), "backup complete");
            println!("{}", document.id);
        }
        Command::Restore {
            snapshot_id,
            guild_id,
            keep_existing,
            max_messages,
        } => {
            let document = store
                .load(&snapshot_id)
                .with_context(|| format!("loading snapshot {snapshot_id}"))?;
            let host = connect(&config, &guild_id)?;
            let options = RestoreOptions {
                clear_before_restore: !keep_existing,
                max_messages_per_channel: max_messages.unwrap_or(100),
                cancel: cancel_on_ctrl_c(),
                ..Default::default()
            };
            let report = restore(&host, &document, &options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::List => {
            for id in store.list()? {
                println!("{id}");
            }
        }
        Command::Info { snapshot_id } => {
            let info = store.info(&snapshot_id)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Delete { snapshot_id } => {
            store.delete(&snapshot_id)?;
            println!("deleted {snapshot_id}");
        }
    }
    Ok(())
}

fn connect(config: &VaultConfig, guild_id: &str) -> anyhow::Result<HttpGuildHost> {
    if config.api.token.is_empty() {
        bail!("no API token configured; set api.token in the config file or GUILDVAULT_TOKEN");
    }
    Ok(HttpGuildHost::new(&config.api, guild_id)?)
}

fn parse_excludes(items: &[String]) -> anyhow::Result<HashSet<Exclude>> {
    let mut excludes = HashSet::new();
    for item in items {
        let exclude = match item.trim().to_ascii_lowercase().as_str() {
            "bans" => Exclude::Bans,
            "roles" => Exclude::Roles,
            "emojis" => Exclude::Emojis,
            "channels" => Exclude::Channels,
            other => bail!("unknown --skip section '{other}' (expected bans, roles, emojis, channels)"),
        };
        excludes.insert(exclude);
    }
    Ok(excludes)
}

/// A token that trips on the first Ctrl-C, letting in-flight sub-tasks
/// wind down instead of being killed mid-mutation.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested, finishing in-flight work");
            trigger.cancel();
        }
    });
    cancel
}
