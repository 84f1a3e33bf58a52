//! pan123 CLI - Interact with a 123pan drive.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pan123::config::{DEFAULT_BASE_URL, DEFAULT_STATE_FILE};
use pan123::{
    ClientConfig, File, ListQuery, OrderBy, OrderDirection, PanClient, ShareExpiry,
    TreeMaterializer, TreeOptions,
};

/// CLI tool for interacting with a 123pan drive through the open platform.
#[derive(Parser)]
#[command(name = "pan123")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Open platform client ID.
    #[arg(long, env = "PAN123_CLIENT_ID")]
    client_id: String,

    /// Open platform client secret.
    #[arg(long, env = "PAN123_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// File the access token is cached in.
    #[arg(long, env = "PAN123_STATE_FILE", default_value = DEFAULT_STATE_FILE)]
    state_file: PathBuf,

    /// API base URL.
    #[arg(long, env = "PAN123_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show account information.
    User,

    /// List one page of a folder.
    List {
        /// Folder ID (0 is the root).
        #[arg(default_value_t = 0)]
        parent: i64,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Entries per page (at most 100).
        #[arg(long, default_value_t = 100)]
        limit: u32,

        #[arg(long, value_enum, default_value_t = SortKey::FileName)]
        order_by: SortKey,

        /// Sort descending.
        #[arg(long)]
        desc: bool,

        /// List the recycle bin.
        #[arg(long)]
        trashed: bool,

        /// Search keyword.
        #[arg(long)]
        search: Option<String>,
    },

    /// Print the whole tree below a folder.
    Tree {
        /// Folder ID (0 is the root).
        #[arg(default_value_t = 0)]
        folder: i64,

        /// Sibling folders to expand in parallel.
        #[arg(long, short = 'j', default_value_t = 1)]
        concurrency: usize,

        /// Only read the first page of every folder.
        #[arg(long)]
        single_page: bool,

        /// Print the tree as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create a share link.
    Share {
        /// File or folder IDs to share.
        #[arg(required = true)]
        files: Vec<i64>,

        /// Title of the share.
        #[arg(long)]
        name: String,

        /// Validity in days: 0 (permanent), 1, 7 or 30.
        #[arg(long, default_value = "0", value_parser = parse_expiry)]
        expire: ShareExpiry,

        /// Extraction code.
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortKey {
    FileId,
    Size,
    FileName,
}

impl From<SortKey> for OrderBy {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::FileId => OrderBy::FileId,
            SortKey::Size => OrderBy::Size,
            SortKey::FileName => OrderBy::FileName,
        }
    }
}

fn parse_expiry(value: &str) -> std::result::Result<ShareExpiry, String> {
    let days: u32 = value
        .parse()
        .map_err(|_| format!("not a number of days: {}", value))?;
    ShareExpiry::from_days(days).ok_or_else(|| "expiry must be 0, 1, 7 or 30".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pan123=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = ClientConfig::new(cli.client_id, cli.client_secret)
        .with_base_url(cli.base_url)
        .with_state_path(&cli.state_file);
    let client = PanClient::new(config).context("Failed to create HTTP client")?;

    match cli.command {
        Commands::User => {
            let profile = client
                .user_info()
                .await
                .context("Failed to fetch user info")?;
            println!("{}", profile);
        }

        Commands::List {
            parent,
            page,
            limit,
            order_by,
            desc,
            trashed,
            search,
        } => {
            let direction = if desc {
                OrderDirection::Desc
            } else {
                OrderDirection::Asc
            };
            let mut query = ListQuery::children_of(parent)
                .page(page)
                .limit(limit)
                .order(order_by.into(), direction);
            if trashed {
                query = query.trashed(true);
            }
            if let Some(keyword) = search {
                query = query.search(keyword);
            }

            match client.list_files(&query).await {
                Ok(list) if !list.entries.is_empty() => {
                    println!("{}", File::TABLE_HEADER);
                    println!("{}", "-".repeat(60));
                    for file in &list.entries {
                        println!("{}", file);
                    }
                    println!("{} of {} entries", list.entries.len(), list.total);
                }
                Ok(_) => println!("No files found."),
                Err(e) if e.is_empty_directory() => println!("No files found."),
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to list folder: {}", parent))
                }
            }
        }

        Commands::Tree {
            folder,
            concurrency,
            single_page,
            json,
        } => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let options = TreeOptions {
                follow_pages: !single_page,
                concurrency,
                ..TreeOptions::default()
            };
            let tree = TreeMaterializer::with_options(&client, options)
                .materialize_with_cancel(folder, &cancel)
                .await
                .with_context(|| format!("Failed to build tree for folder: {}", folder))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                print!("{}", tree);
                eprintln!("{} entries", tree.leaf_count());
            }
        }

        Commands::Share {
            files,
            name,
            expire,
            password,
        } => {
            let link = client
                .create_share_link(&name, expire, &files, password.as_deref())
                .await
                .context("Failed to create share link")?;
            println!("Share ID:  {}", link.share_id);
            println!("Share key: {}", link.share_key);
            println!("URL:       {}", link.share_url);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expiry() {
        assert_eq!(parse_expiry("0").unwrap(), ShareExpiry::Permanent);
        assert_eq!(parse_expiry("30").unwrap(), ShareExpiry::ThirtyDays);
        assert!(parse_expiry("3").is_err());
        assert!(parse_expiry("week").is_err());
    }

    #[test]
    fn test_cli_parses_tree_command() {
        let cli = Cli::try_parse_from([
            "pan123",
            "--client-id",
            "id",
            "--client-secret",
            "secret",
            "tree",
            "42",
            "-j",
            "4",
        ])
        .unwrap();

        match cli.command {
            Commands::Tree {
                folder,
                concurrency,
                single_page,
                json,
            } => {
                assert_eq!(folder, 42);
                assert_eq!(concurrency, 4);
                assert!(!single_page);
                assert!(!json);
            }
            _ => panic!("expected tree command"),
        }
    }
}
