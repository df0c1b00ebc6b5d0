//! Filegate CLI: command-line client for the Filegate API.
//!
//! Set FILEGATE_API_KEY and FILEGATE_API_URL (or API_URL). Uses X-API-Key auth.

use anyhow::Context;
use clap::{Parser, Subcommand};
use filegate_api_client::ApiClient;
use filegate_cli::{format_object_row, init_tracing};
use filegate_core::models::{PermissionLevel, Principal, Visibility};
use filegate_core::{TokenClaims, TokenCodec};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "filegate", about = "Filegate API CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file; large files go up in parts
    Upload {
        /// Path to the file to upload
        file: std::path::PathBuf,
        /// Object key (defaults to the file name)
        #[arg(long)]
        key: Option<String>,
        /// PUBLIC, INTERNAL or PRIVATE
        #[arg(long, default_value = "PRIVATE")]
        visibility: Visibility,
    },
    /// Download an object
    Download {
        /// Object key
        key: String,
        /// Output path (defaults to stdout)
        #[arg(long, short)]
        output: Option<std::path::PathBuf>,
    },
    /// List visible objects
    List {
        /// Maximum number of items
        #[arg(long, default_value = "100")]
        limit: usize,
        /// Output format: json or table
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show what a fetch of an object reports
    Metadata {
        /// Object key
        key: String,
    },
    /// Issue a one-time download link
    SignedUrl {
        /// Object key
        key: String,
    },
    /// Mint a credential locally
    MintToken {
        /// Employee id
        #[arg(long)]
        id: String,
        /// Company id
        #[arg(long)]
        company: String,
        /// Permission level: 1 read, 2 write, 3 admin
        #[arg(long, default_value = "1")]
        level: i64,
        /// Lifetime in seconds
        #[arg(long, default_value = "3600")]
        ttl: i64,
        /// Signing secret (defaults to JWT_SECRET)
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn client() -> anyhow::Result<ApiClient> {
    ApiClient::from_env().context(
        "Failed to create API client. Set FILEGATE_API_KEY and FILEGATE_API_URL (or API_URL)",
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload {
            file,
            key,
            visibility,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read file: {}", file.display()))?;
            let key = match key {
                Some(key) => key,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(String::from)
                    .context("Cannot derive a key from the file name; pass --key")?,
            };
            let response = client()?
                .upload_file(bytes::Bytes::from(data), &key, visibility)
                .await?;
            print_json(&response)?;
        }
        Commands::Download { key, output } => {
            let content = client()?.download_file(&key).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &content)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Wrote {} bytes to {}", content.len(), path.display());
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&content)?;
                }
            }
        }
        Commands::List { limit, format } => {
            let page = client()?.list_files(Some(limit)).await?;
            if format == "json" {
                print_json(&page)?;
            } else {
                for object in &page.objects {
                    println!("{}", format_object_row(object));
                }
                if page.truncated {
                    eprintln!("(more results available)");
                }
            }
        }
        Commands::Metadata { key } => {
            let summary = client()?.get_file_metadata(&key).await?;
            print_json(&summary)?;
        }
        Commands::SignedUrl { key } => {
            let url = client()?.get_signed_url(&key).await?;
            print_json(&serde_json::json!({ "url": url }))?;
        }
        Commands::MintToken {
            id,
            company,
            level,
            ttl,
            secret,
        } => {
            let permission_level =
                PermissionLevel::try_from(level).map_err(|e| anyhow::anyhow!(e))?;
            let principal = Principal::new(id, company, permission_level);
            let token = TokenCodec::issue(&TokenClaims::for_principal(&principal, ttl), &secret)?;
            println!("{}", token);
        }
    }

    Ok(())
}
