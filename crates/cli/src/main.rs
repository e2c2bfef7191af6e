//! EC2 inventory CLI
//!
//! A command-line tool for browsing dated inventory snapshots, comparing
//! them day over day and exporting them to the CMDB.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{cmdb, compare, snapshots, StoreTarget};
use inventory_lib::store::DEFAULT_TABLE_NAME;
use std::path::PathBuf;

/// EC2 inventory snapshot CLI
#[derive(Parser)]
#[command(name = "invctl")]
#[command(author, version, about = "CLI for EC2 inventory snapshots", long_about = None)]
pub struct Cli {
    /// Snapshot table (can also be set via INVCTL_TABLE env var)
    #[arg(long, env = "INVCTL_TABLE")]
    pub table: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List snapshots recorded on a date
    Snapshots {
        /// Snapshot date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Only show this name tag
        #[arg(long, short)]
        tag: Option<String>,
    },

    /// Compare a name tag's snapshots with an earlier date
    Compare {
        /// Name tag to compare
        tag: String,

        /// Later date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Days between the two snapshots
        #[arg(long, default_value_t = 1)]
        offset: u32,

        /// Ignore row order when comparing
        #[arg(long)]
        unordered: bool,

        /// Exit with status 1 when the snapshots differ
        #[arg(long)]
        exit_code: bool,
    },

    /// CMDB export and synchronisation
    #[command(subcommand)]
    Cmdb(CmdbCommands),

    /// Show or update the CLI configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum CmdbCommands {
    /// Write configuration-item payloads for a date as JSON
    Export {
        /// Snapshot date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        #[arg(long, short)]
        tag: Option<String>,

        /// Output file path (stdout if not specified)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Send configuration items for a date to the CMDB
    Push {
        /// Snapshot date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        #[arg(long, short)]
        tag: Option<String>,

        /// CMDB web service base URL
        #[arg(long, env = "INVCTL_CMDB_URL")]
        url: Option<String>,

        /// JSON file with the CMDB service credentials
        #[arg(long, env = "INVCTL_CMDB_CREDENTIALS")]
        credentials: Option<PathBuf>,

        /// Create new items instead of updating existing ones
        #[arg(long)]
        create: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration file
    Show,

    /// Store defaults in the configuration file
    Set {
        #[arg(long)]
        table: Option<String>,

        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        cmdb_url: Option<String>,

        #[arg(long)]
        cmdb_credentials: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let file_config = config::Config::load()?;

    let target = StoreTarget {
        table: cli
            .table
            .or(file_config.table.clone())
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
        region: cli.region.or(file_config.region.clone()),
    };

    match cli.command {
        Commands::Snapshots { date, tag } => {
            let date = commands::parse_date(date.as_deref())?.to_string();
            snapshots::list_snapshots(&target, &date, tag, cli.format).await?;
        }
        Commands::Compare {
            tag,
            date,
            offset,
            unordered,
            exit_code,
        } => {
            let differs =
                compare::compare_snapshots(&target, &tag, date.as_deref(), offset, unordered, cli.format)
                    .await?;
            if exit_code && differs {
                std::process::exit(1);
            }
        }
        Commands::Cmdb(cmdb_cmd) => match cmdb_cmd {
            CmdbCommands::Export { date, tag, output } => {
                let date = commands::parse_date(date.as_deref())?.to_string();
                cmdb::export(&target, &date, tag, output).await?;
            }
            CmdbCommands::Push {
                date,
                tag,
                url,
                credentials,
                create,
            } => {
                let date = commands::parse_date(date.as_deref())?.to_string();
                let cmdb_target = cmdb::CmdbTarget {
                    url: url
                        .or(file_config.cmdb_url.clone())
                        .context("CMDB URL is required (--url or config set --cmdb-url)")?,
                    credentials: credentials
                        .or(file_config.cmdb_credentials.clone())
                        .context("CMDB credentials file is required")?,
                };
                cmdb::push(&target, &cmdb_target, &date, tag, create, cli.format).await?;
            }
        },
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => {
                println!("{}", serde_json::to_string_pretty(&file_config)?);
            }
            ConfigCommands::Set {
                table,
                region,
                cmdb_url,
                cmdb_credentials,
            } => {
                let mut updated = file_config;
                updated.merge(config::Config {
                    table,
                    region,
                    cmdb_url,
                    cmdb_credentials,
                });
                let path = updated.save()?;
                output::print_success(&format!("Saved configuration to {}", path.display()));
            }
        },
    }

    Ok(())
}
