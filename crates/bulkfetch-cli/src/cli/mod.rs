//! CLI for bulkfetch.

mod commands;
mod credentials;

use anyhow::Result;
use bulkfetch_core::config;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_download, run_forbidden, run_login};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "bulkfetch")]
#[command(about = "bulkfetch: download a list of files behind a login, renewing the session as it expires", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Who to log in as.
#[derive(Debug, Clone, Args)]
pub struct CredentialArgs {
    /// Account name.
    #[arg(long, short = 'u')]
    pub user: String,

    /// Password on the command line (visible to other local users; prefer --password-stdin).
    #[arg(long, conflicts_with = "password_stdin", required_unless_present = "password_stdin")]
    pub password: Option<String>,

    /// Read the password from the first line of stdin.
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every file listed in a manifest.
    Run {
        /// JSON manifest: array of {"url", "dest", "file_id"}.
        #[arg(long, value_name = "FILE")]
        manifest: PathBuf,

        #[command(flatten)]
        credentials: CredentialArgs,

        /// Directory for downloads and forbidden.json.
        #[arg(long, default_value = "results", value_name = "DIR")]
        out_dir: PathBuf,

        /// Number of parallel downloads (overrides config).
        #[arg(long, value_name = "N")]
        workers: Option<usize>,

        /// Keep files that already exist instead of downloading them again.
        #[arg(long)]
        no_overwrite: bool,

        /// Try files recorded as forbidden by earlier runs again.
        #[arg(long)]
        ignore_forbidden: bool,
    },

    /// Perform a single login and report the result.
    Login {
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// List (or clear) the files recorded as forbidden.
    Forbidden {
        /// Directory holding forbidden.json.
        #[arg(long, default_value = "results", value_name = "DIR")]
        out_dir: PathBuf,

        /// Delete the list.
        #[arg(long)]
        clear: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Run {
                manifest,
                credentials,
                out_dir,
                workers,
                no_overwrite,
                ignore_forbidden,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let creds = credentials::resolve(&credentials)?;
                let args = commands::RunArgs {
                    manifest,
                    out_dir,
                    workers,
                    no_overwrite,
                    ignore_forbidden,
                };
                run_download(&cfg, creds, args).await?;
            }
            CliCommand::Login { credentials } => {
                let cfg = config::load_or_init()?;
                let creds = credentials::resolve(&credentials)?;
                run_login(&cfg, creds).await?;
            }
            CliCommand::Forbidden { out_dir, clear } => run_forbidden(&out_dir, clear).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
