// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Laika - compliance automation core.
//!
//! Binary entry point: integrations polling, alert delivery, digests, and
//! the command gateway.

mod app;
mod commands;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use laika_config::LaikaConfig;
use miette::IntoDiagnostic;

use crate::commands::VaultAction;

/// Laika - compliance automation core.
#[derive(Parser, Debug)]
#[command(name = "laika", version, about, long_about = None)]
struct Cli {
    /// Config file to load instead of the standard search path.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run workers, schedulers, and the gateway until interrupted.
    Serve,
    /// Poll integrations once.
    Poll {
        /// Only this connection account; default is every due connection.
        #[arg(long)]
        connection: Option<String>,
    },
    /// Send the daily and audit digests now.
    Digest,
    /// Search an organization's launchpad.
    Launchpad {
        organization_id: String,
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Manage the encrypted vault.
    Vault {
        #[command(subcommand)]
        action: VaultCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration with secrets masked.
    Show,
    /// Validate the configuration and exit.
    Check,
}

#[derive(Subcommand, Debug)]
enum VaultCommand {
    /// Create the vault if it does not exist yet.
    Init,
    /// Store a secret read from stdin.
    Set { name: String },
    /// List secret names with masked previews.
    List,
    /// Delete a secret.
    Delete { name: String },
    /// Re-wrap the master key under a new passphrase read from stdin.
    RotatePassphrase,
}

impl From<VaultCommand> for VaultAction {
    fn from(command: VaultCommand) -> Self {
        match command {
            VaultCommand::Init => VaultAction::Init,
            VaultCommand::Set { name } => VaultAction::Set(name),
            VaultCommand::List => VaultAction::List,
            VaultCommand::Delete { name } => VaultAction::Delete(name),
            VaultCommand::RotatePassphrase => VaultAction::RotatePassphrase,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> miette::Result<LaikaConfig> {
    let loaded = match path {
        Some(path) => laika_config::load_and_validate_path(path),
        None => laika_config::load_and_validate(),
    };
    loaded.map_err(|errors| {
        laika_config::render_errors(&errors);
        miette::miette!("configuration is invalid ({} problem(s))", errors.len())
    })
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("laika={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.service.log_level);

    match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await.into_diagnostic(),
        Some(Commands::Poll { connection }) => commands::poll(config, connection).await.into_diagnostic(),
        Some(Commands::Digest) => commands::digest(config).await.into_diagnostic(),
        Some(Commands::Launchpad {
            organization_id,
            query,
        }) => commands::launchpad(&config, &organization_id, query.as_deref())
            .await
            .into_diagnostic(),
        Some(Commands::Config { action }) => match action {
            ConfigCommand::Show => {
                let shown = commands::show_config(&config).into_diagnostic()?;
                print!("{shown}");
                Ok(())
            }
            ConfigCommand::Check => {
                println!("configuration is valid");
                Ok(())
            }
        },
        Some(Commands::Vault { action }) => commands::vault(&config, action.into()).await.into_diagnostic(),
        None => {
            println!("laika: use --help for available commands");
            Ok(())
        }
    }
}
