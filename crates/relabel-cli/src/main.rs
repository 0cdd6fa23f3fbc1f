//! relabel - consolidate legacy issue labels into priority labels
//!
//! Replays the label history of every closed issue, matches it against the
//! consolidation rules and applies the winning rule's label.

use anyhow::Result;
use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod github;

#[derive(Parser)]
#[command(name = "relabel")]
#[command(about = "Consolidate legacy issue labels into priority labels")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: .relabel/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// GitHub token
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch closed issues and their timelines into the snapshot
    Fetch,

    /// Show the label changes a run would make
    Plan {
        /// Fetch a fresh snapshot first
        #[arg(long)]
        refresh: bool,
    },

    /// Build the plan and apply it
    Apply {
        /// Compute and report the plan without touching any issue
        #[arg(long, env = "RELABEL_DRY_RUN", value_parser = FalseyValueParser::new())]
        dry_run: bool,

        /// Fetch a fresh snapshot first
        #[arg(long)]
        refresh: bool,
    },

    /// Show the active rule table
    Rules,

    /// Show one issue's replayed labels and matching rules
    Replay {
        /// Issue number
        number: u64,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a commented default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let Cli {
        command,
        json,
        config,
        token,
    } = Cli::parse();

    let context = || commands::Context::load(config.clone(), token.clone(), json);

    match command {
        Commands::Fetch => commands::fetch(&context()?).await,
        Commands::Plan { refresh } => commands::plan(&context()?, refresh).await,
        Commands::Apply { dry_run, refresh } => {
            commands::apply(&context()?, dry_run, refresh).await
        }
        Commands::Rules => commands::rules(&context()?),
        Commands::Replay { number } => commands::replay(&context()?, number),
        // Init must work even when the existing file does not parse
        Commands::Config {
            command: Some(ConfigCommands::Init { force }),
        } => commands::config_init(config.as_deref(), force),
        Commands::Config { .. } => commands::config_show(&context()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dry_run(args: &[&str]) -> bool {
        match Cli::try_parse_from(args).unwrap().command {
            Commands::Apply { dry_run, .. } => dry_run,
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_dry_run_flag_and_env() {
        assert!(dry_run(&["relabel", "apply", "--dry-run"]));

        // Only this test touches RELABEL_DRY_RUN
        for (value, expected) in [("1", true), ("true", true), ("0", false), ("off", false)] {
            unsafe { std::env::set_var("RELABEL_DRY_RUN", value) };
            assert_eq!(dry_run(&["relabel", "apply"]), expected, "RELABEL_DRY_RUN={value}");
        }
        unsafe { std::env::remove_var("RELABEL_DRY_RUN") };
        assert!(!dry_run(&["relabel", "apply"]));
    }

    #[test]
    fn test_config_init_parses_without_token() {
        let cli = Cli::try_parse_from(["relabel", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: Some(ConfigCommands::Init { force: true })
            }
        ));
    }
}
