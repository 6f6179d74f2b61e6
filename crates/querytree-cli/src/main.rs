//! Querytree CLI
//!
//! Builds small demo trees and prints them, for eyeballing builder output
//! and pool behavior.

mod scenarios;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use querytree_ir::{dump, Command, CommandConfig};
use querytree_md::MetadataWorkspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use scenarios::Scenario;

#[derive(Parser)]
#[command(name = "querytree")]
#[command(author, version, about = "Querytree: canonical query tree builder")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a demo tree and print it
    Dump {
        #[arg(value_enum)]
        scenario: Scenario,

        /// JSON command config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Disable VarVec and enumerator pooling
        #[arg(long)]
        no_pooling: bool,
    },

    /// Print the effective command config as JSON
    Config {
        /// JSON command config
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<CommandConfig> {
    let config = match path {
        Some(path) => {
            let config = CommandConfig::from_path(path)
                .with_context(|| format!("loading {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config file");
            config
        }
        None => CommandConfig::default(),
    };
    let config = config.with_env_overrides();
    tracing::debug!(?config, "effective config");
    Ok(config)
}

fn cmd_dump(scenario: Scenario, config: Option<&Path>, no_pooling: bool) -> Result<()> {
    let mut config = load_config(config)?;
    if no_pooling {
        config.var_vec_pooling = false;
        config.enumerator_pooling = false;
    }

    let md = Arc::new(MetadataWorkspace::new());
    let schema = scenarios::schema(&md)?;
    let mut cmd = Command::with_config(Arc::clone(&md), config)?;
    let root = scenarios::build(&mut cmd, &schema, scenario)?;
    tracing::debug!(?scenario, root = root.raw(), nodes = cmd.node_count(), "built scenario");
    let keys = cmd.pull_up_keys(root);
    tracing::debug!(no_keys = keys.no_keys(), "pulled up keys");

    println!("{} {:?}", "scenario".bold(), scenario);
    print!("{}", dump(&cmd, root));
    println!(
        "{} {} nodes, {} vars",
        "built".green(),
        cmd.node_count(),
        cmd.var_id_count()
    );
    if keys.no_keys() {
        println!("{} none", "keys".bold());
    } else {
        println!("{} {}", "keys".bold(), keys.keys());
    }
    for property in cmd.referenced_rel_properties() {
        println!("{} {}", "rel".bold(), property);
    }

    let stats = cmd.pool_stats();
    println!(
        "{} var_vecs: {} checkouts, {} reuses; enumerators: {} checkouts, {} reuses",
        "pools".dimmed(),
        stats.var_vecs.checkouts,
        stats.var_vecs.reuses,
        stats.enumerators.checkouts,
        stats.enumerators.reuses
    );
    Ok(())
}

fn cmd_config(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Dump {
            scenario,
            config,
            no_pooling,
        } => cmd_dump(scenario, config.as_deref(), no_pooling),
        Commands::Config { config } => cmd_config(config.as_deref()),
    }
}
