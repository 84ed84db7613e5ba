mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{
    access::AccessCommands, migrate::MigrateArgs, partitions::PartitionsArgs,
    rollback::RollbackCommands,
};

#[derive(Parser)]
#[command(author, version, about = "Constituency-sharded election data CLI")]
struct Cli {
    /// Path to the configuration file. Defaults to ./.acdata/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List live partitions with document counts
    Partitions(PartitionsArgs),
    /// Scan partitions and rewrite non-conforming documents
    Migrate(MigrateArgs),
    /// Inspect or restore migration backups
    Rollback {
        #[command(subcommand)]
        command: RollbackCommands,
    },
    /// Evaluate access-scope decisions
    Access {
        #[command(subcommand)]
        command: AccessCommands,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let Cli { config, command } = Cli::parse();

    match command {
        Commands::Partitions(args) => commands::partitions::execute(config, args),
        Commands::Migrate(args) => commands::migrate::execute(config, args),
        Commands::Rollback { command } => commands::rollback::execute(config, command),
        Commands::Access { command } => commands::access::execute(config, command),
    }
}
