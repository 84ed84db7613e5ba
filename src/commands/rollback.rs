use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use acdata::rollback::{RestoreOptions, RollbackEngine};

use crate::commands::open_context;

#[derive(Subcommand)]
pub enum RollbackCommands {
    /// List backup partitions grouped by migration run
    List(ListArgs),
    /// Restore a migration's backups into the live partitions
    Restore(RestoreArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Emit the results as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct RestoreArgs {
    /// Backup suffix naming the run to reverse, e.g. _backup_20260823
    #[arg(long)]
    pub suffix: String,

    /// Only restore partitions whose live name contains this substring
    #[arg(long)]
    pub kind: Option<String>,

    /// Report what would be restored without writing
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Emit the report as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn execute(config_path: Option<PathBuf>, command: RollbackCommands) -> Result<()> {
    let ctx = open_context(config_path)?;
    let engine = RollbackEngine::new(ctx.registry, ctx.store);

    match command {
        RollbackCommands::List(args) => {
            let groups = engine.list()?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
                return Ok(());
            }
            if groups.is_empty() {
                println!("no backups found");
                return Ok(());
            }
            for group in groups {
                println!("{}", group.suffix);
                for partition in group.partitions {
                    println!(
                        "  {} -> {} ({} documents)",
                        partition.collection, partition.live_collection, partition.documents
                    );
                }
            }
            Ok(())
        }
        RollbackCommands::Restore(args) => {
            let report = engine.restore(&RestoreOptions {
                suffix: args.suffix,
                kind_filter: args.kind,
                dry_run: args.dry_run,
            })?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            if report.partitions.is_empty() {
                println!("no backups match suffix {}", report.suffix);
                return Ok(());
            }
            for outcome in &report.partitions {
                match &outcome.error {
                    Some(error) => println!(
                        "{}: aborted after partial progress: {}",
                        outcome.backup, error
                    ),
                    None => println!(
                        "{} -> {}: {}/{} restored",
                        outcome.backup, outcome.live, outcome.restored, outcome.total
                    ),
                }
            }
            if report.dry_run {
                println!("dry-run: no documents were modified");
            }
            Ok(())
        }
    }
}
