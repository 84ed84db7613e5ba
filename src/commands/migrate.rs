use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;

use acdata::{
    migrate::{Migration, MigrationEngine, MigrationOptions},
    partition::{EntityKind, PartitionRouter},
    run_mode::RunMode,
};

use crate::commands::open_context;

#[derive(Args)]
pub struct MigrateArgs {
    /// Which migration family to run
    #[arg(long, value_enum, default_value_t = Migration::MissingFields)]
    pub migration: Migration,

    /// Restrict the sweep to one entity kind
    #[arg(long, value_enum)]
    pub kind: Option<EntityKind>,

    /// Restrict the sweep to one constituency (key or name)
    #[arg(long)]
    pub ac: Option<String>,

    /// Apply changes. Without this flag (or ACDATA_RUN_MODE=live) the run
    /// scans and reports without writing.
    #[arg(long, default_value_t = false)]
    pub live: bool,

    /// Emit the report as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn execute(config_path: Option<PathBuf>, args: MigrateArgs) -> Result<()> {
    let ctx = open_context(config_path)?;

    let acs = match &args.ac {
        Some(identifier) => {
            let Some(key) = ctx.registry.resolve_str(identifier) else {
                bail!("'{identifier}' does not resolve to a constituency");
            };
            if !ctx.registry.contains(key) {
                bail!("constituency {key} is not registered");
            }
            Some(vec![key])
        }
        None => None,
    };

    let options = MigrationOptions {
        live: args.live || RunMode::from_env().is_live(),
        kinds: args.kind.map(|kind| vec![kind]).unwrap_or_default(),
        acs,
    };

    let router = PartitionRouter::new(ctx.registry, ctx.store);
    let engine = MigrationEngine::new(router);
    let report = engine.run(args.migration, &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for outcome in &report.partitions {
        match &outcome.error {
            Some(error) => println!(
                "{}: aborted after partial progress: {}",
                outcome.partition, error
            ),
            None => println!(
                "{}: {}/{} updated (scanned {})",
                outcome.partition, outcome.updated, outcome.pending, outcome.total
            ),
        }
    }

    let (updated, total) = report.grand_summary();
    println!("total: {updated}/{total} updated");
    if report.live {
        println!("backups written under suffix {}", report.backup_suffix);
    } else {
        println!("dry-run: no documents were modified (pass --live to apply)");
    }
    Ok(())
}
