use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use acdata::{partition::parse_partition_name, query::FilterExpr};

use crate::commands::open_context;

#[derive(Args)]
pub struct PartitionsArgs {
    /// Emit the results as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Include backup partitions in the listing
    #[arg(long, default_value_t = false)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct PartitionSummary {
    partition: String,
    kind: String,
    ac: u32,
    constituency: Option<String>,
    documents: u64,
}

pub fn execute(config_path: Option<PathBuf>, args: PartitionsArgs) -> Result<()> {
    let ctx = open_context(config_path)?;

    let mut summaries = Vec::new();
    for collection in ctx.store.list_collections()? {
        let Some(parsed) = parse_partition_name(&collection) else {
            continue;
        };
        if !parsed.is_live() && !args.all {
            continue;
        }
        let documents = ctx.store.count(&collection, &FilterExpr::All)?;
        summaries.push(PartitionSummary {
            partition: collection,
            kind: parsed.kind.to_string(),
            ac: parsed.ac,
            constituency: ctx.registry.name_of(parsed.ac).map(str::to_string),
            documents,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("no partitions found");
        return Ok(());
    }

    print_table(&summaries);
    Ok(())
}

fn print_table(summaries: &[PartitionSummary]) {
    let mut partition_width = "partition".len();
    let mut constituency_width = "constituency".len();
    for summary in summaries {
        partition_width = partition_width.max(summary.partition.len());
        let name = summary.constituency.as_deref().unwrap_or("-");
        constituency_width = constituency_width.max(name.len());
    }

    println!(
        "{:<partition_width$}  {:<constituency_width$}  {:>9}",
        "partition", "constituency", "documents"
    );
    for summary in summaries {
        println!(
            "{:<partition_width$}  {:<constituency_width$}  {:>9}",
            summary.partition,
            summary.constituency.as_deref().unwrap_or("-"),
            summary.documents
        );
    }
}
