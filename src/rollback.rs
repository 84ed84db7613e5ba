use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    batch::BatchWriter,
    error::{AcError, Result},
    partition::{EntityKind, ParsedPartition, PartitionRouter, parse_partition_name},
    query::FilterExpr,
    registry::AcRegistry,
    store::{DocumentStore, ID_FIELD, WriteOp, document_id},
};

#[derive(Debug, Clone, Serialize)]
pub struct BackupPartition {
    pub collection: String,
    pub live_collection: String,
    pub kind: EntityKind,
    pub ac: u32,
    pub documents: u64,
}

/// Backups that share a suffix (tag + run date) belong to one migration
/// run and are listed together.
#[derive(Debug, Clone, Serialize)]
pub struct BackupGroup {
    pub suffix: String,
    pub partitions: Vec<BackupPartition>,
}

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Backup suffix naming the run to reverse, e.g. `_backup_20260823`.
    pub suffix: String,
    /// Optional substring filter on the live partition name, e.g.
    /// `voters` or `survey`.
    pub kind_filter: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub backup: String,
    pub live: String,
    /// Documents in the backup partition.
    pub total: u64,
    /// Documents restored (or, in dry-run, that would be restored): only
    /// those whose id still exists in the live partition.
    pub restored: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub suffix: String,
    pub dry_run: bool,
    pub partitions: Vec<RestoreOutcome>,
}

/// Reverses a migration from its dated backup partitions. Never writes to
/// a backup and never deletes one; cleanup is a separate human action.
pub struct RollbackEngine {
    store: Arc<dyn DocumentStore>,
    router: PartitionRouter,
}

impl RollbackEngine {
    pub fn new(registry: Arc<AcRegistry>, store: Arc<dyn DocumentStore>) -> Self {
        let router = PartitionRouter::new(registry, Arc::clone(&store));
        Self { store, router }
    }

    /// Pure read: inventories every backup-suffixed partition, grouped by
    /// suffix, with per-partition document counts.
    pub fn list(&self) -> Result<Vec<BackupGroup>> {
        let mut groups: BTreeMap<String, Vec<BackupPartition>> = BTreeMap::new();
        for collection in self.store.list_collections()? {
            let Some(parsed) = parse_partition_name(&collection) else {
                continue;
            };
            if parsed.is_live() {
                continue;
            }
            let documents = self.store.count(&collection, &FilterExpr::All)?;
            groups
                .entry(parsed.suffix.clone())
                .or_default()
                .push(BackupPartition {
                    collection,
                    live_collection: parsed.live_name(),
                    kind: parsed.kind,
                    ac: parsed.ac,
                    documents,
                });
        }
        Ok(groups
            .into_iter()
            .map(|(suffix, partitions)| BackupGroup { suffix, partitions })
            .collect())
    }

    pub fn restore(&self, options: &RestoreOptions) -> Result<RestoreReport> {
        if options.suffix.is_empty() {
            return Err(AcError::Config(
                "a backup suffix is required for restore".into(),
            ));
        }

        let mut partitions = Vec::new();
        for collection in self.store.list_collections()? {
            let Some(parsed) = parse_partition_name(&collection) else {
                continue;
            };
            if parsed.suffix != options.suffix {
                continue;
            }
            let live_name = parsed.live_name();
            if let Some(filter) = &options.kind_filter {
                if !live_name.contains(filter.as_str()) {
                    continue;
                }
            }
            match self.restore_partition(&collection, &parsed, options.dry_run) {
                Ok(outcome) => partitions.push(outcome),
                Err(AcError::UnknownPartition(key)) => {
                    warn!(
                        ac = key,
                        backup = %collection,
                        "skipping backup for unregistered constituency"
                    );
                }
                Err(err) => {
                    warn!(backup = %collection, error = %err, "partition restore aborted");
                    partitions.push(RestoreOutcome {
                        backup: collection,
                        live: live_name,
                        total: 0,
                        restored: 0,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let report = RestoreReport {
            suffix: options.suffix.clone(),
            dry_run: options.dry_run,
            partitions,
        };
        let restored: u64 = report.partitions.iter().map(|p| p.restored).sum();
        info!(
            suffix = %report.suffix,
            dry_run = report.dry_run,
            restored,
            "rollback run complete"
        );
        Ok(report)
    }

    fn restore_partition(
        &self,
        backup_collection: &str,
        parsed: &ParsedPartition,
        dry_run: bool,
    ) -> Result<RestoreOutcome> {
        let live = self.router.route(parsed.kind, parsed.ac)?;
        let total = self.store.count(backup_collection, &FilterExpr::All)?;

        if dry_run {
            // Count what a live restore would touch: ids present on both
            // sides. Deleted documents are never resurrected.
            let mut restorable = 0;
            self.store
                .for_each(backup_collection, &FilterExpr::All, &mut |document| {
                    if let Some(id) = document_id(&document) {
                        if live.count(&FilterExpr::eq(ID_FIELD, id))? > 0 {
                            restorable += 1;
                        }
                    }
                    Ok(())
                })?;
            info!(
                backup = backup_collection,
                live = live.collection(),
                total,
                restorable,
                "dry-run restore"
            );
            return Ok(RestoreOutcome {
                backup: backup_collection.to_string(),
                live: live.collection().to_string(),
                total,
                restored: restorable,
                error: None,
            });
        }

        let mut writer = BatchWriter::new(&live, total);
        self.store
            .for_each(backup_collection, &FilterExpr::All, &mut |document| {
                let Some(id) = document_id(&document).map(str::to_string) else {
                    warn!(
                        backup = backup_collection,
                        "backup document without _id cannot be restored"
                    );
                    return Ok(());
                };
                writer.push(WriteOp::ReplaceById {
                    id,
                    document,
                    upsert: false,
                })
            })?;
        let totals = writer.finish()?;
        info!(
            backup = backup_collection,
            live = live.collection(),
            total,
            restored = totals.matched,
            "restore complete"
        );
        Ok(RestoreOutcome {
            backup: backup_collection.to_string(),
            live: live.collection().to_string(),
            total,
            restored: totals.matched,
            error: None,
        })
    }
}
