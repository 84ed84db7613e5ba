use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    batch::BatchWriter,
    booths::{BoothLookup, build_booth_lookup},
    error::{AcError, Result},
    partition::{EntityKind, PartitionRouter, partition_name},
    query::FilterExpr,
    reconcile::{missing_field_delta, type_fix_delta},
    registry::AcKey,
    store::{Document, WriteOp, document_id},
};

/// The two migration families the platform has needed so far. Each names
/// its own backup tag so rollback can tell their snapshots apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Migration {
    /// Derive missing canonical fields (AC name, booth name/number).
    MissingFields,
    /// Coerce mistyped fields to their declared target types.
    TypeFix,
}

impl Migration {
    pub fn tag(self) -> &'static str {
        match self {
            Migration::MissingFields => "_backup_",
            Migration::TypeFix => "_typefix_",
        }
    }

    /// Backup suffix for a run starting on `date`, e.g. `_backup_20260823`.
    /// Same-day re-runs share the suffix, so their snapshots accumulate in
    /// the same backup partition.
    pub fn backup_suffix(self, date: NaiveDate) -> String {
        format!("{}{}", self.tag(), date.format("%Y%m%d"))
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Migration::MissingFields => "missing-fields",
            Migration::TypeFix => "type-fix",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Live mode rewrites documents; dry-run (the default everywhere this
    /// is constructed) scans and reports only.
    pub live: bool,
    /// Entity kinds to sweep; empty means all.
    pub kinds: Vec<EntityKind>,
    /// Constituencies to sweep; `None` means every registered key.
    pub acs: Option<Vec<AcKey>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionOutcome {
    pub partition: String,
    /// Documents scanned.
    pub total: u64,
    /// Documents matching the scan predicate (non-empty delta).
    pub pending: u64,
    /// Documents rewritten this run (0 in dry-run).
    pub updated: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub migration: Migration,
    pub live: bool,
    pub backup_suffix: String,
    pub partitions: Vec<PartitionOutcome>,
}

impl MigrationReport {
    /// Grand `{updated, total}` across every partition in the run.
    pub fn grand_summary(&self) -> (u64, u64) {
        self.partitions.iter().fold((0, 0), |(updated, total), p| {
            (updated + p.updated, total + p.pending)
        })
    }
}

/// Single-flight batch job that brings every document in the targeted
/// partitions into the reconciler's declared shape. Partitions are
/// processed sequentially; each is scanned, backed up, then rewritten in
/// bounded batches. Re-running is safe: conformant documents produce
/// empty deltas and are skipped.
pub struct MigrationEngine {
    router: PartitionRouter,
}

impl MigrationEngine {
    pub fn new(router: PartitionRouter) -> Self {
        Self { router }
    }

    pub fn run(&self, migration: Migration, options: &MigrationOptions) -> Result<MigrationReport> {
        let suffix = migration.backup_suffix(chrono::Utc::now().date_naive());
        let kinds: &[EntityKind] = if options.kinds.is_empty() {
            &EntityKind::ALL
        } else {
            &options.kinds
        };
        let acs: Vec<AcKey> = match &options.acs {
            Some(acs) => acs.clone(),
            None => self.router.registry().keys().to_vec(),
        };

        let mut partitions = Vec::new();
        for kind in kinds {
            for ac in &acs {
                match self.run_partition(migration, *kind, *ac, options.live, &suffix) {
                    Ok(outcome) => partitions.push(outcome),
                    // An unregistered key skips that constituency; the
                    // sweep continues.
                    Err(AcError::UnknownPartition(key)) => {
                        warn!(ac = key, "skipping unregistered constituency");
                    }
                    // Any other failure aborts this partition's remaining
                    // work but not the run. Committed batches stay
                    // committed; re-running resumes where the scan left
                    // off.
                    Err(err) => {
                        warn!(
                            partition = %partition_name(*kind, *ac),
                            error = %err,
                            "partition migration aborted"
                        );
                        partitions.push(PartitionOutcome {
                            partition: partition_name(*kind, *ac),
                            total: 0,
                            pending: 0,
                            updated: 0,
                            error: Some(err.to_string()),
                        });
                    }
                }
            }
        }

        let report = MigrationReport {
            migration,
            live: options.live,
            backup_suffix: suffix,
            partitions,
        };
        let (updated, total) = report.grand_summary();
        info!(
            live = options.live,
            updated, total, "migration run complete"
        );
        Ok(report)
    }

    fn run_partition(
        &self,
        migration: Migration,
        kind: EntityKind,
        ac: AcKey,
        live: bool,
        suffix: &str,
    ) -> Result<PartitionOutcome> {
        let handle = self.router.route(kind, ac)?;

        // The booth lookup is rebuilt per constituency per run so it never
        // goes stale against concurrent voter writes.
        let booths = match migration {
            Migration::MissingFields => build_booth_lookup(&self.router.route(EntityKind::Voters, ac)?)?,
            Migration::TypeFix => BoothLookup::new(),
        };

        // First pass: streaming scan, counting only. Reported before any
        // mutation, in every mode; nothing is held in memory.
        let mut total: u64 = 0;
        let mut pending: u64 = 0;
        handle.for_each(&FilterExpr::All, &mut |document| {
            total += 1;
            if self.delta_for(migration, kind, &document, &booths).is_empty() {
                return Ok(());
            }
            if document_id(&document).is_none() {
                warn!(
                    partition = handle.collection(),
                    "document without _id cannot be migrated"
                );
                return Ok(());
            }
            pending += 1;
            Ok(())
        })?;
        info!(
            partition = handle.collection(),
            total, pending, "scan complete"
        );

        let mut outcome = PartitionOutcome {
            partition: handle.collection().to_string(),
            total,
            pending,
            updated: 0,
            error: None,
        };

        if pending == 0 || !live {
            return Ok(outcome);
        }

        // Second pass: backup and rewrite in lockstep. Each pending
        // document is copied verbatim into the backup partition, then
        // rewritten with a partial update so unrelated fields survive.
        // Both writers share the batch bound and receive the backup op
        // first, so every rewrite batch is preceded by its backup batch.
        // Backup inserts never overwrite: a snapshot taken earlier in the
        // day stays the day-start original.
        let backup = handle.suffixed(suffix);
        let mut backup_writer = BatchWriter::new(&backup, pending);
        let mut rewrite_writer = BatchWriter::new(&handle, pending);
        handle.for_each(&FilterExpr::All, &mut |document| {
            let delta = self.delta_for(migration, kind, &document, &booths);
            if delta.is_empty() {
                return Ok(());
            }
            let Some(id) = document_id(&document).map(str::to_string) else {
                return Ok(());
            };
            backup_writer.push(WriteOp::Insert {
                document: document.clone(),
                overwrite: false,
            })?;
            rewrite_writer.push(WriteOp::SetFields { id, fields: delta })?;
            Ok(())
        })?;
        backup_writer.finish()?;
        let totals = rewrite_writer.finish()?;
        info!(
            partition = handle.collection(),
            backup = backup.collection(),
            documents = pending,
            "backup written"
        );
        outcome.updated = totals.modified;
        Ok(outcome)
    }

    fn delta_for(
        &self,
        migration: Migration,
        kind: EntityKind,
        document: &Document,
        booths: &BoothLookup,
    ) -> Document {
        match migration {
            Migration::MissingFields => {
                missing_field_delta(document, self.router.registry(), booths)
            }
            Migration::TypeFix => type_fix_delta(kind, document),
        }
    }
}
