use std::{fmt, sync::Arc};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AcError, Result},
    query::FilterExpr,
    registry::{AcKey, AcRegistry},
    store::{BulkSummary, Document, DocumentStore, WriteOp},
};

/// The closed set of logical entity kinds the platform shards by
/// constituency. The variant order is the sweep order of migration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Voters,
    SurveyResponses,
    MobileAnswers,
    AgentActivities,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Voters,
        EntityKind::SurveyResponses,
        EntityKind::MobileAnswers,
        EntityKind::AgentActivities,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Voters => "voters",
            EntityKind::SurveyResponses => "survey_responses",
            EntityKind::MobileAnswers => "mobile_answers",
            EntityKind::AgentActivities => "agent_activities",
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == input)
            .ok_or_else(|| AcError::Config(format!("unknown entity kind: {input}")))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live partition name: `{entity_kind}_{ac_key}`. Backup partitions append
/// a suffix to this name. The scheme is persisted state layout and must
/// not change.
pub fn partition_name(kind: EntityKind, ac: AcKey) -> String {
    format!("{}_{}", kind.as_str(), ac)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPartition {
    pub kind: EntityKind,
    pub ac: AcKey,
    /// Empty for a live partition; `_backup_YYYYMMDD`-style tag otherwise.
    pub suffix: String,
}

impl ParsedPartition {
    pub fn is_live(&self) -> bool {
        self.suffix.is_empty()
    }

    pub fn live_name(&self) -> String {
        partition_name(self.kind, self.ac)
    }
}

/// Decomposes a physical collection name back into entity kind, AC key,
/// and backup suffix. Collections that do not follow the naming contract
/// are inert: they return `None` and every engine ignores them.
pub fn parse_partition_name(name: &str) -> Option<ParsedPartition> {
    for kind in EntityKind::ALL {
        let prefix = kind.as_str();
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix('_') else {
            continue;
        };
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end == 0 {
            continue;
        }
        let Ok(ac) = rest[..digits_end].parse::<AcKey>() else {
            continue;
        };
        let suffix = &rest[digits_end..];
        if !suffix.is_empty() && !suffix.starts_with('_') {
            continue;
        }
        return Some(ParsedPartition {
            kind,
            ac,
            suffix: suffix.to_string(),
        });
    }
    None
}

/// Resolves (entity kind, AC key) pairs to partition handles. Holds no
/// mutable state beyond the shared registry; never creates partitions.
#[derive(Clone)]
pub struct PartitionRouter {
    registry: Arc<AcRegistry>,
    store: Arc<dyn DocumentStore>,
}

impl PartitionRouter {
    pub fn new(registry: Arc<AcRegistry>, store: Arc<dyn DocumentStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &AcRegistry {
        &self.registry
    }

    pub fn route(&self, kind: EntityKind, ac: AcKey) -> Result<PartitionHandle> {
        if !self.registry.contains(ac) {
            return Err(AcError::UnknownPartition(ac));
        }
        Ok(PartitionHandle {
            store: Arc::clone(&self.store),
            collection: partition_name(kind, ac),
        })
    }
}

/// Handle over one physical collection, capable of find/count/bulk-write.
#[derive(Clone)]
pub struct PartitionHandle {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl std::fmt::Debug for PartitionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionHandle")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl PartitionHandle {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Derives the handle for this partition's backup under `suffix`.
    /// Only reachable through a routed live handle, so backups always sit
    /// next to a registered partition.
    pub fn suffixed(&self, suffix: &str) -> PartitionHandle {
        PartitionHandle {
            store: Arc::clone(&self.store),
            collection: format!("{}{}", self.collection, suffix),
        }
    }

    /// Streams matching documents one at a time; the engines never hold a
    /// whole partition in memory.
    pub fn for_each(
        &self,
        filter: &FilterExpr,
        visit: &mut dyn FnMut(Document) -> Result<()>,
    ) -> Result<()> {
        self.store.for_each(&self.collection, filter, visit)
    }

    pub fn count(&self, filter: &FilterExpr) -> Result<u64> {
        self.store.count(&self.collection, filter)
    }

    pub fn bulk_write(&self, ops: Vec<WriteOp>) -> Result<BulkSummary> {
        self.store.bulk_write(&self.collection, ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn partition_names_follow_the_contract() {
        assert_eq!(partition_name(EntityKind::Voters, 119), "voters_119");
        assert_eq!(
            partition_name(EntityKind::SurveyResponses, 121),
            "survey_responses_121"
        );
    }

    #[test]
    fn parses_live_and_backup_names() {
        let live = parse_partition_name("voters_119").unwrap();
        assert_eq!(live.kind, EntityKind::Voters);
        assert_eq!(live.ac, 119);
        assert!(live.is_live());

        let backup = parse_partition_name("mobile_answers_121_backup_20260823").unwrap();
        assert_eq!(backup.kind, EntityKind::MobileAnswers);
        assert_eq!(backup.ac, 121);
        assert_eq!(backup.suffix, "_backup_20260823");
        assert_eq!(backup.live_name(), "mobile_answers_121");

        assert!(parse_partition_name("voters_").is_none());
        assert!(parse_partition_name("voters_abc").is_none());
        assert!(parse_partition_name("unrelated_119").is_none());
        assert!(parse_partition_name("voters_119x").is_none());
    }

    #[test]
    fn router_rejects_unregistered_keys() {
        let registry = Arc::new(AcRegistry::default_table());
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let router = PartitionRouter::new(registry, store);

        let handle = router.route(EntityKind::Voters, 119).unwrap();
        assert_eq!(handle.collection(), "voters_119");
        assert_eq!(
            handle.suffixed("_backup_20260823").collection(),
            "voters_119_backup_20260823"
        );

        match router.route(EntityKind::Voters, 999) {
            Err(AcError::UnknownPartition(999)) => {}
            other => panic!("expected UnknownPartition, got {other:?}"),
        }
    }

    #[test]
    fn entity_kind_parse_rejects_unknown_kinds() {
        assert_eq!(EntityKind::parse("voters").unwrap(), EntityKind::Voters);
        assert!(matches!(
            EntityKind::parse("volunteers"),
            Err(AcError::Config(_))
        ));
    }
}
