pub mod access;
pub mod migrate;
pub mod partitions;
pub mod rollback;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};

use acdata::{
    config::load_or_default,
    registry::AcRegistry,
    store::{DocumentStore, RocksStore},
};

pub(crate) struct CliContext {
    pub registry: Arc<AcRegistry>,
    pub store: Arc<dyn DocumentStore>,
}

pub(crate) fn open_context(config_path: Option<PathBuf>) -> Result<CliContext> {
    let (config, _) = load_or_default(config_path).context("failed to load configuration")?;
    let registry = Arc::new(
        config
            .ac_registry()
            .context("invalid constituency registry in configuration")?,
    );
    let store: Arc<dyn DocumentStore> = Arc::new(
        RocksStore::open(config.partitions_path()).with_context(|| {
            format!(
                "failed to open partition store at {}",
                config.partitions_path().display()
            )
        })?,
    );
    Ok(CliContext { registry, store })
}
