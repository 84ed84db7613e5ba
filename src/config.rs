use std::{
    env, fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    registry::{AcEntry, AcRegistry, default_entries},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Constituency registry. Editable in the config file so new
    /// constituencies do not require a rebuild; defaults to the
    /// compiled-in table. Kept last: it serializes as an array of tables.
    #[serde(default = "default_entries")]
    pub registry: Vec<AcEntry>,
}

impl Default for Config {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            data_dir: default_data_dir(),
            created_at: now,
            updated_at: now,
            registry: default_entries(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    default_base_dir().join("config.toml")
}

/// Loads the config at `path` (or the default location), creating it with
/// defaults on first use.
pub fn load_or_default(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let config_path = match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            path
        }
        None => default_config_path(),
    };

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&contents)?;
        config.ensure_data_dir()?;
        Ok((config, config_path))
    } else {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let config = Config::default();
        config.ensure_data_dir()?;
        config.save(&config_path)?;
        Ok((config, config_path))
    }
}

impl Config {
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn ensure_data_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    pub fn partitions_path(&self) -> PathBuf {
        self.data_dir.join("partitions")
    }

    pub fn ac_registry(&self) -> Result<AcRegistry> {
        AcRegistry::new(self.registry.clone())
    }
}

fn default_base_dir() -> PathBuf {
    let Ok(current_dir) = env::current_dir() else {
        return PathBuf::from(".acdata");
    };
    current_dir.join(".acdata")
}

fn default_data_dir() -> PathBuf {
    default_base_dir().join("data")
}
