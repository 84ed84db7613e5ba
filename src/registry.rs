use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AcError, Result};

/// Canonical Assembly Constituency key. Always positive; `0` is never a
/// valid key, which lets callers treat "unresolvable" as `None` without
/// colliding with real data.
pub type AcKey = u32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcEntry {
    pub key: AcKey,
    pub name: String,
}

/// The registry of known constituencies: the sole source of valid AC keys
/// and of the key <-> name mapping. Built once at startup from config (or
/// the compiled-in table) and shared by reference; it holds no mutable
/// state and is safe to use from any number of threads.
#[derive(Debug, Clone)]
pub struct AcRegistry {
    keys: Vec<AcKey>,
    names: BTreeMap<AcKey, String>,
    by_name: BTreeMap<String, AcKey>,
}

impl AcRegistry {
    pub fn new(entries: Vec<AcEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(AcError::Config(
                "constituency registry cannot be empty".into(),
            ));
        }
        let mut keys = Vec::with_capacity(entries.len());
        let mut names = BTreeMap::new();
        let mut by_name = BTreeMap::new();
        for entry in entries {
            if entry.key == 0 {
                return Err(AcError::Config(
                    "constituency key 0 is reserved and cannot be registered".into(),
                ));
            }
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(AcError::Config(format!(
                    "constituency {} has an empty name",
                    entry.key
                )));
            }
            if names.insert(entry.key, name.to_string()).is_some() {
                return Err(AcError::Config(format!(
                    "duplicate constituency key {}",
                    entry.key
                )));
            }
            if by_name.insert(name.to_lowercase(), entry.key).is_some() {
                return Err(AcError::Config(format!(
                    "duplicate constituency name '{name}'"
                )));
            }
            keys.push(entry.key);
        }
        keys.sort_unstable();
        Ok(Self {
            keys,
            names,
            by_name,
        })
    }

    pub fn default_table() -> Self {
        Self::new(default_entries()).expect("compiled-in constituency table is valid")
    }

    pub fn keys(&self) -> &[AcKey] {
        &self.keys
    }

    pub fn contains(&self, key: AcKey) -> bool {
        self.names.contains_key(&key)
    }

    pub fn name_of(&self, key: AcKey) -> Option<&str> {
        self.names.get(&key).map(String::as_str)
    }

    /// Normalizes a heterogeneous constituency identifier (numeric key,
    /// registered name, or a numeric string) to its canonical key. Returns
    /// `None` when the input cannot be resolved; callers must treat that as
    /// "no scoping applied", never as key 0.
    pub fn resolve(&self, identifier: &Value) -> Option<AcKey> {
        match identifier {
            Value::Number(number) => {
                if let Some(key) = number.as_u64() {
                    return AcKey::try_from(key).ok().filter(|key| *key > 0);
                }
                let float = number.as_f64()?;
                if float.is_finite() && float > 0.0 && float.fract() == 0.0 {
                    AcKey::try_from(float as u64).ok()
                } else {
                    None
                }
            }
            Value::String(text) => self.resolve_str(text),
            _ => None,
        }
    }

    pub fn resolve_str(&self, identifier: &str) -> Option<AcKey> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(key) = self.by_name.get(&trimmed.to_lowercase()) {
            return Some(*key);
        }
        trimmed.parse::<AcKey>().ok().filter(|key| *key > 0)
    }
}

/// Compiled-in fallback table covering the constituencies the platform was
/// deployed against. Overridable via the `[[registry]]` config entries.
pub fn default_entries() -> Vec<AcEntry> {
    const TABLE: &[(AcKey, &str)] = &[
        (113, "Mettupalayam"),
        (114, "Avanashi"),
        (115, "Tiruppur North"),
        (116, "Tiruppur South"),
        (117, "Palladam"),
        (118, "Sulur"),
        (119, "Thondamuthur"),
        (120, "Kavundampalayam"),
        (121, "Coimbatore North"),
        (122, "Coimbatore South"),
        (123, "Singanallur"),
        (124, "Kinathukadavu"),
        (125, "Pollachi"),
        (126, "Valparai"),
        (127, "Udumalaipettai"),
    ];
    TABLE
        .iter()
        .map(|(key, name)| AcEntry {
            key: *key,
            name: (*name).to_string(),
        })
        .collect()
}
