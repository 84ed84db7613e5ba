use std::env;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const RUN_MODE_ENV: &str = "ACDATA_RUN_MODE";

/// Migration runs default to dry-run; live mode must be requested
/// explicitly through the environment or the CLI flag. Accidental
/// invocation must never mutate data.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    DryRun,
    Live,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DryRun => "dry-run",
            Self::Live => "live",
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    pub fn from_env() -> Self {
        env::var(RUN_MODE_ENV)
            .ok()
            .and_then(|value| {
                let normalized = value.trim().to_ascii_lowercase();
                match normalized.as_str() {
                    "live" | "apply" | "true" | "1" | "yes" => Some(Self::Live),
                    "dry-run" | "dryrun" | "dry" | "false" | "0" | "no" => Some(Self::DryRun),
                    _ => None,
                }
            })
            .unwrap_or(Self::DryRun)
    }
}
