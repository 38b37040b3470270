//! Dashboard configuration: where the CSV files live and how long a first
//! load may take.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::family::FamilyRules;
use crate::data::loader::FileSource;
use crate::data::model::FamilyId;
use crate::data::registry::DatasetRegistry;

/// Path of a JSON config file.
pub const CONFIG_ENV: &str = "COVID_DASH_CONFIG";
/// Overrides `data_dir` from the file.
pub const DATA_DIR_ENV: &str = "COVID_DASH_DATA_DIR";

/// Source overrides for one family; unset fields keep the built-in value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FamilyOverride {
    pub sources: Option<Vec<PathBuf>>,
    pub header_offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// Directory the family source paths are resolved against.
    pub data_dir: PathBuf,
    /// Limit on a family's first load; `None` waits indefinitely.
    pub load_timeout_secs: Option<u64>,
    pub families: BTreeMap<FamilyId, FamilyOverride>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            load_timeout_secs: Some(30),
            families: BTreeMap::new(),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Config from `COVID_DASH_CONFIG` (or defaults), then `COVID_DASH_DATA_DIR`.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_secs.map(Duration::from_secs)
    }

    /// Built-in family declarations with this config's overrides applied.
    pub fn catalog(&self) -> Vec<FamilyRules> {
        let mut catalog = FamilyRules::catalog();
        for rules in &mut catalog {
            let Some(overrides) = self.families.get(&rules.id) else {
                continue;
            };
            if let Some(sources) = &overrides.sources {
                rules.sources = sources.clone();
            }
            if let Some(offset) = overrides.header_offset {
                rules.header_offset = offset;
            }
        }
        catalog
    }

    /// Registry reading from `data_dir`.
    pub fn build_registry(&self) -> DatasetRegistry {
        log::info!("reading datasets from {}", self.data_dir.display());
        DatasetRegistry::new(self.catalog(), Arc::new(FileSource::new(&self.data_dir)))
            .with_load_timeout(self.load_timeout())
    }
}
