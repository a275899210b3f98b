use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A monitored locality: a settlement name plus the region/district identifier
/// pair the statistics API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locality {
    pub name: String,
    pub region_id: String,
    pub district_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LocalitiesFile {
    pub localities: Vec<Locality>,
}

/// Load and validate the locality list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_localities(path: &Path) -> Result<LocalitiesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LocalitiesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: LocalitiesFile =
        serde_yaml::from_str(&content).map_err(ConfigError::LocalitiesFileParse)?;

    validate_localities(&file)?;

    Ok(file)
}

fn validate_localities(file: &LocalitiesFile) -> Result<(), ConfigError> {
    if file.localities.is_empty() {
        return Err(ConfigError::Validation(
            "locality list must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for locality in &file.localities {
        if locality.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "locality name must be non-empty".to_string(),
            ));
        }
        if locality.region_id.trim().is_empty() || locality.district_id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "locality '{}' is missing a region or district identifier",
                locality.name
            )));
        }
        let key = (locality.region_id.clone(), locality.district_id.clone());
        if !seen.insert(key) {
            return Err(ConfigError::Validation(format!(
                "duplicate locality identifiers: region {} / district {} (from '{}')",
                locality.region_id, locality.district_id, locality.name
            )));
        }
    }

    Ok(())
}
