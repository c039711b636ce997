//! Named column mappings kept on disk.
//!
//! Each mapping lives in its own `<id>.json` file under the registry
//! directory, where the id is a slug of the mapping's name. Mappings are only
//! ever used when asked for by id; nothing here chooses a mapping for a report.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::logs::log_warning;
use crate::config::DEFAULT_REGISTRY_DIR;
use crate::error::{RegistryError, RegistryResult};
use crate::transform::mapping::ColumnMapping;

/// A column mapping saved under a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMapping {
    /// Slug of `name`, also the file stem
    pub id: String,
    pub name: String,
    pub mapping: ColumnMapping,
    /// RFC 3339, refreshed when the name is saved again
    pub saved_at: String,
}

/// File-per-mapping store rooted at one directory.
#[derive(Debug, Clone)]
pub struct MappingRegistry {
    registry_dir: PathBuf,
}

impl MappingRegistry {
    /// Registry in [`DEFAULT_REGISTRY_DIR`].
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REGISTRY_DIR)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            registry_dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Every stored mapping, sorted by id. A missing directory is an empty
    /// registry; files that do not parse are skipped with a warning.
    pub fn list(&self) -> RegistryResult<Vec<StoredMapping>> {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut stored = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            match read_stored(&path) {
                Ok(mapping) => stored.push(mapping),
                Err(e) => log_warning(format!("Skipping {}: {}", path.display(), e)),
            }
        }

        stored.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stored)
    }

    /// Load one mapping by id.
    pub fn get(&self, id: &str) -> RegistryResult<StoredMapping> {
        let path = self.path_for(id)?;
        if !path.is_file() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        read_stored(&path)
    }

    /// Save `mapping` under `name`, replacing any mapping with the same id.
    pub fn save(&self, name: &str, mapping: ColumnMapping) -> RegistryResult<StoredMapping> {
        mapping.check().map_err(RegistryError::InvalidMapping)?;

        let id = mapping_id(name);
        if id.is_empty() {
            return Err(RegistryError::InvalidName(name.to_string()));
        }

        let stored = StoredMapping {
            id: id.clone(),
            name: name.trim().to_string(),
            mapping,
            saved_at: chrono::Utc::now().to_rfc3339(),
        };

        fs::create_dir_all(&self.registry_dir)?;
        fs::write(self.path_for(&id)?, serde_json::to_string_pretty(&stored)?)?;
        Ok(stored)
    }

    /// Save a mapping file, named after its file stem unless `name` is given.
    pub fn import(&self, path: &Path, name: Option<&str>) -> RegistryResult<StoredMapping> {
        let content = fs::read_to_string(path)?;
        let mapping = ColumnMapping::from_json(&content)
            .map_err(|e| RegistryError::InvalidMapping(e.to_string()))?;

        let name = name
            .or_else(|| path.file_stem().and_then(|s| s.to_str()))
            .unwrap_or("imported");
        self.save(name, mapping)
    }

    pub fn delete(&self, id: &str) -> RegistryResult<()> {
        let path = self.path_for(id)?;
        if !path.is_file() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// Ids are slugs, so anything else cannot name a file in the registry.
    fn path_for(&self, id: &str) -> RegistryResult<PathBuf> {
        if id.is_empty() || mapping_id(id) != id {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        Ok(self.registry_dir.join(format!("{}.json", id)))
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase slug of a mapping name: `"QuickBooks Splits"` becomes
/// `"quickbooks-splits"`.
pub fn mapping_id(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn read_stored(path: &Path) -> RegistryResult<StoredMapping> {
    let stored: StoredMapping = serde_json::from_str(&fs::read_to_string(path)?)?;
    stored.mapping.check().map_err(RegistryError::InvalidMapping)?;
    Ok(stored)
}
