use crate::error::{SchemaConflict, StoreError};
use crate::file::{blob_files_in, key_for_path, read_blob, write_blob};
use crate::properties::read_properties;
use crate::superset::Superset;
use ddr_types::Blob;
use indexmap::IndexMap;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/* Name of the store index inside the store directory */
pub const INDEX_FILE: &str = "index.yaml";

/* Default name of the merged superset inside the store directory */
pub const DEFAULT_SUPERSET_NAME: &str = "superset.yaml";

/* Properties key holding the comma-separated merge order */
pub const ORDER_KEY: &str = "ddr.order";

/* One stored blob */
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct IndexEntry {
    /* File name relative to the store directory */
    pub file: String,
}

/* Persisted store index, keyed in insertion order */
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct StoreIndex {
    #[serde(default)]
    pub blobs: IndexMap<String, IndexEntry>,
}

/// Persistent keyed collection of captured blobs plus the superset merged
/// from them.
pub struct SchemaStore {
    /* Store directory holding the index, blob files and superset */
    dir: PathBuf,

    /* File name of the merged superset */
    superset_name: String,

    index: StoreIndex,

    /* Keys to fold first, in this order */
    order: Vec<String>,
}

impl SchemaStore {
    /* Open (creating if needed) a store directory */
    pub fn open(dir: &Path, superset_name: Option<&str>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        let index_path = dir.join(INDEX_FILE);
        let index = if index_path.exists() {
            let contents =
                std::fs::read_to_string(&index_path).map_err(|e| StoreError::io(&index_path, e))?;
            serde_yml::from_str(&contents).map_err(|e| StoreError::Parse {
                path: index_path.clone(),
                message: e.to_string(),
            })?
        } else {
            StoreIndex::default()
        };

        debug!("Opened store {} with {} blob(s)", dir.display(), index.blobs.len());

        Ok(Self {
            dir: dir.to_path_buf(),
            superset_name: superset_name.unwrap_or(DEFAULT_SUPERSET_NAME).to_string(),
            index,
            order: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn superset_path(&self) -> PathBuf {
        self.dir.join(&self.superset_name)
    }

    /* Keys in insertion order */
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.blobs.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.blobs.contains_key(key)
    }

    /* Persist a blob under `key`. Re-adding a key replaces its blob but keeps
       its position in the insertion order. */
    pub fn add_blob(&mut self, key: &str, blob: &Blob) -> Result<(), StoreError> {
        let file = self.file_name_for(key)?;

        if let Some((other, _)) = self
            .index
            .blobs
            .iter()
            .find(|(k, entry)| k.as_str() != key && entry.file == file)
        {
            return Err(StoreError::DuplicateKey(format!("{} (same file as {})", key, other)));
        }

        let path = self.dir.join(&file);
        let replaced = self.index.blobs.contains_key(key);
        write_blob(&path, blob)?;
        self.index
            .blobs
            .insert(key.to_string(), IndexEntry { file });
        self.save_index()?;

        if replaced {
            info!("Replaced blob '{}' ({} structures)", key, blob.structures.len());
        } else {
            info!("Added blob '{}' ({} structures)", key, blob.structures.len());
        }
        Ok(())
    }

    /* Add a blob file, or every blob file of a directory in file-name order.
       An explicit key is only accepted for a single file. Returns the keys
       that were added. */
    pub fn add_source(&mut self, source: &Path, key: Option<&str>) -> Result<Vec<String>, StoreError> {
        let files = if source.is_dir() {
            if let Some(key) = key {
                return Err(StoreError::InvalidKey(format!(
                    "{} (a key cannot name the directory source {})",
                    key,
                    source.display()
                )));
            }
            blob_files_in(source)?
        } else {
            vec![source.to_path_buf()]
        };

        let mut pending = Vec::with_capacity(files.len());
        let mut seen = HashSet::new();
        for path in &files {
            let key = match key {
                Some(key) => key.to_string(),
                None => key_for_path(path)
                    .ok_or_else(|| StoreError::InvalidKey(path.display().to_string()))?,
            };
            if !seen.insert(key.clone()) {
                return Err(StoreError::DuplicateKey(key));
            }
            let blob = read_blob(path)?;
            pending.push((key, blob));
        }

        let mut added = Vec::with_capacity(pending.len());
        for (key, blob) in pending {
            self.add_blob(&key, &blob)?;
            added.push(key);
        }
        Ok(added)
    }

    /* Load the blob stored under `key` */
    pub fn blob(&self, key: &str) -> Result<Blob, StoreError> {
        let entry = self
            .index
            .blobs
            .get(key)
            .ok_or_else(|| StoreError::UnknownOrderKey(key.to_string()))?;
        read_blob(&self.dir.join(&entry.file))
    }

    /* Impose a processing sequence on the next merge */
    pub fn order(&mut self, keys: Vec<String>) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for key in &keys {
            if !self.contains(key) {
                return Err(StoreError::UnknownOrderKey(key.clone()));
            }
            if !seen.insert(key.as_str()) {
                return Err(StoreError::DuplicateKey(key.clone()));
            }
        }
        self.order = keys;
        Ok(())
    }

    /* Read the merge order from the `ddr.order` key of a properties file */
    pub fn order_from_file(&mut self, path: &Path) -> Result<(), StoreError> {
        let properties = read_properties(path)?;
        let list = properties
            .get(ORDER_KEY)
            .ok_or_else(|| StoreError::InvalidProperties {
                path: path.to_path_buf(),
                message: format!("missing '{}'", ORDER_KEY),
            })?;
        let keys = list
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        self.order(keys)
    }

    /* Listed keys first, then the rest in insertion order */
    pub fn ordered_keys(&self) -> Vec<String> {
        let mut keys = self.order.clone();
        if self.order.is_empty() {
            keys.extend(self.index.blobs.keys().cloned());
            return keys;
        }
        for key in self.index.blobs.keys() {
            if !self.order.contains(key) {
                warn!("Store key '{}' not listed in the merge order, folding it last", key);
                keys.push(key.clone());
            }
        }
        keys
    }

    /* Fold every stored blob and report conflicts alongside the superset */
    pub fn merge_report(&self) -> Result<(Superset, Vec<SchemaConflict>), StoreError> {
        let mut superset = Superset::new();
        let mut conflicts = Vec::new();
        let mut first: Option<(String, u32)> = None;

        for key in self.ordered_keys() {
            let blob = self.blob(&key)?;
            match &first {
                None => {
                    superset.set_format_version(blob.format_version);
                    first = Some((key.clone(), blob.format_version));
                }
                Some((first_key, first_version)) if *first_version != blob.format_version => {
                    return Err(StoreError::MixedFormatVersions {
                        key,
                        version: blob.format_version,
                        first_key: first_key.clone(),
                        first_version: *first_version,
                    });
                }
                Some(_) => {}
            }
            debug!("Folding '{}' ({} structures)", key, blob.structures.len());
            conflicts.extend(superset.fold(&key, &blob.structures));
        }

        info!(
            "Merged {} blob(s) into {} structures, {} conflict(s)",
            self.index.blobs.len(),
            superset.len(),
            conflicts.len()
        );
        Ok((superset, conflicts))
    }

    /* Fold every stored blob; any conflict fails the merge */
    pub fn merge(&self) -> Result<Superset, StoreError> {
        let (superset, conflicts) = self.merge_report()?;
        if conflicts.is_empty() {
            Ok(superset)
        } else {
            Err(StoreError::Conflicts(conflicts))
        }
    }

    /* Persist a merged superset; returns false when the file was unchanged */
    pub fn write_superset(&self, superset: &Superset) -> Result<bool, StoreError> {
        let path = self.superset_path();
        let written = write_blob(&path, &superset.to_blob())?;
        if written {
            info!("Wrote superset {}", path.display());
        } else {
            debug!("Superset {} unchanged", path.display());
        }
        Ok(written)
    }

    /* Read the persisted superset */
    pub fn superset(&self) -> Result<Superset, StoreError> {
        read_blob(&self.superset_path()).map(Superset::from_blob)
    }

    /* Returns false when the index on disk already matches */
    fn save_index(&self) -> Result<bool, StoreError> {
        let path = self.dir.join(INDEX_FILE);
        let contents = serde_yml::to_string(&self.index).map_err(|e| StoreError::Serialize {
            path: path.clone(),
            message: e.to_string(),
        })?;
        if std::fs::read(&path).is_ok_and(|existing| existing == contents.as_bytes()) {
            debug!("Index {} unchanged", path.display());
            return Ok(false);
        }
        std::fs::write(&path, contents).map_err(|e| StoreError::io(&path, e))?;
        Ok(true)
    }

    /* Blob file name for a key; reserved names are rejected */
    fn file_name_for(&self, key: &str) -> Result<String, StoreError> {
        if key.trim().is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let stem: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let file = format!("{}.yaml", stem);
        if file == INDEX_FILE || file == self.superset_name || stem.starts_with('.') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(file)
    }
}
