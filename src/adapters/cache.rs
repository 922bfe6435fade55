//! Item-id -> API response subset, persisted as one JSON file.
//!
//! Entries never expire: once an item resolved, the stored answer is used on
//! every later run until the cache directory is cleaned.

use crate::domain::model::CachedItem;
use crate::utils::error::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ItemCache {
    path: PathBuf,
    items: HashMap<String, CachedItem>,
}

impl ItemCache {
    /// Loads the cache file, or starts empty when it does not exist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = if path.is_file() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };
        tracing::debug!("Loaded {} cached items from {}", items.len(), path.display());
        Ok(Self { path, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &str) -> Option<&CachedItem> {
        self.items.get(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, item: CachedItem) {
        self.items.insert(id.into(), item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&self.items)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
