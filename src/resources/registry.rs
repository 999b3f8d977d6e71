//! Lookup key to model file mapping.

use std::collections::BTreeMap;

use crate::resources::AssetSource;

/// Flat `key -> file name` table read from `modelList.json`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRegistry {
    model_dir: String,
    entries: BTreeMap<String, String>,
}

impl ModelRegistry {
    pub fn new(model_dir: &str, entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            model_dir: model_dir.trim_end_matches('/').to_string(),
            entries: entries.into_iter().collect(),
        }
    }

    pub fn empty(model_dir: &str) -> Self {
        Self {
            model_dir: model_dir.trim_end_matches('/').to_string(),
            entries: BTreeMap::new(),
        }
    }

    pub fn from_json(model_dir: &str, text: &str) -> anyhow::Result<Self> {
        let entries: BTreeMap<String, String> = serde_json::from_str(text)?;
        Ok(Self::new(model_dir, entries))
    }

    /// Reads the registry; a missing or malformed file leaves it empty.
    pub async fn load(assets: &AssetSource, file_name: &str, model_dir: &str) -> Self {
        let parsed = match assets.load_string(file_name).await {
            Ok(text) => Self::from_json(model_dir, &text),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(registry) => {
                log::info!("model registry: {} entries", registry.len());
                registry
            }
            Err(e) => {
                log::error!("model registry {} unusable: {:#}", file_name, e);
                Self::empty(model_dir)
            }
        }
    }

    /// Path of the model registered under `key`, relative to the asset root.
    ///
    /// `None` for an empty key or a key without an entry; that is the
    /// "no model requested" state.
    pub fn resolve(&self, key: &str) -> Option<String> {
        if key.is_empty() {
            return None;
        }
        let file = self.entries.get(key)?;
        if self.model_dir.is_empty() {
            Some(file.clone())
        } else {
            Some(format!("{}/{}", self.model_dir, file))
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
