//! Loading of everything the viewer reads from outside: the model registry,
//! the optional viewer config and the model files themselves.
//!
//! Parsers are CPU only and produce plain scene nodes; GPU buffers are created
//! lazily once a node is attached to the stage.

use std::{collections::HashMap, sync::Arc};

use anyhow::Context as _;

pub mod fbx;
pub mod format;
pub mod gltf;
pub mod loader;
pub mod registry;
pub mod vrm;

pub use loader::{LoadedModel, PendingLoad, load};

/// Where asset files come from.
///
/// Natively this is a directory (`assets/` by default), on the web it is the
/// URL of the page, so `model/foo.vrm` resolves next to `index.html`.
#[derive(Clone, Debug)]
pub enum AssetSource {
    #[cfg(not(target_arch = "wasm32"))]
    Directory(std::path::PathBuf),
    #[cfg(target_arch = "wasm32")]
    Web(reqwest::Url),
    /// Files held in memory, keyed by their relative path.
    Memory(Arc<HashMap<String, Vec<u8>>>),
}

impl AssetSource {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn directory(path: impl Into<std::path::PathBuf>) -> Self {
        Self::Directory(path.into())
    }

    /// The directory of the current page.
    #[cfg(target_arch = "wasm32")]
    pub fn page() -> anyhow::Result<Self> {
        let window = web_sys::window().context("no window")?;
        let href = window
            .location()
            .href()
            .map_err(|_| anyhow::anyhow!("page location is not readable"))?;
        let url = reqwest::Url::parse(&href)?;
        // Drops the query and the document name, keeps the trailing slash
        let base = url.join("./")?;
        Ok(Self::Web(base))
    }

    pub fn in_memory(files: impl IntoIterator<Item = (String, Vec<u8>)>) -> Self {
        Self::Memory(Arc::new(files.into_iter().collect()))
    }

    pub async fn load_binary(&self, file_name: &str) -> anyhow::Result<Vec<u8>> {
        match self {
            #[cfg(not(target_arch = "wasm32"))]
            Self::Directory(root) => {
                let path = root.join(file_name);
                tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))
            }
            #[cfg(target_arch = "wasm32")]
            Self::Web(base) => {
                let url = base.join(file_name)?;
                let response = reqwest::get(url.clone()).await?.error_for_status()?;
                let bytes = response
                    .bytes()
                    .await
                    .with_context(|| format!("fetching {}", url))?;
                Ok(bytes.to_vec())
            }
            Self::Memory(files) => files
                .get(file_name)
                .cloned()
                .with_context(|| format!("no asset named {}", file_name)),
        }
    }

    pub async fn load_string(&self, file_name: &str) -> anyhow::Result<String> {
        let bytes = self.load_binary(file_name).await?;
        String::from_utf8(bytes).with_context(|| format!("{} is not UTF-8", file_name))
    }
}

/// Resolves `relative` against the directory part of `base`.
///
/// Used for files a model refers to (glTF buffers and images).
pub fn sibling_path(base: &str, relative: &str) -> String {
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], relative),
        None => relative.to_string(),
    }
}
