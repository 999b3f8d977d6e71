//! Model loading and normalization.
//!
//! Selecting a file builds a fresh parser for its format. Running the load
//! fetches and parses the file, extracts the displayable root, gives it the
//! format's scale and makes every mesh cast and receive shadows.

use crate::{
    data_structures::scene_graph::{SceneNode, enable_shadows},
    error::LoadError,
    pipelines::light::LightPreset,
    resources::{
        AssetSource,
        format::{ModelFormat, Parser},
    },
};

/// A normalized model, ready to be attached to the stage.
#[derive(Debug)]
pub struct LoadedModel {
    pub node: Box<dyn SceneNode>,
    pub format: ModelFormat,
    pub path: String,
}

/// A load that has picked its parser but not started yet.
pub struct PendingLoad {
    pub path: String,
    pub format: ModelFormat,
    parser: Parser,
}

impl PendingLoad {
    /// `None` when no parser handles the file's extension.
    pub fn select(path: &str) -> Option<Self> {
        let Some(format) = ModelFormat::from_path(path) else {
            log::debug!("no parser for {}", path);
            return None;
        };
        Some(Self {
            path: path.to_string(),
            format,
            parser: (format.spec().make_parser)(),
        })
    }

    /// Lights to switch to as soon as this parser is chosen.
    pub fn preset(&self) -> Option<LightPreset> {
        self.format.spec().preset
    }

    pub async fn run(self, assets: &AssetSource) -> Result<LoadedModel, LoadError> {
        let spec = self.format.spec();
        let parsed = async {
            let output = self.parser.load(assets, &self.path).await?;
            (spec.extract)(output)
        }
        .await;
        let mut node = parsed.map_err(|source| LoadError::ParseFailure {
            path: self.path.clone(),
            source,
        })?;

        let meshes = normalize(node.as_mut(), spec.scale);
        log::info!(
            "{} loaded as {}: {} meshes, scale {}",
            self.path,
            self.format,
            meshes,
            spec.scale
        );
        Ok(LoadedModel {
            node,
            format: self.format,
            path: self.path,
        })
    }
}

/// Sets the root's scale (replacing whatever it had) and turns on shadows
/// for every mesh below it. Returns the number of meshes.
pub fn normalize(root: &mut dyn SceneNode, scale: f32) -> usize {
    root.local_transform_mut().set_uniform_scale(scale);
    enable_shadows(root)
}

/// Loads the model at `path`, `Ok(None)` when its format is unknown.
pub async fn load(assets: &AssetSource, path: &str) -> Result<Option<LoadedModel>, LoadError> {
    match PendingLoad::select(path) {
        Some(pending) => pending.run(assets).await.map(Some),
        None => Ok(None),
    }
}
