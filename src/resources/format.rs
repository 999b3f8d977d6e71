//! Supported model formats and how each one is normalized.
//!
//! Every format is one row in a table: which parser to build, the uniform
//! scale its root gets, the light preset selecting it implies and how to get
//! the displayable node out of the parser's result.

use std::path::Path;

use crate::{
    data_structures::scene_graph::SceneNode,
    error::LoadError,
    pipelines::light::LightPreset,
    resources::{
        AssetSource,
        fbx::FbxLoader,
        gltf::{GltfLoader, GltfResult},
        vrm::VrmLoaderPlugin,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    Fbx,
    Vrm,
}

impl ModelFormat {
    /// Format of a file, decided by the text after the last `.` of its name.
    ///
    /// Matching ignores ASCII case. A name without a dot has no format.
    pub fn from_path(path: &str) -> Option<Self> {
        let file_name = Path::new(path).file_name()?.to_str()?;
        let (_, extension) = file_name.rsplit_once('.')?;
        Self::from_extension(extension).ok()
    }

    pub fn from_extension(extension: &str) -> Result<Self, LoadError> {
        if extension.eq_ignore_ascii_case("fbx") {
            Ok(Self::Fbx)
        } else if extension.eq_ignore_ascii_case("vrm") {
            Ok(Self::Vrm)
        } else {
            Err(LoadError::UnknownFormat {
                path: format!(".{}", extension),
            })
        }
    }

    pub fn spec(self) -> &'static FormatSpec {
        match self {
            Self::Fbx => &FBX,
            Self::Vrm => &VRM,
        }
    }
}

impl std::fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fbx => f.write_str("FBX"),
            Self::Vrm => f.write_str("VRM"),
        }
    }
}

/// A parser ready for exactly one load.
pub enum Parser {
    Fbx(FbxLoader),
    Gltf(GltfLoader),
}

/// Whatever a [`Parser`] produced, before normalization.
pub enum ParseOutput {
    Fbx(Box<dyn SceneNode>),
    Gltf(GltfResult),
}

impl Parser {
    pub async fn load(&self, assets: &AssetSource, path: &str) -> anyhow::Result<ParseOutput> {
        match self {
            Self::Fbx(loader) => {
                let bytes = assets.load_binary(path).await?;
                Ok(ParseOutput::Fbx(loader.parse(&bytes)?))
            }
            Self::Gltf(loader) => Ok(ParseOutput::Gltf(loader.load(assets, path).await?)),
        }
    }
}

pub struct FormatSpec {
    pub make_parser: fn() -> Parser,
    /// Uniform scale the extracted root is set to.
    pub scale: f32,
    /// Light intensities applied when this format is selected. `None` keeps the current lights.
    pub preset: Option<LightPreset>,
    pub extract: fn(ParseOutput) -> anyhow::Result<Box<dyn SceneNode>>,
}

static FBX: FormatSpec = FormatSpec {
    make_parser: || Parser::Fbx(FbxLoader::new()),
    scale: 0.1,
    preset: None,
    extract: |output| match output {
        ParseOutput::Fbx(root) => Ok(root),
        ParseOutput::Gltf(_) => anyhow::bail!("the FBX parser returned glTF data"),
    },
};

static VRM: FormatSpec = FormatSpec {
    make_parser: || {
        let mut loader = GltfLoader::new();
        loader.register(Box::new(VrmLoaderPlugin));
        Parser::Gltf(loader)
    },
    scale: 40.0,
    preset: Some(LightPreset {
        ambient_intensity: 1.0,
        directional_intensity: 0.5,
    }),
    extract: |output| match output {
        ParseOutput::Gltf(result) => {
            let vrm = result
                .user_data
                .vrm
                .ok_or_else(|| anyhow::anyhow!("the file carries no VRM avatar data"))?;
            Ok(vrm.scene)
        }
        ParseOutput::Fbx(_) => anyhow::bail!("the VRM parser returned FBX data"),
    },
};
