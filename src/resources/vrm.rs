//! VRM avatar metadata on top of the glTF loader.
//!
//! Only what a viewer needs is interpreted: the meta block (name, version,
//! authors) and the humanoid bone mapping. Both VRM 0.x (`VRM` extension)
//! and VRM 1.0 (`VRMC_vrm`) are understood.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{
    data_structures::scene_graph::SceneNode,
    resources::gltf::{GltfLoaderPlugin, GltfParser, GltfResult},
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VrmMeta {
    pub name: Option<String>,
    pub version: Option<String>,
    pub authors: Vec<String>,
    /// `0` for VRM 0.x files, `1` for VRM 1.0.
    pub spec_major: u32,
}

/// Humanoid bone name (`hips`, `leftHand`, ...) to glTF node index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Humanoid {
    pub human_bones: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub struct Vrm {
    pub meta: VrmMeta,
    pub humanoid: Humanoid,
    /// Root of the avatar. This is the glTF scene itself.
    pub scene: Box<dyn SceneNode>,
}

/// Registers with a [`GltfLoader`](crate::resources::gltf::GltfLoader) and
/// fills [`UserData::vrm`](crate::resources::gltf::UserData) when the file is an avatar.
pub struct VrmLoaderPlugin;

impl GltfLoaderPlugin for VrmLoaderPlugin {
    fn name(&self) -> &'static str {
        "VRM"
    }

    fn after_root(&self, parser: &GltfParser<'_>, result: &mut GltfResult) -> anyhow::Result<()> {
        let (meta, humanoid) = if let Some(ext) = parser.root_extension("VRMC_vrm") {
            parse_vrm1(ext)?
        } else if let Some(ext) = parser.root_extension("VRM") {
            parse_vrm0(ext)?
        } else {
            log::debug!("{}: neither VRMC_vrm nor VRM present", parser.path);
            return Ok(());
        };

        let node_count = parser.document.nodes().len();
        if let Some((bone, node)) = humanoid
            .human_bones
            .iter()
            .find(|(_, node)| **node >= node_count)
        {
            anyhow::bail!("humanoid bone {} points at missing node {}", bone, node);
        }

        let scene = result
            .scene
            .take()
            .ok_or_else(|| anyhow::anyhow!("the glTF scene was already taken"))?;
        log::debug!(
            "{}: VRM {}.x avatar {:?} with {} humanoid bones",
            parser.path,
            meta.spec_major,
            meta.name,
            humanoid.human_bones.len()
        );
        result.user_data.vrm = Some(Vrm {
            meta,
            humanoid,
            scene,
        });
        Ok(())
    }
}

#[derive(Deserialize)]
struct Vrm0 {
    #[serde(default)]
    meta: Vrm0Meta,
    #[serde(default)]
    humanoid: Vrm0Humanoid,
}

#[derive(Default, Deserialize)]
struct Vrm0Meta {
    title: Option<String>,
    version: Option<String>,
    author: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Vrm0Humanoid {
    #[serde(default)]
    human_bones: Vec<Vrm0Bone>,
}

#[derive(Deserialize)]
struct Vrm0Bone {
    bone: String,
    node: i64,
}

fn parse_vrm0(ext: &serde_json::Value) -> anyhow::Result<(VrmMeta, Humanoid)> {
    let vrm: Vrm0 = serde_json::from_value(ext.clone())?;
    let meta = VrmMeta {
        name: vrm.meta.title,
        version: vrm.meta.version,
        authors: vrm.meta.author.into_iter().collect(),
        spec_major: 0,
    };
    let human_bones = vrm
        .humanoid
        .human_bones
        .into_iter()
        // 0.x exporters write -1 for unassigned bones
        .filter_map(|b| usize::try_from(b.node).ok().map(|node| (b.bone, node)))
        .collect();
    Ok((meta, Humanoid { human_bones }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Vrm1 {
    spec_version: Option<String>,
    meta: Vrm1Meta,
    #[serde(default)]
    humanoid: Vrm1Humanoid,
}

#[derive(Deserialize)]
struct Vrm1Meta {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Vrm1Humanoid {
    #[serde(default)]
    human_bones: BTreeMap<String, Vrm1Bone>,
}

#[derive(Deserialize)]
struct Vrm1Bone {
    node: usize,
}

fn parse_vrm1(ext: &serde_json::Value) -> anyhow::Result<(VrmMeta, Humanoid)> {
    let vrm: Vrm1 = serde_json::from_value(ext.clone())?;
    if let Some(version) = &vrm.spec_version {
        log::debug!("VRMC_vrm specVersion {}", version);
    }
    let meta = VrmMeta {
        name: vrm.meta.name,
        version: vrm.meta.version,
        authors: vrm.meta.authors,
        spec_major: 1,
    };
    let human_bones = vrm
        .humanoid
        .human_bones
        .into_iter()
        .map(|(bone, b)| (bone, b.node))
        .collect();
    Ok((meta, Humanoid { human_bones }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn vrm0_meta_and_bones() {
        let ext = json!({
            "meta": { "title": "Alicia", "version": "1.0", "author": "Dwango" },
            "humanoid": { "humanBones": [
                { "bone": "hips", "node": 3 },
                { "bone": "jaw", "node": -1 }
            ]}
        });
        let (meta, humanoid) = parse_vrm0(&ext).unwrap();
        assert_eq!(meta.name.as_deref(), Some("Alicia"));
        assert_eq!(meta.authors, ["Dwango"]);
        assert_eq!(meta.spec_major, 0);
        assert_eq!(humanoid.human_bones.get("hips"), Some(&3));
        assert!(!humanoid.human_bones.contains_key("jaw"));
    }

    #[test]
    fn vrm1_meta_and_bones() {
        let ext = json!({
            "specVersion": "1.0",
            "meta": { "name": "Seed-san", "authors": ["VRM Consortium"], "licenseUrl": "" },
            "humanoid": { "humanBones": { "hips": { "node": 1 }, "head": { "node": 7 } } }
        });
        let (meta, humanoid) = parse_vrm1(&ext).unwrap();
        assert_eq!(meta.name.as_deref(), Some("Seed-san"));
        assert_eq!(meta.spec_major, 1);
        assert_eq!(humanoid.human_bones.len(), 2);
        assert_eq!(humanoid.human_bones["head"], 7);
    }

    #[test]
    fn vrm1_without_meta_is_rejected() {
        assert!(parse_vrm1(&json!({ "specVersion": "1.0" })).is_err());
    }
}
