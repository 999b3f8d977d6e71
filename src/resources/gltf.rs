//! glTF 2.0 import (GLB and JSON) with a small plugin hook for extensions.
//!
//! The loader turns the document's scene into scene nodes. Plugins run after
//! that conversion and may read the raw JSON root to interpret extensions
//! the `gltf` crate knows nothing about, putting what they find into
//! [`GltfResult::user_data`].

use std::{borrow::Cow, collections::HashMap, sync::Arc};

use anyhow::Context as _;

use crate::{
    data_structures::{
        model::{Material, Mesh, ModelVertex},
        scene_graph::{ContainerNode, MeshNode, SceneNode},
        transform::Transform,
    },
    resources::{AssetSource, sibling_path, vrm::Vrm},
};

/// Everything a plugin may look at while the result is being assembled.
pub struct GltfParser<'a> {
    pub path: &'a str,
    pub document: &'a gltf::Document,
    /// The unmodified JSON root of the file.
    pub json: &'a serde_json::Value,
}

impl GltfParser<'_> {
    /// Raw value of a root level extension, e.g. `VRM` or `VRMC_vrm`.
    pub fn root_extension(&self, name: &str) -> Option<&serde_json::Value> {
        self.json.get("extensions")?.get(name)
    }
}

pub trait GltfLoaderPlugin {
    fn name(&self) -> &'static str;

    /// Called once the scene has been converted.
    fn after_root(&self, parser: &GltfParser<'_>, result: &mut GltfResult) -> anyhow::Result<()>;
}

/// Extension data plugins attach to a result.
#[derive(Debug, Default)]
pub struct UserData {
    pub vrm: Option<Vrm>,
}

#[derive(Debug)]
pub struct GltfResult {
    /// The converted scene. Plugins that take ownership of it leave `None`.
    pub scene: Option<Box<dyn SceneNode>>,
    pub user_data: UserData,
}

#[derive(Default)]
pub struct GltfLoader {
    plugins: Vec<Box<dyn GltfLoaderPlugin>>,
}

impl GltfLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn GltfLoaderPlugin>) {
        self.plugins.push(plugin);
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub async fn load(&self, assets: &AssetSource, path: &str) -> anyhow::Result<GltfResult> {
        let bytes = assets.load_binary(path).await?;
        let json = json_root(&bytes)?;
        let gltf = gltf::Gltf::from_slice_without_validation(&bytes)
            .and_then(|gltf| validate(&gltf.document).map(|()| gltf))
            .with_context(|| format!("{} is not a valid glTF file", path))?;

        // Load buffers
        let mut buffers: Vec<Vec<u8>> = Vec::new();
        for buffer in gltf.buffers() {
            match buffer.source() {
                gltf::buffer::Source::Bin => {
                    let blob = gltf
                        .blob
                        .as_deref()
                        .context("the GLB binary chunk is missing")?;
                    buffers.push(blob.to_vec());
                }
                gltf::buffer::Source::Uri(uri) => {
                    if uri.starts_with("data:") {
                        anyhow::bail!("buffer {} is an embedded data URI", buffer.index());
                    }
                    buffers.push(assets.load_binary(&sibling_path(path, uri)).await?);
                }
            }
        }

        // Load images, a broken image only costs its texture
        let mut images: Vec<Option<Arc<image::RgbaImage>>> = Vec::new();
        for img in gltf.images() {
            let decoded = match img.source() {
                gltf::image::Source::View { view, .. } => {
                    let start = view.offset();
                    let end = start + view.length();
                    buffers
                        .get(view.buffer().index())
                        .and_then(|b| b.get(start..end))
                        .context("image view outside of its buffer")
                        .and_then(|data| Ok(image::load_from_memory(data)?))
                }
                gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => {
                    Err(anyhow::anyhow!("embedded data URI images are not supported"))
                }
                gltf::image::Source::Uri { uri, .. } => {
                    match assets.load_binary(&sibling_path(path, uri)).await {
                        Ok(data) => image::load_from_memory(&data).map_err(anyhow::Error::from),
                        Err(e) => Err(e),
                    }
                }
            };
            match decoded {
                Ok(decoded) => images.push(Some(Arc::new(decoded.to_rgba8()))),
                Err(e) => {
                    log::warn!("{}: image {} skipped: {:#}", path, img.index(), e);
                    images.push(None);
                }
            }
        }

        let scene = gltf
            .default_scene()
            .or_else(|| gltf.scenes().next())
            .with_context(|| format!("{} contains no scene", path))?;
        let mut root = ContainerNode::new(scene.name().unwrap_or("Scene"));
        let mut textures = TextureLookup {
            images: &images,
            materials: HashMap::new(),
        };
        for node in scene.nodes() {
            let index = node.index();
            let converted = to_scene_node(node, &buffers, &mut textures)
                .with_context(|| format!("{}: node {}", path, index))?;
            root.add_child(converted);
        }

        let mut result = GltfResult {
            scene: Some(Box::new(root)),
            user_data: UserData::default(),
        };
        let parser = GltfParser {
            path,
            document: &gltf.document,
            json: &json,
        };
        for plugin in &self.plugins {
            plugin
                .after_root(&parser, &mut result)
                .with_context(|| format!("{} plugin", plugin.name()))?;
        }
        Ok(result)
    }
}

/// The JSON chunk of a GLB, or the whole file for `.gltf`.
fn json_root(bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
    let json: Cow<'_, [u8]> = if bytes.starts_with(b"glTF") {
        gltf::Glb::from_slice(bytes)?.json
    } else {
        Cow::Borrowed(bytes)
    };
    Ok(serde_json::from_slice(&json)?)
}

struct TextureLookup<'a> {
    images: &'a [Option<Arc<image::RgbaImage>>],
    materials: HashMap<Option<usize>, Material>,
}

impl TextureLookup<'_> {
    fn material(&mut self, material: gltf::Material<'_>) -> Material {
        let images = self.images;
        self.materials
            .entry(material.index())
            .or_insert_with(|| {
                let pbr = material.pbr_metallic_roughness();
                let mut converted = Material::new(
                    material.name().unwrap_or("material"),
                    pbr.base_color_factor(),
                );
                converted.diffuse = pbr
                    .base_color_texture()
                    .and_then(|info| images.get(info.texture().source().index()))
                    .and_then(|img| img.clone());
                converted
            })
            .clone()
    }
}

fn to_scene_node(
    node: gltf::Node<'_>,
    buffers: &[Vec<u8>],
    textures: &mut TextureLookup<'_>,
) -> anyhow::Result<Box<dyn SceneNode>> {
    let name = node.name().unwrap_or("node");
    let mut meshes: Vec<Mesh> = Vec::new();
    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().unwrap_or(name);
        for primitive in mesh.primitives() {
            meshes.extend(to_mesh(mesh_name, primitive, buffers, textures)?);
        }
    }

    let mut scene_node: Box<dyn SceneNode> = if meshes.len() == 1 {
        Box::new(MeshNode::new(meshes.remove(0)))
    } else {
        // Several primitives become one group of mesh nodes
        let mut group = ContainerNode::new(name);
        for mesh in meshes {
            group.add_child(Box::new(MeshNode::new(mesh)));
        }
        Box::new(group)
    };

    let (t, r, s) = node.transform().decomposed();
    scene_node.set_local_transform(Transform {
        position: t.into(),
        rotation: cgmath::Quaternion::new(r[3], r[0], r[1], r[2]),
        scale: s.into(),
    });

    for child in node.children() {
        scene_node.add_child(to_scene_node(child, buffers, textures)?);
    }
    Ok(scene_node)
}

/// Checks every index the document holds. A required extension the `gltf`
/// crate does not know (`VRMC_vrm` and vendor extensions) only warns.
fn validate(document: &gltf::Document) -> gltf::Result<()> {
    use gltf::json::validation::{Error, Validate};

    let root = document.as_json();
    let mut errors = Vec::new();
    root.validate(root, gltf::json::Path::new, &mut |path, error| match error {
        Error::Unsupported => log::warn!("glTF: {} is not supported, ignored", path()),
        _ => errors.push((path(), error)),
    });
    if errors.is_empty() {
        Ok(())
    } else {
        Err(gltf::Error::Validation(errors))
    }
}

/// Fails when the bytes an accessor reads run past its view or buffer.
fn check_accessor(accessor: &gltf::Accessor<'_>, buffers: &[Vec<u8>]) -> anyhow::Result<()> {
    let Some(view) = accessor.view() else {
        return Ok(());
    };
    let count = accessor.count();
    if count == 0 {
        return Ok(());
    }
    let stride = view.stride().unwrap_or(accessor.size());
    let read_end = stride
        .checked_mul(count - 1)
        .and_then(|n| n.checked_add(accessor.offset()))
        .and_then(|n| n.checked_add(accessor.size()));
    let view_end = view.offset().checked_add(view.length());
    let buffer_len = buffers.get(view.buffer().index()).map_or(0, Vec::len);
    match (read_end, view_end) {
        (Some(read_end), Some(view_end)) if read_end <= view.length() && view_end <= buffer_len => {
            Ok(())
        }
        _ => anyhow::bail!(
            "accessor {} reads {} elements past the end of buffer view {}",
            accessor.index(),
            count,
            view.index()
        ),
    }
}

fn to_mesh(
    name: &str,
    primitive: gltf::Primitive<'_>,
    buffers: &[Vec<u8>],
    textures: &mut TextureLookup<'_>,
) -> anyhow::Result<Option<Mesh>> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("{}: primitive {} is not a triangle list, skipped", name, primitive.index());
        return Ok(None);
    }
    for (_, accessor) in primitive.attributes() {
        check_accessor(&accessor, buffers)?;
    }
    if let Some(indices) = primitive.indices() {
        check_accessor(&indices, buffers)?;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let Some(positions) = reader.read_positions() else {
        log::warn!("{}: primitive {} has no positions, skipped", name, primitive.index());
        return Ok(None);
    };
    let mut vertices: Vec<ModelVertex> = positions
        .map(|position| ModelVertex {
            position,
            ..Default::default()
        })
        .collect();
    let has_normals = match reader.read_normals() {
        Some(normals) => {
            vertices
                .iter_mut()
                .zip(normals)
                .for_each(|(v, n)| v.normal = n);
            true
        }
        None => false,
    };
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|t| t.into_f32()) {
        vertices
            .iter_mut()
            .zip(tex_coords)
            .for_each(|(v, uv)| v.tex_coords = uv);
    }
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        anyhow::bail!(
            "{}: index {} of primitive {} is past its {} vertices",
            name,
            bad,
            primitive.index(),
            vertices.len()
        );
    }

    let mut mesh = Mesh {
        name: name.to_string(),
        vertices,
        indices,
        material: textures.material(primitive.material()),
    };
    if !has_normals {
        mesh.compute_normals();
    }
    Ok(Some(mesh))
}
