//! Binary FBX (7.x) import.
//!
//! The file is read with `fbxcel` into a [`FbxDocument`] holding the parts of
//! the object graph a static viewer needs: models with their local
//! transforms, mesh geometry, diffuse material colours and the `OO`
//! connections between them. [`FbxDocument::into_scene`] then builds the
//! scene nodes under a single root group.

use std::{
    collections::{HashMap, HashSet},
    io::Cursor,
};

use anyhow::{Context as _, bail};
use cgmath::{Deg, Quaternion, Rotation3, Vector3};
use fbxcel::{
    low::v7400::AttributeValue,
    tree::{any::AnyTree, v7400::NodeHandle},
};

use crate::{
    config::srgb_to_linear,
    data_structures::{
        model::{Material, Mesh, ModelVertex},
        scene_graph::{ContainerNode, MeshNode, SceneNode},
        transform::Transform,
    },
};

const BINARY_MAGIC: &[u8] = b"Kaydara FBX Binary  \x00";

/// Parser for one FBX file.
#[derive(Debug, Default)]
pub struct FbxLoader;

impl FbxLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, bytes: &[u8]) -> anyhow::Result<Box<dyn SceneNode>> {
        let document = FbxDocument::from_bytes(bytes)?;
        log::debug!(
            "FBX: {} models, {} geometries, {} materials, {} connections",
            document.models.len(),
            document.geometries.len(),
            document.materials.len(),
            document.connections.len()
        );
        Ok(document.into_scene())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FbxModel {
    pub name: String,
    pub transform: Transform,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mapping {
    ByPolygonVertex,
    ByVertex,
    ByPolygon,
    AllSame,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Reference {
    Direct,
    IndexToDirect,
}

/// One `LayerElement*` block (normals or UVs).
#[derive(Clone, Debug, PartialEq)]
pub struct LayerElement {
    pub mapping: Mapping,
    pub reference: Reference,
    pub data: Vec<f64>,
    pub index: Vec<i32>,
}

impl LayerElement {
    /// The `N` components for one polygon vertex.
    fn get<const N: usize>(
        &self,
        polygon_vertex: usize,
        control_point: usize,
        polygon: usize,
    ) -> Option<[f32; N]> {
        let element = match self.mapping {
            Mapping::ByPolygonVertex => polygon_vertex,
            Mapping::ByVertex => control_point,
            Mapping::ByPolygon => polygon,
            Mapping::AllSame => 0,
        };
        let element = match self.reference {
            Reference::Direct => element,
            Reference::IndexToDirect => usize::try_from(*self.index.get(element)?).ok()?,
        };
        let start = element.checked_mul(N)?;
        let values = self.data.get(start..start.checked_add(N)?)?;
        let mut out = [0.0; N];
        out.iter_mut().zip(values).for_each(|(o, v)| *o = *v as f32);
        Some(out)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FbxGeometry {
    /// Control points.
    pub vertices: Vec<[f64; 3]>,
    /// Control point indices; the last index of each polygon is stored as `!index`.
    pub polygon_vertex_index: Vec<i32>,
    pub normals: Option<LayerElement>,
    pub uvs: Option<LayerElement>,
}

impl FbxGeometry {
    /// Fan triangulates every polygon into an unindexed-per-corner triangle list.
    ///
    /// Polygons without normals get their face normal.
    pub fn triangulate(&self, name: &str, material: Material) -> anyhow::Result<Mesh> {
        let mut vertices: Vec<ModelVertex> = Vec::with_capacity(self.polygon_vertex_index.len());
        let mut indices = Vec::new();
        let mut polygon_start = 0;
        let mut polygon = 0;

        let last = self.polygon_vertex_index.len().saturating_sub(1);
        for (polygon_vertex, &raw) in self.polygon_vertex_index.iter().enumerate() {
            let closes = raw < 0;
            let control_point = (if closes { !raw } else { raw }) as usize;
            let position = self
                .vertices
                .get(control_point)
                .with_context(|| format!("{}: control point {} out of range", name, control_point))?;

            let normal = self
                .normals
                .as_ref()
                .and_then(|n| n.get::<3>(polygon_vertex, control_point, polygon));
            let tex_coords = self
                .uvs
                .as_ref()
                .and_then(|uv| uv.get::<2>(polygon_vertex, control_point, polygon))
                // FBX puts the UV origin bottom left
                .map(|[u, v]| [u, 1.0 - v])
                .unwrap_or_default();
            vertices.push(ModelVertex {
                position: position.map(|c| c as f32),
                tex_coords,
                normal: normal.unwrap_or_default(),
            });

            if closes || polygon_vertex == last {
                if !closes {
                    log::warn!("{}: last polygon is not terminated", name);
                }
                let corners = &mut vertices[polygon_start..];
                if normal.is_none() {
                    let face = newell_normal(corners);
                    corners.iter_mut().for_each(|v| v.normal = face);
                }
                let count = corners.len() as u32;
                let start = polygon_start as u32;
                for i in 1..count.saturating_sub(1) {
                    indices.extend_from_slice(&[start, start + i, start + i + 1]);
                }
                polygon += 1;
                polygon_start = vertices.len();
            }
        }

        Ok(Mesh {
            name: name.to_string(),
            vertices,
            indices,
            material,
        })
    }
}

fn newell_normal(corners: &[ModelVertex]) -> [f32; 3] {
    use cgmath::InnerSpace;

    let mut n = Vector3::new(0.0f32, 0.0, 0.0);
    for (i, a) in corners.iter().enumerate() {
        let b = &corners[(i + 1) % corners.len()];
        let (a, b) = (a.position, b.position);
        n.x += (a[1] - b[1]) * (a[2] + b[2]);
        n.y += (a[2] - b[2]) * (a[0] + b[0]);
        n.z += (a[0] - b[0]) * (a[1] + b[1]);
    }
    if n.magnitude2() > 0.0 {
        n.normalize().into()
    } else {
        [0.0, 1.0, 0.0]
    }
}

/// The object graph of an FBX file, keyed by object id.
#[derive(Debug, Default)]
pub struct FbxDocument {
    pub models: HashMap<i64, FbxModel>,
    pub geometries: HashMap<i64, FbxGeometry>,
    pub materials: HashMap<i64, Material>,
    /// `(child, parent)` object links; parent `0` is the scene root.
    pub connections: Vec<(i64, i64)>,
    /// Object ids in file order, so siblings keep their order.
    pub order: Vec<i64>,
}

impl FbxDocument {
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        if !bytes.starts_with(BINARY_MAGIC) {
            if bytes.starts_with(b"; FBX") {
                bail!("ASCII FBX is not supported");
            }
            bail!("not a binary FBX file");
        }
        let tree = AnyTree::from_seekable_reader(Cursor::new(bytes))
            .map_err(|e| anyhow::anyhow!("FBX parse error: {}", e))?;
        match tree {
            AnyTree::V7400(version, tree, _footer) => {
                log::debug!("FBX version {:?}", version);
                Self::from_root(tree.root())
            }
            _ => bail!("unsupported FBX version"),
        }
    }

    fn from_root(root: NodeHandle<'_>) -> anyhow::Result<Self> {
        let mut document = Self::default();
        let objects = root
            .first_child_by_name("Objects")
            .context("FBX has no Objects section")?;

        for object in objects.children() {
            let attrs = object.attributes();
            let Some(id) = attrs.first().and_then(as_i64) else {
                continue;
            };
            let name = attrs.get(1).and_then(as_str).map(object_name).unwrap_or("");
            let class = attrs.get(2).and_then(as_str).unwrap_or("");
            match object.name() {
                "Model" => {
                    let model = FbxModel {
                        name: name.to_string(),
                        transform: model_transform(object),
                    };
                    document.models.insert(id, model);
                }
                "Geometry" if class == "Mesh" => {
                    document.geometries.insert(id, read_geometry(object)?);
                }
                "Material" => {
                    document.materials.insert(id, read_material(name, object));
                }
                _ => continue,
            }
            document.order.push(id);
        }

        if let Some(connections) = root.first_child_by_name("Connections") {
            for c in connections.children_by_name("C") {
                let attrs = c.attributes();
                if attrs.first().and_then(as_str) != Some("OO") {
                    continue;
                }
                if let (Some(child), Some(parent)) =
                    (attrs.get(1).and_then(as_i64), attrs.get(2).and_then(as_i64))
                {
                    document.connections.push((child, parent));
                }
            }
        }
        Ok(document)
    }

    /// Builds the scene: every model connected to the root (or to nothing
    /// that is a model) becomes a child of the returned group.
    pub fn into_scene(self) -> Box<dyn SceneNode> {
        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut model_parent: HashMap<i64, i64> = HashMap::new();
        for &(child, parent) in &self.connections {
            children.entry(parent).or_default().push(child);
            if self.models.contains_key(&child) && self.models.contains_key(&parent) {
                model_parent.insert(child, parent);
            }
        }
        let position: HashMap<i64, usize> =
            self.order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        for list in children.values_mut() {
            list.sort_by_key(|id| position.get(id).copied().unwrap_or(usize::MAX));
        }

        let mut root = ContainerNode::new("fbx");
        let mut visited = HashSet::new();
        for &id in &self.order {
            if self.models.contains_key(&id) && !model_parent.contains_key(&id) {
                if let Some(node) = self.build_model(id, &children, &mut visited) {
                    root.add_child(node);
                }
            }
        }
        Box::new(root)
    }

    fn build_model(
        &self,
        id: i64,
        children: &HashMap<i64, Vec<i64>>,
        visited: &mut HashSet<i64>,
    ) -> Option<Box<dyn SceneNode>> {
        if !visited.insert(id) {
            log::warn!("FBX: model {} is connected in a cycle, skipped", id);
            return None;
        }
        let model = self.models.get(&id)?;
        let linked = children.get(&id).map(Vec::as_slice).unwrap_or_default();

        let material = linked
            .iter()
            .find_map(|c| self.materials.get(c))
            .cloned()
            .unwrap_or_default();
        let mesh = linked
            .iter()
            .find_map(|c| self.geometries.get(c))
            .and_then(|g| match g.triangulate(&model.name, material) {
                Ok(mesh) if !mesh.indices.is_empty() => Some(mesh),
                Ok(_) => None,
                Err(e) => {
                    log::warn!("FBX: geometry of {} skipped: {:#}", model.name, e);
                    None
                }
            });

        let mut node: Box<dyn SceneNode> = match mesh {
            Some(mesh) => Box::new(MeshNode::new(mesh)),
            None => Box::new(ContainerNode::new(&model.name)),
        };
        node.set_local_transform(model.transform);
        for child in linked {
            if self.models.contains_key(child) {
                if let Some(child_node) = self.build_model(*child, children, visited) {
                    node.add_child(child_node);
                }
            }
        }
        Some(node)
    }
}

/// `"Body\x00\x01Model"` is stored as name, separator, class.
fn object_name(raw: &str) -> &str {
    raw.split("\u{0}\u{1}").next().unwrap_or(raw)
}

fn as_i64(value: &AttributeValue) -> Option<i64> {
    match value {
        AttributeValue::I64(v) => Some(*v),
        AttributeValue::I32(v) => Some(*v as i64),
        AttributeValue::I16(v) => Some(*v as i64),
        _ => None,
    }
}

fn as_f64(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::F64(v) => Some(*v),
        AttributeValue::F32(v) => Some(*v as f64),
        AttributeValue::I64(v) => Some(*v as f64),
        AttributeValue::I32(v) => Some(*v as f64),
        AttributeValue::I16(v) => Some(*v as f64),
        _ => None,
    }
}

fn as_str(value: &AttributeValue) -> Option<&str> {
    match value {
        AttributeValue::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn as_f64_array(value: &AttributeValue) -> Option<Vec<f64>> {
    match value {
        AttributeValue::ArrF64(v) => Some(v.clone()),
        AttributeValue::ArrF32(v) => Some(v.iter().map(|f| *f as f64).collect()),
        _ => None,
    }
}

/// `None` also when a 64 bit array holds a value outside the `i32` range.
fn as_i32_array(value: &AttributeValue) -> Option<Vec<i32>> {
    match value {
        AttributeValue::ArrI32(v) => Some(v.clone()),
        AttributeValue::ArrI64(v) => v.iter().map(|i| i32::try_from(*i).ok()).collect(),
        _ => None,
    }
}

/// An index array child; missing is empty, present but unreadable fails.
fn index_array(node: NodeHandle<'_>, name: &str) -> anyhow::Result<Option<Vec<i32>>> {
    let Some(child) = node.first_child_by_name(name) else {
        return Ok(None);
    };
    child
        .attributes()
        .first()
        .and_then(as_i32_array)
        .map(Some)
        .with_context(|| format!("{} is not an array of 32 bit indices", name))
}

fn child_array<T>(
    node: NodeHandle<'_>,
    name: &str,
    read: fn(&AttributeValue) -> Option<Vec<T>>,
) -> Option<Vec<T>> {
    node.first_child_by_name(name)?.attributes().first().and_then(read)
}

fn child_str(node: NodeHandle<'_>, name: &str) -> Option<String> {
    node.first_child_by_name(name)?
        .attributes()
        .first()
        .and_then(as_str)
        .map(str::to_string)
}

/// `Properties70` entries: name to the values after the four header fields.
fn properties(object: NodeHandle<'_>) -> HashMap<String, Vec<f64>> {
    let Some(props) = object.first_child_by_name("Properties70") else {
        return HashMap::new();
    };
    props
        .children_by_name("P")
        .filter_map(|p| {
            let attrs = p.attributes();
            let name = attrs.first().and_then(as_str)?;
            let values = attrs.iter().skip(4).filter_map(as_f64).collect();
            Some((name.to_string(), values))
        })
        .collect()
}

fn vector3(props: &HashMap<String, Vec<f64>>, name: &str, default: [f64; 3]) -> [f64; 3] {
    match props.get(name).map(Vec::as_slice) {
        Some([x, y, z, ..]) => [*x, *y, *z],
        _ => default,
    }
}

/// Euler angles in degrees, applied X first, then Y, then Z.
pub fn euler_xyz(degrees: [f64; 3]) -> Quaternion<f32> {
    let [x, y, z] = degrees.map(|d| d as f32);
    Quaternion::from_angle_z(Deg(z)) * Quaternion::from_angle_y(Deg(y)) * Quaternion::from_angle_x(Deg(x))
}

fn model_transform(object: NodeHandle<'_>) -> Transform {
    let props = properties(object);
    let translation = vector3(&props, "Lcl Translation", [0.0; 3]);
    let pre_rotation = vector3(&props, "PreRotation", [0.0; 3]);
    let rotation = vector3(&props, "Lcl Rotation", [0.0; 3]);
    let scaling = vector3(&props, "Lcl Scaling", [1.0; 3]);
    Transform {
        position: Vector3::from(translation.map(|c| c as f32)),
        rotation: euler_xyz(pre_rotation) * euler_xyz(rotation),
        scale: Vector3::from(scaling.map(|c| c as f32)),
    }
}

fn read_geometry(object: NodeHandle<'_>) -> anyhow::Result<FbxGeometry> {
    let flat = child_array(object, "Vertices", as_f64_array).unwrap_or_default();
    if flat.len() % 3 != 0 {
        bail!("geometry vertex array length {} is not a multiple of 3", flat.len());
    }
    let vertices = flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
    let polygon_vertex_index = index_array(object, "PolygonVertexIndex")?.unwrap_or_default();

    let normals = object
        .first_child_by_name("LayerElementNormal")
        .map(|layer| read_layer(layer, "Normals", &["NormalsIndex", "NormalIndex"]))
        .transpose()?;
    let uvs = object
        .first_child_by_name("LayerElementUV")
        .map(|layer| read_layer(layer, "UV", &["UVIndex"]))
        .transpose()?;

    Ok(FbxGeometry {
        vertices,
        polygon_vertex_index,
        normals,
        uvs,
    })
}

fn read_layer(
    layer: NodeHandle<'_>,
    data_name: &str,
    index_names: &[&str],
) -> anyhow::Result<LayerElement> {
    let mapping = match child_str(layer, "MappingInformationType")
        .as_deref()
        .unwrap_or("ByPolygonVertex") {
        "ByPolygonVertex" => Mapping::ByPolygonVertex,
        "ByVertex" | "ByVertice" | "ByControlPoint" => Mapping::ByVertex,
        "ByPolygon" => Mapping::ByPolygon,
        "AllSame" => Mapping::AllSame,
        other => bail!("unsupported {} mapping {}", data_name, other),
    };
    let reference = match child_str(layer, "ReferenceInformationType")
        .as_deref()
        .unwrap_or("Direct") {
        "Direct" => Reference::Direct,
        "IndexToDirect" | "Index" => Reference::IndexToDirect,
        other => bail!("unsupported {} reference {}", data_name, other),
    };
    let data = child_array(layer, data_name, as_f64_array).unwrap_or_default();
    let mut index = Vec::new();
    for name in index_names {
        if let Some(found) = index_array(layer, name)? {
            index = found;
            break;
        }
    }
    Ok(LayerElement {
        mapping,
        reference,
        data,
        index,
    })
}

fn read_material(name: &str, object: NodeHandle<'_>) -> Material {
    let props = properties(object);
    let diffuse = props
        .get("DiffuseColor")
        .or_else(|| props.get("Diffuse"))
        .and_then(|v| match v.as_slice() {
            [r, g, b, ..] => Some([*r, *g, *b]),
            _ => None,
        })
        .unwrap_or([1.0; 3]);
    let opacity = props
        .get("Opacity")
        .and_then(|v| v.first().copied())
        .unwrap_or(1.0);
    let [r, g, b] = diffuse.map(|c| srgb_to_linear(c.clamp(0.0, 1.0) as f32));
    Material::new(name, [r, g, b, opacity.clamp(0.0, 1.0) as f32])
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Rotation};

    use super::*;

    fn quad() -> FbxGeometry {
        FbxGeometry {
            vertices: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 0.0, -1.0],
                [0.0, 0.0, -1.0],
            ],
            polygon_vertex_index: vec![0, 1, 2, !3],
            normals: None,
            uvs: None,
        }
    }

    #[test]
    fn quad_fans_into_two_triangles() {
        let mesh = quad().triangulate("quad", Material::default()).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, [0, 1, 2, 0, 2, 3]);
        // Counter clockwise seen from above
        for v in &mesh.vertices {
            assert_eq!(v.normal, [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn mixed_polygons_keep_their_own_corners() {
        let mut geometry = quad();
        geometry.polygon_vertex_index = vec![0, 1, !2, 0, 2, 3, 1, !0];
        let mesh = geometry.triangulate("mixed", Material::default()).unwrap();
        assert_eq!(mesh.triangle_count(), 1 + 3);
        assert_eq!(&mesh.indices[..3], &[0, 1, 2]);
        assert_eq!(&mesh.indices[3..6], &[3, 4, 5]);
    }

    #[test]
    fn out_of_range_control_point_fails() {
        let mut geometry = quad();
        geometry.polygon_vertex_index = vec![0, 1, !9];
        assert!(geometry.triangulate("broken", Material::default()).is_err());
    }

    #[test]
    fn indexed_uvs_by_polygon_vertex() {
        let mut geometry = quad();
        geometry.uvs = Some(LayerElement {
            mapping: Mapping::ByPolygonVertex,
            reference: Reference::IndexToDirect,
            data: vec![0.0, 0.0, 1.0, 0.25],
            index: vec![0, 1, 1, 0],
        });
        let mesh = geometry.triangulate("uv", Material::default()).unwrap();
        assert_eq!(mesh.vertices[1].tex_coords, [1.0, 0.75]);
        assert_eq!(mesh.vertices[3].tex_coords, [0.0, 1.0]);
    }

    #[test]
    fn direct_normals_by_vertex_win_over_face_normals() {
        let mut geometry = quad();
        geometry.normals = Some(LayerElement {
            mapping: Mapping::ByVertex,
            reference: Reference::Direct,
            data: [0.0, 0.0, 1.0].repeat(4),
            index: Vec::new(),
        });
        let mesh = geometry.triangulate("n", Material::default()).unwrap();
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn all_same_and_by_polygon_mappings() {
        let all_same = LayerElement {
            mapping: Mapping::AllSame,
            reference: Reference::Direct,
            data: vec![0.0, 1.0, 0.0],
            index: Vec::new(),
        };
        assert_eq!(all_same.get::<3>(7, 3, 2), Some([0.0, 1.0, 0.0]));

        let by_polygon = LayerElement {
            mapping: Mapping::ByPolygon,
            reference: Reference::Direct,
            data: vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            index: Vec::new(),
        };
        assert_eq!(by_polygon.get::<3>(5, 1, 1), Some([0.0, 0.0, 1.0]));
        assert_eq!(by_polygon.get::<3>(5, 1, 2), None);
    }

    #[test]
    fn huge_layer_indices_miss_instead_of_overflowing() {
        let uvs = LayerElement {
            mapping: Mapping::ByPolygonVertex,
            reference: Reference::IndexToDirect,
            data: vec![0.0, 0.0],
            index: vec![i32::MAX, -1],
        };
        assert_eq!(uvs.get::<2>(0, 0, 0), None);
        assert_eq!(uvs.get::<2>(1, 0, 0), None);
    }

    #[test]
    fn wide_index_arrays_must_fit_in_32_bits() {
        let fits = AttributeValue::ArrI64(vec![0, 1, -3]);
        assert_eq!(as_i32_array(&fits), Some(vec![0, 1, -3]));
        let wraps = AttributeValue::ArrI64(vec![0, i64::from(i32::MAX) + 1]);
        assert_eq!(as_i32_array(&wraps), None);
    }

    #[test]
    fn euler_rotates_x_first() {
        // X by 90 takes +Y to +Z, then Y by 90 takes +Z to +X
        let q = euler_xyz([90.0, 90.0, 0.0]);
        let v = q.rotate_vector(Vector3::new(0.0, 1.0, 0.0));
        assert!((v - Vector3::new(1.0, 0.0, 0.0)).magnitude() < 1e-5, "{:?}", v);
    }

    #[test]
    fn object_names_drop_the_class_suffix() {
        assert_eq!(object_name("Body\u{0}\u{1}Model"), "Body");
        assert_eq!(object_name("Plain"), "Plain");
    }

    fn document() -> FbxDocument {
        let mut doc = FbxDocument::default();
        let model = |id: i64, name: &str, doc: &mut FbxDocument| {
            doc.models.insert(
                id,
                FbxModel {
                    name: name.to_string(),
                    transform: Transform::new(),
                },
            );
            doc.order.push(id);
        };
        model(10, "Hips", &mut doc);
        model(11, "Body", &mut doc);
        model(12, "Loose", &mut doc);
        doc.geometries.insert(20, quad());
        doc.materials.insert(30, Material::new("Skin", [0.5, 0.25, 0.125, 1.0]));
        doc.order.extend([20, 30]);
        doc.connections = vec![(10, 0), (11, 10), (20, 11), (30, 11), (12, 0)];
        doc
    }

    #[test]
    fn connections_build_the_hierarchy() {
        let scene = document().into_scene();
        let roots: Vec<_> = scene.get_children().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(roots, ["Hips", "Loose"]);

        let hips = &scene.get_children()[0];
        assert!(hips.as_mesh().is_none());
        let body = hips.get_children()[0].as_mesh().expect("Body has geometry");
        assert_eq!(body.mesh.material.name, "Skin");
        assert_eq!(body.mesh.triangle_count(), 2);
        assert!(!body.cast_shadow && !body.receive_shadow);
    }

    #[test]
    fn connection_cycles_do_not_recurse_forever() {
        let mut doc = document();
        doc.connections.push((10, 11));
        // Hips and Body parent each other, so neither is a root any more
        let scene = doc.into_scene();
        assert_eq!(scene.get_children().len(), 1);
    }

    #[test]
    fn ascii_and_garbage_are_rejected() {
        let ascii = FbxLoader::new().parse(b"; FBX 7.4.0 project file\n");
        assert!(format!("{:#}", ascii.unwrap_err()).contains("ASCII"));
        assert!(FbxLoader::new().parse(b"PK\x03\x04").is_err());
        let truncated = [BINARY_MAGIC, &[0x1a, 0x00]].concat();
        assert!(FbxLoader::new().parse(&truncated).is_err());
    }
}
