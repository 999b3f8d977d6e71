#![allow(dead_code)]

use std::io::Cursor;

use model_stage::{
    data_structures::scene_graph::{SceneNode, traverse},
    resources::AssetSource,
};
use fbxcel::{
    low::FbxVersion,
    writer::v7400::binary::{FbxFooter, Result as FbxResult, Writer},
};
use serde_json::{Value, json};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// A binary glTF with a single triangle node named `body`.
///
/// `extensions` becomes the root `extensions` object, pass `Value::Null` for none.
pub(crate) fn triangle_glb(extensions: Value) -> Vec<u8> {
    pack_glb(&triangle_json(extensions), &triangle_bin())
}

/// Positions of the triangle, then its `u16` indices, padded to 4 bytes.
pub(crate) fn triangle_bin() -> Vec<u8> {
    let mut bin: Vec<u8> = Vec::new();
    for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        bin.extend(p.iter().flat_map(|c| c.to_le_bytes()));
    }
    for i in [0u16, 1, 2] {
        bin.extend(i.to_le_bytes());
    }
    pad(&mut bin, 0);
    bin
}

/// The JSON chunk of [`triangle_glb`], open for tweaking before packing.
pub(crate) fn triangle_json(extensions: Value) -> Value {
    let mut root = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "body", "mesh": 0 }],
        "meshes": [{ "name": "body", "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "buffers": [{ "byteLength": 44 }]
    });
    if !extensions.is_null() {
        root["extensions"] = extensions;
    }
    root
}

pub(crate) fn pack_glb(root: &Value, bin: &[u8]) -> Vec<u8> {
    let mut json_chunk = serde_json::to_vec(root).expect("fixture json");
    pad(&mut json_chunk, b' ');

    let total = 12 + 8 + json_chunk.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(GLB_MAGIC);
    glb.extend(2u32.to_le_bytes());
    glb.extend((total as u32).to_le_bytes());
    glb.extend((json_chunk.len() as u32).to_le_bytes());
    glb.extend(CHUNK_JSON.to_le_bytes());
    glb.extend(json_chunk);
    glb.extend((bin.len() as u32).to_le_bytes());
    glb.extend(CHUNK_BIN.to_le_bytes());
    glb.extend_from_slice(bin);
    glb
}

/// The root `extensions` of a VRM 1.0 avatar named `name`.
pub(crate) fn vrm1_extension(name: &str) -> Value {
    json!({
        "VRMC_vrm": {
            "specVersion": "1.0",
            "meta": { "name": name, "authors": ["tests"] },
            "humanoid": { "humanBones": { "hips": { "node": 0 } } }
        }
    })
}

/// A VRM 1.0 avatar with its hips on the only node.
pub(crate) fn vrm1_glb(name: &str) -> Vec<u8> {
    triangle_glb(vrm1_extension(name))
}

pub(crate) fn vrm0_glb(title: &str) -> Vec<u8> {
    triangle_glb(json!({
        "VRM": {
            "meta": { "title": title, "author": "tests" },
            "humanoid": { "humanBones": [{ "bone": "hips", "node": 0 }] }
        }
    }))
}

fn pad(bytes: &mut Vec<u8>, with: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(with);
    }
}

type FbxWriter = Writer<Cursor<Vec<u8>>>;

/// A binary FBX 7.4 file with whatever top level nodes `build` writes.
pub(crate) fn write_fbx(build: impl FnOnce(&mut FbxWriter) -> FbxResult<()>) -> Vec<u8> {
    let mut writer = Writer::new(Cursor::new(Vec::new()), FbxVersion::V7_4).expect("fbx header");
    build(&mut writer).expect("fbx nodes");
    writer
        .finalize(&FbxFooter::default())
        .expect("fbx footer")
        .into_inner()
}

/// A `Hips` null with a `Body` mesh below it: one quad on the ground
/// plane with upward normals and a red `Skin` material.
pub(crate) fn rigged_quad_fbx() -> Vec<u8> {
    write_fbx(|w| {
        w.new_node("Objects")?;
        fbx_model(w, 100, "Hips", "Null", &[("Lcl Translation", [0.0, 25.0, 0.0])])?;
        fbx_model(w, 101, "Body", "Mesh", &[("Lcl Scaling", [2.0, 2.0, 2.0])])?;
        fbx_quad_geometry(w, 200)?;
        fbx_material(w, 300, "Skin", [1.0, 0.0, 0.0])?;
        w.close_node()?;

        w.new_node("Connections")?;
        for (child, parent) in [(100, 0), (101, 100), (200, 101), (300, 101)] {
            {
                let mut attrs = w.new_node("C")?;
                attrs.append_string_direct("OO")?;
                attrs.append_i64(child)?;
                attrs.append_i64(parent)?;
            }
            w.close_node()?;
        }
        w.close_node()
    })
}

fn fbx_object(w: &mut FbxWriter, node: &str, id: i64, name: &str, class: &str) -> FbxResult<()> {
    let mut attrs = w.new_node(node)?;
    attrs.append_i64(id)?;
    attrs.append_string_direct(&format!("{}\u{0}\u{1}{}", name, node))?;
    attrs.append_string_direct(class)
}

fn fbx_properties(w: &mut FbxWriter, props: &[(&str, [f64; 3])]) -> FbxResult<()> {
    w.new_node("Properties70")?;
    for (name, [x, y, z]) in props {
        {
            let mut attrs = w.new_node("P")?;
            for header in [*name, "Vector3D", "Vector", "A"] {
                attrs.append_string_direct(header)?;
            }
            attrs.append_f64(*x)?;
            attrs.append_f64(*y)?;
            attrs.append_f64(*z)?;
        }
        w.close_node()?;
    }
    w.close_node()
}

fn fbx_model(
    w: &mut FbxWriter,
    id: i64,
    name: &str,
    class: &str,
    props: &[(&str, [f64; 3])],
) -> FbxResult<()> {
    fbx_object(w, "Model", id, name, class)?;
    fbx_properties(w, props)?;
    w.close_node()
}

fn fbx_material(w: &mut FbxWriter, id: i64, name: &str, diffuse: [f64; 3]) -> FbxResult<()> {
    fbx_object(w, "Material", id, name, "")?;
    fbx_properties(w, &[("DiffuseColor", diffuse)])?;
    w.close_node()
}

fn fbx_array_f64(w: &mut FbxWriter, name: &str, values: &[f64]) -> FbxResult<()> {
    w.new_node(name)?.append_arr_f64_from_iter(None, values.iter().copied())?;
    w.close_node()
}

fn fbx_string(w: &mut FbxWriter, name: &str, value: &str) -> FbxResult<()> {
    w.new_node(name)?.append_string_direct(value)?;
    w.close_node()
}

fn fbx_quad_geometry(w: &mut FbxWriter, id: i64) -> FbxResult<()> {
    fbx_object(w, "Geometry", id, "Body", "Mesh")?;
    fbx_array_f64(w, "Vertices", &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0, -1.0])?;
    w.new_node("PolygonVertexIndex")?
        .append_arr_i32_from_iter(None, [0, 1, 2, !3])?;
    w.close_node()?;

    w.new_node("LayerElementNormal")?.append_i32(0)?;
    fbx_string(w, "MappingInformationType", "ByPolygonVertex")?;
    fbx_string(w, "ReferenceInformationType", "Direct")?;
    fbx_array_f64(w, "Normals", &[0.0, 1.0, 0.0].repeat(4))?;
    w.close_node()?;

    w.close_node()
}

/// Files served from memory, keyed by their path below the asset root.
pub(crate) fn assets(files: Vec<(&str, Vec<u8>)>) -> AssetSource {
    AssetSource::in_memory(files.into_iter().map(|(name, bytes)| (name.to_string(), bytes)))
}

/// `(casts, receives)` of every mesh below `root`.
pub(crate) fn shadow_flags(root: &dyn SceneNode) -> Vec<(bool, bool)> {
    let mut flags = Vec::new();
    traverse(root, &mut |node| {
        if let Some(mesh) = node.as_mesh() {
            flags.push((mesh.cast_shadow, mesh.receive_shadow));
        }
    });
    flags
}
