use cgmath::Vector3;
use model_stage::{
    error::LoadError,
    resources::{self, PendingLoad, format::ModelFormat, registry::ModelRegistry},
};
use serde_json::{Value, json};

use crate::common::test_utils::{
    assets, pack_glb, rigged_quad_fbx, shadow_flags, triangle_bin, triangle_glb, triangle_json,
    vrm0_glb, vrm1_extension, vrm1_glb,
};

mod common;

#[tokio::test]
async fn vrm_avatar_is_scaled_and_casts_shadows() {
    let assets = assets(vec![("model/seed.vrm", vrm1_glb("Seed"))]);

    let loaded = resources::load(&assets, "model/seed.vrm")
        .await
        .expect("avatar loads")
        .expect("vrm has a parser");

    assert_eq!(loaded.format, ModelFormat::Vrm);
    assert_eq!(loaded.path, "model/seed.vrm");
    assert_eq!(
        loaded.node.get_local_transform().scale,
        Vector3::new(40.0, 40.0, 40.0)
    );
    assert_eq!(shadow_flags(loaded.node.as_ref()), [(true, true)]);
}

#[tokio::test]
async fn vrm0_avatars_load_too() {
    let assets = assets(vec![("model/alicia.VRM", vrm0_glb("Alicia"))]);
    let loaded = resources::load(&assets, "model/alicia.VRM")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.format, ModelFormat::Vrm);
    assert_eq!(shadow_flags(loaded.node.as_ref()).len(), 1);
}

#[tokio::test]
async fn plain_gltf_renamed_to_vrm_is_a_parse_failure() {
    let assets = assets(vec![("model/plain.vrm", triangle_glb(Value::Null))]);
    let err = resources::load(&assets, "model/plain.vrm").await.unwrap_err();
    assert!(matches!(err, LoadError::ParseFailure { .. }));
    assert_eq!(err.path(), "model/plain.vrm");
}

async fn broken_avatar_error(patch: impl FnOnce(&mut Value)) -> LoadError {
    let mut root = triangle_json(vrm1_extension("Broken"));
    patch(&mut root);
    let assets = assets(vec![("model/broken.vrm", pack_glb(&root, &triangle_bin()))]);
    match resources::load(&assets, "model/broken.vrm").await {
        Err(err) => err,
        Ok(_) => panic!("broken avatar loaded"),
    }
}

#[tokio::test]
async fn dangling_material_is_a_parse_failure() {
    let err = broken_avatar_error(|root| root["meshes"][0]["primitives"][0]["material"] = json!(7)).await;
    assert!(matches!(err, LoadError::ParseFailure { .. }));
    assert_eq!(err.path(), "model/broken.vrm");
}

#[tokio::test]
async fn dangling_child_node_is_a_parse_failure() {
    let err = broken_avatar_error(|root| root["nodes"][0]["children"] = json!([5])).await;
    assert!(matches!(err, LoadError::ParseFailure { .. }));
}

#[tokio::test]
async fn accessor_past_its_buffer_view_is_a_parse_failure() {
    let err = broken_avatar_error(|root| root["accessors"][0]["count"] = json!(3000)).await;
    assert!(matches!(err, LoadError::ParseFailure { .. }));
}

#[tokio::test]
async fn required_vrm_extension_still_loads() {
    let mut root = triangle_json(vrm1_extension("Strict"));
    root["extensionsUsed"] = json!(["VRMC_vrm"]);
    root["extensionsRequired"] = json!(["VRMC_vrm"]);
    let assets = assets(vec![("model/strict.vrm", pack_glb(&root, &triangle_bin()))]);

    let loaded = resources::load(&assets, "model/strict.vrm").await.unwrap().unwrap();
    assert_eq!(loaded.format, ModelFormat::Vrm);
}

#[tokio::test]
async fn fbx_scene_keeps_its_hierarchy_at_a_tenth_scale() {
    let assets = assets(vec![("model/rig.fbx", rigged_quad_fbx())]);
    let loaded = resources::load(&assets, "model/rig.fbx")
        .await
        .expect("fbx loads")
        .expect("fbx has a parser");

    assert_eq!(loaded.format, ModelFormat::Fbx);
    assert_eq!(
        loaded.node.get_local_transform().scale,
        Vector3::new(0.1, 0.1, 0.1)
    );

    let roots = loaded.node.get_children();
    assert_eq!(roots.len(), 1);
    let hips = &roots[0];
    assert_eq!(hips.name(), "Hips");
    assert!(hips.as_mesh().is_none());
    assert_eq!(hips.get_local_transform().position, Vector3::new(0.0, 25.0, 0.0));

    let body = &hips.get_children()[0];
    assert_eq!(body.get_local_transform().scale, Vector3::new(2.0, 2.0, 2.0));
    let mesh = &body.as_mesh().expect("Body has geometry").mesh;
    assert_eq!(mesh.material.name, "Skin");
    assert_eq!(mesh.triangle_count(), 2);
    assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));

    assert_eq!(shadow_flags(loaded.node.as_ref()), [(true, true)]);
}

#[tokio::test]
async fn unknown_extension_loads_nothing() {
    let assets = assets(vec![("model/mesh.obj", b"o mesh".to_vec())]);
    assert!(resources::load(&assets, "model/mesh.obj").await.unwrap().is_none());
    assert!(resources::load(&assets, "model/no_extension").await.unwrap().is_none());
}

#[tokio::test]
async fn missing_file_is_a_parse_failure() {
    let assets = assets(Vec::new());
    let err = resources::load(&assets, "model/gone.fbx").await.unwrap_err();
    assert!(matches!(err, LoadError::ParseFailure { .. }));
}

#[tokio::test]
async fn garbage_fbx_is_a_parse_failure() {
    let assets = assets(vec![("model/broken.fbx", b"definitely not fbx".to_vec())]);
    let err = resources::load(&assets, "model/broken.fbx").await.unwrap_err();
    assert!(matches!(err, LoadError::ParseFailure { .. }));
}

#[test]
fn selection_carries_the_format_preset() {
    let vrm = PendingLoad::select("model/a.vrm").unwrap();
    let preset = vrm.preset().expect("vrm switches lights");
    assert_eq!(preset.ambient_intensity, 1.0);
    assert_eq!(preset.directional_intensity, 0.5);

    let fbx = PendingLoad::select("model/a.fbx").unwrap();
    assert!(fbx.preset().is_none());
    assert!(PendingLoad::select("model/a.glb").is_none());
}

#[tokio::test]
async fn registry_key_resolves_to_a_loadable_model() {
    let assets = assets(vec![
        ("modelList.json", br#"{ "seed": "seed.vrm", "chair": "chair.fbx" }"#.to_vec()),
        ("model/seed.vrm", vrm1_glb("Seed")),
    ]);
    let registry = ModelRegistry::load(&assets, "modelList.json", "model").await;
    assert_eq!(registry.len(), 2);

    let path = registry.resolve("seed").unwrap();
    assert_eq!(path, "model/seed.vrm");
    assert!(resources::load(&assets, &path).await.unwrap().is_some());
    assert_eq!(registry.resolve("unknown"), None);
}
