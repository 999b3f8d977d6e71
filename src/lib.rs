//! model-stage
//!
//! A small cross-platform model viewer running natively and in the browser
//! (WASM). It puts one FBX or VRM model, picked by a lookup key, on a lit and
//! shadowed stage with a ground plane and a grid, and lets the user orbit the
//! camera and nudge the model up and down.
//!
//! High-level modules
//! - `camera`: orbit camera, projection and the camera uniform
//! - `config`: viewer settings and their defaults
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `controls`: offset input and camera reset (DOM on the web, keys natively)
//! - `data_structures`: meshes, materials, textures, transforms and the scene graph
//! - `flow`: event loop and the flow abstraction the viewer is built on
//! - `pipelines`: render pipelines (lit meshes, shadow map, lines) and lights
//! - `render`: render composition for efficient pipeline reuse
//! - `resources`: asset access, model registry and the FBX / glTF / VRM loaders
//! - `stage`: ground, grid and the single model slot
//! - `viewer`: the flow tying it all together
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod stage;
pub mod viewer;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use crate::{
    controls::ControlPanel,
    flow::{FlowConstructor, GraphicsFlow},
    resources::AssetSource,
    viewer::{Viewer, ViewerEvent, ViewerState},
};

/// Constructor of the viewer flow for [`flow::run`].
pub fn viewer_flow(
    assets: AssetSource,
    key: Option<String>,
    controls: Box<dyn ControlPanel>,
) -> FlowConstructor<ViewerState, ViewerEvent> {
    Box::new(move |ctx| {
        Box::pin(async move {
            Box::new(Viewer::new(ctx, assets, key, controls).await)
                as Box<dyn GraphicsFlow<ViewerState, ViewerEvent>>
        })
    })
}

/// Opens the window and shows the model registered under `key`.
pub fn run_viewer(
    assets: AssetSource,
    key: Option<String>,
    controls: Box<dyn ControlPanel>,
) -> anyhow::Result<()> {
    flow::run(vec![viewer_flow(assets, key, controls)])
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let key = controls::query_key(&window.location().search()?);
    let assets = AssetSource::page().map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;
    let panel = controls::DomControls::new().map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;
    run_viewer(assets, key, Box::new(panel)).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
