#![cfg(feature = "integration-tests")]

use model_stage::{
    context::{Context, InitContext},
    controls::KeyboardControls,
    flow::{self, FlowConstructor, GraphicsFlow, ImageTestResult, Out},
    render::Render,
    resources::AssetSource,
    viewer::{LoadStatus, Viewer, ViewerEvent, ViewerState},
};
use winit::event::WindowEvent;

use crate::common::test_utils::{assets, vrm1_glb};

mod common;

/// Runs the viewer until its load settles and checks where it ended up.
struct Settles {
    viewer: Viewer,
    expected: LoadStatus,
}

impl GraphicsFlow<ViewerState, ViewerEvent> for Settles {
    fn on_init(&mut self, ctx: &mut Context, state: &mut ViewerState) -> Out<ViewerState, ViewerEvent> {
        self.viewer.on_init(ctx, state)
    }

    fn on_update(
        &mut self,
        ctx: &Context,
        state: &mut ViewerState,
        dt: std::time::Duration,
    ) -> Out<ViewerState, ViewerEvent> {
        self.viewer.on_update(ctx, state, dt)
    }

    fn on_window_events(
        &mut self,
        ctx: &Context,
        state: &mut ViewerState,
        event: &WindowEvent,
    ) -> Out<ViewerState, ViewerEvent> {
        self.viewer.on_window_events(ctx, state, event)
    }

    fn on_custom_events(
        &mut self,
        ctx: &Context,
        state: &mut ViewerState,
        event: ViewerEvent,
    ) -> Option<ViewerEvent> {
        self.viewer.on_custom_events(ctx, state, event)
    }

    fn on_render(&self) -> Render<'_> {
        self.viewer.on_render()
    }

    fn render_to_texture(
        &self,
        ctx: &Context,
        state: &mut ViewerState,
        texture: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<ImageTestResult, anyhow::Error> {
        match self.viewer.render_to_texture(ctx, state, texture)? {
            ImageTestResult::Passed if state.status == self.expected => Ok(ImageTestResult::Passed),
            ImageTestResult::Passed => {
                anyhow::bail!("viewer settled on {:?}, expected {:?}", state.status, self.expected)
            }
            other => Ok(other),
        }
    }
}

fn settles(assets: AssetSource, key: &str, expected: LoadStatus) -> FlowConstructor<ViewerState, ViewerEvent> {
    let key = Some(key.to_string());
    Box::new(move |ctx: InitContext| {
        Box::pin(async move {
            let viewer = Viewer::new(ctx, assets, key, Box::new(KeyboardControls::new(1.0))).await;
            Box::new(Settles { viewer, expected }) as Box<dyn GraphicsFlow<ViewerState, ViewerEvent>>
        })
    })
}

#[test]
fn should_show_a_registered_avatar() {
    let assets = assets(vec![
        ("modelList.json", br#"{ "seed": "seed.vrm" }"#.to_vec()),
        ("model/seed.vrm", vrm1_glb("Seed")),
    ]);
    flow::run(vec![settles(
        assets,
        "seed",
        LoadStatus::Loaded("model/seed.vrm".to_string()),
    )])
    .expect("Failed to run flow for integration test.");
}
