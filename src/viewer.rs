//! The model viewer flow.
//!
//! On start it reads the optional `viewer.json` and the model registry,
//! resolves the requested key and, if a parser exists for the file, switches
//! to that format's light preset and hands the load to the flow runtime. The
//! finished load comes back as [`ViewerEvent::Loaded`] and is put on the
//! stage. Every frame the control panel is drained.

use instant::Duration;
use winit::event::WindowEvent;

use crate::{
    config::ViewerConfig,
    context::{Context, InitContext},
    controls::{ControlEvent, ControlPanel},
    error::LoadError,
    flow::{GraphicsFlow, Out},
    pipelines::light::Lights,
    render::Render,
    resources::{AssetSource, LoadedModel, PendingLoad, registry::ModelRegistry},
    stage::Stage,
};

/// Shown to the user when the requested model cannot be displayed.
pub const LOAD_FAILURE_MESSAGE: &str = "The model file could not be loaded.";

pub enum ViewerEvent {
    Loaded(Result<LoadedModel, LoadError>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum LoadStatus {
    /// No key, no registry entry or no parser for the entry.
    #[default]
    NoModel,
    Loading(String),
    Loaded(String),
    Failed(String),
}

#[derive(Debug, Default)]
pub struct ViewerState {
    pub status: LoadStatus,
}

/// Reads `viewer.json`; a missing file means defaults, a broken one is reported.
pub async fn load_config(assets: &AssetSource) -> ViewerConfig {
    match assets.load_string(ViewerConfig::FILE_NAME).await {
        Ok(text) => ViewerConfig::from_json(&text).unwrap_or_else(|e| {
            log::warn!("{} ignored: {:#}", ViewerConfig::FILE_NAME, e);
            ViewerConfig::default()
        }),
        Err(e) => {
            log::debug!("no {}, using defaults: {:#}", ViewerConfig::FILE_NAME, e);
            ViewerConfig::default()
        }
    }
}

pub struct Viewer {
    config: ViewerConfig,
    assets: AssetSource,
    pending: Option<PendingLoad>,
    stage: Stage,
    controls: Box<dyn ControlPanel>,
}

impl Viewer {
    pub async fn new(
        ctx: InitContext,
        assets: AssetSource,
        key: Option<String>,
        controls: Box<dyn ControlPanel>,
    ) -> Self {
        let config = load_config(&assets).await;
        let registry = ModelRegistry::load(&assets, &config.registry_file, &config.model_dir).await;
        let mut viewer = Self::with_registry(config, assets, &registry, key.as_deref(), controls);
        if let Err(e) = viewer
            .stage
            .write_to_buffers(&ctx.queue, &ctx.device, &ctx.materials)
        {
            log::error!("stage upload failed: {:#}", e);
        }
        viewer
    }

    /// Resolves `key` and picks the parser; no GPU work happens here.
    pub fn with_registry(
        config: ViewerConfig,
        assets: AssetSource,
        registry: &ModelRegistry,
        key: Option<&str>,
        mut controls: Box<dyn ControlPanel>,
    ) -> Self {
        controls.configure(&config);
        let path = key.and_then(|k| registry.resolve(k));
        match (key, &path) {
            (None, _) => log::info!("no model requested"),
            (Some(key), None) => log::info!("no model registered under {:?}", key),
            (Some(key), Some(path)) => log::info!("model {:?} -> {}", key, path),
        }
        let pending = path.as_deref().and_then(PendingLoad::select);
        Self {
            stage: Stage::new(&config.ground),
            config,
            assets,
            pending,
            controls,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Starts the load if one is pending and returns the future that resolves it.
    ///
    /// The format's light preset is applied to `lights` right away.
    pub fn start_load(
        &mut self,
        lights: &mut Lights,
        state: &mut ViewerState,
    ) -> Option<impl Future<Output = ViewerEvent> + use<>> {
        let pending = self.pending.take()?;
        if let Some(preset) = pending.preset() {
            log::info!("{} lights: {:?}", pending.format, preset);
            lights.apply(preset);
        }
        state.status = LoadStatus::Loading(pending.path.clone());
        let assets = self.assets.clone();
        Some(async move { ViewerEvent::Loaded(pending.run(&assets).await) })
    }

    /// Applies a finished load; `true` when the model is now on the stage.
    pub fn finish_load(
        &mut self,
        state: &mut ViewerState,
        result: Result<LoadedModel, LoadError>,
    ) -> bool {
        match result {
            Ok(model) => {
                let path = model.path.clone();
                match self.stage.attach(model) {
                    Ok(()) => {
                        self.controls.set_offset_value(0.0);
                        state.status = LoadStatus::Loaded(path);
                        true
                    }
                    Err(_) => false,
                }
            }
            Err(e) => {
                let path = e.path().to_string();
                log::error!("{:#}", anyhow::Error::from(e));
                self.controls.notify_failure(LOAD_FAILURE_MESSAGE);
                state.status = LoadStatus::Failed(path);
                false
            }
        }
    }

    /// Applies queued control input; `true` when the camera has to be reset.
    pub fn apply_controls(&mut self) -> bool {
        let mut reset_camera = false;
        for event in self.controls.drain_events() {
            match event {
                ControlEvent::VerticalOffset(offset) => {
                    self.stage.set_vertical_offset(offset);
                }
                ControlEvent::ResetCamera => {
                    self.controls.set_offset_value(0.0);
                    self.stage.reset_model_position();
                    reset_camera = true;
                }
            }
        }
        reset_camera
    }
}

impl GraphicsFlow<ViewerState, ViewerEvent> for Viewer {
    fn on_init(&mut self, ctx: &mut Context, state: &mut ViewerState) -> Out<ViewerState, ViewerEvent> {
        if let Err(e) = ctx.configure(&self.config) {
            log::error!("viewer configuration not applied: {:#}", e);
        }
        match self.start_load(&mut ctx.light.lights, state) {
            Some(load) => {
                let load: Box<dyn Future<Output = ViewerEvent>> = Box::new(load);
                Out::FutEvent(vec![load])
            }
            None => Out::Empty,
        }
    }

    fn on_update(
        &mut self,
        ctx: &Context,
        _: &mut ViewerState,
        _: Duration,
    ) -> Out<ViewerState, ViewerEvent> {
        let reset_camera = self.apply_controls();
        if let Err(e) = self
            .stage
            .write_to_buffers(&ctx.queue, &ctx.device, &ctx.materials)
        {
            log::error!("stage upload failed: {:#}", e);
        }
        if reset_camera {
            Out::Configure(Box::new(|ctx: &mut Context| ctx.reset_camera()))
        } else {
            Out::Empty
        }
    }

    fn on_window_events(
        &mut self,
        _: &Context,
        _: &mut ViewerState,
        event: &WindowEvent,
    ) -> Out<ViewerState, ViewerEvent> {
        self.controls.on_window_event(event);
        Out::Empty
    }

    fn on_custom_events(
        &mut self,
        _: &Context,
        state: &mut ViewerState,
        event: ViewerEvent,
    ) -> Option<ViewerEvent> {
        match event {
            ViewerEvent::Loaded(result) => {
                self.finish_load(state, result);
                None
            }
        }
    }

    fn on_render(&self) -> Render<'_> {
        self.stage.get_render()
    }

    #[cfg(feature = "integration-tests")]
    fn render_to_texture(
        &self,
        _: &Context,
        state: &mut ViewerState,
        _: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<crate::flow::ImageTestResult, anyhow::Error> {
        Ok(match state.status {
            LoadStatus::Loading(_) => crate::flow::ImageTestResult::Waiting,
            _ => crate::flow::ImageTestResult::Passed,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{config::LightConfig, resources::format::ModelFormat};

    #[derive(Default)]
    struct Recorded {
        offsets: Vec<f32>,
        failures: Vec<String>,
        queued: Vec<ControlEvent>,
    }

    struct RecordingPanel(Rc<RefCell<Recorded>>);

    impl ControlPanel for RecordingPanel {
        fn set_offset_value(&mut self, value: f32) {
            self.0.borrow_mut().offsets.push(value);
        }

        fn drain_events(&mut self) -> Vec<ControlEvent> {
            std::mem::take(&mut self.0.borrow_mut().queued)
        }

        fn notify_failure(&mut self, message: &str) {
            self.0.borrow_mut().failures.push(message.to_string());
        }
    }

    fn viewer(key: Option<&str>) -> (Viewer, Rc<RefCell<Recorded>>) {
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let registry = ModelRegistry::from_json(
            "model",
            r#"{ "chair": "chair.fbx", "alicia": "alicia.vrm", "mesh": "mesh.obj" }"#,
        )
        .unwrap();
        let viewer = Viewer::with_registry(
            ViewerConfig::default(),
            AssetSource::in_memory(Vec::new()),
            &registry,
            key,
            Box::new(RecordingPanel(recorded.clone())),
        );
        (viewer, recorded)
    }

    #[test]
    fn vrm_selection_switches_lights_before_loading() {
        let (mut viewer, _) = viewer(Some("alicia"));
        let mut lights = Lights::from_config(&LightConfig::default());
        let mut state = ViewerState::default();
        assert!(viewer.start_load(&mut lights, &mut state).is_some());
        assert_eq!(lights.ambient_intensity, 1.0);
        assert_eq!(lights.directional_intensity, 0.5);
        assert_eq!(state.status, LoadStatus::Loading("model/alicia.vrm".into()));
        // One load per session
        assert!(viewer.start_load(&mut lights, &mut state).is_none());
    }

    #[test]
    fn fbx_selection_keeps_default_lights() {
        let (mut viewer, _) = viewer(Some("chair"));
        let mut lights = Lights::from_config(&LightConfig::default());
        let mut state = ViewerState::default();
        assert!(viewer.start_load(&mut lights, &mut state).is_some());
        assert_eq!(lights.directional_intensity, 3.0);
        assert_eq!(lights.ambient_intensity, 1.0);
    }

    #[test]
    fn unknown_key_or_format_starts_nothing() {
        for key in [None, Some(""), Some("table"), Some("mesh")] {
            let (mut viewer, _) = viewer(key);
            let mut lights = Lights::from_config(&LightConfig::default());
            let before = lights.clone();
            let mut state = ViewerState::default();
            assert!(viewer.start_load(&mut lights, &mut state).is_none());
            assert_eq!(lights, before);
            assert_eq!(state.status, LoadStatus::NoModel);
        }
    }

    #[test]
    fn failed_load_notifies_and_attaches_nothing() {
        let (mut viewer, recorded) = viewer(Some("chair"));
        let mut state = ViewerState::default();
        let attached = viewer.finish_load(
            &mut state,
            Err(LoadError::ParseFailure {
                path: "model/chair.fbx".into(),
                source: anyhow::anyhow!("404"),
            }),
        );
        assert!(!attached);
        assert!(!viewer.stage().has_model());
        assert_eq!(recorded.borrow().failures, [LOAD_FAILURE_MESSAGE]);
        assert_eq!(state.status, LoadStatus::Failed("model/chair.fbx".into()));
    }

    #[test]
    fn controls_move_and_reset_the_model() {
        use crate::data_structures::scene_graph::ContainerNode;

        let (mut viewer, recorded) = viewer(Some("chair"));
        let mut state = ViewerState::default();
        let loaded = LoadedModel {
            node: Box::new(ContainerNode::new("chair")),
            format: ModelFormat::Fbx,
            path: "model/chair.fbx".into(),
        };
        assert!(viewer.finish_load(&mut state, Ok(loaded)));
        assert_eq!(recorded.borrow().offsets, [0.0]);

        recorded
            .borrow_mut()
            .queued
            .extend([ControlEvent::VerticalOffset(12.0), ControlEvent::VerticalOffset(7.5)]);
        assert!(!viewer.apply_controls());
        let y = |v: &Viewer| v.stage().model().unwrap().get_local_transform().position.y;
        assert_eq!(y(&viewer), 7.5);

        recorded.borrow_mut().queued.push(ControlEvent::ResetCamera);
        assert!(viewer.apply_controls());
        assert_eq!(y(&viewer), 0.0);
        assert_eq!(recorded.borrow().offsets, [0.0, 0.0]);
    }

    #[test]
    fn reset_without_model_still_resets_the_camera() {
        let (mut viewer, recorded) = viewer(None);
        recorded.borrow_mut().queued.push(ControlEvent::ResetCamera);
        assert!(viewer.apply_controls());
        assert!(!viewer.stage().has_model());
    }
}
