//! GPU and window context.
//!
//! [`Context`] owns the surface, device and queue together with everything the
//! stage renders with: camera, lights, pipelines and shared material resources.
//! [`InitContext`] is the cheap handle flow constructors receive.

use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

use crate::{
    camera::{CameraResources, Projection},
    config::{ViewerConfig, clear_colour, srgb_hex_to_linear},
    data_structures::{model::MaterialResources, texture},
    pipelines::{Pipelines, light::LightResources},
};

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub pipelines: Pipelines,
    pub materials: MaterialResources,
    pub clear_colour: wgpu::Color,
}

impl Context {
    /// Sets up the GPU with [`ViewerConfig::default`]; flows apply their own
    /// configuration later through [`configure`](Self::configure).
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let viewer = ViewerConfig::default();

        // Vulkan, Metal or DX12 natively, WebGL2 in the browser
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("creating the window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;
        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // The web build is bound by WebGL2
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
            })
            .await
            .context("requesting the GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders write linear colour and rely on an sRGB surface for the encoding
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let camera_config = &viewer.camera;
        let projection = Projection::new(
            config.width,
            config.height,
            cgmath::Deg(camera_config.fov_y_degrees),
            camera_config.near,
            camera_config.far,
        );
        let mut camera = CameraResources::new(&device, camera_config, &projection);
        camera.uniform.set_fog(
            srgb_hex_to_linear(viewer.background),
            viewer.fog_near,
            viewer.fog_far,
        );

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );

        let light = LightResources::new(&device, &viewer.light)?;
        let materials = MaterialResources::new(&device, &queue);
        let pipelines = Pipelines::new(
            &device,
            &config,
            &materials.layout,
            &camera.bind_group_layout,
            &light,
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            pipelines,
            materials,
            window,
            depth_texture,
            clear_colour: clear_colour(viewer.background),
        })
    }

    /// Applies camera, light, fog and background settings.
    ///
    /// The camera jumps to the configured start position; the new start also
    /// becomes the position [`reset_camera`](Self::reset_camera) returns to.
    pub fn configure(&mut self, viewer: &ViewerConfig) -> anyhow::Result<()> {
        let camera_config = &viewer.camera;
        self.projection = Projection::new(
            self.config.width,
            self.config.height,
            cgmath::Deg(camera_config.fov_y_degrees),
            camera_config.near,
            camera_config.far,
        );
        self.camera.configure(camera_config);
        self.camera.uniform.set_fog(
            srgb_hex_to_linear(viewer.background),
            viewer.fog_near,
            viewer.fog_far,
        );
        self.light.configure(&self.device, &viewer.light)?;
        self.clear_colour = clear_colour(viewer.background);
        Ok(())
    }

    /// Puts the orbit camera back to its start position and target.
    pub fn reset_camera(&mut self) {
        self.camera.reset();
    }
}

/// What a flow constructor gets to see of the [`Context`].
///
/// Device and queue are internally reference counted, so cloning them only clones the handle.
#[derive(Clone, Debug)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub materials: MaterialResources,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            materials: ctx.materials.clone(),
        }
    }
}
