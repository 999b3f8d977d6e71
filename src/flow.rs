//! Event loop and the flow abstraction.
//!
//! A flow is one self-contained part of the application: it reacts to window
//! and custom events, keeps its state current and says each frame what to
//! draw. The viewer is a single flow, the loop drives any number of them.
//!
//! Per frame:
//! 1. window events reach the orbit controller, then every flow
//! 2. each flow hands over a [`Render`] and the results are batched per pipeline
//! 3. the shadow map is drawn, then the stage
//! 4. camera and light uniforms are written and flows get `on_update`
//!
//! Futures handed back through [`Out`] never block a frame. Natively they
//! are polled once per loop iteration inside the tokio runtime's context, in
//! the browser they run on `spawn_local`. Either way their results come back
//! as [`FlowEvent`]s.

use std::{fmt::Debug, iter, pin::Pin, sync::Arc};

#[cfg(feature = "integration-tests")]
use anyhow::Context as _;
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

use crate::{
    context::{Context, InitContext},
    data_structures::{model::DrawModel, texture::Texture},
    render::{Batches, Render},
};

/// What a lifecycle hook asks the loop to do next.
///
/// - `FutEvent`: resolve the futures and feed every result back through
///   [`GraphicsFlow::on_custom_events`]. Nothing happens unless a flow
///   consumes them.
/// - `FutFn`: resolve the futures and apply the returned mutations to the state.
/// - `Configure`: change the [`Context`], e.g. reset the camera or the lights.
/// - `Empty`: nothing to do.
pub enum Out<S, E> {
    FutEvent(Vec<Box<dyn Future<Output = E>>>),
    FutFn(Vec<Box<dyn Future<Output = Box<dyn FnOnce(&mut S)>>>>),
    Configure(Box<dyn FnOnce(&mut Context)>),
    Empty,
}

impl<S, E> Default for Out<S, E> {
    fn default() -> Self {
        Self::Empty
    }
}

#[cfg(feature = "integration-tests")]
pub enum ImageTestResult {
    Passed,
    /// Undecided, look again next frame.
    Waiting,
    Failed,
}

/// A part of the application driven by the event loop.
///
/// `on_init` runs once right after construction. Window events, custom
/// events and `on_update` follow in loop order while `on_render` is asked
/// for every frame.
pub trait GraphicsFlow<S, E> {
    /// Where the clear colour, the lights and the camera get set up.
    fn on_init(&mut self, ctx: &mut Context, state: &mut S) -> Out<S, E>;

    /// Runs after every presented frame. GPU uploads belong here.
    fn on_update(&mut self, ctx: &Context, state: &mut S, dt: Duration) -> Out<S, E>;

    fn on_window_events(&mut self, ctx: &Context, state: &mut S, event: &WindowEvent) -> Out<S, E>;

    /// Consumes `event` by returning `None`, or hands it to the next flow.
    fn on_custom_events(&mut self, ctx: &Context, state: &mut S, event: E) -> Option<E>;

    fn on_render(&self) -> Render<'_>;

    /// Inspects the offscreen frame in windowed tests.
    #[cfg(feature = "integration-tests")]
    fn render_to_texture(
        &self,
        ctx: &Context,
        state: &mut S,
        texture: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<ImageTestResult, anyhow::Error>;
}

/// Builds a flow once the GPU is up. Loading may happen asynchronously.
pub type FlowConstructor<S, E> =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = Box<dyn GraphicsFlow<S, E>>>>>>;

/// GPU context plus application state, created once the window exists.
#[derive(Debug)]
pub struct AppState<State: 'static> {
    pub(crate) ctx: Context,
    state: State,
    is_surface_configured: bool,
}

fn clear_depth(view: &wgpu::TextureView) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load: wgpu::LoadOp::Clear(1.0),
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    }
}

impl<State: Default> AppState<State> {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        Ok(Self {
            ctx: Context::new(window).await?,
            state: State::default(),
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let ctx = &mut self.ctx;
        ctx.config.width = width;
        ctx.config.height = height;
        ctx.surface.configure(&ctx.device, &ctx.config);
        ctx.projection.resize(width, height);
        ctx.depth_texture = Texture::create_depth_texture(&ctx.device, [width, height], "depth_texture");
        self.is_surface_configured = true;
    }

    fn draw_shadows(&self, encoder: &mut wgpu::CommandEncoder, batches: &Batches<'_>) {
        let light = &self.ctx.light;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(clear_depth(&light.shadow_map.view)),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.ctx.pipelines.shadow);
        for caster in batches.shadow_casters() {
            pass.set_vertex_buffer(1, caster.instance.slice(..));
            pass.draw_shadow_caster(caster.mesh, 0..caster.amount as u32, &light.shadow_bind_group);
        }
    }

    fn draw_stage(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        batches: &Batches<'_>,
        target: &wgpu::TextureView,
        depth: &wgpu::TextureView,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Stage Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(clear_depth(depth)),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let camera = &self.ctx.camera.bind_group;
        let light = &self.ctx.light.bind_group;
        let pipelines = &self.ctx.pipelines;

        // Ground and grid go down before the model
        for (pipeline, meshes) in [
            (&pipelines.underlay, &batches.underlays),
            (&pipelines.basic, &batches.opaque),
        ] {
            pass.set_pipeline(pipeline);
            for instanced in meshes.iter().filter(|i| i.amount > 0) {
                pass.set_vertex_buffer(1, instanced.instance.slice(..));
                pass.draw_mesh_instanced(instanced.mesh, 0..instanced.amount as u32, camera, light);
            }
        }

        pass.set_pipeline(&pipelines.lines);
        pass.set_bind_group(0, camera, &[]);
        for lines in &batches.lines {
            pass.set_vertex_buffer(0, lines.vertex.slice(..));
            pass.set_vertex_buffer(1, lines.instance.slice(..));
            pass.draw(0..lines.amount, 0..1);
        }
    }

    fn render<Event>(
        &mut self,
        flows: &mut [Box<dyn GraphicsFlow<State, Event>>],
        #[cfg(feature = "integration-tests")] runtime: &tokio::runtime::Runtime,
        #[cfg(feature = "integration-tests")] proxy: &EventLoopProxy<FlowEvent<State, Event>>,
    ) -> Result<(), wgpu::SurfaceError> {
        self.ctx.window.request_redraw();
        if !self.is_surface_configured {
            return Ok(());
        }
        let output = self.ctx.surface.get_current_texture()?;

        let mut batches = Batches::default();
        for flow in flows.iter() {
            flow.on_render().set_pipelines(&mut batches);
        }

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        self.draw_shadows(&mut encoder, &batches);

        #[cfg(not(feature = "integration-tests"))]
        {
            let view = output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            self.draw_stage(&mut encoder, &batches, &view, &self.ctx.depth_texture.view);
            self.ctx.queue.submit(iter::once(encoder.finish()));
        }

        #[cfg(feature = "integration-tests")]
        {
            let capture = FrameCapture::new(&self.ctx);
            let view = capture
                .color
                .create_view(&wgpu::TextureViewDescriptor::default());
            self.draw_stage(&mut encoder, &batches, &view, &capture.depth.view);
            capture.copy(&mut encoder);
            self.ctx.queue.submit(iter::once(encoder.finish()));
            self.check_frame(flows, &capture, runtime, proxy);
        }

        output.present();
        Ok(())
    }

    /// Lets every flow judge the captured frame. Stops the loop once all pass.
    #[cfg(feature = "integration-tests")]
    fn check_frame<Event>(
        &mut self,
        flows: &mut [Box<dyn GraphicsFlow<State, Event>>],
        capture: &FrameCapture,
        runtime: &tokio::runtime::Runtime,
        proxy: &EventLoopProxy<FlowEvent<State, Event>>,
    ) {
        let mut image = match runtime.block_on(capture.read(&self.ctx.device)) {
            Ok(image) => image,
            Err(e) => panic!("frame readback failed: {:#}", e),
        };
        let mut settled = true;
        for flow in flows.iter_mut() {
            match flow.render_to_texture(&self.ctx, &mut self.state, &mut image) {
                Ok(ImageTestResult::Passed) => {}
                Ok(ImageTestResult::Waiting) => settled = false,
                Ok(ImageTestResult::Failed) => panic!("frame check failed"),
                Err(e) => panic!("{:#}", e),
            }
        }
        if settled && proxy.send_event(FlowEvent::Exit).is_err() {
            panic!("frame checks passed but the event loop is gone");
        }
    }
}

/// Offscreen colour and depth targets plus a buffer to read the colour back.
#[cfg(feature = "integration-tests")]
struct FrameCapture {
    color: wgpu::Texture,
    depth: Texture,
    buffer: wgpu::Buffer,
    extent: wgpu::Extent3d,
}

#[cfg(feature = "integration-tests")]
impl FrameCapture {
    const BYTES_PER_PIXEL: u32 = 4;

    fn new(ctx: &Context) -> Self {
        // Copied rows must be a multiple of 256 bytes
        let row_pixels = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT / Self::BYTES_PER_PIXEL;
        let extent = wgpu::Extent3d {
            width: ctx.config.width.div_ceil(row_pixels) * row_pixels,
            height: ctx.config.height,
            depth_or_array_layers: 1,
        };
        let color = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Frame Capture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ctx.config.format,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth = Texture::create_depth_texture(
            &ctx.device,
            [extent.width, extent.height],
            "Frame Capture Depth",
        );
        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Capture Readback"),
            size: (Self::BYTES_PER_PIXEL * extent.width * extent.height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            color,
            depth,
            buffer,
            extent,
        }
    }

    fn copy(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(Self::BYTES_PER_PIXEL * self.extent.width),
                    rows_per_image: Some(self.extent.height),
                },
            },
            self.extent,
        );
    }

    async fn read(
        &self,
        device: &wgpu::Device,
    ) -> anyhow::Result<image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>> {
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let slice = self.buffer.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |mapped| {
            let _ = tx.send(mapped);
        });
        device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(3)),
        })?;
        rx.receive().await.context("readback was dropped")??;
        image::ImageBuffer::from_raw(self.extent.width, self.extent.height, slice.get_mapped_range())
            .context("readback buffer is smaller than the frame")
    }
}

/// The winit application. Builds the window and the GPU state on the first
/// resume and routes events to the flows from then on.
pub struct App<State: 'static, Event: 'static> {
    #[cfg(not(target_arch = "wasm32"))]
    runtime: tokio::runtime::Runtime,
    /// Flow futures still in flight.
    #[cfg(not(target_arch = "wasm32"))]
    pending: Vec<PendingEvent<State, Event>>,
    #[cfg_attr(
        all(not(target_arch = "wasm32"), not(feature = "integration-tests")),
        allow(dead_code)
    )]
    proxy: EventLoopProxy<FlowEvent<State, Event>>,
    running: Option<AppState<State>>,
    flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    /// Taken by the first `resumed`.
    constructors: Option<Vec<FlowConstructor<State, Event>>>,
    last_frame: Instant,
}

impl<State: 'static, Event: 'static> App<State, Event> {
    fn new(
        event_loop: &EventLoop<FlowEvent<State, Event>>,
        constructors: Vec<FlowConstructor<State, Event>>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            runtime: tokio::runtime::Runtime::new()?,
            #[cfg(not(target_arch = "wasm32"))]
            pending: Vec::new(),
            proxy: event_loop.create_proxy(),
            running: None,
            flows: Vec::new(),
            constructors: Some(constructors),
            last_frame: Instant::now(),
        })
    }

    /// Calls `hook` on every flow and carries out what each one asks for.
    fn for_each_flow(
        &mut self,
        mut hook: impl FnMut(&mut dyn GraphicsFlow<State, Event>, &mut AppState<State>) -> Out<State, Event>,
    ) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        for flow in self.flows.iter_mut() {
            let out = hook(flow.as_mut(), running);
            dispatch_output(
                #[cfg(not(target_arch = "wasm32"))]
                &mut self.pending,
                #[cfg(target_arch = "wasm32")]
                &self.proxy,
                &mut running.ctx,
                out,
            );
        }
    }

    fn start(&mut self, running: AppState<State>, flows: Vec<Box<dyn GraphicsFlow<State, Event>>>) {
        self.running = Some(running);
        self.flows = flows;
        self.for_each_flow(|flow, running| flow.on_init(&mut running.ctx, &mut running.state));
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn poll_pending(&mut self) -> Vec<FlowEvent<State, Event>> {
        // tokio::fs and timers need the runtime's context while being polled
        let _runtime = self.runtime.enter();
        poll_once(&mut self.pending)
    }

    fn redraw(&mut self)
    where
        State: Default,
    {
        let dt = self.last_frame.elapsed();
        self.last_frame = Instant::now();
        let Some(running) = self.running.as_mut() else {
            return;
        };

        let rendered = running.render(
            &mut self.flows,
            #[cfg(feature = "integration-tests")]
            &self.runtime,
            #[cfg(feature = "integration-tests")]
            &self.proxy,
        );
        match rendered {
            Ok(()) => {
                let ctx = &mut running.ctx;
                ctx.camera.update(&ctx.queue, &ctx.projection);
                ctx.light.write_to_buffer(&ctx.queue);
                self.for_each_flow(|flow, running| flow.on_update(&running.ctx, &mut running.state, dt));
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = running.ctx.window.inner_size();
                running.resize(size.width, size.height);
            }
            Err(e) => log::error!("frame dropped: {}", e),
        }
    }
}

pub(crate) enum FlowEvent<State: 'static, Event: 'static> {
    /// GPU setup finished in the browser.
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    Initialized {
        state: AppState<State>,
        flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    },
    Custom(Event),
    /// A resolved `Out::FutFn`.
    Mut(Box<dyn FnOnce(&mut State)>),
    #[cfg_attr(not(feature = "integration-tests"), allow(dead_code))]
    Exit,
}

impl<State, Event> Debug for FlowEvent<State, Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized { flows, .. } => f
                .debug_struct("Initialized")
                .field("flows", &flows.len())
                .finish_non_exhaustive(),
            Self::Custom(_) => f.write_str("Custom"),
            Self::Mut(_) => f.write_str("Mut"),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

fn create_window(event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
    #[allow(unused_mut)]
    let mut attributes = Window::default_attributes().with_title("model-stage");

    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen::JsCast;
        use winit::platform::web::WindowAttributesExtWebSys;

        const CANVAS_ID: &str = "canvas";

        let canvas = wgpu::web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(CANVAS_ID));
        match canvas {
            Some(canvas) => attributes = attributes.with_canvas(Some(canvas.unchecked_into())),
            None => {
                log::error!("no #{} element on the page", CANVAS_ID);
                return None;
            }
        }
    }

    match event_loop.create_window(attributes) {
        Ok(window) => Some(Arc::new(window)),
        Err(e) => {
            log::error!("cannot create the window: {}", e);
            None
        }
    }
}

impl<State: 'static + Default, Event: 'static> ApplicationHandler<FlowEvent<State, Event>>
    for App<State, Event>
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // Later resumes (tab visibility, mobile) find everything in place
        let Some(constructors) = self.constructors.take() else {
            return;
        };
        let Some(window) = create_window(event_loop) else {
            event_loop.exit();
            return;
        };

        let setup = async move {
            let running = AppState::new(window).await?;
            // InitContext holds clones of the device and queue handles
            let flows = futures::future::join_all(
                constructors
                    .into_iter()
                    .map(|construct| construct((&running.ctx).into())),
            )
            .await;
            anyhow::Ok((running, flows))
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.runtime.block_on(setup) {
                Ok((running, flows)) => self.start(running, flows),
                Err(e) => {
                    log::error!("cannot set up the GPU context: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match setup.await {
                    Ok((state, flows)) => {
                        if proxy.send_event(FlowEvent::Initialized { state, flows }).is_err() {
                            log::error!("event loop closed during setup");
                        }
                    }
                    Err(e) => log::error!("cannot set up the GPU context: {:#}", e),
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent<State, Event>) {
        match event {
            FlowEvent::Initialized { mut state, flows } => {
                // The canvas may have settled its size before setup finished
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height);
                state.ctx.window.request_redraw();
                self.start(state, flows);
            }
            FlowEvent::Custom(event) => {
                let Some(running) = self.running.as_mut() else {
                    return;
                };
                let unconsumed = self.flows.iter_mut().try_fold(event, |event, flow| {
                    flow.on_custom_events(&running.ctx, &mut running.state, event)
                });
                if unconsumed.is_some() {
                    log::warn!("custom event reached no flow that consumes it");
                }
            }
            FlowEvent::Mut(mutation) => {
                if let Some(running) = self.running.as_mut() {
                    mutation(&mut running.state);
                }
            }
            FlowEvent::Exit => event_loop.exit(),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.pending.is_empty() {
            return;
        }
        for event in self.poll_pending() {
            self.user_event(event_loop, event);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        running.ctx.camera.controller.handle_window_events(&event);
        self.for_each_flow(|flow, running| {
            flow.on_window_events(&running.ctx, &mut running.state, &event)
        });

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(running) = self.running.as_mut() {
                    running.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

type PendingEvent<State, Event> = Pin<Box<dyn Future<Output = FlowEvent<State, Event>>>>;

/// Polls every future once and takes the finished ones out, in order.
///
/// Nothing is woken: the loop redraws continuously and polls again on the
/// next iteration.
#[cfg(not(target_arch = "wasm32"))]
fn poll_once<State, Event>(pending: &mut Vec<PendingEvent<State, Event>>) -> Vec<FlowEvent<State, Event>> {
    use std::task::{Context as TaskContext, Poll};

    let mut cx = TaskContext::from_waker(futures::task::noop_waker_ref());
    let mut finished = Vec::new();
    pending.retain_mut(|future| match future.as_mut().poll(&mut cx) {
        Poll::Ready(event) => {
            finished.push(event);
            false
        }
        Poll::Pending => true,
    });
    finished
}

fn dispatch_output<State: 'static, Event: 'static>(
    #[cfg(not(target_arch = "wasm32"))] pending: &mut Vec<PendingEvent<State, Event>>,
    #[cfg(target_arch = "wasm32")] proxy: &EventLoopProxy<FlowEvent<State, Event>>,
    ctx: &mut Context,
    out: Out<State, Event>,
) {
    let futures: Vec<PendingEvent<State, Event>> = match out {
        Out::FutEvent(futures) => futures
            .into_iter()
            .map(|future| {
                Box::pin(async move { FlowEvent::Custom(Pin::from(future).await) })
                    as PendingEvent<State, Event>
            })
            .collect(),
        Out::FutFn(futures) => futures
            .into_iter()
            .map(|future| {
                Box::pin(async move { FlowEvent::Mut(Pin::from(future).await) })
                    as PendingEvent<State, Event>
            })
            .collect(),
        Out::Configure(configure) => {
            configure(ctx);
            return;
        }
        Out::Empty => return,
    };

    #[cfg(not(target_arch = "wasm32"))]
    {
        pending.extend(futures);
    }

    #[cfg(target_arch = "wasm32")]
    {
        for future in futures {
            let proxy = proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                if proxy.send_event(future.await).is_err() {
                    log::error!("event loop closed before a flow future finished");
                }
            });
        }
    }
}

fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            eprintln!("logger already set up: {}", e);
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            wgpu::web_sys::console::warn_1(&format!("logger already set up: {}", e).into());
        }
    }
}

fn build_event_loop<State: 'static, Event: 'static>()
-> anyhow::Result<EventLoop<FlowEvent<State, Event>>> {
    #[allow(unused_mut)]
    let mut builder = EventLoop::with_user_event();

    // Windowed tests run off the main thread
    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    {
        use winit::platform::wayland::EventLoopBuilderExtWayland;
        builder.with_any_thread(true);
    }
    #[cfg(all(feature = "integration-tests", target_os = "windows"))]
    {
        use winit::platform::windows::EventLoopBuilderExtWindows;
        builder.with_any_thread(true);
    }

    Ok(builder.build()?)
}

/// Opens the window and drives the flows built by `constructors` until it closes.
pub fn run<State: 'static + Default, Event: 'static>(
    constructors: Vec<FlowConstructor<State, Event>>,
) -> anyhow::Result<()> {
    init_logging();
    let event_loop = build_event_loop::<State, Event>()?;
    let mut app = App::new(&event_loop, constructors)?;
    event_loop.run_app(&mut app)?;
    Ok(())
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use std::task::Poll;

    use super::*;

    async fn yield_once() {
        let mut yielded = false;
        futures::future::poll_fn(move |_| {
            if yielded {
                Poll::Ready(())
            } else {
                yielded = true;
                Poll::Pending
            }
        })
        .await
    }

    fn custom(event: &FlowEvent<(), u32>) -> Option<u32> {
        match event {
            FlowEvent::Custom(value) => Some(*value),
            _ => None,
        }
    }

    #[test]
    fn slow_futures_do_not_hold_back_ready_ones() {
        let mut pending: Vec<PendingEvent<(), u32>> = Vec::new();
        pending.push(Box::pin(async {
            yield_once().await;
            yield_once().await;
            FlowEvent::Custom(1)
        }));
        pending.push(Box::pin(async { FlowEvent::Custom(2) }));

        let first: Vec<_> = poll_once(&mut pending).iter().map(custom).collect();
        assert_eq!(first, [Some(2)]);
        assert_eq!(pending.len(), 1);

        assert!(poll_once(&mut pending).is_empty());
        let last: Vec<_> = poll_once(&mut pending).iter().map(custom).collect();
        assert_eq!(last, [Some(1)]);
        assert!(pending.is_empty());
    }

    #[test]
    fn mutations_come_back_as_events() {
        let mut pending: Vec<PendingEvent<u32, ()>> = Vec::new();
        let add: Box<dyn FnOnce(&mut u32)> = Box::new(|state| *state += 5);
        pending.push(Box::pin(async move { FlowEvent::<u32, ()>::Mut(add) }));
        let mut state = 1;
        for event in poll_once(&mut pending) {
            match event {
                FlowEvent::Mut(mutation) => mutation(&mut state),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(state, 6);
    }
}
