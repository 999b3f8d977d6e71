//! Camera, projection and the orbit controller.
//!
//! The camera always looks at a target point. [`OrbitController`] rotates it
//! around that target (left drag), pans camera and target together (right
//! drag) and dollies towards the target (mouse wheel). Input is accumulated
//! between frames and applied with exponential damping in
//! [`OrbitController::update`].

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use wgpu::util::DeviceExt;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::config::CameraConfig;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

// Keeps the camera from flipping over the poles
const MIN_POLAR: f32 = 1e-4;
const MAX_POLAR: f32 = PI - 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }
}

#[derive(Debug, Clone)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
    height: u32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
            height: height.max(1),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
        self.height = height.max(1);
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
    /// Linear fog colour; alpha unused.
    fog_color: [f32; 4],
    /// x = start distance, y = end distance.
    fog_range: [f32; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
            fog_color: [0.0; 4],
            fog_range: [f32::MAX, f32::MAX, 0.0, 0.0],
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }

    pub fn set_fog(&mut self, color: [f32; 3], near: f32, far: f32) {
        self.fog_color = [color[0], color[1], color[2], 1.0];
        self.fog_range = [near, far, 0.0, 0.0];
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    None,
    Rotate,
    Pan,
}

/// Orbit controls around `camera.target` with damping.
#[derive(Debug, Clone)]
pub struct OrbitController {
    damping_factor: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    min_distance: f32,
    max_distance: f32,
    // Raw input since the last update, in pixels / wheel steps
    rotate_px: (f32, f32),
    pan_px: (f32, f32),
    zoom_steps: f32,
    // Damped motion still to be applied
    delta_theta: f32,
    delta_phi: f32,
    pan_offset: Vector3<f32>,
    drag: Drag,
    cursor: Option<(f64, f64)>,
    home: Camera,
}

impl OrbitController {
    pub fn new(home: Camera, damping_factor: f32) -> Self {
        Self {
            damping_factor: damping_factor.clamp(0.0, 1.0),
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            rotate_px: (0.0, 0.0),
            pan_px: (0.0, 0.0),
            zoom_steps: 0.0,
            delta_theta: 0.0,
            delta_phi: 0.0,
            pan_offset: Vector3::new(0.0, 0.0, 0.0),
            drag: Drag::None,
            cursor: None,
            home,
        }
    }

    pub fn from_config(config: &CameraConfig) -> (Camera, Self) {
        let camera = Camera::new(config.position, config.target);
        (camera, Self::new(camera, config.damping_factor))
    }

    /// The camera the controller returns to on [`reset`](Self::reset).
    pub fn home(&self) -> Camera {
        self.home
    }

    /// Puts the camera back where it started and drops all pending motion.
    pub fn reset(&mut self, camera: &mut Camera) {
        *camera = self.home;
        self.rotate_px = (0.0, 0.0);
        self.pan_px = (0.0, 0.0);
        self.zoom_steps = 0.0;
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.pan_offset = Vector3::new(0.0, 0.0, 0.0);
    }

    pub fn rotate_by(&mut self, dx: f32, dy: f32) {
        self.rotate_px.0 += dx;
        self.rotate_px.1 += dy;
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan_px.0 += dx;
        self.pan_px.1 += dy;
    }

    /// Positive steps move the camera towards the target.
    pub fn zoom_by(&mut self, steps: f32) {
        self.zoom_steps += steps;
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (button, state) {
                    (MouseButton::Left, ElementState::Pressed) => Drag::Rotate,
                    (MouseButton::Right, ElementState::Pressed) => Drag::Pan,
                    (_, ElementState::Released) => Drag::None,
                    _ => self.drag,
                };
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let now = (position.x, position.y);
                if let Some(last) = self.cursor {
                    let (dx, dy) = ((now.0 - last.0) as f32, (now.1 - last.1) as f32);
                    match self.drag {
                        Drag::Rotate => self.rotate_by(dx, dy),
                        Drag::Pan => self.pan_by(dx, dy),
                        Drag::None => (),
                    }
                }
                self.cursor = Some(now);
                self.drag != Drag::None
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                if y != 0.0 {
                    self.zoom_by(y.signum());
                }
                true
            }
            _ => false,
        }
    }

    pub fn update(&mut self, camera: &mut Camera, projection: &Projection) {
        let height = projection.height() as f32;
        let damping = if self.damping_factor > 0.0 {
            self.damping_factor
        } else {
            1.0
        };

        // Pixel input to angles and world units
        let (rx, ry) = std::mem::take(&mut self.rotate_px);
        self.delta_theta -= 2.0 * PI * rx / height * self.rotate_speed;
        self.delta_phi -= 2.0 * PI * ry / height * self.rotate_speed;

        let offset = camera.position - camera.target;
        let (px, py) = std::mem::take(&mut self.pan_px);
        if px != 0.0 || py != 0.0 {
            let forward = (-offset).normalize();
            let right = forward.cross(camera.up).normalize();
            let up = right.cross(forward);
            let target_distance = offset.magnitude() * (projection.fovy().0 / 2.0).tan();
            self.pan_offset += right * (-2.0 * px * target_distance / height)
                + up * (2.0 * py * target_distance / height);
        }

        let steps = std::mem::take(&mut self.zoom_steps);
        let scale = 0.95f32.powf(self.zoom_speed * steps);

        // Orbit in spherical coordinates around the target
        let radius = offset.magnitude();
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };
        theta += self.delta_theta * damping;
        phi = (phi + self.delta_phi * damping).clamp(MIN_POLAR, MAX_POLAR);
        let radius = (radius * scale).clamp(self.min_distance, self.max_distance);

        camera.target += self.pan_offset * damping;
        let sin_phi = phi.sin();
        camera.position = camera.target
            + Vector3::new(
                radius * sin_phi * theta.sin(),
                radius * phi.cos(),
                radius * sin_phi * theta.cos(),
            );

        self.delta_theta *= 1.0 - damping;
        self.delta_phi *= 1.0 - damping;
        self.pan_offset *= 1.0 - damping;
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, config: &CameraConfig, projection: &Projection) -> Self {
        let (camera, controller) = OrbitController::from_config(config);

        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            camera,
            controller,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Runs the controller and uploads the resulting view.
    pub fn update(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.controller.update(&mut self.camera, projection);
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }

    pub fn reset(&mut self) {
        self.controller.reset(&mut self.camera);
    }

    /// Replaces camera and controller with fresh ones built from `config`.
    pub fn configure(&mut self, config: &CameraConfig) {
        let (camera, controller) = OrbitController::from_config(config);
        self.camera = camera;
        self.controller = controller;
    }
}
