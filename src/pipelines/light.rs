//! The stage lights: one shadow-casting directional light plus ambient fill.
//!
//! [`Lights`] is the CPU-side description, [`LightResources`] owns the uniform
//! buffer, the shadow map and the two bind groups (main pass and shadow pass).

use cgmath::{InnerSpace, Matrix4, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    config::{LightConfig, srgb_hex_to_linear},
    data_structures::texture::Texture,
};

/// How far from the stage centre the shadow camera sits along the light direction.
const SHADOW_DISTANCE: f32 = 300.0;

/// Intensities a model format asks for when it is selected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightPreset {
    pub ambient_intensity: f32,
    pub directional_intensity: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lights {
    /// Linear RGB.
    pub directional_color: [f32; 3],
    pub directional_intensity: f32,
    /// Unit vector pointing from the stage towards the light.
    pub direction: Vector3<f32>,
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub shadow_extent: f32,
    pub shadow_map_size: u32,
}

impl Lights {
    pub fn from_config(config: &LightConfig) -> Self {
        let position = Vector3::from(config.directional_position);
        let direction = if position.magnitude2() > 0.0 {
            position.normalize()
        } else {
            Vector3::unit_y()
        };
        Self {
            directional_color: srgb_hex_to_linear(config.directional_color),
            directional_intensity: config.directional_intensity,
            direction,
            ambient_color: srgb_hex_to_linear(config.ambient_color),
            ambient_intensity: config.ambient_intensity,
            shadow_extent: config.shadow_extent,
            shadow_map_size: config.shadow_map_size,
        }
    }

    pub fn apply(&mut self, preset: LightPreset) {
        self.ambient_intensity = preset.ambient_intensity;
        self.directional_intensity = preset.directional_intensity;
    }

    /// Orthographic view-projection of the shadow camera, looking at the origin.
    pub fn view_proj(&self) -> Matrix4<f32> {
        let eye = Point3::new(0.0, 0.0, 0.0) + self.direction * SHADOW_DISTANCE;
        let up = if self.direction.cross(Vector3::unit_y()).magnitude2() < 1e-6 {
            Vector3::unit_z()
        } else {
            Vector3::unit_y()
        };
        let view = Matrix4::look_at_rh(eye, Point3::new(0.0, 0.0, 0.0), up);
        let e = self.shadow_extent;
        let proj = cgmath::ortho(-e, e, -e, e, 1.0, SHADOW_DISTANCE * 2.0);
        OPENGL_TO_WGPU_MATRIX * proj * view
    }

    pub fn to_uniform(&self) -> LightUniform {
        let d = self.direction;
        let c = self.directional_color;
        let a = self.ambient_color;
        LightUniform {
            view_proj: self.view_proj().into(),
            direction: [d.x, d.y, d.z, self.directional_intensity],
            color: [c[0], c[1], c[2], self.ambient_intensity],
            ambient_color: [a[0], a[1], a[2], self.shadow_map_size as f32],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    view_proj: [[f32; 4]; 4],
    // w = directional intensity
    direction: [f32; 4],
    // w = ambient intensity
    color: [f32; 4],
    // w = shadow map size in texels
    ambient_color: [f32; 4],
}

#[derive(Debug)]
pub struct LightResources {
    pub lights: Lights,
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub shadow_map: Texture,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    /// Uniform only; the shadow map cannot be bound while it is rendered to.
    pub shadow_bind_group: wgpu::BindGroup,
    pub shadow_bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(device: &wgpu::Device, config: &LightConfig) -> anyhow::Result<Self> {
        let lights = Lights::from_config(config);
        let uniform = lights.to_uniform();
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let shadow_map = Texture::create_shadow_map(device, config.shadow_map_size);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer, &shadow_map)?;

        let shadow_bind_group_layout = mk_shadow_bind_group_layout(device);
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shadow_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("shadow_bind_group"),
        });

        Ok(Self {
            lights,
            uniform,
            buffer,
            shadow_map,
            bind_group,
            bind_group_layout,
            shadow_bind_group,
            shadow_bind_group_layout,
        })
    }

    /// Replaces the light description; the shadow map is only rebuilt when its size changes.
    pub fn configure(&mut self, device: &wgpu::Device, config: &LightConfig) -> anyhow::Result<()> {
        if config.shadow_map_size != self.lights.shadow_map_size {
            let shadow_map = Texture::create_shadow_map(device, config.shadow_map_size);
            self.bind_group =
                mk_bind_group(device, &self.bind_group_layout, &self.buffer, &shadow_map)?;
            self.shadow_map = shadow_map;
        }
        self.lights = Lights::from_config(config);
        Ok(())
    }

    pub fn write_to_buffer(&mut self, queue: &wgpu::Queue) {
        self.uniform = self.lights.to_uniform();
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("light_bind_group_layout"),
    })
}

fn mk_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    shadow_map: &Texture,
) -> anyhow::Result<wgpu::BindGroup> {
    let sampler = shadow_map
        .sampler
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("shadow map has no sampler"))?;
    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&shadow_map.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("light_bind_group"),
    }))
}

pub fn mk_shadow_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("shadow_bind_group_layout"),
    })
}

#[cfg(test)]
mod tests {
    use cgmath::{Transform, Vector4};

    use super::*;

    #[test]
    fn uniform_is_112_bytes() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 112);
    }

    #[test]
    fn defaults_come_from_config() {
        let lights = Lights::from_config(&LightConfig::default());
        assert_eq!(lights.directional_intensity, 3.0);
        assert_eq!(lights.ambient_intensity, 1.0);
        let expected = Vector3::new(-1.0, 2.0, 1.0).normalize();
        assert!((lights.direction - expected).magnitude() < 1e-6);
    }

    #[test]
    fn preset_replaces_only_intensities() {
        let mut lights = Lights::from_config(&LightConfig::default());
        let before = lights.clone();
        lights.apply(LightPreset {
            ambient_intensity: 1.0,
            directional_intensity: 0.5,
        });
        assert_eq!(lights.directional_intensity, 0.5);
        assert_eq!(lights.ambient_intensity, 1.0);
        assert_eq!(lights.direction, before.direction);
        assert_eq!(lights.directional_color, before.directional_color);
    }

    #[test]
    fn stage_centre_lands_mid_shadow_map() {
        let lights = Lights::from_config(&LightConfig::default());
        let clip = lights.view_proj() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
        assert!(clip.z > 0.0 && clip.z < 1.0);

        // A point towards the light is closer to the shadow camera
        let near = lights
            .view_proj()
            .transform_point(Point3::new(0.0, 0.0, 0.0) + lights.direction * 10.0);
        assert!(near.z < clip.z);
    }

    #[test]
    fn straight_down_light_still_has_a_view() {
        let mut lights = Lights::from_config(&LightConfig::default());
        lights.direction = Vector3::unit_y();
        let m = lights.view_proj();
        let p = m * Vector4::new(10.0, 0.0, 0.0, 1.0);
        assert!(p.x.is_finite() && p.y.is_finite());
    }
}
