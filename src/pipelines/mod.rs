//! Render pipelines of the stage.
//!
//! - `basic`: lit meshes (opaque and the depth-write-free ground underlay)
//! - `shadow`: depth-only pass from the directional light
//! - `lines`: unlit grid lines
//! - `light`: light uniforms, presets and the shadow map

pub mod basic;
pub mod light;
pub mod lines;
pub mod shadow;

#[derive(Debug)]
pub struct Pipelines {
    pub basic: wgpu::RenderPipeline,
    pub underlay: wgpu::RenderPipeline,
    pub shadow: wgpu::RenderPipeline,
    pub lines: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        material_bind_group_layout: &wgpu::BindGroupLayout,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        light: &light::LightResources,
    ) -> Self {
        let lit = |depth_write| {
            basic::mk_basic_pipeline(
                device,
                config,
                material_bind_group_layout,
                camera_bind_group_layout,
                &light.bind_group_layout,
                depth_write,
            )
        };
        Self {
            basic: lit(true),
            underlay: lit(false),
            shadow: shadow::mk_shadow_pipeline(device, &light.shadow_bind_group_layout),
            lines: lines::mk_lines_pipeline(device, config, camera_bind_group_layout),
        }
    }
}
