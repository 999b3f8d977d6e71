use crate::{
    data_structures::{model::Vertex, primitives::LineVertex, texture::Texture, transform::TransformRaw},
    pipelines::basic::{PipelineOptions, mk_render_pipeline},
};

/// Unlit line list pipeline for the grid. Fogged like everything else.
pub fn mk_lines_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Lines Pipeline Layout"),
        bind_group_layouts: &[camera_bind_group_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Lines Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("lines.wgsl").into()),
    };
    mk_render_pipeline(
        device,
        &layout,
        Some(config.format),
        Some(wgpu::BlendState::ALPHA_BLENDING),
        Some(Texture::DEPTH_FORMAT),
        &[LineVertex::desc(), TransformRaw::desc()],
        shader,
        PipelineOptions {
            topology: wgpu::PrimitiveTopology::LineList,
            ..Default::default()
        },
    )
}
