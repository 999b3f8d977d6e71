//! Built-in stage geometry: the ground plane and the grid drawn on top of it.

use crate::{
    config::{GroundConfig, srgb_hex_to_linear},
    data_structures::model::{Material, Mesh, ModelVertex, Vertex},
};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    /// Linear RGB.
    pub color: [f32; 3],
}

impl Vertex for LineVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// A square in the XZ plane centred on the origin, facing +Y.
pub fn ground_plane(size: f32, color: u32) -> Mesh {
    let h = size / 2.0;
    let normal = [0.0, 1.0, 0.0];
    let corner = |x: f32, z: f32, u: f32, v: f32| ModelVertex {
        position: [x, 0.0, z],
        tex_coords: [u, v],
        normal,
    };
    let [r, g, b] = srgb_hex_to_linear(color);
    Mesh {
        name: "ground".to_string(),
        vertices: vec![
            corner(-h, -h, 0.0, 0.0),
            corner(h, -h, 1.0, 0.0),
            corner(h, h, 1.0, 1.0),
            corner(-h, h, 0.0, 1.0),
        ],
        indices: vec![0, 2, 1, 0, 3, 2],
        material: Material::new("ground", [r, g, b, 1.0]),
    }
}

/// Line list for a square grid of `divisions` cells per side.
///
/// The two lines through the origin use `center_color`, all others `color`.
pub fn grid_lines(size: f32, divisions: u32, center_color: u32, color: u32) -> Vec<LineVertex> {
    let divisions = divisions.max(1);
    let center = divisions / 2;
    let step = size / divisions as f32;
    let half = size / 2.0;
    let center_color = srgb_hex_to_linear(center_color);
    let color = srgb_hex_to_linear(color);

    let mut vertices = Vec::with_capacity((divisions as usize + 1) * 4);
    for i in 0..=divisions {
        let k = -half + i as f32 * step;
        let color = if i == center { center_color } else { color };
        vertices.push(LineVertex { position: [-half, 0.0, k], color });
        vertices.push(LineVertex { position: [half, 0.0, k], color });
        vertices.push(LineVertex { position: [k, 0.0, -half], color });
        vertices.push(LineVertex { position: [k, 0.0, half], color });
    }
    vertices
}

pub fn stage_grid(ground: &GroundConfig) -> Vec<LineVertex> {
    grid_lines(
        ground.size,
        ground.grid_divisions,
        ground.grid_center_color,
        ground.grid_color,
    )
}
