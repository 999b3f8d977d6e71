//! Node transforms and their GPU representation.
//!
//! Every scene node owns a local [`Transform`]; the world transform is the
//! product of all local transforms on the path from the root. Mesh nodes
//! upload their world transform as a single [`TransformRaw`] instance.

use std::ops::Mul;

use cgmath::{One, Vector3};

use crate::data_structures::model;

/// Translation, rotation (as quaternion) and scale of a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    /// The identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.position = Vector3::new(x, y, z);
    }

    /// Replaces the scale on all three axes.
    pub fn set_uniform_scale(&mut self, factor: f32) {
        self.scale = Vector3::new(factor, factor, factor);
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_raw(&self) -> TransformRaw {
        TransformRaw {
            model: self.to_matrix().into(),
            normal: cgmath::Matrix3::from(self.rotation).into(),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// Parent-then-child composition: `parent * local` yields the child's world transform.
impl<'a, 'b> Mul<&'b Transform> for &'a Transform {
    type Output = Transform;

    fn mul(self, rhs: &'b Transform) -> Self::Output {
        let scaled_rhs_pos = Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        Transform {
            position: self.position + (self.rotation * scaled_rhs_pos),
            rotation: self.rotation * rhs.rotation,
            scale: Vector3::new(
                self.scale.x * rhs.scale.x,
                self.scale.y * rhs.scale.y,
                self.scale.z * rhs.scale.z,
            ),
        }
    }
}

impl Mul<Transform> for Transform {
    type Output = Self;

    fn mul(self, rhs: Transform) -> Self::Output {
        &self * &rhs
    }
}

/**
 * The raw transform is the per-instance data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransformRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

/**
 * Stride layout: model matrix as four vec4 columns (locations 5-8) followed by
 * the rotation-only normal matrix as three vec3 columns (locations 9-11).
 */
impl model::Vertex for TransformRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<TransformRaw>() as wgpu::BufferAddress,
            // Advance once per instance, not per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Rotation3};

    use super::*;

    fn approx(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).x.abs() < 1e-4 && (a - b).y.abs() < 1e-4 && (a - b).z.abs() < 1e-4
    }

    #[test]
    fn identity_is_neutral() {
        let mut t = Transform::new();
        t.set_position(1.0, 2.0, 3.0);
        t.set_uniform_scale(4.0);
        assert_eq!(Transform::new() * t, t);
    }

    #[test]
    fn parent_scale_applies_to_child_offset() {
        let mut parent = Transform::new();
        parent.set_uniform_scale(0.1);
        parent.set_position(0.0, 5.0, 0.0);
        let mut child = Transform::new();
        child.set_position(10.0, 0.0, 0.0);

        let world = &parent * &child;
        assert!(approx(world.position, Vector3::new(1.0, 5.0, 0.0)));
        assert!(approx(world.scale, Vector3::new(0.1, 0.1, 0.1)));
    }

    #[test]
    fn parent_rotation_turns_child_offset() {
        let mut parent = Transform::new();
        parent.rotation = cgmath::Quaternion::from_angle_y(Deg(90.0));
        let mut child = Transform::new();
        child.set_position(1.0, 0.0, 0.0);

        let world = &parent * &child;
        assert!(approx(world.position, Vector3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn raw_layout_matches_stride() {
        assert_eq!(std::mem::size_of::<TransformRaw>(), 25 * 4);
        let raw = Transform::new().to_raw();
        assert_eq!(raw.model[3], [0.0, 0.0, 0.0, 1.0]);
    }
}
