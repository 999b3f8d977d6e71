//! Mesh and material data, on the CPU and on the GPU.
//!
//! Loaders only ever produce the CPU side ([`Mesh`], [`Material`]); the GPU
//! side ([`GpuMesh`]) is created lazily the first time a node is written to
//! the buffers, so parsing never needs a device.

use std::{ops::Range, sync::Arc};

use wgpu::util::DeviceExt;

use crate::data_structures::texture::Texture;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
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
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Surface description of a mesh. Colours are linear RGBA.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    /// Decoded base colour image, shared between meshes that use the same texture.
    pub diffuse: Option<Arc<image::RgbaImage>>,
}

impl Material {
    pub fn new(name: &str, base_color: [f32; 4]) -> Self {
        Self {
            name: name.to_string(),
            base_color,
            diffuse: None,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default", [1.0, 1.0, 1.0, 1.0])
    }
}

/// Triangle list geometry plus the material it is drawn with.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Material,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Smooth vertex normals from the area weighted face normals.
    pub fn compute_normals(&mut self) {
        use cgmath::{InnerSpace, Vector3};

        let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (Some(va), Some(vb), Some(vc)) =
                (self.vertices.get(a), self.vertices.get(b), self.vertices.get(c))
            else {
                continue;
            };
            let pa = Vector3::from(va.position);
            let face = (Vector3::from(vb.position) - pa).cross(Vector3::from(vc.position) - pa);
            sums[a] += face;
            sums[b] += face;
            sums[c] += face;
        }
        for (vertex, sum) in self.vertices.iter_mut().zip(sums) {
            vertex.normal = if sum.magnitude2() > 0.0 {
                sum.normalize().into()
            } else {
                [0.0, 1.0, 0.0]
            };
        }
    }
}

/// The uniform block that sits next to a mesh's diffuse texture.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    base_color: [f32; 4],
    receive_shadow: u32,
    _padding: [u32; 3],
}

impl MaterialUniform {
    pub fn new(material: &Material, receive_shadow: bool) -> Self {
        Self {
            base_color: material.base_color,
            receive_shadow: receive_shadow as u32,
            _padding: [0; 3],
        }
    }
}

/// Bind group layout and fallback texture shared by all mesh uploads.
#[derive(Clone, Debug)]
pub struct MaterialResources {
    pub layout: wgpu::BindGroupLayout,
    /// Bound when a material has no diffuse image (1x1 white).
    pub fallback: Texture,
}

impl MaterialResources {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            layout: material_layout(device),
            fallback: Texture::create_solid(1, 1, [255; 4], device, queue),
        }
    }
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
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
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("Material bind group layout"),
    })
}

/// GPU buffers of a [`Mesh`]. Dropping it frees the buffers.
#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    // Kept alive for the bind group
    #[allow(dead_code)]
    diffuse: Option<Texture>,
}

impl GpuMesh {
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        shared: &MaterialResources,
        mesh: &Mesh,
        receive_shadow: bool,
    ) -> anyhow::Result<Self> {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Material Buffer", mesh.material.name)),
            contents: bytemuck::cast_slice(&[MaterialUniform::new(&mesh.material, receive_shadow)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let diffuse = match &mesh.material.diffuse {
            Some(img) => Some(Texture::from_rgba(
                device,
                queue,
                img,
                Some(&mesh.material.name),
                false,
            )?),
            None => None,
        };
        let texture = diffuse.as_ref().unwrap_or(&shared.fallback);
        let sampler = texture
            .sampler
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("texture for {} has no sampler", mesh.material.name))?;

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shared.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: material_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some(&mesh.material.name),
        });

        Ok(Self {
            vertex_buffer,
            index_buffer,
            num_elements: mesh.indices.len() as u32,
            material_buffer,
            bind_group,
            diffuse,
        })
    }

    pub fn write_material(&self, queue: &wgpu::Queue, material: &Material, receive_shadow: bool) {
        queue.write_buffer(
            &self.material_buffer,
            0,
            bytemuck::cast_slice(&[MaterialUniform::new(material, receive_shadow)]),
        );
    }
}

pub trait DrawModel<'a> {
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'a GpuMesh,
        instances: Range<u32>,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
    );

    /// Depth-only draw into the shadow map; the light's shadow-pass bind group sits at slot 0.
    fn draw_shadow_caster(
        &mut self,
        mesh: &'a GpuMesh,
        instances: Range<u32>,
        shadow_bind_group: &'a wgpu::BindGroup,
    );
}

impl<'a, 'b> DrawModel<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'b GpuMesh,
        instances: Range<u32>,
        camera_bind_group: &'b wgpu::BindGroup,
        light_bind_group: &'b wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &mesh.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, light_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, instances);
    }

    fn draw_shadow_caster(
        &mut self,
        mesh: &'b GpuMesh,
        instances: Range<u32>,
        shadow_bind_group: &'b wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, shadow_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, instances);
    }
}
