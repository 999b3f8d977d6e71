//! Scene graph and hierarchical scene organization.
//!
//! Provides the [`SceneNode`] trait and its implementations: [`ContainerNode`]
//! groups children, [`MeshNode`] draws a lit triangle mesh, and [`LinesNode`]
//! draws coloured lines. Loaders build trees of these nodes without touching
//! the GPU; buffers are created by the first [`SceneNode::write_to_buffers`].

use std::fmt::Debug;

use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        model::{GpuMesh, MaterialResources, Mesh},
        primitives::LineVertex,
        transform::{Transform, TransformRaw},
    },
    render::{Instanced, Lines, Render},
};

pub trait SceneNode {
    fn name(&self) -> &str;

    fn get_local_transform(&self) -> Transform;

    fn set_local_transform(&mut self, transform: Transform);

    fn local_transform_mut(&mut self) -> &mut Transform;

    /// World transform as of the last [`update_world_transforms`](Self::update_world_transforms).
    fn get_world_transform(&self) -> Transform;

    /// Recomputes this node's and all descendants' world transforms from the parent's.
    fn update_world_transforms(&mut self, parent: &Transform);

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    fn as_mesh(&self) -> Option<&MeshNode> {
        None
    }

    fn as_mesh_mut(&mut self) -> Option<&mut MeshNode> {
        None
    }

    /// Creates missing GPU resources and uploads the current world transforms.
    fn write_to_buffers(
        &mut self,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        materials: &MaterialResources,
    ) -> anyhow::Result<()>;

    fn get_render(&self) -> Render<'_>;

    fn update_world_transform_all(&mut self) {
        self.update_world_transforms(&Transform::new());
    }
}

impl Debug for dyn SceneNode + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneNode")
            .field("name", &self.name())
            .field("children", self.get_children())
            .finish()
    }
}

/// Pre-order walk over `node` and all of its descendants.
pub fn traverse(node: &dyn SceneNode, f: &mut dyn FnMut(&dyn SceneNode)) {
    f(node);
    for child in node.get_children() {
        traverse(child.as_ref(), f);
    }
}

pub fn traverse_mut(node: &mut dyn SceneNode, f: &mut dyn FnMut(&mut dyn SceneNode)) {
    f(&mut *node);
    for child in node.get_children_mut() {
        traverse_mut(child.as_mut(), f);
    }
}

/// Marks every mesh below `node` as both shadow caster and receiver.
///
/// Returns the number of meshes touched.
pub fn enable_shadows(node: &mut dyn SceneNode) -> usize {
    let mut count = 0;
    traverse_mut(node, &mut |n: &mut dyn SceneNode| {
        if let Some(mesh) = n.as_mesh_mut() {
            mesh.cast_shadow = true;
            mesh.receive_shadow = true;
            count += 1;
        }
    });
    count
}

fn update_children(children: &mut [Box<dyn SceneNode>], world: &Transform) {
    for child in children.iter_mut() {
        child.update_world_transforms(world);
    }
}

fn write_children(
    children: &mut [Box<dyn SceneNode>],
    queue: &wgpu::Queue,
    device: &wgpu::Device,
    materials: &MaterialResources,
) -> anyhow::Result<()> {
    children
        .iter_mut()
        .try_for_each(|child| child.write_to_buffers(queue, device, materials))
}

fn instance_buffer(device: &wgpu::Device, label: &str, world: &Transform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{} Instance Buffer", label)),
        contents: bytemuck::cast_slice(&[world.to_raw()]),
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
    })
}

fn write_instance(queue: &wgpu::Queue, buffer: &wgpu::Buffer, world: &Transform) {
    let raw: [TransformRaw; 1] = [world.to_raw()];
    queue.write_buffer(buffer, 0, bytemuck::cast_slice(&raw));
}

/// A group without geometry of its own.
pub struct ContainerNode {
    name: String,
    local: Transform,
    world: Transform,
    pub children: Vec<Box<dyn SceneNode>>,
}

impl ContainerNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            local: Transform::new(),
            world: Transform::new(),
            children: Vec::new(),
        }
    }
}

impl SceneNode for ContainerNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_local_transform(&self) -> Transform {
        self.local
    }

    fn set_local_transform(&mut self, transform: Transform) {
        self.local = transform;
    }

    fn local_transform_mut(&mut self) -> &mut Transform {
        &mut self.local
    }

    fn get_world_transform(&self) -> Transform {
        self.world
    }

    fn update_world_transforms(&mut self, parent: &Transform) {
        self.world = parent * &self.local;
        update_children(&mut self.children, &self.world);
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn write_to_buffers(
        &mut self,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        materials: &MaterialResources,
    ) -> anyhow::Result<()> {
        write_children(&mut self.children, queue, device, materials)
    }

    fn get_render(&self) -> Render<'_> {
        Render::Composed(self.children.iter().map(|c| c.get_render()).collect())
    }
}

struct GpuMeshNode {
    mesh: GpuMesh,
    instance_buffer: wgpu::Buffer,
    // Flag value the material uniform was last written with
    receive_shadow: bool,
}

/// A renderable triangle mesh with shadow flags.
pub struct MeshNode {
    name: String,
    local: Transform,
    world: Transform,
    children: Vec<Box<dyn SceneNode>>,
    pub mesh: Mesh,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    /// Meshes without depth write are drawn first as an underlay (the ground).
    pub depth_write: bool,
    gpu: Option<GpuMeshNode>,
}

impl MeshNode {
    pub fn new(mesh: Mesh) -> Self {
        Self {
            name: mesh.name.clone(),
            local: Transform::new(),
            world: Transform::new(),
            children: Vec::new(),
            mesh,
            cast_shadow: false,
            receive_shadow: false,
            depth_write: true,
            gpu: None,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.gpu.is_some()
    }
}

impl SceneNode for MeshNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_local_transform(&self) -> Transform {
        self.local
    }

    fn set_local_transform(&mut self, transform: Transform) {
        self.local = transform;
    }

    fn local_transform_mut(&mut self) -> &mut Transform {
        &mut self.local
    }

    fn get_world_transform(&self) -> Transform {
        self.world
    }

    fn update_world_transforms(&mut self, parent: &Transform) {
        self.world = parent * &self.local;
        update_children(&mut self.children, &self.world);
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn as_mesh(&self) -> Option<&MeshNode> {
        Some(self)
    }

    fn as_mesh_mut(&mut self) -> Option<&mut MeshNode> {
        Some(self)
    }

    fn write_to_buffers(
        &mut self,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        materials: &MaterialResources,
    ) -> anyhow::Result<()> {
        match &mut self.gpu {
            Some(gpu) => {
                write_instance(queue, &gpu.instance_buffer, &self.world);
                if gpu.receive_shadow != self.receive_shadow {
                    gpu.mesh
                        .write_material(queue, &self.mesh.material, self.receive_shadow);
                    gpu.receive_shadow = self.receive_shadow;
                }
            }
            None if self.mesh.indices.is_empty() => (),
            None => {
                let mesh =
                    GpuMesh::upload(device, queue, materials, &self.mesh, self.receive_shadow)?;
                self.gpu = Some(GpuMeshNode {
                    mesh,
                    instance_buffer: instance_buffer(device, &self.name, &self.world),
                    receive_shadow: self.receive_shadow,
                });
            }
        }
        write_children(&mut self.children, queue, device, materials)
    }

    fn get_render(&self) -> Render<'_> {
        let own = match &self.gpu {
            Some(gpu) => {
                let instanced = Instanced {
                    instance: &gpu.instance_buffer,
                    mesh: &gpu.mesh,
                    amount: 1,
                    cast_shadow: self.cast_shadow,
                };
                if self.depth_write {
                    Render::Default(instanced)
                } else {
                    Render::Underlay(instanced)
                }
            }
            None => Render::None,
        };
        if self.children.is_empty() {
            own
        } else {
            Render::Composed(
                std::iter::once(own)
                    .chain(self.children.iter().map(|c| c.get_render()))
                    .collect(),
            )
        }
    }
}

/// Unlit coloured line segments.
pub struct LinesNode {
    name: String,
    local: Transform,
    world: Transform,
    children: Vec<Box<dyn SceneNode>>,
    pub vertices: Vec<LineVertex>,
    gpu: Option<(wgpu::Buffer, wgpu::Buffer)>,
}

impl LinesNode {
    pub fn new(name: &str, vertices: Vec<LineVertex>) -> Self {
        Self {
            name: name.to_string(),
            local: Transform::new(),
            world: Transform::new(),
            children: Vec::new(),
            vertices,
            gpu: None,
        }
    }
}

impl SceneNode for LinesNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_local_transform(&self) -> Transform {
        self.local
    }

    fn set_local_transform(&mut self, transform: Transform) {
        self.local = transform;
    }

    fn local_transform_mut(&mut self) -> &mut Transform {
        &mut self.local
    }

    fn get_world_transform(&self) -> Transform {
        self.world
    }

    fn update_world_transforms(&mut self, parent: &Transform) {
        self.world = parent * &self.local;
        update_children(&mut self.children, &self.world);
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn write_to_buffers(
        &mut self,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        materials: &MaterialResources,
    ) -> anyhow::Result<()> {
        match &self.gpu {
            Some((_, instance)) => write_instance(queue, instance, &self.world),
            None if self.vertices.is_empty() => (),
            None => {
                let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Vertex Buffer", self.name)),
                    contents: bytemuck::cast_slice(&self.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let instance = instance_buffer(device, &self.name, &self.world);
                self.gpu = Some((vertex, instance));
            }
        }
        write_children(&mut self.children, queue, device, materials)
    }

    fn get_render(&self) -> Render<'_> {
        let own = match &self.gpu {
            Some((vertex, instance)) => Render::Lines(Lines {
                vertex,
                instance,
                amount: self.vertices.len() as u32,
            }),
            None => Render::None,
        };
        Render::Composed(
            std::iter::once(own)
                .chain(self.children.iter().map(|c| c.get_render()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;
    use crate::data_structures::model::{Material, ModelVertex};

    fn triangle(name: &str) -> Mesh {
        Mesh {
            name: name.to_string(),
            vertices: vec![ModelVertex::default(); 3],
            indices: vec![0, 1, 2],
            material: Material::default(),
        }
    }

    fn tree() -> Box<dyn SceneNode> {
        let mut root = ContainerNode::new("root");
        let mut group = ContainerNode::new("group");
        group.add_child(Box::new(MeshNode::new(triangle("a"))));
        group.add_child(Box::new(MeshNode::new(triangle("b"))));
        root.add_child(Box::new(group));
        root.add_child(Box::new(MeshNode::new(triangle("c"))));
        root.add_child(Box::new(LinesNode::new("lines", Vec::new())));
        Box::new(root)
    }

    #[test]
    fn traverse_visits_in_pre_order() {
        let root = tree();
        let mut names = Vec::new();
        traverse(root.as_ref(), &mut |n: &dyn SceneNode| names.push(n.name().to_string()));
        assert_eq!(names, ["root", "group", "a", "b", "c", "lines"]);
    }

    #[test]
    fn enable_shadows_flags_every_mesh_and_nothing_else() {
        let mut root = tree();
        assert_eq!(enable_shadows(root.as_mut()), 3);

        let mut flagged = 0;
        traverse(root.as_ref(), &mut |n: &dyn SceneNode| {
            if let Some(mesh) = n.as_mesh() {
                assert!(mesh.cast_shadow && mesh.receive_shadow);
                flagged += 1;
            }
        });
        assert_eq!(flagged, 3);
    }

    #[test]
    fn world_transform_follows_root() {
        let mut root = tree();
        root.local_transform_mut().set_uniform_scale(0.1);
        root.local_transform_mut().set_position(0.0, 4.0, 0.0);
        root.get_children_mut()[1]
            .local_transform_mut()
            .set_position(10.0, 0.0, 0.0);
        root.update_world_transform_all();

        let world = root.get_children()[1].get_world_transform();
        assert!((world.position - Vector3::new(1.0, 4.0, 0.0)).x.abs() < 1e-5);
        assert!((world.position.y - 4.0).abs() < 1e-5);
        assert!((world.scale.x - 0.1).abs() < 1e-6);
    }

    #[test]
    fn nodes_render_nothing_before_upload() {
        let root = tree();
        let mut batches = crate::render::Batches::default();
        root.get_render().set_pipelines(&mut batches);
        assert!(batches.is_empty());
    }
}
