//! Render composition and pipeline batching.
//!
//! This module defines the [`Render`] enum, which is used by scene nodes to specify
//! how they should be rendered. The engine uses `Render` to sort objects into batches
//! for the different passes and pipelines (shadow depth, ground underlay, lit meshes
//! and grid lines).
//!
//! # Key types
//!
//! - [`Render<'a>`] is the primary enum describing render operations
//! - [`Instanced<'a>`] contains data for instanced rendering (mesh + instance buffer)
//! - [`Lines<'a>`] contains a line list vertex buffer
//! - [`Batches<'a>`] is the flattened, per-pipeline view of a frame

use crate::data_structures::model::GpuMesh;

/// Data for instanced mesh rendering: the uploaded mesh plus its instance buffer.
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub mesh: &'a GpuMesh,
    pub amount: usize,
    pub cast_shadow: bool,
}

/// Coloured line list (grid helpers).
pub struct Lines<'a> {
    pub vertex: &'a wgpu::Buffer,
    pub instance: &'a wgpu::Buffer,
    pub amount: u32,
}

/// Specifies how a scene object should be rendered.
///
/// # Variants
///
/// - `None` renders nothing (e.g. a mesh that was not uploaded yet)
/// - `Default(Instanced)` renders a single lit mesh
/// - `Defaults(Vec<Instanced>)` renders a batch of lit meshes
/// - `Underlay(Instanced)` renders a lit mesh before everything else without writing depth
/// - `Lines(Lines)` renders unlit coloured lines
/// - `Composed(Vec<Render>)` recursively renders composition of multiple renders
pub enum Render<'a> {
    None,
    Default(Instanced<'a>),
    Defaults(Vec<Instanced<'a>>),
    Underlay(Instanced<'a>),
    Lines(Lines<'a>),
    Composed(Vec<Render<'a>>),
}

/// A frame's renders sorted by pipeline.
#[derive(Default)]
pub struct Batches<'a> {
    pub underlays: Vec<Instanced<'a>>,
    pub opaque: Vec<Instanced<'a>>,
    pub lines: Vec<Lines<'a>>,
}

impl<'a> Batches<'a> {
    /// Everything that has to be drawn into the shadow map.
    pub fn shadow_casters(&self) -> impl Iterator<Item = &Instanced<'a>> {
        self.underlays
            .iter()
            .chain(self.opaque.iter())
            .filter(|instanced| instanced.cast_shadow)
    }

    pub fn is_empty(&self) -> bool {
        self.underlays.is_empty() && self.opaque.is_empty() && self.lines.is_empty()
    }
}

impl<'a> Render<'a> {
    pub(crate) fn set_pipelines(self, batches: &mut Batches<'a>) {
        match self {
            Render::Default(instanced) => batches.opaque.push(instanced),
            Render::Defaults(mut vec) => batches.opaque.append(&mut vec),
            Render::Underlay(instanced) => batches.underlays.push(instanced),
            Render::Lines(lines) => batches.lines.push(lines),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(batches)),
            Render::None => (),
        }
    }
}
