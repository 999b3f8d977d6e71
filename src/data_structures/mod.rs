//! Engine data structures: meshes, textures, scene graphs, and transforms.
//!
//! This module contains the core data types for scene representation:
//!
//! - `model` contains mesh and material definitions, GPU resources for meshes
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `transform` holds per-node transformation data and its GPU layout
//! - `scene_graph` enables hierarchical scene organization
//! - `primitives` builds the ground plane and grid

pub mod model;
pub mod primitives;
pub mod scene_graph;
pub mod texture;
pub mod transform;
