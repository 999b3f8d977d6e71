//! The stage: ground, grid and a single model slot.

use crate::{
    config::GroundConfig,
    data_structures::{
        model::MaterialResources,
        primitives::{ground_plane, stage_grid},
        scene_graph::{LinesNode, MeshNode, SceneNode},
        transform::Transform,
    },
    error::StageError,
    render::Render,
    resources::{LoadedModel, format::ModelFormat},
};

pub struct Stage {
    ground: MeshNode,
    grid: LinesNode,
    model: Option<StagedModel>,
}

struct StagedModel {
    node: Box<dyn SceneNode>,
    format: ModelFormat,
    path: String,
}

impl Stage {
    pub fn new(config: &GroundConfig) -> Self {
        let mut ground = MeshNode::new(ground_plane(config.size, config.color));
        ground.receive_shadow = true;
        ground.depth_write = false;
        Self {
            ground,
            grid: LinesNode::new("grid", stage_grid(config)),
            model: None,
        }
    }

    /// Puts a loaded model on the stage at the origin.
    ///
    /// There is only one slot; a second model is refused and dropped.
    pub fn attach(&mut self, loaded: LoadedModel) -> Result<(), StageError> {
        if let Some(current) = &self.model {
            log::warn!(
                "{} not attached, {} is already on the stage",
                loaded.path,
                current.path
            );
            return Err(StageError::AlreadyLoaded);
        }
        let LoadedModel {
            mut node,
            format,
            path,
        } = loaded;
        node.local_transform_mut().set_position(0.0, 0.0, 0.0);
        node.update_world_transform_all();
        self.model = Some(StagedModel { node, format, path });
        Ok(())
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&dyn SceneNode> {
        self.model.as_ref().map(|m| m.node.as_ref())
    }

    pub fn model_format(&self) -> Option<ModelFormat> {
        self.model.as_ref().map(|m| m.format)
    }

    pub fn ground(&self) -> &MeshNode {
        &self.ground
    }

    /// Moves the model root to `(0, offset, 0)`. Returns `false` without a model.
    pub fn set_vertical_offset(&mut self, offset: f32) -> bool {
        match &mut self.model {
            Some(model) => {
                model.node.local_transform_mut().set_position(0.0, offset, 0.0);
                true
            }
            None => false,
        }
    }

    pub fn reset_model_position(&mut self) -> bool {
        self.set_vertical_offset(0.0)
    }

    /// Refreshes world transforms and uploads anything not on the GPU yet.
    pub fn write_to_buffers(
        &mut self,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        materials: &MaterialResources,
    ) -> anyhow::Result<()> {
        let identity = Transform::new();
        self.ground.update_world_transforms(&identity);
        self.grid.update_world_transforms(&identity);
        self.ground.write_to_buffers(queue, device, materials)?;
        self.grid.write_to_buffers(queue, device, materials)?;
        if let Some(model) = &mut self.model {
            model.node.update_world_transform_all();
            model.node.write_to_buffers(queue, device, materials)?;
        }
        Ok(())
    }

    pub fn get_render(&self) -> Render<'_> {
        let mut renders = vec![self.ground.get_render(), self.grid.get_render()];
        if let Some(model) = &self.model {
            renders.push(model.node.get_render());
        }
        Render::Composed(renders)
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;
    use crate::{
        data_structures::{
            model::{Material, Mesh, ModelVertex},
            scene_graph::ContainerNode,
        },
        resources::loader::normalize,
    };

    fn loaded(path: &str) -> LoadedModel {
        let mut root = ContainerNode::new("root");
        root.add_child(Box::new(MeshNode::new(Mesh {
            name: "body".into(),
            vertices: vec![ModelVertex::default(); 3],
            indices: vec![0, 1, 2],
            material: Material::default(),
        })));
        let mut node: Box<dyn SceneNode> = Box::new(root);
        normalize(node.as_mut(), 0.1);
        LoadedModel {
            node,
            format: ModelFormat::Fbx,
            path: path.to_string(),
        }
    }

    #[test]
    fn ground_receives_but_does_not_cast() {
        let stage = Stage::new(&GroundConfig::default());
        assert!(stage.ground().receive_shadow);
        assert!(!stage.ground().cast_shadow);
        assert!(!stage.ground().depth_write);
        assert!(!stage.has_model());
    }

    #[test]
    fn offset_without_model_is_a_no_op() {
        let mut stage = Stage::new(&GroundConfig::default());
        assert!(!stage.set_vertical_offset(12.0));
        assert!(!stage.reset_model_position());
    }

    #[test]
    fn offset_moves_only_the_model_root() {
        let mut stage = Stage::new(&GroundConfig::default());
        stage.attach(loaded("model/chair.fbx")).unwrap();
        assert!(stage.set_vertical_offset(12.5));

        let model = stage.model().unwrap();
        let local = model.get_local_transform();
        assert_eq!(local.position, Vector3::new(0.0, 12.5, 0.0));
        assert_eq!(local.scale, Vector3::new(0.1, 0.1, 0.1));
        assert_eq!(
            model.get_children()[0].get_local_transform(),
            Transform::new()
        );

        assert!(stage.set_vertical_offset(-3.0));
        assert_eq!(stage.model().unwrap().get_local_transform().position.y, -3.0);
        assert!(stage.reset_model_position());
        assert_eq!(
            stage.model().unwrap().get_local_transform().position,
            Vector3::new(0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn second_model_is_refused() {
        let mut stage = Stage::new(&GroundConfig::default());
        stage.attach(loaded("model/a.fbx")).unwrap();
        stage.set_vertical_offset(5.0);
        assert_eq!(stage.attach(loaded("model/b.fbx")), Err(StageError::AlreadyLoaded));
        assert_eq!(stage.model().unwrap().get_local_transform().position.y, 5.0);
        assert_eq!(stage.model_format(), Some(ModelFormat::Fbx));
    }
}
