//! Per-object support state.

use super::{PadConfig, SupportPoint, SupportTreeBuilder, SupportTreeConfig};
use crate::config::SlaPrintObjectConfig;
use crate::geometry::ExPolygons;
use crate::mesh::TriangleMesh;
use crate::print::JobController;
use crate::{CoordF, Result};
use std::sync::Arc;

/// What the tree builder works on: the mesh to support and the points on it.
#[derive(Clone, Debug, Default)]
pub struct SupportableMesh {
    pub mesh: Arc<TriangleMesh>,
    pub points: Vec<SupportPoint>,
    /// Bottom Z of the positive parts of the model.
    pub zoffset: CoordF,
}

impl SupportableMesh {
    pub fn new(mesh: Arc<TriangleMesh>, points: Vec<SupportPoint>, zoffset: CoordF) -> Self {
        Self {
            mesh,
            points,
            zoffset,
        }
    }

    /// Z where pillars end.
    pub fn ground_level(&self, config: &SupportTreeConfig) -> CoordF {
        self.zoffset - config.object_elevation
    }
}

/// Supports of one print object: input, generated meshes and their slices.
#[derive(Clone, Debug, Default)]
pub struct SupportData {
    pub input: SupportableMesh,
    pub tree_config: SupportTreeConfig,
    pub pad_config: PadConfig,
    pub tree_mesh: TriangleMesh,
    pub pad_mesh: TriangleMesh,
    pub support_slices: Vec<ExPolygons>,
}

impl SupportData {
    pub fn new(mesh: Arc<TriangleMesh>, config: &SlaPrintObjectConfig) -> Self {
        Self {
            input: SupportableMesh::new(mesh, Vec::new(), 0.0),
            tree_config: SupportTreeConfig::from_object_config(config),
            pad_config: PadConfig::from_object_config(config),
            ..Self::default()
        }
    }

    pub fn create_support_tree(
        &mut self,
        builder: &dyn SupportTreeBuilder,
        ctl: &JobController<'_>,
    ) -> Result<()> {
        self.tree_mesh = builder.build_tree(&self.input, &self.tree_config, ctl)?;
        Ok(())
    }

    pub fn create_pad(&mut self, builder: &dyn SupportTreeBuilder, ctl: &JobController<'_>) -> Result<()> {
        self.pad_mesh = builder.build_pad(
            &self.input,
            &self.tree_mesh,
            &self.tree_config,
            &self.pad_config,
            ctl,
        )?;
        Ok(())
    }

    /// Tree and pad in one mesh.
    pub fn support_mesh(&self) -> TriangleMesh {
        let mut mesh = self.tree_mesh.clone();
        mesh.merge(&self.pad_mesh);
        mesh
    }
}
