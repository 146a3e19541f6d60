//! External engines the pipeline delegates to.

use crate::csg::{CsgBackend, MergeOnlyBackend, NoVoxelizer, Voxelizer};
use crate::hollowing::{HollowAndDrill, InteriorGenerator, InteriorMerger, NoInteriorGenerator};
use crate::support::{
    GridSupportPointGenerator, PillarTreeBuilder, SupportPointGenerator, SupportTreeBuilder,
};
use std::fmt;
use std::sync::Arc;

/// The set of engines a [`Print`](super::Print) runs with.
///
/// The defaults need no external library: booleans are limited to
/// unions, there is no voxelizer and no room is ever found for a cavity.
#[derive(Clone)]
pub struct Capabilities {
    pub csg_backend: Arc<dyn CsgBackend>,
    pub voxelizer: Arc<dyn Voxelizer>,
    pub interior_generator: Arc<dyn InteriorGenerator>,
    pub hollower: Arc<dyn HollowAndDrill>,
    pub support_point_generator: Arc<dyn SupportPointGenerator>,
    pub support_tree_builder: Arc<dyn SupportTreeBuilder>,
}

impl Capabilities {
    pub fn with_csg_backend(mut self, backend: impl CsgBackend + 'static) -> Self {
        self.csg_backend = Arc::new(backend);
        self
    }

    pub fn with_voxelizer(mut self, voxelizer: impl Voxelizer + 'static) -> Self {
        self.voxelizer = Arc::new(voxelizer);
        self
    }

    pub fn with_interior_generator(mut self, generator: impl InteriorGenerator + 'static) -> Self {
        self.interior_generator = Arc::new(generator);
        self
    }

    pub fn with_hollower(mut self, hollower: impl HollowAndDrill + 'static) -> Self {
        self.hollower = Arc::new(hollower);
        self
    }

    pub fn with_support_point_generator(
        mut self,
        generator: impl SupportPointGenerator + 'static,
    ) -> Self {
        self.support_point_generator = Arc::new(generator);
        self
    }

    pub fn with_support_tree_builder(mut self, builder: impl SupportTreeBuilder + 'static) -> Self {
        self.support_tree_builder = Arc::new(builder);
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            csg_backend: Arc::new(MergeOnlyBackend),
            voxelizer: Arc::new(NoVoxelizer),
            interior_generator: Arc::new(NoInteriorGenerator),
            hollower: Arc::new(InteriorMerger),
            support_point_generator: Arc::new(GridSupportPointGenerator),
            support_tree_builder: Arc::new(PillarTreeBuilder),
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
