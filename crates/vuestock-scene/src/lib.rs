//! VueStock Scene - 3D warehouse viewer core
//!
//! Builds a scene from rack, level and slot records, drives the
//! overview → rack → level → slot navigation, resolves pointer picks and
//! manages the render surface across modal open/close cycles.

pub mod builder;
pub mod camera;
pub mod fetcher;
pub mod lifecycle;
pub mod picking;
pub mod scene;
pub mod state;

use bevy::prelude::*;

/// Plugin that wires the viewer into a Bevy app
pub struct WarehouseScenePlugin {
    pub link: lifecycle::ViewerLink,
    pub source: fetcher::DataSource,
}

impl Plugin for WarehouseScenePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.link.clone())
            .insert_resource(self.source.clone())
            .init_resource::<fetcher::PendingFetches>()
            .init_resource::<state::WarehouseViewerSession>()
            .add_plugins(camera::CameraPlugin)
            .add_plugins(scene::SceneSetupPlugin)
            .add_plugins(picking::InteractionPlugin);
    }
}

// Re-export commonly used types
pub use builder::{ObjectKey, ObjectKind, SceneObject, SourceRecord};
pub use fetcher::{DataSource, FetchOutcome, FetchRequest, PendingFetches, SpatialDataSource, StaticDataSource};
pub use lifecycle::{HostCommand, HostPage, HostPanel, LifecycleManager, RenderSurface, SurfaceFactory, SurfaceSize, ViewerLink};
pub use scene::HostPanelHandle;
pub use state::{InfoPanel, SceneOp, ViewMode, WarehouseViewerSession};
