//! Bevy application setup and the page-wide viewer instance

use bevy::prelude::*;
use std::cell::RefCell;
use std::sync::Arc;

use vuestock_core::ViewerError;
use vuestock_scene::fetcher::{DataSource, StaticDataSource};
use vuestock_scene::lifecycle::{
    HostCommand, LifecycleManager, RenderSurface, SurfaceFactory, SurfaceSize, ViewerLink,
};
use vuestock_scene::scene::HostPanelHandle;
use vuestock_scene::WarehouseScenePlugin;

use crate::host::{DomHost, DomIds, DomPanel};
use crate::network::{BackendConfig, RestDataSource};

type Viewer = LifecycleManager<BevySurfaceFactory, DomHost>;

thread_local! {
    static VIEWER: RefCell<Option<Viewer>> = const { RefCell::new(None) };
}

/// Set up the page-wide viewer; the render surface is only created on open
pub fn install(config: BackendConfig, ids: DomIds) {
    VIEWER.with(|viewer| {
        *viewer.borrow_mut() = Some(LifecycleManager::new(
            BevySurfaceFactory::new(config, ids.clone()),
            DomHost::new(ids),
        ));
    });
}

fn with_viewer<R>(f: impl FnOnce(&mut Viewer) -> R) -> Option<R> {
    VIEWER.with(|viewer| match viewer.try_borrow_mut() {
        Ok(mut viewer) => viewer.as_mut().map(f),
        Err(_) => {
            tracing::warn!("Viewer busy, ignoring call");
            None
        }
    })
}

pub fn open() -> Result<(), ViewerError> {
    with_viewer(|viewer| viewer.open()).unwrap_or(Ok(()))
}

pub fn close() {
    if let Some(Err(e)) = with_viewer(|viewer| viewer.close()) {
        tracing::debug!("Close ignored: {}", e);
    }
}

pub fn teardown() {
    with_viewer(|viewer| viewer.teardown());
}

pub fn refresh_size() {
    with_viewer(|viewer| viewer.refresh_size());
}

/// Builds and starts the Bevy app on first open. The event loop cannot be
/// started twice, so later opens hand out the running app's link again.
pub struct BevySurfaceFactory {
    config: BackendConfig,
    ids: DomIds,
    app_link: Option<ViewerLink>,
}

impl BevySurfaceFactory {
    pub fn new(config: BackendConfig, ids: DomIds) -> Self {
        Self {
            config,
            ids,
            app_link: None,
        }
    }

    fn data_source(&self) -> DataSource {
        if self.config.demo {
            tracing::info!("Using demo warehouse");
            DataSource(Arc::new(StaticDataSource::demo()))
        } else {
            DataSource(Arc::new(RestDataSource::new(self.config.clone())))
        }
    }
}

impl SurfaceFactory for BevySurfaceFactory {
    type Surface = BevySurface;

    fn create(&mut self, size: SurfaceSize) -> Result<BevySurface, ViewerError> {
        if let Some(link) = &self.app_link {
            tracing::debug!("Reusing running viewer app");
            return Ok(BevySurface {
                link: link.clone(),
                size,
            });
        }
        let link = ViewerLink::default();

        let mut app = App::new();
        app.insert_resource(ClearColor(Color::srgb(0.93, 0.94, 0.96)))
            .add_plugins(DefaultPlugins.set(WindowPlugin {
                primary_window: Some(Window {
                    title: "VueStock - Warehouse".to_string(),
                    canvas: Some(format!("#{}", self.ids.canvas)),
                    fit_canvas_to_parent: true,
                    prevent_default_event_handling: false,
                    ..default()
                }),
                ..default()
            }))
            .add_plugins(WarehouseScenePlugin {
                link: link.clone(),
                source: self.data_source(),
            })
            .insert_non_send_resource(HostPanelHandle(Box::new(DomPanel::new(self.ids.clone()))));

        // In the browser this hands the app to the event loop and returns
        app.run();
        self.app_link = Some(link.clone());

        Ok(BevySurface { link, size })
    }
}

/// Handle on the running app
pub struct BevySurface {
    link: ViewerLink,
    size: SurfaceSize,
}

impl RenderSurface for BevySurface {
    fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
        self.link.send(HostCommand::Resize(size));
    }

    fn set_active(&mut self, active: bool) {
        if active {
            self.link.send(HostCommand::Open(self.size));
        } else {
            self.link.send(HostCommand::Close);
        }
    }

    fn release(self) {
        self.link.send(HostCommand::Teardown);
    }
}
