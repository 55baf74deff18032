//! Render surface lifecycle across modal open/close and page unload
//!
//! The host page and the surface implementation are injected, so the same
//! open/close/teardown rules drive the browser build and the tests.

use bevy::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use vuestock_core::ViewerError;

use crate::state::{InfoPanel, WarehouseViewerSession};

/// Pixel size of the render container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A live render surface
pub trait RenderSurface {
    fn resize(&mut self, size: SurfaceSize);

    /// Start or stop rendering without releasing anything
    fn set_active(&mut self, active: bool);

    /// Dispose all scene content and release the surface
    fn release(self);
}

/// Creates the render surface on first open
pub trait SurfaceFactory {
    type Surface: RenderSurface;

    fn create(&mut self, size: SurfaceSize) -> Result<Self::Surface, ViewerError>;
}

/// Page markup hosting the viewer
pub trait HostPage {
    /// `MissingModal` if the modal markup is not in the page yet
    fn modal_ready(&self) -> Result<(), ViewerError>;

    /// Client size of the render container, `MissingContainer` if absent
    fn container_size(&self) -> Result<SurfaceSize, ViewerError>;

    fn show_modal(&mut self);

    fn hide_modal(&mut self);

    /// Window listeners (resize, unload) live as long as the surface
    fn bind_listeners(&mut self);

    fn unbind_listeners(&mut self);
}

/// Host-owned info panel and loading indicator
pub trait HostPanel {
    fn show_info_panel(&self, panel: &InfoPanel);

    fn hide_info_panel(&self);

    fn set_loading(&self, visible: bool);
}

/// Owns the render surface for the page session
pub struct LifecycleManager<F: SurfaceFactory, H: HostPage> {
    factory: F,
    host: H,
    surface: Option<F::Surface>,
    listeners_bound: bool,
    open: bool,
}

impl<F: SurfaceFactory, H: HostPage> LifecycleManager<F, H> {
    pub fn new(factory: F, host: H) -> Self {
        Self {
            factory,
            host,
            surface: None,
            listeners_bound: false,
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Show the viewer. The surface is created on the first call and only
    /// resized afterwards.
    pub fn open(&mut self) -> Result<(), ViewerError> {
        if let Err(e) = self.host.modal_ready() {
            tracing::error!("Cannot open viewer: {}", e);
            return Err(e);
        }
        self.host.show_modal();

        let size = match self.host.container_size() {
            Ok(size) => size,
            Err(e) => {
                tracing::error!("Cannot open viewer: {}", e);
                self.host.hide_modal();
                return Err(e);
            }
        };

        let surface = match self.surface.take() {
            Some(mut surface) => {
                surface.resize(size);
                surface
            }
            None => {
                tracing::info!(width = size.width, height = size.height, "Creating render surface");
                match self.factory.create(size) {
                    Ok(surface) => surface,
                    Err(e) => {
                        tracing::error!("Render surface creation failed: {}", e);
                        self.host.hide_modal();
                        return Err(e);
                    }
                }
            }
        };
        let surface = self.surface.insert(surface);

        if !self.listeners_bound {
            self.host.bind_listeners();
            self.listeners_bound = true;
        }

        surface.set_active(true);
        self.open = true;
        Ok(())
    }

    /// Hide the viewer and stop rendering. Graphics resources are kept for
    /// the next open.
    pub fn close(&mut self) -> Result<(), ViewerError> {
        if let Err(e) = self.host.modal_ready() {
            tracing::warn!("Cannot close viewer: {}", e);
            return Err(e);
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.set_active(false);
        }
        self.host.hide_modal();
        self.open = false;
        Ok(())
    }

    /// Release everything so the next open starts a fresh session
    pub fn teardown(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.set_active(false);
            surface.release();
            tracing::info!("Render surface released");
        }
        if self.listeners_bound {
            self.host.unbind_listeners();
            self.listeners_bound = false;
        }
        self.open = false;
    }

    /// Re-measure the container while open
    pub fn refresh_size(&mut self) {
        if !self.open {
            return;
        }
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        match self.host.container_size() {
            Ok(size) => surface.resize(size),
            Err(e) => tracing::warn!("Resize skipped: {}", e),
        }
    }
}

/// Request from the host page to the running app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Open(SurfaceSize),
    Close,
    Resize(SurfaceSize),
    Teardown,
}

/// Shared between the host page and the app: the open flag the render loop
/// checks every frame, and a queue of host commands.
#[derive(Resource, Clone, Default)]
pub struct ViewerLink {
    open: Arc<AtomicBool>,
    commands: Arc<Mutex<Vec<HostCommand>>>,
}

impl ViewerLink {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn send(&self, command: HostCommand) {
        match command {
            HostCommand::Open(_) => self.open.store(true, Ordering::Release),
            HostCommand::Close | HostCommand::Teardown => self.open.store(false, Ordering::Release),
            HostCommand::Resize(_) => {}
        }
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command);
        }
    }

    pub fn drain(&self) -> Vec<HostCommand> {
        match self.commands.lock() {
            Ok(mut commands) => std::mem::take(&mut *commands),
            Err(_) => Vec::new(),
        }
    }
}

/// What the render loop does after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

/// Frame scheduling guarded by the open flag
#[derive(Resource, Debug, Default)]
pub struct RenderLoop {
    frames_scheduled: u64,
    running: bool,
}

impl RenderLoop {
    /// Called at the head of every frame. Nothing is scheduled while closed.
    pub fn tick(&mut self, open: bool) -> LoopControl {
        if !open {
            if self.running {
                tracing::debug!(frames = self.frames_scheduled, "Render loop suspended");
            }
            self.running = false;
            return LoopControl::Stop;
        }
        self.running = true;
        self.frames_scheduled += 1;
        LoopControl::Continue
    }

    pub fn frames_scheduled(&self) -> u64 {
        self.frames_scheduled
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// Run condition for viewer systems
pub fn viewer_is_open(session: Res<WarehouseViewerSession>) -> bool {
    session.is_active()
}
