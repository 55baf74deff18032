//! Camera framing, zoom, and pointer rays

use bevy::prelude::*;

use crate::builder::RACK_HEIGHT;
use crate::lifecycle::viewer_is_open;
use crate::scene::ViewerSet;
use crate::state::WarehouseViewerSession;

/// Where the camera sits and what it looks at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub eye: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    /// Default pose showing the whole floor
    pub fn overview() -> Self {
        Self {
            eye: Vec3::new(0.0, 20.0, 30.0),
            target: Vec3::ZERO,
        }
    }

    /// Frame a rack standing at `position`: 10 up and 15 back, looking at the
    /// rack center.
    pub fn framing_rack(position: Vec3) -> Self {
        Self {
            eye: position + Vec3::new(0.0, 10.0, 15.0),
            target: position + Vec3::Y * (RACK_HEIGHT / 2.0),
        }
    }

    /// Frame a level whose box center is `center`
    pub fn framing_level(center: Vec3) -> Self {
        Self {
            eye: center + Vec3::new(0.0, 4.0, 8.0),
            target: center,
        }
    }

    /// Frame a single slot
    pub fn framing_slot(center: Vec3) -> Self {
        Self {
            eye: center + Vec3::new(0.0, 2.0, 4.0),
            target: center,
        }
    }

    fn lerp(&self, other: &CameraPose, t: f32) -> CameraPose {
        CameraPose {
            eye: self.eye.lerp(other.eye, t),
            target: self.target.lerp(other.target, t),
        }
    }
}

/// Camera state owned by the viewer session
#[derive(Debug, Clone)]
pub struct CameraRig {
    /// Pose currently rendered
    pub current: CameraPose,
    /// Pose the camera is easing towards
    pub goal: CameraPose,
    /// Multiplier on the eye-target distance
    pub zoom: f32,
    pub target_zoom: f32,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        let pose = CameraPose::overview();
        Self {
            current: pose,
            goal: pose,
            zoom: 1.0,
            target_zoom: 1.0,
            fov_y: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
        }
    }
}

impl CameraRig {
    pub const MIN_ZOOM: f32 = 0.2;
    pub const MAX_ZOOM: f32 = 3.0;

    /// Start easing towards `pose`, resetting zoom
    pub fn frame(&mut self, pose: CameraPose) {
        self.goal = pose;
        self.target_zoom = 1.0;
    }

    /// Jump straight to the goal
    pub fn snap(&mut self) {
        self.current = self.goal;
        self.zoom = self.target_zoom;
    }

    /// Mouse wheel: positive `delta_y` zooms in
    pub fn apply_scroll(&mut self, delta_y: f32) {
        let factor = 1.0 - delta_y * self.zoom_speed * 0.3;
        self.target_zoom = (self.target_zoom * factor).clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
    }

    /// Track the render surface size; zero-height surfaces are ignored
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }

    /// Ease the rendered pose towards the goal
    pub fn advance(&mut self, dt: f32) {
        let t = 1.0 - (-self.smooth_factor * 60.0 * dt).exp();
        self.current = self.current.lerp(&self.goal, t);
        self.zoom += (self.target_zoom - self.zoom) * t;
    }

    /// Rendered eye position including zoom
    pub fn eye(&self) -> Vec3 {
        self.current.target + (self.current.eye - self.current.target) * self.zoom
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.eye()).looking_at(self.current.target, Vec3::Y)
    }

    /// Ray from the eye through a point in normalized device coordinates
    /// (x right, y up, both in -1..=1).
    pub fn ray_through_ndc(&self, ndc: Vec2) -> Option<Ray3d> {
        let eye = self.eye();
        let forward = (self.current.target - eye).try_normalize()?;
        let right = forward.cross(Vec3::Y).try_normalize()?;
        let up = right.cross(forward);
        let half_height = (self.fov_y / 2.0).tan();
        let half_width = half_height * self.aspect;

        let direction = forward + right * (ndc.x * half_width) + up * (ndc.y * half_height);
        let direction = Dir3::new(direction).ok()?;
        Some(Ray3d {
            origin: eye,
            direction,
        })
    }
}

/// Convert a cursor position (pixels, origin top-left) to NDC
pub fn cursor_to_ndc(cursor: Vec2, viewport: Vec2) -> Option<Vec2> {
    if viewport.x <= 0.0 || viewport.y <= 0.0 {
        return None;
    }
    Some(Vec2::new(
        cursor.x / viewport.x * 2.0 - 1.0,
        1.0 - cursor.y / viewport.y * 2.0,
    ))
}

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Plugin for camera updates
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            sync_camera.run_if(viewer_is_open).after(ViewerSet::Apply),
        );
    }
}

/// Copy the session's camera rig onto the rendered camera
fn sync_camera(
    time: Res<Time>,
    mut session: ResMut<WarehouseViewerSession>,
    mut camera: Query<(&mut Transform, &mut Projection), With<MainCamera>>,
) {
    session.camera.advance(time.delta_secs());

    let Ok((mut transform, mut projection)) = camera.single_mut() else {
        return;
    };
    *transform = session.camera.transform();
    if let Projection::Perspective(perspective) = projection.as_mut() {
        perspective.fov = session.camera.fov_y;
    }
}
