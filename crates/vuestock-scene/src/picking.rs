//! Pointer picking and input handling
//!
//! Raw Bevy input is reduced to [`ViewerInput`] values and fed to
//! [`handle_input`], which only talks to the session. Hit testing is a ray vs
//! oriented box test against the objects of the current tier.

use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::window::WindowResized;

use crate::builder::SceneObject;
use crate::camera::{cursor_to_ndc, MainCamera};
use crate::lifecycle::viewer_is_open;
use crate::scene::ViewerSet;
use crate::state::WarehouseViewerSession;

/// Keys the viewer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKey {
    /// Up one tier
    Escape,
    /// Straight back to overview
    Home,
}

/// Input after it has been translated out of window coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerInput {
    /// Pick ray already projected by the render camera
    PointerRay(Ray3d),
    /// Pointer in NDC, projected through the camera rig
    PointerDown { ndc: Vec2 },
    Wheel { delta_y: f32 },
    Resize { width: f32, height: f32 },
    Key(ViewerKey),
}

/// Apply one input to the session.
///
/// Returns whether the view state changed. Input is dropped without any ray
/// math while the surface is inactive.
pub fn handle_input(session: &mut WarehouseViewerSession, input: ViewerInput) -> bool {
    if !session.is_active() {
        return false;
    }

    match input {
        ViewerInput::PointerRay(ray) => select_along(session, ray),
        ViewerInput::PointerDown { ndc } => match session.camera.ray_through_ndc(ndc) {
            Some(ray) => select_along(session, ray),
            None => false,
        },
        ViewerInput::Wheel { delta_y } => {
            session.camera.apply_scroll(delta_y);
            false
        }
        ViewerInput::Resize { width, height } => {
            session.camera.set_viewport(width, height);
            false
        }
        ViewerInput::Key(ViewerKey::Escape) => session.ascend(),
        ViewerInput::Key(ViewerKey::Home) => session.exit_to_overview(),
    }
}

/// Select the nearest pickable object on `ray`. Clicks are ignored while a
/// fetch is in flight.
fn select_along(session: &mut WarehouseViewerSession, ray: Ray3d) -> bool {
    if session.is_busy() {
        return false;
    }
    let Some(source) = pick_nearest(ray, session.pickable_objects())
        .map(|object| object.source.clone())
    else {
        return false;
    };
    session.select(&source)
}

/// Distance along `ray` to the object's box, if it is hit in front of the
/// origin.
pub fn intersect_object(ray: Ray3d, object: &SceneObject) -> Option<f32> {
    let inverse = object.transform.rotation.inverse();
    let origin = inverse * (ray.origin - object.center());
    let direction = inverse * *ray.direction;
    let half = object.size / 2.0;

    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        let (o, d, h) = (origin[axis], direction[axis], half[axis]);
        if d.abs() < f32::EPSILON {
            // Parallel to this slab
            if o.abs() > h {
                return None;
            }
            continue;
        }
        let a = (-h - o) / d;
        let b = (h - o) / d;
        t_min = t_min.max(a.min(b));
        t_max = t_max.min(a.max(b));
        if t_min > t_max {
            return None;
        }
    }

    if t_max < 0.0 {
        None
    } else {
        Some(t_min.max(0.0))
    }
}

/// Closest object hit by `ray`
pub fn pick_nearest(ray: Ray3d, objects: &[SceneObject]) -> Option<&SceneObject> {
    objects
        .iter()
        .filter_map(|object| intersect_object(ray, object).map(|t| (t, object)))
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, object)| object)
}

/// Track touch state for tap detection
#[derive(Resource, Default)]
pub struct TouchState {
    start_position: Option<Vec2>,
    is_dragging: bool,
}

/// Plugin turning window input into viewer input
pub struct InteractionPlugin;

impl Plugin for InteractionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TouchState>()
            .add_systems(
                Update,
                gather_input.run_if(viewer_is_open).in_set(ViewerSet::Input),
            );
    }
}

fn gather_input(
    mut session: ResMut<WarehouseViewerSession>,
    mut touch_state: ResMut<TouchState>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    mut resized: MessageReader<WindowResized>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    touch_input: Res<Touches>,
    windows: Query<&Window>,
    cameras: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
) {
    let mut inputs = Vec::new();

    for event in resized.read() {
        inputs.push(ViewerInput::Resize {
            width: event.width,
            height: event.height,
        });
    }

    for scroll in mouse_wheel.read() {
        let delta_y = match scroll.unit {
            MouseScrollUnit::Line => scroll.y,
            MouseScrollUnit::Pixel => scroll.y / 100.0,
        };
        inputs.push(ViewerInput::Wheel { delta_y });
    }

    let Ok(window) = windows.single() else {
        return;
    };
    let viewport = Vec2::new(window.width(), window.height());
    let mut pointer: Option<Vec2> = None;

    // A touch counts as a tap unless it moved more than 10 px
    if let Some(touch) = touch_input.iter().next() {
        if touch_input.just_pressed(touch.id()) {
            touch_state.start_position = Some(touch.position());
            touch_state.is_dragging = false;
        } else if let Some(start) = touch_state.start_position {
            if touch.position().distance(start) > 10.0 {
                touch_state.is_dragging = true;
            }
        }
    }
    for touch in touch_input.iter_just_released() {
        if !touch_state.is_dragging {
            pointer = touch_state.start_position.or(Some(touch.position()));
        }
        touch_state.start_position = None;
        touch_state.is_dragging = false;
    }

    if mouse_button.just_pressed(MouseButton::Left) {
        if let Some(cursor) = window.cursor_position() {
            pointer = Some(cursor);
        }
    }

    // Project through the render camera; the rig's own ray covers frames
    // before the camera has a viewport
    if let Some(cursor) = pointer {
        let camera_ray = cameras
            .single()
            .ok()
            .and_then(|(camera, transform)| camera.viewport_to_world(transform, cursor).ok());
        if let Some(ray) = camera_ray {
            inputs.push(ViewerInput::PointerRay(ray));
        } else if let Some(ndc) = cursor_to_ndc(cursor, viewport) {
            inputs.push(ViewerInput::PointerDown { ndc });
        }
    }

    if keyboard.just_pressed(KeyCode::Escape) {
        inputs.push(ViewerInput::Key(ViewerKey::Escape));
    }
    if keyboard.just_pressed(KeyCode::Home) {
        inputs.push(ViewerInput::Key(ViewerKey::Home));
    }

    for input in inputs {
        handle_input(&mut session, input);
    }
}
