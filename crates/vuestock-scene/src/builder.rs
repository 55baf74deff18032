//! Scene graph builder - turns spatial records into renderable objects
//!
//! Builders are pure: they compute geometry, placement and appearance for a
//! record and hand back a [`SceneObject`]. Attaching it to the scene is the
//! view state machine's decision.

use bevy::prelude::*;
use vuestock_core::{Level, LevelId, Rack, RackId, Slot, SlotId};

/// Backend floor coordinates are divided by this to get scene units
pub const BACKEND_UNITS_PER_SCENE_UNIT: f32 = 50.0;
/// Every rack is drawn with the same height
pub const RACK_HEIGHT: f32 = 4.0;
/// Vertical distance between consecutive levels
pub const LEVEL_SPACING: f32 = 2.0;
/// Height of the first level
pub const LEVEL_OFFSET: f32 = 1.0;
/// How much a level is narrower/shallower than its rack
pub const LEVEL_INSET: f32 = 0.2;
/// Declared level heights are centimetres
pub const LEVEL_HEIGHT_SCALE: f32 = 100.0;
pub const SLOT_HEIGHT: f32 = 0.6;
pub const SLOT_GAP: f32 = 0.1;
/// Gap between the top of a rack and its label
pub const LABEL_CLEARANCE: f32 = 0.5;

pub const DEFAULT_RACK_COLOR: &str = "#4a90e2";
pub const LEVEL_COLOR: &str = "#7fb3d5";
pub const SLOT_FREE_COLOR: &str = "#2ecc71";
pub const SLOT_OCCUPIED_COLOR: &str = "#e67e22";
pub const SLOT_UNKNOWN_COLOR: &str = "#95a5a6";

/// Which tier of the warehouse hierarchy an object belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Rack,
    Level,
    Slot,
}

/// Identity of a scene object, unique across the whole scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKey {
    Rack(RackId),
    Level(LevelId),
    Slot(SlotId),
}

impl ObjectKey {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectKey::Rack(_) => ObjectKind::Rack,
            ObjectKey::Level(_) => ObjectKind::Level,
            ObjectKey::Slot(_) => ObjectKind::Slot,
        }
    }
}

/// The domain record a scene object was built from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRecord {
    Rack(Rack),
    Level(Level),
    Slot(Slot),
}

impl SourceRecord {
    pub fn kind(&self) -> ObjectKind {
        self.key().kind()
    }

    pub fn key(&self) -> ObjectKey {
        match self {
            SourceRecord::Rack(rack) => ObjectKey::Rack(rack.id),
            SourceRecord::Level(level) => ObjectKey::Level(level.id),
            SourceRecord::Slot(slot) => ObjectKey::Slot(slot.id),
        }
    }
}

/// Text billboard attached to an object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLabel {
    pub text: String,
    /// Offset from the object origin, in object space
    pub offset: Vec3,
}

/// A renderable box carrying the record it represents
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub source: SourceRecord,
    /// Object placement in the world
    pub transform: Transform,
    /// Box dimensions
    pub size: Vec3,
    /// Box center relative to the object origin, in object space
    pub mesh_offset: Vec3,
    pub color: Color,
    pub label: Option<ObjectLabel>,
    /// Draw an edge overlay around the box
    pub outlined: bool,
}

impl SceneObject {
    pub fn kind(&self) -> ObjectKind {
        self.source.kind()
    }

    pub fn key(&self) -> ObjectKey {
        self.source.key()
    }

    /// World-space center of the box
    pub fn center(&self) -> Vec3 {
        self.transform.transform_point(self.mesh_offset)
    }

    /// World-space position of the label, if any
    pub fn label_anchor(&self) -> Option<Vec3> {
        self.label
            .as_ref()
            .map(|label| self.transform.transform_point(label.offset))
    }
}

/// Parse a CSS hex color, falling back when missing or invalid
pub fn parse_color(hex: Option<&str>, fallback: &str) -> Color {
    hex.and_then(|h| Srgba::hex(h.trim()).ok())
        .or_else(|| Srgba::hex(fallback).ok())
        .map(Color::from)
        .unwrap_or(Color::WHITE)
}

/// Build a rack: a `width × RACK_HEIGHT × depth` box standing on the floor at
/// `(x/50, 0, y/50)`, rotated about the vertical axis, with an outline and a
/// label above it.
pub fn build_rack_object(rack: &Rack) -> SceneObject {
    let (x, y) = rack.position();
    let translation = Vec3::new(
        x / BACKEND_UNITS_PER_SCENE_UNIT,
        0.0,
        y / BACKEND_UNITS_PER_SCENE_UNIT,
    );
    let rotation = Quat::from_rotation_y(rack.rotation_degrees().to_radians());

    SceneObject {
        source: SourceRecord::Rack(rack.clone()),
        transform: Transform::from_translation(translation).with_rotation(rotation),
        size: Vec3::new(rack.width(), RACK_HEIGHT, rack.depth()),
        mesh_offset: Vec3::Y * (RACK_HEIGHT / 2.0),
        color: parse_color(rack.color.as_deref(), DEFAULT_RACK_COLOR),
        label: Some(ObjectLabel {
            text: rack.label().to_string(),
            offset: Vec3::Y * (RACK_HEIGHT + LABEL_CLEARANCE),
        }),
        outlined: true,
    }
}

/// Build the `index`-th visible level of a rack.
///
/// The parent rack object is looked up by id in `racks`; the level takes its
/// horizontal position and rotation. Height is `index * 2 + 1` whatever the
/// declared level height, which only sets the box thickness. Returns `None`
/// for inactive levels or when the parent rack is not attached.
pub fn build_level_object(level: &Level, index: usize, racks: &[SceneObject]) -> Option<SceneObject> {
    if !level.is_active {
        return None;
    }

    let parent = racks.iter().find_map(|object| match &object.source {
        SourceRecord::Rack(rack) if rack.id == level.rack_id => Some((object, rack)),
        _ => None,
    });
    let Some((rack_object, rack)) = parent else {
        tracing::warn!(level = %level.id, rack = %level.rack_id, "Parent rack not in scene, skipping level");
        return None;
    };

    let mut translation = rack_object.transform.translation;
    translation.y = index as f32 * LEVEL_SPACING + LEVEL_OFFSET;

    Some(SceneObject {
        source: SourceRecord::Level(level.clone()),
        transform: Transform::from_translation(translation).with_rotation(rack_object.transform.rotation),
        size: Vec3::new(
            rack.width() - LEVEL_INSET,
            level.height() / LEVEL_HEIGHT_SCALE,
            rack.depth() - LEVEL_INSET,
        ),
        mesh_offset: Vec3::ZERO,
        color: parse_color(None, LEVEL_COLOR),
        label: None,
        outlined: false,
    })
}

/// Build the `index`-th of `count` visible slots of a level.
///
/// Slots split the parent level's width evenly and sit on top of it. The
/// parent level object is looked up by id in `levels`.
pub fn build_slot_object(
    slot: &Slot,
    index: usize,
    count: usize,
    levels: &[SceneObject],
) -> Option<SceneObject> {
    if !slot.is_active || count == 0 {
        return None;
    }

    let Some(level_object) = levels.iter().find(|object| {
        matches!(&object.source, SourceRecord::Level(level) if level.id == slot.level_id)
    }) else {
        tracing::warn!(slot = %slot.id, level = %slot.level_id, "Parent level not in scene, skipping slot");
        return None;
    };

    let cell_width = level_object.size.x / count as f32;
    let local = Vec3::new(
        -level_object.size.x / 2.0 + (index as f32 + 0.5) * cell_width,
        level_object.size.y / 2.0 + SLOT_HEIGHT / 2.0,
        0.0,
    );
    let color = match slot.status.as_deref() {
        Some("free") => SLOT_FREE_COLOR,
        Some("occupied") => SLOT_OCCUPIED_COLOR,
        _ => SLOT_UNKNOWN_COLOR,
    };

    Some(SceneObject {
        source: SourceRecord::Slot(slot.clone()),
        transform: Transform::from_translation(level_object.transform.transform_point(local))
            .with_rotation(level_object.transform.rotation),
        size: Vec3::new(
            (cell_width - SLOT_GAP).max(SLOT_GAP),
            SLOT_HEIGHT,
            (level_object.size.z - LEVEL_INSET).max(SLOT_GAP),
        ),
        mesh_offset: Vec3::ZERO,
        color: parse_color(None, color),
        label: None,
        outlined: true,
    })
}

/// Thickness of the outline bars
pub const EDGE_THICKNESS: f32 = 0.04;

/// The 12 edge bars of a box outline as `(center, dimensions)` pairs, relative
/// to the box center.
pub fn box_edges(size: Vec3) -> Vec<(Vec3, Vec3)> {
    let half = size / 2.0;
    let t = EDGE_THICKNESS;
    let mut edges = Vec::with_capacity(12);

    for sy in [-1.0, 1.0] {
        for sz in [-1.0, 1.0] {
            edges.push((Vec3::new(0.0, sy * half.y, sz * half.z), Vec3::new(size.x + t, t, t)));
        }
    }
    for sx in [-1.0, 1.0] {
        for sz in [-1.0, 1.0] {
            edges.push((Vec3::new(sx * half.x, 0.0, sz * half.z), Vec3::new(t, size.y + t, t)));
        }
    }
    for sx in [-1.0, 1.0] {
        for sy in [-1.0, 1.0] {
            edges.push((Vec3::new(sx * half.x, sy * half.y, 0.0), Vec3::new(t, t, size.z + t)));
        }
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    fn rack_a1() -> Rack {
        let mut rack = Rack::new(1, "A1");
        rack.position_x = Some(100.0);
        rack.position_y = Some(50.0);
        rack.rotation = Some(90.0);
        rack
    }

    fn yaw(transform: &Transform) -> f32 {
        transform.rotation.to_euler(EulerRot::YXZ).0
    }

    #[test]
    fn test_rack_transform() {
        let object = build_rack_object(&rack_a1());

        assert!(object.transform.translation.abs_diff_eq(Vec3::new(2.0, 0.0, 1.0), EPSILON));
        assert!((yaw(&object.transform) - FRAC_PI_2).abs() < EPSILON);
        assert_eq!(object.kind(), ObjectKind::Rack);
        assert_eq!(object.key(), ObjectKey::Rack(RackId(1)));
    }

    #[test]
    fn test_rack_without_rotation_or_color() {
        let rack = Rack::new(2, "B7");
        let object = build_rack_object(&rack);

        assert_eq!(object.transform.rotation, Quat::IDENTITY);
        assert_eq!(object.transform.translation, Vec3::ZERO);
        assert_eq!(object.color, parse_color(Some(DEFAULT_RACK_COLOR), "#000000"));
        assert_eq!(object.label.as_ref().unwrap().text, "B7");
    }

    #[test]
    fn test_rack_label_and_geometry() {
        let mut rack = rack_a1();
        rack.display_name = Some("Entrée".to_string());
        rack.width = Some(4.0);
        rack.depth = Some(1.5);
        rack.color = Some("not-a-color".to_string());
        let object = build_rack_object(&rack);

        assert_eq!(object.size, Vec3::new(4.0, RACK_HEIGHT, 1.5));
        assert_eq!(object.label.as_ref().unwrap().text, "Entrée");
        assert!((object.label_anchor().unwrap().y - (RACK_HEIGHT + LABEL_CLEARANCE)).abs() < EPSILON);
        assert!((object.center().y - RACK_HEIGHT / 2.0).abs() < EPSILON);
        assert_eq!(object.color, parse_color(None, DEFAULT_RACK_COLOR));
    }

    #[test]
    fn test_levels_stack_by_index_not_height() {
        let rack_object = build_rack_object(&rack_a1());
        let racks = vec![rack_object.clone()];

        let mut tall = Level::new(10, RackId(1), 0);
        tall.height = Some(250.0);
        let mut thin = Level::new(11, RackId(1), 1);
        thin.height = Some(10.0);

        let first = build_level_object(&tall, 0, &racks).unwrap();
        let second = build_level_object(&thin, 1, &racks).unwrap();

        assert!((first.transform.translation.y - 1.0).abs() < EPSILON);
        assert!((second.transform.translation.y - 3.0).abs() < EPSILON);
        assert!((first.size.y - 2.5).abs() < EPSILON);
        assert!((second.size.y - 0.1).abs() < EPSILON);
        assert!((first.transform.translation.x - 2.0).abs() < EPSILON);
        assert!((first.transform.translation.z - 1.0).abs() < EPSILON);
        assert_eq!(first.transform.rotation, rack_object.transform.rotation);
        assert!((first.size.x - (rack_object.size.x - LEVEL_INSET)).abs() < EPSILON);
    }

    #[test]
    fn test_inactive_or_orphan_level_is_not_built() {
        let racks = vec![build_rack_object(&rack_a1())];

        let mut inactive = Level::new(12, RackId(1), 2);
        inactive.is_active = false;
        assert!(build_level_object(&inactive, 2, &racks).is_none());

        let orphan = Level::new(13, RackId(99), 0);
        assert!(build_level_object(&orphan, 0, &racks).is_none());
    }

    #[test]
    fn test_slots_split_level_width() {
        let mut rack = Rack::new(1, "A1");
        rack.width = Some(4.2);
        let racks = vec![build_rack_object(&rack)];
        let level_object = build_level_object(&Level::new(5, RackId(1), 0), 0, &racks).unwrap();
        let levels = vec![level_object.clone()];

        let left = build_slot_object(&Slot::new(1, LevelId(5), 0), 0, 2, &levels).unwrap();
        let right = build_slot_object(&Slot::new(2, LevelId(5), 1), 1, 2, &levels).unwrap();

        assert!((left.transform.translation.x + 1.0).abs() < EPSILON);
        assert!((right.transform.translation.x - 1.0).abs() < EPSILON);
        assert!(left.transform.translation.y > level_object.transform.translation.y);
        assert!((left.size.x - (2.0 - SLOT_GAP)).abs() < EPSILON);

        let mut occupied = Slot::new(3, LevelId(5), 0);
        occupied.status = Some("occupied".to_string());
        let object = build_slot_object(&occupied, 0, 1, &levels).unwrap();
        assert_eq!(object.color, parse_color(Some(SLOT_OCCUPIED_COLOR), "#000000"));

        assert!(build_slot_object(&Slot::new(4, LevelId(6), 0), 0, 1, &levels).is_none());
    }

    #[test]
    fn test_box_edges() {
        let edges = box_edges(Vec3::new(2.0, 4.0, 1.0));
        assert_eq!(edges.len(), 12);
        assert!(edges.iter().any(|(center, _)| *center == Vec3::new(0.0, 2.0, 0.5)));
        assert!(edges.iter().all(|(center, _)| center.x.abs() <= 1.0 && center.y.abs() <= 2.0));
    }
}
