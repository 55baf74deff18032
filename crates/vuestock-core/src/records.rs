//! Spatial records stored in the backend: racks, their levels, and level slots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Backend identifier of a rack
    RackId
);
record_id!(
    /// Backend identifier of a rack level
    LevelId
);
record_id!(
    /// Backend identifier of a storage slot
    SlotId
);

/// Default rack footprint when the backend column is null
pub const DEFAULT_RACK_WIDTH: f32 = 3.0;
pub const DEFAULT_RACK_DEPTH: f32 = 1.0;
/// Default level height (centimetres) when the backend column is null
pub const DEFAULT_LEVEL_HEIGHT: f32 = 40.0;

fn default_true() -> bool {
    true
}

/// PostgREST sends nullable columns as `null`; treat that like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

/// A storage rack placed on the warehouse floor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rack {
    pub id: RackId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rack_code: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Footprint width in scene units
    #[serde(default)]
    pub width: Option<f32>,
    /// Footprint depth in scene units
    #[serde(default)]
    pub depth: Option<f32>,
    /// Floor position in backend units
    #[serde(default)]
    pub position_x: Option<f32>,
    #[serde(default)]
    pub position_y: Option<f32>,
    /// Rotation about the vertical axis, in degrees
    #[serde(default)]
    pub rotation: Option<f32>,
    /// CSS hex color (e.g. "#4a90e2")
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Rack {
    /// Create a rack with only the required fields set
    pub fn new(id: i64, rack_code: impl Into<String>) -> Self {
        Self {
            id: RackId(id),
            rack_code: rack_code.into(),
            display_name: None,
            width: None,
            depth: None,
            position_x: None,
            position_y: None,
            rotation: None,
            color: None,
            created_at: None,
        }
    }

    /// Text shown on the rack label: display name, or the rack code when absent
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.rack_code,
        }
    }

    pub fn width(&self) -> f32 {
        self.width.unwrap_or(DEFAULT_RACK_WIDTH)
    }

    pub fn depth(&self) -> f32 {
        self.depth.unwrap_or(DEFAULT_RACK_DEPTH)
    }

    /// Floor position in backend units as (x, y)
    pub fn position(&self) -> (f32, f32) {
        (self.position_x.unwrap_or(0.0), self.position_y.unwrap_or(0.0))
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation.unwrap_or(0.0)
    }
}

/// A horizontal level (shelf) of a rack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    pub rack_id: RackId,
    #[serde(default)]
    pub level_code: Option<String>,
    /// Declared height in centimetres; only affects visual thickness
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_order: i32,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub is_active: bool,
}

impl Level {
    pub fn new(id: i64, rack_id: RackId, display_order: i32) -> Self {
        Self {
            id: LevelId(id),
            rack_id,
            level_code: None,
            height: None,
            display_order,
            is_active: true,
        }
    }

    pub fn height(&self) -> f32 {
        self.height.unwrap_or(DEFAULT_LEVEL_HEIGHT)
    }

    /// Human-readable name: level code, or its position in the rack
    pub fn label(&self) -> String {
        match self.level_code.as_deref() {
            Some(code) if !code.trim().is_empty() => code.to_string(),
            _ => format!("Level {}", self.display_order + 1),
        }
    }
}

/// A storage slot on a level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub level_id: LevelId,
    #[serde(default)]
    pub slot_code: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_order: i32,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub is_active: bool,
    /// Occupancy status reported by the backend ("free", "occupied", ...)
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl Slot {
    pub fn new(id: i64, level_id: LevelId, display_order: i32) -> Self {
        Self {
            id: SlotId(id),
            level_id,
            slot_code: None,
            display_order,
            is_active: true,
            status: None,
            capacity: None,
        }
    }

    pub fn label(&self) -> String {
        match self.slot_code.as_deref() {
            Some(code) if !code.trim().is_empty() => code.to_string(),
            _ => format!("Slot {}", self.display_order + 1),
        }
    }
}

/// Records rendered in backend display order and hidden when inactive
pub trait Ordered {
    fn display_order(&self) -> i32;
    fn is_active(&self) -> bool;
}

impl Ordered for Level {
    fn display_order(&self) -> i32 {
        self.display_order
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Ordered for Slot {
    fn display_order(&self) -> i32 {
        self.display_order
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Drop inactive records and sort the rest by display order.
///
/// The sort is stable so records sharing a display order keep arrival order.
pub fn visible_in_display_order<T: Ordered>(records: Vec<T>) -> Vec<T> {
    let mut visible: Vec<T> = records.into_iter().filter(|r| r.is_active()).collect();
    visible.sort_by_key(|r| r.display_order());
    visible
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rack_from_backend_row_with_nulls() {
        let json = r##"{
            "id": 1,
            "rack_code": "A1",
            "display_name": null,
            "width": null,
            "depth": 2,
            "position_x": 100,
            "position_y": 50,
            "rotation": 90,
            "color": "#ff0000",
            "created_at": "2024-03-01T08:30:00+00:00"
        }"##;
        let rack: Rack = serde_json::from_str(json).unwrap();
        assert_eq!(rack.id, RackId(1));
        assert_eq!(rack.width(), DEFAULT_RACK_WIDTH);
        assert_eq!(rack.depth(), 2.0);
        assert_eq!(rack.position(), (100.0, 50.0));
        assert_eq!(rack.rotation_degrees(), 90.0);
        assert!(rack.created_at.is_some());
    }

    #[test]
    fn test_rack_label_fallback() {
        let mut rack = Rack::new(1, "A1");
        assert_eq!(rack.label(), "A1");

        rack.display_name = Some("   ".to_string());
        assert_eq!(rack.label(), "A1");

        rack.display_name = Some("Allée A".to_string());
        assert_eq!(rack.label(), "Allée A");
    }

    #[test]
    fn test_level_defaults() {
        let level: Level = serde_json::from_str(r#"{"id": 7, "rack_id": 1}"#).unwrap();
        assert!(level.is_active);
        assert_eq!(level.display_order, 0);
        assert_eq!(level.height(), DEFAULT_LEVEL_HEIGHT);
        assert_eq!(level.label(), "Level 1");
    }

    #[test]
    fn test_null_columns_use_defaults() {
        let levels: Vec<Level> = serde_json::from_str(
            r#"[
                {"id": 1, "rack_id": 1, "display_order": null, "is_active": null, "height": null},
                {"id": 2, "rack_id": 1, "display_order": 1, "is_active": false}
            ]"#,
        )
        .unwrap();
        assert_eq!(levels[0].display_order, 0);
        assert!(levels[0].is_active);
        assert!(!levels[1].is_active);

        let slot: Slot =
            serde_json::from_str(r#"{"id": 3, "level_id": 1, "display_order": null, "is_active": null}"#).unwrap();
        assert_eq!(slot.display_order, 0);
        assert!(slot.is_active);
    }

    #[test]
    fn test_null_rack_code_falls_back_to_display_name() {
        let rack: Rack =
            serde_json::from_str(r#"{"id": 4, "rack_code": null, "display_name": "Dock"}"#).unwrap();
        assert_eq!(rack.rack_code, "");
        assert_eq!(rack.label(), "Dock");
    }

    #[test]
    fn test_visible_in_display_order() {
        let rack = RackId(1);
        let mut hidden = Level::new(3, rack, 0);
        hidden.is_active = false;
        let levels = vec![
            Level::new(1, rack, 2),
            hidden,
            Level::new(2, rack, 1),
            Level::new(4, rack, 1),
        ];

        let visible = visible_in_display_order(levels);
        let ids: Vec<i64> = visible.iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![2, 4, 1]);
    }
}
