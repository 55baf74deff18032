//! View state machine
//!
//! [`WarehouseViewerSession`] owns everything the viewer knows about the
//! current session: view mode, selection, attached objects per tier and the
//! camera rig. Transitions never touch the ECS world directly. They queue
//! [`SceneOp`]s which the scene systems apply once per frame, in order.

use bevy::prelude::*;
use vuestock_core::{Level, LevelId, Rack, RackId, Slot, SlotId};

use crate::builder::{
    build_level_object, build_rack_object, build_slot_object, ObjectKind, SceneObject,
    SourceRecord,
};
use crate::camera::{CameraPose, CameraRig};
use crate::fetcher::{FetchOutcome, FetchRequest, FetchedRecords};

/// Which part of the hierarchy the viewer is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Overview,
    Rack,
    Level,
    Slot,
}

/// Current selection, at most one per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub rack: Option<RackId>,
    pub level: Option<LevelId>,
    pub slot: Option<SlotId>,
}

/// Content pushed to the host's info panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoPanel {
    pub title: String,
    pub html_content: String,
}

/// Side effect requested by a transition
#[derive(Debug, Clone)]
pub enum SceneOp {
    /// Spawn an object, replacing any object with the same key
    Attach(SceneObject),
    /// Despawn every object of a tier and free its assets
    Detach(ObjectKind),
    ShowInfoPanel(InfoPanel),
    HideInfoPanel,
    SetLoading(bool),
    Fetch(FetchRequest),
}

/// Objects currently in the scene, by tier
#[derive(Debug, Clone, Default)]
pub struct AttachedObjects {
    pub racks: Vec<SceneObject>,
    pub levels: Vec<SceneObject>,
    pub slots: Vec<SceneObject>,
}

impl AttachedObjects {
    pub fn tier(&self, kind: ObjectKind) -> &[SceneObject] {
        match kind {
            ObjectKind::Rack => &self.racks,
            ObjectKind::Level => &self.levels,
            ObjectKind::Slot => &self.slots,
        }
    }

    fn tier_mut(&mut self, kind: ObjectKind) -> &mut Vec<SceneObject> {
        match kind {
            ObjectKind::Rack => &mut self.racks,
            ObjectKind::Level => &mut self.levels,
            ObjectKind::Slot => &mut self.slots,
        }
    }

    /// Add an object. An object with the same key is replaced in place.
    pub fn attach(&mut self, object: SceneObject) {
        let key = object.key();
        let tier = self.tier_mut(object.kind());
        match tier.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => *existing = object,
            None => tier.push(object),
        }
    }

    pub fn clear(&mut self, kind: ObjectKind) {
        self.tier_mut(kind).clear();
    }

    pub fn is_empty(&self) -> bool {
        self.racks.is_empty() && self.levels.is_empty() && self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.racks.len() + self.levels.len() + self.slots.len()
    }
}

/// State of one viewer session
#[derive(Resource, Default)]
pub struct WarehouseViewerSession {
    active: bool,
    mode: ViewMode,
    selection: Selection,
    in_flight: Option<FetchRequest>,
    racks_requested: bool,
    objects: AttachedObjects,
    pub camera: CameraRig,
    ops: Vec<SceneOp>,
}

impl WarehouseViewerSession {
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn objects(&self) -> &AttachedObjects {
        &self.objects
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// A fetch is in flight; picks are ignored until it completes
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<FetchRequest> {
        self.in_flight
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Take queued operations, oldest first
    pub fn take_ops(&mut self) -> Vec<SceneOp> {
        std::mem::take(&mut self.ops)
    }

    /// Objects that can be picked in the current mode
    pub fn pickable_objects(&self) -> &[SceneObject] {
        match self.mode {
            ViewMode::Overview => &self.objects.racks,
            ViewMode::Rack => &self.objects.levels,
            ViewMode::Level => &self.objects.slots,
            ViewMode::Slot => &[],
        }
    }

    /// Request the rack list. Racks stay loaded for the rest of the session.
    pub fn load_racks(&mut self) {
        self.racks_requested = true;
        self.begin_fetch(FetchRequest::Racks);
    }

    /// Request racks unless this session already did, e.g. after a reset
    pub fn ensure_racks_loaded(&mut self) -> bool {
        if self.racks_requested {
            return false;
        }
        self.load_racks();
        true
    }

    fn begin_fetch(&mut self, request: FetchRequest) {
        if let Some(previous) = self.in_flight.replace(request) {
            tracing::debug!(?previous, ?request, "Superseding in-flight fetch");
        }
        self.ops.push(SceneOp::SetLoading(true));
        self.ops.push(SceneOp::Fetch(request));
    }

    fn cancel_fetch(&mut self) {
        if let Some(request) = self.in_flight.take() {
            tracing::debug!(?request, "Cancelled in-flight fetch");
            self.ops.push(SceneOp::SetLoading(false));
        }
    }

    fn detach(&mut self, kind: ObjectKind) {
        self.objects.clear(kind);
        self.ops.push(SceneOp::Detach(kind));
    }

    fn attach(&mut self, object: SceneObject) {
        self.objects.attach(object.clone());
        self.ops.push(SceneOp::Attach(object));
    }

    /// Apply a completed fetch.
    ///
    /// Completions that do not match the in-flight request are dropped. On
    /// error the loading indicator is cleared and the scene keeps whatever it
    /// already shows.
    pub fn complete_fetch(&mut self, outcome: FetchOutcome) {
        if self.in_flight != Some(outcome.request) {
            tracing::debug!(request = ?outcome.request, "Discarding stale fetch result");
            return;
        }
        self.in_flight = None;
        self.ops.push(SceneOp::SetLoading(false));

        let records = match outcome.result {
            Ok(records) => records.normalized(),
            Err(e) => {
                tracing::error!(request = ?outcome.request, "Fetch failed: {}", e);
                return;
            }
        };

        match records {
            FetchedRecords::Racks(racks) => {
                self.detach(ObjectKind::Rack);
                for rack in &racks {
                    self.attach(build_rack_object(rack));
                }
                tracing::info!(count = racks.len(), "Racks loaded");
            }
            FetchedRecords::Levels(levels) => {
                let racks = self.objects.racks.clone();
                for (index, level) in levels.iter().enumerate() {
                    if let Some(object) = build_level_object(level, index, &racks) {
                        self.attach(object);
                    }
                }
                if let Some(rack) = self.selected_rack() {
                    let panel = rack_panel(&rack, self.objects.levels.len());
                    self.ops.push(SceneOp::ShowInfoPanel(panel));
                }
            }
            FetchedRecords::Slots(slots) => {
                let levels = self.objects.levels.clone();
                for (index, slot) in slots.iter().enumerate() {
                    if let Some(object) = build_slot_object(slot, index, slots.len(), &levels) {
                        self.attach(object);
                    }
                }
                if let Some(level) = self.selected_level() {
                    let panel = level_panel(&level, self.objects.slots.len());
                    self.ops.push(SceneOp::ShowInfoPanel(panel));
                }
            }
        }
    }

    /// Drill into a picked record. Returns whether a transition happened.
    pub fn select(&mut self, source: &SourceRecord) -> bool {
        if self.is_busy() {
            tracing::debug!("Ignoring pick while loading");
            return false;
        }
        match (self.mode, source) {
            (ViewMode::Overview, SourceRecord::Rack(rack)) => self.enter_rack(rack),
            (ViewMode::Rack, SourceRecord::Level(level)) => self.enter_level(level),
            (ViewMode::Level, SourceRecord::Slot(slot)) => self.enter_slot(slot),
            (mode, source) => {
                tracing::debug!(?mode, kind = ?source.kind(), "Pick does not apply to this view");
                return false;
            }
        }
        true
    }

    /// `overview -> rack`
    pub fn enter_rack(&mut self, rack: &Rack) {
        self.detach(ObjectKind::Level);
        self.detach(ObjectKind::Slot);
        self.ops.push(SceneOp::HideInfoPanel);

        self.mode = ViewMode::Rack;
        self.selection = Selection {
            rack: Some(rack.id),
            ..Default::default()
        };
        let position = self
            .find_rack_object(rack.id)
            .map(|object| object.transform.translation)
            .unwrap_or_else(|| build_rack_object(rack).transform.translation);
        self.camera.frame(CameraPose::framing_rack(position));

        tracing::info!(rack = %rack.id, code = %rack.rack_code, "Entering rack");
        self.begin_fetch(FetchRequest::Levels(rack.id));
    }

    /// `rack -> level`
    pub fn enter_level(&mut self, level: &Level) {
        self.detach(ObjectKind::Slot);
        self.ops.push(SceneOp::HideInfoPanel);

        self.mode = ViewMode::Level;
        self.selection.level = Some(level.id);
        self.selection.slot = None;
        if let Some(center) = self.find_level_object(level.id).map(SceneObject::center) {
            self.camera.frame(CameraPose::framing_level(center));
        }

        tracing::info!(level = %level.id, "Entering level");
        self.begin_fetch(FetchRequest::Slots(level.id));
    }

    /// `level -> slot`. Slots are the leaves, nothing is fetched.
    pub fn enter_slot(&mut self, slot: &Slot) {
        self.ops.push(SceneOp::HideInfoPanel);

        self.mode = ViewMode::Slot;
        self.selection.slot = Some(slot.id);
        if let Some(center) = self.find_slot_object(slot.id).map(SceneObject::center) {
            self.camera.frame(CameraPose::framing_slot(center));
        }

        tracing::info!(slot = %slot.id, "Entering slot");
        self.ops.push(SceneOp::ShowInfoPanel(slot_panel(slot)));
    }

    /// Go up one tier. A no-op in overview.
    pub fn ascend(&mut self) -> bool {
        match self.mode {
            ViewMode::Overview => return false,
            ViewMode::Rack => return self.exit_to_overview(),
            ViewMode::Level => {
                self.cancel_fetch();
                self.detach(ObjectKind::Slot);
                self.mode = ViewMode::Rack;
                self.selection.level = None;
                self.selection.slot = None;
                if let Some(rack) = self.selected_rack() {
                    let position = self
                        .find_rack_object(rack.id)
                        .map(|object| object.transform.translation)
                        .unwrap_or_default();
                    self.camera.frame(CameraPose::framing_rack(position));
                    let panel = rack_panel(&rack, self.objects.levels.len());
                    self.ops.push(SceneOp::ShowInfoPanel(panel));
                }
            }
            ViewMode::Slot => {
                self.cancel_fetch();
                self.mode = ViewMode::Level;
                self.selection.slot = None;
                if let Some(level) = self.selected_level() {
                    if let Some(center) = self.find_level_object(level.id).map(SceneObject::center) {
                        self.camera.frame(CameraPose::framing_level(center));
                    }
                    let panel = level_panel(&level, self.objects.slots.len());
                    self.ops.push(SceneOp::ShowInfoPanel(panel));
                }
            }
        }
        tracing::debug!(mode = ?self.mode, "Ascended");
        true
    }

    /// Back to overview from anywhere. Racks are kept, not re-fetched.
    pub fn exit_to_overview(&mut self) -> bool {
        if self.mode == ViewMode::Overview {
            return false;
        }
        self.cancel_fetch();
        self.detach(ObjectKind::Level);
        self.detach(ObjectKind::Slot);
        self.ops.push(SceneOp::HideInfoPanel);

        self.mode = ViewMode::Overview;
        self.selection = Selection::default();
        self.camera.frame(CameraPose::overview());
        tracing::debug!("Back to overview");
        true
    }

    /// Drop all scene content and start a fresh session.
    ///
    /// Only the detach/hide operations needed to dispose what was in the
    /// scene survive the reset.
    pub fn reset(&mut self) {
        let mut ops = Vec::new();
        for kind in [ObjectKind::Rack, ObjectKind::Level, ObjectKind::Slot] {
            ops.push(SceneOp::Detach(kind));
        }
        ops.push(SceneOp::HideInfoPanel);
        if self.in_flight.is_some() {
            ops.push(SceneOp::SetLoading(false));
        }

        *self = Self::default();
        self.ops = ops;
    }

    fn find_rack_object(&self, id: RackId) -> Option<&SceneObject> {
        self.objects
            .racks
            .iter()
            .find(|object| matches!(&object.source, SourceRecord::Rack(rack) if rack.id == id))
    }

    fn find_level_object(&self, id: LevelId) -> Option<&SceneObject> {
        self.objects
            .levels
            .iter()
            .find(|object| matches!(&object.source, SourceRecord::Level(level) if level.id == id))
    }

    fn find_slot_object(&self, id: SlotId) -> Option<&SceneObject> {
        self.objects
            .slots
            .iter()
            .find(|object| matches!(&object.source, SourceRecord::Slot(slot) if slot.id == id))
    }

    fn selected_rack(&self) -> Option<Rack> {
        let id = self.selection.rack?;
        match &self.find_rack_object(id)?.source {
            SourceRecord::Rack(rack) => Some(rack.clone()),
            _ => None,
        }
    }

    fn selected_level(&self) -> Option<Level> {
        let id = self.selection.level?;
        match &self.find_level_object(id)?.source {
            SourceRecord::Level(level) => Some(level.clone()),
            _ => None,
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn panel_row(label: &str, value: &str) -> String {
    format!("<p><strong>{}:</strong> {}</p>", label, escape_html(value))
}

fn rack_panel(rack: &Rack, level_count: usize) -> InfoPanel {
    let (x, y) = rack.position();
    InfoPanel {
        title: format!("Rack {}", rack.label()),
        html_content: [
            panel_row("Code", &rack.rack_code),
            panel_row("Levels", &level_count.to_string()),
            panel_row("Position", &format!("({}, {})", x, y)),
        ]
        .concat(),
    }
}

fn level_panel(level: &Level, slot_count: usize) -> InfoPanel {
    InfoPanel {
        title: level.label(),
        html_content: [
            panel_row("Slots", &slot_count.to_string()),
            panel_row("Height", &format!("{} cm", level.height())),
        ]
        .concat(),
    }
}

fn slot_panel(slot: &Slot) -> InfoPanel {
    let mut rows = vec![panel_row(
        "Status",
        slot.status.as_deref().unwrap_or("unknown"),
    )];
    if let Some(capacity) = slot.capacity {
        rows.push(panel_row("Capacity", &capacity.to_string()));
    }
    InfoPanel {
        title: slot.label(),
        html_content: rows.concat(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vuestock_core::ViewerError;

    fn rack_a1() -> Rack {
        let mut rack = Rack::new(1, "A1");
        rack.position_x = Some(100.0);
        rack.position_y = Some(50.0);
        rack.rotation = Some(90.0);
        rack
    }

    fn a1_levels() -> Vec<Level> {
        let mut hidden = Level::new(12, RackId(1), 2);
        hidden.is_active = false;
        vec![Level::new(10, RackId(1), 0), Level::new(11, RackId(1), 1), hidden]
    }

    fn ok(request: FetchRequest, records: FetchedRecords) -> FetchOutcome {
        FetchOutcome {
            request,
            result: Ok(records),
        }
    }

    /// Session in overview with rack A1 loaded
    fn loaded_session() -> WarehouseViewerSession {
        let mut session = WarehouseViewerSession::default();
        session.activate();
        session.load_racks();
        session.complete_fetch(ok(
            FetchRequest::Racks,
            FetchedRecords::Racks(vec![rack_a1(), Rack::new(2, "A2")]),
        ));
        session.take_ops();
        session
    }

    /// Session in rack A1 with its levels attached
    fn in_rack() -> WarehouseViewerSession {
        let mut session = loaded_session();
        assert!(session.select(&SourceRecord::Rack(rack_a1())));
        session.complete_fetch(ok(
            FetchRequest::Levels(RackId(1)),
            FetchedRecords::Levels(a1_levels()),
        ));
        session.take_ops();
        session
    }

    fn in_level() -> WarehouseViewerSession {
        let mut session = in_rack();
        assert!(session.select(&SourceRecord::Level(Level::new(10, RackId(1), 0))));
        session.complete_fetch(ok(
            FetchRequest::Slots(LevelId(10)),
            FetchedRecords::Slots(vec![Slot::new(1, LevelId(10), 0), Slot::new(2, LevelId(10), 1)]),
        ));
        session.take_ops();
        session
    }

    #[test]
    fn test_load_racks() {
        let mut session = WarehouseViewerSession::default();
        session.load_racks();
        assert!(session.is_busy());
        let ops = session.take_ops();
        assert!(matches!(ops[0], SceneOp::SetLoading(true)));
        assert!(matches!(ops[1], SceneOp::Fetch(FetchRequest::Racks)));

        session.complete_fetch(ok(FetchRequest::Racks, FetchedRecords::Racks(vec![rack_a1()])));
        assert!(!session.is_busy());
        assert_eq!(session.objects().racks.len(), 1);
        let ops = session.take_ops();
        assert!(matches!(ops[0], SceneOp::SetLoading(false)));
        assert!(ops.iter().any(|op| matches!(op, SceneOp::Attach(_))));
    }

    #[test]
    fn test_pick_rack_from_overview() {
        let mut session = loaded_session();
        assert!(session.select(&SourceRecord::Rack(rack_a1())));

        assert_eq!(session.mode(), ViewMode::Rack);
        assert_eq!(
            session.selection(),
            Selection {
                rack: Some(RackId(1)),
                level: None,
                slot: None
            }
        );
        assert_eq!(session.camera.goal, CameraPose::framing_rack(Vec3::new(2.0, 0.0, 1.0)));

        let ops = session.take_ops();
        assert!(matches!(ops[0], SceneOp::Detach(ObjectKind::Level)));
        assert!(matches!(ops[1], SceneOp::Detach(ObjectKind::Slot)));
        assert!(matches!(ops[2], SceneOp::HideInfoPanel));
        assert!(matches!(ops[3], SceneOp::SetLoading(true)));
        assert!(matches!(ops[4], SceneOp::Fetch(FetchRequest::Levels(RackId(1)))));
    }

    #[test]
    fn test_levels_attach_and_panel() {
        let mut session = loaded_session();
        session.select(&SourceRecord::Rack(rack_a1()));
        session.take_ops();
        session.complete_fetch(ok(
            FetchRequest::Levels(RackId(1)),
            FetchedRecords::Levels(a1_levels()),
        ));

        let heights: Vec<f32> = session
            .objects()
            .levels
            .iter()
            .map(|object| object.transform.translation.y)
            .collect();
        assert_eq!(heights, vec![1.0, 3.0]);

        let ops = session.take_ops();
        let panel = ops
            .iter()
            .find_map(|op| match op {
                SceneOp::ShowInfoPanel(panel) => Some(panel.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(panel.title, "Rack A1");
        assert!(panel.html_content.contains("<strong>Levels:</strong> 2"));
        assert!(panel.html_content.contains("(100, 50)"));
    }

    #[test]
    fn test_picks_ignored_while_loading() {
        let mut session = loaded_session();
        session.select(&SourceRecord::Rack(rack_a1()));
        assert!(session.is_busy());
        assert!(!session.select(&SourceRecord::Rack(Rack::new(2, "A2"))));
        assert_eq!(session.selection().rack, Some(RackId(1)));
    }

    #[test]
    fn test_pick_of_wrong_tier_is_ignored() {
        let mut session = loaded_session();
        assert!(!session.select(&SourceRecord::Level(Level::new(10, RackId(1), 0))));
        assert_eq!(session.mode(), ViewMode::Overview);
        assert!(session.take_ops().is_empty());
    }

    #[test]
    fn test_ascend_from_level_keeps_levels() {
        let mut session = in_level();
        assert_eq!(session.objects().slots.len(), 2);

        assert!(session.ascend());
        assert_eq!(session.mode(), ViewMode::Rack);
        assert_eq!(session.selection().level, None);
        assert_eq!(session.selection().rack, Some(RackId(1)));
        assert!(session.objects().slots.is_empty());
        assert_eq!(session.objects().levels.len(), 2);
        assert_eq!(session.objects().racks.len(), 2);

        let ops = session.take_ops();
        assert!(ops.iter().any(|op| matches!(op, SceneOp::Detach(ObjectKind::Slot))));
        assert!(!ops.iter().any(|op| matches!(op, SceneOp::Detach(ObjectKind::Level))));
    }

    #[test]
    fn test_slot_is_terminal() {
        let mut session = in_level();
        assert!(session.select(&SourceRecord::Slot(Slot::new(2, LevelId(10), 1))));
        assert_eq!(session.mode(), ViewMode::Slot);
        assert!(!session.is_busy());
        assert!(session.pickable_objects().is_empty());

        let ops = session.take_ops();
        assert!(!ops.iter().any(|op| matches!(op, SceneOp::Fetch(_))));
        assert!(ops.iter().any(|op| matches!(op, SceneOp::ShowInfoPanel(p) if p.title == "Slot 2")));

        assert!(session.ascend());
        assert_eq!(session.mode(), ViewMode::Level);
        assert_eq!(session.objects().slots.len(), 2);
    }

    #[test]
    fn test_ascend_in_overview_is_noop() {
        let mut session = loaded_session();
        assert!(!session.ascend());
        assert!(!session.exit_to_overview());
        assert!(session.take_ops().is_empty());
    }

    #[test]
    fn test_exit_to_overview_keeps_racks() {
        let mut session = in_level();
        assert!(session.exit_to_overview());
        assert_eq!(session.mode(), ViewMode::Overview);
        assert_eq!(session.selection(), Selection::default());
        assert_eq!(session.objects().racks.len(), 2);
        assert!(session.objects().levels.is_empty());
        assert!(session.objects().slots.is_empty());
        assert_eq!(session.camera.goal, CameraPose::overview());
        assert!(!session
            .take_ops()
            .iter()
            .any(|op| matches!(op, SceneOp::Fetch(_))));
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut session = loaded_session();
        session.select(&SourceRecord::Rack(rack_a1()));
        // Leaving cancels the levels fetch
        assert!(session.ascend());
        assert!(!session.is_busy());
        session.take_ops();

        session.complete_fetch(ok(
            FetchRequest::Levels(RackId(1)),
            FetchedRecords::Levels(a1_levels()),
        ));
        assert!(session.objects().levels.is_empty());
        assert!(session.take_ops().is_empty());
    }

    #[test]
    fn test_fetch_error_clears_loading_only() {
        let mut session = loaded_session();
        session.select(&SourceRecord::Rack(rack_a1()));
        session.take_ops();

        session.complete_fetch(FetchOutcome {
            request: FetchRequest::Levels(RackId(1)),
            result: Err(ViewerError::BackendQuery("timeout".to_string())),
        });
        assert!(!session.is_busy());
        assert_eq!(session.mode(), ViewMode::Rack);
        assert_eq!(session.objects().racks.len(), 2);
        let ops = session.take_ops();
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], SceneOp::SetLoading(false)));
    }

    #[test]
    fn test_attach_is_idempotent_per_key() {
        let mut objects = AttachedObjects::default();
        objects.attach(build_rack_object(&rack_a1()));
        let mut moved = rack_a1();
        moved.position_x = Some(0.0);
        objects.attach(build_rack_object(&moved));
        assert_eq!(objects.racks.len(), 1);
        assert_eq!(objects.racks[0].transform.translation.x, 0.0);
    }

    #[test]
    fn test_reset_empties_everything() {
        let mut session = in_level();
        session.select(&SourceRecord::Slot(Slot::new(1, LevelId(10), 0)));
        session.reset();

        assert!(session.objects().is_empty());
        assert_eq!(session.mode(), ViewMode::Overview);
        assert_eq!(session.selection(), Selection::default());
        assert!(!session.is_active());
        let ops = session.take_ops();
        assert_eq!(
            ops.iter()
                .filter(|op| matches!(op, SceneOp::Detach(_)))
                .count(),
            3
        );
    }

    #[test]
    fn test_reset_session_reloads_racks_once() {
        let mut session = loaded_session();
        assert!(!session.ensure_racks_loaded());
        assert!(session.take_ops().is_empty());

        session.reset();
        session.take_ops();
        assert!(session.ensure_racks_loaded());
        assert!(session.is_busy());
        assert!(!session.ensure_racks_loaded());
    }

    #[test]
    fn test_panel_html_is_escaped() {
        let mut rack = Rack::new(3, "<b>C1</b>");
        rack.display_name = Some("C&1".to_string());
        let panel = rack_panel(&rack, 0);
        assert!(panel.html_content.contains("&lt;b&gt;C1&lt;/b&gt;"));
        assert_eq!(panel.title, "Rack C&1");
    }
}
