//! Spatial record fetching
//!
//! Backend access is injected through [`SpatialDataSource`]. Requests complete
//! asynchronously and drop their outcome into [`PendingFetches`], which the
//! scene drains once per frame on the main thread.

use bevy::prelude::*;
use std::sync::{Arc, Mutex};
use vuestock_core::{
    visible_in_display_order, Level, LevelId, Rack, RackId, Slot, ViewerError,
};

/// What the viewer asked the backend for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRequest {
    Racks,
    Levels(RackId),
    Slots(LevelId),
}

/// Records returned for a [`FetchRequest`]
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedRecords {
    Racks(Vec<Rack>),
    Levels(Vec<Level>),
    Slots(Vec<Slot>),
}

impl FetchedRecords {
    /// Hide inactive levels/slots and put them in display order
    pub fn normalized(self) -> Self {
        match self {
            FetchedRecords::Racks(racks) => FetchedRecords::Racks(racks),
            FetchedRecords::Levels(levels) => FetchedRecords::Levels(visible_in_display_order(levels)),
            FetchedRecords::Slots(slots) => FetchedRecords::Slots(visible_in_display_order(slots)),
        }
    }
}

/// Result of one completed request
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub request: FetchRequest,
    pub result: Result<FetchedRecords, ViewerError>,
}

/// Completed fetches waiting to be applied to the scene
#[derive(Resource, Clone, Default)]
pub struct PendingFetches(pub Arc<Mutex<Vec<FetchOutcome>>>);

impl PendingFetches {
    pub fn push(&self, outcome: FetchOutcome) {
        if let Ok(mut queue) = self.0.lock() {
            queue.push(outcome);
        }
    }

    pub fn drain(&self) -> Vec<FetchOutcome> {
        match self.0.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(_) => Vec::new(),
        }
    }
}

/// Backend access used by the viewer.
///
/// Implementations must never block: they start the request and push a
/// [`FetchOutcome`] into `sink` once it resolves.
pub trait SpatialDataSource: Send + Sync + 'static {
    fn fetch_racks(&self, sink: PendingFetches);

    fn fetch_levels(&self, rack_id: RackId, sink: PendingFetches);

    fn fetch_slots(&self, level_id: LevelId, sink: PendingFetches);

    fn fetch(&self, request: FetchRequest, sink: PendingFetches) {
        match request {
            FetchRequest::Racks => self.fetch_racks(sink),
            FetchRequest::Levels(rack_id) => self.fetch_levels(rack_id, sink),
            FetchRequest::Slots(level_id) => self.fetch_slots(level_id, sink),
        }
    }
}

/// The data source the scene dispatches fetches to
#[derive(Resource, Clone)]
pub struct DataSource(pub Arc<dyn SpatialDataSource>);

/// In-memory data source that answers every request immediately.
///
/// Applies the same filtering and ordering as the backend queries. Used for
/// the offline demo and as a test double.
#[derive(Default)]
pub struct StaticDataSource {
    pub racks: Vec<Rack>,
    pub levels: Vec<Level>,
    pub slots: Vec<Slot>,
    failure: Mutex<Option<ViewerError>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl StaticDataSource {
    pub fn new(racks: Vec<Rack>, levels: Vec<Level>, slots: Vec<Slot>) -> Self {
        Self {
            racks,
            levels,
            slots,
            ..Default::default()
        }
    }

    /// Make every following request fail with `error`
    pub fn fail_with(&self, error: ViewerError) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error);
        }
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// A small warehouse for the offline demo
    pub fn demo() -> Self {
        let mut racks = Vec::new();
        let mut levels = Vec::new();
        let mut slots = Vec::new();
        let mut next_level = 1;
        let mut next_slot = 1;

        for (i, (code, x, y, rotation)) in [
            ("A1", -200.0, -100.0, 0.0),
            ("A2", 0.0, -100.0, 0.0),
            ("B1", -200.0, 150.0, 90.0),
            ("B2", 150.0, 150.0, 45.0),
        ]
        .into_iter()
        .enumerate()
        {
            let mut rack = Rack::new(i as i64 + 1, code);
            rack.position_x = Some(x);
            rack.position_y = Some(y);
            rack.rotation = Some(rotation);
            rack.width = Some(3.0);
            rack.depth = Some(1.0);
            racks.push(rack.clone());

            for order in 0..3 {
                let mut level = Level::new(next_level, rack.id, order);
                level.level_code = Some(format!("{}-{}", code, order + 1));
                level.height = Some(30.0 + 10.0 * order as f32);
                for slot_order in 0..4 {
                    let mut slot = Slot::new(next_slot, level.id, slot_order);
                    slot.slot_code = Some(format!("{}-{}-{}", code, order + 1, slot_order + 1));
                    slot.status = Some(if (next_slot % 3) == 0 { "occupied" } else { "free" }.to_string());
                    slots.push(slot);
                    next_slot += 1;
                }
                levels.push(level);
                next_level += 1;
            }
        }

        Self::new(racks, levels, slots)
    }

    fn answer(&self, request: FetchRequest, records: FetchedRecords, sink: PendingFetches) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let failure = self.failure.lock().ok().and_then(|f| f.clone());
        let result = match failure {
            Some(error) => Err(error),
            None => Ok(records),
        };
        sink.push(FetchOutcome { request, result });
    }
}

impl SpatialDataSource for StaticDataSource {
    fn fetch_racks(&self, sink: PendingFetches) {
        self.answer(FetchRequest::Racks, FetchedRecords::Racks(self.racks.clone()), sink);
    }

    fn fetch_levels(&self, rack_id: RackId, sink: PendingFetches) {
        let levels: Vec<Level> = self
            .levels
            .iter()
            .filter(|l| l.rack_id == rack_id)
            .cloned()
            .collect();
        self.answer(
            FetchRequest::Levels(rack_id),
            FetchedRecords::Levels(visible_in_display_order(levels)),
            sink,
        );
    }

    fn fetch_slots(&self, level_id: LevelId, sink: PendingFetches) {
        let slots: Vec<Slot> = self
            .slots
            .iter()
            .filter(|s| s.level_id == level_id)
            .cloned()
            .collect();
        self.answer(
            FetchRequest::Slots(level_id),
            FetchedRecords::Slots(visible_in_display_order(slots)),
            sink,
        );
    }
}
