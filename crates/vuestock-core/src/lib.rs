//! VueStock Core - Warehouse records and backend query model
//!
//! This crate provides the foundational types shared by the viewer and the
//! development backend:
//! - Rack, level, and slot records as returned by the backend store
//! - The viewer error taxonomy
//! - A PostgREST-style table query model used both to build and to serve queries

pub mod error;
pub mod query;
pub mod records;

pub use error::{QueryError, ViewerError};
pub use query::{Filter, FilterOp, OrderBy, TableNames, TableQuery};
pub use records::{visible_in_display_order, Level, LevelId, Ordered, Rack, RackId, Slot, SlotId};
