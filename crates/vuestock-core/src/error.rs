//! Error types shared across the viewer and backend

use thiserror::Error;

/// Failures the warehouse viewer can run into.
///
/// None of these are shown to the end user as a blocking dialog: each one is
/// logged and the viewer stays in its current view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewerError {
    /// Network or query failure while fetching spatial records
    #[error("backend query failed: {0}")]
    BackendQuery(String),
    /// The host page has no element to render into
    #[error("render container not found: #{0}")]
    MissingContainer(String),
    /// Open/close was called before the modal markup exists
    #[error("warehouse modal not found: #{0}")]
    MissingModal(String),
}

/// Errors produced while parsing or evaluating a table query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("malformed query parameter: {0}")]
    Malformed(String),
    #[error("unsupported filter operator: {0}")]
    UnsupportedOperator(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
}
