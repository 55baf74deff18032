//! VueStock Web - 3D warehouse viewer for the browser
//!
//! Exposes `openWarehouseModal`, `closeWarehouseModal` and
//! `teardownWarehouse` to the host page.

mod app;
mod host;
mod network;

use wasm_bindgen::prelude::*;

pub use network::{BackendConfig, RestDataSource};

/// Entry point for WASM module
#[wasm_bindgen(start)]
pub fn main() {
    // Set panic hook for better error messages
    console_error_panic_hook::set_once();

    let config = BackendConfig::from_browser();

    // Keep wgpu noise out of the console unless debugging
    let max_level = if config.debug {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(max_level)
            .build(),
    );

    let ids = host::DomIds::default();
    host::bind_controls(&ids);
    app::install(config, ids);
}

/// Show the viewer, creating the 3D scene on first use. Resolves to `false`
/// if the page is missing the modal or container.
#[wasm_bindgen(js_name = openWarehouseModal)]
pub async fn open_warehouse_modal() -> bool {
    match app::open() {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Cannot open warehouse viewer: {}", e);
            false
        }
    }
}

/// Hide the viewer; the scene is kept for the next open
#[wasm_bindgen(js_name = closeWarehouseModal)]
pub fn close_warehouse_modal() {
    app::close();
}

/// Dispose the scene and everything it holds
#[wasm_bindgen(js_name = teardownWarehouse)]
pub fn teardown_warehouse() {
    app::teardown();
}
