//! DOM side of the viewer: modal, container, controls and info panel

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, Event, HtmlElement};

use vuestock_core::ViewerError;
use vuestock_scene::lifecycle::{HostPage, HostPanel, SurfaceSize};
use vuestock_scene::state::InfoPanel;

/// Element ids and host function names the viewer expects on the page
#[derive(Debug, Clone)]
pub struct DomIds {
    pub modal: String,
    pub container: String,
    pub canvas: String,
    pub loading: String,
    pub open_button: String,
    pub close_button: String,
    /// Global function called with `(title, htmlContent)`
    pub show_panel_fn: String,
    pub hide_panel_fn: String,
}

impl Default for DomIds {
    fn default() -> Self {
        Self {
            modal: "warehouse-modal".to_string(),
            container: "warehouse-container".to_string(),
            canvas: "warehouse-canvas".to_string(),
            loading: "warehouse-loading".to_string(),
            open_button: "warehouse-open".to_string(),
            close_button: "warehouse-close".to_string(),
            show_panel_fn: "showWarehouseInfo".to_string(),
            hide_panel_fn: "hideWarehouseInfo".to_string(),
        }
    }
}

fn element(id: &str) -> Option<Element> {
    web_sys::window()?.document()?.get_element_by_id(id)
}

fn set_display(id: &str, display: &str) {
    let Some(el) = element(id).and_then(|el| el.dyn_into::<HtmlElement>().ok()) else {
        tracing::debug!("Element #{} not found", id);
        return;
    };
    if let Err(e) = el.style().set_property("display", display) {
        tracing::warn!("Failed to set display on #{}: {:?}", id, e);
    }
}

fn host_function(name: &str) -> Option<js_sys::Function> {
    let window = web_sys::window()?;
    js_sys::Reflect::get(&window, &JsValue::from_str(name))
        .ok()?
        .dyn_into::<js_sys::Function>()
        .ok()
}

struct WindowListeners {
    resize: Closure<dyn FnMut(Event)>,
    unload: Closure<dyn FnMut(Event)>,
}

/// The host page as seen by the lifecycle manager
pub struct DomHost {
    ids: DomIds,
    listeners: Option<WindowListeners>,
}

impl DomHost {
    pub fn new(ids: DomIds) -> Self {
        Self {
            ids,
            listeners: None,
        }
    }
}

impl HostPage for DomHost {
    fn modal_ready(&self) -> Result<(), ViewerError> {
        element(&self.ids.modal)
            .map(|_| ())
            .ok_or_else(|| ViewerError::MissingModal(self.ids.modal.clone()))
    }

    fn container_size(&self) -> Result<SurfaceSize, ViewerError> {
        let container = element(&self.ids.container)
            .ok_or_else(|| ViewerError::MissingContainer(self.ids.container.clone()))?;
        Ok(SurfaceSize::new(
            container.client_width().max(0) as u32,
            container.client_height().max(0) as u32,
        ))
    }

    fn show_modal(&mut self) {
        set_display(&self.ids.modal, "flex");
    }

    fn hide_modal(&mut self) {
        set_display(&self.ids.modal, "none");
    }

    fn bind_listeners(&mut self) {
        if self.listeners.is_some() {
            return;
        }
        let Some(window) = web_sys::window() else {
            return;
        };

        let resize = Closure::<dyn FnMut(Event)>::new(|_: Event| crate::app::refresh_size());
        let unload = Closure::<dyn FnMut(Event)>::new(|_: Event| crate::app::teardown());
        for (event, closure) in [("resize", &resize), ("beforeunload", &unload)] {
            if let Err(e) = window.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref()) {
                tracing::warn!("Failed to bind {} listener: {:?}", event, e);
            }
        }
        self.listeners = Some(WindowListeners { resize, unload });
    }

    fn unbind_listeners(&mut self) {
        let Some(listeners) = self.listeners.take() else {
            return;
        };
        if let Some(window) = web_sys::window() {
            for (event, closure) in [("resize", &listeners.resize), ("beforeunload", &listeners.unload)] {
                let _ = window.remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
            }
        }
        // Unbinding can happen from inside the unload callback itself, so the
        // closures must outlive this call.
        listeners.resize.forget();
        listeners.unload.forget();
    }
}

/// Info panel and loading indicator provided by the page
pub struct DomPanel {
    ids: DomIds,
}

impl DomPanel {
    pub fn new(ids: DomIds) -> Self {
        Self { ids }
    }
}

impl HostPanel for DomPanel {
    fn show_info_panel(&self, panel: &InfoPanel) {
        let Some(show) = host_function(&self.ids.show_panel_fn) else {
            tracing::debug!("No {} function on the page", self.ids.show_panel_fn);
            return;
        };
        let result = show.call2(
            &JsValue::NULL,
            &JsValue::from_str(&panel.title),
            &JsValue::from_str(&panel.html_content),
        );
        if let Err(e) = result {
            tracing::warn!("Info panel callback failed: {:?}", e);
        }
    }

    fn hide_info_panel(&self) {
        if let Some(hide) = host_function(&self.ids.hide_panel_fn) {
            if let Err(e) = hide.call0(&JsValue::NULL) {
                tracing::warn!("Info panel callback failed: {:?}", e);
            }
        }
    }

    fn set_loading(&self, visible: bool) {
        set_display(&self.ids.loading, if visible { "block" } else { "none" });
    }
}

/// Wire the page's open/close buttons. Missing buttons are skipped.
pub fn bind_controls(ids: &DomIds) {
    let bindings: [(&str, fn()); 2] = [
        (ids.open_button.as_str(), || {
            wasm_bindgen_futures::spawn_local(async {
                crate::open_warehouse_modal().await;
            })
        }),
        (ids.close_button.as_str(), crate::close_warehouse_modal),
    ];

    for (id, action) in bindings {
        let Some(button) = element(id) else {
            tracing::debug!("Control #{} not on this page", id);
            continue;
        };
        let on_click = Closure::<dyn FnMut(Event)>::new(move |_: Event| action());
        if let Err(e) = button.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref()) {
            tracing::warn!("Failed to bind #{}: {:?}", id, e);
        }
        // Controls live as long as the page
        on_click.forget();
    }
}
