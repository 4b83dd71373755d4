/// Tab Organizer - Chrome Extension for sorting, grouping and searching tabs
/// Built with Rust + WASM + Yew

pub mod applier;
pub mod background;
pub mod bookmarks;
pub mod browser;
pub mod config;
pub mod domain;
pub mod error;
pub mod grouping;
pub mod messages;
pub mod navigation;
pub mod search;
pub mod session;
pub mod sorting;
pub mod tab_data;
pub mod timing;
pub mod ui;

#[cfg(test)]
mod testing;

use serde_json::Value;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use yew::platform::time::sleep;

use crate::background::{AUTO_GROUP_DELAY_MS, ScheduledSort, TabChange};
use crate::config::{ConfigChange, ExtensionConfig, InstallReason, is_valid_blob};
use crate::messages::Response;
use crate::tab_data::{RawTab, TabInfo};

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export core domain functions for JavaScript access
#[wasm_bindgen]
pub fn extract_domain(url: &str) -> String {
    domain::extract_domain(url)
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

// Background entry points, called by the listeners in bridge.js

#[wasm_bindgen]
pub async fn handle_message(message: JsValue) -> JsValue {
    let response = match browser::from_js::<Value>(message) {
        Ok(message) => background::instance().handle_message(message).await,
        Err(err) => Response::from_error(&err),
    };
    browser::to_js(&response).unwrap_or(JsValue::NULL)
}

#[wasm_bindgen]
pub async fn handle_command(command: String) {
    if let Some(response) = background::instance().handle_command(&command).await {
        if !response.success {
            log::warn!("Command {} failed: {:?}", command, response.error);
        }
    }
}

#[wasm_bindgen]
pub fn on_installed(reason: String) {
    spawn_local(async move {
        background::instance()
            .on_installed(InstallReason::parse(&reason))
            .await;
    });
}

#[wasm_bindgen]
pub fn on_tab_created(tab: JsValue) {
    let Some(tab) = decode_tab(tab) else {
        return;
    };
    spawn_local(async move {
        let background = background::instance();
        let plan = background.on_tab_created(&tab).await;
        if let Some(scheduled) = plan.auto_sort {
            spawn_auto_sort(scheduled);
        }
        if plan.auto_group {
            sleep(Duration::from_millis(AUTO_GROUP_DELAY_MS)).await;
            if let Err(err) = background.auto_group_tab(tab.id).await {
                err.log("Auto-group failed");
            }
        }
    });
}

#[wasm_bindgen]
pub fn on_tab_updated(change: JsValue, tab: JsValue) {
    let change: TabChange = match browser::from_js(change) {
        Ok(change) => change,
        Err(err) => {
            err.log("Undecodable tab change");
            return;
        }
    };
    let Some(tab) = decode_tab(tab) else {
        return;
    };
    spawn_local(async move {
        if let Some(scheduled) = background::instance().on_tab_updated(&change, &tab).await {
            spawn_auto_sort(scheduled);
        }
    });
}

#[wasm_bindgen]
pub fn on_tab_removed(_tab_id: i32) {
    spawn_local(async move {
        if let Some(scheduled) = background::instance().on_tab_removed().await {
            spawn_auto_sort(scheduled);
        }
    });
}

#[wasm_bindgen]
pub fn on_config_changed(old: JsValue, new: JsValue) {
    let change = ConfigChange {
        old: decode_config(old),
        new: decode_config(new),
    };
    background::instance().on_config_changed(&change);
}

fn decode_tab(value: JsValue) -> Option<TabInfo> {
    match browser::from_js::<RawTab>(value) {
        Ok(raw) => Some(TabInfo::from_raw(raw, timing::now_ms())),
        Err(err) => {
            err.log("Undecodable tab");
            None
        }
    }
}

// Absent or invalid blobs read as the defaults
fn decode_config(value: JsValue) -> ExtensionConfig {
    browser::from_js::<Value>(value)
        .ok()
        .filter(is_valid_blob)
        .and_then(|blob| ExtensionConfig::from_value(blob).ok())
        .unwrap_or_default()
}

fn spawn_auto_sort(scheduled: ScheduledSort) {
    spawn_local(async move {
        sleep(Duration::from_millis(scheduled.delay_ms as u64)).await;
        if let Some(result) = background::instance().run_auto_sort(scheduled.ticket).await {
            if !result.success {
                log::warn!("Auto-sort finished with {} failures", result.failed_operations);
            }
        }
    });
}
