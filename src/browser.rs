/// Host browser capabilities consumed by the engine, and their chrome.* bridge
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::error::{ErrorCode, ExtensionError};
use crate::tab_data::{BookmarkHit, GroupInfo, GroupUpdate, RawTab, TabInfo};
use crate::timing::now_ms;

/// Storage key of the configuration blob
pub const CONFIG_STORAGE_KEY: &str = "extension_config";

#[allow(async_fn_in_trait)]
pub trait TabApi {
    /// Tabs of the current window, in index order
    async fn query_window_tabs(&self) -> Result<Vec<TabInfo>, ExtensionError>;
    async fn move_tab(&self, tab_id: i32, index: i32) -> Result<(), ExtensionError>;
    async fn remove_tabs(&self, tab_ids: &[i32]) -> Result<(), ExtensionError>;
    async fn activate_tab(&self, tab_id: i32) -> Result<(), ExtensionError>;
    async fn open_url(&self, url: &str) -> Result<(), ExtensionError>;
    /// Group tabs into `group_id`, or a new group when `None`. Returns the group id.
    async fn group_tabs(&self, tab_ids: &[i32], group_id: Option<i32>) -> Result<i32, ExtensionError>;
    async fn ungroup_tabs(&self, tab_ids: &[i32]) -> Result<(), ExtensionError>;
}

#[allow(async_fn_in_trait)]
pub trait GroupApi {
    /// Groups of the current window
    async fn query_groups(&self) -> Result<Vec<GroupInfo>, ExtensionError>;
    async fn update_group(&self, group_id: i32, update: &GroupUpdate) -> Result<(), ExtensionError>;
}

#[allow(async_fn_in_trait)]
pub trait BookmarkApi {
    /// Ranked hits for a free-text query, folders included
    async fn search_bookmarks(&self, query: &str) -> Result<Vec<BookmarkHit>, ExtensionError>;
    async fn folder_title(&self, folder_id: &str) -> Result<Option<String>, ExtensionError>;
}

#[allow(async_fn_in_trait)]
pub trait ConfigStore {
    async fn load_config(&self) -> Result<Option<Value>, ExtensionError>;
    async fn save_config(&self, blob: &Value) -> Result<(), ExtensionError>;
}

#[allow(async_fn_in_trait)]
pub trait RuntimeApi {
    /// Post a message to the other extension pages. Undelivered messages are dropped.
    async fn broadcast(&self, message: &Value);
}

/// Everything the background and popup need from the host
pub trait Browser: TabApi + GroupApi + BookmarkApi + ConfigStore + RuntimeApi {}

impl<T: TabApi + GroupApi + BookmarkApi + ConfigStore + RuntimeApi> Browser for T {}

// JS bridge functions
#[wasm_bindgen(module = "/bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn queryWindowTabs() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn moveTab(tab_id: i32, index: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeTabs(tab_ids: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn activateTab(tab_id: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn openUrl(url: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn groupTabs(tab_ids: JsValue, group_id: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn ungroupTabs(tab_ids: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn queryGroups() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn updateGroup(group_id: i32, update: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn searchBookmarks(query: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getBookmarkFolder(folder_id: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getStorage(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(key: &str, value: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendRuntimeMessage(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_name = closePopup)]
    fn close_popup_window();
}

fn js_error(operation: &str, err: JsValue) -> ExtensionError {
    let detail = err
        .as_string()
        .or_else(|| {
            err.dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", err));

    let code = if detail.contains("permission") || detail.contains("Permission") {
        ErrorCode::PermissionDenied
    } else if detail.contains("No tab with id") {
        ErrorCode::TabNotFound
    } else {
        ErrorCode::ChromeApiError
    };
    ExtensionError::new(code, format!("{} failed: {}", operation, detail))
        .with_context("operation", operation)
}

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, ExtensionError> {
    // plain objects, not ES Maps
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|e| ExtensionError::new(ErrorCode::RuntimeError, format!("Failed to serialize: {:?}", e)))
}

pub(crate) fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, ExtensionError> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| ExtensionError::new(ErrorCode::RuntimeError, format!("Failed to parse: {:?}", e)))
}

/// [`Browser`] backed by the extension APIs through `bridge.js`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeBridge;

impl ChromeBridge {
    pub fn close_popup(&self) {
        close_popup_window();
    }
}

impl RuntimeApi for ChromeBridge {
    async fn broadcast(&self, message: &Value) {
        let value = match to_js(message) {
            Ok(value) => value,
            Err(e) => {
                e.log("broadcast");
                return;
            }
        };
        // no listener is not an error
        if let Err(e) = sendRuntimeMessage(value).await {
            log::debug!("Broadcast not delivered: {:?}", e);
        }
    }
}

impl TabApi for ChromeBridge {
    async fn query_window_tabs(&self) -> Result<Vec<TabInfo>, ExtensionError> {
        let raw: Vec<RawTab> = from_js(queryWindowTabs().await.map_err(|e| js_error("tabs.query", e))?)?;
        let now = now_ms();
        let mut tabs: Vec<TabInfo> = raw.into_iter().map(|t| TabInfo::from_raw(t, now)).collect();
        tabs.sort_by_key(|t| t.index);
        Ok(tabs)
    }

    async fn move_tab(&self, tab_id: i32, index: i32) -> Result<(), ExtensionError> {
        moveTab(tab_id, index)
            .await
            .map_err(|e| js_error("tabs.move", e).with_context("tabId", tab_id))?;
        Ok(())
    }

    async fn remove_tabs(&self, tab_ids: &[i32]) -> Result<(), ExtensionError> {
        removeTabs(to_js(tab_ids)?)
            .await
            .map_err(|e| js_error("tabs.remove", e).with_context("tabIds", tab_ids.to_vec()))?;
        Ok(())
    }

    async fn activate_tab(&self, tab_id: i32) -> Result<(), ExtensionError> {
        activateTab(tab_id)
            .await
            .map_err(|e| js_error("tabs.update", e).with_context("tabId", tab_id))?;
        Ok(())
    }

    async fn open_url(&self, url: &str) -> Result<(), ExtensionError> {
        openUrl(url).await.map_err(|e| js_error("tabs.create", e))?;
        Ok(())
    }

    async fn group_tabs(&self, tab_ids: &[i32], group_id: Option<i32>) -> Result<i32, ExtensionError> {
        let target = group_id.map(JsValue::from).unwrap_or(JsValue::UNDEFINED);
        let id = groupTabs(to_js(tab_ids)?, target)
            .await
            .map_err(|e| js_error("tabs.group", e).with_context("tabIds", tab_ids.to_vec()))?;
        id.as_f64()
            .map(|id| id as i32)
            .ok_or_else(|| ExtensionError::host("tabs.group returned no group id"))
    }

    async fn ungroup_tabs(&self, tab_ids: &[i32]) -> Result<(), ExtensionError> {
        ungroupTabs(to_js(tab_ids)?)
            .await
            .map_err(|e| js_error("tabs.ungroup", e).with_context("tabIds", tab_ids.to_vec()))?;
        Ok(())
    }
}

impl GroupApi for ChromeBridge {
    async fn query_groups(&self) -> Result<Vec<GroupInfo>, ExtensionError> {
        from_js(queryGroups().await.map_err(|e| js_error("tabGroups.query", e))?)
    }

    async fn update_group(&self, group_id: i32, update: &GroupUpdate) -> Result<(), ExtensionError> {
        updateGroup(group_id, to_js(update)?)
            .await
            .map_err(|e| js_error("tabGroups.update", e).with_context("groupId", group_id))?;
        Ok(())
    }
}

impl BookmarkApi for ChromeBridge {
    async fn search_bookmarks(&self, query: &str) -> Result<Vec<BookmarkHit>, ExtensionError> {
        let hits = searchBookmarks(query).await.map_err(|e| {
            js_error("bookmarks.search", e).recode(ErrorCode::BookmarkSearchFailed)
        })?;
        from_js(hits)
    }

    async fn folder_title(&self, folder_id: &str) -> Result<Option<String>, ExtensionError> {
        let folder = getBookmarkFolder(folder_id)
            .await
            .map_err(|e| js_error("bookmarks.get", e))?;
        if folder.is_null() || folder.is_undefined() {
            return Ok(None);
        }
        let folder: BookmarkHit = from_js(folder)?;
        Ok(Some(folder.title))
    }
}

impl ConfigStore for ChromeBridge {
    async fn load_config(&self) -> Result<Option<Value>, ExtensionError> {
        let stored = getStorage(CONFIG_STORAGE_KEY)
            .await
            .map_err(|e| js_error("storage.get", e).recode(ErrorCode::ConfigLoadFailed))?;
        if stored.is_null() || stored.is_undefined() {
            return Ok(None);
        }
        from_js(stored).map(Some)
    }

    async fn save_config(&self, blob: &Value) -> Result<(), ExtensionError> {
        setStorage(CONFIG_STORAGE_KEY, to_js(blob)?)
            .await
            .map_err(|e| js_error("storage.set", e))?;
        Ok(())
    }
}
