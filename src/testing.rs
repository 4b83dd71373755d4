//! In-memory browser used by the async tests
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use crate::browser::{BookmarkApi, ConfigStore, GroupApi, RuntimeApi, TabApi};
use crate::error::{ErrorCode, ExtensionError};
use crate::tab_data::{BookmarkHit, GroupColor, GroupInfo, GroupUpdate, TabInfo};

/// One window worth of tabs and groups. Moves shift indices the way the
/// host does; ids registered with [`FakeBrowser::fail_tab`] or
/// [`FakeBrowser::fail_group`] make every call touching them fail, and
/// urls registered with [`FakeBrowser::fail_url`] refuse to open.
pub struct FakeBrowser {
    tabs: RefCell<Vec<TabInfo>>,
    groups: RefCell<Vec<GroupInfo>>,
    bookmarks: RefCell<Vec<BookmarkHit>>,
    folders: RefCell<HashMap<String, String>>,
    config: RefCell<Option<Value>>,
    failing_tabs: RefCell<HashSet<i32>>,
    failing_groups: RefCell<HashSet<i32>>,
    failing_urls: RefCell<HashSet<String>>,
    opened: RefCell<Vec<String>>,
    broadcasts: RefCell<Vec<Value>>,
    calls: RefCell<Vec<String>>,
    next_group_id: Cell<i32>,
    config_save_fails: Cell<bool>,
}

impl FakeBrowser {
    pub fn new(tabs: Vec<TabInfo>) -> Self {
        let browser = FakeBrowser {
            tabs: RefCell::new(tabs),
            groups: RefCell::new(Vec::new()),
            bookmarks: RefCell::new(Vec::new()),
            folders: RefCell::new(HashMap::new()),
            config: RefCell::new(None),
            failing_tabs: RefCell::new(HashSet::new()),
            failing_groups: RefCell::new(HashSet::new()),
            failing_urls: RefCell::new(HashSet::new()),
            opened: RefCell::new(Vec::new()),
            broadcasts: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            next_group_id: Cell::new(100),
            config_save_fails: Cell::new(false),
        };
        browser.reindex();
        browser
    }

    fn reindex(&self) {
        for (i, tab) in self.tabs.borrow_mut().iter_mut().enumerate() {
            tab.index = i as i32;
        }
    }

    fn check_tabs(&self, tab_ids: &[i32]) -> Result<(), ExtensionError> {
        let tabs = self.tabs.borrow();
        for id in tab_ids {
            if self.failing_tabs.borrow().contains(id) {
                return Err(ExtensionError::host(format!("Tab {} is locked", id)));
            }
            if !tabs.iter().any(|t| t.id == *id) {
                return Err(ExtensionError::new(ErrorCode::TabNotFound, format!("No tab with id: {}", id)));
            }
        }
        Ok(())
    }

    fn drop_empty_groups(&self) {
        let tabs = self.tabs.borrow();
        self.groups
            .borrow_mut()
            .retain(|g| tabs.iter().any(|t| t.group_id == Some(g.id)));
    }

    pub fn fail_tab(&self, tab_id: i32) {
        self.failing_tabs.borrow_mut().insert(tab_id);
    }

    pub fn fail_group(&self, group_id: i32) {
        self.failing_groups.borrow_mut().insert(group_id);
    }

    pub fn fail_config_save(&self) {
        self.config_save_fails.set(true);
    }

    pub fn fail_url(&self, url: &str) {
        self.failing_urls.borrow_mut().insert(url.to_string());
    }

    /// Register a group holding `tab_ids`
    pub fn add_group(&self, group_id: i32, title: &str, color: GroupColor, tab_ids: &[i32]) {
        self.groups.borrow_mut().push(GroupInfo {
            id: group_id,
            title: Some(title.to_string()),
            color: Some(color),
            collapsed: false,
            window_id: 1,
        });
        for tab in self.tabs.borrow_mut().iter_mut() {
            if tab_ids.contains(&tab.id) {
                tab.group_id = Some(group_id);
            }
        }
    }

    pub fn add_bookmark(&self, hit: BookmarkHit) {
        self.bookmarks.borrow_mut().push(hit);
    }

    pub fn add_folder(&self, id: &str, title: &str) {
        self.folders.borrow_mut().insert(id.to_string(), title.to_string());
    }

    pub fn set_stored_config(&self, blob: Option<Value>) {
        *self.config.borrow_mut() = blob;
    }

    pub fn stored_config(&self) -> Option<Value> {
        self.config.borrow().clone()
    }

    pub fn tabs(&self) -> Vec<TabInfo> {
        self.tabs.borrow().clone()
    }

    pub fn groups(&self) -> Vec<GroupInfo> {
        self.groups.borrow().clone()
    }

    pub fn tab_order(&self) -> Vec<i32> {
        self.tabs.borrow().iter().map(|t| t.id).collect()
    }

    pub fn tab(&self, tab_id: i32) -> Option<TabInfo> {
        self.tabs.borrow().iter().find(|t| t.id == tab_id).cloned()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }

    pub fn broadcasts(&self) -> Vec<Value> {
        self.broadcasts.borrow().clone()
    }

    /// Names of the mutating calls made so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl TabApi for FakeBrowser {
    async fn query_window_tabs(&self) -> Result<Vec<TabInfo>, ExtensionError> {
        Ok(self.tabs())
    }

    async fn move_tab(&self, tab_id: i32, index: i32) -> Result<(), ExtensionError> {
        self.record(format!("move {} -> {}", tab_id, index));
        self.check_tabs(&[tab_id])?;
        {
            let mut tabs = self.tabs.borrow_mut();
            let Some(from) = tabs.iter().position(|t| t.id == tab_id) else {
                return Err(ExtensionError::new(ErrorCode::TabNotFound, "tab vanished"));
            };
            let tab = tabs.remove(from);
            let to = (index.max(0) as usize).min(tabs.len());
            tabs.insert(to, tab);
        }
        self.reindex();
        Ok(())
    }

    async fn remove_tabs(&self, tab_ids: &[i32]) -> Result<(), ExtensionError> {
        self.record(format!("remove {:?}", tab_ids));
        self.check_tabs(tab_ids)?;
        self.tabs.borrow_mut().retain(|t| !tab_ids.contains(&t.id));
        self.reindex();
        self.drop_empty_groups();
        Ok(())
    }

    async fn activate_tab(&self, tab_id: i32) -> Result<(), ExtensionError> {
        self.record(format!("activate {}", tab_id));
        self.check_tabs(&[tab_id])?;
        for tab in self.tabs.borrow_mut().iter_mut() {
            tab.active = tab.id == tab_id;
        }
        Ok(())
    }

    async fn open_url(&self, url: &str) -> Result<(), ExtensionError> {
        self.record(format!("open {}", url));
        if self.failing_urls.borrow().contains(url) {
            return Err(ExtensionError::host(format!("Cannot open {}", url)));
        }
        self.opened.borrow_mut().push(url.to_string());
        Ok(())
    }

    async fn group_tabs(&self, tab_ids: &[i32], group_id: Option<i32>) -> Result<i32, ExtensionError> {
        self.record(format!("group {:?} into {:?}", tab_ids, group_id));
        self.check_tabs(tab_ids)?;

        let id = match group_id {
            Some(id) if self.groups.borrow().iter().any(|g| g.id == id) => id,
            Some(id) => return Err(ExtensionError::host(format!("No group with id: {}", id))),
            None => {
                let id = self.next_group_id.get();
                self.next_group_id.set(id + 1);
                self.groups.borrow_mut().push(GroupInfo {
                    id,
                    title: None,
                    color: Some(GroupColor::Grey),
                    collapsed: false,
                    window_id: 1,
                });
                id
            }
        };

        for tab in self.tabs.borrow_mut().iter_mut() {
            if tab_ids.contains(&tab.id) {
                tab.group_id = Some(id);
            }
        }
        self.drop_empty_groups();
        Ok(id)
    }

    async fn ungroup_tabs(&self, tab_ids: &[i32]) -> Result<(), ExtensionError> {
        self.record(format!("ungroup {:?}", tab_ids));
        self.check_tabs(tab_ids)?;
        for tab in self.tabs.borrow_mut().iter_mut() {
            if tab_ids.contains(&tab.id) {
                tab.group_id = None;
            }
        }
        self.drop_empty_groups();
        Ok(())
    }
}

impl GroupApi for FakeBrowser {
    async fn query_groups(&self) -> Result<Vec<GroupInfo>, ExtensionError> {
        Ok(self.groups())
    }

    async fn update_group(&self, group_id: i32, update: &GroupUpdate) -> Result<(), ExtensionError> {
        self.record(format!("update group {}", group_id));
        if self.failing_groups.borrow().contains(&group_id) {
            return Err(ExtensionError::host(format!("Group {} is locked", group_id)));
        }
        let mut groups = self.groups.borrow_mut();
        let group = groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| ExtensionError::host(format!("No group with id: {}", group_id)))?;
        if let Some(title) = &update.title {
            group.title = Some(title.clone());
        }
        if let Some(color) = update.color {
            group.color = Some(color);
        }
        Ok(())
    }
}

impl BookmarkApi for FakeBrowser {
    async fn search_bookmarks(&self, query: &str) -> Result<Vec<BookmarkHit>, ExtensionError> {
        let needle = query.to_lowercase();
        Ok(self
            .bookmarks
            .borrow()
            .iter()
            .filter(|b| b.title.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn folder_title(&self, folder_id: &str) -> Result<Option<String>, ExtensionError> {
        Ok(self.folders.borrow().get(folder_id).cloned())
    }
}

impl ConfigStore for FakeBrowser {
    async fn load_config(&self) -> Result<Option<Value>, ExtensionError> {
        Ok(self.stored_config())
    }

    async fn save_config(&self, blob: &Value) -> Result<(), ExtensionError> {
        self.record("save config".to_string());
        if self.config_save_fails.get() {
            return Err(ExtensionError::host("storage.set: quota exceeded"));
        }
        *self.config.borrow_mut() = Some(blob.clone());
        Ok(())
    }
}

impl RuntimeApi for FakeBrowser {
    async fn broadcast(&self, message: &Value) {
        self.broadcasts.borrow_mut().push(message.clone());
    }
}

/// Tabs at consecutive indices, one per url
pub fn window(urls: &[&str]) -> Vec<TabInfo> {
    urls.iter()
        .enumerate()
        .map(|(i, url)| TabInfo::new(i as i32 + 1, url, &format!("Tab {}", i + 1), i as i32))
        .collect()
}
