/// Data structures for Tab Organizer
use serde::{Deserialize, Serialize};

use crate::domain::extract_domain;

/// Group id the host uses for "not in any group".
pub const TAB_GROUP_ID_NONE: i32 = -1;

/// Milliseconds subtracted per position when approximating access time.
const APPROX_ACCESS_STEP_MS: f64 = 1000.0;

/// Information about a browser tab, decoded from one window snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: i32,
    pub index: i32,
    pub window_id: i32,
    pub title: String,
    pub url: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    pub pinned: bool,
    pub active: bool,
    #[serde(default)]
    pub audible: bool,
    #[serde(default)]
    pub discarded: bool,
    /// `None` when the tab is not in a group
    #[serde(default)]
    pub group_id: Option<i32>,
    /// Ordering proxy only; see [`approximate_last_accessed`]
    pub last_accessed: f64,
}

impl TabInfo {
    pub fn new(id: i32, url: &str, title: &str, index: i32) -> TabInfo {
        TabInfo {
            id,
            index,
            window_id: 1,
            title: title.to_string(),
            url: url.to_string(),
            domain: extract_domain(url),
            fav_icon_url: None,
            pinned: false,
            active: false,
            audible: false,
            discarded: false,
            group_id: None,
            last_accessed: 0.0,
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.group_id.is_some()
    }

    /// Decode a host tab object. `now` is used for the access-time fallback.
    pub fn from_raw(raw: RawTab, now: f64) -> TabInfo {
        let url = raw.url.unwrap_or_default();
        let last_accessed =
            approximate_last_accessed(raw.last_accessed, raw.active, raw.index, now);
        TabInfo {
            id: raw.id,
            index: raw.index,
            window_id: raw.window_id,
            title: raw.title.unwrap_or_default(),
            domain: extract_domain(&url),
            url,
            fav_icon_url: raw.fav_icon_url,
            pinned: raw.pinned,
            active: raw.active,
            audible: raw.audible.unwrap_or(false),
            discarded: raw.discarded.unwrap_or(false),
            group_id: raw.group_id.filter(|id| *id != TAB_GROUP_ID_NONE),
            last_accessed,
        }
    }
}

/// Tab object as the host delivers it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTab {
    pub id: i32,
    pub index: i32,
    #[serde(default)]
    pub window_id: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub fav_icon_url: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub audible: Option<bool>,
    #[serde(default)]
    pub discarded: Option<bool>,
    #[serde(default)]
    pub group_id: Option<i32>,
    #[serde(default)]
    pub last_accessed: Option<f64>,
}

/// Best-effort access time.
///
/// A host-provided timestamp is used as is. Otherwise the active tab gets
/// `now` and every other tab `now - index * 1000`, which only preserves a
/// plausible ordering (left-most is "most recent") and says nothing about
/// real access times.
pub fn approximate_last_accessed(host: Option<f64>, active: bool, index: i32, now: f64) -> f64 {
    match host {
        Some(ts) if ts.is_finite() && ts > 0.0 => ts,
        _ if active => now,
        _ => now - f64::from(index) * APPROX_ACCESS_STEP_MS,
    }
}

/// Colors the host offers for tab groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    Grey,
    Blue,
    Red,
    Yellow,
    Green,
    Pink,
    Purple,
    Cyan,
    Orange,
}

impl GroupColor {
    /// Palette in selection order
    pub const PALETTE: [GroupColor; 9] = [
        GroupColor::Grey,
        GroupColor::Blue,
        GroupColor::Red,
        GroupColor::Yellow,
        GroupColor::Green,
        GroupColor::Pink,
        GroupColor::Purple,
        GroupColor::Cyan,
        GroupColor::Orange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupColor::Grey => "grey",
            GroupColor::Blue => "blue",
            GroupColor::Red => "red",
            GroupColor::Yellow => "yellow",
            GroupColor::Green => "green",
            GroupColor::Pink => "pink",
            GroupColor::Purple => "purple",
            GroupColor::Cyan => "cyan",
            GroupColor::Orange => "orange",
        }
    }
}

/// A tab group of one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub id: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub color: Option<GroupColor>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub window_id: i32,
}

/// Properties to change on an existing group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<GroupColor>,
}

impl GroupUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.color.is_none()
    }
}

/// One bookmark search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkHit {
    pub id: String,
    pub title: String,
    /// `None` for folders
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub date_added: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_info_creation() {
        let tab = TabInfo::new(1, "https://www.google.com", "Google", 0);

        assert_eq!(tab.id, 1);
        assert_eq!(tab.url, "https://www.google.com");
        assert_eq!(tab.title, "Google");
        assert_eq!(tab.domain, "google.com");
        assert!(!tab.pinned);
        assert!(!tab.is_grouped());
        assert_eq!(tab.index, 0);
    }

    #[test]
    fn test_from_raw_maps_sentinel_group() {
        let raw: RawTab = serde_json::from_str(
            r#"{"id": 4, "index": 2, "windowId": 9, "title": "Docs",
                "url": "https://docs.rs/serde", "pinned": false, "active": false,
                "groupId": -1, "audible": true}"#,
        )
        .unwrap();

        let tab = TabInfo::from_raw(raw, 10_000.0);

        assert_eq!(tab.group_id, None);
        assert_eq!(tab.domain, "docs.rs");
        assert!(tab.audible);
        assert_eq!(tab.window_id, 9);
        assert_eq!(tab.last_accessed, 8_000.0);
    }

    #[test]
    fn test_from_raw_missing_fields() {
        let raw: RawTab = serde_json::from_str(r#"{"id": 1, "index": 0, "groupId": 12}"#).unwrap();
        let tab = TabInfo::from_raw(raw, 0.0);

        assert_eq!(tab.url, "");
        assert_eq!(tab.title, "");
        assert_eq!(tab.domain, "unknown");
        assert_eq!(tab.group_id, Some(12));
    }

    #[test]
    fn test_approximate_last_accessed() {
        assert_eq!(approximate_last_accessed(Some(123.0), false, 5, 10_000.0), 123.0);
        assert_eq!(approximate_last_accessed(None, true, 5, 10_000.0), 10_000.0);
        assert_eq!(approximate_last_accessed(None, false, 3, 10_000.0), 7_000.0);
        assert_eq!(approximate_last_accessed(Some(f64::NAN), false, 1, 10_000.0), 9_000.0);
    }

    #[test]
    fn test_serialization() {
        let tab = TabInfo::new(3, "chrome://extensions", "Extensions", 1);

        let json = serde_json::to_string(&tab).unwrap();
        assert!(json.contains("\"windowId\""));
        let deserialized: TabInfo = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, tab);
        assert_eq!(deserialized.domain, "chrome");
    }

    #[test]
    fn test_group_color_names() {
        let json = serde_json::to_string(&GroupColor::Cyan).unwrap();
        assert_eq!(json, "\"cyan\"");
        assert_eq!(GroupColor::PALETTE.len(), 9);
        assert_eq!(GroupColor::PALETTE[0].as_str(), "grey");
    }
}
