/// Keyboard navigation over the merged bookmark + tab result list
use serde::Serialize;

use crate::tab_data::{BookmarkHit, TabInfo};

/// One entry of the navigation sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum NavigationItem {
    Tab(TabInfo),
    Bookmark(BookmarkHit),
}

impl NavigationItem {
    /// Stable id used to find the rendered row
    pub fn id(&self) -> String {
        match self {
            NavigationItem::Tab(tab) => format!("tab-{}", tab.id),
            NavigationItem::Bookmark(hit) => format!("bookmark-{}", hit.id),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            NavigationItem::Tab(tab) => &tab.title,
            NavigationItem::Bookmark(hit) => &hit.title,
        }
    }
}

/// What activating the selected item should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavTarget {
    SwitchToTab(i32),
    OpenUrl(String),
}

/// Result of Escape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The caller must clear the query; the rebuild that follows resets the cursor
    ClearQuery,
    CursorCleared,
}

/// Ordered navigation items plus a cursor.
///
/// The cursor is `None` or a valid index into `items`; an empty sequence
/// always has no cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationIndex {
    items: Vec<NavigationItem>,
    cursor: Option<usize>,
}

impl NavigationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the sequence. Bookmarks come first and only while a query
    /// is active. The cursor is kept and clamped into range.
    pub fn rebuild(&mut self, tabs: &[TabInfo], bookmarks: &[BookmarkHit], query_active: bool) {
        let mut items = Vec::with_capacity(tabs.len() + bookmarks.len());
        if query_active {
            items.extend(bookmarks.iter().cloned().map(NavigationItem::Bookmark));
        }
        items.extend(tabs.iter().cloned().map(NavigationItem::Tab));
        self.items = items;
        self.clamp();
    }

    fn clamp(&mut self) {
        self.cursor = match (self.cursor, self.items.len()) {
            (_, 0) => None,
            (Some(i), len) if i >= len => Some(len - 1),
            (cursor, _) => cursor,
        };
    }

    pub fn items(&self) -> &[NavigationItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn selected(&self) -> Option<&NavigationItem> {
        self.cursor.and_then(|i| self.items.get(i))
    }

    pub fn is_selected(&self, item_id: &str) -> bool {
        self.selected().is_some_and(|item| item.id() == item_id)
    }

    /// Move down, wrapping from the last item to the first
    pub fn next(&mut self) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        self.cursor = Some(match self.cursor {
            None => 0,
            Some(i) if i + 1 >= len => 0,
            Some(i) => i + 1,
        });
        self.cursor
    }

    /// Move up, wrapping from the first item to the last
    pub fn prev(&mut self) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        self.cursor = Some(match self.cursor {
            None | Some(0) => len - 1,
            Some(i) => i - 1,
        });
        self.cursor
    }

    /// Target for Enter, if any. Bookmarks without url do nothing.
    pub fn activate(&self) -> Option<NavTarget> {
        match self.selected()? {
            NavigationItem::Tab(tab) => Some(NavTarget::SwitchToTab(tab.id)),
            NavigationItem::Bookmark(hit) => hit
                .url
                .as_ref()
                .filter(|u| !u.is_empty())
                .map(|u| NavTarget::OpenUrl(u.clone())),
        }
    }

    /// Drop the selected tab from the sequence and return its id so the
    /// caller can close it. Bookmarks are never removed.
    pub fn remove_selected(&mut self) -> Option<i32> {
        let index = self.cursor?;
        let tab_id = match self.items.get(index)? {
            NavigationItem::Tab(tab) => tab.id,
            NavigationItem::Bookmark(_) => return None,
        };
        self.items.remove(index);
        self.clamp();
        Some(tab_id)
    }

    /// Escape
    pub fn reset(&mut self, query_active: bool) -> ResetOutcome {
        if query_active {
            ResetOutcome::ClearQuery
        } else {
            self.cursor = None;
            ResetOutcome::CursorCleared
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = None;
    }
}

/// Keyboard actions of the result list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Prev,
    Next,
    Activate,
    Remove,
    Reset,
    FocusSearch,
}

impl NavKey {
    /// Map a `KeyboardEvent.key`. While the search input has focus only the
    /// arrows, Enter and Escape navigate; letters and deletion keep editing.
    pub fn from_key(key: &str, input_focused: bool) -> Option<NavKey> {
        match key {
            "ArrowUp" => Some(NavKey::Prev),
            "ArrowDown" => Some(NavKey::Next),
            "Enter" => Some(NavKey::Activate),
            "Escape" => Some(NavKey::Reset),
            _ if input_focused => None,
            "k" => Some(NavKey::Prev),
            "j" => Some(NavKey::Next),
            "Delete" | "Backspace" => Some(NavKey::Remove),
            "/" => Some(NavKey::FocusSearch),
            _ => None,
        }
    }
}

/// A rendered list the active item can be scrolled within
pub trait ScrollView {
    /// Collapsible container holding the item, if any
    fn container_of(&self, item_id: &str) -> Option<String>;
    fn is_collapsed(&self, container: &str) -> bool;
    fn expand(&mut self, container: &str);
    /// Returns false when the item is not rendered
    fn scroll_to(&mut self, item_id: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    Unselected,
    Scrolled,
    ExpandedThenScrolled,
    NotRendered,
}

/// Scroll the selected item into view, expanding a collapsed container
/// first and retrying once.
pub fn scroll_active_into_view<V: ScrollView>(index: &NavigationIndex, view: &mut V) -> ScrollOutcome {
    let Some(item) = index.selected() else {
        return ScrollOutcome::Unselected;
    };
    let id = item.id();

    if let Some(container) = view.container_of(&id) {
        if view.is_collapsed(&container) {
            log::debug!("Expanding {} to reveal {}", container, id);
            view.expand(&container);
            return if view.scroll_to(&id) {
                ScrollOutcome::ExpandedThenScrolled
            } else {
                ScrollOutcome::NotRendered
            };
        }
    }

    if view.scroll_to(&id) {
        ScrollOutcome::Scrolled
    } else {
        ScrollOutcome::NotRendered
    }
}
