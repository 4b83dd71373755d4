/// Bookmark search results: filtering, folder grouping and visibility
use std::collections::{HashMap, HashSet};

use crate::tab_data::BookmarkHit;

/// Shorter queries do not hit the bookmark store
pub const MIN_QUERY_LEN: usize = 2;
/// Hits kept per search
pub const RESULT_LIMIT: usize = 20;
/// Groups shown before "show all"
pub const VISIBLE_GROUP_LIMIT: usize = 3;
/// Bookmarks opened at once from one folder group
pub const OPEN_GROUP_LIMIT: usize = 10;

pub const BOOKMARKS_BAR: &str = "Bookmarks bar";
pub const UNFILED: &str = "Unfiled";

pub fn should_search(query: &str) -> bool {
    query.trim().chars().count() >= MIN_QUERY_LEN
}

/// Drop folders and keep the first [`RESULT_LIMIT`] hits in rank order.
pub fn filter_hits(raw: Vec<BookmarkHit>) -> Vec<BookmarkHit> {
    raw.into_iter()
        .filter(|hit| hit.url.as_deref().is_some_and(|u| !u.is_empty()))
        .take(RESULT_LIMIT)
        .collect()
}

/// Hits that share a parent folder
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkGroup {
    pub name: String,
    pub bookmarks: Vec<BookmarkHit>,
}

impl BookmarkGroup {
    /// Urls opened by "open all", capped at [`OPEN_GROUP_LIMIT`]
    pub fn urls_to_open(&self) -> Vec<String> {
        self.bookmarks
            .iter()
            .filter_map(|b| b.url.clone())
            .take(OPEN_GROUP_LIMIT)
            .collect()
    }
}

/// Normalize a folder title. Unknown or missing folders are "Unfiled".
pub fn folder_display_name(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some("") | None => UNFILED.to_string(),
        Some(t) if t.eq_ignore_ascii_case(BOOKMARKS_BAR) => BOOKMARKS_BAR.to_string(),
        Some(t) => t.to_string(),
    }
}

/// Group hits by folder name. `folders` maps parent id → folder title.
///
/// The bookmarks bar comes first, then groups by size (largest first); ties
/// keep first appearance.
pub fn group_by_folder(hits: &[BookmarkHit], folders: &HashMap<String, String>) -> Vec<BookmarkGroup> {
    let mut groups: Vec<BookmarkGroup> = Vec::new();

    for hit in hits {
        let title = hit
            .parent_id
            .as_ref()
            .and_then(|id| folders.get(id))
            .map(String::as_str);
        let name = folder_display_name(title);

        match groups.iter_mut().find(|g| g.name == name) {
            Some(group) => group.bookmarks.push(hit.clone()),
            None => groups.push(BookmarkGroup {
                name,
                bookmarks: vec![hit.clone()],
            }),
        }
    }

    groups.sort_by(|a, b| {
        let a_bar = a.name == BOOKMARKS_BAR;
        let b_bar = b.name == BOOKMARKS_BAR;
        b_bar
            .cmp(&a_bar)
            .then_with(|| b.bookmarks.len().cmp(&a.bookmarks.len()))
    });
    groups
}

/// Bookmark hits for the current query plus their display state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookmarkResults {
    hits: Vec<BookmarkHit>,
    groups: Vec<BookmarkGroup>,
    show_all: bool,
    collapsed: HashSet<String>,
}

impl BookmarkResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the hits; display state (collapsed groups) is kept.
    pub fn set(&mut self, hits: Vec<BookmarkHit>, groups: Vec<BookmarkGroup>) {
        self.hits = hits;
        self.groups = groups;
    }

    pub fn clear(&mut self) {
        self.hits.clear();
        self.groups.clear();
        self.show_all = false;
        self.collapsed.clear();
    }

    pub fn hits(&self) -> &[BookmarkHit] {
        &self.hits
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Groups currently rendered
    pub fn displayed_groups(&self) -> &[BookmarkGroup] {
        if self.show_all || self.groups.len() <= VISIBLE_GROUP_LIMIT {
            &self.groups
        } else {
            &self.groups[..VISIBLE_GROUP_LIMIT]
        }
    }

    pub fn hidden_group_count(&self) -> usize {
        if self.show_all {
            0
        } else {
            self.groups.len().saturating_sub(VISIBLE_GROUP_LIMIT)
        }
    }

    pub fn show_all(&mut self, show: bool) {
        self.show_all = show;
    }

    pub fn is_collapsed(&self, group: &str) -> bool {
        self.collapsed.contains(group)
    }

    pub fn set_collapsed(&mut self, group: &str, collapsed: bool) {
        if collapsed {
            self.collapsed.insert(group.to_string());
        } else {
            self.collapsed.remove(group);
        }
    }

    pub fn toggle_collapsed(&mut self, group: &str) {
        let collapsed = self.is_collapsed(group);
        self.set_collapsed(group, !collapsed);
    }

    pub fn group(&self, name: &str) -> Option<&BookmarkGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Name of the displayed group holding bookmark `id`
    pub fn group_of(&self, id: &str) -> Option<&str> {
        self.displayed_groups()
            .iter()
            .find(|g| g.bookmarks.iter().any(|b| b.id == id))
            .map(|g| g.name.as_str())
    }

    /// Hits in displayed, expanded groups, in display order
    pub fn visible_hits(&self) -> Vec<BookmarkHit> {
        self.displayed_groups()
            .iter()
            .filter(|g| !self.collapsed.contains(&g.name))
            .flat_map(|g| g.bookmarks.iter().cloned())
            .collect()
    }
}
