/// Popup session controller.
///
/// Owns everything the popup shows: the window's tabs, the search and facet
/// state, bookmark hits, the navigation cursor, the multi-selection and the
/// toasts. Long-running actions go through an [`OperationGate`] so a second
/// click while one runs is dropped instead of queued.
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

use crate::applier::{
    BatchOperationResult, GroupResult, close_tabs, group_selection, group_window, open_urls, sort_window,
    ungroup_all,
};
use crate::bookmarks::{BookmarkGroup, BookmarkResults, filter_hits, group_by_folder, should_search};
use crate::browser::Browser;
use crate::config::{ExtensionConfig, load_config};
use crate::error::ExtensionError;
use crate::navigation::{
    NavKey, NavTarget, NavigationIndex, NavigationItem, ResetOutcome, ScrollOutcome, ScrollView,
    scroll_active_into_view,
};
use crate::search::{FacetChoice, FacetCounts, FacetFilter, SearchState, TabSearch, facet_counts};
use crate::sorting::SortSpec;
use crate::tab_data::TabInfo;
use crate::timing::DebounceTicket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Sort,
    Group,
    Ungroup,
    CloseSelected,
    GroupSelected,
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Sort => "Sorting tabs...",
            Operation::Group => "Grouping tabs...",
            Operation::Ungroup => "Ungrouping tabs...",
            Operation::CloseSelected => "Closing tabs...",
            Operation::GroupSelected => "Grouping selection...",
        }
    }
}

/// Mutual exclusion for the popup's long-running actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OperationGate {
    #[default]
    Idle,
    Running(Operation),
}

impl OperationGate {
    /// Enter `op` unless something is already running.
    pub fn try_begin(&mut self, op: Operation) -> bool {
        match self {
            OperationGate::Idle => {
                *self = OperationGate::Running(op);
                true
            }
            OperationGate::Running(current) => {
                log::debug!("{:?} ignored, {:?} still running", op, current);
                false
            }
        }
    }

    pub fn finish(&mut self) {
        *self = OperationGate::Idle;
    }

    pub fn running(&self) -> Option<Operation> {
        match self {
            OperationGate::Idle => None,
            OperationGate::Running(op) => Some(*op),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }

    /// Leave a stuck `Running` state. Returns true if the gate was held.
    pub fn force_reset(&mut self) -> bool {
        match self.running() {
            Some(op) => {
                log::warn!("Operation gate still held by {:?}, forcing reset", op);
                *self = OperationGate::Idle;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Info,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: Uuid,
    pub kind: ToastKind,
    pub title: String,
    pub detail: Option<String>,
}

impl Toast {
    pub fn new(kind: ToastKind, title: impl Into<String>) -> Self {
        Toast {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Short user message only; details stay in the log.
    pub fn from_error(err: &ExtensionError) -> Self {
        Toast::new(ToastKind::Danger, err.user_message())
    }

    pub fn from_batch(action: &str, result: &BatchOperationResult) -> Self {
        if result.success {
            let title = result
                .message
                .clone()
                .unwrap_or_else(|| format!("{}: {} changes", action, result.successful_operations));
            return Toast::new(ToastKind::Success, title);
        }

        if result.total_operations == 0 {
            let toast = Toast::new(ToastKind::Danger, format!("{} failed", action));
            return match result.errors.first() {
                Some(error) => toast.with_detail(error.clone()),
                None => toast,
            };
        }

        let kind = if result.successful_operations > 0 {
            ToastKind::Warning
        } else {
            ToastKind::Danger
        };
        Toast::new(kind, format!("{} partially failed", action)).with_detail(format!(
            "{} of {} operations failed",
            result.failed_operations, result.total_operations
        ))
    }

    pub fn from_grouping(result: &GroupResult) -> Self {
        if !result.success {
            return Toast::from_batch("Grouping", &result.batch);
        }
        let title = result
            .message
            .clone()
            .unwrap_or_else(|| format!("Created {} groups", result.group_count));
        let toast = Toast::new(ToastKind::Success, title);
        if result.dropped_domains.is_empty() {
            toast
        } else {
            toast.with_detail(format!(
                "Group limit reached, left ungrouped: {}",
                result.dropped_domains.join(", ")
            ))
        }
    }
}

/// What a key press did, for the view to follow up on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEffect {
    Ignored,
    CursorMoved,
    Activated(NavTarget),
    TabClosed(i32),
    QueryCleared,
    CursorCleared,
    FocusSearch,
}

/// Rendered bookmark groups plus the view's own scrolling
struct BookmarkScroll<'a, F> {
    bookmarks: &'a RefCell<BookmarkResults>,
    scroll: F,
}

impl<F: FnMut(&str) -> bool> ScrollView for BookmarkScroll<'_, F> {
    fn container_of(&self, item_id: &str) -> Option<String> {
        let id = item_id.strip_prefix("bookmark-")?;
        self.bookmarks.borrow().group_of(id).map(str::to_string)
    }

    fn is_collapsed(&self, container: &str) -> bool {
        self.bookmarks.borrow().is_collapsed(container)
    }

    fn expand(&mut self, container: &str) {
        self.bookmarks.borrow_mut().set_collapsed(container, false);
    }

    fn scroll_to(&mut self, item_id: &str) -> bool {
        (self.scroll)(item_id)
    }
}

pub struct PopupSession<B> {
    browser: B,
    gate: Cell<OperationGate>,
    config: RefCell<ExtensionConfig>,
    tabs: RefCell<Vec<TabInfo>>,
    search: RefCell<TabSearch>,
    facets: RefCell<FacetFilter>,
    bookmarks: RefCell<BookmarkResults>,
    nav: RefCell<NavigationIndex>,
    selection: RefCell<BTreeSet<i32>>,
    toasts: RefCell<Vec<Toast>>,
}

impl<B: Browser> PopupSession<B> {
    pub fn new(browser: B) -> Self {
        PopupSession {
            browser,
            gate: Cell::new(OperationGate::Idle),
            config: RefCell::new(ExtensionConfig::default()),
            tabs: RefCell::new(Vec::new()),
            search: RefCell::new(TabSearch::default()),
            facets: RefCell::new(FacetFilter::new()),
            bookmarks: RefCell::new(BookmarkResults::new()),
            nav: RefCell::new(NavigationIndex::new()),
            selection: RefCell::new(BTreeSet::new()),
            toasts: RefCell::new(Vec::new()),
        }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    // Loading

    /// Reload config and tabs. A gate left held by an operation that never
    /// finished is released here.
    pub async fn refresh(&self) {
        let mut gate = self.gate.get();
        if gate.force_reset() {
            self.gate.set(gate);
        }
        self.config.replace(load_config(&self.browser).await);
        self.reload_tabs().await;
    }

    async fn reload_tabs(&self) {
        match self.browser.query_window_tabs().await {
            Ok(tabs) => {
                let ids: HashSet<i32> = tabs.iter().map(|t| t.id).collect();
                self.selection.borrow_mut().retain(|id| ids.contains(id));
                self.search.borrow_mut().invalidate();
                self.tabs.replace(tabs);
            }
            Err(err) => {
                err.log("Failed to load tabs");
                self.push_toast(Toast::from_error(&err));
            }
        }
        self.rebuild_navigation();
    }

    pub fn config(&self) -> ExtensionConfig {
        self.config.borrow().clone()
    }

    pub fn tabs(&self) -> Vec<TabInfo> {
        self.tabs.borrow().clone()
    }

    // Search, facets and bookmarks

    /// Tabs passing the applied query and the active facets
    pub fn visible_tabs(&self) -> Vec<TabInfo> {
        let filtered = {
            let tabs = self.tabs.borrow();
            self.search.borrow_mut().filtered(&tabs)
        };
        self.facets.borrow().apply(filtered)
    }

    fn rebuild_navigation(&self) {
        let visible = self.visible_tabs();
        let hits = self.bookmarks.borrow().visible_hits();
        let query_active = self.search.borrow().has_query();
        self.nav.borrow_mut().rebuild(&visible, &hits, query_active);
    }

    pub fn search_state(&self) -> SearchState {
        self.search.borrow().state().clone()
    }

    pub fn search_delay_ms(&self) -> f64 {
        self.search.borrow().delay_ms()
    }

    /// Record a keystroke. The returned ticket goes to [`Self::fire_search`]
    /// after the quiet period.
    pub fn set_query(&self, query: &str, now: f64) -> Option<DebounceTicket> {
        self.search.borrow_mut().set_query(query, now)
    }

    /// Apply the debounced query. Returns true if the results changed.
    pub async fn fire_search(&self, ticket: DebounceTicket) -> bool {
        let applied = self.search.borrow_mut().fire(ticket);
        if applied {
            self.load_bookmarks().await;
            self.rebuild_navigation();
        }
        applied
    }

    async fn load_bookmarks(&self) {
        let query = self.search.borrow().state().debounced_query.clone();
        if !should_search(&query) {
            self.bookmarks.borrow_mut().clear();
            return;
        }

        let hits = match self.browser.search_bookmarks(query.trim()).await {
            Ok(hits) => filter_hits(hits),
            Err(err) => {
                err.log("Bookmark search failed");
                self.bookmarks.borrow_mut().clear();
                return;
            }
        };

        let parents: BTreeSet<String> = hits.iter().filter_map(|h| h.parent_id.clone()).collect();
        let mut folders = HashMap::new();
        for parent in parents {
            match self.browser.folder_title(&parent).await {
                Ok(Some(title)) => {
                    folders.insert(parent, title);
                }
                Ok(None) => {}
                Err(err) => err.log("Folder lookup failed"),
            }
        }

        // the query may have moved on while we were waiting
        if self.search.borrow().state().debounced_query != query {
            return;
        }
        let groups = group_by_folder(&hits, &folders);
        log::debug!("{} bookmark hits in {} folders", hits.len(), groups.len());
        self.bookmarks.borrow_mut().set(hits, groups);
    }

    pub fn clear_query(&self) {
        self.search.borrow_mut().clear();
        self.bookmarks.borrow_mut().clear();
        self.nav.borrow_mut().clear();
        self.rebuild_navigation();
    }

    pub fn toggle_facet(&self, choice: FacetChoice) {
        self.facets.borrow_mut().toggle(choice);
        self.rebuild_navigation();
    }

    pub fn facets(&self) -> FacetFilter {
        self.facets.borrow().clone()
    }

    pub fn facet_counts(&self) -> FacetCounts {
        facet_counts(&self.tabs.borrow())
    }

    pub fn bookmark_groups(&self) -> Vec<BookmarkGroup> {
        self.bookmarks.borrow().displayed_groups().to_vec()
    }

    pub fn hidden_bookmark_groups(&self) -> usize {
        self.bookmarks.borrow().hidden_group_count()
    }

    pub fn is_bookmark_group_collapsed(&self, name: &str) -> bool {
        self.bookmarks.borrow().is_collapsed(name)
    }

    pub fn toggle_bookmark_group(&self, name: &str) {
        self.bookmarks.borrow_mut().toggle_collapsed(name);
        self.rebuild_navigation();
    }

    pub fn show_all_bookmark_groups(&self, show: bool) {
        self.bookmarks.borrow_mut().show_all(show);
        self.rebuild_navigation();
    }

    // Keyboard navigation

    pub fn navigation_items(&self) -> Vec<NavigationItem> {
        self.nav.borrow().items().to_vec()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.nav.borrow().cursor()
    }

    pub fn is_item_selected(&self, item_id: &str) -> bool {
        self.nav.borrow().is_selected(item_id)
    }

    pub async fn handle_key(&self, key: NavKey) -> KeyEffect {
        match key {
            NavKey::Next => {
                let moved = self.nav.borrow_mut().next();
                moved.map_or(KeyEffect::Ignored, |_| KeyEffect::CursorMoved)
            }
            NavKey::Prev => {
                let moved = self.nav.borrow_mut().prev();
                moved.map_or(KeyEffect::Ignored, |_| KeyEffect::CursorMoved)
            }
            NavKey::Activate => {
                let target = self.nav.borrow().activate();
                match target {
                    Some(target) => self.activate_target(target).await,
                    None => KeyEffect::Ignored,
                }
            }
            NavKey::Remove => {
                let removed = self.nav.borrow_mut().remove_selected();
                let Some(tab_id) = removed else {
                    return KeyEffect::Ignored;
                };
                let outcome = self.browser.remove_tabs(&[tab_id]).await;
                self.reload_tabs().await;
                match outcome {
                    Ok(()) => KeyEffect::TabClosed(tab_id),
                    Err(err) => {
                        err.log("Failed to close tab");
                        self.push_toast(Toast::from_error(&err));
                        KeyEffect::Ignored
                    }
                }
            }
            NavKey::Reset => {
                let query_active = {
                    let search = self.search.borrow();
                    search.has_query() || !search.state().query.is_empty()
                };
                let outcome = self.nav.borrow_mut().reset(query_active);
                match outcome {
                    ResetOutcome::ClearQuery => {
                        self.clear_query();
                        KeyEffect::QueryCleared
                    }
                    ResetOutcome::CursorCleared => KeyEffect::CursorCleared,
                }
            }
            NavKey::FocusSearch => KeyEffect::FocusSearch,
        }
    }

    /// Switch to a tab or open a bookmark, from a key press or a click
    pub async fn activate_target(&self, target: NavTarget) -> KeyEffect {
        let outcome = match &target {
            NavTarget::SwitchToTab(tab_id) => self.browser.activate_tab(*tab_id).await,
            NavTarget::OpenUrl(url) => self.browser.open_url(url).await,
        };
        match outcome {
            Ok(()) => KeyEffect::Activated(target),
            Err(err) => {
                err.log("Activation failed");
                self.push_toast(Toast::from_error(&err));
                KeyEffect::Ignored
            }
        }
    }

    /// Scroll the selected row into view. `scroll` scrolls to a rendered row
    /// by item id and reports whether it exists.
    pub fn scroll_active_into_view<F: FnMut(&str) -> bool>(&self, scroll: F) -> ScrollOutcome {
        let mut view = BookmarkScroll {
            bookmarks: &self.bookmarks,
            scroll,
        };
        let nav = self.nav.borrow();
        scroll_active_into_view(&nav, &mut view)
    }

    // Selection

    pub fn toggle_selected(&self, tab_id: i32) {
        let mut selection = self.selection.borrow_mut();
        if !selection.remove(&tab_id) {
            selection.insert(tab_id);
        }
    }

    pub fn select_all_visible(&self) {
        let visible = self.visible_tabs();
        self.selection.borrow_mut().extend(visible.iter().map(|t| t.id));
    }

    pub fn clear_selection(&self) {
        self.selection.borrow_mut().clear();
    }

    pub fn is_selected(&self, tab_id: i32) -> bool {
        self.selection.borrow().contains(&tab_id)
    }

    pub fn selected_ids(&self) -> Vec<i32> {
        self.selection.borrow().iter().copied().collect()
    }

    // Gated operations

    pub fn gate(&self) -> OperationGate {
        self.gate.get()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.get().is_running()
    }

    fn begin(&self, op: Operation) -> bool {
        let mut gate = self.gate.get();
        let started = gate.try_begin(op);
        self.gate.set(gate);
        started
    }

    async fn finish(&self, toast: Toast) {
        self.gate.set(OperationGate::Idle);
        self.push_toast(toast);
        self.reload_tabs().await;
    }

    /// Sort the window; `None` uses the stored sort options.
    pub async fn sort(&self, spec: Option<SortSpec>) -> Option<BatchOperationResult> {
        if !self.begin(Operation::Sort) {
            return None;
        }
        let spec = spec.unwrap_or(self.config.borrow().sort_options);
        let result = sort_window(&self.browser, &spec).await;
        self.finish(Toast::from_batch("Sort", &result)).await;
        Some(result)
    }

    pub async fn group(&self) -> Option<GroupResult> {
        if !self.begin(Operation::Group) {
            return None;
        }
        let (spec, colors) = {
            let config = self.config.borrow();
            (config.group_spec(), config.custom_colors.clone())
        };
        let result = group_window(&self.browser, &spec, &colors).await;
        self.finish(Toast::from_grouping(&result)).await;
        Some(result)
    }

    pub async fn ungroup(&self) -> Option<BatchOperationResult> {
        if !self.begin(Operation::Ungroup) {
            return None;
        }
        let result = ungroup_all(&self.browser).await;
        self.finish(Toast::from_batch("Ungroup", &result)).await;
        Some(result)
    }

    pub async fn close_selected(&self) -> Option<BatchOperationResult> {
        let ids = self.selected_ids();
        if ids.is_empty() || !self.begin(Operation::CloseSelected) {
            return None;
        }
        let result = close_tabs(&self.browser, &ids).await;
        self.finish(Toast::from_batch("Close", &result)).await;
        Some(result)
    }

    /// Close one tab from its row. Not gated; failures are toasted.
    pub async fn close_tab(&self, tab_id: i32) -> BatchOperationResult {
        let result = close_tabs(&self.browser, &[tab_id]).await;
        if !result.success {
            self.push_toast(Toast::from_batch("Close", &result));
        }
        self.reload_tabs().await;
        result
    }

    /// Open the first bookmarks of a folder group in new tabs
    pub async fn open_bookmark_group(&self, folder: &str) -> Option<BatchOperationResult> {
        let urls = self.bookmarks.borrow().group(folder)?.urls_to_open();
        let result = open_urls(&self.browser, &urls).await;
        self.push_toast(Toast::from_batch("Open bookmarks", &result));
        self.reload_tabs().await;
        Some(result)
    }

    pub async fn group_selected(&self) -> Option<Result<i32, ExtensionError>> {
        let ids = self.selected_ids();
        if ids.is_empty() || !self.begin(Operation::GroupSelected) {
            return None;
        }
        let result = group_selection(&self.browser, &ids).await;
        let toast = match &result {
            Ok(_) => {
                self.clear_selection();
                Toast::new(ToastKind::Success, format!("Grouped {} tabs", ids.len()))
            }
            Err(err) => {
                err.log("Batch group failed");
                Toast::from_error(err)
            }
        };
        self.finish(toast).await;
        Some(result)
    }

    // Toasts

    pub fn push_toast(&self, toast: Toast) {
        self.toasts.borrow_mut().push(toast);
    }

    pub fn dismiss_toast(&self, id: Uuid) {
        self.toasts.borrow_mut().retain(|t| t.id != id);
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::search::TabFacet;
    use crate::tab_data::{BookmarkHit, GroupColor};
    use crate::testing::{FakeBrowser, window};
    use pollster::block_on;

    fn session(urls: &[&str]) -> PopupSession<FakeBrowser> {
        let session = PopupSession::new(FakeBrowser::new(window(urls)));
        block_on(session.refresh());
        session
    }

    fn bookmark(id: &str, title: &str, parent: &str) -> BookmarkHit {
        BookmarkHit {
            id: id.to_string(),
            title: title.to_string(),
            url: Some(format!("https://{}.example", id)),
            parent_id: Some(parent.to_string()),
            date_added: None,
        }
    }

    fn search(session: &PopupSession<FakeBrowser>, query: &str) {
        let ticket = session.set_query(query, 0.0).unwrap();
        assert!(block_on(session.fire_search(ticket)));
    }

    #[test]
    fn test_gate_rejects_second_operation() {
        let mut gate = OperationGate::default();
        assert!(gate.try_begin(Operation::Sort));
        assert!(!gate.try_begin(Operation::Group));
        assert_eq!(gate.running(), Some(Operation::Sort));

        gate.finish();
        assert!(gate.try_begin(Operation::Group));
        assert!(gate.force_reset());
        assert!(!gate.force_reset());
    }

    #[test]
    fn test_busy_session_drops_operations() {
        let session = session(&["https://b.com", "https://a.com"]);
        session.gate.set(OperationGate::Running(Operation::Group));

        assert!(block_on(session.sort(None)).is_none());
        assert_eq!(session.browser().tab_order(), vec![1, 2]);

        // a stuck gate is released by refresh
        block_on(session.refresh());
        assert!(!session.is_busy());
        assert!(block_on(session.sort(None)).unwrap().success);
        assert_eq!(session.browser().tab_order(), vec![2, 1]);
        assert!(!session.is_busy());
    }

    #[test]
    fn test_sort_reloads_and_toasts() {
        let session = session(&["https://b.com", "https://a.com"]);

        block_on(session.sort(None));

        let ids: Vec<i32> = session.tabs().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 1]);
        let toasts = session.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].kind, ToastKind::Success);

        session.dismiss_toast(toasts[0].id);
        assert!(session.toasts().is_empty());
    }

    #[test]
    fn test_group_then_facet_sees_fresh_flags() {
        let session = session(&["https://a.com/1", "https://a.com/2", "https://b.com"]);
        session.toggle_facet(FacetChoice::Only(TabFacet::Grouped));
        assert!(session.visible_tabs().is_empty());

        let result = block_on(session.group()).unwrap();
        assert_eq!(result.group_count, 1);

        let visible: Vec<i32> = session.visible_tabs().iter().map(|t| t.id).collect();
        assert_eq!(visible, vec![1, 2]);
        assert_eq!(session.facet_counts().grouped, 2);
    }

    #[test]
    fn test_empty_grouping_reports_reason() {
        let session = session(&["https://a.com", "https://b.com"]);

        let result = block_on(session.group()).unwrap();

        assert!(result.success);
        assert_eq!(result.group_count, 0);
        assert_eq!(session.toasts()[0].kind, ToastKind::Success);
        assert!(result.message.is_some());
    }

    #[test]
    fn test_query_filters_and_navigates() {
        let session = session(&["https://rust-lang.org", "https://b.com", "https://docs.rs"]);
        assert_eq!(session.navigation_items().len(), 3);

        search(&session, "rust");

        assert_eq!(session.visible_tabs().len(), 1);
        assert_eq!(block_on(session.handle_key(NavKey::Next)), KeyEffect::CursorMoved);
        assert_eq!(
            block_on(session.handle_key(NavKey::Activate)),
            KeyEffect::Activated(NavTarget::SwitchToTab(1))
        );
        assert!(session.browser().tab(1).unwrap().active);
    }

    #[test]
    fn test_bookmarks_lead_while_querying() {
        let session = session(&["https://rust-lang.org"]);
        session.browser().add_folder("f1", "Rust");
        session.browser().add_bookmark(bookmark("b1", "Rust book", "f1"));
        session.browser().add_bookmark(bookmark("b2", "Rustonomicon", "f1"));

        // one char: no bookmark search
        search(&session, "r");
        assert!(session.bookmark_groups().is_empty());

        search(&session, "rust");
        let groups = session.bookmark_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Rust");

        let ids: Vec<String> = session.navigation_items().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["bookmark-b1", "bookmark-b2", "tab-1"]);

        session.toggle_bookmark_group("Rust");
        assert_eq!(session.navigation_items().len(), 1);

        block_on(session.handle_key(NavKey::Next));
        assert_eq!(block_on(session.handle_key(NavKey::Reset)), KeyEffect::QueryCleared);
        assert_eq!(session.cursor(), None);
        assert!(session.bookmark_groups().is_empty());
        assert_eq!(session.search_state().query, "");
    }

    #[test]
    fn test_open_bookmark() {
        let session = session(&["https://a.com"]);
        session.browser().add_bookmark(bookmark("b1", "Rust book", "f1"));
        search(&session, "rust");

        block_on(session.handle_key(NavKey::Next));
        let effect = block_on(session.handle_key(NavKey::Activate));

        assert_eq!(
            effect,
            KeyEffect::Activated(NavTarget::OpenUrl("https://b1.example".to_string()))
        );
        assert_eq!(session.browser().opened_urls(), vec!["https://b1.example"]);
        // unknown folder
        assert_eq!(session.bookmark_groups()[0].name, "Unfiled");
    }

    #[test]
    fn test_open_bookmark_group_caps_and_counts_failures() {
        let session = session(&["https://a.com"]);
        session.browser().add_folder("f1", "Rust");
        for i in 0..12 {
            session.browser().add_bookmark(bookmark(&format!("b{}", i), &format!("Rust {}", i), "f1"));
        }
        session.browser().fail_url("https://b3.example");
        search(&session, "rust");

        let result = block_on(session.open_bookmark_group("Rust")).unwrap();

        assert!(!result.success);
        assert_eq!(result.total_operations, 10);
        assert_eq!(result.successful_operations, 9);
        assert_eq!(result.failed_operations, 1);
        let opened = session.browser().opened_urls();
        assert_eq!(opened.len(), 9);
        assert!(!opened.contains(&"https://b10.example".to_string()));
        assert_eq!(session.toasts().last().unwrap().kind, ToastKind::Warning);

        assert!(block_on(session.open_bookmark_group("Missing")).is_none());
    }

    #[test]
    fn test_remove_key_closes_selected_tab() {
        let session = session(&["https://a.com", "https://b.com"]);

        block_on(session.handle_key(NavKey::Prev));
        assert_eq!(session.cursor(), Some(1));
        assert_eq!(block_on(session.handle_key(NavKey::Remove)), KeyEffect::TabClosed(2));

        assert_eq!(session.browser().tab_order(), vec![1]);
        assert_eq!(session.cursor(), Some(0));

        block_on(session.handle_key(NavKey::Remove));
        assert_eq!(session.cursor(), None);
        assert_eq!(block_on(session.handle_key(NavKey::Remove)), KeyEffect::Ignored);
    }

    #[test]
    fn test_escape_without_query_clears_cursor() {
        let session = session(&["https://a.com"]);
        block_on(session.handle_key(NavKey::Next));

        assert_eq!(block_on(session.handle_key(NavKey::Reset)), KeyEffect::CursorCleared);
        assert_eq!(session.cursor(), None);
    }

    #[test]
    fn test_failed_activation_toasts() {
        let session = session(&["https://a.com"]);
        session.browser().fail_tab(1);
        block_on(session.handle_key(NavKey::Next));

        assert_eq!(block_on(session.handle_key(NavKey::Activate)), KeyEffect::Ignored);
        let toasts = session.toasts();
        assert_eq!(toasts[0].kind, ToastKind::Danger);
        assert_eq!(toasts[0].title, ErrorCode::ChromeApiError.user_message());
    }

    #[test]
    fn test_selection_batch_group_and_close() {
        let session = session(&["https://a.com", "https://b.com", "https://c.com"]);
        assert!(block_on(session.group_selected()).is_none());

        session.toggle_selected(1);
        session.toggle_selected(3);
        let group_id = block_on(session.group_selected()).unwrap().unwrap();

        let group = session
            .browser()
            .groups()
            .into_iter()
            .find(|g| g.id == group_id)
            .unwrap();
        assert_eq!(group.title.as_deref(), Some("Batch Group (2 tabs)"));
        assert_eq!(group.color, Some(GroupColor::Blue));
        assert!(session.selected_ids().is_empty());

        session.select_all_visible();
        assert_eq!(session.selected_ids(), vec![1, 2, 3]);
        session.browser().fail_tab(2);

        let result = block_on(session.close_selected()).unwrap();
        assert_eq!(result.successful_operations, 2);
        assert_eq!(result.failed_operations, 1);
        assert_eq!(session.browser().tab_order(), vec![2]);
        // closed tabs leave the selection
        assert_eq!(session.selected_ids(), vec![2]);
        assert_eq!(session.toasts().last().unwrap().kind, ToastKind::Warning);
    }

    #[test]
    fn test_scroll_expands_collapsed_bookmark_group() {
        let session = session(&[]);
        session.browser().add_bookmark(bookmark("b1", "Rust book", "f1"));
        search(&session, "rust");
        block_on(session.handle_key(NavKey::Next));
        // collapse after the cursor landed on the hit
        session.bookmarks.borrow_mut().set_collapsed("Unfiled", true);

        let mut scrolled = Vec::new();
        let outcome = session.scroll_active_into_view(|id| {
            scrolled.push(id.to_string());
            true
        });

        assert_eq!(outcome, ScrollOutcome::ExpandedThenScrolled);
        assert!(!session.is_bookmark_group_collapsed("Unfiled"));
        assert_eq!(scrolled, vec!["bookmark-b1"]);
    }
}
