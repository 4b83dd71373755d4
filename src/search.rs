/// Tab search: text query filtering, categorical facets, debounce and memoization
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::tab_data::TabInfo;
use crate::timing::{DEBOUNCE_DELAY_MS, DebounceTicket, Debouncer, Memoizer};

/// Distinct (query, tab list) pairs kept by the search cache
const SEARCH_CACHE_ENTRIES: usize = 64;

/// Case-insensitive substring match on title, url and domain.
///
/// A blank query returns the input unchanged.
pub fn filter_by_query(tabs: &[TabInfo], query: &str) -> Vec<TabInfo> {
    if query.trim().is_empty() {
        return tabs.to_vec();
    }

    let needle = query.to_lowercase();
    tabs.iter()
        .filter(|tab| {
            tab.title.to_lowercase().contains(&needle)
                || tab.url.to_lowercase().contains(&needle)
                || tab.domain.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// A categorical filter on tab flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabFacet {
    Grouped,
    Pinned,
    Audible,
}

impl TabFacet {
    pub const ALL: [TabFacet; 3] = [TabFacet::Grouped, TabFacet::Pinned, TabFacet::Audible];

    pub fn matches(&self, tab: &TabInfo) -> bool {
        match self {
            TabFacet::Grouped => tab.is_grouped(),
            TabFacet::Pinned => tab.pinned,
            TabFacet::Audible => tab.audible,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TabFacet::Grouped => "Grouped",
            TabFacet::Pinned => "Pinned",
            TabFacet::Audible => "Audible",
        }
    }
}

/// What a facet chip click selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetChoice {
    All,
    Only(TabFacet),
}

/// Active facets. No specific facet active means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetFilter {
    active: BTreeSet<TabFacet>,
}

impl FacetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.active.is_empty()
    }

    pub fn is_active(&self, facet: TabFacet) -> bool {
        self.active.contains(&facet)
    }

    pub fn active(&self) -> impl Iterator<Item = TabFacet> + '_ {
        self.active.iter().copied()
    }

    /// "All" clears every facet; a specific facet toggles, and removing the
    /// last one falls back to "all".
    pub fn toggle(&mut self, choice: FacetChoice) {
        match choice {
            FacetChoice::All => self.active.clear(),
            FacetChoice::Only(facet) => {
                if !self.active.remove(&facet) {
                    self.active.insert(facet);
                }
            }
        }
    }

    /// Every active facet must match
    pub fn matches(&self, tab: &TabInfo) -> bool {
        self.active.iter().all(|facet| facet.matches(tab))
    }

    pub fn apply(&self, tabs: Vec<TabInfo>) -> Vec<TabInfo> {
        if self.is_all() {
            return tabs;
        }
        tabs.into_iter().filter(|tab| self.matches(tab)).collect()
    }
}

/// Badge counts for the facet chips
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FacetCounts {
    pub all: usize,
    pub grouped: usize,
    pub pinned: usize,
    pub audible: usize,
}

pub fn facet_counts(tabs: &[TabInfo]) -> FacetCounts {
    FacetCounts {
        all: tabs.len(),
        grouped: tabs.iter().filter(|t| TabFacet::Grouped.matches(t)).count(),
        pinned: tabs.iter().filter(|t| TabFacet::Pinned.matches(t)).count(),
        audible: tabs.iter().filter(|t| TabFacet::Audible.matches(t)).count(),
    }
}

/// Cache key for a search: the query plus the identity of the tab list
/// (its length and ordered ids).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    query: String,
    len: usize,
    ids: Vec<i32>,
}

pub fn search_key(query: &str, tabs: &[TabInfo]) -> SearchKey {
    SearchKey {
        query: query.to_string(),
        len: tabs.len(),
        ids: tabs.iter().map(|t| t.id).collect(),
    }
}

/// Query as typed and as applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub query: String,
    pub debounced_query: String,
    pub is_searching: bool,
}

/// Debounced, memoized tab search.
///
/// Keystrokes go to [`TabSearch::set_query`]; the applied query only changes
/// once the debouncer releases a value. Filtering runs against the applied
/// query and is cached per [`SearchKey`].
#[derive(Debug)]
pub struct TabSearch {
    state: SearchState,
    debouncer: Debouncer<String>,
    cache: Memoizer<SearchKey, Vec<TabInfo>>,
    recomputations: u64,
}

impl Default for TabSearch {
    fn default() -> Self {
        Self::new(DEBOUNCE_DELAY_MS)
    }
}

impl TabSearch {
    pub fn new(delay_ms: f64) -> Self {
        TabSearch {
            state: SearchState::default(),
            debouncer: Debouncer::new(delay_ms),
            cache: Memoizer::new(SEARCH_CACHE_ENTRIES),
            recomputations: 0,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn delay_ms(&self) -> f64 {
        self.debouncer.delay_ms()
    }

    /// True when an applied, non-blank query is active
    pub fn has_query(&self) -> bool {
        !self.state.debounced_query.trim().is_empty()
    }

    /// Record a raw query change. Returns the ticket to fire after the quiet
    /// period, or `None` when nothing needs to be applied.
    pub fn set_query(&mut self, query: &str, now: f64) -> Option<DebounceTicket> {
        self.state.query = query.to_string();
        if query == self.state.debounced_query {
            self.debouncer.cancel();
            self.state.is_searching = false;
            return None;
        }
        self.state.is_searching = true;
        Some(self.debouncer.schedule(query.to_string(), now))
    }

    /// Apply the pending query if `ticket` is still current. Returns true if
    /// the applied query changed.
    pub fn fire(&mut self, ticket: DebounceTicket) -> bool {
        match self.debouncer.fire(ticket) {
            Some(query) => self.apply(query),
            None => false,
        }
    }

    /// Apply the pending query if its quiet period elapsed at `now`.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.debouncer.poll(now) {
            Some(query) => self.apply(query),
            None => false,
        }
    }

    fn apply(&mut self, query: String) -> bool {
        self.state.is_searching = false;
        if query == self.state.debounced_query {
            return false;
        }
        log::debug!("Search query applied: {:?}", query);
        self.state.debounced_query = query;
        true
    }

    /// Drop the query immediately, bypassing the debounce.
    pub fn clear(&mut self) {
        self.debouncer.cancel();
        self.state = SearchState::default();
    }

    /// Tabs matching the applied query, cached per (query, tab list).
    pub fn filtered(&mut self, tabs: &[TabInfo]) -> Vec<TabInfo> {
        let query = self.state.debounced_query.clone();
        let key = search_key(&query, tabs);
        let recomputations = &mut self.recomputations;
        self.cache.get_or_compute(key, || {
            *recomputations += 1;
            filter_by_query(tabs, &query)
        })
    }

    /// Forget cached results. Needed when tab contents change but ids do not.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Number of actual filter scans performed
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}
