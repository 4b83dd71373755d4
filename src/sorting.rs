/// Tab ordering: sort rules, stable sorting and move planning
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::tab_data::TabInfo;
use crate::timing::now_ms;

/// Key a sort orders by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortRule {
    #[default]
    Domain,
    Title,
    Url,
    LastAccessed,
    Index,
}

impl SortRule {
    pub const ALL: [SortRule; 5] = [
        SortRule::Domain,
        SortRule::Title,
        SortRule::Url,
        SortRule::LastAccessed,
        SortRule::Index,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SortRule::Domain => "Domain",
            SortRule::Title => "Title",
            SortRule::Url => "URL",
            SortRule::LastAccessed => "Last accessed",
            SortRule::Index => "Position",
        }
    }
}

/// How to sort. Built from configuration or a one-off user choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SortSpec {
    pub rule: SortRule,
    pub ascending: bool,
    /// When false, text compares case-folded first
    pub case_sensitive: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec {
            rule: SortRule::Domain,
            ascending: true,
            case_sensitive: false,
        }
    }
}

impl SortSpec {
    pub fn new(rule: SortRule, ascending: bool) -> Self {
        SortSpec {
            rule,
            ascending,
            case_sensitive: false,
        }
    }
}

/// Outcome of [`sort_tabs`]. On error `tabs` is the input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortResult {
    pub success: bool,
    pub tabs: Vec<TabInfo>,
    pub original_count: usize,
    pub sorted_count: usize,
    pub rule: SortRule,
    pub ascending: bool,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A single `move(tabId, toIndex)` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabMoveOperation {
    pub tab_id: i32,
    pub from_index: i32,
    pub to_index: i32,
}

enum SortKey<'a> {
    Text(&'a str),
    Number(f64),
}

fn sort_key(tab: &TabInfo, rule: SortRule) -> SortKey<'_> {
    match rule {
        SortRule::Domain => SortKey::Text(&tab.domain),
        SortRule::Title => SortKey::Text(&tab.title),
        SortRule::Url => SortKey::Text(&tab.url),
        SortRule::LastAccessed => SortKey::Number(tab.last_accessed),
        SortRule::Index => SortKey::Number(f64::from(tab.index)),
    }
}

/// Collation used for every text rule.
///
/// Case-insensitive mode compares the lowercase forms and, only when those
/// tie, puts lowercase before uppercase. Identical strings compare equal, so
/// the stable sort keeps their input order.
pub fn compare_text(a: &str, b: &str, case_sensitive: bool) -> Ordering {
    if case_sensitive {
        return a.cmp(b);
    }
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

fn compare_keys(a: &SortKey<'_>, b: &SortKey<'_>, case_sensitive: bool) -> Ordering {
    match (a, b) {
        (SortKey::Text(a), SortKey::Text(b)) => compare_text(a, b, case_sensitive),
        (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
        // a rule always yields one kind of key
        _ => Ordering::Equal,
    }
}

fn validate(tabs: &[TabInfo], rule: SortRule) -> Result<(), String> {
    if rule == SortRule::LastAccessed {
        if let Some(tab) = tabs.iter().find(|t| !t.last_accessed.is_finite()) {
            return Err(format!("Tab {} has no usable access time", tab.id));
        }
    }
    Ok(())
}

/// Sort a snapshot by `spec`. The input is never modified.
///
/// The sort is stable: tabs with equal keys keep their input order for
/// every rule and both directions.
pub fn sort_tabs(tabs: &[TabInfo], spec: &SortSpec) -> SortResult {
    let start = now_ms();

    if let Err(message) = validate(tabs, spec.rule) {
        log::error!("Failed to sort tabs: {}", message);
        return SortResult {
            success: false,
            tabs: tabs.to_vec(),
            original_count: tabs.len(),
            sorted_count: tabs.len(),
            rule: spec.rule,
            ascending: spec.ascending,
            duration_ms: now_ms() - start,
            error: Some(message),
        };
    }

    let mut keyed: Vec<(&TabInfo, SortKey<'_>)> =
        tabs.iter().map(|tab| (tab, sort_key(tab, spec.rule))).collect();

    keyed.sort_by(|a, b| {
        let ord = compare_keys(&a.1, &b.1, spec.case_sensitive);
        if spec.ascending { ord } else { ord.reverse() }
    });

    let sorted: Vec<TabInfo> = keyed.into_iter().map(|(tab, _)| tab.clone()).collect();
    let duration_ms = now_ms() - start;
    log::debug!(
        "Sorted {} tabs by {:?} ({}) in {:.2}ms",
        sorted.len(),
        spec.rule,
        if spec.ascending { "asc" } else { "desc" },
        duration_ms
    );

    SortResult {
        success: true,
        original_count: tabs.len(),
        sorted_count: sorted.len(),
        tabs: sorted,
        rule: spec.rule,
        ascending: spec.ascending,
        duration_ms,
        error: None,
    }
}

/// Plan the moves that turn the current window order into `sorted`.
///
/// Tab `i` of `sorted` must end at index `i`. Moves are listed in target
/// order; `from_index` is where the tab sits after all earlier moves, and a
/// tab that is already in place gets no move.
pub fn plan_moves(sorted: &[TabInfo]) -> Vec<TabMoveOperation> {
    let mut live: Vec<&TabInfo> = sorted.iter().collect();
    live.sort_by_key(|tab| tab.index);
    let mut live: Vec<i32> = live.into_iter().map(|tab| tab.id).collect();

    let mut operations = Vec::new();
    for (target, tab) in sorted.iter().enumerate() {
        let Some(current) = live.iter().position(|id| *id == tab.id) else {
            continue;
        };
        if current != target {
            operations.push(TabMoveOperation {
                tab_id: tab.id,
                from_index: current as i32,
                to_index: target as i32,
            });
            let id = live.remove(current);
            live.insert(target, id);
        }
    }
    operations
}
