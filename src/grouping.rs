/// Domain-based grouping: partitioning, group-count policy and color selection
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::tab_data::{GroupColor, TabInfo};

/// How a new group's color is picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorStrategy {
    /// Hash of the domain over the colors not yet used in this run
    #[default]
    Auto,
    /// `customColors` entry for the domain, else `Auto`
    Manual,
    /// Random pick over the colors not yet used in this run
    Random,
}

/// Grouping policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupSpec {
    pub min_tabs_per_group: usize,
    /// Cap on groups per window, existing groups included. 0 disables the cap.
    pub max_groups_per_window: usize,
    pub color_strategy: ColorStrategy,
}

impl Default for GroupSpec {
    fn default() -> Self {
        GroupSpec {
            min_tabs_per_group: 2,
            max_groups_per_window: 10,
            color_strategy: ColorStrategy::Auto,
        }
    }
}

impl GroupSpec {
    /// Threshold actually applied; a bucket can never need fewer than one tab
    pub fn min_tabs(&self) -> usize {
        self.min_tabs_per_group.max(1)
    }
}

/// Tabs sharing one domain key, in scan order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainBucket {
    pub domain: String,
    pub tabs: Vec<TabInfo>,
}

impl DomainBucket {
    pub fn tab_ids(&self) -> Vec<i32> {
        self.tabs.iter().map(|t| t.id).collect()
    }
}

/// Why a partition came out empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum EmptyReason {
    /// Every unpinned tab already belongs to a group
    AllGrouped,
    /// Ungrouped tabs exist but no domain reaches the threshold
    BelowThreshold { min_tabs_per_group: usize },
    /// Buckets met the threshold but the window has no room for more groups
    GroupLimitReached { max_groups: usize },
    /// Nothing to consider at all (no tabs, or pinned tabs only)
    NoTabs,
}

impl EmptyReason {
    pub fn message(&self) -> String {
        match self {
            EmptyReason::AllGrouped => "All tabs are already grouped".to_string(),
            EmptyReason::BelowThreshold { min_tabs_per_group } => format!(
                "At least {} tabs from the same domain are needed to create a group",
                min_tabs_per_group
            ),
            EmptyReason::GroupLimitReached { max_groups } => format!(
                "This window already has the maximum of {} groups",
                max_groups
            ),
            EmptyReason::NoTabs => "No tabs to group".to_string(),
        }
    }
}

/// Buckets that survived filtering, in order of first appearance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub buckets: Vec<DomainBucket>,
    /// Tabs of the window already in a group
    pub already_grouped: usize,
    /// Distinct groups already present in the window
    pub existing_groups: usize,
    /// Domains that reached the threshold but were cut by the group cap
    pub dropped_domains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_reason: Option<EmptyReason>,
}

impl Partition {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn tab_count(&self) -> usize {
        self.buckets.iter().map(|b| b.tabs.len()).sum()
    }

    pub fn bucket(&self, domain: &str) -> Option<&DomainBucket> {
        self.buckets.iter().find(|b| b.domain == domain)
    }
}

/// Partition the ungrouped, unpinned tabs of one window by domain.
///
/// Pinned tabs and tabs already in a group never land in a bucket. Buckets
/// smaller than `min_tabs_per_group` are dropped, then the group cap keeps
/// the largest remaining buckets.
pub fn partition_by_domain(tabs: &[TabInfo], spec: &GroupSpec) -> Partition {
    let min_tabs = spec.min_tabs();

    let already_grouped = tabs.iter().filter(|t| t.is_grouped()).count();
    let existing_groups = tabs
        .iter()
        .filter_map(|t| t.group_id)
        .collect::<HashSet<_>>()
        .len();

    let mut order: Vec<String> = Vec::new();
    let mut by_domain: HashMap<String, Vec<TabInfo>> = HashMap::new();
    let mut candidates = 0;

    for tab in tabs {
        if tab.pinned || tab.is_grouped() {
            continue;
        }
        candidates += 1;
        by_domain
            .entry(tab.domain.clone())
            .or_insert_with(|| {
                order.push(tab.domain.clone());
                Vec::new()
            })
            .push(tab.clone());
    }

    let mut buckets: Vec<DomainBucket> = order
        .into_iter()
        .filter_map(|domain| {
            let tabs = by_domain.remove(&domain)?;
            (tabs.len() >= min_tabs).then_some(DomainBucket { domain, tabs })
        })
        .collect();

    let dropped_domains = enforce_group_cap(&mut buckets, spec.max_groups_per_window, existing_groups);
    if !dropped_domains.is_empty() {
        log::warn!(
            "Group cap {} reached ({} existing); skipping {:?}",
            spec.max_groups_per_window,
            existing_groups,
            dropped_domains
        );
    }

    let empty_reason = if !buckets.is_empty() {
        None
    } else if already_grouped > 0 && candidates == 0 {
        Some(EmptyReason::AllGrouped)
    } else if !dropped_domains.is_empty() {
        Some(EmptyReason::GroupLimitReached {
            max_groups: spec.max_groups_per_window,
        })
    } else if candidates > 0 {
        Some(EmptyReason::BelowThreshold {
            min_tabs_per_group: min_tabs,
        })
    } else {
        Some(EmptyReason::NoTabs)
    };

    Partition {
        buckets,
        already_grouped,
        existing_groups,
        dropped_domains,
        empty_reason,
    }
}

/// Keep at most `max - existing` buckets, largest first (ties by first
/// appearance), preserving the original order of the survivors.
fn enforce_group_cap(buckets: &mut Vec<DomainBucket>, max: usize, existing: usize) -> Vec<String> {
    if max == 0 {
        return Vec::new();
    }
    let room = max.saturating_sub(existing);
    if buckets.len() <= room {
        return Vec::new();
    }

    let mut ranked: Vec<usize> = (0..buckets.len()).collect();
    ranked.sort_by(|a, b| buckets[*b].tabs.len().cmp(&buckets[*a].tabs.len()));
    let keep: HashSet<usize> = ranked.into_iter().take(room).collect();

    let mut dropped = Vec::new();
    let mut position = 0;
    buckets.retain(|bucket| {
        let kept = keep.contains(&position);
        position += 1;
        if !kept {
            dropped.push(bucket.domain.clone());
        }
        kept
    });
    dropped
}

/// 32-bit polynomial string hash: `h = h * 31 + unit` with wraparound,
/// over UTF-16 code units, then the absolute value.
pub fn hash_domain(domain: &str) -> u32 {
    let hash = domain
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)));
    hash.unsigned_abs()
}

/// Pick a color for `domain`, avoiding colors already used in this run.
///
/// Deterministic: the same domain against the same used set always gets the
/// same color. When every color is taken the whole palette is used.
pub fn select_group_color(domain: &str, used: &[GroupColor]) -> GroupColor {
    let hash = hash_domain(domain) as usize;
    let available: Vec<GroupColor> = GroupColor::PALETTE
        .iter()
        .copied()
        .filter(|c| !used.contains(c))
        .collect();

    if available.is_empty() {
        GroupColor::PALETTE[hash % GroupColor::PALETTE.len()]
    } else {
        available[hash % available.len()]
    }
}

fn random_index(len: usize) -> usize {
    let mut bytes = [0u8; 4];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u32::from_le_bytes(bytes) as usize % len,
        Err(err) => {
            log::warn!("Random source unavailable ({}), using first color", err);
            0
        }
    }
}

/// Random pick among unused colors (whole palette once exhausted)
pub fn random_group_color(used: &[GroupColor]) -> GroupColor {
    let available: Vec<GroupColor> = GroupColor::PALETTE
        .iter()
        .copied()
        .filter(|c| !used.contains(c))
        .collect();
    let pool: &[GroupColor] = if available.is_empty() {
        &GroupColor::PALETTE
    } else {
        &available
    };
    pool[random_index(pool.len())]
}

/// Assign one color per bucket, in bucket order.
pub fn assign_colors(
    partition: &Partition,
    strategy: ColorStrategy,
    custom: &BTreeMap<String, GroupColor>,
) -> Vec<GroupColor> {
    let mut used: Vec<GroupColor> = Vec::with_capacity(partition.buckets.len());
    for bucket in &partition.buckets {
        let color = match strategy {
            ColorStrategy::Auto => select_group_color(&bucket.domain, &used),
            ColorStrategy::Random => random_group_color(&used),
            ColorStrategy::Manual => custom
                .get(&bucket.domain)
                .copied()
                .unwrap_or_else(|| select_group_color(&bucket.domain, &used)),
        };
        used.push(color);
    }
    used
}

/// The existing group whose tabs share `tab`'s domain, for auto-grouping a new tab.
pub fn find_matching_group(tab: &TabInfo, window: &[TabInfo]) -> Option<i32> {
    if tab.pinned || tab.is_grouped() {
        return None;
    }
    window
        .iter()
        .filter(|t| t.id != tab.id)
        .find(|t| t.domain == tab.domain && t.is_grouped())
        .and_then(|t| t.group_id)
}
