/// Applies computed sort orders and partitions to the live browser.
///
/// The host offers no multi-call atomicity, so every apply is a saga: steps
/// run strictly in sequence, each one succeeds or fails on its own, and the
/// outcome is the aggregate. A failed step never stops the remaining ones.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::browser::{GroupApi, TabApi};
use crate::error::{ExtensionError, validate_tab_ids};
use crate::grouping::{GroupSpec, Partition, assign_colors, partition_by_domain};
use crate::sorting::{SortResult, SortSpec, TabMoveOperation, plan_moves, sort_tabs};
use crate::tab_data::{GroupColor, GroupUpdate};
use crate::timing::now_ms;

/// Color of a group created from a manual selection
pub const BATCH_GROUP_COLOR: GroupColor = GroupColor::Blue;

/// Aggregate outcome of a saga
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOperationResult {
    pub success: bool,
    pub total_operations: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<TabMoveOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration: f64,
}

impl BatchOperationResult {
    /// Nothing to do: success with zero operations
    pub fn noop(message: impl Into<String>) -> Self {
        BatchOperationResult {
            success: true,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Failed before any step ran
    pub fn rejected(error: impl Into<String>) -> Self {
        BatchOperationResult {
            success: false,
            errors: vec![error.into()],
            ..Default::default()
        }
    }
}

/// Step bookkeeping for one saga run
struct Saga {
    label: &'static str,
    started: f64,
    total: usize,
    succeeded: usize,
    errors: Vec<String>,
}

impl Saga {
    fn new(label: &'static str, total: usize) -> Self {
        Saga {
            label,
            started: now_ms(),
            total,
            succeeded: 0,
            errors: Vec::new(),
        }
    }

    fn record(&mut self, step: &str, outcome: Result<(), ExtensionError>) {
        match outcome {
            Ok(()) => self.succeeded += 1,
            Err(err) => {
                err.log(self.label);
                self.errors.push(format!("{}: {}", step, err.message));
            }
        }
    }

    fn finish(self, operations: Vec<TabMoveOperation>, message: Option<String>) -> BatchOperationResult {
        let duration = now_ms() - self.started;
        let failed = self.total - self.succeeded;
        if failed == 0 {
            log::info!("{}: {} operations in {:.1}ms", self.label, self.total, duration);
        } else {
            log::warn!("{}: {} of {} operations failed", self.label, failed, self.total);
        }
        BatchOperationResult {
            success: self.errors.is_empty(),
            total_operations: self.total,
            successful_operations: self.succeeded,
            failed_operations: failed,
            errors: self.errors,
            operations,
            message,
            duration,
        }
    }
}

/// Move tabs into the order of `result`, one move at a time in target order.
pub async fn apply_sorting<T: TabApi>(api: &T, result: &SortResult) -> BatchOperationResult {
    if !result.success {
        return BatchOperationResult::rejected(
            result.error.clone().unwrap_or_else(|| "Invalid sort result".to_string()),
        );
    }

    let operations = plan_moves(&result.tabs);
    let mut saga = Saga::new("Apply sort", operations.len());
    for op in &operations {
        let outcome = api.move_tab(op.tab_id, op.to_index).await;
        saga.record(&format!("Move tab {}", op.tab_id), outcome);
    }
    saga.finish(operations, None)
}

/// Sort the current window by `spec`
pub async fn sort_window<T: TabApi>(api: &T, spec: &SortSpec) -> BatchOperationResult {
    let tabs = match api.query_window_tabs().await {
        Ok(tabs) => tabs,
        Err(err) => {
            err.log("Sort window");
            return BatchOperationResult::rejected(err.message);
        }
    };
    if tabs.is_empty() {
        return BatchOperationResult::noop("No tabs to sort");
    }
    apply_sorting(api, &sort_tabs(&tabs, spec)).await
}

/// Create one group per bucket, titled with its domain and colored with the
/// matching entry of `colors`.
pub async fn apply_partition<B: TabApi + GroupApi>(
    api: &B,
    partition: &Partition,
    colors: &[GroupColor],
) -> BatchOperationResult {
    if partition.is_empty() {
        let message = partition
            .empty_reason
            .map(|r| r.message())
            .unwrap_or_else(|| "No tabs to group".to_string());
        return BatchOperationResult::noop(message);
    }

    let mut saga = Saga::new("Apply grouping", partition.buckets.len());
    for (i, bucket) in partition.buckets.iter().enumerate() {
        let update = GroupUpdate {
            title: Some(bucket.domain.clone()),
            color: colors.get(i).copied(),
        };
        let outcome = create_group(api, &bucket.tab_ids(), &update).await;
        saga.record(&format!("Group {}", bucket.domain), outcome.map(|_| ()));
    }
    saga.finish(Vec::new(), None)
}

async fn create_group<B: TabApi + GroupApi>(
    api: &B,
    tab_ids: &[i32],
    update: &GroupUpdate,
) -> Result<i32, ExtensionError> {
    let group_id = api.group_tabs(tab_ids, None).await?;
    if !update.is_empty() {
        api.update_group(group_id, update).await?;
    }
    Ok(group_id)
}

/// Outcome of a group-by-domain request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    pub success: bool,
    pub group_count: usize,
    pub tab_count: usize,
    pub already_grouped_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped_domains: Vec<String>,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub batch: BatchOperationResult,
}

/// Partition the current window by domain and create the groups.
pub async fn group_window<B: TabApi + GroupApi>(
    api: &B,
    spec: &GroupSpec,
    custom_colors: &BTreeMap<String, GroupColor>,
) -> GroupResult {
    let started = now_ms();
    let tabs = match api.query_window_tabs().await {
        Ok(tabs) => tabs,
        Err(err) => {
            err.log("Group window");
            let batch = BatchOperationResult::rejected(err.message.clone());
            return GroupResult {
                success: false,
                group_count: 0,
                tab_count: 0,
                already_grouped_count: 0,
                dropped_domains: Vec::new(),
                duration: now_ms() - started,
                message: None,
                error: Some(err.message),
                batch,
            };
        }
    };

    let partition = partition_by_domain(&tabs, spec);
    if !partition.dropped_domains.is_empty() {
        log::info!(
            "Group cap {} reached, leaving {:?} ungrouped",
            spec.max_groups_per_window,
            partition.dropped_domains
        );
    }
    let colors = assign_colors(&partition, spec.color_strategy, custom_colors);
    let batch = apply_partition(api, &partition, &colors).await;

    GroupResult {
        success: batch.success,
        group_count: batch.successful_operations,
        tab_count: tabs.len(),
        already_grouped_count: partition.already_grouped,
        dropped_domains: partition.dropped_domains.clone(),
        duration: now_ms() - started,
        message: batch.message.clone(),
        error: if batch.success {
            None
        } else {
            Some("Failed to apply grouping".to_string())
        },
        batch,
    }
}

/// Ungroup every group of the current window, one step per group.
pub async fn ungroup_all<B: TabApi + GroupApi>(api: &B) -> BatchOperationResult {
    let (groups, tabs) = match (api.query_groups().await, api.query_window_tabs().await) {
        (Ok(groups), Ok(tabs)) => (groups, tabs),
        (Err(err), _) | (_, Err(err)) => {
            err.log("Ungroup all");
            return BatchOperationResult::rejected(err.message);
        }
    };
    if groups.is_empty() {
        return BatchOperationResult::noop("No groups to ungroup in this window");
    }

    let mut saga = Saga::new("Ungroup all", groups.len());
    for group in &groups {
        let members: Vec<i32> = tabs
            .iter()
            .filter(|t| t.group_id == Some(group.id))
            .map(|t| t.id)
            .collect();
        let outcome = if members.is_empty() {
            Ok(())
        } else {
            api.ungroup_tabs(&members).await
        };
        saga.record(&format!("Ungroup {}", group.id), outcome);
    }
    let message = (saga.succeeded > 0).then(|| format!("Ungrouped {} groups", saga.succeeded));
    saga.finish(Vec::new(), message)
}

/// Close tabs one by one so a single failure does not keep the others open.
pub async fn close_tabs<T: TabApi>(api: &T, tab_ids: &[i32]) -> BatchOperationResult {
    let ids = match validate_tab_ids(tab_ids) {
        Ok(ids) => ids,
        Err(err) => return BatchOperationResult::rejected(err.message),
    };

    let mut saga = Saga::new("Close tabs", ids.len());
    for id in &ids {
        let outcome = api.remove_tabs(&[*id]).await;
        saga.record(&format!("Close tab {}", id), outcome);
    }
    let message = format!("Closed {} tabs", saga.succeeded);
    saga.finish(Vec::new(), Some(message))
}

/// Open each url in a new tab, in order
pub async fn open_urls<T: TabApi>(api: &T, urls: &[String]) -> BatchOperationResult {
    if urls.is_empty() {
        return BatchOperationResult::noop("Nothing to open");
    }

    let mut saga = Saga::new("Open urls", urls.len());
    for url in urls {
        let outcome = api.open_url(url).await;
        saga.record(&format!("Open {}", url), outcome);
    }
    let message = format!("Opened {} tabs", saga.succeeded);
    saga.finish(Vec::new(), Some(message))
}

/// Put a manual selection into one new group
pub async fn group_selection<B: TabApi + GroupApi>(api: &B, tab_ids: &[i32]) -> Result<i32, ExtensionError> {
    let ids = validate_tab_ids(tab_ids)?;
    let update = GroupUpdate {
        title: Some(format!("Batch Group ({} tabs)", ids.len())),
        color: Some(BATCH_GROUP_COLOR),
    };
    let group_id = create_group(api, &ids, &update).await?;
    log::info!("Grouped {} selected tabs into {}", ids.len(), group_id);
    Ok(group_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::ColorStrategy;
    use crate::sorting::SortRule;
    use crate::testing::{FakeBrowser, window};
    use pollster::block_on;

    #[test]
    fn test_apply_sorting_reaches_sorted_order() {
        let browser = FakeBrowser::new(window(&[
            "https://c.com",
            "https://a.com",
            "https://d.com",
            "https://b.com",
        ]));

        let result = block_on(sort_window(&browser, &SortSpec::new(SortRule::Domain, true)));

        assert!(result.success);
        assert_eq!(browser.tab_order(), vec![2, 4, 1, 3]);
        assert_eq!(result.failed_operations, 0);
        assert_eq!(result.total_operations, result.operations.len());
    }

    #[test]
    fn test_sorted_window_needs_no_moves() {
        let browser = FakeBrowser::new(window(&["https://a.com", "https://b.com"]));

        let result = block_on(sort_window(&browser, &SortSpec::default()));

        assert!(result.success);
        assert_eq!(result.total_operations, 0);
        assert!(browser.calls().is_empty());
    }

    #[test]
    fn test_failed_move_does_not_abort() {
        let browser = FakeBrowser::new(window(&[
            "https://c.com",
            "https://b.com",
            "https://a.com",
        ]));
        browser.fail_tab(3);

        let result = block_on(sort_window(&browser, &SortSpec::default()));

        assert!(!result.success);
        assert_eq!(result.failed_operations, 1);
        assert!(result.successful_operations >= 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Move tab 3"));
    }

    #[test]
    fn test_rejected_sort_result() {
        let browser = FakeBrowser::new(window(&["https://a.com"]));
        let mut result = sort_tabs(&browser.tabs(), &SortSpec::default());
        result.success = false;
        result.error = Some("bad".to_string());

        let batch = block_on(apply_sorting(&browser, &result));

        assert!(!batch.success);
        assert_eq!(batch.total_operations, 0);
        assert_eq!(batch.errors, vec!["bad".to_string()]);
    }

    #[test]
    fn test_group_window_creates_titled_groups() {
        let browser = FakeBrowser::new(window(&[
            "https://a.com/1",
            "https://b.com/1",
            "https://a.com/2",
            "https://c.com/1",
            "https://b.com/2",
            "https://b.com/3",
        ]));

        let result = block_on(group_window(&browser, &GroupSpec::default(), &BTreeMap::new()));

        assert!(result.success);
        assert_eq!(result.group_count, 2);
        let titles: Vec<Option<String>> = browser.groups().into_iter().map(|g| g.title).collect();
        assert_eq!(titles, vec![Some("a.com".to_string()), Some("b.com".to_string())]);
        assert!(!browser.tab(4).unwrap().is_grouped());
    }

    #[test]
    fn test_empty_partition_is_noop() {
        let browser = FakeBrowser::new(window(&["https://a.com", "https://a.com/x"]));
        browser.add_group(7, "a", GroupColor::Red, &[1, 2]);

        let result = block_on(group_window(&browser, &GroupSpec::default(), &BTreeMap::new()));

        assert!(result.success);
        assert_eq!(result.batch.total_operations, 0);
        assert_eq!(result.already_grouped_count, 2);
        assert_eq!(result.message.as_deref(), Some("All tabs are already grouped"));
        assert!(!browser.calls().iter().any(|c| c.starts_with("group")));
    }

    #[test]
    fn test_partition_failure_is_per_bucket() {
        let browser = FakeBrowser::new(window(&[
            "https://a.com/1",
            "https://a.com/2",
            "https://b.com/1",
            "https://b.com/2",
        ]));
        browser.fail_tab(1);

        let tabs = browser.tabs();
        let partition = partition_by_domain(&tabs, &GroupSpec::default());
        let colors = assign_colors(&partition, ColorStrategy::Auto, &BTreeMap::new());
        let result = block_on(apply_partition(&browser, &partition, &colors));

        assert!(!result.success);
        assert_eq!(result.total_operations, 2);
        assert_eq!(result.successful_operations, 1);
        assert_eq!(result.failed_operations, 1);
        assert_eq!(browser.groups().len(), 1);
        assert_eq!(browser.groups()[0].color, Some(colors[1]));
    }

    #[test]
    fn test_failed_group_update_counts_bucket_as_failed() {
        let browser = FakeBrowser::new(window(&[
            "https://a.com/1",
            "https://a.com/2",
            "https://b.com/1",
            "https://b.com/2",
        ]));
        // first group the fake hands out
        browser.fail_group(100);

        let tabs = browser.tabs();
        let partition = partition_by_domain(&tabs, &GroupSpec::default());
        let colors = assign_colors(&partition, ColorStrategy::Auto, &BTreeMap::new());
        let result = block_on(apply_partition(&browser, &partition, &colors));

        assert!(!result.success);
        assert_eq!(result.successful_operations, 1);
        assert_eq!(result.failed_operations, 1);
        assert!(result.errors[0].starts_with("Group a.com"));

        // the tabs stay grouped, just without a title
        let groups = browser.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, 100);
        assert_eq!(groups[0].title, None);
        assert_eq!(groups[1].title.as_deref(), Some("b.com"));
        assert_eq!(browser.tab(1).unwrap().group_id, Some(100));
    }

    #[test]
    fn test_ungroup_all() {
        let browser = FakeBrowser::new(window(&["https://a.com", "https://b.com", "https://c.com"]));
        browser.add_group(1, "a", GroupColor::Red, &[1]);
        browser.add_group(2, "b", GroupColor::Blue, &[2, 3]);

        let result = block_on(ungroup_all(&browser));

        assert!(result.success);
        assert_eq!(result.successful_operations, 2);
        assert!(browser.tabs().iter().all(|t| !t.is_grouped()));

        let again = block_on(ungroup_all(&browser));
        assert!(again.success);
        assert_eq!(again.total_operations, 0);
    }

    #[test]
    fn test_close_tabs_partial_failure() {
        let browser = FakeBrowser::new(window(&["https://a.com", "https://b.com", "https://c.com"]));
        browser.fail_tab(2);

        let result = block_on(close_tabs(&browser, &[1, 2, 3, -4]));

        assert!(!result.success);
        assert_eq!(result.total_operations, 3);
        assert_eq!(result.successful_operations, 2);
        assert_eq!(browser.tab_order(), vec![2]);
    }

    #[test]
    fn test_open_urls_counts_failures() {
        let browser = FakeBrowser::new(Vec::new());
        browser.fail_url("https://b.com");
        let urls: Vec<String> = ["https://a.com", "https://b.com", "https://c.com"]
            .iter()
            .map(|u| u.to_string())
            .collect();

        let result = block_on(open_urls(&browser, &urls));

        assert!(!result.success);
        assert_eq!(result.total_operations, 3);
        assert_eq!(result.successful_operations, 2);
        assert_eq!(browser.opened_urls(), vec!["https://a.com", "https://c.com"]);

        let empty = block_on(open_urls(&browser, &[]));
        assert!(empty.success);
        assert_eq!(empty.total_operations, 0);
    }

    #[test]
    fn test_close_tabs_rejects_invalid_ids() {
        let browser = FakeBrowser::new(window(&["https://a.com"]));
        let result = block_on(close_tabs(&browser, &[0, -1]));
        assert!(!result.success);
        assert!(browser.calls().is_empty());
    }

    #[test]
    fn test_group_selection() {
        let browser = FakeBrowser::new(window(&["https://a.com", "https://b.com", "https://c.com"]));

        let group_id = block_on(group_selection(&browser, &[1, 3])).unwrap();

        let group = browser.groups().into_iter().find(|g| g.id == group_id).unwrap();
        assert_eq!(group.title.as_deref(), Some("Batch Group (2 tabs)"));
        assert_eq!(group.color, Some(GroupColor::Blue));
        assert_eq!(browser.tab(3).unwrap().group_id, Some(group_id));
    }
}
