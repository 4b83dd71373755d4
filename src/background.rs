/// Background worker: message dispatch, shortcut commands, statistics and
/// the automatic sort/group reactions to tab events.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use crate::applier::{BatchOperationResult, group_window, sort_window, ungroup_all};
use crate::browser::{Browser, ChromeBridge};
use crate::config::{ConfigChange, ExtensionConfig, InstallReason, initialize_config, load_config, update_config};
use crate::domain::{count_domains, get_top_domains};
use crate::error::{ErrorCode, ExtensionError};
use crate::grouping::find_matching_group;
use crate::messages::{ConfigUpdated, Request, Response};
use crate::sorting::SortSpec;
use crate::tab_data::{GroupInfo, TabInfo};
use crate::timing::{DebounceTicket, Debouncer, now_ms};

/// Domains listed in the stats
const TOP_DOMAIN_COUNT: usize = 10;
/// Wait before auto-grouping a new tab, so its url has settled
pub const AUTO_GROUP_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabStats {
    pub total_tabs: usize,
    pub pinned_tabs: usize,
    pub grouped_tabs: usize,
    pub ungrouped_tabs: usize,
    pub domains: Vec<String>,
    pub unique_domains: usize,
    pub top_domains: Vec<DomainCount>,
}

impl TabStats {
    pub fn from_tabs(tabs: &[TabInfo]) -> Self {
        let grouped = tabs.iter().filter(|t| t.is_grouped()).count();
        let domains: Vec<String> = tabs.iter().map(|t| t.domain.clone()).collect();
        let unique: HashSet<&str> = domains.iter().map(String::as_str).collect();
        let counts = count_domains(tabs.iter().map(|t| t.url.as_str()));

        TabStats {
            total_tabs: tabs.len(),
            pinned_tabs: tabs.iter().filter(|t| t.pinned).count(),
            grouped_tabs: grouped,
            ungrouped_tabs: tabs.len() - grouped,
            unique_domains: unique.len(),
            domains,
            top_domains: get_top_domains(&counts, TOP_DOMAIN_COUNT)
                .into_iter()
                .map(|(domain, count)| DomainCount { domain, count })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LargestGroup {
    pub id: i32,
    pub title: String,
    pub tab_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub total_groups: usize,
    pub total_grouped_tabs: usize,
    /// Rounded to the nearest whole tab
    pub average_tabs_per_group: usize,
    pub groups_by_color: BTreeMap<String, usize>,
    pub largest_group: Option<LargestGroup>,
}

impl GroupStats {
    pub fn from_groups(groups: &[GroupInfo], tabs: &[TabInfo]) -> Self {
        let mut total_grouped_tabs = 0;
        let mut groups_by_color = BTreeMap::new();
        let mut largest_group: Option<LargestGroup> = None;

        for group in groups {
            let tab_count = tabs.iter().filter(|t| t.group_id == Some(group.id)).count();
            total_grouped_tabs += tab_count;

            let color = group.color.map(|c| c.as_str()).unwrap_or("grey");
            *groups_by_color.entry(color.to_string()).or_insert(0) += 1;

            if largest_group.as_ref().is_none_or(|g| tab_count > g.tab_count) {
                largest_group = Some(LargestGroup {
                    id: group.id,
                    title: group
                        .title
                        .clone()
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| "Untitled group".to_string()),
                    tab_count,
                });
            }
        }

        let average_tabs_per_group = if groups.is_empty() {
            0
        } else {
            (total_grouped_tabs as f64 / groups.len() as f64).round() as usize
        };

        GroupStats {
            total_groups: groups.len(),
            total_grouped_tabs,
            average_tabs_per_group,
            groups_by_color,
            largest_group,
        }
    }
}

/// GET_STATS payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub tabs: TabStats,
    pub groups: GroupStats,
    pub config: ExtensionConfig,
    pub timestamp: f64,
}

/// Keyboard shortcut commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SortTabs,
    GroupTabs,
    UngroupTabs,
}

impl Command {
    pub fn parse(name: &str) -> Option<Command> {
        match name {
            "sort-tabs" => Some(Command::SortTabs),
            "group-tabs" => Some(Command::GroupTabs),
            "ungroup-tabs" => Some(Command::UngroupTabs),
            _ => None,
        }
    }
}

/// The part of a tab update event that matters here
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TabChange {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl TabChange {
    /// Finished loading a new url
    pub fn is_navigation_complete(&self) -> bool {
        self.status.as_deref() == Some("complete") && self.url.is_some()
    }
}

/// A pending auto-sort; the host fires the ticket after `delay_ms`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSort {
    pub ticket: DebounceTicket,
    pub delay_ms: f64,
}

/// Follow-ups for a created tab
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TabCreatedPlan {
    pub auto_sort: Option<ScheduledSort>,
    pub auto_group: bool,
}

/// Background state. One per worker; all state lives on the worker thread.
pub struct Background<B> {
    browser: B,
    auto_sort: RefCell<Debouncer<SortSpec>>,
}

impl<B: Browser> Background<B> {
    pub fn new(browser: B) -> Self {
        Background {
            browser,
            auto_sort: RefCell::new(Debouncer::new(0.0)),
        }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    /// Answer one protocol message. Never fails; errors become error responses.
    pub async fn handle_message(&self, message: Value) -> Response {
        let request = match Request::parse(message) {
            Ok(request) => request,
            Err(err) => {
                err.log("Rejected message");
                return Response::from_error(&err);
            }
        };
        log::debug!("Handling {:?}", request.kind());
        match self.handle_request(request).await {
            Ok(response) => response,
            Err(err) => {
                err.log("Message handling failed");
                Response::from_error(&err)
            }
        }
    }

    pub async fn handle_request(&self, request: Request) -> Result<Response, ExtensionError> {
        match request {
            Request::SortTabs(spec) => {
                let spec = match spec {
                    Some(spec) => spec,
                    None => load_config(&self.browser).await.sort_options,
                };
                let result = sort_window(&self.browser, &spec).await;
                Ok(Response::with_outcome(result.success, &result))
            }
            Request::GroupTabs(spec) => {
                let config = load_config(&self.browser).await;
                let spec = spec.unwrap_or_else(|| config.group_spec());
                let result = group_window(&self.browser, &spec, &config.custom_colors).await;
                Ok(Response::with_outcome(result.success, &result))
            }
            Request::UngroupTabs => {
                let result = ungroup_all(&self.browser).await;
                Ok(Response::with_outcome(result.success, &result))
            }
            Request::UpdateConfig(patch) => {
                let change = update_config(&self.browser, &patch).await?;
                self.on_config_changed(&change);
                let notice = serde_json::to_value(ConfigUpdated::new(&change.new))?;
                self.browser.broadcast(&notice).await;
                Ok(Response::ok(&true))
            }
            Request::GetConfig => Ok(Response::ok(&load_config(&self.browser).await)),
            Request::GetStats => Ok(Response::ok(&self.stats().await?)),
        }
    }

    pub async fn handle_command(&self, name: &str) -> Option<Response> {
        let Some(command) = Command::parse(name) else {
            log::warn!("Unknown command: {}", name);
            return None;
        };
        log::info!("Shortcut triggered: {:?}", command);
        let request = match command {
            Command::SortTabs => Request::SortTabs(None),
            Command::GroupTabs => Request::GroupTabs(None),
            Command::UngroupTabs => Request::UngroupTabs,
        };
        let response = match self.handle_request(request).await {
            Ok(response) => response,
            Err(err) => {
                err.log("Shortcut failed");
                Response::from_error(&err)
            }
        };
        Some(response)
    }

    pub async fn stats(&self) -> Result<Stats, ExtensionError> {
        let tabs = self
            .browser
            .query_window_tabs()
            .await
            .map_err(|e| e.recode(ErrorCode::StatsLoadFailed))?;
        let groups = self
            .browser
            .query_groups()
            .await
            .map_err(|e| e.recode(ErrorCode::StatsLoadFailed))?;
        let config = load_config(&self.browser).await;

        Ok(Stats {
            tabs: TabStats::from_tabs(&tabs),
            groups: GroupStats::from_groups(&groups, &tabs),
            config,
            timestamp: now_ms(),
        })
    }

    pub async fn on_installed(&self, reason: InstallReason) {
        log::info!("Extension installed: {:?}", reason);
        if let Err(err) = initialize_config(&self.browser, reason).await {
            err.log("Failed to initialize configuration");
        }
    }

    /// Replace any pending auto-sort with one due `autoSortDelay` after `now`.
    pub fn schedule_auto_sort(&self, config: &ExtensionConfig, now: f64) -> Option<ScheduledSort> {
        if !config.auto_sort_enabled {
            return None;
        }
        let mut debouncer = self.auto_sort.borrow_mut();
        debouncer.set_delay_ms(config.auto_sort_delay as f64);
        let ticket = debouncer.schedule(config.auto_sort_spec(), now);
        Some(ScheduledSort {
            ticket,
            delay_ms: debouncer.delay_ms(),
        })
    }

    pub fn is_auto_sort_pending(&self) -> bool {
        self.auto_sort.borrow().is_pending()
    }

    /// Run the auto-sort for `ticket` unless it was superseded or auto-sort
    /// got disabled in the meantime.
    pub async fn run_auto_sort(&self, ticket: DebounceTicket) -> Option<BatchOperationResult> {
        let spec = self.auto_sort.borrow_mut().fire(ticket)?;
        let config = load_config(&self.browser).await;
        if !config.auto_sort_enabled {
            log::debug!("Auto-sort disabled, skipping");
            return None;
        }
        log::info!("Running auto-sort by {:?}", spec.rule);
        Some(sort_window(&self.browser, &spec).await)
    }

    pub async fn on_tab_created(&self, tab: &TabInfo) -> TabCreatedPlan {
        let config = load_config(&self.browser).await;
        let auto_sort = if tab.pinned {
            None
        } else {
            self.schedule_auto_sort(&config, now_ms())
        };
        TabCreatedPlan {
            auto_sort,
            auto_group: config.auto_group_enabled && !tab.pinned && !tab.url.is_empty(),
        }
    }

    pub async fn on_tab_updated(&self, change: &TabChange, tab: &TabInfo) -> Option<ScheduledSort> {
        if !change.is_navigation_complete() || tab.pinned {
            return None;
        }
        let config = load_config(&self.browser).await;
        self.schedule_auto_sort(&config, now_ms())
    }

    pub async fn on_tab_removed(&self) -> Option<ScheduledSort> {
        let config = load_config(&self.browser).await;
        self.schedule_auto_sort(&config, now_ms())
    }

    /// Move a new tab into the existing group of its domain, if there is one.
    pub async fn auto_group_tab(&self, tab_id: i32) -> Result<Option<i32>, ExtensionError> {
        let tabs = self.browser.query_window_tabs().await?;
        let Some(tab) = tabs.iter().find(|t| t.id == tab_id) else {
            return Ok(None);
        };
        let Some(group_id) = find_matching_group(tab, &tabs) else {
            return Ok(None);
        };
        self.browser.group_tabs(&[tab_id], Some(group_id)).await?;
        log::info!("Tab {} joined group {}", tab_id, group_id);
        Ok(Some(group_id))
    }

    pub fn on_config_changed(&self, change: &ConfigChange) {
        if change.auto_sort_disabled() && self.auto_sort.borrow_mut().cancel() {
            log::info!("Auto-sort disabled, pending sort cancelled");
        }
    }
}

thread_local! {
    static INSTANCE: Rc<Background<ChromeBridge>> = Rc::new(Background::new(ChromeBridge));
}

/// The worker's background instance
pub fn instance() -> Rc<Background<ChromeBridge>> {
    INSTANCE.with(Rc::clone)
}
