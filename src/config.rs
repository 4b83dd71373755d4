/// Extension configuration: defaults, validation, merge updates and persistence
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::browser::ConfigStore;
use crate::error::ExtensionError;
use crate::grouping::{ColorStrategy, GroupSpec};
use crate::sorting::{SortRule, SortSpec};
use crate::tab_data::GroupColor;

pub const DEFAULT_AUTO_SORT_DELAY_MS: u64 = 1000;

/// The persisted configuration blob. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionConfig {
    pub default_sort_rule: SortRule,
    pub auto_group_enabled: bool,
    pub auto_sort_enabled: bool,
    /// Quiet period before an automatic sort, in ms
    pub auto_sort_delay: u64,
    pub group_color_preference: ColorStrategy,
    pub custom_colors: BTreeMap<String, GroupColor>,
    pub sort_options: SortSpec,
    pub group_options: GroupSpec,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        ExtensionConfig {
            default_sort_rule: SortRule::Domain,
            auto_group_enabled: true,
            auto_sort_enabled: false,
            auto_sort_delay: DEFAULT_AUTO_SORT_DELAY_MS,
            group_color_preference: ColorStrategy::Auto,
            custom_colors: BTreeMap::new(),
            sort_options: SortSpec::default(),
            group_options: GroupSpec::default(),
        }
    }
}

impl ExtensionConfig {
    pub fn validate(&self) -> Result<(), ExtensionError> {
        if self.group_options.min_tabs_per_group < 1 {
            return Err(ExtensionError::validation("minTabsPerGroup must be at least 1")
                .with_context("minTabsPerGroup", self.group_options.min_tabs_per_group));
        }
        Ok(())
    }

    /// Spec used by automatic sorts: the default rule with the stored direction
    pub fn auto_sort_spec(&self) -> SortSpec {
        SortSpec {
            rule: self.default_sort_rule,
            ..self.sort_options
        }
    }

    /// Grouping policy. An `auto` strategy in the group options defers to the
    /// color preference.
    pub fn group_spec(&self) -> GroupSpec {
        let mut spec = self.group_options;
        if spec.color_strategy == ColorStrategy::Auto {
            spec.color_strategy = self.group_color_preference;
        }
        spec
    }

    pub fn to_value(&self) -> Result<Value, ExtensionError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a stored blob, filling missing fields with defaults.
    pub fn from_value(value: Value) -> Result<Self, ExtensionError> {
        let config: ExtensionConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Deep-merge `patch` over this config and validate the result.
    pub fn apply_update(&self, patch: &Value) -> Result<Self, ExtensionError> {
        if !patch.is_object() {
            return Err(ExtensionError::validation("Config update must be an object"));
        }
        let mut merged = self.to_value()?;
        merge_json(&mut merged, patch);
        Self::from_value(merged)
    }

    pub fn export_json(&self) -> Result<String, ExtensionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn import_json(json: &str) -> Result<Self, ExtensionError> {
        let value: Value = serde_json::from_str(json)?;
        if !is_valid_blob(&value) {
            return Err(ExtensionError::validation("Imported config is missing sortOptions or groupOptions"));
        }
        Self::from_value(value)
    }
}

/// A stored blob is usable only if it is an object carrying both option sets.
pub fn is_valid_blob(value: &Value) -> bool {
    value.get("sortOptions").is_some_and(Value::is_object)
        && value.get("groupOptions").is_some_and(Value::is_object)
}

/// Nested objects merge key by key; every other value replaces the target.
pub fn merge_json(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value)
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// A configuration change, as delivered to listeners
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigChange {
    pub old: ExtensionConfig,
    pub new: ExtensionConfig,
}

impl ConfigChange {
    pub fn auto_sort_disabled(&self) -> bool {
        self.old.auto_sort_enabled && !self.new.auto_sort_enabled
    }
}

/// Read the stored config. Missing or invalid blobs are replaced by the
/// defaults; storage failures fall back to the defaults without writing.
pub async fn load_config<S: ConfigStore>(store: &S) -> ExtensionConfig {
    let stored = match store.load_config().await {
        Ok(stored) => stored,
        Err(err) => {
            err.log("Failed to load config");
            return ExtensionConfig::default();
        }
    };

    let decoded = stored
        .filter(is_valid_blob)
        .map(ExtensionConfig::from_value);

    match decoded {
        Some(Ok(config)) => config,
        other => {
            if let Some(Err(err)) = other {
                err.log("Stored config rejected");
            }
            log::info!("Writing default configuration");
            let defaults = ExtensionConfig::default();
            if let Err(err) = save_config(store, &defaults).await {
                err.log("Failed to store default config");
            }
            defaults
        }
    }
}

pub async fn save_config<S: ConfigStore>(store: &S, config: &ExtensionConfig) -> Result<(), ExtensionError> {
    config.validate()?;
    store.save_config(&config.to_value()?).await
}

/// Merge a partial update into the stored config and persist it.
pub async fn update_config<S: ConfigStore>(store: &S, patch: &Value) -> Result<ConfigChange, ExtensionError> {
    let old = load_config(store).await;
    let new = old.apply_update(patch)?;
    save_config(store, &new).await?;
    log::info!("Configuration updated");
    Ok(ConfigChange { old, new })
}

/// Why the extension was (re)installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update,
    Other,
}

impl InstallReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "install" => InstallReason::Install,
            "update" => InstallReason::Update,
            _ => InstallReason::Other,
        }
    }
}

/// Install writes the defaults; update keeps stored values over new defaults.
pub async fn initialize_config<S: ConfigStore>(store: &S, reason: InstallReason) -> Result<(), ExtensionError> {
    match reason {
        InstallReason::Install => {
            save_config(store, &ExtensionConfig::default()).await?;
            log::info!("Default configuration initialized");
        }
        InstallReason::Update => {
            let config = load_config(store).await;
            save_config(store, &config).await?;
            log::info!("Configuration migrated after update");
        }
        InstallReason::Other => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::FakeBrowser;
    use pollster::block_on;
    use serde_json::json;

    #[test]
    fn test_defaults_serialize_camel_case() {
        let value = ExtensionConfig::default().to_value().unwrap();

        assert_eq!(value["defaultSortRule"], "domain");
        assert_eq!(value["autoGroupEnabled"], true);
        assert_eq!(value["autoSortDelay"], 1000);
        assert_eq!(value["sortOptions"]["caseSensitive"], false);
        assert_eq!(value["groupOptions"]["minTabsPerGroup"], 2);
        assert_eq!(value["groupOptions"]["colorStrategy"], "auto");
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = ExtensionConfig::from_value(json!({
            "autoSortEnabled": true,
            "sortOptions": {"rule": "title"},
            "groupOptions": {}
        }))
        .unwrap();

        assert!(config.auto_sort_enabled);
        assert_eq!(config.sort_options.rule, SortRule::Title);
        assert!(config.sort_options.ascending);
        assert_eq!(config.group_options, GroupSpec::default());
    }

    #[test]
    fn test_merge_json_is_deep() {
        let mut target = json!({"a": 1, "nested": {"x": 1, "y": 2}, "list": [1, 2]});
        merge_json(&mut target, &json!({"nested": {"y": 3}, "list": [9], "b": true}));

        assert_eq!(target, json!({"a": 1, "nested": {"x": 1, "y": 3}, "list": [9], "b": true}));
    }

    #[test]
    fn test_apply_update_validates() {
        let config = ExtensionConfig::default();

        let updated = config
            .apply_update(&json!({"groupOptions": {"maxGroupsPerWindow": 3}}))
            .unwrap();
        assert_eq!(updated.group_options.max_groups_per_window, 3);
        assert_eq!(updated.group_options.min_tabs_per_group, 2);

        let err = config
            .apply_update(&json!({"groupOptions": {"minTabsPerGroup": 0}}))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        assert!(config.apply_update(&json!("nope")).is_err());
    }

    #[test]
    fn test_export_import() {
        let mut config = ExtensionConfig::default();
        config.custom_colors.insert("github.com".to_string(), GroupColor::Purple);

        let json = config.export_json().unwrap();
        assert_eq!(ExtensionConfig::import_json(&json).unwrap(), config);

        assert!(ExtensionConfig::import_json(r#"{"autoSortEnabled": true}"#).is_err());
        assert!(ExtensionConfig::import_json("not json").is_err());
    }

    #[test]
    fn test_auto_sort_and_group_specs() {
        let mut config = ExtensionConfig::default();
        config.default_sort_rule = SortRule::Url;
        config.sort_options.ascending = false;
        config.group_color_preference = ColorStrategy::Random;

        let sort = config.auto_sort_spec();
        assert_eq!(sort.rule, SortRule::Url);
        assert!(!sort.ascending);
        assert_eq!(config.group_spec().color_strategy, ColorStrategy::Random);

        config.group_options.color_strategy = ColorStrategy::Manual;
        assert_eq!(config.group_spec().color_strategy, ColorStrategy::Manual);
    }

    #[test]
    fn test_load_replaces_invalid_blob() {
        let browser = FakeBrowser::new(Vec::new());
        browser.set_stored_config(Some(json!({"autoSortEnabled": true})));

        let config = block_on(load_config(&browser));

        assert_eq!(config, ExtensionConfig::default());
        assert!(is_valid_blob(&browser.stored_config().unwrap()));
    }

    #[test]
    fn test_update_reports_old_and_new() {
        let browser = FakeBrowser::new(Vec::new());
        block_on(initialize_config(&browser, InstallReason::Install)).unwrap();
        block_on(update_config(&browser, &json!({"autoSortEnabled": true}))).unwrap();

        let change = block_on(update_config(&browser, &json!({"autoSortEnabled": false}))).unwrap();

        assert!(change.old.auto_sort_enabled);
        assert!(!change.new.auto_sort_enabled);
        assert!(change.auto_sort_disabled());
        assert_eq!(block_on(load_config(&browser)), change.new);
    }

    #[test]
    fn test_failed_save_keeps_host_error() {
        let browser = FakeBrowser::new(Vec::new());
        browser.fail_config_save();

        let err = block_on(update_config(&browser, &json!({"autoSortEnabled": true}))).unwrap_err();

        assert_eq!(err.code, ErrorCode::ChromeApiError);
        assert_eq!(browser.stored_config(), None);
    }

    #[test]
    fn test_update_install_keeps_stored_values() {
        let browser = FakeBrowser::new(Vec::new());
        browser.set_stored_config(Some(json!({
            "autoSortDelay": 2500,
            "sortOptions": {"rule": "title", "ascending": false},
            "groupOptions": {"minTabsPerGroup": 3}
        })));

        block_on(initialize_config(&browser, InstallReason::Update)).unwrap();

        let stored = browser.stored_config().unwrap();
        assert_eq!(stored["autoSortDelay"], 2500);
        assert_eq!(stored["groupOptions"]["minTabsPerGroup"], 3);
        assert_eq!(stored["groupOptions"]["maxGroupsPerWindow"], 10);
        assert_eq!(stored["autoGroupEnabled"], true);
    }
}
