use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::bridge::ReadinessPolicy;

/// A template the shell loads by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    pub name: String,
    pub url: String,
    pub minimum_load_budget: Duration,
}

impl TemplateSpec {
    pub fn new(name: &str, url: &str, minimum_load_budget_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            minimum_load_budget: Duration::from_millis(minimum_load_budget_ms),
        }
    }
}

/// Element selectors of the host document the shell writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSelectors {
    pub document_root: String,
    pub app_root: String,
    pub navbar: String,
    pub alerts: String,
    pub system_log: String,
    pub spinner: String,
    pub history_rows: String,
}

impl Default for ShellSelectors {
    fn default() -> Self {
        Self {
            document_root: "html".to_string(),
            app_root: "#app".to_string(),
            navbar: "#nav".to_string(),
            alerts: "#alerts".to_string(),
            system_log: "#system-log".to_string(),
            spinner: "#base-spinner".to_string(),
            history_rows: "#hist".to_string(),
        }
    }
}

/// Attribute names used for declarative wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerAttributes {
    pub action: String,
    pub argument: String,
    pub action_bound: String,
    pub link_bound: String,
}

impl Default for MarkerAttributes {
    fn default() -> Self {
        Self {
            action: "data-action".to_string(),
            argument: "data-id".to_string(),
            action_bound: "data-action-bound".to_string(),
            link_bound: "data-link-bound".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub selectors: ShellSelectors,
    pub markers: MarkerAttributes,
    pub default_path: String,
    /// Path to page module location.
    pub routes: BTreeMap<String, String>,
    pub alert_template: TemplateSpec,
    pub navbar_template: TemplateSpec,
    pub history_row_template: TemplateSpec,
    pub page_load_budget: Duration,
    pub bridge: ReadinessPolicy,
}

impl Default for ShellConfig {
    fn default() -> Self {
        let routes = [
            ("/", crate::pages::index::MODULE),
            ("/history", crate::pages::history::MODULE),
        ]
        .into_iter()
        .map(|(path, module)| (path.to_string(), module.to_string()))
        .collect();

        Self {
            selectors: ShellSelectors::default(),
            markers: MarkerAttributes::default(),
            default_path: "/".to_string(),
            routes,
            alert_template: TemplateSpec::new("alert", "/template/alert.html", 50),
            navbar_template: TemplateSpec::new("navbar", "/template/navbar.html", 10),
            history_row_template: TemplateSpec::new("table_data", "/template/table_data.html", 10),
            page_load_budget: Duration::ZERO,
            bridge: ReadinessPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid GEN7_DEFAULT_PATH: {0}")]
    InvalidDefaultPath(String),
    #[error("invalid GEN7_ROUTES: {0}")]
    InvalidRoutes(String),
    #[error("invalid {key}: {message}")]
    InvalidDuration { key: String, message: String },
}

impl ShellConfig {
    /// Defaults overridden by whatever `lookup` knows. Keys are the
    /// `GEN7_*` names; the browser adapter feeds it the query string and
    /// `window.__GEN7_SHELL_CONFIG__`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let routes = parse_with_lookup(&lookup, "GEN7_ROUTES", defaults.routes, |raw| {
            let routes = serde_json::from_str::<BTreeMap<String, String>>(&raw)
                .map_err(|error| ConfigError::InvalidRoutes(error.to_string()))?;
            if let Some(path) = routes.keys().find(|path| !path.starts_with('/')) {
                return Err(ConfigError::InvalidRoutes(format!(
                    "route {path} must start with /"
                )));
            }
            Ok(routes)
        })?;

        let default_path = lookup("GEN7_DEFAULT_PATH")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or(defaults.default_path);
        if !routes.contains_key(&default_path) {
            return Err(ConfigError::InvalidDefaultPath(format!(
                "{default_path} is not a configured route"
            )));
        }

        let page_load_budget =
            parse_duration_ms(&lookup, "GEN7_PAGE_LOAD_BUDGET_MS", defaults.page_load_budget)?;
        let bridge = ReadinessPolicy {
            initial_delay: parse_duration_ms(
                &lookup,
                "GEN7_BRIDGE_INITIAL_DELAY_MS",
                defaults.bridge.initial_delay,
            )?,
            poll_interval: parse_duration_ms(
                &lookup,
                "GEN7_BRIDGE_POLL_INTERVAL_MS",
                defaults.bridge.poll_interval,
            )?,
            max_wait: parse_duration_ms(
                &lookup,
                "GEN7_BRIDGE_MAX_WAIT_MS",
                defaults.bridge.max_wait,
            )?,
        };
        if bridge.poll_interval.is_zero() {
            return Err(ConfigError::InvalidDuration {
                key: "GEN7_BRIDGE_POLL_INTERVAL_MS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            default_path,
            routes,
            page_load_budget,
            bridge,
            ..Self::default()
        })
    }
}

fn parse_duration_ms(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_with_lookup(lookup, key, default, |raw| {
        raw.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|error| ConfigError::InvalidDuration {
                key: key.to_string(),
                message: error.to_string(),
            })
    })
}

fn parse_with_lookup<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parser: impl FnOnce(String) -> Result<T, ConfigError>,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => parser(raw),
        None => Ok(default),
    }
}
