use std::rc::Rc;

use thiserror::Error;

/// Where failures that cannot propagate to a caller (click handlers,
/// link navigations) are reported.
pub type ErrorSink = Rc<dyn Fn(&ShellError)>;

/// Failures surfaced by the shell engine.
///
/// The enum is `Clone` because template fetches are shared between concurrent
/// callers and every waiter receives its own copy of the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellError {
    #[error("bridge_unavailable: host api did not appear within {waited_ms}ms")]
    BridgeUnavailable { waited_ms: u64 },
    #[error("bridge_call_failed:{method}: {message}")]
    BridgeCall { method: String, message: String },
    #[error("template_load_failed:{name} ({url}): {message}")]
    TemplateLoad {
        name: String,
        url: String,
        message: String,
    },
    #[error("render_target_missing:{selector}")]
    RenderTargetMissing { selector: String },
    #[error("route_not_found:{path}")]
    RouteNotFound { path: String },
    #[error("navigation_superseded:{path}")]
    NavigationSuperseded { path: String },
    #[error("invalid_action_name:{name}")]
    InvalidActionName { name: String },
    #[error("page_module_missing:{module}")]
    PageModuleMissing { module: String },
    #[error("dom_failure: {message}")]
    Dom { message: String },
}

impl ShellError {
    pub fn bridge_call(method: &str, message: impl Into<String>) -> Self {
        Self::BridgeCall {
            method: method.to_string(),
            message: message.into(),
        }
    }

    pub fn render_target_missing(selector: &str) -> Self {
        Self::RenderTargetMissing {
            selector: selector.to_string(),
        }
    }

    pub fn route_not_found(path: &str) -> Self {
        Self::RouteNotFound {
            path: path.to_string(),
        }
    }

    /// Short machine-readable code, the part of the display string before `:`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BridgeUnavailable { .. } => "bridge_unavailable",
            Self::BridgeCall { .. } => "bridge_call_failed",
            Self::TemplateLoad { .. } => "template_load_failed",
            Self::RenderTargetMissing { .. } => "render_target_missing",
            Self::RouteNotFound { .. } => "route_not_found",
            Self::NavigationSuperseded { .. } => "navigation_superseded",
            Self::InvalidActionName { .. } => "invalid_action_name",
            Self::PageModuleMissing { .. } => "page_module_missing",
            Self::Dom { .. } => "dom_failure",
        }
    }

    /// Superseded navigations are expected under rapid clicking and are not
    /// reported to the user.
    #[must_use]
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NavigationSuperseded { .. })
    }
}
