use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config::ShellSelectors;
use crate::diagnostics::ShellDiagnostics;
use crate::dom::ShellDom;
use crate::error::ShellError;
use crate::template::{RenderContext, TemplateHandle};

pub const DEGRADED_MESSAGE: &str = "Unable to load the app. Host API is unavailable. Please refresh";
const ERROR_ICON: &str = r#"<i class="bi bi-exclamation-octagon-fill text-danger"></i>"#;

/// The status surface of the host document: the system log line, the
/// loading spinner and the alert region.
pub struct ShellStatus<D: ShellDom> {
    dom: Rc<D>,
    selectors: ShellSelectors,
    diagnostics: Rc<RefCell<ShellDiagnostics>>,
    alert: RefCell<Option<TemplateHandle<D>>>,
    degraded: Cell<bool>,
}

impl<D: ShellDom> ShellStatus<D> {
    pub fn new(
        dom: Rc<D>,
        selectors: ShellSelectors,
        diagnostics: Rc<RefCell<ShellDiagnostics>>,
    ) -> Self {
        Self {
            dom,
            selectors,
            diagnostics,
            alert: RefCell::new(None),
            degraded: Cell::new(false),
        }
    }

    pub fn set_log(&self, text: &str) {
        tracing::info!(target: "gen7_shell::syslog", "{text}");
        if let Some(log) = self.dom.query(&self.selectors.system_log) {
            self.dom.set_text(&log, text);
        }
    }

    pub fn set_phase(&self, phase: &str, detail: &str) {
        self.diagnostics.borrow_mut().set_phase(phase, detail);
        self.set_log(detail);
    }

    pub fn use_alert_template(&self, template: TemplateHandle<D>) {
        *self.alert.borrow_mut() = Some(template);
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.get()
    }

    /// Shows a failure to the user without stopping the shell. Superseded
    /// navigations are dropped.
    pub fn report_error(&self, error: &ShellError) {
        if error.is_benign() {
            tracing::debug!(%error, "ignoring benign failure");
            return;
        }
        tracing::error!(code = error.code(), %error, "shell operation failed");
        self.diagnostics.borrow_mut().last_error = Some(error.to_string());

        let message = user_message(error);
        let alert = self.alert.borrow().clone();
        let shown = alert.is_some_and(|alert| {
            let context = RenderContext::new()
                .with("message", message.as_str())
                .with("code", error.code());
            alert
                .batch_append(&self.selectors.alerts, std::slice::from_ref(&context))
                .is_ok()
        });
        if !shown && let Some(log) = self.dom.query(&self.selectors.system_log) {
            self.dom.add_class(&log, "text-danger");
            self.dom.set_text(&log, &message);
        }
    }

    /// Terminal failure display for a shell that could not start.
    pub fn enter_degraded(&self, error: &ShellError) {
        self.degraded.set(true);
        {
            let mut diagnostics = self.diagnostics.borrow_mut();
            diagnostics.set_phase("error", "startup failed");
            diagnostics.last_error = Some(error.to_string());
        }
        tracing::error!(code = error.code(), %error, "shell startup failed");

        let (Some(spinner), Some(log)) = (
            self.dom.query(&self.selectors.spinner),
            self.dom.query(&self.selectors.system_log),
        ) else {
            self.rebuild_degraded_indicator();
            return;
        };
        self.dom.remove_class(&spinner, "spinner-border");
        self.dom.add_class(&spinner, "fs-3");
        self.dom.set_inner_html(&spinner, ERROR_ICON);
        self.dom.add_class(&log, "text-danger");
        self.dom.set_text(&log, DEGRADED_MESSAGE);
    }

    /// Startup clears the app root once the host API is up, taking the
    /// spinner and log with it. A later failure draws them again there.
    fn rebuild_degraded_indicator(&self) {
        let Some(app) = self.dom.query(&self.selectors.app_root) else {
            tracing::warn!(selector = %self.selectors.app_root, "no place to show the startup failure");
            return;
        };
        let markup = format!(
            r#"<span{} class="fs-3">{ERROR_ICON}</span><p{} class="text-danger">{}</p>"#,
            id_attribute(&self.selectors.spinner),
            id_attribute(&self.selectors.system_log),
            html_escape::encode_text(DEGRADED_MESSAGE),
        );
        self.dom.set_inner_html(&app, &markup);
    }
}

fn id_attribute(selector: &str) -> String {
    selector
        .strip_prefix('#')
        .filter(|id| {
            !id.is_empty()
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        })
        .map(|id| format!(r#" id="{id}""#))
        .unwrap_or_default()
}

fn user_message(error: &ShellError) -> String {
    match error {
        ShellError::RouteNotFound { path } => format!("Page {path} does not exist"),
        ShellError::BridgeCall { method, message } => {
            format!("The host could not complete {method}: {message}")
        }
        ShellError::TemplateLoad { name, .. } => format!("Unable to load {name}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dom::memory::MemoryDom;
    use crate::template::TemplateCache;
    use crate::testing::{FakeFetcher, TestRuntime};

    const PAGE: &str = r#"<html class="no-scrollbar"><body>
        <div id="base-spinner" class="spinner-border"></div>
        <p id="system-log">Loading</p>
        <div id="alerts"></div>
        <div id="app"></div>
    </body></html>"#;

    fn status(dom: Rc<MemoryDom>) -> ShellStatus<MemoryDom> {
        ShellStatus::new(
            dom,
            ShellSelectors::default(),
            Rc::new(RefCell::new(ShellDiagnostics::default())),
        )
    }

    #[test]
    fn degraded_state_swaps_spinner_and_log() {
        let dom = Rc::new(MemoryDom::from_markup(PAGE));
        let status = status(dom.clone());
        status.enter_degraded(&ShellError::BridgeUnavailable { waited_ms: 5_000 });

        let spinner = dom.query("#base-spinner").expect("spinner");
        assert!(!dom.has_class(&spinner, "spinner-border"));
        assert!(dom.has_class(&spinner, "fs-3"));
        assert_eq!(dom.query_all_within(&spinner, "i.bi").len(), 1);

        let log = dom.query("#system-log").expect("log");
        assert!(dom.has_class(&log, "text-danger"));
        assert_eq!(dom.text_content(&log), DEGRADED_MESSAGE);
        assert!(status.is_degraded());
        assert_eq!(status.diagnostics.borrow().phase, "error");
    }

    #[test]
    fn degraded_state_is_redrawn_in_a_cleared_app_root() {
        let dom = Rc::new(MemoryDom::from_markup(
            r#"<div id="app"><span id="base-spinner" class="spinner-border"></span><p id="system-log">Loading</p></div>"#,
        ));
        let app = dom.query("#app").expect("app");
        dom.set_inner_html(&app, "<h1>half rendered</h1>");
        let status = status(dom.clone());

        status.enter_degraded(&ShellError::route_not_found("/"));

        assert!(dom.query("h1").is_none());
        let spinner = dom.query("#app > #base-spinner").expect("spinner");
        assert!(dom.has_class(&spinner, "fs-3"));
        assert!(!dom.has_class(&spinner, "spinner-border"));
        assert_eq!(dom.query_all_within(&spinner, "i.bi").len(), 1);
        let log = dom.query("#app > #system-log").expect("log");
        assert!(dom.has_class(&log, "text-danger"));
        assert_eq!(dom.text_content(&log), DEGRADED_MESSAGE);
    }

    #[test]
    fn report_without_alert_template_uses_log_line() {
        let dom = Rc::new(MemoryDom::from_markup(PAGE));
        let status = status(dom.clone());
        status.report_error(&ShellError::route_not_found("/nope"));

        let log = dom.query("#system-log").expect("log");
        assert_eq!(dom.text_content(&log), "Page /nope does not exist");
        assert!(dom.has_class(&log, "text-danger"));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn report_appends_alert_and_skips_benign_errors() {
        let dom = Rc::new(MemoryDom::from_markup(PAGE));
        let fetcher = Rc::new(FakeFetcher::default().with(
            "/template/alert.html",
            r#"<div class="alert" data-code="{{code}}">{{message}}</div>"#,
        ));
        let cache = TemplateCache::new(dom.clone(), Rc::new(TestRuntime::default()), fetcher);
        let alert = cache
            .get_or_fetch("alert", "/template/alert.html", Duration::from_millis(50))
            .await
            .expect("alert");
        let status = status(dom.clone());
        status.use_alert_template(alert);

        status.report_error(&ShellError::NavigationSuperseded {
            path: "/".to_string(),
        });
        status.report_error(&ShellError::bridge_call("fav", "locked"));

        let alerts = dom.query("#alerts").expect("alerts");
        let shown = dom.query_all_within(&alerts, "div.alert");
        assert_eq!(shown.len(), 1);
        assert_eq!(
            dom.attribute(&shown[0], "data-code").as_deref(),
            Some("bridge_call_failed")
        );
        assert_eq!(dom.text_content(&shown[0]), "The host could not complete fav: locked");
        let log = dom.query("#system-log").expect("log");
        assert_eq!(dom.text_content(&log), "Loading");
    }
}
