use serde::Serialize;

pub const ALERT_READY_BUDGET_MS: u64 = 400;
pub const BRIDGE_READY_BUDGET_MS: u64 = 500;
pub const NAVBAR_READY_BUDGET_MS: u64 = 300;
pub const FIRST_PAGE_BUDGET_MS: u64 = 1_500;
pub const BOOT_TOTAL_BUDGET_MS: u64 = 2_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMilestone {
    AlertReady,
    BridgeReady,
    NavbarReady,
    FirstPage,
    BootTotal,
}

impl BootMilestone {
    #[must_use]
    pub fn metric_name(self) -> &'static str {
        match self {
            Self::AlertReady => "alert_ready_latency_ms",
            Self::BridgeReady => "bridge_ready_latency_ms",
            Self::NavbarReady => "navbar_ready_latency_ms",
            Self::FirstPage => "first_page_latency_ms",
            Self::BootTotal => "boot_total_latency_ms",
        }
    }

    #[must_use]
    pub fn budget_ms(self) -> u64 {
        match self {
            Self::AlertReady => ALERT_READY_BUDGET_MS,
            Self::BridgeReady => BRIDGE_READY_BUDGET_MS,
            Self::NavbarReady => NAVBAR_READY_BUDGET_MS,
            Self::FirstPage => FIRST_PAGE_BUDGET_MS,
            Self::BootTotal => BOOT_TOTAL_BUDGET_MS,
        }
    }
}

/// Snapshot of shell progress, exported as JSON for the host page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellDiagnostics {
    pub phase: String,
    pub detail: String,
    pub boot_started_at_unix_ms: Option<u64>,
    pub alert_ready_latency_ms: Option<u64>,
    pub bridge_ready_latency_ms: Option<u64>,
    pub navbar_ready_latency_ms: Option<u64>,
    pub first_page_latency_ms: Option<u64>,
    pub boot_total_latency_ms: Option<u64>,
    pub budget_breaches: Vec<String>,
    pub bridge_state: String,
    pub route_path: Option<String>,
    pub navigation_total: u64,
    pub navigation_failures: u64,
    pub last_navigation_error: Option<String>,
    pub action_failures: u64,
    pub last_error: Option<String>,
}

impl Default for ShellDiagnostics {
    fn default() -> Self {
        Self {
            phase: "idle".to_string(),
            detail: "shell not started".to_string(),
            boot_started_at_unix_ms: None,
            alert_ready_latency_ms: None,
            bridge_ready_latency_ms: None,
            navbar_ready_latency_ms: None,
            first_page_latency_ms: None,
            boot_total_latency_ms: None,
            budget_breaches: Vec::new(),
            bridge_state: "pending".to_string(),
            route_path: None,
            navigation_total: 0,
            navigation_failures: 0,
            last_navigation_error: None,
            action_failures: 0,
            last_error: None,
        }
    }
}

impl ShellDiagnostics {
    pub fn set_phase(&mut self, phase: &str, detail: &str) {
        self.phase = phase.to_string();
        self.detail = detail.to_string();
        if phase != "error" {
            self.last_error = None;
        }
    }

    pub fn record_milestone(&mut self, milestone: BootMilestone, actual_ms: u64) {
        let slot = match milestone {
            BootMilestone::AlertReady => &mut self.alert_ready_latency_ms,
            BootMilestone::BridgeReady => &mut self.bridge_ready_latency_ms,
            BootMilestone::NavbarReady => &mut self.navbar_ready_latency_ms,
            BootMilestone::FirstPage => &mut self.first_page_latency_ms,
            BootMilestone::BootTotal => &mut self.boot_total_latency_ms,
        };
        *slot = Some(actual_ms);

        let budget_ms = milestone.budget_ms();
        if actual_ms > budget_ms {
            let breach = format!(
                "{}>{budget_ms} (actual={actual_ms})",
                milestone.metric_name()
            );
            tracing::warn!(%breach, "boot budget exceeded");
            self.budget_breaches.push(breach);
        }
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| {
            format!(r#"{{"phase":"error","detail":"diagnostics encode failed: {error}"}}"#)
        })
    }
}
