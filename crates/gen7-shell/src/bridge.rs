use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ShellError;
use crate::runtime::ShellRuntime;

/// Method names exposed by the host process.
pub mod methods {
    pub const GET_APP_NAME: &str = "get_appname";
    pub const GET_APP_DESCRIPTION: &str = "get_appdesc";
    pub const LIST_RECORDS: &str = "all";
    pub const FAVORITE_RECORDS: &str = "by_favs";
    pub const RECORD_BY_ID: &str = "by_id";
    pub const MARK_FAVORITE: &str = "fav";
    pub const UNMARK_FAVORITE: &str = "unfav";
    pub const DISPATCH: &str = "dispatch";
    pub const GENERATE_ID: &str = "generate_id";
    pub const NOOP: &str = "func";
}

/// Asynchronous remote-procedure surface of the host application.
#[async_trait(?Send)]
pub trait HostBridge {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, String>;
}

/// Looks for the host API object without waiting for it.
pub trait BridgeProbe {
    fn probe(&self) -> Option<Rc<dyn HostBridge>>;
}

/// A row of the host's history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub description: String,
}

/// Typed view over the host methods the shell and its pages call.
#[derive(Clone)]
pub struct SystemApi {
    bridge: Rc<dyn HostBridge>,
}

impl SystemApi {
    pub fn new(bridge: Rc<dyn HostBridge>) -> Self {
        Self { bridge }
    }

    /// Untyped escape hatch; host failures become [`ShellError::BridgeCall`].
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, ShellError> {
        self.bridge
            .call(method, args)
            .await
            .map_err(|message| ShellError::bridge_call(method, message))
    }

    async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<T, ShellError> {
        let value = self.call(method, args).await?;
        serde_json::from_value(value).map_err(|error| {
            ShellError::bridge_call(method, format!("unexpected response shape: {error}"))
        })
    }

    pub async fn app_name(&self) -> Result<String, ShellError> {
        self.call_as(methods::GET_APP_NAME, Vec::new()).await
    }

    pub async fn app_description(&self) -> Result<String, ShellError> {
        self.call_as(methods::GET_APP_DESCRIPTION, Vec::new()).await
    }

    pub async fn list_records(&self) -> Result<Vec<HistoryRecord>, ShellError> {
        self.call_as(methods::LIST_RECORDS, Vec::new()).await
    }

    pub async fn favorite_records(&self) -> Result<Vec<HistoryRecord>, ShellError> {
        self.call_as(methods::FAVORITE_RECORDS, Vec::new()).await
    }

    pub async fn record_by_id(&self, id: &str) -> Result<Option<HistoryRecord>, ShellError> {
        self.call_as(methods::RECORD_BY_ID, vec![Value::from(id)])
            .await
    }

    pub async fn mark_favorite(&self, id: &str) -> Result<(), ShellError> {
        self.call(methods::MARK_FAVORITE, vec![Value::from(id)])
            .await
            .map(drop)
    }

    pub async fn unmark_favorite(&self, id: &str) -> Result<(), ShellError> {
        self.call(methods::UNMARK_FAVORITE, vec![Value::from(id)])
            .await
            .map(drop)
    }

    /// Opens a new host window; returns the identifier the host assigned.
    pub async fn dispatch(&self, code: Option<&str>) -> Result<String, ShellError> {
        let args = code.map(Value::from).into_iter().collect();
        self.call_as(methods::DISPATCH, args).await
    }

    pub async fn generate_id(&self, length: u32) -> Result<String, ShellError> {
        self.call_as(methods::GENERATE_ID, vec![Value::from(length)])
            .await
    }

    pub async fn noop(&self) -> Result<(), ShellError> {
        self.call(methods::NOOP, Vec::new()).await.map(drop)
    }
}

/// Timing of the readiness wait. Elapsed time is the sum of the sleeps
/// issued, so a paused clock in tests gives exact results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub initial_delay: Duration,
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(25),
            max_wait: Duration::from_millis(5_000),
        }
    }
}

#[derive(Clone)]
pub enum BridgeState {
    Pending,
    Ready(SystemApi),
    Failed(ShellError),
}

impl BridgeState {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Owns the one-way transition from pending to ready or failed.
pub struct BridgeGateway {
    runtime: Rc<dyn ShellRuntime>,
    state: RefCell<BridgeState>,
}

impl BridgeGateway {
    pub fn new(runtime: Rc<dyn ShellRuntime>) -> Self {
        Self {
            runtime,
            state: RefCell::new(BridgeState::Pending),
        }
    }

    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn api(&self) -> Option<SystemApi> {
        match &*self.state.borrow() {
            BridgeState::Ready(api) => Some(api.clone()),
            _ => None,
        }
    }

    /// Resolves once the probe finds the host API. A settled gateway answers
    /// from its state without probing again.
    pub async fn await_ready(
        &self,
        probe: &dyn BridgeProbe,
        policy: ReadinessPolicy,
    ) -> Result<SystemApi, ShellError> {
        match self.state() {
            BridgeState::Ready(api) => return Ok(api),
            BridgeState::Failed(error) => return Err(error),
            BridgeState::Pending => {}
        }

        let outcome = self.poll(probe, policy).await;
        let settled = match &outcome {
            Ok(api) => BridgeState::Ready(api.clone()),
            Err(error) => BridgeState::Failed(error.clone()),
        };
        *self.state.borrow_mut() = settled;
        outcome
    }

    async fn poll(
        &self,
        probe: &dyn BridgeProbe,
        policy: ReadinessPolicy,
    ) -> Result<SystemApi, ShellError> {
        let mut waited = policy.initial_delay;
        self.runtime.sleep(policy.initial_delay).await;

        loop {
            if let Some(bridge) = probe.probe() {
                tracing::info!(waited_ms = duration_ms(waited), "host api ready");
                return Ok(SystemApi::new(bridge));
            }
            if waited >= policy.max_wait {
                tracing::warn!(waited_ms = duration_ms(waited), "host api never appeared");
                return Err(ShellError::BridgeUnavailable {
                    waited_ms: duration_ms(waited),
                });
            }
            let step = policy
                .poll_interval
                .max(Duration::from_millis(1))
                .min(policy.max_wait - waited);
            self.runtime.sleep(step).await;
            waited += step;
        }
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBridge, FakeProbe, TestRuntime};

    fn gateway() -> BridgeGateway {
        BridgeGateway::new(Rc::new(TestRuntime::default()))
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn ready_bridge_resolves_after_initial_delay() {
        let probe = FakeProbe::ready(Rc::new(FakeBridge::default()));
        let gateway = gateway();
        let started = tokio::time::Instant::now();

        let api = gateway
            .await_ready(&probe, ReadinessPolicy::default())
            .await
            .expect("ready");

        assert_eq!(started.elapsed(), Duration::from_millis(10));
        assert_eq!(api.app_name().await.expect("name"), "Gen7");
        assert_eq!(gateway.state().label(), "ready");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn late_bridge_is_picked_up_by_polling() {
        let probe = FakeProbe::after(Rc::new(FakeBridge::default()), 3);
        let gateway = gateway();
        let started = tokio::time::Instant::now();

        gateway
            .await_ready(&probe, ReadinessPolicy::default())
            .await
            .expect("ready");

        assert_eq!(probe.probes.get(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(60));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn missing_bridge_fails_after_max_wait_and_stays_failed() {
        let probe = FakeProbe::never();
        let gateway = gateway();
        let policy = ReadinessPolicy {
            max_wait: Duration::from_millis(100),
            ..ReadinessPolicy::default()
        };

        let error = gateway
            .await_ready(&probe, policy)
            .await
            .err()
            .expect("unavailable");
        assert_eq!(error, ShellError::BridgeUnavailable { waited_ms: 100 });

        let probes = probe.probes.get();
        let again = gateway.await_ready(&probe, policy).await.err();
        assert_eq!(again, Some(error));
        assert_eq!(probe.probes.get(), probes);
        assert!(gateway.api().is_none());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn host_rejection_becomes_bridge_call_error() {
        let bridge = Rc::new(FakeBridge::default());
        bridge.fail(methods::MARK_FAVORITE);
        let api = SystemApi::new(bridge.clone());

        let error = api.mark_favorite("42").await.expect_err("rejected");
        assert_eq!(error.code(), "bridge_call_failed");
        assert_eq!(
            bridge.calls_to(methods::MARK_FAVORITE),
            vec![vec![Value::from("42")]]
        );
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn typed_calls_decode_records() {
        let bridge = Rc::new(FakeBridge::default().with_records(&[
            ("1", true, "first"),
            ("2", false, "second"),
        ]));
        let api = SystemApi::new(bridge.clone());

        let all = api.list_records().await.expect("all");
        assert_eq!(all.len(), 2);
        let favorites = api.favorite_records().await.expect("favs");
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, "1");
        assert_eq!(
            api.record_by_id("2").await.expect("by id").map(|r| r.description),
            Some("second".to_string())
        );
        assert_eq!(api.record_by_id("9").await.expect("by id"), None);
        assert_eq!(api.dispatch(Some("abc")).await.expect("dispatch"), "abc");
        assert!(bridge.calls_to(methods::DISPATCH)[0] == vec![Value::from("abc")]);
        assert_eq!(api.dispatch(None).await.expect("dispatch"), "w2");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn mistyped_response_is_reported_with_method() {
        let bridge = Rc::new(FakeBridge::default());
        let api = SystemApi::new(bridge);
        let error = api
            .call_as::<Vec<HistoryRecord>>(methods::GET_APP_NAME, Vec::new())
            .await
            .expect_err("string is not a list");
        assert!(error.to_string().starts_with("bridge_call_failed:get_appname"));
    }
}
