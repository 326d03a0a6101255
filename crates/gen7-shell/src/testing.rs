//! Test doubles for the shell seams.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::{Value, json};

use crate::bridge::{BridgeProbe, HistoryRecord, HostBridge, methods};
use crate::runtime::ShellRuntime;
use crate::template::TemplateFetcher;

pub(crate) async fn run_local<F: Future>(future: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(future).await
}

/// Spawns onto the surrounding `LocalSet` and sleeps on the tokio clock.
#[derive(Default)]
pub(crate) struct TestRuntime {
    tasks: RefCell<Vec<tokio::task::JoinHandle<()>>>,
}

impl TestRuntime {
    /// Waits for every spawned task, including tasks spawned while waiting.
    pub(crate) async fn settle(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                let _ = task.await;
            }
        }
    }
}

impl ShellRuntime for TestRuntime {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        self.tasks.borrow_mut().push(tokio::task::spawn_local(task));
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed_local()
    }
}

#[derive(Default)]
pub(crate) struct FakeFetcher {
    documents: RefCell<HashMap<String, String>>,
    calls: RefCell<HashMap<String, usize>>,
    latency: Duration,
}

impl FakeFetcher {
    pub(crate) fn with(self, url: &str, content: &str) -> Self {
        self.insert(url, content);
        self
    }

    pub(crate) fn without(self, url: &str) -> Self {
        self.documents.borrow_mut().remove(url);
        self
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn insert(&self, url: &str, content: &str) {
        self.documents
            .borrow_mut()
            .insert(url.to_string(), content.to_string());
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.borrow().get(url).copied().unwrap_or(0)
    }
}

#[async_trait(?Send)]
impl TemplateFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, String> {
        *self.calls.borrow_mut().entry(url.to_string()).or_insert(0) += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.documents
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| format!("GET {url}: 404 Not Found"))
    }
}

/// In-process stand-in for the host API object.
pub(crate) struct FakeBridge {
    pub(crate) records: RefCell<Vec<HistoryRecord>>,
    pub(crate) calls: RefCell<Vec<(String, Vec<Value>)>>,
    failing: RefCell<HashSet<String>>,
    next_window: Cell<u32>,
}

impl Default for FakeBridge {
    fn default() -> Self {
        Self {
            records: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            failing: RefCell::new(HashSet::new()),
            next_window: Cell::new(1),
        }
    }
}

impl FakeBridge {
    pub(crate) fn with_records(self, records: &[(&str, bool, &str)]) -> Self {
        *self.records.borrow_mut() = records
            .iter()
            .map(|(id, is_favorite, description)| HistoryRecord {
                id: (*id).to_string(),
                is_favorite: *is_favorite,
                description: (*description).to_string(),
            })
            .collect();
        self
    }

    pub(crate) fn fail(&self, method: &str) {
        self.failing.borrow_mut().insert(method.to_string());
    }

    pub(crate) fn calls_to(&self, method: &str) -> Vec<Vec<Value>> {
        self.calls
            .borrow()
            .iter()
            .filter(|(name, _)| name == method)
            .map(|(_, args)| args.clone())
            .collect()
    }

    fn set_favorite(&self, args: &[Value], favorite: bool) -> Result<Value, String> {
        let id = args.first().and_then(Value::as_str).unwrap_or_default();
        let mut records = self.records.borrow_mut();
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| format!("no history entry {id}"))?;
        record.is_favorite = favorite;
        Ok(Value::Null)
    }
}

#[async_trait(?Send)]
impl HostBridge for FakeBridge {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, String> {
        self.calls
            .borrow_mut()
            .push((method.to_string(), args.clone()));
        if self.failing.borrow().contains(method) {
            return Err(format!("{method} rejected by host"));
        }
        match method {
            methods::GET_APP_NAME => Ok(json!("Gen7")),
            methods::GET_APP_DESCRIPTION => Ok(json!("Gamble your way; seeing whatever")),
            methods::LIST_RECORDS => Ok(json!(*self.records.borrow())),
            methods::FAVORITE_RECORDS => {
                let favorites = self
                    .records
                    .borrow()
                    .iter()
                    .filter(|record| record.is_favorite)
                    .cloned()
                    .collect::<Vec<_>>();
                Ok(json!(favorites))
            }
            methods::RECORD_BY_ID => {
                let id = args.first().and_then(Value::as_str).unwrap_or_default();
                let record = self
                    .records
                    .borrow()
                    .iter()
                    .find(|record| record.id == id)
                    .cloned();
                Ok(json!(record))
            }
            methods::MARK_FAVORITE => self.set_favorite(&args, true),
            methods::UNMARK_FAVORITE => self.set_favorite(&args, false),
            methods::DISPATCH => {
                let code = args.first().and_then(Value::as_str).map(str::to_string);
                let window = self.next_window.get();
                self.next_window.set(window + 1);
                Ok(json!(code.unwrap_or_else(|| format!("w{window}"))))
            }
            methods::GENERATE_ID => Ok(json!("abc123")),
            methods::NOOP => Ok(Value::Null),
            other => Err(format!("unknown host method {other}")),
        }
    }
}

/// Reports the bridge once `ready_after` probes have been made; `None` never.
pub(crate) struct FakeProbe {
    bridge: Rc<FakeBridge>,
    ready_after: Option<usize>,
    pub(crate) probes: Cell<usize>,
}

impl FakeProbe {
    pub(crate) fn ready(bridge: Rc<FakeBridge>) -> Self {
        Self::after(bridge, 1)
    }

    pub(crate) fn after(bridge: Rc<FakeBridge>, probes: usize) -> Self {
        Self {
            bridge,
            ready_after: Some(probes),
            probes: Cell::new(0),
        }
    }

    pub(crate) fn never() -> Self {
        Self {
            bridge: Rc::new(FakeBridge::default()),
            ready_after: None,
            probes: Cell::new(0),
        }
    }
}

impl BridgeProbe for FakeProbe {
    fn probe(&self) -> Option<Rc<dyn HostBridge>> {
        let count = self.probes.get() + 1;
        self.probes.set(count);
        match self.ready_after {
            Some(ready_after) if count >= ready_after => Some(self.bridge.clone()),
            _ => None,
        }
    }
}
