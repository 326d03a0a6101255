use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::dom::ShellDom;
use crate::error::ShellError;
use crate::runtime::ShellRuntime;

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").ok());

#[async_trait(?Send)]
pub trait TemplateFetcher {
    async fn fetch(&self, url: &str) -> Result<String, String>;
}

/// Values a page hands to the template renderer, keyed by placeholder name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RenderContext(Map<String, Value>);

impl RenderContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Display form of a value: strings verbatim, scalars via `Display`,
    /// null and missing keys as the empty string.
    #[must_use]
    pub fn display(&self, key: &str) -> String {
        match self.0.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(value)) => value.clone(),
            Some(other) => other.to_string(),
        }
    }
}

impl From<Map<String, Value>> for RenderContext {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub source: String,
    pub minimum_load_budget: Duration,
    pub content: Rc<str>,
}

impl Template {
    /// Substitutes every placeholder; unknown keys render empty.
    #[must_use]
    pub fn expand(&self, context: &RenderContext) -> String {
        let Some(placeholder) = PLACEHOLDER.as_ref() else {
            return self.content.to_string();
        };
        placeholder
            .replace_all(&self.content, |captures: &Captures<'_>| {
                let key = captures.get(1).map_or("", |m| m.as_str());
                html_escape::encode_double_quoted_attribute(&context.display(key)).into_owned()
            })
            .into_owned()
    }
}

type PendingTemplate = Shared<LocalBoxFuture<'static, Result<Rc<Template>, ShellError>>>;

/// Fetch-once store of named templates.
///
/// Loaded templates are never evicted. Concurrent first requests for a name
/// share one in-flight fetch; a failed fetch leaves no entry behind.
pub struct TemplateCache<D: ShellDom> {
    dom: Rc<D>,
    runtime: Rc<dyn ShellRuntime>,
    fetcher: Rc<dyn TemplateFetcher>,
    loaded: RefCell<HashMap<String, Rc<Template>>>,
    in_flight: RefCell<HashMap<String, PendingTemplate>>,
    fetch_count: Cell<u64>,
}

impl<D: ShellDom + 'static> TemplateCache<D> {
    pub fn new(
        dom: Rc<D>,
        runtime: Rc<dyn ShellRuntime>,
        fetcher: Rc<dyn TemplateFetcher>,
    ) -> Self {
        Self {
            dom,
            runtime,
            fetcher,
            loaded: RefCell::new(HashMap::new()),
            in_flight: RefCell::new(HashMap::new()),
            fetch_count: Cell::new(0),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<TemplateHandle<D>> {
        self.loaded
            .borrow()
            .get(name)
            .map(|template| self.handle(template.clone()))
    }

    /// Number of fetches issued so far, shared fetches counted once.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.get()
    }

    pub async fn get_or_fetch(
        &self,
        name: &str,
        source_url: &str,
        minimum_load_budget: Duration,
    ) -> Result<TemplateHandle<D>, ShellError> {
        if let Some(handle) = self.get(name) {
            return Ok(handle);
        }

        let pending = self
            .in_flight
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| self.start_fetch(name, source_url, minimum_load_budget))
            .clone();

        let outcome = pending.clone().await;

        {
            let mut in_flight = self.in_flight.borrow_mut();
            if in_flight
                .get(name)
                .is_some_and(|current| current.ptr_eq(&pending))
            {
                in_flight.remove(name);
            }
        }

        let template = outcome?;
        let template = self
            .loaded
            .borrow_mut()
            .entry(name.to_string())
            .or_insert(template)
            .clone();
        Ok(self.handle(template))
    }

    fn start_fetch(&self, name: &str, source_url: &str, budget: Duration) -> PendingTemplate {
        self.fetch_count.set(self.fetch_count.get() + 1);
        tracing::debug!(template = name, url = source_url, "fetching template");

        let fetcher = self.fetcher.clone();
        let floor = self.runtime.sleep(budget);
        let name = name.to_string();
        let source = source_url.to_string();

        async move {
            let (fetched, ()) = futures::join!(fetcher.fetch(&source), floor);
            match fetched {
                Ok(content) => Ok(Rc::new(Template {
                    name,
                    source,
                    minimum_load_budget: budget,
                    content: Rc::from(content),
                })),
                Err(message) => {
                    tracing::warn!(template = %name, url = %source, %message, "template fetch failed");
                    Err(ShellError::TemplateLoad {
                        name,
                        url: source,
                        message,
                    })
                }
            }
        }
        .boxed_local()
        .shared()
    }

    fn handle(&self, template: Rc<Template>) -> TemplateHandle<D> {
        TemplateHandle {
            template,
            dom: self.dom.clone(),
        }
    }
}

/// A loaded template bound to the document it renders into.
pub struct TemplateHandle<D: ShellDom> {
    template: Rc<Template>,
    dom: Rc<D>,
}

impl<D: ShellDom> Clone for TemplateHandle<D> {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            dom: self.dom.clone(),
        }
    }
}

impl<D: ShellDom> TemplateHandle<D> {
    #[must_use]
    pub fn template(&self) -> &Rc<Template> {
        &self.template
    }

    /// Replaces the contents of the element matched by `selector`.
    pub fn render(&self, selector: &str, context: &RenderContext) -> Result<(), ShellError> {
        let target = self
            .dom
            .query(selector)
            .ok_or_else(|| ShellError::render_target_missing(selector))?;
        self.dom
            .set_inner_html(&target, &self.template.expand(context));
        Ok(())
    }

    /// Renders once per item and appends the fragments in input order,
    /// keeping whatever the container already holds.
    pub fn batch_append(&self, selector: &str, items: &[RenderContext]) -> Result<usize, ShellError> {
        let target = self
            .dom
            .query(selector)
            .ok_or_else(|| ShellError::render_target_missing(selector))?;
        let markup = items
            .iter()
            .map(|item| self.template.expand(item))
            .collect::<String>();
        self.dom.append_html(&target, &markup);
        Ok(items.len())
    }
}
