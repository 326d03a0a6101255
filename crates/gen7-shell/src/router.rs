use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;

use crate::binder::ActionBinder;
use crate::config::MarkerAttributes;
use crate::diagnostics::ShellDiagnostics;
use crate::dom::{ClickListener, ShellDom};
use crate::error::{ErrorSink, ShellError};
use crate::runtime::ShellRuntime;
use crate::template::{RenderContext, TemplateCache};

/// A page mounted into the app root.
///
/// Without a template name the markup at `url` is rendered as-is and the
/// context returned by `init` is discarded.
#[async_trait(?Send)]
pub trait Page {
    fn url(&self) -> &str;

    fn template_name(&self) -> Option<&str> {
        None
    }

    async fn init(&self) -> Result<RenderContext, ShellError> {
        Ok(RenderContext::new())
    }

    async fn post_init(&self) -> Result<(), ShellError> {
        Ok(())
    }

    async fn teardown(&self) -> Result<(), ShellError> {
        Ok(())
    }
}

pub type PageDescriptor = Rc<dyn Page>;

#[derive(Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, PageDescriptor>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, path: &str, page: PageDescriptor) -> Self {
        self.insert(path, page);
        self
    }

    pub fn insert(&mut self, path: &str, page: PageDescriptor) {
        self.routes.insert(path.to_string(), page);
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<PageDescriptor> {
        self.routes.get(path).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    pub current_path: Option<String>,
    pub initialized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    Unconfigured,
    Configured,
    Idle(String),
}

/// Strips query and fragment from a link target; empty targets mean `/`.
#[must_use]
pub fn route_path_from_href(href: &str) -> String {
    let path = href
        .trim()
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

pub struct Router<D: ShellDom> {
    dom: Rc<D>,
    runtime: Rc<dyn ShellRuntime>,
    templates: Rc<TemplateCache<D>>,
    binder: Rc<ActionBinder<D>>,
    diagnostics: Rc<RefCell<ShellDiagnostics>>,
    on_error: ErrorSink,
    app_root: String,
    markers: MarkerAttributes,
    page_load_budget: Duration,
    routes: RefCell<Option<RouteTable>>,
    mounted: RefCell<Option<PageDescriptor>>,
    navigation: RefCell<NavigationState>,
    latest_token: Cell<u64>,
}

pub struct RouterParts<D: ShellDom> {
    pub dom: Rc<D>,
    pub runtime: Rc<dyn ShellRuntime>,
    pub templates: Rc<TemplateCache<D>>,
    pub binder: Rc<ActionBinder<D>>,
    pub diagnostics: Rc<RefCell<ShellDiagnostics>>,
    pub on_error: ErrorSink,
    pub app_root: String,
    pub markers: MarkerAttributes,
    pub page_load_budget: Duration,
}

impl<D: ShellDom + 'static> Router<D> {
    pub fn new(parts: RouterParts<D>) -> Self {
        Self {
            dom: parts.dom,
            runtime: parts.runtime,
            templates: parts.templates,
            binder: parts.binder,
            diagnostics: parts.diagnostics,
            on_error: parts.on_error,
            app_root: parts.app_root,
            markers: parts.markers,
            page_load_budget: parts.page_load_budget,
            routes: RefCell::new(None),
            mounted: RefCell::new(None),
            navigation: RefCell::new(NavigationState::default()),
            latest_token: Cell::new(0),
        }
    }

    /// Installs the route table. A later call replaces it.
    pub fn setup(&self, routes: RouteTable) {
        tracing::info!(routes = routes.len(), "route table installed");
        *self.routes.borrow_mut() = Some(routes);
    }

    #[must_use]
    pub fn state(&self) -> RouterState {
        if self.routes.borrow().is_none() {
            return RouterState::Unconfigured;
        }
        match self.navigation.borrow().current_path.clone() {
            Some(path) => RouterState::Idle(path),
            None => RouterState::Configured,
        }
    }

    #[must_use]
    pub fn current_path(&self) -> Option<String> {
        self.navigation.borrow().current_path.clone()
    }

    #[must_use]
    pub fn navigation(&self) -> NavigationState {
        self.navigation.borrow().clone()
    }

    /// Drops the route table and the mounted page. Navigations still in
    /// flight are superseded.
    pub(crate) fn reset(&self) {
        self.latest_token.set(self.latest_token.get() + 1);
        *self.routes.borrow_mut() = None;
        *self.mounted.borrow_mut() = None;
        self.navigation.borrow_mut().current_path = None;
    }

    pub(crate) fn mark_initialized(&self) {
        self.navigation.borrow_mut().initialized = true;
    }

    /// Mounts the page registered for `path`.
    ///
    /// A newer call supersedes this one: once it observes that, this call
    /// stops touching the document and fails with
    /// [`ShellError::NavigationSuperseded`]. Until the new page's markup is
    /// loaded the previous page stays mounted.
    pub async fn goto(&self, path: &str) -> Result<(), ShellError> {
        let token = self.latest_token.get() + 1;
        self.latest_token.set(token);
        self.diagnostics.borrow_mut().navigation_total += 1;

        let outcome = self.navigate(path, token).await;
        match &outcome {
            Ok(()) => {
                tracing::info!(path, "navigation complete");
                self.diagnostics.borrow_mut().route_path = Some(path.to_string());
            }
            Err(error) if error.is_benign() => {
                tracing::debug!(path, "navigation superseded");
            }
            Err(error) => {
                tracing::warn!(path, %error, "navigation failed");
                let mut diagnostics = self.diagnostics.borrow_mut();
                diagnostics.navigation_failures += 1;
                diagnostics.last_navigation_error = Some(error.to_string());
            }
        }
        outcome
    }

    async fn navigate(&self, path: &str, token: u64) -> Result<(), ShellError> {
        let page = self
            .routes
            .borrow()
            .as_ref()
            .and_then(|routes| routes.get(path))
            .ok_or_else(|| ShellError::route_not_found(path))?;
        tracing::debug!(path, token, url = page.url(), "navigating");

        let key = page.template_name().unwrap_or(page.url()).to_string();
        let markup = self
            .templates
            .get_or_fetch(&key, page.url(), self.page_load_budget)
            .await?;
        self.ensure_current(path, token)?;

        let previous = self.mounted.borrow_mut().take();
        if let Some(previous) = previous {
            previous.teardown().await?;
            self.ensure_current(path, token)?;
        }
        markup.render(&self.app_root, &RenderContext::new())?;

        let context = page.init().await?;
        self.ensure_current(path, token)?;
        if page.template_name().is_some() {
            markup.render(&self.app_root, &context)?;
        }

        page.post_init().await?;
        self.ensure_current(path, token)?;

        let root = self
            .dom
            .query(&self.app_root)
            .ok_or_else(|| ShellError::render_target_missing(&self.app_root))?;
        self.binder.bind(&root);

        *self.mounted.borrow_mut() = Some(page);
        self.navigation.borrow_mut().current_path = Some(path.to_string());
        Ok(())
    }

    fn ensure_current(&self, path: &str, token: u64) -> Result<(), ShellError> {
        if self.latest_token.get() == token {
            Ok(())
        } else {
            Err(ShellError::NavigationSuperseded {
                path: path.to_string(),
            })
        }
    }

    /// Routes clicks on `a[href]` descendants of `root` through [`Router::goto`].
    pub fn bind_links(self: &Rc<Self>, root: &D::Element) -> usize {
        let mut bound = 0;
        for anchor in self.dom.query_all_within(root, "a[href]") {
            if self
                .dom
                .attribute(&anchor, &self.markers.link_bound)
                .is_some()
            {
                continue;
            }
            self.dom
                .set_attribute(&anchor, &self.markers.link_bound, "true");
            self.dom
                .on_click(&anchor, link_listener(Rc::downgrade(self), anchor.clone()));
            bound += 1;
        }
        tracing::debug!(bound, "navigation links bound");
        bound
    }
}

fn link_listener<D: ShellDom + 'static>(router: Weak<Router<D>>, anchor: D::Element) -> ClickListener {
    Rc::new(move || {
        let Some(current) = router.upgrade() else {
            return;
        };
        let Some(href) = current.dom.attribute(&anchor, "href") else {
            return;
        };
        let path = route_path_from_href(&href);
        let router = router.clone();
        current.runtime.spawn_local(
            async move {
                let Some(router) = router.upgrade() else {
                    return;
                };
                if let Err(error) = router.goto(&path).await {
                    (router.on_error)(&error);
                }
            }
            .boxed_local(),
        );
    })
}
