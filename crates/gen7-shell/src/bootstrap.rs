use std::cell::Cell;
use std::rc::Rc;

use web_time::{Instant, SystemTime, UNIX_EPOCH};

use crate::bridge::{BridgeProbe, SystemApi, duration_ms};
use crate::context::ShellContext;
use crate::diagnostics::BootMilestone;
use crate::dom::ShellDom;
use crate::error::ShellError;
use crate::pages::PageCatalog;
use crate::template::RenderContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    Started,
    AlreadyInitialized,
    InProgress,
}

/// One shell instance: its context plus what it needs to start.
pub struct Shell<D: ShellDom> {
    context: Rc<ShellContext<D>>,
    catalog: PageCatalog<D>,
    probe: Rc<dyn BridgeProbe>,
    booting: Cell<bool>,
}

impl<D: ShellDom + 'static> Shell<D> {
    pub fn new(
        context: Rc<ShellContext<D>>,
        catalog: PageCatalog<D>,
        probe: Rc<dyn BridgeProbe>,
    ) -> Self {
        Self {
            context,
            catalog,
            probe,
            booting: Cell::new(false),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Rc<ShellContext<D>> {
        &self.context
    }

    /// Brings the shell up. Runs at most once; a call while a bootstrap is
    /// in flight or after it finished does nothing. Any failure leaves the
    /// document in the degraded state, the navbar empty and no routes
    /// installed.
    pub async fn bootstrap(&self) -> Result<BootOutcome, ShellError> {
        if self.context.router.navigation().initialized {
            return Ok(BootOutcome::AlreadyInitialized);
        }
        if self.booting.replace(true) {
            tracing::debug!("bootstrap already running");
            return Ok(BootOutcome::InProgress);
        }

        let outcome = self.run_sequence().await;
        self.booting.set(false);

        match outcome {
            Ok(()) => {
                self.context.router.mark_initialized();
                self.context
                    .diagnostics
                    .borrow_mut()
                    .set_phase("ready", "shell ready");
                Ok(BootOutcome::Started)
            }
            Err(error) => {
                self.roll_back();
                self.context.status.enter_degraded(&error);
                Err(error)
            }
        }
    }

    /// Navigates and shows any failure to the user.
    pub async fn navigate(&self, path: &str) {
        if let Err(error) = self.context.router.goto(path).await {
            self.context.status.report_error(&error);
        }
    }

    async fn run_sequence(&self) -> Result<(), ShellError> {
        let context = &self.context;
        let config = &context.config;
        let started = Instant::now();
        context.diagnostics.borrow_mut().boot_started_at_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(duration_ms);

        context
            .status
            .set_phase("templates", "Downloading alert template");
        let alert = context
            .templates
            .get_or_fetch(
                &config.alert_template.name,
                &config.alert_template.url,
                config.alert_template.minimum_load_budget,
            )
            .await?;
        context.status.use_alert_template(alert);
        self.milestone(BootMilestone::AlertReady, started);

        context.status.set_phase("bridge", "Initiating host API");
        let bridge_started = Instant::now();
        let api = context
            .gateway
            .await_ready(self.probe.as_ref(), config.bridge)
            .await?;
        self.milestone(BootMilestone::BridgeReady, bridge_started);

        context
            .status
            .set_phase("base", "Base initialization is completed");
        if let Some(app) = context.dom.query(&config.selectors.app_root) {
            context.dom.set_inner_html(&app, "");
        }
        if let Some(root) = context.dom.query(&config.selectors.document_root) {
            context.dom.remove_class(&root, "no-scrollbar");
        }

        let navbar_started = Instant::now();
        let nav = self.render_navbar(&api).await?;
        self.milestone(BootMilestone::NavbarReady, navbar_started);

        let routes = self
            .catalog
            .build_routes(&config.routes, context, &api)?;
        context.router.setup(routes);

        let first_page = Instant::now();
        context.router.goto(&config.default_path).await?;
        self.milestone(BootMilestone::FirstPage, first_page);

        let links = context.router.bind_links(&nav);
        let actions = context.binder.bind(&nav);
        tracing::info!(links, actions = actions.bound, "navbar bound");
        self.milestone(BootMilestone::BootTotal, started);
        Ok(())
    }

    /// Renders the navbar; its links stay inert until the first page is up.
    async fn render_navbar(&self, api: &SystemApi) -> Result<D::Element, ShellError> {
        let context = &self.context;
        let spec = &context.config.navbar_template;
        let navbar = context
            .templates
            .get_or_fetch(&spec.name, &spec.url, spec.minimum_load_budget)
            .await?;
        let app_name = api.app_name().await?;

        let selector = &context.config.selectors.navbar;
        navbar.render(selector, &RenderContext::new().with("app_name", app_name))?;
        context
            .dom
            .query(selector)
            .ok_or_else(|| ShellError::render_target_missing(selector))
    }

    /// Undoes a partial start: no routes and an empty navbar.
    fn roll_back(&self) {
        let context = &self.context;
        context.router.reset();
        if let Some(nav) = context.dom.query(&context.config.selectors.navbar) {
            context.dom.set_inner_html(&nav, "");
        }
    }

    fn milestone(&self, milestone: BootMilestone, since: Instant) {
        self.context
            .diagnostics
            .borrow_mut()
            .record_milestone(milestone, duration_ms(since.elapsed()));
    }
}
