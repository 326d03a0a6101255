use std::cell::RefCell;
use std::rc::Rc;

use crate::binder::{ActionBinder, HandlerRegistry};
use crate::bridge::BridgeGateway;
use crate::config::ShellConfig;
use crate::diagnostics::ShellDiagnostics;
use crate::dom::ShellDom;
use crate::error::{ErrorSink, ShellError};
use crate::router::{Router, RouterParts};
use crate::runtime::ShellRuntime;
use crate::status::ShellStatus;
use crate::template::{TemplateCache, TemplateFetcher};

/// Everything one shell instance shares between bootstrap, the router and
/// the pages. Built once per document.
pub struct ShellContext<D: ShellDom> {
    pub config: ShellConfig,
    pub dom: Rc<D>,
    pub runtime: Rc<dyn ShellRuntime>,
    pub templates: Rc<TemplateCache<D>>,
    pub registry: Rc<HandlerRegistry>,
    pub binder: Rc<ActionBinder<D>>,
    pub router: Rc<Router<D>>,
    pub gateway: BridgeGateway,
    pub status: Rc<ShellStatus<D>>,
    pub diagnostics: Rc<RefCell<ShellDiagnostics>>,
}

impl<D: ShellDom + 'static> ShellContext<D> {
    pub fn new(
        config: ShellConfig,
        dom: Rc<D>,
        runtime: Rc<dyn ShellRuntime>,
        fetcher: Rc<dyn TemplateFetcher>,
    ) -> Self {
        let diagnostics = Rc::new(RefCell::new(ShellDiagnostics::default()));
        let status = Rc::new(ShellStatus::new(
            dom.clone(),
            config.selectors.clone(),
            diagnostics.clone(),
        ));
        let templates = Rc::new(TemplateCache::new(dom.clone(), runtime.clone(), fetcher));
        let registry = Rc::new(HandlerRegistry::default());
        let binder = Rc::new(ActionBinder::new(
            dom.clone(),
            runtime.clone(),
            registry.clone(),
            config.markers.clone(),
            action_error_sink(&status, &diagnostics),
        ));
        let router = Rc::new(Router::new(RouterParts {
            dom: dom.clone(),
            runtime: runtime.clone(),
            templates: templates.clone(),
            binder: binder.clone(),
            diagnostics: diagnostics.clone(),
            on_error: status_sink(&status),
            app_root: config.selectors.app_root.clone(),
            markers: config.markers.clone(),
            page_load_budget: config.page_load_budget,
        }));

        Self {
            gateway: BridgeGateway::new(runtime.clone()),
            config,
            dom,
            runtime,
            templates,
            registry,
            binder,
            router,
            status,
            diagnostics,
        }
    }

    #[must_use]
    pub fn diagnostics_json(&self) -> String {
        let mut snapshot = self.diagnostics.borrow().clone();
        snapshot.bridge_state = self.gateway.state().label().to_string();
        snapshot.to_json()
    }
}

fn status_sink<D: ShellDom + 'static>(status: &Rc<ShellStatus<D>>) -> ErrorSink {
    let status = Rc::downgrade(status);
    Rc::new(move |error: &ShellError| {
        if let Some(status) = status.upgrade() {
            status.report_error(error);
        }
    })
}

fn action_error_sink<D: ShellDom + 'static>(
    status: &Rc<ShellStatus<D>>,
    diagnostics: &Rc<RefCell<ShellDiagnostics>>,
) -> ErrorSink {
    let report = status_sink(status);
    let diagnostics = Rc::downgrade(diagnostics);
    Rc::new(move |error: &ShellError| {
        if let Some(diagnostics) = diagnostics.upgrade() {
            diagnostics.borrow_mut().action_failures += 1;
        }
        report(error);
    })
}
