use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::config::MarkerAttributes;
use crate::dom::{ClickListener, ShellDom};
use crate::error::{ErrorSink, ShellError};
use crate::runtime::ShellRuntime;

pub type ActionFuture = LocalBoxFuture<'static, Result<(), ShellError>>;
pub type ActionHandler = Rc<dyn Fn(String) -> ActionFuture>;

/// A parsed `namespace.action[/argument]` marker value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMarker {
    pub name: String,
    pub argument: Option<String>,
}

impl ActionMarker {
    /// Everything after the first `/` is the argument, slashes included.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().split_once('/') {
            Some((name, argument)) => Self {
                name: name.trim().to_string(),
                argument: Some(argument.to_string()),
            },
            None => Self {
                name: raw.trim().to_string(),
                argument: None,
            },
        }
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Handler names are exactly two identifiers joined by a dot.
#[must_use]
pub fn is_valid_action_name(name: &str) -> bool {
    name.split_once('.')
        .is_some_and(|(namespace, action)| is_identifier(namespace) && is_identifier(action))
}

/// Named handlers, last registration wins.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RefCell<HashMap<String, ActionHandler>>,
}

impl HandlerRegistry {
    pub fn register<F, Fut>(&self, name: &str, handler: F) -> Result<(), ShellError>
    where
        F: Fn(String) -> Fut + 'static,
        Fut: Future<Output = Result<(), ShellError>> + 'static,
    {
        if !is_valid_action_name(name) {
            return Err(ShellError::InvalidActionName {
                name: name.to_string(),
            });
        }
        let handler: ActionHandler = Rc::new(move |argument| handler(argument).boxed_local());
        if self
            .handlers
            .borrow_mut()
            .insert(name.to_string(), handler)
            .is_some()
        {
            tracing::warn!(action = name, "action handler replaced");
        }
        Ok(())
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<ActionHandler> {
        self.handlers.borrow().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.borrow().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    pub bound: usize,
    pub already_bound: usize,
    pub unresolved: Vec<String>,
}

/// Attaches click handlers to marked elements under a root.
pub struct ActionBinder<D: ShellDom> {
    dom: Rc<D>,
    runtime: Rc<dyn ShellRuntime>,
    registry: Rc<HandlerRegistry>,
    markers: MarkerAttributes,
    on_error: ErrorSink,
}

impl<D: ShellDom + 'static> ActionBinder<D> {
    pub fn new(
        dom: Rc<D>,
        runtime: Rc<dyn ShellRuntime>,
        registry: Rc<HandlerRegistry>,
        markers: MarkerAttributes,
        on_error: ErrorSink,
    ) -> Self {
        Self {
            dom,
            runtime,
            registry,
            markers,
            on_error,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Rc<HandlerRegistry> {
        &self.registry
    }

    /// Binds every marked descendant of `root` that is not bound yet.
    /// Markers naming no registered handler are left unbound so a later
    /// pass can pick them up.
    pub fn bind(&self, root: &D::Element) -> BindReport {
        let mut report = BindReport::default();
        let selector = format!("[{}]", self.markers.action);

        for element in self.dom.query_all_within(root, &selector) {
            if self
                .dom
                .attribute(&element, &self.markers.action_bound)
                .is_some()
            {
                report.already_bound += 1;
                continue;
            }
            let Some(raw) = self.dom.attribute(&element, &self.markers.action) else {
                continue;
            };
            let name = ActionMarker::parse(&raw).name;
            if !self.registry.contains(&name) {
                tracing::warn!(action = %name, "no handler registered for action marker");
                report.unresolved.push(name);
                continue;
            }

            self.dom
                .set_attribute(&element, &self.markers.action_bound, "true");
            self.dom.on_click(&element, self.listener(element.clone()));
            report.bound += 1;
        }

        tracing::debug!(
            bound = report.bound,
            already_bound = report.already_bound,
            unresolved = report.unresolved.len(),
            "action markers bound"
        );
        report
    }

    fn listener(&self, element: D::Element) -> ClickListener {
        let dom = Rc::downgrade(&self.dom);
        let registry = Rc::downgrade(&self.registry);
        let runtime = self.runtime.clone();
        let markers = self.markers.clone();
        let on_error = self.on_error.clone();

        Rc::new(move || {
            let Some(dispatch) = Dispatch::read(&dom, &registry, &markers, &element) else {
                return;
            };
            let on_error = on_error.clone();
            runtime.spawn_local(
                async move {
                    if let Err(error) = (dispatch.handler)(dispatch.argument).await {
                        tracing::error!(action = %dispatch.name, %error, "action handler failed");
                        on_error(&error);
                    }
                }
                .boxed_local(),
            );
        })
    }
}

struct Dispatch {
    name: String,
    argument: String,
    handler: ActionHandler,
}

impl Dispatch {
    /// Reads the marker as it is at click time, so rewritten markers take
    /// effect without rebinding.
    fn read<D: ShellDom>(
        dom: &Weak<D>,
        registry: &Weak<HandlerRegistry>,
        markers: &MarkerAttributes,
        element: &D::Element,
    ) -> Option<Self> {
        let dom = dom.upgrade()?;
        let registry = registry.upgrade()?;
        let marker = ActionMarker::parse(&dom.attribute(element, &markers.action)?);
        let Some(handler) = registry.resolve(&marker.name) else {
            tracing::warn!(action = %marker.name, "clicked action has no handler");
            return None;
        };
        let argument = marker
            .argument
            .or_else(|| dom.attribute(element, &markers.argument))
            .unwrap_or_default();
        Some(Self {
            name: marker.name,
            argument,
            handler,
        })
    }
}
