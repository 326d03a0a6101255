//! Page lifecycle and navigation engine for the Gen7 desktop web view.
//!
//! The engine is generic over the document ([`dom::ShellDom`]), the event
//! loop ([`runtime::ShellRuntime`]), template transport
//! ([`template::TemplateFetcher`]) and the host API ([`bridge::BridgeProbe`]),
//! so it runs the same in the browser and under test.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod binder;
pub mod bootstrap;
pub mod bridge;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod dom;
pub mod error;
pub mod pages;
pub mod router;
pub mod runtime;
pub mod status;
pub mod template;

#[cfg(test)]
mod testing;

pub use binder::{ActionBinder, ActionMarker, BindReport, HandlerRegistry};
pub use bootstrap::{BootOutcome, Shell};
pub use bridge::{
    BridgeGateway, BridgeProbe, BridgeState, HistoryRecord, HostBridge, ReadinessPolicy, SystemApi,
};
pub use config::{ConfigError, ShellConfig};
pub use context::ShellContext;
pub use diagnostics::ShellDiagnostics;
pub use dom::{ClickListener, ShellDom};
pub use error::{ErrorSink, ShellError};
pub use pages::PageCatalog;
pub use router::{NavigationState, Page, PageDescriptor, RouteTable, Router, RouterState};
pub use runtime::ShellRuntime;
pub use template::{RenderContext, Template, TemplateCache, TemplateFetcher, TemplateHandle};
