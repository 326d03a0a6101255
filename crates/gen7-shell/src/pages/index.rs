use std::rc::Rc;

use async_trait::async_trait;

use crate::bridge::SystemApi;
use crate::context::ShellContext;
use crate::dom::ShellDom;
use crate::error::ShellError;
use crate::router::{Page, PageDescriptor};
use crate::template::RenderContext;

pub const MODULE: &str = "pages::index";
pub const URL: &str = "/pages/index.html";
const TEMPLATE: &str = "page:index";

/// Landing page: application title plus a button that opens a host window.
pub struct IndexPage {
    api: SystemApi,
}

pub fn setup<D: ShellDom + 'static>(
    context: &ShellContext<D>,
    api: &SystemApi,
) -> Result<PageDescriptor, ShellError> {
    let dispatcher = api.clone();
    context
        .registry
        .register("actions.dispatch", move |argument: String| {
            let api = dispatcher.clone();
            async move {
                let code = Some(argument.trim())
                    .filter(|code| !code.is_empty())
                    .map(str::to_string);
                let window = api.dispatch(code.as_deref()).await?;
                tracing::info!(%window, "host window dispatched");
                Ok(())
            }
        })?;

    Ok(Rc::new(IndexPage { api: api.clone() }))
}

#[async_trait(?Send)]
impl Page for IndexPage {
    fn url(&self) -> &str {
        URL
    }

    fn template_name(&self) -> Option<&str> {
        Some(TEMPLATE)
    }

    async fn init(&self) -> Result<RenderContext, ShellError> {
        let name = self.api.app_name().await?;
        let description = self.api.app_description().await?;
        Ok(RenderContext::new().with("app_name", format!("{name} - {description}")))
    }
}
