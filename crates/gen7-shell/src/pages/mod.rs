use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::bridge::SystemApi;
use crate::context::ShellContext;
use crate::dom::ShellDom;
use crate::error::ShellError;
use crate::router::{PageDescriptor, RouteTable};

pub mod history;
pub mod index;

pub type PageFactory<D> =
    Box<dyn Fn(&ShellContext<D>, &SystemApi) -> Result<PageDescriptor, ShellError>>;

/// Page modules by location. A module's factory registers its action
/// handlers and returns the page descriptor.
pub struct PageCatalog<D: ShellDom> {
    factories: HashMap<String, PageFactory<D>>,
}

impl<D: ShellDom + 'static> Default for PageCatalog<D> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }
}

impl<D: ShellDom + 'static> PageCatalog<D> {
    /// The pages this shell ships with.
    #[must_use]
    pub fn standard() -> Self {
        Self::default()
            .with(index::MODULE, index::setup::<D>)
            .with(history::MODULE, history::setup::<D>)
    }

    #[must_use]
    pub fn with<F>(mut self, module: &str, factory: F) -> Self
    where
        F: Fn(&ShellContext<D>, &SystemApi) -> Result<PageDescriptor, ShellError> + 'static,
    {
        self.factories.insert(module.to_string(), Box::new(factory));
        self
    }

    /// Resolves every route's module. Each module is set up once even when
    /// several paths point at it.
    pub fn build_routes(
        &self,
        routes: &BTreeMap<String, String>,
        context: &ShellContext<D>,
        api: &SystemApi,
    ) -> Result<RouteTable, ShellError> {
        let mut table = RouteTable::new();
        let mut loaded: HashMap<&str, PageDescriptor> = HashMap::new();

        for (path, module) in routes {
            let page = match loaded.get(module.as_str()) {
                Some(page) => page.clone(),
                None => {
                    let factory =
                        self.factories
                            .get(module)
                            .ok_or_else(|| ShellError::PageModuleMissing {
                                module: module.clone(),
                            })?;
                    let page = factory(context, api)?;
                    tracing::debug!(%module, "page module loaded");
                    loaded.insert(module.as_str(), page.clone());
                    page
                }
            };
            table.insert(path, page);
        }
        Ok(table)
    }
}
