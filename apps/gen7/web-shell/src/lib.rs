#[cfg(target_arch = "wasm32")]
mod wasm_constants;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures_util::FutureExt;
    use futures_util::future::LocalBoxFuture;
    use gen7_shell::{
        BridgeProbe, ClickListener, HostBridge, PageCatalog, Shell, ShellConfig, ShellContext,
        ShellDom, ShellRuntime, TemplateFetcher,
    };
    use serde_json::Value;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::spawn_local;
    use web_sys::Element;

    use crate::wasm_constants::*;

    mod bridge;
    mod dom;
    mod lifecycle;
    mod network;

    use bridge::PywebviewProbe;
    use dom::WebDom;
    use lifecycle::*;
    use network::HttpTemplateFetcher;

    thread_local! {
        static SHELL: RefCell<Option<Rc<Shell<WebDom>>>> = const { RefCell::new(None) };
    }

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
        install_tracing();

        let config = match ShellConfig::from_lookup(config_lookup) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(%error, "ignoring invalid shell configuration");
                ShellConfig::default()
            }
        };
        let context = ShellContext::new(
            config,
            Rc::new(WebDom::default()),
            Rc::new(BrowserRuntime),
            Rc::new(HttpTemplateFetcher),
        );
        let shell = Rc::new(Shell::new(
            Rc::new(context),
            PageCatalog::standard(),
            Rc::new(PywebviewProbe),
        ));
        SHELL.with(|slot| *slot.borrow_mut() = Some(shell.clone()));

        spawn_local(async move {
            match shell.bootstrap().await {
                Ok(outcome) => tracing::info!(?outcome, "shell bootstrap finished"),
                Err(error) => tracing::error!(%error, "shell did not start"),
            }
        });
    }

    #[wasm_bindgen]
    pub fn shell_diagnostics_json() -> String {
        SHELL
            .with(|slot| {
                slot.borrow()
                    .as_ref()
                    .map(|shell| shell.context().diagnostics_json())
            })
            .unwrap_or_else(|| DIAGNOSTICS_NOT_STARTED.to_string())
    }

    /// Navigates from host-side script, e.g. a native menu entry.
    #[wasm_bindgen]
    pub fn navigate(path: String) {
        let Some(shell) = SHELL.with(|slot| slot.borrow().clone()) else {
            tracing::warn!(%path, "navigation requested before the shell started");
            return;
        };
        spawn_local(async move { shell.navigate(&path).await });
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm::{navigate, shell_diagnostics_json};

#[cfg(not(target_arch = "wasm32"))]
pub fn shell_diagnostics_json() -> String {
    "{\"phase\":\"native\",\"detail\":\"shell diagnostics only available on wasm\"}".to_string()
}
