use super::*;

/// The browser event loop: microtask-driven futures and `setTimeout` sleeps.
pub(super) struct BrowserRuntime;

impl ShellRuntime for BrowserRuntime {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        gloo_timers::future::sleep(duration).boxed_local()
    }
}

/// Configuration values: the query string first, then
/// `window.__GEN7_SHELL_CONFIG__`.
pub(super) fn config_lookup(key: &str) -> Option<String> {
    let window = web_sys::window()?;
    query_parameter(&window, key).or_else(|| global_override(&window, key))
}

fn query_parameter(window: &web_sys::Window, key: &str) -> Option<String> {
    let search = window.location().search().ok()?;
    web_sys::UrlSearchParams::new_with_str(&search)
        .ok()?
        .get(key)
}

fn global_override(window: &web_sys::Window, key: &str) -> Option<String> {
    let overrides = js_sys::Reflect::get(window, &JsValue::from_str(CONFIG_GLOBAL)).ok()?;
    if !overrides.is_object() {
        return None;
    }
    let value = js_sys::Reflect::get(&overrides, &JsValue::from_str(key)).ok()?;
    if value.is_undefined() || value.is_null() {
        return None;
    }
    value
        .as_string()
        .or_else(|| js_sys::JSON::stringify(&value).ok()?.as_string())
}

pub(super) fn install_tracing() {
    let level = config_lookup(LOG_LEVEL_KEY)
        .and_then(|raw| raw.trim().parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);
    let mut builder = tracing_wasm::WASMLayerConfigBuilder::new();
    builder.set_max_level(level);
    tracing_wasm::set_as_global_default_with_config(builder.build());
}
