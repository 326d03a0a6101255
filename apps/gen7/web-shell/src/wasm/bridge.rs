use super::*;

use js_sys::{Array, Function, JSON, Promise, Reflect};
use wasm_bindgen_futures::JsFuture;

/// Looks for `window.pywebview.api`, which the host injects some time after
/// the page starts loading.
pub(super) struct PywebviewProbe;

impl BridgeProbe for PywebviewProbe {
    fn probe(&self) -> Option<Rc<dyn HostBridge>> {
        let window = web_sys::window()?;
        let host = Reflect::get(&window, &JsValue::from_str(HOST_GLOBAL)).ok()?;
        if !host.is_object() {
            return None;
        }
        let api = Reflect::get(&host, &JsValue::from_str(HOST_API_PROPERTY)).ok()?;
        if !api.is_object() {
            return None;
        }
        Some(Rc::new(PywebviewBridge { api }))
    }
}

struct PywebviewBridge {
    api: JsValue,
}

#[async_trait(?Send)]
impl HostBridge for PywebviewBridge {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, String> {
        let function = Reflect::get(&self.api, &JsValue::from_str(method))
            .map_err(describe_js_error)?
            .dyn_into::<Function>()
            .map_err(|_| format!("host api has no method {method}"))?;

        let js_args = Array::new();
        for arg in &args {
            js_args.push(&to_js(arg)?);
        }
        let returned = function
            .apply(&self.api, &js_args)
            .map_err(describe_js_error)?;
        let settled = match returned.dyn_into::<Promise>() {
            Ok(promise) => JsFuture::from(promise)
                .await
                .map_err(describe_js_error)?,
            Err(value) => value,
        };
        from_js(&settled)
    }
}

fn to_js(value: &Value) -> Result<JsValue, String> {
    let encoded = serde_json::to_string(value).map_err(|error| error.to_string())?;
    JSON::parse(&encoded).map_err(describe_js_error)
}

fn from_js(value: &JsValue) -> Result<Value, String> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }
    let encoded = JSON::stringify(value)
        .map_err(describe_js_error)?
        .as_string()
        .ok_or_else(|| "host returned a value that is not JSON".to_string())?;
    serde_json::from_str(&encoded).map_err(|error| format!("invalid host response: {error}"))
}

fn describe_js_error(value: JsValue) -> String {
    if let Some(message) = value.as_string() {
        return message;
    }
    match value.dyn_ref::<js_sys::Error>() {
        Some(error) => String::from(error.message()),
        None => format!("{value:?}"),
    }
}
