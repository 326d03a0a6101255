use super::*;

/// `web-sys` document adapter. Click closures stay alive here until their
/// element leaves the document.
#[derive(Default)]
pub(super) struct WebDom {
    listeners: RefCell<Vec<(Element, Closure<dyn FnMut(web_sys::Event)>)>>,
}

impl WebDom {
    fn document() -> Option<web_sys::Document> {
        web_sys::window()?.document()
    }
}

impl ShellDom for WebDom {
    type Element = Element;

    fn query(&self, selector: &str) -> Option<Element> {
        Self::document()?.query_selector(selector).ok().flatten()
    }

    fn query_all_within(&self, root: &Element, selector: &str) -> Vec<Element> {
        let Ok(nodes) = root.query_selector_all(selector) else {
            tracing::warn!(selector, "invalid selector");
            return Vec::new();
        };
        (0..nodes.length())
            .filter_map(|index| nodes.item(index))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn set_inner_html(&self, element: &Element, html: &str) {
        element.set_inner_html(html);
    }

    fn append_html(&self, element: &Element, html: &str) {
        if element.insert_adjacent_html("beforeend", html).is_err() {
            tracing::warn!("failed to append markup");
        }
    }

    fn set_text(&self, element: &Element, text: &str) {
        element.set_text_content(Some(text));
    }

    fn attribute(&self, element: &Element, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn set_attribute(&self, element: &Element, name: &str, value: &str) {
        if element.set_attribute(name, value).is_err() {
            tracing::warn!(attribute = name, "failed to set attribute");
        }
    }

    fn add_class(&self, element: &Element, class: &str) {
        let _ = element.class_list().add_1(class);
    }

    fn remove_class(&self, element: &Element, class: &str) {
        let _ = element.class_list().remove_1(class);
    }

    fn on_click(&self, element: &Element, listener: ClickListener) {
        let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(
            move |event: web_sys::Event| {
                event.prevent_default();
                listener();
            },
        ));
        if element
            .add_event_listener_with_callback("click", callback.as_ref().unchecked_ref())
            .is_err()
        {
            tracing::warn!("failed to attach click listener");
            return;
        }

        let mut listeners = self.listeners.borrow_mut();
        listeners.retain(|(owner, _)| owner.is_connected());
        listeners.push((element.clone(), callback));
    }
}
