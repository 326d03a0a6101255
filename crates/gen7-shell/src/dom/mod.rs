use std::rc::Rc;

pub mod memory;

/// Callback attached to a clicked element. The adapter has already prevented
/// the default browser action when this runs.
pub type ClickListener = Rc<dyn Fn()>;

/// The slice of the document API the shell needs.
///
/// Implemented over `web-sys` in the browser and by [`memory::MemoryDom`] for
/// headless use. Selectors are CSS selectors; an invalid one matches nothing.
pub trait ShellDom {
    type Element: Clone + 'static;

    fn query(&self, selector: &str) -> Option<Self::Element>;
    fn query_all_within(&self, root: &Self::Element, selector: &str) -> Vec<Self::Element>;
    fn set_inner_html(&self, element: &Self::Element, html: &str);
    fn append_html(&self, element: &Self::Element, html: &str);
    fn set_text(&self, element: &Self::Element, text: &str);
    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;
    fn set_attribute(&self, element: &Self::Element, name: &str, value: &str);
    fn add_class(&self, element: &Self::Element, class: &str);
    fn remove_class(&self, element: &Self::Element, class: &str);
    fn on_click(&self, element: &Self::Element, listener: ClickListener);
}

/// `[name="value"]` with `value` escaped as a CSS string, so ids coming from
/// the host cannot break out of the selector.
#[must_use]
pub fn attribute_selector(name: &str, value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            c if c.is_control() => escaped.push_str(&format!("\\{:x} ", u32::from(c))),
            c => escaped.push(c),
        }
    }
    format!("[{name}=\"{escaped}\"]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_selector_escapes_quotes_backslashes_and_controls() {
        assert_eq!(attribute_selector("data-id", "42/btn"), r#"[data-id="42/btn"]"#);
        assert_eq!(
            attribute_selector("data-id", "4\"2]\\x\n"),
            r#"[data-id="4\"2]\\x\a "]"#
        );
    }
}
