//! Headless document used when no browser is around: tests, snapshotting
//! rendered pages, and driving the lifecycle from native tooling.
//!
//! Markup goes through `scraper`'s HTML5 parser and is grafted into a mutable
//! arena. Queries re-parse a snapshot of the arena in which every element
//! carries its arena id, so any selector `scraper` understands works here.

use std::cell::RefCell;
use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};

use super::{ClickListener, ShellDom};

const VOID_ELEMENTS: [&str; 8] = ["area", "br", "col", "hr", "img", "input", "link", "meta"];
const DOCUMENT_TAG: &str = "#document";
const NODE_ATTRIBUTE: &str = "data-memory-node";
const FRAGMENT_ATTRIBUTE: &str = "data-memory-fragment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Default)]
pub struct MemoryDom {
    nodes: RefCell<Vec<Node>>,
    listeners: RefCell<HashMap<NodeId, Vec<ClickListener>>>,
}

impl MemoryDom {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(vec![Node {
                kind: NodeKind::Element {
                    tag: DOCUMENT_TAG.to_string(),
                    attributes: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
            }]),
            listeners: RefCell::new(HashMap::new()),
        }
    }

    /// Parses a whole document; fragments get the usual `html`/`body` shell.
    #[must_use]
    pub fn from_markup(markup: &str) -> Self {
        let dom = Self::new();
        let parsed = Html::parse_document(markup);
        graft_element(&mut dom.nodes.borrow_mut(), dom.document(), parsed.root_element());
        dom
    }

    #[must_use]
    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    #[must_use]
    pub fn inner_html(&self, element: &NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        if let Some(node) = nodes.get(element.0) {
            for child in &node.children {
                serialize(&nodes, *child, false, &mut out);
            }
        }
        out
    }

    #[must_use]
    pub fn text_content(&self, element: &NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        collect_text(&nodes, *element, &mut out);
        out
    }

    #[must_use]
    pub fn has_class(&self, element: &NodeId, class: &str) -> bool {
        self.attribute(element, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|value| value == class))
    }

    #[must_use]
    pub fn listener_count(&self, element: &NodeId) -> usize {
        self.listeners.borrow().get(element).map_or(0, Vec::len)
    }

    /// Fires every click listener on `element` and returns how many ran.
    pub fn click(&self, element: &NodeId) -> usize {
        let listeners = self
            .listeners
            .borrow()
            .get(element)
            .cloned()
            .unwrap_or_default();
        for listener in &listeners {
            listener();
        }
        listeners.len()
    }

    /// Elements matching `selector`, in document order. With a scope only
    /// its descendants are considered. Detached nodes never match.
    fn matching(&self, scope: Option<NodeId>, selector: &str) -> Vec<NodeId> {
        let parsed = match Selector::parse(selector) {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::warn!(selector, ?error, "invalid selector");
                return Vec::new();
            }
        };
        let snapshot = Html::parse_document(&self.tagged_markup());
        match scope {
            None => snapshot.select(&parsed).filter_map(node_id_of).collect(),
            Some(scope) => tagged_element(&snapshot, scope)
                .map(|root| root.select(&parsed).filter_map(node_id_of).collect())
                .unwrap_or_default(),
        }
    }

    fn tagged_markup(&self) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        if let Some(document) = nodes.get(self.document().0) {
            for child in &document.children {
                serialize(&nodes, *child, true, &mut out);
            }
        }
        out
    }

    fn tag(&self, element: NodeId) -> Option<String> {
        match &self.nodes.borrow().get(element.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    fn insert_markup(&self, parent: NodeId, markup: &str) {
        let context = self.tag(parent).unwrap_or_default();
        let (wrapped, wrapper) = wrap_for_context(&context, markup);
        let parsed = Html::parse_fragment(&wrapped);
        let mut nodes = self.nodes.borrow_mut();
        match wrapper {
            Some(wrapper) => {
                if let Some(container) = parsed.select(&wrapper).next() {
                    graft_children(&mut nodes, parent, container);
                }
            }
            None => graft_children(&mut nodes, parent, parsed.root_element()),
        }
    }

    fn detach_children(&self, element: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        let Some(node) = nodes.get_mut(element.0) else {
            return;
        };
        let detached = std::mem::take(&mut node.children);
        for child in detached {
            if let Some(child) = nodes.get_mut(child.0) {
                child.parent = None;
            }
        }
    }

    fn update_attributes(&self, element: &NodeId, update: impl FnOnce(&mut Vec<(String, String)>)) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(Node {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = nodes.get_mut(element.0)
        {
            update(attributes);
        }
    }
}

impl ShellDom for MemoryDom {
    type Element = NodeId;

    fn query(&self, selector: &str) -> Option<NodeId> {
        self.matching(None, selector).into_iter().next()
    }

    fn query_all_within(&self, root: &NodeId, selector: &str) -> Vec<NodeId> {
        let scope = (*root != self.document()).then_some(*root);
        self.matching(scope, selector)
    }

    fn set_inner_html(&self, element: &NodeId, html: &str) {
        self.detach_children(*element);
        self.insert_markup(*element, html);
    }

    fn append_html(&self, element: &NodeId, html: &str) {
        self.insert_markup(*element, html);
    }

    fn set_text(&self, element: &NodeId, text: &str) {
        self.detach_children(*element);
        push_node(
            &mut self.nodes.borrow_mut(),
            *element,
            NodeKind::Text(text.to_string()),
        );
    }

    fn attribute(&self, element: &NodeId, name: &str) -> Option<String> {
        let nodes = self.nodes.borrow();
        match &nodes.get(element.0)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone()),
            NodeKind::Text(_) => None,
        }
    }

    fn set_attribute(&self, element: &NodeId, name: &str, value: &str) {
        self.update_attributes(element, |attributes| {
            match attributes.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        });
    }

    fn add_class(&self, element: &NodeId, class: &str) {
        if self.has_class(element, class) {
            return;
        }
        let classes = match self.attribute(element, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attribute(element, "class", &classes);
    }

    fn remove_class(&self, element: &NodeId, class: &str) {
        let Some(existing) = self.attribute(element, "class") else {
            return;
        };
        let remaining = existing
            .split_whitespace()
            .filter(|value| *value != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(element, "class", &remaining);
    }

    fn on_click(&self, element: &NodeId, listener: ClickListener) {
        self.listeners
            .borrow_mut()
            .entry(*element)
            .or_default()
            .push(listener);
    }
}

/// Fragment parsing happens in a `body` context, where table parts are
/// dropped. Those are parsed inside a matching table skeleton instead.
fn wrap_for_context(context: &str, markup: &str) -> (String, Option<Selector>) {
    let wrapped = match context {
        "table" => format!("<table {FRAGMENT_ATTRIBUTE}>{markup}</table>"),
        "tbody" | "thead" | "tfoot" => {
            format!("<table><{context} {FRAGMENT_ATTRIBUTE}>{markup}</{context}></table>")
        }
        "tr" => format!("<table><tbody><tr {FRAGMENT_ATTRIBUTE}>{markup}</tr></tbody></table>"),
        _ => return (markup.to_string(), None),
    };
    let wrapper = Selector::parse(&format!("[{FRAGMENT_ATTRIBUTE}]")).ok();
    (wrapped, wrapper)
}

fn tagged_element(snapshot: &Html, id: NodeId) -> Option<ElementRef<'_>> {
    let selector = Selector::parse(&format!("[{NODE_ATTRIBUTE}=\"{}\"]", id.0)).ok()?;
    snapshot.select(&selector).next()
}

fn node_id_of(element: ElementRef<'_>) -> Option<NodeId> {
    element
        .value()
        .attr(NODE_ATTRIBUTE)?
        .parse()
        .ok()
        .map(NodeId)
}

fn graft_element(nodes: &mut Vec<Node>, parent: NodeId, source: ElementRef<'_>) {
    let element = source.value();
    let mut attributes = element
        .attrs()
        .filter(|(key, _)| *key != FRAGMENT_ATTRIBUTE)
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect::<Vec<_>>();
    attributes.sort();
    let id = push_node(
        nodes,
        parent,
        NodeKind::Element {
            tag: element.name().to_string(),
            attributes,
        },
    );
    graft_children(nodes, id, source);
}

fn graft_children(nodes: &mut Vec<Node>, parent: NodeId, source: ElementRef<'_>) {
    for child in source.children() {
        if let Some(element) = ElementRef::wrap(child) {
            graft_element(nodes, parent, element);
        } else if let Some(text) = child.value().as_text() {
            let text: &str = text;
            push_node(nodes, parent, NodeKind::Text(text.to_string()));
        }
    }
}

fn push_node(nodes: &mut Vec<Node>, parent: NodeId, kind: NodeKind) -> NodeId {
    let id = NodeId(nodes.len());
    nodes.push(Node {
        kind,
        parent: Some(parent),
        children: Vec::new(),
    });
    if let Some(parent) = nodes.get_mut(parent.0) {
        parent.children.push(id);
    }
    id
}

fn serialize(nodes: &[Node], id: NodeId, tagged: bool, out: &mut String) {
    let Some(node) = nodes.get(id.0) else {
        return;
    };
    match &node.kind {
        NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
        NodeKind::Element { tag, attributes } => {
            out.push('<');
            out.push_str(tag);
            if tagged {
                out.push_str(&format!(" {NODE_ATTRIBUTE}=\"{}\"", id.0));
            }
            for (key, value) in attributes {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(&html_escape::encode_double_quoted_attribute(value));
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }
            for child in &node.children {
                serialize(nodes, *child, tagged, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn collect_text(nodes: &[Node], id: NodeId, out: &mut String) {
    let Some(node) = nodes.get(id.0) else {
        return;
    };
    if let NodeKind::Text(text) = &node.kind {
        out.push_str(text);
    }
    for child in &node.children {
        collect_text(nodes, *child, out);
    }
}
