//! Headless in-memory document
//!
//! A small DOM model good enough to drive the scene engine without a
//! browser: an element tree with attributes, classes, inline styles and a
//! per-element style rule table, plus a deliberately simple layout model.
//!
//! # Layout model
//!
//! - The host assigns each element a *flow frame* (document position and
//!   border-box size) with [`Document::set_frame`]. Moving an element in the
//!   tree does not move its flow position.
//! - Elements created by the engine (pin spacers) inherit the flow position of
//!   the element they are inserted before. Without a frame they fill the
//!   parent's width and wrap the height of their in-flow children.
//! - Declared `width`/`height` in `px` or `%` (resolved against the parent's
//!   client box) override the frame size; `min-width`/`min-height` and
//!   `padding-*` are honoured, `box-sizing` decides whether padding adds up.
//! - `position: relative` shifts by `top`/`left`; `position: fixed` places the
//!   element at `top`/`left` in viewport coordinates and carries descendants.
//! - Scrolling elements shift their descendants by their scroll offset.
//!   Followers are not re-flowed and scroll positions are not clamped.
//!
//! Native `scroll` events are delivered synchronously from
//! [`Dom::set_scroll_offset`]; `resize` from [`Document::set_viewport`] and
//! [`Dom::dispatch`].

use std::cell::RefCell;
use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::css::{parse_float, px_or_zero, CssLength};
use crate::dom::{
    Container, Dom, ElementId, ListenerId, NativeCallback, NativeEvent, Point, Rect, Size,
};
use crate::error::{HostError, Result};

const BOX_SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

struct Node {
    tag: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    attributes: IndexMap<String, String>,
    classes: IndexSet<String>,
    inline: IndexMap<String, String>,
    rules: IndexMap<String, String>,
    origin: Option<Point>,
    size: Option<Size>,
    scroll: Point,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            parent: None,
            children: Vec::new(),
            attributes: IndexMap::new(),
            classes: IndexSet::new(),
            inline: IndexMap::new(),
            rules: IndexMap::new(),
            origin: None,
            size: None,
            scroll: Point::ZERO,
        }
    }
}

struct Listener {
    target: Container,
    event: NativeEvent,
    seq: u64,
    callback: NativeCallback,
}

struct DocumentInner {
    nodes: SlotMap<ElementId, Node>,
    root: ElementId,
    body: ElementId,
    viewport: Size,
    window_scroll: Point,
    listeners: SlotMap<ListenerId, Listener>,
    listener_seq: u64,
}

/// Headless document implementing [`Dom`]
pub struct Document {
    inner: RefCell<DocumentInner>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Document")
            .field("elements", &inner.nodes.len())
            .field("viewport", &inner.viewport)
            .field("window_scroll", &inner.window_scroll)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

// ============================================================================
// Selectors
// ============================================================================

/// Compound selector: optional tag, optional id, any number of classes
#[derive(Debug, Default, PartialEq)]
struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: SmallVec<[String; 2]>,
}

fn parse_selector(input: &str) -> Result<Selector> {
    let input = input.trim();
    if input.is_empty()
        || input
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '>' | '+' | '~' | '[' | ':' | ','))
    {
        return Err(HostError::UnsupportedSelector(input.to_string()));
    }

    let mut selector = Selector::default();
    let mut current = String::new();
    let mut kind = ' ';
    let flush = |kind: char, part: &mut String, selector: &mut Selector| -> Result<()> {
        if part.is_empty() {
            return if kind == ' ' {
                Ok(())
            } else {
                Err(HostError::UnsupportedSelector(input.to_string()))
            };
        }
        let value = std::mem::take(part);
        match kind {
            '#' => selector.id = Some(value),
            '.' => selector.classes.push(value),
            _ if value == "*" => {}
            _ => selector.tag = Some(value.to_ascii_lowercase()),
        }
        Ok(())
    };
    for c in input.chars() {
        if c == '#' || c == '.' {
            flush(kind, &mut current, &mut selector)?;
            kind = c;
        } else {
            current.push(c);
        }
    }
    flush(kind, &mut current, &mut selector)?;
    Ok(selector)
}

impl Selector {
    fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = &self.tag {
            if &node.tag != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attributes.get("id") != Some(id) {
                return false;
            }
        }
        self.classes.iter().all(|c| node.classes.contains(c))
    }
}

// ============================================================================
// Style Helpers
// ============================================================================

fn default_style(tag: &str, property: &str) -> &'static str {
    match property {
        "position" => "static",
        "display" => match tag {
            "span" | "a" | "img" | "em" | "strong" => "inline",
            _ => "block",
        },
        "box-sizing" => "content-box",
        "top" | "left" | "bottom" | "right" | "width" | "height" => "auto",
        "min-width" | "min-height" => "0px",
        p if p.starts_with("margin-") || p.starts_with("padding-") => "0px",
        _ => "",
    }
}

fn is_box_shorthand(property: &str) -> bool {
    matches!(property, "margin" | "padding")
}

/// Expand a 1–4 value box shorthand into top/right/bottom/left
fn expand_box(value: &str) -> Option<[String; 4]> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    let [t, r, b, l] = match parts.as_slice() {
        [a] => [*a, *a, *a, *a],
        [a, b] => [*a, *b, *a, *b],
        [a, b, c] => [*a, *b, *c, *b],
        [a, b, c, d] => [*a, *b, *c, *d],
        _ => return None,
    };
    Some([t.to_string(), r.to_string(), b.to_string(), l.to_string()])
}

/// Serialize top/right/bottom/left into the shortest shorthand
fn collapse_box(values: [&str; 4]) -> String {
    let [t, r, b, l] = values;
    if t == r && r == b && b == l {
        t.to_string()
    } else if t == b && r == l {
        format!("{} {}", t, r)
    } else if r == l {
        format!("{} {} {}", t, r, b)
    } else {
        format!("{} {} {} {}", t, r, b, l)
    }
}

// ============================================================================
// Document
// ============================================================================

impl Document {
    /// Create an empty document with a `<body>` and the given viewport
    pub fn new(viewport: Size) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new("html"));
        let body = nodes.insert(Node::new("body"));
        nodes[body].parent = Some(root);
        nodes[root].children.push(body);
        for id in [root, body] {
            nodes[id].origin = Some(Point::ZERO);
            nodes[id].size = Some(Size::new(viewport.width, 0.0));
        }
        Self {
            inner: RefCell::new(DocumentInner {
                nodes,
                root,
                body,
                viewport,
                window_scroll: Point::ZERO,
                listeners: SlotMap::with_key(),
                listener_seq: 0,
            }),
        }
    }

    /// Create an element with a flow frame and append it to `<body>`
    pub fn create_in_body(&self, tag: &str, frame: Rect) -> ElementId {
        let body = self.inner.borrow().body;
        self.create_child(body, tag, frame)
    }

    /// Create an element with a flow frame and append it to `parent`
    pub fn create_child(&self, parent: ElementId, tag: &str, frame: Rect) -> ElementId {
        let id = self.create_element(tag);
        self.set_frame(id, frame);
        self.append_child(parent, id);
        id
    }

    /// Set the flow position and border-box size of an element
    pub fn set_frame(&self, id: ElementId, frame: Rect) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(id) {
            node.origin = Some(frame.origin);
            node.size = Some(frame.size);
        }
    }

    /// Set the `id` attribute
    pub fn set_element_id(&self, id: ElementId, value: &str) {
        self.set_attribute(id, "id", value);
    }

    /// Set a stylesheet-level declaration (below inline styles)
    pub fn set_style_rule(&self, id: ElementId, property: &str, value: &str) {
        let mut inner = self.inner.borrow_mut();
        let Some(node) = inner.nodes.get_mut(id) else {
            return;
        };
        match (is_box_shorthand(property), expand_box(value)) {
            (true, Some(sides)) => {
                for (side, v) in BOX_SIDES.iter().zip(sides) {
                    node.rules.insert(format!("{}-{}", property, side), v);
                }
            }
            _ => {
                node.rules.insert(property.to_string(), value.to_string());
            }
        }
    }

    /// Resize the viewport and deliver `resize` to window listeners
    pub fn set_viewport(&self, viewport: Size) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.viewport = viewport;
            let (root, body) = (inner.root, inner.body);
            for id in [root, body] {
                if let Some(size) = inner.nodes[id].size.as_mut() {
                    size.width = viewport.width;
                }
            }
        }
        self.dispatch(Container::Window, NativeEvent::Resize);
    }

    /// Current viewport size
    pub fn viewport(&self) -> Size {
        self.inner.borrow().viewport
    }

    /// Detach an element and drop it together with its subtree
    pub fn destroy_element(&self, id: ElementId) {
        if let Some(parent) = self.parent(id) {
            self.remove_child(parent, id);
        }
        let mut inner = self.inner.borrow_mut();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = inner.nodes.remove(next) {
                stack.extend(node.children);
            }
        }
    }

    /// Lowercase tag name
    pub fn tag(&self, id: ElementId) -> Option<String> {
        self.inner.borrow().nodes.get(id).map(|n| n.tag.clone())
    }

    /// Child elements in order
    pub fn children(&self, id: ElementId) -> Vec<ElementId> {
        self.inner
            .borrow()
            .nodes
            .get(id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Class list in insertion order
    pub fn classes(&self, id: ElementId) -> Vec<String> {
        self.inner
            .borrow()
            .nodes
            .get(id)
            .map(|n| n.classes.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All inline declarations, sorted by property name
    pub fn inline_declarations(&self, id: ElementId) -> BTreeMap<String, String> {
        self.inner
            .borrow()
            .nodes
            .get(id)
            .map(|n| {
                n.inline
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of registered native listeners
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    fn listeners_for(&self, target: Container, event: NativeEvent) -> Vec<NativeCallback> {
        let inner = self.inner.borrow();
        let mut matching: Vec<(u64, NativeCallback)> = inner
            .listeners
            .values()
            .filter(|l| l.target == target && l.event == event)
            .map(|l| (l.seq, l.callback.clone()))
            .collect();
        matching.sort_by_key(|(seq, _)| *seq);
        matching.into_iter().map(|(_, cb)| cb).collect()
    }
}

// ============================================================================
// Layout
// ============================================================================

impl DocumentInner {
    fn computed(&self, id: ElementId, property: &str) -> String {
        let Some(node) = self.nodes.get(id) else {
            return String::new();
        };
        if is_box_shorthand(property) {
            let sides: Vec<String> = BOX_SIDES
                .iter()
                .map(|side| self.computed(id, &format!("{}-{}", property, side)))
                .collect();
            return collapse_box([
                sides[0].as_str(),
                sides[1].as_str(),
                sides[2].as_str(),
                sides[3].as_str(),
            ]);
        }
        if let Some(v) = node.inline.get(property).filter(|v| !v.is_empty()) {
            return v.clone();
        }
        if let Some(v) = node.rules.get(property) {
            return v.clone();
        }
        default_style(&node.tag, property).to_string()
    }

    fn flow_origin(&self, id: ElementId) -> Point {
        self.nodes
            .get(id)
            .and_then(|n| n.origin)
            .unwrap_or(Point::ZERO)
    }

    fn extent(&self, id: ElementId, horizontal: bool) -> f64 {
        let Some(node) = self.nodes.get(id) else {
            return 0.0;
        };
        let (property, min_property) = if horizontal {
            ("width", "min-width")
        } else {
            ("height", "min-height")
        };
        let padding = self.padding(id, horizontal);
        let border_box = self.computed(id, "box-sizing") == "border-box";
        let declared = self
            .computed(id, property)
            .parse::<CssLength>()
            .unwrap_or(CssLength::Auto);

        let from_declared = |v: f64| if border_box { (v - padding).max(0.0) } else { v };
        let content = match declared {
            CssLength::Px(v) => from_declared(v),
            CssLength::Percent(p) => {
                let base = match node.parent {
                    Some(parent) => self.extent(parent, horizontal),
                    None if horizontal => self.viewport.width,
                    None => self.viewport.height,
                };
                from_declared(base * p / 100.0)
            }
            CssLength::Auto => match node.size {
                Some(s) => (if horizontal { s.width } else { s.height } - padding).max(0.0),
                // frameless blocks fill the parent's content box and wrap in-flow children
                None if horizontal => node.parent.map_or(self.viewport.width, |parent| {
                    (self.extent(parent, true) - self.padding(parent, true)).max(0.0)
                }),
                None => node
                    .children
                    .iter()
                    .filter(|c| !matches!(self.computed(**c, "position").as_str(), "fixed" | "absolute"))
                    .map(|c| self.extent(*c, false))
                    .sum(),
            },
        };
        let min = parse_float(&self.computed(id, min_property)).unwrap_or(0.0);
        content.max(min) + padding
    }

    fn padding(&self, id: ElementId, horizontal: bool) -> f64 {
        let (a, b) = if horizontal {
            ("padding-left", "padding-right")
        } else {
            ("padding-top", "padding-bottom")
        };
        px_or_zero(&self.computed(id, a)) + px_or_zero(&self.computed(id, b))
    }

    fn size(&self, id: ElementId) -> Size {
        Size::new(self.extent(id, true), self.extent(id, false))
    }

    /// Border box in document coordinates
    fn document_rect(&self, id: ElementId) -> Rect {
        let size = self.size(id);
        let position = self.computed(id, "position");
        if position == "fixed" {
            let flow = self.flow_origin(id);
            let top = parse_float(&self.computed(id, "top")).unwrap_or(flow.y);
            let left = parse_float(&self.computed(id, "left")).unwrap_or(flow.x);
            return Rect::new(
                left + self.window_scroll.x,
                top + self.window_scroll.y,
                size.width,
                size.height,
            );
        }

        let mut origin = self.flow_origin(id);
        if position == "relative" || position == "absolute" {
            origin.y += parse_float(&self.computed(id, "top")).unwrap_or(0.0);
            origin.x += parse_float(&self.computed(id, "left")).unwrap_or(0.0);
        }

        let mut ancestor = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(a) = ancestor {
            let node = &self.nodes[a];
            origin.x -= node.scroll.x;
            origin.y -= node.scroll.y;
            if self.computed(a, "position") == "fixed" {
                let fixed = self.document_rect(a);
                let flow = self.flow_origin(a);
                origin.x += fixed.left() - flow.x;
                origin.y += fixed.top() - flow.y;
                break;
            }
            ancestor = node.parent;
        }
        Rect::new(origin.x, origin.y, size.width, size.height)
    }

    fn is_in_tree(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == self.root {
                return true;
            }
            current = self.nodes.get(c).and_then(|n| n.parent);
        }
        false
    }

    fn collect_matches(&self, id: ElementId, selector: &Selector, out: &mut Vec<ElementId>) {
        let node = &self.nodes[id];
        if selector.matches(node) {
            out.push(id);
        }
        for &child in &node.children {
            self.collect_matches(child, selector, out);
        }
    }

    fn detach(&mut self, child: ElementId) {
        if let Some(parent) = self.nodes.get(child).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| *c != child);
            }
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
    }
}

// ============================================================================
// Dom Implementation
// ============================================================================

impl Dom for Document {
    fn query(&self, selector: &str) -> Vec<ElementId> {
        let parsed = match parse_selector(selector) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!("{}", err);
                return Vec::new();
            }
        };
        let inner = self.inner.borrow();
        let mut out = Vec::new();
        inner.collect_matches(inner.root, &parsed, &mut out);
        out
    }

    fn body(&self) -> Option<ElementId> {
        Some(self.inner.borrow().body)
    }

    fn exists(&self, id: ElementId) -> bool {
        self.inner.borrow().nodes.contains_key(id)
    }

    fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.inner.borrow().nodes.get(id).and_then(|n| n.parent)
    }

    fn first_child(&self, id: ElementId) -> Option<ElementId> {
        self.inner
            .borrow()
            .nodes
            .get(id)
            .and_then(|n| n.children.first().copied())
    }

    fn contains(&self, ancestor: ElementId, id: ElementId) -> bool {
        let inner = self.inner.borrow();
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = inner.nodes.get(c).and_then(|n| n.parent);
        }
        false
    }

    fn create_element(&self, tag: &str) -> ElementId {
        self.inner.borrow_mut().nodes.insert(Node::new(tag))
    }

    fn insert_before(&self, parent: ElementId, child: ElementId, reference: ElementId) {
        let mut inner = self.inner.borrow_mut();
        if !inner.nodes.contains_key(parent) || !inner.nodes.contains_key(child) {
            return;
        }
        inner.detach(child);
        if inner.nodes[child].origin.is_none() {
            let origin = inner.flow_origin(reference);
            inner.nodes[child].origin = Some(origin);
        }
        let siblings = &mut inner.nodes[parent].children;
        let index = siblings
            .iter()
            .position(|c| *c == reference)
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        inner.nodes[child].parent = Some(parent);
    }

    fn append_child(&self, parent: ElementId, child: ElementId) {
        let mut inner = self.inner.borrow_mut();
        if !inner.nodes.contains_key(parent) || !inner.nodes.contains_key(child) {
            return;
        }
        inner.detach(child);
        if inner.nodes[child].origin.is_none() {
            let origin = inner.flow_origin(parent);
            inner.nodes[child].origin = Some(origin);
        }
        inner.nodes[parent].children.push(child);
        inner.nodes[child].parent = Some(parent);
    }

    fn remove_child(&self, parent: ElementId, child: ElementId) {
        let mut inner = self.inner.borrow_mut();
        if inner.nodes.get(child).and_then(|n| n.parent) == Some(parent) {
            inner.detach(child);
        }
    }

    fn release(&self, id: ElementId) {
        let mut inner = self.inner.borrow_mut();
        if id == inner.root || inner.nodes.get(id).map_or(true, |n| n.parent.is_some()) {
            return;
        }
        let mut stack = vec![id];
        let mut released = Vec::new();
        while let Some(current) = stack.pop() {
            if let Some(node) = inner.nodes.remove(current) {
                stack.extend(node.children);
                released.push(current);
            }
        }
        inner.listeners.retain(|_, listener| match listener.target {
            Container::Element(target) => !released.contains(&target),
            Container::Window => true,
        });
    }

    fn has_attribute(&self, id: ElementId, name: &str) -> bool {
        self.inner
            .borrow()
            .nodes
            .get(id)
            .map_or(false, |n| n.attributes.contains_key(name))
    }

    fn set_attribute(&self, id: ElementId, name: &str, value: &str) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(id) {
            node.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn add_class(&self, id: ElementId, class: &str) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(id) {
            for c in class.split_whitespace() {
                node.classes.insert(c.to_string());
            }
        }
    }

    fn remove_class(&self, id: ElementId, class: &str) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(id) {
            for c in class.split_whitespace() {
                node.classes.shift_remove(c);
            }
        }
    }

    fn has_class(&self, id: ElementId, class: &str) -> bool {
        self.inner
            .borrow()
            .nodes
            .get(id)
            .map_or(false, |n| n.classes.contains(class))
    }

    fn inline_style(&self, id: ElementId, property: &str) -> String {
        let inner = self.inner.borrow();
        let Some(node) = inner.nodes.get(id) else {
            return String::new();
        };
        if is_box_shorthand(property) {
            let sides: Option<Vec<&String>> = BOX_SIDES
                .iter()
                .map(|side| node.inline.get(&format!("{}-{}", property, side)))
                .collect();
            return match sides {
                Some(s) => collapse_box([s[0].as_str(), s[1].as_str(), s[2].as_str(), s[3].as_str()]),
                None => String::new(),
            };
        }
        node.inline.get(property).cloned().unwrap_or_default()
    }

    fn set_inline_style(&self, id: ElementId, property: &str, value: &str) {
        let mut inner = self.inner.borrow_mut();
        let Some(node) = inner.nodes.get_mut(id) else {
            return;
        };
        let value = value.trim();
        if is_box_shorthand(property) {
            let sides = if value.is_empty() { None } else { expand_box(value) };
            for (i, side) in BOX_SIDES.iter().enumerate() {
                let key = format!("{}-{}", property, side);
                match &sides {
                    Some(values) => {
                        node.inline.insert(key, values[i].clone());
                    }
                    None => {
                        node.inline.shift_remove(&key);
                    }
                }
            }
            return;
        }
        if value.is_empty() {
            node.inline.shift_remove(property);
        } else {
            node.inline.insert(property.to_string(), value.to_string());
        }
    }

    fn computed_style(&self, id: ElementId, property: &str) -> String {
        self.inner.borrow().computed(id, property)
    }

    fn bounding_rect(&self, id: ElementId) -> Rect {
        let inner = self.inner.borrow();
        if !inner.is_in_tree(id) {
            return Rect::ZERO;
        }
        let rect = inner.document_rect(id);
        Rect::new(
            rect.left() - inner.window_scroll.x,
            rect.top() - inner.window_scroll.y,
            rect.width(),
            rect.height(),
        )
    }

    fn client_size(&self, target: Container) -> Size {
        let inner = self.inner.borrow();
        match target {
            Container::Window => inner.viewport,
            Container::Element(id) => inner.size(id),
        }
    }

    fn offset_size(&self, target: Container) -> Size {
        self.client_size(target)
    }

    fn scroll_offset(&self, container: Container) -> Point {
        let inner = self.inner.borrow();
        match container {
            Container::Window => inner.window_scroll,
            Container::Element(id) => inner.nodes.get(id).map_or(Point::ZERO, |n| n.scroll),
        }
    }

    fn set_scroll_offset(&self, container: Container, offset: Point) {
        {
            let mut inner = self.inner.borrow_mut();
            match container {
                Container::Window => inner.window_scroll = offset,
                Container::Element(id) => match inner.nodes.get_mut(id) {
                    Some(node) => node.scroll = offset,
                    None => return,
                },
            }
        }
        self.dispatch(container, NativeEvent::Scroll);
    }

    fn add_listener(
        &self,
        target: Container,
        event: NativeEvent,
        callback: NativeCallback,
    ) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        inner.listener_seq += 1;
        let seq = inner.listener_seq;
        inner.listeners.insert(Listener {
            target,
            event,
            seq,
            callback,
        })
    }

    fn remove_listener(&self, id: ListenerId) {
        self.inner.borrow_mut().listeners.remove(id);
    }

    fn dispatch(&self, target: Container, event: NativeEvent) {
        for callback in self.listeners_for(target, event) {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn doc() -> Document {
        Document::new(Size::new(1000.0, 800.0))
    }

    #[test]
    fn test_query_by_id_class_and_tag() {
        let doc = doc();
        let a = doc.create_in_body("div", Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = doc.create_in_body("section", Rect::new(0.0, 10.0, 10.0, 10.0));
        doc.set_element_id(a, "hero");
        doc.add_class(b, "panel wide");

        assert_eq!(doc.query("#hero"), vec![a]);
        assert_eq!(doc.query(".panel"), vec![b]);
        assert_eq!(doc.query("section.wide"), vec![b]);
        assert_eq!(doc.query("div#hero"), vec![a]);
        assert!(doc.query("div > p").is_empty());
        assert!(doc.query("#").is_empty());
    }

    #[test]
    fn test_release_only_drops_detached_subtrees() {
        let doc = doc();
        let attached = doc.create_in_body("div", Rect::new(0.0, 0.0, 10.0, 10.0));
        let wrapper = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.append_child(wrapper, inner);
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        doc.add_listener(
            wrapper.into(),
            NativeEvent::Resize,
            Rc::new(move || counter.set(counter.get() + 1)),
        );

        doc.release(attached);
        assert!(doc.exists(attached));

        doc.release(wrapper);
        assert!(!doc.exists(wrapper));
        assert!(!doc.exists(inner));
        doc.dispatch(wrapper.into(), NativeEvent::Resize);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_margin_shorthand_round_trip() {
        let doc = doc();
        let el = doc.create_in_body("div", Rect::new(0.0, 0.0, 10.0, 10.0));

        doc.set_inline_style(el, "margin", "auto");
        assert_eq!(doc.inline_style(el, "margin-left"), "auto");
        assert_eq!(doc.inline_style(el, "margin"), "auto");

        doc.set_inline_style(el, "margin-top", "4px");
        assert_eq!(doc.inline_style(el, "margin"), "4px auto auto");

        doc.set_inline_style(el, "margin", "");
        assert_eq!(doc.inline_style(el, "margin-top"), "");
        assert!(doc.inline_declarations(el).is_empty());
    }

    #[test]
    fn test_computed_falls_back_to_rules_then_defaults() {
        let doc = doc();
        let el = doc.create_in_body("div", Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(doc.computed_style(el, "position"), "static");
        doc.set_style_rule(el, "position", "absolute");
        assert_eq!(doc.computed_style(el, "position"), "absolute");
        doc.set_inline_style(el, "position", "relative");
        assert_eq!(doc.computed_style(el, "position"), "relative");
        assert_eq!(doc.computed_style(el, "margin"), "0px");
    }

    #[test]
    fn test_declared_sizes_and_padding() {
        let doc = doc();
        let parent = doc.create_in_body("div", Rect::new(0.0, 0.0, 400.0, 300.0));
        let child = doc.create_child(parent, "div", Rect::new(0.0, 0.0, 50.0, 50.0));

        doc.set_inline_style(child, "width", "50%");
        assert_eq!(doc.client_size(child.into()).width, 200.0);

        doc.set_inline_style(child, "height", "auto");
        doc.set_inline_style(child, "min-height", "80px");
        doc.set_inline_style(child, "padding-top", "20px");
        assert_eq!(doc.client_size(child.into()).height, 100.0);
    }

    #[test]
    fn test_fixed_and_scrolled_positions() {
        let doc = doc();
        let el = doc.create_in_body("div", Rect::new(0.0, 1000.0, 100.0, 100.0));
        let inner = doc.create_child(el, "span", Rect::new(0.0, 1010.0, 10.0, 10.0));

        doc.set_scroll_offset(Container::Window, Point::new(0.0, 300.0));
        assert_eq!(doc.bounding_rect(el).top(), 700.0);

        doc.set_inline_style(el, "position", "fixed");
        doc.set_inline_style(el, "top", "25px");
        assert_eq!(doc.bounding_rect(el).top(), 25.0);
        // descendants travel with the fixed ancestor
        assert_eq!(doc.bounding_rect(inner).top(), 35.0);
    }

    #[test]
    fn test_insert_before_inherits_flow_position() {
        let doc = doc();
        let el = doc.create_in_body("div", Rect::new(0.0, 500.0, 100.0, 100.0));
        let spacer = doc.create_element("div");
        let body = doc.body().unwrap();
        doc.insert_before(body, spacer, el);
        doc.append_child(spacer, el);

        assert_eq!(doc.parent(el), Some(spacer));
        assert_eq!(doc.first_child(spacer), Some(el));
        assert_eq!(doc.bounding_rect(spacer).top(), 500.0);
        assert_eq!(doc.client_size(spacer.into()).height, 100.0);
        assert_eq!(doc.client_size(spacer.into()).width, doc.viewport().width);
        assert!(doc.contains(body, el));
    }

    #[test]
    fn test_scroll_dispatches_listeners_in_order() {
        let doc = doc();
        let order = Rc::new(RefCell::new(Vec::new()));
        for label in ["first", "second"] {
            let order = order.clone();
            doc.add_listener(
                Container::Window,
                NativeEvent::Scroll,
                Rc::new(move || order.borrow_mut().push(label)),
            );
        }
        let resize_hits = Rc::new(Cell::new(0));
        let r = resize_hits.clone();
        let resize = doc.add_listener(
            Container::Window,
            NativeEvent::Resize,
            Rc::new(move || r.set(r.get() + 1)),
        );

        doc.set_scroll_offset(Container::Window, Point::new(0.0, 10.0));
        assert_eq!(*order.borrow(), vec!["first", "second"]);

        doc.set_viewport(Size::new(800.0, 600.0));
        doc.remove_listener(resize);
        doc.set_viewport(Size::new(900.0, 600.0));
        assert_eq!(resize_hits.get(), 1);
    }
}
