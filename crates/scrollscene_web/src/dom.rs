//! `web-sys` implementation of [`Dom`]
//!
//! Elements handed to the engine are interned in a slot map so the engine
//! only ever sees [`ElementId`]s. Each interned element carries its key in
//! [`ID_ATTRIBUTE`], so finding the id of an element is a lookup rather than
//! a scan. Native listeners keep their JS closures alive here until they are
//! removed.

use std::cell::RefCell;

use scrollscene_host::{
    Container, Dom, ElementId, ListenerId, NativeCallback, NativeEvent, Point, Rect, Size,
};
use slotmap::{Key, KeyData, SlotMap};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Event, EventTarget, HtmlElement, Window};

use crate::error::{describe, Result, WebError};

struct WebListener {
    target: EventTarget,
    event: NativeEvent,
    closure: Closure<dyn FnMut()>,
}

/// Browser document seen through the [`Dom`] trait
pub struct WebDom {
    window: Window,
    document: web_sys::Document,
    elements: RefCell<SlotMap<ElementId, HtmlElement>>,
    listeners: RefCell<SlotMap<ListenerId, WebListener>>,
}

/// Log a failed DOM call and carry on with `None`
fn ok_or_warn<T>(call: &'static str, result: std::result::Result<T, JsValue>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("{} failed: {}", call, describe(&err));
            None
        }
    }
}

/// Attribute holding an interned element's key
pub const ID_ATTRIBUTE: &str = "data-scrollscene-id";

fn encode_id(id: ElementId) -> String {
    id.data().as_ffi().to_string()
}

fn decode_id(value: &str) -> Option<ElementId> {
    value.parse::<u64>().ok().map(|bits| KeyData::from_ffi(bits).into())
}

fn node(element: &HtmlElement) -> &web_sys::Node {
    element
}

/// Scroll offsets are integral in the DOM
pub(crate) fn to_scroll_px(value: f64) -> i32 {
    if value.is_finite() {
        value.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
    } else {
        0
    }
}

impl WebDom {
    /// Attach to the global window and its document
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or(WebError::NoWindow)?;
        let document = window.document().ok_or(WebError::NoDocument)?;
        Ok(Self {
            window,
            document,
            elements: RefCell::new(SlotMap::with_key()),
            listeners: RefCell::new(SlotMap::with_key()),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Intern `element`, returning the id it already has if it was seen before
    pub fn register(&self, element: &HtmlElement) -> ElementId {
        let known = element
            .get_attribute(ID_ATTRIBUTE)
            .and_then(|value| decode_id(&value))
            .filter(|id| self.elements.borrow().get(*id) == Some(element));
        if let Some(id) = known {
            return id;
        }
        let id = self.elements.borrow_mut().insert(element.clone());
        ok_or_warn("setAttribute", element.set_attribute(ID_ATTRIBUTE, &encode_id(id)));
        id
    }

    /// The element behind `id`
    pub fn element(&self, id: ElementId) -> Option<HtmlElement> {
        self.elements.borrow().get(id).cloned()
    }

    /// Forget `id`; the element itself is left in the page
    pub fn forget(&self, id: ElementId) {
        if let Some(element) = self.elements.borrow_mut().remove(id) {
            ok_or_warn("removeAttribute", element.remove_attribute(ID_ATTRIBUTE));
        }
    }

    fn register_node(&self, node: web_sys::Node) -> Option<ElementId> {
        node.dyn_into::<HtmlElement>()
            .ok()
            .map(|element| self.register(&element))
    }

    fn target(&self, target: Container) -> Option<EventTarget> {
        match target {
            Container::Window => Some(self.window.clone().unchecked_into()),
            Container::Element(id) => self.element(id).map(|el| el.unchecked_into()),
        }
    }

    fn window_size(&self, inner: bool) -> Size {
        let (width, height) = if inner {
            (self.window.inner_width(), self.window.inner_height())
        } else {
            (self.window.outer_width(), self.window.outer_height())
        };
        let read = |value: std::result::Result<JsValue, JsValue>| {
            ok_or_warn("window size", value)
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0)
        };
        Size::new(read(width), read(height))
    }
}

impl Dom for WebDom {
    // ========================================================================
    // Lookup and tree
    // ========================================================================

    fn query(&self, selector: &str) -> Vec<ElementId> {
        let Some(list) = ok_or_warn("querySelectorAll", self.document.query_selector_all(selector))
        else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| self.register_node(node))
            .collect()
    }

    fn body(&self) -> Option<ElementId> {
        self.document.body().map(|body| self.register(&body))
    }

    fn exists(&self, id: ElementId) -> bool {
        self.elements.borrow().contains_key(id)
    }

    fn parent(&self, id: ElementId) -> Option<ElementId> {
        let parent = self.element(id)?.parent_element()?;
        parent
            .dyn_into::<HtmlElement>()
            .ok()
            .map(|parent| self.register(&parent))
    }

    fn first_child(&self, id: ElementId) -> Option<ElementId> {
        let child = self.element(id)?.first_element_child()?;
        child
            .dyn_into::<HtmlElement>()
            .ok()
            .map(|child| self.register(&child))
    }

    fn contains(&self, ancestor: ElementId, id: ElementId) -> bool {
        match (self.element(ancestor), self.element(id)) {
            (Some(ancestor), Some(element)) => ancestor.contains(Some(node(&element))),
            _ => false,
        }
    }

    fn create_element(&self, tag: &str) -> ElementId {
        let created = ok_or_warn("createElement", self.document.create_element(tag))
            .and_then(|element| element.dyn_into::<HtmlElement>().ok());
        match created {
            Some(element) => self.register(&element),
            // A dangling id; every later call on it is a no-op
            None => ElementId::default(),
        }
    }

    fn insert_before(&self, parent: ElementId, child: ElementId, reference: ElementId) {
        if let (Some(parent), Some(child)) = (self.element(parent), self.element(child)) {
            let reference = self.element(reference);
            ok_or_warn(
                "insertBefore",
                parent.insert_before(node(&child), reference.as_ref().map(node)),
            );
        }
    }

    fn append_child(&self, parent: ElementId, child: ElementId) {
        if let (Some(parent), Some(child)) = (self.element(parent), self.element(child)) {
            ok_or_warn("appendChild", parent.append_child(&child));
        }
    }

    fn remove_child(&self, parent: ElementId, child: ElementId) {
        if let (Some(parent), Some(child)) = (self.element(parent), self.element(child)) {
            ok_or_warn("removeChild", parent.remove_child(&child));
        }
    }

    fn release(&self, id: ElementId) {
        let Some(element) = self.element(id) else {
            return;
        };
        if element.parent_node().is_some() {
            return;
        }
        let mut elements = self.elements.borrow_mut();
        let released: Vec<ElementId> = elements
            .iter()
            .filter(|(_, known)| element.contains(Some(node(known))))
            .map(|(key, _)| key)
            .collect();
        for key in &released {
            elements.remove(*key);
        }
        drop(elements);
        self.listeners.borrow_mut().retain(|_, listener| {
            let detached = listener
                .target
                .dyn_ref::<web_sys::Node>()
                .is_some_and(|target| element.contains(Some(target)));
            if detached {
                ok_or_warn(
                    "removeEventListener",
                    listener.target.remove_event_listener_with_callback(
                        listener.event.as_str(),
                        listener.closure.as_ref().unchecked_ref(),
                    ),
                );
            }
            !detached
        });
    }

    // ========================================================================
    // Attributes and classes
    // ========================================================================

    fn has_attribute(&self, id: ElementId, name: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_attribute(name))
    }

    fn set_attribute(&self, id: ElementId, name: &str, value: &str) {
        if let Some(el) = self.element(id) {
            ok_or_warn("setAttribute", el.set_attribute(name, value));
        }
    }

    fn add_class(&self, id: ElementId, class: &str) {
        if let Some(el) = self.element(id) {
            let list = el.class_list();
            for name in class.split_whitespace() {
                ok_or_warn("classList.add", list.add_1(name));
            }
        }
    }

    fn remove_class(&self, id: ElementId, class: &str) {
        if let Some(el) = self.element(id) {
            let list = el.class_list();
            for name in class.split_whitespace() {
                ok_or_warn("classList.remove", list.remove_1(name));
            }
        }
    }

    fn has_class(&self, id: ElementId, class: &str) -> bool {
        self.element(id).is_some_and(|el| {
            let list = el.class_list();
            class.split_whitespace().all(|name| list.contains(name))
        })
    }

    // ========================================================================
    // Style
    // ========================================================================

    fn inline_style(&self, id: ElementId, property: &str) -> String {
        self.element(id)
            .and_then(|el| ok_or_warn("style.getPropertyValue", el.style().get_property_value(property)))
            .unwrap_or_default()
    }

    fn set_inline_style(&self, id: ElementId, property: &str, value: &str) {
        let Some(el) = self.element(id) else {
            return;
        };
        let style = el.style();
        if value.is_empty() {
            ok_or_warn("style.removeProperty", style.remove_property(property));
        } else {
            ok_or_warn("style.setProperty", style.set_property(property, value));
        }
    }

    fn computed_style(&self, id: ElementId, property: &str) -> String {
        let Some(el) = self.element(id) else {
            return String::new();
        };
        ok_or_warn("getComputedStyle", self.window.get_computed_style(&el))
            .flatten()
            .and_then(|style| ok_or_warn("getPropertyValue", style.get_property_value(property)))
            .unwrap_or_default()
    }

    // ========================================================================
    // Measurement
    // ========================================================================

    fn bounding_rect(&self, id: ElementId) -> Rect {
        match self.element(id) {
            Some(el) => {
                let rect = el.get_bounding_client_rect();
                Rect::new(rect.left(), rect.top(), rect.width(), rect.height())
            }
            None => Rect::ZERO,
        }
    }

    fn client_size(&self, target: Container) -> Size {
        match target {
            Container::Window => self.window_size(true),
            Container::Element(id) => self.element(id).map_or(Size::ZERO, |el| {
                Size::new(el.client_width() as f64, el.client_height() as f64)
            }),
        }
    }

    fn offset_size(&self, target: Container) -> Size {
        match target {
            Container::Window => self.window_size(false),
            Container::Element(id) => self.element(id).map_or(Size::ZERO, |el| {
                Size::new(el.offset_width() as f64, el.offset_height() as f64)
            }),
        }
    }

    fn scroll_offset(&self, container: Container) -> Point {
        match container {
            Container::Window => Point::new(
                ok_or_warn("pageXOffset", self.window.page_x_offset()).unwrap_or(0.0),
                ok_or_warn("pageYOffset", self.window.page_y_offset()).unwrap_or(0.0),
            ),
            Container::Element(id) => self.element(id).map_or(Point::ZERO, |el| {
                Point::new(el.scroll_left() as f64, el.scroll_top() as f64)
            }),
        }
    }

    fn set_scroll_offset(&self, container: Container, offset: Point) {
        match container {
            Container::Window => self.window.scroll_to_with_x_and_y(offset.x, offset.y),
            Container::Element(id) => {
                if let Some(el) = self.element(id) {
                    el.set_scroll_left(to_scroll_px(offset.x));
                    el.set_scroll_top(to_scroll_px(offset.y));
                }
            }
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    fn add_listener(
        &self,
        target: Container,
        event: NativeEvent,
        callback: NativeCallback,
    ) -> ListenerId {
        let Some(target) = self.target(target) else {
            return ListenerId::default();
        };
        let closure = Closure::wrap(Box::new(move || callback()) as Box<dyn FnMut()>);
        ok_or_warn(
            "addEventListener",
            target.add_event_listener_with_callback(event.as_str(), closure.as_ref().unchecked_ref()),
        );
        self.listeners.borrow_mut().insert(WebListener {
            target,
            event,
            closure,
        })
    }

    fn remove_listener(&self, id: ListenerId) {
        let Some(listener) = self.listeners.borrow_mut().remove(id) else {
            return;
        };
        ok_or_warn(
            "removeEventListener",
            listener.target.remove_event_listener_with_callback(
                listener.event.as_str(),
                listener.closure.as_ref().unchecked_ref(),
            ),
        );
    }

    fn dispatch(&self, target: Container, event: NativeEvent) {
        let Some(target) = self.target(target) else {
            return;
        };
        if let Some(event) = ok_or_warn("new Event", Event::new(event.as_str())) {
            ok_or_warn("dispatchEvent", target.dispatch_event(&event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_attribute_decodes_to_the_same_key() {
        let mut elements: SlotMap<ElementId, ()> = SlotMap::with_key();
        let first = elements.insert(());
        elements.remove(first);
        let reused = elements.insert(());
        assert_ne!(first, reused);
        assert_eq!(decode_id(&encode_id(reused)), Some(reused));
        assert_ne!(decode_id(&encode_id(first)), Some(reused));
        assert_eq!(decode_id("spacer"), None);
    }

    #[test]
    fn test_scroll_px_rounds_and_clamps() {
        assert_eq!(to_scroll_px(10.4), 10);
        assert_eq!(to_scroll_px(10.5), 11);
        assert_eq!(to_scroll_px(-3.6), -4);
        assert_eq!(to_scroll_px(f64::NAN), 0);
        assert_eq!(to_scroll_px(1e12), i32::MAX);
    }
}
