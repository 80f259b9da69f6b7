//! Host document abstraction
//!
//! The scene engine never touches a concrete DOM. Everything it needs to
//! measure or mutate goes through the [`Dom`] trait, which is implemented by
//! the headless [`Document`](crate::document::Document) and by the browser
//! backend in `scrollscene_web`.
//!
//! All methods take `&self`: hosts use interior mutability, and callbacks
//! registered through [`Dom::add_listener`] may call back into the host.

use std::fmt;
use std::rc::Rc;

use slotmap::new_key_type;

// ─────────────────────────────────────────────────────────────────────────────
// Geometry Types
// ─────────────────────────────────────────────────────────────────────────────

/// 2D point (document or viewport pixels)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 2D size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Extent along the scroll axis
    pub fn along(&self, vertical: bool) -> f64 {
        if vertical {
            self.height
        } else {
            self.width
        }
    }
}

/// 2D rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        origin: Point::ZERO,
        size: Size::ZERO,
    };

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn top(&self) -> f64 {
        self.origin.y
    }

    pub fn left(&self) -> f64 {
        self.origin.x
    }

    pub fn width(&self) -> f64 {
        self.size.width
    }

    pub fn height(&self) -> f64 {
        self.size.height
    }
}

/// Position of an element, `top`/`left` as in the CSS box model
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Offset {
    pub top: f64,
    pub left: f64,
}

impl Offset {
    pub const ZERO: Offset = Offset {
        top: 0.0,
        left: 0.0,
    };

    pub const fn new(top: f64, left: f64) -> Self {
        Self { top, left }
    }

    /// Component along the scroll axis
    pub fn along(&self, vertical: bool) -> f64 {
        if vertical {
            self.top
        } else {
            self.left
        }
    }

    /// Mutable component along the scroll axis
    pub fn along_mut(&mut self, vertical: bool) -> &mut f64 {
        if vertical {
            &mut self.top
        } else {
            &mut self.left
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handles
// ─────────────────────────────────────────────────────────────────────────────

new_key_type! {
    /// Handle to an element known to a host
    pub struct ElementId;
    /// Handle to a registered native event listener
    pub struct ListenerId;
}

/// A scroll container or measurement target: the window, or one element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Container {
    Window,
    Element(ElementId),
}

impl Container {
    pub fn is_window(&self) -> bool {
        matches!(self, Container::Window)
    }

    pub fn element(&self) -> Option<ElementId> {
        match self {
            Container::Window => None,
            Container::Element(id) => Some(*id),
        }
    }
}

impl From<ElementId> for Container {
    fn from(id: ElementId) -> Self {
        Container::Element(id)
    }
}

/// Native events the engine listens to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeEvent {
    Scroll,
    Resize,
}

impl NativeEvent {
    /// DOM event type name
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeEvent::Scroll => "scroll",
            NativeEvent::Resize => "resize",
        }
    }
}

impl fmt::Display for NativeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback for native events. Single-threaded, so `Rc`.
pub type NativeCallback = Rc<dyn Fn()>;

// ─────────────────────────────────────────────────────────────────────────────
// Dom Trait
// ─────────────────────────────────────────────────────────────────────────────

/// The document operations the scene engine depends on
///
/// Style properties use CSS (kebab-case) names, e.g. `margin-top`. An empty
/// string written through [`set_inline_style`](Dom::set_inline_style)
/// removes the declaration, matching `element.style[prop] = ""`.
pub trait Dom {
    // Lookup and tree ------------------------------------------------------

    /// All elements matching `selector`, in document order
    fn query(&self, selector: &str) -> Vec<ElementId>;

    /// The `<body>` element, if the host has one
    fn body(&self) -> Option<ElementId>;

    /// Whether `id` still refers to a live element
    fn exists(&self, id: ElementId) -> bool;

    /// Parent element, `None` for detached elements and the root
    fn parent(&self, id: ElementId) -> Option<ElementId>;

    /// First element child
    fn first_child(&self, id: ElementId) -> Option<ElementId>;

    /// Whether `ancestor` contains `id` (inclusive)
    fn contains(&self, ancestor: ElementId, id: ElementId) -> bool;

    /// Create a detached element
    fn create_element(&self, tag: &str) -> ElementId;

    /// Insert `child` into `parent` before `reference`
    fn insert_before(&self, parent: ElementId, child: ElementId, reference: ElementId);

    /// Append `child` as the last child of `parent`
    fn append_child(&self, parent: ElementId, child: ElementId);

    /// Detach `child` from `parent`
    fn remove_child(&self, parent: ElementId, child: ElementId);

    /// Forget a detached element and its subtree; ids of attached elements
    /// are left alone
    fn release(&self, id: ElementId);

    // Attributes and classes -------------------------------------------------

    fn has_attribute(&self, id: ElementId, name: &str) -> bool;

    fn set_attribute(&self, id: ElementId, name: &str, value: &str);

    fn add_class(&self, id: ElementId, class: &str);

    fn remove_class(&self, id: ElementId, class: &str);

    fn has_class(&self, id: ElementId, class: &str) -> bool;

    // Style ------------------------------------------------------------------

    /// Inline declaration, empty when unset
    fn inline_style(&self, id: ElementId, property: &str) -> String;

    /// Write an inline declaration (empty string removes it)
    fn set_inline_style(&self, id: ElementId, property: &str, value: &str);

    /// Computed value of `property`
    fn computed_style(&self, id: ElementId, property: &str) -> String;

    // Measurement ------------------------------------------------------------

    /// Border box relative to the viewport (`getBoundingClientRect`)
    fn bounding_rect(&self, id: ElementId) -> Rect;

    /// Inner size: `clientWidth`/`clientHeight`, or `innerWidth` for the window
    fn client_size(&self, target: Container) -> Size;

    /// Outer size: `offsetWidth`/`offsetHeight`, or `outerWidth` for the window
    fn offset_size(&self, target: Container) -> Size;

    /// Scroll offset of the window or a scrolling element
    fn scroll_offset(&self, container: Container) -> Point;

    /// Scroll the window or an element; hosts deliver `scroll` to listeners
    fn set_scroll_offset(&self, container: Container, offset: Point);

    // Events -----------------------------------------------------------------

    /// Register a native listener on the window or an element
    fn add_listener(
        &self,
        target: Container,
        event: NativeEvent,
        callback: NativeCallback,
    ) -> ListenerId;

    /// Remove a listener; unknown ids are ignored
    fn remove_listener(&self, id: ListenerId);

    /// Synthesize `event` on `target`, invoking its listeners
    fn dispatch(&self, target: Container, event: NativeEvent);
}
