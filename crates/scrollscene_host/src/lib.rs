//! ScrollScene Host Layer
//!
//! Everything the scene engine needs from its environment, behind traits:
//!
//! - **Dom**: element lookup, tree edits, classes, inline/computed style,
//!   measurement and native `scroll`/`resize` listeners
//! - **Geometry**: orientation-aware scroll position, sizes and offsets
//! - **CSS**: reading and writing inline styles with browser conventions
//! - **Scheduling**: one-shot animation frames and timeouts
//!
//! [`Document`] and [`ManualScheduler`] are complete in-memory hosts used by
//! the tests and the command-line simulator.
//!
//! # Example
//!
//! ```rust
//! use scrollscene_host::{geometry, Container, Document, Dom, Point, Rect, Size};
//!
//! let doc = Document::new(Size::new(1024.0, 800.0));
//! let el = doc.create_in_body("div", Rect::new(0.0, 1200.0, 300.0, 100.0));
//!
//! doc.set_scroll_offset(Container::Window, Point::new(0.0, 200.0));
//! let offset = geometry::element_offset(&doc, el.into(), true);
//! assert_eq!(offset.top, 1000.0);
//! ```

pub mod css;
pub mod document;
pub mod dom;
pub mod error;
pub mod geometry;
pub mod schedule;

pub use css::{CssLength, CssValue};
pub use document::Document;
pub use dom::{
    Container, Dom, ElementId, ListenerId, NativeCallback, NativeEvent, Offset, Point, Rect, Size,
};
pub use error::{HostError, Result};
pub use geometry::Dimension;
pub use schedule::{FrameCallback, FrameScheduler, ManualScheduler, TimerId};
