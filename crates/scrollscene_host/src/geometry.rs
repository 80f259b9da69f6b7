//! Orientation-aware measurement
//!
//! Thin, stateless helpers over [`Dom`] so the scene engine never branches on
//! vertical versus horizontal scrolling itself. Elements that no longer exist
//! measure as zero; the engine tolerates transient DOM states during setup.

use crate::css::px_or_zero;
use crate::dom::{Container, Dom, Offset};

/// Which box dimension to measure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dimension {
    Width,
    Height,
}

impl Dimension {
    /// The dimension along the scroll axis
    pub fn along(vertical: bool) -> Self {
        if vertical {
            Dimension::Height
        } else {
            Dimension::Width
        }
    }
}

fn is_live(dom: &dyn Dom, target: Container) -> bool {
    match target {
        Container::Window => true,
        Container::Element(id) => dom.exists(id),
    }
}

/// Current scroll offset of `container` along the active axis
pub fn scroll_position(dom: &dyn Dom, container: Container, vertical: bool) -> f64 {
    if !is_live(dom, container) {
        return 0.0;
    }
    let offset = dom.scroll_offset(container);
    if vertical {
        offset.y
    } else {
        offset.x
    }
}

/// Extent of `container` along the active axis
pub fn viewport_size(dom: &dyn Dom, container: Container, vertical: bool) -> f64 {
    dimension(dom, container, Dimension::along(vertical), false, false)
}

/// Position of an element relative to the document, or the viewport
///
/// The window itself sits at the origin.
pub fn element_offset(dom: &dyn Dom, target: Container, relative_to_viewport: bool) -> Offset {
    let Container::Element(id) = target else {
        return Offset::ZERO;
    };
    if !dom.exists(id) {
        return Offset::ZERO;
    }
    let rect = dom.bounding_rect(id);
    let mut offset = Offset::new(rect.top(), rect.left());
    if !relative_to_viewport {
        let scroll = dom.scroll_offset(Container::Window);
        offset.top += scroll.y;
        offset.left += scroll.x;
    }
    offset
}

/// Width or height of the window or an element
///
/// `outer` measures the border box instead of the client box;
/// `include_margin` adds the computed margins (elements only).
pub fn dimension(
    dom: &dyn Dom,
    target: Container,
    which: Dimension,
    outer: bool,
    include_margin: bool,
) -> f64 {
    if !is_live(dom, target) {
        return 0.0;
    }
    let size = if outer {
        dom.offset_size(target)
    } else {
        dom.client_size(target)
    };
    let mut value = match which {
        Dimension::Width => size.width,
        Dimension::Height => size.height,
    };
    if let (true, true, Container::Element(id)) = (outer, include_margin, target) {
        value += match which {
            Dimension::Height => {
                px_or_zero(&dom.computed_style(id, "margin-top"))
                    + px_or_zero(&dom.computed_style(id, "margin-bottom"))
            }
            Dimension::Width => {
                px_or_zero(&dom.computed_style(id, "margin-left"))
                    + px_or_zero(&dom.computed_style(id, "margin-right"))
            }
        };
    }
    value
}

/// Shorthand for [`dimension`] with [`Dimension::Width`]
pub fn width(dom: &dyn Dom, target: Container, outer: bool, include_margin: bool) -> f64 {
    dimension(dom, target, Dimension::Width, outer, include_margin)
}

/// Shorthand for [`dimension`] with [`Dimension::Height`]
pub fn height(dom: &dyn Dom, target: Container, outer: bool, include_margin: bool) -> f64 {
    dimension(dom, target, Dimension::Height, outer, include_margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::dom::{Point, Rect, Size};

    #[test]
    fn test_window_measurements() {
        let doc = Document::new(Size::new(1024.0, 800.0));
        assert_eq!(viewport_size(&doc, Container::Window, true), 800.0);
        assert_eq!(viewport_size(&doc, Container::Window, false), 1024.0);

        doc.set_scroll_offset(Container::Window, Point::new(10.0, 250.0));
        assert_eq!(scroll_position(&doc, Container::Window, true), 250.0);
        assert_eq!(scroll_position(&doc, Container::Window, false), 10.0);
        assert_eq!(element_offset(&doc, Container::Window, false), Offset::ZERO);
    }

    #[test]
    fn test_element_offset_document_vs_viewport() {
        let doc = Document::new(Size::new(1024.0, 800.0));
        let el = doc.create_in_body("div", Rect::new(0.0, 1200.0, 300.0, 100.0));
        doc.set_scroll_offset(Container::Window, Point::new(0.0, 200.0));

        let document = element_offset(&doc, el.into(), false);
        let viewport = element_offset(&doc, el.into(), true);
        assert_eq!(document.top, 1200.0);
        assert_eq!(viewport.top, 1000.0);
    }

    #[test]
    fn test_dimension_with_margin() {
        let doc = Document::new(Size::new(1024.0, 800.0));
        let el = doc.create_in_body("div", Rect::new(0.0, 0.0, 300.0, 100.0));
        doc.set_style_rule(el, "margin-top", "10px");
        doc.set_style_rule(el, "margin-bottom", "5px");

        assert_eq!(height(&doc, el.into(), true, false), 100.0);
        assert_eq!(height(&doc, el.into(), true, true), 115.0);
        // margins only count for outer measurements
        assert_eq!(height(&doc, el.into(), false, true), 100.0);
    }

    #[test]
    fn test_missing_element_measures_zero() {
        let doc = Document::new(Size::new(1024.0, 800.0));
        let el = doc.create_in_body("div", Rect::new(0.0, 40.0, 300.0, 100.0));
        doc.destroy_element(el);
        assert_eq!(element_offset(&doc, el.into(), false), Offset::ZERO);
        assert_eq!(width(&doc, el.into(), true, true), 0.0);
    }
}
