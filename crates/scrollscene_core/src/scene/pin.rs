//! Pinning
//!
//! A pinned element is wrapped in a spacer `div` that keeps its place in the
//! flow. While the scene is DURING the element is switched to
//! `position: fixed` and kept in place against the viewport; outside the
//! window it sits back inside the spacer, at the start or (with
//! `push_followers`) the end of the scrolled distance.

use std::rc::Rc;

use serde::Deserialize;
use smallvec::SmallVec;

use scrollscene_host::css::{
    css_get_many, css_restore, css_set, is_margin_collapse_type, px_or_zero, CssValue,
};
use scrollscene_host::geometry;
use scrollscene_host::{Container, ElementId, ListenerId, NativeEvent};

use super::{Scene, SceneState};
use crate::error::StageError;
use crate::events::ShiftReason;
use crate::log::LogLevel;
use crate::log_at;
use crate::options::ElementRef;

/// Marker attribute on every pin spacer
pub const PIN_SPACER_ATTRIBUTE: &str = "data-scrollmagic-pin-spacer";

/// Class given to spacers unless [`PinSettings::spacer_class`] says otherwise
pub const DEFAULT_SPACER_CLASS: &str = "scrollmagic-pin-spacer";

/// Copied from the pinned element onto its spacer
const SPACER_PROPERTIES: [&str; 10] = [
    "top",
    "left",
    "bottom",
    "right",
    "margin",
    "margin-left",
    "margin-right",
    "margin-top",
    "margin-bottom",
    "display",
];

/// Inline declarations restored on a reset
const RESTORED_PROPERTIES: [&str; 13] = [
    "top",
    "left",
    "bottom",
    "right",
    "margin",
    "margin-left",
    "margin-right",
    "margin-top",
    "margin-bottom",
    "width",
    "height",
    "position",
    "box-sizing",
];

const SPACER_MARGINS: [&str; 5] = [
    "margin",
    "margin-left",
    "margin-right",
    "margin-top",
    "margin-bottom",
];

/// Options for [`Scene::set_pin`]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PinSettings {
    /// Push following content down by the scene duration (default `true`)
    #[serde(alias = "pushFollowers")]
    pub push_followers: Option<bool>,
    #[serde(alias = "spacerClass")]
    pub spacer_class: Option<String>,
}

impl PinSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_followers(mut self, push: bool) -> Self {
        self.push_followers = Some(push);
        self
    }

    pub fn spacer_class(mut self, class: impl Into<String>) -> Self {
        self.spacer_class = Some(class.into());
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct RelativeSize {
    width: bool,
    height: bool,
    /// `width: auto` block that should keep filling its spacer
    auto_full_width: bool,
}

pub(super) struct PinState {
    element: ElementId,
    spacer: ElementId,
    in_flow: bool,
    push_followers: bool,
    relative: RelativeSize,
    fixed: bool,
    listeners: SmallVec<[ListenerId; 3]>,
}

/// The parts of a [`PinState`] needed while touching the DOM
#[derive(Clone, Copy)]
struct PinView {
    element: ElementId,
    spacer: ElementId,
    in_flow: bool,
    push_followers: bool,
    relative: RelativeSize,
    fixed: bool,
}

impl Scene {
    /// The pinned element, if any
    pub fn pin(&self) -> Option<ElementId> {
        self.inner().pin.as_ref().map(|p| p.element)
    }

    /// The spacer wrapping the pinned element
    pub fn pin_spacer(&self) -> Option<ElementId> {
        self.inner().pin.as_ref().map(|p| p.spacer)
    }

    pub(super) fn has_pin(&self) -> bool {
        self.inner().pin.is_some()
    }

    fn pin_view(&self) -> Option<PinView> {
        self.inner().pin.as_ref().map(|p| PinView {
            element: p.element,
            spacer: p.spacer,
            in_flow: p.in_flow,
            push_followers: p.push_followers,
            relative: p.relative,
            fixed: p.fixed,
        })
    }

    /// Pin `element` for the duration of the scene
    ///
    /// Pinning the element that is already pinned does nothing; pinning a
    /// different one releases the previous pin first. Elements that are
    /// missing, detached or `position: fixed` are rejected with an error log.
    pub fn set_pin(&self, element: impl Into<ElementRef>, settings: PinSettings) -> &Self {
        let target = element.into();
        let dom = self.dom();
        let resolved = target
            .resolve(dom)
            .and_then(|id| dom.parent(id).map(|parent| (id, parent)));
        let Some((element, parent)) = resolved else {
            let err = StageError::invalid_argument(
                "set_pin",
                format!("element \"{}\" not found or not attached", target),
            );
            log_at!(self.loglevel(), LogLevel::Error, "{}", err);
            return self;
        };
        if dom.computed_style(element, "position") == "fixed" {
            let err = StageError::invalid_argument(
                "set_pin",
                "pinning elements positioned \"fixed\" is not supported",
            );
            log_at!(self.loglevel(), LogLevel::Error, "{}", err);
            return self;
        }
        match self.pin() {
            Some(current) if current == element => return self,
            Some(_) => {
                self.remove_pin(false);
            }
            None => {}
        }

        // declared (not laid out) values are only visible while hidden
        let parent_display = dom.inline_style(parent, "display");
        dom.set_inline_style(parent, "display", "none");
        let in_flow = dom.computed_style(element, "position") != "absolute";
        let pin_css = css_get_many(dom, element, &SPACER_PROPERTIES);
        let size_css = css_get_many(dom, element, &["width", "height"]);
        dom.set_inline_style(parent, "display", &parent_display);

        let mut push_followers = settings.push_followers.unwrap_or(true);
        if !in_flow && push_followers {
            log_at!(
                self.loglevel(),
                LogLevel::Warn,
                "\"pushFollowers\" cannot be used with a positioned pin"
            );
            push_followers = false;
        }
        if push_followers && settings.push_followers == Some(true) {
            let weak = self.downgrade();
            self.stage().scheduler().set_timeout(
                0,
                Box::new(move || {
                    let Some(scene) = weak.upgrade() else {
                        return;
                    };
                    if scene.pin() == Some(element) && scene.duration() == 0.0 {
                        log_at!(
                            scene.loglevel(),
                            LogLevel::Warn,
                            "\"pushFollowers\" has no effect when the scene duration is 0"
                        );
                    }
                }),
            );
        }

        let spacer = dom.create_element("div");
        dom.insert_before(parent, spacer, element);
        let position = if in_flow { "relative" } else { "absolute" };
        css_set(dom, spacer, pin_css.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        css_set(dom, spacer, [("position", position), ("box-sizing", "content-box")]);
        if !in_flow {
            css_set(dom, spacer, size_css.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        dom.set_attribute(spacer, PIN_SPACER_ATTRIBUTE, "");
        dom.add_class(
            spacer,
            settings.spacer_class.as_deref().unwrap_or(DEFAULT_SPACER_CLASS),
        );

        let width = size_css.get("width").map(String::as_str).unwrap_or("");
        let height = size_css.get("height").map(String::as_str).unwrap_or("");
        let display = pin_css.get("display").map(String::as_str).unwrap_or("");
        let relative = RelativeSize {
            width: width.ends_with('%'),
            height: height.ends_with('%'),
            auto_full_width: width == "auto" && in_flow && is_margin_collapse_type(display),
        };

        self.stage().remember_pin_style(element, || {
            RESTORED_PROPERTIES
                .iter()
                .map(|p| (p.to_string(), dom.inline_style(element, p)))
                .collect()
        });

        if relative.width {
            css_set(dom, spacer, [("width", width)]);
        }
        if relative.height {
            css_set(dom, spacer, [("height", height)]);
        }
        dom.append_child(spacer, element);
        css_set(
            dom,
            element,
            [
                ("position", position),
                ("margin", "auto"),
                ("top", "auto"),
                ("left", "auto"),
                ("bottom", "auto"),
                ("right", "auto"),
            ],
        );
        if relative.width || relative.auto_full_width {
            css_set(dom, element, [("box-sizing", "border-box")]);
        }

        let handlers: [(NativeEvent, fn(&Scene)); 3] = [
            (NativeEvent::Scroll, Scene::update_pin_in_container),
            (NativeEvent::Resize, Scene::update_pin_in_container),
            (NativeEvent::Resize, Scene::update_relative_pin_spacer),
        ];
        let listeners = handlers
            .into_iter()
            .map(|(event, handler)| {
                let weak = self.downgrade();
                dom.add_listener(
                    Container::Window,
                    event,
                    Rc::new(move || {
                        if let Some(scene) = weak.upgrade() {
                            handler(&scene);
                        }
                    }),
                )
            })
            .collect();

        self.inner_mut().pin = Some(PinState {
            element,
            spacer,
            in_flow,
            push_followers,
            relative,
            fixed: false,
            listeners,
        });
        log_at!(self.loglevel(), LogLevel::Debug, "added pin");
        self.update_pin_state(false);
        self
    }

    /// Release the pin
    ///
    /// The spacer is only unwrapped (and the element's original inline style
    /// restored) with `reset`, or when the scene has no controller.
    pub fn remove_pin(&self, reset: bool) -> &Self {
        let Some(pin) = self.pin_view() else {
            return self;
        };
        if self.state() == SceneState::During {
            self.update_pin_state(true);
        }

        let dom = self.dom();
        if reset || self.controller().is_none() {
            if let (Some(target), Some(parent)) = (dom.first_child(pin.spacer), dom.parent(pin.spacer)) {
                if dom.has_attribute(target, PIN_SPACER_ATTRIBUTE) {
                    for property in SPACER_MARGINS {
                        let value = dom.inline_style(pin.spacer, property);
                        dom.set_inline_style(target, property, &value);
                    }
                }
                dom.insert_before(parent, target, pin.spacer);
                dom.remove_child(parent, pin.spacer);
                dom.release(pin.spacer);
            }
            let nested = dom
                .parent(pin.element)
                .map_or(false, |p| dom.has_attribute(p, PIN_SPACER_ATTRIBUTE));
            if !nested {
                if let Some(style) = self.stage().take_pin_style(pin.element) {
                    css_restore(dom, pin.element, &style);
                }
            }
        }

        let listeners = self
            .inner_mut()
            .pin
            .take()
            .map(|p| p.listeners)
            .unwrap_or_default();
        for listener in listeners {
            dom.remove_listener(listener);
        }
        log_at!(
            self.loglevel(),
            LogLevel::Debug,
            "removed pin (reset: {})",
            reset
        );
        self
    }

    fn set_pin_fixed(&self, fixed: bool) {
        if let Some(pin) = self.inner_mut().pin.as_mut() {
            pin.fixed = fixed;
        }
    }

    fn notify_pin_plugins(&self, pinned: bool) {
        for plugin in self.stage().plugins() {
            plugin.on_pin_state_change(self, pinned);
        }
    }

    /// Fix the pin while DURING, park it in its spacer otherwise
    ///
    /// `force` parks the pin regardless of state.
    pub(super) fn update_pin_state(&self, force: bool) {
        let Some(controller) = self.controller() else {
            return;
        };
        let Some(pin) = self.pin_view() else {
            return;
        };
        let dom = self.dom();
        let Some(target) = dom.first_child(pin.spacer) else {
            return;
        };
        let vertical = controller.info().vertical;
        let (state, progress, duration, reverse, start) = {
            let s = self.inner();
            (s.state, s.progress, s.duration, s.reverse, s.scroll_offset.start)
        };

        if !force && state == SceneState::During {
            if !pin.fixed {
                self.set_pin_fixed(true);
                css_set(dom, target, [("position", "fixed")]);
                self.update_pin_dimensions();
                self.notify_pin_plugins(true);
            }
            let mut fixed = geometry::element_offset(dom, pin.spacer.into(), true);
            let travelled = if reverse || duration == 0.0 {
                controller.info().scroll_pos - start
            } else {
                (progress * duration * 10.0).round() / 10.0
            };
            *fixed.along_mut(vertical) += travelled;
            css_set(dom, target, [("top", fixed.top), ("left", fixed.left)]);
            return;
        }

        let position = if pin.in_flow { "relative" } else { "absolute" };
        let mut change = dom.computed_style(target, "position") != position;
        let mut top = 0.0;
        let mut left = 0.0;
        if !pin.push_followers {
            *(if vertical { &mut top } else { &mut left }) = duration * progress;
        } else if duration > 0.0 {
            let (leading, trailing) = if vertical {
                ("padding-top", "padding-bottom")
            } else {
                ("padding-left", "padding-right")
            };
            if state == SceneState::After && px_or_zero(&dom.computed_style(pin.spacer, leading)) == 0.0 {
                change = true;
            } else if state == SceneState::Before
                && px_or_zero(&dom.computed_style(pin.spacer, trailing)) == 0.0
            {
                change = true;
            }
        }
        css_set(dom, target, [("position", position)]);
        css_set(dom, target, [("top", top), ("left", left)]);
        if pin.fixed {
            self.set_pin_fixed(false);
        }
        if change {
            self.update_pin_dimensions();
        }
        if pin.fixed {
            self.notify_pin_plugins(false);
        }
    }

    /// Size the spacer (and relatively sized pins) for the current state
    pub(super) fn update_pin_dimensions(&self) {
        let Some(controller) = self.controller() else {
            return;
        };
        let Some(pin) = self.pin_view().filter(|p| p.in_flow) else {
            return;
        };
        let dom = self.dom();
        let Some(target) = dom.first_child(pin.spacer) else {
            return;
        };
        let vertical = controller.info().vertical;
        let (during, progress, duration) = {
            let s = self.inner();
            (s.state == SceneState::During, s.progress, s.duration)
        };
        let margin_collapse = is_margin_collapse_type(&dom.computed_style(pin.spacer, "display"));
        let spacer = Container::Element(pin.spacer);
        let mut css: SmallVec<[(&str, CssValue); 6]> = SmallVec::new();

        if pin.relative.width || pin.relative.auto_full_width {
            if during {
                css_set(dom, pin.element, [("width", geometry::width(dom, spacer, false, false))]);
            } else {
                css_set(dom, pin.element, [("width", "100%")]);
            }
        } else {
            let measured = if vertical { pin.element } else { target };
            let min_width = geometry::width(dom, measured.into(), true, true);
            css.push(("min-width", min_width.into()));
            css.push(("width", if during { min_width.into() } else { "auto".into() }));
        }

        if pin.relative.height {
            if during {
                let pushed = if pin.push_followers { duration } else { 0.0 };
                let height = geometry::height(dom, spacer, false, false) - pushed;
                css_set(dom, pin.element, [("height", height)]);
            } else {
                css_set(dom, pin.element, [("height", "100%")]);
            }
        } else {
            let measured = if vertical { target } else { pin.element };
            let min_height = geometry::height(dom, measured.into(), true, !margin_collapse);
            css.push(("min-height", min_height.into()));
            css.push(("height", if during { min_height.into() } else { "auto".into() }));
        }

        if pin.push_followers {
            let (leading, trailing) = if vertical {
                ("padding-top", "padding-bottom")
            } else {
                ("padding-left", "padding-right")
            };
            css.push((leading, (duration * progress).into()));
            css.push((trailing, (duration * (1.0 - progress)).into()));
        }
        css_set(dom, pin.spacer, css);
    }

    /// Scrolling inside an element container moves the fixed pin with it
    fn update_pin_in_container(&self) {
        let is_document = match self.controller() {
            Some(controller) => controller.info().is_document,
            None => return,
        };
        if self.has_pin() && self.state() == SceneState::During && !is_document {
            self.update_pin_state(false);
        }
    }

    /// Relatively sized pins follow window resizes
    fn update_relative_pin_spacer(&self) {
        if self.controller().is_none() || self.state() != SceneState::During {
            return;
        }
        let Some(pin) = self.pin_view() else {
            return;
        };
        let dom = self.dom();
        let Some(parent) = dom.parent(pin.spacer) else {
            return;
        };
        let parent = Container::Element(parent);
        let width_changed = (pin.relative.width || pin.relative.auto_full_width)
            && geometry::width(dom, Container::Window, false, false)
                != geometry::width(dom, parent, false, false);
        let height_changed = pin.relative.height
            && geometry::height(dom, Container::Window, false, false)
                != geometry::height(dom, parent, false, false);
        if width_changed || height_changed {
            self.update_pin_dimensions();
        }
    }

    /// Pin follow-up after the scroll window moved
    pub(super) fn pin_on_shift(&self, reason: &ShiftReason) {
        if !self.has_pin() {
            return;
        }
        let duration_changed = *reason == ShiftReason::Duration;
        let (state, duration) = (self.state(), self.duration());
        if (state == SceneState::After && duration_changed)
            || (state == SceneState::During && duration == 0.0)
        {
            self.update_pin_state(false);
        }
        if duration_changed {
            self.update_pin_dimensions();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::controller::Controller;
    use crate::options::{ControllerOptions, SceneOptions, TriggerHook};
    use crate::plugin::Plugin;
    use crate::testing::{fixture, fixture_with, Fixture};
    use scrollscene_host::{Dom, Point, Rect};

    #[test]
    fn test_pin_round_trip_restores_element() {
        let Fixture { doc, stage, .. } = fixture();
        let body = doc.body().unwrap();
        let el = doc.create_in_body("div", Rect::new(0.0, 1000.0, 200.0, 100.0));
        doc.set_inline_style(el, "width", "200px");
        doc.set_inline_style(el, "margin-top", "3px");
        let before = doc.inline_declarations(el);

        let scene = Scene::new(&stage, SceneOptions::new().duration(100.0));
        scene.set_pin(el, PinSettings::new().spacer_class("spacer"));
        let spacer = scene.pin_spacer().unwrap();
        assert_eq!(doc.parent(el), Some(spacer));
        assert_eq!(doc.parent(spacer), Some(body));
        assert!(doc.has_attribute(spacer, PIN_SPACER_ATTRIBUTE));
        assert_eq!(doc.classes(spacer), vec!["spacer".to_string()]);
        assert_eq!(doc.inline_style(spacer, "position"), "relative");
        assert_eq!(doc.inline_style(el, "top"), "auto");
        assert!(stage.has_pin_style(el));

        scene.remove_pin(true);
        assert_eq!(doc.children(body), vec![el]);
        assert!(!doc.exists(spacer));
        assert_eq!(doc.inline_declarations(el), before);
        assert!(scene.pin().is_none());
        assert!(!stage.has_pin_style(el));
    }

    #[test]
    fn test_cascaded_pins() {
        let Fixture { doc, stage, .. } = fixture();
        let el = doc.create_in_body("div", Rect::new(0.0, 1000.0, 200.0, 100.0));
        doc.set_inline_style(el, "margin-top", "3px");
        let before = doc.inline_declarations(el);

        let outer = Scene::new(&stage, SceneOptions::new().duration(100.0));
        let inner = Scene::new(&stage, SceneOptions::new().duration(100.0));
        outer.set_pin(el, PinSettings::new());
        inner.set_pin(el, PinSettings::new());
        let outer_spacer = outer.pin_spacer().unwrap();
        let inner_spacer = inner.pin_spacer().unwrap();
        assert_eq!(doc.parent(el), Some(inner_spacer));
        assert_eq!(doc.parent(inner_spacer), Some(outer_spacer));

        let controller = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let trigger = Scene::new(
            &stage,
            SceneOptions::new()
                .trigger_element(el)
                .trigger_hook(TriggerHook::OnLeave),
        );
        trigger.add_to(&controller);
        assert_eq!(
            trigger.scroll_offset().start,
            doc.bounding_rect(outer_spacer).top()
        );

        inner.remove_pin(true);
        assert!(!doc.exists(inner_spacer));
        assert_eq!(doc.parent(el), Some(outer_spacer));
        assert_ne!(doc.inline_declarations(el), before);
        assert!(stage.has_pin_style(el));

        outer.remove_pin(true);
        assert_eq!(doc.parent(el), doc.body());
        assert_eq!(doc.inline_declarations(el), before);
        assert!(!stage.has_pin_style(el));
    }

    #[test]
    fn test_horizontal_pin_pushes_along_x() {
        let Fixture { doc, scheduler, stage } = fixture();
        let el = doc.create_in_body("div", Rect::new(1000.0, 0.0, 200.0, 100.0));
        let controller =
            Controller::new(&stage, ControllerOptions::new().vertical(false)).unwrap();
        let scene = Scene::new(&stage, SceneOptions::new().duration(200.0).offset(1000.0));
        scene.set_pin(el, PinSettings::new());
        scene.add_to(&controller);
        let spacer = scene.pin_spacer().unwrap();

        let trigger = Scene::new(&stage, SceneOptions::new().trigger_element(el));
        trigger.add_to(&controller);
        assert_eq!(trigger.scroll_offset().start, 1000.0 - 1024.0 * 0.5);

        doc.set_scroll_offset(Container::Window, Point::new(1100.0, 0.0));
        scheduler.run_frame();
        assert_eq!(scene.state(), SceneState::During);
        assert_eq!(scene.progress(), 0.5);
        assert_eq!(doc.inline_style(el, "position"), "fixed");
        assert_eq!(doc.inline_style(el, "left"), "0px");
        assert_eq!(doc.inline_style(el, "top"), "0px");
        assert_eq!(doc.inline_style(spacer, "padding-left"), "100px");
        assert_eq!(doc.inline_style(spacer, "padding-right"), "100px");
        assert_eq!(doc.inline_style(spacer, "padding-top"), "");

        doc.set_scroll_offset(Container::Window, Point::new(1400.0, 0.0));
        scheduler.run_frame();
        assert_eq!(scene.state(), SceneState::After);
        assert_eq!(doc.inline_style(el, "position"), "relative");
        assert_eq!(doc.inline_style(spacer, "padding-left"), "200px");
        assert_eq!(doc.inline_style(spacer, "padding-right"), "0px");
    }

    #[test]
    fn test_rejects_fixed_and_missing_elements() {
        let Fixture { doc, stage, .. } = fixture();
        let el = doc.create_in_body("div", Rect::new(0.0, 0.0, 10.0, 10.0));
        doc.set_inline_style(el, "position", "fixed");
        let scene = Scene::new(&stage, SceneOptions::new());

        scene.set_pin(el, PinSettings::new());
        assert!(scene.pin().is_none());
        scene.set_pin("#nothing", PinSettings::new());
        assert!(scene.pin().is_none());
        assert_eq!(doc.children(doc.body().unwrap()), vec![el]);
    }

    #[test]
    fn test_pinning_same_element_twice_is_noop() {
        let Fixture { doc, stage, .. } = fixture();
        let a = doc.create_in_body("div", Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = doc.create_in_body("div", Rect::new(0.0, 10.0, 10.0, 10.0));
        let scene = Scene::new(&stage, SceneOptions::new());

        scene.set_pin(a, PinSettings::new());
        let spacer = scene.pin_spacer();
        let listeners = doc.listener_count();
        scene.set_pin(a, PinSettings::new());
        assert_eq!(scene.pin_spacer(), spacer);
        assert_eq!(doc.listener_count(), listeners);

        scene.set_pin(b, PinSettings::new());
        assert_eq!(scene.pin(), Some(b));
        assert_eq!(doc.parent(a), doc.body());
        assert_eq!(doc.listener_count(), listeners);
    }

    #[test]
    fn test_pin_follows_scene_state() {
        let Fixture { doc, scheduler, stage } = fixture();
        let el = doc.create_in_body("div", Rect::new(0.0, 1000.0, 200.0, 100.0));
        let controller = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let scene = Scene::new(&stage, SceneOptions::new().duration(200.0).offset(1000.0));
        scene.set_pin(el, PinSettings::new());
        scene.add_to(&controller);
        let spacer = scene.pin_spacer().unwrap();
        scheduler.run_frame();
        assert_eq!(scene.state(), SceneState::Before);
        assert_eq!(doc.inline_style(el, "position"), "relative");

        doc.set_scroll_offset(Container::Window, Point::new(0.0, 1100.0));
        scheduler.run_frame();
        assert_eq!(scene.state(), SceneState::During);
        assert_eq!(doc.inline_style(el, "position"), "fixed");
        assert_eq!(doc.inline_style(el, "top"), "0px");
        assert_eq!(doc.bounding_rect(el).top(), 0.0);
        assert_eq!(doc.inline_style(spacer, "padding-top"), "100px");
        assert_eq!(doc.inline_style(spacer, "padding-bottom"), "100px");
        assert_eq!(doc.inline_style(spacer, "min-height"), "100px");

        doc.set_scroll_offset(Container::Window, Point::new(0.0, 1400.0));
        scheduler.run_frame();
        assert_eq!(scene.state(), SceneState::After);
        assert_eq!(doc.inline_style(el, "position"), "relative");
        assert_eq!(doc.inline_style(el, "top"), "0px");
        assert_eq!(doc.inline_style(spacer, "padding-top"), "200px");
        assert_eq!(doc.inline_style(spacer, "padding-bottom"), "0px");
        assert_eq!(doc.client_size(spacer.into()).height, 300.0);
    }

    #[test]
    fn test_pin_without_push_followers_offsets_element() {
        let Fixture { doc, scheduler, stage } = fixture();
        let el = doc.create_in_body("div", Rect::new(0.0, 1000.0, 200.0, 100.0));
        let controller = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let scene = Scene::new(&stage, SceneOptions::new().duration(200.0).offset(1000.0));
        scene.set_pin(el, PinSettings::new().push_followers(false));
        scene.add_to(&controller);

        doc.set_scroll_offset(Container::Window, Point::new(0.0, 1500.0));
        scheduler.run_frame();
        assert_eq!(scene.state(), SceneState::After);
        assert_eq!(doc.inline_style(el, "top"), "200px");
        assert_eq!(doc.inline_style(scene.pin_spacer().unwrap(), "padding-top"), "");
    }

    #[test]
    fn test_destroy_with_reset_unwraps_pin() {
        let Fixture { doc, scheduler, stage } = fixture();
        let el = doc.create_in_body("div", Rect::new(0.0, 1000.0, 200.0, 100.0));
        let controller = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let scene = Scene::new(&stage, SceneOptions::new().duration(200.0).offset(1000.0));
        scene.set_pin(el, PinSettings::new());
        scene.add_to(&controller);
        doc.set_scroll_offset(Container::Window, Point::new(0.0, 1100.0));
        scheduler.run_frame();

        scene.destroy(true);
        assert_eq!(doc.parent(el), doc.body());
        assert!(doc.inline_declarations(el).is_empty());
        assert_eq!(doc.listener_count(), 2);
    }

    struct PinWatcher(Rc<RefCell<Vec<bool>>>);

    impl Plugin for PinWatcher {
        fn name(&self) -> &str {
            "pin-watcher"
        }

        fn on_pin_state_change(&self, _scene: &Scene, pinned: bool) {
            self.0.borrow_mut().push(pinned);
        }
    }

    #[test]
    fn test_plugin_sees_pin_changes() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let fx = fixture_with({
            let seen = seen.clone();
            move |builder| builder.plugin(PinWatcher(seen))
        });
        let el = fx.doc.create_in_body("div", Rect::new(0.0, 1000.0, 200.0, 100.0));
        let controller = Controller::new(&fx.stage, ControllerOptions::new()).unwrap();
        let scene = Scene::new(&fx.stage, SceneOptions::new().duration(200.0).offset(1000.0));
        scene.set_pin(el, PinSettings::new());
        scene.add_to(&controller);

        fx.doc.set_scroll_offset(Container::Window, Point::new(0.0, 1100.0));
        fx.scheduler.run_frame();
        assert_eq!(*seen.borrow(), vec![true]);
        fx.doc.set_scroll_offset(Container::Window, Point::new(0.0, 1150.0));
        fx.scheduler.run_frame();
        assert_eq!(*seen.borrow(), vec![true]);
        fx.doc.set_scroll_offset(Container::Window, Point::new(0.0, 0.0));
        fx.scheduler.run_frame();
        assert_eq!(*seen.borrow(), vec![true, false]);
    }
}
