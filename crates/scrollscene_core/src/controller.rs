//! Scroll controller
//!
//! One [`Controller`] per scroll container. It listens to the container's
//! native `scroll` and `resize` events, coalesces them into at most one
//! pending animation frame, and on that frame hands the current scroll
//! position to every scene that needs it.
//!
//! Scenes are kept sorted by their start offset. While scrolling backwards
//! they are updated in reverse order, so that `leave`/`enter` pairs of
//! adjacent scenes fire in visual order.
//!
//! Element containers cannot report their own resizes, so a refresh timer
//! polls their size every `refresh_interval` milliseconds and re-measures
//! every scene's trigger element and dynamic duration.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use scrollscene_host::geometry;
use scrollscene_host::{Container, Dom, ElementId, ListenerId, NativeEvent, Point, TimerId};

use crate::error::{Result, StageError};
use crate::events::{
    parse_names, ControllerEvent, ControllerEventKind, ControllerPayload, EventBus, KindFilter,
    Namespace, NamespaceFilter, SceneEvent, SceneEventKind, SubscriptionId,
};
use crate::log::LogLevel;
use crate::log_at;
use crate::options::{ControllerOptions, SceneOptions};
use crate::scene::{outermost_spacer, Scene};
use crate::stage::Stage;

/// Direction of the last scroll movement
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    Forward,
    Reverse,
    #[default]
    Paused,
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Forward => "FORWARD",
            ScrollDirection::Reverse => "REVERSE",
            ScrollDirection::Paused => "PAUSED",
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the controller's state
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerInfo {
    /// Container extent along the scroll axis
    pub size: f64,
    pub vertical: bool,
    /// Scroll position as of the last update
    pub scroll_pos: f64,
    pub scroll_direction: ScrollDirection,
    pub container: Container,
    pub is_document: bool,
}

/// One field of [`ControllerInfo`], looked up by name
#[derive(Clone, Debug, PartialEq)]
pub enum InfoValue {
    Number(f64),
    Bool(bool),
    Direction(ScrollDirection),
    Container(Container),
}

/// Custom scroll position getter
pub type ScrollPosFn = Rc<dyn Fn() -> f64>;

/// Custom scroll function: target position plus an optional caller value
pub type ScrollToFn = Rc<dyn Fn(f64, Option<f64>)>;

/// Where [`Controller::scroll_to`] should go
#[derive(Clone)]
pub enum ScrollTarget {
    Position(f64),
    Element(ElementId),
    Selector(String),
    /// The start of a scene attached to this controller
    Scene(Scene),
    /// Replace the scroll function used for every later call
    Method(ScrollToFn),
}

impl fmt::Debug for ScrollTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollTarget::Position(pos) => f.debug_tuple("Position").field(pos).finish(),
            ScrollTarget::Element(id) => f.debug_tuple("Element").field(id).finish(),
            ScrollTarget::Selector(sel) => f.debug_tuple("Selector").field(sel).finish(),
            ScrollTarget::Scene(scene) => f.debug_tuple("Scene").field(scene).finish(),
            ScrollTarget::Method(_) => f.write_str("Method(..)"),
        }
    }
}

impl From<f64> for ScrollTarget {
    fn from(pos: f64) -> Self {
        ScrollTarget::Position(pos)
    }
}

impl From<ElementId> for ScrollTarget {
    fn from(id: ElementId) -> Self {
        ScrollTarget::Element(id)
    }
}

impl From<&str> for ScrollTarget {
    fn from(selector: &str) -> Self {
        ScrollTarget::Selector(selector.to_string())
    }
}

impl From<&Scene> for ScrollTarget {
    fn from(scene: &Scene) -> Self {
        ScrollTarget::Scene(scene.clone())
    }
}

// ============================================================================
// State
// ============================================================================

/// Scenes waiting for the next frame
#[derive(Default)]
enum PendingUpdate {
    #[default]
    None,
    Scenes(Vec<Scene>),
    All,
}

struct ControllerInner {
    container: Container,
    is_document: bool,
    vertical: bool,
    loglevel: LogLevel,
    refresh_interval: u32,
    global_scene_options: SceneOptions,

    scenes: Vec<Scene>,
    scroll_pos: f64,
    scroll_direction: ScrollDirection,
    viewport_size: f64,
    enabled: bool,
    destroyed: bool,

    pending: PendingUpdate,
    frame_requested: bool,
    refresh_timer: Option<TimerId>,
    native_listeners: SmallVec<[ListenerId; 2]>,
    scroll_pos_method: Option<ScrollPosFn>,
    scroll_to_method: Option<ScrollToFn>,
}

pub(crate) struct ControllerShared {
    stage: Rc<Stage>,
    inner: RefCell<ControllerInner>,
    events: RefCell<EventBus<ControllerEventKind, ControllerEvent>>,
}

/// Handle to a scroll controller
#[derive(Clone)]
pub struct Controller {
    shared: Rc<ControllerShared>,
}

#[derive(Clone)]
pub(crate) struct WeakController(Weak<ControllerShared>);

impl WeakController {
    pub(crate) fn upgrade(&self) -> Option<Controller> {
        self.0.upgrade().map(|shared| Controller { shared })
    }
}

impl PartialEq for Controller {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Controller {}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.inner();
        f.debug_struct("Controller")
            .field("container", &s.container)
            .field("vertical", &s.vertical)
            .field("scroll_pos", &s.scroll_pos)
            .field("scenes", &s.scenes.len())
            .field("enabled", &s.enabled)
            .finish_non_exhaustive()
    }
}

fn sort_by_start(scenes: &mut [Scene]) {
    scenes.sort_by(|a, b| a.scroll_offset().start.total_cmp(&b.scroll_offset().start));
}

impl Controller {
    /// Create a controller for `options.container`
    pub fn new(stage: &Rc<Stage>, options: ControllerOptions) -> Result<Controller> {
        let dom = stage.dom();
        let loglevel = options.loglevel;
        for key in options.unknown.keys() {
            let err = StageError::UnknownOption(key.clone());
            log_at!(loglevel, LogLevel::Warn, "{}", err);
        }
        let Some(container) = options.container.resolve(dom) else {
            let err = StageError::ContainerNotFound(options.container.to_string());
            log_at!(loglevel, LogLevel::Error, "{}", err);
            return Err(err);
        };
        let is_document = match (container, dom.body()) {
            (Container::Window, _) | (_, None) => true,
            (Container::Element(id), Some(body)) => id == body || !dom.contains(body, id),
        };
        let container = if is_document {
            Container::Window
        } else {
            container
        };
        let viewport_size = geometry::viewport_size(dom, container, options.vertical);

        let controller = Controller {
            shared: Rc::new(ControllerShared {
                stage: stage.clone(),
                inner: RefCell::new(ControllerInner {
                    container,
                    is_document,
                    vertical: options.vertical,
                    loglevel,
                    refresh_interval: options.refresh_interval,
                    global_scene_options: options.global_scene_options,
                    scenes: Vec::new(),
                    scroll_pos: 0.0,
                    scroll_direction: ScrollDirection::Paused,
                    viewport_size,
                    enabled: true,
                    destroyed: false,
                    pending: PendingUpdate::None,
                    frame_requested: false,
                    refresh_timer: None,
                    native_listeners: SmallVec::new(),
                    scroll_pos_method: None,
                    scroll_to_method: None,
                }),
                events: RefCell::new(EventBus::new()),
            }),
        };

        let listeners = [NativeEvent::Resize, NativeEvent::Scroll]
            .into_iter()
            .map(|event| {
                let weak = controller.downgrade();
                dom.add_listener(
                    container,
                    event,
                    Rc::new(move || {
                        if let Some(controller) = weak.upgrade() {
                            controller.on_change(event);
                        }
                    }),
                )
            })
            .collect();
        controller.inner_mut().native_listeners = listeners;
        controller.schedule_refresh();

        for plugin in stage.plugins() {
            plugin.on_controller_created(&controller);
        }
        log_at!(loglevel, LogLevel::Debug, "added new controller");
        Ok(controller)
    }

    fn inner(&self) -> Ref<'_, ControllerInner> {
        self.shared.inner.borrow()
    }

    fn inner_mut(&self) -> RefMut<'_, ControllerInner> {
        self.shared.inner.borrow_mut()
    }

    pub(crate) fn downgrade(&self) -> WeakController {
        WeakController(Rc::downgrade(&self.shared))
    }

    pub fn stage(&self) -> &Rc<Stage> {
        &self.shared.stage
    }

    fn dom(&self) -> &dyn Dom {
        self.shared.stage.dom()
    }

    pub fn loglevel(&self) -> LogLevel {
        self.inner().loglevel
    }

    pub fn set_loglevel(&self, level: LogLevel) -> &Self {
        self.inner_mut().loglevel = level;
        self
    }

    pub fn enabled(&self) -> bool {
        self.inner().enabled
    }

    /// Enable or disable all scene updates
    pub fn set_enabled(&self, enabled: bool) -> &Self {
        let scenes = {
            let mut s = self.inner_mut();
            if s.enabled == enabled {
                return self;
            }
            s.enabled = enabled;
            s.scenes.clone()
        };
        for scene in scenes {
            self.update_scene(&scene, true);
        }
        self
    }

    pub fn info(&self) -> ControllerInfo {
        let s = self.inner();
        ControllerInfo {
            size: s.viewport_size,
            vertical: s.vertical,
            scroll_pos: s.scroll_pos,
            scroll_direction: s.scroll_direction,
            container: s.container,
            is_document: s.is_document,
        }
    }

    /// One info field by name (`size`, `vertical`, `scrollPos`,
    /// `scrollDirection`, `container`, `isDocument`)
    pub fn info_by_name(&self, name: &str) -> Option<InfoValue> {
        let info = self.info();
        let value = match name {
            "size" => InfoValue::Number(info.size),
            "vertical" => InfoValue::Bool(info.vertical),
            "scrollPos" | "scroll_pos" => InfoValue::Number(info.scroll_pos),
            "scrollDirection" | "scroll_direction" => InfoValue::Direction(info.scroll_direction),
            "container" => InfoValue::Container(info.container),
            "isDocument" | "is_document" => InfoValue::Bool(info.is_document),
            other => {
                let err = StageError::invalid_argument(
                    "info",
                    format!("option \"{}\" is not available", other),
                );
                log_at!(self.loglevel(), LogLevel::Error, "{}", err);
                return None;
            }
        };
        Some(value)
    }

    /// Attached scenes, sorted by start offset
    pub fn scenes(&self) -> Vec<Scene> {
        self.inner().scenes.clone()
    }

    // ========================================================================
    // Scroll Position
    // ========================================================================

    /// Live scroll position of the container
    pub fn scroll_pos(&self) -> f64 {
        let (method, container, vertical) = {
            let s = self.inner();
            (s.scroll_pos_method.clone(), s.container, s.vertical)
        };
        match method {
            Some(method) => method(),
            None => geometry::scroll_position(self.dom(), container, vertical),
        }
    }

    /// Replace how the scroll position is read
    pub fn set_scroll_pos_method(&self, method: impl Fn() -> f64 + 'static) -> &Self {
        self.inner_mut().scroll_pos_method = Some(Rc::new(method));
        self
    }

    /// Scroll to a position, element, or scene start
    pub fn scroll_to(&self, target: impl Into<ScrollTarget>) -> &Self {
        self.scroll_to_with(target, None)
    }

    /// [`scroll_to`](Self::scroll_to) passing `extra` on to a custom scroll function
    pub fn scroll_to_with(&self, target: impl Into<ScrollTarget>, extra: Option<f64>) -> &Self {
        match target.into() {
            ScrollTarget::Position(pos) => self.set_scroll_pos(pos, extra),
            ScrollTarget::Method(method) => self.inner_mut().scroll_to_method = Some(method),
            ScrollTarget::Scene(scene) => {
                if scene.controller().as_ref() == Some(self) {
                    self.set_scroll_pos(scene.scroll_offset().start, extra);
                } else {
                    log_at!(
                        self.loglevel(),
                        LogLevel::Warn,
                        "scroll_to(): the supplied scene does not belong to this controller, scroll cancelled"
                    );
                }
            }
            ScrollTarget::Element(id) => {
                if self.dom().exists(id) {
                    self.scroll_to_element(id, extra);
                } else {
                    self.warn_unknown_target(&format!("{:?}", id));
                }
            }
            ScrollTarget::Selector(selector) => match self.dom().query(&selector).first() {
                Some(&id) => self.scroll_to_element(id, extra),
                None => self.warn_unknown_target(&selector),
            },
        }
        self
    }

    fn warn_unknown_target(&self, target: &str) {
        log_at!(
            self.loglevel(),
            LogLevel::Warn,
            "scroll_to(): no element matches \"{}\", scroll cancelled",
            target
        );
    }

    fn scroll_to_element(&self, element: ElementId, extra: Option<f64>) {
        let dom = self.dom();
        let anchor = outermost_spacer(dom, element);
        let info = self.info();
        let mut container_offset =
            geometry::element_offset(dom, info.container, false).along(info.vertical);
        if !info.is_document {
            container_offset -= self.scroll_pos();
        }
        let element_offset = geometry::element_offset(dom, anchor.into(), false).along(info.vertical);
        self.set_scroll_pos(element_offset - container_offset, extra);
    }

    fn set_scroll_pos(&self, pos: f64, extra: Option<f64>) {
        let (method, container, vertical) = {
            let s = self.inner();
            (s.scroll_to_method.clone(), s.container, s.vertical)
        };
        if let Some(method) = method {
            method(pos, extra);
            return;
        }
        let dom = self.dom();
        let current = dom.scroll_offset(container);
        let next = if vertical {
            Point::new(current.x, pos)
        } else {
            Point::new(pos, current.y)
        };
        dom.set_scroll_offset(container, next);
    }

    // ========================================================================
    // Update Cycle
    // ========================================================================

    fn on_change(&self, event: NativeEvent) {
        log_at!(
            self.loglevel(),
            LogLevel::Debug,
            "event fired causing an update: {}",
            event
        );
        if event == NativeEvent::Resize {
            let size = self.measure_viewport();
            {
                let mut s = self.inner_mut();
                s.viewport_size = size;
                s.scroll_direction = ScrollDirection::Paused;
            }
            self.emit(ControllerEventKind::Resize, ControllerPayload::Resize { size });
        }
        self.inner_mut().pending = PendingUpdate::All;
        self.request_frame();
    }

    fn measure_viewport(&self) -> f64 {
        let (container, vertical) = {
            let s = self.inner();
            (s.container, s.vertical)
        };
        geometry::viewport_size(self.dom(), container, vertical)
    }

    /// Ask for a frame unless one is already on its way
    fn request_frame(&self) {
        {
            let mut s = self.inner_mut();
            if s.frame_requested || s.destroyed {
                return;
            }
            s.frame_requested = true;
        }
        let weak = self.downgrade();
        self.stage().scheduler().request_frame(Box::new(move || {
            if let Some(controller) = weak.upgrade() {
                controller.inner_mut().frame_requested = false;
                controller.update_scenes();
            }
        }));
    }

    /// Frame callback: bring every pending scene up to date
    fn update_scenes(&self) {
        let (scenes, old_pos, old_direction) = {
            let mut s = self.inner_mut();
            if !s.enabled || s.destroyed {
                return;
            }
            let scenes = match mem::take(&mut s.pending) {
                PendingUpdate::None => Vec::new(),
                PendingUpdate::Scenes(scenes) => scenes,
                PendingUpdate::All => s.scenes.clone(),
            };
            (scenes, s.scroll_pos, s.scroll_direction)
        };
        let scroll_pos = self.scroll_pos();
        let delta = scroll_pos - old_pos;
        let direction = if delta == 0.0 {
            old_direction
        } else if delta > 0.0 {
            ScrollDirection::Forward
        } else {
            ScrollDirection::Reverse
        };
        {
            let mut s = self.inner_mut();
            s.scroll_pos = scroll_pos;
            s.scroll_direction = direction;
        }

        let mut scenes = scenes;
        if direction == ScrollDirection::Reverse {
            scenes.reverse();
        }
        for scene in &scenes {
            scene.update(true);
        }
        if !scenes.is_empty() {
            log_at!(
                self.loglevel(),
                LogLevel::Debug,
                "updating {} scenes at {} ({})",
                scenes.len(),
                scroll_pos,
                direction
            );
        }
        self.emit(
            ControllerEventKind::Update,
            ControllerPayload::Update {
                scroll_pos,
                scroll_direction: direction,
                scenes: scenes.len(),
            },
        );
    }

    /// Update one scene now, or queue it for the next frame
    pub fn update_scene(&self, scene: &Scene, immediate: bool) -> &Self {
        if immediate {
            scene.update(true);
            return self;
        }
        {
            let mut s = self.inner_mut();
            match &mut s.pending {
                PendingUpdate::All => {}
                PendingUpdate::Scenes(scenes) => {
                    if !scenes.contains(scene) {
                        scenes.push(scene.clone());
                        sort_by_start(scenes);
                    }
                }
                pending @ PendingUpdate::None => {
                    *pending = PendingUpdate::Scenes(vec![scene.clone()]);
                }
            }
        }
        self.request_frame();
        self
    }

    /// Re-measure the container and update every scene
    ///
    /// Without `immediate` the scenes update on the next frame.
    pub fn update(&self, immediate: bool) -> &Self {
        self.on_change(NativeEvent::Resize);
        if immediate {
            self.update_scenes();
        }
        self
    }

    fn schedule_refresh(&self) {
        let interval = {
            let s = self.inner();
            if s.destroyed || s.refresh_interval == 0 {
                return;
            }
            s.refresh_interval
        };
        let weak = self.downgrade();
        let timer = self.stage().scheduler().set_timeout(
            interval,
            Box::new(move || {
                if let Some(controller) = weak.upgrade() {
                    controller.refresh();
                }
            }),
        );
        self.inner_mut().refresh_timer = Some(timer);
    }

    /// Periodic check: element containers cannot report their own resizes
    fn refresh(&self) {
        let (is_document, container, cached_size, scenes) = {
            let mut s = self.inner_mut();
            if s.destroyed {
                return;
            }
            s.refresh_timer = None;
            (s.is_document, s.container, s.viewport_size, s.scenes.clone())
        };
        if !is_document && self.measure_viewport() != cached_size {
            self.dom().dispatch(container, NativeEvent::Resize);
        }
        for scene in scenes {
            scene.refresh();
        }
        self.schedule_refresh();
    }

    // ========================================================================
    // Scenes
    // ========================================================================

    /// Attach a scene; same as `scene.add_to(self)`
    pub fn add_scene(&self, scene: &Scene) -> &Self {
        if scene.controller().as_ref() != Some(self) {
            scene.add_to(self);
            return self;
        }
        {
            let mut s = self.inner_mut();
            if s.scenes.contains(scene) {
                return self;
            }
            s.scenes.push(scene.clone());
            sort_by_start(&mut s.scenes);
        }

        let weak = self.downgrade();
        scene.subscribe(
            [(SceneEventKind::Shift, Namespace::ControllerSort)],
            Rc::new(move |_: &SceneEvent| {
                if let Some(controller) = weak.upgrade() {
                    sort_by_start(&mut controller.inner_mut().scenes);
                }
            }),
        );

        let globals = self.inner().global_scene_options.clone();
        if globals != SceneOptions::default() {
            scene.apply(&globals);
        }
        log_at!(
            self.loglevel(),
            LogLevel::Debug,
            "adding scene (now {} total)",
            self.inner().scenes.len()
        );
        self
    }

    /// Detach a scene; same as `scene.remove()`
    pub fn remove_scene(&self, scene: &Scene) -> &Self {
        let removed = {
            let mut s = self.inner_mut();
            match s.scenes.iter().position(|candidate| candidate == scene) {
                Some(index) => {
                    s.scenes.remove(index);
                    if let PendingUpdate::Scenes(pending) = &mut s.pending {
                        pending.retain(|p| p != scene);
                    }
                    true
                }
                None => false,
            }
        };
        if removed {
            scene.off_namespace(SceneEventKind::Shift, Namespace::ControllerSort);
            scene.remove();
            log_at!(
                self.loglevel(),
                LogLevel::Debug,
                "removed scene (now {} left)",
                self.inner().scenes.len()
            );
        }
        self
    }

    /// Tear down: stop the timer, destroy every scene, drop all listeners
    pub fn destroy(&self, reset: bool) {
        let (timer, scenes) = {
            let mut s = self.inner_mut();
            if s.destroyed {
                return;
            }
            s.destroyed = true;
            (s.refresh_timer.take(), s.scenes.clone())
        };
        if let Some(timer) = timer {
            self.stage().scheduler().clear_timeout(timer);
        }
        for scene in scenes.iter().rev() {
            scene.destroy(reset);
        }
        let listeners = {
            let mut s = self.inner_mut();
            s.pending = PendingUpdate::None;
            mem::take(&mut s.native_listeners)
        };
        for listener in listeners {
            self.dom().remove_listener(listener);
        }
        log_at!(
            self.loglevel(),
            LogLevel::Debug,
            "destroyed controller (reset: {})",
            reset
        );
        self.emit(ControllerEventKind::Destroy, ControllerPayload::Destroy { reset });
        self.shared.events.borrow_mut().clear();
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Listen to `update`, `resize` or `destroy`, optionally namespaced
    pub fn on<F>(&self, names: &str, callback: F) -> Option<SubscriptionId>
    where
        F: Fn(&ControllerEvent) + 'static,
    {
        let parsed = match parse_names::<ControllerEventKind>(names, false) {
            Ok(parsed) => parsed,
            Err(err) => {
                log_at!(self.loglevel(), LogLevel::Error, "{}", err);
                return None;
            }
        };
        let targets: Vec<(ControllerEventKind, Namespace)> = parsed
            .into_iter()
            .filter_map(|(kind, namespace)| match (kind, namespace) {
                (KindFilter::Only(kind), NamespaceFilter::Exact(ns)) => Some((kind, ns)),
                _ => None,
            })
            .collect();
        Some(self.shared.events.borrow_mut().subscribe(targets, Rc::new(callback)))
    }

    /// Remove listeners by name; `*` matches any event or namespace
    pub fn off(&self, names: &str) -> usize {
        let parsed = match parse_names::<ControllerEventKind>(names, true) {
            Ok(parsed) => parsed,
            Err(err) => {
                log_at!(self.loglevel(), LogLevel::Error, "{}", err);
                return 0;
            }
        };
        let mut events = self.shared.events.borrow_mut();
        parsed
            .into_iter()
            .map(|(kind, namespace)| events.unsubscribe(kind, &namespace, None))
            .sum()
    }

    fn emit(&self, kind: ControllerEventKind, payload: ControllerPayload) {
        let recipients = self.shared.events.borrow().recipients(kind, None);
        if recipients.is_empty() {
            return;
        }
        let timestamp = self.stage().now();
        for (namespace, callback) in recipients {
            callback(&ControllerEvent {
                kind,
                namespace,
                target: self.clone(),
                timestamp,
                payload: payload.clone(),
            });
        }
    }
}
