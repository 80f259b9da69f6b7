//! Scroll scenes
//!
//! A [`Scene`] is one region of scroll travel. It owns its options, computes
//! its `{start, end}` window in the controller's scroll coordinates and runs
//! a three-state machine over it:
//!
//! ```text
//!            progress >= 0              progress >= 1
//!   BEFORE ─────────────────▶ DURING ─────────────────▶ AFTER
//!          ◀─────────────────        ◀─────────────────
//!            progress < 0              progress < 1
//!            (reverse only)            (reverse only)
//! ```
//!
//! A zero-duration scene has no window, only a trigger point: it is either
//! BEFORE (progress 0) or DURING (progress 1).
//!
//! Scenes react to their own events before any listener sees them: a `shift`
//! recomputes the window, `progress` repositions a pin, `destroy` tears the
//! pin and class toggle down. Listener callbacks always run with no internal
//! borrow held, so they may call any scene or controller method.

mod class_toggle;
mod pin;

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use scrollscene_host::{Dom, ElementId, ListenerId, NativeEvent};

use crate::controller::{Controller, ScrollDirection, WeakController};
use crate::error::StageError;
use crate::events::{
    parse_names, EventBus, EventCallback, KindFilter, Namespace, NamespaceFilter, SceneEvent,
    SceneEventKind, ScenePayload, ShiftReason, SubscriptionId,
};
use crate::log::LogLevel;
use crate::log_at;
use crate::options::{ElementRef, OptionValue, SceneDuration, SceneOption, SceneOptions, TriggerHook};
use crate::stage::Stage;

pub use pin::{PinSettings, DEFAULT_SPACER_CLASS, PIN_SPACER_ATTRIBUTE};

/// Where a scene stands relative to its scroll window
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SceneState {
    #[default]
    Before,
    During,
    After,
}

impl SceneState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneState::Before => "BEFORE",
            SceneState::During => "DURING",
            SceneState::After => "AFTER",
        }
    }
}

impl fmt::Display for SceneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scene's active window in container scroll coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollOffset {
    pub start: f64,
    pub end: f64,
}

/// Walk up through pin spacers to the outermost one wrapping `element`
pub(crate) fn outermost_spacer(dom: &dyn Dom, element: ElementId) -> ElementId {
    let mut current = element;
    while let Some(parent) = dom.parent(current) {
        if !dom.has_attribute(parent, PIN_SPACER_ATTRIBUTE) {
            break;
        }
        current = parent;
    }
    current
}

// ============================================================================
// State
// ============================================================================

struct SceneInner {
    duration: f64,
    duration_source: SceneDuration,
    offset: f64,
    trigger_element: Option<ElementId>,
    trigger_hook: TriggerHook,
    reverse: bool,
    loglevel: LogLevel,
    custom: IndexMap<Rc<str>, OptionValue>,

    state: SceneState,
    progress: f64,
    scroll_offset: ScrollOffset,
    trigger_pos: f64,
    enabled: bool,

    controller: Option<WeakController>,
    container_listener: Option<ListenerId>,
    pin: Option<pin::PinState>,
    class_toggle: Option<class_toggle::ClassToggle>,
}

struct SceneShared {
    stage: Rc<Stage>,
    inner: RefCell<SceneInner>,
    events: RefCell<EventBus<SceneEventKind, SceneEvent>>,
}

/// Handle to a scroll scene
///
/// Cloning is cheap and yields another handle to the same scene.
#[derive(Clone)]
pub struct Scene {
    shared: Rc<SceneShared>,
}

#[derive(Clone)]
pub(crate) struct WeakScene(Weak<SceneShared>);

impl WeakScene {
    pub(crate) fn upgrade(&self) -> Option<Scene> {
        self.0.upgrade().map(|shared| Scene { shared })
    }
}

impl PartialEq for Scene {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Scene {}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.inner();
        f.debug_struct("Scene")
            .field("state", &s.state)
            .field("progress", &s.progress)
            .field("scroll_offset", &s.scroll_offset)
            .field("duration", &s.duration)
            .field("attached", &s.controller.is_some())
            .finish_non_exhaustive()
    }
}

impl Scene {
    /// Create a detached scene
    ///
    /// Unknown keys in `options.extra` are warned about and dropped; invalid
    /// values are logged and replaced by their defaults.
    pub fn new(stage: &Rc<Stage>, options: SceneOptions) -> Self {
        let defaults = stage.registry().defaults().clone();
        let custom = stage
            .registry()
            .custom_options()
            .map(|(name, option)| (name.clone(), option.default.clone()))
            .collect();
        let scene = Scene {
            shared: Rc::new(SceneShared {
                stage: stage.clone(),
                inner: RefCell::new(SceneInner {
                    duration: defaults.duration,
                    duration_source: SceneDuration::Fixed(defaults.duration),
                    offset: defaults.offset,
                    trigger_element: None,
                    trigger_hook: defaults.trigger_hook,
                    reverse: defaults.reverse,
                    loglevel: options.loglevel.unwrap_or(defaults.loglevel),
                    custom,
                    state: SceneState::Before,
                    progress: 0.0,
                    scroll_offset: ScrollOffset::default(),
                    trigger_pos: 0.0,
                    enabled: true,
                    controller: None,
                    container_listener: None,
                    pin: None,
                    class_toggle: None,
                }),
                events: RefCell::new(EventBus::new()),
            }),
        };

        if let Some(duration) = options.duration {
            scene.change_duration(duration);
        }
        if let Some(offset) = options.offset {
            scene.change_offset(offset);
        }
        if let Some(element) = options.trigger_element {
            scene.change_trigger_element(Some(element));
        }
        if let Some(hook) = options.trigger_hook {
            scene.change_trigger_hook(hook);
        }
        if let Some(reverse) = options.reverse {
            scene.change_reverse(reverse);
        }
        for (name, value) in &options.extra {
            scene.change_custom(name, value);
        }
        scene.update_scroll_offset();

        for plugin in stage.plugins() {
            plugin.on_scene_created(&scene);
        }
        log_at!(scene.loglevel(), LogLevel::Debug, "added new scene");
        scene
    }

    fn inner(&self) -> Ref<'_, SceneInner> {
        self.shared.inner.borrow()
    }

    fn inner_mut(&self) -> RefMut<'_, SceneInner> {
        self.shared.inner.borrow_mut()
    }

    pub(crate) fn downgrade(&self) -> WeakScene {
        WeakScene(Rc::downgrade(&self.shared))
    }

    pub fn stage(&self) -> &Rc<Stage> {
        &self.shared.stage
    }

    fn dom(&self) -> &dyn Dom {
        self.shared.stage.dom()
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Resolved duration in pixels
    pub fn duration(&self) -> f64 {
        self.inner().duration
    }

    /// The duration as configured (fixed, percent or computed)
    pub fn duration_option(&self) -> SceneDuration {
        self.inner().duration_source.clone()
    }

    pub fn offset(&self) -> f64 {
        self.inner().offset
    }

    pub fn trigger_element(&self) -> Option<ElementId> {
        self.inner().trigger_element
    }

    pub fn trigger_hook(&self) -> TriggerHook {
        self.inner().trigger_hook
    }

    pub fn reverse(&self) -> bool {
        self.inner().reverse
    }

    pub fn loglevel(&self) -> LogLevel {
        self.inner().loglevel
    }

    /// Current value of a registered custom option
    pub fn option(&self, name: &str) -> Option<OptionValue> {
        self.inner().custom.get(name).cloned()
    }

    pub fn state(&self) -> SceneState {
        self.inner().state
    }

    pub fn progress(&self) -> f64 {
        self.inner().progress
    }

    pub fn enabled(&self) -> bool {
        self.inner().enabled
    }

    pub fn scroll_offset(&self) -> ScrollOffset {
        self.inner().scroll_offset
    }

    /// The controller this scene is attached to
    pub fn controller(&self) -> Option<Controller> {
        self.inner().controller.as_ref().and_then(WeakController::upgrade)
    }

    /// Scroll position at which the scene triggers, before the hook shift
    ///
    /// With a trigger element this is the element's position plus the offset;
    /// without one it is where the hook sits in the viewport plus the offset.
    pub fn trigger_position(&self) -> f64 {
        let size = self.controller().map(|c| c.info().size);
        let s = self.inner();
        let mut pos = s.offset;
        if let Some(size) = size {
            pos += match s.trigger_element {
                Some(_) => s.trigger_pos,
                None => size * s.trigger_hook.value(),
            };
        }
        pos
    }

    // ========================================================================
    // Setters
    // ========================================================================

    pub fn set_duration(&self, duration: impl Into<SceneDuration>) -> &Self {
        if self.change_duration(duration.into()) {
            self.option_changed(SceneOption::Duration, true);
        }
        self
    }

    pub fn set_offset(&self, offset: f64) -> &Self {
        if self.change_offset(offset) {
            self.option_changed(SceneOption::Offset, true);
        }
        self
    }

    pub fn set_trigger_element(&self, element: impl Into<ElementRef>) -> &Self {
        if self.change_trigger_element(Some(element.into())) {
            self.option_changed(SceneOption::TriggerElement, false);
        }
        self
    }

    /// Anchor the scene to the page again instead of an element
    pub fn clear_trigger_element(&self) -> &Self {
        if self.change_trigger_element(None) {
            self.option_changed(SceneOption::TriggerElement, false);
        }
        self
    }

    pub fn set_trigger_hook(&self, hook: impl Into<TriggerHook>) -> &Self {
        if self.change_trigger_hook(hook.into()) {
            self.option_changed(SceneOption::TriggerHook, true);
        }
        self
    }

    pub fn set_reverse(&self, reverse: bool) -> &Self {
        if self.change_reverse(reverse) {
            self.option_changed(SceneOption::Reverse, false);
        }
        self
    }

    pub fn set_loglevel(&self, level: LogLevel) -> &Self {
        let changed = {
            let mut s = self.inner_mut();
            let changed = s.loglevel != level;
            s.loglevel = level;
            changed
        };
        if changed {
            self.option_changed(SceneOption::LogLevel, false);
        }
        self
    }

    /// Set a registered custom option
    pub fn set_option(&self, name: &str, value: impl Into<OptionValue>) -> &Self {
        if let Some((key, true, shifts)) = self.change_custom(name, &value.into()) {
            self.option_changed(SceneOption::Custom(key), shifts);
        }
        self
    }

    /// Apply every option present in `options`, firing change events
    pub fn apply(&self, options: &SceneOptions) -> &Self {
        if let Some(duration) = &options.duration {
            self.set_duration(duration.clone());
        }
        if let Some(offset) = options.offset {
            self.set_offset(offset);
        }
        if let Some(element) = &options.trigger_element {
            self.set_trigger_element(element.clone());
        }
        if let Some(hook) = options.trigger_hook {
            self.set_trigger_hook(hook);
        }
        if let Some(reverse) = options.reverse {
            self.set_reverse(reverse);
        }
        if let Some(level) = options.loglevel {
            self.set_loglevel(level);
        }
        for (name, value) in &options.extra {
            self.set_option(name, value.clone());
        }
        self
    }

    /// Enable or disable updates; a disabled scene releases its pin in place
    pub fn set_enabled(&self, enabled: bool) -> &Self {
        let changed = {
            let mut s = self.inner_mut();
            let changed = s.enabled != enabled;
            s.enabled = enabled;
            changed
        };
        if changed {
            self.update(true);
        }
        self
    }

    fn option_changed(&self, what: SceneOption, shifts: bool) {
        let reason = match &what {
            SceneOption::Duration => ShiftReason::Duration,
            SceneOption::Offset => ShiftReason::Offset,
            SceneOption::TriggerHook => ShiftReason::TriggerHook,
            other => ShiftReason::Option(Rc::from(other.name())),
        };
        self.emit(SceneEventKind::Change, ScenePayload::Change { what });
        if shifts {
            self.emit(SceneEventKind::Shift, ScenePayload::Shift { reason });
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    fn viewport_size(&self) -> f64 {
        self.controller().map_or(0.0, |c| c.info().size)
    }

    fn change_duration(&self, source: SceneDuration) -> bool {
        let value = source.evaluate(self.viewport_size());
        let (source, value) = if value.is_finite() && value >= 0.0 {
            (source, value)
        } else {
            let default = self.stage().registry().defaults().duration;
            if source.is_dynamic() {
                log_at!(
                    self.loglevel(),
                    LogLevel::Error,
                    "Invalid return value of supplied function for option \"duration\": {}",
                    value
                );
            } else {
                let err = StageError::invalid_option("duration", value);
                log_at!(self.loglevel(), LogLevel::Error, "{}", err);
            }
            (SceneDuration::Fixed(default), default)
        };
        let mut s = self.inner_mut();
        s.duration_source = source;
        let changed = s.duration != value;
        s.duration = value;
        changed
    }

    fn change_offset(&self, offset: f64) -> bool {
        let offset = if offset.is_finite() {
            offset
        } else {
            let err = StageError::invalid_option("offset", offset);
            log_at!(self.loglevel(), LogLevel::Error, "{}", err);
            self.stage().registry().defaults().offset
        };
        let mut s = self.inner_mut();
        let changed = s.offset != offset;
        s.offset = offset;
        changed
    }

    fn change_trigger_element(&self, element: Option<ElementRef>) -> bool {
        let dom = self.dom();
        let resolved = match &element {
            None => None,
            Some(target) => {
                let found = target.resolve(dom).filter(|id| dom.parent(*id).is_some());
                if found.is_none() {
                    let err = StageError::TriggerElementNotFound(target.to_string());
                    log_at!(self.loglevel(), LogLevel::Error, "{}", err);
                }
                found
            }
        };
        let mut s = self.inner_mut();
        let changed = s.trigger_element != resolved;
        s.trigger_element = resolved;
        changed
    }

    fn change_trigger_hook(&self, hook: TriggerHook) -> bool {
        let hook = match hook.validate() {
            Ok(hook) => hook,
            Err(err) => {
                log_at!(self.loglevel(), LogLevel::Error, "{}", err);
                self.stage().registry().defaults().trigger_hook
            }
        };
        let mut s = self.inner_mut();
        let changed = s.trigger_hook.value() != hook.value();
        s.trigger_hook = hook;
        changed
    }

    fn change_reverse(&self, reverse: bool) -> bool {
        let mut s = self.inner_mut();
        let changed = s.reverse != reverse;
        s.reverse = reverse;
        changed
    }

    /// Returns the interned name, whether the value changed and whether the
    /// option shifts the window; `None` for unknown options
    fn change_custom(&self, name: &str, value: &OptionValue) -> Option<(Rc<str>, bool, bool)> {
        let registered = self
            .stage()
            .registry()
            .custom(name)
            .map(|(key, option)| (key.clone(), option.clone()));
        let Some((key, option)) = registered else {
            let err = StageError::UnknownOption(name.to_string());
            log_at!(self.loglevel(), LogLevel::Warn, "{}", err);
            return None;
        };
        let value = match option.validate(name, value) {
            Ok(value) => value,
            Err(err) => {
                log_at!(self.loglevel(), LogLevel::Error, "{}", err);
                option.default.clone()
            }
        };
        let previous = self.inner_mut().custom.insert(key.clone(), value.clone());
        Some((key, previous.as_ref() != Some(&value), option.shifts))
    }

    /// Re-check values that can go stale while detached
    fn revalidate(&self) {
        let element = self.trigger_element();
        if let Some(id) = element {
            if self.dom().parent(id).is_none() {
                let err = StageError::TriggerElementNotFound(format!("{:?}", id));
                log_at!(self.loglevel(), LogLevel::Error, "{}", err);
                self.inner_mut().trigger_element = None;
            }
        }
        let values: Vec<(Rc<str>, OptionValue)> = self
            .inner()
            .custom
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, value) in values {
            self.change_custom(&name, &value);
        }
    }

    // ========================================================================
    // Offsets
    // ========================================================================

    /// Re-run a percent or computed duration
    fn update_duration(&self, suppress_events: bool) {
        let source = self.duration_option();
        if !source.is_dynamic() {
            return;
        }
        if self.change_duration(source) && !suppress_events {
            self.emit(
                SceneEventKind::Change,
                ScenePayload::Change {
                    what: SceneOption::Duration,
                },
            );
            self.emit(
                SceneEventKind::Shift,
                ScenePayload::Shift {
                    reason: ShiftReason::Duration,
                },
            );
        }
    }

    /// Measure the trigger element relative to the scroll content
    fn update_trigger_element_position(&self, suppress_events: bool) {
        let Some(controller) = self.controller() else {
            return;
        };
        let (element, previous) = {
            let s = self.inner();
            (s.trigger_element, s.trigger_pos)
        };
        if element.is_none() && previous <= 0.0 {
            return;
        }

        let mut element_pos = 0.0;
        if let Some(element) = element {
            let dom = self.dom();
            if dom.parent(element).is_some() {
                let info = controller.info();
                let anchor = outermost_spacer(dom, element);
                let element_offset =
                    scrollscene_host::geometry::element_offset(dom, anchor.into(), false)
                        .along(info.vertical);
                let mut container_offset =
                    scrollscene_host::geometry::element_offset(dom, info.container, false)
                        .along(info.vertical);
                if !info.is_document {
                    container_offset -= controller.scroll_pos();
                }
                element_pos = element_offset - container_offset;
            } else {
                log_at!(
                    self.loglevel(),
                    LogLevel::Warn,
                    "triggerElement was removed from DOM and will be reset"
                );
                self.clear_trigger_element();
            }
        }

        let changed = {
            let mut s = self.inner_mut();
            let changed = element_pos != s.trigger_pos;
            s.trigger_pos = element_pos;
            changed
        };
        if changed && !suppress_events {
            self.emit(
                SceneEventKind::Shift,
                ScenePayload::Shift {
                    reason: ShiftReason::TriggerElementPosition,
                },
            );
        }
    }

    fn update_scroll_offset(&self) {
        let size = self.controller().map(|c| c.info().size);
        let mut s = self.inner_mut();
        let mut start = s.trigger_pos + s.offset;
        if let (Some(size), Some(_)) = (size, s.trigger_element) {
            start -= size * s.trigger_hook.value();
        }
        s.scroll_offset = ScrollOffset {
            start,
            end: start + s.duration,
        };
    }

    fn on_container_resize(&self) {
        if self.trigger_hook().value() > 0.0 {
            self.emit(
                SceneEventKind::Shift,
                ScenePayload::Shift {
                    reason: ShiftReason::ContainerResize,
                },
            );
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Attach to `controller`, detaching from any previous one
    ///
    /// Attaching to the current controller again does nothing.
    pub fn add_to(&self, controller: &Controller) -> &Self {
        let current = self.controller();
        if current.as_ref() == Some(controller) {
            return self;
        }
        if let Some(previous) = current {
            previous.remove_scene(self);
        }

        self.inner_mut().controller = Some(controller.downgrade());
        self.revalidate();
        self.update_duration(true);
        self.update_trigger_element_position(true);
        self.update_scroll_offset();

        let weak = self.downgrade();
        let listener = self.dom().add_listener(
            controller.info().container,
            NativeEvent::Resize,
            Rc::new(move || {
                if let Some(scene) = weak.upgrade() {
                    scene.on_container_resize();
                }
            }),
        );
        self.inner_mut().container_listener = Some(listener);

        controller.add_scene(self);
        self.emit(
            SceneEventKind::Add,
            ScenePayload::Add {
                controller: controller.clone(),
            },
        );
        log_at!(self.loglevel(), LogLevel::Debug, "added scene to controller");
        self.update(false);
        self
    }

    /// Detach from the controller; pins and class toggles stay as they are
    pub fn remove(&self) -> &Self {
        let (controller, listener) = {
            let mut s = self.inner_mut();
            (s.controller.take(), s.container_listener.take())
        };
        let Some(controller) = controller else {
            return self;
        };
        if let Some(listener) = listener {
            self.dom().remove_listener(listener);
        }
        if let Some(controller) = controller.upgrade() {
            controller.remove_scene(self);
        }
        self.emit(SceneEventKind::Remove, ScenePayload::None);
        log_at!(self.loglevel(), LogLevel::Debug, "removed scene from controller");
        self
    }

    /// Detach, tear down pin and class toggle and drop every listener
    ///
    /// With `reset` the pinned element and toggled classes are restored.
    pub fn destroy(&self, reset: bool) {
        self.emit(SceneEventKind::Destroy, ScenePayload::Destroy { reset });
        self.remove();
        self.shared.events.borrow_mut().clear();
        log_at!(
            self.loglevel(),
            LogLevel::Debug,
            "destroyed scene (reset: {})",
            reset
        );
    }

    /// Recompute progress from the controller's scroll position
    ///
    /// Without `immediate` the update is queued for the controller's next
    /// frame instead.
    pub fn update(&self, immediate: bool) -> &Self {
        let Some(controller) = self.controller() else {
            return self;
        };
        if !immediate {
            controller.update_scene(self, false);
            return self;
        }

        let (enabled, state, offsets, duration) = {
            let s = self.inner();
            (s.enabled, s.state, s.scroll_offset, s.duration)
        };
        if controller.enabled() && enabled {
            let scroll_pos = controller.info().scroll_pos;
            let progress = if duration > 0.0 {
                (scroll_pos - offsets.start) / (offsets.end - offsets.start)
            } else if scroll_pos >= offsets.start {
                1.0
            } else {
                0.0
            };
            self.emit(
                SceneEventKind::Update,
                ScenePayload::Update {
                    start_pos: offsets.start,
                    end_pos: offsets.end,
                    scroll_pos,
                },
            );
            self.set_progress(progress);
        } else if self.has_pin() && state == SceneState::During {
            self.update_pin_state(true);
        }
        self
    }

    /// Re-measure a dynamic duration and the trigger element position
    pub fn refresh(&self) -> &Self {
        self.update_duration(false);
        self.update_trigger_element_position(false);
        self
    }

    /// Drive the state machine to `progress`
    ///
    /// Fires `enter`/`start`/`end`/`leave` around `progress` as boundaries are
    /// crossed. With reverse disabled, backward motion inside the window is
    /// ignored.
    pub fn set_progress(&self, progress: f64) -> &Self {
        let scroll_direction = self
            .controller()
            .map_or(ScrollDirection::Paused, |c| c.info().scroll_direction);

        let (updated, old_state, new_state, new_progress, resync_pin) = {
            let mut s = self.inner_mut();
            let old_state = s.state;
            let reverse_or_forward = s.reverse || progress >= s.progress;
            let mut updated = false;
            let mut resync_pin = false;

            if s.duration == 0.0 {
                updated = s.progress != progress;
                s.progress = if progress < 1.0 && reverse_or_forward { 0.0 } else { 1.0 };
                s.state = if s.progress == 0.0 {
                    SceneState::Before
                } else {
                    SceneState::During
                };
            } else if progress < 0.0 && s.state != SceneState::Before && reverse_or_forward {
                s.progress = 0.0;
                s.state = SceneState::Before;
                updated = true;
            } else if (0.0..1.0).contains(&progress) && reverse_or_forward {
                s.progress = progress;
                s.state = SceneState::During;
                updated = true;
            } else if progress >= 1.0 && s.state != SceneState::After {
                s.progress = 1.0;
                s.state = SceneState::After;
                updated = true;
            } else if s.state == SceneState::During && !reverse_or_forward {
                resync_pin = true;
            }
            (updated, old_state, s.state, s.progress, resync_pin)
        };

        if resync_pin {
            self.update_pin_state(false);
        }
        if !updated {
            return self;
        }

        let payload = ScenePayload::Progress {
            progress: new_progress,
            state: new_state,
            scroll_direction,
        };
        let state_changed = new_state != old_state;
        if state_changed && old_state != SceneState::During {
            self.emit(SceneEventKind::Enter, payload.clone());
            let boundary = if old_state == SceneState::Before {
                SceneEventKind::Start
            } else {
                SceneEventKind::End
            };
            self.emit(boundary, payload.clone());
        }
        self.emit(SceneEventKind::Progress, payload.clone());
        if state_changed && new_state != SceneState::During {
            let boundary = if new_state == SceneState::Before {
                SceneEventKind::Start
            } else {
                SceneEventKind::End
            };
            self.emit(boundary, payload.clone());
            self.emit(SceneEventKind::Leave, payload);
        }
        self
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Listen to a space separated list of `event` or `event.namespace` names
    ///
    /// Returns `None` (and logs) when a name is invalid; `*` is not a valid
    /// event to listen to.
    pub fn on<F>(&self, names: &str, callback: F) -> Option<SubscriptionId>
    where
        F: Fn(&SceneEvent) + 'static,
    {
        let parsed = match parse_names::<SceneEventKind>(names, false) {
            Ok(parsed) => parsed,
            Err(err) => {
                log_at!(self.loglevel(), LogLevel::Error, "{}", err);
                return None;
            }
        };
        let targets: Vec<(SceneEventKind, Namespace)> = parsed
            .into_iter()
            .filter_map(|(kind, namespace)| match (kind, namespace) {
                (KindFilter::Only(kind), NamespaceFilter::Exact(ns)) => Some((kind, ns)),
                _ => None,
            })
            .collect();
        Some(self.subscribe(targets, Rc::new(callback)))
    }

    /// Listen to one event kind without a namespace
    pub fn on_kind<F>(&self, kind: SceneEventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&SceneEvent) + 'static,
    {
        self.subscribe([(kind, Namespace::None)], Rc::new(callback))
    }

    pub(crate) fn subscribe(
        &self,
        targets: impl IntoIterator<Item = (SceneEventKind, Namespace)>,
        callback: EventCallback<SceneEvent>,
    ) -> SubscriptionId {
        self.shared.events.borrow_mut().subscribe(targets, callback)
    }

    /// Remove listeners by name; `*` matches any event or namespace
    pub fn off(&self, names: &str) -> usize {
        self.off_matching(names, None)
    }

    /// Remove one subscription from the named events
    pub fn off_subscription(&self, names: &str, id: SubscriptionId) -> usize {
        self.off_matching(names, Some(id))
    }

    fn off_matching(&self, names: &str, id: Option<SubscriptionId>) -> usize {
        let parsed = match parse_names::<SceneEventKind>(names, true) {
            Ok(parsed) => parsed,
            Err(err) => {
                log_at!(self.loglevel(), LogLevel::Error, "{}", err);
                return 0;
            }
        };
        let mut events = self.shared.events.borrow_mut();
        parsed
            .into_iter()
            .map(|(kind, namespace)| events.unsubscribe(kind, &namespace, id))
            .sum()
    }

    pub(crate) fn off_namespace(&self, kind: SceneEventKind, namespace: Namespace) {
        self.shared.events.borrow_mut().unsubscribe(
            KindFilter::Only(kind),
            &NamespaceFilter::Exact(namespace),
            None,
        );
    }

    pub(crate) fn off_id(&self, id: SubscriptionId) {
        self.shared
            .events
            .borrow_mut()
            .unsubscribe(KindFilter::Any, &NamespaceFilter::Any, Some(id));
    }

    /// Number of listeners for `kind`
    pub fn listener_count(&self, kind: SceneEventKind) -> usize {
        self.shared.events.borrow().count(kind)
    }

    /// Fire `kind`: built-in reactions first, then every listener
    pub fn trigger(&self, kind: SceneEventKind, payload: ScenePayload) -> &Self {
        self.emit(kind, payload);
        self
    }

    /// Fire `kind` to the listeners of one namespace only
    pub fn trigger_namespaced(
        &self,
        kind: SceneEventKind,
        namespace: &Namespace,
        payload: ScenePayload,
    ) -> &Self {
        self.dispatch(kind, Some(namespace), payload);
        self
    }

    fn emit(&self, kind: SceneEventKind, payload: ScenePayload) {
        self.react(kind, &payload);
        self.dispatch(kind, None, payload);
    }

    fn dispatch(&self, kind: SceneEventKind, namespace: Option<&Namespace>, payload: ScenePayload) {
        let recipients = self.shared.events.borrow().recipients(kind, namespace);
        if recipients.is_empty() {
            return;
        }
        let timestamp = self.stage().now();
        for (namespace, callback) in recipients {
            let event = SceneEvent {
                kind,
                namespace,
                target: self.clone(),
                timestamp,
                payload: payload.clone(),
            };
            callback(&event);
        }
    }

    /// Built-in reactions, run before listeners
    fn react(&self, kind: SceneEventKind, payload: &ScenePayload) {
        match (kind, payload) {
            (SceneEventKind::Change, ScenePayload::Change { what }) => match what {
                SceneOption::TriggerElement => self.update_trigger_element_position(false),
                SceneOption::Reverse => {
                    self.update(false);
                }
                _ => {}
            },
            (SceneEventKind::Shift, payload) => {
                self.update_scroll_offset();
                self.update(false);
                if let ScenePayload::Shift { reason } = payload {
                    self.pin_on_shift(reason);
                }
            }
            (SceneEventKind::Progress, _) => self.update_pin_state(false),
            (SceneEventKind::Add, _) => self.update_pin_dimensions(),
            (SceneEventKind::Destroy, payload) => {
                let reset = matches!(payload, ScenePayload::Destroy { reset: true });
                self.remove_pin(reset);
                self.remove_class_toggle(reset);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::events::EventKind;
    use crate::options::{ControllerOptions, CustomOption};
    use crate::testing::{fixture, Fixture};
    use scrollscene_host::{Container, Dom, Point, Rect};

    fn record(scene: &Scene, names: &str) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        scene.on(names, move |e| {
            let entry = match &e.payload {
                ScenePayload::Progress { progress, .. } if e.kind == SceneEventKind::Progress => {
                    format!("progress({})", progress)
                }
                _ => e.kind.name().to_string(),
            };
            l.borrow_mut().push(entry);
        });
        log
    }

    const LIFECYCLE: &str = "enter start progress end leave";

    #[test]
    fn test_forward_and_reverse_event_order() {
        let Fixture { stage, .. } = fixture();
        let scene = Scene::new(&stage, SceneOptions::new().duration(100.0));
        let log = record(&scene, LIFECYCLE);

        for p in [-0.5, 0.0, 0.5, 1.0, 1.5] {
            scene.set_progress(p);
        }
        assert_eq!(
            *log.borrow(),
            vec!["enter", "start", "progress(0)", "progress(0.5)", "progress(1)", "end", "leave"]
        );
        assert_eq!(scene.state(), SceneState::After);

        log.borrow_mut().clear();
        for p in [0.99, 0.5, -0.1] {
            scene.set_progress(p);
        }
        assert_eq!(
            *log.borrow(),
            vec!["enter", "end", "progress(0.99)", "progress(0.5)", "progress(0)", "start", "leave"]
        );
        assert_eq!(scene.state(), SceneState::Before);
        assert_eq!(scene.progress(), 0.0);
    }

    #[test]
    fn test_jump_across_whole_window() {
        let Fixture { stage, .. } = fixture();
        let scene = Scene::new(&stage, SceneOptions::new().duration(100.0));
        let log = record(&scene, LIFECYCLE);

        scene.set_progress(3.0);
        assert_eq!(*log.borrow(), vec!["enter", "start", "progress(1)", "end", "leave"]);
    }

    #[test]
    fn test_zero_duration_collapse() {
        let Fixture { stage, .. } = fixture();
        let scene = Scene::new(&stage, SceneOptions::new());
        let log = record(&scene, LIFECYCLE);

        scene.set_progress(0.5);
        assert_eq!(scene.state(), SceneState::Before);
        assert_eq!(scene.progress(), 0.0);

        scene.set_progress(1.0);
        assert_eq!(scene.state(), SceneState::During);
        assert_eq!(scene.progress(), 1.0);

        scene.set_progress(0.3);
        assert_eq!(scene.state(), SceneState::Before);
        assert!(!log.borrow().iter().any(|e| e == "end"));
        assert_eq!(
            *log.borrow(),
            vec![
                "progress(0)",
                "enter",
                "start",
                "progress(1)",
                "progress(0)",
                "start",
                "leave"
            ]
        );
    }

    #[test]
    fn test_zero_duration_without_reverse_stays_during() {
        let Fixture { stage, .. } = fixture();
        let scene = Scene::new(&stage, SceneOptions::new().reverse(false));
        scene.set_progress(1.0);
        scene.set_progress(0.2);
        assert_eq!(scene.state(), SceneState::During);
        assert_eq!(scene.progress(), 1.0);
    }

    #[test]
    fn test_reverse_disabled_holds_progress() {
        let Fixture { stage, .. } = fixture();
        let scene = Scene::new(&stage, SceneOptions::new().duration(100.0).reverse(false));
        let log = record(&scene, LIFECYCLE);

        scene.set_progress(0.5);
        log.borrow_mut().clear();
        scene.set_progress(0.2);
        scene.set_progress(-1.0);
        assert!(log.borrow().is_empty());
        assert_eq!(scene.state(), SceneState::During);
        assert_eq!(scene.progress(), 0.5);

        scene.set_progress(2.0);
        assert_eq!(scene.state(), SceneState::After);
    }

    #[test]
    fn test_state_machine_totality() {
        let Fixture { stage, .. } = fixture();
        for reverse in [true, false] {
            for duration in [0.0, 100.0] {
                let scene = Scene::new(
                    &stage,
                    SceneOptions::new().duration(duration).reverse(reverse),
                );
                for p in [-1.0, 0.0, 0.3, 0.99, 1.0, 2.0, 0.5, -0.5, 1.0, 0.0] {
                    scene.set_progress(p);
                    let (state, progress) = (scene.state(), scene.progress());
                    match state {
                        SceneState::Before => assert_eq!(progress, 0.0),
                        SceneState::After => assert_eq!(progress, 1.0),
                        SceneState::During => assert!((0.0..=1.0).contains(&progress)),
                    }
                }
            }
        }
    }

    #[test]
    fn test_invalid_options_reset_to_defaults() {
        let Fixture { stage, .. } = fixture();
        let scene = Scene::new(
            &stage,
            SceneOptions::new()
                .duration(-5.0)
                .offset(f64::NAN)
                .trigger_hook(f64::NAN)
                .trigger_element("#missing"),
        );
        assert_eq!(scene.duration(), 0.0);
        assert_eq!(scene.offset(), 0.0);
        assert_eq!(scene.trigger_hook(), TriggerHook::OnCenter);
        assert_eq!(scene.trigger_element(), None);

        scene.set_trigger_hook(4.0);
        assert_eq!(scene.trigger_hook().value(), 1.0);
    }

    #[test]
    fn test_computed_duration_failure_drops_function() {
        let Fixture { stage, .. } = fixture();
        let scene = Scene::new(&stage, SceneOptions::new().duration(100.0));
        scene.set_duration(SceneDuration::computed(|_| f64::NAN));
        assert_eq!(scene.duration(), 0.0);
        assert!(!scene.duration_option().is_dynamic());
    }

    #[test]
    fn test_change_and_shift_events() {
        let Fixture { stage, .. } = fixture();
        let scene = Scene::new(&stage, SceneOptions::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        scene.on("change shift", move |e| {
            let entry = match &e.payload {
                ScenePayload::Change { what } => format!("change:{}", what),
                ScenePayload::Shift { reason } => format!("shift:{}", reason),
                _ => String::new(),
            };
            s.borrow_mut().push(entry);
        });

        scene.set_offset(40.0);
        scene.set_offset(40.0);
        scene.set_reverse(false);
        assert_eq!(
            *seen.borrow(),
            vec!["change:offset", "shift:offset", "change:reverse"]
        );
        assert_eq!(scene.scroll_offset().start, 40.0);
    }

    #[test]
    fn test_on_rejects_wildcard_and_off_namespaces() {
        let Fixture { stage, .. } = fixture();
        let scene = Scene::new(&stage, SceneOptions::new());
        assert!(scene.on("*", |_| {}).is_none());

        scene.on("enter", |_| {});
        scene.on("enter.mine", |_| {});
        assert_eq!(scene.off("enter"), 1);
        assert_eq!(scene.listener_count(SceneEventKind::Enter), 1);
        assert_eq!(scene.off("enter.*"), 1);
        assert_eq!(scene.listener_count(SceneEventKind::Enter), 0);
    }

    #[test]
    fn test_custom_option_shift() {
        let fx = crate::testing::fixture_with(|builder| {
            builder.option("lag", CustomOption::new(0.0).shifts(true))
        });
        let scene = Scene::new(&fx.stage, SceneOptions::new().custom("lag", 2.0));
        assert_eq!(scene.option("lag"), Some(OptionValue::Number(2.0)));

        let shifts = record(&scene, "shift");
        scene.set_option("lag", 3.0);
        scene.set_option("unknown", 1.0);
        assert_eq!(*shifts.borrow(), vec!["shift"]);
        assert_eq!(scene.option("unknown"), None);
    }

    #[test]
    fn test_trigger_element_scenario_arithmetic() {
        let Fixture { doc, scheduler, stage } = fixture();
        let el = doc.create_in_body("div", Rect::new(0.0, 0.0, 1024.0, 50.0));
        let controller = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let scene = Scene::new(
            &stage,
            SceneOptions::new()
                .duration(300.0)
                .trigger_hook("onCenter".parse::<TriggerHook>().unwrap())
                .trigger_element(el),
        );
        scene.add_to(&controller);
        scheduler.run_frame();

        assert_eq!(scene.scroll_offset(), ScrollOffset { start: -400.0, end: -100.0 });
        assert_eq!(scene.state(), SceneState::After);
        assert_eq!(scene.progress(), 1.0);
        assert_eq!(scene.trigger_position(), 0.0);
    }

    #[test]
    fn test_offset_stable_across_refresh() {
        let Fixture { doc, scheduler, stage } = fixture();
        let el = doc.create_in_body("div", Rect::new(0.0, 1500.0, 1024.0, 50.0));
        let controller = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let scene = Scene::new(&stage, SceneOptions::new().duration(100.0).trigger_element(el));
        scene.add_to(&controller);
        let shifts = record(&scene, "shift");

        let start = scene.scroll_offset().start;
        assert_eq!(start, 1100.0);
        scheduler.advance(1000.0);
        scene.refresh();
        assert_eq!(scene.scroll_offset().start, start);
        assert!(shifts.borrow().is_empty());

        doc.set_frame(el, Rect::new(0.0, 1600.0, 1024.0, 50.0));
        scheduler.advance(100.0);
        assert_eq!(*shifts.borrow(), vec!["shift"]);
        assert_eq!(scene.scroll_offset().start, 1200.0);
    }

    #[test]
    fn test_percent_duration_re_resolves() {
        let Fixture { doc, scheduler, stage } = fixture();
        let controller = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let scene = Scene::new(
            &stage,
            SceneOptions::new().duration("50%".parse::<SceneDuration>().unwrap()),
        );
        assert_eq!(scene.duration(), 0.0);
        scene.add_to(&controller);
        assert_eq!(scene.duration(), 400.0);

        let changes = record(&scene, "change");
        doc.set_viewport(scrollscene_host::Size::new(1024.0, 600.0));
        scheduler.advance(100.0);
        assert_eq!(scene.duration(), 300.0);
        assert_eq!(*changes.borrow(), vec!["change"]);
        assert_eq!(scene.scroll_offset().end - scene.scroll_offset().start, 300.0);
    }

    #[test]
    fn test_detached_trigger_element_resets() {
        let Fixture { doc, stage, .. } = fixture();
        let el = doc.create_in_body("div", Rect::new(0.0, 900.0, 100.0, 50.0));
        let controller = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let scene = Scene::new(&stage, SceneOptions::new().trigger_element(el));
        scene.add_to(&controller);
        assert_eq!(scene.trigger_position(), 900.0);

        let body = doc.body().unwrap();
        doc.remove_child(body, el);
        scene.refresh();
        assert_eq!(scene.trigger_element(), None);
        assert_eq!(scene.trigger_position(), 400.0);
    }

    #[test]
    fn test_idempotent_attach_and_reattach() {
        let Fixture { stage, .. } = fixture();
        let a = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let b = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let scene = Scene::new(&stage, SceneOptions::new());
        let log = record(&scene, "add remove");

        scene.add_to(&a);
        scene.add_to(&a);
        a.add_scene(&scene);
        assert_eq!(a.scenes().len(), 1);
        assert_eq!(*log.borrow(), vec!["add"]);

        scene.add_to(&b);
        assert!(a.scenes().is_empty());
        assert_eq!(b.scenes(), vec![scene.clone()]);
        assert_eq!(*log.borrow(), vec!["add", "remove", "add"]);
        assert_eq!(scene.controller(), Some(b));
    }

    #[test]
    fn test_destroy_clears_listeners_and_detaches() {
        let Fixture { doc, stage, .. } = fixture();
        let controller = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let scene = Scene::new(&stage, SceneOptions::new().duration(10.0));
        scene.add_to(&controller);
        let log = record(&scene, "destroy remove");
        scene.on("progress.mine", |_| {});

        scene.destroy(false);
        assert_eq!(*log.borrow(), vec!["destroy", "remove"]);
        assert!(scene.controller().is_none());
        assert_eq!(scene.listener_count(SceneEventKind::Progress), 0);
        // only the controller's own scroll and resize listeners remain
        assert_eq!(doc.listener_count(), 2);
    }

    #[test]
    fn test_disabled_scene_ignores_scroll() {
        let Fixture { doc, scheduler, stage } = fixture();
        let controller = Controller::new(&stage, ControllerOptions::new()).unwrap();
        let scene = Scene::new(&stage, SceneOptions::new().duration(100.0).offset(100.0));
        scene.add_to(&controller);
        scheduler.run_frame();

        scene.set_enabled(false);
        doc.set_scroll_offset(Container::Window, Point::new(0.0, 150.0));
        scheduler.run_frame();
        assert_eq!(scene.state(), SceneState::Before);

        scene.set_enabled(true);
        assert_eq!(scene.state(), SceneState::During);
        assert_eq!(scene.progress(), 0.5);
    }
}
