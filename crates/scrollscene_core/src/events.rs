//! Namespaced publish/subscribe
//!
//! Each scene and controller owns an [`EventBus`]. Listeners subscribe to an
//! event kind under an optional [`Namespace`]; removal can target a kind, a
//! namespace, a single subscription, or any combination with wildcards.
//!
//! # Architecture
//!
//! ```text
//! scene.on("enter leave.myapp", |e| ...)
//!     ↓ parse_names()
//! (SceneEventKind, Namespace) pairs
//!     ↓ EventBus::subscribe
//! listeners[kind] = [Subscription { id, namespace, callback }, ...]
//!     ↓ Scene::trigger / Controller internals
//! recipients() snapshot → callback(&event) in registration order
//! ```
//!
//! Dispatch takes a snapshot of the recipients first, so a listener that
//! subscribes or unsubscribes during dispatch affects the next dispatch only.

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::controller::{Controller, ScrollDirection};
use crate::error::{Result, StageError};
use crate::options::SceneOption;
use crate::scene::{Scene, SceneState};

/// Callback invoked with the dispatched event. Single-threaded, so `Rc`.
pub type EventCallback<E> = Rc<dyn Fn(&E)>;

// ============================================================================
// Event Kinds
// ============================================================================

/// A closed set of event names
pub trait EventKind: Copy + Eq + Hash + fmt::Debug + 'static {
    /// Every kind, in declaration order
    const ALL: &'static [Self];

    /// Wire name, e.g. `"progress"`
    fn name(&self) -> &'static str;

    /// Look a kind up by its wire name
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

/// Events emitted by a [`Scene`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SceneEventKind {
    /// An option changed
    Change,
    /// The scroll window moved (start/end recomputed)
    Shift,
    /// Progress changed
    Progress,
    /// Entered the DURING state
    Enter,
    /// Crossed the start boundary
    Start,
    /// Crossed the end boundary
    End,
    /// Left the DURING state
    Leave,
    /// Immediate update with fresh offsets, before progress
    Update,
    /// Attached to a controller
    Add,
    /// Detached from a controller
    Remove,
    /// About to be destroyed
    Destroy,
}

impl EventKind for SceneEventKind {
    const ALL: &'static [Self] = &[
        SceneEventKind::Change,
        SceneEventKind::Shift,
        SceneEventKind::Progress,
        SceneEventKind::Enter,
        SceneEventKind::Start,
        SceneEventKind::End,
        SceneEventKind::Leave,
        SceneEventKind::Update,
        SceneEventKind::Add,
        SceneEventKind::Remove,
        SceneEventKind::Destroy,
    ];

    fn name(&self) -> &'static str {
        match self {
            SceneEventKind::Change => "change",
            SceneEventKind::Shift => "shift",
            SceneEventKind::Progress => "progress",
            SceneEventKind::Enter => "enter",
            SceneEventKind::Start => "start",
            SceneEventKind::End => "end",
            SceneEventKind::Leave => "leave",
            SceneEventKind::Update => "update",
            SceneEventKind::Add => "add",
            SceneEventKind::Remove => "remove",
            SceneEventKind::Destroy => "destroy",
        }
    }
}

/// Events emitted by a [`Controller`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControllerEventKind {
    /// A frame pass updated the queued scenes
    Update,
    /// The container resized (viewport size re-measured)
    Resize,
    /// The controller was destroyed
    Destroy,
}

impl EventKind for ControllerEventKind {
    const ALL: &'static [Self] = &[
        ControllerEventKind::Update,
        ControllerEventKind::Resize,
        ControllerEventKind::Destroy,
    ];

    fn name(&self) -> &'static str {
        match self {
            ControllerEventKind::Update => "update",
            ControllerEventKind::Resize => "resize",
            ControllerEventKind::Destroy => "destroy",
        }
    }
}

macro_rules! impl_kind_display {
    ($($kind:ty),*) => {
        $(impl fmt::Display for $kind {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        })*
    };
}

impl_kind_display!(SceneEventKind, ControllerEventKind);

// ============================================================================
// Namespaces
// ============================================================================

/// Owner tag of a subscription
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// No namespace (`"progress"`)
    #[default]
    None,
    /// The controller's re-sort subscription on `shift`
    ControllerSort,
    /// The class toggle's `enter`/`leave` subscriptions
    ClassToggle,
    /// Any other tag (`"progress.myapp"`)
    Custom(Rc<str>),
}

impl Namespace {
    pub fn parse(name: &str) -> Self {
        match name {
            "" => Namespace::None,
            "controller_sort" => Namespace::ControllerSort,
            "class_toggle" => Namespace::ClassToggle,
            other => Namespace::Custom(Rc::from(other)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Namespace::None => "",
            Namespace::ControllerSort => "controller_sort",
            Namespace::ClassToggle => "class_toggle",
            Namespace::Custom(name) => name,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which event kinds a removal applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindFilter<K> {
    Any,
    Only(K),
}

/// Which namespaces a removal applies to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NamespaceFilter {
    Any,
    Exact(Namespace),
}

impl NamespaceFilter {
    fn matches(&self, namespace: &Namespace) -> bool {
        match self {
            NamespaceFilter::Any => true,
            NamespaceFilter::Exact(ns) => ns == namespace,
        }
    }
}

/// Parse a space separated list of `event` / `event.namespace` names
///
/// `*` is accepted as the event or namespace only when `wildcards` is set
/// (removal). A bare namespace-less name selects [`Namespace::None`].
pub fn parse_names<K: EventKind>(
    names: &str,
    wildcards: bool,
) -> Result<Vec<(KindFilter<K>, NamespaceFilter)>> {
    let mut parsed = Vec::new();
    for full in names.split_whitespace() {
        let (event, namespace) = match full.split_once('.') {
            Some((event, namespace)) => (event, namespace),
            None => (full, ""),
        };
        let kind = match event {
            "*" if wildcards => KindFilter::Any,
            _ => KindFilter::Only(
                K::from_name(event).ok_or_else(|| StageError::InvalidEventName(full.to_string()))?,
            ),
        };
        let namespace = match namespace {
            "*" if wildcards => NamespaceFilter::Any,
            "*" => return Err(StageError::InvalidEventName(full.to_string())),
            ns => NamespaceFilter::Exact(Namespace::parse(ns)),
        };
        parsed.push((kind, namespace));
    }
    if parsed.is_empty() {
        return Err(StageError::InvalidEventName(names.to_string()));
    }
    Ok(parsed)
}

// ============================================================================
// Event Bus
// ============================================================================

/// Identity of one `on` call, shared by every name it subscribed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription<E> {
    id: SubscriptionId,
    namespace: Namespace,
    callback: EventCallback<E>,
}

/// Listener storage keyed by event kind
pub struct EventBus<K, E> {
    listeners: IndexMap<K, Vec<Subscription<E>>>,
    next_id: u64,
}

impl<K, E> Default for EventBus<K, E> {
    fn default() -> Self {
        Self {
            listeners: IndexMap::new(),
            next_id: 0,
        }
    }
}

impl<K: EventKind, E> EventBus<K, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one callback for several `(kind, namespace)` pairs
    pub fn subscribe(
        &mut self,
        targets: impl IntoIterator<Item = (K, Namespace)>,
        callback: EventCallback<E>,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        for (kind, namespace) in targets {
            self.listeners.entry(kind).or_default().push(Subscription {
                id,
                namespace,
                callback: callback.clone(),
            });
        }
        id
    }

    /// Remove matching subscriptions, returning how many were removed
    ///
    /// With `id` set only that subscription is considered.
    pub fn unsubscribe(
        &mut self,
        kind: KindFilter<K>,
        namespace: &NamespaceFilter,
        id: Option<SubscriptionId>,
    ) -> usize {
        let mut removed = 0;
        self.listeners.retain(|k, list| {
            if let KindFilter::Only(only) = kind {
                if *k != only {
                    return true;
                }
            }
            let before = list.len();
            list.retain(|s| !(namespace.matches(&s.namespace) && id.map_or(true, |id| id == s.id)));
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }

    /// Drop every subscription
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Callbacks that should receive `kind`, in registration order
    ///
    /// `namespace` restricts delivery to one namespace; `None` delivers to all.
    pub fn recipients(
        &self,
        kind: K,
        namespace: Option<&Namespace>,
    ) -> SmallVec<[(Namespace, EventCallback<E>); 4]> {
        self.listeners
            .get(&kind)
            .map(|list| {
                list.iter()
                    .filter(|s| namespace.map_or(true, |ns| ns == &s.namespace))
                    .map(|s| (s.namespace.clone(), s.callback.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of subscriptions for `kind`
    pub fn count(&self, kind: K) -> usize {
        self.listeners.get(&kind).map_or(0, |list| list.len())
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

// ============================================================================
// Event Values
// ============================================================================

/// Why a scene's scroll window moved
#[derive(Clone, Debug, PartialEq)]
pub enum ShiftReason {
    Duration,
    Offset,
    TriggerHook,
    TriggerElementPosition,
    ContainerResize,
    /// A registry option declared with `shifts`
    Option(Rc<str>),
}

impl fmt::Display for ShiftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShiftReason::Duration => f.write_str("duration"),
            ShiftReason::Offset => f.write_str("offset"),
            ShiftReason::TriggerHook => f.write_str("triggerHook"),
            ShiftReason::TriggerElementPosition => f.write_str("triggerElementPosition"),
            ShiftReason::ContainerResize => f.write_str("containerResize"),
            ShiftReason::Option(name) => f.write_str(name),
        }
    }
}

/// Extra data carried by a scene event
#[derive(Clone, Debug, PartialEq)]
pub enum ScenePayload {
    None,
    /// `enter`, `start`, `progress`, `end`, `leave`
    Progress {
        progress: f64,
        state: SceneState,
        scroll_direction: ScrollDirection,
    },
    /// `change`
    Change { what: SceneOption },
    /// `shift`
    Shift { reason: ShiftReason },
    /// `update`
    Update {
        start_pos: f64,
        end_pos: f64,
        scroll_pos: f64,
    },
    /// `add`
    Add { controller: Controller },
    /// `destroy`
    Destroy { reset: bool },
}

/// A dispatched scene event
#[derive(Clone, Debug)]
pub struct SceneEvent {
    pub kind: SceneEventKind,
    /// Namespace of the receiving subscription
    pub namespace: Namespace,
    pub target: Scene,
    /// Scheduler clock at dispatch, milliseconds
    pub timestamp: f64,
    pub payload: ScenePayload,
}

/// Extra data carried by a controller event
#[derive(Clone, Debug, PartialEq)]
pub enum ControllerPayload {
    None,
    Update {
        scroll_pos: f64,
        scroll_direction: ScrollDirection,
        scenes: usize,
    },
    Resize { size: f64 },
    Destroy { reset: bool },
}

/// A dispatched controller event
#[derive(Clone, Debug)]
pub struct ControllerEvent {
    pub kind: ControllerEventKind,
    pub namespace: Namespace,
    pub target: Controller,
    pub timestamp: f64,
    pub payload: ControllerPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Bus = EventBus<SceneEventKind, &'static str>;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, label: &'static str) -> EventCallback<&'static str> {
        let log = log.clone();
        Rc::new(move |payload: &&'static str| log.borrow_mut().push(format!("{}:{}", label, payload)))
    }

    fn deliver(bus: &Bus, kind: SceneEventKind, payload: &'static str) {
        for (_, callback) in bus.recipients(kind, None) {
            callback(&payload);
        }
    }

    #[test]
    fn test_parse_names() {
        let parsed = parse_names::<SceneEventKind>("enter leave.myapp", false).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, KindFilter::Only(SceneEventKind::Enter));
        assert_eq!(parsed[0].1, NamespaceFilter::Exact(Namespace::None));
        assert_eq!(
            parsed[1].1,
            NamespaceFilter::Exact(Namespace::Custom(Rc::from("myapp")))
        );

        assert!(parse_names::<SceneEventKind>("*", false).is_err());
        assert!(parse_names::<SceneEventKind>("bogus", false).is_err());
        assert!(parse_names::<SceneEventKind>("   ", false).is_err());
        let wild = parse_names::<SceneEventKind>("*.*", true).unwrap();
        assert_eq!(wild[0], (KindFilter::Any, NamespaceFilter::Any));
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = Bus::new();
        bus.subscribe([(SceneEventKind::Progress, Namespace::None)], recorder(&log, "a"));
        bus.subscribe(
            [(SceneEventKind::Progress, Namespace::parse("ns"))],
            recorder(&log, "b"),
        );
        deliver(&bus, SceneEventKind::Progress, "p");
        assert_eq!(*log.borrow(), vec!["a:p", "b:p"]);

        let only_ns = bus.recipients(SceneEventKind::Progress, Some(&Namespace::parse("ns")));
        assert_eq!(only_ns.len(), 1);
        assert_eq!(only_ns[0].0.as_str(), "ns");
    }

    #[test]
    fn test_off_without_namespace_keeps_namespaced() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = Bus::new();
        bus.subscribe([(SceneEventKind::Enter, Namespace::None)], recorder(&log, "plain"));
        bus.subscribe([(SceneEventKind::Enter, Namespace::ClassToggle)], recorder(&log, "toggle"));

        let removed = bus.unsubscribe(
            KindFilter::Only(SceneEventKind::Enter),
            &NamespaceFilter::Exact(Namespace::None),
            None,
        );
        assert_eq!(removed, 1);
        deliver(&bus, SceneEventKind::Enter, "e");
        assert_eq!(*log.borrow(), vec!["toggle:e"]);
    }

    #[test]
    fn test_wildcard_and_id_removal() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = Bus::new();
        let both = bus.subscribe(
            [
                (SceneEventKind::Enter, Namespace::None),
                (SceneEventKind::Leave, Namespace::None),
            ],
            recorder(&log, "both"),
        );
        bus.subscribe([(SceneEventKind::Leave, Namespace::None)], recorder(&log, "other"));

        assert_eq!(bus.unsubscribe(KindFilter::Any, &NamespaceFilter::Any, Some(both)), 2);
        assert_eq!(bus.count(SceneEventKind::Enter), 0);
        assert_eq!(bus.count(SceneEventKind::Leave), 1);

        bus.unsubscribe(KindFilter::Any, &NamespaceFilter::Any, None);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_snapshot_ignores_listeners_added_during_dispatch() {
        let bus = Rc::new(RefCell::new(Bus::new()));
        let hits = Rc::new(RefCell::new(0));
        let (b, h) = (bus.clone(), hits.clone());
        bus.borrow_mut().subscribe(
            [(SceneEventKind::Update, Namespace::None)],
            Rc::new(move |_: &&'static str| {
                *h.borrow_mut() += 1;
                let h2 = h.clone();
                b.borrow_mut().subscribe(
                    [(SceneEventKind::Update, Namespace::None)],
                    Rc::new(move |_: &&'static str| *h2.borrow_mut() += 10),
                );
            }),
        );

        let recipients = bus.borrow().recipients(SceneEventKind::Update, None);
        for (_, callback) in recipients {
            callback(&"u");
        }
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.borrow().count(SceneEventKind::Update), 2);
    }
}
