//! Class toggles
//!
//! Adds classes to one or more elements on `enter` and removes them on
//! `leave`, through an ordinary namespaced subscription on the scene's bus.

use std::rc::Rc;

use scrollscene_host::ElementId;

use super::Scene;
use crate::error::StageError;
use crate::events::{Namespace, SceneEvent, SceneEventKind, SubscriptionId};
use crate::log::LogLevel;
use crate::log_at;
use crate::options::ElementRef;

pub(super) struct ClassToggle {
    elements: Rc<[ElementId]>,
    classes: Rc<str>,
    subscription: SubscriptionId,
}

impl Scene {
    /// Add `classes` (space separated) to `target` while the scene is active
    ///
    /// Replaces any previous toggle on this scene.
    pub fn set_class_toggle(&self, target: impl Into<ElementRef>, classes: &str) -> &Self {
        let target = target.into();
        let elements = target.resolve_all(self.dom());
        let classes = classes.split_whitespace().collect::<Vec<_>>().join(" ");
        if elements.is_empty() || classes.is_empty() {
            let reason = if elements.is_empty() {
                format!("no elements match \"{}\"", target)
            } else {
                "no classes given".to_string()
            };
            let err = StageError::invalid_argument("set_class_toggle", reason);
            log_at!(self.loglevel(), LogLevel::Error, "{}", err);
            return self;
        }
        if self.inner().class_toggle.is_some() {
            log_at!(
                self.loglevel(),
                LogLevel::Warn,
                "class toggle already set, replacing it"
            );
            self.remove_class_toggle(false);
        }

        let elements: Rc<[ElementId]> = elements.into();
        let classes: Rc<str> = classes.into();
        let dom = self.stage().dom_rc();
        let subscription = {
            let (elements, classes) = (elements.clone(), classes.clone());
            self.subscribe(
                [
                    (SceneEventKind::Enter, Namespace::ClassToggle),
                    (SceneEventKind::Leave, Namespace::ClassToggle),
                ],
                Rc::new(move |event: &SceneEvent| {
                    for &element in elements.iter() {
                        if event.kind == SceneEventKind::Enter {
                            dom.add_class(element, &classes);
                        } else {
                            dom.remove_class(element, &classes);
                        }
                    }
                }),
            )
        };
        self.inner_mut().class_toggle = Some(ClassToggle {
            elements,
            classes,
            subscription,
        });
        log_at!(self.loglevel(), LogLevel::Debug, "added class toggle");
        self
    }

    /// Stop toggling; with `reset` the classes are removed right away
    pub fn remove_class_toggle(&self, reset: bool) -> &Self {
        let Some(toggle) = self.inner_mut().class_toggle.take() else {
            return self;
        };
        if reset {
            let dom = self.dom();
            for &element in toggle.elements.iter() {
                dom.remove_class(element, &toggle.classes);
            }
        }
        self.off_id(toggle.subscription);
        log_at!(self.loglevel(), LogLevel::Debug, "removed class toggle");
        self
    }
}
