//! Engine context
//!
//! A [`Stage`] bundles everything scenes and controllers share: the host
//! document, the frame scheduler, the option registry and the plugins. It is
//! built once and handed to every scene and controller by `Rc`.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use scrollscene_core::{CustomOption, Stage};
//! use scrollscene_host::{Document, ManualScheduler, Size};
//!
//! let stage = Stage::builder(
//!     Rc::new(Document::new(Size::new(1024.0, 800.0))),
//!     Rc::new(ManualScheduler::new()),
//! )
//! .option("speed", CustomOption::new(1.0).shifts(true))
//! .build();
//!
//! assert!(stage.registry().custom("speed").is_some());
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use scrollscene_host::{Dom, ElementId, FrameScheduler};

use crate::options::{CustomOption, OptionRegistry, SceneDefaults};
use crate::plugin::Plugin;

/// Shared engine context
pub struct Stage {
    dom: Rc<dyn Dom>,
    scheduler: Rc<dyn FrameScheduler>,
    registry: OptionRegistry,
    plugins: Vec<Rc<dyn Plugin>>,
    /// Inline style of pinned elements before their first pin
    pin_styles: RefCell<FxHashMap<ElementId, IndexMap<String, String>>>,
}

impl Stage {
    /// Start building a stage over a host document and scheduler
    pub fn builder(dom: Rc<dyn Dom>, scheduler: Rc<dyn FrameScheduler>) -> StageBuilder {
        StageBuilder {
            dom,
            scheduler,
            registry: OptionRegistry::default(),
            plugins: Vec::new(),
        }
    }

    /// A stage with default options and no plugins
    pub fn new(dom: Rc<dyn Dom>, scheduler: Rc<dyn FrameScheduler>) -> Rc<Self> {
        Self::builder(dom, scheduler).build()
    }

    pub fn dom(&self) -> &dyn Dom {
        &*self.dom
    }

    pub(crate) fn dom_rc(&self) -> Rc<dyn Dom> {
        self.dom.clone()
    }

    pub fn scheduler(&self) -> &dyn FrameScheduler {
        &*self.scheduler
    }

    pub fn registry(&self) -> &OptionRegistry {
        &self.registry
    }

    pub fn plugins(&self) -> &[Rc<dyn Plugin>] {
        &self.plugins
    }

    /// Current scheduler time, used for event timestamps
    pub(crate) fn now(&self) -> f64 {
        self.scheduler.now_ms()
    }

    /// Remember `element`'s inline style unless a pin already did
    pub(crate) fn remember_pin_style(
        &self,
        element: ElementId,
        capture: impl FnOnce() -> IndexMap<String, String>,
    ) {
        let mut styles = self.pin_styles.borrow_mut();
        styles.entry(element).or_insert_with(capture);
    }

    /// Take back the style remembered for `element`
    pub(crate) fn take_pin_style(&self, element: ElementId) -> Option<IndexMap<String, String>> {
        self.pin_styles.borrow_mut().remove(&element)
    }

    #[cfg(test)]
    pub(crate) fn has_pin_style(&self, element: ElementId) -> bool {
        self.pin_styles.borrow().contains_key(&element)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("registry", &self.registry)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Builder for [`Stage`]
pub struct StageBuilder {
    dom: Rc<dyn Dom>,
    scheduler: Rc<dyn FrameScheduler>,
    registry: OptionRegistry,
    plugins: Vec<Rc<dyn Plugin>>,
}

impl StageBuilder {
    /// Replace the built-in scene defaults
    pub fn defaults(mut self, defaults: SceneDefaults) -> Self {
        let custom: Vec<_> = self
            .registry
            .custom_options()
            .map(|(name, option)| (name.clone(), option.clone()))
            .collect();
        self.registry = OptionRegistry::new(defaults);
        for (name, option) in custom {
            let _ = self.registry.add_option(&name, option);
        }
        self
    }

    /// Register a custom scene option
    ///
    /// Built-in and duplicate names are rejected with an error log.
    pub fn option(mut self, name: &str, option: CustomOption) -> Self {
        if let Err(err) = self.registry.add_option(name, option) {
            tracing::error!("{}", err);
        }
        self
    }

    /// Register a plugin
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Rc::new(plugin));
        self
    }

    pub fn build(self) -> Rc<Stage> {
        Rc::new(Stage {
            dom: self.dom,
            scheduler: self.scheduler,
            registry: self.registry,
            plugins: self.plugins,
            pin_styles: RefCell::new(FxHashMap::default()),
        })
    }
}
