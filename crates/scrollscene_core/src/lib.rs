//! ScrollScene Engine
//!
//! Scroll-driven scenes on top of the host layer in `scrollscene_host`:
//!
//! - **Controller**: watches one scroll container, coalesces scroll and resize
//!   into a single frame, and keeps its scenes in trigger order
//! - **Scene**: a scroll window (`offset`, `duration`, trigger element and
//!   hook) with a `Before` / `During` / `After` state machine and progress
//! - **Pins**: fix an element in place while its scene is active, wrapped in a
//!   spacer that holds its layout slot
//! - **Class Toggles**: classes added on `enter` and removed on `leave`
//! - **Events**: namespaced listeners with `event.namespace` names
//! - **Plugins**: hooks for scene and controller creation and pin changes
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use scrollscene_core::{Controller, ControllerOptions, Scene, SceneOptions, SceneState, Stage};
//! use scrollscene_host::{Container, Document, Dom, ManualScheduler, Point, Size};
//!
//! let doc = Rc::new(Document::new(Size::new(1024.0, 800.0)));
//! let scheduler = Rc::new(ManualScheduler::new());
//! let stage = Stage::new(doc.clone(), scheduler.clone());
//!
//! let controller = Controller::new(&stage, ControllerOptions::new()).unwrap();
//! let scene = Scene::new(&stage, SceneOptions::new().offset(100.0).duration(200.0));
//! scene.add_to(&controller);
//!
//! let entered = Rc::new(Cell::new(false));
//! let flag = entered.clone();
//! scene.on("enter", move |_| flag.set(true));
//!
//! doc.set_scroll_offset(Container::Window, Point::new(0.0, 200.0));
//! scheduler.run_frame();
//!
//! assert!(entered.get());
//! assert_eq!(scene.state(), SceneState::During);
//! assert_eq!(scene.progress(), 0.5);
//! ```

pub mod controller;
pub mod error;
pub mod events;
pub mod log;
pub mod options;
pub mod plugin;
pub mod scene;
pub mod stage;

pub use controller::{
    Controller, ControllerInfo, InfoValue, ScrollDirection, ScrollPosFn, ScrollTarget, ScrollToFn,
};
pub use error::{Result, StageError};
pub use events::{
    ControllerEvent, ControllerEventKind, ControllerPayload, EventCallback, EventKind, Namespace,
    SceneEvent, SceneEventKind, ScenePayload, ShiftReason, SubscriptionId,
};
pub use log::LogLevel;
pub use options::{
    ContainerRef, ControllerOptions, CustomOption, DurationFn, ElementRef, OptionRegistry,
    OptionValidator, OptionValue, SceneDefaults, SceneDuration, SceneOption, SceneOptions,
    TriggerHook,
};
pub use plugin::Plugin;
pub use scene::{PinSettings, Scene, SceneState, ScrollOffset};
pub use stage::{Stage, StageBuilder};

// Host types used throughout the public API
pub use scrollscene_host::{Container, ElementId};

#[cfg(test)]
pub(crate) mod testing {
    use std::rc::Rc;

    use scrollscene_host::{Document, ManualScheduler, Size};

    use crate::stage::{Stage, StageBuilder};

    /// A 1024x800 headless document, a manual scheduler and a stage over both
    pub(crate) struct Fixture {
        pub(crate) doc: Rc<Document>,
        pub(crate) scheduler: Rc<ManualScheduler>,
        pub(crate) stage: Rc<Stage>,
    }

    pub(crate) fn fixture() -> Fixture {
        fixture_with(|builder| builder)
    }

    pub(crate) fn fixture_with(configure: impl FnOnce(StageBuilder) -> StageBuilder) -> Fixture {
        let doc = Rc::new(Document::new(Size::new(1024.0, 800.0)));
        let scheduler = Rc::new(ManualScheduler::new());
        let stage = configure(Stage::builder(doc.clone(), scheduler.clone())).build();
        Fixture {
            doc,
            scheduler,
            stage,
        }
    }
}
