//! ScrollScene Browser Host
//!
//! Runs the scene engine against a real page:
//!
//! - [`WebDom`]: the [`Dom`](scrollscene_host::Dom) trait over `web-sys`
//! - [`WebScheduler`]: `requestAnimationFrame`, `setTimeout` and
//!   `performance.now()`
//!
//! ```ignore
//! let host = scrollscene_web::WebHost::new()?;
//! let stage = host.stage_builder().build();
//! let controller = Controller::new(&stage, ControllerOptions::new())?;
//! ```

mod dom;
mod error;
mod scheduler;

use std::rc::Rc;

use scrollscene_core::{Stage, StageBuilder};

pub use dom::WebDom;
pub use error::{Result, WebError};
pub use scheduler::WebScheduler;

/// A browser document and scheduler, ready to back a [`Stage`]
#[derive(Clone)]
pub struct WebHost {
    pub dom: Rc<WebDom>,
    pub scheduler: Rc<WebScheduler>,
}

impl WebHost {
    /// Attach to the global window
    pub fn new() -> Result<Self> {
        let dom = WebDom::new()?;
        let scheduler = WebScheduler::for_dom(&dom);
        tracing::debug!("attached to browser window");
        Ok(Self {
            dom: Rc::new(dom),
            scheduler: Rc::new(scheduler),
        })
    }

    /// A stage builder over this host, for registering options and plugins
    pub fn stage_builder(&self) -> StageBuilder {
        Stage::builder(self.dom.clone(), self.scheduler.clone())
    }
}
