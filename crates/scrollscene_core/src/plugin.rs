//! Extension points
//!
//! Plugins are registered on the [`Stage`](crate::Stage) and called
//! synchronously at fixed points in the engine. Every hook has an empty
//! default, so a plugin implements only what it needs.

use crate::controller::Controller;
use crate::scene::Scene;

/// Capability interface for engine extensions
pub trait Plugin {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// A scene finished construction (options validated, not yet attached)
    fn on_scene_created(&self, _scene: &Scene) {}

    /// A controller finished construction (listeners attached)
    fn on_controller_created(&self, _controller: &Controller) {}

    /// A pinned element switched between fixed and in-flow positioning
    fn on_pin_state_change(&self, _scene: &Scene, _pinned: bool) {}
}
