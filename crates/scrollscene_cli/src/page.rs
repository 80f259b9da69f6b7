//! Page description files
//!
//! A page file is TOML describing a headless document, one controller, its
//! scenes and the scroll positions to visit:
//!
//! ```toml
//! [viewport]
//! width = 1024
//! height = 800
//!
//! [[elements]]
//! id = "hero"
//! frame = [0, 1200, 1024, 300]
//! classes = ["panel"]
//!
//! [controller]
//! refresh_interval = 0
//!
//! [[scenes]]
//! name = "hero"
//! trigger_element = "#hero"
//! duration = "50%"
//! pin = { element = "#hero" }
//! class_toggle = { element = ".panel", classes = "active" }
//!
//! [scroll]
//! positions = [0, 900, 1200, 1500]
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use scrollscene_core::{ControllerOptions, PinSettings, SceneOptions};
use scrollscene_host::{Rect, Size};
use serde::Deserialize;

/// A whole page file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub viewport: ViewportConfig,
    pub elements: Vec<ElementConfig>,
    pub controller: ControllerOptions,
    pub scenes: Vec<SceneConfig>,
    pub scroll: ScrollConfig,
}

impl PageConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let page: PageConfig = toml::from_str(content)?;
        page.validate()?;
        Ok(page)
    }

    fn validate(&self) -> Result<()> {
        if self.viewport.width <= 0.0 || self.viewport.height <= 0.0 {
            anyhow::bail!(
                "Viewport must be positive, got {}x{}",
                self.viewport.width,
                self.viewport.height
            );
        }
        for (i, element) in self.elements.iter().enumerate() {
            if let Some(parent) = &element.parent {
                let declared_before = self.elements[..i]
                    .iter()
                    .any(|other| other.id.as_deref() == Some(parent.as_str()));
                if !declared_before {
                    anyhow::bail!(
                        "Element {} names parent \"{}\", which is not declared before it",
                        element.label(i),
                        parent
                    );
                }
            }
        }
        if self.scroll.frame_ms < 0.0 {
            anyhow::bail!("scroll.frame_ms must not be negative");
        }
        Ok(())
    }
}

// =============================================================================
// Viewport and elements
// =============================================================================

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 800.0,
        }
    }
}

impl ViewportConfig {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// One element of the headless document
#[derive(Debug, Deserialize)]
pub struct ElementConfig {
    /// `id` attribute, used by `#id` selectors and `parent`
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Id of an earlier element; the body when absent
    #[serde(default)]
    pub parent: Option<String>,
    /// `[x, y, width, height]` relative to the parent; laid out in flow when absent
    #[serde(default)]
    pub frame: Option<[f64; 4]>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Style rules, as if from a stylesheet
    #[serde(default)]
    pub style: IndexMap<String, String>,
}

fn default_tag() -> String {
    "div".to_string()
}

impl ElementConfig {
    pub fn frame_rect(&self) -> Option<Rect> {
        self.frame.map(|[x, y, w, h]| Rect::new(x, y, w, h))
    }

    /// How the element is named in messages
    pub fn label(&self, index: usize) -> String {
        match &self.id {
            Some(id) => format!("#{}", id),
            None => format!("{}[{}]", self.tag, index),
        }
    }
}

// =============================================================================
// Scenes
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SceneConfig {
    /// Label used in the trace; defaults to `scene<N>`
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pin: Option<PinConfig>,
    #[serde(default, alias = "classToggle")]
    pub class_toggle: Option<ClassToggleConfig>,
    #[serde(flatten)]
    pub options: SceneOptions,
}

#[derive(Debug, Deserialize)]
pub struct PinConfig {
    pub element: String,
    #[serde(flatten)]
    pub settings: PinSettings,
}

#[derive(Debug, Deserialize)]
pub struct ClassToggleConfig {
    pub element: String,
    pub classes: String,
}

// =============================================================================
// Scroll path
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Scroll positions visited in order, one frame each
    pub positions: Vec<f64>,
    /// Virtual milliseconds per frame
    pub frame_ms: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            positions: Vec::new(),
            frame_ms: 16.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrollscene_core::{SceneDuration, TriggerHook};

    #[test]
    fn test_parse_full_page() {
        let page = PageConfig::parse(
            r##"
            [viewport]
            height = 600

            [[elements]]
            id = "wrap"
            frame = [0, 0, 1024, 2000]

            [[elements]]
            id = "hero"
            parent = "wrap"
            frame = [0, 900, 1024, 300]
            classes = ["panel"]
            style = { position = "relative" }

            [controller]
            refreshInterval = 0

            [[scenes]]
            name = "hero"
            triggerElement = "#hero"
            triggerHook = "onLeave"
            duration = "50%"
            pin = { element = "#hero", pushFollowers = false }
            class_toggle = { element = ".panel", classes = "active" }

            [scroll]
            positions = [0, 900]
            "##,
        )
        .unwrap();

        assert_eq!(page.viewport.width, 1024.0);
        assert_eq!(page.viewport.height, 600.0);
        assert_eq!(page.elements.len(), 2);
        assert_eq!(page.elements[1].tag, "div");
        assert_eq!(page.elements[1].style.get("position").map(String::as_str), Some("relative"));
        assert_eq!(page.controller.refresh_interval, 0);

        let scene = &page.scenes[0];
        assert_eq!(scene.name.as_deref(), Some("hero"));
        assert_eq!(scene.options.trigger_hook, Some(TriggerHook::OnLeave));
        assert_eq!(scene.options.duration, Some(SceneDuration::PercentOfViewport(50.0)));
        assert!(scene.options.extra.is_empty());
        let pin = scene.pin.as_ref().unwrap();
        assert_eq!(pin.element, "#hero");
        assert_eq!(pin.settings.push_followers, Some(false));
        assert_eq!(scene.class_toggle.as_ref().unwrap().classes, "active");

        assert_eq!(page.scroll.positions, vec![0.0, 900.0]);
        assert_eq!(page.scroll.frame_ms, 16.0);
    }

    #[test]
    fn test_parent_must_be_declared_first() {
        let err = PageConfig::parse(
            r#"
            [[elements]]
            id = "child"
            parent = "later"

            [[elements]]
            id = "later"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("later"));
    }

    #[test]
    fn test_rejects_empty_viewport() {
        assert!(PageConfig::parse("[viewport]\nwidth = 0").is_err());
    }
}
