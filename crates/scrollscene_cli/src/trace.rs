//! Headless scroll simulation
//!
//! Builds a [`Document`] from a [`PageConfig`], wires a controller and its
//! scenes, then visits each scroll position for one frame while recording
//! every scene and controller event.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use scrollscene_core::{
    Controller, ControllerEvent, ControllerPayload, EventKind, Scene, SceneEvent, SceneEventKind,
    ScenePayload, SceneState, ScrollOffset, Stage,
};
use scrollscene_host::{Document, Dom, ElementId, ManualScheduler};
use tracing::debug;

use crate::page::{ElementConfig, PageConfig};

type Trace = Rc<RefCell<Vec<String>>>;

/// Final standing of one scene
#[derive(Clone, Debug, PartialEq)]
pub struct SceneSummary {
    pub name: String,
    pub state: SceneState,
    pub progress: f64,
    pub scroll_offset: ScrollOffset,
}

/// A page loaded into the headless host
pub struct Simulation {
    doc: Rc<Document>,
    scheduler: Rc<ManualScheduler>,
    controller: Controller,
    scenes: Vec<(String, Scene)>,
    trace: Trace,
    frame_ms: f64,
}

impl Simulation {
    pub fn build(page: &PageConfig) -> Result<Self> {
        let doc = Rc::new(Document::new(page.viewport.size()));
        let scheduler = Rc::new(ManualScheduler::new());
        let stage = Stage::new(doc.clone(), scheduler.clone());

        for (index, element) in page.elements.iter().enumerate() {
            create_element(&doc, element, index)?;
        }

        let controller = Controller::new(&stage, page.controller.clone())
            .context("Failed to create the controller")?;
        let trace: Trace = Rc::new(RefCell::new(Vec::new()));
        record_controller(&controller, &trace);

        let mut scenes = Vec::with_capacity(page.scenes.len());
        for (index, config) in page.scenes.iter().enumerate() {
            let name = config
                .name
                .clone()
                .unwrap_or_else(|| format!("scene{}", index));
            let scene = Scene::new(&stage, config.options.clone());
            record_scene(&scene, &name, &trace);
            if let Some(pin) = &config.pin {
                scene.set_pin(pin.element.as_str(), pin.settings.clone());
            }
            if let Some(toggle) = &config.class_toggle {
                scene.set_class_toggle(toggle.element.as_str(), &toggle.classes);
            }
            scene.add_to(&controller);
            debug!("scene {} covers {:?}", name, scene.scroll_offset());
            scenes.push((name, scene));
        }

        Ok(Self {
            doc,
            scheduler,
            controller,
            scenes,
            trace,
            frame_ms: page.scroll.frame_ms,
        })
    }

    /// Scroll to `position` and run one frame
    pub fn visit(&self, position: f64) {
        self.trace.borrow_mut().push(format!("scroll {}", position));
        self.controller.scroll_to(position);
        self.scheduler.tick(self.frame_ms);
    }

    /// Recorded lines so far, leaving the trace empty
    pub fn take_trace(&self) -> Vec<String> {
        std::mem::take(&mut *self.trace.borrow_mut())
    }

    pub fn summary(&self) -> Vec<SceneSummary> {
        self.scenes
            .iter()
            .map(|(name, scene)| SceneSummary {
                name: name.clone(),
                state: scene.state(),
                progress: scene.progress(),
                scroll_offset: scene.scroll_offset(),
            })
            .collect()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }
}

fn create_element(doc: &Document, config: &ElementConfig, index: usize) -> Result<ElementId> {
    let parent = match &config.parent {
        Some(parent) => doc
            .query(&format!("#{}", parent))
            .first()
            .copied()
            .with_context(|| format!("Parent #{} of {} not found", parent, config.label(index)))?,
        None => doc.body().context("Document has no body")?,
    };
    let element = match config.frame_rect() {
        Some(frame) => doc.create_child(parent, &config.tag, frame),
        None => {
            let element = doc.create_element(&config.tag);
            doc.append_child(parent, element);
            element
        }
    };
    if let Some(id) = &config.id {
        doc.set_element_id(element, id);
    }
    for class in &config.classes {
        doc.add_class(element, class);
    }
    for (property, value) in &config.style {
        doc.set_style_rule(element, property, value);
    }
    Ok(element)
}

fn record_scene(scene: &Scene, name: &str, trace: &Trace) {
    let names = SceneEventKind::ALL
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(" ");
    let (name, trace) = (name.to_string(), trace.clone());
    scene.on(&names, move |event| {
        trace
            .borrow_mut()
            .push(format!("  {} {}", name, describe_scene_event(event)));
    });
}

fn record_controller(controller: &Controller, trace: &Trace) {
    let trace = trace.clone();
    controller.on("update resize destroy", move |event| {
        trace
            .borrow_mut()
            .push(format!("  controller {}", describe_controller_event(event)));
    });
}

pub fn describe_scene_event(event: &SceneEvent) -> String {
    let detail = match &event.payload {
        ScenePayload::None | ScenePayload::Add { .. } => String::new(),
        ScenePayload::Progress {
            progress,
            state,
            scroll_direction,
        } => format!(
            " progress={:.3} state={} direction={}",
            progress, state, scroll_direction
        ),
        ScenePayload::Change { what } => format!(" what={}", what),
        ScenePayload::Shift { reason } => format!(" reason={}", reason),
        ScenePayload::Update {
            start_pos,
            end_pos,
            scroll_pos,
        } => format!(" start={} end={} scroll={}", start_pos, end_pos, scroll_pos),
        ScenePayload::Destroy { reset } => format!(" reset={}", reset),
    };
    format!("{}{}", event.kind, detail)
}

fn describe_controller_event(event: &ControllerEvent) -> String {
    let detail = match &event.payload {
        ControllerPayload::None => String::new(),
        ControllerPayload::Update {
            scroll_pos,
            scroll_direction,
            scenes,
        } => format!(
            " scroll={} direction={} scenes={}",
            scroll_pos, scroll_direction, scenes
        ),
        ControllerPayload::Resize { size } => format!(" size={}", size),
        ControllerPayload::Destroy { reset } => format!(" reset={}", reset),
    };
    format!("{}{}", event.kind, detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        [[elements]]
        id = "hero"
        frame = [0, 1000, 1024, 100]
        classes = ["panel"]

        [controller]
        refresh_interval = 0

        [[scenes]]
        name = "hero"
        triggerElement = "#hero"
        triggerHook = "onLeave"
        duration = 200
        class_toggle = { element = ".panel", classes = "active" }

        [scroll]
        positions = [500, 1100, 1400]
    "##;

    fn lines_for(trace: &[String], scene: &str) -> Vec<String> {
        let prefix = format!("  {} ", scene);
        trace
            .iter()
            .filter_map(|line| line.strip_prefix(&prefix))
            .map(|rest| rest.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_scroll_path_trace() {
        let page = PageConfig::parse(PAGE).unwrap();
        let sim = Simulation::build(&page).unwrap();
        let hero = sim.document().query("#hero")[0];
        sim.take_trace();

        sim.visit(500.0);
        assert!(!sim.take_trace().iter().any(|line| line.contains("enter")));

        sim.visit(1100.0);
        let trace = sim.take_trace();
        assert_eq!(trace[0], "scroll 1100");
        assert_eq!(
            lines_for(&trace, "hero"),
            vec!["update", "enter", "start", "progress"]
        );
        assert!(trace.contains(&"  hero progress progress=0.500 state=DURING direction=FORWARD".to_string()));
        assert!(sim.document().has_class(hero, "active"));

        sim.visit(1400.0);
        let trace = sim.take_trace();
        assert_eq!(
            lines_for(&trace, "hero"),
            vec!["update", "progress", "end", "leave"]
        );
        assert!(!sim.document().has_class(hero, "active"));

        let summary = sim.summary();
        assert_eq!(summary[0].state, SceneState::After);
        assert_eq!(summary[0].progress, 1.0);
        assert_eq!(summary[0].scroll_offset, ScrollOffset { start: 1000.0, end: 1200.0 });
    }

    #[test]
    fn test_demo_page_round_trip() {
        let page = PageConfig::parse(include_str!("../../../demos/pinned_hero.toml")).unwrap();
        let sim = Simulation::build(&page).unwrap();
        let nav = sim.document().query("#nav-hero")[0];

        for &position in &page.scroll.positions[..4] {
            sim.visit(position);
        }
        assert!(sim.document().has_class(nav, "active"));
        assert_eq!(sim.summary()[0].state, SceneState::During);

        for &position in &page.scroll.positions[4..] {
            sim.visit(position);
        }
        assert!(!sim.document().has_class(nav, "active"));
        for scene in sim.summary() {
            assert_eq!(scene.state, SceneState::Before, "{}", scene.name);
            assert_eq!(scene.progress, 0.0);
        }
        assert!(sim.take_trace().iter().any(|line| line.starts_with("  hero-pin leave")));
    }

    #[test]
    fn test_unknown_parent_is_an_error() {
        let page = PageConfig {
            elements: vec![ElementConfig {
                id: Some("a".into()),
                tag: "div".into(),
                parent: Some("ghost".into()),
                frame: None,
                classes: Vec::new(),
                style: Default::default(),
            }],
            ..PageConfig::default()
        };
        assert!(Simulation::build(&page).is_err());
    }
}
