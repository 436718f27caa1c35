//! Scripted flip scenarios replayed against the headless host.
//!
//! A scenario names a handful of elements (a tree, with rectangles and
//! stylesheet values) and a list of steps that drive the engine the way a
//! binding layer would:
//!
//! ```json
//! {
//!   "elements": [
//!     { "name": "box", "rect": { "x": 0, "y": 0, "width": 100, "height": 100 } }
//!   ],
//!   "steps": [
//!     { "op": "register", "id": "box", "config": { "scale": "x", "enter": false } },
//!     { "op": "mount", "id": "box", "element": "box" },
//!     { "op": "microtasks" },
//!     { "op": "flip", "id": "box" },
//!     { "op": "set_rect", "element": "box",
//!       "rect": { "x": 0, "y": 0, "width": 200, "height": 100 } },
//!     { "op": "microtasks" },
//!     { "op": "settle" }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use rune_flip::headless::{ElementId, HeadlessHost};
use rune_flip::{
    FlipConfig, FlipEngine, FlipEvent, FlipStats, LayoutEngine, NodeKey, Rect, ScopeConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

fn default_frame_ms() -> f64 {
    16.0
}

fn default_settle_ms() -> f64 {
    10_000.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub viewport: Option<Rect>,
    #[serde(default = "default_frame_ms")]
    pub frame_ms: f64,
    #[serde(default)]
    pub scopes: BTreeMap<String, ScopeConfig>,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
    pub steps: Vec<Step>,
}

/// An element created before the first step. Parents must be listed before
/// their children; no parent means the document root.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub rect: Rect,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Register {
        id: String,
        #[serde(default)]
        config: FlipConfig,
        /// Id of an already registered node.
        #[serde(default)]
        parent: Option<String>,
    },
    Mount { id: String, element: String },
    Unmount { id: String, element: String },
    Flip { id: String },
    /// Create an element mid-scenario, e.g. a replacement for a remount.
    Create(ElementSpec),
    SetRect { element: String, rect: Rect },
    SetStyle { element: String, property: String, value: String },
    Deregister { id: String },
    Microtasks,
    Advance { ms: f64 },
    Settle {
        #[serde(default = "default_settle_ms")]
        max_ms: f64,
    },
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&source)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }
}

/// A transform write, with the element's scenario name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformWrite {
    pub element: String,
    pub transform: String,
}

/// What a replay produced.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub events: Vec<FlipEvent>,
    pub transforms: Vec<TransformWrite>,
    pub stats: FlipStats,
    pub elapsed_ms: f64,
}

/// Replays steps against an engine, resolving scenario names to elements
/// and node keys.
pub struct Replay {
    engine: FlipEngine<HeadlessHost>,
    frame_ms: f64,
    elements: HashMap<String, ElementId>,
    names: HashMap<ElementId, String>,
    nodes: HashMap<String, NodeKey>,
    events: Vec<FlipEvent>,
}

impl Replay {
    pub fn new(mut engine: FlipEngine<HeadlessHost>, scenario: &Scenario) -> Result<Self> {
        for (name, scope) in &scenario.scopes {
            engine.set_scope(name.clone(), scope.clone());
        }
        let mut replay = Self {
            engine,
            frame_ms: scenario.frame_ms,
            elements: HashMap::new(),
            names: HashMap::new(),
            nodes: HashMap::new(),
            events: Vec::new(),
        };
        for spec in &scenario.elements {
            replay.create(spec)?;
        }
        Ok(replay)
    }

    fn element(&self, name: &str) -> Result<ElementId> {
        self.elements
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown element `{name}`"))
    }

    fn create(&mut self, spec: &ElementSpec) -> Result<()> {
        if self.elements.contains_key(&spec.name) {
            bail!("element `{}` defined twice", spec.name);
        }
        let parent = match &spec.parent {
            Some(parent) => self.element(parent)?,
            None => self.engine.host().root(),
        };
        let host = self.engine.host_mut();
        let element = host.create_element(parent, spec.rect);
        for (property, value) in &spec.styles {
            host.set_computed(element, property, value);
        }
        self.elements.insert(spec.name.clone(), element);
        self.names.insert(element, spec.name.clone());
        Ok(())
    }

    pub fn run(&mut self, steps: &[Step]) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            self.apply(step)
                .with_context(|| format!("step {index} ({step:?}) failed"))?;
            self.collect_events();
        }
        Ok(())
    }

    fn apply(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Register { id, config, parent } => {
                let parent = match parent {
                    Some(parent) => Some(
                        self.engine
                            .lookup(parent)
                            .ok_or_else(|| anyhow!("parent node `{parent}` is not registered"))?,
                    ),
                    None => None,
                };
                let key = self.engine.register(id, config.clone(), parent);
                self.nodes.insert(id.clone(), key);
            }
            Step::Mount { id, element } => {
                let element = self.element(element)?;
                self.engine.mount(id, element);
            }
            Step::Unmount { id, element } => {
                let element = self.element(element)?;
                self.engine.unmount(id, &element);
            }
            Step::Flip { id } => self.engine.flip_id(id),
            Step::Create(spec) => self.create(spec)?,
            Step::SetRect { element, rect } => {
                let element = self.element(element)?;
                self.engine.host_mut().set_rect(element, *rect);
            }
            Step::SetStyle {
                element,
                property,
                value,
            } => {
                let element = self.element(element)?;
                self.engine.host_mut().set_style(&element, property, value);
            }
            Step::Deregister { id } => {
                let key = self
                    .engine
                    .lookup(id)
                    .or_else(|| self.nodes.get(id).copied())
                    .ok_or_else(|| anyhow!("unknown node `{id}`"))?;
                self.engine.deregister(key);
            }
            Step::Microtasks => {
                let before = self.engine.stats().flushes;
                self.engine.run_microtasks();
                if self.engine.stats().flushes > before {
                    debug!(stats = ?self.engine.stats(), "flushed");
                }
            }
            Step::Advance { ms } => {
                let mut remaining = *ms;
                while remaining > 0.0 {
                    let delta = remaining.min(self.frame_ms);
                    self.engine.advance(delta);
                    remaining -= delta;
                }
            }
            Step::Settle { max_ms } => self.engine.settle(self.frame_ms, *max_ms),
        }
        Ok(())
    }

    fn collect_events(&mut self) {
        for event in self.engine.drain_events() {
            info!(?event, "flip event");
            self.events.push(event);
        }
    }

    pub fn finish(mut self) -> Report {
        self.collect_events();
        let host = self.engine.host();
        let transforms = host
            .transform_log()
            .iter()
            .map(|(element, transform)| TransformWrite {
                element: self
                    .names
                    .get(element)
                    .cloned()
                    .unwrap_or_else(|| format!("{element:?}")),
                transform: transform.clone(),
            })
            .collect();
        Report {
            events: self.events,
            transforms,
            stats: self.engine.stats(),
            elapsed_ms: host.now_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn replay(scenario: serde_json::Value) -> Report {
        let scenario: Scenario = serde_json::from_value(scenario).unwrap();
        let engine = FlipEngine::new(HeadlessHost::default());
        let mut replay = Replay::new(engine, &scenario).unwrap();
        replay.run(&scenario.steps).unwrap();
        replay.finish()
    }

    #[test]
    fn test_resize_scenario() {
        let report = replay(json!({
            "elements": [
                { "name": "box", "rect": { "x": 0, "y": 0, "width": 100, "height": 100 } }
            ],
            "steps": [
                { "op": "register", "id": "box", "config": { "scale": "x", "enter": false } },
                { "op": "mount", "id": "box", "element": "box" },
                { "op": "microtasks" },
                { "op": "flip", "id": "box" },
                {
                    "op": "set_rect",
                    "element": "box",
                    "rect": { "x": 0, "y": 0, "width": 200, "height": 100 }
                },
                { "op": "microtasks" },
                { "op": "settle" }
            ]
        }));

        assert_eq!(report.stats.flushes, 2);
        assert_eq!(report.stats.animations_started, 2);
        assert_eq!(report.stats.animations_finished, 2);
        assert!(report.transforms.contains(&TransformWrite {
            element: "box".to_string(),
            transform: "scale(0.5, 1)".to_string(),
        }));
        assert_eq!(report.transforms.last().map(|write| write.transform.as_str()), Some(""));
    }

    #[test]
    fn test_exit_scenario_reports_removal() {
        let report = replay(json!({
            "elements": [
                { "name": "list", "rect": { "x": 0, "y": 0, "width": 300, "height": 300 } },
                {
                    "name": "row",
                    "parent": "list",
                    "rect": { "x": 0, "y": 40, "width": 300, "height": 20 }
                }
            ],
            "steps": [
                { "op": "register", "id": "row", "config": { "enter": false } },
                { "op": "mount", "id": "row", "element": "row" },
                { "op": "microtasks" },
                { "op": "unmount", "id": "row", "element": "row" },
                { "op": "microtasks" },
                { "op": "advance", "ms": 200 }
            ]
        }));

        assert!(report.events.iter().any(|event| matches!(
            event,
            FlipEvent::Removed { node_id } if node_id == "row"
        )));
        assert_eq!(report.elapsed_ms, 200.0);
    }

    #[test]
    fn test_bundled_tabs_scenario() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/tabs.json");
        let scenario = Scenario::load(&path).unwrap();
        let mut replay = Replay::new(FlipEngine::new(HeadlessHost::default()), &scenario).unwrap();
        replay.run(&scenario.steps).unwrap();
        let report = replay.finish();

        assert_eq!(report.stats.flushes, 2);
        assert_eq!(report.stats.animations_started, 6);
        assert_eq!(report.stats.animations_finished, 6);
        // The indicator was replaced, not removed.
        assert!(!report.events.iter().any(|event| matches!(event, FlipEvent::Removed { .. })));
    }

    #[test]
    fn test_unknown_element_is_an_error() {
        let scenario: Scenario = serde_json::from_value(json!({
            "steps": [{ "op": "mount", "id": "a", "element": "missing" }]
        }))
        .unwrap();
        let mut replay = Replay::new(FlipEngine::new(HeadlessHost::default()), &scenario).unwrap();
        let err = replay.run(&scenario.steps).unwrap_err();
        assert!(format!("{err:#}").contains("unknown element `missing`"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        fs::write(&path, r#"{ "frame_ms": 8, "steps": [{ "op": "microtasks" }] }"#).unwrap();

        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.frame_ms, 8.0);
        assert_eq!(scenario.steps.len(), 1);
        assert!(Scenario::load(&dir.path().join("missing.json")).is_err());
    }
}
