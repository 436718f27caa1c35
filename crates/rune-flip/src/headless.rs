//! In-memory host: a tiny retained element tree with a manual clock.
//!
//! Geometry is whatever the caller assigns with [`HeadlessHost::set_rect`],
//! adjusted for the few inline styles the engine writes:
//!
//! - `width` / `height` in px replace the assigned size
//! - `position: absolute` with `top` / `left` places the element relative to
//!   its parent's rectangle
//! - `transform` (translate/scale lists, top-left origin) is applied to the
//!   element and everything below it
//!
//! Timelines run off the clock advanced by [`HeadlessHost::advance`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::FlipEngine;
use crate::geometry::{Point, Rect};
use crate::host::{AnimationTimeline, Keyframes, LayoutEngine, TimelineHandle, TimelineOptions};
use crate::transform::Transform2D;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u32);

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({})", self.0)
    }
}

#[derive(Debug, Clone, Default)]
struct ElementData {
    rect: Rect,
    inline: BTreeMap<String, String>,
    /// Stylesheet values, used when no inline value is set.
    computed: BTreeMap<String, String>,
    parent: Option<ElementId>,
    attached: bool,
}

/// A timeline animation as the host saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRecord {
    pub element: ElementId,
    pub keyframes: Keyframes,
    pub options: TimelineOptions,
    pub start_ms: f64,
    pub finished: bool,
}

#[derive(Debug)]
pub struct HeadlessHost {
    elements: Vec<ElementData>,
    root: ElementId,
    now_ms: f64,
    timelines: Vec<TimelineRecord>,
    frame_requested: bool,
    transform_log: Vec<(ElementId, String)>,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new(Rect::new(0.0, 0.0, 1280.0, 800.0))
    }
}

impl HeadlessHost {
    /// Host whose document root covers `viewport`.
    pub fn new(viewport: Rect) -> Self {
        let root = ElementData {
            rect: viewport,
            attached: true,
            ..ElementData::default()
        };
        Self {
            elements: vec![root],
            root: ElementId(0),
            now_ms: 0.0,
            timelines: Vec::new(),
            frame_requested: false,
            transform_log: Vec::new(),
        }
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    /// Add an attached element under `parent` with an opacity of 1.
    pub fn create_element(&mut self, parent: ElementId, rect: Rect) -> ElementId {
        let mut computed = BTreeMap::new();
        computed.insert("opacity".to_string(), "1".to_string());
        self.elements.push(ElementData {
            rect,
            computed,
            parent: Some(parent),
            attached: true,
            ..ElementData::default()
        });
        ElementId((self.elements.len() - 1) as u32)
    }

    /// Assign the element's layout rectangle.
    pub fn set_rect(&mut self, element: ElementId, rect: Rect) {
        if let Some(data) = self.data_mut(element) {
            data.rect = rect;
        }
    }

    /// Set a stylesheet (non-inline) value.
    pub fn set_computed(&mut self, element: ElementId, property: &str, value: &str) {
        if let Some(data) = self.data_mut(element) {
            data.computed.insert(property.to_string(), value.to_string());
        }
    }

    pub fn inline_style(&self, element: ElementId, property: &str) -> Option<&str> {
        self.data(element)?.inline.get(property).map(String::as_str)
    }

    /// Inline transform currently written, if any.
    pub fn transform(&self, element: ElementId) -> Option<&str> {
        self.inline_style(element, "transform")
    }

    pub fn is_attached(&self, element: ElementId) -> bool {
        self.data(element).is_some_and(|data| data.attached)
    }

    pub fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.data(element)?.parent
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn advance(&mut self, delta_ms: f64) {
        self.now_ms += delta_ms;
    }

    /// Clear and return the pending frame request.
    pub fn take_frame_request(&mut self) -> bool {
        std::mem::take(&mut self.frame_requested)
    }

    pub fn timelines(&self) -> &[TimelineRecord] {
        &self.timelines
    }

    /// Every transform write, in order.
    pub fn transform_log(&self) -> &[(ElementId, String)] {
        &self.transform_log
    }

    fn data(&self, element: ElementId) -> Option<&ElementData> {
        self.elements.get(element.0 as usize)
    }

    fn data_mut(&mut self, element: ElementId) -> Option<&mut ElementData> {
        self.elements.get_mut(element.0 as usize)
    }

    /// Untransformed layout rectangle.
    fn layout_rect(&self, element: ElementId) -> Option<Rect> {
        let data = self.data(element)?;
        let mut rect = data.rect;

        if data.inline.get("position").map(String::as_str) == Some("absolute") {
            let container = data
                .parent
                .and_then(|parent| self.layout_rect(parent))
                .unwrap_or_default();
            rect.x = container.x + px_value(data.inline.get("left")).unwrap_or(0.0);
            rect.y = container.y + px_value(data.inline.get("top")).unwrap_or(0.0);
        }
        if let Some(width) = px_value(data.inline.get("width")) {
            rect.width = width;
        }
        if let Some(height) = px_value(data.inline.get("height")) {
            rect.height = height;
        }
        Some(rect)
    }

    /// Map a point through the transforms of `element` and its ancestors.
    fn to_screen(&self, element: ElementId, point: Point) -> Point {
        let mut point = point;
        let mut current = Some(element);
        while let Some(id) = current {
            let Some(data) = self.data(id) else {
                break;
            };
            if let (Some(css), Some(origin)) =
                (data.inline.get("transform"), self.layout_rect(id))
            {
                let matrix = parse_transform(css);
                let (x, y) = matrix.apply_point(point.x - origin.x, point.y - origin.y);
                point = Point::new(origin.x + x, origin.y + y);
            }
            current = data.parent;
        }
        point
    }
}

fn px_value(value: Option<&String>) -> Option<f64> {
    let value = value?.trim();
    value.strip_suffix("px").unwrap_or(value).trim().parse().ok()
}

/// Parse a `translate(..px, ..px) scale(.., ..)` list. Unknown entries are
/// skipped.
fn parse_transform(css: &str) -> Transform2D {
    css.split(')')
        .filter_map(|entry| {
            let (name, args) = entry.trim().split_once('(')?;
            let args: Vec<f64> = args
                .split(',')
                .filter_map(|arg| {
                    let arg = arg.trim();
                    arg.strip_suffix("px").unwrap_or(arg).parse().ok()
                })
                .collect();
            match (name.trim(), args.as_slice()) {
                ("translate", [x, y]) => Some(Transform2D::translate(*x, *y)),
                ("scale", [x, y]) => Some(Transform2D::scale(*x, *y)),
                _ => None,
            }
        })
        .fold(Transform2D::identity(), |acc, op| acc.then(&op))
}

impl LayoutEngine for HeadlessHost {
    type Element = ElementId;

    fn bounding_rect(&self, element: &ElementId) -> Option<Rect> {
        if !self.is_attached(*element) {
            return None;
        }
        let rect = self.layout_rect(*element)?;
        let a = self.to_screen(*element, rect.origin());
        let b = self.to_screen(
            *element,
            Point::new(rect.x + rect.width, rect.y + rect.height),
        );
        Some(Rect::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (b.x - a.x).abs(),
            (b.y - a.y).abs(),
        ))
    }

    fn computed_style(&self, element: &ElementId, property: &str) -> Option<String> {
        let data = self.data(*element)?;
        data.inline
            .get(property)
            .or_else(|| data.computed.get(property))
            .cloned()
    }

    fn style_text(&self, element: &ElementId) -> String {
        self.data(*element)
            .map(|data| {
                data.inline
                    .iter()
                    .map(|(property, value)| format!("{property}: {value};"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    fn set_style_text(&mut self, element: &ElementId, text: &str) {
        let Some(data) = self.data_mut(*element) else {
            return;
        };
        data.inline = text
            .split(';')
            .filter_map(|declaration| {
                let (property, value) = declaration.split_once(':')?;
                Some((property.trim().to_string(), value.trim().to_string()))
            })
            .collect();
    }

    fn set_style(&mut self, element: &ElementId, property: &str, value: &str) {
        if let Some(data) = self.data_mut(*element) {
            data.inline.insert(property.to_string(), value.to_string());
        }
    }

    fn set_transform(&mut self, element: &ElementId, transform: &str) {
        let Some(data) = self.data_mut(*element) else {
            return;
        };
        if transform.is_empty() {
            data.inline.remove("transform");
        } else {
            data.inline.insert("transform".to_string(), transform.to_string());
        }
        self.transform_log.push((*element, transform.to_string()));
    }

    fn offset_parent(&self, element: &ElementId) -> Option<ElementId> {
        self.parent(*element)
    }

    fn document_root(&self) -> ElementId {
        self.root
    }

    fn detached_clone(&mut self, element: &ElementId) -> ElementId {
        let mut clone = self.data(*element).cloned().unwrap_or_default();
        clone.parent = None;
        clone.attached = false;
        self.elements.push(clone);
        ElementId((self.elements.len() - 1) as u32)
    }

    fn append_child(&mut self, parent: &ElementId, child: &ElementId) {
        let attached = self.is_attached(*parent);
        if let Some(data) = self.data_mut(*child) {
            data.parent = Some(*parent);
            data.attached = attached;
        }
    }

    fn remove(&mut self, element: &ElementId) {
        if let Some(data) = self.data_mut(*element) {
            data.parent = None;
            data.attached = false;
        }
    }
}

impl AnimationTimeline for HeadlessHost {
    fn play(
        &mut self,
        element: &ElementId,
        keyframes: &Keyframes,
        options: &TimelineOptions,
    ) -> TimelineHandle {
        self.timelines.push(TimelineRecord {
            element: *element,
            keyframes: keyframes.clone(),
            options: options.clone(),
            start_ms: self.now_ms,
            finished: false,
        });
        TimelineHandle((self.timelines.len() - 1) as u64)
    }

    fn current_time(&self, handle: TimelineHandle) -> Option<f64> {
        let record = self.timelines.get(handle.0 as usize)?;
        if record.finished {
            return None;
        }
        Some((self.now_ms - record.start_ms) * record.options.playback_rate)
    }

    fn finish(&mut self, handle: TimelineHandle) {
        if let Some(record) = self.timelines.get_mut(handle.0 as usize) {
            record.finished = true;
        }
    }

    fn request_frame(&mut self) {
        self.frame_requested = true;
    }
}

impl FlipEngine<HeadlessHost> {
    /// Advance the host clock and deliver the frame if one was requested.
    /// Returns whether a frame ran.
    pub fn advance(&mut self, delta_ms: f64) -> bool {
        self.host.advance(delta_ms);
        if !self.host.take_frame_request() {
            return false;
        }
        let now = self.host.now_ms();
        self.on_frame(now);
        true
    }

    /// Advance in `step_ms` frames until nothing is playing, up to `max_ms`.
    pub fn settle(&mut self, step_ms: f64, max_ms: f64) {
        let mut elapsed = 0.0;
        while elapsed < max_ms && self.advance(step_ms) {
            elapsed += step_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_placement() {
        let mut host = HeadlessHost::default();
        let container = host.create_element(host.root(), Rect::new(100.0, 50.0, 400.0, 400.0));
        let child = host.create_element(container, Rect::new(0.0, 0.0, 10.0, 10.0));

        host.set_style(&child, "position", "absolute");
        host.set_style(&child, "top", "20px");
        host.set_style(&child, "left", "30px");
        host.set_style(&child, "width", "60px");

        assert_eq!(
            host.bounding_rect(&child),
            Some(Rect::new(130.0, 70.0, 60.0, 10.0))
        );
    }

    #[test]
    fn test_transform_applies_to_descendants() {
        let mut host = HeadlessHost::default();
        let parent = host.create_element(host.root(), Rect::new(100.0, 100.0, 100.0, 100.0));
        let child = host.create_element(parent, Rect::new(150.0, 150.0, 10.0, 10.0));

        host.set_transform(&parent, "translate(10px, 0px) scale(2, 2)");
        assert_eq!(
            host.bounding_rect(&parent),
            Some(Rect::new(110.0, 100.0, 200.0, 200.0))
        );
        assert_eq!(
            host.bounding_rect(&child),
            Some(Rect::new(210.0, 200.0, 20.0, 20.0))
        );

        host.set_transform(&parent, "");
        assert!(host.transform(parent).is_none());
        assert_eq!(host.transform_log().len(), 2);
    }

    #[test]
    fn test_style_text_round_trip() {
        let mut host = HeadlessHost::default();
        let el = host.create_element(host.root(), Rect::default());
        host.set_style(&el, "opacity", "0");
        host.set_style(&el, "color", "red");

        let saved = host.style_text(&el);
        host.set_style(&el, "opacity", "1");
        host.set_style_text(&el, &saved);

        assert_eq!(host.inline_style(el, "opacity"), Some("0"));
        assert_eq!(host.inline_style(el, "color"), Some("red"));
        assert_eq!(host.computed_style(&el, "opacity").as_deref(), Some("0"));
    }

    #[test]
    fn test_clone_is_detached_until_appended() {
        let mut host = HeadlessHost::default();
        let el = host.create_element(host.root(), Rect::new(0.0, 0.0, 5.0, 5.0));
        let clone = host.detached_clone(&el);
        assert!(host.bounding_rect(&clone).is_none());

        host.append_child(&host.root(), &clone);
        assert!(host.bounding_rect(&clone).is_some());

        host.remove(&clone);
        assert!(!host.is_attached(clone));
    }

    #[test]
    fn test_timeline_clock() {
        let mut host = HeadlessHost::default();
        let el = host.create_element(host.root(), Rect::default());
        let options = TimelineOptions {
            delay_ms: 0.0,
            duration_ms: 100.0,
            easing: "linear".to_string(),
            playback_rate: 2.0,
            fill: crate::host::FillMode::Backwards,
        };
        let handle = host.play(&el, &Keyframes::default(), &options);
        host.advance(10.0);
        assert_eq!(host.current_time(handle), Some(20.0));

        host.finish(handle);
        assert_eq!(host.current_time(handle), None);
    }
}
