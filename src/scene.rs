//! Retained scene graph.
//!
//! Elements are keyed by [`ElementKey`]. Applying a new [`Frame`] diffs by key:
//! surviving elements retarget from wherever they currently are, new ones enter
//! from their collapsed origin, and missing ones exit toward it. Transitions never
//! queue; a second `apply` mid-flight starts from the interpolated state.

use crate::ease::Ease;
use crate::models::EntityId;
use crate::palette::Rgba;
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use std::time::Duration;

pub type Point = (f64, f64);

/// Which visual piece of an entity a mark is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Part {
    Bar,
    Label,
    Value,
    Region,
    Mark,
    Left,
    Right,
    Series,
    Axis,
    Title,
}

/// Identity of an element across frames.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementKey {
    pub id: String,
    pub part: Part,
}

impl ElementKey {
    pub fn new(id: impl Into<String>, part: Part) -> Self {
        Self {
            id: id.into(),
            part,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Start,
    Middle,
    End,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
    },
    /// Polylines (open) or polygons (closed, even-odd fill across rings).
    Path { rings: Vec<Vec<Point>>, closed: bool },
    Label {
        x: f64,
        y: f64,
        text: String,
        anchor: Anchor,
        size: f64,
    },
}

impl Shape {
    /// Zero-size version used for enter/exit when a mark has no explicit origin.
    pub fn collapsed(&self) -> Shape {
        match self {
            Shape::Rect { x, y, height, .. } => Shape::Rect {
                x: *x,
                y: *y,
                width: 0.0,
                height: *height,
            },
            Shape::Circle { cx, cy, .. } => Shape::Circle {
                cx: *cx,
                cy: *cy,
                r: 0.0,
            },
            other => other.clone(),
        }
    }

    pub fn lerp(&self, to: &Shape, t: f64) -> Shape {
        let l = |a: f64, b: f64| a + (b - a) * t;
        match (self, to) {
            (
                Shape::Rect {
                    x,
                    y,
                    width,
                    height,
                },
                Shape::Rect {
                    x: x2,
                    y: y2,
                    width: w2,
                    height: h2,
                },
            ) => Shape::Rect {
                x: l(*x, *x2),
                y: l(*y, *y2),
                width: l(*width, *w2),
                height: l(*height, *h2),
            },
            (Shape::Circle { cx, cy, r }, Shape::Circle { cx: x2, cy: y2, r: r2 }) => {
                Shape::Circle {
                    cx: l(*cx, *x2),
                    cy: l(*cy, *y2),
                    r: l(*r, *r2),
                }
            }
            (Shape::Path { rings: from, .. }, Shape::Path { rings, closed }) => Shape::Path {
                rings: lerp_rings(from, rings, t),
                closed: *closed,
            },
            (
                Shape::Label { x, y, size, .. },
                Shape::Label {
                    x: x2,
                    y: y2,
                    text,
                    anchor,
                    size: s2,
                },
            ) => Shape::Label {
                x: l(*x, *x2),
                y: l(*y, *y2),
                text: text.clone(),
                anchor: *anchor,
                size: l(*size, *s2),
            },
            // variant changed: jump
            (_, to) => to.clone(),
        }
    }

    /// Point containment for hit testing. Open paths use a stroke tolerance.
    pub fn contains(&self, px: f64, py: f64, tolerance: f64) -> bool {
        match self {
            Shape::Rect {
                x,
                y,
                width,
                height,
            } => {
                let (x0, x1) = (x.min(x + width), x.max(x + width));
                let (y0, y1) = (y.min(y + height), y.max(y + height));
                px >= x0 && px <= x1 && py >= y0 && py <= y1
            }
            Shape::Circle { cx, cy, r } => (px - cx).hypot(py - cy) <= *r,
            Shape::Path { rings, closed: true } => {
                rings.iter().filter(|r| point_in_ring(r, px, py)).count() % 2 == 1
            }
            Shape::Path {
                rings,
                closed: false,
            } => rings.iter().any(|r| {
                r.windows(2)
                    .any(|w| segment_distance(w[0], w[1], (px, py)) <= tolerance)
            }),
            Shape::Label { .. } => false,
        }
    }
}

/// Pointwise ring interpolation. Missing source points start at the nearest
/// existing one, so a growing polyline extends from its current end.
fn lerp_rings(from: &[Vec<Point>], to: &[Vec<Point>], t: f64) -> Vec<Vec<Point>> {
    to.iter()
        .enumerate()
        .map(|(i, ring)| {
            let src = from.get(i).or(from.last());
            ring.iter()
                .enumerate()
                .map(|(j, &(x2, y2))| {
                    let (x, y) = src
                        .and_then(|r| r.get(j).or(r.last()))
                        .copied()
                        .unwrap_or((x2, y2));
                    (x + (x2 - x) * t, y + (y2 - y) * t)
                })
                .collect()
        })
        .collect()
}

fn point_in_ring(ring: &[Point], px: f64, py: f64) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn segment_distance(a: Point, b: Point, p: Point) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    (p.0 - (a.0 + t * dx)).hypot(p.1 - (a.1 + t * dy))
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Paint {
    pub fill: Rgba,
    pub stroke: Rgba,
    pub stroke_width: f64,
    pub opacity: f64,
}

impl Paint {
    pub fn fill(color: Rgba) -> Self {
        Self {
            fill: color,
            stroke: Rgba::TRANSPARENT,
            stroke_width: 0.0,
            opacity: 1.0,
        }
    }

    pub fn stroke(color: Rgba, width: f64) -> Self {
        Self {
            fill: Rgba::TRANSPARENT,
            stroke: color,
            stroke_width: width,
            opacity: 1.0,
        }
    }

    pub fn with_stroke(mut self, color: Rgba, width: f64) -> Self {
        self.stroke = color;
        self.stroke_width = width;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn lerp(&self, to: &Paint, t: f64) -> Paint {
        Paint {
            fill: self.fill.lerp(to.fill, t),
            stroke: self.stroke.lerp(to.stroke, t),
            stroke_width: self.stroke_width + (to.stroke_width - self.stroke_width) * t,
            opacity: self.opacity + (to.opacity - self.opacity) * t,
        }
    }
}

/// One visual primitive. `entity` makes it a hover target.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Mark {
    pub key: ElementKey,
    pub shape: Shape,
    pub paint: Paint,
    pub entity: Option<EntityId>,
    /// Shape the element enters from and exits toward; defaults to `shape.collapsed()`.
    #[serde(skip)]
    pub origin: Option<Shape>,
}

impl Mark {
    pub fn new(key: ElementKey, shape: Shape, paint: Paint) -> Self {
        Self {
            key,
            shape,
            paint,
            entity: None,
            origin: None,
        }
    }

    pub fn for_entity(mut self, id: impl Into<EntityId>) -> Self {
        self.entity = Some(id.into());
        self
    }

    pub fn with_origin(mut self, origin: Shape) -> Self {
        self.origin = Some(origin);
        self
    }

    fn origin_shape(&self) -> Shape {
        self.origin.clone().unwrap_or_else(|| self.shape.collapsed())
    }
}

/// Legend attached to a frame for static export.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Legend {
    Categorical { items: Vec<(String, Rgba)> },
    Ramp { lo: f64, hi: f64, stops: Vec<Rgba> },
}

/// Target state of the scene for one step, in paint order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Frame {
    pub marks: Vec<Mark>,
    pub legend: Option<Legend>,
}

impl Frame {
    pub fn push(&mut self, mark: Mark) {
        self.marks.push(mark);
    }

    pub fn get(&self, id: &str, part: Part) -> Option<&Mark> {
        self.marks
            .iter()
            .find(|m| m.key.part == part && m.key.id == id)
    }
}

#[derive(Clone, Debug)]
struct Element {
    target: Mark,
    from_shape: Shape,
    from_paint: Paint,
    start: Duration,
    duration: Duration,
    exiting: bool,
}

impl Element {
    fn progress(&self, now: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.start).as_secs_f64();
        (elapsed / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    fn sample(&self, now: Duration, ease: Ease) -> (Shape, Paint) {
        let t = ease.apply(self.progress(now));
        if t >= 1.0 {
            return (self.target.shape.clone(), self.target.paint);
        }
        (
            self.from_shape.lerp(&self.target.shape, t),
            self.from_paint.lerp(&self.target.paint, t),
        )
    }
}

#[derive(Debug)]
pub struct Scene {
    elements: AHashMap<ElementKey, Element>,
    order: Vec<ElementKey>,
    ease: Ease,
    legend: Option<Legend>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(Ease::default())
    }
}

impl Scene {
    pub fn new(ease: Ease) -> Self {
        Self {
            elements: AHashMap::new(),
            order: Vec::new(),
            ease,
            legend: None,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn legend(&self) -> Option<&Legend> {
        self.legend.as_ref()
    }

    /// Drop every element, including in-flight transitions.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.order.clear();
        self.legend = None;
    }

    /// Keyed diff against the current state, transitioning over `duration`.
    pub fn apply(&mut self, frame: Frame, now: Duration, duration: Duration) {
        self.prune(now);
        let ease = self.ease;
        let mut seen: AHashSet<ElementKey> = AHashSet::with_capacity(frame.marks.len());
        let mut next_order = Vec::with_capacity(frame.marks.len() + self.order.len());

        for mark in frame.marks {
            seen.insert(mark.key.clone());
            next_order.push(mark.key.clone());
            match self.elements.get_mut(&mark.key) {
                Some(el) => {
                    let (shape, paint) = el.sample(now, ease);
                    el.from_shape = shape;
                    el.from_paint = paint;
                    el.target = mark;
                    el.start = now;
                    el.duration = duration;
                    el.exiting = false;
                }
                None => {
                    let el = Element {
                        from_shape: mark.origin_shape(),
                        from_paint: mark.paint.with_opacity(0.0),
                        target: mark,
                        start: now,
                        duration,
                        exiting: false,
                    };
                    self.elements.insert(el.target.key.clone(), el);
                }
            }
        }

        // exiting elements paint underneath, in their previous order
        let mut exiting = Vec::new();
        for key in &self.order {
            if seen.contains(key) {
                continue;
            }
            if let Some(el) = self.elements.get_mut(key) {
                if !el.exiting {
                    let (shape, paint) = el.sample(now, ease);
                    let origin = el.target.origin_shape();
                    el.target.shape = origin;
                    el.target.paint = paint.with_opacity(0.0);
                    el.from_shape = shape;
                    el.from_paint = paint;
                    el.start = now;
                    el.duration = duration;
                    el.exiting = true;
                }
                exiting.push(key.clone());
            }
        }
        exiting.extend(next_order);
        self.order = exiting;
        self.legend = frame.legend;
    }

    /// Replace the scene with `frame` immediately, discarding any transition.
    pub fn snap(&mut self, frame: Frame) {
        self.clear();
        for mark in frame.marks {
            self.order.push(mark.key.clone());
            let el = Element {
                from_shape: mark.shape.clone(),
                from_paint: mark.paint,
                target: mark,
                start: Duration::ZERO,
                duration: Duration::ZERO,
                exiting: false,
            };
            self.elements.insert(el.target.key.clone(), el);
        }
        self.legend = frame.legend;
    }

    /// Remove exit transitions that have finished.
    pub fn prune(&mut self, now: Duration) {
        let done: Vec<ElementKey> = self
            .elements
            .iter()
            .filter(|(_, el)| el.exiting && el.progress(now) >= 1.0)
            .map(|(k, _)| k.clone())
            .collect();
        if done.is_empty() {
            return;
        }
        for k in &done {
            self.elements.remove(k);
        }
        self.order.retain(|k| self.elements.contains_key(k));
    }

    pub fn is_animating(&self, now: Duration) -> bool {
        self.elements.values().any(|el| el.progress(now) < 1.0)
    }

    /// Whether `key` is present and not on its way out.
    pub fn contains(&self, key: &ElementKey) -> bool {
        self.elements.get(key).is_some_and(|el| !el.exiting)
    }

    pub fn is_exiting(&self, key: &ElementKey) -> bool {
        self.elements.get(key).is_some_and(|el| el.exiting)
    }

    /// Interpolated primitives at `now`, in paint order.
    pub fn sample(&self, now: Duration) -> Vec<Mark> {
        self.order
            .iter()
            .filter_map(|k| self.elements.get(k))
            .filter(|el| !(el.exiting && el.progress(now) >= 1.0))
            .map(|el| {
                let (shape, paint) = el.sample(now, self.ease);
                Mark {
                    key: el.target.key.clone(),
                    shape,
                    paint,
                    // exiting elements are no longer hover targets
                    entity: if el.exiting {
                        None
                    } else {
                        el.target.entity.clone()
                    },
                    origin: None,
                }
            })
            .collect()
    }
}

/// Topmost interactive primitive under the pointer.
pub fn hit_test(primitives: &[Mark], x: f64, y: f64) -> Option<&Mark> {
    primitives.iter().rev().find(|m| {
        m.entity.is_some() && m.shape.contains(x, y, m.paint.stroke_width / 2.0 + 3.0)
    })
}
