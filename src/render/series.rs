//! Line and area charts, revealed up to the current step.
//!
//! The x axis is the step position, so numeric, date and ordinal keys all lay
//! out the same way. A step where an entity is absent breaks its line.

use super::{RenderContext, axis_titles, label, y_axis};
use crate::models::EntityId;
use crate::palette::{Rgba, entity_color};
use crate::scales::{KindScales, LinearScale};
use crate::scene::{Anchor, ElementKey, Frame, Legend, Mark, Paint, Part, Point, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStyle {
    Line,
    Area,
}

/// Maximum number of step labels along the x axis.
const MAX_X_LABELS: usize = 8;

pub fn render(ctx: &RenderContext, style: SeriesStyle) -> Option<Frame> {
    let KindScales::Series { x, y } = &ctx.scales.kind else {
        return None;
    };
    let mut frame = Frame::default();
    y_axis(&mut frame, ctx, y);
    step_axis(&mut frame, ctx, x);
    axis_titles(&mut frame, ctx, None, Some(ctx.spec.metric_key.as_str()));

    let baseline = y.map(0.0f64.clamp(y.domain.0, y.domain.1));
    let mut legend = Vec::new();

    for id in ctx.dataset.entity_ids() {
        let segments = segments(ctx, &id, x, y);
        if segments.is_empty() {
            continue;
        }
        let color = entity_color(&id);
        legend.push((ctx.dataset.entity_label(&id), color));

        match style {
            SeriesStyle::Line => frame.push(
                Mark::new(
                    ElementKey::new(id.as_str(), Part::Series),
                    Shape::Path {
                        rings: segments,
                        closed: false,
                    },
                    Paint::stroke(color, 2.0),
                )
                .for_entity(id.as_str()),
            ),
            SeriesStyle::Area => {
                let rings = segments
                    .iter()
                    .map(|seg| close_to_baseline(seg, baseline))
                    .collect();
                frame.push(
                    Mark::new(
                        ElementKey::new(id.as_str(), Part::Series),
                        Shape::Path {
                            rings,
                            closed: true,
                        },
                        Paint::fill(color.with_alpha(90)).with_stroke(color, 1.5),
                    )
                    .for_entity(id.as_str()),
                );
            }
        }

        // marker only where the entity has a value at the current step
        let current = ctx
            .step()
            .and_then(|s| s.get(&id))
            .map(|v| (x.map(ctx.index as f64), y.map(v.primary())));
        if let Some((cx, cy)) = current {
            frame.push(
                Mark::new(
                    ElementKey::new(id.as_str(), Part::Mark),
                    Shape::Circle { cx, cy, r: 3.5 },
                    Paint::fill(color).with_stroke(Rgba::WHITE, 1.0),
                )
                .for_entity(id.as_str()),
            );
        }
    }
    if !legend.is_empty() {
        frame.legend = Some(Legend::Categorical { items: legend });
    }
    Some(frame)
}

/// Contiguous runs of present values from step 0 to the current step.
fn segments(
    ctx: &RenderContext,
    id: &EntityId,
    x: &LinearScale,
    y: &LinearScale,
) -> Vec<Vec<Point>> {
    let mut out: Vec<Vec<Point>> = Vec::new();
    let mut run: Vec<Point> = Vec::new();
    for (i, step) in ctx.dataset.steps.iter().enumerate().take(ctx.index + 1) {
        match step.get(id).map(|v| v.primary()).filter(|v| v.is_finite()) {
            Some(v) => run.push((x.map(i as f64), y.map(v))),
            None if !run.is_empty() => out.push(std::mem::take(&mut run)),
            None => {}
        }
    }
    if !run.is_empty() {
        out.push(run);
    }
    out
}

fn close_to_baseline(seg: &[Point], baseline: f64) -> Vec<Point> {
    let mut ring = seg.to_vec();
    if let (Some(first), Some(last)) = (seg.first(), seg.last()) {
        ring.push((last.0, baseline));
        ring.push((first.0, baseline));
    }
    ring
}

fn step_axis(frame: &mut Frame, ctx: &RenderContext, x: &LinearScale) {
    let plot = ctx.scales.plot;
    let n = ctx.dataset.len();
    if n == 0 {
        return;
    }
    let every = n.div_ceil(MAX_X_LABELS).max(1);
    for (i, step) in ctx.dataset.steps.iter().enumerate().step_by(every) {
        frame.push(label(
            format!("xstep:{i}"),
            Part::Axis,
            x.map(i as f64),
            plot.y1 + 16.0,
            step.key.label(),
            Anchor::Middle,
            11.0,
        ));
    }
}
