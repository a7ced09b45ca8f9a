//! Bubble chart: x = primary metric, y = secondary, area = optional size metric.

use super::{RenderContext, axis_titles, label, x_axis, y_axis};
use crate::models::TimeStep;
use crate::palette::{Rgba, entity_color};
use crate::scales::KindScales;
use crate::scene::{Anchor, ElementKey, Frame, Mark, Paint, Part, Shape};

const DEFAULT_RADIUS: f64 = 6.0;
/// Bubbles at least this large get a name label.
const LABEL_RADIUS: f64 = 12.0;

pub fn render(ctx: &RenderContext, step: &TimeStep) -> Option<Frame> {
    let KindScales::Bubble { x, y, r } = &ctx.scales.kind else {
        return None;
    };
    let mut frame = Frame::default();
    x_axis(&mut frame, ctx, x, false);
    y_axis(&mut frame, ctx, y);
    let spec = ctx.spec;
    axis_titles(
        &mut frame,
        ctx,
        Some(spec.metric_key.as_str()),
        spec.secondary_metric_key.as_deref(),
    );

    let mut bubbles: Vec<(&String, f64, f64, f64)> = step
        .entities
        .iter()
        .filter_map(|(id, v)| {
            let sy = v.secondary()?;
            let radius = match (r, v.size()) {
                (Some(scale), Some(size)) => scale.map(size),
                _ => DEFAULT_RADIUS,
            };
            Some((id, x.map(v.primary()), y.map(sy), radius))
        })
        .filter(|(_, cx, cy, _)| cx.is_finite() && cy.is_finite())
        .collect();
    // large bubbles first so small ones stay visible on top
    bubbles.sort_by(|a, b| b.3.total_cmp(&a.3).then_with(|| a.0.cmp(b.0)));

    for (id, cx, cy, radius) in bubbles {
        frame.push(
            Mark::new(
                ElementKey::new(id.as_str(), Part::Mark),
                Shape::Circle { cx, cy, r: radius },
                Paint::fill(entity_color(id).with_alpha(190)).with_stroke(Rgba::WHITE, 1.0),
            )
            .for_entity(id.as_str()),
        );
        if radius >= LABEL_RADIUS {
            frame.push(label(
                id.as_str(),
                Part::Label,
                cx,
                cy - radius - 4.0,
                ctx.dataset.entity_label(id),
                Anchor::Middle,
                10.0,
            ));
        }
    }
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{
        ChartKind, ChartSpec, EntityValue, StepKey, TimeSeriesDataset, ValueShape, Viewport,
    };
    use crate::scales::build_scales;

    #[test]
    fn radius_follows_size_and_absent_entities_have_no_circle() {
        let mut ds = TimeSeriesDataset::empty(ValueShape::DualAxis);
        let mut s0 = TimeStep::new(StepKey::Numeric(2000.0));
        let v = |p, s, z| EntityValue::DualAxis {
            primary: p,
            secondary: s,
            size: Some(z),
        };
        s0.entities.insert("BIG".into(), v(1.0, 1.0, 400.0));
        s0.entities.insert("SML".into(), v(2.0, 2.0, 25.0));
        let mut s1 = TimeStep::new(StepKey::Numeric(2001.0));
        s1.entities.insert("BIG".into(), v(1.5, 1.5, 400.0));
        ds.steps.extend([s0, s1]);

        let spec = ChartSpec::new(ChartKind::Bubble, "gdp")
            .with_secondary("life")
            .with_size("pop");
        let cfg = EngineConfig::default();
        let scales = build_scales(&ds, &spec, Viewport::new(800.0, 600.0), &cfg, None);
        let ctx = |index| RenderContext {
            dataset: &ds,
            spec: &spec,
            scales: &scales,
            config: &cfg,
            index,
        };
        let frame = render(&ctx(0), &ds.steps[0]).unwrap();
        let radius = |f: &Frame, id: &str| match f.get(id, Part::Mark).map(|m| &m.shape) {
            Some(Shape::Circle { r, .. }) => *r,
            _ => f64::NAN,
        };
        assert!(radius(&frame, "BIG") > radius(&frame, "SML"));
        // painted first
        let first = frame.marks.iter().position(|m| m.key.part == Part::Mark).unwrap();
        assert_eq!(frame.marks[first].key.id, "BIG");

        let frame = render(&ctx(1), &ds.steps[1]).unwrap();
        assert!(frame.get("SML", Part::Mark).is_none());
    }
}
