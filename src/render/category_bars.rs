//! Vertical bars, one fixed slot per entity; absent entities leave their slot empty.

use super::{RenderContext, axis_titles, label, y_axis};
use crate::models::TimeStep;
use crate::palette::entity_color;
use crate::scales::KindScales;
use crate::scene::{Anchor, ElementKey, Frame, Mark, Paint, Part, Shape};

pub fn render(ctx: &RenderContext, step: &TimeStep) -> Option<Frame> {
    let KindScales::CategoryBars { categories, y } = &ctx.scales.kind else {
        return None;
    };
    let plot = ctx.scales.plot;
    let mut frame = Frame::default();
    y_axis(&mut frame, ctx, y);
    axis_titles(&mut frame, ctx, None, Some(ctx.spec.metric_key.as_str()));

    let w = categories.bandwidth();
    let base = y.map(0.0);
    for (i, id) in categories.domain.iter().enumerate() {
        let x = categories.at(i);
        frame.push(label(
            id.as_str(),
            Part::Label,
            x + w / 2.0,
            plot.y1 + 16.0,
            ctx.dataset.entity_label(id),
            Anchor::Middle,
            11.0,
        ));
        let Some(value) = step.get(id).map(|v| v.primary()) else {
            continue;
        };
        let top = y.map(value);
        frame.push(
            Mark::new(
                ElementKey::new(id.as_str(), Part::Bar),
                Shape::Rect {
                    x,
                    y: top.min(base),
                    width: w,
                    height: (top - base).abs(),
                },
                Paint::fill(entity_color(id)),
            )
            .for_entity(id.as_str())
            .with_origin(Shape::Rect {
                x,
                y: base,
                width: w,
                height: 0.0,
            }),
        );
        let text_y = if value >= 0.0 { top - 4.0 } else { top + 12.0 };
        frame.push(label(
            id.as_str(),
            Part::Value,
            x + w / 2.0,
            text_y,
            ctx.fmt(value),
            Anchor::Middle,
            10.0,
        ));
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
    fn zero_is_a_bar_and_absence_is_not() {
        let mut ds = TimeSeriesDataset::empty(ValueShape::Scalar);
        let mut s0 = TimeStep::new(StepKey::Numeric(1.0));
        s0.entities.insert("A".into(), EntityValue::Scalar(0.0));
        s0.entities.insert("B".into(), EntityValue::Scalar(5.0));
        let mut s1 = TimeStep::new(StepKey::Numeric(2.0));
        s1.entities.insert("B".into(), EntityValue::Scalar(6.0));
        ds.steps.extend([s0, s1]);

        let spec = ChartSpec::new(ChartKind::CategoryBars, "v");
        let cfg = EngineConfig::default();
        let scales = build_scales(&ds, &spec, Viewport::new(640.0, 480.0), &cfg, None);
        let ctx = |index| RenderContext {
            dataset: &ds,
            spec: &spec,
            scales: &scales,
            config: &cfg,
            index,
        };
        let f0 = render(&ctx(0), &ds.steps[0]).unwrap();
        assert!(f0.get("A", Part::Bar).is_some());
        let f1 = render(&ctx(1), &ds.steps[1]).unwrap();
        assert!(f1.get("A", Part::Bar).is_none());
        // slot label stays so the gap reads as a gap
        assert!(f1.get("A", Part::Label).is_some());
    }
}
