//! Bar race: one row per entity, ordered by this step's ranking.
//!
//! Bars, labels and values are keyed by entity id, so a rank change moves the
//! existing bar to its new row instead of swapping values between rows.

use super::{RenderContext, contrast, label, x_axis};
use crate::models::TimeStep;
use crate::palette::entity_color;
use crate::scales::{KindScales, rank_order};
use crate::scene::{Anchor, ElementKey, Frame, Mark, Paint, Part, Shape};

pub fn render(ctx: &RenderContext, step: &TimeStep) -> Option<Frame> {
    let KindScales::RankedBars { x, rows, top_n } = &ctx.scales.kind else {
        return None;
    };
    let mut frame = Frame::default();
    x_axis(&mut frame, ctx, x, true);

    let h = rows.bandwidth();
    let base = x.map(0.0);
    // rows enter from and exit to the slot just below the last visible one
    let offstage_y = rows.at(*top_n);

    for (rank, (id, value)) in rank_order(step).into_iter().take(*top_n).enumerate() {
        let y = rows.at(rank);
        let end = x.map(value);
        let color = entity_color(id);
        let (bx, bw) = (base.min(end), (end - base).abs());

        frame.push(
            Mark::new(
                ElementKey::new(id.as_str(), Part::Bar),
                Shape::Rect {
                    x: bx,
                    y,
                    width: bw,
                    height: h,
                },
                Paint::fill(color),
            )
            .for_entity(id.as_str())
            .with_origin(Shape::Rect {
                x: base,
                y: offstage_y,
                width: 0.0,
                height: h,
            }),
        );

        let name = step
            .get(id)
            .and_then(|v| v.label())
            .map(str::to_string)
            .unwrap_or_else(|| ctx.dataset.entity_label(id));
        let text_y = y + h / 2.0 + 4.0;
        let name_mark = label(
            id.as_str(),
            Part::Label,
            base - 6.0,
            text_y,
            name,
            Anchor::End,
            12.0,
        );
        let origin = offstage(&name_mark.shape, offstage_y);
        frame.push(name_mark.with_origin(origin));

        // value inside the bar when it fits, else after its end
        let text = ctx.fmt(value);
        let inside = bw > text.chars().count() as f64 * 7.0 + 12.0;
        let mut value_mark = label(
            id.as_str(),
            Part::Value,
            if inside { end - 6.0 } else { end + 6.0 },
            text_y,
            text,
            if inside { Anchor::End } else { Anchor::Start },
            11.0,
        );
        if inside {
            value_mark.paint.fill = contrast(color);
        }
        let origin = offstage(&value_mark.shape, offstage_y);
        frame.push(value_mark.with_origin(origin));
    }
    Some(frame)
}

fn offstage(shape: &Shape, y: f64) -> Shape {
    match shape {
        Shape::Label {
            x,
            text,
            anchor,
            size,
            ..
        } => Shape::Label {
            x: *x,
            y,
            text: text.clone(),
            anchor: *anchor,
            size: *size,
        },
        other => other.collapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{
        ChartKind, ChartSpec, EntityValue, StepKey, TimeSeriesDataset, ValueShape, Viewport,
    };
    use crate::scales::build_scales;

    fn lp(label: &str, value: f64) -> EntityValue {
        EntityValue::LabeledPoint {
            label: label.into(),
            value,
        }
    }

    fn dataset() -> TimeSeriesDataset {
        let mut ds = TimeSeriesDataset::empty(ValueShape::LabeledPoint);
        let mut s0 = TimeStep::new(StepKey::Numeric(2000.0));
        s0.entities.insert("DEU".into(), lp("Germany", 10.0));
        s0.entities.insert("FRA".into(), lp("France", 20.0));
        s0.entities.insert("ITA".into(), lp("Italy", 20.0));
        s0.entities.insert("ESP".into(), lp("Spain", 1.0));
        ds.steps.push(s0);
        ds
    }

    fn row_y(frame: &Frame, id: &str) -> f64 {
        match frame.get(id, Part::Bar).map(|m| &m.shape) {
            Some(Shape::Rect { y, .. }) => *y,
            _ => f64::NAN,
        }
    }

    #[test]
    fn rows_follow_rank_with_id_tiebreak_and_top_n() {
        let ds = dataset();
        let spec = ChartSpec::new(ChartKind::RankedBars, "gdp").with_top_n(3);
        let cfg = EngineConfig::default();
        let scales = build_scales(&ds, &spec, Viewport::new(800.0, 400.0), &cfg, None);
        let ctx = RenderContext {
            dataset: &ds,
            spec: &spec,
            scales: &scales,
            config: &cfg,
            index: 0,
        };
        let frame = render(&ctx, &ds.steps[0]).unwrap();
        assert!(row_y(&frame, "FRA") < row_y(&frame, "ITA"));
        assert!(row_y(&frame, "ITA") < row_y(&frame, "DEU"));
        assert!(frame.get("ESP", Part::Bar).is_none());
        let label = frame.get("FRA", Part::Label).unwrap();
        assert!(matches!(&label.shape, Shape::Label { text, .. } if text == "France"));
    }
}
