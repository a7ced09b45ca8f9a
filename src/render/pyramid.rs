//! Population pyramid for one focus entity: left and right bars per age band,
//! mirrored around the center line on a shared magnitude.

use super::{GRID, RenderContext, centered, label};
use crate::models::TimeStep;
use crate::palette::pyramid_sides;
use crate::scales::KindScales;
use crate::scene::{Anchor, ElementKey, Frame, Legend, Mark, Paint, Part, Shape};
use crate::viz::util::format_tick;

pub fn render(ctx: &RenderContext, step: &TimeStep) -> Option<Frame> {
    let KindScales::Pyramid {
        focus,
        left,
        right,
        bands,
    } = &ctx.scales.kind
    else {
        return None;
    };
    let plot = ctx.scales.plot;
    let mid = left.range.0;
    let (left_color, right_color) = pyramid_sides();
    let mut frame = Frame::default();

    // mirrored ticks on the shared magnitude
    for (i, tick) in left.ticks(4).into_iter().enumerate() {
        let text = format_tick(tick, left.domain, &ctx.config.locale);
        for (side, scale) in [("l", left), ("r", right)] {
            if i == 0 && side == "r" {
                continue;
            }
            let x = scale.map(tick);
            frame.push(Mark::new(
                ElementKey::new(format!("grid:{side}{i}"), Part::Axis),
                Shape::Path {
                    rings: vec![vec![(x, plot.y0), (x, plot.y1)]],
                    closed: false,
                },
                Paint::stroke(GRID, 1.0),
            ));
            frame.push(label(
                format!("tick:{side}{i}"),
                Part::Axis,
                x,
                plot.y1 + 16.0,
                text.clone(),
                Anchor::Middle,
                11.0,
            ));
        }
    }

    let entity = focus.as_deref().and_then(|id| step.get(id).map(|v| (id, v)));
    let Some((id, value)) = entity else {
        let who = focus.as_deref().unwrap_or("this step");
        frame.push(centered(
            "nodata",
            ctx.scales.viewport,
            &format!("No data for {who} at {}", step.key),
        ));
        return Some(frame);
    };

    let h = bands.bandwidth();
    for band in value.bands() {
        let Some(y) = bands.position(&band.group) else {
            continue;
        };
        let lx = left.map(band.left);
        let rx = right.map(band.right);
        let collapsed = Shape::Rect {
            x: mid,
            y,
            width: 0.0,
            height: h,
        };
        frame.push(
            Mark::new(
                ElementKey::new(band.group.as_str(), Part::Left),
                Shape::Rect {
                    x: lx,
                    y,
                    width: mid - lx,
                    height: h,
                },
                Paint::fill(left_color),
            )
            .for_entity(id)
            .with_origin(collapsed.clone()),
        );
        frame.push(
            Mark::new(
                ElementKey::new(band.group.as_str(), Part::Right),
                Shape::Rect {
                    x: mid,
                    y,
                    width: rx - mid,
                    height: h,
                },
                Paint::fill(right_color),
            )
            .for_entity(id)
            .with_origin(collapsed),
        );
        frame.push(label(
            band.group.as_str(),
            Part::Label,
            plot.x0 - 6.0,
            y + h / 2.0 + 4.0,
            band.group.clone(),
            Anchor::End,
            11.0,
        ));
    }

    let legend = ctx.spec.labels.legend.as_deref();
    let (l, r) = legend
        .and_then(|s| s.split_once('/'))
        .map(|(l, r)| (l.trim().to_string(), r.trim().to_string()))
        .unwrap_or_else(|| ("Male".to_string(), "Female".to_string()));
    frame.legend = Some(Legend::Categorical {
        items: vec![(l, left_color), (r, right_color)],
    });
    frame.push(label(
        "focus",
        Part::Title,
        plot.x0,
        plot.y0 - 10.0,
        ctx.dataset.entity_label(id),
        Anchor::Start,
        13.0,
    ));
    Some(frame)
}
