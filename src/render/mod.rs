//! Frame renderer: one module per chart kind, dispatched exhaustively on [`ChartKind`].
//!
//! Renderers are pure: they turn `(step, scales)` into a [`Frame`] and leave the
//! keyed diff and transitions to [`crate::scene::Scene`].

pub mod bubble;
pub mod category_bars;
pub mod choropleth;
pub mod pyramid;
pub mod ranked_bars;
pub mod series;

use crate::config::EngineConfig;
use crate::models::{ChartKind, ChartSpec, TimeSeriesDataset, TimeStep, Viewport};
use crate::palette::Rgba;
use crate::scales::{LinearScale, ScaleSet};
use crate::scene::{Anchor, ElementKey, Frame, Mark, Paint, Part, Shape};
use crate::viz::util::{format_number, format_tick};
use log::warn;

pub use choropleth::{JoinReport, join_report};

pub(crate) const GRID: Rgba = Rgba::rgb(230, 230, 230);
pub(crate) const STEP_LABEL: Rgba = Rgba::rgb(190, 190, 190);

/// Inputs of one render call.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub dataset: &'a TimeSeriesDataset,
    pub spec: &'a ChartSpec,
    pub scales: &'a ScaleSet,
    pub config: &'a EngineConfig,
    pub index: usize,
}

impl RenderContext<'_> {
    pub fn step(&self) -> Option<&TimeStep> {
        self.dataset.step(self.index)
    }

    pub fn fmt(&self, v: f64) -> String {
        format_number(v, &self.config.locale)
    }
}

/// Produce the target frame for the current step.
pub fn render_frame(ctx: &RenderContext) -> Frame {
    let Some(step) = ctx.step() else {
        return empty_frame(ctx.scales.viewport, &ctx.spec.display_title());
    };

    let frame = match ctx.spec.kind {
        ChartKind::RankedBars => ranked_bars::render(ctx, step),
        ChartKind::Choropleth => choropleth::render(ctx, step),
        ChartKind::PopulationPyramid => pyramid::render(ctx, step),
        ChartKind::Bubble => bubble::render(ctx, step),
        ChartKind::Line => series::render(ctx, series::SeriesStyle::Line),
        ChartKind::Area => series::render(ctx, series::SeriesStyle::Area),
        ChartKind::CategoryBars => category_bars::render(ctx, step),
    };
    let Some(mut frame) = frame else {
        warn!("scale set does not match chart kind {}", ctx.spec.kind);
        return error_frame(ctx.scales.viewport, "internal: scales out of date");
    };
    chrome(&mut frame, ctx, step);
    frame
}

/// Title and the large step label shared by every kind.
fn chrome(frame: &mut Frame, ctx: &RenderContext, step: &TimeStep) {
    title(frame, ctx.scales.viewport, &ctx.spec.display_title());
    let plot = ctx.scales.plot;
    frame.push(Mark::new(
        ElementKey::new("step", Part::Title),
        Shape::Label {
            x: plot.x1 - 8.0,
            y: plot.y1 - 12.0,
            text: step.key.label(),
            anchor: Anchor::End,
            size: 36.0,
        },
        Paint::fill(STEP_LABEL),
    ));
}

fn title(frame: &mut Frame, viewport: Viewport, text: &str) {
    frame.push(Mark::new(
        ElementKey::new("title", Part::Title),
        Shape::Label {
            x: viewport.width / 2.0,
            y: 24.0,
            text: text.to_string(),
            anchor: Anchor::Middle,
            size: 18.0,
        },
        Paint::fill(Rgba::BLACK),
    ));
}

/// Explicit empty state for a zero-step dataset.
pub fn empty_frame(viewport: Viewport, heading: &str) -> Frame {
    let mut frame = Frame::default();
    title(&mut frame, viewport, heading);
    frame.push(centered("nodata", viewport, "No data"));
    frame
}

/// Error state: the message and nothing else.
pub fn error_frame(viewport: Viewport, message: &str) -> Frame {
    let mut frame = Frame::default();
    frame.push(centered("error", viewport, message));
    frame
}

pub(crate) fn centered(id: &str, viewport: Viewport, text: &str) -> Mark {
    Mark::new(
        ElementKey::new(id, Part::Title),
        Shape::Label {
            x: viewport.width / 2.0,
            y: viewport.height / 2.0,
            text: text.to_string(),
            anchor: Anchor::Middle,
            size: 16.0,
        },
        Paint::fill(Rgba::AXIS),
    )
}

pub(crate) fn label(
    id: impl Into<String>,
    part: Part,
    x: f64,
    y: f64,
    text: String,
    anchor: Anchor,
    size: f64,
) -> Mark {
    Mark::new(
        ElementKey::new(id, part),
        Shape::Label {
            x,
            y,
            text,
            anchor,
            size,
        },
        Paint::fill(Rgba::AXIS),
    )
}

fn line(id: String, a: (f64, f64), b: (f64, f64), color: Rgba) -> Mark {
    Mark::new(
        ElementKey::new(id, Part::Axis),
        Shape::Path {
            rings: vec![vec![a, b]],
            closed: false,
        },
        Paint::stroke(color, 1.0),
    )
}

/// Vertical gridlines with tick labels above (`top`) or below the plot.
pub(crate) fn x_axis(frame: &mut Frame, ctx: &RenderContext, scale: &LinearScale, top: bool) {
    let plot = ctx.scales.plot;
    for (i, tick) in scale.ticks(5).into_iter().enumerate() {
        let x = scale.map(tick);
        frame.push(line(format!("xgrid:{i}"), (x, plot.y0), (x, plot.y1), GRID));
        let y = if top { plot.y0 - 6.0 } else { plot.y1 + 16.0 };
        frame.push(label(
            format!("xtick:{i}"),
            Part::Axis,
            x,
            y,
            format_tick(tick, scale.domain, &ctx.config.locale),
            Anchor::Middle,
            11.0,
        ));
    }
}

/// Horizontal gridlines with tick labels left of the plot.
pub(crate) fn y_axis(frame: &mut Frame, ctx: &RenderContext, scale: &LinearScale) {
    let plot = ctx.scales.plot;
    for (i, tick) in scale.ticks(5).into_iter().enumerate() {
        let y = scale.map(tick);
        frame.push(line(format!("ygrid:{i}"), (plot.x0, y), (plot.x1, y), GRID));
        frame.push(label(
            format!("ytick:{i}"),
            Part::Axis,
            plot.x0 - 6.0,
            y + 4.0,
            format_tick(tick, scale.domain, &ctx.config.locale),
            Anchor::End,
            11.0,
        ));
    }
}

/// Axis titles from the chart labels, falling back to metric keys.
pub(crate) fn axis_titles(
    frame: &mut Frame,
    ctx: &RenderContext,
    x: Option<&str>,
    y: Option<&str>,
) {
    let plot = ctx.scales.plot;
    let labels = &ctx.spec.labels;
    if let Some(text) = labels.x_axis.as_deref().or(x).filter(|t| !t.is_empty()) {
        frame.push(label(
            "xaxis",
            Part::Title,
            (plot.x0 + plot.x1) / 2.0,
            plot.y1 + 30.0,
            text.to_string(),
            Anchor::Middle,
            12.0,
        ));
    }
    if let Some(text) = labels.y_axis.as_deref().or(y).filter(|t| !t.is_empty()) {
        frame.push(label(
            "yaxis",
            Part::Title,
            plot.x0,
            plot.y0 - 10.0,
            text.to_string(),
            Anchor::Start,
            12.0,
        ));
    }
}

/// Readable text color on top of `fill`.
pub(crate) fn contrast(fill: Rgba) -> Rgba {
    if fill.luminance() > 0.6 {
        Rgba::BLACK
    } else {
        Rgba::WHITE
    }
}
