//! Static export: draw sampled scene primitives to **SVG** or **PNG**.
//!
//! The primitives are already in pixel space, so export is a straight paint in
//! order, plus an optional legend band beneath the chart.

pub mod legend;
pub mod text;
pub mod util;

use crate::scene::{Anchor, Legend, Mark, Shape};
use anyhow::{Context, Result, anyhow};
use log::warn;
use plotters::backend::DrawingBackend;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontFamily;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_bitmap::BitMapBackend;
use plotters_svg::SVGBackend;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use legend::{band_height, draw_legend};
use util::to_plotters;

/// The `ab_glyph` text path does not discover OS fonts, so bitmap output can
/// only draw text once a host has registered one.
static FONT_READY: AtomicBool = AtomicBool::new(false);
static NO_FONT_WARNING: Once = Once::new();

/// Register a TTF/OTF font as the `sans-serif` family for bitmap text.
pub fn register_font(bytes: &'static [u8]) -> Result<()> {
    plotters::style::register_font("sans-serif", FontStyle::Normal, bytes)
        .map_err(|_| anyhow!("invalid font data"))?;
    FONT_READY.store(true, Ordering::Release);
    Ok(())
}

/// Read a font file and register it. The bytes live for the rest of the process.
pub fn register_font_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
    register_font(Box::leak(bytes.into_boxed_slice()))
}

pub fn font_registered() -> bool {
    FONT_READY.load(Ordering::Acquire)
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}

/// Write `primitives` (a sampled frame, `width`×`height` px) to `path`.
///
/// The format follows the extension: `.svg` is vector output, anything else goes
/// through the bitmap backend. A legend adds a band below the chart area.
pub fn export_frame<P: AsRef<Path>>(
    primitives: &[Mark],
    path: P,
    width: u32,
    height: u32,
    legend: Option<&Legend>,
    locale: &str,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let (width, height) = (width.max(1), height.max(1));
    let band = legend.map_or(0, |l| band_height(l, width));
    let size = (width, height + band);

    if is_svg(path) {
        let root = SVGBackend::new(path, size).into_drawing_area();
        draw_page(&root, primitives, height, legend, locale, true)?;
    } else {
        let with_text = font_registered();
        if !with_text {
            NO_FONT_WARNING.call_once(|| {
                warn!("no font registered; bitmap export draws shapes without labels")
            });
        }
        let root = BitMapBackend::new(path, size).into_drawing_area();
        draw_page(&root, primitives, height, legend, locale, with_text)?;
    }
    Ok(())
}

fn draw_page<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    primitives: &[Mark],
    chart_height: u32,
    legend: Option<&Legend>,
    locale: &str,
    with_text: bool,
) -> Result<()> {
    root.fill(&WHITE).map_err(|e| anyhow!("{:?}", e))?;
    let (chart, band) = root.split_vertically(chart_height);
    draw_marks(&chart, primitives, with_text)?;
    if let Some(legend) = legend.filter(|l| band_height(l, root.dim_in_pixel().0) > 0) {
        draw_legend(&band, legend, locale, with_text)?;
    }
    root.present().map_err(|e| anyhow!("{:?}", e))?;
    Ok(())
}

fn px(v: f64) -> i32 {
    v.round() as i32
}

fn stroke_px(w: f64) -> u32 {
    w.round().max(1.0) as u32
}

/// Paint primitives in order. Fully transparent marks are skipped.
pub fn draw_marks<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    primitives: &[Mark],
    with_text: bool,
) -> Result<()> {
    for mark in primitives {
        let paint = &mark.paint;
        if paint.opacity <= 0.0 {
            continue;
        }
        let fill = to_plotters(paint.fill, paint.opacity);
        let stroke = to_plotters(paint.stroke, paint.opacity);
        let has_fill = paint.fill.a > 0;
        let has_stroke = paint.stroke_width > 0.0 && paint.stroke.a > 0;

        match &mark.shape {
            Shape::Rect {
                x,
                y,
                width,
                height,
            } => {
                if *width <= 0.0 || *height <= 0.0 {
                    continue;
                }
                let corners = [(px(*x), px(*y)), (px(x + width), px(y + height))];
                if has_fill {
                    area.draw(&Rectangle::new(corners, fill.filled()))
                        .map_err(|e| anyhow!("{:?}", e))?;
                }
                if has_stroke {
                    area.draw(&Rectangle::new(
                        corners,
                        stroke.stroke_width(stroke_px(paint.stroke_width)),
                    ))
                    .map_err(|e| anyhow!("{:?}", e))?;
                }
            }
            Shape::Circle { cx, cy, r } => {
                if *r <= 0.0 {
                    continue;
                }
                let center = (px(*cx), px(*cy));
                let radius = r.round().max(1.0) as i32;
                if has_fill {
                    area.draw(&Circle::new(center, radius, fill.filled()))
                        .map_err(|e| anyhow!("{:?}", e))?;
                }
                if has_stroke {
                    area.draw(&Circle::new(
                        center,
                        radius,
                        stroke.stroke_width(stroke_px(paint.stroke_width)),
                    ))
                    .map_err(|e| anyhow!("{:?}", e))?;
                }
            }
            Shape::Path { rings, closed } => {
                for ring in rings.iter().filter(|r| r.len() >= 2) {
                    let points: Vec<(i32, i32)> = ring.iter().map(|&(x, y)| (px(x), px(y))).collect();
                    if *closed && has_fill && points.len() >= 3 {
                        area.draw(&Polygon::new(points.clone(), fill.filled()))
                            .map_err(|e| anyhow!("{:?}", e))?;
                    }
                    if has_stroke {
                        let first = points[0];
                        let mut outline = points;
                        if *closed {
                            outline.push(first);
                        }
                        area.draw(&PathElement::new(
                            outline,
                            stroke.stroke_width(stroke_px(paint.stroke_width)),
                        ))
                        .map_err(|e| anyhow!("{:?}", e))?;
                    }
                }
            }
            Shape::Label {
                x,
                y,
                text,
                anchor,
                size,
            } => {
                if !with_text || text.is_empty() {
                    continue;
                }
                let h = match anchor {
                    Anchor::Start => HPos::Left,
                    Anchor::Middle => HPos::Center,
                    Anchor::End => HPos::Right,
                };
                let style = TextStyle::from((FontFamily::SansSerif, *size))
                    .color(&fill)
                    .pos(Pos::new(h, VPos::Bottom));
                area.draw(&Text::new(text.clone(), (px(*x), px(*y)), style))
                    .map_err(|e| anyhow!("{:?}", e))?;
            }
        }
    }
    Ok(())
}
