//! Legend band drawn beneath an exported frame.
//!
//! Categorical legends flow swatch + label items left to right, wrapping into
//! rows; sequential legends draw the color ramp with its end values.

use anyhow::{Result, anyhow};
use plotters::backend::DrawingBackend;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontFamily;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::text::{estimate_text_width_px, truncate_to_width};
use super::util::{format_number, to_plotters};
use crate::palette::{Rgba, ramp};
use crate::scene::Legend;

// Layout constants shared by the estimator and the painter.
const FONT_PX: u32 = 12;
const ROW_H: i32 = 18;
const PAD: i32 = 8;
const SWATCH: i32 = 10;
const SWATCH_GAP: i32 = 6;
const TRAILING: i32 = 16;
const MAX_LABEL_PX: u32 = 180;
const RAMP_H: i32 = 12;
const RAMP_SLICES: usize = 64;

fn item_label(label: &str) -> String {
    truncate_to_width(label, FONT_PX, MAX_LABEL_PX)
}

fn item_width(label: &str) -> i32 {
    SWATCH + SWATCH_GAP + estimate_text_width_px(&item_label(label), FONT_PX) as i32 + TRAILING
}

/// Greedy flow: `(x, row)` of every item inside a band `width` pixels wide.
fn flow(items: &[(String, Rgba)], width: i32) -> Vec<(i32, i32)> {
    let mut out = Vec::with_capacity(items.len());
    let (mut x, mut row) = (PAD, 0);
    for (label, _) in items {
        let w = item_width(label);
        if x + w > width - PAD && x > PAD {
            x = PAD;
            row += 1;
        }
        out.push((x, row));
        x += w;
    }
    out
}

/// Pixel height the legend band needs; 0 when there is nothing to show.
pub fn band_height(legend: &Legend, width: u32) -> u32 {
    let h = match legend {
        Legend::Categorical { items } if items.is_empty() => 0,
        Legend::Categorical { items } => {
            let rows = flow(items, width as i32)
                .last()
                .map_or(0, |&(_, row)| row + 1);
            rows * ROW_H + 2 * PAD
        }
        Legend::Ramp { stops, .. } if stops.is_empty() => 0,
        Legend::Ramp { .. } => RAMP_H + FONT_PX as i32 + 3 * PAD,
    };
    h.max(0) as u32
}

/// Paint `legend` into `area`. Labels are skipped when `with_text` is false
/// (bitmap output without a registered font).
pub fn draw_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    legend: &Legend,
    locale: &str,
    with_text: bool,
) -> Result<()> {
    area.fill(&WHITE).map_err(|e| anyhow!("{:?}", e))?;
    let (w, _) = area.dim_in_pixel();
    let w = w as i32;
    let axis = to_plotters(Rgba::AXIS, 1.0);
    let text_style = TextStyle::from((FontFamily::SansSerif, FONT_PX))
        .color(&axis)
        .pos(Pos::new(HPos::Left, VPos::Center));

    match legend {
        Legend::Categorical { items } => {
            for ((label, color), (x, row)) in items.iter().zip(flow(items, w)) {
                let cy = PAD + row * ROW_H + ROW_H / 2;
                area.draw(&Rectangle::new(
                    [(x, cy - SWATCH / 2), (x + SWATCH, cy + SWATCH / 2)],
                    to_plotters(*color, 1.0).filled(),
                ))
                .map_err(|e| anyhow!("{:?}", e))?;
                if with_text {
                    area.draw(&Text::new(
                        item_label(label),
                        (x + SWATCH + SWATCH_GAP, cy),
                        text_style.clone(),
                    ))
                    .map_err(|e| anyhow!("{:?}", e))?;
                }
            }
        }
        Legend::Ramp { lo, hi, stops } => {
            let x0 = PAD;
            let x1 = (w - PAD).max(x0 + RAMP_SLICES as i32);
            let slice = (x1 - x0) as f64 / RAMP_SLICES as f64;
            for i in 0..RAMP_SLICES {
                let t = i as f64 / (RAMP_SLICES - 1) as f64;
                let a = x0 + (i as f64 * slice).floor() as i32;
                let b = x0 + ((i + 1) as f64 * slice).ceil() as i32;
                area.draw(&Rectangle::new(
                    [(a, PAD), (b, PAD + RAMP_H)],
                    to_plotters(ramp(stops, t), 1.0).filled(),
                ))
                .map_err(|e| anyhow!("{:?}", e))?;
            }
            if with_text {
                let y = PAD * 2 + RAMP_H + FONT_PX as i32 / 2;
                area.draw(&Text::new(
                    format_number(*lo, locale),
                    (x0, y),
                    text_style.clone(),
                ))
                .map_err(|e| anyhow!("{:?}", e))?;
                area.draw(&Text::new(
                    format_number(*hi, locale),
                    (x1, y),
                    text_style.pos(Pos::new(HPos::Right, VPos::Center)),
                ))
                .map_err(|e| anyhow!("{:?}", e))?;
            }
        }
    }
    Ok(())
}
