//! Colors: categorical entity colors from the Microsoft Office palette, a sequential
//! ramp for choropleths, and HSL helpers for the population pyramid sides.
//!
//! All mappings are deterministic: identical ids always get identical colors.

use serde::{Deserialize, Serialize};
use std::hash::{DefaultHasher, Hash, Hasher};

/// RGBA color; `a` is 0..=255.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque RGB color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const AXIS: Rgba = Rgba::rgb(99, 99, 99);

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let h = hex.trim().trim_start_matches('#');
        let byte = |i: usize| u8::from_str_radix(h.get(i..i + 2)?, 16).ok();
        match h.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Component-wise linear interpolation.
    pub fn lerp(self, other: Rgba, t: f64) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgba::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    /// Multiply RGB by `factor` (clamped), keeping alpha.
    pub fn scale_brightness(self, factor: f64) -> Rgba {
        let adj = |c: u8| (c as f64 * factor).clamp(0.0, 255.0) as u8;
        Rgba::new(adj(self.r), adj(self.g), adj(self.b), self.a)
    }

    /// Relative luminance in 0..1, used to pick readable label colors.
    pub fn luminance(self) -> f64 {
        (0.2126 * self.r as f64 + 0.7152 * self.g as f64 + 0.0722 * self.b as f64) / 255.0
    }
}

/// Microsoft Office (2013+) chart series palette.
/// Order: Blue, Orange, Gray, Gold, Light Blue, Green, Dark Blue, Dark Orange, Dark Gray, Brownish Gold.
pub const OFFICE10: [Rgba; 10] = [
    Rgba::rgb(68, 114, 196),  // blue      (#4472C4)
    Rgba::rgb(237, 125, 49),  // orange    (#ED7D31)
    Rgba::rgb(165, 165, 165), // gray      (#A5A5A5)
    Rgba::rgb(255, 192, 0),   // gold      (#FFC000)
    Rgba::rgb(91, 155, 213),  // light blue(#5B9BD5)
    Rgba::rgb(112, 173, 71),  // green     (#70AD47)
    Rgba::rgb(38, 68, 120),   // dark blue (#264478)
    Rgba::rgb(158, 72, 14),   // dark org. (#9E480E)
    Rgba::rgb(99, 99, 99),    // dark gray (#636363)
    Rgba::rgb(153, 115, 0),   // brownish  (#997300)
];

/// Get a color from the Office palette.
#[inline]
pub fn office_color(idx: usize) -> Rgba {
    OFFICE10[idx % OFFICE10.len()]
}

/// Stable color for an entity id: palette slot by hash, shade by a second hash.
///
/// Bars keep their color while they move between ranks.
pub fn entity_color(id: &str) -> Rgba {
    let h = stable_hash64(id);
    let base = office_color((h % OFFICE10.len() as u64) as usize);
    let brightness = 0.8 + 0.4 * ((h.rotate_left(17) % 100) as f64 / 100.0);
    base.scale_brightness(brightness)
}

/// Multi-stop sequential ramp (light yellow → dark red), in the spirit of ColorBrewer `YlOrRd`.
pub const SEQUENTIAL_YL_OR_RD: [Rgba; 6] = [
    Rgba::rgb(255, 255, 204),
    Rgba::rgb(254, 217, 118),
    Rgba::rgb(253, 141, 60),
    Rgba::rgb(240, 59, 32),
    Rgba::rgb(189, 0, 38),
    Rgba::rgb(128, 0, 38),
];

/// Sample a piecewise-linear ramp at `t` in 0..1.
pub fn ramp(stops: &[Rgba], t: f64) -> Rgba {
    match stops.len() {
        0 => Rgba::TRANSPARENT,
        1 => stops[0],
        n => {
            let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
            let pos = t * (n - 1) as f64;
            let i = (pos.floor() as usize).min(n - 2);
            stops[i].lerp(stops[i + 1], pos - i as f64)
        }
    }
}

/// HSL color (hue in degrees, saturation/lightness in 0..1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    pub h_deg: f64,
    pub s: f64,
    pub l: f64,
}

// HSL -> RGB conversion (linear; sufficient for chart colors)
pub fn hsl_to_rgba(hsl: Hsl) -> Rgba {
    let h = hsl.h_deg.rem_euclid(360.0) / 360.0;
    let s = hsl.s.clamp(0.0, 1.0);
    let l = hsl.l.clamp(0.0, 1.0);

    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return Rgba::rgb(v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 1.0 / 2.0 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    }

    let to_u8 = |v: f64| (v * 255.0).round() as u8;
    Rgba::rgb(
        to_u8(hue_to_rgb(p, q, h + 1.0 / 3.0)),
        to_u8(hue_to_rgb(p, q, h)),
        to_u8(hue_to_rgb(p, q, h - 1.0 / 3.0)),
    )
}

/// Pyramid side colors: left (blue family), right (orange family).
pub fn pyramid_sides() -> (Rgba, Rgba) {
    (
        hsl_to_rgba(Hsl {
            h_deg: 215.0,
            s: 0.55,
            l: 0.52,
        }),
        hsl_to_rgba(Hsl {
            h_deg: 24.0,
            s: 0.80,
            l: 0.56,
        }),
    )
}

fn stable_hash64<T: Hash + ?Sized>(t: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    t.hash(&mut hasher);
    hasher.finish()
}
