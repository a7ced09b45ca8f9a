//! Utility functions for visualization: number formatting, locale mapping, color conversion.

use crate::palette::Rgba;
use num_format::{Locale, ToFormattedString};
use plotters::style::RGBAColor;

/// Pick a single axis scale and its human label based on the overall magnitude.
/// Returns (scale, label), e.g. (1e6, "millions").
pub fn choose_axis_scale(max_abs: f64) -> (f64, &'static str) {
    if max_abs >= 1.0e12 {
        (1.0e12, "trillions")
    } else if max_abs >= 1.0e9 {
        (1.0e9, "billions")
    } else if max_abs >= 1.0e6 {
        (1.0e6, "millions")
    } else if max_abs >= 1.0e3 {
        (1.0e3, "thousands")
    } else {
        (1.0, "")
    }
}

/// Short suffix for a scale chosen by [`choose_axis_scale`].
fn scale_suffix(word: &str) -> &'static str {
    match word {
        "trillions" => "T",
        "billions" => "B",
        "millions" => "M",
        "thousands" => "k",
        _ => "",
    }
}

/// Map a user-provided locale tag to a `num_format::Locale` and its decimal separator char.
///
/// Supported tags (case-insensitive): `en`, `us`, `en_US`, `de`, `de_DE`, `german`,
/// `fr`, `es`, `it`, `pt`, `nl`. Defaults to English.
pub fn map_locale(tag: &str) -> (&'static Locale, char) {
    match tag.to_lowercase().replace('-', "_").as_str() {
        "de" | "de_de" | "german" => (&Locale::de, ','),
        "fr" | "fr_fr" => (&Locale::fr, ','),
        "es" | "es_es" => (&Locale::es, ','),
        "it" | "it_it" => (&Locale::it, ','),
        "pt" | "pt_pt" | "pt_br" => (&Locale::pt, ','),
        "nl" | "nl_nl" => (&Locale::nl, ','),
        _ => (&Locale::en, '.'), // default
    }
}

/// Locale-aware number: thousands separators, 0-2 decimals depending on magnitude.
///
/// `format_number(1234567.0, "en") == "1,234,567"`, `format_number(3.14159, "de") == "3,14"`.
pub fn format_number(v: f64, locale_tag: &str) -> String {
    if !v.is_finite() {
        return "n/a".to_string();
    }
    let (locale, dec_sep) = map_locale(locale_tag);
    let a = v.abs();
    let prec = if a >= 100.0 {
        0
    } else if a >= 10.0 {
        1
    } else {
        2
    };
    let fixed = format!("{:.*}", prec, a);
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let int_val: u64 = int_part.parse().unwrap_or(u64::MAX);
    let is_zero = int_val == 0 && frac_part.chars().all(|c| c == '0');

    let mut out = String::new();
    if v < 0.0 && !is_zero {
        out.push('-');
    }
    out.push_str(&int_val.to_formatted_string(locale));
    if !frac_part.is_empty() {
        out.push(dec_sep);
        out.push_str(frac_part);
    }
    out
}

/// Tick label with a magnitude suffix, e.g. `2.5M` or `400`. The unit never
/// exceeds the one the domain calls for; trailing fraction zeros are dropped.
pub fn format_tick(v: f64, domain: (f64, f64), locale_tag: &str) -> String {
    let max_abs = domain.0.abs().max(domain.1.abs());
    let (scale, word) = choose_axis_scale(v.abs().min(max_abs));
    let mut s = format_number(v / scale, locale_tag);
    let (_, dec_sep) = map_locale(locale_tag);
    if s.contains(dec_sep) {
        let trimmed = s.trim_end_matches('0').trim_end_matches(dec_sep).len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    if v != 0.0 {
        s.push_str(scale_suffix(word));
    }
    s
}

/// Convert a palette color (with an extra opacity factor) for plotters.
pub fn to_plotters(c: Rgba, opacity: f64) -> RGBAColor {
    let alpha = (c.a as f64 / 255.0) * opacity.clamp(0.0, 1.0);
    RGBAColor(c.r, c.g, c.b, alpha)
}
