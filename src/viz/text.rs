//! Text measurement for layout. Plotters cannot measure text without a loaded
//! font, so widths are estimated from the character count.

/// Approximate pixel width of `text` at `font_px`.
pub fn estimate_text_width_px(text: &str, font_px: u32) -> u32 {
    ((text.chars().count() as f32) * (font_px as f32) * 0.60).ceil() as u32
}

/// Cut `text` to fit `max_px`, ending in a single ellipsis when shortened.
pub fn truncate_to_width(text: &str, font_px: u32, max_px: u32) -> String {
    if estimate_text_width_px(text, font_px) <= max_px {
        return text.to_string();
    }
    let mut out: String = String::new();
    for ch in text.chars() {
        out.push(ch);
        out.push('…');
        let fits = estimate_text_width_px(&out, font_px) <= max_px;
        out.pop();
        if !fits {
            out.pop();
            break;
        }
    }
    if out.is_empty() {
        return out;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_to_width("DEU", 12, 100), "DEU");
    }

    #[test]
    fn long_text_gets_one_ellipsis() {
        let t = truncate_to_width("Democratic Republic of the Congo", 12, 80);
        assert!(t.ends_with('…'));
        assert_eq!(t.matches('…').count(), 1);
        assert!(estimate_text_width_px(&t, 12) <= 80);
    }

    #[test]
    fn nothing_fits() {
        assert_eq!(truncate_to_width("abc", 12, 5), "");
    }
}
