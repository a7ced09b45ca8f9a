//! Engine tunables. Every field has a default; a JSON file may override any subset.

use crate::error::Result;
use crate::models::ChartKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Bounds every transition duration is clamped to.
pub const MIN_TRANSITION_MS: u64 = 300;
pub const MAX_TRANSITION_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionDurations {
    pub ranked_bars_ms: u64,
    pub choropleth_ms: u64,
    pub population_pyramid_ms: u64,
    pub bubble_ms: u64,
    pub series_ms: u64,
    pub category_bars_ms: u64,
}

impl Default for TransitionDurations {
    fn default() -> Self {
        Self {
            ranked_bars_ms: 750,
            choropleth_ms: 500,
            population_pyramid_ms: 600,
            bubble_ms: 800,
            series_ms: 400,
            category_bars_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Playback tick period.
    pub tick_interval_ms: u64,
    pub transitions: TransitionDurations,
    /// Quiet period before a burst of resize events is applied.
    pub resize_quiet_ms: u64,
    /// Headroom multiplier applied to the maximum of numeric domains.
    pub padding_factor: f64,
    /// Default row cap for ranked bars.
    pub top_n: usize,
    /// Locale tag for number formatting (`en`, `de`, `fr`, ...).
    pub locale: String,
    /// Fill for regions without data, as `#RRGGBB`.
    pub neutral_fill: String,
    /// Choropleth feature property holding the join id when the feature has no `id`.
    pub feature_id_property: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            transitions: TransitionDurations::default(),
            resize_quiet_ms: 150,
            padding_factor: 1.1,
            top_n: 10,
            locale: "en".to_string(),
            neutral_fill: "#D9D9D9".to_string(),
            feature_id_property: "iso_a3".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn resize_quiet(&self) -> Duration {
        Duration::from_millis(self.resize_quiet_ms)
    }

    /// Transition length for a chart kind, clamped to 300..=1000 ms.
    pub fn transition_for(&self, kind: ChartKind) -> Duration {
        let t = &self.transitions;
        let ms = match kind {
            ChartKind::RankedBars => t.ranked_bars_ms,
            ChartKind::Choropleth => t.choropleth_ms,
            ChartKind::PopulationPyramid => t.population_pyramid_ms,
            ChartKind::Bubble => t.bubble_ms,
            ChartKind::Line | ChartKind::Area => t.series_ms,
            ChartKind::CategoryBars => t.category_bars_ms,
        };
        Duration::from_millis(ms.clamp(MIN_TRANSITION_MS, MAX_TRANSITION_MS))
    }

    /// Padding factor sanitized to at least 1.0.
    pub fn padding(&self) -> f64 {
        if self.padding_factor.is_finite() && self.padding_factor >= 1.0 {
            self.padding_factor
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"tick_interval_ms": 250, "transitions": {"bubble_ms": 5000}}"#)
                .unwrap();
        assert_eq!(cfg.tick_interval(), Duration::from_millis(250));
        assert_eq!(cfg.top_n, 10);
        assert_eq!(cfg.transitions.ranked_bars_ms, 750);
        // clamped to the upper bound
        assert_eq!(
            cfg.transition_for(ChartKind::Bubble),
            Duration::from_millis(MAX_TRANSITION_MS)
        );
    }

    #[test]
    fn padding_is_sanitized() {
        let cfg = EngineConfig {
            padding_factor: 0.5,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.padding(), 1.0);
    }
}
