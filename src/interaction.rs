//! Pointer hover state and tooltip derivation.
//!
//! Tooltips are a pure function of `(hover, current step, dataset)`; nothing from
//! an earlier step is retained.

use crate::models::{ChartSpec, EntityId, EntityValue, HoverState, TimeSeriesDataset};
use crate::viz::util::format_number;
use serde::Serialize;

/// What a pointer event did to the hover state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverChange {
    Entered,
    Moved,
    Left,
    Unchanged,
}

#[derive(Debug, Default, Clone)]
pub struct HoverTracker {
    state: Option<HoverState>,
}

impl HoverTracker {
    pub fn state(&self) -> Option<&HoverState> {
        self.state.as_ref()
    }

    pub fn entity(&self) -> Option<&str> {
        self.state.as_ref().map(|h| h.entity_id.as_str())
    }

    /// Pointer entered an element.
    pub fn enter(&mut self, entity: impl Into<EntityId>, x: f64, y: f64) -> HoverChange {
        self.state = Some(HoverState {
            entity_id: entity.into(),
            pointer_x: x,
            pointer_y: y,
        });
        HoverChange::Entered
    }

    /// Pointer moved over `entity`: coordinates update, the entity stays. A move
    /// over a different element counts as entering it.
    pub fn move_on(&mut self, entity: &str, x: f64, y: f64) -> HoverChange {
        match &mut self.state {
            Some(h) if h.entity_id == entity => {
                h.pointer_x = x;
                h.pointer_y = y;
                HoverChange::Moved
            }
            _ => self.enter(entity, x, y),
        }
    }

    pub fn leave(&mut self) -> HoverChange {
        match self.state.take() {
            Some(_) => HoverChange::Left,
            None => HoverChange::Unchanged,
        }
    }

    /// Translate a hit-test result at `(x, y)` into enter/move/leave.
    pub fn pointer_at(&mut self, hit: Option<&str>, x: f64, y: f64) -> HoverChange {
        match hit {
            Some(entity) => self.move_on(entity, x, y),
            None => self.leave(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tooltip {
    pub title: String,
    pub lines: Vec<String>,
}

/// Tooltip for the hovered entity at step `index`; `None` when not hovering or
/// the index is out of range.
pub fn tooltip(
    hover: Option<&HoverState>,
    dataset: &TimeSeriesDataset,
    index: usize,
    spec: &ChartSpec,
    locale: &str,
) -> Option<Tooltip> {
    let hover = hover?;
    let step = dataset.step(index)?;
    let id = hover.entity_id.as_str();
    let fmt = |v: f64| format_number(v, locale);
    let metric = if spec.metric_key.trim().is_empty() {
        "value"
    } else {
        spec.metric_key.as_str()
    };

    let mut lines = vec![step.key.label()];
    match step.get(id) {
        None => lines.push("No data".to_string()),
        Some(EntityValue::Scalar(v)) | Some(EntityValue::LabeledPoint { value: v, .. }) => {
            lines.push(format!("{metric}: {}", fmt(*v)));
        }
        Some(EntityValue::DualAxis {
            primary,
            secondary,
            size,
        }) => {
            lines.push(format!("{metric}: {}", fmt(*primary)));
            let name = spec.secondary_metric_key.as_deref().unwrap_or("secondary");
            lines.push(format!("{name}: {}", fmt(*secondary)));
            if let Some(z) = size {
                let name = spec.size_metric_key.as_deref().unwrap_or("size");
                lines.push(format!("{name}: {}", fmt(*z)));
            }
        }
        Some(EntityValue::AgeBands(bands)) => {
            let left: f64 = bands.iter().map(|b| b.left).sum();
            let right: f64 = bands.iter().map(|b| b.right).sum();
            lines.push(format!("{metric}: {}", fmt(left + right)));
            lines.push(format!("left: {}  right: {}", fmt(left), fmt(right)));
            lines.push(format!("{} age groups", bands.len()));
        }
    }

    Some(Tooltip {
        title: dataset.entity_label(id),
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartKind, StepKey, TimeStep, ValueShape};

    #[test]
    fn enter_move_leave() {
        let mut h = HoverTracker::default();
        assert_eq!(h.enter("DEU", 1.0, 2.0), HoverChange::Entered);
        assert_eq!(h.move_on("DEU", 5.0, 6.0), HoverChange::Moved);
        let s = h.state().unwrap();
        assert_eq!((s.entity_id.as_str(), s.pointer_x, s.pointer_y), ("DEU", 5.0, 6.0));
        assert_eq!(h.pointer_at(Some("FRA"), 7.0, 7.0), HoverChange::Entered);
        assert_eq!(h.entity(), Some("FRA"));
        assert_eq!(h.pointer_at(None, 0.0, 0.0), HoverChange::Left);
        assert!(h.state().is_none());
        assert_eq!(h.leave(), HoverChange::Unchanged);
    }

    #[test]
    fn tooltip_reads_the_current_step_only() {
        let mut ds = TimeSeriesDataset::empty(ValueShape::Scalar);
        let mut s0 = TimeStep::new(StepKey::Numeric(2000.0));
        s0.entities
            .insert("DEU".into(), EntityValue::Scalar(1234567.0));
        ds.steps.push(s0);
        ds.steps.push(TimeStep::new(StepKey::Numeric(2001.0)));

        let hover = HoverState {
            entity_id: "DEU".into(),
            pointer_x: 0.0,
            pointer_y: 0.0,
        };
        let spec = ChartSpec::new(ChartKind::Line, "pop");
        let t0 = tooltip(Some(&hover), &ds, 0, &spec, "de").unwrap();
        assert_eq!(t0.title, "DEU");
        assert_eq!(t0.lines, ["2000", "pop: 1.234.567"]);
        let t1 = tooltip(Some(&hover), &ds, 1, &spec, "en").unwrap();
        assert_eq!(t1.lines, ["2001", "No data"]);
        assert!(tooltip(None, &ds, 0, &spec, "en").is_none());
    }
}
