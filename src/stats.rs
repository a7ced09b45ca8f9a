use crate::models::{EntityId, TimeSeriesDataset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary statistics of one entity's primary value across the timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub entity: EntityId,
    /// Steps where the entity has a value.
    pub count: usize,
    /// Steps where the entity is absent.
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

/// Compute per-entity statistics, ordered by entity id.
pub fn entity_summary(dataset: &TimeSeriesDataset) -> Vec<Summary> {
    let mut groups: BTreeMap<EntityId, Vec<f64>> = dataset
        .entity_ids()
        .into_iter()
        .map(|id| (id, Vec::new()))
        .collect();
    for step in &dataset.steps {
        for (id, value) in &step.entities {
            let v = value.primary();
            if let (Some(vals), true) = (groups.get_mut(id), v.is_finite()) {
                vals.push(v);
            }
        }
    }

    let total = dataset.len();
    let mut out = Vec::with_capacity(groups.len());
    for (entity, mut vals) in groups {
        vals.sort_by(f64::total_cmp);
        let count = vals.len();
        let min = vals.first().copied();
        let max = vals.last().copied();
        let mean = (count > 0).then(|| vals.iter().sum::<f64>() / count as f64);
        let median = if count == 0 {
            None
        } else if count % 2 == 1 {
            Some(vals[count / 2])
        } else {
            Some((vals[count / 2 - 1] + vals[count / 2]) / 2.0)
        };
        out.push(Summary {
            entity,
            count,
            missing: total - count,
            min,
            max,
            mean,
            median,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityValue, StepKey, TimeStep, ValueShape};

    #[test]
    fn absence_counts_as_missing() {
        let mut ds = TimeSeriesDataset::empty(ValueShape::Scalar);
        for (year, deu) in [(2000.0, Some(4.0)), (2001.0, None), (2002.0, Some(1.0))] {
            let mut s = TimeStep::new(StepKey::Numeric(year));
            s.entities.insert("FRA".into(), EntityValue::Scalar(year - 2000.0));
            if let Some(v) = deu {
                s.entities.insert("DEU".into(), EntityValue::Scalar(v));
            }
            ds.steps.push(s);
        }
        let out = entity_summary(&ds);
        assert_eq!(out.len(), 2);
        let deu = &out[0];
        assert_eq!(deu.entity, "DEU");
        assert_eq!((deu.count, deu.missing), (2, 1));
        assert_eq!(deu.median, Some(2.5));
        let fra = &out[1];
        assert_eq!((fra.min, fra.max, fra.mean), (Some(0.0), Some(2.0), Some(1.0)));
    }
}
