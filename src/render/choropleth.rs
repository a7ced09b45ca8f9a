//! Choropleth: one region per boundary feature, filled by this step's value.

use super::{RenderContext, centered};
use crate::models::{TimeSeriesDataset, TimeStep};
use crate::palette::Rgba;
use crate::scales::{KindScales, ProjectedRegion, step_color_scale};
use crate::scene::{ElementKey, Frame, Legend, Mark, Paint, Part, Shape};
use std::collections::BTreeSet;

/// Fill used when `neutral_fill` in the config does not parse.
const FALLBACK_NEUTRAL: Rgba = Rgba::rgb(217, 217, 217);

pub fn render(ctx: &RenderContext, step: &TimeStep) -> Option<Frame> {
    let KindScales::Choropleth { regions, .. } = &ctx.scales.kind else {
        return None;
    };
    let mut frame = Frame::default();
    if regions.is_empty() {
        frame.push(centered("nogeo", ctx.scales.viewport, "No boundary geometry"));
        return Some(frame);
    }

    let neutral = Rgba::from_hex(&ctx.config.neutral_fill).unwrap_or(FALLBACK_NEUTRAL);
    let color = step_color_scale(step);

    for region in regions {
        let fill = match (step.get(&region.id), color) {
            (Some(v), Some(scale)) => scale.color(v.primary()),
            _ => neutral,
        };
        frame.push(
            Mark::new(
                ElementKey::new(region.id.as_str(), Part::Region),
                Shape::Path {
                    rings: region.rings.clone(),
                    closed: true,
                },
                Paint::fill(fill).with_stroke(Rgba::WHITE, 0.5),
            )
            .for_entity(region.id.as_str()),
        );
    }

    frame.legend = color.map(|c| Legend::Ramp {
        lo: c.domain.0,
        hi: c.domain.1,
        stops: c.stops.to_vec(),
    });
    Some(frame)
}

/// Join mismatches between boundary features and dataset entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub features_without_entity: BTreeSet<String>,
    pub entities_without_feature: BTreeSet<String>,
}

impl JoinReport {
    pub fn is_clean(&self) -> bool {
        self.features_without_entity.is_empty() && self.entities_without_feature.is_empty()
    }
}

/// Compare feature ids against every entity id in the dataset.
pub fn join_report(dataset: &TimeSeriesDataset, regions: &[ProjectedRegion]) -> JoinReport {
    let entities = dataset.entity_ids();
    let features: BTreeSet<String> = regions.iter().map(|r| r.id.clone()).collect();
    JoinReport {
        features_without_entity: features.difference(&entities).cloned().collect(),
        entities_without_feature: entities.difference(&features).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::geo::Boundaries;
    use crate::models::{ChartKind, ChartSpec, EntityValue, StepKey, ValueShape, Viewport};
    use crate::scales::build_scales;
    use serde_json::json;

    fn boundaries() -> Boundaries {
        let sq = |id: &str, lon: f64| {
            json!({"type": "Feature", "id": id, "properties": {},
                "geometry": {"type": "Polygon", "coordinates": [[
                    [lon, 0.0], [lon + 10.0, 0.0], [lon + 10.0, 10.0], [lon, 10.0], [lon, 0.0]
                ]]}})
        };
        let fc = json!({
            "type": "FeatureCollection",
            "features": [sq("AAA", 0.0), sq("BBB", 20.0), sq("CCC", 40.0)]
        });
        Boundaries::from_geojson(&fc, "iso_a3").unwrap()
    }

    #[test]
    fn unmatched_and_absent_regions_get_neutral_fill() {
        let mut ds = TimeSeriesDataset::empty(ValueShape::Scalar);
        let mut s = TimeStep::new(StepKey::Numeric(2000.0));
        s.entities.insert("AAA".into(), EntityValue::Scalar(1.0));
        s.entities.insert("BBB".into(), EntityValue::Scalar(3.0));
        s.entities.insert("ZZZ".into(), EntityValue::Scalar(2.0));
        ds.steps.push(s);

        let spec = ChartSpec::new(ChartKind::Choropleth, "pop");
        let cfg = EngineConfig::default();
        let b = boundaries();
        let scales = build_scales(&ds, &spec, Viewport::new(600.0, 400.0), &cfg, Some(&b));
        let ctx = RenderContext {
            dataset: &ds,
            spec: &spec,
            scales: &scales,
            config: &cfg,
            index: 0,
        };
        let frame = render(&ctx, &ds.steps[0]).unwrap();
        let fill = |id: &str| frame.get(id, Part::Region).unwrap().paint.fill;
        assert_eq!(fill("CCC"), Rgba::from_hex("#D9D9D9").unwrap());
        assert_ne!(fill("AAA"), fill("BBB"));
        assert!(matches!(frame.legend, Some(Legend::Ramp { lo, hi, .. }) if lo == 1.0 && hi == 3.0));

        let KindScales::Choropleth { regions, .. } = &scales.kind else {
            unreachable!()
        };
        let report = join_report(&ds, regions);
        assert_eq!(report.features_without_entity.len(), 1);
        assert!(report.entities_without_feature.contains("ZZZ"));
    }
}
