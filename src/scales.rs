//! Scale & projection builder.
//!
//! Numeric domains are computed over every step playback can reach, so they do not
//! move while the animation runs. Ranked-bar order and the choropleth color domain
//! are the two per-step exceptions.

use crate::config::EngineConfig;
use crate::geo::{Boundaries, MercatorProjection};
use crate::models::{ChartKind, ChartSpec, EntityId, Rect, TimeSeriesDataset, TimeStep, Viewport};
use crate::normalize::sort_bands;
use crate::palette::{Rgba, SEQUENTIAL_YL_OR_RD, ramp};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Continuous linear mapping `domain -> range`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    pub fn map(&self, v: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let span = d1 - d0;
        if span == 0.0 || !span.is_finite() {
            return r0;
        }
        r0 + (v - d0) / span * (r1 - r0)
    }

    pub fn invert(&self, px: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let span = r1 - r0;
        if span == 0.0 {
            return d0;
        }
        d0 + (px - r0) / span * (d1 - d0)
    }

    /// Round tick values (1/2/5 × 10^k) inside the domain, about `count` of them.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (lo, hi) = (self.domain.0.min(self.domain.1), self.domain.0.max(self.domain.1));
        let step = tick_step(lo, hi, count);
        if !step.is_finite() || step <= 0.0 {
            return vec![lo];
        }
        let start = (lo / step).ceil() as i64;
        let stop = (hi / step + 1e-9).floor() as i64;
        (start..=stop).map(|i| i as f64 * step).collect()
    }
}

/// Tick spacing for `count` ticks over `[lo, hi]`.
pub fn tick_step(lo: f64, hi: f64, count: usize) -> f64 {
    let raw = (hi - lo).abs() / count.max(1) as f64;
    if raw == 0.0 || !raw.is_finite() {
        return 1.0;
    }
    let power = 10f64.powf(raw.log10().floor());
    let err = raw / power;
    let factor = if err >= 50f64.sqrt() {
        10.0
    } else if err >= 10f64.sqrt() {
        5.0
    } else if err >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    factor * power
}

/// Square-root scale from `[0, max]`, used for bubble areas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SqrtScale {
    pub max: f64,
    pub range: (f64, f64),
}

impl SqrtScale {
    pub fn map(&self, v: f64) -> f64 {
        if self.max <= 0.0 || !v.is_finite() {
            return self.range.0;
        }
        let t = (v.max(0.0) / self.max).sqrt().min(1.0);
        self.range.0 + t * (self.range.1 - self.range.0)
    }
}

/// Evenly spaced bands for a list of categories.
#[derive(Debug, Clone, PartialEq)]
pub struct BandScale {
    pub domain: Vec<String>,
    pub range: (f64, f64),
    /// Fraction of each slot left empty between bands.
    pub padding: f64,
}

impl BandScale {
    pub fn new(domain: Vec<String>, range: (f64, f64), padding: f64) -> Self {
        Self {
            domain,
            range,
            padding: padding.clamp(0.0, 0.9),
        }
    }

    fn slot(&self) -> f64 {
        (self.range.1 - self.range.0) / self.domain.len().max(1) as f64
    }

    pub fn bandwidth(&self) -> f64 {
        self.slot() * (1.0 - self.padding)
    }

    /// Start of the band at `index`.
    pub fn at(&self, index: usize) -> f64 {
        self.range.0 + self.slot() * index as f64 + self.slot() * self.padding / 2.0
    }

    pub fn position(&self, key: &str) -> Option<f64> {
        self.domain.iter().position(|k| k == key).map(|i| self.at(i))
    }
}

/// Sequential color scale over a value domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequentialColorScale {
    pub domain: (f64, f64),
    pub stops: &'static [Rgba],
}

impl SequentialColorScale {
    pub fn new(domain: (f64, f64)) -> Self {
        Self {
            domain,
            stops: &SEQUENTIAL_YL_OR_RD,
        }
    }

    pub fn color(&self, v: f64) -> Rgba {
        let (lo, hi) = self.domain;
        let t = if hi > lo { (v - lo) / (hi - lo) } else { 0.0 };
        ramp(self.stops, t)
    }
}

/// Widen a zero-width (or non-finite) domain so it can be divided by.
pub fn widen_degenerate(lo: f64, hi: f64) -> (f64, f64) {
    if lo.is_finite() && hi.is_finite() && hi > lo {
        (lo, hi)
    } else {
        let lo = if lo.is_finite() { lo } else { 0.0 };
        (lo, lo + (lo.abs() * 0.1).max(1.0))
    }
}

/// `[min(0, min), max * padding]`, with headroom added away from zero for a
/// negative maximum. An empty input yields `[0, 1]`.
pub fn numeric_domain(values: impl IntoIterator<Item = f64>, padding: f64) -> (f64, f64) {
    let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values.into_iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if !min.is_finite() {
        return (0.0, 1.0);
    }
    let lo = min.min(0.0);
    let hi = if max >= 0.0 {
        max * padding
    } else {
        max + max.abs() * (padding - 1.0)
    };
    widen_degenerate(lo, hi)
}

/// Entities of one step by value descending; equal values order by id ascending.
pub fn rank_order(step: &TimeStep) -> Vec<(&EntityId, f64)> {
    let mut rows: Vec<(&EntityId, f64)> = step
        .entities
        .iter()
        .map(|(id, v)| (id, v.primary()))
        .filter(|(_, v)| v.is_finite())
        .collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    rows
}

/// Color domain for one choropleth step; `None` when the step has no values.
pub fn step_color_scale(step: &TimeStep) -> Option<SequentialColorScale> {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in step.entities.values().map(|v| v.primary()).filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    lo.is_finite()
        .then(|| SequentialColorScale::new(widen_degenerate(lo, hi)))
}

/// A boundary feature already projected into pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRegion {
    pub id: String,
    pub name: Option<String>,
    pub rings: Vec<Vec<(f64, f64)>>,
}

/// Per-kind scales. One variant per [`ChartKind`] family.
#[derive(Debug, Clone, PartialEq)]
pub enum KindScales {
    RankedBars {
        x: LinearScale,
        rows: BandScale,
        top_n: usize,
    },
    Choropleth {
        projection: MercatorProjection,
        regions: Vec<ProjectedRegion>,
    },
    Pyramid {
        focus: Option<EntityId>,
        left: LinearScale,
        right: LinearScale,
        bands: BandScale,
    },
    Bubble {
        x: LinearScale,
        y: LinearScale,
        r: Option<SqrtScale>,
    },
    Series {
        x: LinearScale,
        y: LinearScale,
    },
    CategoryBars {
        categories: BandScale,
        y: LinearScale,
    },
}

/// Everything a renderer needs to place shapes for one dataset/spec/viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSet {
    pub viewport: Viewport,
    pub plot: Rect,
    pub kind: KindScales,
}

/// Build the scale set. Touches no playback state; callers rebuild on dataset,
/// spec or viewport changes.
pub fn build_scales(
    dataset: &TimeSeriesDataset,
    spec: &ChartSpec,
    viewport: Viewport,
    config: &EngineConfig,
    boundaries: Option<&Boundaries>,
) -> ScaleSet {
    let plot = viewport.inner();
    let pad = config.padding();
    let all_steps = || dataset.steps.iter();

    let kind = match spec.kind {
        ChartKind::RankedBars => {
            let top_n = spec.top_n.unwrap_or(config.top_n).max(1);
            let domain = numeric_domain(
                all_steps().flat_map(|s| s.entities.values().map(|v| v.primary())),
                pad,
            );
            let rows = (0..top_n).map(|i| i.to_string()).collect();
            KindScales::RankedBars {
                x: LinearScale::new(domain, (plot.x0, plot.x1)),
                rows: BandScale::new(rows, (plot.y0, plot.y1), 0.15),
                top_n,
            }
        }
        ChartKind::Choropleth => {
            let empty = Boundaries::default();
            let b = boundaries.unwrap_or(&empty);
            let projection = MercatorProjection::fit(b, plot);
            let regions = b
                .features
                .iter()
                .map(|f| ProjectedRegion {
                    id: f.id.clone(),
                    name: f.name.clone(),
                    rings: projection.project_feature(f),
                })
                .collect();
            KindScales::Choropleth {
                projection,
                regions,
            }
        }
        ChartKind::PopulationPyramid => {
            let focus = spec
                .focus_entity
                .clone()
                .filter(|id| all_steps().any(|s| s.entities.contains_key(id)))
                .or_else(|| default_focus(dataset));
            let bands: Vec<_> = all_steps()
                .filter_map(|s| focus.as_ref().and_then(|id| s.get(id)))
                .flat_map(|v| v.bands().iter().cloned())
                .collect();
            let magnitude = numeric_domain(bands.iter().flat_map(|b| [b.left, b.right]), pad).1;
            let mut groups: Vec<_> = bands
                .into_iter()
                .map(|b| (b.group.clone(), b))
                .collect::<BTreeMap<_, _>>()
                .into_values()
                .collect();
            sort_bands(&mut groups);
            // oldest band at the top
            let domain: Vec<String> = groups.into_iter().rev().map(|b| b.group).collect();
            let mid = (plot.x0 + plot.x1) / 2.0;
            KindScales::Pyramid {
                focus,
                left: LinearScale::new((0.0, magnitude), (mid, plot.x0)),
                right: LinearScale::new((0.0, magnitude), (mid, plot.x1)),
                bands: BandScale::new(domain, (plot.y0, plot.y1), 0.1),
            }
        }
        ChartKind::Bubble => {
            let values = || all_steps().flat_map(|s| s.entities.values());
            let x = numeric_domain(values().map(|v| v.primary()), pad);
            let y = numeric_domain(values().filter_map(|v| v.secondary()), pad);
            let max_size = values()
                .filter_map(|v| v.size())
                .filter(|v| v.is_finite())
                .fold(0.0f64, f64::max);
            let r_max = (plot.width().min(plot.height()) / 12.0).max(4.0);
            KindScales::Bubble {
                x: LinearScale::new(x, (plot.x0, plot.x1)),
                y: LinearScale::new(y, (plot.y1, plot.y0)),
                r: (max_size > 0.0).then_some(SqrtScale {
                    max: max_size,
                    range: (2.0, r_max),
                }),
            }
        }
        ChartKind::Line | ChartKind::Area => {
            let y = numeric_domain(
                all_steps().flat_map(|s| s.entities.values().map(|v| v.primary())),
                pad,
            );
            let last = dataset.last_index().max(1) as f64;
            KindScales::Series {
                x: LinearScale::new((0.0, last), (plot.x0, plot.x1)),
                y: LinearScale::new(y, (plot.y1, plot.y0)),
            }
        }
        ChartKind::CategoryBars => {
            let y = numeric_domain(
                all_steps().flat_map(|s| s.entities.values().map(|v| v.primary())),
                pad,
            );
            let ids: Vec<String> = dataset.entity_ids().into_iter().collect();
            KindScales::CategoryBars {
                categories: BandScale::new(ids, (plot.x0, plot.x1), 0.2),
                y: LinearScale::new(y, (plot.y1, plot.y0)),
            }
        }
    };
    debug!(
        "scales rebuilt: kind={} steps={} viewport={}x{}",
        spec.kind,
        dataset.len(),
        viewport.width,
        viewport.height
    );
    ScaleSet {
        viewport,
        plot,
        kind,
    }
}

/// Lowest entity id that carries age bands at any step.
pub fn default_focus(dataset: &TimeSeriesDataset) -> Option<EntityId> {
    dataset
        .steps
        .iter()
        .flat_map(|s| s.entities.iter())
        .filter(|(_, v)| !v.bands().is_empty())
        .map(|(id, _)| id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .next()
}
