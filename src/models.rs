use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a tracked subject (typically an ISO3 country code).
pub type EntityId = String;

/// Position of a step along the time/ordinal axis.
///
/// Every key of one dataset uses the same variant; the normalizer guarantees that.
#[derive(Debug, Clone)]
pub enum StepKey {
    /// Numeric key such as a year.
    Numeric(f64),
    /// Calendar date (`YYYY-MM-DD` in the source).
    Date(NaiveDate),
    /// Non-numeric label; ordered by its position in the source.
    Ordinal { index: usize, label: String },
}

impl StepKey {
    fn rank(&self) -> u8 {
        match self {
            StepKey::Numeric(_) => 0,
            StepKey::Date(_) => 1,
            StepKey::Ordinal { .. } => 2,
        }
    }

    /// Human readable label, e.g. `2020`, `2020-01-31`, `Q1`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for StepKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for StepKey {}

impl PartialOrd for StepKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StepKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (StepKey::Numeric(a), StepKey::Numeric(b)) => a.total_cmp(b),
            (StepKey::Date(a), StepKey::Date(b)) => a.cmp(b),
            (
                StepKey::Ordinal { index: a, label: la },
                StepKey::Ordinal { index: b, label: lb },
            ) => a.cmp(b).then_with(|| la.cmp(lb)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKey::Numeric(v) if v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{}", *v as i64)
            }
            StepKey::Numeric(v) => write!(f, "{v}"),
            StepKey::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            StepKey::Ordinal { label, .. } => f.write_str(label),
        }
    }
}

impl Serialize for StepKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StepKey::Numeric(v) => serializer.serialize_f64(*v),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

/// One age group of a population pyramid (`left` is conventionally male).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBand {
    pub group: String,
    pub left: f64,
    pub right: f64,
}

/// Value shapes a chart kind can require from the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueShape {
    Scalar,
    LabeledPoint,
    DualAxis,
    AgeBands,
}

/// Per-entity value at one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntityValue {
    Scalar(f64),
    LabeledPoint {
        label: String,
        value: f64,
    },
    DualAxis {
        primary: f64,
        secondary: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<f64>,
    },
    AgeBands(Vec<AgeBand>),
}

impl EntityValue {
    pub fn shape(&self) -> ValueShape {
        match self {
            EntityValue::Scalar(_) => ValueShape::Scalar,
            EntityValue::LabeledPoint { .. } => ValueShape::LabeledPoint,
            EntityValue::DualAxis { .. } => ValueShape::DualAxis,
            EntityValue::AgeBands(_) => ValueShape::AgeBands,
        }
    }

    /// The value a single numeric axis shows (age bands sum both sides).
    pub fn primary(&self) -> f64 {
        match self {
            EntityValue::Scalar(v) => *v,
            EntityValue::LabeledPoint { value, .. } => *value,
            EntityValue::DualAxis { primary, .. } => *primary,
            EntityValue::AgeBands(bands) => bands.iter().map(|b| b.left + b.right).sum(),
        }
    }

    pub fn secondary(&self) -> Option<f64> {
        match self {
            EntityValue::DualAxis { secondary, .. } => Some(*secondary),
            _ => None,
        }
    }

    pub fn size(&self) -> Option<f64> {
        match self {
            EntityValue::DualAxis { size, .. } => *size,
            _ => None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            EntityValue::LabeledPoint { label, .. } => Some(label.as_str()),
            _ => None,
        }
    }

    pub fn bands(&self) -> &[AgeBand] {
        match self {
            EntityValue::AgeBands(b) => b,
            _ => &[],
        }
    }
}

/// What the normalizer must produce, and which raw fields feed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedShape {
    pub shape: ValueShape,
    pub metric: Option<String>,
    pub secondary: Option<String>,
    pub size: Option<String>,
}

impl ExpectedShape {
    pub fn scalar() -> Self {
        Self::of(ValueShape::Scalar)
    }

    pub fn of(shape: ValueShape) -> Self {
        Self {
            shape,
            metric: None,
            secondary: None,
            size: None,
        }
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    pub fn with_secondary(mut self, key: impl Into<String>) -> Self {
        self.secondary = Some(key.into());
        self
    }

    pub fn with_size(mut self, key: impl Into<String>) -> Self {
        self.size = Some(key.into());
        self
    }
}

/// One discrete point along the time axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeStep {
    pub key: StepKey,
    /// Entities present at this step; absence means "no data", never zero.
    pub entities: BTreeMap<EntityId, EntityValue>,
}

impl TimeStep {
    pub fn new(key: StepKey) -> Self {
        Self {
            key,
            entities: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&EntityValue> {
        self.entities.get(id)
    }
}

/// Canonical in-memory model: steps strictly increasing by key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesDataset {
    pub shape: ValueShape,
    pub steps: Vec<TimeStep>,
}

impl TimeSeriesDataset {
    pub fn empty(shape: ValueShape) -> Self {
        Self {
            shape,
            steps: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Playback needs at least two steps.
    pub fn is_playable(&self) -> bool {
        self.steps.len() > 1
    }

    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn step(&self, index: usize) -> Option<&TimeStep> {
        self.steps.get(index)
    }

    pub fn keys(&self) -> impl Iterator<Item = &StepKey> {
        self.steps.iter().map(|s| &s.key)
    }

    pub fn index_of(&self, key: &StepKey) -> Option<usize> {
        self.steps.binary_search_by(|s| s.key.cmp(key)).ok()
    }

    /// Index whose key is the closest not-greater match, clamped to the valid range.
    pub fn nearest_index(&self, key: &StepKey) -> usize {
        match self.steps.binary_search_by(|s| s.key.cmp(key)) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => (i - 1).min(self.last_index()),
        }
    }

    /// Every entity id that appears in at least one step.
    pub fn entity_ids(&self) -> BTreeSet<EntityId> {
        self.steps
            .iter()
            .flat_map(|s| s.entities.keys().cloned())
            .collect()
    }

    /// Display label for an entity: the latest `LabeledPoint` label, else the id.
    pub fn entity_label(&self, id: &str) -> String {
        self.steps
            .iter()
            .rev()
            .find_map(|s| s.get(id).and_then(|v| v.label()).map(str::to_string))
            .unwrap_or_else(|| id.to_string())
    }
}

/// Chart kinds the engine renders; one renderer per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    RankedBars,
    Choropleth,
    PopulationPyramid,
    Bubble,
    Line,
    Area,
    CategoryBars,
}

impl ChartKind {
    pub const ALL: [ChartKind; 7] = [
        ChartKind::RankedBars,
        ChartKind::Choropleth,
        ChartKind::PopulationPyramid,
        ChartKind::Bubble,
        ChartKind::Line,
        ChartKind::Area,
        ChartKind::CategoryBars,
    ];

    pub fn required_shape(self) -> ValueShape {
        match self {
            ChartKind::RankedBars => ValueShape::LabeledPoint,
            ChartKind::Choropleth => ValueShape::Scalar,
            ChartKind::PopulationPyramid => ValueShape::AgeBands,
            ChartKind::Bubble => ValueShape::DualAxis,
            ChartKind::Line | ChartKind::Area | ChartKind::CategoryBars => ValueShape::Scalar,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::RankedBars => "ranked-bars",
            ChartKind::Choropleth => "choropleth",
            ChartKind::PopulationPyramid => "population-pyramid",
            ChartKind::Bubble => "bubble",
            ChartKind::Line => "line",
            ChartKind::Area => "area",
            ChartKind::CategoryBars => "category-bars",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('_', "-");
        ChartKind::ALL
            .into_iter()
            .find(|k| k.as_str() == norm)
            .ok_or_else(|| format!("unknown chart kind: {s}"))
    }
}

/// Axis and legend text. Purely descriptive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub title: Option<String>,
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
    pub legend: Option<String>,
}

/// What to draw, as produced by the query-parsing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub kind: ChartKind,
    #[serde(default)]
    pub metric_key: String,
    #[serde(default)]
    pub secondary_metric_key: Option<String>,
    #[serde(default)]
    pub size_metric_key: Option<String>,
    #[serde(default)]
    pub labels: Labels,
    /// Entity drawn by the population pyramid.
    #[serde(default)]
    pub focus_entity: Option<EntityId>,
    /// Row cap for ranked bars.
    #[serde(default)]
    pub top_n: Option<usize>,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, metric_key: impl Into<String>) -> Self {
        Self {
            kind,
            metric_key: metric_key.into(),
            secondary_metric_key: None,
            size_metric_key: None,
            labels: Labels::default(),
            focus_entity: None,
            top_n: None,
        }
    }

    pub fn with_secondary(mut self, key: impl Into<String>) -> Self {
        self.secondary_metric_key = Some(key.into());
        self
    }

    pub fn with_size(mut self, key: impl Into<String>) -> Self {
        self.size_metric_key = Some(key.into());
        self
    }

    pub fn with_focus(mut self, id: impl Into<EntityId>) -> Self {
        self.focus_entity = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.labels.title = Some(title.into());
        self
    }

    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    /// Shape request handed to the normalizer for this spec.
    pub fn expected_shape(&self) -> ExpectedShape {
        let non_empty = |s: &str| {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        };
        ExpectedShape {
            shape: self.kind.required_shape(),
            metric: non_empty(&self.metric_key),
            secondary: self.secondary_metric_key.as_deref().and_then(non_empty),
            size: self.size_metric_key.as_deref().and_then(non_empty),
        }
    }

    /// Title shown above the chart: explicit label, else the metric key.
    pub fn display_title(&self) -> String {
        match self.labels.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ if !self.metric_key.trim().is_empty() => self.metric_key.clone(),
            _ => self.kind.to_string(),
        }
    }
}

/// Pixel insets around the plotting area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margin {
    fn default() -> Self {
        Self {
            top: 40.0,
            right: 24.0,
            bottom: 32.0,
            left: 96.0,
        }
    }
}

/// Axis-aligned rectangle in host pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// Host container size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub margin: Margin,
}

impl Viewport {
    /// Degenerate sizes are clamped to 1×1.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: clamp_extent(width),
            height: clamp_extent(height),
            margin: Margin::default(),
        }
    }

    pub fn with_margin(mut self, margin: Margin) -> Self {
        self.margin = margin;
        self
    }

    /// The plotting rectangle inside the margins (never inverted).
    pub fn inner(&self) -> Rect {
        let x0 = self.margin.left.min(self.width);
        let y0 = self.margin.top.min(self.height);
        let x1 = (self.width - self.margin.right).max(x0 + 1.0);
        let y1 = (self.height - self.margin.bottom).max(y0 + 1.0);
        Rect::new(x0, y0, x1, y1)
    }
}

fn clamp_extent(v: f64) -> f64 {
    if v.is_finite() && v >= 1.0 { v } else { 1.0 }
}

/// Observable transport state. The timer itself stays inside the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_index: usize,
    pub is_playing: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_index: 0,
            is_playing: false,
        }
    }
}

/// Pointer inspection state; `None` at the call sites means "not hovering".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverState {
    pub entity_id: EntityId,
    pub pointer_x: f64,
    pub pointer_y: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_keys_order_within_variant() {
        assert!(StepKey::Numeric(1999.0) < StepKey::Numeric(2000.0));
        let a = StepKey::Ordinal {
            index: 0,
            label: "Q4".into(),
        };
        let b = StepKey::Ordinal {
            index: 1,
            label: "Q1".into(),
        };
        assert!(a < b);
    }

    #[test]
    fn step_key_labels() {
        assert_eq!(StepKey::Numeric(2020.0).label(), "2020");
        assert_eq!(StepKey::Numeric(2.5).label(), "2.5");
        let d = NaiveDate::from_ymd_opt(2021, 3, 9).unwrap();
        assert_eq!(StepKey::Date(d).label(), "2021-03-09");
    }

    #[test]
    fn chart_kind_parses_kebab_and_snake() {
        assert_eq!("ranked-bars".parse::<ChartKind>(), Ok(ChartKind::RankedBars));
        assert_eq!(
            "population_pyramid".parse::<ChartKind>(),
            Ok(ChartKind::PopulationPyramid)
        );
        assert!("pie".parse::<ChartKind>().is_err());
    }

    #[test]
    fn spec_deserializes_from_camel_case() {
        let spec: ChartSpec = serde_json::from_str(
            r#"{"kind":"bubble","metricKey":"gdp","secondaryMetricKey":"lifeExp","labels":{"title":"Wealth"}}"#,
        )
        .unwrap();
        assert_eq!(spec.kind, ChartKind::Bubble);
        let shape = spec.expected_shape();
        assert_eq!(shape.shape, ValueShape::DualAxis);
        assert_eq!(shape.metric.as_deref(), Some("gdp"));
        assert_eq!(shape.secondary.as_deref(), Some("lifeExp"));
        assert_eq!(spec.display_title(), "Wealth");
    }

    #[test]
    fn viewport_clamps_degenerate_sizes() {
        let vp = Viewport::new(0.0, f64::NAN);
        assert_eq!(vp.width, 1.0);
        assert_eq!(vp.height, 1.0);
        let inner = vp.inner();
        assert!(inner.width() >= 1.0 && inner.height() >= 1.0);
    }

    #[test]
    fn nearest_index_clamps() {
        let mut ds = TimeSeriesDataset::empty(ValueShape::Scalar);
        for y in [2000.0, 2001.0, 2002.0] {
            ds.steps.push(TimeStep::new(StepKey::Numeric(y)));
        }
        assert_eq!(ds.nearest_index(&StepKey::Numeric(1990.0)), 0);
        assert_eq!(ds.nearest_index(&StepKey::Numeric(2001.5)), 1);
        assert_eq!(ds.nearest_index(&StepKey::Numeric(2050.0)), 2);
        assert_eq!(ds.index_of(&StepKey::Numeric(2002.0)), Some(2));
    }
}
