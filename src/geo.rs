//! Boundary geometry for choropleths: a GeoJSON `FeatureCollection` of
//! `Polygon`/`MultiPolygon` features keyed by a region id, and a Mercator
//! projection fitted to a viewport rectangle.

use crate::error::{Result, VizError};
use crate::models::Rect;
use ahash::AHashMap;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::f64::consts::FRAC_PI_4;

/// Latitude limit of the Web Mercator square.
const MAX_LAT: f64 = 85.051_128_78;

#[derive(Debug, Deserialize)]
struct GeoJsonFeatureCollection {
    features: Vec<GeoJsonFeature>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    geometry: Option<GeoJsonGeometry>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonGeometry {
    #[serde(rename = "type")]
    ty: String,
    coordinates: Value,
}

/// Ring of `(lon, lat)` positions.
pub type Ring = Vec<(f64, f64)>;

/// One region: exterior ring first in each polygon, holes after it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    pub id: String,
    pub name: Option<String>,
    pub polygons: Vec<Vec<Ring>>,
}

/// Parsed boundary collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Boundaries {
    pub features: Vec<GeoFeature>,
}

impl Boundaries {
    /// Parse a FeatureCollection. The join id is the feature `id`, else
    /// `properties[id_property]`, else one of the usual ISO3 property names.
    /// Features sharing an id (Natural Earth's `-99`, split territories)
    /// become one region holding all their polygons.
    pub fn from_geojson(value: &Value, id_property: &str) -> Result<Self> {
        let fc: GeoJsonFeatureCollection = serde_json::from_value(value.clone())
            .map_err(|e| VizError::geometry(format!("not a feature collection: {e}")))?;

        let mut features = Vec::with_capacity(fc.features.len());
        let mut index: AHashMap<String, usize> = AHashMap::new();
        let mut merged = BTreeSet::new();
        let mut skipped = 0usize;
        for (i, f) in fc.features.into_iter().enumerate() {
            let props = f.properties.unwrap_or_default();
            let Some(id) = feature_id(f.id.as_ref(), &props, id_property) else {
                skipped += 1;
                debug!("feature #{i} has no join id; skipped");
                continue;
            };
            let Some(geometry) = f.geometry else {
                skipped += 1;
                continue;
            };
            let polygons = match geometry.ty.as_str() {
                "Polygon" => vec![parse_polygon(&geometry.coordinates)?],
                "MultiPolygon" => geometry
                    .coordinates
                    .as_array()
                    .ok_or_else(|| VizError::geometry(format!("{id}: MultiPolygon is not an array")))?
                    .iter()
                    .map(parse_polygon)
                    .collect::<Result<Vec<_>>>()?,
                other => {
                    skipped += 1;
                    debug!("feature {id}: unsupported geometry {other}; skipped");
                    continue;
                }
            };
            let name = ["name", "NAME", "admin", "ADMIN"]
                .iter()
                .find_map(|k| props.get(*k).and_then(Value::as_str))
                .map(str::to_string);
            match index.get(&id) {
                Some(&at) => {
                    let kept: &mut GeoFeature = &mut features[at];
                    kept.polygons.extend(polygons);
                    if kept.name.is_none() {
                        kept.name = name;
                    }
                    merged.insert(id);
                }
                None => {
                    index.insert(id.clone(), features.len());
                    features.push(GeoFeature { id, name, polygons });
                }
            }
        }
        if skipped > 0 {
            warn!("{skipped} boundary features skipped (no id or unsupported geometry)");
        }
        if !merged.is_empty() {
            warn!(
                "boundary features sharing an id were merged into one region: {}",
                merged.into_iter().collect::<Vec<_>>().join(", ")
            );
        }
        Ok(Self { features })
    }

    pub fn from_str(text: &str, id_property: &str) -> Result<Self> {
        let v: Value = serde_json::from_str(text)?;
        Self::from_geojson(&v, id_property)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.features.iter().map(|f| f.id.clone()).collect()
    }

    fn positions(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.features
            .iter()
            .flat_map(|f| f.polygons.iter())
            .flat_map(|p| p.iter())
            .flat_map(|r| r.iter().copied())
    }
}

fn feature_id(id: Option<&Value>, props: &Map<String, Value>, id_property: &str) -> Option<String> {
    let as_text = |v: &Value| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    id.and_then(as_text).or_else(|| {
        [id_property, "iso_a3", "ISO_A3", "id"]
            .iter()
            .find_map(|k| props.get(*k).and_then(as_text))
    })
}

fn parse_polygon(v: &Value) -> Result<Vec<Ring>> {
    let rings = v
        .as_array()
        .ok_or_else(|| VizError::geometry("polygon is not an array of rings"))?;
    rings
        .iter()
        .map(|ring| {
            ring.as_array()
                .ok_or_else(|| VizError::geometry("ring is not an array"))?
                .iter()
                .map(|pos| {
                    let p = pos
                        .as_array()
                        .filter(|p| p.len() >= 2)
                        .ok_or_else(|| VizError::geometry("position is not [lon, lat]"))?;
                    match (p[0].as_f64(), p[1].as_f64()) {
                        (Some(lon), Some(lat)) => Ok((lon, lat)),
                        _ => Err(VizError::geometry("non-numeric coordinate")),
                    }
                })
                .collect::<Result<Ring>>()
        })
        .collect()
}

/// Mercator projection with a uniform scale and translation into host pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorProjection {
    pub scale: f64,
    pub translate: (f64, f64),
}

impl MercatorProjection {
    /// Unit Mercator, y growing southward like screen coordinates.
    fn raw(lon: f64, lat: f64) -> (f64, f64) {
        let lat = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
        let x = lon.to_radians();
        let y = -(FRAC_PI_4 + lat / 2.0).tan().ln();
        (x, y)
    }

    /// Scale and center the boundaries inside `rect`, preserving aspect ratio.
    pub fn fit(boundaries: &Boundaries, rect: Rect) -> Self {
        let mut min = (f64::INFINITY, f64::INFINITY);
        let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (lon, lat) in boundaries.positions() {
            let (x, y) = Self::raw(lon, lat);
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
        if !min.0.is_finite() {
            // whole world
            min = Self::raw(-180.0, MAX_LAT);
            max = Self::raw(180.0, -MAX_LAT);
        }
        let dx = (max.0 - min.0).max(f64::EPSILON);
        let dy = (max.1 - min.1).max(f64::EPSILON);
        let scale = (rect.width() / dx).min(rect.height() / dy);
        let tx = rect.x0 + (rect.width() - scale * dx) / 2.0 - scale * min.0;
        let ty = rect.y0 + (rect.height() - scale * dy) / 2.0 - scale * min.1;
        Self {
            scale,
            translate: (tx, ty),
        }
    }

    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = Self::raw(lon, lat);
        (
            self.translate.0 + self.scale * x,
            self.translate.1 + self.scale * y,
        )
    }

    pub fn invert(&self, px: f64, py: f64) -> (f64, f64) {
        let x = (px - self.translate.0) / self.scale;
        let y = (py - self.translate.1) / self.scale;
        let lat = 2.0 * (-y).exp().atan() - std::f64::consts::FRAC_PI_2;
        (x.to_degrees(), lat.to_degrees())
    }

    /// Project every ring of a feature into pixel space.
    pub fn project_feature(&self, feature: &GeoFeature) -> Vec<Vec<(f64, f64)>> {
        feature
            .polygons
            .iter()
            .flat_map(|poly| poly.iter())
            .map(|ring| ring.iter().map(|&(lon, lat)| self.project(lon, lat)).collect())
            .collect()
    }
}
