//! Dataset normalizer: heterogeneous raw JSON → [`TimeSeriesDataset`].
//!
//! Accepted raw shapes:
//! - array of step objects: `[{"year": 2000, "entities": [{"id": "DEU", "value": 1}]}]`
//!   (entities may also be a map `id → value`)
//! - nested map keyed step → entity (`{"2000": {"DEU": 1}}`) or entity → step
//!   (`{"DEU": {"2000": 1}}`, detected when only the inner keys parse as steps)
//! - flat list of points: `[{"entity": "DEU", "x": 2000, "y": 1}]`
//! - the canonical serialization: `{"steps": [{"key": 2000, "entities": {...}}]}`
//!
//! Missing or non-numeric values become *absence* (the entity is left out of that
//! step). Values of the wrong type, or sources that fit none of the shapes above,
//! fail with [`VizError::ShapeMismatch`] and no partial dataset.

use crate::error::{Result, VizError};
use crate::models::{
    AgeBand, EntityId, EntityValue, ExpectedShape, StepKey, TimeSeriesDataset, TimeStep,
    ValueShape,
};
use chrono::NaiveDate;
use log::debug;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

const STEP_KEY_FIELDS: [&str; 5] = ["key", "year", "step", "date", "t"];
const STEP_ENTITIES_FIELDS: [&str; 4] = ["entities", "data", "values", "countries"];
const ENTITY_ID_FIELDS: [&str; 5] = ["id", "entity", "country", "code", "iso3"];

/// Step key as read from the source, before the dataset-wide key kind is decided.
#[derive(Debug, Clone)]
struct RawKey {
    text: String,
    number: Option<f64>,
}

impl RawKey {
    fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.text, "%Y-%m-%d").ok()
    }
}

struct RawStep<'a> {
    key: RawKey,
    entities: Vec<(EntityId, &'a Value)>,
}

/// Convert a raw source into the canonical model.
pub fn normalize(raw: &Value, expected: &ExpectedShape) -> Result<TimeSeriesDataset> {
    let (raw_steps, ordered) = collect_steps(raw)?;
    let keyed = assign_keys(raw_steps, ordered);

    let mut steps = Vec::with_capacity(keyed.len());
    let mut absent = 0usize;
    for (key, entities) in keyed {
        let mut step = TimeStep::new(key);
        for (id, value) in entities {
            match coerce_value(&id, value, expected)? {
                Some(v) => {
                    step.entities.insert(id, v);
                }
                // duplicates without data leave an earlier value in place
                None => absent += 1,
            }
        }
        steps.push(step);
    }

    debug!(
        "normalized {} steps ({:?}), {} absent entity values",
        steps.len(),
        expected.shape,
        absent
    );
    Ok(TimeSeriesDataset {
        shape: expected.shape,
        steps,
    })
}

/// Parse a JSON document and normalize it.
pub fn normalize_str(text: &str, expected: &ExpectedShape) -> Result<TimeSeriesDataset> {
    let raw: Value = serde_json::from_str(text)?;
    normalize(&raw, expected)
}

// ------------------------ Source shape detection ------------------------

fn collect_steps(raw: &Value) -> Result<(Vec<RawStep<'_>>, bool)> {
    match raw {
        Value::Array(items) if items.is_empty() => Ok((Vec::new(), true)),
        Value::Array(items) if items.iter().all(is_flat_point) => Ok((flat_points(items)?, true)),
        Value::Array(items) => Ok((step_array(items)?, true)),
        Value::Object(map) if map.is_empty() => Err(VizError::shape("empty object")),
        Value::Object(map) => match map.get("steps") {
            Some(Value::Array(items)) => Ok((step_array(items)?, true)),
            Some(other) => Err(VizError::shape(format!(
                "`steps` must be an array, found {}",
                type_name(other)
            ))),
            None => Ok((nested_map(map)?, false)),
        },
        other => Err(VizError::shape(format!(
            "top-level {} is not a dataset",
            type_name(other)
        ))),
    }
}

fn is_flat_point(v: &Value) -> bool {
    v.as_object().is_some_and(|o| {
        o.contains_key("x") && o.contains_key("y") && lookup(o, &ENTITY_ID_FIELDS).is_some()
    })
}

fn flat_points(items: &[Value]) -> Result<Vec<RawStep<'_>>> {
    let mut out: Vec<RawStep<'_>> = Vec::with_capacity(items.len());
    for item in items {
        let obj = item
            .as_object()
            .ok_or_else(|| VizError::shape("flat point is not an object"))?;
        let id = entity_id(obj)?;
        let key = raw_key(&obj["x"])?;
        // consecutive points usually share a step; avoid a lookup per point
        match out.last_mut() {
            Some(last) if last.key.text == key.text => last.entities.push((id, item)),
            _ => out.push(RawStep {
                key,
                entities: vec![(id, item)],
            }),
        }
    }
    Ok(out)
}

fn step_array(items: &[Value]) -> Result<Vec<RawStep<'_>>> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let obj = item
                .as_object()
                .ok_or_else(|| VizError::shape(format!("step #{i} is not an object")))?;
            let key_value = lookup(obj, &STEP_KEY_FIELDS)
                .ok_or_else(|| VizError::shape(format!("step #{i} has no key/year field")))?;
            let key = raw_key(key_value)?;
            let entities = match lookup(obj, &STEP_ENTITIES_FIELDS) {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(list)) => list
                    .iter()
                    .map(|e| {
                        let eo = e.as_object().ok_or_else(|| {
                            VizError::shape(format!("entity in step {} is not an object", key.text))
                        })?;
                        Ok((entity_id(eo)?, e))
                    })
                    .collect::<Result<Vec<_>>>()?,
                Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
                Some(other) => {
                    return Err(VizError::shape(format!(
                        "entities of step {} must be an array or object, found {}",
                        key.text,
                        type_name(other)
                    )));
                }
            };
            Ok(RawStep { key, entities })
        })
        .collect()
}

fn nested_map(map: &Map<String, Value>) -> Result<Vec<RawStep<'_>>> {
    let mut inner_maps = Vec::with_capacity(map.len());
    for (outer, v) in map {
        let inner = v.as_object().ok_or_else(|| {
            VizError::shape(format!(
                "value under `{outer}` must be an object, found {}",
                type_name(v)
            ))
        })?;
        inner_maps.push((outer, inner));
    }

    let outer_are_steps = map.keys().all(|k| looks_like_step(k));
    let inner_are_steps = inner_maps
        .iter()
        .flat_map(|(_, inner)| inner.keys())
        .all(|k| looks_like_step(k));
    let any_inner = inner_maps.iter().any(|(_, inner)| !inner.is_empty());

    if !outer_are_steps && inner_are_steps && any_inner {
        // entity → step → value
        let mut by_step: BTreeMap<String, Vec<(EntityId, &Value)>> = BTreeMap::new();
        for (entity, inner) in inner_maps {
            for (step, value) in inner {
                by_step
                    .entry(step.clone())
                    .or_default()
                    .push((entity.clone(), value));
            }
        }
        return Ok(by_step
            .into_iter()
            .map(|(text, entities)| RawStep {
                key: key_from_text(&text),
                entities,
            })
            .collect());
    }

    Ok(inner_maps
        .into_iter()
        .map(|(outer, inner)| RawStep {
            key: key_from_text(outer),
            entities: inner.iter().map(|(k, v)| (k.clone(), v)).collect(),
        })
        .collect())
}

fn looks_like_step(text: &str) -> bool {
    let k = key_from_text(text);
    k.number.is_some() || k.date().is_some()
}

// ------------------------ Step keys ------------------------

fn raw_key(v: &Value) -> Result<RawKey> {
    match v {
        Value::Number(n) => {
            let f = n
                .as_f64()
                .filter(|f| f.is_finite())
                .ok_or_else(|| VizError::shape("step key is not a finite number"))?;
            Ok(RawKey {
                text: n.to_string(),
                number: Some(f),
            })
        }
        Value::String(s) => Ok(key_from_text(s)),
        other => Err(VizError::shape(format!(
            "step key must be a number or string, found {}",
            type_name(other)
        ))),
    }
}

fn key_from_text(s: &str) -> RawKey {
    let text = s.trim().to_string();
    let number = text.parse::<f64>().ok().filter(|f| f.is_finite());
    RawKey { text, number }
}

/// Decide the key kind for the whole dataset, order the steps, and merge duplicates.
fn assign_keys<'a>(
    raw: Vec<RawStep<'a>>,
    ordered: bool,
) -> Vec<(StepKey, Vec<(EntityId, &'a Value)>)> {
    let all_numeric = raw.iter().all(|s| s.key.number.is_some());
    let all_dates = !all_numeric && raw.iter().all(|s| s.key.date().is_some());

    let mut keyed: Vec<(StepKey, Vec<(EntityId, &'a Value)>)> = if all_numeric {
        raw.into_iter()
            .map(|s| (StepKey::Numeric(s.key.number.unwrap_or_default()), s.entities))
            .collect()
    } else if all_dates {
        raw.into_iter()
            .filter_map(|s| s.key.date().map(|d| (StepKey::Date(d), s.entities)))
            .collect()
    } else {
        let mut steps = raw;
        if !ordered {
            steps.sort_by(|a, b| a.key.text.cmp(&b.key.text));
        }
        // one index per distinct label, in first-seen order
        let mut seen: Vec<String> = Vec::new();
        steps
            .into_iter()
            .map(|s| {
                let index = match seen.iter().position(|l| *l == s.key.text) {
                    Some(i) => i,
                    None => {
                        seen.push(s.key.text.clone());
                        seen.len() - 1
                    }
                };
                (
                    StepKey::Ordinal {
                        index,
                        label: s.key.text,
                    },
                    s.entities,
                )
            })
            .collect()
    };

    // stable: already ascending sources keep their order
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut merged: Vec<(StepKey, Vec<(EntityId, &'a Value)>)> = Vec::with_capacity(keyed.len());
    for (key, entities) in keyed {
        match merged.last_mut() {
            Some((last, list)) if *last == key => list.extend(entities),
            _ => merged.push((key, entities)),
        }
    }
    merged
}

// ------------------------ Value coercion ------------------------

fn coerce_value(id: &str, raw: &Value, expected: &ExpectedShape) -> Result<Option<EntityValue>> {
    let ctx = |field: &str| format!("entity `{id}` field `{field}`");
    match expected.shape {
        ValueShape::Scalar => primary_number(id, raw, expected).map(|v| v.map(EntityValue::Scalar)),
        ValueShape::LabeledPoint => {
            let Some(value) = primary_number(id, raw, expected)? else {
                return Ok(None);
            };
            let label = raw
                .as_object()
                .and_then(|o| lookup(o, &["label", "name"]))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(id)
                .to_string();
            Ok(Some(EntityValue::LabeledPoint { label, value }))
        }
        ValueShape::DualAxis => match raw {
            Value::Null => Ok(None),
            Value::Object(obj) => {
                let primary =
                    field_number(obj, expected.metric.as_deref(), &["primary", "value", "x"], &ctx)?;
                let secondary =
                    field_number(obj, expected.secondary.as_deref(), &["secondary", "y"], &ctx)?;
                let size = field_number(obj, expected.size.as_deref(), &["size"], &ctx)?;
                if expected.size.is_some() && size.is_none() {
                    return Ok(None);
                }
                Ok(match (primary, secondary) {
                    (Some(primary), Some(secondary)) => Some(EntityValue::DualAxis {
                        primary,
                        secondary,
                        size,
                    }),
                    _ => None,
                })
            }
            Value::Array(items) if (2..=3).contains(&items.len()) => {
                let primary = coerce_number(&items[0], &ctx("0"))?;
                let secondary = coerce_number(&items[1], &ctx("1"))?;
                let size = match items.get(2) {
                    Some(v) => coerce_number(v, &ctx("2"))?,
                    None => None,
                };
                Ok(match (primary, secondary) {
                    (Some(primary), Some(secondary)) => Some(EntityValue::DualAxis {
                        primary,
                        secondary,
                        size,
                    }),
                    _ => None,
                })
            }
            Value::String(s) if parse_numeric_str(s).is_none() => Ok(None),
            other => Err(VizError::shape(format!(
                "entity `{id}`: {} cannot be read as two axes",
                type_name(other)
            ))),
        },
        ValueShape::AgeBands => age_bands(id, raw, expected),
    }
}

fn primary_number(id: &str, raw: &Value, expected: &ExpectedShape) -> Result<Option<f64>> {
    match raw {
        Value::Object(obj) => field_number(
            obj,
            expected.metric.as_deref(),
            &["value", "y"],
            &|f: &str| format!("entity `{id}` field `{f}`"),
        ),
        other => coerce_number(other, &format!("entity `{id}`")),
    }
}

/// Read `preferred` first, then the canonical fallbacks. Missing means absent.
fn field_number(
    obj: &Map<String, Value>,
    preferred: Option<&str>,
    fallbacks: &[&str],
    ctx: &dyn Fn(&str) -> String,
) -> Result<Option<f64>> {
    let found = preferred
        .and_then(|k| obj.get(k).map(|v| (k, v)))
        .or_else(|| {
            fallbacks
                .iter()
                .find_map(|k| obj.get(*k).map(|v| (*k, v)))
        });
    match found {
        Some((field, v)) => coerce_number(v, &ctx(field)),
        None => Ok(None),
    }
}

fn coerce_number(v: &Value, what: &str) -> Result<Option<f64>> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64().filter(|f| f.is_finite())),
        Value::String(s) => Ok(parse_numeric_str(s)),
        other => Err(VizError::shape(format!(
            "{what}: expected a number, found {}",
            type_name(other)
        ))),
    }
}

/// Numeric strings: surrounding whitespace and `,` thousands separators are tolerated.
pub fn parse_numeric_str(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let cleaned: String = t.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn age_bands(id: &str, raw: &Value, expected: &ExpectedShape) -> Result<Option<EntityValue>> {
    let mut bands: Vec<AgeBand> = Vec::new();
    match raw {
        Value::Null => return Ok(None),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if let Some(b) = band_from_item(id, i, item)? {
                    push_band(&mut bands, b);
                }
            }
        }
        Value::Object(obj) => {
            if let Some(nested) = expected
                .metric
                .as_deref()
                .and_then(|m| obj.get(m))
                .filter(|v| v.is_array() || v.is_object())
            {
                return age_bands(id, nested, &ExpectedShape::of(ValueShape::AgeBands));
            }
            for (group, v) in obj {
                if let Some((left, right)) = band_sides(id, group, v)? {
                    push_band(
                        &mut bands,
                        AgeBand {
                            group: group.trim().to_string(),
                            left,
                            right,
                        },
                    );
                }
            }
        }
        Value::String(s) if parse_numeric_str(s).is_none() => return Ok(None),
        other => {
            return Err(VizError::shape(format!(
                "entity `{id}`: {} cannot be read as age bands",
                type_name(other)
            )));
        }
    }

    if bands.is_empty() {
        return Ok(None);
    }
    sort_bands(&mut bands);
    Ok(Some(EntityValue::AgeBands(bands)))
}

/// A repeated group replaces the earlier one, as duplicate step keys do.
fn push_band(bands: &mut Vec<AgeBand>, band: AgeBand) {
    match bands.iter_mut().find(|b| b.group == band.group) {
        Some(existing) => {
            debug!("age group `{}` repeated; later value kept", band.group);
            *existing = band;
        }
        None => bands.push(band),
    }
}

fn band_from_item(id: &str, index: usize, item: &Value) -> Result<Option<AgeBand>> {
    match item {
        Value::Object(o) => {
            let group = lookup(o, &["group", "age", "label"])
                .and_then(|g| match g {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .ok_or_else(|| {
                    VizError::shape(format!("entity `{id}` band #{index} has no group label"))
                })?;
            Ok(band_sides(id, &group, item)?.map(|(left, right)| AgeBand { group, left, right }))
        }
        Value::Array(parts) if parts.len() == 3 => {
            let group = match &parts[0] {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(VizError::shape(format!(
                        "entity `{id}` band #{index}: group must be text, found {}",
                        type_name(other)
                    )));
                }
            };
            let what = format!("entity `{id}` band `{group}`");
            let left = coerce_number(&parts[1], &what)?;
            let right = coerce_number(&parts[2], &what)?;
            Ok(left.zip(right).map(|(left, right)| AgeBand { group, left, right }))
        }
        other => Err(VizError::shape(format!(
            "entity `{id}` band #{index}: {} is not a band",
            type_name(other)
        ))),
    }
}

fn band_sides(id: &str, group: &str, v: &Value) -> Result<Option<(f64, f64)>> {
    let what = format!("entity `{id}` band `{group}`");
    match v {
        Value::Null => Ok(None),
        Value::Array(pair) if pair.len() == 2 => {
            let l = coerce_number(&pair[0], &what)?;
            let r = coerce_number(&pair[1], &what)?;
            Ok(l.zip(r))
        }
        Value::Object(o) => {
            let l = match lookup(o, &["left", "male"]) {
                Some(v) => coerce_number(v, &what)?,
                None => None,
            };
            let r = match lookup(o, &["right", "female"]) {
                Some(v) => coerce_number(v, &what)?,
                None => None,
            };
            Ok(l.zip(r))
        }
        other => Err(VizError::shape(format!(
            "{what}: {} is not a left/right pair",
            type_name(other)
        ))),
    }
}

fn band_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\D*(\d+)").expect("static band regex"))
}

/// Leading integer of an age label: `"0-4"` → 0, `"100+"` → 100, `"Under 5"` → 5.
pub fn band_lower_bound(label: &str) -> Option<u32> {
    band_regex()
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Youngest first; labels without a number go last, alphabetically.
pub fn sort_bands(bands: &mut [AgeBand]) {
    bands.sort_by(|a, b| {
        let ka = band_lower_bound(&a.group).unwrap_or(u32::MAX);
        let kb = band_lower_bound(&b.group).unwrap_or(u32::MAX);
        ka.cmp(&kb).then_with(|| a.group.cmp(&b.group))
    });
}

// ------------------------ Helpers ------------------------

fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn entity_id(obj: &Map<String, Value>) -> Result<EntityId> {
    match lookup(obj, &ENTITY_ID_FIELDS) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(VizError::shape("entity object has no id/entity field")),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_are_coerced() {
        assert_eq!(parse_numeric_str(" 1,234.5 "), Some(1234.5));
        assert_eq!(parse_numeric_str("n/a"), None);
        assert_eq!(parse_numeric_str("NaN"), None);
        assert_eq!(parse_numeric_str(""), None);
    }

    #[test]
    fn band_labels_order_by_leading_number() {
        let mut bands: Vec<AgeBand> = ["100+", "10-14", "0-4", "5-9", "unknown"]
            .iter()
            .map(|g| AgeBand {
                group: g.to_string(),
                left: 1.0,
                right: 1.0,
            })
            .collect();
        sort_bands(&mut bands);
        let order: Vec<&str> = bands.iter().map(|b| b.group.as_str()).collect();
        assert_eq!(order, vec!["0-4", "5-9", "10-14", "100+", "unknown"]);
    }

    #[test]
    fn unordered_numeric_array_is_sorted() {
        let raw = json!([
            {"year": 2002, "entities": {"A": 3}},
            {"year": 2000, "entities": {"A": 1}},
            {"year": 2001, "entities": {"A": 2}}
        ]);
        let ds = normalize(&raw, &ExpectedShape::scalar()).unwrap();
        let keys: Vec<String> = ds.keys().map(|k| k.label()).collect();
        assert_eq!(keys, vec!["2000", "2001", "2002"]);
    }

    #[test]
    fn ordinal_array_keeps_source_order() {
        let raw = json!([
            {"step": "Q4", "entities": {"A": 1}},
            {"step": "Q1", "entities": {"A": 2}}
        ]);
        let ds = normalize(&raw, &ExpectedShape::scalar()).unwrap();
        let keys: Vec<String> = ds.keys().map(|k| k.label()).collect();
        assert_eq!(keys, vec!["Q4", "Q1"]);
    }

    #[test]
    fn duplicate_keys_merge() {
        let raw = json!([
            {"entity": "A", "x": 2000, "y": 1},
            {"entity": "B", "x": 2001, "y": 2},
            {"entity": "B", "x": 2000, "y": 5}
        ]);
        let ds = normalize(&raw, &ExpectedShape::scalar()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.steps[0].entities.len(), 2);
        assert_eq!(ds.steps[0].get("B"), Some(&EntityValue::Scalar(5.0)));
    }

    #[test]
    fn booleans_are_a_mismatch_not_absence() {
        let raw = json!({"2000": {"A": true}});
        let err = normalize(&raw, &ExpectedShape::scalar()).unwrap_err();
        assert!(matches!(err, VizError::ShapeMismatch(_)));
    }

    #[test]
    fn date_keys_are_recognized() {
        let raw = json!({"2020-02-01": {"A": 1}, "2020-01-01": {"A": 2}});
        let ds = normalize(&raw, &ExpectedShape::scalar()).unwrap();
        assert!(matches!(ds.steps[0].key, StepKey::Date(_)));
        assert_eq!(ds.steps[0].key.label(), "2020-01-01");
    }
}
