use serde_json::json;
use timeviz::models::AgeBand;
use timeviz::normalize::normalize_str;
use timeviz::{EntityValue, ExpectedShape, StepKey, ValueShape, VizError, normalize};

fn years(ds: &timeviz::TimeSeriesDataset) -> Vec<String> {
    ds.keys().map(|k| k.label()).collect()
}

#[test]
fn every_source_shape_gives_the_same_dataset() {
    let expected = ExpectedShape::scalar();
    let step_array = json!([
        {"year": 2001, "entities": [{"id": "FRA", "value": 2}]},
        {"year": 2000, "entities": {"DEU": 1, "FRA": "3"}}
    ]);
    let by_step = json!({"2000": {"DEU": 1, "FRA": 3}, "2001": {"FRA": 2}});
    let by_entity = json!({"DEU": {"2000": 1}, "FRA": {"2000": 3, "2001": 2}});
    let flat = json!([
        {"entity": "DEU", "x": 2000, "y": 1},
        {"entity": "FRA", "x": 2000, "y": 3},
        {"entity": "FRA", "x": 2001, "y": 2}
    ]);

    let reference = normalize(&by_step, &expected).unwrap();
    assert_eq!(years(&reference), ["2000", "2001"]);
    for raw in [step_array, by_entity, flat] {
        assert_eq!(normalize(&raw, &expected).unwrap(), reference);
    }
}

#[test]
fn missing_values_are_absent_not_zero() {
    let raw = json!({"2000": {"DEU": 1, "FRA": null, "ITA": "n/a"}});
    let ds = normalize(&raw, &ExpectedShape::scalar()).unwrap();
    let step = ds.step(0).unwrap();
    assert_eq!(step.get("DEU"), Some(&EntityValue::Scalar(1.0)));
    assert!(step.get("FRA").is_none());
    assert!(step.get("ITA").is_none());
}

#[test]
fn wrong_types_fail_without_a_partial_dataset() {
    let cases = [
        json!(true),
        json!("2000"),
        json!({}),
        json!({"2000": 5}),
        json!({"2000": {"DEU": [true]}}),
        json!({"steps": {"2000": 1}}),
    ];
    for raw in cases {
        let err = normalize(&raw, &ExpectedShape::scalar()).unwrap_err();
        assert!(matches!(err, VizError::ShapeMismatch(_)), "{raw}: {err:?}");
    }
}

#[test]
fn empty_array_is_an_empty_dataset() {
    let ds = normalize(&json!([]), &ExpectedShape::scalar()).unwrap();
    assert!(ds.is_empty());
    assert!(!ds.is_playable());
}

#[test]
fn numeric_keys_sort_by_value() {
    let raw = json!({"10": {"A": 1}, "9": {"A": 2}, "100": {"A": 3}});
    let ds = normalize(&raw, &ExpectedShape::scalar()).unwrap();
    assert_eq!(years(&ds), ["9", "10", "100"]);
}

#[test]
fn dates_are_parsed_and_ordered() {
    let raw = json!({"2020-03-01": {"A": 1}, "2020-01-15": {"A": 2}});
    let ds = normalize(&raw, &ExpectedShape::scalar()).unwrap();
    assert!(matches!(ds.steps[0].key, StepKey::Date(_)));
    assert_eq!(years(&ds), ["2020-01-15", "2020-03-01"]);
}

#[test]
fn ordinal_arrays_keep_source_order() {
    let raw = json!([
        {"key": "Q4", "entities": {"A": 1}},
        {"key": "Q1", "entities": {"A": 2}}
    ]);
    let ds = normalize(&raw, &ExpectedShape::scalar()).unwrap();
    assert_eq!(years(&ds), ["Q4", "Q1"]);
}

#[test]
fn duplicate_keys_merge_with_later_values_winning() {
    let raw = json!([
        {"year": 2000, "entities": {"A": 1, "B": 5}},
        {"year": 2000, "entities": {"A": 2}}
    ]);
    let ds = normalize(&raw, &ExpectedShape::scalar()).unwrap();
    assert_eq!(ds.len(), 1);
    let step = ds.step(0).unwrap();
    assert_eq!(step.get("A"), Some(&EntityValue::Scalar(2.0)));
    assert_eq!(step.get("B"), Some(&EntityValue::Scalar(5.0)));
}

#[test]
fn metric_key_selects_the_field() {
    let raw = json!({"2000": {"DEU": {"gdp": 3, "pop": 80, "name": "Germany"}}});
    let expected = ExpectedShape::of(ValueShape::LabeledPoint).with_metric("pop");
    let ds = normalize(&raw, &expected).unwrap();
    assert_eq!(
        ds.step(0).unwrap().get("DEU"),
        Some(&EntityValue::LabeledPoint {
            label: "Germany".into(),
            value: 80.0
        })
    );
}

#[test]
fn dual_axis_without_requested_size_is_absent() {
    let raw = json!({"2000": {
        "A": {"gdp": 1, "life": 70, "pop": 5},
        "B": {"gdp": 2, "life": 72}
    }});
    let expected = ExpectedShape::of(ValueShape::DualAxis)
        .with_metric("gdp")
        .with_secondary("life")
        .with_size("pop");
    let ds = normalize(&raw, &expected).unwrap();
    let step = ds.step(0).unwrap();
    assert_eq!(step.get("A").and_then(|v| v.size()), Some(5.0));
    assert!(step.get("B").is_none());
}

#[test]
fn age_bands_are_ordered_youngest_first() {
    let raw = json!({"2000": {"DEU": {
        "80+": [1, 2],
        "0-4": {"male": 10, "female": 9},
        "5-9": [8, 7]
    }}});
    let ds = normalize(&raw, &ExpectedShape::of(ValueShape::AgeBands)).unwrap();
    let bands = ds.step(0).unwrap().get("DEU").unwrap().bands().to_vec();
    let groups: Vec<&str> = bands.iter().map(|b| b.group.as_str()).collect();
    assert_eq!(groups, ["0-4", "5-9", "80+"]);
    assert_eq!(
        bands[0],
        AgeBand {
            group: "0-4".into(),
            left: 10.0,
            right: 9.0
        }
    );
}

#[test]
fn repeated_age_group_keeps_the_later_band() {
    let raw = json!({"2000": {"DEU": [
        {"group": "0-4", "left": 10, "right": 9},
        {"group": "5-9", "left": 8, "right": 8},
        {"group": "0-4", "left": 11, "right": 12}
    ]}});
    let ds = normalize(&raw, &ExpectedShape::of(ValueShape::AgeBands)).unwrap();
    let bands = ds.step(0).unwrap().get("DEU").unwrap().bands().to_vec();
    assert_eq!(bands.len(), 2);
    assert_eq!(
        bands[0],
        AgeBand {
            group: "0-4".into(),
            left: 11.0,
            right: 12.0
        }
    );
}

#[test]
fn canonical_serialization_normalizes_to_itself() {
    let raw = json!({"2001": {"FRA": 2.5}, "2000": {"DEU": 1, "FRA": 3}});
    let expected = ExpectedShape::scalar();
    let first = normalize(&raw, &expected).unwrap();
    let text = serde_json::to_string(&first).unwrap();
    let second = normalize_str(&text, &expected).unwrap();
    assert_eq!(first, second);
}
