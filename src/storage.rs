use crate::models::{ExpectedShape, TimeSeriesDataset};
use crate::normalize::normalize;
use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, WriterBuilder};
use serde_json::{Map, Value, json};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

/// Prefix cells a spreadsheet would evaluate as formulas.
fn sanitize_cell(s: &str) -> String {
    let risky = s.starts_with(['=', '+', '-', '@']);
    if risky && s.trim().parse::<f64>().is_err() {
        format!("'{s}")
    } else {
        s.to_string()
    }
}

fn unsanitize_cell(s: &str) -> &str {
    match s.strip_prefix('\'') {
        Some(rest) if rest.starts_with(['=', '+', '-', '@']) => rest,
        _ => s,
    }
}

fn opt_cell(v: Option<f64>) -> String {
    v.filter(|x| x.is_finite())
        .map(|x| x.to_string())
        .unwrap_or_default()
}

/// Save a dataset as tidy CSV rows `step,entity,value,secondary,size`.
/// Absent entities produce no row.
pub fn save_csv<P: AsRef<Path>>(dataset: &TimeSeriesDataset, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    wtr.write_record(["step", "entity", "value", "secondary", "size"])?;
    for step in &dataset.steps {
        let key = sanitize_cell(&step.key.label());
        for (id, value) in &step.entities {
            wtr.write_record([
                key.clone(),
                sanitize_cell(id),
                opt_cell(Some(value.primary())),
                opt_cell(value.secondary()),
                opt_cell(value.size()),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Save the canonical dataset as pretty JSON.
pub fn save_json<P: AsRef<Path>>(dataset: &TimeSeriesDataset, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let s = serde_json::to_string_pretty(dataset)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

/// Load any supported raw JSON shape (including the canonical one) and normalize it.
pub fn load_json<P: AsRef<Path>>(path: P, expected: &ExpectedShape) -> Result<TimeSeriesDataset> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let raw: Value = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse {}", path.display()))?;
    Ok(normalize(&raw, expected)?)
}

/// Read a tidy CSV into the flat-point raw shape (`entity`, `x`, `y`, ...).
///
/// Required columns: `step` (or `year`/`date`/`key`), `entity` (or `id`/`country`/`iso3`)
/// and `value` (or `y`). Optional: `label`, `secondary`, `size`.
pub fn read_csv_raw<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();
    let column = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));
    let step_col = column(&["step", "year", "date", "key"])
        .ok_or_else(|| anyhow!("{}: no step column", path.display()))?;
    let entity_col = column(&["entity", "id", "country", "iso3"])
        .ok_or_else(|| anyhow!("{}: no entity column", path.display()))?;
    let value_col = column(&["value", "y"])
        .ok_or_else(|| anyhow!("{}: no value column", path.display()))?;
    let label_col = column(&["label", "name"]);
    let secondary_col = column(&["secondary"]);
    let size_col = column(&["size"]);

    let mut points = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("{}: row {}", path.display(), line + 2))?;
        let cell = |i: usize| record.get(i).map(unsanitize_cell).unwrap_or("");
        let number_or_null = |i: Option<usize>| match i.map(cell) {
            Some(s) if !s.is_empty() => Value::String(s.to_string()),
            _ => Value::Null,
        };
        let entity = cell(entity_col);
        if entity.is_empty() {
            continue;
        }
        let step = cell(step_col);
        let x = match step.parse::<f64>() {
            Ok(n) => json!(n),
            Err(_) => Value::String(step.to_string()),
        };
        let mut obj = Map::new();
        obj.insert("entity".into(), Value::String(entity.to_string()));
        obj.insert("x".into(), x);
        // `value` as well, so dual-axis reads never fall back to the step in `x`
        let value = number_or_null(Some(value_col));
        obj.insert("value".into(), value.clone());
        obj.insert("y".into(), value);
        if secondary_col.is_some() {
            obj.insert("secondary".into(), number_or_null(secondary_col));
        }
        if size_col.is_some() {
            obj.insert("size".into(), number_or_null(size_col));
        }
        if let Some(label) = label_col.map(cell).filter(|s| !s.is_empty()) {
            obj.insert("label".into(), Value::String(label.to_string()));
        }
        points.push(Value::Object(obj));
    }
    Ok(Value::Array(points))
}

/// Load a tidy CSV and normalize it.
pub fn load_csv<P: AsRef<Path>>(path: P, expected: &ExpectedShape) -> Result<TimeSeriesDataset> {
    let raw = read_csv_raw(path)?;
    Ok(normalize(&raw, expected)?)
}

/// Load by extension: `.csv` as tidy CSV, anything else as JSON.
pub fn load_dataset<P: AsRef<Path>>(path: P, expected: &ExpectedShape) -> Result<TimeSeriesDataset> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => load_csv(path, expected),
        _ => load_json(path, expected),
    }
}

/// Raw payload by extension, for hosts that keep the source around.
pub fn read_raw<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => read_csv_raw(path),
        _ => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityValue, StepKey, TimeStep, ValueShape};
    use tempfile::tempdir;

    fn dataset() -> TimeSeriesDataset {
        let mut ds = TimeSeriesDataset::empty(ValueShape::Scalar);
        let mut s = TimeStep::new(StepKey::Numeric(2000.0));
        s.entities.insert("DEU".into(), EntityValue::Scalar(1.5));
        s.entities.insert("=HYPERLINK()".into(), EntityValue::Scalar(2.0));
        ds.steps.push(s);
        ds
    }

    #[test]
    fn write_csv_and_json() {
        let dir = tempdir().unwrap();
        let csvp = dir.path().join("x.csv");
        let jsonp = dir.path().join("x.json");
        save_csv(&dataset(), &csvp).unwrap();
        save_json(&dataset(), &jsonp).unwrap();
        let text = std::fs::read_to_string(&csvp).unwrap();
        assert!(text.starts_with("step,entity,value,secondary,size"));
        assert!(text.contains("'=HYPERLINK()"));
        assert!(jsonp.exists());
    }

    #[test]
    fn negative_numbers_are_not_escaped() {
        assert_eq!(sanitize_cell("-3.5"), "-3.5");
        assert_eq!(sanitize_cell("-x"), "'-x");
        assert_eq!(unsanitize_cell("'-x"), "-x");
        assert_eq!(unsanitize_cell("'plain"), "'plain");
    }
}
