use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use timeviz::geo::Boundaries;
use timeviz::{Chart, ChartKind, ChartSpec, EngineConfig, Viewport, viz};

fn payload(kind: ChartKind) -> Value {
    match kind {
        ChartKind::PopulationPyramid => json!({
            "2000": {"DEU": {"0-4": [10, 9], "5-9": [8, 8], "80+": [2, 4]}},
            "2010": {"DEU": {"0-4": [9, 9], "5-9": [9, 8], "80+": [3, 5]}}
        }),
        ChartKind::Bubble => json!({
            "2000": {"DEU": {"gdp": 30000, "life": 78, "pop": 82},
                     "FRA": {"gdp": 28000, "life": 79, "pop": 60}},
            "2010": {"DEU": {"gdp": 41000, "life": 80, "pop": 81}}
        }),
        _ => json!({
            "2000": {"AAA": 3, "BBB": 2, "CCC": 1},
            "2001": {"AAA": 4, "BBB": 5},
            "2002": {"AAA": 6, "BBB": 5, "CCC": 2}
        }),
    }
}

fn boundaries() -> Boundaries {
    let square = |id: &str, lon: f64| {
        json!({"type": "Feature", "properties": {"iso_a3": id, "name": id},
            "geometry": {"type": "MultiPolygon", "coordinates": [[[
                [lon, 0.0], [lon + 10.0, 0.0], [lon + 10.0, 10.0], [lon, 10.0], [lon, 0.0]
            ]]]}})
    };
    let fc = json!({"type": "FeatureCollection", "features": [
        square("AAA", 0.0), square("BBB", 15.0), square("CCC", 30.0)
    ]});
    Boundaries::from_geojson(&fc, "iso_a3").unwrap()
}

fn chart(kind: ChartKind) -> Chart {
    let spec = match kind {
        ChartKind::Bubble => ChartSpec::new(kind, "gdp")
            .with_secondary("life")
            .with_size("pop"),
        ChartKind::PopulationPyramid => ChartSpec::new(kind, "value").with_focus("DEU"),
        _ => ChartSpec::new(kind, "value"),
    };
    let mut chart = Chart::mount(spec, Viewport::new(640.0, 400.0), EngineConfig::default());
    if kind == ChartKind::Choropleth {
        chart.set_boundaries(boundaries());
    }
    chart.load_raw(payload(kind)).unwrap();
    chart
}

fn export_and_check(chart: &mut Chart, path: &Path) {
    let frame = chart.frame_at(1);
    viz::export_frame(&frame.marks, path, 640, 400, frame.legend.as_ref(), "en").unwrap();
    let meta = fs::metadata(path).expect("file created");
    assert!(meta.len() > 0, "{} has content", path.display());
}

#[test]
fn every_kind_exports_svg() {
    let dir = tempfile::tempdir().unwrap();
    for kind in ChartKind::ALL {
        let mut chart = chart(kind);
        assert!(chart.error().is_none(), "{kind}: {:?}", chart.error());
        let path = dir.path().join(format!("{kind}.svg"));
        export_and_check(&mut chart, &path);
    }
}

#[test]
fn choropleth_svg_carries_its_ramp_legend() {
    let dir = tempfile::tempdir().unwrap();
    let mut chart = chart(ChartKind::Choropleth);
    let frame = chart.frame_at(1);
    assert!(frame.legend.is_some());

    let path = dir.path().join("map.svg");
    export_and_check(&mut chart, &path);
    let svg = fs::read_to_string(&path).unwrap();
    // the legend band adds height below the 400px chart
    assert!(!svg.contains("height=\"400\""));
}

#[test]
fn png_without_a_font_still_draws_shapes() {
    let dir = tempfile::tempdir().unwrap();
    let mut chart = chart(ChartKind::RankedBars);
    let path = dir.path().join("nested").join("race.png");
    export_and_check(&mut chart, &path);
}

#[test]
fn empty_chart_exports_its_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let mut chart = Chart::mount(
        ChartSpec::new(ChartKind::Line, "gdp"),
        Viewport::new(320.0, 200.0),
        EngineConfig::default(),
    );
    let marks = chart.frame(std::time::Duration::ZERO);
    let path = dir.path().join("empty.svg");
    viz::export_frame(&marks, &path, 320, 200, None, "en").unwrap();
    let svg = fs::read_to_string(&path).unwrap();
    assert!(svg.contains("No data"));
}
