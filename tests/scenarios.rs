use serde_json::json;
use std::time::Duration;
use timeviz::geo::Boundaries;
use timeviz::scene::{Mark, Part, Shape};
use timeviz::{Chart, ChartKind, ChartSpec, EngineConfig, Viewport};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn chart_with(raw: serde_json::Value) -> Chart {
    let mut chart = Chart::mount(
        ChartSpec::new(ChartKind::RankedBars, "gdp"),
        Viewport::new(800.0, 500.0),
        EngineConfig::default(),
    );
    chart.load_raw(raw).unwrap();
    chart
}

fn five_steps() -> Chart {
    chart_with(json!({
        "2000": {"DEU": 1, "FRA": 2},
        "2001": {"DEU": 2, "FRA": 2},
        "2002": {"DEU": 3, "FRA": 1},
        "2003": {"DEU": 4, "FRA": 5},
        "2004": {"DEU": 5, "FRA": 6}
    }))
}

fn bar<'a>(marks: &'a [Mark], id: &str) -> Option<&'a Mark> {
    marks
        .iter()
        .find(|m| m.key.id == id && m.key.part == Part::Bar)
}

fn bar_y(marks: &[Mark], id: &str) -> f64 {
    match bar(marks, id).map(|m| &m.shape) {
        Some(Shape::Rect { y, .. }) => *y,
        _ => f64::NAN,
    }
}

#[test]
fn gap_step_omits_the_entity_and_it_enters_again_after() {
    let mut chart = chart_with(json!({
        "2000": {"DEU": 3, "FRA": 2},
        "2001": {"FRA": 4},
        "2002": {"DEU": 5, "FRA": 4}
    }));

    chart.scrub(1, ms(0));
    let settled = chart.frame(ms(5_000));
    assert!(bar(&settled, "DEU").is_none());
    assert!(bar(&settled, "FRA").is_some());

    chart.scrub(2, ms(10_000));
    let entering = chart.frame(ms(10_000));
    let deu = bar(&entering, "DEU").expect("DEU enters");
    assert_eq!(deu.paint.opacity, 0.0);

    let done = chart.frame(ms(20_000));
    assert_eq!(bar(&done, "DEU").unwrap().paint.opacity, 1.0);
}

#[test]
fn play_from_the_last_step_wraps_and_keeps_advancing() {
    let mut chart = five_steps();
    chart.scrub(4, ms(0));

    let state = chart.play(ms(0));
    assert_eq!(state.current_index, 0);
    assert!(state.is_playing);

    chart.frame(ms(1_000));
    assert_eq!(chart.state().current_index, 1);
    chart.frame(ms(2_000));
    assert_eq!(chart.state().current_index, 2);
    assert!(chart.state().is_playing);
}

#[test]
fn playback_runs_to_the_end_and_stops() {
    let mut chart = five_steps();
    chart.play(ms(0));
    for t in 1..=6 {
        chart.frame(ms(t * 1_000));
    }
    let state = chart.state();
    assert_eq!(state.current_index, 4);
    assert!(!state.is_playing);
    assert_eq!(chart.active_timers(), 0);
}

#[test]
fn resize_mid_transition_keeps_the_step() {
    let mut chart = five_steps();
    chart.play(ms(0));
    chart.frame(ms(1_000));
    assert!(chart.is_animating(ms(1_100)));

    let wide = Viewport::new(1200.0, 500.0);
    chart.resize(wide, ms(1_100));
    chart.frame(ms(1_200));
    assert_eq!(chart.viewport(), Viewport::new(800.0, 500.0));

    let marks = chart.frame(ms(1_300));
    assert_eq!(chart.viewport(), wide);
    assert_eq!(chart.scales().viewport, wide);
    assert_eq!(chart.state().current_index, 1);
    assert!(chart.state().is_playing);

    let target = chart.frame_at(1);
    assert_eq!(
        bar(&marks, "DEU").map(|m| &m.shape),
        target.get("DEU", Part::Bar).map(|m| &m.shape)
    );
}

#[test]
fn play_twice_keeps_a_single_timer() {
    let mut chart = five_steps();
    chart.play(ms(0));
    let first = chart.timer().cloned();
    chart.play(ms(300));
    assert_eq!(chart.active_timers(), 1);
    assert_eq!(chart.timer().cloned(), first);
}

#[test]
fn scrub_cancels_playback_for_good() {
    let mut chart = five_steps();
    chart.play(ms(0));
    let old = chart.timer().map(|t| t.id).unwrap();

    let state = chart.scrub(2, ms(500));
    assert!(!state.is_playing);
    assert_eq!(chart.active_timers(), 0);

    chart.on_timer(old, ms(1_000));
    for t in 1..10 {
        chart.frame(ms(t * 1_000));
    }
    assert_eq!(chart.state().current_index, 2);
}

#[test]
fn timer_from_before_a_dataset_swap_never_renders() {
    let mut chart = five_steps();
    chart.play(ms(0));
    chart.frame(ms(1_000));
    assert_eq!(chart.state().current_index, 1);
    let old = chart.timer().map(|t| t.id).unwrap();

    chart
        .load_raw(json!({
            "1990": {"ITA": 7, "ESP": 3},
            "1991": {"ITA": 8, "ESP": 9}
        }))
        .unwrap();
    assert_eq!(chart.active_timers(), 0);

    let state = chart.on_timer(old, ms(2_000));
    assert_eq!(state.current_index, 0);
    assert!(!state.is_playing);
    assert_eq!(chart.active_timers(), 0);

    let marks = chart.frame(ms(5_000));
    assert!(bar(&marks, "ITA").is_some());
    assert!(bar(&marks, "DEU").is_none());
    assert_eq!(chart.state().current_index, 0);
}

#[test]
fn domain_is_the_same_however_a_step_is_reached() {
    let mut played = five_steps();
    played.play(ms(0));
    for t in 1..=3 {
        played.frame(ms(t * 1_000));
    }
    assert_eq!(played.state().current_index, 3);

    let mut scrubbed = five_steps();
    scrubbed.scrub(3, ms(0));

    assert_eq!(played.scales(), scrubbed.scales());
    assert_eq!(played.frame_at(3), scrubbed.frame_at(3));
}

#[test]
fn tied_values_keep_their_row_order() {
    let mut chart = five_steps();
    // 2001: DEU and FRA both 2
    let a = chart.frame_at(1);
    let b = chart.frame_at(1);
    assert_eq!(a, b);
    let marks = a.marks;
    assert!(bar_y(&marks, "DEU") < bar_y(&marks, "FRA"));
}

#[test]
fn zero_is_drawn_and_absence_is_not() {
    let mut chart = chart_with(json!({"2000": {"DEU": null, "FRA": 0, "ITA": 3}}));
    let frame = chart.frame_at(0);
    assert!(frame.get("DEU", Part::Bar).is_none());
    assert!(frame.get("FRA", Part::Bar).is_some());
    assert!(frame.get("ITA", Part::Bar).is_some());
}

#[test]
fn choropleth_absent_regions_use_the_neutral_fill() {
    let square = |id: &str, lon: f64| {
        json!({"type": "Feature", "id": id, "properties": {},
            "geometry": {"type": "Polygon", "coordinates": [[
                [lon, 0.0], [lon + 10.0, 0.0], [lon + 10.0, 10.0], [lon, 10.0], [lon, 0.0]
            ]]}})
    };
    let geo = json!({"type": "FeatureCollection", "features": [
        square("AAA", 0.0), square("BBB", 20.0), square("CCC", 40.0)
    ]});

    let mut chart = Chart::mount(
        ChartSpec::new(ChartKind::Choropleth, "pop"),
        Viewport::new(600.0, 400.0),
        EngineConfig::default(),
    );
    chart.set_boundaries(Boundaries::from_geojson(&geo, "iso_a3").unwrap());
    chart.load_raw(json!({"2000": {"AAA": 0, "BBB": 10}})).unwrap();

    let frame = chart.frame_at(0);
    let fill = |id: &str| frame.get(id, Part::Region).map(|m| m.paint.fill.to_hex());
    assert_eq!(fill("CCC").as_deref(), Some("#D9D9D9"));
    assert_ne!(fill("AAA"), fill("CCC"));
    assert_ne!(fill("AAA"), fill("BBB"));
}

#[test]
fn unmount_releases_the_timer() {
    let mut chart = five_steps();
    chart.play(ms(0));
    let state = chart.unmount();
    assert!(!state.is_playing);
}
