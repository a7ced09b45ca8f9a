use serde_json::json;
use timeviz::scales::{KindScales, build_scales, numeric_domain, rank_order};
use timeviz::{ChartKind, ChartSpec, EngineConfig, Viewport, normalize};

#[test]
fn ranked_bar_domain_spans_the_whole_timeline() {
    let raw = json!({"2000": {"A": 5, "B": 2}, "2001": {"A": 50}, "2002": {"B": -10}});
    let spec = ChartSpec::new(ChartKind::RankedBars, "v");
    let ds = normalize(&raw, &spec.expected_shape()).unwrap();
    let scales = build_scales(
        &ds,
        &spec,
        Viewport::new(500.0, 300.0),
        &EngineConfig::default(),
        None,
    );
    let KindScales::RankedBars { x, top_n, .. } = scales.kind else {
        panic!("wrong scales for ranked bars");
    };
    assert_eq!(x.domain.0, -10.0);
    assert!((x.domain.1 - 55.0).abs() < 1e-9);
    assert_eq!(top_n, 10);
}

#[test]
fn equal_values_never_make_a_zero_width_domain() {
    let (lo, hi) = numeric_domain([0.0, 0.0, 0.0], 1.1);
    assert!(hi > lo);
    let (lo, hi) = numeric_domain(std::iter::empty(), 1.1);
    assert_eq!((lo, hi), (0.0, 1.0));
}

#[test]
fn ties_rank_by_id() {
    let raw = json!({"2000": {"ZZZ": 1, "AAA": 1, "MMM": 2}});
    let ds = normalize(&raw, &ChartSpec::new(ChartKind::RankedBars, "v").expected_shape()).unwrap();
    let order: Vec<&str> = rank_order(ds.step(0).unwrap())
        .into_iter()
        .map(|(id, _)| id.as_str())
        .collect();
    assert_eq!(order, ["MMM", "AAA", "ZZZ"]);
}

#[test]
fn scales_follow_the_viewport() {
    let raw = json!({"2000": {"A": 1}, "2001": {"A": 2}});
    let spec = ChartSpec::new(ChartKind::Line, "v");
    let ds = normalize(&raw, &spec.expected_shape()).unwrap();
    let cfg = EngineConfig::default();
    let small = build_scales(&ds, &spec, Viewport::new(400.0, 300.0), &cfg, None);
    let large = build_scales(&ds, &spec, Viewport::new(800.0, 300.0), &cfg, None);
    let (KindScales::Series { x: a, .. }, KindScales::Series { x: b, .. }) =
        (&small.kind, &large.kind)
    else {
        panic!("wrong scales for line");
    };
    assert_eq!(a.domain, b.domain);
    assert!(b.map(1.0) > a.map(1.0));
}
