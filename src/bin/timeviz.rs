use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use timeviz::geo::Boundaries;
use timeviz::playback::PlaybackController;
use timeviz::{Chart, ChartKind, ChartSpec, EngineConfig, StepKey, Viewport};
use timeviz::{stats, storage, viz};

#[derive(Parser, Debug)]
#[command(
    name = "timeviz",
    version,
    about = "Normalize, animate, export & summarize time-indexed multi-entity data"
)]
struct Cli {
    /// Engine configuration (JSON); unspecified fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Number locale for labels (en, de, fr, ...).
    #[arg(long, global = true)]
    locale: Option<String>,
    /// TTF/OTF font used for PNG text.
    #[arg(long, global = true)]
    font: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one step to SVG or PNG.
    Render(RenderArgs),
    /// Render every step (and optional transition samples) into a directory.
    Frames(FramesArgs),
    /// Convert a raw JSON/CSV payload into the canonical dataset.
    Normalize(NormalizeArgs),
    /// Print per-entity statistics.
    Stats(ChartArgs),
    /// Run the playback controller headless and print the step sequence.
    Simulate(SimulateArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ImageFormat {
    Svg,
    Png,
}

impl ImageFormat {
    fn ext(self) -> &'static str {
        match self {
            ImageFormat::Svg => "svg",
            ImageFormat::Png => "png",
        }
    }
}

#[derive(Args, Debug)]
struct ChartArgs {
    /// Dataset file (.json in any supported shape, or tidy .csv).
    #[arg(short, long)]
    input: PathBuf,
    /// Chart kind (ranked-bars, choropleth, population-pyramid, bubble, line, area, category-bars).
    #[arg(short, long, default_value = "line")]
    kind: ChartKind,
    /// Metric field read from entity objects.
    #[arg(short, long, default_value = "value")]
    metric: String,
    /// Second metric (bubble y axis).
    #[arg(long)]
    secondary: Option<String>,
    /// Size metric (bubble radius).
    #[arg(long)]
    size: Option<String>,
    /// Entity drawn by the population pyramid.
    #[arg(long)]
    focus: Option<String>,
    /// Row cap for ranked bars.
    #[arg(long)]
    top_n: Option<usize>,
    /// Chart title (defaults to the metric).
    #[arg(long)]
    title: Option<String>,
}

impl ChartArgs {
    fn spec(&self) -> ChartSpec {
        let mut spec = ChartSpec::new(self.kind, self.metric.clone());
        spec.secondary_metric_key = self.secondary.clone();
        spec.size_metric_key = self.size.clone();
        spec.focus_entity = self.focus.clone();
        spec.top_n = self.top_n;
        spec.labels.title = self.title.clone();
        spec
    }
}

#[derive(Args, Debug)]
struct CanvasArgs {
    /// Boundary GeoJSON FeatureCollection (choropleth).
    #[arg(long)]
    geo: Option<PathBuf>,
    /// Width in pixels.
    #[arg(long, default_value_t = 960)]
    width: u32,
    /// Height in pixels.
    #[arg(long, default_value_t = 540)]
    height: u32,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    chart: ChartArgs,
    #[command(flatten)]
    canvas: CanvasArgs,
    /// Step index (default: last step).
    #[arg(long, conflicts_with = "key")]
    step: Option<usize>,
    /// Step key label such as 2010 (nearest earlier step when missing).
    #[arg(long)]
    key: Option<String>,
    /// Output image (.svg or .png).
    #[arg(short, long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct FramesArgs {
    #[command(flatten)]
    chart: ChartArgs,
    #[command(flatten)]
    canvas: CanvasArgs,
    /// Output directory.
    #[arg(short, long)]
    out_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = ImageFormat::Svg)]
    format: ImageFormat,
    /// Transition samples written between consecutive steps.
    #[arg(long, default_value_t = 0)]
    inbetween: u32,
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    #[command(flatten)]
    chart: ChartArgs,
    /// Output file; stdout (JSON) when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format; inferred from the --out extension when omitted.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Number of steps (ignored when --input is given).
    #[arg(long, default_value_t = 5)]
    steps: usize,
    /// Dataset whose step count is used.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Index to start from; playing from the last step restarts at 0.
    #[arg(long, default_value_t = 0)]
    start: usize,
    /// Tick interval in milliseconds (defaults to the configured one).
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Stop after this many ticks even if playback is still running.
    #[arg(long, default_value_t = 1000)]
    max_ticks: usize,
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => {
            let s = format!("{:.4}", x);
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        _ => "NA".to_string(),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(p) => EngineConfig::from_path(p)
            .with_context(|| format!("load config {}", p.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(locale) = &cli.locale {
        config.locale = locale.clone();
    }
    if let Some(font) = &cli.font {
        viz::register_font_file(font)?;
    }
    match cli.cmd {
        Command::Render(args) => cmd_render(args, config),
        Command::Frames(args) => cmd_frames(args, config),
        Command::Normalize(args) => cmd_normalize(args),
        Command::Stats(args) => cmd_stats(args),
        Command::Simulate(args) => cmd_simulate(args, config),
    }
}

/// Mount a chart and load the dataset (and boundaries) into it.
fn load_chart(chart_args: &ChartArgs, canvas: &CanvasArgs, config: EngineConfig) -> Result<Chart> {
    let viewport = Viewport::new(canvas.width as f64, canvas.height as f64);
    let mut chart = Chart::mount(chart_args.spec(), viewport, config);
    if let Some(geo) = &canvas.geo {
        let text =
            std::fs::read_to_string(geo).with_context(|| format!("read {}", geo.display()))?;
        let boundaries = Boundaries::from_str(&text, &chart.config().feature_id_property)?;
        chart.set_boundaries(boundaries);
    }
    let raw = storage::read_raw(&chart_args.input)?;
    chart
        .load_raw(raw)
        .with_context(|| format!("load {}", chart_args.input.display()))?;
    Ok(chart)
}

fn export_step(chart: &mut Chart, index: usize, canvas: &CanvasArgs, out: &Path) -> Result<()> {
    let frame = chart.frame_at(index);
    let locale = chart.config().locale.clone();
    viz::export_frame(
        &frame.marks,
        out,
        canvas.width,
        canvas.height,
        frame.legend.as_ref(),
        &locale,
    )
}

fn cmd_render(args: RenderArgs, config: EngineConfig) -> Result<()> {
    let mut chart = load_chart(&args.chart, &args.canvas, config)?;
    let ds = chart.dataset();
    let index = match (&args.step, &args.key) {
        (Some(i), _) => *i,
        (None, Some(label)) => match ds.keys().position(|k| k.label() == *label) {
            Some(i) => i,
            None => {
                let key = match label.parse::<f64>() {
                    Ok(n) => StepKey::Numeric(n),
                    Err(_) => bail!("step key {label} not found"),
                };
                ds.nearest_index(&key)
            }
        },
        (None, None) => ds.last_index(),
    };
    export_step(&mut chart, index, &args.canvas, &args.out)?;
    eprintln!("Wrote step {} to {}", index, args.out.display());
    Ok(())
}

fn cmd_frames(args: FramesArgs, config: EngineConfig) -> Result<()> {
    let mut chart = load_chart(&args.chart, &args.canvas, config)?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create {}", args.out_dir.display()))?;
    let ext = args.format.ext();
    let locale = chart.config().locale.clone();
    let duration = chart.config().transition_for(chart.spec().kind);
    let period = duration + Duration::from_millis(1);
    let samples = args.inbetween;
    let mut written = 0usize;

    for i in 0..chart.dataset().len() {
        let start = period * i as u32;
        chart.scrub(i, start);
        if i > 0 {
            for k in 1..=samples {
                let t = start + duration * k / (samples + 1);
                let marks = chart.frame(t);
                let path = args.out_dir.join(format!("step_{i:04}_{k:02}.{ext}"));
                let legend = chart.legend().cloned();
                viz::export_frame(
                    &marks,
                    &path,
                    args.canvas.width,
                    args.canvas.height,
                    legend.as_ref(),
                    &locale,
                )?;
                written += 1;
            }
        }
        let path = args.out_dir.join(format!("step_{i:04}.{ext}"));
        export_step(&mut chart, i, &args.canvas, &path)?;
        written += 1;
    }
    eprintln!("Wrote {} frames to {}", written, args.out_dir.display());
    Ok(())
}

fn cmd_normalize(args: NormalizeArgs) -> Result<()> {
    let spec = args.chart.spec();
    let dataset = storage::load_dataset(&args.chart.input, &spec.expected_shape())?;
    let Some(path) = args.out.as_ref() else {
        println!("{}", serde_json::to_string_pretty(&dataset)?);
        return Ok(());
    };
    let fmt = match args.format {
        Some(OutFormat::Csv) => "csv",
        Some(OutFormat::Json) => "json",
        None => path.extension().and_then(|e| e.to_str()).unwrap_or("json"),
    }
    .to_ascii_lowercase();
    match fmt.as_str() {
        "csv" => storage::save_csv(&dataset, path)?,
        "json" => storage::save_json(&dataset, path)?,
        other => bail!("unsupported format: {}", other),
    }
    eprintln!("Saved {} steps to {}", dataset.len(), path.display());
    Ok(())
}

fn cmd_stats(args: ChartArgs) -> Result<()> {
    let spec = args.spec();
    let dataset = storage::load_dataset(&args.input, &spec.expected_shape())?;
    for s in stats::entity_summary(&dataset) {
        println!(
            "{}  count={} missing={}  min={} max={} mean={} median={}",
            s.entity,
            s.count,
            s.missing,
            fmt_opt(s.min),
            fmt_opt(s.max),
            fmt_opt(s.mean),
            fmt_opt(s.median)
        );
    }
    Ok(())
}

fn cmd_simulate(args: SimulateArgs, config: EngineConfig) -> Result<()> {
    let len = match &args.input {
        Some(path) => {
            let expected = ChartSpec::new(ChartKind::Line, "value").expected_shape();
            storage::load_dataset(path, &expected)?.len()
        }
        None => args.steps,
    };
    let interval = args
        .interval_ms
        .map_or_else(|| config.tick_interval(), Duration::from_millis);
    let mut playback = PlaybackController::new(len, interval);
    playback.scrub(args.start);
    playback.play(Duration::ZERO);
    println!("0\t{}\t{}", playback.index(), label(playback.is_playing()));

    let mut now = Duration::ZERO;
    for _ in 0..args.max_ticks {
        if !playback.is_playing() {
            break;
        }
        now += interval;
        playback.poll(now);
        println!(
            "{}\t{}\t{}",
            now.as_millis(),
            playback.index(),
            label(playback.is_playing())
        );
    }
    Ok(())
}

fn label(playing: bool) -> &'static str {
    if playing { "playing" } else { "stopped" }
}
