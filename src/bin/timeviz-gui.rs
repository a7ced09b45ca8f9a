/*!
 * Desktop host for timeviz: open a dataset (and optional boundaries), pick a
 * chart kind and metrics, then play, step, scrub and hover.
 *
 * The chart engine owns all state; this host only forwards time, pointer and
 * size events and paints the primitives it gets back.
 */

use anyhow::Result;
use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Stroke};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use timeviz::geo::Boundaries;
use timeviz::palette::Rgba;
use timeviz::scene::{Anchor, Mark, Shape};
use timeviz::{Chart, ChartKind, ChartSpec, EngineConfig, Viewport, storage};

fn main() -> Result<(), eframe::Error> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 720.0])
            .with_min_inner_size([640.0, 420.0])
            .with_title("timeviz"),
        ..Default::default()
    };

    eframe::run_native(
        "timeviz",
        options,
        Box::new(|_cc| Ok(Box::new(VizApp::new()))),
    )
}

struct Loaded {
    raw: Value,
    boundaries: Option<Boundaries>,
    label: String,
}

struct VizApp {
    chart: Chart,
    mounted: Instant,
    observed: Viewport,

    // Inputs
    dataset_path: String,
    geo_path: String,
    kind: ChartKind,
    metric: String,
    secondary: String,
    size: String,
    focus: String,
    interval_ms: u64,

    // UI state
    is_loading: bool,
    status_message: String,
    error_message: String,
    loader: Option<mpsc::Receiver<Result<Loaded, String>>>,
}

impl VizApp {
    fn new() -> Self {
        let config = EngineConfig::default();
        let interval_ms = config.tick_interval_ms;
        let kind = ChartKind::RankedBars;
        let viewport = Viewport::new(800.0, 500.0);
        Self {
            chart: Chart::mount(
                ChartSpec::new(kind, "value"),
                viewport,
                config,
            ),
            mounted: Instant::now(),
            observed: viewport,
            dataset_path: String::new(),
            geo_path: String::new(),
            kind,
            metric: "value".to_string(),
            secondary: String::new(),
            size: String::new(),
            focus: String::new(),
            interval_ms,
            is_loading: false,
            status_message: String::new(),
            error_message: String::new(),
            loader: None,
        }
    }

    fn now(&self) -> Duration {
        self.mounted.elapsed()
    }

    fn spec(&self) -> ChartSpec {
        let opt = |s: &str| {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        };
        let mut spec = ChartSpec::new(self.kind, self.metric.trim());
        spec.secondary_metric_key = opt(&self.secondary);
        spec.size_metric_key = opt(&self.size);
        spec.focus_entity = opt(&self.focus);
        spec
    }

    fn start_loading(&mut self) {
        if self.dataset_path.trim().is_empty() {
            self.error_message = "Please choose a dataset file".to_string();
            return;
        }
        self.is_loading = true;
        self.error_message.clear();
        self.status_message = "Loading...".to_string();

        let (sender, receiver) = mpsc::channel();
        self.loader = Some(receiver);
        let dataset_path = PathBuf::from(self.dataset_path.trim());
        let geo_path = Some(self.geo_path.trim())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let id_property = self.chart.config().feature_id_property.clone();

        thread::spawn(move || {
            let result = (|| -> Result<Loaded> {
                let raw = storage::read_raw(&dataset_path)?;
                let boundaries = match geo_path {
                    Some(p) => Some(Boundaries::from_str(
                        &std::fs::read_to_string(&p)?,
                        &id_property,
                    )?),
                    None => None,
                };
                Ok(Loaded {
                    raw,
                    boundaries,
                    label: dataset_path.display().to_string(),
                })
            })();
            let _ = sender.send(result.map_err(|e| format!("{e:#}")));
        });
    }

    fn check_loading(&mut self) {
        let Some(result) = self.loader.as_ref().and_then(|r| r.try_recv().ok()) else {
            return;
        };
        self.is_loading = false;
        self.loader = None;
        match result {
            Ok(loaded) => self.install(loaded),
            Err(error) => {
                self.error_message = error;
                self.status_message.clear();
            }
        }
    }

    fn install(&mut self, loaded: Loaded) {
        if let Some(b) = loaded.boundaries {
            self.chart.set_boundaries(b);
        }
        match self.chart.load(self.spec(), loaded.raw) {
            Ok(()) => {
                let ds = self.chart.dataset();
                self.status_message = format!(
                    "{}: {} steps, {} entities",
                    loaded.label,
                    ds.len(),
                    ds.entity_ids().len()
                );
                self.error_message.clear();
            }
            Err(err) => {
                self.error_message = err.to_string();
                self.status_message.clear();
            }
        }
    }

    fn apply_spec(&mut self) {
        match self.chart.set_spec(self.spec()) {
            Ok(()) => self.error_message.clear(),
            Err(err) => self.error_message = err.to_string(),
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Dataset:");
            ui.text_edit_singleline(&mut self.dataset_path)
                .on_hover_text("JSON in any supported shape, or a tidy CSV (step,entity,value)");
            if ui.button("Browse").clicked()
                && let Some(path) = rfd::FileDialog::new()
                    .add_filter("data", &["json", "csv"])
                    .set_directory(dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
                    .pick_file()
            {
                self.dataset_path = path.to_string_lossy().to_string();
            }
            ui.label("Boundaries:");
            ui.text_edit_singleline(&mut self.geo_path)
                .on_hover_text("Optional GeoJSON FeatureCollection for choropleths");
            if ui.button("Browse").clicked()
                && let Some(path) = rfd::FileDialog::new()
                    .add_filter("geojson", &["json", "geojson"])
                    .pick_file()
            {
                self.geo_path = path.to_string_lossy().to_string();
            }
            if ui
                .add_enabled(!self.is_loading, egui::Button::new("Load"))
                .clicked()
            {
                self.start_loading();
            }
            if self.is_loading {
                ui.spinner();
            }
        });

        ui.horizontal(|ui| {
            ui.label("Chart:");
            egui::ComboBox::from_id_salt("kind")
                .selected_text(self.kind.as_str())
                .show_ui(ui, |ui| {
                    for kind in ChartKind::ALL {
                        ui.selectable_value(&mut self.kind, kind, kind.as_str());
                    }
                });
            ui.label("Metric:");
            ui.add(egui::TextEdit::singleline(&mut self.metric).desired_width(90.0));
            ui.label("Secondary:");
            ui.add(egui::TextEdit::singleline(&mut self.secondary).desired_width(90.0));
            ui.label("Size:");
            ui.add(egui::TextEdit::singleline(&mut self.size).desired_width(70.0));
            ui.label("Focus:");
            ui.add(egui::TextEdit::singleline(&mut self.focus).desired_width(60.0))
                .on_hover_text("Entity shown by the population pyramid");
            if ui.button("Apply").clicked() {
                self.apply_spec();
            }
        });

        if !self.status_message.is_empty() {
            ui.colored_label(Color32::DARK_GREEN, &self.status_message);
        }
        if !self.error_message.is_empty() {
            ui.colored_label(Color32::RED, &self.error_message);
        }
    }

    fn transport(&mut self, ui: &mut egui::Ui) {
        let now = self.now();
        let state = self.chart.state();
        let len = self.chart.dataset().len();
        ui.horizontal(|ui| {
            if ui.button("⏮").on_hover_text("Reset").clicked() {
                self.chart.reset(now);
            }
            if ui.button("◀").clicked() {
                self.chart.step(-1, now);
            }
            let label = if state.is_playing { "Pause" } else { "Play" };
            if ui.add_enabled(len > 1, egui::Button::new(label)).clicked() {
                self.chart.toggle(now);
            }
            if ui.button("▶").clicked() {
                self.chart.step(1, now);
            }

            let mut index = state.current_index;
            let slider = egui::Slider::new(&mut index, 0..=len.saturating_sub(1)).show_value(false);
            if ui.add_enabled(len > 1, slider).changed() {
                self.chart.scrub(index, now);
            }
            if let Some(step) = self.chart.dataset().step(self.chart.state().current_index) {
                ui.label(step.key.label());
            }

            ui.separator();
            ui.label("Tick (ms):");
            if ui
                .add(egui::DragValue::new(&mut self.interval_ms).range(100..=5000))
                .changed()
            {
                self.chart
                    .set_tick_interval(Duration::from_millis(self.interval_ms), now);
            }
        });
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let now = self.now();
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::hover());
        let rect = response.rect;
        let size = Viewport::new(rect.width() as f64, rect.height() as f64);
        if size != self.observed {
            self.observed = size;
            self.chart.resize(size, now);
        }

        let marks = self.chart.frame(now);
        painter.rect_filled(rect, 0.0, Color32::WHITE);
        for mark in &marks {
            paint_mark(&painter, rect.min, mark);
        }

        match response.hover_pos() {
            Some(pos) => {
                let local = pos - rect.min;
                self.chart.pointer_move(local.x as f64, local.y as f64, now);
            }
            None if self.chart.hover().is_some() => {
                self.chart.pointer_leave();
            }
            None => {}
        }
        if let Some(tip) = self.chart.tooltip() {
            response.on_hover_ui_at_pointer(|ui| {
                ui.strong(&tip.title);
                for line in &tip.lines {
                    ui.label(line);
                }
            });
        }
    }
}

impl eframe::App for VizApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_loading();

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            self.controls(ui);
            ui.add_space(4.0);
        });
        egui::TopBottomPanel::bottom("transport").show(ctx, |ui| {
            ui.add_space(4.0);
            self.transport(ui);
            ui.add_space(4.0);
        });
        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));

        let now = self.now();
        if self.is_loading || self.chart.state().is_playing || self.chart.is_animating(now) {
            ctx.request_repaint();
        } else {
            // pending resize needs one more pass after the quiet period
            ctx.request_repaint_after(self.chart.config().resize_quiet());
        }
    }
}

impl Drop for VizApp {
    fn drop(&mut self) {
        self.chart.pause();
    }
}

fn color(c: Rgba, opacity: f64) -> Color32 {
    let a = (c.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
    Color32::from_rgba_unmultiplied(c.r, c.g, c.b, a)
}

fn pos(origin: Pos2, x: f64, y: f64) -> Pos2 {
    Pos2::new(origin.x + x as f32, origin.y + y as f32)
}

fn paint_mark(painter: &egui::Painter, origin: Pos2, mark: &Mark) {
    let paint = &mark.paint;
    if paint.opacity <= 0.0 {
        return;
    }
    let fill = color(paint.fill, paint.opacity);
    let stroke = if paint.stroke_width > 0.0 {
        Stroke::new(paint.stroke_width as f32, color(paint.stroke, paint.opacity))
    } else {
        Stroke::NONE
    };
    match &mark.shape {
        Shape::Rect {
            x,
            y,
            width,
            height,
        } => {
            let r = egui::Rect::from_min_max(pos(origin, *x, *y), pos(origin, x + width, y + height));
            painter.rect_filled(r, 0.0, fill);
            if stroke != Stroke::NONE {
                painter.rect_stroke(r, 0.0, stroke);
            }
        }
        Shape::Circle { cx, cy, r } => {
            painter.circle(pos(origin, *cx, *cy), *r as f32, fill, stroke);
        }
        Shape::Path { rings, closed } => {
            if *closed && fill.a() > 0 {
                fill_even_odd(painter, origin, rings, fill);
            }
            for ring in rings {
                let mut points: Vec<Pos2> = ring.iter().map(|&(x, y)| pos(origin, x, y)).collect();
                if *closed && let Some(&first) = points.first() {
                    points.push(first);
                }
                painter.add(egui::Shape::line(points, stroke));
            }
        }
        Shape::Label {
            x,
            y,
            text,
            anchor,
            size,
        } => {
            let align = match anchor {
                Anchor::Start => Align2::LEFT_BOTTOM,
                Anchor::Middle => Align2::CENTER_BOTTOM,
                Anchor::End => Align2::RIGHT_BOTTOM,
            };
            painter.text(
                pos(origin, *x, *y),
                align,
                text,
                FontId::proportional(*size as f32),
                fill,
            );
        }
    }
}

/// egui only fills convex polygons; regions and areas are filled by even-odd scanlines.
fn fill_even_odd(painter: &egui::Painter, origin: Pos2, rings: &[Vec<(f64, f64)>], fill: Color32) {
    let (mut top, mut bottom) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(_, y) in rings.iter().flatten() {
        top = top.min(y);
        bottom = bottom.max(y);
    }
    if !top.is_finite() {
        return;
    }
    let stroke = Stroke::new(1.0, fill);
    let mut y = top.floor() + 0.5;
    let mut xs: Vec<f64> = Vec::new();
    while y <= bottom {
        xs.clear();
        for ring in rings {
            let n = ring.len();
            for i in 0..n {
                let (ax, ay) = ring[i];
                let (bx, by) = ring[(i + 1) % n];
                if (ay > y) != (by > y) {
                    xs.push(ax + (y - ay) / (by - ay) * (bx - ax));
                }
            }
        }
        xs.sort_by(f64::total_cmp);
        for pair in xs.chunks_exact(2) {
            painter.line_segment([pos(origin, pair[0], y), pos(origin, pair[1], y)], stroke);
        }
        y += 1.0;
    }
}
