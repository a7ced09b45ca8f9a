//! One chart instance: owns its dataset, scales, scene, playback and hover state.
//!
//! Nothing here is shared between charts. Time comes from the host as a
//! `Duration` since mount; the host calls [`Chart::frame`] on every repaint and
//! draws what it returns.

use crate::config::EngineConfig;
use crate::ease::Ease;
use crate::error::{Result, VizError};
use crate::geo::Boundaries;
use crate::interaction::{HoverChange, HoverTracker, Tooltip, tooltip};
use crate::models::{
    ChartSpec, EntityId, HoverState, PlaybackState, TimeSeriesDataset, Viewport,
};
use crate::normalize::normalize;
use crate::playback::{PlaybackController, TimerHandle, TimerId};
use crate::render::{self, RenderContext, join_report};
use crate::responsive::ResizeDebouncer;
use crate::scales::{KindScales, ScaleSet, build_scales};
use crate::scene::{Frame, Legend, Mark, Scene, hit_test};
use log::{info, warn};
use serde_json::Value;
use std::time::Duration;

pub struct Chart {
    config: EngineConfig,
    spec: ChartSpec,
    /// Kept so a spec change that needs another value shape can re-normalize.
    raw: Option<Value>,
    dataset: TimeSeriesDataset,
    boundaries: Option<Boundaries>,
    viewport: Viewport,
    scales: ScaleSet,
    scene: Scene,
    playback: PlaybackController,
    hover: HoverTracker,
    resize: ResizeDebouncer,
    error: Option<String>,
    join_checked: bool,
}

impl Chart {
    /// Mount an empty chart. It shows the "No data" state until a dataset arrives.
    pub fn mount(spec: ChartSpec, viewport: Viewport, config: EngineConfig) -> Self {
        let dataset = TimeSeriesDataset::empty(spec.kind.required_shape());
        let scales = build_scales(&dataset, &spec, viewport, &config, None);
        let playback = PlaybackController::new(0, config.tick_interval());
        let resize = ResizeDebouncer::new(config.resize_quiet()).with_applied(viewport);
        let mut chart = Self {
            config,
            spec,
            raw: None,
            dataset,
            boundaries: None,
            viewport,
            scales,
            scene: Scene::new(Ease::InOutCubic),
            playback,
            hover: HoverTracker::default(),
            resize,
            error: None,
            join_checked: false,
        };
        let frame = chart.target_frame();
        chart.scene.snap(frame);
        chart
    }

    pub fn spec(&self) -> &ChartSpec {
        &self.spec
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dataset(&self) -> &TimeSeriesDataset {
        &self.dataset
    }

    pub fn scales(&self) -> &ScaleSet {
        &self.scales
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn legend(&self) -> Option<&Legend> {
        self.scene.legend()
    }

    /// Message of the terminal error state, if the chart is in it.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn hover(&self) -> Option<&HoverState> {
        self.hover.state()
    }

    pub fn active_timers(&self) -> usize {
        self.playback.active_timers()
    }

    pub fn timer(&self) -> Option<&TimerHandle> {
        self.playback.timer()
    }

    pub fn is_animating(&self, now: Duration) -> bool {
        self.scene.is_animating(now)
    }

    /// Normalize a raw payload for the current spec and show it. A failure puts
    /// the chart into its error state and is also returned.
    pub fn load_raw(&mut self, raw: Value) -> Result<()> {
        match normalize(&raw, &self.spec.expected_shape()) {
            Ok(dataset) => {
                self.raw = Some(raw);
                self.install(dataset);
                Ok(())
            }
            Err(e) => {
                self.raw = None;
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Replace spec and data together, as for a fresh query result.
    pub fn load(&mut self, spec: ChartSpec, raw: Value) -> Result<()> {
        self.playback.pause();
        self.spec = spec;
        self.load_raw(raw)
    }

    /// Swap in an already normalized dataset: timer cleared, transitions
    /// discarded, back to step 0. There is no raw source to re-normalize from
    /// afterwards.
    pub fn set_dataset(&mut self, dataset: TimeSeriesDataset) {
        self.raw = None;
        self.install(dataset);
    }

    fn install(&mut self, dataset: TimeSeriesDataset) {
        info!(
            "dataset loaded: {} steps, {} entities",
            dataset.len(),
            dataset.entity_ids().len()
        );
        self.playback.reset_for(dataset.len());
        self.dataset = dataset;
        self.error = None;
        self.join_checked = false;
        self.hover.leave();
        self.rebuild_scales();
        self.scene.clear();
        let frame = self.target_frame();
        self.scene.snap(frame);
    }

    pub fn set_boundaries(&mut self, boundaries: Boundaries) {
        self.boundaries = Some(boundaries);
        self.join_checked = false;
        self.rebuild_scales();
        let frame = self.target_frame();
        self.scene.snap(frame);
    }

    /// Switch chart kind or metrics. Playback pauses; the current step key is
    /// kept when the new data still has it, else the nearest index. A kind whose
    /// value shape cannot be derived without the raw source is rejected and the
    /// previous spec stays in place.
    pub fn set_spec(&mut self, spec: ChartSpec) -> Result<()> {
        self.playback.pause();
        self.hover.leave();
        let key = self
            .dataset
            .step(self.playback.index())
            .map(|s| s.key.clone());
        let needs_renormalize = spec.expected_shape() != self.spec.expected_shape();
        let previous = std::mem::replace(&mut self.spec, spec);
        self.join_checked = false;

        if needs_renormalize {
            let next = match &self.raw {
                Some(raw) => normalize(raw, &self.spec.expected_shape()),
                None if self.dataset.is_empty() => {
                    Ok(TimeSeriesDataset::empty(self.spec.kind.required_shape()))
                }
                None => Err(VizError::spec(format!(
                    "{} needs {:?} values; reload the source",
                    self.spec.kind,
                    self.spec.kind.required_shape()
                ))),
            };
            match next {
                Ok(dataset) => {
                    self.playback.set_len(dataset.len());
                    self.dataset = dataset;
                    self.error = None;
                }
                Err(e) if e.is_terminal() => {
                    self.fail(&e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("spec rejected: {e}");
                    self.spec = previous;
                    return Err(e);
                }
            }
        }

        let index = key.map_or(0, |k| self.dataset.nearest_index(&k));
        self.playback.set_len(self.dataset.len());
        self.playback.scrub(index);
        self.rebuild_scales();
        self.scene.clear();
        let frame = self.target_frame();
        self.scene.snap(frame);
        Ok(())
    }

    pub fn set_tick_interval(&mut self, interval: Duration, now: Duration) {
        self.config.tick_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self.playback.set_interval(interval, now);
    }

    pub fn play(&mut self, now: Duration) -> PlaybackState {
        let changed = self.playback.play(now);
        self.after_move(changed, now)
    }

    pub fn pause(&mut self) -> PlaybackState {
        self.playback.pause();
        self.playback.state()
    }

    pub fn toggle(&mut self, now: Duration) -> PlaybackState {
        let changed = self.playback.toggle(now);
        self.after_move(changed, now)
    }

    pub fn scrub(&mut self, index: usize, now: Duration) -> PlaybackState {
        let changed = self.playback.scrub(index);
        self.after_move(changed, now)
    }

    pub fn step(&mut self, delta: isize, now: Duration) -> PlaybackState {
        let changed = self.playback.step(delta);
        self.after_move(changed, now)
    }

    pub fn reset(&mut self, now: Duration) -> PlaybackState {
        let changed = self.playback.reset();
        self.after_move(changed, now)
    }

    /// Push-style timer delivery; stale ids are dropped by the controller.
    pub fn on_timer(&mut self, id: TimerId, now: Duration) -> PlaybackState {
        let changed = self.playback.on_timer(id, now);
        self.after_move(changed, now)
    }

    /// Record a container size. The rebuild happens in [`Chart::frame`] once
    /// the burst settles.
    pub fn resize(&mut self, viewport: Viewport, now: Duration) {
        self.resize.observe(viewport, now);
    }

    /// Advance host time and return the primitives to draw, in paint order.
    pub fn frame(&mut self, now: Duration) -> Vec<Mark> {
        if let Some(viewport) = self.resize.poll(now) {
            self.apply_resize(viewport);
        }
        if self.playback.poll(now).is_some() {
            self.transition(now);
        }
        self.scene.prune(now);
        self.scene.sample(now)
    }

    /// Hit-test the scene at `(x, y)` and update hover accordingly.
    pub fn pointer_move(&mut self, x: f64, y: f64, now: Duration) -> HoverChange {
        let marks = self.scene.sample(now);
        let hit = hit_test(&marks, x, y).and_then(|m| m.entity.as_deref());
        self.hover.pointer_at(hit, x, y)
    }

    pub fn pointer_enter(&mut self, entity: impl Into<EntityId>, x: f64, y: f64) -> HoverChange {
        self.hover.enter(entity, x, y)
    }

    pub fn pointer_move_on(&mut self, entity: &str, x: f64, y: f64) -> HoverChange {
        self.hover.move_on(entity, x, y)
    }

    pub fn pointer_leave(&mut self) -> HoverChange {
        self.hover.leave()
    }

    pub fn tooltip(&self) -> Option<Tooltip> {
        tooltip(
            self.hover.state(),
            &self.dataset,
            self.playback.index(),
            &self.spec,
            &self.config.locale,
        )
    }

    /// Render step `index` without touching playback; used by exporters.
    pub fn frame_at(&mut self, index: usize) -> Frame {
        if let Some(message) = &self.error {
            return render::error_frame(self.viewport, message);
        }
        let index = index.min(self.dataset.last_index());
        self.check_join();
        self.frame_for(index)
    }

    /// Stop everything and report where playback ended.
    pub fn unmount(mut self) -> PlaybackState {
        self.playback.pause();
        self.scene.clear();
        self.playback.state()
    }

    fn after_move(&mut self, changed: Option<usize>, now: Duration) -> PlaybackState {
        if changed.is_some() {
            self.transition(now);
        }
        self.playback.state()
    }

    /// Start a transition to the current step. Hover is cleared first; the next
    /// pointer event sets it again.
    fn transition(&mut self, now: Duration) {
        self.hover.leave();
        let frame = self.target_frame();
        let duration = self.config.transition_for(self.spec.kind);
        self.scene.apply(frame, now, duration);
    }

    /// Resize: new scales and the current step re-rendered in place. Playback
    /// and hover are left alone.
    fn apply_resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.rebuild_scales();
        let frame = self.target_frame();
        self.scene.snap(frame);
    }

    fn rebuild_scales(&mut self) {
        self.scales = build_scales(
            &self.dataset,
            &self.spec,
            self.viewport,
            &self.config,
            self.boundaries.as_ref(),
        );
    }

    fn target_frame(&mut self) -> Frame {
        if let Some(message) = &self.error {
            return render::error_frame(self.viewport, message);
        }
        self.check_join();
        self.frame_for(self.playback.index())
    }

    fn frame_for(&self, index: usize) -> Frame {
        render::render_frame(&RenderContext {
            dataset: &self.dataset,
            spec: &self.spec,
            scales: &self.scales,
            config: &self.config,
            index,
        })
    }

    /// Join misses are logged once per dataset and boundary set.
    fn check_join(&mut self) {
        if self.join_checked || self.dataset.is_empty() {
            return;
        }
        let KindScales::Choropleth { regions, .. } = &self.scales.kind else {
            return;
        };
        self.join_checked = true;
        let report = join_report(&self.dataset, regions);
        if !report.is_clean() {
            warn!(
                "choropleth join: {} features without data, {} entities without a feature",
                report.features_without_entity.len(),
                report.entities_without_feature.len()
            );
        }
    }

    fn fail(&mut self, e: &VizError) {
        warn!("chart error: {e}");
        self.playback.reset_for(0);
        self.hover.leave();
        self.dataset = TimeSeriesDataset::empty(self.spec.kind.required_shape());
        self.join_checked = false;
        self.rebuild_scales();
        self.error = Some(e.to_string());
        self.scene.clear();
        self.scene.snap(render::error_frame(self.viewport, &e.to_string()));
    }
}

impl Drop for Chart {
    fn drop(&mut self) {
        self.playback.pause();
    }
}
