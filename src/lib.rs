//! timeviz
//!
//! An animated, interactive engine for time-indexed multi-entity data: bar
//! races, choropleths, population pyramids, bubble, line, area and category
//! bar charts. Pairs with the `timeviz` CLI and the `timeviz-gui` desktop host.
//!
//! ### Features
//! - Normalize heterogeneous JSON/CSV payloads into one canonical time series model
//! - Timeline-stable scales, Mercator projection for boundary GeoJSON
//! - Keyed scene diff with cancellable, retargetable transitions
//! - Playback with a single owned timer, hover tooltips, debounced resize
//! - Export any frame to SVG/PNG
//!
//! ### Example
//! ```no_run
//! use std::time::Duration;
//! use timeviz::{Chart, ChartKind, ChartSpec, EngineConfig, Viewport};
//!
//! let mut chart = Chart::mount(
//!     ChartSpec::new(ChartKind::RankedBars, "gdp"),
//!     Viewport::new(960.0, 540.0),
//!     EngineConfig::default(),
//! );
//! chart.load_raw(serde_json::json!({"2000": {"DEU": 3, "FRA": 2}, "2001": {"DEU": 4}}))?;
//! chart.play(Duration::ZERO);
//! let marks = chart.frame(Duration::from_millis(1200));
//! timeviz::viz::export_frame(&marks, "race.svg", 960, 540, chart.legend(), "en")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod chart;
pub mod config;
pub mod ease;
pub mod error;
pub mod geo;
pub mod interaction;
pub mod models;
pub mod normalize;
pub mod palette;
pub mod playback;
pub mod render;
pub mod responsive;
pub mod scales;
pub mod scene;
pub mod stats;
pub mod storage;
pub mod viz;

pub use chart::Chart;
pub use config::EngineConfig;
pub use error::{Result, VizError};
pub use models::{
    ChartKind, ChartSpec, EntityValue, ExpectedShape, HoverState, PlaybackState, StepKey,
    TimeSeriesDataset, TimeStep, ValueShape, Viewport,
};
pub use normalize::normalize;
