//! Error taxonomy for the engine.
//!
//! Only [`VizError::ShapeMismatch`] is terminal for a chart instance. Join misses and
//! degenerate scale domains are recovered where they occur and never surface here.

pub type Result<T> = std::result::Result<T, VizError>;

#[derive(thiserror::Error, Debug)]
pub enum VizError {
    /// The raw source cannot be interpreted as any supported shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid chart spec: {0}")]
    InvalidSpec(String),

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl VizError {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    pub fn spec(msg: impl Into<String>) -> Self {
        Self::InvalidSpec(msg.into())
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// True for errors that must put a chart into its error state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ShapeMismatch(_))
    }
}
