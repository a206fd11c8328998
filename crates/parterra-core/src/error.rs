//! Error taxonomy for the burn pipeline.
//!
//! Configuration and missing-attribute errors abort a run. Degenerate geometry
//! is isolated per feature inside the enrichment pipelines and never reaches
//! the caller.
use thiserror::Error;

/// Invalid run setup, detected before or at the start of a computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("unknown attribute key `{0}`")]
    UnknownAttribute(String),

    #[error("{layer}: no defaults entry for category `{category}`")]
    MissingDefaults { layer: String, category: String },

    #[error("{layer}: defaults entry `{category}` does not name any declared category")]
    UnknownCategory { layer: String, category: String },

    #[error("{layer}: category `{category}` is declared more than once")]
    DuplicateCategory { layer: String, category: String },

    #[error("coordinate reference systems differ: `{expected}` vs `{found}`")]
    CrsMismatch { expected: String, found: String },

    #[error("raster grids are not aligned: {0}")]
    GridMismatch(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// Geometry that cannot be transformed. Scoped to a single feature.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DegenerateGeometryError {
    #[error("terminal segment has zero length at ({x}, {y})")]
    ZeroLengthSegment { x: f64, y: f64 },

    #[error("line has {0} coordinate(s), at least 2 required")]
    TooFewCoordinates(usize),

    #[error("buffer distance {0} is negative or not finite")]
    InvalidDistance(f64),

    #[error("non-finite coordinate in geometry")]
    NonFiniteCoordinate,

    #[error("{0} geometry is not supported here")]
    Unsupported(&'static str),
}

/// A derive step read a key that no earlier stage wrote.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("feature {feature} has no numeric `{key}` attribute")]
pub struct MissingAttributeError {
    pub key: String,
    pub feature: String,
}

/// Errors that abort a pipeline run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    MissingAttribute(#[from] MissingAttributeError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
