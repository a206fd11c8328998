//! Coordinate reference identifiers and planar extents.
//! All coordinate math uses f64 for precision.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigurationError;

/// A coordinate reference system identifier, e.g. `EPSG:32737`.
///
/// No reprojection happens anywhere in this crate; two datasets are compatible
/// only when their identifiers compare equal (case-insensitively).
#[derive(Debug, Clone, Serialize, Deserialize, Eq)]
#[serde(transparent)]
pub struct Crs(String);

impl Crs {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Fail with `CrsMismatch` unless `other` names the same system.
    pub fn ensure_same(&self, other: &Crs) -> Result<(), ConfigurationError> {
        if self == other {
            Ok(())
        } else {
            Err(ConfigurationError::CrsMismatch {
                expected: self.0.clone(),
                found: other.0.clone(),
            })
        }
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.0.trim().eq_ignore_ascii_case(other.0.trim())
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Crs {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Axis-aligned bounding box in CRS units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True for a finite box with positive width and height.
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y].iter().all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }
}
