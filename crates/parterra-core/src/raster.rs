use serde::{Deserialize, Serialize};

use crate::coords::{Crs, Extent};
use crate::error::ConfigurationError;

/// Grid definition shared by every raster of one run: north-up, square cells.
/// Row 0 is the northern edge, column 0 the western edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub crs: Crs,
    /// Western edge of column 0, in CRS units.
    pub min_x: f64,
    /// Northern edge of row 0, in CRS units.
    pub max_y: f64,
    /// Cell edge length in CRS units.
    pub resolution: f64,
    pub width: usize,
    pub height: usize,
}

impl GridSpec {
    pub fn new(
        crs: Crs,
        min_x: f64,
        max_y: f64,
        resolution: f64,
        width: usize,
        height: usize,
    ) -> Result<Self, ConfigurationError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "resolution".into(),
                reason: format!("must be positive and finite, got {resolution}"),
            });
        }
        if !(min_x.is_finite() && max_y.is_finite()) {
            return Err(ConfigurationError::InvalidParameter {
                name: "origin".into(),
                reason: "grid origin must be finite".into(),
            });
        }
        if width == 0 || height == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "dimensions".into(),
                reason: format!("grid must have at least one cell, got {width}x{height}"),
            });
        }
        Ok(Self { crs, min_x, max_y, resolution, width, height })
    }

    /// Cover `extent` with cells of `resolution`; partial cells on the east and
    /// south edges are kept whole.
    pub fn from_extent(crs: Crs, extent: Extent, resolution: f64) -> Result<Self, ConfigurationError> {
        if !extent.is_valid() {
            return Err(ConfigurationError::InvalidParameter {
                name: "extent".into(),
                reason: format!("{extent:?} is empty or not finite"),
            });
        }
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "resolution".into(),
                reason: format!("must be positive and finite, got {resolution}"),
            });
        }
        // Tolerance keeps exact multiples (e.g. 5041 m / 0.5 m) from gaining a column.
        let width = (extent.width() / resolution - 1e-9).ceil().max(1.0) as usize;
        let height = (extent.height() / resolution - 1e-9).ceil().max(1.0) as usize;
        Self::new(crs, extent.min_x, extent.max_y, resolution, width, height)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn extent(&self) -> Extent {
        Extent::new(
            self.min_x,
            self.max_y - self.height as f64 * self.resolution,
            self.min_x + self.width as f64 * self.resolution,
            self.max_y,
        )
    }

    /// Centre of cell (row, col) in CRS units.
    #[inline]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.min_x + (col as f64 + 0.5) * self.resolution,
            self.max_y - (row as f64 + 0.5) * self.resolution,
        )
    }

    /// Pixel-wise arithmetic between two grids is only valid when this holds.
    pub fn ensure_aligned(&self, other: &GridSpec) -> Result<(), ConfigurationError> {
        if self.crs != other.crs {
            return Err(ConfigurationError::GridMismatch(format!(
                "crs {} vs {}",
                self.crs, other.crs
            )));
        }
        if (self.resolution - other.resolution).abs() > self.resolution * 1e-9 {
            return Err(ConfigurationError::GridMismatch(format!(
                "resolution {} vs {}",
                self.resolution, other.resolution
            )));
        }
        let tol = self.resolution * 1e-6;
        if (self.min_x - other.min_x).abs() > tol || (self.max_y - other.max_y).abs() > tol {
            return Err(ConfigurationError::GridMismatch(format!(
                "origin ({}, {}) vs ({}, {})",
                self.min_x, self.max_y, other.min_x, other.max_y
            )));
        }
        if self.width != other.width || self.height != other.height {
            return Err(ConfigurationError::GridMismatch(format!(
                "dimensions {}x{} vs {}x{}",
                self.width, self.height, other.width, other.height
            )));
        }
        Ok(())
    }
}

/// A single-band raster storing f32 cell values, row-major.
/// Coordinate math uses f64; cell values use f32.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterGrid {
    pub spec: GridSpec,
    /// Row-major cell values, `spec.width * spec.height` long.
    pub data: Vec<f32>,
}

impl RasterGrid {
    /// Create a raster filled with the given value.
    pub fn new(spec: GridSpec, fill: f32) -> Self {
        Self { data: vec![fill; spec.len()], spec }
    }

    /// Wrap existing cell values; the length must match the grid.
    pub fn from_data(spec: GridSpec, data: Vec<f32>) -> Result<Self, ConfigurationError> {
        let grid = Self { spec, data };
        grid.validate()?;
        Ok(grid)
    }

    /// Check a deserialized raster for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let s = &self.spec;
        GridSpec::new(s.crs.clone(), s.min_x, s.max_y, s.resolution, s.width, s.height)?;
        if self.data.len() != self.spec.len() {
            return Err(ConfigurationError::InvalidParameter {
                name: "data".into(),
                reason: format!(
                    "{} values for a {}x{} grid",
                    self.data.len(),
                    self.spec.width,
                    self.spec.height
                ),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.spec.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.spec.width + col] = val;
    }

    /// Smallest value, ignoring NaN nodata cells.
    pub fn min_value(&self) -> f32 {
        self.data.iter().cloned().filter(|v| !v.is_nan()).fold(f32::INFINITY, f32::min)
    }

    /// Largest value, ignoring NaN nodata cells.
    pub fn max_value(&self) -> f32 {
        self.data.iter().cloned().filter(|v| !v.is_nan()).fold(f32::NEG_INFINITY, f32::max)
    }
}
