//! Rasterization of feature attributes and pixel-wise fusion.
//!
//! A cell is covered by a feature when the cell centre intersects the feature
//! geometry, boundary included. Covered cells take the reduction of the
//! attribute over all covering features; the rest take the fill value.
//! Candidate features per cell come from an R-tree of feature envelopes.
use geo::{BoundingRect, Geometry, Intersects, Point};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::RTree;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigurationError;
use crate::feature::FeatureCollection;
use crate::raster::{GridSpec, RasterGrid};

#[cfg(feature = "threading")]
use rayon::prelude::*;

type Envelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Per-cell reduction. Both are associative and commutative, so feature order
/// and row partitioning do not change the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Max,
    Min,
}

impl Reducer {
    #[inline]
    pub fn combine(self, acc: f32, v: f32) -> f32 {
        match self {
            Reducer::Max => acc.max(v),
            Reducer::Min => acc.min(v),
        }
    }
}

/// Burn `key` of every feature carrying it onto `spec`.
pub fn burn(
    collection: &FeatureCollection,
    key: &str,
    spec: &GridSpec,
    fill: f32,
    reducer: Reducer,
) -> Result<RasterGrid, ConfigurationError> {
    collection.crs.ensure_same(&spec.crs)?;

    let keyed = collection.retain_key(key);
    let sources: Vec<(&Geometry<f64>, f32)> = keyed
        .iter()
        .filter_map(|f| f.number(key).map(|v| (&f.geometry, v as f32)))
        .collect();
    let envelopes: Vec<Envelope> = sources
        .iter()
        .enumerate()
        .filter_map(|(i, (g, _))| {
            let r = g.bounding_rect()?;
            Some(GeomWithData::new(
                Rectangle::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]),
                i,
            ))
        })
        .collect();
    debug!(key, features = sources.len(), indexed = envelopes.len(), "Burning attribute");
    let tree = RTree::bulk_load(envelopes);

    let mut grid = RasterGrid::new(spec.clone(), fill);
    if grid.data.is_empty() {
        return Ok(grid);
    }

    let burn_row = |row: usize, cells: &mut [f32]| {
        for (col, cell) in cells.iter_mut().enumerate() {
            let (x, y) = spec.cell_center(row, col);
            let centre = Point::new(x, y);
            let mut acc: Option<f32> = None;
            for hit in tree.locate_all_at_point(&[x, y]) {
                let (geometry, value) = sources[hit.data];
                if geometry.intersects(&centre) {
                    acc = Some(acc.map_or(value, |a| reducer.combine(a, value)));
                }
            }
            if let Some(v) = acc {
                *cell = v;
            }
        }
    };

    let width = spec.width;
    #[cfg(feature = "threading")]
    grid.data
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, cells)| burn_row(row, cells));
    #[cfg(not(feature = "threading"))]
    grid.data
        .chunks_mut(width)
        .enumerate()
        .for_each(|(row, cells)| burn_row(row, cells));

    Ok(grid)
}

/// Pixel-wise `base + burned`. Grids must be aligned; nothing is resampled.
pub fn fuse(base: &RasterGrid, burned: &RasterGrid) -> Result<RasterGrid, ConfigurationError> {
    cellwise(base, burned, |a, b| a + b)
}

/// Pixel-wise `current - previous`, e.g. the change of a DHTM between two
/// runs. Same alignment rule as `fuse`.
pub fn difference(current: &RasterGrid, previous: &RasterGrid) -> Result<RasterGrid, ConfigurationError> {
    cellwise(current, previous, |a, b| a - b)
}

fn cellwise<F>(a: &RasterGrid, b: &RasterGrid, op: F) -> Result<RasterGrid, ConfigurationError>
where
    F: Fn(f32, f32) -> f32,
{
    a.validate()?;
    b.validate()?;
    a.spec.ensure_aligned(&b.spec)?;
    let data = a.data.iter().zip(&b.data).map(|(&x, &y)| op(x, y)).collect();
    RasterGrid::from_data(a.spec.clone(), data)
}
