//! Roads: every centreline becomes a driveway polygon and a sidewalk polygon.
//!
//! The sidewalk is the full-width buffer minus a driveway buffer of the
//! endpoint-extended line. With the extension longer than the road width the
//! sidewalk is two side strips and has no cap across the line ends.
use geo::{Geometry, MultiPolygon};
use serde::{Deserialize, Serialize};

use super::{isolate_degenerate, non_negative, Enricher, FeatureError, BURN_HEIGHT, BURN_HEIGHT_MIN, MANNING};
use crate::classify::Bucket;
use crate::error::{ConfigurationError, DegenerateGeometryError, Result};
use crate::feature::{Feature, FeatureCollection};
use crate::geometry::{buffer_to_polygon, extend_endpoints, polygon_difference};

pub const WIDTH: &str = "width";
pub const DRIVE_WIDTH: &str = "drive_width";
pub const LAYER: &str = "layer";
pub const ROAD_PART: &str = "road_part";
pub const DRIVEWAY: &str = "driveway";
pub const SIDEWALK: &str = "sidewalk";

/// Per-category road defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadDefaults {
    /// Buffer distance of the full road, used when the line has no `width`.
    pub width: f64,
    /// Share of `width` taken by the driveway.
    pub drive_frac: f64,
    /// OSM `layer` assumed when absent.
    pub layer: f64,
    /// Metres per layer.
    pub layer_height: f64,
    pub driveway_offset: f64,
    pub sidewalk_offset: f64,
    pub manning: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadEnricher {
    /// Endpoint extension in the units of the line CRS.
    pub extension: f64,
}

impl RoadEnricher {
    pub fn new(extension: f64) -> Self {
        Self { extension }
    }
}

/// `buffer(line, width) \ buffer(extend_endpoints(line, extension), drive_width)`.
pub fn sidewalk_polygon(
    geometry: &Geometry<f64>,
    width: f64,
    drive_width: f64,
    extension: f64,
) -> std::result::Result<MultiPolygon<f64>, DegenerateGeometryError> {
    let outer = buffer_to_polygon(geometry, width)?;
    let extended = extend_endpoints(geometry, extension)?;
    let inner = buffer_to_polygon(&extended, drive_width)?;
    Ok(polygon_difference(&outer, &inner))
}

impl Enricher for RoadEnricher {
    type Defaults = RoadDefaults;

    fn layer(&self) -> &'static str {
        "roads"
    }

    fn check_defaults(&self, category: &str, d: &RoadDefaults) -> std::result::Result<(), ConfigurationError> {
        non_negative(self.layer(), category, "width", d.width)?;
        non_negative(self.layer(), category, "manning", d.manning)?;
        if !(0.0..=1.0).contains(&d.drive_frac) {
            return Err(ConfigurationError::InvalidParameter {
                name: format!("roads.defaults.{category}.drive_frac"),
                reason: format!("must lie in [0, 1], got {}", d.drive_frac),
            });
        }
        for (field, v) in [
            ("layer", d.layer),
            ("layer_height", d.layer_height),
            ("driveway_offset", d.driveway_offset),
            ("sidewalk_offset", d.sidewalk_offset),
        ] {
            if !v.is_finite() {
                return Err(ConfigurationError::InvalidParameter {
                    name: format!("roads.defaults.{category}.{field}"),
                    reason: "must be finite".into(),
                });
            }
        }
        Ok(())
    }

    fn enrich(&self, bucket: &Bucket, d: &RoadDefaults) -> Result<FeatureCollection> {
        let lines = bucket
            .features
            .drop_non_numeric(WIDTH)
            .drop_non_numeric(LAYER)
            .fill_missing(WIDTH, d.width)
            .fill_missing(LAYER, d.layer)
            .derive_by_scale(DRIVE_WIDTH, WIDTH, d.drive_frac)?
            .derive_by_scale(BURN_HEIGHT, LAYER, d.layer_height)?;

        let extension = self.extension;
        let parts = isolate_degenerate(self.layer(), &bucket.name, &lines, |f| {
            let width = f.require(WIDTH)?;
            let drive_width = f.require(DRIVE_WIDTH)?;
            let driveway = buffer_to_polygon(&f.geometry, drive_width)?;
            let sidewalk = sidewalk_polygon(&f.geometry, width, drive_width, extension)?;
            Ok::<_, FeatureError>((part(f, driveway, DRIVEWAY), part(f, sidewalk, SIDEWALK)))
        })?;
        let (driveways, sidewalks): (Vec<Feature>, Vec<Feature>) = parts.into_iter().unzip();

        let crs = lines.crs.clone();
        let driveways = finish(FeatureCollection::from_features(crs.clone(), driveways), d.driveway_offset, d.manning)?;
        let sidewalks = finish(FeatureCollection::from_features(crs, sidewalks), d.sidewalk_offset, d.manning)?;
        Ok(driveways.merge(&sidewalks)?)
    }
}

fn part(line: &Feature, area: MultiPolygon<f64>, name: &str) -> Feature {
    let mut f = line.with_geometry(area);
    f.set(ROAD_PART, name);
    f
}

/// Curb offset, then the minimum height equal to the maximum.
fn finish(fc: FeatureCollection, offset: f64, manning: f64) -> Result<FeatureCollection> {
    Ok(fc
        .derive_by_offset(BURN_HEIGHT, BURN_HEIGHT, offset)?
        .derive_by_scale(BURN_HEIGHT_MIN, BURN_HEIGHT, 1.0)?
        .set_constant(MANNING, manning))
}
