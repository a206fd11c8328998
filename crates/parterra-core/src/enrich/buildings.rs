use serde::{Deserialize, Serialize};

use super::{non_negative, Enricher, BURN_HEIGHT, BURN_HEIGHT_MIN, MANNING};
use crate::classify::Bucket;
use crate::error::{ConfigurationError, Result};
use crate::feature::FeatureCollection;

/// Levels attribute as tagged in OSM.
pub const BUILDING_LEVELS: &str = "building_levels";

/// Per-category building defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingDefaults {
    /// Storeys assumed when a footprint carries none.
    pub levels: f64,
    /// Metres per storey.
    pub level_height: f64,
    /// Sill height above ground, independent of the building height.
    pub threshold: f64,
    pub manning: f64,
}

/// Footprints keep their geometry; only heights and friction are attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildingEnricher;

impl Enricher for BuildingEnricher {
    type Defaults = BuildingDefaults;

    fn layer(&self) -> &'static str {
        "buildings"
    }

    fn check_defaults(&self, category: &str, d: &BuildingDefaults) -> std::result::Result<(), ConfigurationError> {
        non_negative(self.layer(), category, "levels", d.levels)?;
        non_negative(self.layer(), category, "level_height", d.level_height)?;
        non_negative(self.layer(), category, "manning", d.manning)?;
        if !d.threshold.is_finite() {
            return Err(ConfigurationError::InvalidParameter {
                name: format!("buildings.defaults.{category}.threshold"),
                reason: "must be finite".into(),
            });
        }
        Ok(())
    }

    fn enrich(&self, bucket: &Bucket, d: &BuildingDefaults) -> Result<FeatureCollection> {
        let out = bucket
            .features
            .drop_non_numeric(BUILDING_LEVELS)
            .fill_missing(BUILDING_LEVELS, d.levels)
            .derive_by_scale(BURN_HEIGHT, BUILDING_LEVELS, d.level_height)?
            .set_constant(BURN_HEIGHT_MIN, d.threshold)
            .set_constant(MANNING, d.manning);
        Ok(out)
    }
}
