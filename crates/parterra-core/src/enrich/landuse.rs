use serde::{Deserialize, Serialize};

use super::{non_negative, Enricher, MANNING};
use crate::classify::Bucket;
use crate::error::{ConfigurationError, Result};
use crate::feature::FeatureCollection;

/// Per-category land-use defaults: friction only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanduseDefaults {
    pub manning: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LanduseEnricher;

impl Enricher for LanduseEnricher {
    type Defaults = LanduseDefaults;

    fn layer(&self) -> &'static str {
        "landuse"
    }

    fn check_defaults(&self, category: &str, d: &LanduseDefaults) -> std::result::Result<(), ConfigurationError> {
        non_negative(self.layer(), category, "manning", d.manning)
    }

    fn enrich(&self, bucket: &Bucket, d: &LanduseDefaults) -> Result<FeatureCollection> {
        Ok(bucket.features.set_constant(MANNING, d.manning))
    }
}
