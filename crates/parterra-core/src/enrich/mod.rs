//! Category enrichment: classify → enrich each bucket → merge.
//!
//! One generic pipeline drives every layer; the per-layer rules live in an
//! `Enricher` implementation (buildings, roads, waterways, landuse). Each
//! enriched feature leaves with `burn_height`, `burn_height_min` and `manning`
//! (landuse: `manning` only).
pub mod buildings;
pub mod landuse;
pub mod roads;
pub mod waterways;

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::classify::{Boundary, Bucket, Classifier, REMAINDER};
use crate::error::{ConfigurationError, DegenerateGeometryError, MissingAttributeError, Result};
use crate::feature::{Feature, FeatureCollection};
use crate::params::LayerParams;

pub use buildings::{BuildingDefaults, BuildingEnricher};
pub use landuse::{LanduseDefaults, LanduseEnricher};
pub use roads::{RoadDefaults, RoadEnricher};
pub use waterways::{WaterwayDefaults, WaterwayEnricher};

/// Surface-model contribution (max-reduced).
pub const BURN_HEIGHT: &str = "burn_height";
/// Terrain/threshold contribution (min-reduced).
pub const BURN_HEIGHT_MIN: &str = "burn_height_min";
/// Manning roughness (min-reduced).
pub const MANNING: &str = "manning";

/// Per-layer enrichment rules.
pub trait Enricher: Send + Sync {
    /// One record of fallback values and multipliers for a category.
    type Defaults: Clone + fmt::Debug + Send + Sync;

    /// Layer name used in logs and errors.
    fn layer(&self) -> &'static str;

    /// Reject defaults that cannot produce valid output.
    fn check_defaults(&self, _category: &str, _defaults: &Self::Defaults) -> std::result::Result<(), ConfigurationError> {
        Ok(())
    }

    /// Enrich one bucket. Degenerate features are dropped, not returned as errors.
    fn enrich(&self, bucket: &Bucket, defaults: &Self::Defaults) -> Result<FeatureCollection>;
}

/// Why a single feature could not be transformed.
#[derive(Debug)]
pub(crate) enum FeatureError {
    Degenerate(DegenerateGeometryError),
    Missing(MissingAttributeError),
}

impl From<DegenerateGeometryError> for FeatureError {
    fn from(e: DegenerateGeometryError) -> Self {
        FeatureError::Degenerate(e)
    }
}

impl From<MissingAttributeError> for FeatureError {
    fn from(e: MissingAttributeError) -> Self {
        FeatureError::Missing(e)
    }
}

/// Run a per-feature geometry transform over `fc`. Features with degenerate
/// geometry are logged and left out; a missing attribute aborts.
pub(crate) fn isolate_degenerate<T, F>(
    layer: &str,
    category: &str,
    fc: &FeatureCollection,
    transform: F,
) -> std::result::Result<Vec<T>, MissingAttributeError>
where
    T: Send,
    F: Fn(&Feature) -> std::result::Result<T, FeatureError> + Send + Sync,
{
    let results = fc.try_map_features(transform);
    let mut out = Vec::with_capacity(results.len());
    for (result, feature) in results.into_iter().zip(fc.iter()) {
        match result {
            Ok(t) => out.push(t),
            Err(FeatureError::Degenerate(e)) => {
                warn!(layer, category, feature = %feature.label(), error = %e, "Dropping feature with degenerate geometry");
            }
            Err(FeatureError::Missing(e)) => return Err(e),
        }
    }
    Ok(out)
}

/// A validated classify → enrich → merge pipeline for one layer.
pub struct EnrichmentPipeline<E: Enricher> {
    enricher: E,
    classifier: Classifier,
    /// (source category, boundary), applied in order.
    boundaries: Vec<(String, Boundary)>,
    defaults: BTreeMap<String, E::Defaults>,
    default_manning: f64,
}

impl<E: Enricher> EnrichmentPipeline<E> {
    /// Validate `params` against the classifier's declared buckets: every
    /// category and boundary needs a defaults entry, and every entry must name
    /// a declared bucket or the remainder.
    pub fn new(
        enricher: E,
        params: &LayerParams<E::Defaults>,
        default_manning: f64,
    ) -> std::result::Result<Self, ConfigurationError> {
        let layer = enricher.layer();
        let classifier = Classifier::new(&params.key, params.exclude.clone(), params.categories.clone())?;

        let mut declared: Vec<String> = classifier.category_names().map(str::to_string).collect();
        let mut boundaries = Vec::with_capacity(params.boundaries.len());
        for rule in &params.boundaries {
            if rule.category != REMAINDER && !declared.contains(&rule.category) {
                return Err(ConfigurationError::UnknownCategory {
                    layer: layer.to_string(),
                    category: rule.category.clone(),
                });
            }
            if rule.name == REMAINDER || declared.contains(&rule.name) {
                return Err(ConfigurationError::DuplicateCategory {
                    layer: layer.to_string(),
                    category: rule.name.clone(),
                });
            }
            let boundary = Boundary::from_ring(&rule.name, rule.crs.clone(), &rule.ring)?;
            boundaries.push((rule.category.clone(), boundary));
            declared.push(rule.name.clone());
        }

        for name in &declared {
            if !params.defaults.contains_key(name) {
                return Err(ConfigurationError::MissingDefaults {
                    layer: layer.to_string(),
                    category: name.clone(),
                });
            }
        }
        for (name, d) in &params.defaults {
            if name != REMAINDER && !declared.contains(name) {
                return Err(ConfigurationError::UnknownCategory {
                    layer: layer.to_string(),
                    category: name.clone(),
                });
            }
            enricher.check_defaults(name, d)?;
        }

        Ok(Self {
            enricher,
            classifier,
            boundaries,
            defaults: params.defaults.clone(),
            default_manning,
        })
    }

    pub fn layer(&self) -> &'static str {
        self.enricher.layer()
    }

    /// Enrich the layer drawn from `raw`. Buckets are processed in split order
    /// and merged into one collection. A remainder without defaults is kept
    /// with the default Manning coefficient only.
    pub fn run(&self, raw: &FeatureCollection) -> Result<FeatureCollection> {
        let layer = self.layer();
        let mut split = self.classifier.split_layer(raw);
        for (category, boundary) in &self.boundaries {
            split.carve_boundary(category, boundary)?;
        }

        let mut merged = FeatureCollection::new(raw.crs.clone());
        for bucket in split.buckets() {
            let enriched = match self.defaults.get(&bucket.name) {
                Some(d) => self.enricher.enrich(bucket, d)?,
                None => bucket.features.set_constant(MANNING, self.default_manning),
            };
            debug!(
                layer,
                category = %bucket.name,
                input = bucket.features.len(),
                output = enriched.len(),
                "Enriched category"
            );
            merged = merged.merge(&enriched)?;
        }
        Ok(merged)
    }
}

/// Shared check for defaults that must be finite and non-negative.
pub(crate) fn non_negative(layer: &str, category: &str, field: &str, value: f64) -> std::result::Result<(), ConfigurationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter {
            name: format!("{layer}.defaults.{category}.{field}"),
            reason: format!("must be finite and non-negative, got {value}"),
        })
    }
}
