//! Attribute defaulting: fill, derive and overwrite attributes across a
//! collection.
//!
//! Each operation leaves its input untouched and returns a new collection.
//! Order matters: derive steps read keys written by earlier steps, so a
//! `derive_*` on a key nobody filled is a `MissingAttributeError`.
use tracing::debug;

use crate::error::MissingAttributeError;
use crate::feature::{AttrValue, Feature, FeatureCollection};

impl Feature {
    /// Numeric value of `key`, which an earlier stage must have written.
    pub fn require(&self, key: &str) -> Result<f64, MissingAttributeError> {
        self.number(key).ok_or_else(|| MissingAttributeError {
            key: key.to_string(),
            feature: self.label(),
        })
    }
}

impl FeatureCollection {
    /// Give every feature lacking `key` the value `default`. Present values,
    /// zero included, are kept.
    pub fn fill_missing(&self, key: &str, default: impl Into<AttrValue>) -> Self {
        let default = default.into();
        self.map_features(|mut f| {
            if !f.has(key) {
                f.set(key, default.clone());
            }
            f
        })
    }

    /// `target = source * factor` on every feature.
    pub fn derive_by_scale(
        &self,
        target: &str,
        source: &str,
        factor: f64,
    ) -> Result<Self, MissingAttributeError> {
        self.derive(target, source, |v| v * factor)
    }

    /// `target = source + offset` on every feature.
    pub fn derive_by_offset(
        &self,
        target: &str,
        source: &str,
        offset: f64,
    ) -> Result<Self, MissingAttributeError> {
        self.derive(target, source, |v| v + offset)
    }

    /// Unconditional overwrite of `key`.
    pub fn set_constant(&self, key: &str, value: impl Into<AttrValue>) -> Self {
        let value = value.into();
        self.map_features(|mut f| {
            f.set(key, value.clone());
            f
        })
    }

    /// Remove values of `key` that cannot be read as numbers, so that a
    /// following `fill_missing` treats them as absent.
    pub fn drop_non_numeric(&self, key: &str) -> Self {
        self.map_features(|mut f| {
            if f.get(key).is_some_and(|v| v.as_f64().is_none()) {
                if let Some(v) = f.remove(key) {
                    debug!(feature = %f.label(), key, value = %v, "Dropping non-numeric attribute");
                }
            }
            f
        })
    }

    fn derive<F>(&self, target: &str, source: &str, op: F) -> Result<Self, MissingAttributeError>
    where
        F: Fn(f64) -> f64 + Send + Sync,
    {
        let features: Vec<Feature> = self
            .try_map_features(|f| {
                let v = f.require(source)?;
                let mut out = f.clone();
                out.set(target, op(v));
                Ok(out)
            })
            .into_iter()
            .collect::<Result<_, _>>()?;
        Ok(FeatureCollection::from_features(self.crs.clone(), features))
    }
}
