//! Vector features with open attribute maps, and collections of them.
//!
//! An attribute is either present (a number or a string) or absent; there is
//! no null state. Every collection transform returns a new collection.
use std::collections::BTreeMap;
use std::fmt;

use geo::Geometry;
use serde::{Deserialize, Serialize};

use crate::coords::Crs;
use crate::error::ConfigurationError;

#[cfg(feature = "threading")]
use rayon::prelude::*;

/// A present attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl AttrValue {
    /// Numeric reading of the value. OSM tags frequently arrive as text, so
    /// `"4"` and `" 2.5 "` read as numbers; `"3;4"` does not.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) if v.is_finite() => Some(*v),
            AttrValue::Number(_) => None,
            AttrValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    /// Membership test against a textual category value.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            AttrValue::Text(s) => s == value,
            AttrValue::Number(_) => self.to_string() == value,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            AttrValue::Number(v) => write!(f, "{v}"),
            AttrValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

/// A geometry plus named attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Source identifier, carried through for diagnostics.
    pub id: Option<String>,
    pub geometry: Geometry<f64>,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self { id: None, geometry: geometry.into(), attributes: BTreeMap::new() }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(AttrValue::as_f64)
    }

    pub fn set(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.attributes.remove(key)
    }

    /// Same attributes on a new geometry.
    pub fn with_geometry(&self, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id: self.id.clone(),
            geometry: geometry.into(),
            attributes: self.attributes.clone(),
        }
    }

    /// Label used in log events and error messages.
    pub fn label(&self) -> String {
        self.id.clone().unwrap_or_else(|| "<unnamed>".to_string())
    }
}

/// An unordered set of features sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub crs: Crs,
    features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(crs: Crs) -> Self {
        Self { crs, features: Vec::new() }
    }

    pub fn from_features(crs: Crs, features: Vec<Feature>) -> Self {
        Self { crs, features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Features for which `pred` holds.
    pub fn filter<P>(&self, pred: P) -> Self
    where
        P: Fn(&Feature) -> bool,
    {
        Self {
            crs: self.crs.clone(),
            features: self.features.iter().filter(|f| pred(f)).cloned().collect(),
        }
    }

    /// Features carrying a numeric `key`.
    pub fn retain_key(&self, key: &str) -> Self {
        self.filter(|f| f.number(key).is_some())
    }

    /// Set union keeping every feature of both sides.
    pub fn merge(&self, other: &FeatureCollection) -> Result<Self, ConfigurationError> {
        self.crs.ensure_same(&other.crs)?;
        let mut features = Vec::with_capacity(self.len() + other.len());
        features.extend(self.features.iter().cloned());
        features.extend(other.features.iter().cloned());
        Ok(Self { crs: self.crs.clone(), features })
    }

    /// Apply `f` to a copy of every feature. Runs on the rayon pool with the
    /// `threading` feature.
    pub fn map_features<F>(&self, f: F) -> Self
    where
        F: Fn(Feature) -> Feature + Send + Sync,
    {
        #[cfg(feature = "threading")]
        let features = self.features.par_iter().cloned().map(f).collect();
        #[cfg(not(feature = "threading"))]
        let features = self.features.iter().cloned().map(f).collect();
        Self { crs: self.crs.clone(), features }
    }

    /// Apply a fallible per-feature transform, keeping input order in the
    /// results.
    pub fn try_map_features<T, E, F>(&self, f: F) -> Vec<Result<T, E>>
    where
        T: Send,
        E: Send,
        F: Fn(&Feature) -> Result<T, E> + Send + Sync,
    {
        #[cfg(feature = "threading")]
        let out = self.features.par_iter().map(f).collect();
        #[cfg(not(feature = "threading"))]
        let out = self.features.iter().map(f).collect();
        out
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;

    fn crs() -> Crs {
        Crs::new("EPSG:32737")
    }

    #[test]
    fn numeric_text_reads_as_number() {
        assert_eq!(AttrValue::from("4").as_f64(), Some(4.0));
        assert_eq!(AttrValue::from(" 2.5 ").as_f64(), Some(2.5));
        assert_eq!(AttrValue::from("3;4").as_f64(), None);
        assert_eq!(AttrValue::Number(f64::NAN).as_f64(), None);
    }

    #[test]
    fn integral_numbers_match_their_text_form() {
        assert!(AttrValue::Number(2.0).matches("2"));
        assert!(AttrValue::Number(0.5).matches("0.5"));
        assert!(!AttrValue::from("house").matches("House"));
    }

    #[test]
    fn retain_key_keeps_only_numeric_values() {
        let fc = FeatureCollection::from_features(
            crs(),
            vec![
                Feature::new(point!(x: 0.0, y: 0.0)).with_attr("depth", 1.5),
                Feature::new(point!(x: 1.0, y: 0.0)),
                Feature::new(point!(x: 2.0, y: 0.0)).with_attr("depth", "unknown"),
                Feature::new(point!(x: 3.0, y: 0.0)).with_attr("depth", "2"),
            ],
        );
        assert_eq!(fc.retain_key("depth").len(), 2);
    }

    #[test]
    fn merge_requires_same_crs() {
        let a = FeatureCollection::new(crs());
        let b = FeatureCollection::new(Crs::new("EPSG:4326"));
        assert!(a.merge(&b).is_err());

        let c = FeatureCollection::from_features(crs(), vec![Feature::new(point!(x: 0.0, y: 0.0))]);
        assert_eq!(a.merge(&c).unwrap().len(), 1);
    }

    #[test]
    fn map_features_leaves_input_untouched() {
        let fc = FeatureCollection::from_features(crs(), vec![Feature::new(point!(x: 0.0, y: 0.0))]);
        let tagged = fc.map_features(|mut f| {
            f.set("seen", 1.0);
            f
        });
        assert!(tagged.iter().all(|f| f.has("seen")));
        assert!(fc.iter().all(|f| !f.has("seen")));
    }
}
