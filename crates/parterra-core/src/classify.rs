//! Feature classification.
//!
//! A `Classifier` partitions a collection by the value of one attribute into
//! named categories plus a remainder bucket. A `Boundary` moves features of one
//! category that touch a reference area into their own bucket, so the area can
//! carry its own defaults.
use geo::{Intersects, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::coords::Crs;
use crate::error::ConfigurationError;
use crate::feature::{Feature, FeatureCollection};

/// Name of the bucket holding features that match no category.
pub const REMAINDER: &str = "other";

/// `key` is present and equals one of `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilter {
    pub key: String,
    pub values: Vec<String>,
}

impl AttributeFilter {
    pub fn matches(&self, f: &Feature) -> bool {
        f.get(&self.key).is_some_and(|v| self.values.iter().any(|x| v.matches(x)))
    }
}

/// One category: the classifier key takes one of `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub values: Vec<String>,
    /// Features of the source collection (see `Classifier::split_layer`) that
    /// match any of these filters are added to this category, e.g.
    /// `tunnel = culvert` lines joining the drains.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<AttributeFilter>,
}

impl CategoryRule {
    pub fn new(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            include: Vec::new(),
        }
    }

    pub fn including(mut self, key: &str, values: &[&str]) -> Self {
        self.include.push(AttributeFilter {
            key: key.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }
}

/// A named bucket of classified features.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub name: String,
    pub features: FeatureCollection,
}

/// Ordered buckets: one per category, then the remainder, then one per carved
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    buckets: Vec<Bucket>,
}

impl Split {
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn get(&self, name: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.name == name)
    }

    pub fn total_features(&self) -> usize {
        self.buckets.iter().map(|b| b.features.len()).sum()
    }

    /// Replace bucket `category` by the part outside `boundary` and append the
    /// part inside as a new bucket named after the boundary.
    pub fn carve_boundary(&mut self, category: &str, boundary: &Boundary) -> Result<(), ConfigurationError> {
        let idx = self
            .buckets
            .iter()
            .position(|b| b.name == category)
            .ok_or_else(|| ConfigurationError::UnknownCategory {
                layer: boundary.name.clone(),
                category: category.to_string(),
            })?;
        let (inside, outside) = split_by_boundary(&self.buckets[idx].features, boundary)?;
        self.buckets[idx].features = outside;
        self.buckets.push(Bucket { name: boundary.name.clone(), features: inside });
        Ok(())
    }
}

/// Partitions features by the value of one attribute.
#[derive(Debug, Clone)]
pub struct Classifier {
    key: String,
    exclude: Vec<String>,
    rules: Vec<CategoryRule>,
}

impl Classifier {
    /// Value lists are expected to be disjoint. Overlaps are reported and
    /// resolved first-match-wins in rule order.
    pub fn new(key: &str, exclude: Vec<String>, rules: Vec<CategoryRule>) -> Result<Self, ConfigurationError> {
        if key.trim().is_empty() {
            return Err(ConfigurationError::UnknownAttribute(key.to_string()));
        }
        for (i, rule) in rules.iter().enumerate() {
            if rule.name == REMAINDER || rules[..i].iter().any(|r| r.name == rule.name) {
                return Err(ConfigurationError::DuplicateCategory {
                    layer: key.to_string(),
                    category: rule.name.clone(),
                });
            }
            for earlier in &rules[..i] {
                for value in rule.values.iter().filter(|v| earlier.values.contains(v)) {
                    warn!(
                        key,
                        value = %value,
                        first = %earlier.name,
                        second = %rule.name,
                        "Category value lists overlap; first match wins"
                    );
                }
            }
        }
        Ok(Self { key: key.to_string(), exclude, rules })
    }

    /// Category names in bucket order, remainder excluded.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// Layer membership: the key is present and its value is not excluded.
    pub fn accepts(&self, f: &Feature) -> bool {
        f.get(&self.key).is_some_and(|v| !self.exclude.iter().any(|x| v.matches(x)))
    }

    fn category_of(&self, f: &Feature) -> Option<usize> {
        let value = f.get(&self.key)?;
        self.rules.iter().position(|r| r.values.iter().any(|x| value.matches(x)))
    }

    /// Partition every feature of `collection` into exactly one bucket.
    /// Features lacking the key land in the remainder.
    pub fn split(&self, collection: &FeatureCollection) -> Split {
        let mut parts: Vec<Vec<Feature>> = vec![Vec::new(); self.rules.len() + 1];
        for f in collection {
            let idx = self.category_of(f).unwrap_or(self.rules.len());
            parts[idx].push(f.clone());
        }
        self.into_split(&collection.crs, parts)
    }

    /// Split the layer drawn from a mixed source. Accepted features are
    /// partitioned as in `split`. Any feature matching the include filters of
    /// a category also joins the first such category, so a culverted ditch
    /// lands in both `ditch` and `drain`. Features that are neither accepted
    /// nor included are left out.
    pub fn split_layer(&self, raw: &FeatureCollection) -> Split {
        let mut parts: Vec<Vec<Feature>> = vec![Vec::new(); self.rules.len() + 1];
        for f in raw {
            let own = self.accepts(f).then(|| self.category_of(f).unwrap_or(self.rules.len()));
            if let Some(idx) = own {
                parts[idx].push(f.clone());
            }
            let included = self
                .rules
                .iter()
                .position(|r| r.include.iter().any(|flt| flt.matches(f)));
            if let Some(idx) = included.filter(|&i| own != Some(i)) {
                parts[idx].push(f.clone());
            }
        }
        self.into_split(&raw.crs, parts)
    }

    fn into_split(&self, crs: &Crs, parts: Vec<Vec<Feature>>) -> Split {
        let names = self.category_names().chain(std::iter::once(REMAINDER));
        let buckets = names
            .zip(parts)
            .map(|(name, features)| Bucket {
                name: name.to_string(),
                features: FeatureCollection::from_features(crs.clone(), features),
            })
            .collect();
        Split { buckets }
    }
}

/// A reference area used to give the features it touches their own defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    pub name: String,
    pub crs: Crs,
    pub area: MultiPolygon<f64>,
}

impl Boundary {
    /// Build from a single exterior ring given as `[x, y]` pairs.
    pub fn from_ring(name: &str, crs: Crs, ring: &[[f64; 2]]) -> Result<Self, ConfigurationError> {
        if ring.len() < 3 || ring.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ConfigurationError::InvalidParameter {
                name: format!("boundary `{name}`"),
                reason: "ring needs at least three finite coordinates".into(),
            });
        }
        let exterior: LineString<f64> = ring.iter().map(|&[x, y]| (x, y)).collect::<Vec<_>>().into();
        Ok(Self {
            name: name.to_string(),
            crs,
            area: MultiPolygon::new(vec![Polygon::new(exterior, vec![])]),
        })
    }
}

/// Split `collection` into (intersecting `boundary`, not intersecting).
/// Touching counts as intersecting. No reprojection: CRSs must match.
pub fn split_by_boundary(
    collection: &FeatureCollection,
    boundary: &Boundary,
) -> Result<(FeatureCollection, FeatureCollection), ConfigurationError> {
    collection.crs.ensure_same(&boundary.crs)?;
    let inside = collection.filter(|f| f.geometry.intersects(&boundary.area));
    let outside = collection.filter(|f| !f.geometry.intersects(&boundary.area));
    Ok((inside, outside))
}
