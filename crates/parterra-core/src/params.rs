//! Run parameters: per-layer classification and defaults tables plus the
//! global constants of the burn.
//!
//! The document is plain serde, so the CLI reads and prints it as JSON.
//! Nothing here is checked on load; `TerrainModelGenerator::new` validates
//! the whole bundle before any feature is touched.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::{CategoryRule, REMAINDER};
use crate::coords::Crs;
use crate::enrich::{BuildingDefaults, LanduseDefaults, RoadDefaults, WaterwayDefaults};
use crate::error::ConfigurationError;

// ── Layer tables ──────────────────────────────────────────────────────────────

/// Gives features of `category` that touch `ring` their own bucket, named
/// `name`, with its own defaults entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryRule {
    pub name: String,
    pub category: String,
    pub crs: Crs,
    /// Exterior ring as `[x, y]` pairs; closing is optional.
    pub ring: Vec<[f64; 2]>,
}

/// Classification and defaults for one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParams<D> {
    /// OSM key the layer is drawn from, e.g. `building`.
    pub key: String,
    /// Key values that do not count as membership.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
    #[serde(default)]
    pub boundaries: Vec<BoundaryRule>,
    /// Defaults per category name, boundary name, or `other`.
    pub defaults: BTreeMap<String, D>,
}

impl<D> LayerParams<D> {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            exclude: osm_placeholders(),
            categories: Vec::new(),
            boundaries: Vec::new(),
            defaults: BTreeMap::new(),
        }
    }

    /// Append a category with its defaults.
    pub fn category(mut self, rule: CategoryRule, defaults: D) -> Self {
        self.defaults.insert(rule.name.clone(), defaults);
        self.categories.push(rule);
        self
    }

    /// Append a boundary with the defaults of its carved bucket.
    pub fn boundary(mut self, rule: BoundaryRule, defaults: D) -> Self {
        self.defaults.insert(rule.name.clone(), defaults);
        self.boundaries.push(rule);
        self
    }

    /// Defaults for features matching no category.
    pub fn remainder(mut self, defaults: D) -> Self {
        self.defaults.insert(REMAINDER.to_string(), defaults);
        self
    }
}

/// Values the OSM export writes for "no tag".
fn osm_placeholders() -> Vec<String> {
    ["", "None", "-1"].iter().map(|s| s.to_string()).collect()
}

// ── Globals ──────────────────────────────────────────────────────────────────

/// Distance road centrelines are extended before the sidewalk cut, with the
/// CRS whose units it is expressed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointExtension {
    pub distance: f64,
    pub crs: Crs,
}

impl EndpointExtension {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.distance.is_finite() && self.distance > 0.0 {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidParameter {
                name: "road_endpoint_extension.distance".into(),
                reason: format!("must be finite and positive, got {}", self.distance),
            })
        }
    }
}

/// Full parameter bundle of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub buildings: LayerParams<BuildingDefaults>,
    pub roads: LayerParams<RoadDefaults>,
    pub waterways: LayerParams<WaterwayDefaults>,
    pub landuse: LayerParams<LanduseDefaults>,
    pub road_endpoint_extension: EndpointExtension,
    /// Friction wherever no feature provides one.
    pub default_manning: f64,
    /// Height burned where no feature lies.
    pub height_fill: f64,
}

impl ModelParams {
    /// Checks that need no layer context. Layer tables are checked when
    /// their pipelines are built.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.road_endpoint_extension.validate()?;
        if !(self.default_manning.is_finite() && self.default_manning >= 0.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "default_manning".into(),
                reason: format!("must be finite and non-negative, got {}", self.default_manning),
            });
        }
        if !self.height_fill.is_finite() {
            return Err(ConfigurationError::InvalidParameter {
                name: "height_fill".into(),
                reason: "must be finite".into(),
            });
        }
        Ok(())
    }
}

/// Dar es Salaam study area, UTM zone 37S.
const STUDY_CRS: &str = "EPSG:32737";

/// Karioko market: commercial buildings here are 1 m stalls whose threshold
/// is their full height.
const KARIOKO: [[f64; 2]; 10] = [
    [530938.8, 9245999.7],
    [530766.0, 9246475.6],
    [529919.4, 9246181.7],
    [529891.5, 9246166.4],
    [529792.5, 9246118.1],
    [529788.9, 9246054.5],
    [529836.3, 9245929.7],
    [530037.8, 9246004.9],
    [530131.3, 9245701.1],
    [530232.7, 9245714.0],
];

/// Drain reach surveyed deeper and wider than the mapped drains.
const LOC1: [[f64; 2]; 6] = [
    [529187.3, 9248230.6],
    [529340.2, 9248210.5],
    [529409.1, 9248442.5],
    [529248.5, 9248497.3],
    [529204.9, 9248513.0],
    [529187.4, 9248432.0],
];

fn study_boundary(name: &str, category: &str, ring: &[[f64; 2]]) -> BoundaryRule {
    BoundaryRule {
        name: name.to_string(),
        category: category.to_string(),
        crs: Crs::new(STUDY_CRS),
        ring: ring.to_vec(),
    }
}

/// Calibration of the reference flood study. Widths, depths and the
/// endpoint extension are metres in EPSG:32737; run other areas with a
/// parameter document in their own projected CRS.
impl Default for ModelParams {
    fn default() -> Self {
        let building = |levels, level_height, threshold| BuildingDefaults { levels, level_height, threshold, manning: 0.1 };
        let buildings = LayerParams::new("building")
            .category(CategoryRule::new("residential", &["residential", "house"]), building(1.0, 3.0, 0.0))
            .category(
                CategoryRule::new("commercial", &["commercial", "industrial", "commercial;residential"]),
                building(3.0, 4.0, 0.4),
            )
            .category(CategoryRule::new("public", &["school", "church", "college", "public"]), building(2.0, 4.0, 0.4))
            .category(CategoryRule::new("apartments", &["apartments"]), building(6.0, 4.0, 0.4))
            .remainder(building(1.0, 3.0, 0.2))
            .boundary(study_boundary("karioko", "commercial", &KARIOKO), building(1.0, 1.0, 1.0));

        let major = RoadDefaults {
            width: 8.0,
            drive_frac: 0.75,
            layer: 0.0,
            layer_height: 5.0,
            driveway_offset: 0.2,
            sidewalk_offset: 0.4,
            manning: 0.039,
        };
        let minor = RoadDefaults {
            width: 4.0,
            drive_frac: 1.0,
            layer: 0.0,
            layer_height: 4.0,
            driveway_offset: 0.0,
            sidewalk_offset: 0.0,
            manning: 0.042,
        };
        let roads = LayerParams::new("highway")
            .category(CategoryRule::new("primary", &["primary"]), major)
            .category(CategoryRule::new("secondary", &["secondary", "tertiary"]), RoadDefaults { width: 5.0, ..major })
            .category(CategoryRule::new("residential", &["residential", "unclassified"]), minor)
            .remainder(RoadDefaults { width: 2.0, ..minor });

        // No remainder entry: unlisted waterways (dams, weirs, ...) get no burn.
        let waterway = |depth, width, manning| WaterwayDefaults { depth, width, manning };
        let waterways = LayerParams::new("waterway")
            .category(CategoryRule::new("ditch", &["ditch", "stream"]), waterway(1.0, 1.0, 0.028))
            .category(CategoryRule::new("canal", &["canal", "river"]), waterway(2.0, 5.0, 0.025))
            .category(
                CategoryRule::new("drain", &["drain"]).including("tunnel", &["culvert"]),
                waterway(0.5, 1.0, 0.025),
            )
            .boundary(study_boundary("loc1", "drain", &LOC1), waterway(1.0, 2.0, 0.025));

        Self {
            buildings,
            roads,
            waterways,
            landuse: LayerParams::new("landuse"),
            // 0.002 degrees of the OSM extract; must outreach the widest road.
            road_endpoint_extension: EndpointExtension { distance: 221.0, crs: Crs::new(STUDY_CRS) },
            default_manning: 0.05,
            height_fill: 0.0,
        }
    }
}
