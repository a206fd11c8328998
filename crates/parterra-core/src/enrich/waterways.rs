use serde::{Deserialize, Serialize};

use super::{isolate_degenerate, non_negative, Enricher, FeatureError, BURN_HEIGHT, BURN_HEIGHT_MIN, MANNING};
use crate::classify::Bucket;
use crate::error::{ConfigurationError, Result};
use crate::feature::FeatureCollection;
use crate::geometry::buffer_to_polygon;

pub const DEPTH: &str = "depth";
pub const WIDTH: &str = "width";

/// Per-category waterway defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterwayDefaults {
    /// Bed depth below the terrain, positive down.
    pub depth: f64,
    /// Buffer distance of the channel.
    pub width: f64,
    pub manning: f64,
}

/// Channels cut into the terrain: negative heights over a buffered line.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaterwayEnricher;

impl Enricher for WaterwayEnricher {
    type Defaults = WaterwayDefaults;

    fn layer(&self) -> &'static str {
        "waterways"
    }

    fn check_defaults(&self, category: &str, d: &WaterwayDefaults) -> std::result::Result<(), ConfigurationError> {
        non_negative(self.layer(), category, "depth", d.depth)?;
        non_negative(self.layer(), category, "width", d.width)?;
        non_negative(self.layer(), category, "manning", d.manning)
    }

    fn enrich(&self, bucket: &Bucket, d: &WaterwayDefaults) -> Result<FeatureCollection> {
        let lines = bucket
            .features
            .drop_non_numeric(DEPTH)
            .drop_non_numeric(WIDTH)
            .fill_missing(DEPTH, d.depth)
            .fill_missing(WIDTH, d.width)
            .derive_by_scale(BURN_HEIGHT, DEPTH, -1.0)?
            .derive_by_scale(BURN_HEIGHT_MIN, BURN_HEIGHT, 1.0)?
            .set_constant(MANNING, d.manning);

        let channels = isolate_degenerate(self.layer(), &bucket.name, &lines, |f| {
            let area = buffer_to_polygon(&f.geometry, f.require(WIDTH)?)?;
            Ok::<_, FeatureError>(f.with_geometry(area))
        })?;
        Ok(FeatureCollection::from_features(lines.crs.clone(), channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use crate::coords::Crs;
    use crate::feature::Feature;
    use approx::assert_relative_eq;
    use geo::{line_string, Area, Geometry};

    const CANAL: WaterwayDefaults = WaterwayDefaults { depth: 2.0, width: 5.0, manning: 0.025 };

    fn bucket(features: Vec<Feature>) -> Bucket {
        Bucket {
            name: "canal".into(),
            features: FeatureCollection::from_features(Crs::new("EPSG:32737"), features),
        }
    }

    fn canal() -> Feature {
        Feature::new(line_string![(x: 0.0, y: 0.0), (x: 50.0, y: 0.0), (x: 50.0, y: 50.0)]).with_attr("waterway", "canal")
    }

    #[test]
    fn depth_cuts_below_terrain() {
        let out = WaterwayEnricher.enrich(&bucket(vec![canal()]), &CANAL).unwrap();
        let f = &out.features()[0];
        assert_relative_eq!(f.number(BURN_HEIGHT).unwrap(), -2.0);
        assert_eq!(f.number(BURN_HEIGHT_MIN), f.number(BURN_HEIGHT));
        assert_eq!(f.number(MANNING), Some(0.025));
    }

    #[test]
    fn tagged_depth_wins_over_default() {
        let out = WaterwayEnricher.enrich(&bucket(vec![canal().with_attr(DEPTH, 0.5)]), &CANAL).unwrap();
        assert_relative_eq!(out.features()[0].number(BURN_HEIGHT).unwrap(), -0.5);
    }

    #[test]
    fn channel_is_buffered_by_width() {
        let out = WaterwayEnricher.enrich(&bucket(vec![canal().with_attr(WIDTH, 1.0)]), &CANAL).unwrap();
        let Geometry::MultiPolygon(area) = &out.features()[0].geometry else {
            panic!("channel is not polygonal");
        };
        // 100 m of centreline, 2 m across, plus end caps and the corner
        assert!(area.unsigned_area() > 200.0);
        assert!(area.unsigned_area() < 200.0 + std::f64::consts::PI * 2.0);
    }

    #[test]
    fn non_finite_and_empty_lines_are_dropped() {
        let broken = Feature::new(line_string![(x: 0.0, y: 0.0), (x: f64::NAN, y: 5.0)]).with_id("way/nan");
        let empty = Feature::new(geo::LineString::<f64>::new(vec![])).with_id("way/empty");
        let kept = canal().with_id("way/ok");
        let out = WaterwayEnricher.enrich(&bucket(vec![broken, kept, empty]), &CANAL).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.features()[0].label(), "way/ok");
    }

    #[test]
    fn mapped_riverbank_polygon_is_widened_not_dropped() {
        let bank = Feature::new(geo::polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 4.0), (x: 0.0, y: 4.0)])
            .with_attr("waterway", "canal");
        let out = WaterwayEnricher.enrich(&bucket(vec![bank]), &CANAL).unwrap();
        assert_eq!(out.len(), 1);
        let Geometry::MultiPolygon(area) = &out.features()[0].geometry else {
            panic!("channel is not polygonal");
        };
        assert!(area.unsigned_area() > 40.0 + 2.0 * 5.0 * 14.0);
    }

    #[test]
    fn negative_depth_is_rejected() {
        let bad = WaterwayDefaults { depth: -1.0, ..CANAL };
        assert!(WaterwayEnricher.check_defaults("canal", &bad).is_err());
    }
}
