//! Pipeline orchestrator: enrich every layer, burn, fuse with the terrain.

use std::time::Instant;

use tracing::info;

use crate::burn::{burn, fuse, Reducer};
use crate::coords::Crs;
use crate::enrich::{
    BuildingEnricher, EnrichmentPipeline, LanduseEnricher, RoadEnricher, WaterwayEnricher, BURN_HEIGHT,
    BURN_HEIGHT_MIN, MANNING,
};
use crate::error::{ConfigurationError, Result};
use crate::feature::FeatureCollection;
use crate::params::ModelParams;
use crate::raster::RasterGrid;

// ── Public structs ────────────────────────────────────────────────────────────

/// Full output of one run. All rasters share the base terrain grid.
#[derive(Debug, Clone)]
pub struct TerrainModels {
    /// Terrain plus the tallest obstruction per cell.
    pub dsm: RasterGrid,
    /// Terrain plus the lowest threshold per cell.
    pub dhtm: RasterGrid,
    /// Manning coefficient per cell; not relative to the terrain.
    pub friction: RasterGrid,
    /// Burned `burn_height` before fusion.
    pub max_heights: RasterGrid,
    /// Burned `burn_height_min` before fusion.
    pub min_heights: RasterGrid,
    /// Every enriched feature of every layer.
    pub features: FeatureCollection,
}

/// Validated pipelines for the four layers plus the burn constants.
pub struct TerrainModelGenerator {
    buildings: EnrichmentPipeline<BuildingEnricher>,
    roads: EnrichmentPipeline<RoadEnricher>,
    waterways: EnrichmentPipeline<WaterwayEnricher>,
    landuse: EnrichmentPipeline<LanduseEnricher>,
    extension_crs: Crs,
    default_manning: f64,
    height_fill: f64,
}

impl TerrainModelGenerator {
    /// Every configuration error is raised here, before any data is read.
    pub fn new(params: &ModelParams) -> std::result::Result<Self, ConfigurationError> {
        params.validate()?;
        let dm = params.default_manning;
        let extension = &params.road_endpoint_extension;
        Ok(Self {
            buildings: EnrichmentPipeline::new(BuildingEnricher, &params.buildings, dm)?,
            roads: EnrichmentPipeline::new(RoadEnricher::new(extension.distance), &params.roads, dm)?,
            waterways: EnrichmentPipeline::new(WaterwayEnricher, &params.waterways, dm)?,
            landuse: EnrichmentPipeline::new(LanduseEnricher, &params.landuse, dm)?,
            extension_crs: extension.crs.clone(),
            default_manning: dm,
            height_fill: params.height_fill,
        })
    }

    /// Run all stages. `areas` feeds buildings and land use, `lines` feeds
    /// roads and waterways. Both must be in the CRS of `base`, which must also
    /// be the CRS the road extension is expressed in.
    pub fn generate(
        &self,
        base: &RasterGrid,
        areas: &FeatureCollection,
        lines: &FeatureCollection,
    ) -> Result<TerrainModels> {
        let t0 = Instant::now();
        base.validate()?;
        let crs = &base.spec.crs;
        areas.crs.ensure_same(crs)?;
        lines.crs.ensure_same(crs)?;
        self.extension_crs.ensure_same(crs)?;

        // ── Enrichment ──────────────────────────────────────────────────────
        let buildings = self.buildings.run(areas)?;
        let landuse = self.landuse.run(areas)?;
        let roads = self.roads.run(lines)?;
        let waterways = self.waterways.run(lines)?;
        info!(
            buildings = buildings.len(),
            roads = roads.len(),
            waterways = waterways.len(),
            landuse = landuse.len(),
            "Enriched layers"
        );
        let features = buildings.merge(&roads)?.merge(&waterways)?.merge(&landuse)?;

        // ── Burn + fuse ─────────────────────────────────────────────────────
        let spec = &base.spec;
        let fill = self.height_fill as f32;
        let max_heights = burn(&features, BURN_HEIGHT, spec, fill, Reducer::Max)?;
        let min_heights = burn(&features, BURN_HEIGHT_MIN, spec, fill, Reducer::Min)?;
        let friction = burn(&features, MANNING, spec, self.default_manning as f32, Reducer::Min)?;
        let dsm = fuse(base, &max_heights)?;
        let dhtm = fuse(base, &min_heights)?;

        info!(
            width = spec.width,
            height = spec.height,
            features = features.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Terrain models ready"
        );
        Ok(TerrainModels { dsm, dhtm, friction, max_heights, min_heights, features })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Extent;
    use crate::error::PipelineError;
    use crate::feature::Feature;
    use crate::params::EndpointExtension;
    use crate::raster::GridSpec;
    use approx::assert_relative_eq;
    use geo::{line_string, polygon};

    fn utm() -> Crs {
        Crs::new("EPSG:32737")
    }

    fn params() -> ModelParams {
        ModelParams {
            road_endpoint_extension: EndpointExtension { distance: 0.5, crs: utm() },
            ..ModelParams::default()
        }
    }

    /// 100 m x 100 m of flat terrain at 10 m, 1 m cells.
    fn base() -> RasterGrid {
        let spec = GridSpec::from_extent(utm(), Extent::new(0.0, 0.0, 100.0, 100.0), 1.0).unwrap();
        RasterGrid::new(spec, 10.0)
    }

    fn areas() -> FeatureCollection {
        FeatureCollection::from_features(
            utm(),
            vec![
                Feature::new(polygon![(x: 10.0, y: 10.0), (x: 20.0, y: 10.0), (x: 20.0, y: 20.0), (x: 10.0, y: 20.0)])
                    .with_id("house")
                    .with_attr("building", "house"),
                Feature::new(polygon![(x: 60.0, y: 10.0), (x: 70.0, y: 10.0), (x: 70.0, y: 20.0), (x: 60.0, y: 20.0)])
                    .with_id("shop")
                    .with_attr("building", "commercial")
                    .with_attr("building_levels", "2"),
            ],
        )
    }

    fn lines() -> FeatureCollection {
        FeatureCollection::from_features(
            utm(),
            vec![
                Feature::new(line_string![(x: 50.0, y: 0.0), (x: 50.0, y: 100.0)])
                    .with_id("canal")
                    .with_attr("waterway", "canal")
                    .with_attr("width", 1.0),
                Feature::new(line_string![(x: 0.0, y: 80.0), (x: 100.0, y: 80.0)])
                    .with_id("street")
                    .with_attr("highway", "residential"),
            ],
        )
    }

    fn at(grid: &RasterGrid, x: f64, y: f64) -> f32 {
        let col = ((x - grid.spec.min_x) / grid.spec.resolution) as usize;
        let row = ((grid.spec.max_y - y) / grid.spec.resolution) as usize;
        grid.get(row, col)
    }

    #[test]
    fn end_to_end_burn() {
        let gen = TerrainModelGenerator::new(&params()).unwrap();
        let out = gen.generate(&base(), &areas(), &lines()).unwrap();

        // house: 1 level x 3 m, threshold 0
        assert_relative_eq!(at(&out.dsm, 15.5, 15.5), 13.0);
        assert_relative_eq!(at(&out.dhtm, 15.5, 15.5), 10.0);
        // shop: 2 tagged levels x 4 m, threshold 0.4
        assert_relative_eq!(at(&out.dsm, 65.5, 15.5), 18.0);
        assert_relative_eq!(at(&out.dhtm, 65.5, 15.5), 10.4, epsilon = 1e-5);
        // canal: 2 m deep
        assert_relative_eq!(at(&out.dsm, 50.5, 40.5), 8.0);
        assert_relative_eq!(at(&out.dhtm, 49.5, 40.5), 8.0);
        // canal under the street: the street wins the surface, the canal the threshold
        assert_relative_eq!(at(&out.dsm, 50.5, 80.5), 10.0);
        assert_relative_eq!(at(&out.dhtm, 50.5, 80.5), 8.0);
        assert_relative_eq!(at(&out.friction, 50.5, 80.5), 0.025);

        assert_relative_eq!(at(&out.friction, 15.5, 15.5), 0.1);
        assert_relative_eq!(at(&out.friction, 30.5, 80.5), 0.042);
        assert_relative_eq!(at(&out.friction, 30.5, 40.5), 0.05);
        assert_relative_eq!(at(&out.dsm, 30.5, 40.5), 10.0);
        assert_relative_eq!(at(&out.max_heights, 30.5, 40.5), 0.0);

        assert!(out.features.iter().all(|f| f.has(MANNING)));
    }

    #[test]
    fn empty_layers_leave_terrain_unchanged() {
        let gen = TerrainModelGenerator::new(&params()).unwrap();
        let empty = FeatureCollection::new(utm());
        let out = gen.generate(&base(), &empty, &empty).unwrap();
        assert!(out.dsm.data.iter().all(|&v| v == 10.0));
        assert!(out.dhtm.data.iter().all(|&v| v == 10.0));
        assert!(out.friction.data.iter().all(|&v| v == 0.05f32));
        assert!(out.features.is_empty());
    }

    #[test]
    fn vector_crs_must_match_terrain() {
        let gen = TerrainModelGenerator::new(&params()).unwrap();
        let wgs84 = FeatureCollection::new(Crs::new("EPSG:4326"));
        let err = gen.generate(&base(), &areas(), &wgs84).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ConfigurationError::CrsMismatch { .. })));
    }

    #[test]
    fn extension_crs_must_match_terrain() {
        let mut p = params();
        p.road_endpoint_extension = EndpointExtension { distance: 0.002, crs: Crs::new("EPSG:4326") };
        let gen = TerrainModelGenerator::new(&p).unwrap();
        let err = gen.generate(&base(), &areas(), &lines()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ConfigurationError::CrsMismatch { .. })));
    }

    /// Flat terrain at 10 m over part of the study area.
    fn study_base(min_x: f64, min_y: f64, size: f64, resolution: f64) -> RasterGrid {
        let extent = Extent::new(min_x, min_y, min_x + size, min_y + size);
        RasterGrid::new(GridSpec::from_extent(utm(), extent, resolution).unwrap(), 10.0)
    }

    #[test]
    fn default_calibration_burns_streets_at_metre_scale() {
        let base = study_base(527000.0, 9247000.0, 200.0, 0.5);
        let lines = FeatureCollection::from_features(
            utm(),
            vec![
                Feature::new(line_string![(x: 527095.0, y: 9247100.0), (x: 527105.0, y: 9247100.0)])
                    .with_attr("highway", "primary"),
                Feature::new(line_string![(x: 527095.0, y: 9247150.0), (x: 527105.0, y: 9247150.0)])
                    .with_attr("highway", "secondary"),
            ],
        );
        let gen = TerrainModelGenerator::new(&ModelParams::default()).unwrap();
        let out = gen.generate(&base, &FeatureCollection::new(utm()), &lines).unwrap();

        // primary on a 10 m stub: 6 m driveway capsule plus 2 m side strips,
        // about 300 m² or 1200 cells
        let w = out.max_heights.spec.width;
        let primary_cells = out.max_heights.data[150 * w..].iter().filter(|&&v| v > 0.0).count();
        assert!((1100..1320).contains(&primary_cells), "{primary_cells} cells");

        assert_relative_eq!(at(&out.dsm, 527100.25, 9247100.25), 10.2, epsilon = 1e-5);
        assert_relative_eq!(at(&out.dsm, 527100.25, 9247107.25), 10.4, epsilon = 1e-5);
        assert_relative_eq!(at(&out.dsm, 527100.25, 9247108.25), 10.0);
        // no sidewalk cap past the end of the street
        assert_relative_eq!(at(&out.dsm, 527112.25, 9247100.25), 10.0);

        // secondary is 5 m each side
        assert_relative_eq!(at(&out.dsm, 527100.25, 9247154.25), 10.4, epsilon = 1e-5);
        assert_relative_eq!(at(&out.dsm, 527100.25, 9247155.25), 10.0);
        assert_relative_eq!(at(&out.friction, 527100.25, 9247150.25), 0.039);
    }

    #[test]
    fn karioko_commercial_buildings_are_single_low_storeys() {
        let base = study_base(529950.0, 9245750.0, 400.0, 1.0);
        let shop = |x: f64, y: f64| {
            Feature::new(polygon![(x: x, y: y), (x: x + 10.0, y: y), (x: x + 10.0, y: y + 10.0), (x: x, y: y + 10.0)])
                .with_attr("building", "commercial")
        };
        let areas = FeatureCollection::from_features(utm(), vec![shop(530300.0, 9246100.0), shop(530000.0, 9245800.0)]);
        let gen = TerrainModelGenerator::new(&ModelParams::default()).unwrap();
        let out = gen.generate(&base, &areas, &FeatureCollection::new(utm())).unwrap();

        // inside the market: 1 level of 1 m, threshold at full height
        assert_relative_eq!(at(&out.dsm, 530305.5, 9246105.5), 11.0);
        assert_relative_eq!(at(&out.dhtm, 530305.5, 9246105.5), 11.0);
        // elsewhere: 3 levels of 4 m, threshold 0.4
        assert_relative_eq!(at(&out.dsm, 530005.5, 9245805.5), 22.0);
        assert_relative_eq!(at(&out.dhtm, 530005.5, 9245805.5), 10.4, epsilon = 1e-5);
    }

    #[test]
    fn unlisted_waterways_do_not_cut_the_terrain() {
        let lines = FeatureCollection::from_features(
            utm(),
            vec![Feature::new(line_string![(x: 0.0, y: 50.5), (x: 100.0, y: 50.5)])
                .with_id("dam")
                .with_attr("waterway", "dam")],
        );
        let gen = TerrainModelGenerator::new(&params()).unwrap();
        let out = gen.generate(&base(), &FeatureCollection::new(utm()), &lines).unwrap();
        assert!(out.dhtm.data.iter().all(|&v| v == 10.0));
        assert!(out.dsm.data.iter().all(|&v| v == 10.0));
        let dam = &out.features.features()[0];
        assert!(!dam.has(BURN_HEIGHT));
        assert_eq!(dam.number(MANNING), Some(0.05));
    }

    #[test]
    fn culverted_ditch_burns_as_ditch_and_drain() {
        let lines = FeatureCollection::from_features(
            utm(),
            vec![Feature::new(line_string![(x: 0.0, y: 50.5), (x: 100.0, y: 50.5)])
                .with_attr("waterway", "ditch")
                .with_attr("tunnel", "culvert")],
        );
        let gen = TerrainModelGenerator::new(&params()).unwrap();
        let out = gen.generate(&base(), &FeatureCollection::new(utm()), &lines).unwrap();
        assert_eq!(out.features.len(), 2);
        // the 1 m ditch cut is deeper than the 0.5 m drain
        assert_relative_eq!(at(&out.dhtm, 40.5, 50.5), 9.0);
        assert_relative_eq!(at(&out.friction, 40.5, 50.5), 0.025);
    }

    #[test]
    fn bad_tables_fail_at_build_time() {
        let mut p = params();
        p.roads.defaults.remove("secondary");
        assert!(matches!(
            TerrainModelGenerator::new(&p),
            Err(ConfigurationError::MissingDefaults { .. })
        ));

        let mut p = params();
        p.waterways.key.clear();
        assert!(matches!(
            TerrainModelGenerator::new(&p),
            Err(ConfigurationError::UnknownAttribute(_))
        ));
    }
}
