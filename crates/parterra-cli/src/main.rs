//! Burns OSM layers into a terrain raster and writes the DSM, DHTM and
//! Manning friction grids, optionally with the DHTM change against an
//! earlier run.
mod io;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use parterra_core::burn::difference;
use parterra_core::{FeatureCollection, ModelParams, RasterGrid, TerrainModelGenerator, TerrainModels};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Raster JSON documents, readable back as `--dtm`.
    Json,
    /// Float32 TIFF with GeoTIFF pixel-scale and tie-point tags.
    Tiff,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Tiff => "tif",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "parterra", about = "Burn OSM buildings, roads, waterways and land use into a terrain model")]
struct Args {
    /// Base terrain raster (JSON document); its CRS applies to all vectors
    #[arg(long, required_unless_present = "print_params")]
    dtm: Option<PathBuf>,

    /// GeoJSON of building and land-use polygons
    #[arg(long)]
    areas: Option<PathBuf>,

    /// GeoJSON of road and waterway lines
    #[arg(long)]
    lines: Option<PathBuf>,

    /// Output directory (created if absent)
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// DHTM of an earlier run on the same grid; adds `dhtm_diff` (new minus old)
    #[arg(long)]
    previous_dhtm: Option<PathBuf>,

    /// Parameter document; defaults to the built-in calibration
    #[arg(long)]
    params: Option<PathBuf>,

    /// Raster output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Print the default parameter document and exit
    #[arg(long)]
    print_params: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    if args.print_params {
        println!("{}", serde_json::to_string_pretty(&ModelParams::default())?);
        return Ok(());
    }

    let params = match &args.params {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid parameter document {}", path.display()))?
        }
        None => ModelParams::default(),
    };
    let generator = TerrainModelGenerator::new(&params).context("Invalid parameters")?;

    let dtm_path = args.dtm.as_deref().context("--dtm is required")?;
    let base = io::read_raster(dtm_path)?;
    let crs = &base.spec.crs;
    let areas = load_optional(args.areas.as_deref(), crs)?;
    let lines = load_optional(args.lines.as_deref(), crs)?;
    info!(
        dtm = %dtm_path.display(),
        crs = %crs,
        width = base.spec.width,
        height = base.spec.height,
        areas = areas.len(),
        lines = lines.len(),
        "Inputs loaded"
    );

    let models = generator.generate(&base, &areas, &lines)?;
    let diff = match &args.previous_dhtm {
        Some(path) => {
            let previous = io::read_raster(path)?;
            let diff = difference(&models.dhtm, &previous)
                .with_context(|| format!("{} does not match the terrain grid", path.display()))?;
            Some(diff)
        }
        None => None,
    };
    write_outputs(&args.output, args.format, &models, diff.as_ref())?;
    info!(output = %args.output.display(), "Done");
    Ok(())
}

fn load_optional(path: Option<&Path>, crs: &parterra_core::coords::Crs) -> Result<FeatureCollection> {
    match path {
        Some(p) => io::read_features(p, crs),
        None => Ok(FeatureCollection::new(crs.clone())),
    }
}

fn write_outputs(dir: &Path, format: Format, models: &TerrainModels, dhtm_diff: Option<&RasterGrid>) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    let mut rasters: Vec<(&str, &RasterGrid)> = vec![
        ("dsm", &models.dsm),
        ("dhtm", &models.dhtm),
        ("manning", &models.friction),
        ("osm_max_height", &models.max_heights),
        ("osm_min_height", &models.min_heights),
    ];
    if let Some(diff) = dhtm_diff {
        rasters.push(("dhtm_diff", diff));
    }
    for (name, grid) in rasters {
        let path = dir.join(format!("{name}.{}", format.extension()));
        match format {
            Format::Json => io::write_raster_json(&path, grid)?,
            Format::Tiff => io::write_raster_tiff(&path, grid)?,
        }
        info!(
            raster = name,
            path = %path.display(),
            min = grid.min_value(),
            max = grid.max_value(),
            "Wrote raster"
        );
    }
    io::write_features(&dir.join("features.geojson"), &models.features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parterra_core::coords::{Crs, Extent};
    use parterra_core::GridSpec;
    use geo::polygon;

    #[test]
    fn args_require_dtm_unless_printing() {
        assert!(Args::try_parse_from(["parterra", "--print-params"]).is_ok());
        assert!(Args::try_parse_from(["parterra"]).is_err());
        let args = Args::try_parse_from(["parterra", "--dtm", "d.json", "--format", "tiff"]).unwrap();
        assert_eq!(args.format, Format::Tiff);
        assert_eq!(args.output, PathBuf::from("out"));
        assert!(args.previous_dhtm.is_none());
    }

    fn study_crs() -> Crs {
        Crs::new("EPSG:32737")
    }

    /// 20 m x 20 m of flat terrain at 5 m, 1 m cells.
    fn base() -> RasterGrid {
        let spec = GridSpec::from_extent(study_crs(), Extent::new(0.0, 0.0, 20.0, 20.0), 1.0).unwrap();
        RasterGrid::new(spec, 5.0)
    }

    #[test]
    fn run_writes_every_output() {
        let dir = tempfile::tempdir().unwrap();
        let crs = study_crs();
        let base = base();
        let lines_path = dir.path().join("lines.geojson");
        fs::write(
            &lines_path,
            r#"{ "type": "FeatureCollection", "features": [
                { "type": "Feature", "id": "way/1",
                  "geometry": { "type": "LineString", "coordinates": [[0,10],[20,10]] },
                  "properties": { "waterway": "ditch" } } ] }"#,
        )
        .unwrap();

        let generator = TerrainModelGenerator::new(&ModelParams::default()).unwrap();
        let lines = load_optional(Some(lines_path.as_path()), &crs).unwrap();
        let areas = load_optional(None, &crs).unwrap();
        let models = generator.generate(&base, &areas, &lines).unwrap();

        let out = dir.path().join("out");
        write_outputs(&out, Format::Json, &models, None).unwrap();
        for name in ["dsm", "dhtm", "manning", "osm_max_height", "osm_min_height"] {
            assert!(out.join(format!("{name}.json")).exists(), "{name} missing");
        }
        assert!(!out.join("dhtm_diff.json").exists());
        let dsm = io::read_raster(&out.join("dsm.json")).unwrap();
        assert_eq!(dsm.min_value(), 4.0);
        assert_eq!(dsm.max_value(), 5.0);
        let features = io::read_features(&out.join("features.geojson"), &crs).unwrap();
        assert_eq!(features.len(), 1);
    }

    #[test]
    fn previous_dhtm_adds_a_difference_raster() {
        let dir = tempfile::tempdir().unwrap();
        let crs = study_crs();
        let areas = FeatureCollection::from_features(
            crs.clone(),
            vec![parterra_core::Feature::new(geo::polygon![
                (x: 2.0, y: 2.0), (x: 6.0, y: 2.0), (x: 6.0, y: 6.0), (x: 2.0, y: 6.0)
            ])
            .with_attr("building", "school")],
        );
        let empty = FeatureCollection::new(crs.clone());
        let generator = TerrainModelGenerator::new(&ModelParams::default()).unwrap();
        let models = generator.generate(&base(), &areas, &empty).unwrap();

        // the earlier run saw bare terrain
        let previous = base();
        let diff = difference(&models.dhtm, &previous).unwrap();
        let out = dir.path().join("out");
        write_outputs(&out, Format::Json, &models, Some(&diff)).unwrap();

        let written = io::read_raster(&out.join("dhtm_diff.json")).unwrap();
        // public building threshold
        assert!((written.max_value() - 0.4).abs() < 1e-6);
        assert_eq!(written.min_value(), 0.0);
    }

    #[test]
    fn previous_dhtm_on_another_grid_is_rejected() {
        let coarse = GridSpec::from_extent(study_crs(), Extent::new(0.0, 0.0, 20.0, 20.0), 2.0).unwrap();
        assert!(difference(&base(), &RasterGrid::new(coarse, 5.0)).is_err());
    }
}
