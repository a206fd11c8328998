//! File boundary of the CLI: GeoJSON vectors in and out, rasters as JSON
//! documents or Float32 TIFFs.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{bail, Context, Result};
use geojson::{feature::Id, GeoJson, JsonObject, JsonValue};
use parterra_core::coords::Crs;
use parterra_core::{AttrValue, Feature, FeatureCollection, RasterGrid};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tracing::{debug, warn};

// ── Vectors ──────────────────────────────────────────────────────────────────

/// Read a GeoJSON FeatureCollection. The file carries no usable CRS, so the
/// caller supplies it. Features without geometry are skipped.
pub fn read_features(path: &Path, crs: &Crs) -> Result<FeatureCollection> {
    let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let geojson: GeoJson = text.parse().with_context(|| format!("Invalid GeoJSON in {}", path.display()))?;
    let GeoJson::FeatureCollection(fc) = geojson else {
        bail!("{} is not a GeoJSON FeatureCollection", path.display());
    };

    let mut features = Vec::with_capacity(fc.features.len());
    for (i, f) in fc.features.into_iter().enumerate() {
        let label = match &f.id {
            Some(Id::String(s)) => s.clone(),
            Some(Id::Number(n)) => n.to_string(),
            None => format!("#{i}"),
        };
        let Some(geometry) = f.geometry else {
            warn!(feature = %label, file = %path.display(), "Skipping feature without geometry");
            continue;
        };
        let geometry: geo::Geometry<f64> = geometry
            .try_into()
            .with_context(|| format!("Feature {label} in {}", path.display()))?;
        let mut feature = Feature::new(geometry).with_id(label);
        for (key, value) in f.properties.unwrap_or_default() {
            if let Some(v) = attr_from_json(value) {
                feature.set(&key, v);
            }
        }
        features.push(feature);
    }
    debug!(file = %path.display(), features = features.len(), "Loaded features");
    Ok(FeatureCollection::from_features(crs.clone(), features))
}

/// `null` is absent; booleans and nested values keep their JSON text.
fn attr_from_json(value: JsonValue) -> Option<AttrValue> {
    match value {
        JsonValue::Null => None,
        JsonValue::Number(n) => n.as_f64().map(AttrValue::Number),
        JsonValue::String(s) => Some(AttrValue::Text(s)),
        other => Some(AttrValue::Text(other.to_string())),
    }
}

fn attr_to_json(value: &AttrValue) -> JsonValue {
    match value {
        AttrValue::Number(v) => JsonValue::from(*v),
        AttrValue::Text(s) => JsonValue::String(s.clone()),
    }
}

pub fn write_features(path: &Path, collection: &FeatureCollection) -> Result<()> {
    let features = collection
        .iter()
        .map(|f| {
            let properties: JsonObject = f.attributes.iter().map(|(k, v)| (k.clone(), attr_to_json(v))).collect();
            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&f.geometry))),
                id: f.id.clone().map(Id::String),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    let fc = geojson::FeatureCollection { bbox: None, features, foreign_members: None };
    let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), &fc).with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(())
}

// ── Rasters ──────────────────────────────────────────────────────────────────

/// Read a raster JSON document (`{"spec": {...}, "data": [...]}`).
pub fn read_raster(path: &Path) -> Result<RasterGrid> {
    let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let grid: RasterGrid =
        serde_json::from_str(&text).with_context(|| format!("Invalid raster document {}", path.display()))?;
    grid.validate().with_context(|| format!("Inconsistent raster {}", path.display()))?;
    Ok(grid)
}

pub fn write_raster_json(path: &Path, grid: &RasterGrid) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), grid).with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(())
}

/// Single-band Float32 TIFF carrying the GeoTIFF pixel-scale and tie-point
/// tags. The CRS itself is not encoded.
pub fn write_raster_tiff(path: &Path, grid: &RasterGrid) -> Result<()> {
    let spec = &grid.spec;
    let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let mut image = encoder.new_image::<colortype::Gray32Float>(spec.width as u32, spec.height as u32)?;
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &[spec.resolution, spec.resolution, 0.0][..])?;
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, spec.min_x, spec.max_y, 0.0][..])?;
    image
        .write_data(&grid.data)
        .with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(())
}
