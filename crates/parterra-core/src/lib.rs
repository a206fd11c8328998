//! Burns OpenStreetMap buildings, roads, waterways and land use into a
//! terrain raster, producing surface (DSM), threshold (DHTM) and Manning
//! friction grids for flood modelling.

pub mod attributes;
pub mod burn;
pub mod classify;
pub mod coords;
pub mod enrich;
pub mod error;
pub mod feature;
pub mod generator;
pub mod geometry;
pub mod params;
pub mod raster;

pub use error::{ConfigurationError, DegenerateGeometryError, MissingAttributeError, PipelineError};
pub use feature::{AttrValue, Feature, FeatureCollection};
pub use generator::{TerrainModelGenerator, TerrainModels};
pub use params::ModelParams;
pub use raster::{GridSpec, RasterGrid};
