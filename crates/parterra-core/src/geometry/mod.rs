//! Per-feature geometry transforms: buffering, endpoint extension and
//! polygon difference. Pure functions; degenerate input is reported, never
//! repaired.
pub mod buffer;
pub mod extend;

pub use buffer::{buffer_to_polygon, polygon_difference};
pub use extend::extend_endpoints;
