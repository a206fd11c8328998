//! Planar buffering and polygon difference.
//!
//! A buffer is built as the union of simple pieces: one rectangle per line
//! segment, one disc per vertex, and the original area for polygonal input.
//! Discs are regular polygons inscribed in the true circle.
use geo::{BooleanOps, Coord, Geometry, LineString, MultiPolygon, Polygon};

use crate::error::DegenerateGeometryError;

/// Vertices per quarter circle of a buffer disc.
const QUADRANT_SEGMENTS: usize = 8;

/// Buffer `geometry` outward by `distance` (CRS units).
///
/// Zero distance is valid: lines and points give an empty result, polygons give
/// themselves back.
pub fn buffer_to_polygon(
    geometry: &Geometry<f64>,
    distance: f64,
) -> Result<MultiPolygon<f64>, DegenerateGeometryError> {
    if !(distance.is_finite() && distance >= 0.0) {
        return Err(DegenerateGeometryError::InvalidDistance(distance));
    }
    let mut pieces = Vec::new();
    collect_pieces(geometry, distance, &mut pieces)?;
    Ok(union_all(pieces))
}

/// Planar set difference `a \ b`. Full cover gives an empty result.
pub fn polygon_difference(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if a.0.is_empty() || b.0.is_empty() {
        return a.clone();
    }
    a.difference(b)
}

fn collect_pieces(
    geometry: &Geometry<f64>,
    d: f64,
    out: &mut Vec<Polygon<f64>>,
) -> Result<(), DegenerateGeometryError> {
    match geometry {
        Geometry::Point(p) => {
            check_coord(p.0)?;
            if d > 0.0 {
                out.push(disc(p.0, d));
            }
        }
        Geometry::MultiPoint(mp) => {
            for p in mp {
                collect_pieces(&Geometry::Point(*p), d, out)?;
            }
        }
        Geometry::Line(l) => path_pieces(&[l.start, l.end], d, out)?,
        Geometry::LineString(ls) => path_pieces(&ls.0, d, out)?,
        Geometry::MultiLineString(mls) => {
            for ls in mls {
                path_pieces(&ls.0, d, out)?;
            }
        }
        Geometry::Polygon(p) => polygon_pieces(p, d, out)?,
        Geometry::MultiPolygon(mp) => {
            for p in mp {
                polygon_pieces(p, d, out)?;
            }
        }
        Geometry::Rect(r) => polygon_pieces(&r.to_polygon(), d, out)?,
        Geometry::Triangle(t) => polygon_pieces(&t.to_polygon(), d, out)?,
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                collect_pieces(g, d, out)?;
            }
        }
    }
    Ok(())
}

fn polygon_pieces(p: &Polygon<f64>, d: f64, out: &mut Vec<Polygon<f64>>) -> Result<(), DegenerateGeometryError> {
    ring_pieces(p.exterior(), d, out)?;
    for hole in p.interiors() {
        ring_pieces(hole, d, out)?;
    }
    out.push(p.clone());
    Ok(())
}

fn ring_pieces(ring: &LineString<f64>, d: f64, out: &mut Vec<Polygon<f64>>) -> Result<(), DegenerateGeometryError> {
    for c in &ring.0 {
        check_coord(*c)?;
    }
    if d > 0.0 {
        path_pieces(&ring.0, d, out)?;
    }
    Ok(())
}

fn path_pieces(coords: &[Coord<f64>], d: f64, out: &mut Vec<Polygon<f64>>) -> Result<(), DegenerateGeometryError> {
    if coords.is_empty() {
        return Err(DegenerateGeometryError::TooFewCoordinates(0));
    }
    for c in coords {
        check_coord(*c)?;
    }
    if d == 0.0 {
        return Ok(());
    }
    for c in coords {
        out.push(disc(*c, d));
    }
    for w in coords.windows(2) {
        if let Some(rect) = segment_rect(w[0], w[1], d) {
            out.push(rect);
        }
    }
    Ok(())
}

fn check_coord(c: Coord<f64>) -> Result<(), DegenerateGeometryError> {
    if c.x.is_finite() && c.y.is_finite() {
        Ok(())
    } else {
        Err(DegenerateGeometryError::NonFiniteCoordinate)
    }
}

/// Rectangle of half-width `d` around segment a→b; None for a zero-length
/// segment, which the vertex discs already cover.
fn segment_rect(a: Coord<f64>, b: Coord<f64>, d: f64) -> Option<Polygon<f64>> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = dx.hypot(dy);
    if len == 0.0 {
        return None;
    }
    let n = Coord { x: -dy / len * d, y: dx / len * d };
    let ring = vec![a + n, b + n, b - n, a - n, a + n];
    Some(Polygon::new(LineString::new(ring), vec![]))
}

fn disc(center: Coord<f64>, r: f64) -> Polygon<f64> {
    let n = QUADRANT_SEGMENTS * 4;
    let mut ring: Vec<Coord<f64>> = (0..n)
        .map(|k| {
            let a = std::f64::consts::TAU * k as f64 / n as f64;
            Coord { x: center.x + r * a.cos(), y: center.y + r * a.sin() }
        })
        .collect();
    ring.push(ring[0]);
    Polygon::new(LineString::new(ring), vec![])
}

/// Pairwise reduction keeps each union small.
fn union_all(pieces: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut layer: Vec<MultiPolygon<f64>> =
        pieces.into_iter().map(|p| MultiPolygon::new(vec![p])).collect();
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| pair[1..].iter().fold(pair[0].clone(), |acc, p| acc.union(p)))
            .collect();
    }
    layer.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}
