//! Line endpoint extension.
//!
//! Each terminal segment is extrapolated outward along its own direction:
//!   new = far + (near − far) · (len + d) / len
//! where `near` is the endpoint and `far` its neighbour. The original
//! endpoints are kept, so the result has two more coordinates per part.
use geo::{Coord, Geometry, LineString, MultiLineString};

use crate::error::DegenerateGeometryError;

/// Extend both ends of every line part of `geometry` by `distance`.
pub fn extend_endpoints(
    geometry: &Geometry<f64>,
    distance: f64,
) -> Result<Geometry<f64>, DegenerateGeometryError> {
    if !(distance.is_finite() && distance >= 0.0) {
        return Err(DegenerateGeometryError::InvalidDistance(distance));
    }
    match geometry {
        Geometry::Line(l) => Ok(extend_line(&LineString::new(vec![l.start, l.end]), distance)?.into()),
        Geometry::LineString(ls) => Ok(extend_line(ls, distance)?.into()),
        Geometry::MultiLineString(mls) => {
            let parts = mls
                .iter()
                .map(|ls| extend_line(ls, distance))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(MultiLineString::new(parts).into())
        }
        Geometry::Point(_) | Geometry::MultiPoint(_) => Err(DegenerateGeometryError::Unsupported("point")),
        Geometry::GeometryCollection(_) => Err(DegenerateGeometryError::Unsupported("collection")),
        _ => Err(DegenerateGeometryError::Unsupported("polygonal")),
    }
}

fn extend_line(line: &LineString<f64>, distance: f64) -> Result<LineString<f64>, DegenerateGeometryError> {
    let coords = &line.0;
    let n = coords.len();
    if n < 2 {
        return Err(DegenerateGeometryError::TooFewCoordinates(n));
    }
    let start = extrapolate(coords[0], coords[1], distance)?;
    let end = extrapolate(coords[n - 1], coords[n - 2], distance)?;

    let mut out = Vec::with_capacity(n + 2);
    out.push(start);
    out.extend_from_slice(coords);
    out.push(end);
    Ok(LineString::new(out))
}

fn extrapolate(near: Coord<f64>, far: Coord<f64>, distance: f64) -> Result<Coord<f64>, DegenerateGeometryError> {
    if !(near.x.is_finite() && near.y.is_finite() && far.x.is_finite() && far.y.is_finite()) {
        return Err(DegenerateGeometryError::NonFiniteCoordinate);
    }
    let len = (near.x - far.x).hypot(near.y - far.y);
    if len == 0.0 {
        return Err(DegenerateGeometryError::ZeroLengthSegment { x: near.x, y: near.y });
    }
    let scale = (len + distance) / len;
    Ok(far + (near - far) * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::line_string;

    #[test]
    fn extends_both_ends_along_segment_direction() {
        let line: Geometry<f64> =
            line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 4.0), (x: 10.0, y: 4.0)].into();
        let Geometry::LineString(out) = extend_endpoints(&line, 5.0).unwrap() else {
            panic!("expected a line string");
        };
        assert_eq!(out.0.len(), 5);
        // start: back along (3,4) -> (0,0), a 3-4-5 triangle
        assert_relative_eq!(out.0[0].x, -3.0, epsilon = 1e-12);
        assert_relative_eq!(out.0[0].y, -4.0, epsilon = 1e-12);
        assert_relative_eq!(out.0[4].x, 15.0, epsilon = 1e-12);
        assert_relative_eq!(out.0[4].y, 4.0, epsilon = 1e-12);
        assert_eq!(&out.0[1..4], &[
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 3.0, y: 4.0 },
            Coord { x: 10.0, y: 4.0 },
        ]);
    }

    #[test]
    fn zero_length_terminal_segment_is_degenerate() {
        let line: Geometry<f64> =
            line_string![(x: 1.0, y: 1.0), (x: 1.0, y: 1.0), (x: 5.0, y: 1.0)].into();
        assert_eq!(
            extend_endpoints(&line, 0.5).unwrap_err(),
            DegenerateGeometryError::ZeroLengthSegment { x: 1.0, y: 1.0 }
        );
    }

    #[test]
    fn single_coordinate_is_degenerate() {
        let line: Geometry<f64> = line_string![(x: 1.0, y: 1.0)].into();
        assert_eq!(
            extend_endpoints(&line, 0.5).unwrap_err(),
            DegenerateGeometryError::TooFewCoordinates(1)
        );
    }

    #[test]
    fn multi_line_parts_are_extended_independently() {
        let mls: Geometry<f64> = MultiLineString::new(vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
            line_string![(x: 0.0, y: 5.0), (x: 0.0, y: 6.0)],
        ])
        .into();
        let Geometry::MultiLineString(out) = extend_endpoints(&mls, 1.0).unwrap() else {
            panic!("expected a multi line string");
        };
        assert_relative_eq!(out.0[0].0[0].x, -1.0);
        assert_relative_eq!(out.0[1].0[3].y, 7.0);
    }
}
