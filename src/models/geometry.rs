use crate::error::{PlannerError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Sphere radius used for geodesic area, matching the WGS84 semi-major axis.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(PlannerError::Validation(format!(
                "non-finite coordinate ({}, {})",
                self.lat, self.lng
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(PlannerError::Validation(format!(
                "latitude {} out of range [-90, 90]",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(PlannerError::Validation(format!(
                "longitude {} out of range [-180, 180]",
                self.lng
            )));
        }
        Ok(())
    }

    fn parse(s: &str) -> Result<Self> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| PlannerError::Validation(format!("expected LAT,LON, got '{}'", s)))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| PlannerError::Validation(format!("bad latitude '{}'", lat.trim())))?;
        let lng = lng
            .trim()
            .parse::<f64>()
            .map_err(|_| PlannerError::Validation(format!("bad longitude '{}'", lng.trim())))?;
        Ok(Self::new(lat, lng))
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    Polygon,
    Circle,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Polygon => "Polygon",
            ShapeKind::Circle => "Circle",
        }
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An operator-entered irrigation shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Polygon { ring: Vec<LatLng> },
    Circle { center: LatLng, radius_m: f64 },
}

impl Geometry {
    /// Build a polygon, dropping a trailing vertex that repeats the first.
    pub fn polygon(mut ring: Vec<LatLng>) -> Self {
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        Geometry::Polygon { ring }
    }

    pub fn circle(center: LatLng, radius_m: f64) -> Self {
        Geometry::Circle { center, radius_m }
    }

    /// Parse `circle LAT,LON RADIUS_M` or `polygon LAT,LON; LAT,LON; ...`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (kind, rest) = input
            .split_once(char::is_whitespace)
            .ok_or_else(|| PlannerError::Validation("expected 'polygon' or 'circle'".into()))?;

        match kind.to_lowercase().as_str() {
            "circle" | "c" => {
                let mut parts = rest.split_whitespace();
                let center = parts
                    .next()
                    .ok_or_else(|| PlannerError::Validation("circle needs a center".into()))
                    .and_then(LatLng::parse)?;
                let radius = parts
                    .next()
                    .ok_or_else(|| PlannerError::Validation("circle needs a radius".into()))?;
                let radius_m = radius
                    .trim_end_matches('m')
                    .parse::<f64>()
                    .map_err(|_| PlannerError::Validation(format!("bad radius '{}'", radius)))?;
                Ok(Geometry::circle(center, radius_m))
            }
            "polygon" | "poly" | "p" => {
                let ring = rest
                    .split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(LatLng::parse)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Geometry::polygon(ring))
            }
            other => Err(PlannerError::Validation(format!(
                "unknown shape '{}', expected 'polygon' or 'circle'",
                other
            ))),
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Geometry::Polygon { .. } => ShapeKind::Polygon,
            Geometry::Circle { .. } => ShapeKind::Circle,
        }
    }

    /// Reject anything that would produce a meaningless area.
    pub fn validate(&self) -> Result<()> {
        match self {
            Geometry::Circle { center, radius_m } => {
                center.validate()?;
                if !radius_m.is_finite() || *radius_m <= 0.0 {
                    return Err(PlannerError::Validation(format!(
                        "circle radius must be positive, got {}",
                        radius_m
                    )));
                }
                Ok(())
            }
            Geometry::Polygon { ring } => {
                for vertex in ring {
                    vertex.validate()?;
                }
                if distinct_vertices(ring) < 3 {
                    return Err(PlannerError::Validation(format!(
                        "polygon needs at least 3 distinct vertices, got {}",
                        distinct_vertices(ring)
                    )));
                }
                if ring.windows(2).any(|w| w[0] == w[1]) {
                    return Err(PlannerError::Validation(
                        "polygon has repeated consecutive vertices".into(),
                    ));
                }
                if is_self_intersecting(&unwrap_longitudes(ring)) {
                    return Err(PlannerError::Validation(
                        "polygon edges cross each other".into(),
                    ));
                }
                if geodesic_area(ring) <= 0.0 {
                    return Err(PlannerError::Validation("polygon has zero area".into()));
                }
                Ok(())
            }
        }
    }

    /// Area in square meters. Callers validate first.
    pub fn area_square_meters(&self) -> f64 {
        match self {
            Geometry::Polygon { ring } => geodesic_area(ring),
            Geometry::Circle { radius_m, .. } => PI * radius_m * radius_m,
        }
    }

    /// Point sent to the forecast provider: circle center, or the polygon's bounds center.
    pub fn centroid(&self) -> LatLng {
        match self {
            Geometry::Circle { center, .. } => *center,
            Geometry::Polygon { ring } => {
                let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
                let (mut min_lng, mut max_lng) = (f64::INFINITY, f64::NEG_INFINITY);
                for p in unwrap_longitudes(ring) {
                    min_lat = min_lat.min(p.lat);
                    max_lat = max_lat.max(p.lat);
                    min_lng = min_lng.min(p.lng);
                    max_lng = max_lng.max(p.lng);
                }
                LatLng::new(
                    (min_lat + max_lat) / 2.0,
                    normalize_lng((min_lng + max_lng) / 2.0),
                )
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Geometry::Polygon { ring } => format!("polygon, {} vertices", ring.len()),
            Geometry::Circle { center, radius_m } => {
                format!("circle at {} r={:.0}m", center, radius_m)
            }
        }
    }
}

/// Spherical-excess area of a lat/lng ring.
pub fn geodesic_area(ring: &[LatLng]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for (i, p1) in ring.iter().enumerate() {
        let p2 = &ring[(i + 1) % ring.len()];
        area += wrap_lng_delta(p2.lng - p1.lng).to_radians()
            * (2.0 + p1.lat.to_radians().sin() + p2.lat.to_radians().sin());
    }

    (area * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs()
}

/// Shortest signed longitude step, in (-180, 180].
fn wrap_lng_delta(delta: f64) -> f64 {
    let d = delta % 360.0;
    if d > 180.0 {
        d - 360.0
    } else if d <= -180.0 {
        d + 360.0
    } else {
        d
    }
}

fn normalize_lng(lng: f64) -> f64 {
    wrap_lng_delta(lng)
}

/// Ring with each longitude moved next to its predecessor, so edges that
/// cross the antimeridian stay short in planar degrees.
fn unwrap_longitudes(ring: &[LatLng]) -> Vec<LatLng> {
    let mut out: Vec<LatLng> = Vec::with_capacity(ring.len());
    for p in ring {
        let lng = match out.last() {
            Some(prev) => prev.lng + wrap_lng_delta(p.lng - prev.lng),
            None => p.lng,
        };
        out.push(LatLng::new(p.lat, lng));
    }
    out
}

fn distinct_vertices(ring: &[LatLng]) -> usize {
    let mut seen: Vec<&LatLng> = Vec::with_capacity(ring.len());
    for p in ring {
        if !seen.contains(&p) {
            seen.push(p);
        }
    }
    seen.len()
}

fn is_self_intersecting(ring: &[LatLng]) -> bool {
    let n = ring.len();
    if n < 4 {
        return false;
    }

    for i in 0..n {
        let (a1, a2) = (ring[i], ring[(i + 1) % n]);
        for j in (i + 1)..n {
            // Adjacent edges share a vertex
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let (b1, b2) = (ring[j], ring[(j + 1) % n]);
            if segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

fn orientation(a: LatLng, b: LatLng, c: LatLng) -> f64 {
    (b.lng - a.lng) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lng - a.lng)
}

fn on_segment(a: LatLng, b: LatLng, p: LatLng) -> bool {
    p.lng >= a.lng.min(b.lng)
        && p.lng <= a.lng.max(b.lng)
        && p.lat >= a.lat.min(b.lat)
        && p.lat <= a.lat.max(b.lat)
}

fn segments_intersect(a1: LatLng, a2: LatLng, b1: LatLng, b2: LatLng) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(b1, b2, a1))
        || (d2 == 0.0 && on_segment(b1, b2, a2))
        || (d3 == 0.0 && on_segment(a1, a2, b1))
        || (d4 == 0.0 && on_segment(a1, a2, b2))
}


#[cfg(test)]
mod tests {
    use super::fixtures::{degrees_for, equator_square};
    use super::*;

    #[test]
    fn hectare_square_area() {
        let square = equator_square(100.0);
        assert!(square.validate().is_ok());
        let area = square.area_square_meters();
        assert!((area - 10_000.0).abs() < 0.01, "area was {}", area);
    }

    /// ~100 m square at 17°S whose east and west halves sit on either side of 180°.
    fn square_across_date_line() -> Geometry {
        let d = degrees_for(100.0);
        let half_lng = d / (-17.0f64).to_radians().cos() / 2.0;
        Geometry::polygon(vec![
            LatLng::new(-17.0, 180.0 - half_lng),
            LatLng::new(-17.0, -180.0 + half_lng),
            LatLng::new(-17.0 + d, -180.0 + half_lng),
            LatLng::new(-17.0 + d, 180.0 - half_lng),
        ])
    }

    #[test]
    fn square_across_date_line_has_local_area() {
        let square = square_across_date_line();
        assert!(square.validate().is_ok());

        let area = square.area_square_meters();
        assert!((area - 10_000.0).abs() < 50.0, "area was {}", area);

        let d = degrees_for(100.0);
        let half_lng = d / (-17.0f64).to_radians().cos() / 2.0;
        let same_square_at_greenwich = Geometry::polygon(vec![
            LatLng::new(-17.0, -half_lng),
            LatLng::new(-17.0, half_lng),
            LatLng::new(-17.0 + d, half_lng),
            LatLng::new(-17.0 + d, -half_lng),
        ]);
        let reference = same_square_at_greenwich.area_square_meters();
        assert!((area - reference).abs() < reference * 1e-6);
    }

    #[test]
    fn date_line_centroid_stays_on_the_date_line() {
        let center = square_across_date_line().centroid();
        assert!(center.lng.abs() > 179.99, "centroid lng was {}", center.lng);
        assert!(center.lat < -16.99 && center.lat > -17.0);
    }

    #[test]
    fn bowtie_across_date_line_is_rejected() {
        let bowtie = Geometry::polygon(vec![
            LatLng::new(-17.0, 179.9),
            LatLng::new(-16.9, -179.9),
            LatLng::new(-16.9, 179.9),
            LatLng::new(-17.0, -179.9),
        ]);
        assert!(matches!(bowtie.validate(), Err(PlannerError::Validation(_))));
    }

    #[test]
    fn longitude_steps_wrap_to_shortest() {
        assert_eq!(wrap_lng_delta(359.0), -1.0);
        assert_eq!(wrap_lng_delta(-359.0), 1.0);
        assert_eq!(wrap_lng_delta(180.0), 180.0);
        assert_eq!(wrap_lng_delta(-180.0), 180.0);
    }

    #[test]
    fn area_is_orientation_independent() {
        let d = degrees_for(100.0);
        let ccw = Geometry::polygon(vec![
            LatLng::new(3.0, 101.0),
            LatLng::new(3.0, 101.0 + d),
            LatLng::new(3.0 + d, 101.0 + d),
        ]);
        let cw = Geometry::polygon(vec![
            LatLng::new(3.0, 101.0),
            LatLng::new(3.0 + d, 101.0 + d),
            LatLng::new(3.0, 101.0 + d),
        ]);
        let a = ccw.area_square_meters();
        let b = cw.area_square_meters();
        assert!(a > 0.0);
        assert!((a - b).abs() < a * 1e-9);
    }

    #[test]
    fn circle_area_is_pi_r_squared() {
        let circle = Geometry::circle(LatLng::new(3.56, 101.65), 50.0);
        assert!(circle.validate().is_ok());
        assert!((circle.area_square_meters() - 7853.98).abs() < 0.01);
    }

    #[test]
    fn closing_vertex_is_dropped() {
        let ring = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(0.0, 0.0),
        ];
        match Geometry::polygon(ring) {
            Geometry::Polygon { ring } => assert_eq!(ring.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_degenerate_polygons() {
        let empty = Geometry::polygon(vec![]);
        assert!(matches!(empty.validate(), Err(PlannerError::Validation(_))));

        let two = Geometry::polygon(vec![LatLng::new(0.0, 0.0), LatLng::new(0.0, 1.0)]);
        assert!(matches!(two.validate(), Err(PlannerError::Validation(_))));

        let collinear = Geometry::polygon(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(0.0, 2.0),
        ]);
        assert!(matches!(collinear.validate(), Err(PlannerError::Validation(_))));

        let nan = Geometry::polygon(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(f64::NAN, 1.0),
            LatLng::new(1.0, 1.0),
        ]);
        assert!(matches!(nan.validate(), Err(PlannerError::Validation(_))));
    }

    #[test]
    fn rejects_bowtie() {
        let bowtie = Geometry::polygon(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(1.0, 0.0),
            LatLng::new(0.0, 1.0),
        ]);
        assert!(is_self_intersecting(match &bowtie {
            Geometry::Polygon { ring } => ring,
            _ => unreachable!(),
        }));
        assert!(matches!(bowtie.validate(), Err(PlannerError::Validation(_))));
    }

    #[test]
    fn rejects_bad_circles() {
        let center = LatLng::new(3.56, 101.65);
        assert!(Geometry::circle(center, 0.0).validate().is_err());
        assert!(Geometry::circle(center, -5.0).validate().is_err());
        assert!(Geometry::circle(center, f64::NAN).validate().is_err());
        assert!(Geometry::circle(LatLng::new(95.0, 0.0), 10.0)
            .validate()
            .is_err());
    }

    #[test]
    fn polygon_centroid_is_bounds_center() {
        let poly = Geometry::polygon(vec![
            LatLng::new(3.0, 101.0),
            LatLng::new(3.0, 102.0),
            LatLng::new(4.0, 101.5),
        ]);
        assert_eq!(poly.centroid(), LatLng::new(3.5, 101.5));
    }

    #[test]
    fn parse_circle_and_polygon() {
        let circle = Geometry::parse("circle 3.5609,101.6585 50m").unwrap();
        assert_eq!(circle, Geometry::circle(LatLng::new(3.5609, 101.6585), 50.0));

        let poly = Geometry::parse("polygon 3.56,101.65; 3.56,101.66; 3.57,101.66").unwrap();
        assert_eq!(poly.kind(), ShapeKind::Polygon);
        assert!(poly.validate().is_ok());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Geometry::parse("").is_err());
        assert!(Geometry::parse("hexagon 1,2").is_err());
        assert!(Geometry::parse("circle 3.5").is_err());
        assert!(Geometry::parse("circle 3.5,101 abc").is_err());
        assert!(Geometry::parse("polygon 1,2; x,y; 3,4").is_err());
    }

    #[test]
    fn geometry_json_shape() {
        let circle = Geometry::circle(LatLng::new(1.0, 2.0), 3.0);
        let json = serde_json::to_value(&circle).unwrap();
        assert_eq!(json["type"], "circle");
        assert_eq!(json["radius_m"], 3.0);
        let back: Geometry = serde_json::from_value(json).unwrap();
        assert_eq!(back, circle);
    }
}
