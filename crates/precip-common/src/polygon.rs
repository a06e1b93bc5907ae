//! Region polygons and point-in-polygon containment.
//!
//! A [`Region`] is a set of polygons (a GeoJSON `Polygon` or `MultiPolygon`)
//! in lon/lat order. [`Region::prepare`] turns it into a [`PreparedRegion`]
//! whose edges are precomputed for repeated containment queries over a
//! coordinate mesh.

use serde_json::Value;

use crate::bbox::BoundingBox;

/// The two operations the mask builder needs from a region geometry.
pub trait RegionGeometry: Send + Sync {
    /// Bounds as (min lon, min lat, max lon, max lat).
    fn bounds(&self) -> BoundingBox;

    /// Whether the point lies inside the geometry or on its boundary.
    fn contains(&self, lon: f64, lat: f64) -> bool;
}

/// A polygon: exterior ring followed by zero or more holes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub exterior: Vec<(f64, f64)>,
    pub holes: Vec<Vec<(f64, f64)>>,
}

impl Polygon {
    pub fn new(exterior: Vec<(f64, f64)>) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    pub fn with_hole(mut self, hole: Vec<(f64, f64)>) -> Self {
        self.holes.push(hole);
        self
    }

    /// Axis-aligned rectangle, handy for tests and bbox-style regions.
    pub fn rectangle(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self::new(vec![
            (min_lon, min_lat),
            (max_lon, min_lat),
            (max_lon, max_lat),
            (min_lon, max_lat),
            (min_lon, min_lat),
        ])
    }
}

/// A named-less collection of polygons treated as one area.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Region {
    pub polygons: Vec<Polygon>,
}

impl Region {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    /// Parse a GeoJSON geometry, Feature or FeatureCollection.
    ///
    /// Only `Polygon` and `MultiPolygon` geometries are accepted; features of
    /// a collection are merged into a single region.
    pub fn from_geojson(value: &Value) -> Result<Self, GeometryError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| GeometryError::MissingField("type".to_string()))?;

        match kind {
            "Polygon" => {
                let coords = coordinates(value)?;
                Ok(Self::new(vec![parse_polygon(coords)?]))
            }
            "MultiPolygon" => {
                let coords = coordinates(value)?
                    .as_array()
                    .ok_or_else(|| invalid("MultiPolygon coordinates must be an array"))?;
                let polygons = coords
                    .iter()
                    .map(parse_polygon)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::new(polygons))
            }
            "Feature" => {
                let geometry = value
                    .get("geometry")
                    .ok_or_else(|| GeometryError::MissingField("geometry".to_string()))?;
                Self::from_geojson(geometry)
            }
            "FeatureCollection" => {
                let features = value
                    .get("features")
                    .and_then(Value::as_array)
                    .ok_or_else(|| GeometryError::MissingField("features".to_string()))?;
                let mut polygons = Vec::new();
                for feature in features {
                    polygons.extend(Self::from_geojson(feature)?.polygons);
                }
                Ok(Self::new(polygons))
            }
            other => Err(GeometryError::UnsupportedType(other.to_string())),
        }
    }

    /// Precompute ring edges and bounds for repeated containment tests.
    pub fn prepare(&self) -> PreparedRegion {
        let polygons: Vec<PreparedPolygon> = self
            .polygons
            .iter()
            .map(PreparedPolygon::new)
            .filter(|p| !p.exterior.edges.is_empty())
            .collect();
        let bounds = polygons
            .iter()
            .fold(BoundingBox::empty(), |acc, p| acc.union(&p.exterior.bounds));
        PreparedRegion { polygons, bounds }
    }
}

fn coordinates(value: &Value) -> Result<&Value, GeometryError> {
    value
        .get("coordinates")
        .ok_or_else(|| GeometryError::MissingField("coordinates".to_string()))
}

fn invalid(msg: &str) -> GeometryError {
    GeometryError::InvalidCoordinates(msg.to_string())
}

fn parse_polygon(value: &Value) -> Result<Polygon, GeometryError> {
    let rings = value
        .as_array()
        .ok_or_else(|| invalid("polygon must be an array of rings"))?;
    let mut parsed = rings.iter().map(parse_ring);
    let exterior = match parsed.next() {
        Some(ring) => ring?,
        None => Vec::new(),
    };
    let holes = parsed.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon { exterior, holes })
}

fn parse_ring(value: &Value) -> Result<Vec<(f64, f64)>, GeometryError> {
    let positions = value
        .as_array()
        .ok_or_else(|| invalid("ring must be an array of positions"))?;
    positions
        .iter()
        .map(|pos| {
            let pair = pos
                .as_array()
                .filter(|p| p.len() >= 2)
                .ok_or_else(|| invalid("position must be [lon, lat]"))?;
            let lon = pair[0].as_f64().ok_or_else(|| invalid("longitude is not a number"))?;
            let lat = pair[1].as_f64().ok_or_else(|| invalid("latitude is not a number"))?;
            if !lon.is_finite() || !lat.is_finite() {
                return Err(invalid("coordinates must be finite"));
            }
            Ok((lon, lat))
        })
        .collect()
}

/// One ring edge with the inverse slope precomputed.
#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Edge {
    /// Whether the point lies on this segment, within a length-relative tolerance.
    fn touches(&self, x: f64, y: f64) -> bool {
        let (dx, dy) = (self.x1 - self.x0, self.y1 - self.y0);
        let cross = dx * (y - self.y0) - dy * (x - self.x0);
        let tolerance = ON_EDGE_EPSILON * dx.hypot(dy).max(1.0);
        cross.abs() <= tolerance
            && x >= self.x0.min(self.x1) - tolerance
            && x <= self.x0.max(self.x1) + tolerance
            && y >= self.y0.min(self.y1) - tolerance
            && y <= self.y0.max(self.y1) + tolerance
    }
}

const ON_EDGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
struct PreparedRing {
    edges: Vec<Edge>,
    bounds: BoundingBox,
}

impl PreparedRing {
    fn new(ring: &[(f64, f64)]) -> Self {
        let empty = Self {
            edges: Vec::new(),
            bounds: BoundingBox::empty(),
        };
        // fewer than three vertices, or collinear ones, enclose nothing
        if ring.len() < 3 || signed_area(ring).abs() <= f64::EPSILON {
            return empty;
        }

        let n = ring.len();
        let mut edges = Vec::with_capacity(n);
        let mut j = n - 1;
        for i in 0..n {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[j];
            edges.push(Edge { x0, y0, x1, y1 });
            j = i;
        }

        Self {
            edges,
            bounds: BoundingBox::from_points(ring),
        }
    }

    fn on_boundary(&self, lon: f64, lat: f64) -> bool {
        self.edges.iter().any(|e| e.touches(lon, lat))
    }

    /// Ray casting, preceded by bounding-box rejection. Boundary points are
    /// resolved by the callers.
    fn interior(&self, lon: f64, lat: f64) -> bool {
        if self.edges.is_empty() || !self.bounds.contains_point(lon, lat) {
            return false;
        }

        let mut inside = false;
        for e in &self.edges {
            // horizontal edges never cross a horizontal ray
            if (e.y0 > lat) != (e.y1 > lat) {
                let x_at = (e.x1 - e.x0) * (lat - e.y0) / (e.y1 - e.y0) + e.x0;
                if lon < x_at {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Interior or boundary.
    fn covers(&self, lon: f64, lat: f64) -> bool {
        if self.edges.is_empty() || !self.bounds.contains_point(lon, lat) {
            return false;
        }
        self.on_boundary(lon, lat) || self.interior(lon, lat)
    }

    /// Interior only.
    fn strictly_contains(&self, lon: f64, lat: f64) -> bool {
        self.interior(lon, lat) && !self.on_boundary(lon, lat)
    }
}

/// Shoelace area, positive for counter-clockwise rings.
fn signed_area(ring: &[(f64, f64)]) -> f64 {
    let n = ring.len();
    let mut twice = 0.0;
    for i in 0..n {
        let (x0, y0) = ring[i];
        let (x1, y1) = ring[(i + 1) % n];
        twice += x0 * y1 - x1 * y0;
    }
    twice / 2.0
}

#[derive(Debug, Clone)]
struct PreparedPolygon {
    exterior: PreparedRing,
    holes: Vec<PreparedRing>,
}

impl PreparedPolygon {
    fn new(polygon: &Polygon) -> Self {
        Self {
            exterior: PreparedRing::new(&polygon.exterior),
            holes: polygon.holes.iter().map(|h| PreparedRing::new(h)).collect(),
        }
    }

    fn contains(&self, lon: f64, lat: f64) -> bool {
        self.exterior.covers(lon, lat) && !self.holes.iter().any(|h| h.strictly_contains(lon, lat))
    }
}

/// A region ready for many containment queries.
#[derive(Debug, Clone)]
pub struct PreparedRegion {
    polygons: Vec<PreparedPolygon>,
    bounds: BoundingBox,
}

impl PreparedRegion {
    /// True if no polygon encloses any area.
    pub fn is_degenerate(&self) -> bool {
        self.polygons.is_empty()
    }
}

impl RegionGeometry for PreparedRegion {
    fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    fn contains(&self, lon: f64, lat: f64) -> bool {
        self.bounds.contains_point(lon, lat) && self.polygons.iter().any(|p| p.contains(lon, lat))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("Unsupported geometry type: {0}")]
    UnsupportedType(String),

    #[error("Missing GeoJSON field: {0}")]
    MissingField(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rectangle_contains() {
        let region = Region::new(vec![Polygon::rectangle(100.0, -10.0, 120.0, 5.0)]).prepare();
        assert!(region.contains(110.0, 0.0));
        assert!(!region.contains(95.0, 0.0));
        assert!(!region.contains(110.0, 6.0));
    }

    #[test]
    fn test_hole_excluded() {
        let poly = Polygon::rectangle(0.0, 0.0, 10.0, 10.0)
            .with_hole(Polygon::rectangle(4.0, 4.0, 6.0, 6.0).exterior);
        let region = Region::new(vec![poly]).prepare();
        assert!(region.contains(2.0, 2.0));
        assert!(!region.contains(5.0, 5.0));
    }

    #[test]
    fn test_boundary_points_are_inside() {
        let region = Region::new(vec![Polygon::rectangle(100.0, -10.0, 105.0, -5.0)]).prepare();
        for (lon, lat) in [
            (100.0, -10.0),
            (105.0, -10.0),
            (105.0, -5.0),
            (100.0, -5.0),
            (105.0, -7.0),
            (102.0, -5.0),
            (100.0, -7.5),
            (103.0, -10.0),
        ] {
            assert!(region.contains(lon, lat), "({lon}, {lat}) should be covered");
        }
        assert!(!region.contains(105.000001, -7.0));
        assert!(!region.contains(102.0, -4.999999));
    }

    #[test]
    fn test_hole_boundary_belongs_to_polygon() {
        let poly = Polygon::rectangle(0.0, 0.0, 10.0, 10.0)
            .with_hole(Polygon::rectangle(4.0, 4.0, 6.0, 6.0).exterior);
        let region = Region::new(vec![poly]).prepare();
        assert!(region.contains(4.0, 5.0));
        assert!(region.contains(6.0, 6.0));
        assert!(!region.contains(5.0, 5.0));
    }

    #[test]
    fn test_sloped_edge_boundary() {
        let tri = Polygon::new(vec![(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]);
        let region = Region::new(vec![tri]).prepare();
        assert!(region.contains(5.0, 5.0));
        assert!(!region.contains(5.1, 5.1));
    }

    #[test]
    fn test_collinear_ring_is_degenerate() {
        let line = Polygon::new(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (0.0, 0.0)]);
        let region = Region::new(vec![line]).prepare();
        assert!(region.is_degenerate());
        assert!(!region.contains(1.0, 1.0));
    }

    #[test]
    fn test_triangle() {
        let tri = Polygon::new(vec![(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]);
        let region = Region::new(vec![tri]).prepare();
        assert!(region.contains(2.0, 2.0));
        assert!(!region.contains(8.0, 8.0));
    }

    #[test]
    fn test_degenerate_contains_nothing() {
        let region = Region::new(vec![Polygon::new(vec![(0.0, 0.0), (1.0, 1.0)])]).prepare();
        assert!(region.is_degenerate());
        assert!(region.bounds().is_empty());
        assert!(!region.contains(0.5, 0.5));

        let empty = Region::default().prepare();
        assert!(empty.is_degenerate());
        assert!(!empty.contains(0.0, 0.0));
    }

    #[test]
    fn test_parse_geojson_polygon() {
        let value = json!({
            "type": "Polygon",
            "coordinates": [[[106.0, -7.0], [108.0, -7.0], [108.0, -6.0], [106.0, -6.0], [106.0, -7.0]]]
        });
        let region = Region::from_geojson(&value).unwrap();
        assert_eq!(region.polygons.len(), 1);
        assert_eq!(region.polygons[0].exterior.len(), 5);
        assert!(region.prepare().contains(107.0, -6.5));
    }

    #[test]
    fn test_parse_feature_collection() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                }},
                {"type": "Feature", "properties": {}, "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 5.0]]]]
                }}
            ]
        });
        let region = Region::from_geojson(&value).unwrap();
        assert_eq!(region.polygons.len(), 2);
        let prepared = region.prepare();
        assert_eq!(prepared.bounds(), BoundingBox::new(0.0, 0.0, 6.0, 6.0));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            Region::from_geojson(&json!({"type": "Point", "coordinates": [0.0, 0.0]})),
            Err(GeometryError::UnsupportedType(_))
        ));
        assert!(matches!(
            Region::from_geojson(&json!({"type": "Polygon"})),
            Err(GeometryError::MissingField(_))
        ));
        assert!(matches!(
            Region::from_geojson(&json!({"type": "Polygon", "coordinates": [[["a", 1.0]]]})),
            Err(GeometryError::InvalidCoordinates(_))
        ));
    }
}
