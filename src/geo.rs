use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `[lon, lat]` in degrees.
pub type Coord = [f64; 2];

/// A closed ring of coordinates; ring 0 of a polygon is the outer boundary,
/// the remaining rings are holes.
pub type Ring = Vec<Coord>;

/// Substitute for a zero-height edge in the ray-casting intersection formula.
const EDGE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Axis-aligned geographic box. `west > east` means the box crosses the
/// antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// An accumulator that contains nothing; the first `extend` defines it.
    pub fn empty() -> Self {
        Self {
            south: f64::INFINITY,
            west: f64::INFINITY,
            north: f64::NEG_INFINITY,
            east: f64::NEG_INFINITY,
        }
    }

    /// Box spanning two corners given in any order.
    pub fn from_corners(a: LatLng, b: LatLng) -> Self {
        Self {
            south: a.lat.min(b.lat),
            west: a.lng.min(b.lng),
            north: a.lat.max(b.lat),
            east: a.lng.max(b.lng),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.south <= self.north && self.west.is_finite() && self.east.is_finite())
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    pub fn extend(&mut self, lon: f64, lat: f64) {
        self.south = self.south.min(lat);
        self.north = self.north.max(lat);
        self.west = self.west.min(lon);
        self.east = self.east.max(lon);
    }

    pub fn extend_bounds(&mut self, other: &GeoBounds) {
        if other.is_empty() {
            return;
        }
        self.extend(other.west, other.south);
        self.extend(other.east, other.north);
    }

    pub fn contains(&self, point: LatLng) -> bool {
        if point.lat < self.south || point.lat > self.north {
            return false;
        }
        if self.crosses_antimeridian() {
            point.lng >= self.west || point.lng <= self.east
        } else {
            point.lng >= self.west && point.lng <= self.east
        }
    }

    /// Same box moved by `degrees` of longitude.
    pub fn shifted(&self, degrees: f64) -> Self {
        Self {
            west: self.west + degrees,
            east: self.east + degrees,
            ..*self
        }
    }

    pub fn center(&self) -> LatLng {
        LatLng::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }
}

/// GeoJSON geometry, reduced to 2D coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    LineString(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    /// Parses a GeoJSON geometry object. Positions with altitude keep only
    /// `[lon, lat]`; anything malformed yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let kind = value.get("type")?.as_str()?;
        if kind == "GeometryCollection" {
            let members = value.get("geometries")?.as_array()?;
            return Some(Geometry::GeometryCollection(
                members.iter().filter_map(Geometry::from_value).collect(),
            ));
        }

        let coords = value.get("coordinates")?;
        let geometry = match kind {
            "Point" => Geometry::Point(parse_coord(coords)?),
            "MultiPoint" => Geometry::MultiPoint(parse_coords(coords)?),
            "LineString" => Geometry::LineString(parse_coords(coords)?),
            "MultiLineString" => Geometry::MultiLineString(parse_rings(coords)?),
            "Polygon" => Geometry::Polygon(parse_rings(coords)?),
            "MultiPolygon" => Geometry::MultiPolygon(
                coords
                    .as_array()?
                    .iter()
                    .map(parse_rings)
                    .collect::<Option<Vec<_>>>()?,
            ),
            _ => return None,
        };
        Some(geometry)
    }

    pub fn is_polygonal(&self) -> bool {
        matches!(self, Geometry::Polygon(_) | Geometry::MultiPolygon(_))
    }

    /// Polygon parts as ring lists. Non-polygonal geometries have none.
    pub fn polygons(&self) -> Vec<&[Ring]> {
        match self {
            Geometry::Polygon(rings) => vec![rings.as_slice()],
            Geometry::MultiPolygon(polys) => polys.iter().map(|p| p.as_slice()).collect(),
            _ => Vec::new(),
        }
    }

    /// Outer ring of every polygon part.
    pub fn outer_rings(&self) -> impl Iterator<Item = &Ring> {
        self.polygons().into_iter().filter_map(|rings| rings.first())
    }
}

fn parse_coord(value: &Value) -> Option<Coord> {
    let arr = value.as_array()?;
    let lon = arr.first()?.as_f64()?;
    let lat = arr.get(1)?.as_f64()?;
    Some([lon, lat])
}

fn parse_coords(value: &Value) -> Option<Vec<Coord>> {
    value.as_array()?.iter().map(parse_coord).collect()
}

fn parse_rings(value: &Value) -> Option<Vec<Vec<Coord>>> {
    value.as_array()?.iter().map(parse_coords).collect()
}

/// Ray-casting point-in-ring test.
fn point_in_ring(lon: f64, lat: f64, ring: &[Coord]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > lat) != (yj > lat) {
            let mut dy = yj - yi;
            if dy == 0.0 {
                dy = EDGE_EPSILON;
            }
            if lon < (xj - xi) * (lat - yi) / dy + xi {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Check if a point is inside a polygon (outer ring minus holes).
pub fn point_in_polygon(point: LatLng, rings: &[Ring]) -> bool {
    let Some(outer) = rings.first() else {
        return false;
    };
    if !point_in_ring(point.lng, point.lat, outer) {
        return false;
    }
    !rings[1..]
        .iter()
        .any(|hole| point_in_ring(point.lng, point.lat, hole))
}

/// True if any polygon part of `geometry` contains `point`.
pub fn geometry_contains(geometry: &Geometry, point: LatLng) -> bool {
    geometry
        .polygons()
        .into_iter()
        .any(|rings| point_in_polygon(point, rings))
}

/// Bounding box of a ring's vertices, `None` for an empty ring.
pub fn ring_bounds(ring: &[Coord]) -> Option<GeoBounds> {
    let mut bounds = GeoBounds::empty();
    for &[lon, lat] in ring {
        bounds.extend(lon, lat);
    }
    (!bounds.is_empty()).then_some(bounds)
}

/// Does the ring's bounding box overlap `view`? A view with `west > east`
/// is treated as the two ranges `[west, 180]` and `[-180, east]`.
pub fn bounding_box_intersects(ring: &[Coord], view: &GeoBounds) -> bool {
    let Some(b) = ring_bounds(ring) else {
        return false;
    };
    if b.north < view.south || b.south > view.north {
        return false;
    }
    let overlaps = |west: f64, east: f64| b.east >= west && b.west <= east;
    if view.crosses_antimeridian() {
        overlaps(view.west, 180.0) || overlaps(-180.0, view.east)
    } else {
        overlaps(view.west, view.east)
    }
}

/// Unweighted mean of the outer ring's vertices (first polygon only for a
/// MultiPolygon). This is not an area centroid and may fall outside concave
/// shapes; search targets and labels depend on it staying this way.
pub fn centroid(geometry: &Geometry) -> Option<LatLng> {
    let ring = match geometry {
        Geometry::Polygon(rings) => rings.first()?,
        Geometry::MultiPolygon(polys) => polys.first()?.first()?,
        _ => return None,
    };
    if ring.is_empty() {
        return None;
    }
    let (sum_lon, sum_lat) = ring
        .iter()
        .fold((0.0, 0.0), |(sx, sy), [lon, lat]| (sx + lon, sy + lat));
    let n = ring.len() as f64;
    let c = LatLng::new(sum_lat / n, sum_lon / n);
    c.is_finite().then_some(c)
}

/// Extends `bounds` with every vertex of `geometry`. Returns whether any
/// vertex was found.
pub fn accumulate_bounds(bounds: &mut GeoBounds, geometry: &Geometry) -> bool {
    fn visit(bounds: &mut GeoBounds, coords: &[Coord]) -> bool {
        let mut found = false;
        for &[lon, lat] in coords {
            if lon.is_finite() && lat.is_finite() {
                bounds.extend(lon, lat);
                found = true;
            }
        }
        found
    }

    match geometry {
        Geometry::Point(c) => visit(bounds, std::slice::from_ref(c)),
        Geometry::MultiPoint(coords) | Geometry::LineString(coords) => visit(bounds, coords),
        Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => lines
            .iter()
            .fold(false, |found, line| visit(bounds, line) || found),
        Geometry::MultiPolygon(polys) => polys.iter().fold(false, |found, rings| {
            rings
                .iter()
                .fold(false, |f, ring| visit(bounds, ring) || f)
                || found
        }),
        Geometry::GeometryCollection(members) => members
            .iter()
            .fold(false, |found, g| accumulate_bounds(bounds, g) || found),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square(west: f64, south: f64, east: f64, north: f64) -> Ring {
        vec![
            [west, south],
            [east, south],
            [east, north],
            [west, north],
            [west, south],
        ]
    }

    #[test]
    fn point_inside_hole_is_not_contained() {
        let rings = vec![square(0.0, 0.0, 10.0, 10.0), square(4.0, 4.0, 6.0, 6.0)];
        assert!(point_in_polygon(LatLng::new(2.0, 2.0), &rings));
        assert!(!point_in_polygon(LatLng::new(5.0, 5.0), &rings));
        assert!(!point_in_polygon(LatLng::new(11.0, 5.0), &rings));
    }

    #[test]
    fn vertex_on_horizontal_ray_is_stable() {
        // Diamond whose left and right vertices sit on lat = 5.
        let ring = vec![[5.0, 0.0], [10.0, 5.0], [5.0, 10.0], [0.0, 5.0], [5.0, 0.0]];
        assert!(point_in_polygon(LatLng::new(5.0, 5.0), &[ring.clone()]));
        assert!(!point_in_polygon(LatLng::new(5.0, 12.0), &[ring]));
    }

    #[test]
    fn degenerate_rings_never_contain() {
        assert!(!point_in_polygon(LatLng::new(0.0, 0.0), &[]));
        assert!(!point_in_polygon(
            LatLng::new(0.0, 0.0),
            &[vec![[0.0, 0.0], [1.0, 1.0]]]
        ));
    }

    #[test]
    fn bbox_intersection_across_antimeridian() {
        let view = GeoBounds::new(-10.0, 170.0, 10.0, -170.0);
        assert!(bounding_box_intersects(&square(175.0, -1.0, 176.0, 1.0), &view));
        assert!(bounding_box_intersects(&square(-176.0, -1.0, -175.0, 1.0), &view));
        assert!(!bounding_box_intersects(&square(0.0, -1.0, 1.0, 1.0), &view));
        assert!(!bounding_box_intersects(&square(175.0, 20.0, 176.0, 21.0), &view));
    }

    #[test]
    fn bbox_intersection_plain() {
        let view = GeoBounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(bounding_box_intersects(&square(9.0, 9.0, 12.0, 12.0), &view));
        assert!(!bounding_box_intersects(&square(11.0, 0.0, 12.0, 1.0), &view));
        assert!(!bounding_box_intersects(&[], &view));
    }

    #[test]
    fn centroid_is_vertex_mean_of_first_outer_ring() {
        let poly = Geometry::Polygon(vec![vec![[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]]]);
        assert_eq!(centroid(&poly), Some(LatLng::new(1.0, 2.0)));

        let multi = Geometry::MultiPolygon(vec![
            vec![vec![[10.0, 10.0], [12.0, 10.0], [12.0, 12.0], [10.0, 12.0]]],
            vec![square(100.0, 0.0, 200.0, 50.0)],
        ]);
        assert_eq!(centroid(&multi), Some(LatLng::new(11.0, 11.0)));
    }

    #[test]
    fn centroid_of_unsupported_or_empty_is_none() {
        assert_eq!(centroid(&Geometry::Point([1.0, 2.0])), None);
        assert_eq!(centroid(&Geometry::Polygon(vec![])), None);
        assert_eq!(centroid(&Geometry::MultiPolygon(vec![vec![vec![]]])), None);
    }

    #[test]
    fn accumulate_walks_nested_collections() {
        let g = Geometry::from_value(&json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [1.0, 2.0, 30.0]},
                {"type": "LineString", "coordinates": [[-5.0, 0.0], [3.0, 8.0]]},
                {"type": "MultiPolygon", "coordinates": [[[[0.0, -4.0], [1.0, -4.0], [1.0, -3.0]]]]}
            ]
        }))
        .unwrap();
        let mut b = GeoBounds::empty();
        assert!(accumulate_bounds(&mut b, &g));
        assert_eq!(b, GeoBounds::new(-4.0, -5.0, 8.0, 3.0));
    }

    #[test]
    fn accumulate_empty_geometry_reports_nothing() {
        let mut b = GeoBounds::empty();
        assert!(!accumulate_bounds(&mut b, &Geometry::GeometryCollection(vec![])));
        assert!(!accumulate_bounds(&mut b, &Geometry::Polygon(vec![vec![]])));
        assert!(b.is_empty());
    }

    #[test]
    fn parse_rejects_unknown_and_malformed() {
        assert!(Geometry::from_value(&json!({"type": "Circle", "coordinates": [0, 0]})).is_none());
        assert!(Geometry::from_value(&json!({"type": "Polygon", "coordinates": [[["a", 1]]]})).is_none());
        assert!(Geometry::from_value(&json!({"type": "Polygon"})).is_none());
    }

    #[test]
    fn contains_handles_crossing_box() {
        let b = GeoBounds::new(-1.0, 179.0, 1.0, -179.0);
        assert!(b.contains(LatLng::new(0.0, 179.5)));
        assert!(b.contains(LatLng::new(0.0, -179.5)));
        assert!(!b.contains(LatLng::new(0.0, 0.0)));
    }
}
