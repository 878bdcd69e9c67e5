//! Minimal GeoJSON model for region boundaries.
//!
//! GeoJSON stores positions as `[lon, lat(, alt)]`; everything handed to the
//! map surface is `[lat, lon]`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `[lat, lon]` in rendering order.
pub type LatLng = [f64; 2];
pub type Ring = Vec<LatLng>;

/// Raw GeoJSON position, `[lon, lat, ...]`.
pub type Position = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

/// Reorder one stored ring to `[lat, lon]`, dropping malformed positions.
pub fn swap_ring(ring: &[Position]) -> Ring {
    ring.iter()
        .filter(|p| p.len() >= 2)
        .map(|p| [p[1], p[0]])
        .collect()
}

impl Geometry {
    /// Polygon parts as lists of stored rings (outer first).
    fn parts(&self) -> Vec<&Vec<Vec<Position>>> {
        match self {
            Geometry::Polygon { coordinates } => vec![coordinates],
            Geometry::MultiPolygon { coordinates } => coordinates.iter().collect(),
            Geometry::Unsupported => Vec::new(),
        }
    }

    /// One outer ring per polygon part, in `[lat, lon]` order. Inner rings
    /// are not returned.
    pub fn outer_rings(&self) -> Vec<Ring> {
        self.parts()
            .into_iter()
            .filter_map(|rings| rings.first())
            .map(|outer| swap_ring(outer))
            .collect()
    }

    pub fn part_count(&self) -> usize {
        self.parts().len()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for rings in self.parts() {
            for ring in rings {
                for p in swap_ring(ring) {
                    match bounds.as_mut() {
                        Some(b) => b.extend(p),
                        None => bounds = Some(Bounds::from_point(p)),
                    }
                }
            }
        }
        bounds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn from_point(p: LatLng) -> Self {
        Self { south: p[0], west: p[1], north: p[0], east: p[1] }
    }

    pub fn extend(&mut self, p: LatLng) {
        self.south = self.south.min(p[0]);
        self.north = self.north.max(p[0]);
        self.west = self.west.min(p[1]);
        self.east = self.east.max(p[1]);
    }

    pub fn contains(&self, p: LatLng) -> bool {
        (self.south..=self.north).contains(&p[0]) && (self.west..=self.east).contains(&p[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(lon0: f64, lat0: f64, size: f64) -> Vec<Position> {
        vec![
            vec![lon0, lat0],
            vec![lon0 + size, lat0],
            vec![lon0 + size, lat0 + size],
            vec![lon0, lat0 + size],
            vec![lon0, lat0],
        ]
    }

    #[test]
    fn parses_polygon_and_multipolygon() {
        let text = r#"{"features":[
            {"type":"Feature","properties":{"name":"A"},"geometry":{"type":"Polygon","coordinates":[[[77,12],[78,12],[78,13],[77,12]]]}},
            {"type":"Feature","properties":null,"geometry":{"type":"MultiPolygon","coordinates":[[[[70,20],[71,20],[71,21],[70,20]]],[[[72,22],[73,22],[73,23],[72,22]]]]}},
            {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[1,2]}},
            {"type":"Feature","properties":{},"geometry":null}
        ]}"#;
        let fc: FeatureCollection = serde_json::from_str(text).unwrap();
        assert_eq!(fc.features.len(), 4);
        assert!(matches!(fc.features[0].geometry, Some(Geometry::Polygon { .. })));
        assert_eq!(fc.features[1].geometry.as_ref().unwrap().part_count(), 2);
        assert_eq!(fc.features[2].geometry, Some(Geometry::Unsupported));
        assert_eq!(fc.features[3].geometry, None);
    }

    #[test]
    fn outer_ring_drops_inner_rings_and_swaps() {
        let geom = Geometry::Polygon {
            coordinates: vec![square(70.0, 10.0, 4.0), square(71.0, 11.0, 1.0)],
        };
        let rings = geom.outer_rings();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0][1], [10.0, 74.0]);
    }

    #[test]
    fn bounds_cover_all_parts() {
        let geom = Geometry::MultiPolygon {
            coordinates: vec![vec![square(70.0, 10.0, 1.0)], vec![square(80.0, 30.0, 2.0)]],
        };
        let b = geom.bounds().unwrap();
        assert_eq!(b, Bounds { south: 10.0, west: 70.0, north: 32.0, east: 82.0 });
        assert!(b.contains([20.0, 75.0]));
        assert!(Geometry::Unsupported.bounds().is_none());
    }

    #[test]
    fn swap_skips_short_positions() {
        let ring = vec![vec![1.0, 2.0, 100.0], vec![3.0]];
        assert_eq!(swap_ring(&ring), vec![[2.0, 1.0]]);
    }
}
