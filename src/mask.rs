//! Inverse-cutout mask: a world-covering polygon with the selected regions
//! carved out as holes, painted opaque so only the regions show through.

use serde::Serialize;

use crate::geometry::{Feature, Ring};

pub const WORLD_RING: [[f64; 2]; 4] = [[90.0, -180.0], [90.0, 180.0], [-90.0, 180.0], [-90.0, -180.0]];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskStyle {
    pub color: &'static str,
    pub fill_color: &'static str,
    pub fill_opacity: f64,
    pub stroke: bool,
}

pub const MASK_STYLE: MaskStyle = MaskStyle {
    color: "transparent",
    fill_color: "#ffffff",
    fill_opacity: 1.0,
    stroke: false,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub holes: Vec<Ring>,
}

impl Mask {
    /// Holes from each feature's polygon parts. Only each part's outer ring
    /// is used, so enclaves inside a region stay covered.
    pub fn from_features<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Self {
        let holes = features
            .into_iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(|g| g.outer_rings())
            .collect();
        Self { holes }
    }

    /// Rings in the order the polygon layer takes them: world first.
    pub fn rings(&self) -> Vec<Ring> {
        let mut rings = Vec::with_capacity(self.holes.len() + 1);
        rings.push(WORLD_RING.to_vec());
        rings.extend(self.holes.iter().cloned());
        rings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    fn tri(lon: f64, lat: f64) -> Vec<Vec<f64>> {
        vec![vec![lon, lat], vec![lon + 1.0, lat], vec![lon, lat + 1.0], vec![lon, lat]]
    }

    fn feature(geometry: Option<Geometry>) -> Feature {
        Feature { properties: None, geometry }
    }

    #[test]
    fn one_hole_per_polygon_part() {
        let features = vec![
            feature(Some(Geometry::Polygon { coordinates: vec![tri(70.0, 10.0), tri(70.2, 10.2)] })),
            feature(Some(Geometry::MultiPolygon {
                coordinates: vec![vec![tri(80.0, 20.0)], vec![tri(90.0, 25.0)]],
            })),
            feature(None),
            feature(Some(Geometry::Unsupported)),
        ];
        let mask = Mask::from_features(&features);
        assert_eq!(mask.holes.len(), 3);
        assert_eq!(mask.holes[0][0], [10.0, 70.0]);
        assert_eq!(mask.holes[2][0], [25.0, 90.0]);
    }

    #[test]
    fn world_ring_comes_first() {
        let mask = Mask::from_features(&[feature(Some(Geometry::Polygon { coordinates: vec![tri(1.0, 2.0)] }))]);
        let rings = mask.rings();
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0], WORLD_RING.to_vec());
    }

    #[test]
    fn style_serializes_for_leaflet() {
        let v = serde_json::to_value(MASK_STYLE).unwrap();
        assert_eq!(v["fillColor"], "#ffffff");
        assert_eq!(v["fillOpacity"], 1.0);
        assert_eq!(v["stroke"], false);
    }
}
