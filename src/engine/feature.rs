//! Located features returned by layer queries
//!
//! This module provides the `GeoFeature` struct for storing a feature's
//! geometry and attributes with a precomputed callout anchor point.

use crate::engine::{EngineError, Result};
use geo::{Centroid, Geometry, LineString, MultiLineString, Point, Polygon};
use serde::Deserialize;

/// A geo-located feature: geometry in WGS84 lon/lat plus its attributes
#[derive(Clone, Debug)]
pub struct GeoFeature {
    /// Feature geometry in WGS84 (x = lon, y = lat)
    geometry: Geometry<f64>,
    /// Precomputed anchor for callout placement
    anchor: Point<f64>,
    /// Raw attribute map as returned by the service
    attributes: serde_json::Map<String, serde_json::Value>,
    /// Display name of the layer this feature came from
    layer_name: String,
}

impl GeoFeature {
    /// Create a new feature, computing the callout anchor from the geometry.
    ///
    /// Returns an error if the geometry has no coordinates or a non-finite
    /// anchor (the callout could not be placed anywhere).
    pub fn new(
        geometry: Geometry<f64>,
        attributes: serde_json::Map<String, serde_json::Value>,
        layer_name: impl Into<String>,
    ) -> Result<Self> {
        let anchor = geometry
            .centroid()
            .ok_or_else(|| EngineError::InvalidGeometry("geometry has no coordinates".into()))?;

        if !anchor.x().is_finite() || !anchor.y().is_finite() {
            return Err(EngineError::InvalidGeometry(format!(
                "non-finite anchor ({}, {})",
                anchor.x(),
                anchor.y()
            )));
        }

        Ok(GeoFeature {
            geometry,
            anchor,
            attributes,
            layer_name: layer_name.into(),
        })
    }

    /// Geometry in WGS84 lon/lat
    #[inline]
    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    /// Anchor point for callout placement (x = lon, y = lat)
    #[inline]
    pub fn anchor(&self) -> Point<f64> {
        self.anchor
    }

    /// All attributes as returned by the service
    #[inline]
    pub fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.attributes
    }

    /// Look up a single attribute by field name
    #[inline]
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Display name of the source layer
    #[inline]
    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }
}

/// Geometry as encoded on the wire: a point (`x`/`y`), a polyline
/// (`paths`), or a polygon (`rings`). Exactly one family of fields is
/// expected to be present.
#[derive(Debug, Deserialize)]
pub(crate) struct WireGeometry {
    x: Option<f64>,
    y: Option<f64>,
    paths: Option<Vec<Vec<[f64; 2]>>>,
    rings: Option<Vec<Vec<[f64; 2]>>>,
}

impl WireGeometry {
    /// Convert into a `geo` geometry, in the order the wire format is
    /// checked by the services themselves: point, then polyline, then
    /// polygon.
    pub(crate) fn into_geometry(self) -> Result<Geometry<f64>> {
        if let (Some(x), Some(y)) = (self.x, self.y) {
            return Ok(Geometry::Point(Point::new(x, y)));
        }

        if let Some(paths) = self.paths {
            let lines: Vec<LineString<f64>> = paths
                .into_iter()
                .map(|path| LineString::from(path.into_iter().map(|[x, y]| (x, y)).collect::<Vec<_>>()))
                .collect();
            if lines.iter().all(|l| l.0.is_empty()) {
                return Err(EngineError::InvalidGeometry("polyline with no points".into()));
            }
            return Ok(Geometry::MultiLineString(MultiLineString::new(lines)));
        }

        if let Some(mut rings) = self.rings {
            if rings.is_empty() || rings[0].is_empty() {
                return Err(EngineError::InvalidGeometry("polygon with no rings".into()));
            }
            let exterior = LineString::from(
                rings
                    .remove(0)
                    .into_iter()
                    .map(|[x, y]| (x, y))
                    .collect::<Vec<_>>(),
            );
            let interiors: Vec<LineString<f64>> = rings
                .into_iter()
                .map(|ring| LineString::from(ring.into_iter().map(|[x, y]| (x, y)).collect::<Vec<_>>()))
                .collect();
            return Ok(Geometry::Polygon(Polygon::new(exterior, interiors)));
        }

        Err(EngineError::InvalidGeometry(
            "geometry object carries neither point, paths nor rings".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn point_feature_anchor_is_the_point() {
        let wire: WireGeometry = serde_json::from_str(r#"{"x": -0.1278, "y": 51.5074}"#).unwrap();
        let feature = GeoFeature::new(
            wire.into_geometry().unwrap(),
            attrs(&[("NAME", "London")]),
            "Cities",
        )
        .unwrap();

        let anchor = feature.anchor();
        assert!((anchor.x() - -0.1278).abs() < 1e-9);
        assert!((anchor.y() - 51.5074).abs() < 1e-9);
        assert_eq!(feature.layer_name(), "Cities");
        assert_eq!(
            feature.attribute("NAME").and_then(|v| v.as_str()),
            Some("London")
        );
    }

    #[test]
    fn polyline_feature_has_finite_anchor() {
        let wire: WireGeometry =
            serde_json::from_str(r#"{"paths": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0]]]}"#).unwrap();
        let feature =
            GeoFeature::new(wire.into_geometry().unwrap(), attrs(&[]), "Roads").unwrap();

        let anchor = feature.anchor();
        assert!(anchor.x().is_finite() && anchor.y().is_finite());
        assert!(anchor.x() >= 0.0 && anchor.x() <= 2.0);
    }

    #[test]
    fn polygon_feature_anchor_is_inside_bbox() {
        let wire: WireGeometry = serde_json::from_str(
            r#"{"rings": [[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]]]}"#,
        )
        .unwrap();
        let feature =
            GeoFeature::new(wire.into_geometry().unwrap(), attrs(&[]), "Parcels").unwrap();

        let anchor = feature.anchor();
        assert!((anchor.x() - 2.0).abs() < 1e-9);
        assert!((anchor.y() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn empty_geometry_is_rejected() {
        let wire: WireGeometry = serde_json::from_str(r#"{}"#).unwrap();
        assert!(wire.into_geometry().is_err());

        let wire: WireGeometry = serde_json::from_str(r#"{"rings": []}"#).unwrap();
        assert!(wire.into_geometry().is_err());
    }
}
