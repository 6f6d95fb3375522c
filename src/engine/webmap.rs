//! Web map document parsing
//!
//! A web map is a declarative JSON document describing a basemap, an
//! ordered tree of operational layers (with per-layer service endpoints and
//! popup configuration), and an initial viewpoint. This module parses the
//! wire document into the in-memory model the rest of the application
//! consumes; unknown fields are ignored.

use crate::engine::popup::{FieldFormat, FieldInfo, PopupDefinition};
use crate::engine::{LayerRef, Result};
use geo::Point;
use serde::Deserialize;

/// Earth radius used by the Web Mercator projection, in meters
const MERCATOR_RADIUS_M: f64 = 6_378_137.0;

/// Parsed web map document
#[derive(Clone, Debug)]
pub struct WebMap {
    title: String,
    basemap_title: Option<String>,
    viewpoint: Option<Viewpoint>,
    layers: Vec<MapLayer>,
}

/// Initial camera position derived from the document's extent
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewpoint {
    /// Center in WGS84 (x = lon, y = lat)
    pub center: Point<f64>,
    /// Map zoom level estimated from the extent span
    pub zoom: f64,
}

/// One operational layer (or sub-layer of a group layer)
#[derive(Clone, Debug)]
pub struct MapLayer {
    pub id: String,
    pub title: String,
    /// Service endpoint; group layers have none of their own
    pub url: Option<String>,
    pub popup_definition: Option<PopupDefinition>,
    pub identifiable: bool,
    pub visible: bool,
    pub sublayers: Vec<MapLayer>,
}

impl MapLayer {
    /// Reference handed to identify results originating from this layer
    pub fn layer_ref(&self) -> LayerRef {
        let mut layer_ref = LayerRef::new(self.id.clone(), self.title.clone());
        if let Some(definition) = &self.popup_definition {
            layer_ref = layer_ref.with_popup_definition(definition.clone());
        }
        if !self.identifiable {
            layer_ref = layer_ref.not_identifiable();
        }
        layer_ref
    }

    /// True for group layers, which carry sub-layers instead of an endpoint
    pub fn is_group(&self) -> bool {
        !self.sublayers.is_empty()
    }
}

impl WebMap {
    /// Parse a web map document from its JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let wire: WireWebMap = serde_json::from_str(text)?;
        Ok(WebMap::from_wire(wire))
    }

    fn from_wire(wire: WireWebMap) -> Self {
        WebMap {
            title: wire.title.unwrap_or_else(|| "Web Map".to_string()),
            basemap_title: wire.base_map.and_then(|b| b.title),
            viewpoint: wire
                .initial_state
                .and_then(|s| s.viewpoint)
                .and_then(|v| v.target_geometry)
                .and_then(Viewpoint::from_envelope),
            layers: wire
                .operational_layers
                .into_iter()
                .map(MapLayer::from_wire)
                .collect(),
        }
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[inline]
    pub fn basemap_title(&self) -> Option<&str> {
        self.basemap_title.as_deref()
    }

    #[inline]
    pub fn viewpoint(&self) -> Option<Viewpoint> {
        self.viewpoint
    }

    /// Operational layers in document order
    #[inline]
    pub fn layers(&self) -> &[MapLayer] {
        &self.layers
    }
}

impl MapLayer {
    fn from_wire(wire: WireLayer) -> Self {
        MapLayer {
            id: wire.id.unwrap_or_default(),
            title: wire.title.unwrap_or_default(),
            url: wire.url,
            popup_definition: wire.popup_info.map(PopupDefinition::from_wire),
            identifiable: wire.identifiable,
            visible: wire.visibility,
            sublayers: wire.layers.into_iter().map(MapLayer::from_wire).collect(),
        }
    }
}

impl PopupDefinition {
    fn from_wire(wire: WirePopupInfo) -> Self {
        PopupDefinition {
            title: wire.title.unwrap_or_default(),
            fields: wire
                .field_infos
                .into_iter()
                .map(|f| FieldInfo {
                    label: f.label.unwrap_or_else(|| f.field_name.clone()),
                    field_name: f.field_name,
                    visible: f.visible,
                    format: f.format.map(|fmt| FieldFormat {
                        places: fmt.places,
                        digit_separator: fmt.digit_separator,
                        date: fmt.date_format.is_some(),
                    }),
                })
                .collect(),
        }
    }
}

impl Viewpoint {
    /// Derive center and zoom from an extent envelope. Coordinates outside
    /// the WGS84 value range are treated as Web Mercator meters.
    fn from_envelope(envelope: WireEnvelope) -> Option<Self> {
        let is_mercator = envelope.xmin.abs() > 180.0
            || envelope.xmax.abs() > 180.0
            || envelope.ymin.abs() > 90.0
            || envelope.ymax.abs() > 90.0;

        let (min, max) = if is_mercator {
            (
                mercator_to_wgs84(envelope.xmin, envelope.ymin),
                mercator_to_wgs84(envelope.xmax, envelope.ymax),
            )
        } else {
            (
                Point::new(envelope.xmin, envelope.ymin),
                Point::new(envelope.xmax, envelope.ymax),
            )
        };

        let center = Point::new(
            (min.x() + max.x()) / 2.0,
            (min.y() + max.y()) / 2.0,
        );
        if !center.x().is_finite() || !center.y().is_finite() {
            return None;
        }

        let max_span = (max.x() - min.x()).abs().max((max.y() - min.y()).abs());
        let zoom = if max_span > 0.0 {
            ((4.0 * 360.0 / max_span).log2() - 0.5).clamp(1.0, 18.0)
        } else {
            12.0
        };

        Some(Viewpoint { center, zoom })
    }
}

/// Inverse Web Mercator projection, meters to WGS84 degrees
fn mercator_to_wgs84(x: f64, y: f64) -> Point<f64> {
    let lon = (x / MERCATOR_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / MERCATOR_RADIUS_M).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    Point::new(lon, lat)
}

// --- Wire structs -----------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireWebMap {
    title: Option<String>,
    #[serde(rename = "baseMap")]
    base_map: Option<WireBaseMap>,
    #[serde(rename = "initialState")]
    initial_state: Option<WireInitialState>,
    #[serde(rename = "operationalLayers", default)]
    operational_layers: Vec<WireLayer>,
}

#[derive(Debug, Deserialize)]
struct WireBaseMap {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireInitialState {
    viewpoint: Option<WireViewpoint>,
}

#[derive(Debug, Deserialize)]
struct WireViewpoint {
    #[serde(rename = "targetGeometry")]
    target_geometry: Option<WireEnvelope>,
}

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

#[derive(Debug, Deserialize)]
struct WireLayer {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    #[serde(default = "default_true")]
    visibility: bool,
    #[serde(default = "default_true")]
    identifiable: bool,
    #[serde(rename = "popupInfo")]
    popup_info: Option<WirePopupInfo>,
    #[serde(default)]
    layers: Vec<WireLayer>,
}

#[derive(Debug, Deserialize)]
struct WirePopupInfo {
    title: Option<String>,
    #[serde(rename = "fieldInfos", default)]
    field_infos: Vec<WireFieldInfo>,
}

#[derive(Debug, Deserialize)]
struct WireFieldInfo {
    #[serde(rename = "fieldName")]
    field_name: String,
    label: Option<String>,
    #[serde(default = "default_true")]
    visible: bool,
    format: Option<WireFieldFormat>,
}

#[derive(Debug, Deserialize)]
struct WireFieldFormat {
    places: Option<u8>,
    #[serde(rename = "digitSeparator", default)]
    digit_separator: bool,
    #[serde(rename = "dateFormat")]
    date_format: Option<String>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "title": "Demo Map",
        "baseMap": {"title": "Topographic", "baseMapLayers": [{"ignored": true}]},
        "initialState": {
            "viewpoint": {
                "targetGeometry": {"xmin": -10.0, "ymin": 35.0, "xmax": 4.0, "ymax": 44.0}
            }
        },
        "operationalLayers": [
            {
                "id": "cities",
                "title": "Cities",
                "url": "https://example.com/arcgis/rest/services/Cities/FeatureServer/0",
                "popupInfo": {
                    "title": "{NAME}",
                    "fieldInfos": [
                        {"fieldName": "NAME", "label": "City"},
                        {"fieldName": "POP", "visible": false, "format": {"places": 0, "digitSeparator": true}},
                        {"fieldName": "FOUNDED", "format": {"dateFormat": "shortDate"}}
                    ]
                }
            },
            {
                "id": "infra",
                "title": "Infrastructure",
                "layers": [
                    {
                        "id": "infra-roads",
                        "title": "Roads",
                        "url": "https://example.com/arcgis/rest/services/Roads/FeatureServer/0"
                    },
                    {
                        "id": "infra-private",
                        "title": "Private",
                        "identifiable": false,
                        "url": "https://example.com/arcgis/rest/services/Private/FeatureServer/0"
                    }
                ]
            }
        ],
        "somethingUnknown": {"nested": [1, 2, 3]}
    }"#;

    #[test]
    fn parses_layer_tree_and_popup_definitions() {
        let webmap = WebMap::from_json(DOCUMENT).unwrap();

        assert_eq!(webmap.title(), "Demo Map");
        assert_eq!(webmap.basemap_title(), Some("Topographic"));
        assert_eq!(webmap.layers().len(), 2);

        let cities = &webmap.layers()[0];
        assert!(!cities.is_group());
        let definition = cities.popup_definition.as_ref().unwrap();
        assert_eq!(definition.title, "{NAME}");
        assert_eq!(definition.fields.len(), 3);
        assert_eq!(definition.fields[0].label, "City");
        assert!(!definition.fields[1].visible);
        assert!(definition.fields[1].format.as_ref().unwrap().digit_separator);
        assert!(definition.fields[2].format.as_ref().unwrap().date);

        let group = &webmap.layers()[1];
        assert!(group.is_group());
        assert!(group.url.is_none());
        assert_eq!(group.sublayers.len(), 2);
        assert!(group.sublayers[0].identifiable);
        assert!(!group.sublayers[1].identifiable);
    }

    #[test]
    fn viewpoint_centers_on_the_extent() {
        let webmap = WebMap::from_json(DOCUMENT).unwrap();
        let viewpoint = webmap.viewpoint().unwrap();

        assert!((viewpoint.center.x() - -3.0).abs() < 1e-9);
        assert!((viewpoint.center.y() - 39.5).abs() < 1e-9);
        assert!(viewpoint.zoom >= 1.0 && viewpoint.zoom <= 18.0);
    }

    #[test]
    fn mercator_extents_are_converted() {
        let document = r#"{
            "initialState": {
                "viewpoint": {
                    "targetGeometry": {
                        "xmin": -1113194.9, "ymin": 4300621.3,
                        "xmax": 445277.9, "ymax": 5465442.2
                    }
                }
            },
            "operationalLayers": []
        }"#;
        let webmap = WebMap::from_json(document).unwrap();
        let viewpoint = webmap.viewpoint().unwrap();

        assert!(viewpoint.center.x() > -180.0 && viewpoint.center.x() < 180.0);
        assert!(viewpoint.center.y() > -90.0 && viewpoint.center.y() < 90.0);
    }

    #[test]
    fn missing_sections_are_tolerated() {
        let webmap = WebMap::from_json(r#"{"operationalLayers": []}"#).unwrap();
        assert_eq!(webmap.title(), "Web Map");
        assert!(webmap.viewpoint().is_none());
        assert!(webmap.layers().is_empty());
    }

    #[test]
    fn layer_ref_carries_definition_and_flags() {
        let webmap = WebMap::from_json(DOCUMENT).unwrap();
        let cities_ref = webmap.layers()[0].layer_ref();
        assert!(cities_ref.popup_definition().is_some());
        assert!(cities_ref.identifiable());

        let private_ref = webmap.layers()[1].sublayers[1].layer_ref();
        assert!(private_ref.popup_definition().is_none());
        assert!(!private_ref.identifiable());
    }
}
