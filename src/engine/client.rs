//! HTTP client for the remote map services
//!
//! Two operations: fetching the web map document, and identifying features
//! at a point across the document's operational layers. Identify issues one
//! point-plus-distance feature query per planned layer, in document order,
//! and answers token challenges through the auth context with a single
//! retry. The layer budget counts layers, not requests.

use crate::engine::feature::WireGeometry;
use crate::engine::webmap::MapLayer;
use crate::engine::{
    AuthContext, EngineError, GeoFeature, IdentifyParameters, IdentifyResult, Popup, Result,
    WebMap,
};
use geo::Point;
use serde::Deserialize;
use std::sync::Arc;

/// Service error codes that mean "token required" or "token expired"
const TOKEN_CHALLENGE_CODES: &[i64] = &[498, 499];

/// Client half of the remote map engine interface
pub struct MapServiceClient {
    http: reqwest::Client,
    auth: Arc<AuthContext>,
}

impl MapServiceClient {
    pub fn new(auth: Arc<AuthContext>) -> Self {
        MapServiceClient {
            http: reqwest::Client::new(),
            auth,
        }
    }

    /// Fetch and parse the web map document from its source URL
    pub async fn fetch_webmap(&self, url: &str) -> Result<WebMap> {
        tracing::info!("loading web map from {url}");

        let text = self
            .http
            .get(url)
            .query(&[("f", "json")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let webmap = WebMap::from_json(&text)?;
        tracing::info!(
            "web map \"{}\" loaded with {} operational layers",
            webmap.title(),
            webmap.layers().len()
        );
        Ok(webmap)
    }

    /// Identify features at `position` (WGS84 lon/lat) across the web map's
    /// operational layers, searching `tolerance_m` meters around the point.
    ///
    /// Layers are queried in document order up to the parameter budget.
    /// Group layers contribute an empty parent result with one nested
    /// result per queried sub-layer. Any failing query fails the whole run.
    pub async fn identify_layers(
        &self,
        webmap: &WebMap,
        position: Point<f64>,
        tolerance_m: f64,
        params: &IdentifyParameters,
    ) -> Result<Vec<IdentifyResult>> {
        let mut results = Vec::new();
        for entry in plan_identify(webmap, params) {
            match entry {
                PlanEntry::Single(layer) => {
                    results.push(self.identify_layer(layer, position, tolerance_m).await?);
                }
                PlanEntry::Group(group, sublayers) => {
                    let mut sublayer_results = Vec::new();
                    for sublayer in sublayers {
                        sublayer_results
                            .push(self.identify_layer(sublayer, position, tolerance_m).await?);
                    }
                    results.push(
                        IdentifyResult::new(group.layer_ref())
                            .with_sublayer_results(sublayer_results),
                    );
                }
            }
        }
        Ok(results)
    }

    /// Query one layer and wrap the outcome. Layers exposing a popup
    /// definition get their popups pre-resolved; others carry raw features.
    async fn identify_layer(
        &self,
        layer: &MapLayer,
        position: Point<f64>,
        tolerance_m: f64,
    ) -> Result<IdentifyResult> {
        let Some(url) = layer.url.as_deref() else {
            return Ok(IdentifyResult::new(layer.layer_ref()));
        };

        let features = self
            .query_features(url, &layer.title, position, tolerance_m)
            .await?;
        tracing::debug!("layer \"{}\": {} features", layer.title, features.len());

        let result = IdentifyResult::new(layer.layer_ref());
        Ok(match &layer.popup_definition {
            Some(definition) => result.with_popups(
                features
                    .into_iter()
                    .map(|feature| Popup::new(feature, definition.clone()))
                    .collect(),
            ),
            None => result.with_features(features),
        })
    }

    /// One feature query with a single token-challenge retry
    async fn query_features(
        &self,
        url: &str,
        layer_name: &str,
        position: Point<f64>,
        tolerance_m: f64,
    ) -> Result<Vec<GeoFeature>> {
        match self
            .query_once(url, layer_name, position, tolerance_m, None)
            .await?
        {
            QueryOutcome::Features(features) => Ok(features),
            QueryOutcome::TokenRequired(code) => {
                tracing::debug!("layer query rejected with code {code}, acquiring token");
                let token = self.auth.token_for(&self.http, url).await?;
                match self
                    .query_once(url, layer_name, position, tolerance_m, Some(&token))
                    .await?
                {
                    QueryOutcome::Features(features) => Ok(features),
                    QueryOutcome::TokenRequired(code) => {
                        // The cached token was stale or refused; drop it so
                        // the next interaction starts a fresh handshake.
                        self.auth.invalidate(url);
                        Err(EngineError::Service {
                            code,
                            message: "token rejected by service".to_string(),
                        })
                    }
                }
            }
        }
    }

    async fn query_once(
        &self,
        url: &str,
        layer_name: &str,
        position: Point<f64>,
        tolerance_m: f64,
        token: Option<&str>,
    ) -> Result<QueryOutcome> {
        let geometry = format!(r#"{{"x":{},"y":{}}}"#, position.x(), position.y());
        let distance = tolerance_m.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("f", "json"),
            ("geometry", &geometry),
            ("geometryType", "esriGeometryPoint"),
            ("inSR", "4326"),
            ("outSR", "4326"),
            ("distance", &distance),
            ("units", "esriSRUnit_Meter"),
            ("outFields", "*"),
            ("returnGeometry", "true"),
        ];
        if let Some(token) = token {
            query.push(("token", token));
        }

        let response = self
            .http
            .get(format!("{url}/query"))
            .query(&query)
            .send()
            .await?;

        // Token challenges arrive either as HTTP auth failures or as a
        // 200 response carrying an error object.
        if matches!(response.status().as_u16(), 401 | 403) {
            return Ok(QueryOutcome::TokenRequired(response.status().as_u16() as i64));
        }

        let text = response.error_for_status()?.text().await?;
        parse_query_response(&text, layer_name)
    }
}

#[derive(Debug)]
enum QueryOutcome {
    Features(Vec<GeoFeature>),
    TokenRequired(i64),
}

#[derive(Debug, Deserialize)]
struct WireQueryResponse {
    #[serde(default)]
    features: Vec<WireFeature>,
    error: Option<WireServiceError>,
}

#[derive(Debug, Deserialize)]
struct WireFeature {
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
    geometry: Option<WireGeometry>,
}

#[derive(Debug, Deserialize)]
struct WireServiceError {
    code: i64,
    message: Option<String>,
}

/// Parse one feature-query response body
fn parse_query_response(text: &str, layer_name: &str) -> Result<QueryOutcome> {
    let wire: WireQueryResponse = serde_json::from_str(text)?;

    if let Some(error) = wire.error {
        if TOKEN_CHALLENGE_CODES.contains(&error.code) {
            return Ok(QueryOutcome::TokenRequired(error.code));
        }
        return Err(EngineError::Service {
            code: error.code,
            message: error.message.unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    let mut features = Vec::new();
    for feature in wire.features {
        let Some(geometry) = feature.geometry else {
            tracing::warn!("skipping feature without geometry in layer \"{layer_name}\"");
            continue;
        };
        features.push(GeoFeature::new(
            geometry.into_geometry()?,
            feature.attributes,
            layer_name,
        )?);
    }
    Ok(QueryOutcome::Features(features))
}

enum PlanEntry<'a> {
    Single(&'a MapLayer),
    Group(&'a MapLayer, Vec<&'a MapLayer>),
}

/// Select the layers one identify run will query, in document order.
///
/// Invisible layers are skipped. Top-level layers flagged not-identifiable
/// are always skipped; not-identifiable sub-layers are skipped unless the
/// parameters opt into them. The budget counts queried layers (sub-layers
/// included), not documents entries.
fn plan_identify<'a>(webmap: &'a WebMap, params: &IdentifyParameters) -> Vec<PlanEntry<'a>> {
    let mut plan = Vec::new();
    let mut budget = params.maximum_layers;

    for layer in webmap.layers() {
        if budget == 0 {
            break;
        }
        if !layer.visible {
            continue;
        }

        if layer.is_group() {
            let mut sublayers = Vec::new();
            for sublayer in &layer.sublayers {
                if budget == 0 {
                    break;
                }
                if !sublayer.visible {
                    continue;
                }
                if !sublayer.identifiable && !params.include_unidentifiable_sublayers {
                    continue;
                }
                sublayers.push(sublayer);
                budget -= 1;
            }
            if !sublayers.is_empty() {
                plan.push(PlanEntry::Group(layer, sublayers));
            }
        } else {
            if !layer.identifiable {
                continue;
            }
            plan.push(PlanEntry::Single(layer));
            budget -= 1;
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_response_parses_features() {
        let text = r#"{
            "features": [
                {"attributes": {"NAME": "Lisbon"}, "geometry": {"x": -9.14, "y": 38.72}},
                {"attributes": {"NAME": "nowhere"}}
            ]
        }"#;
        let QueryOutcome::Features(features) = parse_query_response(text, "Cities").unwrap()
        else {
            panic!("expected features");
        };

        // The geometry-less feature is skipped, not fatal
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].layer_name(), "Cities");
        assert_eq!(
            features[0].attribute("NAME").and_then(|v| v.as_str()),
            Some("Lisbon")
        );
    }

    #[test]
    fn token_challenge_codes_are_recognized() {
        let text = r#"{"error": {"code": 499, "message": "Token Required"}}"#;
        assert!(matches!(
            parse_query_response(text, "Cities").unwrap(),
            QueryOutcome::TokenRequired(499)
        ));
    }

    #[test]
    fn other_service_errors_propagate() {
        let text = r#"{"error": {"code": 400, "message": "Invalid query"}}"#;
        let err = parse_query_response(text, "Cities").unwrap_err();
        assert_eq!(err.kind(), "ServiceError");
        assert!(err.to_string().contains("Invalid query"));
    }

    fn webmap(document: &str) -> WebMap {
        WebMap::from_json(document).unwrap()
    }

    const PLAN_DOCUMENT: &str = r#"{
        "operationalLayers": [
            {"id": "a", "title": "A", "url": "https://x/rest/services/A/FeatureServer/0"},
            {"id": "hidden", "title": "H", "visibility": false,
             "url": "https://x/rest/services/H/FeatureServer/0"},
            {"id": "g", "title": "G", "layers": [
                {"id": "g1", "title": "G1", "url": "https://x/rest/services/G1/FeatureServer/0"},
                {"id": "g2", "title": "G2", "identifiable": false,
                 "url": "https://x/rest/services/G2/FeatureServer/0"},
                {"id": "g3", "title": "G3", "url": "https://x/rest/services/G3/FeatureServer/0"}
            ]},
            {"id": "b", "title": "B", "url": "https://x/rest/services/B/FeatureServer/0"}
        ]
    }"#;

    #[test]
    fn plan_respects_budget_order_and_flags() {
        let webmap = webmap(PLAN_DOCUMENT);
        let params = IdentifyParameters {
            maximum_layers: 3,
            ..Default::default()
        };
        let plan = plan_identify(&webmap, &params);

        // A, then the group (G1 + G3: G2 is not identifiable), budget spent
        assert_eq!(plan.len(), 2);
        assert!(matches!(&plan[0], PlanEntry::Single(l) if l.id == "a"));
        match &plan[1] {
            PlanEntry::Group(group, sublayers) => {
                assert_eq!(group.id, "g");
                let ids: Vec<&str> = sublayers.iter().map(|l| l.id.as_str()).collect();
                assert_eq!(ids, ["g1", "g3"]);
            }
            _ => panic!("expected a group entry"),
        }
    }

    #[test]
    fn plan_can_opt_into_unidentifiable_sublayers() {
        let webmap = webmap(PLAN_DOCUMENT);
        let params = IdentifyParameters {
            maximum_layers: 10,
            include_unidentifiable_sublayers: true,
            ..Default::default()
        };
        let plan = plan_identify(&webmap, &params);

        assert_eq!(plan.len(), 3);
        match &plan[1] {
            PlanEntry::Group(_, sublayers) => assert_eq!(sublayers.len(), 3),
            _ => panic!("expected a group entry"),
        }
        assert!(matches!(&plan[2], PlanEntry::Single(l) if l.id == "b"));
    }
}
