//! Client side of the remote map services.
//!
//! This module owns everything that talks to, or models data from, the
//! remote web map: the web map document, per-layer feature queries
//! ("identify"), popup definitions, and token-based authentication. The
//! map widget itself (tiles, pan/zoom, projection) lives in the `walkers`
//! crate; nothing here draws pixels.
//!
//! # Architecture
//!
//! - **[`WebMap`]**: parsed web map document with the operational layer tree
//! - **[`GeoFeature`]**: a located feature returned by a layer query
//! - **[`Popup`] / [`PopupManager`]**: display bundle and its evaluation
//! - **[`IdentifyResult`]**: per-layer identify outcome consumed by the resolver
//! - **[`MapServiceClient`]**: HTTP glue for document loading and identify
//! - **[`AuthContext`]**: credential-challenge handling with a token cache

mod auth;
mod client;
mod feature;
mod identify;
mod popup;
mod webmap;

// Public API exports
pub use auth::{AuthContext, Credential, CredentialChallenge, CredentialProvider, FixedCredentialProvider};
pub use client::MapServiceClient;
pub use feature::GeoFeature;
pub use identify::{IdentifyParameters, IdentifyResult, LayerRef};
pub use popup::{FieldFormat, FieldInfo, Popup, PopupDefinition, PopupManager};
pub use webmap::{MapLayer, Viewpoint, WebMap};

/// Error types for the map service client
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },

    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid web map document: {0}")]
    WebMapDocument(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("token issuance failed for {url}: {message}")]
    Token { url: String, message: String },

    #[error("no credential available for {url}")]
    MissingCredential { url: String },
}

impl EngineError {
    /// Stable name for this error category, used as the title of the
    /// user-facing alert dialog.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Http(_) => "HttpError",
            EngineError::Service { .. } => "ServiceError",
            EngineError::Parse(_) => "ParseError",
            EngineError::WebMapDocument(_) => "WebMapError",
            EngineError::InvalidGeometry(_) => "GeometryError",
            EngineError::Token { .. } => "TokenError",
            EngineError::MissingCredential { .. } => "CredentialError",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_are_stable() {
        let err = EngineError::Service {
            code: 499,
            message: "Token Required".into(),
        };
        assert_eq!(err.kind(), "ServiceError");
        assert_eq!(err.to_string(), "service error 499: Token Required");

        let err = EngineError::MissingCredential {
            url: "https://example.com/arcgis".into(),
        };
        assert_eq!(err.kind(), "CredentialError");
    }
}
