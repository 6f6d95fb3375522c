//! Identify results and parameters
//!
//! An identify run produces one `IdentifyResult` per queried layer. The
//! result is a plain capability struct: popups, features, the originating
//! layer reference, and nested sub-results for group layers. The popup
//! resolver consumes these without knowing anything about the wire format
//! that produced them.

use crate::engine::{GeoFeature, Popup, PopupDefinition};

/// Reference to the layer (or sub-layer) a result originated from
#[derive(Clone, Debug)]
pub struct LayerRef {
    id: String,
    title: String,
    popup_definition: Option<PopupDefinition>,
    identifiable: bool,
}

impl LayerRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        LayerRef {
            id: id.into(),
            title: title.into(),
            popup_definition: None,
            identifiable: true,
        }
    }

    /// Attach the popup definition this layer exposes
    pub fn with_popup_definition(mut self, definition: PopupDefinition) -> Self {
        self.popup_definition = Some(definition);
        self
    }

    /// Mark the layer as excluded from identify runs
    pub fn not_identifiable(mut self) -> Self {
        self.identifiable = false;
        self
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The popup definition this layer exposes, if any
    #[inline]
    pub fn popup_definition(&self) -> Option<&PopupDefinition> {
        self.popup_definition.as_ref()
    }

    #[inline]
    pub fn identifiable(&self) -> bool {
        self.identifiable
    }
}

/// Outcome of identifying one layer: resolved popups, raw features, and
/// nested results for group layers. Read-only once built.
#[derive(Clone, Debug)]
pub struct IdentifyResult {
    layer: LayerRef,
    popups: Vec<Popup>,
    features: Vec<GeoFeature>,
    sublayer_results: Vec<IdentifyResult>,
}

impl IdentifyResult {
    pub fn new(layer: LayerRef) -> Self {
        IdentifyResult {
            layer,
            popups: Vec::new(),
            features: Vec::new(),
            sublayer_results: Vec::new(),
        }
    }

    pub fn with_popups(mut self, popups: Vec<Popup>) -> Self {
        self.popups = popups;
        self
    }

    pub fn with_features(mut self, features: Vec<GeoFeature>) -> Self {
        self.features = features;
        self
    }

    pub fn with_sublayer_results(mut self, sublayer_results: Vec<IdentifyResult>) -> Self {
        self.sublayer_results = sublayer_results;
        self
    }

    #[inline]
    pub fn layer(&self) -> &LayerRef {
        &self.layer
    }

    /// Popups pre-resolved by the identify run, if any
    #[inline]
    pub fn popups(&self) -> &[Popup] {
        &self.popups
    }

    /// Raw located features, if any
    #[inline]
    pub fn features(&self) -> &[GeoFeature] {
        &self.features
    }

    /// Nested results contributed by a group layer's sub-layers
    #[inline]
    pub fn sublayer_results(&self) -> &[IdentifyResult] {
        &self.sublayer_results
    }

    /// True when nothing was found at any depth below this result
    pub fn is_empty(&self) -> bool {
        self.popups.is_empty()
            && self.features.is_empty()
            && self.sublayer_results.iter().all(IdentifyResult::is_empty)
    }
}

/// Parameters of one identify run
#[derive(Clone, Debug)]
pub struct IdentifyParameters {
    /// Maximum number of operational layers to query, in document order
    pub maximum_layers: usize,
    /// Hit-test tolerance around the tap, in screen pixels
    pub tolerance_px: f32,
    /// Also query sub-layers flagged not-identifiable
    pub include_unidentifiable_sublayers: bool,
}

impl Default for IdentifyParameters {
    fn default() -> Self {
        IdentifyParameters {
            maximum_layers: 3,
            tolerance_px: 8.0,
            include_unidentifiable_sublayers: false,
        }
    }
}
