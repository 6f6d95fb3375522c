//! Popup selection over identify results
//!
//! An identify run returns one result per queried layer, possibly with
//! nested sub-results for group layers. At most one popup is ever shown,
//! so a single popup has to be picked out of that forest. The rule is
//! deterministic and first-match: at each level, pre-resolved popups win
//! over raw features, and a raw feature is paired with its layer's popup
//! definition when the layer exposes one (falling back to the default
//! popup otherwise). Top-level results are tried before their nested
//! sub-results; the first match anywhere wins; there is no ranking.

use crate::engine::{IdentifyResult, Popup};

/// Select the first available popup from a sequence of identify results.
///
/// Pure function over already-fetched results; no I/O, no mutation.
pub fn resolve_popup(results: &[IdentifyResult]) -> Option<Popup> {
    for result in results {
        if let Some(popup) = resolve_single(result) {
            return Some(popup);
        }
        if let Some(popup) = resolve_popup(result.sublayer_results()) {
            return Some(popup);
        }
    }
    None
}

/// Resolve one result without descending into its sub-results
fn resolve_single(result: &IdentifyResult) -> Option<Popup> {
    if let Some(popup) = result.popups().first() {
        return Some(popup.clone());
    }

    if let Some(feature) = result.features().first() {
        return Some(match result.layer().popup_definition() {
            Some(definition) => Popup::new(feature.clone(), definition.clone()),
            None => Popup::from_feature(feature.clone()),
        });
    }

    None
}
