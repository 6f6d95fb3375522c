//! Application state management
//!
//! This module manages the screen's interaction state: the web map load
//! slot, the active callout, the popup viewer, the alert queue, and the
//! generation-counted identify flow. Async tasks write into shared slots;
//! the UI thread polls them each frame with non-blocking reads.

use crate::engine::{EngineError, Popup, PopupManager, WebMap};
use geo::Point;
use std::sync::{Arc, RwLock};

/// A transient map-anchored annotation for the resolved popup.
///
/// Carries the popup itself (revealed by the info button), the feature
/// anchor it points at, and the pre-evaluated title text.
pub struct Callout {
    popup: Popup,
    anchor: Point<f64>,
    title: String,
}

impl Callout {
    pub fn new(popup: Popup) -> Self {
        let anchor = popup.feature().anchor();
        let title = popup.evaluated_title();
        Callout {
            popup,
            anchor,
            title,
        }
    }

    #[inline]
    pub fn popup(&self) -> &Popup {
        &self.popup
    }

    /// Anchor in WGS84 (x = lon, y = lat)
    #[inline]
    pub fn anchor(&self) -> Point<f64> {
        self.anchor
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Popup detail viewer state
#[derive(Default)]
pub struct PopupViewerState {
    pub visible: bool,
    pub manager: Option<PopupManager>,
}

/// A pending modal alert
#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

/// Outcome of one identify-and-resolve run
pub enum TapOutcome {
    /// Identify completed; a popup may or may not have been found
    Resolved(Option<Popup>),
    /// Identify failed; the error is surfaced as a modal alert
    Failed(EngineError),
}

/// Outcome slot entry, tagged with the tap generation that spawned it
pub struct PendingOutcome {
    pub generation: u64,
    pub outcome: TapOutcome,
}

/// Progress of the web map load
pub enum WebMapSlot {
    Loading,
    Ready(Arc<WebMap>),
    Failed(String),
}

/// Tap-interaction state: at most one callout/popup is active at a time,
/// and each completed tap fully replaces the prior interaction.
pub struct InteractionState {
    /// Bumped on every tap; outcomes from older generations are dropped
    generation: u64,
    /// Slot written by the identify task, polled by the UI thread
    pending: Arc<RwLock<Option<PendingOutcome>>>,
    /// Active callout, if any
    pub callout: Option<Callout>,
    /// Popup detail viewer
    pub popup_viewer: PopupViewerState,
    /// Pending modal alert, if any
    pub alert: Option<Alert>,
    /// True while an identify is running for the latest tap
    identify_in_flight: bool,
}

impl Default for InteractionState {
    fn default() -> Self {
        InteractionState {
            generation: 0,
            pending: Arc::new(RwLock::new(None)),
            callout: None,
            popup_viewer: PopupViewerState::default(),
            alert: None,
            identify_in_flight: false,
        }
    }
}

impl InteractionState {
    /// Start a new tap interaction. Bumping the generation implicitly
    /// cancels any identify still running for an earlier tap: its outcome
    /// will be dropped on arrival.
    pub fn begin_tap(&mut self) -> u64 {
        self.generation += 1;
        self.identify_in_flight = true;
        self.generation
    }

    /// Slot handle the identify task writes its outcome through
    pub fn pending_slot(&self) -> Arc<RwLock<Option<PendingOutcome>>> {
        self.pending.clone()
    }

    #[inline]
    pub fn identify_in_flight(&self) -> bool {
        self.identify_in_flight
    }

    /// Poll the outcome slot and apply a current-generation outcome.
    /// Returns true when state changed and a repaint is warranted.
    pub fn poll_pending(&mut self) -> bool {
        let taken = match self.pending.try_write() {
            Ok(mut slot) => slot.take(),
            Err(_) => return false,
        };

        let Some(pending) = taken else {
            return false;
        };

        if pending.generation != self.generation {
            // A newer tap replaced this interaction while its identify was
            // still running; the stale outcome must not touch any state.
            tracing::trace!(
                "dropping stale identify outcome (generation {} < {})",
                pending.generation,
                self.generation
            );
            return false;
        }

        self.identify_in_flight = false;
        self.apply_outcome(pending.outcome);
        true
    }

    /// Apply one completed tap interaction:
    ///
    /// - popup found: the callout is replaced; the popup viewer keeps
    ///   whatever state it had until the info button is pressed
    /// - nothing found: the callout is dismissed and the popup viewer is
    ///   cleared and hidden
    /// - identify failed: callout and popup viewer stay untouched (no
    ///   partial callout) and exactly one alert is queued
    fn apply_outcome(&mut self, outcome: TapOutcome) {
        match outcome {
            TapOutcome::Resolved(Some(popup)) => {
                self.callout = Some(Callout::new(popup));
            }
            TapOutcome::Resolved(None) => {
                self.callout = None;
                self.popup_viewer.manager = None;
                self.popup_viewer.visible = false;
            }
            TapOutcome::Failed(error) => {
                tracing::warn!("identify failed: {error}");
                self.alert = Some(Alert {
                    title: error.kind().to_string(),
                    message: error.to_string(),
                });
            }
        }
    }

    /// The callout's info button was pressed: reveal the popup viewer
    /// bound to a newly constructed manager for the callout's popup.
    pub fn activate_callout(&mut self) {
        if let Some(callout) = &self.callout {
            self.popup_viewer.manager = Some(PopupManager::new(callout.popup()));
            self.popup_viewer.visible = true;
        }
    }
}

/// Main application state
pub struct AppState {
    /// Web map load slot, written by the load task
    pub webmap: Arc<RwLock<WebMapSlot>>,
    /// Tap interaction state
    pub interaction: InteractionState,
    /// Center the map on the web map viewpoint once it loads
    pub pending_center_viewpoint: bool,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            webmap: Arc::new(RwLock::new(WebMapSlot::Loading)),
            interaction: InteractionState::default(),
            pending_center_viewpoint: true,
        }
    }

    /// Non-blocking peek at the loaded web map
    pub fn webmap_ready(&self) -> Option<Arc<WebMap>> {
        match self.webmap.try_read() {
            Ok(slot) => match &*slot {
                WebMapSlot::Ready(webmap) => Some(webmap.clone()),
                _ => None,
            },
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{GeoFeature, PopupDefinition};
    use geo::Geometry;

    fn popup(name: &str) -> Popup {
        let feature = GeoFeature::new(
            Geometry::Point(Point::new(1.0, 2.0)),
            [(
                "NAME".to_string(),
                serde_json::Value::String(name.to_string()),
            )]
            .into_iter()
            .collect(),
            "Cities",
        )
        .unwrap();
        Popup::new(
            feature,
            PopupDefinition {
                title: "{NAME}".into(),
                fields: vec![],
            },
        )
    }

    fn post(state: &InteractionState, generation: u64, outcome: TapOutcome) {
        *state.pending_slot().write().unwrap() = Some(PendingOutcome {
            generation,
            outcome,
        });
    }

    #[test]
    fn resolved_popup_shows_callout_and_keeps_viewer_hidden() {
        let mut state = InteractionState::default();
        let generation = state.begin_tap();
        post(&state, generation, TapOutcome::Resolved(Some(popup("Lisbon"))));

        assert!(state.poll_pending());

        let callout = state.callout.as_ref().unwrap();
        assert_eq!(callout.title(), "Lisbon");
        assert!((callout.anchor().x() - 1.0).abs() < 1e-9);
        assert!(!state.popup_viewer.visible);
        assert!(state.popup_viewer.manager.is_none());
        assert!(state.alert.is_none());
    }

    #[test]
    fn info_button_reveals_the_viewer() {
        let mut state = InteractionState::default();
        let generation = state.begin_tap();
        post(&state, generation, TapOutcome::Resolved(Some(popup("Lisbon"))));
        state.poll_pending();

        state.activate_callout();
        assert!(state.popup_viewer.visible);
        assert_eq!(state.popup_viewer.manager.as_ref().unwrap().title(), "Lisbon");
    }

    #[test]
    fn new_tap_replaces_the_callout_but_not_the_open_viewer() {
        let mut state = InteractionState::default();
        let generation = state.begin_tap();
        post(&state, generation, TapOutcome::Resolved(Some(popup("Lisbon"))));
        state.poll_pending();
        state.activate_callout();

        let generation = state.begin_tap();
        post(&state, generation, TapOutcome::Resolved(Some(popup("Porto"))));
        state.poll_pending();

        // The callout is replaced; the open viewer still shows the old
        // popup until the new callout's button is pressed.
        assert_eq!(state.callout.as_ref().unwrap().title(), "Porto");
        assert!(state.popup_viewer.visible);
        assert_eq!(state.popup_viewer.manager.as_ref().unwrap().title(), "Lisbon");

        state.activate_callout();
        assert_eq!(state.popup_viewer.manager.as_ref().unwrap().title(), "Porto");
    }

    #[test]
    fn empty_resolution_hides_everything() {
        let mut state = InteractionState::default();
        let generation = state.begin_tap();
        post(&state, generation, TapOutcome::Resolved(Some(popup("Lisbon"))));
        state.poll_pending();
        state.activate_callout();

        let generation = state.begin_tap();
        post(&state, generation, TapOutcome::Resolved(None));
        state.poll_pending();

        assert!(state.callout.is_none());
        assert!(!state.popup_viewer.visible);
        assert!(state.popup_viewer.manager.is_none());
    }

    #[test]
    fn failed_identify_queues_one_alert_and_touches_nothing_else() {
        let mut state = InteractionState::default();
        let generation = state.begin_tap();
        post(&state, generation, TapOutcome::Resolved(Some(popup("Lisbon"))));
        state.poll_pending();
        state.activate_callout();

        let generation = state.begin_tap();
        post(
            &state,
            generation,
            TapOutcome::Failed(EngineError::Service {
                code: 500,
                message: "identify blew up".into(),
            }),
        );
        state.poll_pending();

        let alert = state.alert.as_ref().unwrap();
        assert_eq!(alert.title, "ServiceError");
        assert!(alert.message.contains("identify blew up"));

        // Callout and viewer state are exactly as they were
        assert_eq!(state.callout.as_ref().unwrap().title(), "Lisbon");
        assert!(state.popup_viewer.visible);
        assert_eq!(state.popup_viewer.manager.as_ref().unwrap().title(), "Lisbon");
    }

    #[test]
    fn stale_generation_outcomes_are_dropped() {
        let mut state = InteractionState::default();
        let first = state.begin_tap();
        let _second = state.begin_tap();

        post(&state, first, TapOutcome::Resolved(Some(popup("Stale"))));
        assert!(!state.poll_pending());
        assert!(state.callout.is_none());
        // The newer tap is still considered in flight
        assert!(state.identify_in_flight());
    }

    #[test]
    fn current_generation_outcome_still_applies_after_a_stale_drop() {
        let mut state = InteractionState::default();
        let first = state.begin_tap();
        let second = state.begin_tap();

        post(&state, first, TapOutcome::Resolved(Some(popup("Stale"))));
        state.poll_pending();
        post(&state, second, TapOutcome::Resolved(Some(popup("Fresh"))));
        assert!(state.poll_pending());

        assert_eq!(state.callout.as_ref().unwrap().title(), "Fresh");
        assert!(!state.identify_in_flight());
    }
}
