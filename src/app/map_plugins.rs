//! Map plugins: tap capture and decoration widgets
//!
//! Everything that needs the map projector runs here as a `walkers`
//! plugin: capturing tap positions (the projector is the only way to turn
//! a click into geographic coordinates), projecting the active callout
//! anchor for the post-map overlay, and painting the scale bar and
//! compass decorations. Plugins communicate with the controller through a
//! shared per-frame channel.

use egui::{Align2, Color32, FontId, Pos2, Stroke, Vec2};
use geo::Point;
use std::sync::{Arc, Mutex};
use walkers::{MapMemory, Plugin, Projector};

/// Vertical space reserved at the bottom of the map for the attribution
/// line. The scale bar sits directly above it.
pub const ATTRIBUTION_HEIGHT: f32 = 18.0;

/// Gap between the scale bar baseline and the attribution line
pub const SCALE_BAR_GAP: f32 = 10.0;

/// A tap captured on the map
pub struct TapEvent {
    /// Geographic position in WGS84 (x = lon, y = lat)
    pub position: Point<f64>,
}

/// Per-frame data exchanged between the map plugins and the controller
#[derive(Default)]
pub struct MapChannel {
    /// Tap captured this frame, if any
    pub tap: Option<TapEvent>,
    /// Screen position of the active callout anchor; `None` when there is
    /// no callout or the anchor is outside the viewport
    pub callout_anchor: Option<Pos2>,
    /// Ground resolution at the viewport center
    pub meters_per_pixel: f64,
}

pub type SharedMapChannel = Arc<Mutex<MapChannel>>;

/// Captures taps and projects the callout anchor
pub struct TapCapture {
    channel: SharedMapChannel,
    callout_anchor: Option<Point<f64>>,
}

impl TapCapture {
    pub fn new(channel: SharedMapChannel, callout_anchor: Option<Point<f64>>) -> Self {
        TapCapture {
            channel,
            callout_anchor,
        }
    }
}

impl Plugin for TapCapture {
    fn run(
        self: Box<Self>,
        _ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        _map_memory: &MapMemory,
    ) {
        profiling::scope!("TapCapture::run");

        let Ok(mut channel) = self.channel.lock() else {
            return;
        };

        let rect = response.rect;
        channel.meters_per_pixel = meters_per_pixel(projector, rect);

        channel.tap = None;
        if response.clicked() {
            if let Some(screen) = response.interact_pointer_pos() {
                let position = projector.unproject(screen.to_vec2());
                channel.tap = Some(TapEvent {
                    position: Point::new(position.x(), position.y()),
                });
            }
        }

        channel.callout_anchor = self.callout_anchor.and_then(|anchor| {
            let screen_vec = projector.project(walkers::lat_lon(anchor.y(), anchor.x()));
            let screen = Pos2::new(screen_vec.x, screen_vec.y);
            rect.contains(screen).then_some(screen)
        });
    }
}

/// Scale bar decoration, laid out just above the attribution line
pub struct ScaleBar;

impl Plugin for ScaleBar {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        _map_memory: &MapMemory,
    ) {
        profiling::scope!("ScaleBar::run");

        let rect = response.rect;
        let mpp = meters_per_pixel(projector, rect);
        if !(mpp.is_finite() && mpp > 0.0) {
            return;
        }

        // Round down to a 1/2/5 length that stays under ~120 px
        let meters = round_scale_length(mpp * 120.0);
        let width_px = (meters / mpp) as f32;

        let baseline = rect.left_bottom()
            + egui::vec2(12.0, -(ATTRIBUTION_HEIGHT + SCALE_BAR_GAP));
        let end = baseline + egui::vec2(width_px, 0.0);

        let painter = ui.painter();
        let stroke = Stroke::new(2.0, Color32::from_black_alpha(200));
        painter.line_segment([baseline, end], stroke);
        painter.line_segment([baseline, baseline + egui::vec2(0.0, -5.0)], stroke);
        painter.line_segment([end, end + egui::vec2(0.0, -5.0)], stroke);

        painter.text(
            baseline + egui::vec2(width_px / 2.0, -8.0),
            Align2::CENTER_BOTTOM,
            format_scale_length(meters),
            FontId::proportional(11.0),
            Color32::from_black_alpha(200),
        );
    }
}

/// North compass decoration.
///
/// The map renders north-up, so the needle always points straight up;
/// with `auto_hide` set the compass disappears entirely in that case.
pub struct Compass {
    pub auto_hide: bool,
}

impl Plugin for Compass {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        _projector: &Projector,
        _map_memory: &MapMemory,
    ) {
        profiling::scope!("Compass::run");

        if self.auto_hide {
            // Heading is always north; an auto-hiding compass never shows.
            return;
        }

        let radius = 18.0;
        let margin = 14.0;
        let center = response.rect.right_top() + egui::vec2(-(radius + margin), radius + margin);

        let painter = ui.painter();
        painter.circle_filled(center, radius, Color32::from_white_alpha(220));
        painter.circle_stroke(center, radius, Stroke::new(1.5, Color32::from_black_alpha(90)));

        // North needle (red) over south needle (grey)
        let half_width = radius * 0.28;
        painter.add(egui::Shape::convex_polygon(
            vec![
                center + Vec2::new(0.0, -radius * 0.72),
                center + Vec2::new(-half_width, 0.0),
                center + Vec2::new(half_width, 0.0),
            ],
            Color32::from_rgb(200, 40, 40),
            Stroke::NONE,
        ));
        painter.add(egui::Shape::convex_polygon(
            vec![
                center + Vec2::new(0.0, radius * 0.72),
                center + Vec2::new(half_width, 0.0),
                center + Vec2::new(-half_width, 0.0),
            ],
            Color32::from_gray(130),
            Stroke::NONE,
        ));

        painter.text(
            center + Vec2::new(0.0, -radius - 3.0),
            Align2::CENTER_BOTTOM,
            "N",
            FontId::proportional(10.0),
            Color32::from_black_alpha(170),
        );
    }
}

/// Ground resolution at the viewport center, from two points unprojected
/// 100 px apart
fn meters_per_pixel(projector: &Projector, rect: egui::Rect) -> f64 {
    let center = rect.center();
    let a = projector.unproject(center.to_vec2());
    let b = projector.unproject((center + egui::vec2(100.0, 0.0)).to_vec2());
    haversine_m(a.x(), a.y(), b.x(), b.y()) / 100.0
}

/// Haversine distance between two WGS84 points in meters
fn haversine_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Largest 1/2/5 x 10^k length not exceeding `max_meters`
fn round_scale_length(max_meters: f64) -> f64 {
    let magnitude = 10f64.powf(max_meters.log10().floor());
    for factor in [5.0, 2.0, 1.0] {
        let candidate = factor * magnitude;
        if candidate <= max_meters {
            return candidate;
        }
    }
    magnitude
}

/// Human-readable bar label
fn format_scale_length(meters: f64) -> String {
    if meters >= 1000.0 {
        let km = meters / 1000.0;
        if km.fract() == 0.0 {
            format!("{km:.0} km")
        } else {
            format!("{km:.1} km")
        }
    } else {
        format!("{meters:.0} m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_lengths_round_to_nice_values() {
        assert_eq!(round_scale_length(120.0), 100.0);
        assert_eq!(round_scale_length(260.0), 200.0);
        assert_eq!(round_scale_length(700.0), 500.0);
        assert_eq!(round_scale_length(1_200.0), 1_000.0);
        assert_eq!(round_scale_length(80_000.0), 50_000.0);
    }

    #[test]
    fn scale_labels_switch_units() {
        assert_eq!(format_scale_length(500.0), "500 m");
        assert_eq!(format_scale_length(1_000.0), "1 km");
        assert_eq!(format_scale_length(2_500.0), "2.5 km");
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Lisbon to Porto is roughly 274 km
        let d = haversine_m(-9.139, 38.722, -8.611, 41.150);
        assert!((d - 274_000.0).abs() < 10_000.0, "got {d}");
    }

    #[test]
    fn haversine_is_zero_for_identical_points() {
        assert!(haversine_m(1.0, 2.0, 1.0, 2.0) < 1e-9);
    }
}
