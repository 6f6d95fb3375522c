//! UI panels and overlays for the application
//!
//! This module provides the screen's UI pieces outside the map itself:
//! the callout overlay, the popup detail viewer, the modal alert, the
//! attribution line, the loading status and the help overlay.

use crate::app::state::{InteractionState, WebMapSlot};
use egui::{Align2, Color32, FontId, Pos2, Rect, RichText, Sense, Stroke, StrokeKind, Ui};

/// Height of the leader triangle between the callout box and its anchor
const CALLOUT_LEADER: f32 = 10.0;

/// Side length of the callout's info button
const CALLOUT_BUTTON: f32 = 22.0;

/// Paint the basemap attribution text at the bottom of the map
pub fn attribution_line(ui: &Ui, text: &str) {
    let screen_rect = ui.max_rect();
    ui.painter().text(
        screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
        Align2::CENTER_BOTTOM,
        text,
        FontId::proportional(10.0),
        Color32::from_black_alpha(180),
    );
}

/// Draw the callout box above its anchor and handle the info button.
///
/// The anchor is the screen-projected position of the callout's feature,
/// already culled to the viewport by the tap-capture plugin.
pub fn callout_overlay(
    ui: &mut Ui,
    anchor: Pos2,
    state: &mut InteractionState,
    icon: Option<&egui::TextureHandle>,
) {
    let Some(callout) = &state.callout else {
        return;
    };

    let painter = ui.painter().clone();
    let galley = painter.layout_no_wrap(
        callout.title().to_string(),
        FontId::proportional(13.0),
        Color32::BLACK,
    );

    let padding = egui::vec2(10.0, 8.0);
    let box_width = galley.rect.width() + CALLOUT_BUTTON + padding.x * 3.0;
    let box_height = galley.rect.height().max(CALLOUT_BUTTON) + padding.y * 2.0;
    let box_rect = Rect::from_min_size(
        anchor + egui::vec2(-box_width / 2.0, -(box_height + CALLOUT_LEADER)),
        egui::vec2(box_width, box_height),
    );

    // Box with leader triangle pointing at the anchor
    painter.add(egui::Shape::convex_polygon(
        vec![
            anchor,
            anchor + egui::vec2(-CALLOUT_LEADER * 0.7, -CALLOUT_LEADER),
            anchor + egui::vec2(CALLOUT_LEADER * 0.7, -CALLOUT_LEADER),
        ],
        Color32::WHITE,
        Stroke::NONE,
    ));
    painter.rect_filled(box_rect, 6.0, Color32::WHITE);
    painter.rect_stroke(
        box_rect,
        6.0,
        Stroke::new(1.0, Color32::from_black_alpha(60)),
        StrokeKind::Outside,
    );

    painter.galley(
        box_rect.min + padding + egui::vec2(0.0, (box_height - padding.y * 2.0 - galley.rect.height()) / 2.0),
        galley,
        Color32::BLACK,
    );

    // Info button on the right edge of the box
    let button_rect = Rect::from_center_size(
        Pos2::new(box_rect.max.x - padding.x - CALLOUT_BUTTON / 2.0, box_rect.center().y),
        egui::vec2(CALLOUT_BUTTON, CALLOUT_BUTTON),
    );
    let response = ui.allocate_rect(button_rect, Sense::click());

    match icon {
        Some(texture) => {
            let tint = if response.hovered() {
                Color32::from_white_alpha(255)
            } else {
                Color32::from_white_alpha(230)
            };
            painter.image(
                texture.id(),
                button_rect,
                Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0)),
                tint,
            );
        }
        None => {
            // Icon failed to load; a drawn glyph keeps the button usable
            let color = if response.hovered() {
                Color32::from_rgb(28, 110, 214)
            } else {
                Color32::from_rgb(70, 130, 220)
            };
            painter.circle_filled(button_rect.center(), CALLOUT_BUTTON / 2.0, color);
            painter.text(
                button_rect.center(),
                Align2::CENTER_CENTER,
                "i",
                FontId::proportional(14.0),
                Color32::WHITE,
            );
        }
    }

    if response.clicked() {
        state.activate_callout();
    }
}

/// Render the popup detail viewer as a side panel when visible
pub fn popup_viewer_panel(ctx: &egui::Context, state: &mut InteractionState) {
    if !state.popup_viewer.visible {
        return;
    }

    let mut close = false;
    egui::SidePanel::right("popup_viewer")
        .default_width(300.0)
        .min_width(240.0)
        .max_width(420.0)
        .resizable(true)
        .show(ctx, |ui| {
            let Some(manager) = &state.popup_viewer.manager else {
                return;
            };

            ui.horizontal(|ui| {
                ui.heading(manager.title());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("✕").clicked() {
                        close = true;
                    }
                });
            });
            ui.label(RichText::new(manager.layer_name()).small().italics().weak());
            ui.separator();

            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    egui::Grid::new("popup_fields")
                        .num_columns(2)
                        .striped(true)
                        .spacing([12.0, 6.0])
                        .show(ui, |ui| {
                            for (label, value) in manager.rows() {
                                ui.label(RichText::new(label).strong());
                                ui.label(value);
                                ui.end_row();
                            }
                        });

                    if manager.rows().is_empty() {
                        ui.label(RichText::new("No visible fields").italics().weak());
                    }
                });
        });

    if close {
        state.popup_viewer.visible = false;
    }
}

/// Present the pending alert as a centered modal window
pub fn alert_modal(ctx: &egui::Context, state: &mut InteractionState) {
    let Some(alert) = &state.alert else {
        return;
    };
    let title = alert.title.clone();
    let message = alert.message.clone();

    let mut dismissed = false;
    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .anchor(Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
        .show(ctx, |ui| {
            ui.set_max_width(360.0);
            ui.label(message);
            ui.add_space(8.0);
            ui.vertical_centered(|ui| {
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        });

    if dismissed {
        state.alert = None;
    }
}

/// Status line for the web map load and in-flight identifies
pub fn status_overlay(ui: &Ui, slot: &WebMapSlot, identify_in_flight: bool) {
    let text = match slot {
        WebMapSlot::Loading => Some("Loading web map…".to_string()),
        WebMapSlot::Failed(message) => Some(format!("Web map failed to load: {message}")),
        WebMapSlot::Ready(_) if identify_in_flight => Some("Identifying…".to_string()),
        WebMapSlot::Ready(_) => None,
    };

    if let Some(text) = text {
        let pos = ui.max_rect().center_top() + egui::vec2(0.0, 12.0);
        let painter = ui.painter();
        let galley = painter.layout_no_wrap(text, FontId::proportional(12.0), Color32::BLACK);
        let rect = Rect::from_center_size(
            pos + egui::vec2(0.0, galley.rect.height() / 2.0),
            galley.rect.size() + egui::vec2(16.0, 8.0),
        );
        painter.rect_filled(rect, 4.0, Color32::from_white_alpha(220));
        painter.galley(rect.min + egui::vec2(8.0, 4.0), galley, Color32::BLACK);
    }
}

/// Render the help overlay
pub fn help_overlay(ctx: &egui::Context, show: &mut bool) {
    egui::Window::new("Help")
        .open(show)
        .collapsible(false)
        .resizable(true)
        .default_width(400.0)
        .show(ctx, |ui| {
            ui.heading("Webmap Inspector");
            ui.separator();

            ui.label("Explore a web map and inspect feature popups.");
            ui.add_space(8.0);

            ui.label(RichText::new("🖱 Map Controls").strong());
            ui.label("• Left drag: Pan the map");
            ui.label("• Mouse wheel: Zoom in/out");
            ui.label("• Click: Identify features at that point");
            ui.add_space(8.0);

            ui.label(RichText::new("ℹ Popups").strong());
            ui.label("• Clicking a feature shows a callout with its name");
            ui.label("• The callout's info button opens the detail viewer");
            ui.label("• Clicking empty map space closes everything");
            ui.add_space(8.0);

            ui.separator();
            crate::entrypoints::profiling::profiling_ui(ui);

            ui.separator();
            ui.label(
                RichText::new("Press F1 to toggle this help")
                    .small()
                    .italics(),
            );
        });
}
