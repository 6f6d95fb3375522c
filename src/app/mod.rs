//! Application module
//!
//! This module provides the main screen of the application:
//! - Full-screen map view bound to a web map document
//! - Tap-driven feature identify with a map-anchored callout
//! - Popup detail viewer revealed by the callout's info button
//! - Scale bar, compass and attribution decorations
//! - Modal alert for identify failures

mod map_plugins;
mod resolver;
pub(crate) mod settings;
mod state;
mod ui_panels;

use crate::app::map_plugins::{Compass, MapChannel, ScaleBar, SharedMapChannel, TapCapture, TapEvent};
use crate::app::settings::Settings;
use crate::app::state::{AppState, PendingOutcome, TapOutcome, WebMapSlot};
use crate::engine::{AuthContext, FixedCredentialProvider, MapServiceClient, WebMap};
use crate::entrypoints::async_runtime::spawn;
use eframe::egui;
use std::sync::{Arc, Mutex};
use walkers::{
    HttpTiles, Map, MapMemory, TileId,
    sources::{Attribution, OpenStreetMap, TileSource},
};

/// Custom OpenTopoMap tile source
pub struct OpenTopoMap;

impl TileSource for OpenTopoMap {
    fn tile_url(&self, tile_id: TileId) -> String {
        format!(
            "https://tile.opentopomap.org/{}/{}/{}.png",
            tile_id.zoom, tile_id.x, tile_id.y
        )
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            text: "© OpenTopoMap (CC-BY-SA)",
            url: "https://opentopomap.org/",
            logo_light: None,
            logo_dark: None,
        }
    }

    fn max_zoom(&self) -> u8 {
        17 // OpenTopoMap has max zoom of 17
    }
}

/// Basemap selected from the web map document
#[derive(Clone, Copy, Debug, PartialEq)]
enum Basemap {
    OpenStreetMap,
    OpenTopoMap,
}

impl Basemap {
    /// Pick a tile source matching the document's basemap title
    fn from_title(title: Option<&str>) -> Self {
        match title {
            Some(title) if title.to_ascii_lowercase().contains("topo") => Basemap::OpenTopoMap,
            _ => Basemap::OpenStreetMap,
        }
    }

    fn attribution(&self) -> &'static str {
        match self {
            Basemap::OpenStreetMap => "© OpenStreetMap contributors",
            Basemap::OpenTopoMap => "© OpenTopoMap (CC-BY-SA)",
        }
    }
}

/// Main application structure
pub struct WebmapInspectorApp {
    /// CLI settings
    settings: Settings,

    /// Application state (web map slot, interaction state)
    state: AppState,

    /// Client for the remote map services
    client: Arc<MapServiceClient>,

    /// Map tiles provider (OpenStreetMap)
    tiles_osm: HttpTiles,

    /// Map tiles provider (OpenTopoMap)
    tiles_otm: HttpTiles,

    /// Basemap in use, selected once the web map loads
    basemap: Basemap,

    /// Map state (camera position, zoom, etc.)
    map_memory: MapMemory,

    /// Per-frame channel between the map plugins and this controller
    map_channel: SharedMapChannel,

    /// Callout info-button icon; unset when the bundled PNG fails to decode
    info_icon: Option<egui::TextureHandle>,

    /// Show help overlay
    show_help: bool,
}

impl WebmapInspectorApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = Settings::from_cli();

        // The credential provider is an injected strategy; this one always
        // answers with the CLI-configured pair (a demo stand-in).
        let auth = AuthContext::new(Box::new(FixedCredentialProvider::new(
            settings.username.clone(),
            settings.password.clone(),
        )));
        let client = Arc::new(MapServiceClient::new(Arc::new(auth)));

        let state = AppState::new();
        let info_icon = load_info_icon(&cc.egui_ctx);

        // Create tiles providers
        let tiles_osm = HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone());
        let tiles_otm = HttpTiles::new(OpenTopoMap, cc.egui_ctx.clone());

        let app = Self {
            state,
            client,
            tiles_osm,
            tiles_otm,
            basemap: Basemap::OpenStreetMap,
            map_memory: MapMemory::default(),
            map_channel: Arc::new(Mutex::new(MapChannel::default())),
            info_icon,
            show_help: false,
            settings,
        };
        app.start_webmap_load(cc.egui_ctx.clone());
        app
    }

    /// Fetch the web map document in the background and post it into the
    /// load slot for the UI thread to pick up.
    fn start_webmap_load(&self, ctx: egui::Context) {
        let client = self.client.clone();
        let url = self.settings.webmap.clone();
        let slot = self.state.webmap.clone();

        spawn(async move {
            let loaded = match client.fetch_webmap(&url).await {
                Ok(webmap) => WebMapSlot::Ready(Arc::new(webmap)),
                Err(error) => {
                    tracing::error!("web map load failed: {error}");
                    WebMapSlot::Failed(error.to_string())
                }
            };
            if let Ok(mut guard) = slot.write() {
                *guard = loaded;
            }
            ctx.request_repaint();
        });
    }

    /// Center the map on the document's initial viewpoint and pick the
    /// basemap. Runs exactly once, on the first frame after the load.
    fn apply_loaded_webmap(&mut self, webmap: &WebMap) {
        self.basemap = Basemap::from_title(webmap.basemap_title());

        if let Some(viewpoint) = webmap.viewpoint() {
            self.map_memory
                .center_at(walkers::lat_lon(viewpoint.center.y(), viewpoint.center.x()));
            let _ = self.map_memory.set_zoom(viewpoint.zoom);
            tracing::debug!(
                "centered on ({:.4}, {:.4}), zoom {:.1}",
                viewpoint.center.y(),
                viewpoint.center.x(),
                viewpoint.zoom
            );
        }
    }

    /// Start the identify-and-resolve task for one tap
    fn process_tap(&mut self, ctx: &egui::Context, tap: TapEvent, meters_per_pixel: f64) {
        let Some(webmap) = self.state.webmap_ready() else {
            // Nothing to identify against until the document loads
            return;
        };

        let generation = self.state.interaction.begin_tap();
        let slot = self.state.interaction.pending_slot();
        let client = self.client.clone();
        let params = self.settings.identify_parameters();

        // Pixel tolerance converted at the current ground resolution so
        // hit-testing behaves the same at every zoom level
        let tolerance_m = if meters_per_pixel > 0.0 {
            params.tolerance_px as f64 * meters_per_pixel
        } else {
            10.0
        };

        tracing::debug!(
            "identify at ({:.5}, {:.5}), tolerance {:.1} m",
            tap.position.y(),
            tap.position.x(),
            tolerance_m
        );

        let ctx = ctx.clone();
        spawn(async move {
            let outcome = match client
                .identify_layers(&webmap, tap.position, tolerance_m, &params)
                .await
            {
                Ok(results) => TapOutcome::Resolved(resolver::resolve_popup(&results)),
                Err(error) => TapOutcome::Failed(error),
            };

            if let Ok(mut guard) = slot.write() {
                *guard = Some(PendingOutcome {
                    generation,
                    outcome,
                });
            }
            ctx.request_repaint();
        });
    }
}

#[profiling::all_functions]
impl eframe::App for WebmapInspectorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Handle keyboard shortcuts
        ctx.input(|i| {
            if i.key_pressed(egui::Key::F1) {
                self.show_help = !self.show_help;
            }
            if i.key_pressed(egui::Key::H) && i.modifiers.ctrl {
                self.show_help = !self.show_help;
            }
        });

        // First frame after the web map loads: center and pick the basemap
        if self.state.pending_center_viewpoint {
            if let Some(webmap) = self.state.webmap_ready() {
                self.state.pending_center_viewpoint = false;
                self.apply_loaded_webmap(&webmap);
            }
        }

        // Apply a finished identify, if its generation is still current
        if self.state.interaction.poll_pending() {
            ctx.request_repaint();
        }

        // Show help overlay if enabled
        if self.show_help {
            ui_panels::help_overlay(ctx, &mut self.show_help);
        }

        // Side panels claim their space before the central map panel
        ui_panels::popup_viewer_panel(ctx, &mut self.state.interaction);

        let attribution_text = self.basemap.attribution();

        // Central panel: Map view (full screen)
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                let callout_anchor = self.state.interaction.callout.as_ref().map(|c| c.anchor());
                let tap_capture = TapCapture::new(self.map_channel.clone(), callout_anchor);

                let tiles: &mut HttpTiles = match self.basemap {
                    Basemap::OpenStreetMap => &mut self.tiles_osm,
                    Basemap::OpenTopoMap => &mut self.tiles_otm,
                };

                let map = Map::new(
                    Some(tiles),
                    &mut self.map_memory,
                    walkers::lat_lon(0.0, 0.0),
                )
                .with_plugin(tap_capture)
                .with_plugin(ScaleBar)
                .with_plugin(Compass {
                    auto_hide: self.settings.compass_auto_hide,
                });

                ui.add(map);

                // Drain the per-frame plugin channel
                let (tap, callout_anchor, meters_per_pixel) = match self.map_channel.lock() {
                    Ok(mut channel) => (
                        channel.tap.take(),
                        channel.callout_anchor,
                        channel.meters_per_pixel,
                    ),
                    Err(_) => (None, None, 0.0),
                };

                // Callout overlay sits on top of the map; its info button
                // takes pointer priority over map taps
                if let Some(anchor) = callout_anchor {
                    ui_panels::callout_overlay(
                        ui,
                        anchor,
                        &mut self.state.interaction,
                        self.info_icon.as_ref(),
                    );
                }

                ui_panels::attribution_line(ui, attribution_text);

                if let Ok(slot) = self.state.webmap.try_read() {
                    ui_panels::status_overlay(
                        ui,
                        &slot,
                        self.state.interaction.identify_in_flight(),
                    );
                }

                if let Some(tap) = tap {
                    self.process_tap(ctx, tap, meters_per_pixel);
                }
            });

        ui_panels::alert_modal(ctx, &mut self.state.interaction);

        // Keep polling while background work is in flight
        let loading = !matches!(
            self.state.webmap.try_read().as_deref(),
            Ok(WebMapSlot::Ready(_)) | Ok(WebMapSlot::Failed(_))
        );
        if loading || self.state.interaction.identify_in_flight() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}

/// Decode the bundled callout icon. Best-effort: a decode failure leaves
/// the icon unset and the callout falls back to a drawn glyph.
fn load_info_icon(ctx: &egui::Context) -> Option<egui::TextureHandle> {
    const ICON_BYTES: &[u8] = include_bytes!("../../assets/info.png");

    match image::load_from_memory(ICON_BYTES) {
        Ok(decoded) => {
            let rgba = decoded.to_rgba8();
            let size = [rgba.width() as usize, rgba.height() as usize];
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
            Some(ctx.load_texture("callout-info-icon", color_image, egui::TextureOptions::LINEAR))
        }
        Err(error) => {
            tracing::warn!("callout icon failed to decode: {error}");
            None
        }
    }
}
