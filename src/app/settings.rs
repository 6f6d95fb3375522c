use crate::entrypoints::cli::parse_args;
use clap::Parser;

/// Web map document shown when no source is given: a public demo document
/// with popup-enabled layers.
const DEFAULT_WEBMAP_URL: &str =
    "https://www.arcgis.com/sharing/rest/content/items/d4fe39d300c24672b1821fa8450b6ae2/data";

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Webmap Inspector - A cross-platform application for exploring web maps and inspecting feature popups
pub struct Settings {
    /// URL of the web map document to load
    #[clap(short, long, default_value = DEFAULT_WEBMAP_URL)]
    pub webmap: String,

    /// Username answering credential challenges from secured layers
    #[clap(long, default_value = "user1")]
    pub username: String,

    /// Password answering credential challenges from secured layers
    #[clap(long, default_value = "user1")]
    pub password: String,

    /// Maximum number of layers one identify run queries
    #[clap(long, default_value = "3")]
    pub max_identify_layers: usize,

    /// Identify hit-test tolerance around the tap, in pixels
    #[clap(long, default_value = "8.0")]
    pub identify_tolerance: f32,

    /// Also identify sub-layers flagged as not identifiable
    #[clap(long, default_value = "false")]
    pub include_unidentifiable_sublayers: bool,

    /// Hide the compass when the map points north (it always does)
    #[clap(long, default_value = "false")]
    pub compass_auto_hide: bool,
}

impl Settings {
    /// Parse settings from the command line (native) or GET params (web)
    pub fn from_cli() -> Self {
        match parse_args::<Settings>() {
            Ok(args) => args,
            Err(e) => {
                #[cfg(not(target_arch = "wasm32"))]
                e.exit();
                #[cfg(target_arch = "wasm32")]
                {
                    let user_msg = format!(
                        "Error parsing CLI:\n{}\n
    You should change the GET params, using the cli prefix.\n
    Starting anyway without args.",
                        e
                    );
                    if let Some(window) = web_sys::window() {
                        window.alert_with_message(&user_msg).unwrap_or(());
                    } else {
                        tracing::error!(user_msg);
                    }
                    Settings::parse_from(Vec::<String>::new()) // Default args on web if parsing fails
                }
            }
        }
    }

    /// Identify parameters derived from the CLI flags
    pub fn identify_parameters(&self) -> crate::engine::IdentifyParameters {
        crate::engine::IdentifyParameters {
            maximum_layers: self.max_identify_layers,
            tolerance_px: self.identify_tolerance,
            include_unidentifiable_sublayers: self.include_unidentifiable_sublayers,
        }
    }
}
