//! Webmap Inspector - Application Library
//!
//! This crate integrates the map service client and the platform entry
//! points into the complete web map viewer application.

pub mod app;
pub mod engine;
pub mod entrypoints;

pub use app::WebmapInspectorApp;

// Entry point for Android
#[cfg(target_os = "android")]
#[unsafe(no_mangle)]
fn android_main(app: winit::platform::android::activity::AndroidApp) {
    entrypoints::lib::android_main(app);
}
