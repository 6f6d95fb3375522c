//! Cross-platform async task spawning
//!
//! Background work (the web map load, identify runs) is spawned through
//! this single helper: tokio's runtime on native and Android, the
//! JavaScript event loop on web. Tasks report back through shared slots,
//! so no join handle is returned; cancellation is by generation counting
//! at the receiving end.

/// Spawn an async task on tokio's multi-threaded runtime.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn<F>(future: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(future);
}

/// Spawn an async task on the JavaScript event loop.
#[cfg(target_arch = "wasm32")]
pub fn spawn<F>(future: F)
where
    F: std::future::Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}
