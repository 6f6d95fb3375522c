#[cfg(feature = "profiling")]
pub struct ProfilingServer {
    server: Option<puffin_http::Server>,
}

#[cfg(feature = "profiling")]
impl ProfilingServer {
    pub fn start() -> Self {
        puffin::set_scopes_on(true); // tell puffin to collect data

        match puffin_http::Server::new("127.0.0.1:8585") {
            Ok(puffin_server) => {
                tracing::info!(
                    "Profiling enabled, to view: cargo install puffin_viewer && ~/.cargo/bin/puffin_viewer --url 127.0.0.1:8585"
                );

                ProfilingServer {
                    server: Some(puffin_server),
                }
            }
            Err(err) => {
                tracing::error!("Failed to start puffin server: {err}");
                ProfilingServer { server: None }
            }
        }
    }

    pub fn stop(&mut self) {
        puffin::set_scopes_on(false);
        // Dropping the server will close it.
        self.server = None;
    }
}

/// Toggle for the in-process profiling server, shown in the help overlay
pub fn profiling_ui(ui: &mut egui::Ui) {
    #[cfg(feature = "profiling")]
    {
        use std::cell::RefCell;

        egui::warn_if_debug_build(ui);

        // The server lives on the UI thread for the whole session
        thread_local! {
            static PROFILING_SERVER: RefCell<Option<ProfilingServer>> = const { RefCell::new(None) };
        }

        PROFILING_SERVER.with(|server| {
            let mut server = server.borrow_mut();
            let mut enabled = server.is_some();
            if ui.checkbox(&mut enabled, "Enable profiling server").changed() {
                if enabled {
                    *server = Some(ProfilingServer::start());
                } else {
                    if let Some(running) = server.as_mut() {
                        running.stop();
                    }
                    *server = None;
                }
            }
        });
    }
    #[cfg(not(feature = "profiling"))]
    {
        ui.label("Profiling feature is disabled in this build.");
    }
}
