//! Axum configuration portal for the desktop build.
//!
//! Routes:
//! - GET `/` - settings form, pre-filled with the current settings
//! - POST `/save` - urlencoded form submission
//!
//! The server runs on its own thread with a single-threaded Tokio runtime
//! while the console is open. Accepted submissions wait in a [`PortalState`]
//! until the main loop collects them with [`ConfigPortal::take_submission`].

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};

use crate::portal::{escape_html, render_form, PortalForm, PortalState, SAVED_PAGE};
use crate::settings::Settings;
use crate::traits::ConfigPortal;

/// Default portal port.
pub const DEFAULT_PORTAL_PORT: u16 = 8080;

// ============================================================================
// Route Handlers
// ============================================================================

/// GET / - settings form
async fn index(State(state): State<Arc<PortalState>>) -> Html<String> {
    Html(render_form(&state.current()))
}

/// POST /save - apply a form submission
///
/// Decoded with the same parser the ESP32 portal uses.
async fn save(State(state): State<Arc<PortalState>>, body: Bytes) -> Response {
    let body_str = std::str::from_utf8(&body).unwrap_or("");
    let form = PortalForm::from_urlencoded(body_str);

    match state.submit(&form) {
        Ok(settings) => {
            log::info!("portal: accepted settings for '{}'", settings.device_name);
            Html(SAVED_PAGE).into_response()
        }
        Err(e) => {
            log::info!("portal: rejected submission: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Html(format!(
                    "<!DOCTYPE html>\n<html><body><p>{}</p><p><a href=\"/\">Back</a></p></body></html>\n",
                    escape_html(&e.to_string())
                )),
            )
                .into_response()
        }
    }
}

/// Fallback handler for 404
async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

// ============================================================================
// Server Builder
// ============================================================================

/// Configuration for the portal server
#[derive(Debug, Clone)]
pub struct WebPortalConfig {
    /// Address to bind to
    pub addr: SocketAddr,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
}

impl Default for WebPortalConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORTAL_PORT)),
            cors_permissive: false,
        }
    }
}

impl WebPortalConfig {
    /// Create a new config with the given address
    pub fn new(addr: impl Into<SocketAddr>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Set whether CORS should be permissive
    pub fn cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }
}

/// Build the Axum router with all routes
pub fn build_router(state: Arc<PortalState>, config: &WebPortalConfig) -> Router {
    let mut router = Router::new()
        .route("/", get(index))
        .route("/save", post(save))
        .fallback(not_found)
        .with_state(state);

    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

// ============================================================================
// Portal
// ============================================================================

struct Running {
    state: Arc<PortalState>,
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

/// [`ConfigPortal`] serving the settings form over HTTP.
pub struct WebPortal {
    config: WebPortalConfig,
    running: Option<Running>,
}

impl Default for WebPortal {
    fn default() -> Self {
        Self::new(WebPortalConfig::default())
    }
}

impl WebPortal {
    /// Portal that will serve on `config.addr` once started.
    pub fn new(config: WebPortalConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    /// Address actually bound, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Whether the server thread is up.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl ConfigPortal for WebPortal {
    type Error = io::Error;

    fn start(&mut self, settings: &Settings) -> Result<(), io::Error> {
        if self.running.is_some() {
            return Ok(());
        }

        // Bind here so address errors reach the caller
        let listener = std::net::TcpListener::bind(self.config.addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let state = Arc::new(PortalState::new(settings.clone()));
        let router = build_router(Arc::clone(&state), &self.config);
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name("portal".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        log::warn!("portal: cannot build runtime: {}", e);
                        return;
                    }
                };
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(l) => l,
                        Err(e) => {
                            log::warn!("portal: cannot adopt listener: {}", e);
                            return;
                        }
                    };
                    let result = axum::serve(listener, router)
                        .with_graceful_shutdown(async move {
                            let _ = shutdown_rx.await;
                        })
                        .await;
                    if let Err(e) = result {
                        log::warn!("portal: server error: {}", e);
                    }
                });
            })?;

        log::info!("portal: serving on http://{}", local_addr);
        self.running = Some(Running {
            state,
            local_addr,
            shutdown,
            thread,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.shutdown.send(());
        if running.thread.join().is_err() {
            log::warn!("portal: server thread panicked");
        }
        log::info!("portal: stopped");
    }

    fn take_submission(&mut self) -> Option<Settings> {
        self.running.as_ref()?.state.take_pending()
    }
}

impl Drop for WebPortal {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_portal_has_no_submission() {
        let mut portal = WebPortal::new(WebPortalConfig::new(([127, 0, 0, 1], 0)));
        assert!(portal.take_submission().is_none());
        portal.stop();
        assert!(!portal.is_running());
    }
}
