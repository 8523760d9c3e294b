//! Access point and HTTP settings form for ESP32.
//!
//! While the console is open the radio also runs an open access point named
//! after the device, and an `EspHttpServer` serves the same form as the
//! desktop portal. Submissions are queued in a [`PortalState`] for the main
//! loop; the handlers never touch device state.
//!
//! # Endpoints
//!
//! - `GET /` - settings form
//! - `POST /save` - urlencoded form submission

use std::sync::Arc;

use esp_idf_hal::io::{Read, Write};
use esp_idf_svc::http::server::{Configuration, EspHttpServer};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::EspIOError;

use super::wifi::SharedRadio;
use crate::portal::{escape_html, render_form, PortalForm, PortalState, SAVED_PAGE};
use crate::settings::Settings;
use crate::traits::ConfigPortal;

/// Largest form body accepted.
const MAX_BODY: usize = 1024;

/// Error type for the ESP32 portal.
#[derive(Debug, thiserror::Error)]
pub enum Esp32PortalError {
    /// Radio or HTTP server setup failed.
    #[error("portal: {0}")]
    Esp(#[from] esp_idf_hal::sys::EspError),
    /// Handler registration failed.
    #[error("portal: {0}")]
    Io(#[from] EspIOError),
}

struct Running {
    _server: EspHttpServer<'static>,
    state: Arc<PortalState>,
}

/// [`ConfigPortal`] on the ESP32 soft access point.
pub struct Esp32Portal {
    radio: SharedRadio,
    http_port: u16,
    running: Option<Running>,
}

impl Esp32Portal {
    /// Portal on `radio`, serving HTTP on `http_port`.
    pub fn new(radio: SharedRadio, http_port: u16) -> Self {
        Self {
            radio,
            http_port,
            running: None,
        }
    }

    fn serve(&self, state: &Arc<PortalState>) -> Result<EspHttpServer<'static>, Esp32PortalError> {
        let server_config = Configuration {
            http_port: self.http_port,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&server_config)?;

        let state_for_get = Arc::clone(state);
        let state_for_save = Arc::clone(state);

        // GET / - settings form (shared with desktop)
        server.fn_handler("/", Method::Get, move |req| {
            let html = render_form(&state_for_get.current());
            let mut resp = req.into_response(200, None, &[("Content-Type", "text/html")])?;
            resp.write_all(html.as_bytes())?;
            Ok::<_, EspIOError>(())
        })?;

        // POST /save - form submission
        server.fn_handler("/save", Method::Post, move |mut req| {
            let mut buf = [0u8; MAX_BODY];
            let mut len = 0;
            while len < buf.len() {
                match req.read(&mut buf[len..]) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => len += n,
                }
            }
            let body = core::str::from_utf8(&buf[..len]).unwrap_or("");
            let form = PortalForm::from_urlencoded(body);

            match state_for_save.submit(&form) {
                Ok(_) => {
                    let mut resp =
                        req.into_response(200, None, &[("Content-Type", "text/html")])?;
                    resp.write_all(SAVED_PAGE.as_bytes())?;
                }
                Err(e) => {
                    let page = format!(
                        "<p>{}</p><p><a href=\"/\">Back</a></p>",
                        escape_html(&e.to_string())
                    );
                    let mut resp =
                        req.into_response(400, None, &[("Content-Type", "text/html")])?;
                    resp.write_all(page.as_bytes())?;
                }
            }
            Ok::<_, EspIOError>(())
        })?;

        Ok(server)
    }
}

impl ConfigPortal for Esp32Portal {
    type Error = Esp32PortalError;

    fn start(&mut self, settings: &Settings) -> Result<(), Esp32PortalError> {
        if self.running.is_some() {
            return Ok(());
        }
        self.radio.open_access_point(&settings.device_name)?;

        let state = Arc::new(PortalState::new(settings.clone()));
        let server = match self.serve(&state) {
            Ok(server) => server,
            Err(e) => {
                let _ = self.radio.close_access_point();
                return Err(e);
            }
        };

        log::info!(
            "portal: access point '{}' up, form on port {}",
            settings.device_name,
            self.http_port
        );
        self.running = Some(Running {
            _server: server,
            state,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if self.running.take().is_none() {
            return;
        }
        if let Err(e) = self.radio.close_access_point() {
            log::warn!("portal: cannot close access point: {:?}", e);
        }
        log::info!("portal: stopped");
    }

    fn take_submission(&mut self) -> Option<Settings> {
        self.running.as_ref()?.state.take_pending()
    }

    fn has_client(&self) -> bool {
        self.running.is_some() && self.radio.access_point_clients() > 0
    }
}
