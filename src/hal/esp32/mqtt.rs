//! MQTT client for ESP32.
//!
//! Wraps the esp-idf MQTT client behind the [`MqttClient`] trait. Each
//! `connect` creates a fresh client with the last will configured; a
//! background thread drains the connection events, tracks the session
//! state and queues inbound publishes for `try_recv()`.
//!
//! # Example
//!
//! ```ignore
//! use relay_switch::hal::esp32::Esp32Mqtt;
//! use relay_switch::traits::MqttClient;
//!
//! let mut mqtt = Esp32Mqtt::new();
//! mqtt.connect(&options)?;
//! // later, once is_connected():
//! mqtt.publish("porch/status", b"ON", true)?;
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, LwtConfiguration, MqttClientConfiguration,
    QoS,
};
use esp_idf_hal::sys::EspError;

use crate::traits::{ConnectOptions, LinkStatus, MqttClient, MqttMessage, Qos};

const SESSION_IDLE: u8 = 0;
const SESSION_CONNECTING: u8 = 1;
const SESSION_UP: u8 = 2;
const SESSION_FAILED: u8 = 3;
const SESSION_LOST: u8 = 4;

/// Stack for the event thread.
const EVENT_STACK_SIZE: usize = 6 * 1024;

/// Error type for ESP32 MQTT operations.
#[derive(Debug, thiserror::Error)]
pub enum Esp32MqttError {
    /// No client has been created.
    #[error("not connected")]
    NotConnected,
    /// The esp-idf client reported an error.
    #[error("mqtt: {0}")]
    Esp(#[from] EspError),
    /// The event thread could not be started.
    #[error("mqtt: cannot start event thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// MQTT client for the switch's control and status topics.
pub struct Esp32Mqtt {
    client: Option<EspMqttClient<'static>>,
    session: Arc<AtomicU8>,
    message_rx: Option<Receiver<MqttMessage>>,
}

impl Default for Esp32Mqtt {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Mqtt {
    /// Client with no session.
    pub fn new() -> Self {
        Self {
            client: None,
            session: Arc::new(AtomicU8::new(SESSION_IDLE)),
            message_rx: None,
        }
    }

    fn client(&mut self) -> Result<&mut EspMqttClient<'static>, Esp32MqttError> {
        self.client.as_mut().ok_or(Esp32MqttError::NotConnected)
    }
}

fn qos(level: Qos) -> QoS {
    match level {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
    }
}

// ============================================================================
// MqttClient Trait Implementation
// ============================================================================

/// Client configuration for one supervised session.
///
/// The driver's own reconnect loop is off: a dropped session stays down
/// until the bus supervisor's retry gate calls `connect` again.
fn session_config<'a>(options: &ConnectOptions<'a>) -> MqttClientConfiguration<'a> {
    let lwt = options.last_will.map(|will| LwtConfiguration {
        topic: will.topic,
        payload: will.payload,
        qos: qos(will.qos),
        retain: will.retain,
    });
    MqttClientConfiguration {
        client_id: Some(options.client_id),
        username: options.username,
        password: options.password,
        lwt,
        keep_alive_interval: Some(Duration::from_secs(u64::from(options.keep_alive_secs))),
        network_timeout: Duration::from_millis(u64::from(options.socket_timeout_ms)),
        disable_auto_reconnect: true,
        ..Default::default()
    }
}

impl MqttClient for Esp32Mqtt {
    type Error = Esp32MqttError;

    fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), Self::Error> {
        self.disconnect();

        let broker_url = format!("mqtt://{}:{}", options.host, options.port);
        let mqtt_config = session_config(options);

        let (client, mut connection) = EspMqttClient::new(&broker_url, &mqtt_config)?;

        // A fresh flag per session so a lingering thread cannot report into
        // the next one
        let session = Arc::new(AtomicU8::new(SESSION_CONNECTING));
        let (message_tx, message_rx) = channel::<MqttMessage>();
        let thread_session = Arc::clone(&session);
        thread::Builder::new()
            .name("mqtt-events".into())
            .stack_size(EVENT_STACK_SIZE)
            .spawn(move || handle_mqtt_events(&mut connection, &thread_session, &message_tx))?;

        log::info!("mqtt: connecting to {}", broker_url);
        self.client = Some(client);
        self.session = session;
        self.message_rx = Some(message_rx);
        Ok(())
    }

    fn disconnect(&mut self) {
        // Dropping the client closes the connection and ends the event thread
        self.client = None;
        self.message_rx = None;
        self.session = Arc::new(AtomicU8::new(SESSION_IDLE));
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        let qos = if retain {
            QoS::AtLeastOnce
        } else {
            QoS::AtMostOnce
        };
        self.client()?.enqueue(topic, qos, retain, payload)?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.client()?.subscribe(topic, QoS::AtLeastOnce)?;
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        let rx = self.message_rx.as_ref()?;
        match rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.message_rx = None;
                None
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.session.load(Ordering::Acquire) == SESSION_UP
    }

    fn status(&self) -> LinkStatus {
        match self.session.load(Ordering::Acquire) {
            SESSION_CONNECTING => LinkStatus::Connecting,
            SESSION_UP => LinkStatus::Connected,
            SESSION_FAILED => LinkStatus::Failed,
            SESSION_LOST => LinkStatus::Lost,
            _ => LinkStatus::Idle,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn handle_mqtt_events(
    connection: &mut EspMqttConnection,
    session: &AtomicU8,
    message_tx: &Sender<MqttMessage>,
) {
    loop {
        match connection.next() {
            Err(_) => {
                // Client dropped; connection closed
                return;
            }
            Ok(event) => match event.payload() {
                EventPayload::Connected(_) => {
                    session.store(SESSION_UP, Ordering::Release);
                }
                EventPayload::Disconnected => {
                    let next = if session.load(Ordering::Acquire) == SESSION_UP {
                        SESSION_LOST
                    } else {
                        SESSION_FAILED
                    };
                    session.store(next, Ordering::Release);
                }
                EventPayload::Error(e) => {
                    log::warn!("mqtt: {:?}", e);
                }
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    ..
                } => {
                    let msg = MqttMessage::new(topic.to_string(), data.to_vec());
                    if message_tx.send(msg).is_err() {
                        return;
                    }
                }
                _ => {}
            },
        }
    }
}
