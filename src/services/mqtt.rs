//! `rumqttc` transport for the desktop build.
//!
//! Each [`MqttClient::connect`] builds a fresh synchronous `rumqttc`
//! client and hands its `Connection` to a background thread. The thread
//! reports session state through an atomic and forwards inbound publishes
//! over a channel, so every trait call returns immediately.
//!
//! The thread ends on the first connection error instead of letting
//! `rumqttc` reconnect on its own; retries belong to the bus supervisor.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rumqttc::{
    Client, ConnectReturnCode, Connection, Event, LastWill, MqttOptions, NetworkOptions, Packet,
    QoS,
};

use crate::traits::{ConnectOptions, LinkStatus, MqttClient, MqttMessage, Qos};

/// Outgoing request queue depth.
const REQUEST_CAPACITY: usize = 16;

const SESSION_IDLE: u8 = 0;
const SESSION_CONNECTING: u8 = 1;
const SESSION_UP: u8 = 2;
const SESSION_FAILED: u8 = 3;
const SESSION_LOST: u8 = 4;

/// Errors from the rumqttc transport.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// No session has been started.
    #[error("not connected")]
    NotConnected,
    /// rumqttc rejects empty ids and ids with leading spaces.
    #[error("invalid client id '{0}'")]
    InvalidClientId(String),
    /// The request queue rejected the operation.
    #[error("mqtt client: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// [`MqttClient`] backed by `rumqttc`.
pub struct RumqttcClient {
    client: Option<Client>,
    session: Arc<AtomicU8>,
    message_rx: Option<Receiver<MqttMessage>>,
}

impl Default for RumqttcClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RumqttcClient {
    /// Client with no session.
    pub fn new() -> Self {
        Self {
            client: None,
            session: Arc::new(AtomicU8::new(SESSION_IDLE)),
            message_rx: None,
        }
    }

    fn client(&mut self) -> Result<&mut Client, BusError> {
        self.client.as_mut().ok_or(BusError::NotConnected)
    }
}

fn qos(level: Qos) -> QoS {
    match level {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
    }
}

/// Translate connection options into `rumqttc` terms.
pub fn mqtt_options(options: &ConnectOptions<'_>) -> MqttOptions {
    let mut mqtt = MqttOptions::new(options.client_id, options.host, options.port);
    mqtt.set_keep_alive(Duration::from_secs(u64::from(options.keep_alive_secs)));
    mqtt.set_clean_session(true);
    if let Some(user) = options.username {
        mqtt.set_credentials(user, options.password.unwrap_or(""));
    }
    if let Some(will) = options.last_will {
        mqtt.set_last_will(LastWill::new(
            will.topic,
            will.payload.to_vec(),
            qos(will.qos),
            will.retain,
        ));
    }
    mqtt
}

impl MqttClient for RumqttcClient {
    type Error = BusError;

    fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), BusError> {
        // Drop any previous session before starting a new one
        self.disconnect();
        if options.client_id.is_empty() || options.client_id.starts_with(' ') {
            return Err(BusError::InvalidClientId(options.client_id.to_string()));
        }

        let (client, mut connection) = Client::new(mqtt_options(options), REQUEST_CAPACITY);
        let mut network = NetworkOptions::new();
        network.set_connection_timeout(u64::from(options.socket_timeout_ms / 1_000).max(1));
        connection.eventloop.set_network_options(network);

        // A fresh flag per session so a lingering thread cannot report into
        // the next one
        let session = Arc::new(AtomicU8::new(SESSION_CONNECTING));
        let (message_tx, message_rx) = channel();
        let thread_session = Arc::clone(&session);
        thread::Builder::new()
            .name("mqtt-session".into())
            .spawn(move || run_session(&mut connection, &thread_session, &message_tx))
            .map_err(|e| {
                log::warn!("mqtt: cannot spawn session thread: {}", e);
                BusError::NotConnected
            })?;

        self.client = Some(client);
        self.session = session;
        self.message_rx = Some(message_rx);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            let _ = client.try_disconnect();
        }
        self.message_rx = None;
        self.session = Arc::new(AtomicU8::new(SESSION_IDLE));
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BusError> {
        let level = if retain {
            QoS::AtLeastOnce
        } else {
            QoS::AtMostOnce
        };
        self.client()?
            .try_publish(topic, level, retain, payload.to_vec())?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        self.client()?.try_subscribe(topic, QoS::AtLeastOnce)?;
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

fn run_session(connection: &mut Connection, session: &AtomicU8, message_tx: &Sender<MqttMessage>) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    session.store(SESSION_UP, Ordering::Release);
                } else {
                    log::warn!("mqtt: broker refused session: {:?}", ack.code);
                    session.store(SESSION_FAILED, Ordering::Release);
                    return;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = MqttMessage::new(publish.topic, publish.payload.to_vec());
                if message_tx.send(msg).is_err() {
                    // Owner moved on to another session
                    return;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                session.store(SESSION_LOST, Ordering::Release);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("mqtt: connection error: {}", e);
                let next = if session.load(Ordering::Acquire) == SESSION_UP {
                    SESSION_LOST
                } else {
                    SESSION_FAILED
                };
                session.store(next, Ordering::Release);
                return;
            }
        }
    }
}
