//! Configuration console command grammar.
//!
//! Lines are whitespace-tokenized; the first token names the command. Most
//! setting commands have a read form (no argument, echoes the current
//! value) and a write form (argument given, updates and persists). A lone
//! `-` clears a value.
//!
//! ```text
//! help                         on | off | status
//! device-name [name]           wifi <ssid> [password]   wifi-status
//! mqtt-server [host]           mqtt-port [1-65535]      mqtt-id [id]
//! mqtt-auth <user> [password]  mqtt-control-topic [t]   mqtt-status-topic [t]
//! mqtt-status
//! ```
//!
//! Execution never touches the network. It returns a [`CommandEffect`]
//! telling the caller what to persist and which links to restart.

extern crate alloc;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::flags::SharedFlags;
use crate::publisher::status_payload;
use crate::settings::{long_string, short_string, Settings};
use crate::supervisor::LinkState;
use crate::traits::LinkStatus;

/// Token that clears a value in the write form.
pub const CLEAR_TOKEN: &str = "-";

/// Console input that could not be executed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    /// First token is not a known command.
    #[error("unknown command '{0}', try 'help'")]
    UnknownCommand(String),
    /// A required argument was not given.
    #[error("usage: {0}")]
    MissingArgument(&'static str),
    /// More arguments than the command takes.
    #[error("usage: {0}")]
    TooManyArguments(&'static str),
    /// Port is not a number in 1..=65535.
    #[error("invalid port '{0}', expected 1-65535")]
    InvalidPort(String),
}

/// A parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// List commands.
    Help,
    /// Energize the relay.
    On,
    /// De-energize the relay.
    Off,
    /// Power and link summary.
    Status,
    /// Read or set the device name.
    DeviceName(Option<&'a str>),
    /// Read or set the broker host.
    MqttServer(Option<&'a str>),
    /// Read or set the broker port.
    MqttPort(Option<u16>),
    /// Read or set the explicit client id.
    MqttId(Option<&'a str>),
    /// Read or set broker credentials.
    MqttAuth(Option<(&'a str, Option<&'a str>)>),
    /// Read or set the control topic.
    MqttControlTopic(Option<&'a str>),
    /// Read or set the status topic.
    MqttStatusTopic(Option<&'a str>),
    /// Bus link report.
    MqttStatus,
    /// Read or set WiFi credentials.
    Wifi(Option<(&'a str, Option<&'a str>)>),
    /// WiFi link report.
    WifiStatus,
}

const HELP: &[&str] = &[
    "commands:",
    "  on | off                     switch the relay",
    "  status                       power and link summary",
    "  device-name [name]",
    "  wifi <ssid> [password]       set network, reconnects",
    "  wifi-status",
    "  mqtt-server [host]",
    "  mqtt-port [1-65535]",
    "  mqtt-id [id]",
    "  mqtt-auth <user> [password]",
    "  mqtt-control-topic [topic]",
    "  mqtt-status-topic [topic]",
    "  mqtt-status",
    "use '-' to clear a value",
];

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command<'_>>, ConsoleError> {
    let mut tokens = line.split_whitespace();
    let Some(name) = tokens.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = tokens.collect();

    let command = match name.to_ascii_lowercase().as_str() {
        "help" | "?" => no_args(&args, "help", Command::Help)?,
        "on" => no_args(&args, "on", Command::On)?,
        "off" => no_args(&args, "off", Command::Off)?,
        "status" => no_args(&args, "status", Command::Status)?,
        "mqtt-status" => no_args(&args, "mqtt-status", Command::MqttStatus)?,
        "wifi-status" => no_args(&args, "wifi-status", Command::WifiStatus)?,
        "device-name" => Command::DeviceName(one_arg(&args, "device-name [name]")?),
        "mqtt-server" => Command::MqttServer(one_arg(&args, "mqtt-server [host]")?),
        "mqtt-id" => Command::MqttId(one_arg(&args, "mqtt-id [id]")?),
        "mqtt-control-topic" => {
            Command::MqttControlTopic(one_arg(&args, "mqtt-control-topic [topic]")?)
        }
        "mqtt-status-topic" => {
            Command::MqttStatusTopic(one_arg(&args, "mqtt-status-topic [topic]")?)
        }
        "mqtt-port" => match one_arg(&args, "mqtt-port [1-65535]")? {
            None => Command::MqttPort(None),
            Some(raw) => Command::MqttPort(Some(parse_port(raw)?)),
        },
        "mqtt-auth" => Command::MqttAuth(pair_args(&args, "mqtt-auth <user> [password]")?),
        "wifi" => match pair_args(&args, "wifi <ssid> [password]")? {
            None => return Err(ConsoleError::MissingArgument("wifi <ssid> [password]")),
            some => Command::Wifi(some),
        },
        _ => return Err(ConsoleError::UnknownCommand(name.to_string())),
    };
    Ok(Some(command))
}

fn no_args<'a>(
    args: &[&str],
    usage: &'static str,
    command: Command<'a>,
) -> Result<Command<'a>, ConsoleError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(ConsoleError::TooManyArguments(usage))
    }
}

fn one_arg<'a>(args: &[&'a str], usage: &'static str) -> Result<Option<&'a str>, ConsoleError> {
    match args {
        [] => Ok(None),
        [value] => Ok(Some(*value)),
        _ => Err(ConsoleError::TooManyArguments(usage)),
    }
}

fn pair_args<'a>(
    args: &[&'a str],
    usage: &'static str,
) -> Result<Option<(&'a str, Option<&'a str>)>, ConsoleError> {
    match args {
        [] => Ok(None),
        [first] => Ok(Some((*first, None))),
        [first, second] => Ok(Some((*first, Some(*second)))),
        _ => Err(ConsoleError::TooManyArguments(usage)),
    }
}

fn parse_port(raw: &str) -> Result<u16, ConsoleError> {
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConsoleError::InvalidPort(raw.to_string())),
    }
}

fn cleared(value: &str) -> &str {
    if value == CLEAR_TOKEN {
        ""
    } else {
        value
    }
}

// ============================================================================
// Execution
// ============================================================================

/// What the caller must do after a command ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandEffect {
    /// Settings changed and should be saved.
    pub persist: bool,
    /// Restart the WiFi link (which also restarts the bus).
    pub restart_wifi: bool,
    /// Restart the bus session.
    pub restart_bus: bool,
}

impl CommandEffect {
    const NONE: Self = Self {
        persist: false,
        restart_wifi: false,
        restart_bus: false,
    };

    const BUS: Self = Self {
        persist: true,
        restart_wifi: false,
        restart_bus: true,
    };

    const WIFI: Self = Self {
        persist: true,
        restart_wifi: true,
        restart_bus: false,
    };

    /// Combine two effects.
    pub fn merge(self, other: Self) -> Self {
        Self {
            persist: self.persist || other.persist,
            restart_wifi: self.restart_wifi || other.restart_wifi,
            restart_bus: self.restart_bus || other.restart_bus,
        }
    }

    /// Whether nothing needs doing.
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// One link as seen by the status reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkView {
    /// Supervisor state.
    pub state: LinkState,
    /// Driver-reported status.
    pub status: LinkStatus,
    /// Milliseconds since the last connection attempt.
    pub since_attempt: Option<u32>,
}

/// Link snapshot handed to the status commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// WiFi station.
    pub wifi: LinkView,
    /// MQTT session.
    pub bus: LinkView,
}

/// Reply lines plus follow-up work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Lines to write back to the session.
    pub reply: Vec<String>,
    /// Follow-up work for the caller.
    pub effect: CommandEffect,
}

impl CommandOutcome {
    fn line(line: String) -> Self {
        Self {
            reply: alloc::vec![line],
            effect: CommandEffect::NONE,
        }
    }

    fn with(mut self, effect: CommandEffect) -> Self {
        self.effect = effect;
        self
    }
}

/// Run a parsed command against the live settings and flags.
pub fn execute(
    command: Command<'_>,
    settings: &mut Settings,
    flags: &SharedFlags,
    links: &LinkReport,
) -> CommandOutcome {
    match command {
        Command::Help => CommandOutcome {
            reply: HELP.iter().map(|l| l.to_string()).collect(),
            effect: CommandEffect::NONE,
        },
        Command::On | Command::Off => {
            let on = command == Command::On;
            flags.set_power(on);
            CommandOutcome::line(format!("power: {}", status_payload(on)))
        }
        Command::Status => CommandOutcome {
            reply: alloc::vec![
                format!("device: {}", settings.device_name),
                format!("power: {}", status_payload(flags.power())),
                format!("wifi: {}", links.wifi.state.as_str()),
                format!("mqtt: {}", links.bus.state.as_str()),
            ],
            effect: CommandEffect::NONE,
        },
        Command::DeviceName(value) => {
            if let Some(v) = value {
                settings.device_name = short_string(cleared(v));
            }
            let out = CommandOutcome::line(format!("device-name: {}", settings.device_name));
            if value.is_some() {
                out.with(CommandEffect::BUS)
            } else {
                out
            }
        }
        Command::MqttServer(value) => {
            if let Some(v) = value {
                settings.mqtt_server = short_string(cleared(v));
            }
            let out = CommandOutcome::line(format!("mqtt-server: {}", settings.mqtt_server));
            if value.is_some() {
                out.with(CommandEffect::BUS)
            } else {
                out
            }
        }
        Command::MqttPort(value) => {
            if let Some(port) = value {
                settings.mqtt_port = port;
            }
            let out = CommandOutcome::line(format!("mqtt-port: {}", settings.mqtt_port));
            if value.is_some() {
                out.with(CommandEffect::BUS)
            } else {
                out
            }
        }
        Command::MqttId(value) => {
            if let Some(v) = value {
                settings.mqtt_id = short_string(cleared(v));
            }
            let out = CommandOutcome::line(format!(
                "mqtt-id: {} (using '{}')",
                settings.mqtt_id,
                settings.client_id()
            ));
            if value.is_some() {
                out.with(CommandEffect::BUS)
            } else {
                out
            }
        }
        Command::MqttAuth(value) => {
            if let Some((user, password)) = value {
                settings.mqtt_user = short_string(cleared(user));
                settings.mqtt_password = short_string(cleared(password.unwrap_or(CLEAR_TOKEN)));
            }
            let password = if settings.mqtt_password.is_empty() {
                "none"
            } else {
                "set"
            };
            let out = CommandOutcome::line(format!(
                "mqtt-auth: {} (password {})",
                settings.mqtt_user,
                password
            ));
            if value.is_some() {
                out.with(CommandEffect::BUS)
            } else {
                out
            }
        }
        Command::MqttControlTopic(value) => {
            if let Some(v) = value {
                settings.control_topic = long_string(cleared(v));
            }
            let out = CommandOutcome::line(format!(
                "mqtt-control-topic: {}",
                settings.control_topic
            ));
            if value.is_some() {
                out.with(CommandEffect::BUS)
            } else {
                out
            }
        }
        Command::MqttStatusTopic(value) => {
            if let Some(v) = value {
                settings.status_topic = long_string(cleared(v));
            }
            let out = CommandOutcome::line(format!(
                "mqtt-status-topic: {}",
                settings.status_topic
            ));
            if value.is_some() {
                out.with(CommandEffect::BUS)
            } else {
                out
            }
        }
        Command::MqttStatus => CommandOutcome {
            reply: alloc::vec![
                format!(
                    "mqtt: {} ({})",
                    links.bus.state.as_str(),
                    links.bus.status.as_str()
                ),
                format!(
                    "broker: {}:{}",
                    settings.mqtt_server,
                    settings.mqtt_port
                ),
                format!("client-id: {}", settings.client_id()),
                format!("control: {}", settings.control_topic),
                format!("status: {}", settings.status_topic),
                attempt_line(links.bus.since_attempt),
            ],
            effect: CommandEffect::NONE,
        },
        Command::Wifi(value) => {
            if let Some((ssid, password)) = value {
                settings.wifi_ssid = short_string(cleared(ssid));
                settings.wifi_password = short_string(cleared(password.unwrap_or(CLEAR_TOKEN)));
            }
            let out = CommandOutcome::line(format!("wifi: {}", settings.wifi_ssid));
            if value.is_some() {
                out.with(CommandEffect::WIFI)
            } else {
                out
            }
        }
        Command::WifiStatus => CommandOutcome {
            reply: alloc::vec![
                format!(
                    "wifi: {} ({})",
                    links.wifi.state.as_str(),
                    links.wifi.status.as_str()
                ),
                format!("ssid: {}", settings.wifi_ssid),
                attempt_line(links.wifi.since_attempt),
            ],
            effect: CommandEffect::NONE,
        },
    }
}

fn attempt_line(since: Option<u32>) -> String {
    match since {
        Some(ms) => format!("last attempt: {} s ago", ms / 1_000),
        None => "last attempt: never".to_string(),
    }
}

/// Parse and execute one line, rendering errors as a reply.
pub fn handle_line(
    line: &str,
    settings: &mut Settings,
    flags: &SharedFlags,
    links: &LinkReport,
) -> CommandOutcome {
    match parse(line) {
        Ok(Some(command)) => execute(command, settings, flags, links),
        Ok(None) => CommandOutcome::default(),
        Err(e) => {
            log::debug!("console: rejected '{}': {}", line.trim(), e);
            CommandOutcome::line(format!("error: {}", e))
        }
    }
}
