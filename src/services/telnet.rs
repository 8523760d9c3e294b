//! Telnet-style TCP line console.
//!
//! One client at a time. Further connections get a one-line refusal and
//! are closed. All sockets are non-blocking; [`TcpConsole::poll`] does the
//! accepting and reading and is called once per main-loop tick.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use crate::traits::ConsoleTransport;

/// Default listening port.
pub const DEFAULT_CONSOLE_PORT: u16 = 23;

/// Longest line kept; longer input is cut.
const MAX_LINE: usize = 256;

/// [`ConsoleTransport`] over TCP.
#[derive(Debug)]
pub struct TcpConsole {
    bind: SocketAddr,
    listener: Option<TcpListener>,
    client: Option<TcpStream>,
    partial: Vec<u8>,
    lines: VecDeque<String>,
}

impl TcpConsole {
    /// Console that will listen on `bind` once started.
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            listener: None,
            client: None,
            partial: Vec::new(),
            lines: VecDeque::new(),
        }
    }

    /// Console on all interfaces at `port`.
    pub fn on_port(port: u16) -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    /// Address actually bound, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    fn accept_pending(&mut self) {
        let Some(listener) = &self.listener else {
            return;
        };
        loop {
            match listener.accept() {
                Ok((mut stream, peer)) => {
                    if self.client.is_some() {
                        log::info!("console: refusing {}, session busy", peer);
                        let _ = stream.write_all(b"console busy\r\n");
                        let _ = stream.shutdown(Shutdown::Both);
                        continue;
                    }
                    if let Err(e) = stream.set_nonblocking(true) {
                        log::warn!("console: cannot use {}: {}", peer, e);
                        continue;
                    }
                    log::info!("console: client {} connected", peer);
                    self.partial.clear();
                    self.client = Some(stream);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("console: accept failed: {}", e);
                    break;
                }
            }
        }
    }

    fn read_client(&mut self) {
        let Some(stream) = &mut self.client else {
            return;
        };
        let mut buf = [0u8; 128];
        let mut closed = false;
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => {
                    for &byte in &buf[..n] {
                        match byte {
                            b'\n' => {
                                let line = String::from_utf8_lossy(&self.partial)
                                    .trim_end_matches('\r')
                                    .to_string();
                                self.lines.push_back(line);
                                self.partial.clear();
                            }
                            _ if self.partial.len() < MAX_LINE => self.partial.push(byte),
                            _ => {}
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("console: read failed: {}", e);
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            log::info!("console: client disconnected");
            self.client = None;
            self.partial.clear();
        }
    }
}

impl ConsoleTransport for TcpConsole {
    type Error = io::Error;

    fn start(&mut self, device_name: &str) -> Result<(), io::Error> {
        if self.listener.is_some() {
            return Ok(());
        }
        let listener = TcpListener::bind(self.bind)?;
        listener.set_nonblocking(true)?;
        log::info!(
            "console: '{}' listening on {}",
            device_name,
            listener.local_addr()?
        );
        self.listener = Some(listener);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut stream) = self.client.take() {
            let _ = stream.write_all(b"console closed\r\n");
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.listener = None;
        self.partial.clear();
        self.lines.clear();
    }

    fn poll(&mut self) {
        self.accept_pending();
        self.read_client();
    }

    fn has_client(&self) -> bool {
        self.client.is_some()
    }

    fn read_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    fn write_line(&mut self, line: &str) {
        let Some(stream) = &mut self.client else {
            return;
        };
        let result = stream
            .write_all(line.as_bytes())
            .and_then(|()| stream.write_all(b"\r\n"));
        if let Err(e) = result {
            log::debug!("console: write failed: {}", e);
            self.client = None;
        }
    }
}
