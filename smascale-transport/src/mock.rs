//! In-memory fake scale for offline testing
//!
//! [`MockScale`] is a [`Link`] that answers every SMA command the way a
//! healthy device would. Clones share state, so a test can keep one handle
//! for inspection and hand another to a [`Connection`](crate::Connection).

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::Mutex;

use smascale_core::Command;

use crate::{Link, error::*};

#[derive(Debug)]
struct State {
    online: bool,
    silent: bool,
    connected: bool,
    latency: Duration,
    weight_frames: VecDeque<String>,
    model: String,
    serial: String,
    software: String,
    tare_response: String,
    /// Command written but not yet read back
    pending: Option<Command>,
    /// A reply is being produced
    replying: bool,
    interleaved: bool,
    connects: usize,
    exchanges: Vec<(Command, String)>,
}

/// Fake scale speaking the SMA protocol
#[derive(Debug, Clone)]
pub struct MockScale {
    state: Arc<Mutex<State>>,
}

impl MockScale {
    /// Online scale reporting a stable net weight of 0.1234 g
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                online: true,
                silent: false,
                connected: false,
                latency: Duration::ZERO,
                weight_frames: VecDeque::from(["N     +   0.1234 g  \r\n".to_string()]),
                model: "SIWADCP-1-".into(),
                serial: "37454321".into(),
                software: "00-37-09".into(),
                tare_response: "\r\n".into(),
                pending: None,
                replying: false,
                interleaved: false,
                connects: 0,
                exchanges: Vec::new(),
            })),
        }
    }

    /// Replace the weight frames; each is served once, the last one repeats
    pub fn with_weight_frames<I, S>(self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = self.state.lock();
            state.weight_frames = frames.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Set the raw responses to the three info queries, terminators excluded
    pub fn with_info(self, model: &str, serial: &str, software: &str) -> Self {
        {
            let mut state = self.state.lock();
            state.model = model.into();
            state.serial = serial.into();
            state.software = software.into();
        }
        self
    }

    /// Delay every reply
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    /// Change the reply delay of a running scale
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Take the device off the network; an open link is dropped
    pub fn set_online(&self, online: bool) {
        let mut state = self.state.lock();
        state.online = online;
        if !online {
            state.connected = false;
        }
    }

    /// Stop answering; reads hang until the caller times out
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// Queue another weight frame
    pub fn push_weight_frame(&self, frame: impl Into<String>) {
        self.state.lock().weight_frames.push_back(frame.into());
    }

    /// Number of successful connects
    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Completed `(command, response)` pairs, in order
    pub fn exchanges(&self) -> Vec<(Command, String)> {
        self.state.lock().exchanges.clone()
    }

    /// `true` if a command was written before the previous one was answered
    pub fn interleaved(&self) -> bool {
        self.state.lock().interleaved
    }

    /// Response the scale gives to `command` right now, without consuming it
    pub fn response_for(&self, command: Command) -> String {
        let state = self.state.lock();
        match command {
            Command::ReadWeight => state.weight_frames.front().cloned().unwrap_or_default(),
            Command::QueryModel => format!("{}\r\n", state.model),
            Command::QuerySerial => format!("{}\r\n", state.serial),
            Command::QuerySoftware => format!("{}\r\n", state.software),
            Command::Tare => state.tare_response.clone(),
        }
    }

    fn respond(state: &mut State, command: Command) -> String {
        match command {
            Command::ReadWeight => {
                if state.weight_frames.len() > 1 {
                    state.weight_frames.pop_front().unwrap_or_default()
                } else {
                    state.weight_frames.front().cloned().unwrap_or_default()
                }
            }
            Command::QueryModel => format!("{}\r\n", state.model),
            Command::QuerySerial => format!("{}\r\n", state.serial),
            Command::QuerySoftware => format!("{}\r\n", state.software),
            Command::Tare => state.tare_response.clone(),
        }
    }
}

impl Default for MockScale {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Link for MockScale {
    async fn connect(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.online {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "mock scale is offline",
            )));
        }
        state.connected = true;
        state.pending = None;
        state.replying = false;
        state.connects += 1;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.connected = false;
        state.pending = None;
        state.replying = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(Error::NotConnected);
        }

        let text = String::from_utf8_lossy(data);
        let command = Command::try_from(&*text)
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        if state.pending.is_some() || state.replying {
            state.interleaved = true;
        }
        state.pending = Some(command);
        Ok(())
    }

    async fn receive_line(&mut self) -> Result<BytesMut> {
        let (command, silent, latency) = {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(Error::NotConnected);
            }
            let Some(command) = state.pending.take() else {
                state.interleaved = true;
                return Err(Error::ReadTimeout);
            };
            state.replying = !state.silent;
            (command, state.silent, state.latency)
        };

        if silent {
            std::future::pending::<()>().await;
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        state.replying = false;
        if !state.connected {
            return Err(Error::ConnectionClosed);
        }
        let response = Self::respond(&mut state, command);
        state.exchanges.push((command, response.clone()));
        Ok(BytesMut::from(response.as_bytes()))
    }

    async fn drain(&mut self, _grace: Duration) -> Result<usize> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(Error::NotConnected);
        }
        // A reply cut off by a timeout is never delivered
        let discarded = usize::from(state.replying);
        state.pending = None;
        state.replying = false;
        Ok(discarded)
    }

    fn remote_addr(&self) -> String {
        "mock-scale".to_string()
    }
}
