use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::cancel::CancelToken;
use crate::cmds::{self, ParseIssue, SubCommand};
use crate::error::{LinkError, Result};

/// Serial configuration for the stepper board
#[derive(Clone, Debug)]
pub struct SerialConfig {
    pub baudrate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Upper bound of a single blocking read. Cancellation is checked at this pace.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baudrate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Opens a serial port with the given configuration (8N1, no flow control).
///
/// # Arguments
/// * `port` - the device path, e.g. `/dev/ttyACM0` or `COM9`
/// * `config` - baud rate, framing and the per-read timeout
///
/// # Returns
/// The opened port, or `LinkError::Open` carrying the device error
pub fn open_port(port: &str, config: &SerialConfig) -> Result<Box<dyn SerialPort>> {
    info!("Attempting to open serial port: {}", port);
    debug!(
        "Serial configuration: baudrate={}, data_bits={:?}, parity={:?}, stop_bits={:?}, timeout={:?}",
        config.baudrate, config.data_bits, config.parity, config.stop_bits, config.timeout
    );

    match serialport::new(port, config.baudrate)
        .data_bits(config.data_bits)
        .parity(config.parity)
        .stop_bits(config.stop_bits)
        .flow_control(FlowControl::None)
        .timeout(config.timeout)
        .open()
    {
        Ok(serial) => {
            info!("Opened port {} at {} baud", port, config.baudrate);
            Ok(serial)
        }
        Err(e) => {
            error!("Error opening {}: {}", port, e);
            Err(LinkError::Open {
                port: port.to_string(),
                source: e,
            })
        }
    }
}

/// The line that completed a handshake, plus everything received while waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub line: String,
    pub transcript: Vec<String>,
}

/// Sends command batches to the board and waits for its `DONE` line.
///
/// Works over any byte stream: a `Box<dyn SerialPort>` in production, an
/// in-memory device in tests. Reads that time out (`TimedOut`/`WouldBlock`)
/// are treated as idle ticks, not failures. The stream is owned for the
/// dispatcher's lifetime and released when it is dropped.
pub struct BatchDispatcher<S: Read + Write> {
    port: S,
    /// Received bytes not yet terminated by a newline
    pending: Vec<u8>,
}

impl<S: Read + Write> BatchDispatcher<S> {
    /// Take ownership of an already opened and configured port.
    pub fn new(port: S) -> Self {
        debug!("Creating new BatchDispatcher");
        Self {
            port,
            pending: Vec::new(),
        }
    }

    /// Get reference to the underlying port
    pub fn port(&self) -> &S {
        &self.port
    }

    /// Get mutable reference to the underlying port
    pub fn port_mut(&mut self) -> &mut S {
        &mut self.port
    }

    /// Parse `batch`, write every well-formed sub-command, then wait for `DONE`.
    ///
    /// Parse notices are logged. Commands parsed before a malformed one are
    /// still sent, and the handshake runs even when nothing was sent.
    ///
    /// # Arguments
    /// * `batch` - whitespace-separated commands, e.g. `"P 2 0 P 1 0"`
    /// * `cancel` - stops the handshake wait at the next read timeout
    /// * `ack_timeout` - how long to wait for `DONE` (`None` waits forever)
    ///
    /// # Returns
    /// The acknowledgment, or the write/handshake error
    pub fn send_batch(
        &mut self,
        batch: &str,
        cancel: &CancelToken,
        ack_timeout: Option<Duration>,
    ) -> Result<Ack> {
        debug!("Dispatching batch: {:?}", batch);
        let parsed = cmds::parse_batch(batch);

        for issue in &parsed.issues {
            match issue {
                ParseIssue::UnknownToken { .. } => warn!("{}", issue),
                ParseIssue::Malformed { .. } => error!("{}", issue),
            }
        }

        for command in &parsed.commands {
            self.send_cmd(command)?;
        }
        self.port.flush()?;

        self.await_ack(cancel, ack_timeout)
    }

    /// Send a single command line
    pub fn send_cmd(&mut self, command: &SubCommand) -> Result<()> {
        let line = command.to_line();
        trace!("Writing {} bytes: {:?}", line.len(), String::from_utf8_lossy(&line));

        if let Err(e) = self.port.write_all(&line) {
            error!("Failed to send command {}: {}", command, e);
            return Err(e.into());
        }
        info!("Sent -> {}", command);
        Ok(())
    }

    /// Block until the board sends a line containing `DONE`.
    ///
    /// Empty lines are ignored; every other line is logged and kept in the
    /// transcript. Bytes left without a newline when a read times out are
    /// taken as a line of their own.
    ///
    /// # Arguments
    /// * `cancel` - checked at every read timeout
    /// * `ack_timeout` - checked after idle reads; `None` waits forever
    ///
    /// # Returns
    /// The `DONE` line and transcript, `LinkError::Cancelled`,
    /// `LinkError::AckTimeout`, or the underlying read error
    pub fn await_ack(&mut self, cancel: &CancelToken, ack_timeout: Option<Duration>) -> Result<Ack> {
        info!("Waiting for {}...", cmds::ACK_SENTINEL);
        // a deadline past what `Instant` can represent is no deadline at all
        let deadline = ack_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout).map(|at| (at, timeout)));
        let mut transcript = Vec::new();

        loop {
            let line = self.read_line(cancel, deadline)?;
            if line.is_empty() {
                continue;
            }

            info!("[Board] {}", line);
            transcript.push(line.clone());

            if line.contains(cmds::ACK_SENTINEL) {
                info!("{} received.", cmds::ACK_SENTINEL);
                debug!("Handshake transcript: {:?}", transcript);
                return Ok(Ack { line, transcript });
            }
            if let Some((at, timeout)) = deadline {
                if Instant::now() >= at {
                    warn!("No {} within {:?}", cmds::ACK_SENTINEL, timeout);
                    return Err(LinkError::AckTimeout(timeout));
                }
            }
        }
    }

    /// Read one line, decoded and trimmed.
    ///
    /// A line ends at `\n`, or at a read timeout when bytes are pending.
    fn read_line(
        &mut self,
        cancel: &CancelToken,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<String> {
        let mut chunk = [0u8; 256];

        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.pending.drain(..=end).collect();
                return Ok(decode_line(&raw));
            }

            if cancel.is_cancelled() {
                debug!("Handshake cancelled with {} pending byte(s)", self.pending.len());
                return Err(LinkError::Cancelled);
            }

            match self.port.read(&mut chunk) {
                Ok(0) => {
                    error!("Serial stream closed while waiting for {}", cmds::ACK_SENTINEL);
                    return Err(LinkError::Disconnected);
                }
                Ok(n) => {
                    trace!("Read {} bytes", n);
                    self.pending.extend_from_slice(&chunk[..n]);
                }
                Err(e) if is_idle(e.kind()) => {
                    if !self.pending.is_empty() {
                        trace!("Read timed out with {} unterminated byte(s)", self.pending.len());
                        let raw = std::mem::take(&mut self.pending);
                        return Ok(decode_line(&raw));
                    }
                    if let Some((at, timeout)) = deadline {
                        if Instant::now() >= at {
                            warn!("No {} within {:?}", cmds::ACK_SENTINEL, timeout);
                            return Err(LinkError::AckTimeout(timeout));
                        }
                    }
                    trace!("Read timed out, still waiting");
                }
                Err(e) => {
                    error!("Failed to read from serial port: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
}

impl<S: Read + Write> Drop for BatchDispatcher<S> {
    fn drop(&mut self) {
        info!("Closing serial port");
        if let Err(e) = self.port.flush() {
            debug!("Flush on close failed: {}", e);
        }
    }
}

fn is_idle(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

/// Decode a raw line, dropping byte sequences that are not valid UTF-8.
fn decode_line(raw: &[u8]) -> String {
    let mut text = String::with_capacity(raw.len());
    for chunk in raw.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text.trim().to_string()
}
