//! AT-command session over a serial transport (3GPP TS 27.005).
//!
//! `AtSession` owns line-buffering and response-terminator detection; the
//! actual byte transport is an injected [`AtTransport`], grounded in the
//! teacher's `ATConnection` trait (`connection.rs`) so the session logic can
//! be exercised against an in-memory mock as well as the real serial port.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::sleep;
use tokio_serial::SerialPortBuilderExt;

pub const DEFAULT_BAUD: u32 = 460_800;
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;
const SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum AtSessionError {
    #[error("AT command timed out waiting for a response")]
    AtTimeout,
    #[error("AT error response: {0}")]
    AtError(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Raw byte transport under an AT session. Implemented by
/// [`SerialAtTransport`] for production use and by an in-memory mock in
/// tests.
#[async_trait]
pub trait AtTransport: Send {
    async fn send(&mut self, data: &[u8]) -> anyhow::Result<()>;
    async fn recv(&mut self, buf: &mut [u8]) -> anyhow::Result<usize>;
}

pub struct SerialAtTransport {
    stream: tokio_serial::SerialStream,
}

impl SerialAtTransport {
    pub fn open(port: &str, baud: u32) -> anyhow::Result<Self> {
        let stream = tokio_serial::new(port, baud).open_native_async()?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl AtTransport for SerialAtTransport {
    async fn send(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> anyhow::Result<usize> {
        Ok(self.stream.read(buf).await?)
    }
}

/// A session over an `AtTransport`, handling line buffering and the
/// `OK` / `ERROR` / `+CME ERROR:` / `+CMS ERROR:` terminator vocabulary.
pub struct AtSession<T: AtTransport> {
    transport: T,
    read_timeout: Duration,
    buffer: Vec<u8>,
}

impl<T: AtTransport> AtSession<T> {
    /// Open a session: wrap `transport`, issue `ATE0`, and drain its
    /// response before returning.
    pub async fn open(transport: T, read_timeout: Duration) -> Result<Self, AtSessionError> {
        let mut session = Self {
            transport,
            read_timeout,
            buffer: Vec::new(),
        };
        session.send_command("ATE0").await?;
        session.read_response().await?;
        Ok(session)
    }

    pub async fn send_command(&mut self, line: &str) -> Result<(), AtSessionError> {
        debug!("AT> {}", line);
        let mut cmd = line.as_bytes().to_vec();
        cmd.push(b'\r');
        self.transport.send(&cmd).await.map_err(AtSessionError::Transport)
    }

    /// Read one line from the transport, blocking up to `read_timeout`. An
    /// empty read (EOF) before a line is assembled is treated the same as a
    /// timeout: the modem went silent before the terminator arrived.
    async fn read_line(&mut self) -> Result<String, AtSessionError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let line = String::from_utf8_lossy(&self.buffer[..pos]).trim().to_string();
                self.buffer.drain(..=pos);
                if line.is_empty() {
                    continue;
                }
                return Ok(line);
            }

            let mut chunk = [0u8; 1024];
            match tokio::time::timeout(self.read_timeout, self.transport.recv(&mut chunk)).await {
                Ok(Ok(0)) => return Err(AtSessionError::AtTimeout),
                Ok(Ok(n)) => self.buffer.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(AtSessionError::Transport(e)),
                Err(_) => return Err(AtSessionError::AtTimeout),
            }
        }
    }

    /// Accumulate lines until the terminator `OK`, returning the
    /// accumulated text. Fails with `AtError` on a trimmed `ERROR` line or
    /// one starting with `+CME ERROR:` / `+CMS ERROR:`.
    pub async fn read_response(&mut self) -> Result<String, AtSessionError> {
        let mut response = String::new();
        loop {
            let line = self.read_line().await?;
            if line == "OK" {
                return Ok(response);
            }
            if line == "ERROR" || line.starts_with("+CME ERROR:") || line.starts_with("+CMS ERROR:") {
                return Err(AtSessionError::AtError(line));
            }
            response.push_str(&line);
            response.push('\n');
        }
    }

    /// `AT+CMGF=0` then `AT+CMGL=<state>`; returns the listing response body.
    pub async fn list_sms_pdu(&mut self, state: u8) -> Result<String, AtSessionError> {
        self.send_command("AT+CMGF=0").await?;
        self.read_response().await?;
        sleep(SETTLE_DELAY).await;
        self.send_command(&format!("AT+CMGL={state}")).await?;
        self.read_response().await
    }

    pub async fn delete_message(&mut self, index: u32, flag: u8) -> Result<(), AtSessionError> {
        self.send_command(&format!("AT+CMGD={index},{flag}")).await?;
        self.read_response().await?;
        Ok(())
    }

    pub async fn preferred_storage(&mut self, storage: &str) -> Result<(), AtSessionError> {
        self.send_command(&format!("AT+CPMS=\"{storage}\"")).await?;
        self.read_response().await?;
        Ok(())
    }
}

/// Open a serial-backed session at `port`/`baud` with the 3 s default
/// read timeout, matching the source's `serial.Serial(port, baudrate,
/// timeout=timeout)`.
pub async fn open_serial_session(
    port: &str,
    baud: u32,
    timeout_secs: u64,
) -> Result<AtSession<SerialAtTransport>, AtSessionError> {
    info!("Opening serial AT session on {} at {} baud", port, baud);
    let transport = SerialAtTransport::open(port, baud).map_err(AtSessionError::Transport)?;
    AtSession::open(transport, Duration::from_secs(timeout_secs)).await
}
