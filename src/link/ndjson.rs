//! Newline-delimited JSON link.
//!
//! Every line is one `{"event": .., "data": ..}` envelope. Works over any
//! `AsyncRead`/`AsyncWrite` pair; [`NdjsonLink::connect`] opens a TCP stream.

use std::str::FromStr;

use biocalm_core::{InboundEvent, OutboundMessage};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{DEFAULT_MAX_MESSAGE_SIZE, LinkKind, Result, ServiceLink, sanitize_for_log};
use crate::error::LinkError;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// NDJSON link settings.
#[derive(Debug, Clone, Copy)]
pub struct NdjsonConfig {
    /// Longest accepted inbound line, in bytes.
    pub max_message_size: usize,
}

impl NdjsonConfig {
    /// Reads `BIOCALM_MAX_MESSAGE_SIZE`, falling back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_message_size: env_or("BIOCALM_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE),
        }
    }
}

impl Default for NdjsonConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// NDJSON over a byte stream.
///
/// Reader and writer sit behind separate async mutexes so a pending
/// `receive` never blocks `send`.
///
/// - Empty lines are skipped.
/// - Lines that are not a valid envelope are logged and skipped.
/// - Lines over the size limit are discarded without being buffered whole.
/// - A final line without `\n` is still delivered.
pub struct NdjsonLink {
    reader: Mutex<BufReader<BoxedReader>>,
    writer: Mutex<BufWriter<BoxedWriter>>,
    config: NdjsonConfig,
}

impl std::fmt::Debug for NdjsonLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdjsonLink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NdjsonLink {
    /// Link over an arbitrary reader/writer pair.
    pub fn new<R, W>(reader: R, writer: W, config: NdjsonConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Mutex::new(BufReader::new(Box::new(reader) as BoxedReader)),
            writer: Mutex::new(BufWriter::new(Box::new(writer) as BoxedWriter)),
            config,
        }
    }

    /// Connects to `addr` (`HOST:PORT`) over TCP.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::ConnectionFailed` if the connection is refused.
    pub async fn connect(addr: &str, config: NdjsonConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| LinkError::ConnectionFailed(format!("{addr}: {e}")))?;
        stream.set_nodelay(true)?;
        debug!(addr, "connected to acquisition service");
        let (read, write) = stream.into_split();
        Ok(Self::new(read, write, config))
    }
}

#[async_trait::async_trait]
impl ServiceLink for NdjsonLink {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let serialized = serde_json::to_string(message)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(serialized.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        drop(writer);
        Ok(())
    }

    #[allow(clippy::significant_drop_tightening)] // reader is held across the loop
    async fn receive(&self) -> Result<Option<InboundEvent>> {
        let mut reader = self.reader.lock().await;
        // Copies at most max_message_size + 1 bytes of a line; anything past
        // that is consumed and dropped up to the next newline.
        let read_limit = self.config.max_message_size + 1;
        let mut buf: Vec<u8> = Vec::with_capacity(read_limit.min(64 * 1024));

        loop {
            buf.clear();
            let mut overflowed = false;

            loop {
                let available = reader.fill_buf().await?;
                if available.is_empty() {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    break;
                }

                let newline = available.iter().position(|&b| b == b'\n');
                let chunk = newline.unwrap_or(available.len());
                if !overflowed {
                    let remaining_cap = read_limit.saturating_sub(buf.len());
                    buf.extend_from_slice(&available[..chunk.min(remaining_cap)]);
                    overflowed = chunk > remaining_cap;
                }

                if let Some(pos) = newline {
                    reader.consume(pos + 1);
                    break;
                }
                reader.consume(chunk);
            }

            if overflowed || buf.len() > self.config.max_message_size {
                warn!(
                    limit = self.config.max_message_size,
                    "message exceeds size limit, skipping"
                );
                continue;
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(s) => s,
                Err(e) => {
                    warn!("invalid UTF-8 in message, skipping line: {e}");
                    continue;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<InboundEvent>(trimmed) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    warn!(
                        error = %e,
                        line = %sanitize_for_log(trimmed, 200),
                        "invalid service message, skipping"
                    );
                }
            }
        }
    }

    fn kind(&self) -> LinkKind {
        LinkKind::Ndjson
    }
}

/// Reads an environment variable, parsing it to type `T`, or returns the default.
///
/// Logs a warning if the variable is set but cannot be parsed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            warn!(name, value = %v, "invalid env var value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biocalm_core::Sample;
    use tokio::io::duplex;

    fn link_over(input: &'static [u8]) -> NdjsonLink {
        NdjsonLink::new(input, tokio::io::sink(), NdjsonConfig::default())
    }

    #[tokio::test]
    async fn skips_empty_and_malformed_lines() {
        let link = link_over(
            b"\n   \nnot json\n{\"event\":\"system_initialized\",\"data\":{\"success\":true}}\n",
        );
        let event = link.receive().await.unwrap().unwrap();
        assert_eq!(
            event,
            InboundEvent::SystemInitialized {
                success: true,
                message: String::new()
            }
        );
        assert!(link.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_line_without_newline_is_delivered() {
        let link = link_over(b"{\"event\":\"system_reset\"}");
        assert_eq!(link.receive().await.unwrap(), Some(InboundEvent::SystemReset));
        assert!(link.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_line_is_skipped() {
        let mut input = Vec::new();
        input.extend_from_slice(b"{\"event\":\"error\",\"data\":{\"message\":\"");
        input.extend(std::iter::repeat_n(b'x', 256));
        input.extend_from_slice(b"\"}}\n{\"event\":\"system_reset\",\"data\":{}}\n");
        let input: &'static [u8] = Box::leak(input.into_boxed_slice());
        let link = NdjsonLink::new(
            input,
            tokio::io::sink(),
            NdjsonConfig {
                max_message_size: 64,
            },
        );
        assert_eq!(link.receive().await.unwrap(), Some(InboundEvent::SystemReset));
    }

    #[tokio::test]
    async fn unknown_events_are_delivered() {
        let link = link_over(b"{\"event\":\"calibration_done\",\"data\":{}}\n");
        assert_eq!(
            link.receive().await.unwrap(),
            Some(InboundEvent::Unknown {
                event: "calibration_done".into()
            })
        );
    }

    #[tokio::test]
    async fn sensor_data_defaults_bpm() {
        let link = link_over(
            b"{\"event\":\"sensor_data\",\"data\":{\"ecg_voltage\":1.2,\"temperature\":36.4}}\n",
        );
        assert_eq!(
            link.receive().await.unwrap(),
            Some(InboundEvent::SensorData(Sample::new(1.2, 70.0, 36.4)))
        );
    }

    #[tokio::test]
    async fn send_writes_one_envelope_per_line() {
        let (client, server) = duplex(4096);
        let (_, write) = tokio::io::split(client);
        let link = NdjsonLink::new(tokio::io::empty(), write, NdjsonConfig::default());
        link.send(&OutboundMessage::InitializeSystem {}).await.unwrap();
        link.send(&OutboundMessage::StartBaseline { duration: 10 })
            .await
            .unwrap();

        let mut lines = BufReader::new(server).lines();
        let first: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first["event"], "initialize_system");
        assert_eq!(second["data"]["duration"], 10);
    }

    #[tokio::test]
    async fn line_split_across_reads_is_reassembled() {
        let reader = tokio_test::io::Builder::new()
            .read(b"{\"event\":\"system_")
            .read(b"reset\"}\n{\"event\":\"error\",")
            .read(b"\"data\":{\"message\":\"probe\"}}\n")
            .build();
        let link = NdjsonLink::new(reader, tokio::io::sink(), NdjsonConfig::default());
        assert_eq!(link.receive().await.unwrap(), Some(InboundEvent::SystemReset));
        assert_eq!(
            link.receive().await.unwrap(),
            Some(InboundEvent::Error {
                message: "probe".into()
            })
        );
        assert!(link.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn send_writes_exact_envelope() {
        let writer = tokio_test::io::Builder::new()
            .write(b"{\"event\":\"reset_system\",\"data\":{}}\n")
            .build();
        let link = NdjsonLink::new(tokio::io::empty(), writer, NdjsonConfig::default());
        link.send(&OutboundMessage::ResetSystem {}).await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused_is_connection_failed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = NdjsonLink::connect(&addr.to_string(), NdjsonConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn tcp_round_trip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            assert!(line.contains("reset_system"));
            write
                .write_all(b"{\"event\":\"system_reset\",\"data\":{}}\n")
                .await
                .unwrap();
        });

        let link = NdjsonLink::connect(&addr.to_string(), NdjsonConfig::default())
            .await
            .unwrap();
        assert_eq!(link.kind(), LinkKind::Ndjson);
        link.send(&OutboundMessage::ResetSystem {}).await.unwrap();
        assert_eq!(link.receive().await.unwrap(), Some(InboundEvent::SystemReset));
        server.await.unwrap();
    }
}
