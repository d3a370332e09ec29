//! Service links.
//!
//! A [`ServiceLink`] carries [`OutboundMessage`]s to the acquisition service
//! and delivers its [`InboundEvent`]s. The orchestrator never talks to a
//! link directly; the session runtime owns it.

pub mod demo;
pub mod ndjson;

pub use demo::DemoLink;
pub use ndjson::{NdjsonConfig, NdjsonLink};

use std::fmt;
use std::str::FromStr;

use biocalm_core::{InboundEvent, OutboundMessage};

use crate::error::LinkError;

/// Result type alias for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Default maximum inbound line size in bytes (1 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Async duplex channel to the acquisition service.
///
/// Uses `&self` with interior mutability so one task can block in
/// [`receive`](Self::receive) while another sends.
#[async_trait::async_trait]
pub trait ServiceLink: Send + Sync {
    /// Sends one control message.
    async fn send(&self, message: &OutboundMessage) -> Result<()>;

    /// Receives the next event.
    ///
    /// Returns `Ok(None)` when the service closed the link cleanly.
    async fn receive(&self) -> Result<Option<InboundEvent>>;

    /// Link kind, for logging.
    fn kind(&self) -> LinkKind;
}

/// Link kind identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// In-process simulated service
    Demo,
    /// Newline-delimited JSON over a byte stream
    Ndjson,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Demo => write!(f, "demo"),
            Self::Ndjson => write!(f, "ndjson"),
        }
    }
}

/// Parsed `--link` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSpec {
    /// `demo`
    Demo,
    /// `tcp://HOST:PORT`
    Tcp(String),
}

impl FromStr for LinkSpec {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("demo") {
            return Ok(Self::Demo);
        }
        match s.strip_prefix("tcp://") {
            Some(addr) if addr.rsplit_once(':').is_some_and(|(host, port)| {
                !host.is_empty() && port.parse::<u16>().is_ok()
            }) =>
            {
                Ok(Self::Tcp(addr.to_string()))
            }
            _ => Err(LinkError::InvalidSpec(s.to_string())),
        }
    }
}

impl fmt::Display for LinkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Demo => write!(f, "demo"),
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// Opens the link described by `spec`.
///
/// # Errors
///
/// Returns `LinkError::ConnectionFailed` if a TCP connection cannot be made.
pub async fn connect(spec: &LinkSpec, seed: Option<u64>) -> Result<Box<dyn ServiceLink>> {
    match spec {
        LinkSpec::Demo => Ok(Box::new(seed.map_or_else(DemoLink::new, DemoLink::seeded))),
        LinkSpec::Tcp(addr) => Ok(Box::new(
            NdjsonLink::connect(addr, NdjsonConfig::from_env()).await?,
        )),
    }
}

/// Truncates and strips control characters from untrusted input before logging.
fn sanitize_for_log(input: &str, max_len: usize) -> String {
    input
        .chars()
        .take(max_len)
        .map(|c| {
            if c.is_control() && c != '\t' {
                '\u{FFFD}'
            } else {
                c
            }
        })
        .collect()
}
