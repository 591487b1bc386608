//! # Delivery
//!
//! A finished snapshot (or an evaluation error) leaves the process as one
//! encoded payload handed to a [`DeliverySink`] under a unique name. The
//! [`Dispatcher`] owns the encoding step and the failure policy: a payload that
//! cannot be written is logged and dropped. There is no retry and no queue, and
//! nothing ever propagates back into the instrumented application.
//!
//! ## Sinks
//!
//! - [`DirectorySink`]: one file per payload in a drop directory (default)
//! - [`HttpSink`]: one POST per payload
//! - [`ChannelSink`]: in-process delivery over `std::sync::mpsc`
//! - [`MemorySink`]: collects payloads for tests and replays
//! - [`DiscardSink`]: delivery disabled

use std::sync::Arc;

use chrono::{DateTime, Utc};
use logsnap_protocol::Envelope;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::{LogsnapResult, SinkError};

pub mod channel;
pub mod directory;
pub mod encoding;
pub mod http;
pub mod memory;

pub use channel::{delivery_channel, ChannelSink, DeliveryReceiver, DeliverySender};
pub use directory::DirectorySink;
pub use encoding::{decode_payload, PayloadEncoding};
pub use http::HttpSink;
pub use memory::MemorySink;

/// Extension of snapshot payloads.
pub const SNAPSHOT_EXTENSION: &str = "dump";
/// Extension of evaluation-error payloads.
pub const ERROR_EXTENSION: &str = "message";

/// Destination for encoded payloads.
///
/// Implementations must write a payload completely or not at all: a reader
/// watching the destination never observes a truncated payload under `name`.
pub trait DeliverySink: Send + Sync
{
    /// Write `bytes` under `name`.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] when the destination cannot take the payload.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), SinkError>;
}

/// One delivered payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery
{
    /// Unique payload name.
    pub name: String,
    /// Encoded envelope.
    pub bytes: Vec<u8>,
}

/// Sink that accepts and forgets every payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl DeliverySink for DiscardSink
{
    fn write(&self, name: &str, _bytes: &[u8]) -> Result<(), SinkError>
    {
        debug!(name, "delivery disabled, payload discarded");
        Ok(())
    }
}

/// Encodes envelopes and hands them to a sink.
#[derive(Clone)]
pub struct Dispatcher
{
    sink: Arc<dyn DeliverySink>,
    encoding: PayloadEncoding,
}

impl std::fmt::Debug for Dispatcher
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("Dispatcher").field("encoding", &self.encoding).finish_non_exhaustive()
    }
}

impl Dispatcher
{
    /// Dispatcher writing to `sink` with `encoding`.
    #[must_use]
    pub fn new(sink: Arc<dyn DeliverySink>, encoding: PayloadEncoding) -> Self
    {
        Self { sink, encoding }
    }

    /// Payload encoding in use.
    #[must_use]
    pub fn encoding(&self) -> PayloadEncoding
    {
        self.encoding
    }

    /// Encode an envelope into payload bytes.
    ///
    /// # Errors
    ///
    /// Fails only when the envelope cannot be serialized.
    pub fn encode(&self, envelope: &Envelope) -> LogsnapResult<Vec<u8>>
    {
        self.encoding.encode(envelope)
    }

    /// Encode and write, reporting failures to the caller.
    ///
    /// # Errors
    ///
    /// Returns the encoding or sink error.
    pub fn try_deliver(&self, name: &str, envelope: &Envelope) -> LogsnapResult<()>
    {
        let bytes = self.encode(envelope)?;
        self.sink.write(name, &bytes)?;
        info!(name, event = envelope.event(), size = bytes.len(), "payload delivered");
        Ok(())
    }

    /// Encode and write. Failures are logged and the payload is dropped.
    pub fn deliver(&self, name: &str, envelope: &Envelope) -> bool
    {
        match self.try_deliver(name, envelope) {
            Ok(()) => true,
            Err(e) => {
                warn!(name, event = envelope.event(), error = %e, "dropping payload");
                false
            }
        }
    }
}

/// Unique payload name: `<prefix>_<seconds>.<micros>.<random>.<extension>`.
///
/// The random part is five digits, so names minted within the same microsecond
/// still differ with high probability.
#[must_use]
pub fn delivery_name(prefix: &str, now: DateTime<Utc>, extension: &str) -> String
{
    let random: u32 = rand::thread_rng().gen_range(10_000..=99_999);
    format!(
        "{prefix}_{}.{:06}.{random}.{extension}",
        now.timestamp(),
        now.timestamp_subsec_micros()
    )
}

#[cfg(test)]
mod tests
{
    use chrono::TimeZone;
    use logsnap_protocol::{ErrorRecord, Header};

    use super::*;

    fn error_envelope() -> Envelope
    {
        Envelope::EvaluationError {
            header: Header::for_project(1),
            data: ErrorRecord {
                error_message: "boom".to_string(),
                filename: None,
                lineno: None,
            },
        }
    }

    #[test]
    fn test_delivery_name_shape()
    {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::microseconds(42);
        let name = delivery_name("logsnap", now, SNAPSHOT_EXTENSION);

        let parts: Vec<&str> = name.split('.').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], format!("logsnap_{}", now.timestamp()));
        assert_eq!(parts[1], "000042");
        assert_eq!(parts[2].len(), 5);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[3], "dump");
    }

    #[test]
    fn test_failed_delivery_is_swallowed()
    {
        let sink = Arc::new(MemorySink::failing());
        let dispatcher = Dispatcher::new(sink.clone(), PayloadEncoding::Json);

        assert!(!dispatcher.deliver("a.message", &error_envelope()));
        assert!(dispatcher.try_deliver("a.message", &error_envelope()).is_err());
        assert!(sink.deliveries().is_empty());
    }

    #[test]
    fn test_discard_sink_accepts()
    {
        let dispatcher = Dispatcher::new(Arc::new(DiscardSink), PayloadEncoding::Json);
        assert!(dispatcher.deliver("a.message", &error_envelope()));
    }

    #[test]
    fn test_encode_follows_dispatcher_encoding()
    {
        let dispatcher = Dispatcher::new(Arc::new(DiscardSink), PayloadEncoding::DeflateBase64);
        assert_eq!(dispatcher.encoding(), PayloadEncoding::DeflateBase64);

        let envelope = error_envelope();
        assert_eq!(
            dispatcher.encode(&envelope).unwrap(),
            PayloadEncoding::DeflateBase64.encode(&envelope).unwrap()
        );
    }
}
