//! Sink that keeps payloads in memory.

use std::sync::{Mutex, PoisonError};

use logsnap_protocol::Envelope;

use super::{decode_payload, Delivery, DeliverySink};
use crate::error::SinkError;

/// Collects payloads, or rejects them all when built with [`MemorySink::failing`].
#[derive(Debug, Default)]
pub struct MemorySink
{
    deliveries: Mutex<Vec<Delivery>>,
    fail: bool,
}

impl MemorySink
{
    /// Empty collecting sink.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Sink that refuses every payload.
    #[must_use]
    pub fn failing() -> Self
    {
        Self {
            deliveries: Mutex::default(),
            fail: true,
        }
    }

    /// Payloads received so far, in order.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery>
    {
        self.deliveries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Decoded envelopes of the payloads received so far. Payloads that fail
    /// to decode are skipped.
    #[must_use]
    pub fn envelopes(&self) -> Vec<Envelope>
    {
        self.deliveries()
            .iter()
            .filter_map(|d| decode_payload(&d.bytes).ok())
            .collect()
    }
}

impl DeliverySink for MemorySink
{
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), SinkError>
    {
        if self.fail {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory sink configured to fail",
            )));
        }
        self.deliveries.lock().unwrap_or_else(PoisonError::into_inner).push(Delivery {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}
