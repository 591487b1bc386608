//! In-process delivery over a standard channel.
//!
//! Embedders that want payloads without touching the filesystem hold the
//! receiving end and drain it from their own thread.

use std::sync::{mpsc, Mutex, PoisonError};

use super::{Delivery, DeliverySink};
use crate::error::SinkError;

/// Sender side of the delivery channel.
pub type DeliverySender = mpsc::Sender<Delivery>;
/// Receiver side of the delivery channel.
pub type DeliveryReceiver = mpsc::Receiver<Delivery>;

/// Create a delivery channel.
#[must_use]
pub fn delivery_channel() -> (ChannelSink, DeliveryReceiver)
{
    let (tx, rx) = mpsc::channel();
    (ChannelSink::new(tx), rx)
}

/// Sends every payload down a channel.
#[derive(Debug)]
pub struct ChannelSink
{
    tx: Mutex<DeliverySender>,
}

impl ChannelSink
{
    /// Sink sending on `tx`.
    #[must_use]
    pub fn new(tx: DeliverySender) -> Self
    {
        Self { tx: Mutex::new(tx) }
    }
}

impl DeliverySink for ChannelSink
{
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), SinkError>
    {
        let delivery = Delivery {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        };
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(delivery)
            .map_err(|_| SinkError::Disconnected)
    }
}
