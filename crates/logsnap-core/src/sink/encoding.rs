//! Payload encodings.
//!
//! Payloads are compact JSON envelopes. Consumers that ship payloads through
//! text-only channels can ask for the deflated, base64-wrapped form instead.

use std::io::{Read, Write};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use logsnap_protocol::Envelope;
use serde::Deserialize;

use crate::error::{LogsnapError, LogsnapResult};

/// How an envelope is turned into payload bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding
{
    /// Compact JSON.
    #[default]
    Json,
    /// Raw deflate of the JSON, base64 encoded.
    DeflateBase64,
}

impl PayloadEncoding
{
    /// Encode `envelope`.
    ///
    /// # Errors
    ///
    /// Fails when the envelope cannot be serialized.
    pub fn encode(self, envelope: &Envelope) -> LogsnapResult<Vec<u8>>
    {
        let json = envelope.to_json()?;
        match self {
            Self::Json => Ok(json),
            Self::DeflateBase64 => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
                encoder.write_all(&json)?;
                let compressed = encoder.finish()?;
                Ok(BASE64.encode(compressed).into_bytes())
            }
        }
    }
}

impl FromStr for PayloadEncoding
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "deflate_base64" | "deflate" => Ok(Self::DeflateBase64),
            other => Err(format!("unknown payload encoding: {other}")),
        }
    }
}

/// Decode a payload in either encoding.
///
/// JSON payloads always start with `{`; anything else is taken to be the
/// deflated form.
///
/// # Errors
///
/// Returns [`LogsnapError::Decode`] for malformed base64 or deflate data and
/// [`LogsnapError::Serialize`] for JSON that is not an envelope.
pub fn decode_payload(bytes: &[u8]) -> LogsnapResult<Envelope>
{
    let trimmed = bytes.trim_ascii();
    if trimmed.first() == Some(&b'{') {
        return Ok(Envelope::from_json(trimmed)?);
    }

    let compressed = BASE64
        .decode(trimmed)
        .map_err(|e| LogsnapError::Decode(format!("invalid base64: {e}")))?;
    let mut json = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| LogsnapError::Decode(format!("invalid deflate stream: {e}")))?;

    Ok(Envelope::from_json(&json)?)
}
