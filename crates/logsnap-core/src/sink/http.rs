//! HTTP delivery: one POST per payload.

use std::time::Duration;

use tracing::trace;

use super::DeliverySink;
use crate::error::SinkError;

/// Header carrying the payload name.
pub const NAME_HEADER: &str = "X-Logsnap-Delivery";

/// Posts each payload to a fixed endpoint.
pub struct HttpSink
{
    url: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for HttpSink
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("HttpSink").field("url", &self.url).finish_non_exhaustive()
    }
}

impl HttpSink
{
    /// Sink posting to `url`, giving up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self
    {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { url: url.into(), agent }
    }

    /// Endpoint payloads are posted to.
    #[must_use]
    pub fn url(&self) -> &str
    {
        &self.url
    }
}

impl DeliverySink for HttpSink
{
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), SinkError>
    {
        let content_type = if bytes.first() == Some(&b'{') {
            "application/json"
        } else {
            "text/plain"
        };

        let response = self
            .agent
            .post(&self.url)
            .set("Content-Type", content_type)
            .set(NAME_HEADER, name)
            .send_bytes(bytes)
            .map_err(|e| SinkError::Http {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        trace!(url = %self.url, name, status = response.status(), "payload posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_unreachable_endpoint_is_an_error()
    {
        // Port 9 (discard) on localhost is closed in test environments.
        let sink = HttpSink::new("http://127.0.0.1:9/ingest", Duration::from_millis(200));
        assert_eq!(sink.url(), "http://127.0.0.1:9/ingest");

        let err = sink.write("a.dump", b"{}").unwrap_err();
        assert!(matches!(err, SinkError::Http { ref url, .. } if url == "http://127.0.0.1:9/ingest"));
    }
}
