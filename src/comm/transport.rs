use super::types::{Envelope, RemoteTarget, TransportError};
use crate::codec::{self, Value};
use crate::error::Error;

use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Point-to-point RPC over HTTP `PUT`.
///
/// The arguments travel as one serialized array; the reply body is a
/// serialized `{error, value}` envelope.
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    timeout: Duration,
}

impl Transport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn send(
        &self,
        message: &[Value],
        target: &RemoteTarget,
    ) -> Result<Envelope, TransportError> {
        let (node, path) = target.resolve()?;
        let body = codec::serialize(&Value::array(message.iter().cloned()))?;
        let url = format!("http://{}{}", node.addr(), path);

        tracing::debug!("PUT {} ({} bytes)", url, body.len());
        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!("Request to {} failed: {}", url, e);
                TransportError::Connection(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        if !status.is_success() {
            let error = codec::deserialize(&text)
                .ok()
                .and_then(|reply| Envelope::from_value(&reply))
                .map(|envelope| envelope.error)
                .filter(|error| !error.is_nullish());
            return Err(TransportError::Remote {
                status: status.as_u16(),
                error,
            });
        }

        let reply =
            codec::deserialize(&text).map_err(|e| TransportError::ResponseFormat(e.to_string()))?;
        Envelope::from_value(&reply).ok_or_else(|| {
            TransportError::ResponseFormat(format!(
                "expected an {{error, value}} envelope, got {}",
                reply.type_name()
            ))
        })
    }

    /// Sends and collapses the envelope into a `Result`.
    pub async fn call(&self, message: &[Value], target: &RemoteTarget) -> Result<Value, Error> {
        self.send(message, target).await?.into_result()
    }
}
