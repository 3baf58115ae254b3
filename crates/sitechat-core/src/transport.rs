use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::error::ExchangeError;
use crate::identity::Identity;
use crate::state::ChatMessage;

/// Response body as it arrives, one chunk at a time
pub type ByteStream = BoxStream<'static, Result<Bytes, ExchangeError>>;

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl ChatRequest {
    /// One-element history carrying the user's text, streaming on
    pub fn single_turn(text: &str) -> Self {
        Self {
            messages: vec![ChatMessage::user(text)],
            stream: true,
        }
    }
}

/// Opens one exchange with the chat endpoint.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the request and hand back the body stream.
    ///
    /// Fails with [`ExchangeError::Status`] if the endpoint does not answer
    /// with a success status.
    async fn open(&self, request: &ChatRequest, identity: &Identity) -> Result<ByteStream, ExchangeError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    user_id_header: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &Config) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            user_id_header: config.user_id_header.clone(),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest, identity: &Identity) -> Result<ByteStream, ExchangeError> {
        debug!(endpoint = %self.endpoint, "opening chat stream");

        // .json() sets Content-Type: application/json
        let response = self
            .client
            .post(&self.endpoint)
            .header(self.user_id_header.as_str(), identity.as_str())
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExchangeError::Status(response.status().as_u16()));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ExchangeError::Read(e.to_string())))
            .boxed())
    }
}
