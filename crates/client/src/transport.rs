//! HTTP transport for the AIGC endpoints.
//!
//! [`Transport`] is the seam between the workflow and the network: a
//! form-encoded POST, a query-string GET, and a streaming GET. Every
//! failure (network, non-2xx status, undecodable body) surfaces as a
//! [`TransportError`]. Nothing here retries; retry policy belongs to the
//! caller.
//!
//! [`ReqwestTransport`] is the production implementation.

use std::time::Duration;

use aigc_core::protocol::{QUERY_CONTENT_TYPE, SUBMIT_CONTENT_TYPE, USER_AGENT};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;

/// Connect timeout applied to every request, including downloads.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A streamed response body.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Errors from the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Malformed response body: {0}")]
    MalformedBody(String),
}

/// A fully read, successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_str(&self.body).map_err(|e| TransportError::MalformedBody(e.to_string()))
    }
}

/// Request primitives used by the workflow.
///
/// Implementations apply the fixed protocol headers themselves and must
/// fully consume the response before returning from `post_form` and
/// `get_query`, so no connection is held across a poll sleep.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST` a form-encoded body.
    async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, String)],
    ) -> Result<TransportResponse, TransportError>;

    /// `GET` with a query string.
    async fn get_query(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<TransportResponse, TransportError>;

    /// `GET` and stream the body.
    async fn get_stream(&self, url: &str) -> Result<ByteStream, TransportError>;
}

/// [`Transport`] backed by a pooled [`reqwest::Client`].
///
/// Cheap to share behind an `Arc`; one instance should serve every
/// workflow talking to the same service.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport with the protocol `User-Agent`.
    ///
    /// `request_timeout` bounds each submit/poll call as a whole. For
    /// downloads it bounds the idle time between two reads instead, since
    /// image sizes vary; a stalled body fails with a timeout error.
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            request_timeout,
        })
    }

    /// Reuse an existing [`reqwest::Client`]. The caller is responsible
    /// for its default headers and read timeout.
    pub fn with_client(client: reqwest::Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`TransportError::Status`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Read a successful response to completion.
    async fn read_response(
        response: reqwest::Response,
    ) -> Result<TransportResponse, TransportError> {
        let response = Self::ensure_success(response).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, String)],
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, SUBMIT_CONTENT_TYPE)
            .form(fields)
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::read_response(response).await
    }

    async fn get_query(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .header(CONTENT_TYPE, QUERY_CONTENT_TYPE)
            .query(params)
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::read_response(response).await
    }

    async fn get_stream(&self, url: &str) -> Result<ByteStream, TransportError> {
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes_stream().map_err(TransportError::from).boxed())
    }
}
