use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, ETAG, IF_NONE_MATCH};
use reqwest::Client;
use tracing::debug;

use crate::core::config::HttpConfig;
use crate::core::error::TransportError;

const APP_USER_AGENT: &str = concat!("QuiltflowerUpdater/", env!("CARGO_PKG_VERSION"));

pub const STATUS_OK: u16 = 200;

/// Upper bound on the buffer reserved up front from `Content-Length`.
/// Larger bodies still download, growing the buffer as chunks arrive.
const MAX_PREALLOCATED_BODY: u64 = 64 * 1024 * 1024;
pub const STATUS_NOT_MODIFIED: u16 = 304;

/// What the updater needs to know about an HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// `ETag` header, verbatim.
    pub etag: Option<String>,
    /// Empty for `304 Not Modified` and for error statuses.
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound GET requests. The metadata fetcher and the artifact cache only
/// ever talk to the network through this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET, optionally conditional on `if_none_match`.
    ///
    /// Non-2xx statuses are returned as responses, not errors; only
    /// failures with no status at all become `TransportError`.
    async fn get(
        &self,
        url: &str,
        if_none_match: Option<&str>,
    ) -> Result<HttpResponse, TransportError>;
}

pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    let mut builder = Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers);

    if let Some(secs) = config.connect_timeout_secs {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder.build()
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        if_none_match: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        let fail = |e: reqwest::Error| TransportError {
            url: url.to_string(),
            message: e.to_string(),
        };

        let mut request = self.client.get(url);
        if let Some(etag) = if_none_match {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await.map_err(fail)?;
        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let mut body = Vec::new();
        if response.status().is_success() {
            if let Some(len) = response.content_length() {
                let hint = usize::try_from(len.min(MAX_PREALLOCATED_BODY)).unwrap_or(0);
                body.try_reserve(hint).map_err(|e| TransportError {
                    url: url.to_string(),
                    message: format!("cannot buffer {len} byte body: {e}"),
                })?;
            }
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(fail)?;
                body.try_reserve(chunk.len()).map_err(|e| TransportError {
                    url: url.to_string(),
                    message: format!("cannot buffer response body: {e}"),
                })?;
                body.extend_from_slice(&chunk);
            }
        }

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, etag, body })
    }
}
