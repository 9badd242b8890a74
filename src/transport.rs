use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use crate::{CompletionMode, Response};

/// A fully materialized request for one attempt.
///
/// Built fresh by the dispatcher before every attempt; the transport may
/// consume it.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
    pub completion: CompletionMode,
}

/// Sends one HTTP request and returns the response without judging its
/// status.
///
/// Implementations must be usable concurrently through a shared reference.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<Response, reqwest::Error>;
}

/// Pooled `reqwest` transport.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<Response, reqwest::Error> {
        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        let skip_body = request.completion == CompletionMode::ResponseHeadersRead
            && (status.is_success() || status == reqwest::StatusCode::NOT_MODIFIED);
        let body = if skip_body {
            Bytes::new()
        } else {
            response.bytes().await?
        };

        Ok(Response::new(status, headers, body))
    }
}
