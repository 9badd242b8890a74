use bytes::Bytes;
use reqwest::header::{HeaderMap, ETAG};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{Result, WebApiError};

/// Header carrying the URI of a record created by `POST`.
pub const ODATA_ENTITY_ID: &str = "OData-EntityId";

/// How much of the response the transport reads before returning.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CompletionMode {
    /// Read the whole body.
    #[default]
    ResponseContentRead,
    /// Return once headers arrive; the body of a successful response is
    /// discarded unread. Failed responses are always read so they can be
    /// translated. For calls that only need status and headers.
    ResponseHeadersRead,
}

/// A received HTTP response with its body fully buffered (or skipped under
/// [`CompletionMode::ResponseHeadersRead`]).
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    reason: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// The reason phrase defaults to the canonical one for `status`.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            reason: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body: body.into(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// `true` for HTTP 304, the "no new data" outcome of a conditional `GET`.
    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers.get(ETAG).and_then(|value| value.to_str().ok())
    }

    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|err| WebApiError::Decode(format!("response body is not UTF-8: {err}")))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|err| {
            WebApiError::Decode(format!(
                "invalid response JSON: {err}; body: {}",
                String::from_utf8_lossy(&self.body)
            ))
        })
    }

    /// URI of the created record from the `OData-EntityId` header.
    pub fn entity_id(&self) -> Result<Url> {
        let value = self.header(ODATA_ENTITY_ID).ok_or_else(|| {
            WebApiError::Decode(format!("response has no {ODATA_ENTITY_ID} header"))
        })?;
        Url::parse(value)
            .map_err(|err| WebApiError::Decode(format!("invalid {ODATA_ENTITY_ID} '{value}': {err}")))
    }
}
