//! Record-level helpers layered on [`RequestDispatcher::send`].
//!
//! Each helper accepts extra `(name, value)` headers for special behaviors
//! such as `If-Match`, `If-None-Match` or `Prefer`. A name may repeat.

use serde::Serialize;
use serde_json::Value as JsonValue;
use url::Url;

use crate::{wire, CompletionMode, OutboundRequest, RequestDispatcher, Response, Result};

/// Extra request headers as ordered `(name, value)` pairs.
pub type ExtraHeaders<'a> = &'a [(&'a str, &'a str)];

impl RequestDispatcher {
    /// Creates a record and returns its URI from `OData-EntityId`.
    pub async fn post_create<B: Serialize + ?Sized>(&self, entity_set: &str, body: &B) -> Result<Url> {
        let request = OutboundRequest::post(entity_set).json(body)?;
        let response = self
            .send(&request, CompletionMode::ResponseHeadersRead)
            .await?;
        response.entity_id()
    }

    /// Posts `body` (typically to an action) and returns the JSON response,
    /// or `None` when the service sends no content.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        headers: ExtraHeaders<'_>,
    ) -> Result<Option<JsonValue>> {
        let request = OutboundRequest::post(path)
            .json(body)?
            .headers(headers.iter().map(|(name, value)| (*name, [*value])))?;
        let response = self
            .send(&request, CompletionMode::ResponseContentRead)
            .await?;
        optional_json(&response)
    }

    /// Retrieves data. Returns `None` when a conditional request answered
    /// 304 Not Modified.
    pub async fn get(&self, path: &str, headers: ExtraHeaders<'_>) -> Result<Option<JsonValue>> {
        let request = OutboundRequest::get(path)
            .headers(headers.iter().map(|(name, value)| (*name, [*value])))?;
        let response = self
            .send(&request, CompletionMode::ResponseContentRead)
            .await?;
        if response.is_not_modified() {
            return Ok(None);
        }
        response.json().map(Some)
    }

    /// Updates a record. `target` is an entity path or a record URI.
    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        target: &str,
        body: &B,
        headers: ExtraHeaders<'_>,
    ) -> Result<()> {
        let request = OutboundRequest::patch(target)
            .json(body)?
            .headers(headers.iter().map(|(name, value)| (*name, [*value])))?;
        self.send(&request, CompletionMode::ResponseHeadersRead)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, target: &str, headers: ExtraHeaders<'_>) -> Result<()> {
        let request = OutboundRequest::delete(target)
            .headers(headers.iter().map(|(name, value)| (*name, [*value])))?;
        self.send(&request, CompletionMode::ResponseHeadersRead)
            .await?;
        Ok(())
    }

    /// Sets a single property: `PUT {target}/{property}` with
    /// `{"value": value}`.
    pub async fn put<V: Serialize + ?Sized>(&self, target: &str, property: &str, value: &V) -> Result<()> {
        let path = format!("{}/{property}", target.trim_end_matches('/'));
        let request = OutboundRequest::put(path).json(&wire::PropertyValue { value })?;
        self.send(&request, CompletionMode::ResponseHeadersRead)
            .await?;
        Ok(())
    }
}

fn optional_json(response: &Response) -> Result<Option<JsonValue>> {
    if response.body().iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    response.json().map(Some)
}
