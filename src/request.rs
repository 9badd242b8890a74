use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;

use crate::{Result, WebApiError};

/// A logical request to the Web API.
///
/// The value is never modified by the dispatcher; every attempt is built
/// from a copy. Cloning is cheap: the body is reference-counted.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundRequest {
    method: Method,
    target: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl OutboundRequest {
    /// Creates a request for a target relative to the Web API root
    /// (`"contacts"`, `"WhoAmI"`) or an absolute record URI.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(Method::PATCH, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    /// Appends a header value. Repeated names keep every value in order.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| WebApiError::InvalidRequest(format!("invalid header name '{name}': {err}")))?;
        let value = HeaderValue::from_str(value).map_err(|err| {
            WebApiError::InvalidRequest(format!("invalid value for header '{name}': {err}"))
        })?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Appends every value of a `name → values` mapping.
    pub fn headers<I, K, V>(self, headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        headers.into_iter().try_fold(self, |request, (name, values)| {
            values
                .into_iter()
                .try_fold(request, |request, value| {
                    request.header(name.as_ref(), value.as_ref())
                })
        })
    }

    /// Sets a raw body with its content type.
    pub fn body(mut self, body: impl Into<Bytes>, content_type: &str) -> Result<Self> {
        let content_type = HeaderValue::from_str(content_type).map_err(|err| {
            WebApiError::InvalidRequest(format!("invalid content type '{content_type}': {err}"))
        })?;
        self.headers.insert(CONTENT_TYPE, content_type);
        self.body = Some(body.into());
        Ok(self)
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(|err| {
            WebApiError::InvalidRequest(format!("request body is not serializable: {err}"))
        })?;
        self.body(body, "application/json")
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::OutboundRequest;
    use crate::WebApiError;

    #[test]
    fn json_body_sets_content_type() {
        let request = OutboundRequest::post("contacts")
            .json(&json!({"lastname": "Smith"}))
            .expect("must build");

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.content_type(), Some("application/json"));
        assert_eq!(
            request.body_bytes().map(|b| &b[..]),
            Some(&br#"{"lastname":"Smith"}"#[..])
        );
    }

    #[test]
    fn repeated_headers_keep_order() {
        let request = OutboundRequest::get("contacts")
            .headers([("Prefer", vec!["odata.maxpagesize=10", "odata.include-annotations=*"])])
            .expect("must build");

        let values: Vec<_> = request
            .header_map()
            .get_all("prefer")
            .iter()
            .map(|v| v.to_str().expect("ascii"))
            .collect();
        assert_eq!(values, ["odata.maxpagesize=10", "odata.include-annotations=*"]);
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let err = OutboundRequest::get("contacts")
            .header("bad header", "x")
            .expect_err("must fail");
        assert!(matches!(err, WebApiError::InvalidRequest(_)));
    }

    #[test]
    fn clones_are_independent() {
        let original = OutboundRequest::patch("contacts(1)")
            .json(&json!({"firstname": "A"}))
            .expect("must build");
        let copy = original
            .clone()
            .header("If-Match", "*")
            .expect("must build");

        assert!(original.header_map().get("if-match").is_none());
        assert!(copy.header_map().get("if-match").is_some());
        assert_eq!(original.body_bytes(), copy.body_bytes());
    }
}
