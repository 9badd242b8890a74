use std::fmt;
use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    retry::{RetryDecision, RetryPolicy},
    transport::{HttpTransport, Transport, TransportRequest},
    translate::translate_error,
    CompletionMode, OutboundRequest, Response, Result, ServiceConfig, TokenProvider, WebApiError,
};

const ODATA_MAX_VERSION: HeaderName = HeaderName::from_static("odata-maxversion");
const ODATA_VERSION: HeaderName = HeaderName::from_static("odata-version");
const CALLER_OBJECT_ID: HeaderName = HeaderName::from_static("callerobjectid");

/// Sends requests to the Web API, retrying those rejected by service
/// protection limits.
///
/// Cheap to clone; clones share the connection pool and token provider and
/// may be used from any number of tasks at once.
#[derive(Clone)]
pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    token_provider: Arc<dyn TokenProvider>,
    config: Arc<ServiceConfig>,
    base_url: Url,
    default_headers: HeaderMap,
    policy: RetryPolicy,
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("base_url", &self.base_url.as_str())
            .field("config", &self.config)
            .field("token_provider", &"<redacted>")
            .finish()
    }
}

impl RequestDispatcher {
    /// Creates a dispatcher over a pooled HTTPS client.
    pub fn new(config: ServiceConfig, token_provider: impl TokenProvider + 'static) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(WebApiError::Transport)?;
        Self::with_transport(config, token_provider, HttpTransport::new(http))
    }

    /// Creates a dispatcher over a custom transport.
    pub fn with_transport(
        config: ServiceConfig,
        token_provider: impl TokenProvider + 'static,
        transport: impl Transport + 'static,
    ) -> Result<Self> {
        let base_url = Url::parse(&config.web_api_url()).map_err(|err| {
            WebApiError::Config(format!("invalid environment url '{}': {err}", config.url))
        })?;
        let default_headers = default_headers(&config);
        let policy = RetryPolicy::new(config.max_retries);

        Ok(Self {
            transport: Arc::new(transport),
            token_provider: Arc::new(token_provider),
            config: Arc::new(config),
            base_url,
            default_headers,
            policy,
        })
    }

    /// Web API root, e.g. `https://org.crm.dynamics.com/api/data/v9.1/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Sends `request`, retrying while the service answers 429.
    ///
    /// Returns the response for 2xx and 304. Any other status becomes
    /// [`WebApiError::Service`], or [`WebApiError::MalformedErrorPayload`]
    /// when the body is not a service error. `mode` decides whether a
    /// successful body is read. The request is never modified.
    pub async fn send(&self, request: &OutboundRequest, mode: CompletionMode) -> Result<Response> {
        self.send_with_cancellation(request, mode, &CancellationToken::new())
            .await
    }

    /// Like [`RequestDispatcher::send`], but gives up with
    /// [`WebApiError::Cancelled`] as soon as `cancel` fires, including while
    /// acquiring a token or waiting out a rate-limit delay.
    pub async fn send_with_cancellation(
        &self,
        request: &OutboundRequest,
        mode: CompletionMode,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let url = self.resolve(request.target())?;
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(WebApiError::Cancelled);
            }
            let transport_request = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WebApiError::Cancelled),
                prepared = self.prepare(request, &url, mode) => prepared?,
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(method = %request.method(), %url, attempt, "sending web api request");

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WebApiError::Cancelled),
                result = self.transport.execute(transport_request) => {
                    result.map_err(WebApiError::Transport)?
                }
            };

            let status = response.status();
            if status.is_success() || status == StatusCode::NOT_MODIFIED {
                return Ok(response);
            }
            if status != StatusCode::TOO_MANY_REQUESTS {
                #[cfg(feature = "tracing")]
                tracing::debug!(status = status.as_u16(), %url, "web api request failed");
                return Err(translate_error(&response));
            }

            let retry_after = response.headers().get(header::RETRY_AFTER);
            match self.policy.decide(attempt, retry_after) {
                RetryDecision::GiveUp => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(attempts = attempt + 1, %url, "service protection limit retries exhausted");
                    return Err(translate_error(&response));
                }
                RetryDecision::Wait(delay) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        seconds = delay.duration.as_secs(),
                        source = ?delay.source,
                        attempt,
                        "service protection limit hit, waiting before retry"
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(WebApiError::Cancelled),
                        _ = sleep(delay.duration) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Resolves a relative target against the Web API root. Absolute
    /// `http(s)` URIs are used unchanged.
    fn resolve(&self, target: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(target) {
            if matches!(url.scheme(), "http" | "https") {
                return Ok(url);
            }
        }
        self.base_url
            .join(target.trim_start_matches('/'))
            .map_err(|err| WebApiError::InvalidRequest(format!("invalid target '{target}': {err}")))
    }

    /// Builds the copy sent by one attempt: default headers, the caller's
    /// headers (which win over defaults), and a freshly acquired token.
    async fn prepare(
        &self,
        request: &OutboundRequest,
        url: &Url,
        mode: CompletionMode,
    ) -> Result<TransportRequest> {
        let mut headers = self.default_headers.clone();
        for name in request.header_map().keys() {
            headers.remove(name);
        }
        for (name, value) in request.header_map() {
            headers.append(name.clone(), value.clone());
        }

        let token = self
            .token_provider
            .acquire_token(&self.config.url)
            .await
            .map_err(WebApiError::Token)?;
        let mut authorization = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            WebApiError::Token("access token contains characters not allowed in a header".to_owned())
        })?;
        authorization.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, authorization);

        Ok(TransportRequest {
            method: request.method().clone(),
            url: url.clone(),
            headers,
            body: request.body_bytes().cloned(),
            timeout: self.config.timeout,
            completion: mode,
        })
    }
}

fn default_headers(config: &ServiceConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ODATA_MAX_VERSION, HeaderValue::from_static("4.0"));
    headers.insert(ODATA_VERSION, HeaderValue::from_static("4.0"));
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(id) = config.caller_object_id {
        // A hyphenated UUID is always a valid header value.
        if let Ok(value) = HeaderValue::from_str(&id.hyphenated().to_string()) {
            headers.insert(CALLER_OBJECT_ID, value);
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{default_headers, RequestDispatcher};
    use crate::{ServiceConfig, StaticToken, WebApiError};

    fn dispatcher() -> RequestDispatcher {
        RequestDispatcher::new(
            ServiceConfig::new("https://org.crm.dynamics.com"),
            StaticToken::new("secret-token"),
        )
        .expect("must build")
    }

    #[test]
    fn resolves_relative_targets_against_web_api_root() {
        let dispatcher = dispatcher();
        assert_eq!(
            dispatcher.resolve("contacts?$select=fullname").expect("url").as_str(),
            "https://org.crm.dynamics.com/api/data/v9.1/contacts?$select=fullname"
        );
        assert_eq!(
            dispatcher.resolve("/WhoAmI").expect("url").as_str(),
            "https://org.crm.dynamics.com/api/data/v9.1/WhoAmI"
        );
    }

    #[test]
    fn absolute_record_uri_is_used_unchanged() {
        let uri = "https://org.crm.dynamics.com/api/data/v9.1/contacts(00000000-0000-0000-0000-000000000001)";
        assert_eq!(dispatcher().resolve(uri).expect("url").as_str(), uri);
    }

    #[test]
    fn caller_object_id_header_only_when_configured() {
        let without = default_headers(&ServiceConfig::new("https://org"));
        assert!(without.get("CallerObjectId").is_none());
        assert_eq!(without.get("OData-MaxVersion").map(|v| v.as_bytes()), Some(&b"4.0"[..]));
        assert_eq!(without.get("OData-Version").map(|v| v.as_bytes()), Some(&b"4.0"[..]));
        assert_eq!(
            without.get("Accept").map(|v| v.as_bytes()),
            Some(&b"application/json"[..])
        );

        let id = Uuid::parse_str("0e2c5c3a-8c52-4f5b-9d1e-2f3a4b5c6d7e").expect("uuid");
        let with = default_headers(&ServiceConfig::new("https://org").with_caller_object_id(id));
        assert_eq!(
            with.get("CallerObjectId").map(|v| v.as_bytes()),
            Some(&b"0e2c5c3a-8c52-4f5b-9d1e-2f3a4b5c6d7e"[..])
        );
    }

    #[test]
    fn invalid_environment_url_is_config_error() {
        let err = RequestDispatcher::new(ServiceConfig::new("not a url"), StaticToken::new("t"))
            .expect_err("must fail");
        assert!(matches!(err, WebApiError::Config(_)));
    }

    #[test]
    fn debug_redacts_token_provider() {
        let debug = format!("{:?}", dispatcher());
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }
}
