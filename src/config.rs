use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use crate::WebApiError;

/// Default sign-in authority used by token providers.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common";
/// Default Web API version.
pub const DEFAULT_VERSION: &str = "9.1";

/// Configures the target environment, retry bound and timeout.
///
/// Read-only once handed to a [`RequestDispatcher`](crate::RequestDispatcher).
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Environment URL, e.g. `https://yourorg.api.crm.dynamics.com`.
    pub url: String,
    /// Web API version, without the leading `v`.
    pub version: String,
    /// Maximum number of attempts for a request blocked by service
    /// protection limits.
    pub max_retries: u32,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Azure AD object id of the user to impersonate.
    pub caller_object_id: Option<Uuid>,
    pub authority: String,
    pub client_id: Option<String>,
    pub redirect_url: Option<String>,
    pub user_principal_name: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("url", &self.url)
            .field("version", &self.version)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("caller_object_id", &self.caller_object_id)
            .field("authority", &self.authority)
            .field("client_id", &self.client_id)
            .field("redirect_url", &self.redirect_url)
            .field("user_principal_name", &self.user_principal_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            version: DEFAULT_VERSION.to_owned(),
            max_retries: 3,
            timeout: Duration::from_secs(120),
            caller_object_id: None,
            authority: DEFAULT_AUTHORITY.to_owned(),
            client_id: None,
            redirect_url: None,
            user_principal_name: None,
            password: None,
        }
    }
}

impl ServiceConfig {
    /// Creates a configuration for an environment URL with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `CallerObjectId` impersonation header. The nil UUID clears it.
    pub fn with_caller_object_id(mut self, caller_object_id: Uuid) -> Self {
        self.caller_object_id = (!caller_object_id.is_nil()).then_some(caller_object_id);
        self
    }

    /// Root of the Web API, always ending in `/`.
    ///
    /// Example: `https://org.crm.dynamics.com` → `https://org.crm.dynamics.com/api/data/v9.1/`
    pub fn web_api_url(&self) -> String {
        format!(
            "{}/api/data/v{}/",
            self.url.trim().trim_end_matches('/'),
            self.version.trim().trim_start_matches(['v', 'V'])
        )
    }

    /// Parses a `Key=Value;Key=Value` connection string.
    ///
    /// Recognized keys: `Url`, `Authority`, `ClientId`, `RedirectUrl`,
    /// `UserPrincipalName`, `Password`, `CallerObjectId`, `Version`,
    /// `MaxRetries`, `TimeoutInSeconds`. A value of `null` counts as absent,
    /// and numeric or GUID values that fail to parse keep their default.
    ///
    /// # Example
    ///
    /// ```
    /// use cds_webapi::ServiceConfig;
    ///
    /// let config = ServiceConfig::from_connection_string(
    ///     "Url=https://org.crm.dynamics.com; MaxRetries=5; Version=9.2",
    /// )
    /// .unwrap();
    /// assert_eq!(config.max_retries, 5);
    /// assert_eq!(config.web_api_url(), "https://org.crm.dynamics.com/api/data/v9.2/");
    /// ```
    pub fn from_connection_string(connection_string: &str) -> Result<Self, WebApiError> {
        let lookup = |key: &str| connection_string_value(connection_string, key);

        let url = lookup("Url").ok_or_else(|| {
            WebApiError::Config("connection string is missing a Url value".to_owned())
        })?;

        let mut config = Self::new(url);
        if let Some(authority) = lookup("Authority") {
            config.authority = authority;
        }
        if let Some(version) = lookup("Version") {
            config.version = version;
        }
        if let Some(max_retries) = lookup("MaxRetries").and_then(|v| v.parse::<u8>().ok()) {
            config.max_retries = max_retries.into();
        }
        if let Some(secs) = lookup("TimeoutInSeconds").and_then(|v| v.parse::<u16>().ok()) {
            config.timeout = Duration::from_secs(secs.into());
        }
        if let Some(id) = lookup("CallerObjectId").and_then(|v| Uuid::parse_str(&v).ok()) {
            config = config.with_caller_object_id(id);
        }
        config.client_id = lookup("ClientId");
        config.redirect_url = lookup("RedirectUrl");
        config.user_principal_name = lookup("UserPrincipalName");
        config.password = lookup("Password");

        Ok(config)
    }

    /// Creates a configuration from environment variables.
    ///
    /// Reads `CDS_CONNECTION_STRING` when set. Otherwise reads:
    /// - `CDS_URL` — environment URL (required)
    /// - `CDS_VERSION`, `CDS_MAX_RETRIES`, `CDS_TIMEOUT_SECS`,
    ///   `CDS_CALLER_OBJECT_ID` — optional overrides
    pub fn from_env() -> Result<Self, WebApiError> {
        if let Ok(connection_string) = std::env::var("CDS_CONNECTION_STRING") {
            return Self::from_connection_string(&connection_string);
        }

        let url = std::env::var("CDS_URL")
            .map_err(|_| WebApiError::Config("missing CDS_URL environment variable".to_owned()))?;
        if url.trim().is_empty() {
            return Err(WebApiError::Config("CDS_URL is set but empty".to_owned()));
        }

        let mut config = Self::new(url);
        if let Ok(version) = std::env::var("CDS_VERSION") {
            config.version = version;
        }
        if let Ok(value) = std::env::var("CDS_MAX_RETRIES") {
            config.max_retries = value.trim().parse().map_err(|err| {
                WebApiError::Config(format!("invalid CDS_MAX_RETRIES '{value}': {err}"))
            })?;
        }
        if let Ok(value) = std::env::var("CDS_TIMEOUT_SECS") {
            let secs: u64 = value.trim().parse().map_err(|err| {
                WebApiError::Config(format!("invalid CDS_TIMEOUT_SECS '{value}': {err}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(value) = std::env::var("CDS_CALLER_OBJECT_ID") {
            let id = Uuid::parse_str(value.trim()).map_err(|err| {
                WebApiError::Config(format!("invalid CDS_CALLER_OBJECT_ID '{value}': {err}"))
            })?;
            config = config.with_caller_object_id(id);
        }
        Ok(config)
    }
}

fn connection_string_value(connection_string: &str, key: &str) -> Option<String> {
    connection_string
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(key))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("null"))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::{ServiceConfig, DEFAULT_AUTHORITY};
    use crate::WebApiError;

    #[test]
    fn defaults_match_service_conventions() {
        let config = ServiceConfig::new("https://org.crm.dynamics.com");
        assert_eq!(config.version, "9.1");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.authority, DEFAULT_AUTHORITY);
        assert!(config.caller_object_id.is_none());
    }

    #[test]
    fn web_api_url_normalizes_slashes_and_version_prefix() {
        let config = ServiceConfig::new("https://org.crm.dynamics.com/").with_version("v9.2");
        assert_eq!(
            config.web_api_url(),
            "https://org.crm.dynamics.com/api/data/v9.2/"
        );
    }

    #[test]
    fn connection_string_reads_all_keys() {
        let config = ServiceConfig::from_connection_string(
            "Url=https://org.crm.dynamics.com;Authority=https://login.example/tenant;\
             ClientId=51f81489-12ee-4a9e-aaae-a2591f45987d;RedirectUrl=app://58145B91;\
             UserPrincipalName=you@org.onmicrosoft.com;Password=s3cret;\
             CallerObjectId=0e2c5c3a-8c52-4f5b-9d1e-2f3a4b5c6d7e;Version=9.2;\
             MaxRetries=5;TimeoutInSeconds=60",
        )
        .expect("must parse");

        assert_eq!(config.url, "https://org.crm.dynamics.com");
        assert_eq!(config.authority, "https://login.example/tenant");
        assert_eq!(
            config.client_id.as_deref(),
            Some("51f81489-12ee-4a9e-aaae-a2591f45987d")
        );
        assert_eq!(config.redirect_url.as_deref(), Some("app://58145B91"));
        assert_eq!(
            config.user_principal_name.as_deref(),
            Some("you@org.onmicrosoft.com")
        );
        assert_eq!(config.password.as_deref(), Some("s3cret"));
        assert_eq!(
            config.caller_object_id,
            Some(Uuid::parse_str("0e2c5c3a-8c52-4f5b-9d1e-2f3a4b5c6d7e").expect("uuid"))
        );
        assert_eq!(config.version, "9.2");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn connection_string_null_and_garbage_keep_defaults() {
        let config = ServiceConfig::from_connection_string(
            "Url=https://org.crm.dynamics.com; Password=null; MaxRetries=lots; \
             TimeoutInSeconds=-1; CallerObjectId=not-a-guid; Authority=NULL",
        )
        .expect("must parse");

        assert!(config.password.is_none());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert!(config.caller_object_id.is_none());
        assert_eq!(config.authority, DEFAULT_AUTHORITY);
    }

    #[test]
    fn connection_string_without_url_is_rejected() {
        let err = ServiceConfig::from_connection_string("ClientId=abc;Url=null")
            .expect_err("must fail");
        assert!(matches!(err, WebApiError::Config(_)));
    }

    #[test]
    fn nil_caller_object_id_is_absent() {
        let config = ServiceConfig::new("https://org").with_caller_object_id(Uuid::nil());
        assert!(config.caller_object_id.is_none());
    }

    #[test]
    fn debug_redacts_password() {
        let mut config = ServiceConfig::new("https://org");
        config.password = Some("hunter2".to_owned());
        let debug = format!("{config:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }
}
