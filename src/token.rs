use std::fmt;

use async_trait::async_trait;

/// Supplies access tokens for the Web API.
///
/// Called before every attempt, so implementations should cache and refresh
/// tokens themselves. The returned string is the bare token; the dispatcher
/// adds the `Bearer` scheme.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns an access token for `resource`, the environment URL.
    async fn acquire_token(&self, resource: &str) -> Result<String, String>;
}

/// A pre-acquired token used as-is for every request.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// A leading `Bearer ` scheme, in any case, is stripped.
    pub fn new(token: impl AsRef<str>) -> Self {
        Self(strip_bearer_scheme(token.as_ref()).to_owned())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticToken").field(&"<redacted>").finish()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn acquire_token(&self, _resource: &str) -> Result<String, String> {
        if self.0.is_empty() {
            return Err("static token is empty".to_owned());
        }
        Ok(self.0.clone())
    }
}

fn strip_bearer_scheme(token: &str) -> &str {
    let trimmed = token.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim_start(),
        None if trimmed.eq_ignore_ascii_case("bearer") => "",
        _ => trimmed,
    }
}
