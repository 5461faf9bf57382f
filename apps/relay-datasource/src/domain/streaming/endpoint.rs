//! Upstream endpoint and credential.

use super::UpstreamError;

/// Bearer credential presented during the upstream handshake.
///
/// The `Debug` implementation redacts the token so it can never leak into
/// logs through `{:?}` formatting.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Create a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Configuration` if the token is empty or only
    /// whitespace.
    pub fn new(token: impl Into<String>) -> Result<Self, UpstreamError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(UpstreamError::Configuration(
                "bearer token cannot be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Build the `Authorization` header value.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// The single remote feed the relay connects to.
///
/// Immutable once built: the address, the optional subprotocol and origin
/// sent with the handshake, and the bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEndpoint {
    url: String,
    subprotocol: Option<String>,
    origin: Option<String>,
    token: BearerToken,
}

impl UpstreamEndpoint {
    /// Create an endpoint.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Configuration` if the address is empty or is
    /// not a `ws://` or `wss://` URL with a host.
    pub fn new(url: impl Into<String>, token: BearerToken) -> Result<Self, UpstreamError> {
        let url = url.into().trim().to_string();
        validate_url(&url)?;
        Ok(Self {
            url,
            subprotocol: None,
            origin: None,
            token,
        })
    }

    /// Set the websocket subprotocol requested during the handshake.
    #[must_use]
    pub fn with_subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.subprotocol = Some(subprotocol.into()).filter(|s| !s.is_empty());
        self
    }

    /// Set the `Origin` header sent during the handshake.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into()).filter(|s| !s.is_empty());
        self
    }

    /// Remote address.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Requested subprotocol, if any.
    #[must_use]
    pub fn subprotocol(&self) -> Option<&str> {
        self.subprotocol.as_deref()
    }

    /// Origin header, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Bearer credential.
    #[must_use]
    pub const fn token(&self) -> &BearerToken {
        &self.token
    }
}

fn validate_url(url: &str) -> Result<(), UpstreamError> {
    if url.is_empty() {
        return Err(UpstreamError::Configuration(
            "upstream address cannot be empty".to_string(),
        ));
    }

    let rest = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"))
        .ok_or_else(|| {
            UpstreamError::Configuration(format!(
                "upstream address must use ws:// or wss://: {url}"
            ))
        })?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(UpstreamError::Configuration(format!(
            "upstream address has no host: {url}"
        )));
    }

    Ok(())
}
