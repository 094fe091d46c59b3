use axum::http::{HeaderMap, HeaderName};

/// Authenticated caller id. Only constructed through [`CallerId::parse`], so
/// it is always safe to embed in an object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(String);

impl CallerId {
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= 128
            && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        valid.then(|| CallerId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the caller from request headers; `None` means unauthenticated.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Option<CallerId>;
}

/// Trusts a header injected by the authenticating gateway in front of the service.
#[derive(Debug, Clone)]
pub struct TrustedHeaderIdentity {
    header: HeaderName,
}

impl TrustedHeaderIdentity {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl IdentityProvider for TrustedHeaderIdentity {
    fn authenticate(&self, headers: &HeaderMap) -> Option<CallerId> {
        let value = headers.get(&self.header)?.to_str().ok()?;
        CallerId::parse(value.trim())
    }
}
