use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the correlation id in and out of the HTTP boundary.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation identifier of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generates a fresh random request id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Uses the inbound value when it is present and non-blank, otherwise generates one.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Self(v.to_string()),
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-request context passed explicitly into every service operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: RequestId,
}

impl RequestContext {
    pub fn new(request_id: RequestId) -> Self {
        Self { request_id }
    }

    /// A context with a freshly generated request id.
    pub fn generate() -> Self {
        Self::new(RequestId::generate())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::generate()
    }
}
