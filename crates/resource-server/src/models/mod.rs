//! Response payloads.

use serde::Serialize;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Always `"healthy"` while the process serves requests.
    pub status: &'static str,

    /// `"static"` or `"jwks"`.
    pub verification: &'static str,

    /// Number of loaded verification keys.
    pub key_count: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            verification: "jwks",
            key_count: 3,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "healthy", "verification": "jwks", "key_count": 3})
        );
    }
}
