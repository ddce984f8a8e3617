use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::warn;

use crate::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-api-key";

/// Proof that the request carried the configured admin key. Extract this in
/// admin handlers; a missing or wrong key is rejected with 401.
pub struct AdminKey;

impl FromRequestParts<Arc<AppState>> for AdminKey {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let expected = &state.config.admin_key;
        if !expected.is_empty() && constant_time_eq(provided, expected) {
            return Ok(AdminKey);
        }

        warn!(path = %parts.uri.path(), "Rejected admin request with invalid key");
        Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Invalid or missing API key"})),
        )
            .into_response())
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_whole_keys() {
        assert!(constant_time_eq("dev123", "dev123"));
        assert!(!constant_time_eq("dev124", "dev123"));
        assert!(!constant_time_eq("dev12", "dev123"));
        assert!(!constant_time_eq("", "dev123"));
    }
}
