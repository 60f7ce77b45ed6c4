//! Admin bearer-token authentication
//!
//! Spec §6: every admin-facing route requires `Authorization: Bearer
//! <token>` matching the configured `AUTH_TOKEN`; missing or mismatched
//! tokens are a 401. This is deliberately not JWT-based — the spec's
//! identity model is explicitly out of scope (§1 Non-goals) and a single
//! shared secret is all the external interface calls for.

/// Extract the token from an `Authorization: Bearer <token>` header value.
fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Compare an `Authorization` header value against the configured token.
///
/// Returns `true` iff the header is exactly `Bearer <token>`.
pub fn bearer_token_matches(auth_header: Option<&str>, expected_token: &str) -> bool {
    match auth_header.and_then(extract_bearer_token) {
        Some(presented) => constant_time_eq(presented.as_bytes(), expected_token.as_bytes()),
        None => false,
    }
}

/// Constant-time byte comparison, so token checking doesn't leak timing
/// information about how many leading bytes matched.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_exact_bearer_token() {
        assert!(bearer_token_matches(Some("Bearer secret123"), "secret123"));
    }

    #[test]
    fn rejects_missing_header() {
        assert!(!bearer_token_matches(None, "secret123"));
    }

    #[test]
    fn rejects_wrong_token() {
        assert!(!bearer_token_matches(Some("Bearer wrong"), "secret123"));
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        assert!(!bearer_token_matches(
            Some("Basic c2VjcmV0MTIz"),
            "secret123"
        ));
    }

    #[test]
    fn rejects_mismatched_length() {
        assert!(!bearer_token_matches(Some("Bearer short"), "a_much_longer_token"));
    }
}
