//! Provider error taxonomy and classification

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, UniInferError>;

/// Errors raised by providers, the registry, and the routing strategies.
///
/// Calling code can match broadly on the type or narrowly on a variant;
/// every failure path in the crate surfaces through this enum.
#[derive(Debug, Error)]
pub enum UniInferError {
    /// Authentication failed or no credentials could be resolved
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Rate limit exceeded
    #[error("rate limit error: {0}")]
    RateLimit(String),

    /// Request or connection timed out
    #[error("timeout error: {0}")]
    Timeout(String),

    /// The request was rejected as invalid before or by the backend
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other provider failure (network, parsing, server errors)
    #[error("provider error: {0}")]
    Provider(String),

    /// The requested provider name has no registration
    #[error("provider '{0}' not registered")]
    NotRegistered(String),

    /// Every provider in a fallback chain was exhausted
    #[error("all providers failed; last error: {last_error}")]
    AllProvidersFailed {
        /// Text of the last underlying error, kept for diagnosis
        last_error: String,
    },
}

type ErrorCtor = fn(String) -> UniInferError;

/// Substring patterns used to classify raw provider error text.
///
/// First match wins, so order matters: authentication before rate limit
/// before timeout before invalid-request.
const CLASSIFIERS: &[(&[&str], ErrorCtor)] = &[
    (
        &["auth", "unauthorized", "api key", "401"],
        UniInferError::Authentication,
    ),
    (
        &["rate limit", "ratelimit", "too many requests", "429"],
        UniInferError::RateLimit,
    ),
    (&["timeout", "timed out"], UniInferError::Timeout),
    (
        &["invalid", "validation", "bad request", "400"],
        UniInferError::InvalidRequest,
    ),
];

/// Classify a raw provider error message into the common taxonomy.
///
/// This is best-effort, heuristic text matching: providers do not agree
/// on status codes or error shapes, so unmatched messages fall through to
/// the generic [`UniInferError::Provider`] kind rather than being
/// misclassified.
pub fn map_provider_error(provider: &str, message: &str) -> UniInferError {
    let lowered = message.to_lowercase();
    for (patterns, ctor) in CLASSIFIERS {
        if patterns.iter().any(|pattern| lowered.contains(pattern)) {
            return ctor(format!("{provider}: {message}"));
        }
    }
    UniInferError::Provider(format!("{provider}: {message}"))
}

/// Map a non-2xx HTTP status (plus error body, when readable) to the
/// common taxonomy. Used on adapters' own response paths where the
/// status code is reliably known.
pub fn map_status(provider: &str, status: StatusCode, body: &str) -> UniInferError {
    let detail = if body.is_empty() {
        format!("{provider}: HTTP {status}")
    } else {
        format!("{provider}: HTTP {status}: {body}")
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UniInferError::Authentication(detail),
        StatusCode::TOO_MANY_REQUESTS => UniInferError::RateLimit(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => UniInferError::Timeout(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            UniInferError::InvalidRequest(detail)
        }
        _ => UniInferError::Provider(detail),
    }
}

/// Map a transport-level [`reqwest::Error`] to the common taxonomy,
/// tagged with the provider that raised it.
pub(crate) fn map_request_error(provider: &str, err: reqwest::Error) -> UniInferError {
    if err.is_timeout() {
        UniInferError::Timeout(format!("{provider}: request timed out: {err}"))
    } else if err.is_connect() {
        UniInferError::Provider(format!("{provider}: connection failed: {err}"))
    } else {
        UniInferError::Provider(format!("{provider}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("401 Unauthorized"; "status code in text")]
    #[test_case("Invalid API key provided"; "api key phrase")]
    #[test_case("authentication failed for account"; "auth phrase")]
    fn classifies_authentication(message: &str) {
        assert!(matches!(
            map_provider_error("x", message),
            UniInferError::Authentication(_)
        ));
    }

    #[test_case("Rate limit exceeded, slow down"; "rate limit phrase")]
    #[test_case("429 Too Many Requests"; "status 429")]
    fn classifies_rate_limit(message: &str) {
        assert!(matches!(
            map_provider_error("x", message),
            UniInferError::RateLimit(_)
        ));
    }

    #[test_case("Connection timed out"; "timed out phrase")]
    #[test_case("read timeout while waiting for body"; "timeout phrase")]
    fn classifies_timeout(message: &str) {
        assert!(matches!(
            map_provider_error("x", message),
            UniInferError::Timeout(_)
        ));
    }

    #[test_case("invalid model parameter"; "invalid phrase")]
    #[test_case("request failed validation"; "validation phrase")]
    fn classifies_invalid_request(message: &str) {
        assert!(matches!(
            map_provider_error("x", message),
            UniInferError::InvalidRequest(_)
        ));
    }

    #[test]
    fn unmatched_message_falls_through_to_generic() {
        let err = map_provider_error("x", "the weights caught fire");
        assert!(matches!(err, UniInferError::Provider(_)));
        assert!(err.to_string().contains("the weights caught fire"));
    }

    #[test]
    fn classified_errors_carry_provider_name() {
        let err = map_provider_error("mistral", "401 Unauthorized");
        assert!(err.to_string().contains("mistral"));
    }

    #[test]
    fn status_mapping_covers_the_taxonomy() {
        assert!(matches!(
            map_status("x", StatusCode::UNAUTHORIZED, ""),
            UniInferError::Authentication(_)
        ));
        assert!(matches!(
            map_status("x", StatusCode::TOO_MANY_REQUESTS, ""),
            UniInferError::RateLimit(_)
        ));
        assert!(matches!(
            map_status("x", StatusCode::GATEWAY_TIMEOUT, ""),
            UniInferError::Timeout(_)
        ));
        assert!(matches!(
            map_status("x", StatusCode::BAD_REQUEST, "bad field"),
            UniInferError::InvalidRequest(_)
        ));
        assert!(matches!(
            map_status("x", StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            UniInferError::Provider(_)
        ));
    }
}
