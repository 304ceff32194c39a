use thiserror::Error;

pub type GenResult<T> = std::result::Result<T, GenError>;

/// The closed set of failures a generation call can produce.
///
/// Only recipe generation surfaces these to callers; the auxiliary calls
/// (leftovers, dish image, step image, step audio) swallow every variant
/// into an empty result.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("The model returned an empty response")]
    EmptyResponse,
    #[error("The model response did not match the requested schema: {0}")]
    SchemaMismatch(#[from] serde_json::Error),
    #[error("Rate limited by the model API: {0}")]
    RateLimited(String),
    #[error("Upstream failure: {0}")]
    Upstream(#[from] anyhow::Error),
}

impl From<reqwest::Error> for GenError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(429) {
            GenError::RateLimited(err.to_string())
        } else {
            GenError::Upstream(err.into())
        }
    }
}

/// Decide whether an error should be retried as a rate limit.
///
/// Deliberately permissive: besides the structured `RateLimited` variant,
/// any message mentioning "429" or "quota" counts (case-sensitive). A
/// false positive only costs an extra backoff delay; a false negative
/// propagates immediately.
pub fn is_rate_limited(error: &GenError) -> bool {
    match error {
        GenError::RateLimited(_) => true,
        other => {
            let message = other.to_string();
            message.contains("429") || message.contains("quota")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn structured_rate_limits_are_retryable() {
        assert!(is_rate_limited(&GenError::RateLimited("slow down".into())));
    }

    #[test]
    fn message_sniffing_catches_unstructured_rate_limits() {
        assert!(is_rate_limited(&GenError::Upstream(anyhow!(
            "HTTP 429 from upstream"
        ))));
        assert!(is_rate_limited(&GenError::Upstream(anyhow!(
            "quota exceeded for model"
        ))));
        // Case-sensitive on purpose
        assert!(!is_rate_limited(&GenError::Upstream(anyhow!(
            "Quota exceeded for model"
        ))));
    }

    #[test]
    fn other_failures_are_not_retryable() {
        assert!(!is_rate_limited(&GenError::EmptyResponse));
        assert!(!is_rate_limited(&GenError::Upstream(anyhow!(
            "connection reset"
        ))));
    }
}
