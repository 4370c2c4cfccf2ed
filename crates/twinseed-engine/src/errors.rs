//! Provisioning error model and retry backoff policy helpers.

use std::time::Duration;

use crate::document::DocumentError;

// ---------------------------------------------------------------------------
// TransportError: failures below the HTTP status line
// ---------------------------------------------------------------------------

/// HTTP method of an outgoing call, as far as retry policy cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A call that never produced an HTTP response.
///
/// HTTP error statuses are not transport errors; they are returned as
/// responses and recorded as rejections.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Whether a failed call with `method` may be repeated.
    ///
    /// Reads and deletes are idempotent and retried on any transport error.
    /// Creates are only retried when the connection was never established,
    /// since a timed-out POST may already have been applied.
    #[must_use]
    pub fn is_retryable_for(&self, method: Method) -> bool {
        match method {
            Method::Get | Method::Delete => true,
            Method::Post => matches!(self, Self::Connect(_)),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ProvisionError: run-level failures
// ---------------------------------------------------------------------------

/// Errors that abort a run before or instead of publishing.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Structural problem in the test-data document.
    #[error(transparent)]
    Input(#[from] DocumentError),
    /// Host-side failure (config resolution, client construction, task join).
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Retry budget and backoff curve for one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_ms: u64, max_ms: u64) -> Self {
        Self {
            max_retries,
            base: Duration::from_millis(base_ms),
            max: Duration::from_millis(max_ms),
        }
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
pub(crate) fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base_ms = u64::try_from(policy.base.as_millis()).unwrap_or(u64::MAX);
    let max_ms = u64::try_from(policy.max.as_millis()).unwrap_or(u64::MAX);
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // -----------------------------------------------------------------------
    // TransportError tests
    // -----------------------------------------------------------------------

    #[rstest]
    #[case(TransportError::Connect("refused".into()), Method::Get, true)]
    #[case(TransportError::Timeout("30s".into()), Method::Get, true)]
    #[case(TransportError::Request("reset".into()), Method::Delete, true)]
    #[case(TransportError::Connect("refused".into()), Method::Post, true)]
    #[case(TransportError::Timeout("30s".into()), Method::Post, false)]
    #[case(TransportError::Request("reset".into()), Method::Post, false)]
    fn test_retry_classification(
        #[case] err: TransportError,
        #[case] method: Method,
        #[case] expected: bool,
    ) {
        assert_eq!(err.is_retryable_for(method), expected);
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Connect("dns error: idonotexist".into());
        assert_eq!(err.to_string(), "connection failed: dns error: idonotexist");
    }

    // -----------------------------------------------------------------------
    // ProvisionError tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_provision_error_from_document_error() {
        let err: ProvisionError = DocumentError::NotAnObject.into();
        assert!(matches!(err, ProvisionError::Input(_)));
        assert!(err.to_string().contains("must be a JSON object"));
    }

    #[test]
    fn test_provision_error_from_anyhow() {
        let err: ProvisionError = anyhow::anyhow!("client build failed").into();
        assert!(matches!(err, ProvisionError::Infrastructure(_)));
        assert_eq!(err.to_string(), "client build failed");
    }

    // -----------------------------------------------------------------------
    // compute_backoff tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, 100, 10_000);
        assert_eq!(compute_backoff(&policy, 1), Duration::from_millis(100));
        assert_eq!(compute_backoff(&policy, 2), Duration::from_millis(200));
        assert_eq!(compute_backoff(&policy, 3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(20, 100, 1_000);
        assert_eq!(compute_backoff(&policy, 10), Duration::from_millis(1_000));
        assert_eq!(compute_backoff(&policy, 64), Duration::from_millis(1_000));
    }

    #[test]
    fn test_backoff_attempt_zero_uses_base() {
        let policy = RetryPolicy::new(1, 250, 10_000);
        assert_eq!(compute_backoff(&policy, 0), Duration::from_millis(250));
    }
}
