//! Retryability classification for failed status queries.
//!
//! The refresh step never decides on its own whether a transport failure is
//! worth retrying. It asks the [`RetryPolicy`] carried by the wait options, so
//! each backing API can bring its own rules.

use crate::error::TransportError;

/// Decides whether a failed status query may succeed on a later attempt.
pub trait RetryPolicy: Send + Sync {
    fn is_retryable(&self, error: &TransportError) -> bool;
}

impl<F> RetryPolicy for F
where
    F: Fn(&TransportError) -> bool + Send + Sync,
{
    fn is_retryable(&self, error: &TransportError) -> bool {
        self(error)
    }
}

/// Retries rate limiting, server-side unavailability and network hiccups.
///
/// Everything else (permission denied, not found, malformed responses) is
/// treated as permanent.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientErrors;

impl TransientErrors {
    const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];
}

impl RetryPolicy for TransientErrors {
    fn is_retryable(&self, error: &TransportError) -> bool {
        match error {
            TransportError::Status { status, .. } => Self::RETRYABLE_STATUSES.contains(status),
            TransportError::Connection(_) | TransportError::Timeout(_) => true,
            TransportError::Decode(_)
            | TransportError::InvalidRequest(_)
            | TransportError::Other(_) => false,
        }
    }
}

/// Treats every transport failure as permanent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl RetryPolicy for NeverRetry {
    fn is_retryable(&self, _error: &TransportError) -> bool {
        false
    }
}
