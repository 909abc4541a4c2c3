//! Segment-discovery oracle: the contract to the external text-analysis
//! service.
//!
//! The oracle is a black box that, given a line-numbered text slice and an
//! expected element type, returns structured segment candidates. The engine
//! must not assume synchronous low latency - each call may take seconds -
//! so the trait is async and implementations must be cancellation-safe.
//!
//! - [`ClaudeOracle`] speaks the Anthropic messages API over HTTP.
//! - [`MockOracle`] replays scripted responses for tests.

pub mod claude;
pub mod mock;
pub mod prompt;

pub use claude::ClaudeOracle;
pub use mock::MockOracle;

use async_trait::async_trait;
use thiserror::Error;

use legis_core::{DocumentStructure, Segment};

/// Failures of a single oracle call.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Transient service or network failure. Retryable.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The response did not match the expected shape. Not retryable; the
    /// caller treats it as zero segments with a warning.
    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

impl OracleError {
    /// Whether a retry with backoff can reasonably succeed.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// One segment-discovery request: an element-type hint plus a
/// line-numbered text slice with its inclusive bounds.
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    /// What to look for, e.g. "chapter", "section", "rule".
    pub expected_type: String,
    /// The slice rendered as `line_num| text` rows.
    pub numbered_text: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// The external segment-discovery contract.
#[async_trait]
pub trait SegmentOracle: Send + Sync {
    /// Find all elements of the expected type within the given range.
    ///
    /// Returns segments in document order. Confidence values outside
    /// `[0, 1]` are clamped by the implementation, not rejected.
    async fn discover(&self, request: DiscoveryRequest) -> Result<Vec<Segment>, OracleError>;

    /// One-shot classification of a document sample into its
    /// [`DocumentStructure`] (type, jurisdiction, hierarchy levels).
    async fn classify(&self, sample: &str) -> Result<DocumentStructure, OracleError>;
}

/// Clamp a confidence value into `[0, 1]`, warning on out-of-range input.
pub(crate) fn clamp_confidence(value: f32, context: &str) -> f32 {
    if !(0.0..=1.0).contains(&value) {
        tracing::warn!("confidence {value} out of range for {context}, clamping");
        value.clamp(0.0, 1.0)
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_retryable() {
        assert!(OracleError::Unavailable("timeout".into()).is_retryable());
        assert!(!OracleError::Malformed("bad json".into()).is_retryable());
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(0.5, "t"), 0.5);
        assert_eq!(clamp_confidence(1.0, "t"), 1.0);
        assert_eq!(clamp_confidence(1.7, "t"), 1.0);
        assert_eq!(clamp_confidence(-0.2, "t"), 0.0);
    }
}
