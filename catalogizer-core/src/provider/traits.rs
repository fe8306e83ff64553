// Recognition Provider Traits
//
// Capability interface every metadata provider implements. Providers are
// independent records registered with the orchestrator at startup; the
// orchestrator never downcasts.

use async_trait::async_trait;

use crate::models::{MediaType, RecognitionRequest, RecognitionResult};

use super::error::ProviderError;

/// A metadata source that can identify media from a request
#[async_trait]
pub trait RecognitionProvider: Send + Sync {
    /// Identify the media described by `request`.
    ///
    /// A result below `confidence_threshold()` is discarded by the
    /// orchestrator; a provider should still return its best candidate
    /// rather than erroring, reserving errors for transport failures and
    /// definitive "no such entity" answers.
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResult, ProviderError>;

    /// Stable provider name, used for logging and deterministic tiebreaks
    fn name(&self) -> &'static str;

    /// Whether this provider can handle the given media type
    fn supports_media_type(&self, media_type: MediaType) -> bool;

    /// Minimum confidence a result from this provider must reach
    fn confidence_threshold(&self) -> f64 {
        0.5
    }
}
