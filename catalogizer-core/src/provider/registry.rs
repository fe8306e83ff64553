// Provider Registry
//
// Providers register once at startup; the orchestrator selects from the
// registry by media type at recognition time.

use std::sync::Arc;

use crate::models::MediaType;

use super::traits::RecognitionProvider;

/// Registered recognition providers, in registration order
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn RecognitionProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn RecognitionProvider>) {
        tracing::debug!(provider = provider.name(), "Registered recognition provider");
        self.providers.push(provider);
    }

    /// Providers claiming support for `media_type`
    #[must_use]
    pub fn providers_for(&self, media_type: MediaType) -> Vec<Arc<dyn RecognitionProvider>> {
        self.providers
            .iter()
            .filter(|p| p.supports_media_type(media_type))
            .cloned()
            .collect()
    }

    /// All registered providers
    #[must_use]
    pub fn all(&self) -> &[Arc<dyn RecognitionProvider>] {
        &self.providers
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecognitionRequest, RecognitionResult};
    use crate::provider::ProviderError;
    use async_trait::async_trait;

    struct StubProvider {
        name: &'static str,
        supported: MediaType,
    }

    #[async_trait]
    impl RecognitionProvider for StubProvider {
        async fn recognize(
            &self,
            _request: &RecognitionRequest,
        ) -> Result<RecognitionResult, ProviderError> {
            Ok(RecognitionResult::new(self.supported, "stub", self.name))
        }

        fn name(&self) -> &'static str {
            self.name
        }

        fn supports_media_type(&self, media_type: MediaType) -> bool {
            media_type == self.supported
        }
    }

    #[test]
    fn test_selection_by_media_type() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider {
            name: "movies",
            supported: MediaType::Movie,
        }));
        registry.register(Arc::new(StubProvider {
            name: "music",
            supported: MediaType::Music,
        }));

        let movie_providers = registry.providers_for(MediaType::Movie);
        assert_eq!(movie_providers.len(), 1);
        assert_eq!(movie_providers[0].name(), "movies");
        assert!(registry.providers_for(MediaType::Game).is_empty());
    }

    #[test]
    fn test_registration_order_is_stable() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider {
            name: "a",
            supported: MediaType::Movie,
        }));
        registry.register(Arc::new(StubProvider {
            name: "b",
            supported: MediaType::Movie,
        }));
        assert_eq!(registry.names(), vec!["a", "b"]);
    }
}
