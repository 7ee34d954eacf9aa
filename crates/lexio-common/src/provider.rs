//! Registry of the known dictionary and query providers.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::source::{QueryApi, WordSource};

/// The closed set of supported providers.
///
/// Selection always happens by kind; there is no runtime discovery of
/// provider implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// The Eudict dictionary.
    Eudict,
    /// The Youdao dictionary.
    Youdao,
    /// The Bing dictionary API.
    Bing,
}

/// Provider implementations registered by the composition root.
#[derive(Default, Clone)]
#[must_use]
pub struct ProviderSet {
    sources: HashMap<ProviderKind, Arc<dyn WordSource>>,
    apis: HashMap<ProviderKind, Arc<dyn QueryApi>>,
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("apis", &self.apis.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderSet {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a word source for the given provider.
    ///
    /// # Panics
    ///
    /// Panics if a source was already registered for `kind`.
    pub fn register_word_source(
        &mut self,
        kind: ProviderKind,
        source: Arc<dyn WordSource>,
    ) -> &mut Self {
        assert!(
            !self.sources.contains_key(&kind),
            "a word source is already registered for provider: {kind:?}"
        );
        self.sources.insert(kind, source);
        self
    }

    /// Register a query API for the given provider.
    ///
    /// # Panics
    ///
    /// Panics if an API was already registered for `kind`.
    pub fn register_query_api(&mut self, kind: ProviderKind, api: Arc<dyn QueryApi>) -> &mut Self {
        assert!(
            !self.apis.contains_key(&kind),
            "a query API is already registered for provider: {kind:?}"
        );
        self.apis.insert(kind, api);
        self
    }

    /// The word source registered for the given provider, if any.
    #[must_use]
    pub fn word_source(&self, kind: ProviderKind) -> Option<Arc<dyn WordSource>> {
        self.sources.get(&kind).cloned()
    }

    /// The query API registered for the given provider, if any.
    #[must_use]
    pub fn query_api(&self, kind: ProviderKind) -> Option<Arc<dyn QueryApi>> {
        self.apis.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::word::WordGroup;

    struct NullSource;

    #[async_trait]
    impl WordSource for NullSource {
        async fn total_pages(&self, _group: &WordGroup) -> eyre::Result<usize> {
            Ok(0)
        }

        async fn words_on_page(
            &self,
            _page: usize,
            _group: &WordGroup,
        ) -> eyre::Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn lookup_returns_registered_providers() {
        let mut providers = ProviderSet::new();
        providers.register_word_source(ProviderKind::Youdao, Arc::new(NullSource));

        assert!(providers.word_source(ProviderKind::Youdao).is_some());
        assert!(providers.word_source(ProviderKind::Bing).is_none());
        assert!(providers.query_api(ProviderKind::Youdao).is_none());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let mut providers = ProviderSet::new();
        providers.register_word_source(ProviderKind::Eudict, Arc::new(NullSource));
        providers.register_word_source(ProviderKind::Eudict, Arc::new(NullSource));
    }
}
