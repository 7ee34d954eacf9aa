//! Capability contracts implemented by dictionary providers.

use async_trait::async_trait;

use crate::word::{WordGroup, WordRecord};

/// A provider of paginated word lists per named group.
///
/// Implementations should absorb transient network failures where they
/// can; callers treat an error as "zero pages" or "an empty page" and
/// do not retry on the provider's behalf.
#[async_trait]
pub trait WordSource: Send + Sync {
    /// Number of pages in the given group.
    async fn total_pages(&self, group: &WordGroup) -> eyre::Result<usize>;

    /// The words on one page of the given group.
    async fn words_on_page(&self, page: usize, group: &WordGroup) -> eyre::Result<Vec<String>>;
}

/// A provider of per-word enrichment data.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Look up a single word.
    ///
    /// `Ok(None)` means the provider has no data for the word; callers
    /// treat it the same way as an error.
    async fn query(&self, word: &str) -> eyre::Result<Option<WordRecord>>;
}
