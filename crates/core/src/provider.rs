//! Font source providers: capabilities yielding candidate variants.

use async_trait::async_trait;
use futures::future::join_all;

use crate::variant::FontVariant;

/// One font acquisition method (static map, directory, network
/// repository). Providers absorb their own I/O failures and report them
/// as an empty candidate list.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Candidate variants for a family, in this provider's priority
    /// order.
    async fn variants(&self, family: &str) -> Vec<FontVariant>;
}

/// Query every provider for a family and concatenate the results in
/// provider-priority order. Providers run concurrently.
pub async fn merged_variants(
    providers: &[Box<dyn SourceProvider>],
    family: &str,
) -> Vec<FontVariant> {
    let queries = providers.iter().map(|provider| provider.variants(family));
    join_all(queries).await.into_iter().flatten().collect()
}
