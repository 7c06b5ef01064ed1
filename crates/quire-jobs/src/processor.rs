//! Per-item processing.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use quire_core::{EmbedStatus, EmbeddingProvider, ItemOutcome, ItemRef};

/// Processes one item. Kind-specific arguments are bound at construction.
///
/// Implementations are idempotent and report faults as
/// [`ItemOutcome`] failures instead of returning errors.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: &ItemRef) -> ItemOutcome;
}

/// Regenerates embeddings through an [`EmbeddingProvider`].
pub struct EmbeddingProcessor {
    provider: Arc<dyn EmbeddingProvider>,
    force: bool,
}

impl EmbeddingProcessor {
    /// `force` makes the provider re-embed even when it considers the item
    /// current. Jobs always force: a rebuild mode narrows which items are
    /// enumerated, never whether they are re-embedded.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, force: bool) -> Self {
        Self { provider, force }
    }
}

#[async_trait]
impl ItemProcessor for EmbeddingProcessor {
    async fn process(&self, item: &ItemRef) -> ItemOutcome {
        let outcome = match self.provider.embed(item, self.force).await {
            Ok(EmbedStatus::Embedded) => ItemOutcome::success(item.clone()),
            Ok(EmbedStatus::AlreadyUpToDate) => ItemOutcome::skipped(item.clone()),
            Err(e) => ItemOutcome::failed(item.clone(), e.to_string()),
        };
        trace!(
            subsystem = "jobs",
            component = "processor",
            item_id = %item.id,
            category = %item.category,
            result = ?outcome.result,
            "Item processed"
        );
        outcome
    }
}
