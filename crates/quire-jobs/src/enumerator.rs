//! Deterministic enumeration of the items a bulk job covers.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, instrument};

use quire_core::{ContentStore, ItemRef, RebuildMode, RebuildRequest, Result};

/// Finite, duplicate-free item sequence computed at job start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    items: Vec<ItemRef>,
}

impl Enumeration {
    pub fn new(items: Vec<ItemRef>) -> Self {
        Self { items }
    }

    /// Enumeration of exactly one item.
    pub fn single(item: ItemRef) -> Self {
        Self { items: vec![item] }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ItemRef] {
        &self.items
    }

    /// Consume lazily, in order.
    pub fn into_stream(self) -> BoxStream<'static, ItemRef> {
        stream::iter(self.items).boxed()
    }
}

/// Builds enumerations from the content store.
///
/// Categories come in fixed order (sources, notes, insights); within a
/// category items are ordered by `(created_at, id)`.
#[derive(Clone)]
pub struct ItemEnumerator {
    store: Arc<dyn ContentStore>,
}

impl ItemEnumerator {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Enumerate every item selected by `request`.
    #[instrument(skip(self, request), fields(subsystem = "jobs", component = "enumerator", op = "enumerate"))]
    pub async fn enumerate(&self, request: &RebuildRequest) -> Result<Enumeration> {
        let items = self.collect(request, &HashSet::new()).await?;
        debug!(items = items.len(), mode = ?request.mode, "Enumeration computed");
        Ok(Enumeration::new(items))
    }

    /// Item count for `request` right now. Informational only.
    pub async fn estimate(&self, request: &RebuildRequest) -> Result<u64> {
        Ok(self.enumerate(request).await?.len() as u64)
    }

    /// Eligible items not already in `seen`, typically created mid-run.
    #[instrument(skip(self, request, seen), fields(subsystem = "jobs", component = "enumerator", op = "rescan"))]
    pub async fn rescan(
        &self,
        request: &RebuildRequest,
        seen: &HashSet<ItemRef>,
    ) -> Result<Enumeration> {
        let items = self.collect(request, seen).await?;
        debug!(new_items = items.len(), "Rescan complete");
        Ok(Enumeration::new(items))
    }

    async fn collect(
        &self,
        request: &RebuildRequest,
        exclude: &HashSet<ItemRef>,
    ) -> Result<Vec<ItemRef>> {
        let embedded_only = request.mode == RebuildMode::Existing;
        let mut seen: HashSet<ItemRef> = HashSet::new();
        let mut ordered = Vec::new();

        for category in request.categories() {
            let mut items = self.store.list_items(category, embedded_only).await?;
            items.retain(|item| item.category == category && (!embedded_only || item.has_embedding));
            items.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

            for item in items {
                let item_ref = item.item_ref();
                if exclude.contains(&item_ref) || !seen.insert(item_ref.clone()) {
                    continue;
                }
                ordered.push(item_ref);
            }
        }

        Ok(ordered)
    }
}
