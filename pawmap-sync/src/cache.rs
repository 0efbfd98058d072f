//! Per-page entity cache and list-view browsing
//!
//! [`EntityCache`] holds the result of the newest map query. A failed fetch
//! empties it and records the error, so the page never shows stale entities
//! next to an error. [`PagedBrowser`] is the non-map list view.

use std::sync::Arc;

use pawmap_api::{ApiClient, ApiError, Entity, EntityCategory};

use crate::debounce::{SequenceGate, Ticket};
use crate::position::ViewportKey;

/// Completed map query, tagged with the ticket of the call that issued it
#[derive(Debug)]
pub struct FetchOutcome {
    pub ticket: Ticket,
    pub key: ViewportKey,
    pub result: Result<Vec<Entity>, ApiError>,
}

/// Run one map query
pub async fn fetch_entities(
    client: Arc<dyn ApiClient>,
    category: EntityCategory,
    ticket: Ticket,
    key: ViewportKey,
) -> FetchOutcome {
    let result = client.fetch_map(category, key.center, key.radius).await;
    FetchOutcome {
        ticket,
        key,
        result,
    }
}

/// What applying an outcome did to the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheUpdate {
    /// List replaced with this many entities
    Replaced(usize),
    /// Fetch failed: list emptied, error recorded
    Failed(String),
    /// A newer call was issued since; outcome discarded
    Stale,
}

#[derive(Debug, Default)]
pub struct EntityCache {
    entities: Vec<Entity>,
    error: Option<String>,
    key: Option<ViewportKey>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Viewport the current contents were fetched for
    pub fn key(&self) -> Option<ViewportKey> {
        self.key
    }

    pub fn get(&self, id: pawmap_api::EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Apply a finished fetch if its ticket is still the newest issued
    pub fn apply(&mut self, outcome: FetchOutcome, gate: &SequenceGate) -> CacheUpdate {
        if !gate.is_current(outcome.ticket) {
            tracing::debug!(
                ticket = outcome.ticket.value(),
                latest = gate.latest().map(|t| t.value()),
                "Discarding superseded fetch result"
            );
            return CacheUpdate::Stale;
        }

        self.key = Some(outcome.key);
        match outcome.result {
            Ok(entities) => {
                let center = outcome.key.center;
                self.entities = entities
                    .into_iter()
                    .map(|e| e.with_distance_from(&center))
                    .collect();
                self.error = None;
                CacheUpdate::Replaced(self.entities.len())
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    center = %outcome.key.center,
                    radius = %outcome.key.radius,
                    "Entity fetch failed"
                );
                self.entities.clear();
                let message = e.to_string();
                self.error = Some(message.clone());
                CacheUpdate::Failed(message)
            }
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.error = None;
        self.key = None;
    }
}

/// Result of one list-view page load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseStep {
    /// Page appended with this many items
    Appended(usize),
    /// Nothing more to load
    Exhausted,
    /// Load failed; the same page will be requested on retry
    Failed(String),
}

/// Append-on-scroll browsing of a category list
#[derive(Debug)]
pub struct PagedBrowser {
    category: EntityCategory,
    page_size: u32,
    next_page: u32,
    items: Vec<Entity>,
    exhausted: bool,
    error: Option<String>,
}

impl PagedBrowser {
    pub fn new(category: EntityCategory, page_size: u32) -> Self {
        Self {
            category,
            page_size: page_size.max(1),
            next_page: 0,
            items: Vec::new(),
            exhausted: false,
            error: None,
        }
    }

    pub fn items(&self) -> &[Entity] {
        &self.items
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    /// Load the next page and append it
    pub async fn load_next(&mut self, client: &dyn ApiClient) -> BrowseStep {
        if self.exhausted {
            return BrowseStep::Exhausted;
        }

        match client
            .fetch_page(self.category, self.next_page, self.page_size)
            .await
        {
            Ok(page) => {
                let count = page.content.len();
                let short = count < self.page_size as usize;
                self.items.extend(page.content);
                self.next_page += 1;
                self.error = None;
                if short || page.last {
                    self.exhausted = true;
                }
                tracing::debug!(
                    category = %self.category,
                    page = self.next_page - 1,
                    count,
                    exhausted = self.exhausted,
                    "Loaded list page"
                );
                BrowseStep::Appended(count)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    category = %self.category,
                    page = self.next_page,
                    "List page load failed"
                );
                let message = e.to_string();
                self.error = Some(message.clone());
                BrowseStep::Failed(message)
            }
        }
    }

    /// Start over from the first page
    pub fn reset(&mut self) {
        self.next_page = 0;
        self.items.clear();
        self.exhausted = false;
        self.error = None;
    }
}
