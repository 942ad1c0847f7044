//! In-memory test doubles for the injected traits.
//!
//! Every double counts its calls so tests can assert that a code path made
//! no request at all.

use crate::api::BearerToken;
use crate::catalog::{CatalogApi, CatalogFuture};
use crate::error::{ApiError, CheckoutError};
use crate::reconciliation::{OrderApi, OrderConfirmation, OrderFuture, OrderRequest};
use crate::types::{Event, EventId, PassType, PassTypeId, PriceRange, Tag};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Event with one pass type per price, ids `id * 10 + n`
#[must_use]
pub fn sample_event(id: u64, prices: &[f64]) -> Event {
    let pass_types: Vec<PassType> = prices
        .iter()
        .zip(1u64..)
        .map(|(price, n)| PassType {
            id: PassTypeId::new(id * 10 + n),
            event_id: Some(EventId::new(id)),
            name: format!("Pass {n}"),
            price: *price,
            quota: Some(100),
            description: None,
        })
        .collect();

    Event {
        id: EventId::new(id),
        name: format!("Event {id}"),
        description: None,
        location: Some("Cotonou".to_string()),
        start_date: None,
        end_date: None,
        banner_url: None,
        category: None,
        price_range: PriceRange::from_pass_types(&pass_types),
        pass_types,
        tags: Vec::new(),
    }
}

/// Catalog backed by a fixed event list
#[derive(Clone, Default)]
pub struct MockCatalog {
    events: Vec<Event>,
    pass_types: HashMap<EventId, Vec<PassType>>,
    tags: Vec<Tag>,
    direct_lookup_fails: bool,
    listing_fails: bool,
    list_calls: Arc<AtomicUsize>,
    get_calls: Arc<AtomicUsize>,
    pass_type_calls: Arc<AtomicUsize>,
}

impl MockCatalog {
    /// Catalog listing `events`
    #[must_use]
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    /// Make `GET /events/{id}` fail so lookups fall back to the listing
    #[must_use]
    pub const fn with_direct_lookup_failing(mut self) -> Self {
        self.direct_lookup_fails = true;
        self
    }

    /// Make every call fail as if offline
    #[must_use]
    pub const fn offline(mut self) -> Self {
        self.direct_lookup_fails = true;
        self.listing_fails = true;
        self
    }

    /// Serve `pass_types` from the pass-type endpoint of `id`
    #[must_use]
    pub fn with_pass_types(mut self, id: EventId, pass_types: Vec<PassType>) -> Self {
        self.pass_types.insert(id, pass_types);
        self
    }

    /// Serve `tags` from the tag endpoint
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    /// Calls to `list_events`
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Calls to `get_event`
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Calls to `list_pass_types`
    #[must_use]
    pub fn pass_type_calls(&self) -> usize {
        self.pass_type_calls.load(Ordering::SeqCst)
    }

    fn offline_error() -> ApiError {
        ApiError::RequestFailed("connection refused".to_string())
    }
}

impl CatalogApi for MockCatalog {
    fn list_events(&self) -> CatalogFuture<Vec<Event>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.listing_fails {
            Err(Self::offline_error())
        } else {
            Ok(self.events.clone())
        };
        Box::pin(async move { result })
    }

    fn get_event(&self, id: EventId) -> CatalogFuture<Option<Event>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.direct_lookup_fails {
            Err(ApiError::Status {
                status: 404,
                message: "Not found".to_string(),
            })
        } else {
            Ok(self.events.iter().find(|event| event.id == id).cloned())
        };
        Box::pin(async move { result })
    }

    fn list_pass_types(&self, id: EventId) -> CatalogFuture<Vec<PassType>> {
        self.pass_type_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.listing_fails {
            Err(Self::offline_error())
        } else {
            Ok(self.pass_types.get(&id).cloned().unwrap_or_default())
        };
        Box::pin(async move { result })
    }

    fn list_tags(&self) -> CatalogFuture<Vec<Tag>> {
        let tags = self.tags.clone();
        Box::pin(async move { Ok(tags) })
    }
}

/// Order API answering every request with the same outcome
#[derive(Clone)]
pub struct MockOrderApi {
    outcome: Result<OrderConfirmation, CheckoutError>,
    calls: Arc<AtomicUsize>,
    orders: Arc<Mutex<Vec<(OrderRequest, BearerToken)>>>,
}

impl MockOrderApi {
    /// Accept every order
    #[must_use]
    pub fn accepting() -> Self {
        Self::answering(Ok(OrderConfirmation {
            body: serde_json::json!({ "status": "created" }),
        }))
    }

    /// Reject every order with `error`
    #[must_use]
    pub fn rejecting(error: CheckoutError) -> Self {
        Self::answering(Err(error))
    }

    fn answering(outcome: Result<OrderConfirmation, CheckoutError>) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
            orders: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of finalize requests
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most recent request and the token it carried
    #[must_use]
    pub fn last_order(&self) -> Option<(OrderRequest, BearerToken)> {
        self.orders.lock().ok().and_then(|orders| orders.last().cloned())
    }
}

impl OrderApi for MockOrderApi {
    fn finalize(&self, order: OrderRequest, token: BearerToken) -> OrderFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut orders) = self.orders.lock() {
            orders.push((order, token));
        }
        let outcome = self.outcome.clone();
        Box::pin(async move { outcome })
    }
}
