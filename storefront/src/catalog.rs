//! Catalog client: events, pass types and tags.
//!
//! There is no cache; every screen visit fetches again.

use crate::api::ApiClient;
use crate::error::{ApiError, CatalogError};
use crate::types::{DataEnvelope, Event, EventId, LenientList, PassType, Tag};
use std::future::Future;
use std::pin::Pin;

/// Catalog result
pub type CatalogResult<T> = Result<T, ApiError>;

/// Boxed future returned by catalog operations
pub type CatalogFuture<T> = Pin<Box<dyn Future<Output = CatalogResult<T>> + Send>>;

/// Read-only access to the event catalog
///
/// Implemented over HTTP by [`HttpCatalog`] and in memory by
/// [`crate::mocks::MockCatalog`].
pub trait CatalogApi: Send + Sync {
    /// `GET /events/all`
    fn list_events(&self) -> CatalogFuture<Vec<Event>>;

    /// `GET /events/{id}`; `Ok(None)` when the body carries no event
    fn get_event(&self, id: EventId) -> CatalogFuture<Option<Event>>;

    /// `GET /events/{id}/pass-types`
    fn list_pass_types(&self, id: EventId) -> CatalogFuture<Vec<PassType>>;

    /// `GET /events/tags`
    fn list_tags(&self) -> CatalogFuture<Vec<Tag>>;
}

/// Catalog backed by the REST API
#[derive(Clone, Debug)]
pub struct HttpCatalog {
    api: ApiClient,
}

impl HttpCatalog {
    /// Create a catalog over an API client
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl CatalogApi for HttpCatalog {
    fn list_events(&self) -> CatalogFuture<Vec<Event>> {
        let api = self.api.clone();
        Box::pin(async move {
            let envelope: DataEnvelope<LenientList<Event>> = api.get("/events/all", None).await?;
            tracing::debug!(count = envelope.data.0.len(), "Fetched events");
            Ok(envelope.data.0)
        })
    }

    fn get_event(&self, id: EventId) -> CatalogFuture<Option<Event>> {
        let api = self.api.clone();
        Box::pin(async move {
            let envelope: DataEnvelope<Option<Event>> =
                api.get(&format!("/events/{id}"), None).await?;
            Ok(envelope.data)
        })
    }

    fn list_pass_types(&self, id: EventId) -> CatalogFuture<Vec<PassType>> {
        let api = self.api.clone();
        Box::pin(async move {
            let envelope: DataEnvelope<LenientList<PassType>> =
                api.get(&format!("/events/{id}/pass-types"), None).await?;
            Ok(envelope.data.0)
        })
    }

    fn list_tags(&self) -> CatalogFuture<Vec<Tag>> {
        let api = self.api.clone();
        Box::pin(async move {
            let envelope: DataEnvelope<Option<Vec<Tag>>> = api.get("/events/tags", None).await?;
            Ok(envelope.data.unwrap_or_default())
        })
    }
}

/// Look an event up, falling back to the full listing
///
/// Any failure of the direct fetch (network error, 404, empty body) triggers
/// the fallback. Only a failure of the listing itself is reported as an API
/// error; a listing without the id is [`CatalogError::NotFound`].
///
/// # Errors
///
/// Returns [`CatalogError::NotFound`] or [`CatalogError::Api`].
#[tracing::instrument(skip(catalog))]
pub async fn find_event(catalog: &dyn CatalogApi, id: EventId) -> Result<Event, CatalogError> {
    match catalog.get_event(id).await {
        Ok(Some(event)) => return Ok(event),
        Ok(None) => tracing::debug!("Event endpoint returned no data, trying the listing"),
        Err(error) => tracing::debug!(%error, "Event endpoint failed, trying the listing"),
    }

    catalog
        .list_events()
        .await?
        .into_iter()
        .find(|event| event.id == id)
        .ok_or(CatalogError::NotFound(id))
}

/// Load an event together with its pass types
///
/// Pass types embedded in the event win; when there are none the pass-type
/// endpoint is asked. A failure there leaves the list empty rather than
/// failing the whole screen.
///
/// # Errors
///
/// Propagates [`find_event`] errors.
pub async fn load_event(
    catalog: &dyn CatalogApi,
    id: EventId,
) -> Result<(Event, Vec<PassType>), CatalogError> {
    let event = find_event(catalog, id).await?;

    if !event.pass_types.is_empty() {
        let pass_types = event.pass_types.clone();
        return Ok((event, pass_types));
    }

    let pass_types = match catalog.list_pass_types(id).await {
        Ok(pass_types) => pass_types,
        Err(error) => {
            tracing::warn!(event_id = %id, %error, "Could not load pass types");
            Vec::new()
        },
    };

    Ok((event, pass_types))
}

/// Events shown under a tag filter
///
/// `None` keeps every event. Otherwise an event matches when its category
/// equals the tag name, ignoring case. An unknown tag id matches nothing.
#[must_use]
pub fn filter_by_tag<'a>(events: &'a [Event], tags: &[Tag], tag_id: Option<u64>) -> Vec<&'a Event> {
    let Some(tag_id) = tag_id else {
        return events.iter().collect();
    };
    let Some(wanted) = tags.iter().find(|tag| tag.id == tag_id).map(|tag| tag.name.to_lowercase()) else {
        return Vec::new();
    };

    events
        .iter()
        .filter(|event| event.category.as_deref().is_some_and(|c| c.to_lowercase() == wanted))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{sample_event, MockCatalog};

    fn categorized(id: u64, category: Option<&str>) -> Event {
        Event {
            category: category.map(str::to_owned),
            ..sample_event(id, &[])
        }
    }

    fn tag(id: u64, name: &str) -> Tag {
        Tag {
            id,
            name: name.to_string(),
            slug: None,
        }
    }

    #[test]
    fn test_filter_by_tag_matches_category_ignoring_case() {
        let events = vec![
            categorized(1, Some("Concert")),
            categorized(2, Some("Théâtre")),
            categorized(3, None),
            categorized(4, Some("CONCERT")),
        ];
        let tags = vec![tag(1, "concert"), tag(2, "Théâtre")];

        let ids = |picked: Vec<&Event>| picked.iter().map(|e| e.id.get()).collect::<Vec<_>>();

        assert_eq!(ids(filter_by_tag(&events, &tags, None)), vec![1, 2, 3, 4]);
        assert_eq!(ids(filter_by_tag(&events, &tags, Some(1))), vec![1, 4]);
        assert_eq!(ids(filter_by_tag(&events, &tags, Some(2))), vec![2]);
        assert!(filter_by_tag(&events, &tags, Some(9)).is_empty());
    }

    #[tokio::test]
    async fn test_find_event_direct_hit() {
        let catalog = MockCatalog::new(vec![sample_event(1, &[10000.0])]);

        let event = find_event(&catalog, EventId::new(1)).await.unwrap();

        assert_eq!(event.id, EventId::new(1));
        assert_eq!(catalog.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_find_event_falls_back_to_listing() {
        let catalog = MockCatalog::new(vec![sample_event(1, &[]), sample_event(2, &[])])
            .with_direct_lookup_failing();

        let event = find_event(&catalog, EventId::new(2)).await.unwrap();

        assert_eq!(event.id, EventId::new(2));
        assert_eq!(catalog.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_find_event_not_found() {
        let catalog = MockCatalog::new(vec![sample_event(1, &[])]).with_direct_lookup_failing();

        let result = find_event(&catalog, EventId::new(99)).await;

        assert!(matches!(result, Err(CatalogError::NotFound(id)) if id == EventId::new(99)));
    }

    #[tokio::test]
    async fn test_load_event_fetches_missing_pass_types() {
        let catalog = MockCatalog::new(vec![sample_event(3, &[])])
            .with_pass_types(EventId::new(3), sample_event(3, &[5000.0]).pass_types);

        let (_, pass_types) = load_event(&catalog, EventId::new(3)).await.unwrap();

        assert_eq!(pass_types.len(), 1);
        assert_eq!(catalog.pass_type_calls(), 1);
    }

    #[tokio::test]
    async fn test_load_event_prefers_embedded_pass_types() {
        let catalog = MockCatalog::new(vec![sample_event(4, &[10000.0, 20000.0])]);

        let (_, pass_types) = load_event(&catalog, EventId::new(4)).await.unwrap();

        assert_eq!(pass_types.len(), 2);
        assert_eq!(catalog.pass_type_calls(), 0);
    }
}
