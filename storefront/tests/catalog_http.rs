//! Catalog client against a mock backend

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)] // Test code can use unwrap/expect/panic

use passline_storefront::{
    find_event, load_event, ApiClient, CatalogApi, CatalogError, EventId, HttpCatalog, PriceRange,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn catalog(server: &MockServer) -> HttpCatalog {
    HttpCatalog::new(ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap())
}

fn event_json(id: u64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "location": "Palais des Congrès",
        "start_date": "2025-03-12T19:00:00Z",
        "end_date": null,
        "price_range": { "min": "5000", "max": null },
        "pass_types": [
            { "id": id * 10 + 1, "event_id": id, "name": "Standard", "price": "5000.00", "quantity": 120 }
        ]
    })
}

#[tokio::test]
async fn test_list_events_reads_the_data_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [event_json(1, "Festival"), event_json(2, "Concert")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = catalog(&server).list_events().await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name, "Festival");
    assert_eq!(events[0].price_range, PriceRange::From { min: 5000.0 });
    assert_eq!(events[0].pass_types[0].price, 5000.0);
    assert_eq!(events[0].pass_types[0].quota, Some(120));
}

#[tokio::test]
async fn test_get_event_falls_back_to_listing_on_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/2"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not found" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [event_json(1, "Festival"), event_json(2, "Concert")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let event = find_event(&catalog(&server), EventId::new(2)).await.unwrap();

    assert_eq!(event.name, "Concert");
}

#[tokio::test]
async fn test_missing_event_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/99"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [event_json(1, "Festival")] })))
        .mount(&server)
        .await;

    let result = find_event(&catalog(&server), EventId::new(99)).await;

    assert!(matches!(result, Err(CatalogError::NotFound(id)) if id == EventId::new(99)));
}

#[tokio::test]
async fn test_load_event_asks_the_pass_type_endpoint_when_none_are_embedded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": 5, "name": "Gala", "pass_types": null }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events/5/pass-types"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": 51, "name": "Standard", "price": 10000 },
                { "id": 52, "name": "VIP", "price": "20000" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (event, pass_types) = load_event(&catalog(&server), EventId::new(5)).await.unwrap();

    assert_eq!(event.name, "Gala");
    assert!(event.start_date.is_none());
    assert_eq!(pass_types.iter().map(|p| p.price).collect::<Vec<_>>(), vec![10000.0, 20000.0]);
}

#[tokio::test]
async fn test_tags_tolerate_null_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": null })))
        .mount(&server)
        .await;

    let tags = catalog(&server).list_tags().await.unwrap();

    assert!(tags.is_empty());
}

#[tokio::test]
async fn test_every_call_hits_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(2)
        .mount(&server)
        .await;

    let catalog = catalog(&server);
    catalog.list_events().await.unwrap();
    catalog.list_events().await.unwrap();
}

#[tokio::test]
async fn test_malformed_pass_type_does_not_hide_the_catalog() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let mut broken = event_json(2, "Concert");
    broken["pass_types"][0]["price"] = serde_json::Value::Null;
    Mock::given(method("GET"))
        .and(path("/events/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [event_json(1, "Festival"), broken]
        })))
        .mount(&server)
        .await;

    let catalog = catalog(&server);
    let events = catalog.list_events().await.unwrap();
    let event = find_event(&catalog, EventId::new(1)).await.unwrap();

    assert_eq!(events.len(), 2);
    assert!(events[1].pass_types.is_empty());
    assert_eq!(event.name, "Festival");
    assert_eq!(event.pass_types.len(), 1);
}
