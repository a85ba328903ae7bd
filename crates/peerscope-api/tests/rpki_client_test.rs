#![allow(clippy::unwrap_used)]
// Integration tests for `RpkiClient` using wiremock.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use peerscope_api::{Error, RpkiClient, RpkiValidity};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RpkiClient) {
    let server = MockServer::start().await;
    let client = RpkiClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

fn validity_body(state: &str) -> serde_json::Value {
    json!({
        "validated_route": {
            "route": { "origin_asn": "AS13335", "prefix": "1.1.1.0/24" },
            "validity": { "state": state, "description": "" }
        }
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_valid_origin() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/validity/AS13335/1.1.1.0/24"))
        .respond_with(ResponseTemplate::new(200).set_body_json(validity_body("valid")))
        .mount(&server)
        .await;

    let state = client.validity(13335, "1.1.1.0/24").await.unwrap();
    assert_eq!(state, RpkiValidity::Valid);
}

#[tokio::test]
async fn test_not_found_origin() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/validity/AS64500/192.0.2.0/24"))
        .respond_with(ResponseTemplate::new(200).set_body_json(validity_body("not-found")))
        .mount(&server)
        .await;

    let state = client.validity(64500, "192.0.2.0/24").await.unwrap();
    assert_eq!(state, RpkiValidity::NotFound);
}

#[tokio::test]
async fn test_validator_error_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/validity/AS13335/1.1.1.0/24"))
        .respond_with(ResponseTemplate::new(503).set_body_string("initial validation ongoing"))
        .mount(&server)
        .await;

    let err = client.validity(13335, "1.1.1.0/24").await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 503, .. }));
}
