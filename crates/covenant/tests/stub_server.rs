//! Integration tests for the stub server
//!
//! Each test starts an in-process server on an ephemeral port and talks to
//! it over HTTP.

use assert_json_diff::{assert_json_eq, assert_json_include};
use covenant::document::parse_contract;
use covenant::server::StubServer;
use covenant::stub::{HttpStub, StubSettings};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value as Json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

const NUMBERS: &str = r#"
name: numbers
scenarios:
  - name: get number
    request:
      method: GET
      path: /number
    response:
      status: 200
      body:
        number: "(number)"
  - name: get number by id
    request:
      method: GET
      path: /number/(id:number)
    response:
      status: 200
      body:
        number: "(number)"
  - name: post number
    request:
      method: POST
      path: /number
      body:
        number: "(number)"
    response:
      status: 201
"#;

const OPEN_NUMBERS: &str = r#"
name: open numbers
scenarios:
  - name: post number
    request:
      method: POST
      path: /number
      body:
        number: "(number)"
        "...": true
    response:
      status: 201
"#;

/// Start a stub for `contract`, returning its base URL
async fn start_stub(contract: &str, strict: bool) -> String {
    let feature = parse_contract(contract).expect("contract parses");
    let stub = HttpStub::new(
        vec![feature],
        StubSettings {
            strict,
            default_delay: None,
        },
    );
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = StubServer::bind(addr, Arc::new(stub)).await.expect("bind");
    let url = format!("http://{}", server.local_addr().unwrap());
    tokio::spawn(server.run());
    url
}

async fn register(client: &Client, url: &str, expectation: Json) -> reqwest::Response {
    client
        .post(format!("{url}/_covenant/expectations"))
        .json(&expectation)
        .send()
        .await
        .expect("register request")
}

async fn get_json(client: &Client, url: &str) -> Json {
    let response = client.get(url).send().await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("json body")
}

// =============================================================================
// Contract-generated responses
// =============================================================================

#[tokio::test]
async fn test_generated_response_follows_contract() {
    let url = start_stub(NUMBERS, false).await;
    let client = Client::new();

    let response = client.get(format!("{url}/number")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-covenant-result"], "success");
    assert_eq!(response.headers()["x-covenant-type"], "random");
    assert_eq!(response.headers()["content-type"], "application/json");

    let body: Json = response.json().await.unwrap();
    let object = body.as_object().expect("object body");
    assert_eq!(object.keys().collect::<Vec<_>>(), vec!["number"]);
    assert!(object["number"].is_number());
}

#[tokio::test]
async fn test_closed_body_rejects_unexpected_key() {
    let url = start_stub(NUMBERS, false).await;
    let client = Client::new();

    let response = client
        .post(format!("{url}/number"))
        .json(&json!({"number": 10, "unexpected": "value"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["x-covenant-result"], "failure");
    let report = response.text().await.unwrap();
    assert!(report.contains(">> REQUEST.BODY.unexpected"), "{report}");
}

#[tokio::test]
async fn test_open_body_accepts_unexpected_key() {
    let url = start_stub(OPEN_NUMBERS, false).await;
    let response = Client::new()
        .post(format!("{url}/number"))
        .json(&json!({"number": 10, "unexpected": "value"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_unknown_path_is_reported() {
    let url = start_stub(NUMBERS, false).await;
    let response = Client::new().get(format!("{url}/letters")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let report = response.text().await.unwrap();
    assert!(report.contains("was not recognized"), "{report}");
}

// =============================================================================
// Expectations
// =============================================================================

#[tokio::test]
async fn test_registered_expectation_is_replayed() {
    let url = start_stub(NUMBERS, false).await;
    let client = Client::new();

    let response = register(
        &client,
        &url,
        json!({
            "http-request": {"method": "GET", "path": "/number/10"},
            "http-response": {"status": 200, "body": {"number": 100}}
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let registered: Json = response.json().await.unwrap();
    assert_json_include!(
        actual: registered,
        expected: json!({"scenario": "get number by id", "transient": false})
    );

    for _ in 0..2 {
        let body = get_json(&client, &format!("{url}/number/10")).await;
        assert_json_eq!(body, json!({"number": 100}));
    }
}

#[tokio::test]
async fn test_transient_expectations_then_fallback() {
    let url = start_stub(NUMBERS, false).await;
    let client = Client::new();

    for (id, value) in [("first", 1), ("second", 2)] {
        let response = register(
            &client,
            &url,
            json!({
                "http-request": {"method": "GET", "path": "/number"},
                "http-response": {"status": 200, "body": {"number": value}},
                "http-stub-id": id
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_json_eq!(get_json(&client, &format!("{url}/number")).await, json!({"number": 1}));
    assert_json_eq!(get_json(&client, &format!("{url}/number")).await, json!({"number": 2}));

    let fallback = client.get(format!("{url}/number")).send().await.unwrap();
    assert_eq!(fallback.status(), StatusCode::OK);
    assert_eq!(fallback.headers()["x-covenant-type"], "random");
}

#[tokio::test]
async fn test_persistent_expectation_after_transient() {
    let url = start_stub(NUMBERS, false).await;
    let client = Client::new();

    register(
        &client,
        &url,
        json!({
            "http-request": {"path": "/number"},
            "http-response": {"status": 200, "body": {"number": 50}}
        }),
    )
    .await;
    register(
        &client,
        &url,
        json!({
            "http-request": {"path": "/number"},
            "http-response": {"status": 200, "body": {"number": 10}},
            "transient": true
        }),
    )
    .await;

    assert_json_eq!(get_json(&client, &format!("{url}/number")).await, json!({"number": 10}));
    for _ in 0..3 {
        assert_json_eq!(get_json(&client, &format!("{url}/number")).await, json!({"number": 50}));
    }
}

#[tokio::test]
async fn test_remove_transient_expectation() {
    let url = start_stub(NUMBERS, true).await;
    let client = Client::new();

    register(
        &client,
        &url,
        json!({
            "http-request": {"path": "/number"},
            "http-response": {"status": 200, "body": {"number": 3}},
            "http-stub-id": "three"
        }),
    )
    .await;

    let removed = client
        .delete(format!("{url}/_covenant/http-stub/three"))
        .send()
        .await
        .unwrap();
    assert_eq!(removed.status(), StatusCode::OK);

    let again = client
        .delete(format!("{url}/_covenant/http-stub/three"))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    let response = client.get(format!("{url}/number")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_expectation_is_rejected() {
    let url = start_stub(NUMBERS, false).await;
    let client = Client::new();

    let response = register(
        &client,
        &url,
        json!({
            "http-request": {"path": "/number"},
            "http-response": {"status": 200, "body": {"number": "ten"}}
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Json = response.json().await.unwrap();
    let message = body["errors"][0]["message"].as_str().unwrap();
    assert!(message.contains("RESPONSE.BODY.number"), "{message}");

    let malformed = client
        .post(format!("{url}/_covenant/expectations"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_strict_mode() {
    let url = start_stub(NUMBERS, true).await;
    let client = Client::new();

    let response = client.get(format!("{url}/number")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.text().await.unwrap().starts_with("STRICT MODE ON"));

    register(
        &client,
        &url,
        json!({
            "http-request": {"path": "/number"},
            "http-response": {"status": 200, "body": {"number": 7}}
        }),
    )
    .await;
    assert_json_eq!(get_json(&client, &format!("{url}/number")).await, json!({"number": 7}));
}

#[tokio::test]
async fn test_delay_and_response_headers() {
    let url = start_stub(NUMBERS, false).await;
    let client = Client::new();

    register(
        &client,
        &url,
        json!({
            "http-request": {"path": "/number"},
            "http-response": {
                "status": 200,
                "headers": {"X-Request-Id": "abc"},
                "body": {"number": 1}
            },
            "delay-in-seconds": 0.2
        }),
    )
    .await;

    let started = Instant::now();
    let response = client.get(format!("{url}/number")).send().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(response.headers()["x-request-id"], "abc");
    assert_eq!(response.headers()["x-covenant-result"], "success");
}

#[tokio::test]
async fn test_health() {
    let url = start_stub(NUMBERS, false).await;
    let body = get_json(&Client::new(), &format!("{url}/_covenant/health")).await;
    assert_json_eq!(
        body,
        json!({
            "status": "UP",
            "contracts": 1,
            "transientExpectations": 0,
            "persistentExpectations": 0
        })
    );
}
