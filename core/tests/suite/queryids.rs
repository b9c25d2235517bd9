use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voyager_core::queryids::{
    DiscoveryOptions, QueryIdSnapshot, QueryIdStore, with_query_id_retry,
};
use voyager_core::{ClientConfig, Credentials, VoyagerClient, VoyagerError};

const OP: &str = "voyagerSearchDashClustersByAll";

fn test_client(base_url: &str) -> VoyagerClient {
    let creds = Credentials::new("tok", "ajax:123", "test");
    VoyagerClient::new(&creds, ClientConfig::unpaced(base_url)).unwrap()
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Store pre-seeded with a fresh snapshot carrying one ID for [`OP`].
fn seeded_store(dir: &TempDir, id: &str) -> QueryIdStore {
    let store = QueryIdStore::new(dir.path().join("queryids.json"));
    let snapshot = QueryIdSnapshot {
        fetched_at: now_ms(),
        ids: BTreeMap::from([(OP.to_string(), id.to_string())]),
        ..QueryIdSnapshot::default()
    };
    store.persist(&snapshot).unwrap();
    store
}

async fn call_graphql(client: &VoyagerClient, id: String) -> voyager_core::Result<String> {
    client
        .get(&format!("graphql?queryId={id}&variables=()"))
        .await?;
    Ok(id)
}

#[tokio::test]
async fn rejected_id_is_rediscovered_and_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphql"))
        .and(query_param("queryId", format!("{OP}.old111")))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/graphql"))
        .and(query_param("queryId", format!("{OP}.new222")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&server)
        .await;
    // Entry page inlines the current ID, so discovery resolves without
    // touching any bundles.
    Mock::given(method("GET"))
        .and(path("/feed/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(r#"<html>queryId={OP}.new222&variables=()</html>"#)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, &format!("{OP}.old111"));
    let client = test_client(&server.uri());

    let used = with_query_id_retry(
        &store,
        &client,
        OP,
        &DiscoveryOptions::default(),
        None,
        |id| call_graphql(&client, id),
    )
    .await
    .unwrap();

    assert_eq!(used, format!("{OP}.new222"));
    // The rediscovered ID is persisted for the next invocation.
    assert_eq!(store.get_id(OP).as_deref(), Some(&format!("{OP}.new222")[..]));
}

#[tokio::test]
async fn second_rejection_propagates_with_the_operation_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(400))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(r#"<html>queryId={OP}.new222&variables=()</html>"#)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, &format!("{OP}.old111"));
    let client = test_client(&server.uri());

    let err = with_query_id_retry(
        &store,
        &client,
        OP,
        &DiscoveryOptions::default(),
        None,
        |id| call_graphql(&client, id),
    )
    .await
    .unwrap_err();

    match err {
        VoyagerError::StaleQueryId { operation, status } => {
            assert_eq!(operation, OP);
            assert_eq!(status, 400);
        }
        other => panic!("expected StaleQueryId, got {other:?}"),
    }
}

#[tokio::test]
async fn capture_file_backfills_when_live_discovery_finds_nothing() {
    let server = MockServer::start().await;
    // Entry pages respond but carry neither inline IDs nor bundle URLs.
    for page in ["/feed/", "/mynetwork/invite-connect/connections/", "/messaging/"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/graphql"))
        .and(query_param("queryId", format!("{OP}.cap333")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let har_path = dir.path().join("session.har");
    let har = json!({"log": {"entries": [{
        "startedDateTime": "2025-06-01T10:00:00.000Z",
        "request": {
            "url": format!("https://www.linkedin.com/voyager/api/graphql?queryId={OP}.cap333&variables=()"),
            "queryString": [{"name": "queryId", "value": format!("{OP}.cap333")}],
            "headers": []
        }
    }]}});
    std::fs::write(&har_path, serde_json::to_string(&har).unwrap()).unwrap();

    let store = QueryIdStore::new(dir.path().join("queryids.json"));
    let client = test_client(&server.uri());

    let used = with_query_id_retry(
        &store,
        &client,
        OP,
        &DiscoveryOptions::default(),
        Some(&har_path),
        |id| call_graphql(&client, id),
    )
    .await
    .unwrap();

    assert_eq!(used, format!("{OP}.cap333"));
    assert_eq!(store.get_id(OP).as_deref(), Some(&format!("{OP}.cap333")[..]));
}
