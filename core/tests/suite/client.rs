use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voyager_core::{ClientConfig, Credentials, VoyagerClient, VoyagerError};

fn test_client(base_url: &str) -> VoyagerClient {
    let creds = Credentials::new("tok", "\"ajax:123\"", "test");
    VoyagerClient::new(&creds, ClientConfig::unpaced(base_url)).unwrap()
}

#[tokio::test]
async fn throttled_requests_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let resp = client.get("me").await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn rate_limit_gives_up_after_five_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(429))
        .expect(6)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.get("me").await.unwrap_err();
    match err {
        VoyagerError::RateLimited { attempts } => assert_eq!(attempts, 6),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn redirect_back_to_the_requested_url_means_dead_session() {
    let server = MockServer::start().await;
    let me_url = format!("{}/me", server.uri());
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", me_url.as_str()))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.get("me").await.unwrap_err();
    assert!(matches!(err, VoyagerError::Auth(_)), "got {err:?}");
}

#[tokio::test]
async fn redirect_clearing_the_session_cookie_means_dead_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "https://www.linkedin.com/login")
                .insert_header("Set-Cookie", "li_at=delete; Max-Age=0; Path=/"),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.get("me").await.unwrap_err();
    assert!(matches!(err, VoyagerError::Auth(_)), "got {err:?}");
}

#[tokio::test]
async fn unrelated_redirect_is_a_plain_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "https://example.com/elsewhere"),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.get("me").await.unwrap_err();
    match err {
        VoyagerError::Http { status, .. } => assert_eq!(status, 302),
        other => panic!("expected Http, got {other:?}"),
    }
}

#[tokio::test]
async fn status_codes_map_to_the_error_taxonomy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/unauthorized"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(999))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "gone"})))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    assert!(matches!(
        client.get("unauthorized").await.unwrap_err(),
        VoyagerError::Auth(_)
    ));
    assert!(matches!(
        client.get("blocked").await.unwrap_err(),
        VoyagerError::UpstreamBlocked
    ));
    match client.get("missing").await.unwrap_err() {
        VoyagerError::NotFound(detail) => assert_eq!(detail, "gone"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn graphql_rejection_is_classified_as_a_stale_query_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphql"))
        .and(query_param("queryId", "voyagerSearchDashClustersByAll.old1"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .get("graphql?queryId=voyagerSearchDashClustersByAll.old1&variables=()")
        .await
        .unwrap_err();
    match err {
        VoyagerError::StaleQueryId { operation, status } => {
            assert_eq!(operation, "voyagerSearchDashClustersByAll");
            assert_eq!(status, 400);
        }
        other => panic!("expected StaleQueryId, got {other:?}"),
    }
}
