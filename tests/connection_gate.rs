//! Connection gate behavior: probe retries, credential failures, and
//! process-wide caching of the verified state.

use std::time::Duration;

use jirapi::{Auth, JiraClient, JiraConfig, JiraError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> JiraClient {
    let config = JiraConfig::new(
        server.uri(),
        Auth::Basic {
            username: "me@example.com".to_string(),
            token: "token".to_string(),
        },
    )
    .probe_delay(Duration::from_millis(5))
    .retries(0, Duration::from_millis(5));
    JiraClient::new(config).unwrap()
}

#[tokio::test]
async fn test_nine_failures_then_success_connects_on_tenth_probe() {
    let server = MockServer::start().await;

    // First nine probes fail, the tenth succeeds
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(9)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert!(client.can_connect().await.unwrap());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 10);
}

#[tokio::test]
async fn test_unauthorized_probe_fails_immediately() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let error = client.can_connect().await.unwrap_err();
    assert!(matches!(error, JiraError::Unauthorized(_)));

    // No retries on a credential failure
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_exhausted_probes_surface_last_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let error = client.can_connect().await.unwrap_err();
    match error {
        JiraError::Connectivity { status, body } => {
            assert_eq!(status, Some(502));
            assert_eq!(body, "bad gateway");
        }
        other => panic!("expected Connectivity, got {other:?}"),
    }

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 10);
}

#[tokio::test]
async fn test_verified_state_is_cached_across_requests() {
    let server = MockServer::start().await;

    // The probe must run exactly once for any number of requests
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/project/DEMO"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "10000",
                "key": "DEMO",
                "name": "Demo",
            })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server);
    use jirapi::{Get, Project};
    Project::get(&client, "DEMO".to_string()).await.unwrap();
    Project::get(&client, "DEMO".to_string()).await.unwrap();

    server.verify().await;
}

#[tokio::test]
async fn test_server_health_endpoint_on_non_cloud() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/api/2/serverInfo"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = JiraConfig::new(
        server.uri(),
        Auth::Bearer {
            token: "pat".to_string(),
        },
    )
    .api_version("2")
    .cloud(false)
    .probe_delay(Duration::from_millis(5));
    let client = JiraClient::new(config).unwrap();

    assert!(client.can_connect().await.unwrap());
    server.verify().await;
}
