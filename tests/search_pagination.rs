//! Search pagination against a mock server: token-cursor issue search and
//! the concurrent offset protocol on the changelog endpoint.

use std::time::Duration;

use jirapi::{Auth, JiraClient, JiraConfig};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
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

async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

fn issue(key: &str) -> serde_json::Value {
    json!({ "id": key.replace("A-", "1000"), "key": key })
}

fn search_page(keys: &[&str], next: Option<&str>, is_last: bool) -> serde_json::Value {
    json!({
        "isLast": is_last,
        "nextPageToken": next,
        "issues": keys.iter().map(|key| issue(key)).collect::<Vec<_>>(),
    })
}

/// Three chained pages on the token search endpoint, consumed in order.
async fn mount_token_pages(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/rest/api/3/search/jql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_page(&["A-1", "A-2"], Some("t1"), false)),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/search/jql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_page(&["A-3", "A-4"], Some("t2"), false)),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/search/jql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&["A-5"], None, true)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_issue_search_follows_token_cursor_in_order() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    mount_token_pages(&server).await;

    let client = test_client(&server);
    let issues = jirapi::search_issues_jql(&client, "project = A")
        .await
        .unwrap();

    let keys: Vec<&str> = issues.iter().map(|issue| issue.key.as_str()).collect();
    assert_eq!(keys, vec!["A-1", "A-2", "A-3", "A-4", "A-5"]);

    // Each server page was visited exactly once, carrying the token the
    // previous page returned
    let bodies: Vec<serde_json::Value> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.method.as_str() == "POST")
        .map(|request| request.body_json().unwrap())
        .collect();
    assert_eq!(bodies.len(), 3);
    assert!(bodies[0].get("nextPageToken").is_none());
    assert_eq!(bodies[0]["maxResults"], 50);
    assert_eq!(bodies[1]["nextPageToken"], "t1");
    assert_eq!(bodies[2]["nextPageToken"], "t2");
}

#[tokio::test]
async fn test_issue_search_stops_at_first_match() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    mount_token_pages(&server).await;

    let client = test_client(&server);
    let found = jirapi::find_first_issue(&client, "project = A", |issue| issue.key == "A-2")
        .await
        .unwrap();
    assert_eq!(found.unwrap().key, "A-2");

    // The match lands on the first page; no further pages are fetched
    let searches = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.method.as_str() == "POST")
        .count();
    assert_eq!(searches, 1);
}

fn changelog_page(total: u64, start_at: u64, end: u64) -> serde_json::Value {
    json!({
        "total": total,
        "maxResults": 50,
        "startAt": start_at,
        "values": (start_at..end)
            .map(|index| json!({ "id": index.to_string(), "items": [] }))
            .collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn test_changelog_single_page_fetches_once() {
    let server = MockServer::start().await;
    mount_health(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/DEMO-1/changelog"))
        .and(query_param("startAt", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(changelog_page(30, 0, 30)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let entries = jirapi::changelog(&client, "DEMO-1").await.unwrap();
    assert_eq!(entries.len(), 30);
    server.verify().await;
}

#[tokio::test]
async fn test_changelog_fetches_remaining_pages_by_offset() {
    let server = MockServer::start().await;
    mount_health(&server).await;

    // total=120 with page size 50: one synchronous first page plus two
    // concurrent fetches at startAt 50 and 100
    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/DEMO-1/changelog"))
        .and(query_param("startAt", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(changelog_page(120, 0, 50)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/DEMO-1/changelog"))
        .and(query_param("startAt", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(changelog_page(120, 50, 100)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/DEMO-1/changelog"))
        .and(query_param("startAt", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(changelog_page(120, 100, 120)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let entries = jirapi::changelog(&client, "DEMO-1").await.unwrap();
    assert_eq!(entries.len(), 120);

    // Later pages may land in any order; every entry arrives exactly once
    let mut ids: Vec<u64> = entries
        .iter()
        .map(|entry| entry.id.as_deref().unwrap().parse().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..120).collect::<Vec<u64>>());

    server.verify().await;
}
