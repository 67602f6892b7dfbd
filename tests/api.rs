use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;

use castmod::aggregate::DetailAggregator;
use castmod::api::{self, TokenProvider};
use castmod::data::ApiPostService;
use castmod::view;

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    path: String,
    authorization: Option<String>,
}

struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    /// Serves scripted responses and records every request it sees. The
    /// handler maps (method, path-with-query) to (status, json body).
    fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&str, &str) -> (u16, String) + Send + Sync + 'static,
    {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind stub server");
        let addr = server.server_addr().to_ip().expect("stub server addr");
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        thread::spawn(move || {
            for request in server.incoming_requests() {
                let authorization = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("Authorization"))
                    .map(|header| header.value.as_str().to_string());
                let method = request.method().to_string();
                let path = request.url().to_string();
                let (status, body) = handler(&method, &path);
                seen.lock().push(RecordedRequest {
                    method,
                    path,
                    authorization,
                });
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(
                        "Content-Type: application/json"
                            .parse::<tiny_http::Header>()
                            .expect("content type header"),
                    );
                let _ = request.respond(response);
            }
        });

        StubServer {
            base_url: format!("http://{}/", addr),
            requests,
        }
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|req| req.method == method && req.path == path)
            .count()
    }
}

struct StaticToken(Option<String>);

impl TokenProvider for StaticToken {
    fn token(&self) -> Result<Option<String>> {
        Ok(self.0.clone())
    }
}

fn client(server: &StubServer, token: Option<&str>) -> api::Client {
    api::Client::new(
        Arc::new(StaticToken(token.map(str::to_string))),
        api::ClientConfig {
            user_agent: "castmod-tests/0.1".into(),
            base_url: Some(server.base_url.clone()),
            timeout: None,
            http_client: None,
        },
    )
    .expect("build client")
}

#[test]
fn missing_token_fails_before_any_request_is_sent() {
    let server = StubServer::spawn(|_, _| (200, r#"{"result": []}"#.into()));
    let client = client(&server, None);

    let err = client.list_users().unwrap_err();
    assert!(err.to_string().contains("missing auth token"));
    assert!(server.requests().is_empty());
}

#[test]
fn bearer_token_is_attached_to_authenticated_calls() {
    let server = StubServer::spawn(|_, path| match path {
        "/users" => (
            200,
            r#"{"result": [{"id": 1, "username": "ana", "roles": [{"name": "active"}]}]}"#.into(),
        ),
        _ => (404, "{}".into()),
    });
    let client = client(&server, Some("tok-1"));

    let users = client.list_users().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "ana");
    assert!(users[0].is_active());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer tok-1"));
}

#[test]
fn image_endpoints_are_usable_without_a_token() {
    let server = StubServer::spawn(|_, path| match path {
        "/images" => (
            200,
            r#"{"data": [{"id": "1", "title": "First", "url": null, "creatorId": "u9"}]}"#.into(),
        ),
        _ => (404, "{}".into()),
    });
    let client = client(&server, None);

    let images = client.list_images().unwrap();
    assert_eq!(images.len(), 1);
    assert!(images[0].url.is_none());
    assert_eq!(images[0].creator_id, "u9");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].authorization.is_none());
}

#[test]
fn comments_404_is_treated_as_empty() {
    let server = StubServer::spawn(|_, _| (404, "{}".into()));
    let client = client(&server, None);

    let comments = client.comments("p1").unwrap();
    assert!(comments.is_empty());
}

#[test]
fn a_single_comment_object_normalizes_to_one_element() {
    let server = StubServer::spawn(|_, _| {
        (200, r#"{"data": {"id": "c1", "text": "hello"}}"#.into())
    });
    let client = client(&server, None);

    let comments = client.comments("p1").unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "hello");
}

#[test]
fn delete_comment_accepts_only_a_bare_200() {
    let server = StubServer::spawn(|_, path| match path {
        "/comments/gone" => (200, "{}".into()),
        "/comments/kept" => (204, String::new()),
        _ => (404, "{}".into()),
    });
    let client = client(&server, None);

    assert!(client.delete_comment("gone").is_ok());
    assert!(client.delete_comment("kept").is_err());
}

#[test]
fn delete_user_requires_a_bare_200() {
    let server = StubServer::spawn(|method, path| match (method, path) {
        ("DELETE", "/users/7") => (200, "{}".into()),
        ("DELETE", "/users/8") => (202, "{}".into()),
        _ => (404, "{}".into()),
    });
    let client = client(&server, Some("tok-1"));

    assert!(client.delete_user(7).is_ok());
    assert!(client.delete_user(8).is_err());
}

#[test]
fn livestream_rooms_parse_from_a_bare_array() {
    let body = r#"[{
        "id": 1,
        "roomName": "Morning Show",
        "status": "active",
        "maxParticipants": 10,
        "thumbnail": "",
        "createdAt": "2026-08-01T10:00:00Z",
        "updatedAt": "2026-08-01T10:30:00Z",
        "streamerId": 3,
        "categoryId": 2
    }]"#;
    let server = StubServer::spawn(move |_, _| (200, body.into()));
    let client = client(&server, None);

    let rooms = client.list_rooms().unwrap();
    assert_eq!(rooms.len(), 1);
    let stream = api::Livestream::from(rooms[0].clone());
    assert_eq!(stream.title, "Morning Show");
    assert!(stream.is_active);
    assert_eq!(stream.streamer_id, 3);
}

#[test]
fn aggregator_fetches_each_distinct_id_once_over_http() {
    let server = StubServer::spawn(|_, path| match path {
        "/images/1" => (
            200,
            r#"{"data": {"id": "1", "title": "One", "url": "u1", "creator": {"name": "Ana"}}}"#
                .into(),
        ),
        "/images/2" => (500, r#"{"error": "boom"}"#.into()),
        "/comments?postId=1" => (
            200,
            r#"{"data": [{"id": "c1", "text": "hi"}, {"id": "c2", "text": "yo"}]}"#.into(),
        ),
        "/comments?postId=2" => (404, "{}".into()),
        _ => (404, "{}".into()),
    });

    let summary = |id: &str| api::ImageSummary {
        id: id.to_string(),
        title: format!("Post {id}"),
        url: None,
        creator_id: format!("u{id}"),
    };
    // The listing repeats id "1"; only the distinct set reaches the fetcher.
    let summaries = vec![summary("1"), summary("2"), summary("1")];
    let ids = view::distinct_ids(&summaries);
    assert_eq!(ids.len(), 2);

    let service = Arc::new(ApiPostService::new(Arc::new(client(&server, None))));
    let mut aggregator = DetailAggregator::new(service, 2);
    aggregator.reconcile(&ids);
    assert!(aggregator.wait_idle(Duration::from_secs(10)));

    assert_eq!(server.count("GET", "/images/1"), 1);
    assert_eq!(server.count("GET", "/images/2"), 1);
    assert_eq!(server.count("GET", "/comments?postId=1"), 1);
    assert_eq!(server.count("GET", "/comments?postId=2"), 1);

    // The failing detail is omitted; its 404 comment lookup still counts as zero.
    assert!(aggregator.detail("1").is_some());
    assert!(aggregator.detail("2").is_none());
    assert_eq!(aggregator.comment_count("1"), Some(2));
    assert_eq!(aggregator.comment_count("2"), Some(0));

    // Re-supplying the same ids issues no further requests.
    let before = server.requests().len();
    assert_eq!(aggregator.reconcile(&ids), 0);
    assert!(!aggregator.loading());
    assert_eq!(server.requests().len(), before);

    let rows = view::post_rows(
        &summaries,
        aggregator.details(),
        aggregator.comment_counts(),
        aggregator.loading(),
    );
    assert_eq!(rows[0].creator, view::CreatorLabel::Name("Ana".into()));
    assert_eq!(rows[1].creator, view::CreatorLabel::Unresolved("u2".into()));
}
