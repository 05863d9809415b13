use hipdump_sync::{ChatApi, EntityKind, HipChatClient, MirrorConfig, SyncError};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::{room, ts, user};

fn setup(server: &MockServer) -> HipChatClient {
    let config = MirrorConfig {
        api_base_url: server.uri(),
        request_timeout_secs: 1,
        ..MirrorConfig::default()
    };
    HipChatClient::new(&config, "tok-123").unwrap()
}

fn history_body(first: usize, last: usize) -> serde_json::Value {
    let items: Vec<_> = (first..=last)
        .rev()
        .map(|n| serde_json::json!({ "date": ts(n), "message": format!("m{n}"), "id": format!("msg-{n}") }))
        .collect();
    serde_json::json!({ "items": items, "startIndex": 0, "maxResults": items.len() })
}

// --- Construction ---

#[test]
fn empty_key_is_rejected() {
    let result = HipChatClient::new(&MirrorConfig::default(), "  ");
    assert!(matches!(result, Err(SyncError::Config(_))));
}

#[test]
fn trailing_slash_is_trimmed() {
    let config = MirrorConfig {
        api_base_url: "https://chat.example.com/".into(),
        ..MirrorConfig::default()
    };
    let client = HipChatClient::new(&config, "tok").unwrap();
    assert_eq!(client.base_url(), "https://chat.example.com");
}

// --- Listing ---

#[tokio::test]
async fn list_rooms_sends_listing_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/room"))
        .and(header("authorization", "Bearer tok-123"))
        .and(query_param("max-results", "1000"))
        .and(query_param("include-archived", "true"))
        .and(query_param("expand", "items.participants,items.statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "id": 1, "name": "General", "privacy": "public", "is_archived": false },
                { "id": 2, "name": "Ops", "privacy": "private", "is_archived": true }
            ],
            "links": { "self": format!("{}/v2/room", server.uri()) }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = setup(&server);
    let rooms = client.list_entities(EntityKind::Rooms).await.unwrap();

    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].name, "General");
    assert_eq!(rooms[1].extra["is_archived"], true);
}

#[tokio::test]
async fn list_users_follows_next_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/user"))
        .and(query_param("include-guests", "true"))
        .and(query_param("expand", "items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "id": 1, "name": "Ann", "mention_name": "Ann", "email": "ann@example.com" }
            ],
            "links": { "next": format!("{}/v2/user?start-index=1&expand=items", server.uri()) }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/user"))
        .and(query_param("start-index", "1"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "id": 2, "name": "Bob", "mention_name": "Bob", "email": "bob@example.com" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = setup(&server);
    let users = client.list_entities(EntityKind::Users).await.unwrap();

    let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["Ann", "Bob"]);
}

#[tokio::test]
async fn listing_error_status_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/room"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = setup(&server);
    let err = client.list_entities(EntityKind::Rooms).await.unwrap_err();

    assert!(matches!(&err, SyncError::Api(msg) if msg.contains("401")));
    assert!(err.is_transient());
}

// --- History ---

#[tokio::test]
async fn first_history_page_has_no_date() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/room/7/history"))
        .and(header("authorization", "Bearer tok-123"))
        .and(query_param("max-results", "10"))
        .and(query_param("reverse", "false"))
        .and(query_param_is_missing("date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body(1, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let client = setup(&server);
    let items = client.fetch_history_page(EntityKind::Rooms, &room(7, "Ops"), 10, None).await.unwrap();

    assert_eq!(support::dates(&items), vec![ts(3), ts(2), ts(1)]);
    assert_eq!(items[0].fields["message"], "m3");
}

#[tokio::test]
async fn later_history_pages_carry_the_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/user/5/history"))
        .and(query_param("max-results", "100"))
        .and(query_param("date", ts(40).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body(1, 40)))
        .expect(1)
        .mount(&server)
        .await;

    let client = setup(&server);
    let ann = user(5, "Ann", "ann@example.com", None);
    let items = client
        .fetch_history_page(EntityKind::Users, &ann, 100, Some(&ts(40)))
        .await
        .unwrap();

    assert_eq!(items.len(), 40);
    assert_eq!(items.last().unwrap().date, ts(1));
}

#[tokio::test]
async fn user_history_follows_the_listed_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/user/5/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body(1, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let client = setup(&server);
    let ann: hipdump_sync::Entity = serde_json::from_value(serde_json::json!({
        "id": 5, "name": "Ann Bee", "mention_name": null, "email": "ann@example.com"
    }))
    .unwrap();
    let items = client
        .fetch_history_page(EntityKind::Users, &ann, 10, None)
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn slow_history_page_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/room/7/history"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(history_body(1, 1))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = setup(&server);
    let err = client
        .fetch_history_page(EntityKind::Rooms, &room(7, "Ops"), 10, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Http(_)));
}

// --- Files ---

#[tokio::test]
async fn resolve_file_without_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/file/abc-1"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "abc-1",
            "name": "uploads/42/abc/quarterly report.pdf",
            "size": 2048,
            "temp_download_url": "https://s3.example.com/signed?sig=xyz"
        })))
        .mount(&server)
        .await;

    let client = setup(&server);
    let info = client.resolve_file("abc-1").await.unwrap();

    assert_eq!(info.base_name(), "quarterly report.pdf");
    assert_eq!(info.download_url(), Some("https://s3.example.com/signed?sig=xyz"));
    assert!(info.links.is_none());
}

#[tokio::test]
async fn missing_file_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/file/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = setup(&server);
    let err = client.resolve_file("gone").await.unwrap_err();
    assert!(matches!(err, SyncError::Api(msg) if msg.contains("404")));
}

#[tokio::test]
async fn download_returns_raw_bytes_without_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/signed/photo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .mount(&server)
        .await;

    let client = setup(&server);
    let bytes = client
        .download(&format!("{}/signed/photo.png", server.uri()))
        .await
        .unwrap();

    assert_eq!(bytes, vec![0x89, b'P', b'N', b'G']);
    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}
