mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::test_client;
use tela::error::TelaError;
use tela::history::HistoryStore;
use tela::types::Role;

#[tokio::test]
async fn list_chats_sends_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chats"))
        .and(query_param("page", "2"))
        .and(query_param("page_size", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"chat_id": "a1", "title": "Onboarding", "message_count": 4, "metadata": null},
                {"chat_id": "b2"}
            ],
            "page": 2,
            "page_size": 25,
            "total_items": 27,
            "total_pages": 2,
            "has_next": false,
            "has_previous": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 1);
    let page = client.list_chats(2, 25).await.unwrap();

    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].title.as_deref(), Some("Onboarding"));
    assert_eq!(page.data[0].message_count, Some(4));
    assert_eq!(page.data[1].chat_id, "b2");
    assert!(page.has_previous);
    assert!(!page.has_next);
}

#[tokio::test]
async fn get_chat_escapes_the_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chats/a%20b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"chat_id": "a b"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 1);
    assert_eq!(client.get_chat("a b").await.unwrap().chat_id, "a b");
    assert!(matches!(
        client.get_chat("  ").await.unwrap_err(),
        TelaError::Validation(_)
    ));
}

#[tokio::test]
async fn create_chat_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chats"))
        .and(body_json(json!({"module_id": "mod-1", "message": "hello"})))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 3);
    let err = client.create_chat("mod-1", "hello").await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn update_and_delete_use_post_paths() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chats/c-1"))
        .and(body_json(json!({"name": "Renamed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chats/c-1/delete"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 1);
    client.update_chat("c-1", "Renamed").await.unwrap();
    client.delete_chat("c-1").await.unwrap();
}

#[tokio::test]
async fn sync_assigns_remote_ids_and_reports_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chats"))
        .and(body_json(json!({"module_id": "m", "message": "first question"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"chat_id": "remote-ok"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chats"))
        .and(body_json(json!({"module_id": "m", "message": "doomed"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": {"message": "rejected"}})))
        .mount(&server)
        .await;

    let mut store = HistoryStore::new();
    let good = store.get_or_create("good");
    good.append(Role::System, "be nice").unwrap();
    good.append(Role::User, "first question").unwrap();
    store.get_or_create("bad").append(Role::User, "doomed").unwrap();
    store.get_or_create("done").set_remote_id("already");

    let client = test_client(&server.uri(), 1);
    let report = store.sync_with_server(&client, "m").await;

    assert_eq!(report.synced_count, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "bad");
    assert!(report.failed[0].reason.contains("rejected"));
    assert_eq!(store.get("good").unwrap().remote_id(), Some("remote-ok"));
    assert_eq!(store.get("bad").unwrap().remote_id(), None);
    assert_eq!(store.get("done").unwrap().remote_id(), Some("already"));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
