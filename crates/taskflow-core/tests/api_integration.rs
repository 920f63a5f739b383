//! Integration tests for the HTTP client against a mock backend.
//!
//! These tests verify request shapes (paths, query strings, bodies and the
//! bearer header) and how the task cache and chat session behave on top of
//! real HTTP responses.

use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

use taskflow_core::chat::{ChatBackend, ChatSession, SendOutcome};
use taskflow_core::dashboard;
use taskflow_core::reminder::NotificationFeed;
use taskflow_core::task::{SortOption, TaskBackend, TaskCache, TaskCreate, TaskQuery, TaskUpdate};
use taskflow_core::{ApiClient, ApiError};

fn task_json(id: u64, description: &str, completed: bool) -> serde_json::Value {
    json!({
        "id": id,
        "description": description,
        "completed": completed,
        "category": "Work",
        "priority": "High",
        "tags": ["q3"],
        "created_at": "2026-01-01T00:00:00",
        "updated_at": "2026-01-01T00:00:00",
        "due_date": null,
        "is_recurring": false,
        "recurrence_pattern": null,
        "next_occurrence": null,
        "notification_sent": false
    })
}

fn client(server: &Server) -> ApiClient {
    ApiClient::new(&server.url(), Some("tok".into()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_list_sends_filters_and_bearer() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/tasks/")
        .match_header("authorization", "Bearer tok")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("category".into(), "Work".into()),
            Matcher::UrlEncoded("tags".into(), "q3,urgent".into()),
            Matcher::UrlEncoded("sort_by".into(), "priority".into()),
            Matcher::UrlEncoded("order".into(), "asc".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(json!([task_json(1, "Ship report", false)]).to_string())
        .create_async()
        .await;

    let query = TaskQuery::sorted(SortOption::Priority)
        .category("Work")
        .search("")
        .tags(vec!["q3".into(), "urgent".into()]);
    let tasks = client(&server).list_tasks(&query).await.unwrap();

    mock.assert_async().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "1");
    assert_eq!(tasks[0].tags, Some(vec!["q3".to_string()]));
}

#[tokio::test]
async fn test_error_status_carries_body() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/api/tasks/9")
        .with_status(404)
        .with_body("Task not found")
        .create_async()
        .await;

    let err = client(&server).delete_task("9").await.unwrap_err();
    match err {
        ApiError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Task not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_toggle_patches_complete_endpoint() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PATCH", "/api/tasks/4/complete")
        .match_body(Matcher::Json(json!({"completed": true})))
        .with_header("content-type", "application/json")
        .with_body(task_json(4, "Water plants", true).to_string())
        .create_async()
        .await;

    let task = client(&server).toggle_task("4", true).await.unwrap();

    mock.assert_async().await;
    assert!(task.completed);
}

#[tokio::test]
async fn test_update_clears_due_date_with_null() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/api/tasks/4")
        .match_body(Matcher::Json(json!({"due_date": null, "priority": "Low"})))
        .with_header("content-type", "application/json")
        .with_body(task_json(4, "Water plants", false).to_string())
        .create_async()
        .await;

    let update = TaskUpdate {
        due_date: Some(None),
        priority: Some("Low".into()),
        ..TaskUpdate::default()
    };
    client(&server).update_task("4", &update).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_feed_normalises_ids() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/events/notifications")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "10".into()),
            Matcher::UrlEncoded("user_id".into(), "u-1".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "notifications": [
                    {"id": 2, "type": "reminder", "title": "Task Reminder", "body": "Ship report", "task_id": 1}
                ],
                "count": 1
            })
            .to_string(),
        )
        .create_async()
        .await;

    let feed = client(&server).pending_notifications("u-1", 10).await.unwrap();

    mock.assert_async().await;
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, "2");
    assert_eq!(feed[0].task_id, "1");
}

#[tokio::test]
async fn test_failed_create_rolls_back_and_refetches() {
    let mut server = Server::new_async().await;
    let list = server
        .mock("GET", "/api/tasks/")
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body(json!([task_json(1, "Ship report", false)]).to_string())
        .expect(2)
        .create_async()
        .await;
    server
        .mock("POST", "/api/tasks/")
        .with_status(500)
        .with_body("db down")
        .create_async()
        .await;

    let mut cache = TaskCache::new(client(&server));
    let query = TaskQuery::default();
    let before = cache.list(&query).await.unwrap();

    let err = cache.create(TaskCreate::new("Buy milk")).await;

    assert!(matches!(err, Err(ApiError::Status { status: 500, .. })));
    assert_eq!(cache.cached(&query).unwrap(), before.as_slice());
    list.assert_async().await;
}

#[tokio::test]
async fn test_mark_all_complete_only_touches_open_tasks() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tasks/")
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body(json!([task_json(1, "a", false), task_json(2, "b", true), task_json(3, "c", false)]).to_string())
        .create_async()
        .await;
    let first = server
        .mock("PATCH", "/api/tasks/1/complete")
        .with_header("content-type", "application/json")
        .with_body(task_json(1, "a", true).to_string())
        .create_async()
        .await;
    let third = server
        .mock("PATCH", "/api/tasks/3/complete")
        .with_status(503)
        .create_async()
        .await;
    let second = server
        .mock("PATCH", "/api/tasks/2/complete")
        .expect(0)
        .create_async()
        .await;

    let mut cache = TaskCache::new(client(&server));
    let tasks = cache.list(&TaskQuery::default()).await.unwrap();
    let result = dashboard::mark_all_complete(&mut cache, &tasks).await;

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].0, "3");
    first.assert_async().await;
    third.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_chat_turn_round_trip() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/api/conversations/")
        .match_body(Matcher::Json(json!({"title": "Buy milk"})))
        .with_header("content-type", "application/json")
        .with_body(json!({"id": 5, "title": "Buy milk", "created_at": "2026-01-01T00:00:00", "updated_at": "2026-01-01T00:00:00"}).to_string())
        .create_async()
        .await;
    let saves = server
        .mock("POST", "/api/chat/save-message")
        .match_body(Matcher::PartialJson(json!({"conversation_id": 5})))
        .with_body("{}")
        .expect(2)
        .create_async()
        .await;
    let chat = server
        .mock("POST", "/api/chat/")
        .match_body(Matcher::PartialJson(json!({"model": "google/gemini-2.0-flash-exp:free"})))
        .with_header("content-type", "application/json")
        .with_body(json!({"response": "Added 'buy milk'", "source": "gemini"}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/api/tasks/")
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    let api = client(&server);
    let mut cache = TaskCache::new(api.clone());
    let mut session = ChatSession::new(api);

    let outcome = session
        .send("add buy milk", std::future::pending::<()>(), &mut cache)
        .await;

    assert!(matches!(outcome, SendOutcome::Replied(ref r) if r.response == "Added 'buy milk'"));
    create.assert_async().await;
    saves.assert_async().await;
    chat.assert_async().await;
}

#[tokio::test]
async fn test_conversation_history_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/chat/history")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("conversation_id".into(), "5".into()),
            Matcher::UrlEncoded("limit".into(), "50".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"id": 1, "role": "user", "content": "hi", "created_at": "2026-01-01T00:00:00"},
                {"id": 2, "role": "assistant", "content": "hello", "created_at": "2026-01-01T00:00:01"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let history = client(&server).chat_history(5, 50).await.unwrap();

    mock.assert_async().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "hello");
}
