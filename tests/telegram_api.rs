//! Bot API contract tests for the Telegram client, against a mock server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use panegram::messenger::Messenger;
use panegram::TelegramBot;

const TOKEN: &str = "12345:TESTTOKEN";
const CHAT: i64 = -1009876;

async fn bot(server: &MockServer) -> TelegramBot {
    TelegramBot::new(TOKEN.to_string(), CHAT)
        .unwrap()
        .with_base_url(server.uri())
}

#[tokio::test]
async fn send_returns_the_message_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({
            "chat_id": CHAT,
            "message_thread_id": 55,
            "text": "hello topic",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"message_id": 321, "date": 0}
        })))
        .mount(&server)
        .await;

    let id = bot(&server).await.send(55, "hello topic").await.unwrap();
    assert_eq!(id, 321);
}

#[tokio::test]
async fn send_html_sets_parse_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({"parse_mode": "HTML"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"message_id": 9}
        })))
        .mount(&server)
        .await;

    let id = bot(&server)
        .await
        .send_html(55, "<b>bold</b>")
        .await
        .unwrap();
    assert_eq!(id, 9);
}

#[tokio::test]
async fn create_topic_returns_the_thread_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/createForumTopic")))
        .and(body_partial_json(json!({"chat_id": CHAT, "name": "api work"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"message_thread_id": 777, "name": "api work"}
        })))
        .mount(&server)
        .await;

    let id = bot(&server).await.create_topic("api work").await.unwrap();
    assert_eq!(id, 777);
}

#[tokio::test]
async fn close_topic_accepts_boolean_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/closeForumTopic")))
        .and(body_partial_json(json!({"message_thread_id": 777})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})),
        )
        .mount(&server)
        .await;

    bot(&server).await.close_topic(777).await.unwrap();
}

#[tokio::test]
async fn api_rejection_surfaces_the_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: message thread not found"
        })))
        .mount(&server)
        .await;

    let err = bot(&server).await.send(1, "x").await.unwrap_err();
    assert!(err.to_string().contains("message thread not found"));
}

#[tokio::test]
async fn http_errors_are_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    assert!(bot(&server).await.send(1, "x").await.is_err());
}

#[tokio::test]
async fn poll_updates_flattens_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/getUpdates")))
        .and(body_partial_json(json!({"offset": 7})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                {
                    "update_id": 7,
                    "message": {
                        "message_id": 41,
                        "message_thread_id": 55,
                        "from": {"id": 42, "is_bot": false},
                        "text": "reply text",
                        "reply_to_message": {"message_id": 40}
                    }
                },
                {"update_id": 8, "edited_message": {"message_id": 50}}
            ]
        })))
        .mount(&server)
        .await;

    let updates = bot(&server).await.poll_updates(7, 0).await.unwrap();
    assert_eq!(updates.len(), 2);

    assert_eq!(updates[0].update_id, 7);
    assert_eq!(updates[0].message_id, 41);
    assert_eq!(updates[0].thread_id, Some(55));
    assert_eq!(updates[0].sender_id, 42);
    assert_eq!(updates[0].text, "reply text");
    assert_eq!(updates[0].reply_to_message_id, Some(40));

    // The non-message update still advances the offset cursor.
    assert_eq!(updates[1].update_id, 8);
    assert!(updates[1].text.is_empty());
}
