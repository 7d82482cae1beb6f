mod common;

use docchat::connectors::{ConnectorError, MockReply};
use serde_json::{json, Value};

async fn stream_lines(response: reqwest::Response) -> Vec<Value> {
    let body = response.text().await.expect("Failed to read stream");
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("each line is a JSON object"))
        .collect()
}

#[tokio::test]
async fn streamed_reply_is_relayed_and_persisted() {
    let app = common::spawn_app().await;
    let chat = app.create_chat("alice").await;
    app.completion.push_reply(MockReply::Fragments(vec![
        "Hel".to_string(),
        "lo, ".to_string(),
        "wörld".to_string(),
    ]));

    let response = app
        .post(&format!("/chat/{}/messages", chat["id"]), "alice")
        .json(&json!({"content": "greet me", "stream": true}))
        .send()
        .await
        .unwrap();

    assert_eq!(200, response.status().as_u16());
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/x-ndjson"
    );

    let events = stream_lines(response).await;
    assert_eq!(events.first().unwrap()["status"], "start");
    let message_id = events[0]["messageId"].clone();
    assert!(events.iter().all(|event| event["messageId"] == message_id));

    let streamed: String = events
        .iter()
        .filter(|event| event["status"] == "streaming")
        .map(|event| event["content"].as_str().unwrap())
        .collect();
    let complete = events.last().unwrap();
    assert_eq!(complete["status"], "complete");
    assert_eq!(streamed, "Hello, wörld");
    assert_eq!(complete["content"], streamed.as_str());

    let stored: Value = app
        .get(&format!("/chat/{}", chat["id"]), "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = stored["item"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], streamed.as_str());
    assert_eq!(messages[1]["id"], message_id);
}

#[tokio::test]
async fn broken_stream_ends_with_error_event() {
    let app = common::spawn_app().await;
    let chat = app.create_chat("alice").await;
    app.completion.push_reply(MockReply::FailAfter(
        vec!["partial".to_string()],
        ConnectorError::StreamInterrupted("connection reset".to_string()),
    ));

    let response = app
        .post(&format!("/chat/{}/messages", chat["id"]), "alice")
        .json(&json!({"content": "hi", "stream": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let events = stream_lines(response).await;
    let last = events.last().unwrap();
    assert_eq!(last["status"], "error");
    assert_eq!(last["kind"], "upstream_stream_error");
    assert!(events.iter().all(|event| event["status"] != "complete"));

    // only the checkpointed user message remains
    let stored: Value = app
        .get(&format!("/chat/{}", chat["id"]), "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = stored["item"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn stream_to_missing_chat_fails_before_streaming() {
    let app = common::spawn_app().await;

    let response = app
        .post("/chat/999/messages", "alice")
        .json(&json!({"content": "hi", "stream": true}))
        .send()
        .await
        .unwrap();

    assert_eq!(404, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "not_found");
}
