mod common;

use docchat::configuration::ChatSettings;
use docchat::connectors::{
    BlobCache, ConnectorError, MemoryBlobCache, MockCompletionConnector, MockReply, PromptMessage,
};
use docchat::db::{ChatStore, MemoryChatStore};
use docchat::services::{ChatError, DocumentExtractor, IngestRequest, IngestionService};
use docchat::startup::Backends;
use serde_json::{json, Value};
use std::sync::Arc;

const PDF: &[u8] = b"%PDF-1.4 Quarterly revenue grew 12 percent.";

fn upload(app: &common::TestApp, path: &str, user: &str, body: &[u8]) -> reqwest::RequestBuilder {
    app.post(path, user)
        .header("Content-Type", "application/pdf")
        .body(body.to_vec())
}

/// Accepts writes and forgets them at once, like a TTL that already ran out.
struct ForgetfulCache;

#[async_trait::async_trait]
impl BlobCache for ForgetfulCache {
    async fn put(&self, _key: &str, _bytes: Vec<u8>, _ttl_secs: u64) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, ConnectorError> {
        Ok(None)
    }

    async fn ping(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

#[tokio::test]
async fn upload_creates_document_chat() {
    let app = common::spawn_app().await;

    let response = upload(&app, "/chat/upload", "alice", PDF)
        .query(&[("filename", "report.pdf")])
        .send()
        .await
        .unwrap();

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    let item = &body["item"];

    assert_eq!(item["chat"]["title"], "Document: report.pdf");
    assert_eq!(item["chat"]["documentId"], item["document"]["id"]);
    assert_eq!(item["document"]["filename"], "report.pdf");
    assert_eq!(
        item["document"]["analysis"]["summary"],
        "Mock analysis of the uploaded document."
    );
    assert_eq!(item["suggestedQuestions"].as_array().unwrap().len(), 5);
    assert_eq!(item["warnings"], json!([]));

    let messages = item["chat"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"]
        .as_str()
        .unwrap()
        .starts_with("Initial document analysis. "));

    // stored text is exactly what the extractor yields for these bytes
    let expected = common::PlainTextExtractor.extract(PDF.to_vec()).await.unwrap();
    let document = app
        .backends
        .store
        .fetch_document("alice", item["document"]["id"].as_i64().unwrap())
        .await
        .unwrap()
        .expect("document stored");
    assert_eq!(document.text_content, expected);
    assert_eq!(document.file_type, "application/pdf");
    assert!(document.file_key.starts_with("pdf:alice:"));
    assert_eq!(app.blob_cache.len(), 1);
}

#[tokio::test]
async fn upload_to_existing_chat_with_message() {
    let app = common::spawn_app().await;
    let chat = app.create_chat("alice").await;

    let response = upload(&app, &format!("/chat/{}/upload", chat["id"]), "alice", PDF)
        .query(&[("filename", "report.pdf"), ("message", "What grew?")])
        .send()
        .await
        .unwrap();

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    let linked = &body["item"]["chat"];
    assert_eq!(linked["id"], chat["id"]);
    assert_eq!(linked["title"], "Test chat");
    assert_eq!(linked["documentId"], body["item"]["document"]["id"]);
    assert!(linked["documentContext"]
        .as_str()
        .unwrap()
        .contains("Quarterly revenue"));

    let messages = linked["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "What grew?");
    assert_eq!(messages[1]["role"], "assistant");

    // the accompanying turn saw the document context first
    let request = app.completion.requests().last().cloned().unwrap();
    match &request.messages[0] {
        PromptMessage::System { content } => assert!(content.starts_with("Document context: ")),
        other => panic!("expected a system message first, got {:?}", other),
    }
}

#[tokio::test]
async fn upload_to_other_users_chat_is_not_found() {
    let app = common::spawn_app().await;
    let chat = app.create_chat("alice").await;

    let response = upload(&app, &format!("/chat/{}/upload", chat["id"]), "bob", PDF)
        .query(&[("filename", "report.pdf")])
        .send()
        .await
        .unwrap();

    assert_eq!(404, response.status().as_u16());
    assert!(app.blob_cache.is_empty());
    assert!(app.completion.requests().is_empty());
}

#[tokio::test]
async fn non_pdf_content_type_is_rejected() {
    let app = common::spawn_app().await;

    let response = app
        .post("/chat/upload", "alice")
        .query(&[("filename", "notes.txt")])
        .header("Content-Type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "unsupported_file_type");
    assert!(app.blob_cache.is_empty());
}

#[tokio::test]
async fn missing_filename_is_a_validation_error() {
    let app = common::spawn_app().await;

    let response = upload(&app, "/chat/upload", "alice", PDF).send().await.unwrap();

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation_error");
}

#[tokio::test]
async fn empty_body_is_rejected() {
    let app = common::spawn_app().await;

    let response = upload(&app, "/chat/upload", "alice", b"")
        .query(&[("filename", "report.pdf")])
        .send()
        .await
        .unwrap();

    assert_eq!(400, response.status().as_u16());
    assert!(app.blob_cache.is_empty());
}

#[tokio::test]
async fn unreadable_pdf_is_an_extraction_error() {
    let app = common::spawn_app().await;

    let response = upload(&app, "/chat/upload", "alice", b"PK\x03\x04 zip archive")
        .query(&[("filename", "report.pdf")])
        .send()
        .await
        .unwrap();

    assert_eq!(422, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "extraction_error");
}

#[tokio::test]
async fn unparseable_analysis_stores_nothing() {
    let app = common::spawn_app().await;
    app.completion
        .push_reply(MockReply::Text("Sure! Here is my analysis.".to_string()));

    let response = upload(&app, "/chat/upload", "alice", PDF)
        .query(&[("filename", "report.pdf")])
        .send()
        .await
        .unwrap();

    assert_eq!(502, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "upstream_format_error");

    let body: Value = app.get("/chat", "alice").send().await.unwrap().json().await.unwrap();
    assert_eq!(body["list"], json!([]));
}

#[tokio::test]
async fn failed_questions_become_a_warning() {
    let app = common::spawn_app().await;
    app.completion.push_reply(MockReply::Text(
        json!({"summary": "A contract.", "documentType": "Contract"}).to_string(),
    ));
    app.completion.push_reply(MockReply::Fail(ConnectorError::ServiceUnavailable(
        "down".to_string(),
    )));

    let response = upload(&app, "/chat/upload", "alice", PDF)
        .query(&[("filename", "lease.pdf")])
        .send()
        .await
        .unwrap();

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["item"]["chat"]["title"], "Contract: lease.pdf");
    assert_eq!(body["item"]["suggestedQuestions"], json!([]));
    assert_eq!(body["item"]["warnings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn expired_blob_is_gone() {
    let completion = Arc::new(MockCompletionConnector::new());
    let mut backends = Backends::in_memory(completion.clone(), Arc::new(common::PlainTextExtractor));
    backends.blob_cache = Arc::new(ForgetfulCache);
    let app = common::spawn_app_with(backends, completion, Arc::new(MemoryBlobCache::new())).await;

    let response = upload(&app, "/chat/upload", "alice", PDF)
        .query(&[("filename", "report.pdf")])
        .send()
        .await
        .unwrap();

    assert_eq!(410, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "blob_expired");
}

#[tokio::test]
async fn oversized_upload_is_rejected_before_caching() {
    let cache = Arc::new(MemoryBlobCache::new());
    let store = Arc::new(MemoryChatStore::new());
    let completion = Arc::new(MockCompletionConnector::new());
    let service = IngestionService::new(
        store.clone(),
        cache.clone(),
        Arc::new(common::PlainTextExtractor),
        completion.clone(),
        ChatSettings::default(),
    );

    let mut bytes = PDF.to_vec();
    bytes.resize(11 * 1024 * 1024, b' ');
    let err = service
        .ingest(
            "alice",
            IngestRequest {
                filename: "big.pdf".to_string(),
                bytes,
                target: None,
                message: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::FileTooLarge(_)));
    assert!(cache.is_empty());
    assert!(completion.requests().is_empty());
    assert_eq!(store.document_count(), 0);
}
