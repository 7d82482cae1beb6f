mod common;

use serde_json::Value;

#[tokio::test]
async fn health_check_works_without_token() {
    let app = common::spawn_app().await;

    let response = app
        .client
        .get(app.url("/health_check"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    for component in ["database", "blob_cache", "completion"] {
        assert_eq!(body["components"][component]["status"], "healthy", "{}", component);
    }
}
