#![allow(dead_code)]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use docchat::configuration::{AuthSettings, DatabaseSettings, Settings};
use docchat::connectors::{MemoryBlobCache, MockCompletionConnector};
use docchat::services::{ChatError, DocumentExtractor};
use docchat::startup::Backends;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::net::TcpListener;
use std::sync::Arc;

pub const JWT_SECRET: &str = "test-secret";

/// Treats everything after the `%PDF` magic as the document text.
pub struct PlainTextExtractor;

#[async_trait::async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: Vec<u8>) -> Result<String, ChatError> {
        let Some(body) = bytes.strip_prefix(b"%PDF") else {
            return Err(ChatError::Extraction("not a PDF".to_string()));
        };
        let text = String::from_utf8_lossy(body).trim().to_string();
        if text.is_empty() {
            return Err(ChatError::Extraction("no text".to_string()));
        }
        Ok(text)
    }
}

pub struct TestApp {
    pub address: String,
    pub completion: Arc<MockCompletionConnector>,
    pub blob_cache: Arc<MemoryBlobCache>,
    pub backends: Backends,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn get(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token_for(user))
    }

    pub fn post(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token_for(user))
    }

    pub fn delete(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token_for(user))
    }

    /// Create an empty chat and return its `item`.
    pub async fn create_chat(&self, user: &str) -> serde_json::Value {
        let response = self
            .post("/chat", user)
            .json(&json!({"title": "Test chat"}))
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(201, response.status().as_u16());

        let body: serde_json::Value = response.json().await.unwrap();
        body["item"].clone()
    }
}

pub fn settings() -> Settings {
    Settings {
        database: DatabaseSettings {
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5432,
            database_name: "docchat".to_string(),
            max_connections: 5,
            in_memory: true,
        },
        app_port: 0,
        app_host: "127.0.0.1".to_string(),
        auth: AuthSettings {
            jwt_secret: JWT_SECRET.to_string(),
            cookie_name: "auth_token".to_string(),
        },
        connectors: Default::default(),
        chat: Default::default(),
    }
}

pub async fn spawn_app() -> TestApp {
    let completion = Arc::new(MockCompletionConnector::new());
    let blob_cache = Arc::new(MemoryBlobCache::new());

    let mut backends = Backends::in_memory(completion.clone(), Arc::new(PlainTextExtractor));
    backends.blob_cache = blob_cache.clone();

    spawn_app_with(backends, completion, blob_cache).await
}

pub async fn spawn_app_with(
    backends: Backends,
    completion: Arc<MockCompletionConnector>,
    blob_cache: Arc<MemoryBlobCache>,
) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let server = docchat::startup::run(listener, backends.clone(), settings())
        .await
        .expect("Failed to bind address.");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        completion,
        blob_cache,
        backends,
        client: reqwest::Client::new(),
    }
}

pub fn token_for(user_id: &str) -> String {
    sign_token(
        json!({
            "userId": user_id,
            "email": format!("{}@test.com", user_id),
            "exp": chrono::Utc::now().timestamp() + 3600,
        }),
        JWT_SECRET,
    )
}

pub fn sign_token(claims: serde_json::Value, secret: &str) -> String {
    let header = json!({"alg": "HS256", "typ": "JWT"});
    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let payload_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", header_b64, payload_b64).as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{}.{}.{}", header_b64, payload_b64, signature)
}
