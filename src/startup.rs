use crate::configuration::Settings;
use crate::connectors::{self, BlobCache, CompletionConnector, MemoryBlobCache};
use crate::db::{ChatStore, MemoryChatStore, PgChatStore};
use crate::health::HealthChecker;
use crate::middleware;
use crate::routes;
use crate::services::{ChatError, ChatService, DocumentExtractor, IngestionService, PdfExtractor};
use actix_cors::Cors;
use actix_web::{dev::Server, error, web, App, HttpServer};
use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;

const JSON_LIMIT: usize = 256 * 1024;

/// Everything the handlers talk to, built once in `main`.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn ChatStore>,
    pub blob_cache: Arc<dyn BlobCache>,
    pub completion: Arc<dyn CompletionConnector>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pg_pool: Option<PgPool>,
}

impl Backends {
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let (store, pg_pool): (Arc<dyn ChatStore>, Option<PgPool>) = if settings.database.in_memory {
            tracing::warn!("Conversations kept in process memory");
            (Arc::new(MemoryChatStore::new()), None)
        } else {
            let pool = connect_database(settings).await?;
            (Arc::new(PgChatStore::new(pool.clone())), Some(pool))
        };

        let blob_cache = connectors::blob_cache::init(&settings.connectors.blob_cache)
            .await
            .context("Failed to connect to the blob cache")?;
        let completion = connectors::init_completion(&settings.connectors.completion)
            .context("Failed to build the completion client")?;

        Ok(Self {
            store,
            blob_cache,
            completion,
            extractor: Arc::new(PdfExtractor),
            pg_pool,
        })
    }

    /// Backends without Postgres or Redis.
    pub fn in_memory(
        completion: Arc<dyn CompletionConnector>,
        extractor: Arc<dyn DocumentExtractor>,
    ) -> Self {
        Self {
            store: Arc::new(MemoryChatStore::new()),
            blob_cache: Arc::new(MemoryBlobCache::new()),
            completion,
            extractor,
            pg_pool: None,
        }
    }

    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pg_pool {
            tracing::info!("Closing database pool");
            pool.close().await;
        }
    }
}

async fn connect_database(settings: &Settings) -> anyhow::Result<PgPool> {
    let database = &settings.database;
    tracing::info!(
        db_host = %database.host,
        db_port = database.port,
        db_name = %database.database_name,
        "Connecting to PostgreSQL"
    );

    let connect_options = PgConnectOptions::new()
        .host(&database.host)
        .port(database.port)
        .username(&database.username)
        .password(&database.password)
        .database(&database.database_name)
        .ssl_mode(PgSslMode::Disable);

    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

pub async fn run(
    listener: TcpListener,
    backends: Backends,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    let chat_service = ChatService::new(
        backends.store.clone(),
        backends.completion.clone(),
        settings.chat.clone(),
    );
    let ingestion_service = IngestionService::new(
        backends.store.clone(),
        backends.blob_cache.clone(),
        backends.extractor.clone(),
        backends.completion.clone(),
        settings.chat.clone(),
    );
    let health_checker = Arc::new(HealthChecker::new(
        backends.store.clone(),
        backends.blob_cache.clone(),
        backends.completion.clone(),
    ));

    let settings = web::Data::new(settings);
    let chat_service = web::Data::new(chat_service);
    let ingestion_service = web::Data::new(ingestion_service);
    let health_checker = web::Data::new(health_checker);

    let json_config = web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| {
            let msg = match err {
                error::JsonPayloadError::Deserialize(err) => format!(
                    "Invalid JSON at line {}, column {}: {}",
                    err.line(),
                    err.column(),
                    err
                ),
                _ => err.to_string(),
            };
            ChatError::Validation(msg).into()
        });
    let query_config = web::QueryConfig::default()
        .error_handler(|err, _req| ChatError::Validation(err.to_string()).into());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::authentication::Manager::new())
            .wrap(TracingLogger::default())
            .wrap(actix_web::middleware::Compress::default())
            .wrap(Cors::permissive())
            .service(web::scope("/health_check").service(routes::health_check))
            .service(
                web::scope("/chat")
                    .service(routes::chat::get::list)
                    .service(routes::chat::add::add)
                    .service(routes::chat::delete::all)
                    .service(routes::chat::upload::upload)
                    .service(routes::chat::get::item)
                    .service(routes::chat::delete::item)
                    .service(routes::chat::message::send)
                    .service(routes::chat::upload::upload_to_chat),
            )
            .app_data(json_config.clone())
            .app_data(query_config.clone())
            .app_data(settings.clone())
            .app_data(chat_service.clone())
            .app_data(ingestion_service.clone())
            .app_data(health_checker.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
