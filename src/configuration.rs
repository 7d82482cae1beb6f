use crate::connectors::ConnectorConfig;
use serde;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub app_port: u16,
    pub app_host: String,
    pub auth: AuthSettings,
    #[serde(default)]
    pub connectors: ConnectorConfig,
    #[serde(default)]
    pub chat: ChatSettings,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database_name: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
    /// Keep conversations in process memory instead of Postgres (local runs, tests)
    #[serde(default)]
    pub in_memory: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AuthSettings {
    /// HS256 secret shared with the service that issues session tokens
    pub jwt_secret: String,
    #[serde(default = "AuthSettings::default_cookie_name")]
    pub cookie_name: String,
}

/// Limits applied by the conversation and ingestion pipelines.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChatSettings {
    pub default_title: String,
    /// Characters of document context injected into every completion prompt
    pub prompt_context_chars: usize,
    /// Characters of extracted text stored on the conversation as its context
    pub stored_context_chars: usize,
    pub analysis_chars: usize,
    pub questions_chars: usize,
    pub max_upload_bytes: usize,
    pub blob_ttl_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            default_title: "New conversation".to_string(),
            prompt_context_chars: 4000,
            stored_context_chars: 1000,
            analysis_chars: 15000,
            questions_chars: 10000,
            max_upload_bytes: 10 * 1024 * 1024,
            blob_ttl_secs: 86400,
        }
    }
}

impl DatabaseSettings {
    fn default_max_connections() -> u32 {
        5
    }

    // Connection string: postgresql://<username>:<password>@<host>:<port>/<database_name>
    pub fn connection_string(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name,
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port,
        )
    }
}

impl AuthSettings {
    fn default_cookie_name() -> String {
        "auth_token".to_string()
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // configuration.yaml in the working directory, then APP__SECTION__KEY overrides
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration"))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;

    let mut config: Settings = settings.try_deserialize()?;

    // OpenAI-style variables win over the file so deployments can keep keys out of it
    config.connectors.completion.apply_env();

    Ok(config)
}
