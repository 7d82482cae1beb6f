use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Function => "function",
        };
        write!(f, "{}", role)
    }
}

/// One turn of a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            name: None,
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant message whose id was announced before its content was known.
    pub fn assistant_with_id(id: String, content: impl Into<String>) -> Self {
        Self {
            id,
            ..Self::assistant(content)
        }
    }

    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(Role::Function, content)
        }
    }
}

/// A persisted conversation owned by a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub document_id: Option<i64>,
    pub document_context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// A chat that has not been stored yet; `id` is assigned on insert.
    pub fn new(user_id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            uuid: Uuid::new_v4(),
            user_id,
            title,
            messages: vec![],
            document_id: None,
            document_context: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: i64,
    pub uuid: Uuid,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&Chat> for ChatSummary {
    fn from(chat: &Chat) -> Self {
        Self {
            id: chat.id,
            uuid: chat.uuid,
            title: chat.title.clone(),
            updated_at: chat.updated_at,
        }
    }
}

/// Path reference to a chat: the internal numeric id or the external uuid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRef {
    Id(i64),
    Uuid(Uuid),
}

impl ChatRef {
    pub fn matches(&self, chat: &Chat) -> bool {
        match self {
            ChatRef::Id(id) => chat.id == *id,
            ChatRef::Uuid(uuid) => chat.uuid == *uuid,
        }
    }
}

impl FromStr for ChatRef {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if let Ok(id) = value.parse::<i64>() {
            return Ok(ChatRef::Id(id));
        }
        Uuid::parse_str(value)
            .map(ChatRef::Uuid)
            .map_err(|_| format!("{value} is neither a chat id nor a chat uuid"))
    }
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRef::Id(id) => write!(f, "{}", id),
            ChatRef::Uuid(uuid) => write!(f, "{}", uuid),
        }
    }
}
