use serde::{Deserialize, Serialize};
use serde_valid::Validate;

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatForm {
    #[validate(max_length = 200)]
    pub title: Option<String>,
    #[validate(max_length = 32000)]
    pub initial_message: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SendMessageForm {
    /// Older clients post `{"message": ...}`
    #[serde(alias = "message")]
    #[validate(max_length = 32000)]
    pub content: String,
    #[serde(default)]
    pub stream: bool,
}

/// Query string of an upload request; the PDF itself is the raw body.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
    pub message: Option<String>,
}
