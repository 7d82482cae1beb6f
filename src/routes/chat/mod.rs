pub mod add;
pub mod delete;
pub mod get;
pub mod message;
pub mod upload;

use crate::models::ChatRef;
use crate::services::ChatError;

/// `{chatId}` is either the numeric id or the uuid of a chat.
pub(crate) fn chat_ref(raw: &str) -> Result<ChatRef, ChatError> {
    raw.parse::<ChatRef>().map_err(ChatError::Validation)
}
