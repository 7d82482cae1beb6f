use crate::forms;
use crate::helpers::JsonResponse;
use crate::models;
use crate::services::{ChatError, ChatService};
use actix_web::{post, web, Responder, Result};
use serde_valid::Validate;
use std::sync::Arc;

/// POST /chat
/// With `initialMessage` the first turn is answered before responding.
#[tracing::instrument(name = "Add chat.", skip(chats))]
#[post("")]
pub async fn add(
    user: web::ReqData<Arc<models::User>>,
    form: web::Json<forms::CreateChatForm>,
    chats: web::Data<ChatService>,
) -> Result<impl Responder> {
    if let Err(errors) = form.validate() {
        tracing::debug!("Invalid chat form: {}", errors);
        return Err(ChatError::Validation(errors.to_string()).into());
    }

    let forms::CreateChatForm {
        title,
        initial_message,
    } = form.into_inner();
    let chat = chats.create(&user.id, title, initial_message).await?;

    Ok(JsonResponse::build()
        .set_id(chat.id)
        .set_item(chat)
        .created("Chat created"))
}
