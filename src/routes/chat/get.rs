use crate::helpers::JsonResponse;
use crate::models;
use crate::services::ChatService;
use actix_web::{get, web, Responder, Result};
use std::sync::Arc;

#[tracing::instrument(name = "Get all chats.", skip(chats))]
#[get("")]
pub async fn list(
    user: web::ReqData<Arc<models::User>>,
    chats: web::Data<ChatService>,
) -> Result<impl Responder> {
    let list = chats.list(&user.id).await?;

    Ok(JsonResponse::build().set_list(list).ok("OK"))
}

/// GET /chat/{chatId}
/// Returns the conversation with its full message history.
#[tracing::instrument(name = "Get chat.", skip(chats))]
#[get("/{chat_id}")]
pub async fn item(
    path: web::Path<(String,)>,
    user: web::ReqData<Arc<models::User>>,
    chats: web::Data<ChatService>,
) -> Result<impl Responder> {
    let chat_ref = super::chat_ref(&path.0)?;
    let chat = chats.get(&user.id, chat_ref).await?;

    Ok(JsonResponse::build().set_item(chat).ok("OK"))
}
