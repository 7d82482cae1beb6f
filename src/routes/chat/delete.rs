use crate::helpers::JsonResponse;
use crate::models;
use crate::services::ChatService;
use actix_web::{delete, web, Responder, Result};
use std::sync::Arc;

#[tracing::instrument(name = "Delete chat.", skip(chats))]
#[delete("/{chat_id}")]
pub async fn item(
    path: web::Path<(String,)>,
    user: web::ReqData<Arc<models::User>>,
    chats: web::Data<ChatService>,
) -> Result<impl Responder> {
    let chat_ref = super::chat_ref(&path.0)?;
    chats.delete(&user.id, chat_ref).await?;

    Ok(JsonResponse::<models::Chat>::build().ok("Deleted"))
}

/// DELETE /chat
/// Removes every conversation of the caller; `id` carries the count.
#[tracing::instrument(name = "Delete all chats of a user.", skip(chats))]
#[delete("")]
pub async fn all(
    user: web::ReqData<Arc<models::User>>,
    chats: web::Data<ChatService>,
) -> Result<impl Responder> {
    let deleted = chats.delete_all(&user.id).await?;

    Ok(JsonResponse::<u64>::build()
        .set_id(deleted as i64)
        .set_item(deleted)
        .ok("Deleted"))
}
