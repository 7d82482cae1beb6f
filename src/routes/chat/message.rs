use crate::forms;
use crate::helpers::JsonResponse;
use crate::models;
use crate::services::{ChatError, ChatService};
use actix_web::{post, web, HttpResponse, Result};
use futures_util::StreamExt;
use serde_valid::Validate;
use std::sync::Arc;

const NDJSON: &str = "application/x-ndjson";

/// POST /chat/{chatId}/messages
/// Buffered sends answer with `{newMessage, aiResponse}`; `stream: true`
/// switches to one JSON event per line.
#[tracing::instrument(name = "Send chat message.", skip(chats, form), fields(stream = form.stream))]
#[post("/{chat_id}/messages")]
pub async fn send(
    path: web::Path<(String,)>,
    user: web::ReqData<Arc<models::User>>,
    form: web::Json<forms::SendMessageForm>,
    chats: web::Data<ChatService>,
) -> Result<HttpResponse> {
    if let Err(errors) = form.validate() {
        return Err(ChatError::Validation(errors.to_string()).into());
    }
    let chat_ref = super::chat_ref(&path.0)?;

    if !form.stream {
        let exchange = chats.send_message(&user.id, chat_ref, &form.content).await?;
        return Ok(HttpResponse::Ok().json(JsonResponse::build().set_item(exchange).ok("OK").into_inner()));
    }

    let events = chats
        .send_message_stream(&user.id, chat_ref, &form.content)
        .await?
        .map(|event| Ok::<_, actix_web::Error>(web::Bytes::from(event.to_ndjson())));

    Ok(HttpResponse::Ok()
        .content_type(NDJSON)
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(events))
}
