use crate::forms;
use crate::helpers::JsonResponse;
use crate::models;
use crate::services::{ChatError, IngestRequest, IngestionService, UploadCheck, UploadOutcome};
use actix_web::{http::header, post, web, HttpRequest, HttpResponse, Result};
use futures_util::StreamExt;
use std::sync::Arc;

/// POST /chat/upload
/// Ingests the PDF body into a new chat.
#[tracing::instrument(name = "Upload document.", skip(req, body, ingestion))]
#[post("/upload")]
pub async fn upload(
    req: HttpRequest,
    user: web::ReqData<Arc<models::User>>,
    query: web::Query<forms::UploadQuery>,
    body: web::Payload,
    ingestion: web::Data<IngestionService>,
) -> Result<HttpResponse> {
    ingest(&req, &user, query.into_inner(), None, body, &ingestion).await
}

/// POST /chat/{chatId}/upload
/// Ingests the PDF body as context of an existing chat.
#[tracing::instrument(name = "Upload document to chat.", skip(req, body, ingestion))]
#[post("/{chat_id}/upload")]
pub async fn upload_to_chat(
    req: HttpRequest,
    path: web::Path<(String,)>,
    user: web::ReqData<Arc<models::User>>,
    query: web::Query<forms::UploadQuery>,
    body: web::Payload,
    ingestion: web::Data<IngestionService>,
) -> Result<HttpResponse> {
    let chat_ref = super::chat_ref(&path.0)?;
    ingest(&req, &user, query.into_inner(), Some(chat_ref), body, &ingestion).await
}

async fn ingest(
    req: &HttpRequest,
    user: &models::User,
    query: forms::UploadQuery,
    target: Option<models::ChatRef>,
    body: web::Payload,
    ingestion: &IngestionService,
) -> Result<HttpResponse> {
    let check = ingestion.upload_check();
    check.head(header_str(req, header::CONTENT_TYPE), declared_length(req))?;

    let bytes = read_body(body, check).await?;
    let outcome = ingestion
        .ingest(
            &user.id,
            IngestRequest {
                filename: query.filename,
                bytes,
                target,
                message: query.message,
            },
        )
        .await?;

    Ok(respond(outcome))
}

fn respond(outcome: UploadOutcome) -> HttpResponse {
    let builder = JsonResponse::build().set_id(outcome.document.id);
    if outcome.created {
        builder.set_item(outcome).created("Document uploaded")
    } else {
        HttpResponse::Ok().json(builder.set_item(outcome).ok("Document uploaded").into_inner())
    }
}

fn header_str(req: &HttpRequest, name: header::HeaderName) -> Option<&str> {
    req.headers().get(name).and_then(|value| value.to_str().ok())
}

fn declared_length(req: &HttpRequest) -> Option<usize> {
    header_str(req, header::CONTENT_LENGTH).and_then(|value| value.trim().parse().ok())
}

/// Buffer the body, giving up as soon as it outgrows the limit.
async fn read_body(mut body: web::Payload, check: UploadCheck) -> Result<Vec<u8>, ChatError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|err| ChatError::Validation(format!("Failed to read upload: {}", err)))?;
        check.size(bytes.len() + chunk.len())?;
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
