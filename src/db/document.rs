use crate::models;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgConnection;
use tracing::Instrument;

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: i64,
    user_id: String,
    filename: String,
    file_type: String,
    file_key: String,
    text_content: String,
    analysis: Option<Json<models::DocumentAnalysis>>,
    suggested_questions: Json<Vec<String>>,
    created_at: DateTime<Utc>,
}

impl From<DocumentRow> for models::Document {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            filename: row.filename,
            file_type: row.file_type,
            file_key: row.file_key,
            text_content: row.text_content,
            analysis: row.analysis.map(|analysis| analysis.0),
            suggested_questions: row.suggested_questions.0,
            created_at: row.created_at,
        }
    }
}

pub async fn insert(
    conn: &mut PgConnection,
    document: models::Document,
) -> Result<models::Document, String> {
    let query_span = tracing::info_span!("Saving document into the database", filename = %document.filename);
    sqlx::query_as::<_, DocumentRow>(
        r#"
        INSERT INTO document (user_id, filename, file_type, file_key, text_content, analysis, suggested_questions, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        RETURNING id, user_id, filename, file_type, file_key, text_content, analysis, suggested_questions, created_at
        "#,
    )
    .bind(&document.user_id)
    .bind(&document.filename)
    .bind(&document.file_type)
    .bind(&document.file_key)
    .bind(&document.text_content)
    .bind(document.analysis.as_ref().map(Json))
    .bind(Json(&document.suggested_questions))
    .fetch_one(conn)
    .instrument(query_span)
    .await
    .map(models::Document::from)
    .map_err(|err| {
        tracing::error!("Failed to insert document: {:?}", err);
        "Failed to insert".to_string()
    })
}

pub async fn fetch(
    conn: &mut PgConnection,
    user_id: &str,
    id: i64,
) -> Result<Option<models::Document>, String> {
    let query_span = tracing::info_span!("Fetch document.", id);
    sqlx::query_as::<_, DocumentRow>(
        r#"
        SELECT id, user_id, filename, file_type, file_key, text_content, analysis, suggested_questions, created_at
        FROM document
        WHERE id = $1 AND user_id = $2
        LIMIT 1
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(conn)
    .instrument(query_span)
    .await
    .map(|row| row.map(models::Document::from))
    .map_err(|err| {
        tracing::error!("Failed to fetch document: {:?}", err);
        "Could not fetch data".to_string()
    })
}
