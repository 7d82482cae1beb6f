//! Prompt assembly and parsing of structured completions.

use crate::connectors::PromptMessage;
use crate::models::DocumentAnalysis;
use crate::services::ChatError;
use serde::Deserialize;

const ANALYSIS_SYSTEM: &str =
    "You are an assistant specialised in document analysis. Always answer with valid JSON.";
const QUESTIONS_SYSTEM: &str = "You are an assistant that writes relevant questions about documents. Always answer with valid JSON.";

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Leading system message carrying the document a chat is grounded in.
pub fn context_message(document_context: &str, max_chars: usize) -> PromptMessage {
    PromptMessage::system(format!(
        "Document context: {}...",
        truncate_chars(document_context, max_chars)
    ))
}

pub fn analysis_messages(text: &str, max_chars: usize) -> Vec<PromptMessage> {
    let prompt = format!(
        "Analyse the following document and extract its key information:\n\n\
         {}\n\n\
         Provide an analysis with:\n\
         1. A short summary of the document\n\
         2. The document type (contract, invoice, article, ...)\n\
         3. Entities mentioned (people, organisations)\n\
         4. Important dates\n\
         5. Important terms or conditions\n\n\
         Answer in JSON with the keys: summary, documentType, entities, dates, keyTerms",
        truncate_chars(text, max_chars)
    );
    vec![PromptMessage::system(ANALYSIS_SYSTEM), PromptMessage::user(prompt)]
}

pub fn questions_messages(text: &str, max_chars: usize) -> Vec<PromptMessage> {
    let prompt = format!(
        "Read the following text extracted from a document and write 5 relevant questions \
         someone could have about it:\n\n\
         {}\n\n\
         Write 5 specific questions about the content. Answer in JSON as {{\"questions\": [\"...\"]}}.",
        truncate_chars(text, max_chars)
    );
    vec![PromptMessage::system(QUESTIONS_SYSTEM), PromptMessage::user(prompt)]
}

// some local models wrap JSON mode answers in markdown fences anyway
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

pub fn parse_analysis(raw: &str) -> Result<DocumentAnalysis, ChatError> {
    let value: serde_json::Value = serde_json::from_str(strip_fences(raw)).map_err(|err| {
        ChatError::UpstreamFormat(format!("Document analysis is not valid JSON: {}", err))
    })?;

    if !value.is_object() {
        return Err(ChatError::UpstreamFormat(
            "Document analysis is not a JSON object".to_string(),
        ));
    }

    serde_json::from_value(value).map_err(|err| {
        ChatError::UpstreamFormat(format!("Document analysis has an unexpected shape: {}", err))
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionsPayload {
    List(Vec<serde_json::Value>),
    Wrapped {
        #[serde(default)]
        questions: Vec<serde_json::Value>,
    },
}

pub fn parse_questions(raw: &str) -> Result<Vec<String>, ChatError> {
    let payload: QuestionsPayload = serde_json::from_str(strip_fences(raw)).map_err(|err| {
        ChatError::UpstreamFormat(format!("Suggested questions are not valid JSON: {}", err))
    })?;

    let items = match payload {
        QuestionsPayload::List(items) | QuestionsPayload::Wrapped { questions: items } => items,
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            serde_json::Value::String(question) => Some(question),
            serde_json::Value::Object(map) => map
                .get("question")
                .and_then(|q| q.as_str())
                .map(str::to_string),
            _ => None,
        })
        .map(|question| question.trim().to_string())
        .filter(|question| !question.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn context_message_is_system_with_prefix() {
        let long = "x".repeat(5000);
        let message = context_message(&long, 4000);

        let PromptMessage::System { content } = message else {
            panic!("context must be a system message");
        };
        assert!(content.starts_with("Document context: "));
        assert_eq!(content.len(), "Document context: ".len() + 4000 + 3);
    }

    #[test]
    fn analysis_prompt_is_capped() {
        let text = "y".repeat(20000);
        let messages = analysis_messages(&text, 15000);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content().matches('y').count() == 15000);
    }

    #[test]
    fn analysis_parses_fenced_json() {
        let raw = "```json\n{\"summary\":\"S\",\"documentType\":\"Invoice\",\"entities\":[\"ACME\"]}\n```";
        let analysis = parse_analysis(raw).unwrap();
        assert_eq!(analysis.summary, "S");
        assert_eq!(analysis.document_type, "Invoice");
        assert_eq!(analysis.entities, vec!["ACME"]);
    }

    #[test]
    fn analysis_rejects_prose() {
        let err = parse_analysis("Sure! Here is the analysis.").unwrap_err();
        assert_eq!(err.kind(), "upstream_format_error");

        let err = parse_analysis("[1, 2]").unwrap_err();
        assert_eq!(err.kind(), "upstream_format_error");
    }

    #[test]
    fn questions_accept_array_or_wrapped() {
        assert_eq!(parse_questions(r#"["A?", " B? "]"#).unwrap(), vec!["A?", "B?"]);
        assert_eq!(
            parse_questions(r#"{"questions": ["A?", {"question": "C?"}]}"#).unwrap(),
            vec!["A?", "C?"]
        );
        assert!(parse_questions(r#"{"other": 1}"#).unwrap().is_empty());
        assert!(parse_questions("nope").is_err());
    }
}
