use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Structured summary the completion endpoint produces for an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentAnalysis {
    #[serde(deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(alias = "document_type", deserialize_with = "lenient_string")]
    pub document_type: String,
    #[serde(deserialize_with = "lenient_list")]
    pub entities: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub dates: Vec<String>,
    #[serde(alias = "key_terms", deserialize_with = "lenient_list")]
    pub key_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub user_id: String,
    pub filename: String,
    pub file_type: String,
    pub file_key: String,
    pub text_content: String,
    pub analysis: Option<DocumentAnalysis>,
    pub suggested_questions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// What an upload response exposes about the stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: i64,
    pub filename: String,
    pub analysis: Option<DocumentAnalysis>,
}

impl From<&Document> for DocumentView {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id,
            filename: document.filename.clone(),
            analysis: document.analysis.clone(),
        }
    }
}

fn value_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Object(map) => {
            // models like to answer {"name": ..., "type": ...}
            let named = ["name", "value", "term", "date", "text"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_str()).map(str::to_string));
            Some(named.unwrap_or_else(|| serde_json::Value::Object(map).to_string()))
        }
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_string(value).unwrap_or_default())
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let list = match value {
        serde_json::Value::Array(items) => items.into_iter().filter_map(value_to_string).collect(),
        serde_json::Value::Null => vec![],
        single => value_to_string(single).into_iter().collect(),
    };
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn analysis_accepts_loose_shapes() {
        let analysis: DocumentAnalysis = serde_json::from_value(json!({
            "summary": "A lease agreement.",
            "document_type": "Contract",
            "entities": [{"name": "ACME"}, "Bob"],
            "dates": "2024-01-01",
            "keyTerms": null
        }))
        .unwrap();

        assert_eq!(analysis.document_type, "Contract");
        assert_eq!(analysis.entities, vec!["ACME", "Bob"]);
        assert_eq!(analysis.dates, vec!["2024-01-01"]);
        assert!(analysis.key_terms.is_empty());
    }

    #[test]
    fn analysis_missing_fields_default() {
        let analysis: DocumentAnalysis = serde_json::from_value(json!({"summary": "x"})).unwrap();
        assert_eq!(analysis.summary, "x");
        assert_eq!(analysis.document_type, "");
        assert!(analysis.entities.is_empty());
    }
}
