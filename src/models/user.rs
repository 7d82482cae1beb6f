use serde::{Deserialize, Serialize};

/// Caller identity resolved by the authentication middleware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}
