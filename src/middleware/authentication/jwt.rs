//! HS256 session tokens.
//!
//! Tokens are issued elsewhere; this side only verifies the signature and
//! expiry and reads the caller's identity out of the claims.

use crate::models;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JwtClaims {
    #[serde(alias = "sub")]
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(authorization: &str) -> Result<&str, String> {
    let parts: Vec<&str> = authorization.split_whitespace().collect();
    if parts.len() != 2 {
        return Err("Invalid Authorization header format".to_string());
    }
    if parts[0] != "Bearer" {
        return Err("Expected Bearer scheme in Authorization header".to_string());
    }
    Ok(parts[1])
}

/// Check signature and expiry, then return the claims.
pub fn verify(token: &str, secret: &str) -> Result<JwtClaims, String> {
    let parts: Vec<&str> = token.split('.').collect();
    let [header, payload, signature] = parts.as_slice() else {
        return Err("Invalid JWT format: expected 3 parts (header.payload.signature)".to_string());
    };

    let header: JwtHeader = decode_part(header)?;
    if header.alg != "HS256" {
        return Err(format!("Unsupported JWT algorithm {}", header.alg));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|e| format!("Failed to decode JWT signature: {}", e))?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("Invalid JWT secret: {}", e))?;
    mac.update(format!("{}.{}", parts[0], payload).as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| "JWT signature mismatch".to_string())?;

    let claims: JwtClaims = decode_part(payload)?;
    validate_expiration(&claims)?;
    Ok(claims)
}

fn decode_part<T: serde::de::DeserializeOwned>(part: &str) -> Result<T, String> {
    let decoded = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| format!("Failed to decode JWT part: {}", e))?;
    serde_json::from_slice(&decoded).map_err(|e| format!("Failed to parse JWT part: {}", e))
}

/// Validate JWT token expiration
pub fn validate_expiration(claims: &JwtClaims) -> Result<(), String> {
    let now = chrono::Utc::now().timestamp();
    if claims.exp < now {
        return Err(format!(
            "JWT token expired (exp: {}, now: {})",
            claims.exp, now
        ));
    }
    Ok(())
}

impl From<JwtClaims> for models::User {
    fn from(claims: JwtClaims) -> Self {
        models::User {
            id: claims.user_id,
            email: claims.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sign(header: serde_json::Value, payload: serde_json::Value, secret: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string());
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", header_b64, payload_b64).as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}.{}", header_b64, payload_b64, signature)
    }

    fn token(user_id: &str, exp: i64, secret: &str) -> String {
        sign(
            json!({"alg": "HS256", "typ": "JWT"}),
            json!({"userId": user_id, "email": "a@test.com", "exp": exp}),
            secret,
        )
    }

    #[test]
    fn test_verify_valid_token() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let claims = verify(&token("u-1", exp, "secret"), "secret").expect("valid token");

        assert_eq!(claims.user_id, "u-1");
        assert_eq!(claims.email.as_deref(), Some("a@test.com"));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        assert!(verify(&token("u-1", exp, "secret"), "other").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let exp = chrono::Utc::now().timestamp() - 10;
        let err = verify(&token("u-1", exp, "secret"), "secret").unwrap_err();
        assert!(err.contains("expired"));
    }

    #[test]
    fn test_alg_none_is_rejected() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let forged = sign(
            json!({"alg": "none"}),
            json!({"userId": "u-1", "exp": exp}),
            "secret",
        );
        assert!(verify(&forged, "secret").is_err());
    }

    #[test]
    fn test_sub_claim_is_accepted() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = sign(json!({"alg": "HS256"}), json!({"sub": "u-2", "exp": exp}), "k");
        let user: models::User = verify(&token, "k").unwrap().into();
        assert_eq!(user.id, "u-2");
        assert!(user.email.is_none());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert!(extract_bearer_token("Basic abc").is_err());
        assert!(extract_bearer_token("Bearer").is_err());
    }
}
