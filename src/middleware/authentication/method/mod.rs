mod f_anonym;
mod f_cookie;
mod f_jwt;

pub use f_anonym::anonym;
pub use f_cookie::try_cookie;
pub use f_jwt::try_jwt;

use crate::configuration::Settings;
use crate::middleware::authentication::jwt;
use crate::models;
use actix_web::{dev::ServiceRequest, web, HttpMessage};
use std::sync::Arc;

/// Verify `token` and attach the caller to the request.
fn login(req: &mut ServiceRequest, token: &str) -> Result<(), String> {
    let secret = req
        .app_data::<web::Data<Settings>>()
        .map(|settings| settings.auth.jwt_secret.clone())
        .ok_or_else(|| "authentication is not configured".to_string())?;

    let claims = jwt::verify(token, &secret)?;
    let user: models::User = claims.into();
    tracing::debug!(user_id = %user.id, "Caller authenticated");

    if req.extensions_mut().insert(Arc::new(user)).is_some() {
        return Err("user already logged".to_string());
    }
    Ok(())
}
