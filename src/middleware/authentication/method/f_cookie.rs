use crate::configuration::Settings;
use actix_web::{dev::ServiceRequest, web, HttpMessage};

#[tracing::instrument(name = "Authenticate with cookie", skip(req))]
pub fn try_cookie(req: &mut ServiceRequest) -> Result<bool, String> {
    let cookie_name = req
        .app_data::<web::Data<Settings>>()
        .map(|settings| settings.auth.cookie_name.clone())
        .unwrap_or_else(|| "auth_token".to_string());

    let Some(token) = req.cookie(&cookie_name).map(|cookie| cookie.value().to_string()) else {
        return Ok(false);
    };

    tracing::debug!("Found {} in cookies", cookie_name);
    super::login(req, &token)?;
    Ok(true)
}
