use crate::middleware::authentication::{get_header, jwt};
use actix_web::dev::ServiceRequest;

#[tracing::instrument(name = "Authenticate with JWT", skip(req))]
pub fn try_jwt(req: &mut ServiceRequest) -> Result<bool, String> {
    let Some(authorization) = get_header::<String>(req, "authorization")? else {
        return Ok(false);
    };

    let token = match jwt::extract_bearer_token(&authorization) {
        Ok(token) => token.to_string(),
        // not a Bearer token, try other methods
        Err(_) => return Ok(false),
    };

    super::login(req, &token)?;
    Ok(true)
}
