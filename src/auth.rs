use spin_sdk::http::{Request, Response};
use tracing::{debug, warn};

use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{bearer_token, json_response, parse_json_body};
use crate::models::models::{AuthResponse, LoginRequest, PublicUser};
use crate::state::AppState;
use crate::users::{authenticate, find_user};

pub fn login_user(app: &AppState, req: &Request) -> ApiResult<Response> {
    let creds: LoginRequest = parse_json_body(req)?;
    let email = creds.email.as_deref().unwrap_or_default();

    let user = match authenticate(
        app.store(),
        email,
        creds.password.as_deref().unwrap_or_default(),
    ) {
        Ok(user) => user,
        Err(err @ ApiError::Unauthorized(_)) => {
            warn!(email = %email, "rejected login");
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    let token = app.tokens.issue(&user.id)?;
    json_response(
        200,
        &AuthResponse {
            message: "Login successful".to_string(),
            token,
            user: PublicUser::from(&user),
        },
    )
}

/// Resolves the acting user from the `Authorization: Bearer` header. A token
/// for a user that no longer exists is treated as invalid.
pub fn validate_token(app: &AppState, req: &Request) -> ApiResult<String> {
    let token = bearer_token(req).ok_or_else(ApiError::invalid_token)?;
    let user_id = app.tokens.verify(token)?;

    if find_user(app.store(), &user_id)?.is_none() {
        debug!(user_id = %user_id, "token for unknown user");
        return Err(ApiError::invalid_token());
    }
    Ok(user_id)
}
