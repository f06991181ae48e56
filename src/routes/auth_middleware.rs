use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::services::auth_service::AuthError;
use crate::state::AppState;

/// Verified caller identity, inserted into request extensions
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser(pub String);

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user_id = match state.tokens.verify_request(&req) {
        Ok(user_id) => user_id,
        Err(AuthError::NoSecret) => {
            error!("Auth JWT secret not configured");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Err(e) => {
            debug!("Rejecting request to {}: {}", req.uri().path(), e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}
