use crate::{dto::SessionView, error::AppError, state::AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Json,
};

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Skip auth for health check
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    // Check for API key if configured
    if let Some(expected_api_key) = &state.config.api_key {
        let auth_header = request
            .headers()
            .get("x-api-key")
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(api_key) if api_key == expected_api_key => Ok(next.run(request).await),
            _ => Err(AppError::Unauthorized),
        }
    } else {
        // No API key configured, allow all requests
        Ok(next.run(request).await)
    }
}

/// The operator the console acts as
pub async fn current_session(State(state): State<AppState>) -> Json<SessionView> {
    let session = state.operator.context().read().await;
    let user = session.user.as_ref();
    let catalog = state.security_service.policy().catalog();

    Json(SessionView {
        realm: session.realm.clone(),
        authenticated: session.is_authenticated(),
        username: user.map(|u| u.username.clone()),
        admin_role: session.admin_role(catalog).map(str::to_string),
        roles: user.map(|u| u.roles.clone()).unwrap_or_default(),
    })
}
