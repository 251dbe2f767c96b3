use crate::{
    dto::{
        CreateUserRequest, CreateUserResponse, UpdateUserSecurityRequest, UserSecurityView,
    },
    error::{AppError, AppResult},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use keycloak_governance_domain::{
    application::services::SubmitOutcome,
    domain::{
        entities::{PersonnelSecurityLevel, UserAttributeKey},
        errors::DomainError,
        session::UserEditSession,
    },
};
use tracing::info;

fn parse_level(value: &str) -> AppResult<PersonnelSecurityLevel> {
    PersonnelSecurityLevel::parse(value)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown personnel security level: {value}")))
}

fn toggle(session: &mut UserEditSession, role: &str) -> AppResult<()> {
    session
        .toggle_role(role)
        .map(|_| ())
        .map_err(|violation| {
            DomainError::PolicyViolation {
                role_name: role.to_string(),
                violation,
            }
            .into()
        })
}

pub async fn get_user_security(
    State(state): State<AppState>,
    Path((realm, user_id)): Path<(String, String)>,
) -> AppResult<Json<UserSecurityView>> {
    let ctx = state.operator_session().await?;
    let service = &state.security_service;

    let session = service.open_user_session(&realm, &user_id, &ctx).await?;
    let assignable = service.list_assignable_roles(&realm, &session, &ctx).await?;

    Ok(Json(UserSecurityView::new(
        &session,
        service.policy(),
        assignable,
    )))
}

/// Apply a level change, profile fields and manual role changes in one submission.
///
/// Adding a held role or removing one that is not held is a no-op; role names
/// match without case.
pub async fn update_user_security(
    State(state): State<AppState>,
    Path((realm, user_id)): Path<(String, String)>,
    Json(request): Json<UpdateUserSecurityRequest>,
) -> AppResult<Json<SubmitOutcome>> {
    let ctx = state.operator_session().await?;
    let service = &state.security_service;

    let mut session = service.open_user_session(&realm, &user_id, &ctx).await?;

    if let Some(level) = request.personnel_level.as_deref() {
        session.set_personnel_level(parse_level(level)?);
    }
    if let Some(department) = request.department.as_deref() {
        session.set_single_attribute(UserAttributeKey::Department.as_str(), department)?;
    }
    if let Some(position) = request.position.as_deref() {
        session.set_single_attribute(UserAttributeKey::Position.as_str(), position)?;
    }

    for role in &request.remove_roles {
        if session.holds(role) {
            toggle(&mut session, role)?;
        }
    }
    for role in &request.add_roles {
        if !session.holds(role) {
            toggle(&mut session, role)?;
        }
    }

    let outcome = service.submit_user_session(&realm, &session, &ctx).await?;
    Ok(Json(outcome))
}

pub async fn create_user(
    State(state): State<AppState>,
    Path(realm): Path<String>,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<CreateUserResponse>)> {
    let ctx = state.operator_session().await?;

    let mut session = UserEditSession::for_new_user()
        .with_policy(state.security_service.policy().clone());
    session.username = request.username;
    session.full_name = request.full_name;
    session.email = request.email.unwrap_or_default();
    session.enabled = request.enabled.unwrap_or(true);

    for (key, value) in &request.attributes {
        session.set_single_attribute(key, value)?;
    }
    if let Some(level) = request.personnel_level.as_deref() {
        session.set_personnel_level(parse_level(level)?);
    }
    for role in &request.roles {
        if !session.holds(role) {
            toggle(&mut session, role)?;
        }
    }

    let id = state
        .security_service
        .create_user(&realm, &session, &ctx)
        .await?;
    info!("Created user {} in realm {}", id, realm);

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse { id: id.to_string() }),
    ))
}
