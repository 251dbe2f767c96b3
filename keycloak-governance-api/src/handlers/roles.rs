use crate::{dto::UpdateRoleProfileRequest, error::AppResult, state::AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use keycloak_governance_domain::domain::entities::{MenuTree, RoleSecurityProfile};

pub async fn get_role_profile(
    State(state): State<AppState>,
    Path((realm, role_name)): Path<(String, String)>,
) -> AppResult<Json<RoleSecurityProfile>> {
    let ctx = state.operator_session().await?;
    let profile = state
        .security_service
        .get_role_profile(&realm, &role_name, &ctx)
        .await?;
    Ok(Json(profile))
}

pub async fn update_role_profile(
    State(state): State<AppState>,
    Path((realm, role_name)): Path<(String, String)>,
    Json(request): Json<UpdateRoleProfileRequest>,
) -> AppResult<Json<RoleSecurityProfile>> {
    let ctx = state.operator_session().await?;

    let menu_tree = request.menu_tree.map(MenuTree::new);
    let profile = RoleSecurityProfile {
        data_security_level: request.data_security_level,
        menu_ids: request.menu_ids,
    };

    let stored = state
        .security_service
        .update_role_profile(&realm, &role_name, profile, menu_tree.as_ref(), &ctx)
        .await?;
    Ok(Json(stored))
}
