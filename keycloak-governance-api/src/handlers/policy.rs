use crate::{
    dto::{
        CanAssignRequest, CanAssignResponse, DeriveDataLevelsRequest, DeriveDataLevelsResponse,
        NormalizeAttributesRequest, NormalizeAttributesResponse, RoleCategoryResponse,
    },
    state::AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use keycloak_governance_domain::domain::entities::{
    derive_data_levels, normalize_attributes, resolve_personnel_level,
};

/// Unknown levels derive an empty set rather than failing
pub async fn derive_levels(
    Json(request): Json<DeriveDataLevelsRequest>,
) -> Json<DeriveDataLevelsResponse> {
    let data_levels = derive_data_levels(&request.personnel_level);
    Json(DeriveDataLevelsResponse {
        personnel_level: request.personnel_level.trim().to_string(),
        data_levels,
    })
}

pub async fn role_category(
    State(state): State<AppState>,
    Path(role_name): Path<String>,
) -> Json<RoleCategoryResponse> {
    let category = state.security_service.policy().classify_role(&role_name);
    Json(RoleCategoryResponse {
        role_name,
        category,
    })
}

pub async fn can_assign(
    State(state): State<AppState>,
    Json(request): Json<CanAssignRequest>,
) -> Json<CanAssignResponse> {
    let result = state
        .security_service
        .policy()
        .check_role_assignment(&request.candidate, &request.current_roles);

    Json(CanAssignResponse {
        allowed: result.is_ok(),
        reason: result.err().map(|violation| violation.to_string()),
    })
}

pub async fn normalize(
    Json(request): Json<NormalizeAttributesRequest>,
) -> Json<NormalizeAttributesResponse> {
    let level_override = request.personnel_level.as_deref();
    let attributes = normalize_attributes(&request.attributes, level_override);
    let personnel_level = resolve_personnel_level(&request.attributes, level_override);

    Json(NormalizeAttributesResponse {
        attributes,
        personnel_level,
        data_levels: personnel_level
            .map(|level| level.data_levels())
            .unwrap_or_default(),
    })
}
