use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use keycloak_governance_api::{router, AppState, Config};
use keycloak_governance_domain::{
    application::{
        ports::{
            AppConfig, AuthToken, DomainEvent, Environment, EventError, EventPublisher,
            GovernanceConfig, HttpConfig, IdentityRepository, KeycloakConfig, LoggingConfig,
            SessionContext, SessionUser, SignInCredentials, TokenManager,
        },
        services::{OperatorSession, SecurityAttributeService, SessionService},
    },
    domain::{
        entities::*,
        errors::{AuthError, DomainError, DomainResult},
    },
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tower::ServiceExt;

const REALM: &str = "corp";

#[derive(Default)]
struct InMemoryRepository {
    users: Mutex<HashMap<String, User>>,
    roles: Mutex<HashMap<String, Role>>,
    mappings: Mutex<HashMap<String, Vec<String>>>,
}

impl InMemoryRepository {
    fn with_user(self, id: &str, username: &str, level: &str, roles: &[&str]) -> Self {
        let mut user = User::new(username.to_string()).unwrap();
        user.id = Some(EntityId::from(id));
        user.first_name = Some("Jane Doe".to_string());
        user.set_attributes(HashMap::from([(
            "personnel_security_level".to_string(),
            vec![level.to_string()],
        )]));
        self.users.lock().unwrap().insert(id.to_string(), user);
        self.mappings
            .lock()
            .unwrap()
            .insert(id.to_string(), roles.iter().map(|r| r.to_string()).collect());
        self
    }

    fn with_role(self, name: &str) -> Self {
        let role = Role::new_realm_role(name.to_string()).unwrap();
        self.roles.lock().unwrap().insert(name.to_string(), role);
        self
    }
}

#[async_trait]
impl IdentityRepository for InMemoryRepository {
    async fn find_user_by_id(&self, realm: &str, user_id: &str) -> DomainResult<User> {
        self.users
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| DomainError::UserNotFound {
                user_id: user_id.to_string(),
                realm: realm.to_string(),
            })
    }

    async fn find_user_by_username(
        &self,
        _realm: &str,
        username: &str,
    ) -> DomainResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, _realm: &str, user: &User) -> DomainResult<EntityId> {
        let id = format!("user-{}", self.users.lock().unwrap().len() + 1);
        let mut stored = user.clone();
        stored.id = Some(EntityId::from(id.as_str()));
        self.users.lock().unwrap().insert(id.clone(), stored);
        Ok(EntityId::from(id))
    }

    async fn update_user(&self, _realm: &str, user: &User) -> DomainResult<()> {
        let id = user.id.as_ref().map(|id| id.to_string()).unwrap_or_default();
        self.users.lock().unwrap().insert(id, user.clone());
        Ok(())
    }

    async fn list_realm_roles(&self, _realm: &str) -> DomainResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.roles.lock().unwrap().values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_realm_role_by_name(&self, realm: &str, role_name: &str) -> DomainResult<Role> {
        self.roles
            .lock()
            .unwrap()
            .get(role_name)
            .cloned()
            .ok_or_else(|| DomainError::RoleNotFound {
                role_name: role_name.to_string(),
                realm: realm.to_string(),
            })
    }

    async fn update_realm_role(&self, _realm: &str, role: &Role) -> DomainResult<()> {
        self.roles
            .lock()
            .unwrap()
            .insert(role.name.clone(), role.clone());
        Ok(())
    }

    async fn get_user_realm_roles(
        &self,
        _realm: &str,
        user_id: &str,
    ) -> DomainResult<RoleMapping> {
        Ok(RoleMapping::new(
            self.mappings
                .lock()
                .unwrap()
                .get(user_id)
                .cloned()
                .unwrap_or_default(),
        ))
    }

    async fn add_user_realm_roles(
        &self,
        _realm: &str,
        user_id: &str,
        roles: &[String],
    ) -> DomainResult<()> {
        let mut mappings = self.mappings.lock().unwrap();
        let held = mappings.entry(user_id.to_string()).or_default();
        for role in roles {
            if !held.contains(role) {
                held.push(role.clone());
            }
        }
        Ok(())
    }

    async fn remove_user_realm_roles(
        &self,
        _realm: &str,
        user_id: &str,
        roles: &[String],
    ) -> DomainResult<()> {
        if let Some(held) = self.mappings.lock().unwrap().get_mut(user_id) {
            held.retain(|r| !roles.contains(r));
        }
        Ok(())
    }

    async fn get_user_profile_config(&self, _realm: &str) -> DomainResult<UserProfileConfig> {
        Ok(UserProfileConfig::default())
    }
}

struct TestTokenManager {
    expires_in: i64,
    reject_refresh: bool,
    issued: Mutex<u32>,
}

impl TestTokenManager {
    fn new(expires_in: i64, reject_refresh: bool) -> Self {
        Self {
            expires_in,
            reject_refresh,
            issued: Mutex::new(0),
        }
    }
}

#[async_trait]
impl TokenManager for TestTokenManager {
    async fn acquire_token(&self, _credentials: &SignInCredentials) -> Result<AuthToken, AuthError> {
        let mut issued = self.issued.lock().unwrap();
        *issued += 1;
        Ok(AuthToken::new(
            format!("access-{}", issued),
            self.expires_in,
            Some("refresh".to_string()),
            None,
        ))
    }

    async fn refresh_token(&self, _token: &AuthToken) -> Result<AuthToken, AuthError> {
        if self.reject_refresh {
            return Err(AuthError::TokenRefreshFailed {
                reason: "refresh token expired".to_string(),
            });
        }
        Ok(AuthToken::new("access".to_string(), 300, None, None))
    }

    async fn revoke_token(&self, _token: &AuthToken) -> Result<(), AuthError> {
        Ok(())
    }
}

struct DiscardingPublisher;

#[async_trait]
impl EventPublisher for DiscardingPublisher {
    async fn publish(&self, _event: DomainEvent) -> Result<(), EventError> {
        Ok(())
    }

    async fn publish_batch(&self, _events: Vec<DomainEvent>) -> Result<(), EventError> {
        Ok(())
    }

    async fn flush(&self) -> Result<(), EventError> {
        Ok(())
    }
}

fn app_config() -> AppConfig {
    AppConfig {
        environment: Environment::Test,
        keycloak: KeycloakConfig {
            url: "http://localhost:8080".to_string(),
            admin_realm: "master".to_string(),
            admin_client_id: "admin-cli".to_string(),
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            default_realm: Some(REALM.to_string()),
        },
        http: HttpConfig::default(),
        logging: LoggingConfig::default(),
        governance: GovernanceConfig::default(),
    }
}

fn operator(roles: &[&str]) -> SessionContext {
    let mut ctx = SessionContext::new("master".to_string());
    ctx.load(
        SessionUser::new("op-1".to_string(), "operator".to_string()).with_roles(roles.iter()),
        AuthToken::new("access".to_string(), 300, None, None),
    );
    ctx
}

fn build_app(repository: InMemoryRepository, api_key: Option<&str>, ctx: SessionContext) -> Router {
    build_app_with_tokens(
        Arc::new(repository),
        api_key,
        ctx,
        TestTokenManager::new(300, false),
    )
}

fn build_app_with_tokens(
    repository: Arc<InMemoryRepository>,
    api_key: Option<&str>,
    ctx: SessionContext,
    tokens: TestTokenManager,
) -> Router {
    let events = Arc::new(DiscardingPublisher);
    let config = Config::new(3000, api_key.map(str::to_string), app_config());

    let security_service = SecurityAttributeService::new(
        repository.clone(),
        events.clone(),
        &GovernanceConfig::default(),
    );
    let session_service = SessionService::new(Arc::new(tokens), repository, events);
    let credentials = SignInCredentials::password(
        "admin".to_string(),
        "admin".to_string(),
        "master".to_string(),
        "admin-cli".to_string(),
    );
    let operator = OperatorSession::new(session_service, credentials, Arc::new(RwLock::new(ctx)));

    router(AppState::from_parts(config, security_service, operator))
}

fn default_app() -> Router {
    let repository = InMemoryRepository::default()
        .with_user("u-1", "jdoe", "NON_SECRET", &["DATA_PUBLIC", "AUDITOR"])
        .with_role("AUDITOR")
        .with_role("SYSADMIN")
        .with_role("APPADMIN")
        .with_role("DATA_PUBLIC")
        .with_role("DATA_INTERNAL")
        .with_role("DATA_SECRET");
    build_app(repository, None, operator(&["SYSADMIN"]))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_check_skips_api_key() {
    let app = build_app(InMemoryRepository::default(), Some("secret"), operator(&[]));

    let (status, body) = send(app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn api_key_is_enforced_when_configured() {
    let app = build_app(InMemoryRepository::default(), Some("secret"), operator(&[]));
    let (status, _) = send(
        app.clone(),
        "POST",
        "/api/policy/derive-data-levels",
        Some(json!({ "personnel_level": "SECRET" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/policy/derive-data-levels")
        .header("content-type", "application/json")
        .header("x-api-key", "secret")
        .body(Body::from(json!({ "personnel_level": "SECRET" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn derive_data_levels_endpoint() {
    let (status, body) = send(
        default_app(),
        "POST",
        "/api/policy/derive-data-levels",
        Some(json!({ "personnel_level": " secret " })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["personnel_level"], "secret");
    assert_eq!(
        body["data_levels"],
        json!(["DATA_PUBLIC", "DATA_INTERNAL", "DATA_SECRET"])
    );

    let (_, body) = send(
        default_app(),
        "POST",
        "/api/policy/derive-data-levels",
        Some(json!({ "personnel_level": "COSMIC" })),
    )
    .await;
    assert_eq!(body["data_levels"], json!([]));
}

#[tokio::test]
async fn classify_and_can_assign_endpoints() {
    let (_, body) = send(
        default_app(),
        "GET",
        "/api/policy/roles/OPADMIN/category",
        None,
    )
    .await;
    assert_eq!(body["category"], "application_admin_role");

    let (_, body) = send(
        default_app(),
        "POST",
        "/api/policy/can-assign",
        Some(json!({ "candidate": "SYSADMIN", "current_roles": ["APPADMIN"] })),
    )
    .await;
    assert_eq!(body["allowed"], false);
    assert!(body["reason"].as_str().unwrap().contains("APPADMIN"));

    let (_, body) = send(
        default_app(),
        "POST",
        "/api/policy/can-assign",
        Some(json!({ "candidate": "AUDITOR", "current_roles": ["APPADMIN"] })),
    )
    .await;
    assert_eq!(body["allowed"], true);
    assert!(body.get("reason").is_none());
}

#[tokio::test]
async fn normalize_attributes_endpoint() {
    let (status, body) = send(
        default_app(),
        "POST",
        "/api/policy/normalize-attributes",
        Some(json!({
            "attributes": { "person_level": ["INTERNAL"], "department": [" Ops "] },
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["personnel_level"], "INTERNAL");
    assert_eq!(body["attributes"]["personnel_security_level"], json!(["INTERNAL"]));
    assert_eq!(body["attributes"]["department"], json!(["Ops"]));
    assert_eq!(
        body["attributes"]["data_levels"],
        json!(["DATA_PUBLIC", "DATA_INTERNAL"])
    );
}

#[tokio::test]
async fn user_security_view() {
    let (status, body) = send(
        default_app(),
        "GET",
        &format!("/api/realms/{REALM}/users/u-1/security"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["personnel_level"], "NON_SECRET");
    assert_eq!(body["data_levels"], json!(["DATA_PUBLIC"]));
    assert_eq!(body["roles"][0], json!({ "name": "DATA_PUBLIC", "category": "data_role" }));
    assert_eq!(body["assignable_roles"], json!(["APPADMIN", "SYSADMIN"]));
}

#[tokio::test]
async fn update_user_security_submits_changes() {
    let (status, body) = send(
        default_app(),
        "PUT",
        &format!("/api/realms/{REALM}/users/u-1/security"),
        Some(json!({
            "personnel_level": "INTERNAL",
            "department": "Audit",
            "add_roles": ["SYSADMIN"],
            "remove_roles": ["AUDITOR"],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "applied");
    assert_eq!(body["user_updated"], true);
    assert_eq!(body["roles_added"], json!(["SYSADMIN"]));
    assert_eq!(body["roles_removed"], json!(["AUDITOR"]));
    assert_eq!(body["data_roles"]["to_add"], json!(["DATA_INTERNAL"]));
}

#[tokio::test]
async fn adding_held_role_in_other_case_changes_nothing() {
    let (status, body) = send(
        default_app(),
        "PUT",
        &format!("/api/realms/{REALM}/users/u-1/security"),
        Some(json!({ "add_roles": ["auditor"] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "no_changes" }));
}

#[tokio::test]
async fn removing_role_in_other_case_removes_held_spelling() {
    let (status, body) = send(
        default_app(),
        "PUT",
        &format!("/api/realms/{REALM}/users/u-1/security"),
        Some(json!({ "remove_roles": ["Auditor"] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "applied");
    assert_eq!(body["roles_removed"], json!(["AUDITOR"]));
}

#[tokio::test]
async fn create_user_with_missing_realm_role_creates_nothing() {
    let repository = Arc::new(InMemoryRepository::default().with_role("AUDITOR"));
    let app = build_app_with_tokens(
        repository.clone(),
        None,
        operator(&["SYSADMIN"]),
        TestTokenManager::new(300, false),
    );

    let (status, _) = send(
        app,
        "POST",
        &format!("/api/realms/{REALM}/users"),
        Some(json!({
            "username": "new.user",
            "full_name": "New User",
            "personnel_level": "INTERNAL",
            "roles": ["AUDITOR"],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(repository.users.lock().unwrap().is_empty());
}

#[tokio::test]
async fn update_without_changes_reports_no_changes() {
    let (status, body) = send(
        default_app(),
        "PUT",
        &format!("/api/realms/{REALM}/users/u-1/security"),
        Some(json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "no_changes" }));
}

#[tokio::test]
async fn policy_violation_maps_to_conflict() {
    let repository = InMemoryRepository::default().with_user(
        "u-1",
        "jdoe",
        "NON_SECRET",
        &["APPADMIN"],
    );
    let app = build_app(repository, None, operator(&["SYSADMIN"]));

    let (status, body) = send(
        app,
        "PUT",
        &format!("/api/realms/{REALM}/users/u-1/security"),
        Some(json!({ "add_roles": ["SYSADMIN"] })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["role"], "SYSADMIN");
    assert_eq!(body["category"], "governance_role");
}

#[tokio::test]
async fn data_roles_cannot_be_added_by_hand() {
    let (status, _) = send(
        default_app(),
        "PUT",
        &format!("/api/realms/{REALM}/users/u-1/security"),
        Some(json!({ "add_roles": ["DATA_SECRET"] })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_level_is_bad_request() {
    let (status, body) = send(
        default_app(),
        "PUT",
        &format!("/api/realms/{REALM}/users/u-1/security"),
        Some(json!({ "personnel_level": "COSMIC" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("COSMIC"));
}

#[tokio::test]
async fn operator_without_manage_role_is_forbidden() {
    let repository =
        InMemoryRepository::default().with_user("u-1", "jdoe", "NON_SECRET", &["DATA_PUBLIC"]);
    let app = build_app(repository, None, operator(&["AUDITADMIN"]));

    let (status, _) = send(
        app,
        "PUT",
        &format!("/api/realms/{REALM}/users/u-1/security"),
        Some(json!({ "personnel_level": "SECRET" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signed_out_session_is_unauthorized() {
    let repository =
        InMemoryRepository::default().with_user("u-1", "jdoe", "NON_SECRET", &["DATA_PUBLIC"]);
    let app = build_app(repository, None, SessionContext::new("master".to_string()));

    let (status, _) = send(
        app,
        "GET",
        &format!("/api/realms/{REALM}/users/u-1/security"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn operator_signs_in_again_when_refresh_is_rejected() {
    let repository = InMemoryRepository::default()
        .with_user("u-1", "jdoe", "NON_SECRET", &["DATA_PUBLIC"])
        .with_user("op-admin", "admin", "TOP_SECRET", &["SYSADMIN"]);
    let mut ctx = SessionContext::new("master".to_string());
    ctx.load(
        SessionUser::new("op-admin".to_string(), "admin".to_string()).with_roles(["SYSADMIN"]),
        AuthToken::new("access-0".to_string(), 10, Some("refresh".to_string()), None),
    );
    let app = build_app_with_tokens(
        Arc::new(repository),
        None,
        ctx,
        TestTokenManager::new(10, true),
    );

    for _ in 0..3 {
        let (status, body) = send(
            app.clone(),
            "GET",
            &format!("/api/realms/{REALM}/users/u-1/security"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["personnel_level"], "NON_SECRET");
    }

    let (_, body) = send(app, "GET", "/api/session", None).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["username"], "admin");
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let (status, _) = send(
        default_app(),
        "GET",
        &format!("/api/realms/{REALM}/users/ghost/security"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_user_endpoint() {
    let (status, body) = send(
        default_app(),
        "POST",
        &format!("/api/realms/{REALM}/users"),
        Some(json!({
            "username": "new.user",
            "full_name": "New User",
            "personnel_level": "SECRET",
            "roles": ["AUDITOR"],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].as_str().unwrap().starts_with("user-"));
}

#[tokio::test]
async fn role_profile_endpoints() {
    let app = default_app();

    let (status, body) = send(
        app.clone(),
        "PUT",
        &format!("/api/realms/{REALM}/roles/AUDITOR/profile"),
        Some(json!({
            "data_security_level": "DATA_SECRET",
            "menu_ids": ["audit", "gone"],
            "menu_tree": [{ "id": "audit", "name": "Audit" }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["menu_ids"], json!(["audit"]));

    let (status, body) = send(
        app,
        "GET",
        &format!("/api/realms/{REALM}/roles/AUDITOR/profile"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "data_security_level": "DATA_SECRET", "menu_ids": ["audit"] })
    );
}

#[tokio::test]
async fn current_session_reports_admin_role() {
    let (status, body) = send(default_app(), "GET", "/api/session", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["admin_role"], "SYSADMIN");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (status, body) = send(default_app(), "GET", "/api/nothing-here", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("/api/nothing-here"));
}
