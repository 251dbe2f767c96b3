use crate::{
    application::ports::*,
    domain::errors::{AuthError, DomainError, DomainResult},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Refresh when fewer than this many seconds of validity remain
const REFRESH_MARGIN_SECS: i64 = 30;

/// Signs the console operator in and out of Keycloak
pub struct SessionService {
    token_manager: Arc<dyn TokenManager>,
    repository: Arc<dyn IdentityRepository>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl SessionService {
    pub fn new(
        token_manager: Arc<dyn TokenManager>,
        repository: Arc<dyn IdentityRepository>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            token_manager,
            repository,
            event_publisher,
        }
    }

    /// Acquire a token and load the operator with their realm roles
    #[instrument(skip(self, credentials), fields(realm = %realm, username = %credentials.username))]
    pub async fn sign_in(
        &self,
        credentials: &SignInCredentials,
        realm: &str,
    ) -> DomainResult<SessionContext> {
        let token = self.acquire(credentials).await?;
        self.resolve(credentials, realm, token).await
    }

    async fn acquire(&self, credentials: &SignInCredentials) -> DomainResult<AuthToken> {
        Ok(self.token_manager.acquire_token(credentials).await?)
    }

    /// Load the operator behind an issued token
    async fn resolve(
        &self,
        credentials: &SignInCredentials,
        realm: &str,
        token: AuthToken,
    ) -> DomainResult<SessionContext> {
        let username = if credentials.is_service_account() {
            format!("service-account-{}", credentials.client_id.to_lowercase())
        } else {
            credentials.username.trim().to_string()
        };

        let user = self
            .repository
            .find_user_by_username(realm, &username)
            .await?
            .ok_or_else(|| DomainError::UserNotFound {
                user_id: username.clone(),
                realm: realm.to_string(),
            })?;
        let user_id = user
            .id
            .as_ref()
            .map(|id| id.to_string())
            .ok_or_else(|| DomainError::ExternalService {
                service: "keycloak".to_string(),
                message: format!("User '{}' was returned without an id", username),
            })?;

        let roles = self
            .repository
            .get_user_realm_roles(realm, &user_id)
            .await?
            .realm_roles;
        let permissions: Vec<String> = token
            .scope
            .as_deref()
            .map(|scope| scope.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let mut ctx = SessionContext::new(realm.to_string());
        ctx.load(
            SessionUser::new(user_id.clone(), user.username.clone())
                .with_email(user.email.clone())
                .with_roles(roles)
                .with_permissions(permissions),
            token,
        );

        let event = DomainEvent::operator_signed_in(user_id, realm.to_string(), user.username)
            .with_metadata(
                EventMetadata::new().with_correlation_id(Uuid::new_v4().to_string()),
            );
        if let Err(e) = self.event_publisher.publish(event).await {
            warn!("Failed to publish sign-in event: {}", e);
        }

        let role_count = ctx.user.as_ref().map_or(0, |user| user.roles.len());
        info!("Operator signed in with {} realm roles", role_count);
        Ok(ctx)
    }

    /// Refresh the session token if it is close to expiry
    #[instrument(skip(self, ctx), fields(realm = %ctx.realm))]
    pub async fn refresh(&self, ctx: &mut SessionContext) -> DomainResult<()> {
        let (Some(user), Some(token)) = (ctx.user.clone(), ctx.token.as_ref()) else {
            return Err(AuthError::NotSignedIn.into());
        };

        if !token.is_expiring_soon(REFRESH_MARGIN_SECS) {
            return Ok(());
        }

        match self.token_manager.refresh_token(token).await {
            Ok(token) => {
                ctx.load(user, token);
                info!("Session token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!("Token refresh failed, clearing session: {}", e);
                ctx.clear();
                Err(e.into())
            }
        }
    }

    /// Revoke the refresh token and clear the session.
    ///
    /// The context is cleared even when revocation fails.
    #[instrument(skip(self, ctx), fields(realm = %ctx.realm))]
    pub async fn sign_out(&self, ctx: &mut SessionContext) {
        if let Some(token) = ctx.token.as_ref() {
            if token.refresh_token.is_some() {
                if let Err(e) = self.token_manager.revoke_token(token).await {
                    warn!("Token revocation failed: {}", e);
                }
            }
        }

        if let Some(user) = ctx.user.as_ref() {
            let event = DomainEvent::operator_signed_out(
                user.id.clone(),
                ctx.realm.clone(),
                user.username.clone(),
            );
            if let Err(e) = self.event_publisher.publish(event).await {
                warn!("Failed to publish sign-out event: {}", e);
            }
        }

        ctx.clear();
        info!("Operator signed out");
    }
}

/// The console's own signed-in operator, kept valid for every request.
///
/// Tokens are refreshed shortly before expiry. When the refresh token is
/// rejected or nobody is signed in, the configured credentials sign in
/// again. The shared context also supplies the bearer token for admin calls.
pub struct OperatorSession {
    sessions: SessionService,
    credentials: SignInCredentials,
    context: SharedSession,
    renewal: Mutex<()>,
}

impl OperatorSession {
    pub fn new(
        sessions: SessionService,
        credentials: SignInCredentials,
        context: SharedSession,
    ) -> Self {
        Self {
            sessions,
            credentials,
            context,
            renewal: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &SharedSession {
        &self.context
    }

    /// Signed-in operator context, renewed when needed
    pub async fn current(&self) -> DomainResult<SessionContext> {
        if let Some(ctx) = self.fresh().await {
            return Ok(ctx);
        }

        let _renewal = self.renewal.lock().await;
        if let Some(ctx) = self.fresh().await {
            return Ok(ctx);
        }

        {
            let mut ctx = self.context.write().await;
            if ctx.user.is_some() {
                match self.sessions.refresh(&mut ctx).await {
                    Ok(()) if ctx.is_authenticated() => return Ok(ctx.clone()),
                    Ok(()) => {}
                    Err(e) => warn!("Operator session lost, signing in again: {}", e),
                }
            }
        }

        self.establish().await
    }

    pub async fn sign_out(&self) {
        let _renewal = self.renewal.lock().await;
        let mut ctx = self.context.write().await;
        self.sessions.sign_out(&mut ctx).await;
    }

    async fn fresh(&self) -> Option<SessionContext> {
        let ctx = self.context.read().await;
        let fresh = ctx.is_authenticated()
            && ctx
                .token
                .as_ref()
                .is_some_and(|token| !token.is_expiring_soon(REFRESH_MARGIN_SECS));
        fresh.then(|| ctx.clone())
    }

    // Resolving the operator goes through the admin client, which reads the
    // context, so no lock is held across it.
    async fn establish(&self) -> DomainResult<SessionContext> {
        let realm = self.context.read().await.realm.clone();

        let token = match self.sessions.acquire(&self.credentials).await {
            Ok(token) => token,
            Err(e) => {
                self.context.write().await.clear();
                return Err(e);
            }
        };
        self.context.write().await.adopt_token(token.clone());

        match self.sessions.resolve(&self.credentials, &realm, token).await {
            Ok(ctx) => {
                *self.context.write().await = ctx.clone();
                Ok(ctx)
            }
            Err(e) => {
                self.context.write().await.clear();
                Err(match e {
                    DomainError::UserNotFound { user_id, realm } => {
                        DomainError::AuthenticationFailed {
                            reason: format!(
                                "Operator '{}' does not exist in realm {}",
                                user_id, realm
                            ),
                        }
                    }
                    other => other,
                })
            }
        }
    }
}
