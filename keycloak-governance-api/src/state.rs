use crate::{config::Config, error::AppResult};
use keycloak_governance_domain::{
    application::{
        ports::{ConfigurationPort, DomainEvent, SessionContext, SignInCredentials},
        services::{OperatorSession, SecurityAttributeService, SessionService},
    },
    domain::errors::DomainResult,
    infrastructure::adapters::{KeycloakRestAdapter, KeycloakTokenManager, MemoryEventPublisher},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub security_service: Arc<SecurityAttributeService>,
    pub operator: Arc<OperatorSession>,
}

impl AppState {
    /// Connect to Keycloak and sign the configured operator in
    pub async fn new(config: &Config) -> DomainResult<Self> {
        let keycloak = config.settings.get_keycloak_config();
        let client = config.settings.get_http_config().build_client()?;

        let context = SessionContext::shared(keycloak.admin_realm.clone());
        let repository = Arc::new(KeycloakRestAdapter::with_session(
            keycloak,
            context.clone(),
            client.clone(),
        ));
        let token_manager = Arc::new(KeycloakTokenManager::new_with_client(
            keycloak.url.clone(),
            keycloak.admin_realm.clone(),
            keycloak.admin_client_id.clone(),
            client,
        ));

        let (event_publisher, receiver) = MemoryEventPublisher::new();
        tokio::spawn(forward_audit_events(receiver));
        let event_publisher = Arc::new(event_publisher);

        let security_service = SecurityAttributeService::new(
            repository.clone(),
            event_publisher.clone(),
            config.settings.get_governance_config(),
        );
        let session_service = SessionService::new(token_manager, repository, event_publisher);

        let credentials = SignInCredentials::password(
            keycloak.admin_username.clone(),
            keycloak.admin_password.clone(),
            keycloak.admin_realm.clone(),
            keycloak.admin_client_id.clone(),
        );
        let operator = OperatorSession::new(session_service, credentials, context);
        operator.current().await?;

        Ok(Self::from_parts(config.clone(), security_service, operator))
    }

    pub fn from_parts(
        config: Config,
        security_service: SecurityAttributeService,
        operator: OperatorSession,
    ) -> Self {
        Self {
            config,
            security_service: Arc::new(security_service),
            operator: Arc::new(operator),
        }
    }

    /// Current operator session, renewed first when its token is about to expire
    pub async fn operator_session(&self) -> AppResult<SessionContext> {
        Ok(self.operator.current().await?)
    }

    /// Sign the operator out; the session is cleared even if Keycloak is unreachable
    pub async fn shutdown(&self) {
        self.operator.sign_out().await;
    }
}

async fn forward_audit_events(mut receiver: mpsc::UnboundedReceiver<DomainEvent>) {
    while let Some(event) = receiver.recv().await {
        info!(
            target: "audit",
            event_id = %event.id,
            realm = %event.realm,
            aggregate = %event.aggregate_id,
            "{}",
            event.event_type
        );
    }
}
