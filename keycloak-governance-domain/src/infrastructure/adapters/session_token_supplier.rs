use async_trait::async_trait;
use keycloak::{KeycloakError, KeycloakTokenSupplier};

use crate::application::ports::auth::SharedSession;

/// Supplies the operator session's current access token to the admin client
#[derive(Clone)]
pub struct SessionTokenSupplier {
    session: SharedSession,
}

impl SessionTokenSupplier {
    pub fn new(session: SharedSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl KeycloakTokenSupplier for SessionTokenSupplier {
    async fn get(&self, _url: &str) -> Result<String, KeycloakError> {
        let ctx = self.session.read().await;
        ctx.access_token()
            .map(str::to_string)
            .ok_or_else(|| KeycloakError::HttpFailure {
                status: 401,
                body: None,
                text: "operator session has no valid access token".to_string(),
            })
    }
}
