use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::application::ports::auth::*;
use crate::domain::errors::*;

/// Raw token response from Keycloak
#[derive(Debug, Clone, Deserialize)]
struct RawTokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
    scope: Option<String>,
    token_type: Option<String>,
}

impl From<RawTokenResponse> for AuthToken {
    fn from(raw: RawTokenResponse) -> Self {
        let mut token = AuthToken::new(
            raw.access_token,
            raw.expires_in,
            raw.refresh_token,
            raw.token_type,
        );
        token.scope = raw.scope;
        token
    }
}

/// Token manager talking to the Keycloak OpenID Connect endpoints.
///
/// Refresh and logout go to the realm and client the manager was built for.
pub struct KeycloakTokenManager {
    keycloak_url: String,
    realm: String,
    client_id: String,
    client: reqwest::Client,
}

impl KeycloakTokenManager {
    pub fn new(keycloak_url: String, realm: String, client_id: String) -> Self {
        Self::new_with_client(keycloak_url, realm, client_id, reqwest::Client::new())
    }

    pub fn new_with_client(
        keycloak_url: String,
        realm: String,
        client_id: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            keycloak_url: keycloak_url.trim_end_matches('/').to_string(),
            realm,
            client_id,
            client,
        }
    }

    fn endpoint(&self, realm: &str, path: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/{}",
            self.keycloak_url, realm, path
        )
    }

    async fn post_for_token(
        &self,
        url: String,
        form: &[(&str, &str)],
        fail: fn(String) -> AuthError,
    ) -> Result<AuthToken, AuthError> {
        let response = self
            .client
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| fail(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP error {status}: {error_text}")));
        }

        let raw_token: RawTokenResponse = response
            .json()
            .await
            .map_err(|e| fail(format!("Failed to parse token response: {e}")))?;

        Ok(raw_token.into())
    }
}

#[async_trait]
impl TokenManager for KeycloakTokenManager {
    async fn acquire_token(
        &self,
        credentials: &SignInCredentials,
    ) -> Result<AuthToken, AuthError> {
        let form_data = match credentials.grant_type.as_str() {
            "client_credentials" => vec![
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.password.as_str()),
                ("grant_type", "client_credentials"),
            ],
            "password" => vec![
                ("client_id", credentials.client_id.as_str()),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
                ("grant_type", "password"),
            ],
            _ => {
                return Err(AuthError::TokenAcquisitionFailed {
                    reason: format!("Unsupported grant type: {}", credentials.grant_type),
                });
            }
        };

        debug!(
            "Requesting {} token for {} in realm {}",
            credentials.grant_type, credentials.username, credentials.realm
        );

        self.post_for_token(
            self.endpoint(&credentials.realm, "token"),
            &form_data,
            |reason| AuthError::TokenAcquisitionFailed { reason },
        )
        .await
    }

    async fn refresh_token(&self, token: &AuthToken) -> Result<AuthToken, AuthError> {
        let refresh_token =
            token
                .refresh_token
                .as_deref()
                .ok_or_else(|| AuthError::TokenRefreshFailed {
                    reason: "No refresh token available".to_string(),
                })?;

        self.post_for_token(
            self.endpoint(&self.realm, "token"),
            &[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
            |reason| AuthError::TokenRefreshFailed { reason },
        )
        .await
    }

    async fn revoke_token(&self, token: &AuthToken) -> Result<(), AuthError> {
        let Some(refresh_token) = token.refresh_token.as_deref() else {
            warn!("Token has no refresh token; nothing to revoke");
            return Ok(());
        };

        let response = self
            .client
            .post(self.endpoint(&self.realm, "logout"))
            .bearer_auth(&token.access_token)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AuthError::TokenRevocationFailed {
                reason: format!("HTTP request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(AuthError::TokenRevocationFailed {
                reason: format!("HTTP error: {}", response.status()),
            });
        }

        Ok(())
    }
}
