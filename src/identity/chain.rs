use std::time::Duration;

use chrono::{DateTime, Utc};
use oauth2::basic::BasicClient;
use oauth2::{ClientId, ClientSecret, Scope, TokenResponse, TokenUrl};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ProbeError;

/// Instance-metadata token endpoint, reachable from inside the platform only.
const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// A short-lived bearer credential for one downstream resource.
///
/// Owned by the call that produced it and fetched fresh on every use; the
/// secret is intentionally kept out of `Debug` output and logs.
pub struct AccessToken {
    secret: String,
    expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_on(&self) -> Option<DateTime<Utc>> {
        self.expires_on
    }

    /// Consume the token, yielding the secret for the driver's
    /// authentication attribute.
    pub fn into_secret(self) -> String {
        self.secret
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Identity settings captured once at startup.
#[derive(Clone)]
struct ChainSettings {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    identity_endpoint: Option<String>,
    identity_header: Option<String>,
}

/// Credential chain for the platform identity service.
///
/// Sources are tried in the platform's defined order: environment credential
/// (client-credentials grant), App-Service managed-identity endpoint, then
/// the instance-metadata endpoint. The first source that yields a token
/// wins; if every source fails the caller gets an authentication failure
/// carrying the per-source reasons for the server-side log.
#[derive(Clone)]
pub struct CredentialChain {
    http: reqwest::Client,
    settings: ChainSettings,
}

impl CredentialChain {
    pub fn new(cfg: &Config) -> Result<Self, ProbeError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProbeError::Internal(format!("identity HTTP client: {e}")))?;
        Ok(Self {
            http,
            settings: ChainSettings {
                tenant_id: cfg.azure_tenant_id.clone(),
                client_id: cfg.azure_client_id.clone(),
                client_secret: cfg.azure_client_secret.clone(),
                identity_endpoint: cfg.identity_endpoint.clone(),
                identity_header: cfg.identity_header.clone(),
            },
        })
    }

    /// Acquire a token for `scope` (e.g. `https://database.windows.net/.default`).
    pub async fn acquire_token(&self, scope: &str) -> Result<AccessToken, ProbeError> {
        let mut attempts: Vec<String> = Vec::new();

        match self.environment_credential(scope).await {
            Ok(Some(token)) => {
                debug!(source = "environment", expires_on = ?token.expires_on(), "access token acquired");
                return Ok(token);
            }
            Ok(None) => attempts.push("environment: not configured".to_string()),
            Err(e) => {
                warn!(source = "environment", error = %e, "credential source failed");
                attempts.push(format!("environment: {e}"));
            }
        }

        match self.app_service_credential(scope).await {
            Ok(Some(token)) => {
                debug!(source = "app-service", expires_on = ?token.expires_on(), "access token acquired");
                return Ok(token);
            }
            Ok(None) => attempts.push("app-service: not configured".to_string()),
            Err(e) => {
                warn!(source = "app-service", error = %e, "credential source failed");
                attempts.push(format!("app-service: {e}"));
            }
        }

        match self.imds_credential(scope).await {
            Ok(token) => {
                debug!(source = "imds", expires_on = ?token.expires_on(), "access token acquired");
                Ok(token)
            }
            Err(e) => {
                warn!(source = "imds", error = %e, "credential source failed");
                attempts.push(format!("imds: {e}"));
                Err(ProbeError::Authentication(format!(
                    "no credential source in the chain succeeded ({})",
                    attempts.join("; ")
                )))
            }
        }
    }

    /// Client-credentials grant against the tenant token endpoint. Returns
    /// `Ok(None)` when the environment triple is not fully configured.
    async fn environment_credential(&self, scope: &str) -> Result<Option<AccessToken>, String> {
        let (Some(tenant), Some(client_id), Some(secret)) = (
            self.settings.tenant_id.as_ref(),
            self.settings.client_id.as_ref(),
            self.settings.client_secret.as_ref(),
        ) else {
            return Ok(None);
        };

        let token_uri = TokenUrl::new(format!(
            "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token"
        ))
        .map_err(|e| format!("token endpoint URL: {e}"))?;

        let client = BasicClient::new(ClientId::new(client_id.clone()))
            .set_client_secret(ClientSecret::new(secret.clone()))
            .set_token_uri(token_uri);

        let response = client
            .exchange_client_credentials()
            .add_scope(Scope::new(scope.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| e.to_string())?;

        let expires_on = response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        Ok(Some(AccessToken {
            secret: response.access_token().secret().clone(),
            expires_on,
        }))
    }

    /// App-Service flavored managed identity, available when the platform
    /// injects `IDENTITY_ENDPOINT`/`IDENTITY_HEADER`.
    async fn app_service_credential(&self, scope: &str) -> Result<Option<AccessToken>, String> {
        let (Some(endpoint), Some(header)) = (
            self.settings.identity_endpoint.as_ref(),
            self.settings.identity_header.as_ref(),
        ) else {
            return Ok(None);
        };

        let payload: ManagedIdentityToken = self
            .http
            .get(endpoint.as_str())
            .query(&[
                ("api-version", APP_SERVICE_API_VERSION),
                ("resource", scope_to_resource(scope)),
            ])
            .header("X-IDENTITY-HEADER", header.as_str())
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        Ok(Some(payload.into_access_token()))
    }

    /// Instance-metadata managed identity, the last resort in the chain.
    async fn imds_credential(&self, scope: &str) -> Result<AccessToken, String> {
        let payload: ManagedIdentityToken = self
            .http
            .get(IMDS_TOKEN_URL)
            .query(&[
                ("api-version", IMDS_API_VERSION),
                ("resource", scope_to_resource(scope)),
            ])
            .header("Metadata", "true")
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        Ok(payload.into_access_token())
    }
}

/// Managed-identity endpoints take the bare resource URI, not a scope.
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

#[derive(Deserialize)]
struct ManagedIdentityToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
}

impl ManagedIdentityToken {
    fn into_access_token(self) -> AccessToken {
        let expires_on = self
            .expires_on
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        AccessToken {
            secret: self.access_token,
            expires_on,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_strips_default_suffix() {
        assert_eq!(
            scope_to_resource("https://database.windows.net/.default"),
            "https://database.windows.net"
        );
        assert_eq!(
            scope_to_resource("https://database.windows.net/"),
            "https://database.windows.net/"
        );
    }

    #[test]
    fn token_secret_is_redacted_in_debug() {
        let token = AccessToken {
            secret: "eyJ-very-secret".to_string(),
            expires_on: None,
        };
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn managed_identity_payload_parses_expiry() {
        let payload = ManagedIdentityToken {
            access_token: "tok".to_string(),
            expires_on: Some("1700000000".to_string()),
        };
        let token = payload.into_access_token();
        assert_eq!(token.secret(), "tok");
        assert_eq!(
            token.expires_on().map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
    }
}
