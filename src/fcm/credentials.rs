use std::sync::{Mutex, PoisonError};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::telemetry::spawn_blocking_with_tracing;

const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// A cached token is refreshed once it is this close to expiring.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("Service account credentials are not usable.")]
    Config(#[source] anyhow::Error),
    #[error("The token exchange did not yield an access token.")]
    Auth(#[source] anyhow::Error),
    #[error("Failed to reach the token endpoint.")]
    Transport(#[from] reqwest::Error),
}

/// Short-lived OAuth2 bearer token scoped to Firebase messaging.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: SecretString,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

#[derive(Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    sub: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

struct CachedToken {
    token: AccessToken,
    expires_at: DateTime<Utc>,
}

/// Exchanges the configured service account for bearer tokens.
pub struct CredentialProvider {
    service_account_json: Option<SecretString>,
    http_client: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl CredentialProvider {
    pub fn new(service_account_json: Option<SecretString>, http_client: reqwest::Client) -> Self {
        Self {
            service_account_json,
            http_client,
            cache: Mutex::new(None),
        }
    }

    #[tracing::instrument(name = "Obtain an FCM access token", skip(self))]
    pub async fn access_token(&self) -> Result<AccessToken, CredentialError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let key = self.service_account()?;
        let token_uri = key.token_uri.clone();
        let issued_at = Utc::now();

        // RSA signing is CPU bound, keep it off the async executor
        let assertion = spawn_blocking_with_tracing(move || sign_assertion(&key, issued_at))
            .await
            .context("Failed to spawn blocking task.")
            .map_err(CredentialError::Config)??;

        let response = self
            .http_client
            .post(&token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CredentialError::Auth(anyhow!(
                "Token endpoint answered {}: {}",
                status,
                body
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .context("Token endpoint returned an unexpected body.")
            .map_err(CredentialError::Auth)?;
        let token = parsed
            .access_token
            .filter(|token| !token.is_empty())
            .map(AccessToken)
            .ok_or_else(|| {
                CredentialError::Auth(anyhow!("Token endpoint response has no access_token."))
            })?;

        let expires_in = parsed.expires_in.unwrap_or(3600);
        match Duration::try_seconds(expires_in).and_then(|ttl| Utc::now().checked_add_signed(ttl)) {
            Some(expires_at) => {
                *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedToken {
                    token: token.clone(),
                    expires_at,
                });
            }
            None => tracing::warn!(expires_in, "Token lifetime is out of range, not caching it."),
        }

        Ok(token)
    }

    fn cached_token(&self) -> Option<AccessToken> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);

        cache
            .as_ref()
            .filter(|cached| {
                cached.expires_at - Duration::seconds(EXPIRY_MARGIN_SECONDS) > Utc::now()
            })
            .map(|cached| cached.token.clone())
    }

    fn service_account(&self) -> Result<ServiceAccountKey, CredentialError> {
        let raw = self
            .service_account_json
            .as_ref()
            .map(|json| json.expose_secret())
            .filter(|json| !json.trim().is_empty())
            .ok_or_else(|| CredentialError::Config(anyhow!("Service account JSON not set.")))?;

        serde_json::from_str(raw)
            .context("Service account JSON is not a valid key file.")
            .map_err(CredentialError::Config)
    }
}

fn sign_assertion(
    key: &ServiceAccountKey,
    issued_at: DateTime<Utc>,
) -> Result<String, CredentialError> {
    let claims = AssertionClaims {
        iss: key.client_email.clone(),
        sub: key.client_email.clone(),
        scope: MESSAGING_SCOPE.to_owned(),
        aud: key.token_uri.clone(),
        iat: issued_at.timestamp(),
        exp: (issued_at + Duration::hours(1)).timestamp(),
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
        .context("Failed to parse the service account private key.")
        .map_err(CredentialError::Config)?;

    encode(&header, &claims, &encoding_key)
        .context("Failed to sign the token assertion.")
        .map_err(CredentialError::Config)
}
