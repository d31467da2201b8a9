//! Service-account sign-in: a signed JWT assertion exchanged for a bearer
//! token at the key's `token_uri`, cached until shortly before it expires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use site_logging::site_debug;
use tokio::sync::Mutex;

use crate::{FailureKind, FetchError};

/// Read-only access is all the synchronizer needs.
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before the server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a downloaded service-account key file that sign-in uses.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn encoding_key(&self) -> Result<EncodingKey, jsonwebtoken::errors::Error> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes())
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Mints bearer tokens for one service account. Clones share the cache.
#[derive(Clone)]
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    encoding_key: Arc<EncodingKey>,
    cache: Arc<Mutex<Option<CachedToken>>>,
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey) -> Result<Self, FetchError> {
        let encoding_key = key
            .encoding_key()
            .map_err(|err| FetchError::new(FailureKind::Unauthorized, format!("invalid private key: {err}")))?;
        Ok(Self {
            key,
            encoding_key: Arc::new(encoding_key),
            cache: Arc::new(Mutex::new(None)),
        })
    }

    /// A valid bearer token, exchanging a fresh assertion only when the
    /// cached one is missing or about to expire.
    pub async fn token(&self, client: &reqwest::Client) -> Result<String, FetchError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref().filter(|c| Instant::now() < c.refresh_at) {
            return Ok(cached.token.clone());
        }

        let response = self.exchange(client).await?;
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);
        site_debug!(
            "Obtained access token for {} (valid {}s)",
            self.key.client_email,
            response.expires_in
        );
        *cache = Some(CachedToken {
            token: response.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(response.access_token)
    }

    fn assertion(&self) -> Result<String, FetchError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: DRIVE_READONLY_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|err| FetchError::new(FailureKind::Unauthorized, format!("cannot sign assertion: {err}")))
    }

    async fn exchange(&self, client: &reqwest::Client) -> Result<TokenResponse, FetchError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT)
            .append_pair("assertion", &self.assertion()?)
            .finish();

        let response = client
            .post(self.key.token_uri.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(crate::source::map_reqwest_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(crate::source::map_reqwest_error)?;
        if status.is_client_error() {
            return Err(FetchError::new(
                FailureKind::Unauthorized,
                format!("token exchange rejected: {status}"),
            ));
        }
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("token exchange failed: {status}"),
            ));
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| FetchError::new(FailureKind::Decode, format!("token response: {err}")))
    }
}
