use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use sitesync_core::RemoteDocument;
use thiserror::Error;
use url::Url;

use crate::auth::{ServiceAccountAuth, ServiceAccountKey};
use crate::config::DriveOptions;
use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, modifiedTime)";
const LIST_PAGE_SIZE: &str = "1000";

/// Export representations requested from the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
    PlainText,
}

impl ExportFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Html => "text/html",
            ExportFormat::PlainText => "text/plain",
        }
    }
}

/// Folder of documents the synchronizer mirrors.
#[async_trait::async_trait]
pub trait RemoteSource: Send + Sync {
    /// Every non-trashed document in the configured folder.
    async fn list_documents(&self) -> Result<Vec<RemoteDocument>, FetchError>;

    async fn export(&self, id: &str, format: ExportFormat) -> Result<FetchOutput, FetchError>;

    /// Downloads an image referenced by an exported document.
    async fn fetch_attachment(&self, url: &str) -> Result<FetchOutput, FetchError>;

    /// Human-facing link to the source document, used by placeholder pages.
    fn document_link(&self, id: &str) -> String;
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("cannot read credentials file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid credentials file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid service account private key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
    #[error("credentials file holds no service account key, access_token or api_key")]
    Missing,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// OAuth bearer token, sent only to the API host.
    AccessToken(String),
    /// Key for publicly shared folders, sent as the `key` query parameter.
    ApiKey(String),
    /// Downloaded service-account key; bearer tokens are minted from it.
    ServiceAccount(ServiceAccountKey),
}

// Secrets stay out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::AccessToken(_) => f.write_str("AccessToken(..)"),
            Credentials::ApiKey(_) => f.write_str("ApiKey(..)"),
            Credentials::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
        }
    }
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    access_token: Option<String>,
    api_key: Option<String>,
}

impl Credentials {
    /// Service-account key files (`"type": "service_account"`) win; otherwise
    /// an `access_token`, then an `api_key`.
    pub fn from_json(text: &str) -> Result<Self, CredentialsError> {
        let file: CredentialsFile = serde_json::from_str(text)?;
        if file.kind.as_deref() == Some("service_account") {
            let key: ServiceAccountKey = serde_json::from_str(text)?;
            key.encoding_key()?;
            return Ok(Credentials::ServiceAccount(key));
        }
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        if let Some(token) = non_empty(file.access_token) {
            return Ok(Credentials::AccessToken(token.trim().to_string()));
        }
        if let Some(key) = non_empty(file.api_key) {
            return Ok(Credentials::ApiKey(key.trim().to_string()));
        }
        Err(CredentialsError::Missing)
    }

    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let text = fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

#[derive(Debug, Clone)]
pub struct DriveSettings {
    pub api_base: String,
    pub folder_id: String,
    pub credentials: Credentials,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl DriveSettings {
    pub fn from_options(options: &DriveOptions, folder_id: String, credentials: Credentials) -> Self {
        Self {
            api_base: options.api_base.clone(),
            folder_id,
            credentials,
            connect_timeout: Duration::from_secs(options.connect_timeout_secs),
            request_timeout: Duration::from_secs(options.request_timeout_secs),
            max_bytes: options.max_export_bytes,
        }
    }
}

#[derive(Deserialize)]
struct FileListPage {
    #[serde(default)]
    files: Vec<RemoteDocument>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// Google Drive v3 over plain REST calls.
#[derive(Debug, Clone)]
pub struct DriveSource {
    settings: DriveSettings,
    api: Url,
    client: reqwest::Client,
    auth: Option<ServiceAccountAuth>,
}

impl DriveSource {
    pub fn new(settings: DriveSettings) -> Result<Self, FetchError> {
        let mut base = settings.api_base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let api = Url::parse(&base)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        let auth = match &settings.credentials {
            Credentials::ServiceAccount(key) => Some(ServiceAccountAuth::new(key.clone())?),
            _ => None,
        };
        Ok(Self {
            settings,
            api,
            client,
            auth,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.api.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::new(FailureKind::InvalidUrl, "api base cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        if let Credentials::ApiKey(key) = &self.settings.credentials {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    fn is_api_host(&self, url: &Url) -> bool {
        url.host_str() == self.api.host_str() && url.port_or_known_default() == self.api.port_or_known_default()
    }

    async fn bearer_token(&self) -> Result<Option<String>, FetchError> {
        if let Some(auth) = &self.auth {
            return auth.token(&self.client).await.map(Some);
        }
        match &self.settings.credentials {
            Credentials::AccessToken(token) => Ok(Some(token.clone())),
            _ => Ok(None),
        }
    }

    async fn get(&self, url: Url) -> Result<FetchOutput, FetchError> {
        let mut request = self.client.get(url.clone());
        if self.is_api_host(&url) {
            if let Some(token) = self.bearer_token().await? {
                request = request.bearer_auth(token);
            }
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &body));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let metadata = FetchMetadata {
            url: final_url,
            content_type,
            byte_len: bytes.len() as u64,
        };
        Ok(FetchOutput { bytes, metadata })
    }
}

#[async_trait::async_trait]
impl RemoteSource for DriveSource {
    async fn list_documents(&self) -> Result<Vec<RemoteDocument>, FetchError> {
        let query = format!(
            "'{}' in parents and trashed = false and mimeType = '{DOCUMENT_MIME}'",
            self.settings.folder_id.replace('\'', "\\'")
        );
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.endpoint(&["files"])?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs
                    .append_pair("q", &query)
                    .append_pair("fields", LIST_FIELDS)
                    .append_pair("pageSize", LIST_PAGE_SIZE);
                if let Some(token) = &page_token {
                    pairs.append_pair("pageToken", token);
                }
            }

            let output = self.get(url).await?;
            let page: FileListPage = serde_json::from_slice(&output.bytes)
                .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
            documents.extend(page.files);

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(documents)
    }

    async fn export(&self, id: &str, format: ExportFormat) -> Result<FetchOutput, FetchError> {
        let mut url = self.endpoint(&["files", id, "export"])?;
        url.query_pairs_mut().append_pair("mimeType", format.mime());
        self.get(url).await
    }

    async fn fetch_attachment(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let parsed = Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::new(
                FailureKind::InvalidUrl,
                format!("unsupported scheme {}", parsed.scheme()),
            ));
        }
        self.get(parsed).await
    }

    fn document_link(&self, id: &str) -> String {
        format!("https://docs.google.com/document/d/{id}/edit")
    }
}

fn map_status_error(status: StatusCode, body: &str) -> FetchError {
    let message = status.to_string();
    match status {
        StatusCode::UNAUTHORIZED => FetchError::new(FailureKind::Unauthorized, message),
        StatusCode::FORBIDDEN if body.contains("exportSizeLimitExceeded") => {
            FetchError::new(FailureKind::QuotaExceeded, message)
        }
        _ => FetchError::new(FailureKind::HttpStatus(status.as_u16()), message),
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return FetchError::new(FailureKind::Decode, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
