use std::{fmt, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{
    header::AUTHORIZATION,
    multipart::{Form, Part},
    Client, Method,
};
use serde_json::Value;
use shared::error::ApiError;
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::ClientSettings,
    error::{CacheError, CacheResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    fn as_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        })
    }
}

/// One file part of a multipart upload.
#[derive(Clone, PartialEq)]
pub struct FileUpload {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Reads `path` into a part named `field`, keeping the file's own name.
    pub async fn read(field: impl Into<String>, path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            CacheError::validation(format!("cannot read '{}': {err}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(field, file_name, bytes))
    }
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Transport-neutral request: a path relative to the API base URL, query
/// pairs and an optional JSON body. A request carrying uploads is sent as
/// multipart form data, with the body's top-level members as text fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub uploads: Vec<FileUpload>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            uploads: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_uploads(mut self, uploads: impl IntoIterator<Item = FileUpload>) -> Self {
        self.uploads.extend(uploads);
        self
    }

    pub fn is_multipart(&self) -> bool {
        !self.uploads.is_empty()
    }
}

fn multipart_form(body: Option<&Value>, uploads: &[FileUpload]) -> CacheResult<Form> {
    let mut form = Form::new();
    match body {
        None | Some(Value::Null) => {}
        Some(Value::Object(fields)) => {
            for (name, value) in fields {
                let text = match value {
                    Value::Null => continue,
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                form = form.text(name.clone(), text);
            }
        }
        Some(_) => {
            return Err(CacheError::validation(
                "multipart requests need an object body",
            ))
        }
    }
    for upload in uploads {
        let part = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
        form = form.part(upload.field.clone(), part);
    }
    Ok(form)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// The HTTP collaborator. Implementations return `Err` for network failures
/// and non-2xx responses; the cache never retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> CacheResult<ApiResponse>;
}

pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

pub struct StaticCredentials(pub Option<String>);

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Token holder the login flow can update while the client is running.
#[derive(Default)]
pub struct SharedCredentials {
    token: RwLock<Option<String>>,
}

impl SharedCredentials {
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}

impl CredentialProvider for SharedCredentials {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }
}

pub struct HttpTransport {
    http: Client,
    base_url: Url,
    auth_scheme: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpTransport {
    pub fn new(
        settings: &ClientSettings,
        credentials: Arc<dyn CredentialProvider>,
    ) -> CacheResult<Self> {
        let base_url = Url::parse(&settings.api_base_url).map_err(|err| {
            CacheError::validation(format!(
                "invalid api base url '{}': {err}",
                settings.api_base_url
            ))
        })?;
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|err| CacheError::transport(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base_url,
            auth_scheme: settings.auth_scheme.clone(),
            credentials,
        })
    }

    fn url_for(&self, path: &str) -> CacheResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| CacheError::validation(format!("invalid request path '{path}': {err}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> CacheResult<ApiResponse> {
        let url = self.url_for(&request.path)?;
        debug!(method = %request.method, %url, "sending api request");

        let mut builder = self
            .http
            .request(request.method.as_reqwest(), url)
            .query(&request.query);
        if let Some(token) = self.credentials.token() {
            builder = builder.header(AUTHORIZATION, format!("{} {token}", self.auth_scheme));
        }
        if request.is_multipart() {
            builder = builder.multipart(multipart_form(request.body.as_ref(), &request.uploads)?);
        } else if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| {
            warn!(path = %request.path, "api request failed: {err}");
            CacheError::transport(err.to_string())
        })?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| CacheError::transport(format!("failed to read response body: {err}")))?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        if !(200..300).contains(&status) {
            let error = ApiError::from_response(status, &body);
            warn!(
                path = %request.path,
                status,
                code = ?error.code,
                "api request rejected: {}",
                error.message
            );
            return Err(CacheError::from_api(status, error));
        }

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
