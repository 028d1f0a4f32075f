//! HTTP Client Adapter
//!
//! Uniform request/response interface over `reqwest` for the contract
//! scenarios. Non-2xx statuses are ordinary results: 400, 404 and 405 are
//! asserted on as first-class outcomes, so they never become errors here.
//! Only transport failures (timeout, refused connection, broken stream)
//! surface as [`TransportError`], after a bounded number of retries for the
//! retryable ones.

pub mod retry;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::HarnessConfig;
use crate::errors::{HarnessError, Result, TransportError};
use crate::observability::telemetry::safe_log;
pub use retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Head => reqwest::Method::HEAD,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content type of a response, classified from its header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Multipart,
    Text,
    Html,
    Binary,
    Custom(String),
}

impl ContentType {
    pub fn from_header(header: &str) -> Self {
        let lower = header.to_lowercase();
        if lower.contains("application/json") || lower.contains("+json") {
            Self::Json
        } else if lower.contains("multipart/form-data") {
            Self::Multipart
        } else if lower.contains("text/plain") {
            Self::Text
        } else if lower.contains("text/html") {
            Self::Html
        } else if lower.contains("octet-stream") {
            Self::Binary
        } else {
            Self::Custom(header.to_string())
        }
    }

    pub fn as_mime(&self) -> &str {
        match self {
            Self::Json => "application/json",
            Self::Multipart => "multipart/form-data",
            Self::Text => "text/plain",
            Self::Html => "text/html",
            Self::Binary => "application/octet-stream",
            Self::Custom(s) => s,
        }
    }
}

/// A file sent as one named field of a `multipart/form-data` body
#[derive(Debug, Clone)]
pub struct MultipartPayload {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Arc<Vec<u8>>,
}

impl MultipartPayload {
    pub fn new(field: &str, file_name: &str, mime: &str, bytes: Vec<u8>) -> Self {
        Self {
            field: field.to_string(),
            file_name: file_name.to_string(),
            mime: mime.to_string(),
            bytes: Arc::new(bytes),
        }
    }

    /// A form can only be sent once, so every attempt builds its own.
    fn to_form(&self) -> std::result::Result<reqwest::multipart::Form, reqwest::Error> {
        let part = reqwest::multipart::Part::bytes(self.bytes.as_ref().clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime)?;
        Ok(reqwest::multipart::Form::new().part(self.field.clone(), part))
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartPayload),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Raw(String),
}

/// Response as observed by the harness
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// `METHOD target` of the request that produced this response
    pub request_line: String,
    pub status: u16,
    pub content_type: Option<ContentType>,
    pub body: ResponseBody,
    pub elapsed_ms: u64,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            ResponseBody::Raw(_) => None,
        }
    }

    /// Get a JSON value by dot path (`fotoPerfilUrl`, `errors.nombres`, `0.id`).
    /// An empty path or `$` is the document root.
    pub fn json_path(&self, path: &str) -> Option<&Value> {
        let mut current = self.json()?;
        if path.is_empty() || path == "$" {
            return Some(current);
        }
        for part in path.split('.') {
            current = match part.parse::<usize>() {
                Ok(idx) if current.is_array() => current.get(idx)?,
                _ => current.get(part)?,
            };
        }
        Some(current)
    }

    /// Body rendered for reports, truncated and redacted.
    pub fn body_excerpt(&self) -> String {
        const LIMIT: usize = 240;
        let text = match &self.body {
            ResponseBody::Json(v) => v.to_string(),
            ResponseBody::Raw(s) => s.clone(),
        };
        let mut excerpt: String = text.chars().take(LIMIT).collect();
        if text.chars().count() > LIMIT {
            excerpt.push_str("...");
        }
        safe_log(&excerpt)
    }
}

/// One request/response exchange in a scenario transcript
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRecord {
    pub method: HttpMethod,
    pub target: String,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    pub attempts: u32,
    pub error: Option<String>,
}

impl std::fmt::Display for ExchangeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status, &self.error) {
            (Some(status), _) => write!(
                f,
                "{} {} -> {} ({}ms)",
                self.method, self.target, status, self.elapsed_ms
            ),
            (None, Some(err)) => write!(f, "{} {} -> error: {}", self.method, self.target, err),
            (None, None) => write!(f, "{} {} -> no response", self.method, self.target),
        }
    }
}

/// HTTP client bound to one deployment.
///
/// Clones share the connection pool and the transcript; [`ContractClient::fork`]
/// shares the pool but starts an empty transcript, one per scenario.
#[derive(Clone)]
pub struct ContractClient {
    http: Client,
    base_url: Arc<str>,
    retry: RetryPolicy,
    timeout: Duration,
    transcript: Arc<Mutex<Vec<ExchangeRecord>>>,
}

impl ContractClient {
    /// Build a client from a validated configuration.
    pub fn new(config: &HarnessConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: Arc::from(config.base_url()),
            retry: RetryPolicy::from_settings(&config.retry),
            timeout: config.request_timeout(),
            transcript: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Same connection pool and settings, fresh transcript.
    pub fn fork(&self) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            retry: self.retry.clone(),
            timeout: self.timeout,
            transcript: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn transcript(&self) -> Vec<ExchangeRecord> {
        self.transcript
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(HttpMethod::Get, path, RequestBody::Empty).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(HttpMethod::Delete, path, RequestBody::Empty).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> Result<ApiResponse> {
        self.request(HttpMethod::Post, path, RequestBody::Json(body))
            .await
    }

    pub async fn put_json(&self, path: &str, body: Value) -> Result<ApiResponse> {
        self.request(HttpMethod::Put, path, RequestBody::Json(body))
            .await
    }

    pub async fn post_multipart(&self, path: &str, payload: MultipartPayload) -> Result<ApiResponse> {
        self.request(HttpMethod::Post, path, RequestBody::Multipart(payload))
            .await
    }

    /// HEAD against an absolute URL outside the service (e.g. object storage).
    pub async fn head_absolute(&self, url: &str) -> Result<ApiResponse> {
        self.execute(HttpMethod::Head, url, url, RequestBody::Empty)
            .await
    }

    /// Send `method path` relative to the base URL.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: RequestBody,
    ) -> Result<ApiResponse> {
        let url = self.url_for(path);
        self.execute(method, &url, path, body).await
    }

    async fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        target: &str,
        body: RequestBody,
    ) -> Result<ApiResponse> {
        let request_line = format!("{} {}", method, target);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let start = Instant::now();

            let mut builder = self.http.request(method.to_reqwest(), url);
            builder = match &body {
                RequestBody::Empty => builder,
                RequestBody::Json(value) => builder.json(value),
                RequestBody::Multipart(payload) => {
                    let form = payload.to_form().map_err(|e| {
                        HarnessError::Internal(format!("invalid multipart payload: {}", e))
                    })?;
                    builder.multipart(form)
                }
            };

            match builder.send().await {
                Ok(response) => {
                    let result = self
                        .read_response(response, &request_line, start, attempt)
                        .await;
                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    match &result {
                        Ok(resp) => {
                            debug!(
                                method = method.as_str(),
                                target = safe_log(target).as_str(),
                                status = resp.status,
                                elapsed_ms = resp.elapsed_ms,
                                "HTTP exchange"
                            );
                            self.record(method, target, Some(resp.status), elapsed_ms, attempt, None);
                        }
                        Err(e) => {
                            self.record(method, target, None, elapsed_ms, attempt, Some(e.to_string()));
                        }
                    }
                    return result.map_err(HarnessError::from);
                }
                Err(e) => {
                    let err = self.classify(&request_line, &e, attempt);
                    if err.is_retryable() && attempt <= self.retry.max_retries {
                        let delay = self.retry.next_delay(attempt);
                        warn!(
                            "Transport error on {} (retry {}/{} in {}ms): {}",
                            safe_log(&request_line),
                            attempt,
                            self.retry.max_retries,
                            delay.as_millis(),
                            safe_log(&e.to_string())
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    self.record(method, target, None, elapsed_ms, attempt, Some(err.to_string()));
                    return Err(err.into());
                }
            }
        }
    }

    async fn read_response(
        &self,
        response: reqwest::Response,
        request_line: &str,
        start: Instant,
        attempt: u32,
    ) -> std::result::Result<ApiResponse, TransportError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ContentType::from_header);

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    request: request_line.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                    attempts: attempt,
                }
            } else {
                TransportError::Body {
                    request: request_line.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let body = match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) if !bytes.is_empty() => ResponseBody::Json(value),
            _ => ResponseBody::Raw(String::from_utf8_lossy(&bytes).to_string()),
        };

        Ok(ApiResponse {
            request_line: request_line.to_string(),
            status,
            content_type,
            body,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn classify(&self, request_line: &str, err: &reqwest::Error, attempts: u32) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                request: request_line.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
                attempts,
            }
        } else if err.is_connect() {
            TransportError::Connect {
                request: request_line.to_string(),
                message: err.to_string(),
                attempts,
            }
        } else {
            TransportError::Network {
                request: request_line.to_string(),
                message: err.to_string(),
                attempts,
            }
        }
    }

    fn record(
        &self,
        method: HttpMethod,
        target: &str,
        status: Option<u16>,
        elapsed_ms: u64,
        attempts: u32,
        error: Option<String>,
    ) {
        let entry = ExchangeRecord {
            method,
            target: safe_log(target),
            status,
            elapsed_ms,
            attempts,
            error: error.map(|e| safe_log(&e)),
        };
        match self.transcript.lock() {
            Ok(mut t) => t.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
