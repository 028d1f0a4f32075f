//! Mock SICEI Service for Tests
//!
//! Provides a [`MockSiceiServer`] that emulates the students/teachers REST
//! service in-process: in-memory collections with the service's field
//! validation, the email endpoint, multipart profile-picture upload backed by
//! a local `/storage/...` object store, and the session login / verify /
//! logout flow. Faults can be injected to prove the harness detects contract
//! violations.
//!
//! # Example
//! ```ignore
//! let server = MockSiceiServer::builder()
//!     .with_fault(Fault::LogoutIgnored)
//!     .build()
//!     .await?;
//! let url = server.url(); // e.g. "http://127.0.0.1:12345"
//! // ... point the harness at `url` with storage domain `server.storage_domain()` ...
//! server.stop().await;
//! ```

use rand::Rng;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};

use crate::fixtures::{ResourceDescriptor, ResourceKind};

/// Largest request head accepted
const MAX_HEAD_BYTES: usize = 64 * 1024;
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Deliberate deviations from the service contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Logout answers 200 but the session stays active
    LogoutIgnored,
    /// Verify answers 200 for any identifier
    AcceptAnySession,
    /// PUT stores whatever it receives and answers 200
    UpdateIgnoresValidation,
    /// POST on a collection answers 200 instead of 201
    CreateReturns200,
}

/// Configuration produced by the builder.
#[derive(Debug, Clone, Default)]
pub struct MockServiceConfig {
    /// Artificial latency added before every response (milliseconds).
    pub latency_ms: u64,
    pub faults: Vec<Fault>,
}

impl MockServiceConfig {
    fn has(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }
}

/// A lightweight HTTP/1.1 server speaking the SICEI service surface.
pub struct MockSiceiServer {
    url: String,
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
    requests: Arc<AtomicUsize>,
}

impl MockSiceiServer {
    pub fn builder() -> MockSiceiServerBuilder {
        MockSiceiServerBuilder::default()
    }

    /// Bind `127.0.0.1:0` and serve in a background task.
    pub async fn start(config: MockServiceConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let url = format!("http://{}", addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let requests = Arc::new(AtomicUsize::new(0));
        let shared = Arc::new(Shared {
            config,
            base_url: url.clone(),
            state: Mutex::new(ServiceState::default()),
            requests: requests.clone(),
        });

        let handle = tokio::spawn(accept_loop(listener, shared, shutdown_rx));

        Ok(Self {
            url,
            shutdown_tx,
            handle,
            requests,
        })
    }

    /// Base URL, e.g. `"http://127.0.0.1:54321"`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Host of the storage URLs this server issues.
    pub fn storage_domain(&self) -> &'static str {
        "127.0.0.1"
    }

    /// Requests received so far, including retried ones.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Stop accepting connections and wait for the accept loop to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockSiceiServerBuilder {
    config: MockServiceConfig,
}

impl MockSiceiServerBuilder {
    /// Latency (in milliseconds) applied before every response.
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.config.latency_ms = ms;
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.config.faults.push(fault);
        self
    }

    pub async fn build(self) -> std::io::Result<MockSiceiServer> {
        MockSiceiServer::start(self.config).await
    }
}

// ---------------------------------------------------------------------------
// Internal: state
// ---------------------------------------------------------------------------

struct Shared {
    config: MockServiceConfig,
    base_url: String,
    state: Mutex<ServiceState>,
    requests: Arc<AtomicUsize>,
}

#[derive(Default)]
struct ServiceState {
    next_id: i64,
    students: BTreeMap<i64, Map<String, Value>>,
    teachers: BTreeMap<i64, Map<String, Value>>,
    passwords: HashMap<i64, String>,
    /// session string -> (student id, active)
    sessions: HashMap<String, (i64, bool)>,
    /// storage key -> object bytes
    objects: HashMap<String, Vec<u8>>,
}

impl ServiceState {
    fn collection(&mut self, kind: ResourceKind) -> &mut BTreeMap<i64, Map<String, Value>> {
        match kind {
            ResourceKind::Student => &mut self.students,
            ResourceKind::Teacher => &mut self.teachers,
        }
    }
}

struct MockRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl MockRequest {
    fn json(&self) -> Option<Map<String, Value>> {
        serde_json::from_slice::<Value>(&self.body)
            .ok()
            .and_then(|v| v.as_object().cloned())
    }
}

struct MockReply {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl MockReply {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string().into_bytes(),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }

    fn not_found_page() -> Self {
        Self {
            status: 404,
            content_type: "text/html; charset=utf-8",
            body: b"<!doctype html><title>404 Not Found</title><h1>Not Found</h1>".to_vec(),
        }
    }

    fn method_not_allowed() -> Self {
        Self {
            status: 405,
            content_type: "text/html; charset=utf-8",
            body: b"<!doctype html><title>405 Method Not Allowed</title>".to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal: accept loop & connection handling
// ---------------------------------------------------------------------------

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        let shared = Arc::clone(&shared);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, shared).await {
                                tracing::debug!("mock service connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::debug!("mock service accept error: {}", e);
                    }
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, shared: Arc<Shared>) -> std::io::Result<()> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };
    shared.requests.fetch_add(1, Ordering::SeqCst);

    if shared.config.latency_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(shared.config.latency_ms)).await;
    }

    let reply = {
        let mut state = shared.state.lock().await;
        route(&mut state, &shared.config, &shared.base_url, &request)
    };
    write_reply(&mut stream, &request.method, reply).await
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<MockRequest>> {
    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_HEAD_BYTES {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_uppercase();
    let target = request_line.next().unwrap_or("/");
    let path = target.split('?').next().unwrap_or("/").to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect();

    let mut body = buf[head_end + 4..].to_vec();
    let chunked = headers
        .get("transfer-encoding")
        .is_some_and(|v| v.to_lowercase().contains("chunked"));

    if chunked {
        body = loop {
            if let Some(decoded) = decode_chunked(&body) {
                break decoded;
            }
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            body.extend_from_slice(&chunk[..n]);
        };
    } else {
        let len = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        while body.len() < len {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(len);
    }

    Ok(Some(MockRequest {
        method,
        path,
        headers,
        body,
    }))
}

/// Decoded body once the terminating chunk has arrived, `None` before.
fn decode_chunked(raw: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;
    loop {
        let line_end = pos + find(&raw[pos..], b"\r\n")?;
        let size_line = std::str::from_utf8(&raw[pos..line_end]).ok()?;
        let size = usize::from_str_radix(size_line.split(';').next()?.trim(), 16).ok()?;
        pos = line_end + 2;
        if size == 0 {
            return Some(out);
        }
        if raw.len() < pos + size + 2 {
            return None;
        }
        out.extend_from_slice(&raw[pos..pos + size]);
        pos += size + 2;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn write_reply(stream: &mut TcpStream, method: &str, reply: MockReply) -> std::io::Result<()> {
    let reason = match reply.status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Unknown",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reason,
        reply.content_type,
        reply.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    if method != "HEAD" {
        stream.write_all(&reply.body).await?;
    }
    stream.flush().await
}

// ---------------------------------------------------------------------------
// Internal: routing
// ---------------------------------------------------------------------------

fn route(
    state: &mut ServiceState,
    config: &MockServiceConfig,
    base_url: &str,
    req: &MockRequest,
) -> MockReply {
    let segments: Vec<&str> = req.path.split('/').filter(|s| !s.is_empty()).collect();
    let method = req.method.as_str();

    if segments.first() == Some(&"storage") {
        let key = segments[1..].join("/");
        return match (method, state.objects.get(&key)) {
            ("GET" | "HEAD", Some(bytes)) => MockReply {
                status: 200,
                content_type: "application/octet-stream",
                body: bytes.clone(),
            },
            ("GET" | "HEAD", None) => MockReply::not_found_page(),
            _ => MockReply::method_not_allowed(),
        };
    }

    let Some(kind) = segments
        .first()
        .and_then(|s| match *s {
            "alumnos" => Some(ResourceKind::Student),
            "profesores" => Some(ResourceKind::Teacher),
            _ => None,
        })
    else {
        return MockReply::not_found_page();
    };

    if segments.len() == 1 {
        return match method {
            "GET" => {
                let items: Vec<Value> = state
                    .collection(kind)
                    .values()
                    .cloned()
                    .map(Value::Object)
                    .collect();
                MockReply::json(200, Value::Array(items))
            }
            "POST" => create(state, config, kind, req),
            _ => MockReply::method_not_allowed(),
        };
    }

    let Ok(id) = segments[1].parse::<i64>() else {
        return MockReply::not_found_page();
    };

    match (kind, &segments[2..]) {
        (_, []) => match method {
            "GET" => match state.collection(kind).get(&id) {
                Some(item) => MockReply::json(200, Value::Object(item.clone())),
                None => MockReply::error(404, "Recurso no encontrado"),
            },
            "PUT" => update(state, config, kind, id, req),
            "DELETE" => match state.collection(kind).remove(&id) {
                Some(_) => {
                    state.passwords.remove(&id);
                    MockReply::json(200, json!({ "message": "Recurso eliminado" }))
                }
                None => MockReply::error(404, "Recurso no encontrado"),
            },
            _ => MockReply::method_not_allowed(),
        },
        (ResourceKind::Student, ["email"]) if method == "POST" => {
            if state.students.contains_key(&id) {
                MockReply::json(200, json!({ "message": "Notificación enviada" }))
            } else {
                MockReply::error(404, "Alumno no encontrado")
            }
        }
        (ResourceKind::Student, ["fotoPerfil"]) if method == "POST" => {
            upload(state, base_url, id, req)
        }
        (ResourceKind::Student, ["session", action]) if method == "POST" => {
            session(state, config, id, action, req)
        }
        _ => MockReply::not_found_page(),
    }
}

fn invalid_fields(descriptor: &ResourceDescriptor, body: &Map<String, Value>) -> Map<String, Value> {
    descriptor
        .fields
        .iter()
        .filter(|spec| !body.get(spec.name).is_some_and(|v| spec.kind.accepts(v)))
        .map(|spec| (spec.name.to_string(), json!(format!("{} inválido.", spec.name))))
        .collect()
}

fn stored_fields(descriptor: &ResourceDescriptor, body: &Map<String, Value>) -> Map<String, Value> {
    descriptor
        .fields
        .iter()
        .filter(|spec| spec.echoed)
        .filter_map(|spec| body.get(spec.name).map(|v| (spec.name.to_string(), v.clone())))
        .collect()
}

fn create(
    state: &mut ServiceState,
    config: &MockServiceConfig,
    kind: ResourceKind,
    req: &MockRequest,
) -> MockReply {
    let Some(body) = req.json() else {
        return MockReply::error(400, "JSON inválido");
    };
    let descriptor = kind.descriptor();
    let errors = invalid_fields(descriptor, &body);
    if !errors.is_empty() {
        return MockReply::json(400, json!({ "errors": errors }));
    }

    state.next_id += 1;
    let id = state.next_id;
    let mut item = stored_fields(descriptor, &body);
    item.insert("id".to_string(), json!(id));
    if let Some(password) = body.get("password").and_then(Value::as_str) {
        state.passwords.insert(id, password.to_string());
    }
    state.collection(kind).insert(id, item.clone());

    let status = if config.has(Fault::CreateReturns200) {
        200
    } else {
        201
    };
    MockReply::json(status, Value::Object(item))
}

fn update(
    state: &mut ServiceState,
    config: &MockServiceConfig,
    kind: ResourceKind,
    id: i64,
    req: &MockRequest,
) -> MockReply {
    if !state.collection(kind).contains_key(&id) {
        return MockReply::error(404, "Recurso no encontrado");
    }
    let Some(body) = req.json() else {
        return MockReply::error(400, "JSON inválido");
    };
    let descriptor = kind.descriptor();

    if !config.has(Fault::UpdateIgnoresValidation) {
        let unknown: Vec<&str> = body
            .keys()
            .map(String::as_str)
            .filter(|k| *k != "id" && *k != "fotoPerfilUrl" && descriptor.field(k).is_err())
            .collect();
        if !unknown.is_empty() {
            return MockReply::error(400, &format!("Campos no permitidos: {}", unknown.join(", ")));
        }
        let errors: Map<String, Value> = invalid_fields(descriptor, &body)
            .into_iter()
            .filter(|(name, _)| body.contains_key(name))
            .collect();
        if !errors.is_empty() {
            return MockReply::json(400, json!({ "errors": errors }));
        }
    }

    if let Some(password) = body.get("password").and_then(Value::as_str) {
        state.passwords.insert(id, password.to_string());
    }
    let changes = stored_fields(descriptor, &body);
    let Some(item) = state.collection(kind).get_mut(&id) else {
        return MockReply::error(404, "Recurso no encontrado");
    };
    item.extend(changes);
    MockReply::json(200, Value::Object(item.clone()))
}

fn upload(state: &mut ServiceState, base_url: &str, id: i64, req: &MockRequest) -> MockReply {
    if !state.students.contains_key(&id) {
        return MockReply::error(404, "Alumno no encontrado");
    }
    let Some(boundary) = req
        .headers
        .get("content-type")
        .and_then(|ct| ct.split(';').find_map(|p| p.trim().strip_prefix("boundary=")))
        .map(|b| b.trim_matches('"').to_string())
    else {
        return MockReply::error(400, "Se esperaba multipart/form-data");
    };
    let Some((file_name, bytes)) = multipart_file(&req.body, &boundary, "foto") else {
        return MockReply::error(400, "Archivo 'foto' requerido");
    };

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return MockReply::error(400, "Extension prohibida");
    }

    let unique = uuid::Uuid::new_v4().simple().to_string();
    let key = format!("alumnos/{}/perfil_{}.{}", id, &unique[..8], extension);
    let url = format!("{}/storage/{}", base_url, key);
    state.objects.insert(key, bytes);
    if let Some(student) = state.students.get_mut(&id) {
        student.insert("fotoPerfilUrl".to_string(), json!(url));
    }
    MockReply::json(200, json!({ "fotoPerfilUrl": url }))
}

/// File name and bytes of the part named `field`.
fn multipart_file(body: &[u8], boundary: &str, field: &str) -> Option<(String, Vec<u8>)> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut rest = body;
    while let Some(start) = find(rest, &delimiter) {
        rest = &rest[start + delimiter.len()..];
        if rest.starts_with(b"--") {
            return None;
        }
        let header_end = find(rest, b"\r\n\r\n")?;
        let headers = String::from_utf8_lossy(&rest[..header_end]).to_string();
        let content = &rest[header_end + 4..];
        let content_end = find(content, &delimiter)?;
        let data = content[..content_end]
            .strip_suffix(b"\r\n")
            .unwrap_or(&content[..content_end]);

        let disposition = headers
            .split("\r\n")
            .find(|l| l.to_lowercase().starts_with("content-disposition"))?;
        let name = disposition_param(disposition, "name");
        if name.as_deref() == Some(field) {
            let file_name = disposition_param(disposition, "filename")?;
            return Some((file_name, data.to_vec()));
        }
        rest = content;
    }
    None
}

fn disposition_param(disposition: &str, key: &str) -> Option<String> {
    disposition.split(';').find_map(|part| {
        let (k, v) = part.trim().split_once('=')?;
        (k.trim() == key).then(|| v.trim().trim_matches('"').to_string())
    })
}

fn session(
    state: &mut ServiceState,
    config: &MockServiceConfig,
    id: i64,
    action: &str,
    req: &MockRequest,
) -> MockReply {
    if !state.students.contains_key(&id) {
        return MockReply::error(404, "Alumno no encontrado");
    }
    let body = req.json().unwrap_or_default();
    match action {
        "login" => {
            let given = body.get("password").and_then(Value::as_str);
            if given.is_some() && given == state.passwords.get(&id).map(String::as_str) {
                let mut rng = rand::rng();
                let session: String = (0..64)
                    .map(|_| format!("{:02x}", rng.random::<u8>()))
                    .collect();
                state.sessions.insert(session.clone(), (id, true));
                MockReply::json(200, json!({ "sessionString": session }))
            } else {
                MockReply::error(400, "Contraseña incorrecta")
            }
        }
        "verify" => {
            let given = body.get("sessionString").and_then(Value::as_str).unwrap_or("");
            let active = matches!(state.sessions.get(given), Some((owner, true)) if *owner == id);
            if active || config.has(Fault::AcceptAnySession) {
                MockReply::json(200, json!({ "message": "Sesion valida" }))
            } else {
                MockReply::error(400, "Sesion invalida")
            }
        }
        "logout" => {
            let given = body.get("sessionString").and_then(Value::as_str).unwrap_or("");
            match state.sessions.get_mut(given) {
                Some((owner, active)) if *owner == id => {
                    if !config.has(Fault::LogoutIgnored) {
                        *active = false;
                    }
                    MockReply::json(200, json!({ "message": "Sesion cerrada" }))
                }
                _ => MockReply::error(400, "Sesion invalida"),
            }
        }
        _ => MockReply::not_found_page(),
    }
}
