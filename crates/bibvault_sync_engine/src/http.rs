//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so the same
//! status mapping runs over reqwest in production and over an in-process
//! [`LoopbackClient`] in tests.

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteTransport;
use bibvault_store::TagSet;
use bibvault_sync_protocol::{
    field, CredentialHash, FieldUpdate, FileCommand, FileListResponse, LoopbackServer, Method,
    Permission, RecordSummary, Request, Response, UploadRequest,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Failures to
/// obtain any response at all (refused, timed out, reset) are returned as
/// `Err`; every HTTP status, including errors, is an `Ok` response.
pub trait HttpClient: Send + Sync {
    /// Sends `request` to `url` and waits at most `timeout`.
    fn send(&self, url: &str, request: &Request, timeout: Duration) -> Result<Response, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based remote transport.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the sync server (e.g., "http://192.168.1.10:8080").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    metadata_timeout: Duration,
    transfer_timeout: Duration,
    /// Cleared by [`HttpTransport::close`].
    open: AtomicBool,
    /// Whether the last request got a response.
    reachable: AtomicBool,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            metadata_timeout: Duration::from_secs(5),
            transfer_timeout: Duration::from_secs(120),
            open: AtomicBool::new(true),
            reachable: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Sets the metadata and transfer timeouts.
    pub fn with_timeouts(mut self, metadata: Duration, transfer: Duration) -> Self {
        self.metadata_timeout = metadata;
        self.transfer_timeout = transfer;
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Refuses every further request.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    /// Sends a request and maps refusal statuses onto errors. 404 is passed
    /// through for the caller to interpret.
    fn call(&self, request: &Request, timeout: Duration) -> SyncResult<Response> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(SyncError::NotConnected);
        }

        let url = format!("{}{}", self.base_url, request.path);
        let response = self.client.send(&url, request, timeout).map_err(|e| {
            self.set_error(&e);
            self.reachable.store(false, Ordering::SeqCst);
            SyncError::transport_retryable(e)
        })?;
        self.reachable.store(true, Ordering::SeqCst);
        self.clear_error();
        debug!("{} -> {}", request.path, response.status);

        match response.status {
            200..=299 | 404 => Ok(response),
            401 => Err(SyncError::Unauthorized(response.text_body())),
            403 => Err(SyncError::Forbidden(response.text_body())),
            409 => Err(SyncError::StaleWrite(response.text_body())),
            500..=599 => Err(SyncError::ServerError(response.text_body())),
            status => Err(SyncError::Protocol(format!(
                "unexpected status {status}: {}",
                response.text_body()
            ))),
        }
    }

    fn metadata(&self, request: &Request) -> SyncResult<Option<Response>> {
        let response = self.call(request, self.metadata_timeout)?;
        Ok((response.status != 404).then_some(response))
    }
}

impl<C: HttpClient> RemoteTransport for HttpTransport<C> {
    fn authenticate(&self, key: &CredentialHash) -> SyncResult<Permission> {
        let response = self.call(&Request::auth(key, true), self.metadata_timeout)?;
        if response.status == 404 {
            return Err(SyncError::Protocol("auth endpoint missing".into()));
        }
        Ok(response.decode_json()?)
    }

    fn fetch_summary(&self, key: &CredentialHash, id: &Uuid) -> SyncResult<Option<RecordSummary>> {
        self.metadata(&Request::fileinfo(key, id))?
            .map(|response| response.decode_json().map_err(SyncError::from))
            .transpose()
    }

    fn list(&self, key: &CredentialHash, tags: &TagSet) -> SyncResult<Vec<RecordSummary>> {
        let response = self
            .metadata(&Request::filelist(key, tags))?
            .ok_or_else(|| SyncError::Protocol("filelist endpoint missing".into()))?;
        let list: FileListResponse = response.decode_json()?;
        Ok(list.data)
    }

    fn download(&self, key: &CredentialHash, id: &Uuid) -> SyncResult<Option<Vec<u8>>> {
        let request = Request::file_command(key, FileCommand::Download, id);
        let response = self.call(&request, self.transfer_timeout)?;
        Ok((response.status != 404).then_some(response.body))
    }

    fn upload(&self, key: &CredentialHash, upload: UploadRequest) -> SyncResult<()> {
        let id = upload.uuid;
        let response = self.call(&upload.into_request(key), self.transfer_timeout)?;
        if response.status == 404 {
            return Err(SyncError::NotFound(id));
        }
        Ok(())
    }

    fn delete(&self, key: &CredentialHash, id: &Uuid) -> SyncResult<bool> {
        let request = Request::file_command(key, FileCommand::Delete, id);
        Ok(self.metadata(&request)?.is_some())
    }

    fn fetch_notes(&self, key: &CredentialHash, id: &Uuid) -> SyncResult<Option<String>> {
        Ok(self
            .metadata(&Request::notes(key, id))?
            .map(|response| response.text_body()))
    }

    fn update_field(&self, key: &CredentialHash, update: FieldUpdate) -> SyncResult<()> {
        let id = update.uuid;
        match self.metadata(&update.into_request(key))? {
            Some(_) => Ok(()),
            None => Err(SyncError::NotFound(id)),
        }
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst)
            && self.reachable.load(Ordering::SeqCst)
            && self.client.is_healthy()
    }
}

/// Blocking reqwest client.
///
/// Must not be used from inside an async runtime.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| SyncError::transport_fatal(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, url: &str, request: &Request, timeout: Duration) -> Result<Response, String> {
        let builder = match request.method {
            Method::Get => self.client.get(url).query(&request.fields),
            Method::Post if request.is_multipart() => {
                let mut form = reqwest::blocking::multipart::Form::new();
                for (name, value) in &request.fields {
                    form = form.text(name.clone(), value.clone());
                }
                if let Some(bytes) = &request.file {
                    let file_name = request
                        .field(field::FILENAME)
                        .unwrap_or("upload.zip")
                        .to_string();
                    let part = reqwest::blocking::multipart::Part::bytes(bytes.clone())
                        .file_name(file_name)
                        .mime_str("application/zip")
                        .map_err(|e| e.to_string())?;
                    form = form.part(field::FILE, part);
                }
                self.client.post(url).multipart(form)
            }
            Method::Post => self.client.post(url).form(&request.fields),
        };

        let response = builder.timeout(timeout).send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let content_type = content_type_of(
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default(),
        );
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();
        Ok(Response {
            status,
            content_type,
            body,
        })
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

fn content_type_of(header: &str) -> &'static str {
    if header.starts_with("application/json") {
        "application/json"
    } else if header.starts_with("application/zip") {
        "application/zip"
    } else {
        "text/plain; charset=utf-8"
    }
}

/// A loopback HTTP client that routes requests directly to a sync server.
///
/// Useful for testing without actual network overhead. Marking it
/// unreachable simulates a refused connection.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
    reachable: AtomicBool,
    log: Mutex<Vec<String>>,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self {
            server,
            reachable: AtomicBool::new(true),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Simulates the server going away or coming back.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Requests delivered so far, as `"<path> <cmd>"` lines.
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Number of archive uploads and downloads delivered so far.
    pub fn archive_transfers(&self) -> usize {
        let download = format!(" {}", FileCommand::Download.as_str());
        let upload = format!(" {}", FileCommand::Upload.as_str());
        self.log
            .lock()
            .iter()
            .filter(|line| line.ends_with(&download) || line.ends_with(&upload))
            .count()
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn send(&self, _url: &str, request: &Request, _timeout: Duration) -> Result<Response, String> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err("connection refused".into());
        }
        self.log.lock().push(format!(
            "{} {}",
            request.path,
            request.field(field::CMD).unwrap_or_default()
        ));
        Ok(self.server.handle_request(request))
    }

    fn is_healthy(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibvault_store::DocumentRecord;

    struct TestClient {
        response: RwLock<Option<Response>>,
        healthy: AtomicBool,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: RwLock::new(None),
                healthy: AtomicBool::new(true),
            }
        }

        fn set_response(&self, resp: Response) {
            *self.response.write() = Some(resp);
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }
    }

    impl HttpClient for TestClient {
        fn send(&self, _url: &str, _request: &Request, _timeout: Duration) -> Result<Response, String> {
            self.response
                .read()
                .clone()
                .ok_or_else(|| "No response set".into())
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn key() -> CredentialHash {
        CredentialHash::from_secret("k")
    }

    #[test]
    fn transport_creation() {
        let transport = HttpTransport::new("http://sync.example.com/", TestClient::new());
        assert_eq!(transport.base_url(), "http://sync.example.com");
        assert!(transport.is_connected());
    }

    #[test]
    fn transport_close() {
        let transport = HttpTransport::new("http://sync.example.com", TestClient::new());
        transport.close();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.authenticate(&key()),
            Err(SyncError::NotConnected)
        ));
    }

    #[test]
    fn transport_unhealthy_client() {
        let client = TestClient::new();
        client.set_healthy(false);
        let transport = HttpTransport::new("http://sync.example.com", client);
        assert!(!transport.is_connected());
    }

    #[test]
    fn transport_failure_is_retryable() {
        let transport = HttpTransport::new("http://sync.example.com", TestClient::new());
        let err = transport.fetch_summary(&key(), &Uuid::new_v4()).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(transport.last_error().as_deref(), Some("No response set"));
        assert!(!transport.is_connected());
    }

    #[test]
    fn status_mapping() {
        let client = TestClient::new();
        let transport = HttpTransport::new("http://sync.example.com", client);
        let id = Uuid::new_v4();

        transport.client().set_response(Response::error(401, "no"));
        assert!(matches!(
            transport.download(&key(), &id),
            Err(SyncError::Unauthorized(_))
        ));

        transport.client().set_response(Response::error(409, "stale"));
        assert!(matches!(
            transport.upload(&key(), UploadRequest::new(id, None, vec![])),
            Err(SyncError::StaleWrite(_))
        ));

        transport.client().set_response(Response::error(404, "gone"));
        assert_eq!(transport.download(&key(), &id).unwrap(), None);
        assert!(!transport.delete(&key(), &id).unwrap());

        transport.client().set_response(Response::error(503, "busy"));
        assert!(transport.fetch_summary(&key(), &id).unwrap_err().is_retryable());
    }

    #[test]
    fn decodes_summary() {
        let record = DocumentRecord::new("@misc{s}");
        let summary = RecordSummary::from_record(&record, 1.5);
        let client = TestClient::new();
        client.set_response(Response::json(&summary).unwrap());
        let transport = HttpTransport::new("http://sync.example.com", client);

        let fetched = transport.fetch_summary(&key(), &record.id).unwrap();
        assert_eq!(fetched, Some(summary));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_of("application/json; charset=utf-8"), "application/json");
        assert_eq!(content_type_of("application/zip"), "application/zip");
        assert_eq!(content_type_of(""), "text/plain; charset=utf-8");
    }
}
