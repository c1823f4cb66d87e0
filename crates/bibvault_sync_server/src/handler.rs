//! Request handlers for sync endpoints.

use crate::auth::AuthGate;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use bibvault_archive::{pack_to_vec, unpack_bytes, ArchiveError};
use bibvault_store::{DocumentRecord, Store};
use bibvault_sync_protocol::{
    decode_tags, field, parse_path_uuid, path, FieldCommand, FieldUpdate, FileCommand,
    FileListResponse, Method, Permission, Request, Response, UploadRequest,
};
use parking_lot::Mutex;
use std::fs;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// The server's record store.
    pub store: Arc<Store>,
    /// Credential check run before every endpoint.
    pub gate: AuthGate,
    /// Serializes every mutation that compares timestamps, so the
    /// staleness check and the write it guards are atomic.
    write_lock: Mutex<()>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<Store>, gate: AuthGate) -> Self {
        Self {
            config,
            store,
            gate,
            write_lock: Mutex::new(()),
        }
    }
}

/// Handler for sync requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Routes a request and converts any error into its status response.
    pub fn handle(&self, request: &Request) -> Response {
        match self.dispatch(request) {
            Ok(response) => response,
            Err(err) => {
                let status = err.status_code();
                if err.is_server_error() {
                    error!("{} {} failed: {}", method_name(request.method), request.path, err);
                } else {
                    debug!("{} {} -> {}: {}", method_name(request.method), request.path, status, err);
                }
                Response::error(status, err.to_string())
            }
        }
    }

    /// Routes a request to its endpoint.
    ///
    /// # Errors
    ///
    /// Returns the endpoint's error, or [`ServerError::NotFound`] for an
    /// unknown route.
    pub fn dispatch(&self, request: &Request) -> ServerResult<Response> {
        match (request.method, request.path.as_str()) {
            (Method::Post, path::FILE) => self.handle_file(request),
            (Method::Post, path::AUTH) => self.handle_auth(request),
            (_, path::FILELIST) => self.handle_filelist(request),
            (Method::Post, path::DATAMAN) => self.handle_dataman(request),
            (Method::Get, _) if request.path.starts_with(path::FILEINFO_PREFIX) => {
                self.handle_fileinfo(request)
            }
            (Method::Get, _) if request.path.starts_with(path::NOTES_PREFIX) => {
                self.handle_notes(request)
            }
            _ => Err(ServerError::NotFound(format!("no route for {}", request.path))),
        }
    }

    /// `POST /file`: download, upload or delete one record.
    ///
    /// # Errors
    ///
    /// Unauthorized, Forbidden, NotFound, StaleWrite, or a store/archive
    /// failure.
    pub fn handle_file(&self, request: &Request) -> ServerResult<Response> {
        let permission = self.context.gate.authorize(request)?;
        let cmd: FileCommand = request.require(field::CMD)?.parse()?;
        match cmd {
            FileCommand::Download => self.download(request.require_uuid()?, &permission),
            FileCommand::Upload => self.upload(UploadRequest::from_request(request)?, &permission),
            FileCommand::Delete => self.delete(request.require_uuid()?, &permission),
        }
    }

    /// `POST /auth`: `Success`, or the permission JSON when
    /// `require_permission` is set.
    ///
    /// # Errors
    ///
    /// Unauthorized for an unregistered key.
    pub fn handle_auth(&self, request: &Request) -> ServerResult<Response> {
        let permission = self.context.gate.authorize(request)?;
        let wants_permission = request
            .field(field::REQUIRE_PERMISSION)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if wants_permission {
            Ok(Response::json(&permission)?)
        } else {
            Ok(Response::text("Success"))
        }
    }

    /// `GET|POST /filelist`: summaries of records carrying every requested
    /// tag that the key may see.
    ///
    /// # Errors
    ///
    /// Unauthorized, or a malformed tag filter.
    pub fn handle_filelist(&self, request: &Request) -> ServerResult<Response> {
        let permission = self.context.gate.authorize(request)?;
        let filter = decode_tags(request.field(field::TAGS).unwrap_or_default())?;
        let data = self
            .context
            .store
            .summaries(&filter)?
            .into_iter()
            .filter(|summary| permission.allows(&summary.tags))
            .collect();
        Ok(Response::json(&FileListResponse { data })?)
    }

    /// `GET /fileinfo/{uuid}`: one summary.
    ///
    /// # Errors
    ///
    /// Unauthorized, Forbidden, or NotFound.
    pub fn handle_fileinfo(&self, request: &Request) -> ServerResult<Response> {
        let permission = self.context.gate.authorize(request)?;
        let id = path_uuid(request, path::FILEINFO_PREFIX)?;
        let summary = self
            .context
            .store
            .summary(&id)?
            .ok_or_else(|| not_found(&id))?;
        check(&permission, &summary.tags, &id)?;
        Ok(Response::json(&summary)?)
    }

    /// `GET /notes/{uuid}`: the record's comments as plain text.
    ///
    /// # Errors
    ///
    /// Unauthorized, Forbidden, or NotFound.
    pub fn handle_notes(&self, request: &Request) -> ServerResult<Response> {
        let permission = self.context.gate.authorize(request)?;
        let id = path_uuid(request, path::NOTES_PREFIX)?;
        let record = self.record(&id)?;
        check(&permission, &record.tags, &id)?;
        Ok(Response::text(record.comments))
    }

    /// `POST /dataman`: replace one field of a stored record.
    ///
    /// # Errors
    ///
    /// Unauthorized, Forbidden, NotFound, or a malformed value.
    pub fn handle_dataman(&self, request: &Request) -> ServerResult<Response> {
        let permission = self.context.gate.authorize(request)?;
        let update = FieldUpdate::from_request(request)?;
        let id = update.uuid;
        let store = &self.context.store;

        let _guard = self.context.write_lock.lock();
        let record = self.record(&id)?;
        check(&permission, &record.tags, &id)?;
        let updated = match update.command {
            FieldCommand::WriteTags => {
                let tags = update.tag_value()?;
                check(&permission, &tags, &id)?;
                store.update_tags(&id, tags)?
            }
            FieldCommand::WriteBib => store.update_bibtex(&id, &update.value)?,
            FieldCommand::WriteComments => store.update_comments(&id, &update.value)?,
            FieldCommand::SetUrl => store.update_url(&id, &update.value)?,
        };
        info!(%id, cmd = %update.command, time_modified = updated.time_modified, "Field updated");
        Ok(Response::text("Success"))
    }

    fn download(&self, id: Uuid, permission: &Permission) -> ServerResult<Response> {
        let record = self.record(&id)?;
        check(permission, &record.tags, &id)?;
        let bytes = self
            .context
            .store
            .with_replica(&id, pack_to_vec)??;
        debug!(%id, bytes = bytes.len(), "Serving archive");
        Ok(Response::archive(bytes))
    }

    fn delete(&self, id: Uuid, permission: &Permission) -> ServerResult<Response> {
        let _guard = self.context.write_lock.lock();
        let record = self.record(&id)?;
        check(permission, &record.tags, &id)?;
        self.context.store.delete(&id)?;
        info!(%id, "Deleted by client");
        Ok(Response::text("Success"))
    }

    fn upload(&self, upload: UploadRequest, permission: &Permission) -> ServerResult<Response> {
        let id = upload.uuid;
        if upload.archive.len() > self.context.config.max_upload_bytes {
            return Err(ServerError::InvalidRequest(format!(
                "upload of {} bytes exceeds limit",
                upload.archive.len()
            )));
        }

        let _guard = self.context.write_lock.lock();
        let staged = self.context.config.staging_dir.join(id.to_string());
        if staged.exists() {
            fs::remove_dir_all(&staged)?;
        }
        let result = self.adopt_upload(&upload, &staged, permission);
        if staged.exists() {
            if let Err(err) = fs::remove_dir_all(&staged) {
                warn!(%id, "Could not clean staging directory: {}", err);
            }
        }
        let record = result?;
        info!(%id, time_modified = record.time_modified, "Accepted upload");
        Ok(Response::text("Success"))
    }

    fn adopt_upload(
        &self,
        upload: &UploadRequest,
        staged: &std::path::Path,
        permission: &Permission,
    ) -> ServerResult<DocumentRecord> {
        let id = upload.uuid;
        unpack_bytes(&upload.archive, staged).map_err(|err| match err {
            ArchiveError::Io(io) => ServerError::Io(io),
            other => ServerError::InvalidRequest(format!("bad archive: {other}")),
        })?;
        let incoming = Store::read_staged_record(staged)
            .map_err(|err| ServerError::InvalidRequest(format!("bad record: {err}")))?;
        if incoming.id != id {
            return Err(ServerError::InvalidRequest(format!(
                "archive holds {} but {} was declared",
                incoming.id, id
            )));
        }
        check(permission, &incoming.tags, &id)?;

        if let Some(stored) = self.context.store.get(&id)? {
            check(permission, &stored.tags, &id)?;
            let base = upload.base_time_modified;
            let stale = match base {
                None => true,
                Some(base) => stored.time_modified > base,
            } || incoming.time_modified <= stored.time_modified;
            if stale {
                warn!(
                    %id,
                    stored = stored.time_modified,
                    ?base,
                    incoming = incoming.time_modified,
                    "Rejected stale upload"
                );
                return Err(ServerError::StaleWrite {
                    stored: stored.time_modified,
                    base,
                });
            }
        }

        Ok(self.context.store.adopt_replica(&id, staged)?)
    }

    fn record(&self, id: &Uuid) -> ServerResult<DocumentRecord> {
        self.context.store.get(id)?.ok_or_else(|| not_found(id))
    }
}

fn check(permission: &Permission, tags: &bibvault_store::TagSet, id: &Uuid) -> ServerResult<()> {
    if permission.allows(tags) {
        Ok(())
    } else {
        warn!(%id, "Key lacks tag permission");
        Err(ServerError::Forbidden(format!("key may not access {id}")))
    }
}

fn path_uuid(request: &Request, prefix: &str) -> ServerResult<Uuid> {
    let raw = request
        .path_param(prefix)
        .ok_or_else(|| ServerError::InvalidRequest("missing uuid".into()))?;
    Ok(parse_path_uuid(raw)?)
}

fn not_found(id: &Uuid) -> ServerError {
    ServerError::NotFound(format!("record {id}"))
}

fn method_name(method: Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::Post => "POST",
    }
}
