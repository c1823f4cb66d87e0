//! Transport-neutral requests and responses.
//!
//! A [`Request`] is a method, a path, a flat map of form fields and an
//! optional file part. HTTP adapters map it onto query strings, url-encoded
//! forms or multipart bodies; the in-process loopback passes it through
//! unchanged.

use crate::credential::CredentialHash;
use crate::endpoint::{field, path, FieldCommand, FileCommand};
use crate::error::{ProtocolError, ProtocolResult};
use bibvault_store::{RecordSummary, TagSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read-only request; fields travel in the query string.
    Get,
    /// Form or multipart request.
    Post,
}

/// A request addressed to the sync server.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Method.
    pub method: Method,
    /// Path below the base URL, including any path parameter.
    pub path: String,
    /// Text form fields.
    pub fields: BTreeMap<String, String>,
    /// Uploaded file part. Its presence makes the body multipart.
    pub file: Option<Vec<u8>>,
}

impl Request {
    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            fields: BTreeMap::new(),
            file: None,
        }
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(path)
        }
    }

    /// Adds a form field.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Attaches the file part.
    #[must_use]
    pub fn with_file(mut self, bytes: Vec<u8>) -> Self {
        self.file = Some(bytes);
        self
    }

    /// Returns true if the body must be sent as multipart.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.file.is_some()
    }

    /// Looks up a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Looks up a required field.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingField`] if it is absent.
    pub fn require(&self, name: &'static str) -> ProtocolResult<&str> {
        self.field(name).ok_or(ProtocolError::MissingField(name))
    }

    /// Parses the `uuid` field.
    ///
    /// # Errors
    ///
    /// Returns an error if it is absent or not a UUID.
    pub fn require_uuid(&self) -> ProtocolResult<Uuid> {
        parse_uuid(field::UUID, self.require(field::UUID)?)
    }

    /// Parses the `key` field.
    ///
    /// # Errors
    ///
    /// Returns an error if it is absent or not a credential hash.
    pub fn require_key(&self) -> ProtocolResult<CredentialHash> {
        CredentialHash::parse(self.require(field::KEY)?)
    }

    /// Returns the path remainder after `prefix`, if the path starts with it.
    #[must_use]
    pub fn path_param(&self, prefix: &str) -> Option<&str> {
        self.path.strip_prefix(prefix).filter(|rest| !rest.is_empty())
    }

    /// `POST /auth`.
    #[must_use]
    pub fn auth(key: &CredentialHash, require_permission: bool) -> Self {
        let request = Self::post(path::AUTH).with_field(field::KEY, key.as_str());
        if require_permission {
            request.with_field(field::REQUIRE_PERMISSION, "true")
        } else {
            request
        }
    }

    /// `POST /file` with `download` or `delete`.
    #[must_use]
    pub fn file_command(key: &CredentialHash, cmd: FileCommand, id: &Uuid) -> Self {
        Self::post(path::FILE)
            .with_field(field::KEY, key.as_str())
            .with_field(field::CMD, cmd.as_str())
            .with_field(field::UUID, id.to_string())
    }

    /// `GET /fileinfo/{uuid}`.
    #[must_use]
    pub fn fileinfo(key: &CredentialHash, id: &Uuid) -> Self {
        Self::get(format!("{}{id}", path::FILEINFO_PREFIX)).with_field(field::KEY, key.as_str())
    }

    /// `GET /notes/{uuid}`.
    #[must_use]
    pub fn notes(key: &CredentialHash, id: &Uuid) -> Self {
        Self::get(format!("{}{id}", path::NOTES_PREFIX)).with_field(field::KEY, key.as_str())
    }

    /// `GET /filelist` filtered by `tags`.
    #[must_use]
    pub fn filelist(key: &CredentialHash, tags: &TagSet) -> Self {
        Self::get(path::FILELIST)
            .with_field(field::KEY, key.as_str())
            .with_field(field::TAGS, encode_tags(tags))
    }
}

/// A response from the sync server.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// MIME type of the body.
    pub content_type: &'static str,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl Response {
    /// 200 with a plain-text body.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; charset=utf-8",
            body: body.into().into_bytes(),
        }
    }

    /// 200 with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn json<T: Serialize>(value: &T) -> ProtocolResult<Self> {
        Ok(Self {
            status: 200,
            content_type: "application/json",
            body: serde_json::to_vec(value)?,
        })
    }

    /// 200 with an archive body.
    #[must_use]
    pub fn archive(bytes: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "application/zip",
            body: bytes,
        }
    }

    /// Plain-text response with an arbitrary status.
    #[must_use]
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            ..Self::text(message)
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8.
    #[must_use]
    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn decode_json<'a, T: Deserialize<'a>>(&'a self) -> ProtocolResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// An archive upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    /// Record id.
    pub uuid: Uuid,
    /// Archive file name.
    pub filename: String,
    /// Remote modification time the uploader compared against, or `None`
    /// when it believes the server has no copy.
    pub base_time_modified: Option<f64>,
    /// Packed document directory.
    pub archive: Vec<u8>,
}

impl UploadRequest {
    /// Creates an upload named `<uuid>.zip`.
    #[must_use]
    pub fn new(uuid: Uuid, base_time_modified: Option<f64>, archive: Vec<u8>) -> Self {
        Self {
            uuid,
            filename: format!("{uuid}.zip"),
            base_time_modified,
            archive,
        }
    }

    /// Builds the multipart `POST /file` request.
    #[must_use]
    pub fn into_request(self, key: &CredentialHash) -> Request {
        let base = self
            .base_time_modified
            .map(|t| t.to_string())
            .unwrap_or_default();
        Request::post(path::FILE)
            .with_field(field::KEY, key.as_str())
            .with_field(field::CMD, FileCommand::Upload.as_str())
            .with_field(field::UUID, self.uuid.to_string())
            .with_field(field::FILENAME, self.filename)
            .with_field(field::BASE_TIME_MODIFIED, base)
            .with_file(self.archive)
    }

    /// Decodes an upload from a received request.
    ///
    /// # Errors
    ///
    /// Returns an error if the id, base timestamp or file part is missing
    /// or malformed.
    pub fn from_request(request: &Request) -> ProtocolResult<Self> {
        let uuid = request.require_uuid()?;
        let filename = request
            .field(field::FILENAME)
            .map_or_else(|| format!("{uuid}.zip"), str::to_string);
        let base_time_modified = match request.field(field::BASE_TIME_MODIFIED).map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<f64>().map_err(|e| {
                ProtocolError::invalid(field::BASE_TIME_MODIFIED, e.to_string())
            })?),
        };
        let archive = request
            .file
            .clone()
            .ok_or(ProtocolError::MissingField(field::FILE))?;
        Ok(Self {
            uuid,
            filename,
            base_time_modified,
            archive,
        })
    }
}

/// A remote single-field edit.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    /// Record id.
    pub uuid: Uuid,
    /// Which field to replace.
    pub command: FieldCommand,
    /// New value; a JSON array for tags.
    pub value: String,
}

impl FieldUpdate {
    /// A tag replacement.
    #[must_use]
    pub fn tags(uuid: Uuid, tags: &TagSet) -> Self {
        Self {
            uuid,
            command: FieldCommand::WriteTags,
            value: encode_tags(tags),
        }
    }

    /// A text field replacement.
    #[must_use]
    pub fn text(uuid: Uuid, command: FieldCommand, value: impl Into<String>) -> Self {
        Self {
            uuid,
            command,
            value: value.into(),
        }
    }

    /// Builds the `POST /dataman` request.
    #[must_use]
    pub fn into_request(self, key: &CredentialHash) -> Request {
        Request::post(path::DATAMAN)
            .with_field(field::KEY, key.as_str())
            .with_field(field::UUID, self.uuid.to_string())
            .with_field(field::CMD, self.command.as_str())
            .with_field(field::VALUE, self.value)
    }

    /// Decodes an edit from a received request.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is missing or the command is unknown.
    pub fn from_request(request: &Request) -> ProtocolResult<Self> {
        Ok(Self {
            uuid: request.require_uuid()?,
            command: request.require(field::CMD)?.parse()?,
            value: request.require(field::VALUE)?.to_string(),
        })
    }

    /// Decodes the value of a tag replacement.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a JSON array of strings.
    pub fn tag_value(&self) -> ProtocolResult<TagSet> {
        decode_tags(&self.value)
    }
}

/// Body of `/filelist`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileListResponse {
    /// Matching summaries.
    pub data: Vec<RecordSummary>,
}

/// Encodes a tag filter as the JSON array carried in the `tags` field.
#[must_use]
pub fn encode_tags(tags: &TagSet) -> String {
    serde_json::to_string(&tags.to_sorted_vec()).unwrap_or_else(|_| "[]".to_string())
}

/// Decodes the `tags` field. An empty string is an empty set.
///
/// # Errors
///
/// Returns an error if the value is not a JSON array of strings.
pub fn decode_tags(raw: &str) -> ProtocolResult<TagSet> {
    if raw.trim().is_empty() {
        return Ok(TagSet::new());
    }
    let tags: Vec<String> = serde_json::from_str(raw)
        .map_err(|e| ProtocolError::invalid(field::TAGS, e.to_string()))?;
    Ok(tags.into_iter().collect())
}

fn parse_uuid(name: &'static str, raw: &str) -> ProtocolResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|e| ProtocolError::invalid(name, e.to_string()))
}

/// Parses a uuid path parameter.
///
/// # Errors
///
/// Returns an error if `raw` is not a UUID.
pub fn parse_path_uuid(raw: &str) -> ProtocolResult<Uuid> {
    parse_uuid(field::UUID, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CredentialHash {
        CredentialHash::from_secret("secret")
    }

    #[test]
    fn upload_request_round_trips_through_fields() {
        let id = Uuid::new_v4();
        let upload = UploadRequest::new(id, Some(1_700_000_000.123_456), vec![1, 2, 3]);
        let request = upload.clone().into_request(&key());

        assert!(request.is_multipart());
        assert_eq!(request.field(field::CMD), Some("upload"));
        assert_eq!(UploadRequest::from_request(&request).unwrap(), upload);
    }

    #[test]
    fn empty_base_means_no_remote_copy() {
        let request = UploadRequest::new(Uuid::new_v4(), None, Vec::new()).into_request(&key());
        assert_eq!(request.field(field::BASE_TIME_MODIFIED), Some(""));
        assert_eq!(
            UploadRequest::from_request(&request).unwrap().base_time_modified,
            None
        );
    }

    #[test]
    fn upload_without_file_part_is_rejected() {
        let mut request = UploadRequest::new(Uuid::new_v4(), None, Vec::new()).into_request(&key());
        request.file = None;
        assert!(matches!(
            UploadRequest::from_request(&request),
            Err(ProtocolError::MissingField(field::FILE))
        ));
    }

    #[test]
    fn tag_update_carries_json_array() {
        let id = Uuid::new_v4();
        let tags: TagSet = ["b", "a->c"].into_iter().collect();
        let request = FieldUpdate::tags(id, &tags).into_request(&key());
        assert_eq!(request.field(field::VALUE), Some(r#"["a->c","b"]"#));

        let decoded = FieldUpdate::from_request(&request).unwrap();
        assert_eq!(decoded.command, FieldCommand::WriteTags);
        assert_eq!(decoded.tag_value().unwrap(), tags);
    }

    #[test]
    fn path_params_are_extracted() {
        let id = Uuid::new_v4();
        let request = Request::fileinfo(&key(), &id);
        let raw = request.path_param(path::FILEINFO_PREFIX).unwrap();
        assert_eq!(parse_path_uuid(raw).unwrap(), id);
        assert!(Request::get(path::FILEINFO_PREFIX)
            .path_param(path::FILEINFO_PREFIX)
            .is_none());
    }

    #[test]
    fn missing_and_malformed_fields() {
        let request = Request::post(path::FILE).with_field(field::UUID, "nope");
        assert!(matches!(
            request.require_key(),
            Err(ProtocolError::MissingField(field::KEY))
        ));
        assert!(matches!(
            request.require_uuid(),
            Err(ProtocolError::InvalidField { .. })
        ));
    }

    #[test]
    fn decode_tags_accepts_empty() {
        assert!(decode_tags("").unwrap().is_empty());
        assert!(decode_tags("not json").is_err());
    }
}
