//! Endpoint paths, form field names and commands.

use crate::error::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// Endpoint paths, relative to the server base URL.
pub mod path {
    /// Archive transfer: download, upload, delete.
    pub const FILE: &str = "/file";
    /// Credential check.
    pub const AUTH: &str = "/auth";
    /// Summary listing filtered by tags.
    pub const FILELIST: &str = "/filelist";
    /// Single-record summary, followed by the uuid.
    pub const FILEINFO_PREFIX: &str = "/fileinfo/";
    /// Notes of one record, followed by the uuid.
    pub const NOTES_PREFIX: &str = "/notes/";
    /// Remote field edits.
    pub const DATAMAN: &str = "/dataman";
}

/// Form field names.
pub mod field {
    /// Credential hash.
    pub const KEY: &str = "key";
    /// Command selector.
    pub const CMD: &str = "cmd";
    /// Record id.
    pub const UUID: &str = "uuid";
    /// Archive file name on upload.
    pub const FILENAME: &str = "filename";
    /// Archive payload on upload.
    pub const FILE: &str = "file";
    /// Remote modification time the uploader believes is current.
    pub const BASE_TIME_MODIFIED: &str = "base_time_modified";
    /// JSON array of tags for listings.
    pub const TAGS: &str = "tags";
    /// New field value for remote edits.
    pub const VALUE: &str = "value";
    /// Ask `/auth` to return the permission payload.
    pub const REQUIRE_PERMISSION: &str = "require_permission";
}

/// Commands accepted by `POST /file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCommand {
    /// Fetch the packed archive.
    Download,
    /// Replace the stored copy with an uploaded archive.
    Upload,
    /// Remove the record.
    Delete,
}

impl FileCommand {
    /// Wire name of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Upload => "upload",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for FileCommand {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download" => Ok(Self::Download),
            "upload" => Ok(Self::Upload),
            "delete" => Ok(Self::Delete),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for FileCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands accepted by `POST /dataman`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCommand {
    /// Replace the tag set; the value is a JSON array.
    WriteTags,
    /// Replace the citation text.
    WriteBib,
    /// Replace the notes.
    WriteComments,
    /// Replace the web link.
    SetUrl,
}

impl FieldCommand {
    /// Wire name of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WriteTags => "write-tags",
            Self::WriteBib => "write-bib",
            Self::WriteComments => "write-comments",
            Self::SetUrl => "set-url",
        }
    }
}

impl FromStr for FieldCommand {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "write-tags" => Ok(Self::WriteTags),
            "write-bib" => Ok(Self::WriteBib),
            "write-comments" => Ok(Self::WriteComments),
            "set-url" => Ok(Self::SetUrl),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for FieldCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_their_wire_names() {
        for cmd in [FileCommand::Download, FileCommand::Upload, FileCommand::Delete] {
            assert_eq!(cmd.as_str().parse::<FileCommand>().unwrap(), cmd);
        }
        for cmd in [
            FieldCommand::WriteTags,
            FieldCommand::WriteBib,
            FieldCommand::WriteComments,
            FieldCommand::SetUrl,
        ] {
            assert_eq!(cmd.to_string().parse::<FieldCommand>().unwrap(), cmd);
        }
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(matches!(
            "rename".parse::<FileCommand>(),
            Err(ProtocolError::UnknownCommand(_))
        ));
    }
}
