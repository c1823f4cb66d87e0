//! Uniform access to a document whether or not it has a local replica.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::outcome::SyncOutcome;
use crate::transport::RemoteTransport;
use bibvault_store::{DocumentRecord, TagSet};
use bibvault_sync_protocol::RecordSummary;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Where a manipulator's reads come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Replica {
    /// Reads go to the local store.
    Local,
    /// Reads fall back to a cached remote summary.
    Remote(Box<RecordSummary>),
}

/// An accessor over one document.
///
/// Reads degrade gracefully: without a local replica they answer from the
/// remote summary (comments are empty until [`fetch_comments`] is called).
/// Writes are local only and return [`SyncError::NotLocal`] when no
/// replica exists; check [`is_write_allowed`] or call [`sync`] first.
///
/// A remote manipulator becomes local as soon as a replica appears at the
/// expected path, whether through [`sync`] or another caller.
///
/// [`fetch_comments`]: VirtualFileManipulator::fetch_comments
/// [`is_write_allowed`]: VirtualFileManipulator::is_write_allowed
/// [`sync`]: VirtualFileManipulator::sync
pub struct VirtualFileManipulator<'e, T: RemoteTransport> {
    engine: &'e SyncEngine<T>,
    id: Uuid,
    replica: Replica,
    fetched_comments: RwLock<Option<String>>,
}

impl<'e, T: RemoteTransport> VirtualFileManipulator<'e, T> {
    /// Creates a local-mode accessor.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if the store has no record for `id`.
    pub fn local(engine: &'e SyncEngine<T>, id: Uuid) -> SyncResult<Self> {
        if !engine.store().contains(&id)? {
            return Err(SyncError::NotFound(id));
        }
        Ok(Self {
            engine,
            id,
            replica: Replica::Local,
            fetched_comments: RwLock::new(None),
        })
    }

    /// Creates a virtual-mode accessor over a remote summary.
    pub fn remote(engine: &'e SyncEngine<T>, summary: RecordSummary) -> Self {
        Self {
            engine,
            id: summary.uuid,
            replica: Replica::Remote(Box::new(summary)),
            fetched_comments: RwLock::new(None),
        }
    }

    /// Document id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current read source.
    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    /// True in local mode, or once a replica has been materialized.
    ///
    /// A store failure is logged and reported as no replica; reads and
    /// writes surface it as an error instead.
    pub fn has_local(&self) -> bool {
        self.local_present().unwrap_or_else(|err| {
            warn!(id = %self.id, "Replica check failed: {}", err);
            false
        })
    }

    /// Returns true if writes can succeed.
    pub fn is_write_allowed(&self) -> bool {
        self.has_local()
    }

    /// Syncs the document and switches to local mode on success.
    pub fn sync(&mut self) -> SyncOutcome {
        let outcome = self.engine.sync(&self.id);
        if outcome.is_success() {
            match self.engine.has_local(&self.id) {
                Ok(true) => {
                    self.replica = Replica::Local;
                    *self.fetched_comments.write() = None;
                }
                Ok(false) => {}
                Err(err) => warn!(id = %self.id, "Replica check after sync failed: {}", err),
            }
        }
        outcome
    }

    /// Citation text.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn read_bib(&self) -> SyncResult<String> {
        self.read(|r| r.bibtex.clone(), |s| s.bibtex.clone())
    }

    /// Tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn read_tags(&self) -> SyncResult<TagSet> {
        self.read(|r| r.tags.clone(), |s| s.tags.clone())
    }

    /// Web link.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn web_url(&self) -> SyncResult<String> {
        self.read(|r| r.url.clone(), |s| s.url.clone())
    }

    /// Attached file extension, empty when none.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn doc_extension(&self) -> SyncResult<String> {
        self.read(|r| r.doc_extension.clone(), |s| s.doc_ext.clone())
    }

    /// Returns true if a file is attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn has_file(&self) -> SyncResult<bool> {
        self.read(DocumentRecord::has_file, |s| s.has_file)
    }

    /// Last modification time.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn time_modified(&self) -> SyncResult<f64> {
        self.read(|r| r.time_modified, |s| s.time_modify)
    }

    /// Notes. Empty in virtual mode unless fetched.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn read_comments(&self) -> SyncResult<String> {
        let fetched = self.fetched_comments.read().clone();
        self.read(|r| r.comments.clone(), |_| fetched.unwrap_or_default())
    }

    /// Attached file size in MiB.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn doc_size(&self) -> SyncResult<f64> {
        if self.local_present()? {
            return Ok(self.engine.store().doc_size_mb(&self.id)?);
        }
        self.read(|_| 0.0, |s| s.doc_size)
    }

    /// Path of the attached file. Virtual documents have none.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn doc_path(&self) -> SyncResult<Option<PathBuf>> {
        if self.local_present()? {
            return Ok(self.engine.store().doc_path(&self.id)?);
        }
        Ok(None)
    }

    /// Fetches notes: from the store when local, otherwise from the server.
    /// The fetched value is cached for [`read_comments`].
    ///
    /// [`read_comments`]: VirtualFileManipulator::read_comments
    ///
    /// # Errors
    ///
    /// Returns the store's or transport's error.
    pub fn fetch_comments(&self) -> SyncResult<String> {
        if self.local_present()? {
            return self.read_comments();
        }
        let notes = self.engine.fetch_notes(&self.id)?;
        *self.fetched_comments.write() = Some(notes.clone());
        Ok(notes)
    }

    /// Replaces the citation text.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotLocal`] without a local replica.
    pub fn write_bib(&self, bibtex: &str) -> SyncResult<()> {
        self.writable()?;
        self.engine.store().update_bibtex(&self.id, bibtex)?;
        Ok(())
    }

    /// Replaces the notes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotLocal`] without a local replica.
    pub fn write_comments(&self, comments: &str) -> SyncResult<()> {
        self.writable()?;
        self.engine.store().update_comments(&self.id, comments)?;
        Ok(())
    }

    /// Replaces the tags.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotLocal`] without a local replica.
    pub fn write_tags(&self, tags: TagSet) -> SyncResult<()> {
        self.writable()?;
        self.engine.store().update_tags(&self.id, tags)?;
        Ok(())
    }

    /// Replaces the web link.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotLocal`] without a local replica.
    pub fn set_web_url(&self, url: &str) -> SyncResult<()> {
        self.writable()?;
        self.engine.store().update_url(&self.id, url)?;
        Ok(())
    }

    /// Attaches a copy of `source`. Returns false if a file is already
    /// attached.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotLocal`] without a local replica.
    pub fn add_file(&self, source: &Path) -> SyncResult<bool> {
        self.writable()?;
        Ok(self.engine.store().add_file(&self.id, source)?)
    }

    /// Deletes the local replica only. Use [`SyncEngine::delete`] to remove
    /// the remote copy as well.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotLocal`] without a local replica.
    pub fn delete_document(&self) -> SyncResult<bool> {
        self.writable()?;
        Ok(self.engine.store().delete(&self.id)?)
    }

    fn local_present(&self) -> SyncResult<bool> {
        match self.replica {
            Replica::Local => Ok(true),
            Replica::Remote(_) => self.engine.has_local(&self.id),
        }
    }

    fn writable(&self) -> SyncResult<()> {
        if self.local_present()? {
            Ok(())
        } else {
            Err(SyncError::NotLocal(self.id))
        }
    }

    /// Single dispatch point for every read.
    fn read<R>(
        &self,
        local: impl FnOnce(&DocumentRecord) -> R,
        remote: impl FnOnce(&RecordSummary) -> R,
    ) -> SyncResult<R> {
        if self.local_present()? {
            let record = self
                .engine
                .store()
                .get(&self.id)?
                .ok_or(SyncError::NotFound(self.id))?;
            return Ok(local(&record));
        }
        match &self.replica {
            Replica::Remote(summary) => Ok(remote(&**summary)),
            Replica::Local => Err(SyncError::NotFound(self.id)),
        }
    }
}
