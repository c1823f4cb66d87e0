//! Extracting ZIP archives.

use crate::error::{ArchiveError, ArchiveResult};
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// Extracts `archive` into `dest_dir`, overwriting files at matching
/// relative paths.
///
/// Every entry name and every file/directory collision is checked before
/// anything is written, so a hostile or mismatched archive leaves
/// `dest_dir` untouched. An I/O failure midway can still leave a partial
/// extraction; callers that need atomicity unpack into a staging directory.
///
/// # Errors
///
/// Returns [`ArchiveError::DestinationIsFile`] if `dest_dir` or a path an
/// entry needs as a directory is a regular file,
/// [`ArchiveError::DestinationIsDirectory`] if a file entry would replace a
/// directory, [`ArchiveError::UnsafeEntry`] if an entry escapes the
/// destination, or a zip/I/O error.
pub fn unpack(archive: &Path, dest_dir: &Path) -> ArchiveResult<PathBuf> {
    extract(File::open(archive)?, dest_dir)
}

/// Extracts an in-memory archive into `dest_dir`. Same rules as [`unpack`].
///
/// # Errors
///
/// See [`unpack`].
pub fn unpack_bytes(bytes: &[u8], dest_dir: &Path) -> ArchiveResult<PathBuf> {
    extract(Cursor::new(bytes), dest_dir)
}

fn extract<R: Read + Seek>(reader: R, dest_dir: &Path) -> ArchiveResult<PathBuf> {
    if dest_dir.is_file() {
        return Err(ArchiveError::DestinationIsFile(dest_dir.to_path_buf()));
    }
    let mut archive = ZipArchive::new(reader)?;

    let mut targets = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;
        let target = dest_dir.join(relative);
        check_target(dest_dir, &target, entry.is_dir())?;
        targets.push((target, entry.is_dir()));
    }

    fs::create_dir_all(dest_dir)?;
    for (index, (target, is_dir)) in targets.into_iter().enumerate() {
        if is_dir {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut entry = archive.by_index(index)?;
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
    }
    debug!("Unpacked {} entries into {:?}", archive.len(), dest_dir);
    Ok(dest_dir.to_path_buf())
}

/// Fails if writing `target` would collide with what already exists below
/// `dest_dir`.
fn check_target(dest_dir: &Path, target: &Path, is_dir: bool) -> ArchiveResult<()> {
    if is_dir && target.is_file() {
        return Err(ArchiveError::DestinationIsFile(target.to_path_buf()));
    }
    if !is_dir && target.is_dir() {
        return Err(ArchiveError::DestinationIsDirectory(target.to_path_buf()));
    }
    for ancestor in target.ancestors().skip(1) {
        if ancestor == dest_dir {
            break;
        }
        if ancestor.is_file() {
            return Err(ArchiveError::DestinationIsFile(ancestor.to_path_buf()));
        }
    }
    Ok(())
}
