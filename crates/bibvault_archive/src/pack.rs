//! Packing directories into ZIP archives.

use crate::error::{ArchiveError, ArchiveResult};
use std::fs::{self, File};
use std::io::{self, Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Packs every file under `source_dir` into a new archive at `dest`.
///
/// Entry names are relative to `source_dir` and use `/` separators.
/// An existing file at `dest` is replaced.
///
/// # Errors
///
/// Returns [`ArchiveError::DestinationIsDirectory`] if `dest` is a
/// directory, or an I/O error if the tree cannot be read.
pub fn pack(source_dir: &Path, dest: &Path) -> ArchiveResult<PathBuf> {
    if !source_dir.is_dir() {
        return Err(ArchiveError::NotADirectory(source_dir.to_path_buf()));
    }
    write_archive(dest, |writer| add_children(writer, source_dir, source_dir))
}

/// Packs only the listed top-level entries of `root` into `dest`.
///
/// Each selected entry may be a file or a directory; names stay relative
/// to `root`. An empty selection produces a valid empty archive.
///
/// # Errors
///
/// Returns [`ArchiveError::MissingSelection`] if a selected entry does not
/// exist, or [`ArchiveError::DestinationIsDirectory`] if `dest` is a
/// directory.
pub fn pack_selected<P: AsRef<Path>>(
    root: &Path,
    selected: &[P],
    dest: &Path,
) -> ArchiveResult<PathBuf> {
    for entry in selected {
        let path = root.join(entry);
        if !path.exists() {
            return Err(ArchiveError::MissingSelection(path));
        }
    }
    write_archive(dest, |writer| {
        for entry in selected {
            add_path(writer, root, &root.join(entry))?;
        }
        Ok(())
    })
}

/// Packs `source_dir` into an in-memory archive.
///
/// # Errors
///
/// Returns an error if the tree cannot be read.
pub fn pack_to_vec(source_dir: &Path) -> ArchiveResult<Vec<u8>> {
    if !source_dir.is_dir() {
        return Err(ArchiveError::NotADirectory(source_dir.to_path_buf()));
    }
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    add_children(&mut writer, source_dir, source_dir)?;
    let bytes = writer.finish()?.into_inner();
    debug!("Packed {:?} into {} bytes", source_dir, bytes.len());
    Ok(bytes)
}

fn write_archive(
    dest: &Path,
    fill: impl FnOnce(&mut ZipWriter<File>) -> ArchiveResult<()>,
) -> ArchiveResult<PathBuf> {
    if dest.is_dir() {
        return Err(ArchiveError::DestinationIsDirectory(dest.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(File::create(dest)?);
    let result = fill(&mut writer).and_then(|()| Ok(writer.finish()?));
    match result {
        Ok(file) => {
            file.sync_all()?;
            debug!("Packed archive {:?}", dest);
            Ok(dest.to_path_buf())
        }
        Err(err) => {
            let _ = fs::remove_file(dest);
            Err(err)
        }
    }
}

fn add_children<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    base: &Path,
    dir: &Path,
) -> ArchiveResult<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    for path in entries {
        add_path(writer, base, &path)?;
    }
    Ok(())
}

fn add_path<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    base: &Path,
    path: &Path,
) -> ArchiveResult<()> {
    let name = entry_name(base, path)?;
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        writer.add_directory(format!("{name}/"), options())?;
        add_children(writer, base, path)?;
    } else if meta.is_file() {
        writer.start_file(name, options())?;
        let mut file = File::open(path)?;
        io::copy(&mut file, writer)?;
    }
    Ok(())
}

/// Relative entry name with `/` separators.
fn entry_name(base: &Path, path: &Path) -> ArchiveResult<String> {
    let relative = path
        .strip_prefix(base)
        .map_err(|_| ArchiveError::UnsafeEntry(path.display().to_string()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return Err(ArchiveError::UnsafeEntry(path.display().to_string()));
    }
    Ok(parts.join("/"))
}
