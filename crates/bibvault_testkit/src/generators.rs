//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random records, tags and document
//! directory trees.

use bibvault_store::{DocumentRecord, TagSet};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Relative path to file contents.
pub type FileTree = BTreeMap<PathBuf, Vec<u8>>;

/// Strategy for generating citation text.
pub fn bibtex_strategy() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["article", "book", "inproceedings", "misc"]),
        "[a-z]{3,10}[0-9]{0,4}",
        "[A-Za-z][A-Za-z ]{0,39}",
    )
        .prop_map(|(kind, key, title)| format!("@{kind}{{{key},\n  title={{{title}}}\n}}"))
}

/// Strategy for generating hierarchical tags such as `physics->optics`.
pub fn tag_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}(->[a-z]{1,8}){0,2}").expect("Invalid regex")
}

/// Strategy for generating tag sets.
pub fn tag_set_strategy() -> impl Strategy<Value = TagSet> {
    prop::collection::vec(tag_strategy(), 0..5).prop_map(|tags| tags.into_iter().collect())
}

/// Strategy for generating records without an attached file.
pub fn record_strategy() -> impl Strategy<Value = DocumentRecord> {
    (
        bibtex_strategy(),
        ".{0,80}",
        ".{0,80}",
        tag_set_strategy(),
        prop::option::of("https://[a-z]{3,10}\\.org/[a-z0-9]{1,8}"),
        1_000_000.0f64..2_000_000_000.0,
    )
        .prop_map(|(bibtex, abstract_text, comments, tags, url, time)| {
            let mut record = DocumentRecord::new(bibtex);
            record.abstract_text = abstract_text;
            record.comments = comments;
            record.tags = tags;
            record.url = url.unwrap_or_default();
            record.time_imported = time;
            record.time_modified = time;
            record
        })
}

/// Strategy for generating directory trees.
///
/// Directories are bare lowercase names and files always carry a `.bin`
/// suffix, so no generated file path is a prefix of another.
pub fn file_tree_strategy() -> impl Strategy<Value = FileTree> {
    let path = (
        prop::collection::vec("[a-z]{1,6}", 0..3),
        "[a-z]{1,6}",
    )
        .prop_map(|(dirs, name)| {
            let mut path: PathBuf = dirs.into_iter().collect();
            path.push(format!("{name}.bin"));
            path
        });
    prop::collection::btree_map(path, prop::collection::vec(any::<u8>(), 0..2048), 0..12)
}

/// Writes `tree` under `root`.
pub fn write_tree(root: &Path, tree: &FileTree) -> io::Result<()> {
    fs::create_dir_all(root)?;
    for (relative, contents) in tree {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
    }
    Ok(())
}

/// Reads every file under `root` keyed by its path relative to `root`.
pub fn read_tree(root: &Path) -> io::Result<FileTree> {
    let mut tree = FileTree::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
                    .to_path_buf();
                tree.insert(relative, fs::read(&path)?);
            }
        }
    }
    Ok(tree)
}

/// One step of a single-client edit session.
#[derive(Debug, Clone)]
pub enum EditOperation {
    /// Replace the citation text.
    Bibtex(String),
    /// Replace the comments.
    Comments(String),
    /// Replace the tags.
    Tags(TagSet),
    /// Replace the web link.
    Url(String),
}

/// Strategy for generating a single edit.
pub fn edit_strategy() -> impl Strategy<Value = EditOperation> {
    prop_oneof![
        bibtex_strategy().prop_map(EditOperation::Bibtex),
        ".{0,40}".prop_map(EditOperation::Comments),
        tag_set_strategy().prop_map(EditOperation::Tags),
        "https://[a-z]{3,8}\\.org".prop_map(EditOperation::Url),
    ]
}

/// Strategy for generating edit sessions.
pub fn edit_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<EditOperation>> {
    prop::collection::vec(edit_strategy(), 1..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    proptest! {
        #[test]
        fn generated_tags_survive_tag_set(tags in tag_set_strategy()) {
            for tag in tags.iter() {
                prop_assert!(!tag.is_empty());
                prop_assert_eq!(tag.trim(), tag);
            }
        }

        #[test]
        fn generated_records_are_consistent(record in record_strategy()) {
            prop_assert!(!record.bibtex.trim().is_empty());
            prop_assert!(!record.has_file());
            prop_assert_eq!(record.time_imported, record.time_modified);
        }
    }

    #[test]
    fn tree_write_read() {
        let dir = tempdir().unwrap();
        let mut tree = FileTree::new();
        tree.insert(PathBuf::from("a.bin"), b"one".to_vec());
        tree.insert(PathBuf::from("x/y/b.bin"), Vec::new());

        write_tree(dir.path(), &tree).unwrap();
        assert_eq!(read_tree(dir.path()).unwrap(), tree);
    }
}
