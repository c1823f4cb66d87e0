//! Hierarchical tag sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Separator between levels of a hierarchical tag (`"physics->optics"`).
pub const TAG_SEPARATOR: &str = "->";

/// An unordered set of hierarchical tag labels.
///
/// Insertion order is irrelevant; iteration and serialization are always
/// sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag. Surrounding whitespace is trimmed and empty tags are
    /// ignored. Returns whether the tag was newly inserted.
    pub fn insert(&mut self, tag: impl AsRef<str>) -> bool {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            return false;
        }
        self.0.insert(tag.to_string())
    }

    /// Removes a tag, returning whether it was present.
    pub fn remove(&mut self, tag: &str) -> bool {
        self.0.remove(tag)
    }

    /// Returns true if the tag is present.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set has no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the tags as a sorted vector.
    #[must_use]
    pub fn to_sorted_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    /// Returns this set plus every ancestor of every tag.
    ///
    /// `a->b->c` contributes `a`, `a->b` and `a->b->c`.
    #[must_use]
    pub fn with_parents(&self) -> TagSet {
        let mut out = BTreeSet::new();
        for tag in &self.0 {
            let parts: Vec<&str> = tag.split(TAG_SEPARATOR).collect();
            for depth in 1..=parts.len() {
                out.insert(parts[..depth].join(TAG_SEPARATOR));
            }
        }
        TagSet(out)
    }

    /// Returns true if every tag of `other` is in this set.
    #[must_use]
    pub fn contains_all(&self, other: &TagSet) -> bool {
        other.0.is_subset(&self.0)
    }
}

impl<S: AsRef<str>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "{}", joined.join(", "))
    }
}
