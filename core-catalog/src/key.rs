//! Hierarchical catalog keys
//!
//! A [`DatasetKey`] identifies both datasets and folders. Its first segment is
//! the root (the source the entry belongs to); every proper prefix below the
//! root is a folder.
//!
//! Keys render as dotted paths. Segments containing a dot or a double quote
//! are quoted, with embedded quotes doubled:
//!
//! ```text
//! hive.db1."kv.v2"      => ["hive", "db1", "kv.v2"]
//! s3.bucket."say ""hi"""  => ["s3", "bucket", "say \"hi\""]
//! ```

use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator used in the storage encoding of a key. Never valid inside a
/// segment.
pub(crate) const STORAGE_SEPARATOR: char = '\u{1f}';

/// Ordered sequence of path segments. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct DatasetKey(Vec<String>);

impl DatasetKey {
    /// Create a key from its segments
    ///
    /// # Errors
    /// Returns `InvalidInput` if there are no segments, or a segment is empty
    /// or contains the storage separator.
    pub fn new(segments: Vec<String>) -> Result<Self> {
        if segments.is_empty() {
            return Err(invalid("key must have at least one segment"));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(invalid("key segments must not be empty"));
            }
            if segment.contains(STORAGE_SEPARATOR) {
                return Err(invalid("key segments must not contain control separators"));
            }
        }
        Ok(Self(segments))
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments, root included
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The first segment
    pub fn root_name(&self) -> &str {
        &self.0[0]
    }

    /// The last segment
    pub fn name(&self) -> &str {
        &self.0[self.0.len() - 1]
    }

    pub fn has_parent(&self) -> bool {
        self.0.len() > 1
    }

    pub fn parent(&self) -> Option<DatasetKey> {
        self.has_parent()
            .then(|| Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Append a segment
    pub fn child(&self, name: impl Into<String>) -> Result<DatasetKey> {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self::new(segments)
    }

    /// True if `self` lies strictly beneath `other`
    pub fn is_descendant_of(&self, other: &DatasetKey) -> bool {
        self.0.len() > other.0.len() && self.0.starts_with(&other.0)
    }

    /// Proper ancestors from the nearest parent up to, but excluding, the root.
    ///
    /// The iterator is lazy and every call starts a fresh walk.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            key: self,
            next_depth: self.0.len().saturating_sub(1),
            floor: 1,
        }
    }

    /// Proper ancestors from the nearest parent up to, but excluding, `root`.
    ///
    /// Yields nothing when `self` does not lie beneath `root`.
    pub fn ancestors_below(&self, root: &DatasetKey) -> Ancestors<'_> {
        let floor = if self.is_descendant_of(root) {
            root.depth()
        } else {
            self.0.len()
        };
        Ancestors {
            key: self,
            next_depth: self.0.len().saturating_sub(1),
            floor,
        }
    }

    /// Parse a dotted, optionally quoted path
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = path.chars().peekable();
        let mut quoted = false;
        let mut segment_started = false;

        while let Some(c) = chars.next() {
            if quoted {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        current.push('"');
                    } else {
                        quoted = false;
                    }
                } else {
                    current.push(c);
                }
                continue;
            }

            match c {
                '"' if !segment_started => {
                    quoted = true;
                    segment_started = true;
                }
                '.' => {
                    segments.push(std::mem::take(&mut current));
                    segment_started = false;
                }
                _ => {
                    current.push(c);
                    segment_started = true;
                }
            }
        }

        if quoted {
            return Err(invalid("unterminated quoted segment"));
        }
        segments.push(current);
        Self::new(segments)
    }

    pub(crate) fn storage_path(&self) -> String {
        let mut path = String::new();
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                path.push(STORAGE_SEPARATOR);
            }
            path.push_str(segment);
        }
        path
    }

    /// Storage-encoded prefix shared by every key beneath this one
    pub(crate) fn storage_prefix(&self) -> String {
        let mut prefix = self.storage_path();
        prefix.push(STORAGE_SEPARATOR);
        prefix
    }

    pub(crate) fn from_storage_path(path: &str) -> Result<Self> {
        Self::from_segments(path.split(STORAGE_SEPARATOR))
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            if segment.contains('.') || segment.starts_with('"') {
                write!(f, "\"{}\"", segment.replace('"', "\"\""))?;
            } else {
                f.write_str(segment)?;
            }
        }
        Ok(())
    }
}

impl FromStr for DatasetKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<Vec<String>> for DatasetKey {
    type Error = CatalogError;

    fn try_from(segments: Vec<String>) -> Result<Self> {
        Self::new(segments)
    }
}

impl From<DatasetKey> for Vec<String> {
    fn from(key: DatasetKey) -> Self {
        key.0
    }
}

/// Iterator over a key's proper ancestors, nearest first, root excluded.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    key: &'a DatasetKey,
    next_depth: usize,
    /// Depth of the excluded root
    floor: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = DatasetKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_depth <= self.floor {
            return None;
        }
        let ancestor = DatasetKey(self.key.0[..self.next_depth].to_vec());
        self.next_depth -= 1;
        Some(ancestor)
    }
}

fn invalid(message: &str) -> CatalogError {
    CatalogError::InvalidInput {
        field: "DatasetKey".to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> DatasetKey {
        DatasetKey::parse(path).unwrap()
    }

    #[test]
    fn test_parse_plain_path() {
        let parsed = key("hive.db1.kv");
        assert_eq!(parsed.segments(), &["hive", "db1", "kv"]);
        assert_eq!(parsed.root_name(), "hive");
        assert_eq!(parsed.name(), "kv");
        assert_eq!(parsed.depth(), 3);
    }

    #[test]
    fn test_parse_quoted_segments() {
        let parsed = key(r#"s3.bucket."kv.v2"."say ""hi""""#);
        assert_eq!(parsed.segments(), &["s3", "bucket", "kv.v2", "say \"hi\""]);
    }

    #[test]
    fn test_display_round_trips_quoting() {
        let original = DatasetKey::from_segments(["s3", "a.b", "\"x\""]).unwrap();
        let rendered = original.to_string();
        assert_eq!(rendered, r#"s3."a.b"."""x""""#);
        assert_eq!(key(&rendered), original);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(DatasetKey::parse("").is_err());
        assert!(DatasetKey::parse("a..b").is_err());
        assert!(DatasetKey::parse("a.\"b").is_err());
        assert!(DatasetKey::new(vec![]).is_err());
    }

    #[test]
    fn test_parent_and_child() {
        let table = key("src.a.b");
        assert_eq!(table.parent(), Some(key("src.a")));
        assert_eq!(key("src").parent(), None);
        assert_eq!(key("src.a").child("b").unwrap(), table);
    }

    #[test]
    fn test_is_descendant_of() {
        assert!(key("src.a.b").is_descendant_of(&key("src")));
        assert!(key("src.a.b").is_descendant_of(&key("src.a")));
        assert!(!key("src").is_descendant_of(&key("src")));
        assert!(!key("srcx.a").is_descendant_of(&key("src")));
        assert!(!key("other.a").is_descendant_of(&key("src")));
    }

    #[test]
    fn test_ancestors_exclude_root() {
        let ancestors: Vec<_> = key("src.a.b.c").ancestors().collect();
        assert_eq!(ancestors, vec![key("src.a.b"), key("src.a")]);

        assert_eq!(key("src.a").ancestors().count(), 0);
        assert_eq!(key("src").ancestors().count(), 0);
    }

    #[test]
    fn test_ancestors_below_nested_root() {
        let table = key("space.src.f.g.t");
        let ancestors: Vec<_> = table.ancestors_below(&key("space.src")).collect();
        assert_eq!(ancestors, vec![key("space.src.f.g"), key("space.src.f")]);

        assert_eq!(key("space.src.t").ancestors_below(&key("space.src")).count(), 0);
        assert_eq!(key("space.src").ancestors_below(&key("space.src")).count(), 0);
        assert_eq!(key("other.f.t").ancestors_below(&key("space.src")).count(), 0);
        assert_eq!(
            table.ancestors_below(&key("space")).collect::<Vec<_>>(),
            table.ancestors().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_ancestors_restart_per_call() {
        let table = key("src.x.y");
        assert_eq!(table.ancestors().count(), 1);
        assert_eq!(table.ancestors().count(), 1);
    }

    #[test]
    fn test_storage_path_round_trip() {
        let original = key(r#"src."a.b".c"#);
        let decoded = DatasetKey::from_storage_path(&original.storage_path()).unwrap();
        assert_eq!(decoded, original);
        assert!(original.storage_path().starts_with(&key("src").storage_prefix()));
    }

    #[test]
    fn test_serde_uses_segment_list() {
        let original = key("src.a");
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, r#"["src","a"]"#);
        let back: DatasetKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
        assert!(serde_json::from_str::<DatasetKey>("[]").is_err());
    }
}
