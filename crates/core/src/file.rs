//! Remote file descriptors
//!
//! Object stores have no directories; a non-recursive listing synthesizes
//! them from common prefixes. The two cases are separate variants so a
//! directory never carries a fake size or timestamp.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// One entry returned by a walk or a stat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RemoteFile {
    /// A stored object
    Object {
        name: String,
        size: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_modified: Option<Timestamp>,
    },
    /// A common prefix ("directory"), name ends with the delimiter
    Prefix { name: String },
}

impl RemoteFile {
    pub fn object(name: impl Into<String>, size: u64, last_modified: Option<Timestamp>) -> Self {
        RemoteFile::Object {
            name: name.into(),
            size,
            last_modified,
        }
    }

    pub fn prefix(name: impl Into<String>) -> Self {
        RemoteFile::Prefix { name: name.into() }
    }

    /// Name relative to the queried root
    pub fn name(&self) -> &str {
        match self {
            RemoteFile::Object { name, .. } | RemoteFile::Prefix { name } => name,
        }
    }

    /// Size in bytes, 0 for prefixes
    pub fn size(&self) -> u64 {
        match self {
            RemoteFile::Object { size, .. } => *size,
            RemoteFile::Prefix { .. } => 0,
        }
    }

    pub fn last_modified(&self) -> Option<Timestamp> {
        match self {
            RemoteFile::Object { last_modified, .. } => *last_modified,
            RemoteFile::Prefix { .. } => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, RemoteFile::Prefix { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_has_no_size_or_time() {
        let dir = RemoteFile::prefix("a/");
        assert!(dir.is_dir());
        assert_eq!(dir.name(), "a/");
        assert_eq!(dir.size(), 0);
        assert!(dir.last_modified().is_none());
    }

    #[test]
    fn test_object_accessors() {
        let ts = Timestamp::from_second(1_700_000_000).unwrap();
        let file = RemoteFile::object("b", 42, Some(ts));
        assert!(!file.is_dir());
        assert_eq!(file.size(), 42);
        assert_eq!(file.last_modified(), Some(ts));
    }

    #[test]
    fn test_serialization_tags() {
        let json = serde_json::to_string(&RemoteFile::prefix("a/")).unwrap();
        assert_eq!(json, r#"{"type":"prefix","name":"a/"}"#);

        let json = serde_json::to_string(&RemoteFile::object("b", 3, None)).unwrap();
        assert_eq!(json, r#"{"type":"object","name":"b","size":3}"#);
    }
}
