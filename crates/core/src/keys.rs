//! Mapping between caller-facing paths and backend keys
//!
//! Two roots exist: the primary root for regular backup objects and an
//! optional secondary root for object-disk backups. An empty key means the
//! whole bucket, while `"dir/"` means the contents of `dir`, so the join never
//! produces a leading or trailing separator.

use crate::error::{Error, Result};

/// Key separator used by the backend
pub const SEPARATOR: char = '/';

/// Joins roots and relative paths into backend keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMapper {
    root: String,
    object_disk_root: Option<String>,
}

impl KeyMapper {
    pub fn new(root: &str, object_disk_root: Option<&str>) -> Self {
        Self {
            root: normalize(root),
            object_disk_root: object_disk_root.map(normalize),
        }
    }

    /// Normalized primary root
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Normalized secondary root, if configured
    pub fn object_disk_root(&self) -> Option<&str> {
        self.object_disk_root.as_deref()
    }

    /// Key of `rel` under the primary root
    pub fn to_primary_key(&self, rel: &str) -> String {
        join(&self.root, rel)
    }

    /// Key of `rel` under the object-disk root
    pub fn to_secondary_key(&self, rel: &str) -> Result<String> {
        let root = self
            .object_disk_root
            .as_deref()
            .ok_or_else(|| Error::Config("object_disk_path is not configured".to_string()))?;
        Ok(join(root, rel))
    }

    /// Listing prefix for a walk rooted at `rel`
    ///
    /// The namespace root lists with an empty prefix instead of `"/"`.
    pub fn walk_prefix(&self, rel: &str) -> String {
        let root = self.to_primary_key(rel);
        if root.is_empty() {
            root
        } else {
            format!("{root}{SEPARATOR}")
        }
    }
}

/// Strip a listing prefix from a returned key
///
/// A key equal to the prefix yields `""`; a key outside the prefix is
/// returned unchanged.
pub fn relative_name<'a>(prefix: &str, key: &'a str) -> &'a str {
    key.strip_prefix(prefix).unwrap_or(key)
}

/// Normalize a path: `\` becomes `/`, empty and `.` segments are dropped and
/// `..` pops the previous segment.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    push_segments(&mut segments, path, 0);
    segments.join("/")
}

/// Join a normalized root with a relative path.
///
/// `..` in `rel` never climbs above `root`, so a relative path cannot reach
/// into another namespace.
fn join(root: &str, rel: &str) -> String {
    let mut segments: Vec<&str> = root.split(SEPARATOR).filter(|s| !s.is_empty()).collect();
    let floor = segments.len();
    push_segments(&mut segments, rel, floor);
    segments.join("/")
}

fn push_segments<'a>(segments: &mut Vec<&'a str>, path: &'a str, floor: usize) {
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.len() > floor {
                    segments.pop();
                }
            }
            s => segments.push(s),
        }
    }
}

/// Whether `inner` equals or lives under `outer` (segment-wise)
pub fn is_nested(outer: &str, inner: &str) -> bool {
    let outer = normalize(outer);
    let inner = normalize(inner);
    outer.is_empty() || inner == outer || inner.starts_with(&format!("{outer}{SEPARATOR}"))
}
