//! Validated absolute paths.
//!
//! [`VfsPath`] is the only path type the filesystem traits accept. Every
//! value is absolute, normalized, and free of `.`/`..` segments, so backends
//! never re-validate and prefix arithmetic (mount routing, overlay merging,
//! root confinement) is plain string work.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Characters that are rejected in any path segment.
///
/// The set mirrors the strictest common host rules so a path accepted here
/// can be handed to any backend, including a real disk on Windows.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// A validated absolute path inside a virtual filesystem.
///
/// Construction normalizes the input: backslashes become forward slashes,
/// repeated separators collapse, and a trailing separator is dropped (except
/// for the root). Equality and hashing are by the normalized string.
///
/// # Example
///
/// ```rust
/// use fskit::VfsPath;
///
/// let p: VfsPath = "/reports/2024/summary.txt".parse()?;
/// assert_eq!(p.file_name(), Some("summary.txt"));
/// assert_eq!(p.extension(), Some("txt"));
/// assert_eq!(p.parent().unwrap().as_str(), "/reports/2024");
/// assert!("relative/path".parse::<VfsPath>().is_err());
/// # Ok::<(), fskit::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VfsPath(String);

impl VfsPath {
    /// The root path `/`.
    pub fn root() -> Self {
        VfsPath("/".to_string())
    }

    /// Parse and validate a path string.
    ///
    /// # Errors
    ///
    /// - [`Error::PathEmpty`] for an empty input
    /// - [`Error::PathInvalid`] if the path is not absolute
    /// - [`Error::PathDottedSegments`] if any segment is `.` or `..`
    /// - [`Error::PathInvalidChars`] if a segment contains a rejected character
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::PathEmpty);
        }

        let normalized = input.replace('\\', "/");
        if !normalized.starts_with('/') {
            return Err(Error::invalid_path(input));
        }

        let mut out = String::with_capacity(normalized.len());
        for segment in normalized.split('/') {
            if segment.is_empty() {
                continue;
            }
            if segment == "." || segment == ".." {
                return Err(Error::PathDottedSegments(input.to_string()));
            }
            check_segment_chars(segment).map_err(|_| Error::PathInvalidChars(input.to_string()))?;
            out.push('/');
            out.push_str(segment);
        }

        if out.is_empty() {
            out.push('/');
        }
        Ok(VfsPath(out))
    }

    /// The normalized path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the root path `/`.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path segments, in order. Empty for the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The final segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// The extension of the final segment, without the dot.
    ///
    /// A leading dot does not start an extension, matching host conventions
    /// for dotfiles.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        let dot = name.rfind('.')?;
        if dot == 0 {
            return None;
        }
        Some(&name[dot + 1..])
    }

    /// The final segment without its extension.
    pub fn file_stem(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rfind('.') {
            Some(dot) if dot > 0 => Some(&name[..dot]),
            _ => Some(name),
        }
    }

    /// The parent directory, or `None` for the root.
    pub fn parent(&self) -> Option<VfsPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(VfsPath::root()),
            Some(idx) => Some(VfsPath(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Append a single segment.
    ///
    /// # Errors
    ///
    /// Fails if the segment is empty, contains a separator, is dotted, or
    /// carries a rejected character.
    pub fn append(&self, segment: &str) -> Result<VfsPath> {
        if segment.is_empty() {
            return Err(Error::PathEmpty);
        }
        if segment.contains('/') || segment.contains('\\') {
            return Err(Error::PathInvalidChars(segment.to_string()));
        }
        if segment == "." || segment == ".." {
            return Err(Error::PathDottedSegments(segment.to_string()));
        }
        check_segment_chars(segment).map_err(|_| Error::PathInvalidChars(segment.to_string()))?;

        let mut out = self.0.clone();
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
        Ok(VfsPath(out))
    }

    /// Join another absolute path underneath this one.
    ///
    /// `/a`.join(`/b/c`) is `/a/b/c`. Joining the root is the identity.
    pub fn join(&self, other: &VfsPath) -> VfsPath {
        if other.is_root() {
            return self.clone();
        }
        if self.is_root() {
            return other.clone();
        }
        VfsPath(format!("{}{}", self.0, other.0))
    }

    /// True if this path lies strictly below `dir`.
    ///
    /// The root is an ancestor of every non-root path; no path is inside
    /// itself.
    pub fn in_directory(&self, dir: &VfsPath) -> bool {
        if self == dir {
            return false;
        }
        if dir.is_root() {
            return !self.is_root();
        }
        self.0.starts_with(&dir.0) && self.0.as_bytes().get(dir.0.len()) == Some(&b'/')
    }

    /// Replace the prefix `old` with `new`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::PathInvalid`] if this path is not `old` itself and
    /// not inside it.
    pub fn rebase(&self, old: &VfsPath, new: &VfsPath) -> Result<VfsPath> {
        if self == old {
            return Ok(new.clone());
        }
        if !self.in_directory(old) {
            return Err(Error::invalid_path(format!(
                "{} is not under {}",
                self.0, old.0
            )));
        }
        let rest = if old.is_root() {
            &self.0
        } else {
            &self.0[old.0.len()..]
        };
        // rest keeps its leading separator, so this re-parses cleanly.
        let rest = VfsPath(rest.to_string());
        Ok(new.join(&rest))
    }

    /// Resolve this path under a host directory.
    pub fn full_path(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for segment in self.segments() {
            out.push(segment);
        }
        out
    }
}

fn check_segment_chars(segment: &str) -> std::result::Result<(), ()> {
    for ch in segment.chars() {
        if ch.is_control() || INVALID_CHARS.contains(&ch) {
            return Err(());
        }
    }
    Ok(())
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VfsPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        VfsPath::parse(s)
    }
}

impl TryFrom<&str> for VfsPath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        VfsPath::parse(s)
    }
}

impl AsRef<str> for VfsPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for VfsPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VfsPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        VfsPath::parse(&s).map_err(D::Error::custom)
    }
}
