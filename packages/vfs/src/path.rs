//! Module paths requested by the interpreter's import mechanism.

use std::fmt;

/// Errors related to module path parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Nothing was left after normalization.
    Empty { input: String },
    /// A segment contains a character the virtual filesystem cannot store.
    InvalidSegment {
        segment: String,
        position: usize,
        message: String,
    },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty { input } => {
                write!(f, "module path '{}' has no file component", input)
            }
            PathError::InvalidSegment {
                segment,
                position,
                message,
            } => {
                write!(
                    f,
                    "invalid path segment '{}' at position {}: {}",
                    segment, position, message
                )
            }
        }
    }
}

impl std::error::Error for PathError {}

/// A slash-separated relative path to a single source file.
///
/// A `ModulePath` always decomposes into zero or more directory segments
/// followed by exactly one leaf filename. `.` and `..` segments are dropped
/// rather than interpreted, so a path can never escape its root.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModulePath {
    directories: Vec<String>,
    leaf: String,
}

impl ModulePath {
    /// Parse a module path.
    ///
    /// # Path Syntax
    ///
    /// - Segments are separated by `/`
    /// - Empty, `.` and `..` segments are discarded
    /// - The last remaining segment is the leaf filename
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pyhost_vfs::ModulePath;
    ///
    /// let path = ModulePath::parse("lib/./pkg/mod.py").unwrap();
    /// assert_eq!(path.directories(), ["lib", "pkg"]);
    /// assert_eq!(path.leaf(), "mod.py");
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        for (i, segment) in s.split('/').enumerate() {
            if segment.is_empty() || segment == "." || segment == ".." {
                continue;
            }
            if segment.contains('\0') {
                return Err(PathError::InvalidSegment {
                    segment: segment.escape_default().to_string(),
                    position: i,
                    message: "NUL byte in segment".to_string(),
                });
            }
            segments.push(segment.to_string());
        }

        let leaf = segments.pop().ok_or_else(|| PathError::Empty {
            input: s.to_string(),
        })?;

        Ok(ModulePath {
            directories: segments,
            leaf,
        })
    }

    /// Directory segments, nearest the root first.
    pub fn directories(&self) -> &[String] {
        &self.directories
    }

    /// The leaf filename, exactly as requested.
    pub fn leaf(&self) -> &str {
        &self.leaf
    }

    /// The leaf filename with any `?query` or `#fragment` suffix removed.
    ///
    /// This is the key local resolutions are cached under.
    pub fn raw_filename(&self) -> &str {
        let end = self.leaf.find(['?', '#']).unwrap_or(self.leaf.len());
        &self.leaf[..end]
    }

    /// Every directory prefix in root-to-leaf order.
    ///
    /// For `a/b/c.py` this yields `a` then `a/b`.
    pub fn prefixes(&self) -> impl Iterator<Item = String> + '_ {
        (1..=self.directories.len()).map(|n| self.directories[..n].join("/"))
    }

    /// The directory containing the leaf, or the empty string at the root.
    pub fn parent(&self) -> String {
        self.directories.join("/")
    }

    /// All segments, directories then leaf.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.directories
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.leaf.as_str()))
    }

    /// Number of segments including the leaf.
    pub fn len(&self) -> usize {
        self.directories.len() + 1
    }

    /// A module path always has a leaf, so this is never true.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dir in &self.directories {
            write!(f, "{}/", dir)?;
        }
        write!(f, "{}", self.leaf)
    }
}

impl std::str::FromStr for ModulePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
