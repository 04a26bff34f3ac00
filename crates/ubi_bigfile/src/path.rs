//! Slash delimited lookup keys for entries of a big file.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Directory components and a file name.
///
/// Paths are compared case sensitively against stored names. Repeated slashes
/// collapse, the last non-empty segment is the file name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    directories: Vec<String>,
    file_name: String,
}

impl Path {
    /// Create a path from its parts
    pub fn new(directories: Vec<String>, file_name: impl Into<String>) -> Self {
        Self {
            directories,
            file_name: file_name.into(),
        }
    }

    /// Directory names, outermost first
    pub fn directories(&self) -> &[String] {
        &self.directories
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Whether the path names no file at all
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.file_name.is_empty()
    }
}

impl From<&str> for Path {
    fn from(value: &str) -> Self {
        let mut segments: Vec<String> = value
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(Into::into)
            .collect();

        let file_name = segments.pop().unwrap_or_default();
        Self {
            directories: segments,
            file_name,
        }
    }
}

impl FromStr for Path {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Path::from(s))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for directory in &self.directories {
            write!(f, "{directory}/")?;
        }
        f.write_str(&self.file_name)
    }
}
