//! Consumers writing file tasks out.

use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::trace;

use crate::error::{Error, Result};
use crate::pool::FileConsumer;
use crate::task::FileTask;

/// Destination of consumed files
pub trait Output: Sync {
    /// Store `data` under the archive path `path`
    fn write(&self, path: &str, data: &[u8]) -> Result<()>;
}

/// Writes files below a directory of the file system
#[derive(Debug, Clone)]
pub struct DirectoryOutput {
    root: PathBuf,
}

impl DirectoryOutput {
    pub fn new(root: impl Into<PathBuf>) -> DirectoryOutput {
        DirectoryOutput { root: root.into() }
    }

    /// Where `path` lands, refusing paths that would leave the root
    pub fn target(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative.as_os_str().is_empty()
            || !relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(Error::InvalidPath(path.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

impl Output for DirectoryOutput {
    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let target = self.target(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        trace!(target = %target.display(), size = data.len(), "writing");
        fs::write(target, data)?;
        Ok(())
    }
}

/// Writes every file unchanged
#[derive(Debug, Clone)]
pub struct Extract<O> {
    pub output: O,
}

impl<O: Output> FileConsumer for Extract<O> {
    fn consume(&self, task: &FileTask) -> Result<()> {
        let data = task.read_to_end()?;
        self.output.write(task.path(), &data)
    }
}
