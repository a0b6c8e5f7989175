use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Single-use, isolated directory for one execution request.
///
/// Created fresh per request and never shared: concurrent evaluations cannot
/// collide on file names. Dropping the handle removes the directory, so
/// cleanup happens on every exit path including mid-pipeline errors;
/// `release()` exists for the paths that want the removal error logged.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create() -> io::Result<Self> {
        let dir = TempDir::with_prefix("coderound-")?;
        log::debug!("Created workspace {}", dir.path().to_string_lossy());
        Ok(Self { dir })
    }

    pub fn dirpath(&self) -> &Path {
        self.dir.path()
    }

    /// Writes the submitted source under the given deterministic file name
    /// and returns its full path.
    pub async fn write_source(&self, filename: &str, source: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(filename);
        tokio::fs::write(&path, source).await?;
        Ok(path)
    }

    /// Removes the workspace. A directory that is already gone is not an
    /// error; any other removal failure is logged and swallowed so release
    /// never masks the pipeline's own result.
    pub fn release(self) {
        let path = self.dir.path().to_owned();
        if let Err(e) = self.dir.close() {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!(
                    "Failed to remove workspace '{}': {:#}",
                    path.to_string_lossy(),
                    e
                );
            }
        }
    }
}
