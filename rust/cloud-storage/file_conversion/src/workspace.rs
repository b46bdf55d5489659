use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::Result;

/// A scratch directory owned by one conversion job. The directory and everything in it is
/// removed when the workspace is dropped.
#[derive(Debug)]
pub struct JobWorkspace {
    job_id: String,
    dir: TempDir,
}

impl JobWorkspace {
    /// Creates a workspace under the system temp directory
    pub fn new(job_id: impl ToString) -> Result<Self> {
        Self::new_in(std::env::temp_dir(), job_id)
    }

    /// Creates a workspace under `root`
    pub fn new_in(root: impl AsRef<Path>, job_id: impl ToString) -> Result<Self> {
        let job_id = job_id.to_string();
        let dir = tempfile::Builder::new()
            .prefix(&format!("docvault-job-{job_id}-"))
            .tempdir_in(root)?;
        tracing::trace!(job_id = %job_id, path = %dir.path().display(), "created job workspace");
        Ok(Self { job_id, dir })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `bytes` to `name` inside the workspace, returning the full path
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.file_path(name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.file_path(name))?)
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(crate::archive::sanitize_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_on_drop() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let workspace = JobWorkspace::new_in(root.path(), "job-1")?;
        let path = workspace.write("input.pdf", b"%PDF")?;

        assert!(path.starts_with(workspace.path()));
        assert_eq!(workspace.read("input.pdf")?, b"%PDF");
        assert_eq!(workspace.job_id(), "job-1");

        let dir = workspace.path().to_path_buf();
        drop(workspace);
        assert!(!dir.exists());
        Ok(())
    }

    #[test]
    fn keeps_files_inside() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let workspace = JobWorkspace::new_in(root.path(), "job-2")?;
        let path = workspace.write("../escape.txt", b"x")?;
        assert_eq!(path.parent(), Some(workspace.path()));
        Ok(())
    }
}
