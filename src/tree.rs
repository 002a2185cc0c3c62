use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, error, info};

use crate::{Error, Result};

/// Keeps only ASCII letters and digits. Everything else is removed, not replaced.
///
/// Distinct names can collapse to the same token ("A.B" and "AB"); callers that
/// care have to detect that themselves.
pub fn sanitize_name(name: &str) -> String {
    name.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Writes the harvest as a directory tree of JSON collections under `root`.
#[derive(Debug, Clone)]
pub struct TreeWriter {
    root: PathBuf,
}

impl TreeWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates `rel` and its parents under the root. Failures are logged, not returned:
    /// a missing directory surfaces again as a write error.
    pub async fn ensure_dir(&self, rel: &Path) -> PathBuf {
        let dir = self.root.join(rel);
        match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => debug!(dir = %dir.display(), "directory ready"),
            Err(e) => error!(dir = %dir.display(), error = %e, "couldn't create directory"),
        }
        dir
    }

    /// Serializes `records` as one pretty-printed JSON array to `rel_dir/file_name`,
    /// replacing any previous file. Returns the written path.
    pub async fn write_records<S: Serialize>(
        &self,
        rel_dir: &Path,
        file_name: &str,
        records: &[S],
    ) -> Result<PathBuf> {
        let path = self.ensure_dir(rel_dir).await.join(file_name);
        let json = serde_json::to_vec_pretty(records).map_err(Error::Serialize)?;

        let mut file = File::create(&path).await?;
        file.write_all(&json).await?;
        file.flush().await?;

        info!(path = %path.display(), count = records.len(), "saved");
        Ok(path)
    }
}
