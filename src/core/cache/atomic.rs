use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::core::error::{UpdaterError, UpdaterResult};

/// Replace `target` with `data` so readers see either the old file or the
/// new one, never a partial write.
///
/// The bytes go to a temporary file in `dir` (same filesystem as `target`)
/// which is then renamed over `target`. On any error the temporary file is
/// removed and `target` is left as it was. Runs on the blocking pool.
pub async fn write_atomic(dir: &Path, target: &Path, data: Vec<u8>) -> UpdaterResult<()> {
    let dir = dir.to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&dir, &target, &data))
        .await
        .map_err(|e| UpdaterError::Worker(e.to_string()))?
}

pub(crate) fn write_atomic_blocking(dir: &Path, target: &Path, data: &[u8]) -> UpdaterResult<()> {
    let mut temp = tempfile::Builder::new()
        .prefix(".quiltflower-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| UpdaterError::io(dir, e))?;

    temp.write_all(data)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| UpdaterError::io(temp.path(), e))?;

    temp.persist(target)
        .map(drop)
        .map_err(|e| UpdaterError::io(target, e.error))
}

/// Delete `path`, treating "already gone" as success.
pub async fn remove_if_exists(path: &Path) -> UpdaterResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(UpdaterError::io(path, e)),
    }
}
