//! Finalization of completed transfers into stable storage.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::DownloadError;
use crate::filename::filename_from_url;

/// Moves a finished spool file to its permanent destination.
///
/// The destination filename derives from the last path component of the
/// remote source URL. An existing file at the destination is removed first
/// (overwrite semantics: last download wins). The final step is a rename,
/// never a copy, so a crash mid-finalize can leave a stale spool file but
/// never a half-written destination.
///
/// # Errors
///
/// Returns [`DownloadError::Finalize`] when the destination directory
/// cannot be created, the existing file cannot be removed, or the rename
/// fails. The caller must not mark the item downloaded in that case.
pub(crate) async fn finalize_download(
    temp_path: &Path,
    destination_dir: &Path,
    remote_source: &str,
) -> Result<PathBuf, DownloadError> {
    tokio::fs::create_dir_all(destination_dir)
        .await
        .map_err(|e| DownloadError::finalize(destination_dir, e))?;

    let destination = destination_dir.join(filename_from_url(remote_source));

    match tokio::fs::remove_file(&destination).await {
        Ok(()) => debug!(path = %destination.display(), "replaced existing download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(DownloadError::finalize(&destination, e)),
    }

    tokio::fs::rename(temp_path, &destination)
        .await
        .map_err(|e| DownloadError::finalize(&destination, e))?;

    Ok(destination)
}
