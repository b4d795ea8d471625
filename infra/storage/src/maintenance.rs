use crate::security::TMP_MARKER;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{error, info};

/// Temporary files younger than this may belong to a concurrent writer.
const STALE_AFTER: Duration = Duration::from_secs(300);

pub(crate) async fn purge_tmp(root: &Path) {
    let root = root.to_path_buf();
    let now = SystemTime::now();

    match tokio::task::spawn_blocking(move || remove_stale(&root, now, STALE_AFTER)).await {
        Ok((removed, failed)) if removed > 0 || failed > 0 => {
            info!(removed, failed, "Cleaned up temporary files");
        },
        Err(e) => {
            error!(error = %e, "Temp file cleanup task panicked");
        },
        _ => {},
    }
}

fn remove_stale(root: &Path, now: SystemTime, threshold: Duration) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    let Ok(entries) = std::fs::read_dir(root) else {
        return (removed, failed);
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_tmp = entry.file_name().to_str().is_some_and(|name| name.contains(TMP_MARKER));
        let is_file = entry.file_type().is_ok_and(|t| t.is_file());

        if is_file && is_tmp && is_stale(&path, now, threshold) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(p = %path.display(), err = %e, "IO fail");
                    failed += 1;
                },
            }
        }
    }

    (removed, failed)
}

fn is_stale(path: &Path, now: SystemTime, threshold: Duration) -> bool {
    std::fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| now.duration_since(modified).ok())
        .is_none_or(|age| age > threshold)
}
