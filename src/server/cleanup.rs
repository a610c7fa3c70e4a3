use std::path::PathBuf;

/// ファイルをバックグラウンドで削除（失敗はログのみ）
pub fn spawn_cleanup(paths: Vec<PathBuf>) {
    if paths.is_empty() {
        return;
    }
    tokio::spawn(async move {
        remove_files(&paths).await;
    });
}

pub async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "削除"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "ファイル削除に失敗"),
        }
    }
}
