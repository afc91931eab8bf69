//! 下载目录轮询
//!
//! Chromium 下载时先写 `.crdownload` 临时文件，完成后改名。
//! 这里等待出现一个新的、大小稳定的非临时文件。

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::BrowserError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 列出目录中已完成的文件
pub async fn completed_files(dir: &Path) -> Result<HashSet<PathBuf>, BrowserError> {
    let mut files = HashSet::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && !is_partial(&path) {
            files.insert(path);
        }
    }
    Ok(files)
}

/// 等待 `dir` 中出现 `before` 之外的新文件
pub async fn wait_for_new_file(
    dir: &Path,
    before: &HashSet<PathBuf>,
    timeout: Duration,
) -> Result<PathBuf, BrowserError> {
    let deadline = Instant::now() + timeout;
    // 上一轮看到的候选文件及其大小
    let mut candidate: Option<(PathBuf, u64)> = None;

    loop {
        let current = completed_files(dir).await?;
        let newest = newest_file(current.difference(before)).await?;

        if let Some((path, size)) = newest {
            match &candidate {
                Some((prev, prev_size)) if *prev == path && *prev_size == size && size > 0 => {
                    debug!("下载完成: {} ({} 字节)", path.display(), size);
                    return Ok(path);
                }
                _ => candidate = Some((path, size)),
            }
        }

        if Instant::now() >= deadline {
            return Err(BrowserError::DownloadTimedOut {
                timeout_secs: timeout.as_secs(),
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// 取修改时间最新的文件，时间相同按路径排序
async fn newest_file<'a>(
    paths: impl Iterator<Item = &'a PathBuf>,
) -> Result<Option<(PathBuf, u64)>, BrowserError> {
    let mut newest: Option<(SystemTime, PathBuf, u64)> = None;
    for path in paths {
        let metadata = fs::metadata(path).await?;
        let key = (metadata.modified()?, path.clone(), metadata.len());
        if newest.as_ref().map_or(true, |current| (&key.0, &key.1) > (&current.0, &current.1)) {
            newest = Some(key);
        }
    }
    Ok(newest.map(|(_, path, size)| (path, size)))
}

fn is_partial(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("crdownload") | Some("tmp")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ignores_existing_and_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.pdf"), b"old").unwrap();
        let before = completed_files(dir.path()).await.unwrap();

        std::fs::write(dir.path().join("receipt.pdf.crdownload"), b"partial").unwrap();
        let writer_dir = dir.path().to_path_buf();
        tokio::spawn(async move {
            sleep(Duration::from_millis(300)).await;
            std::fs::write(writer_dir.join("receipt.pdf"), b"%PDF-1.4").unwrap();
        });

        let path = wait_for_new_file(dir.path(), &before, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(path.ends_with("receipt.pdf"));
    }

    #[tokio::test]
    async fn test_picks_most_recent_of_several_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let before = completed_files(dir.path()).await.unwrap();

        let older = dir.path().join("a-receipt.pdf");
        let newer = dir.path().join("b-receipt.pdf");
        std::fs::write(&older, b"%PDF-old").unwrap();
        std::fs::write(&newer, b"%PDF-new").unwrap();
        let now = SystemTime::now();
        std::fs::File::options()
            .write(true)
            .open(&older)
            .unwrap()
            .set_modified(now - Duration::from_secs(60))
            .unwrap();
        std::fs::File::options()
            .write(true)
            .open(&newer)
            .unwrap()
            .set_modified(now)
            .unwrap();

        for _ in 0..3 {
            let path = wait_for_new_file(dir.path(), &before, Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(path, newer);
        }
    }

    #[tokio::test]
    async fn test_times_out_without_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let before = completed_files(dir.path()).await.unwrap();
        let result = wait_for_new_file(dir.path(), &before, Duration::from_millis(600)).await;
        assert!(matches!(result, Err(BrowserError::DownloadTimedOut { .. })));
    }
}
