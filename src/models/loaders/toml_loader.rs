use crate::error::FileError;
use crate::models::request::FilingRequest;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 队列中的申报请求（附带来源文件）
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub request: FilingRequest,
    pub file_path: PathBuf,
}

/// 从 TOML 文件加载单个申报请求
pub async fn load_request(toml_file_path: &Path) -> Result<QueuedRequest, FileError> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|source| FileError::ReadFailed {
            path: toml_file_path.display().to_string(),
            source,
        })?;

    let request: FilingRequest =
        toml::from_str(&content).map_err(|source| FileError::TomlParseFailed {
            path: toml_file_path.display().to_string(),
            source,
        })?;

    Ok(QueuedRequest {
        request,
        file_path: toml_file_path.to_path_buf(),
    })
}

/// 从文件夹中加载所有 TOML 申报请求
///
/// 单个文件解析失败只记录警告，不影响其他请求
pub async fn load_all_requests(folder_path: &str) -> Result<Vec<QueuedRequest>, FileError> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        });
    }

    let read_failed = |source| FileError::ReadFailed {
        path: folder_path.to_string(),
        source,
    };

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder).await.map_err(read_failed)?;
    while let Some(entry) = entries.next_entry().await.map_err(read_failed)? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            paths.push(path);
        }
    }
    // 目录遍历顺序不稳定，按文件名处理
    paths.sort();

    let mut requests = Vec::with_capacity(paths.len());
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        match load_request(&path).await {
            Ok(queued) => requests.push(queued),
            Err(e) => tracing::warn!("加载文件失败 {}: {}", path.display(), e),
        }
    }

    Ok(requests)
}
