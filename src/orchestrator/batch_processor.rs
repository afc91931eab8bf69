//! 批量申报处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量申报请求的调度和结果落盘。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、申报流水线
//! 2. **批量加载**：扫描并加载所有待处理的申报请求（`Vec<QueuedRequest>`）
//! 3. **并发控制**：使用 Semaphore 限制同时运行的浏览器数量
//! 4. **结果落盘**：每个请求写一个 `{请求名}.result.json`
//! 5. **全局统计**：按状态汇总所有请求的结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个申报的细节
//! - **无共享资源**：每个请求由流水线单独启动浏览器
//! - **向下委托**：委托 FilingPipeline 处理单个请求

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::FileError;
use crate::models::{load_all_requests, FilingResponse, FilingStatus, QueuedRequest};
use crate::utils::logging::{self, FilingStats};
use crate::workflow::{FilingCtx, FilingPipeline};

/// 应用主结构
pub struct App {
    config: Config,
    pipeline: Arc<FilingPipeline>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::init_log_file(&config.output_log_file)?;
        logging::log_startup(config.max_concurrent_filings, &config.portal_url);

        let pipeline = Arc::new(FilingPipeline::from_config(&config));
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// 使用指定的流水线
    pub fn with_pipeline(config: Config, pipeline: Arc<FilingPipeline>) -> Self {
        Self { config, pipeline }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<FilingStats> {
        info!("\n📁 正在扫描待处理的申报请求...");
        let queued = load_all_requests(&self.config.requests_folder).await?;

        if queued.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML文件，程序结束");
            return Ok(FilingStats::default());
        }

        logging::log_requests_loaded(queued.len(), self.config.max_concurrent_filings);
        tokio::fs::create_dir_all(&self.config.results_folder).await?;

        let stats = self.process_all(queued).await?;
        logging::print_final_stats(&stats, &self.config.output_log_file);

        Ok(stats)
    }

    /// 并发处理所有请求
    async fn process_all(&self, queued: Vec<QueuedRequest>) -> Result<FilingStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_filings));
        let mut stats = FilingStats {
            total: queued.len(),
            ..Default::default()
        };

        let mut handles = Vec::new();
        for (idx, queued_request) in queued.into_iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await?;
            let pipeline = self.pipeline.clone();
            let results_folder = PathBuf::from(&self.config.results_folder);
            let request_id = request_id_of(&queued_request.file_path, idx);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                process_one(&pipeline, queued_request, &request_id, &results_folder).await
            });
            handles.push((idx + 1, handle));
        }

        for (index, handle) in handles {
            match handle.await {
                Ok(status) => stats.record(status),
                Err(e) => {
                    error!("[请求 {}] 任务执行失败: {}", index, e);
                    stats.record(FilingStatus::Failed);
                }
            }
        }

        Ok(stats)
    }
}

/// 处理单个请求并落盘结果
async fn process_one(
    pipeline: &FilingPipeline,
    queued: QueuedRequest,
    request_id: &str,
    results_folder: &Path,
) -> FilingStatus {
    let response = match FilingCtx::new(request_id, &queued.request) {
        Ok(ctx) => pipeline.run(&ctx, &queued.request).await,
        Err(e) => {
            error!("[申报 {}] ❌ 无法创建临时目录: {}", request_id, e);
            FilingResponse::from(&crate::models::FilingOutcome::failed())
        }
    };

    let result_path = results_folder.join(format!("{}.result.json", request_id));
    if let Err(e) = write_response(&result_path, &response).await {
        error!("[申报 {}] ❌ 写入结果失败: {}", request_id, e);
        return response.status;
    }

    // 结果已落盘，删除已消费的请求文件
    match tokio::fs::remove_file(&queued.file_path).await {
        Ok(()) => info!("[申报 {}] 🗑️ 已删除请求文件", request_id),
        Err(e) => warn!("[申报 {}] ⚠️ 删除请求文件失败: {}", request_id, e),
    }

    response.status
}

async fn write_response(path: &Path, response: &FilingResponse) -> Result<(), FileError> {
    let write_failed = |source| FileError::WriteFailed {
        path: path.display().to_string(),
        source,
    };
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| write_failed(std::io::Error::from(e)))?;
    tokio::fs::write(path, json).await.map_err(write_failed)
}

/// 请求 ID 取请求文件名，没有时用序号
fn request_id_of(path: &Path, idx: usize) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("request-{}", idx + 1))
}
