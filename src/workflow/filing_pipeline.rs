//! 申报流水线 - 流程层
//!
//! 核心职责：定义"一个申报请求"的完整处理流程
//!
//! 流程顺序：
//! 1. 启动浏览器（请求独占）
//! 2. PortalSession 登录 → FilingWorkflow 零申报 → 下载回执
//! 3. ArtifactPublisher 上传回执（失败不影响结果）
//! 4. StatusReporter 回写结果和审计记录（失败不影响结果）
//! 5. 关闭浏览器（所有退出路径）

use std::sync::Arc;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{error, info, info_span, warn, Instrument};

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::error::{AppError, PortalError};
use crate::infrastructure::PortalPage;
use crate::models::{
    FilingArtifact, FilingOutcome, FilingRequest, FilingResponse, FilingStatus, OutcomeSlot,
};
use crate::portal::{FilingWorkflow, LoginStats, PortalSession, SessionSettings};
use crate::services::{
    build_ocr_engine, ArtifactPublisher, ArtifactStore, CaptchaSolver, HistoryRecord,
    HttpArtifactStore, HttpStatusStore, OcrEngine, StatusReporter, StatusStore,
};
use crate::workflow::filing_ctx::FilingCtx;

/// 申报流水线
///
/// - 编排完整的申报流程
/// - 把内部错误归并为固定的几种结果
/// - 不持有浏览器（每次运行单独启动）
/// - 多个请求可以并发共用同一条流水线
pub struct FilingPipeline {
    config: Config,
    solver: CaptchaSolver,
    session_settings: SessionSettings,
    workflow: FilingWorkflow,
    publisher: ArtifactPublisher,
    reporter: StatusReporter,
}

impl FilingPipeline {
    pub fn new(
        config: &Config,
        ocr: Arc<dyn OcrEngine>,
        store: Arc<dyn ArtifactStore>,
        status: Arc<dyn StatusStore>,
    ) -> Self {
        Self {
            config: config.clone(),
            solver: CaptchaSolver::new(ocr, config.captcha_max_attempts, config.captcha_trim_chars),
            session_settings: SessionSettings::from(config),
            workflow: FilingWorkflow::from_config(config),
            publisher: ArtifactPublisher::new(store),
            reporter: StatusReporter::new(status),
        }
    }

    /// 使用配置中的 OCR 后端和 HTTP 存储
    pub fn from_config(config: &Config) -> Self {
        let ocr: Arc<dyn OcrEngine> = Arc::from(build_ocr_engine(config));
        info!("🔍 OCR 后端: {}", ocr.name());
        Self::new(
            config,
            ocr,
            Arc::new(HttpArtifactStore::new(config)),
            Arc::new(HttpStatusStore::new(config)),
        )
    }

    /// 处理一个申报请求，返回给请求方的结果
    ///
    /// 永远不会返回内部错误：所有失败都归并为 [`FilingStatus`]
    pub async fn run(&self, ctx: &FilingCtx, request: &FilingRequest) -> FilingResponse {
        let browser = match BrowserSession::launch(&self.config, ctx.download_dir()).await {
            Ok(browser) => browser,
            Err(e) => {
                error!("{} ❌ 浏览器启动失败: {}", ctx, e);
                let outcome = FilingOutcome::failed();
                self.report(ctx, request, &outcome, LoginStats::default(), Some(e.to_string()))
                    .await;
                return FilingResponse::from(&outcome);
            }
        };

        let response = self.run_on_page(ctx, request, browser.page()).await;

        browser.close().await;
        response
    }

    /// 在已有页面上跑完整个流程（测试中使用假页面）
    pub async fn run_on_page<P: PortalPage + ?Sized>(
        &self,
        ctx: &FilingCtx,
        request: &FilingRequest,
        page: &P,
    ) -> FilingResponse {
        info!("{} ▶ 开始处理 (PIN: {})", ctx, request.pin());

        let mut stats = LoginStats::default();
        let deadline = self.config.run_deadline;
        // 会话层和向导层的日志都带上请求 ID
        let span = info_span!("filing", request = %ctx.request_id);
        let drive = self.drive(ctx, request, page, &mut stats).instrument(span);
        let driven = match timeout(deadline, drive).await {
            Ok(result) => result,
            Err(_) => Err(AppError::DeadlineExceeded {
                secs: deadline.as_secs(),
            }),
        };

        let (outcome, detail) = match driven {
            Ok(artifact) => {
                let receipt_url = self
                    .publisher
                    .publish(&artifact, request.pin(), ctx.filing_date)
                    .await;
                if receipt_url.is_none() {
                    warn!("{} ⚠️ 回执未上传，结果仍为成功", ctx);
                }
                (FilingOutcome::new(FilingStatus::Valid, receipt_url), None)
            }
            Err(e) => {
                let status = status_for(&e);
                match status {
                    FilingStatus::Failed => error!("{} ❌ 申报失败: {}", ctx, e),
                    _ => warn!("{} ❌ 登录被拒绝: {}", ctx, e),
                }
                (FilingOutcome::new(status, None), Some(e.to_string()))
            }
        };

        // 结果只写一次，之后的上报都读同一份
        let slot = OutcomeSlot::new();
        let outcome = match slot.set(outcome) {
            Ok(outcome) => outcome,
            Err(rejected) => {
                error!("{} ❌ 结果已存在，拒绝改写为 {}", ctx, rejected.status);
                slot.get_or_failed()
            }
        };
        self.report(ctx, request, outcome, stats, detail).await;

        info!("{} ■ 处理结束: {}", ctx, outcome.status);
        FilingResponse::from(outcome)
    }

    /// 登录 → 申报 → 下载
    async fn drive<P: PortalPage + ?Sized>(
        &self,
        ctx: &FilingCtx,
        request: &FilingRequest,
        page: &P,
        stats: &mut LoginStats,
    ) -> Result<FilingArtifact, AppError> {
        let mut session =
            PortalSession::new(page, self.solver.clone(), self.session_settings.clone());
        let login = session.login(request).await;
        *stats = session.stats();
        let authenticated = login?;
        info!(
            "{} ✓ 登录成功 (第 {} 轮，验证码共识别 {} 次)",
            ctx, stats.cycles, stats.captcha_attempts
        );

        let artifact = self
            .workflow
            .file_nil_return(&authenticated, request, ctx.work_dir(), ctx.filing_date)
            .await?;
        Ok(artifact)
    }

    async fn report(
        &self,
        ctx: &FilingCtx,
        request: &FilingRequest,
        outcome: &FilingOutcome,
        stats: LoginStats,
        detail: Option<String>,
    ) {
        let record = HistoryRecord {
            request_id: ctx.request_id.clone(),
            session_id: ctx.session_id.clone(),
            return_id: ctx.return_id.clone(),
            pin: request.pin().to_string(),
            taxpayer_name: request.taxpayer_name().to_string(),
            status: outcome.status,
            receipt_url: outcome.receipt_url.clone(),
            login_cycles: stats.cycles,
            captcha_attempts: stats.captcha_attempts,
            detail,
            started_at: ctx.started_at,
            finished_at: Utc::now(),
        };
        self.reporter.report(outcome, &record).await;
    }
}

/// 内部错误 → 对外状态
fn status_for(error: &AppError) -> FilingStatus {
    match error {
        AppError::Portal(PortalError::Auth(failure)) => FilingStatus::from(*failure),
        _ => FilingStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthFailure, FilingStepFailed};

    #[test]
    fn test_only_auth_failures_keep_their_status() {
        assert_eq!(
            status_for(&AppError::Portal(PortalError::Auth(AuthFailure::AccountLocked))),
            FilingStatus::Locked
        );
        assert_eq!(
            status_for(&AppError::Portal(PortalError::RetriesExhausted {
                what: "登录",
                attempts: 5
            })),
            FilingStatus::Failed
        );
        assert_eq!(
            status_for(&AppError::Filing(FilingStepFailed::new("等待回执", "timeout"))),
            FilingStatus::Failed
        );
        assert_eq!(
            status_for(&AppError::DeadlineExceeded { secs: 1 }),
            FilingStatus::Failed
        );
    }
}
