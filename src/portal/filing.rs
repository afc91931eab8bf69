//! 零申报向导
//!
//! 只接受 [`AuthenticatedSession`]，未登录时在类型上就无法调用

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{BrowserError, FilingStepFailed};
use crate::infrastructure::{DialogPlan, PortalPage, Probe};
use crate::models::{receipt_file_name, FilingArtifact, FilingRequest};
use crate::portal::markup;
use crate::portal::session::AuthenticatedSession;

const RECEIPT_CONTENT_TYPE: &str = "application/pdf";

/// 零申报向导
#[derive(Debug, Clone)]
pub struct FilingWorkflow {
    portal_timeout: Duration,
    receipt_timeout: Duration,
}

impl FilingWorkflow {
    pub fn new(portal_timeout: Duration, receipt_timeout: Duration) -> Self {
        Self {
            portal_timeout,
            receipt_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.portal_timeout, config.receipt_timeout)
    }

    /// 完成零申报并把回执下载到 `work_dir`
    ///
    /// 任何一步失败都返回 [`FilingStepFailed`]，不会再走登录分支
    pub async fn file_nil_return<P: PortalPage + ?Sized>(
        &self,
        session: &AuthenticatedSession<'_, P>,
        request: &FilingRequest,
        work_dir: &Path,
        filing_date: NaiveDate,
    ) -> Result<FilingArtifact, FilingStepFailed> {
        let page = session.page();

        info!("📝 打开零申报页面");
        step("打开申报菜单", page.click(markup::MENU_RETURNS).await)?;
        step("打开零申报子菜单", page.click(markup::SUBMENU_NIL_RETURN).await)?;
        self.wait_for(page, "申报表单", markup::REGISTRATION_TYPE_SELECT).await?;

        let option = markup::registration_option(request.registration_type());
        debug!("申报人类别: {} ({})", request.registration_type().name(), option);
        step(
            "选择申报人类别",
            page.select_option(markup::REGISTRATION_TYPE_SELECT, option).await,
        )?;

        // 必须在第一个对话框弹出之前挂上处理计划
        let plan = DialogPlan::nil_return();
        let ledger = step("挂载对话框处理", page.arm_dialogs(plan.clone()).await)?;

        step("进入下一步", page.click(markup::WIZARD_NEXT_BUTTON).await)?;
        self.wait_for(page, "声明页", markup::DECLARATION_CHECKBOX).await?;
        step("勾选声明", page.click(markup::DECLARATION_CHECKBOX).await)?;
        step("提交申报", page.click(markup::SUBMIT_BUTTON).await)?;

        if !ledger.wait_complete(self.portal_timeout).await {
            return Err(FilingStepFailed::new(
                "处理确认对话框",
                format!("只出现了 {}/{} 个对话框", ledger.handled().len(), plan.len()),
            ));
        }
        if !ledger.matches(&plan) {
            warn!("⚠️ 对话框处理与计划不一致: {:?}", ledger.handled());
            return Err(FilingStepFailed::new(
                "处理确认对话框",
                format!("实际动作 {:?}，计划 {:?}", ledger.actions(), plan.actions()),
            ));
        }
        info!("✓ 申报已提交，等待回执");

        let receipt_ready = step(
            "等待回执",
            page.probe(Probe::Selector(markup::RECEIPT_LINK), self.receipt_timeout).await,
        )?;
        if !receipt_ready {
            return Err(FilingStepFailed::new(
                "等待回执",
                format!("{} 秒内没有出现回执下载入口", self.receipt_timeout.as_secs()),
            ));
        }

        let downloaded = step(
            "下载回执",
            page.download(markup::RECEIPT_LINK, self.receipt_timeout).await,
        )?;

        let file_name = receipt_file_name(request.taxpayer_name(), request.pin(), filing_date);
        let path = work_dir.join(&file_name);
        tokio::fs::rename(&downloaded, &path)
            .await
            .map_err(|e| {
                let detail = format!("{} → {}: {}", downloaded.display(), path.display(), e);
                FilingStepFailed::new("保存回执", detail)
            })?;
        let size_bytes = tokio::fs::metadata(&path)
            .await
            .map_err(|e| FilingStepFailed::new("保存回执", e.to_string()))?
            .len();

        info!("✓ 回执已保存: {} ({} 字节)", file_name, size_bytes);
        Ok(FilingArtifact {
            path,
            file_name,
            size_bytes,
            content_type: RECEIPT_CONTENT_TYPE.to_string(),
        })
    }

    async fn wait_for<P: PortalPage + ?Sized>(
        &self,
        page: &P,
        what: &'static str,
        selector: &'static str,
    ) -> Result<(), FilingStepFailed> {
        let found = step(what, page.probe(Probe::Selector(selector), self.portal_timeout).await)?;
        if found {
            Ok(())
        } else {
            Err(FilingStepFailed::new(what, format!("超时未出现 {}", selector)))
        }
    }
}

fn step<T>(name: &'static str, result: Result<T, BrowserError>) -> Result<T, FilingStepFailed> {
    result.map_err(|e| FilingStepFailed::new(name, e.to_string()))
}
