//! Chromium 页面 - 基础设施层
//!
//! 持有唯一的 page 资源，把 `PortalPage` 的原语翻译成 CDP 调用

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::browser::downloads;
use crate::error::BrowserError;
use crate::infrastructure::dialogs::{DialogLedger, DialogPlan};
use crate::infrastructure::portal_page::{PortalPage, Probe};

const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Chromium 页面
///
/// 职责：
/// - 持有唯一的 Page 资源和下载目录
/// - 不认识申报请求
/// - 不处理业务流程
pub struct ChromePage {
    page: Page,
    download_dir: PathBuf,
    dialog_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ChromePage {
    pub fn new(page: Page, download_dir: PathBuf) -> Self {
        Self {
            page,
            download_dir,
            dialog_tasks: Mutex::new(Vec::new()),
        }
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, BrowserError> {
        let result = self.page.evaluate(js_code.into()).await?;
        let value = result.into_value()?;
        Ok(value)
    }

    /// 停止后台的对话框监听任务
    pub fn shutdown(&self) {
        let mut tasks = self
            .dialog_tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    async fn element(&self, selector: &str) -> Result<Element, BrowserError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound {
                selector: selector.to_string(),
            })
    }

    async fn probe_once(&self, probe: Probe) -> Result<bool, BrowserError> {
        let js_code = match probe {
            Probe::Text(text) => format!(
                "(() => {{ const body = document.body; \
                 return !!body && body.innerText.toLowerCase().includes({}); }})()",
                js_string(&text.to_lowercase())?
            ),
            Probe::Selector(selector) => format!(
                "document.querySelector({}) !== null",
                js_string(selector)?
            ),
        };
        self.eval_as::<bool>(js_code).await
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl PortalPage for ChromePage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        debug!("导航到: {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::navigation(url, e))?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let element = self.element(selector).await?;
        self.eval_as::<bool>(format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el) return false; el.value = ''; return true; }})()",
            js_string(selector)?
        ))
        .await?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::element_action("click", selector, e))?;
        element
            .type_str(value)
            .await
            .map_err(|e| BrowserError::element_action("type", selector, e))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        debug!("点击: {}", selector);
        self.element(selector)
            .await?
            .click()
            .await
            .map_err(|e| BrowserError::element_action("click", selector, e))?;
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let found: bool = self
            .eval_as(format!(
                r#"
                (() => {{
                    const el = document.querySelector({});
                    if (!el) return false;
                    el.value = {};
                    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return true;
                }})()
                "#,
                js_string(selector)?,
                js_string(value)?
            ))
            .await?;
        if found {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            })
        }
    }

    async fn capture_element(&self, selector: &str) -> Result<Vec<u8>, BrowserError> {
        self.element(selector)
            .await?
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| BrowserError::element_action("screenshot", selector, e))
    }

    async fn probe(&self, probe: Probe, timeout: Duration) -> Result<bool, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.probe_once(probe).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                // 页面跳转过程中执行上下文会短暂失效
                Err(e) if Instant::now() < deadline => debug!("探测 {:?} 暂时失败: {}", probe, e),
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(PROBE_INTERVAL).await;
        }
    }

    async fn arm_dialogs(&self, plan: DialogPlan) -> Result<DialogLedger, BrowserError> {
        let ledger = DialogLedger::new(plan);
        let mut events = self
            .page
            .event_listener::<EventJavascriptDialogOpening>()
            .await?;

        let page = self.page.clone();
        let task_ledger = ledger.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let action = task_ledger.on_dialog(&event.message);
                debug!("对话框 {:?}: {}", action, event.message);
                if let Err(e) = page
                    .execute(HandleJavaScriptDialogParams::new(action.accepts()))
                    .await
                {
                    warn!("处理对话框失败: {}", e);
                }
            }
        });

        self.dialog_tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(task);
        Ok(ledger)
    }

    async fn download(&self, trigger: &str, timeout: Duration) -> Result<PathBuf, BrowserError> {
        let before = downloads::completed_files(&self.download_dir).await?;
        self.click(trigger).await?;
        downloads::wait_for_new_file(&self.download_dir, &before, timeout).await
    }
}

/// 把 Rust 字符串转成 JS 字面量
fn js_string(value: &str) -> Result<String, BrowserError> {
    Ok(serde_json::to_string(value)?)
}
