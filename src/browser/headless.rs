use std::path::{Path, PathBuf};

use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::BrowserError;
use crate::infrastructure::ChromePage;

/// 一次申报独占的浏览器
///
/// 必须在所有退出路径上调用 [`BrowserSession::close`]；
/// 忘记调用时 chromiumoxide 在 drop 时会结束子进程，但不会等待它退出
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: ChromePage,
}

impl BrowserSession {
    /// 启动无头浏览器，下载目录指向 `download_dir`
    pub async fn launch(config: &Config, download_dir: &Path) -> Result<Self, BrowserError> {
        info!("🚀 启动浏览器...");
        debug!("下载目录: {}", download_dir.display());

        let mut builder = BrowserConfig::builder();
        builder = if config.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        if let Some(executable) = &config.chrome_executable {
            builder = builder.chrome_executable(Path::new(executable));
        }
        let browser_config = builder
            .args(vec![
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--remote-debugging-port=0",
            ])
            .build()
            .map_err(|message| {
                error!("配置浏览器失败: {}", message);
                BrowserError::ConfigurationFailed { message }
            })?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            error!("启动浏览器失败: {}", e);
            BrowserError::LaunchFailed { source: Box::new(e) }
        })?;
        debug!("浏览器启动成功");

        // 在后台处理浏览器事件
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        // 等待浏览器状态同步
        sleep(tokio::time::Duration::from_millis(300)).await;

        let download_params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_dir.to_string_lossy().to_string())
            .build()
            .map_err(|message| BrowserError::ConfigurationFailed { message })?;
        browser.execute(download_params).await?;

        let page = browser.new_page("about:blank").await.map_err(|e| {
            error!("创建页面失败: {}", e);
            BrowserError::LaunchFailed { source: Box::new(e) }
        })?;

        Ok(Self {
            browser,
            handler_task,
            page: ChromePage::new(page, PathBuf::from(download_dir)),
        })
    }

    pub fn page(&self) -> &ChromePage {
        &self.page
    }

    /// 关闭浏览器并等待进程退出，错误只记录
    pub async fn close(mut self) {
        self.page.shutdown();
        if let Err(e) = self.browser.close().await {
            warn!("关闭浏览器失败: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("等待浏览器进程退出失败: {}", e);
        }
        self.handler_task.abort();
        debug!("浏览器已关闭");
    }
}
