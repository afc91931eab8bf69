//! 页面能力抽象
//!
//! 上层只依赖这组原语，不直接接触 chromiumoxide，
//! 测试中可以用脚本化的假页面替换

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrowserError;
use crate::infrastructure::dialogs::{DialogLedger, DialogPlan};

/// 页面探测条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    /// 页面正文包含该文本（不区分大小写）
    Text(&'static str),
    /// 存在匹配该 CSS 选择器的元素
    Selector(&'static str),
}

/// 一个浏览器标签页能做的事
#[async_trait]
pub trait PortalPage: Send + Sync {
    /// 导航到指定 URL 并等待加载完成
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// 清空输入框后逐字输入
    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// 设置下拉框的值并触发 change 事件
    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    /// 对单个元素截图（PNG）
    async fn capture_element(&self, selector: &str) -> Result<Vec<u8>, BrowserError>;

    /// 在超时内等待条件成立；超时返回 `Ok(false)`
    async fn probe(&self, probe: Probe, timeout: Duration) -> Result<bool, BrowserError>;

    /// 按计划自动处理之后弹出的原生对话框
    async fn arm_dialogs(&self, plan: DialogPlan) -> Result<DialogLedger, BrowserError>;

    /// 点击下载入口并等待文件落盘，返回下载目录中的新文件
    async fn download(&self, trigger: &str, timeout: Duration) -> Result<PathBuf, BrowserError>;
}
