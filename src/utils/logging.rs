/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing
///
/// 默认 `info`，`RUST_LOG` 优先；`verbose` 时本 crate 提升到 `debug`
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "info,nil_return_agent=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n零申报处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(max_concurrent: usize, portal_url: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 并发零申报模式");
    info!("🌐 门户: {}", portal_url);
    info!("📊 最大并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 记录请求加载信息
pub fn log_requests_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 个待处理的申报请求", total);
    info!("📋 最多同时运行 {} 个浏览器\n", max_concurrent);
}

/// 打印最终统计信息
///
/// # 参数
/// - `stats`: 各状态的数量
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(stats: &FilingStats, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!("完成时间: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("{}", "=".repeat(60));
    info!("✅ 申报成功: {}/{}", stats.valid, stats.total);
    info!("🔑 账号或密码错误: {}", stats.invalid);
    info!("🔒 账号锁定: {}", stats.locked);
    info!("⌛ 密码过期: {}", stats.password_expired);
    info!("❌ 失败: {}", stats.failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 按状态汇总的处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilingStats {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub locked: usize,
    pub password_expired: usize,
    pub failed: usize,
}

impl FilingStats {
    pub fn record(&mut self, status: crate::models::FilingStatus) {
        use crate::models::FilingStatus;
        match status {
            FilingStatus::Valid => self.valid += 1,
            FilingStatus::Invalid => self.invalid += 1,
            FilingStatus::Locked => self.locked += 1,
            FilingStatus::PasswordExpired => self.password_expired += 1,
            FilingStatus::Failed => self.failed += 1,
        }
    }
}
