//! # Nil Return Agent
//!
//! 自动完成 KRA iTax 门户零申报的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器标签页），只暴露能力
//! - `PortalPage` - 页面能力抽象（导航、输入、探测、截图、下载、对话框）
//! - `ChromePage` - 基于 chromiumoxide 的实现
//! - `browser/` - 每个请求独占的无头浏览器
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程顺序
//! - `CaptchaSolver` - 算术验证码识别（OCR → 解析 → 计算）
//! - `ArtifactPublisher` - 回执上传（尽力而为）
//! - `StatusReporter` - 结果回写和审计记录（尽力而为）
//!
//! ### ③ 门户层（Portal）
//! - `portal/` - 所有门户页面结构知识都在这里
//! - `PortalSession` - 登录状态机
//! - `FilingWorkflow` - 零申报向导
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一个申报请求"的完整处理流程
//! - `FilingCtx` - 上下文封装（请求 ID + 私有临时目录）
//! - `FilingPipeline` - 流程编排（login → file → publish → report）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量请求处理器，管理并发和结果落盘
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod portal;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{FilingRequest, FilingResponse, FilingStatus};
pub use orchestrator::App;
pub use workflow::{FilingCtx, FilingPipeline};
