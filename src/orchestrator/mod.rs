//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<QueuedRequest>)
//!     ↓
//! workflow::FilingPipeline (处理单个 FilingRequest)
//!     ↓
//! portal (PortalSession / FilingWorkflow)
//!     ↓
//! services (能力层：captcha / publish / report)
//!     ↓
//! infrastructure (基础设施：PortalPage)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：每个请求独占一个浏览器，请求之间不共享可变状态
//! 2. **向下依赖**：编排层 → workflow → portal → services → infrastructure
//! 3. **无业务逻辑**：只做调度、落盘和统计

pub mod batch_processor;

pub use batch_processor::App;
