//! 申报结果
//!
//! 结果只能写入一次，后续任何组件的失败都不能改写它

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthFailure;

/// 对外可见的状态，固定五种
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilingStatus {
    Valid,
    Invalid,
    Locked,
    PasswordExpired,
    Failed,
}

impl FilingStatus {
    pub fn is_success(self) -> bool {
        self == FilingStatus::Valid
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilingStatus::Valid => "Valid",
            FilingStatus::Invalid => "Invalid",
            FilingStatus::Locked => "Locked",
            FilingStatus::PasswordExpired => "PasswordExpired",
            FilingStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for FilingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AuthFailure> for FilingStatus {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::InvalidCredentials => FilingStatus::Invalid,
            AuthFailure::AccountLocked => FilingStatus::Locked,
            AuthFailure::PasswordExpired => FilingStatus::PasswordExpired,
        }
    }
}

/// 最终结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilingOutcome {
    pub status: FilingStatus,
    pub receipt_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FilingOutcome {
    pub fn new(status: FilingStatus, receipt_url: Option<String>) -> Self {
        Self {
            status,
            receipt_url,
            timestamp: Utc::now(),
        }
    }

    pub fn failed() -> Self {
        Self::new(FilingStatus::Failed, None)
    }
}

/// 只能写入一次的结果槽
#[derive(Debug, Default)]
pub struct OutcomeSlot {
    inner: OnceLock<FilingOutcome>,
}

impl OutcomeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入结果；已有结果时拒绝并把被拒绝的值还给调用方
    pub fn set(&self, outcome: FilingOutcome) -> Result<&FilingOutcome, FilingOutcome> {
        self.inner.set(outcome)?;
        Ok(self.get().unwrap_or_else(|| unreachable!("结果刚刚写入")))
    }

    pub fn get(&self) -> Option<&FilingOutcome> {
        self.inner.get()
    }

    /// 返回已有结果，没有时写入 `Failed`
    pub fn get_or_failed(&self) -> &FilingOutcome {
        self.inner.get_or_init(FilingOutcome::failed)
    }
}

/// 返回给请求方的结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingResponse {
    pub success: bool,
    pub status: FilingStatus,
    pub receipt_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&FilingOutcome> for FilingResponse {
    fn from(outcome: &FilingOutcome) -> Self {
        Self {
            success: outcome.status.is_success(),
            status: outcome.status,
            receipt_url: outcome.receipt_url.clone(),
            timestamp: outcome.timestamp,
        }
    }
}
