//! 登录会话状态与页面分类结果

use std::fmt;

/// 门户会话状态，只由 `PortalSession` 修改
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    AwaitingCaptcha,
    Submitted,
    Authenticated,
    InvalidCredentials,
    AccountLocked,
    PasswordExpired,
    Failed,
}

impl SessionState {
    /// 登录阶段的终态
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Authenticated
                | SessionState::InvalidCredentials
                | SessionState::AccountLocked
                | SessionState::PasswordExpired
                | SessionState::Failed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 一次探测得到的原始信号
///
/// `false` 只表示"在超时内没看到"，不代表一定不存在
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BannerSignals {
    pub wrong_arithmetic: bool,
    pub invalid_credentials: bool,
    pub account_locked: bool,
    pub password_expired: bool,
    /// 仍能看到未登录菜单
    pub not_logged_in: bool,
}

impl BannerSignals {
    pub fn any_failure_banner(&self) -> bool {
        self.wrong_arithmetic
            || self.invalid_credentials
            || self.account_locked
            || self.password_expired
    }
}

/// 提交登录后页面的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// 验证码算错，需要重新开始登录
    WrongArithmetic,
    InvalidCredentials,
    AccountLocked,
    PasswordExpired,
    /// 没有任何横幅但仍未登录，原因未知
    Unknown,
    Authenticated,
}

impl PageState {
    /// 按优先级把信号归为一种状态
    ///
    /// 验证码横幅优先于账号密码横幅：两者同时出现时只能重试，不能判定为密码错误
    pub fn from_signals(signals: BannerSignals) -> Self {
        if signals.wrong_arithmetic {
            PageState::WrongArithmetic
        } else if signals.account_locked {
            PageState::AccountLocked
        } else if signals.password_expired {
            PageState::PasswordExpired
        } else if signals.invalid_credentials {
            PageState::InvalidCredentials
        } else if signals.not_logged_in {
            PageState::Unknown
        } else {
            PageState::Authenticated
        }
    }
}
