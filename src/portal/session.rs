//! 门户会话 - 登录状态机
//!
//! ```text
//! Init → 打开登录页 → 输入 PIN → 输入密码 → AwaitingCaptcha
//!      → CaptchaSolver → Submitted → classify()
//! ```
//!
//! - 验证码算错 / 验证码无法识别 / 页面状态未知：回到 `Init` 重新开始整轮登录
//! - 账号密码错误、账号锁定、密码过期：终态，不重试
//! - 导航错误：每一步单独重试，超过上限后进入 `Failed`
//!
//! 重新开始是一个显式的有界循环，轮数上限由配置决定

use std::future::Future;
use std::time::Duration;

use futures::future::try_join_all;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AuthFailure, BrowserError, PortalError};
use crate::infrastructure::{PortalPage, Probe};
use crate::models::{BannerSignals, FilingRequest, PageState, SessionState};
use crate::portal::markup::{self, Banner};
use crate::services::CaptchaSolver;

/// 会话参数
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub portal_url: String,
    pub login_max_cycles: u32,
    pub navigation_max_retries: u32,
    pub portal_timeout: Duration,
    pub probe_timeout: Duration,
    pub retry_backoff: Duration,
    pub submit_settle: Duration,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            portal_url: config.portal_url.clone(),
            login_max_cycles: config.login_max_cycles,
            navigation_max_retries: config.navigation_max_retries,
            portal_timeout: config.portal_timeout,
            probe_timeout: config.probe_timeout,
            retry_backoff: config.retry_backoff,
            submit_settle: config.submit_settle,
        }
    }
}

/// 登录过程统计，写入审计记录
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginStats {
    /// 已开始的登录轮数
    pub cycles: u32,
    /// 验证码识别次数合计
    pub captcha_attempts: u32,
    /// 其中因验证码算错而重来的轮数
    pub wrong_captcha_restarts: u32,
}

/// 已登录的会话，只能由 [`PortalSession::login`] 产生
pub struct AuthenticatedSession<'p, P: PortalPage + ?Sized> {
    page: &'p P,
}

impl<'p, P: PortalPage + ?Sized> AuthenticatedSession<'p, P> {
    pub fn page(&self) -> &'p P {
        self.page
    }
}

/// 单轮登录的结果
enum CycleOutcome {
    Classified(PageState),
    CaptchaUnresolved,
}

/// 门户会话
///
/// 职责：
/// - 驱动登录页
/// - 调用验证码求解器
/// - 对登录结果分类
/// - 不涉及申报向导
pub struct PortalSession<'p, P: PortalPage + ?Sized> {
    page: &'p P,
    solver: CaptchaSolver,
    settings: SessionSettings,
    state: SessionState,
    stats: LoginStats,
}

impl<'p, P: PortalPage + ?Sized> PortalSession<'p, P> {
    pub fn new(page: &'p P, solver: CaptchaSolver, settings: SessionSettings) -> Self {
        Self {
            page,
            solver,
            settings,
            state: SessionState::Init,
            stats: LoginStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> LoginStats {
        self.stats
    }

    /// 登录，成功时返回已登录的会话
    pub async fn login(
        &mut self,
        request: &FilingRequest,
    ) -> Result<AuthenticatedSession<'p, P>, PortalError> {
        let max_cycles = self.settings.login_max_cycles;

        for cycle in 1..=max_cycles {
            self.stats.cycles = cycle;
            self.transition(SessionState::Init);
            info!("🔐 第 {}/{} 轮登录 (PIN: {})", cycle, max_cycles, request.pin());

            let outcome = match self.run_cycle(request).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.transition(SessionState::Failed);
                    return Err(e);
                }
            };

            match outcome {
                CycleOutcome::Classified(PageState::Authenticated) => {
                    self.transition(SessionState::Authenticated);
                    info!("✓ 登录成功");
                    return Ok(AuthenticatedSession { page: self.page });
                }
                CycleOutcome::Classified(PageState::WrongArithmetic) => {
                    self.stats.wrong_captcha_restarts += 1;
                    warn!("⚠️ 验证码答案被拒绝，重新开始登录");
                }
                CycleOutcome::Classified(PageState::Unknown) => {
                    warn!("⚠️ 登录后页面状态未知，重新开始登录");
                }
                CycleOutcome::CaptchaUnresolved => {
                    warn!("⚠️ 验证码无法识别，重新打开登录页获取新验证码");
                }
                CycleOutcome::Classified(PageState::InvalidCredentials) => {
                    return Err(self.reject(AuthFailure::InvalidCredentials));
                }
                CycleOutcome::Classified(PageState::AccountLocked) => {
                    return Err(self.reject(AuthFailure::AccountLocked));
                }
                CycleOutcome::Classified(PageState::PasswordExpired) => {
                    return Err(self.reject(AuthFailure::PasswordExpired));
                }
            }
        }

        self.transition(SessionState::Failed);
        Err(PortalError::RetriesExhausted {
            what: "登录",
            attempts: max_cycles,
        })
    }

    /// 走完一轮登录：从打开登录页到页面分类
    async fn run_cycle(&mut self, request: &FilingRequest) -> Result<CycleOutcome, PortalError> {
        let page = self.page;
        let portal_timeout = self.settings.portal_timeout;
        let url = self.settings.portal_url.as_str();

        self.retry_step("打开登录页", || async move {
            page.goto(url).await?;
            require(page, markup::PIN_INPUT, portal_timeout).await
        })
        .await?;

        let pin = request.pin();
        self.retry_step("输入 PIN", || async move {
            page.fill(markup::PIN_INPUT, pin).await?;
            page.click(markup::PIN_CONTINUE_BUTTON).await?;
            require(page, markup::PASSWORD_INPUT, portal_timeout).await
        })
        .await?;

        let password = request.password().expose();
        self.retry_step("输入密码", || async move {
            page.fill(markup::PASSWORD_INPUT, password).await?;
            require(page, markup::CAPTCHA_IMAGE, portal_timeout).await
        })
        .await?;

        self.transition(SessionState::AwaitingCaptcha);
        let solved = self
            .solver
            .solve(|| page.capture_element(markup::CAPTCHA_IMAGE))
            .await;
        let solved = match solved {
            Ok(solved) => {
                self.stats.captcha_attempts += solved.attempt;
                solved
            }
            Err(AppError::Captcha(e)) => {
                self.stats.captcha_attempts += self.solver.max_attempts();
                debug!("{}", e);
                return Ok(CycleOutcome::CaptchaUnresolved);
            }
            Err(AppError::Browser(e)) => return Err(PortalError::navigation("截取验证码", e)),
            Err(other) => {
                return Err(PortalError::navigation(
                    "截取验证码",
                    BrowserError::ScriptExecutionFailed {
                        source: Box::new(other),
                    },
                ))
            }
        };

        let answer = solved.answer.to_string();
        let answer = answer.as_str();
        self.retry_step("提交登录", || async move {
            page.fill(markup::CAPTCHA_INPUT, answer).await?;
            page.click(markup::LOGIN_BUTTON).await
        })
        .await?;
        self.transition(SessionState::Submitted);

        // 等待登录后的页面稳定
        sleep(self.settings.submit_settle).await;

        let probe_timeout = self.settings.probe_timeout;
        let state = self
            .retry_step("登录结果分类", || classify(page, probe_timeout))
            .await?;
        debug!("登录结果分类: {:?}", state);

        Ok(CycleOutcome::Classified(state))
    }

    /// 对可恢复的浏览器错误做有限次重试
    async fn retry_step<T, F, Fut>(&self, step: &'static str, mut op: F) -> Result<T, PortalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BrowserError>>,
    {
        let max = self.settings.navigation_max_retries;
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max => {
                    let backoff = self.settings.retry_backoff * attempt.min(3);
                    warn!(
                        "⚠️ {} 失败 ({}/{}): {}，{:?} 后重试",
                        step, attempt, max, e, backoff
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(PortalError::navigation(step, e)),
            }
        }
    }

    fn reject(&mut self, failure: AuthFailure) -> PortalError {
        self.transition(match failure {
            AuthFailure::InvalidCredentials => SessionState::InvalidCredentials,
            AuthFailure::AccountLocked => SessionState::AccountLocked,
            AuthFailure::PasswordExpired => SessionState::PasswordExpired,
        });
        warn!("❌ 登录被拒绝: {}", failure);
        PortalError::Auth(failure)
    }

    fn transition(&mut self, next: SessionState) {
        debug!("会话状态: {} → {}", self.state, next);
        self.state = next;
    }
}

/// 一次性探测所有横幅并分类
///
/// 各探测并发执行、各自超时；没看到横幅只代表"未检测到"
pub async fn classify<P: PortalPage + ?Sized>(
    page: &P,
    probe_timeout: Duration,
) -> Result<PageState, BrowserError> {
    let banner_probes = markup::BANNERS.entries().map(move |(text, kind)| async move {
        let seen = page.probe(Probe::Text(*text), probe_timeout).await?;
        Ok::<_, BrowserError>((*kind, seen))
    });
    let (banners, not_logged_in) = futures::try_join!(
        try_join_all(banner_probes),
        page.probe(markup::NOT_LOGGED_IN_MARKER, probe_timeout),
    )?;

    let mut signals = BannerSignals {
        not_logged_in,
        ..Default::default()
    };
    for (kind, seen) in banners {
        match kind {
            Banner::WrongArithmetic => signals.wrong_arithmetic |= seen,
            Banner::InvalidCredentials => signals.invalid_credentials |= seen,
            Banner::AccountLocked => signals.account_locked |= seen,
            Banner::PasswordExpired => signals.password_expired |= seen,
        }
    }

    if signals.any_failure_banner() {
        debug!("检测到横幅: {:?}", signals);
    }
    Ok(PageState::from_signals(signals))
}

/// 等待元素出现，超时视为可重试的导航错误
async fn require<P: PortalPage + ?Sized>(
    page: &P,
    selector: &'static str,
    timeout: Duration,
) -> Result<(), BrowserError> {
    if page.probe(Probe::Selector(selector), timeout).await? {
        Ok(())
    } else {
        Err(BrowserError::ElementNotFound {
            selector: selector.to_string(),
        })
    }
}
