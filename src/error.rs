use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 验证码错误
    #[error("验证码错误: {0}")]
    Captcha(#[from] CaptchaError),
    /// 门户登录错误
    #[error("门户错误: {0}")]
    Portal(#[from] PortalError),
    /// 申报向导失败
    #[error("申报步骤失败: {0}")]
    Filing(#[from] FilingStepFailed),
    /// 回执上传错误
    #[error("回执上传错误: {0}")]
    Publish(#[from] PublishError),
    /// 状态持久化错误
    #[error("状态持久化错误: {0}")]
    Persist(#[from] PersistError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 整个申报流程超过截止时间
    #[error("申报流程超过 {secs} 秒仍未完成")]
    DeadlineExceeded { secs: u64 },
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {source}")]
    LaunchFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 浏览器配置失败
    #[error("浏览器配置失败: {message}")]
    ConfigurationFailed { message: String },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 元素不存在
    #[error("未找到元素: {selector}")]
    ElementNotFound { selector: String },
    /// 元素操作失败（点击、输入、截图）
    #[error("元素操作失败 ({action} {selector}): {source}")]
    ElementActionFailed {
        action: &'static str,
        selector: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 执行脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 下载超时
    #[error("等待下载超时 ({timeout_secs} 秒)")]
    DownloadTimedOut { timeout_secs: u64 },
    /// 下载目录读写失败
    #[error("下载目录错误: {0}")]
    DownloadIo(#[from] std::io::Error),
}

/// 验证码错误
///
/// `Extraction` / `UnsupportedOperator` / `Ocr` 只在单次尝试内部出现，
/// 由求解器自己重试；只有 `Unresolved` 会交给调用方。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptchaError {
    /// 没有识别出恰好两个数字
    #[error("第 {attempt} 次识别: 需要 2 个数字，得到 {found} 个 (文本: {text:?})")]
    Extraction {
        attempt: u32,
        found: usize,
        text: String,
    },
    /// 文本中没有 + 或 -
    #[error("第 {attempt} 次识别: 不支持的运算符 (文本: {text:?})")]
    UnsupportedOperator { attempt: u32, text: String },
    /// 操作数过大，结果溢出（多半是识别错误）
    #[error("第 {attempt} 次识别: 计算结果溢出 (文本: {text:?})")]
    Overflow { attempt: u32, text: String },
    /// OCR 引擎本身失败
    #[error("第 {attempt} 次识别: OCR 失败: {message}")]
    Ocr { attempt: u32, message: String },
    /// 达到尝试上限，需要重新走登录流程
    #[error("验证码在 {attempts} 次尝试后仍无法识别")]
    Unresolved { attempts: u32 },
}

/// 终态的认证失败，不会重试
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("账号或密码错误")]
    InvalidCredentials,
    #[error("账号已锁定")]
    AccountLocked,
    #[error("密码已过期")]
    PasswordExpired,
}

/// 门户会话错误
#[derive(Debug, Error)]
pub enum PortalError {
    /// 认证失败（终态）
    #[error("认证失败: {0}")]
    Auth(AuthFailure),
    /// 可恢复的导航/网络错误
    #[error("导航失败 ({step}): {source}")]
    Navigation {
        step: &'static str,
        #[source]
        source: BrowserError,
    },
    /// 重试耗尽
    #[error("{what} 在 {attempts} 次尝试后仍失败")]
    RetriesExhausted { what: &'static str, attempts: u32 },
}

/// 申报向导失败，与认证失败明确区分：补救方式是重跑整个流程
#[derive(Debug, Error)]
#[error("申报步骤 {step} 失败: {reason}")]
pub struct FilingStepFailed {
    pub step: &'static str,
    pub reason: String,
}

impl FilingStepFailed {
    pub fn new(step: &'static str, reason: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
        }
    }
}

/// 回执上传错误（只记录日志，不影响申报结果）
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("读取本地回执失败 ({path}): {source}")]
    ReadArtifact {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("上传请求失败 ({key}): {source}")]
    RequestFailed {
        key: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("存储服务返回错误 ({key}): status={status}, body={body}")]
    BadResponse {
        key: String,
        status: u16,
        body: String,
    },
    #[error("无效的对象键: {key}")]
    InvalidKey { key: String },
}

/// 状态持久化错误（只记录日志，永远不会改写已确定的结果）
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("状态服务请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("状态服务返回错误 ({endpoint}): status={status}, body={body}")]
    BadResponse {
        endpoint: String,
        status: u16,
        body: String,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 数值必须大于 0
    #[error("配置项 {name} 必须大于 0")]
    MustBePositive { name: &'static str },
    /// 未知的 OCR 后端
    #[error("未知的 OCR 后端: {value}")]
    UnknownOcrBackend { value: String },
    /// 缺少必需的配置
    #[error("缺少配置项 {var_name}")]
    Missing { var_name: &'static str },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        }
    }
}

impl From<serde_json::Error> for BrowserError {
    fn from(err: serde_json::Error) -> Self {
        BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        }
    }
}

// ========== 便捷构造函数 ==========

impl BrowserError {
    /// 创建元素操作错误
    pub fn element_action(
        action: &'static str,
        selector: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BrowserError::ElementActionFailed {
            action,
            selector: selector.into(),
            source: Box::new(source),
        }
    }

    /// 创建导航错误
    pub fn navigation(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BrowserError::NavigationFailed {
            url: url.into(),
            source: Box::new(source),
        }
    }
}

impl PortalError {
    /// 包装可恢复的浏览器错误
    pub fn navigation(step: &'static str, source: BrowserError) -> Self {
        PortalError::Navigation { step, source }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
