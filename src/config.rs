use std::time::Duration;

use crate::error::ConfigError;

/// OCR 后端
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OcrBackend {
    /// 本地 tesseract 命令行
    Tesseract,
    /// 兼容 OpenAI API 的视觉模型
    Vision,
}

impl OcrBackend {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Ok(OcrBackend::Tesseract),
            "vision" | "llm" => Ok(OcrBackend::Vision),
            _ => Err(ConfigError::UnknownOcrBackend {
                value: value.to_string(),
            }),
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的申报数量（每个申报独占一个浏览器）
    pub max_concurrent_filings: usize,
    /// 门户登录页 URL
    pub portal_url: String,
    /// Chromium 可执行文件路径（为空时由 chromiumoxide 自动查找）
    pub chrome_executable: Option<String>,
    /// 是否无头运行
    pub headless: bool,
    /// 待处理申报请求（TOML）存放目录
    pub requests_folder: String,
    /// 申报结果（JSON）输出目录
    pub results_folder: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,

    // --- 登录与验证码 ---
    /// 单轮登录内验证码最大尝试次数
    pub captcha_max_attempts: u32,
    /// OCR 文本末尾裁掉的字符数
    pub captcha_trim_chars: usize,
    /// 登录流程最多重新开始的轮数
    pub login_max_cycles: u32,
    /// 导航/网络错误的重试次数
    pub navigation_max_retries: u32,

    // --- 超时 ---
    /// 一般门户操作的超时
    pub portal_timeout: Duration,
    /// 横幅探测的超时
    pub probe_timeout: Duration,
    /// 等待回执下载入口的超时
    pub receipt_timeout: Duration,
    /// 整个申报流程的截止时间
    pub run_deadline: Duration,
    /// 导航重试的基础退避时间（第 n 次重试等待 n 倍，最多 3 倍）
    pub retry_backoff: Duration,
    /// 点击登录后等待页面稳定的时间
    pub submit_settle: Duration,

    // --- OCR 配置 ---
    pub ocr_backend: OcrBackend,
    pub tesseract_bin: String,
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,

    // --- 存储与状态服务 ---
    pub storage_base_url: String,
    pub storage_bucket: String,
    pub storage_api_key: String,
    pub status_base_url: String,
    pub status_api_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_filings: 4,
            portal_url: "https://itax.kra.go.ke/KRA-Portal/".to_string(),
            chrome_executable: None,
            headless: true,
            requests_folder: "filing_requests".to_string(),
            results_folder: "filing_results".to_string(),
            output_log_file: "output.txt".to_string(),
            verbose_logging: false,
            captcha_max_attempts: 5,
            captcha_trim_chars: 1,
            login_max_cycles: 5,
            navigation_max_retries: 3,
            portal_timeout: Duration::from_secs(180),
            probe_timeout: Duration::from_millis(2000),
            receipt_timeout: Duration::from_secs(300),
            run_deadline: Duration::from_secs(900),
            retry_backoff: Duration::from_secs(1),
            submit_settle: Duration::from_millis(1500),
            ocr_backend: OcrBackend::Tesseract,
            tesseract_bin: "tesseract".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            storage_base_url: "http://localhost:54321".to_string(),
            storage_bucket: "receipts".to_string(),
            storage_api_key: String::new(),
            status_base_url: "http://localhost:54321".to_string(),
            status_api_key: String::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_filings: env_parse("MAX_CONCURRENT_FILINGS")
                .unwrap_or(default.max_concurrent_filings),
            portal_url: std::env::var("PORTAL_URL").unwrap_or(default.portal_url),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().filter(|v| !v.is_empty()),
            headless: env_parse("HEADLESS").unwrap_or(default.headless),
            requests_folder: std::env::var("REQUESTS_FOLDER").unwrap_or(default.requests_folder),
            results_folder: std::env::var("RESULTS_FOLDER").unwrap_or(default.results_folder),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            captcha_max_attempts: env_parse("CAPTCHA_MAX_ATTEMPTS")
                .unwrap_or(default.captcha_max_attempts),
            captcha_trim_chars: env_parse("CAPTCHA_TRIM_CHARS")
                .unwrap_or(default.captcha_trim_chars),
            login_max_cycles: env_parse("LOGIN_MAX_CYCLES").unwrap_or(default.login_max_cycles),
            navigation_max_retries: env_parse("NAVIGATION_MAX_RETRIES")
                .unwrap_or(default.navigation_max_retries),
            portal_timeout: env_parse("PORTAL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.portal_timeout),
            probe_timeout: env_parse("PROBE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.probe_timeout),
            receipt_timeout: env_parse("RECEIPT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.receipt_timeout),
            run_deadline: env_parse("RUN_DEADLINE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.run_deadline),
            retry_backoff: env_parse("RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.retry_backoff),
            submit_settle: env_parse("SUBMIT_SETTLE_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.submit_settle),
            ocr_backend: std::env::var("OCR_BACKEND")
                .ok()
                .and_then(|v| OcrBackend::parse(&v).ok())
                .unwrap_or(default.ocr_backend),
            tesseract_bin: std::env::var("TESSERACT_BIN").unwrap_or(default.tesseract_bin),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            storage_base_url: std::env::var("STORAGE_BASE_URL").unwrap_or(default.storage_base_url),
            storage_bucket: std::env::var("STORAGE_BUCKET").unwrap_or(default.storage_bucket),
            storage_api_key: std::env::var("STORAGE_API_KEY").unwrap_or(default.storage_api_key),
            status_base_url: std::env::var("STATUS_BASE_URL").unwrap_or(default.status_base_url),
            status_api_key: std::env::var("STATUS_API_KEY").unwrap_or(default.status_api_key),
        }
    }

    /// 检查重试上限等必须为正数的配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("MAX_CONCURRENT_FILINGS", self.max_concurrent_filings as u64),
            ("CAPTCHA_MAX_ATTEMPTS", self.captcha_max_attempts as u64),
            ("LOGIN_MAX_CYCLES", self.login_max_cycles as u64),
            ("NAVIGATION_MAX_RETRIES", self.navigation_max_retries as u64),
            ("RUN_DEADLINE_SECS", self.run_deadline.as_secs()),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::MustBePositive { name });
            }
        }
        if self.ocr_backend == OcrBackend::Vision && self.llm_api_key.is_empty() {
            return Err(ConfigError::Missing {
                var_name: "LLM_API_KEY",
            });
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
