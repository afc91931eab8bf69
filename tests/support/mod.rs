//! 测试用的脚本化门户、OCR 和存储
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nil_return_agent::config::Config;
use nil_return_agent::error::{BrowserError, PersistError, PublishError};
use nil_return_agent::infrastructure::{DialogLedger, DialogPlan, PortalPage, Probe};
use nil_return_agent::models::{
    CorrelationIds, Credential, FilingOutcome, FilingRequest, RegistrationType,
};
use nil_return_agent::portal::markup::{self, Banner};
use nil_return_agent::services::{ArtifactStore, HistoryRecord, OcrEngine, StatusStore};

pub const RECEIPT_BYTES: &[u8] = b"%PDF-1.4 acknowledgement receipt";

/// 点击登录后门户的反应
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginReply {
    Banner(Banner),
    /// 没有横幅但仍在登录页
    Silent,
    Success,
}

#[derive(Default)]
struct FakeState {
    login_replies: VecDeque<LoginReply>,
    banner: Option<&'static str>,
    logged_in: bool,
    goto_failures: u32,
    goto_count: u32,
    login_clicks: u32,
    fills: Vec<(String, String)>,
    selected: Vec<(String, String)>,
    ledger: Option<DialogLedger>,
    dialogs_on_next: Vec<&'static str>,
    dialogs_on_submit: Vec<&'static str>,
    submitted: bool,
    receipt_available: bool,
}

/// 脚本化的门户页面
pub struct FakePortal {
    state: Mutex<FakeState>,
    download_dir: PathBuf,
}

impl FakePortal {
    /// 登录按脚本依次回应；向导按真实顺序弹出三个对话框；回执可下载
    pub fn new(
        download_dir: impl Into<PathBuf>,
        replies: impl IntoIterator<Item = LoginReply>,
    ) -> Self {
        Self {
            state: Mutex::new(FakeState {
                login_replies: replies.into_iter().collect(),
                dialogs_on_next: vec!["Do you want to file an amended return?"],
                dialogs_on_submit: vec![
                    "Are you sure you want to submit?",
                    "Return submitted, continue?",
                ],
                receipt_available: true,
                ..Default::default()
            }),
            download_dir: download_dir.into(),
        }
    }

    pub fn fail_first_gotos(self, count: u32) -> Self {
        self.state().goto_failures = count;
        self
    }

    pub fn without_receipt(self) -> Self {
        self.state().receipt_available = false;
        self
    }

    pub fn with_submit_dialogs(self, messages: Vec<&'static str>) -> Self {
        self.state().dialogs_on_submit = messages;
        self
    }

    pub fn goto_count(&self) -> u32 {
        self.state().goto_count
    }

    pub fn login_clicks(&self) -> u32 {
        self.state().login_clicks
    }

    /// 某个输入框最后一次填入的值
    pub fn filled(&self, selector: &str) -> Vec<String> {
        self.state()
            .fills
            .iter()
            .filter(|(s, _)| s == selector)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn selected(&self) -> Vec<(String, String)> {
        self.state().selected.clone()
    }

    pub fn ledger(&self) -> Option<DialogLedger> {
        self.state().ledger.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn fire_dialogs(state: &FakeState, messages: &[&'static str]) {
        if let Some(ledger) = &state.ledger {
            for message in messages {
                ledger.on_dialog(message);
            }
        }
    }
}

#[async_trait]
impl PortalPage for FakePortal {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state();
        state.goto_count += 1;
        if state.goto_failures > 0 {
            state.goto_failures -= 1;
            return Err(BrowserError::navigation(
                url,
                std::io::Error::new(std::io::ErrorKind::TimedOut, "portal did not respond"),
            ));
        }
        state.banner = None;
        state.logged_in = false;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.state().fills.push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let mut state = self.state();
        match selector {
            markup::LOGIN_BUTTON => {
                state.login_clicks += 1;
                let reply = state.login_replies.pop_front().unwrap_or(LoginReply::Success);
                match reply {
                    LoginReply::Banner(banner) => state.banner = Some(markup::banner_text(banner)),
                    LoginReply::Silent => state.banner = None,
                    LoginReply::Success => state.logged_in = true,
                }
            }
            markup::WIZARD_NEXT_BUTTON => {
                let messages = state.dialogs_on_next.clone();
                Self::fire_dialogs(&state, &messages);
            }
            markup::SUBMIT_BUTTON => {
                let messages = state.dialogs_on_submit.clone();
                Self::fire_dialogs(&state, &messages);
                state.submitted = true;
            }
            _ => {}
        }
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.state().selected.push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn capture_element(&self, _selector: &str) -> Result<Vec<u8>, BrowserError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn probe(&self, probe: Probe, _timeout: Duration) -> Result<bool, BrowserError> {
        let state = self.state();
        Ok(match probe {
            Probe::Text(text) => state.banner == Some(text),
            Probe::Selector(markup::LOGIN_BUTTON) => !state.logged_in,
            Probe::Selector(markup::RECEIPT_LINK) => state.submitted && state.receipt_available,
            Probe::Selector(_) => true,
        })
    }

    async fn arm_dialogs(&self, plan: DialogPlan) -> Result<DialogLedger, BrowserError> {
        let ledger = DialogLedger::new(plan);
        self.state().ledger = Some(ledger.clone());
        Ok(ledger)
    }

    async fn download(&self, _trigger: &str, _timeout: Duration) -> Result<PathBuf, BrowserError> {
        let path = self.download_dir.join("ReturnReceipt.pdf");
        tokio::fs::write(&path, RECEIPT_BYTES).await?;
        Ok(path)
    }
}

/// 按顺序返回预设文本的 OCR，用完后一直返回最后一个
pub struct ScriptedOcr {
    outputs: Mutex<VecDeque<&'static str>>,
    last: &'static str,
    calls: Mutex<u32>,
}

impl ScriptedOcr {
    pub fn new(outputs: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            outputs: Mutex::new(outputs.iter().copied().collect()),
            last: outputs.last().copied().unwrap_or("12+7-"),
            calls: Mutex::new(0),
        })
    }

    pub fn always(text: &'static str) -> Arc<Self> {
        Self::new(&[text])
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl OcrEngine for ScriptedOcr {
    async fn recognize(&self, _image: &[u8]) -> anyhow::Result<String> {
        *self.calls.lock().unwrap() += 1;
        let next = self.outputs.lock().unwrap().pop_front().unwrap_or(self.last);
        Ok(next.to_string())
    }
}

/// 内存对象存储
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, PublishError> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(format!("https://storage.test/receipts/{}", key))
    }
}

/// 总是失败的对象存储
pub struct BrokenStore;

#[async_trait]
impl ArtifactStore for BrokenStore {
    async fn put(
        &self,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, PublishError> {
        Err(PublishError::BadResponse {
            key: key.to_string(),
            status: 503,
            body: "storage unavailable".to_string(),
        })
    }
}

/// 记录所有写入的状态存储，可设置为总是失败
#[derive(Default)]
pub struct RecordingStatusStore {
    pub fail: bool,
    pub history: Mutex<Vec<HistoryRecord>>,
    pub outcomes: Mutex<Vec<(String, FilingOutcome)>>,
}

impl RecordingStatusStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn result(&self) -> Result<(), PersistError> {
        if self.fail {
            Err(PersistError::BadResponse {
                endpoint: "/rest/v1/filing_history".to_string(),
                status: 500,
                body: "database is down".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StatusStore for RecordingStatusStore {
    async fn insert_history(&self, record: &HistoryRecord) -> Result<(), PersistError> {
        self.history.lock().unwrap().push(record.clone());
        self.result()
    }

    async fn update_outcome(
        &self,
        return_id: &str,
        outcome: &FilingOutcome,
    ) -> Result<(), PersistError> {
        self.outcomes
            .lock()
            .unwrap()
            .push((return_id.to_string(), outcome.clone()));
        self.result()
    }
}

/// 适合测试的配置：所有等待都很短
pub fn fast_config() -> Config {
    Config {
        login_max_cycles: 5,
        captcha_max_attempts: 5,
        navigation_max_retries: 3,
        portal_timeout: Duration::from_millis(300),
        probe_timeout: Duration::from_millis(10),
        receipt_timeout: Duration::from_millis(300),
        run_deadline: Duration::from_secs(30),
        retry_backoff: Duration::from_millis(1),
        submit_settle: Duration::ZERO,
        ..Config::default()
    }
}

pub fn jane_doe() -> FilingRequest {
    FilingRequest::new(
        "Jane Doe",
        "A123456789B",
        Credential::new("correct horse"),
        RegistrationType::Individual,
        CorrelationIds {
            session_id: "sess-42".to_string(),
            return_id: "ret-42".to_string(),
        },
    )
}
