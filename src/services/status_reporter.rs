//! 状态回写服务 - 业务能力层
//!
//! 记录最终结果并追加一条审计记录。持久化失败只记录日志，
//! 调用方拿到的结果不会因此改变（本服务只借用结果，不能修改它）。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::PersistError;
use crate::models::{FilingOutcome, FilingStatus};

/// 一次申报的审计记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub request_id: String,
    pub session_id: String,
    pub return_id: String,
    pub pin: String,
    pub taxpayer_name: String,
    pub status: FilingStatus,
    pub receipt_url: Option<String>,
    /// 实际走了几轮登录
    pub login_cycles: u32,
    /// 所有轮次的验证码识别次数合计
    pub captcha_attempts: u32,
    /// 失败时的内部原因，仅供排查
    pub detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// 状态与审计存储
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn insert_history(&self, record: &HistoryRecord) -> Result<(), PersistError>;

    async fn update_outcome(
        &self,
        return_id: &str,
        outcome: &FilingOutcome,
    ) -> Result<(), PersistError>;
}

/// PostgREST 风格的 HTTP 状态存储
pub struct HttpStatusStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpStatusStore {
    pub fn new(config: &Config) -> Self {
        Self::with_endpoint(&config.status_base_url, &config.status_api_key)
    }

    pub fn with_endpoint(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn send(
        &self,
        endpoint: String,
        request: reqwest::RequestBuilder,
    ) -> Result<(), PersistError> {
        let response = request
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header("Prefer", "return=minimal")
            .send()
            .await
            .map_err(|source| PersistError::RequestFailed {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistError::BadResponse {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StatusStore for HttpStatusStore {
    async fn insert_history(&self, record: &HistoryRecord) -> Result<(), PersistError> {
        let endpoint = format!("{}/rest/v1/filing_history", self.base_url);
        let request = self.client.post(&endpoint).json(record);
        self.send(endpoint, request).await
    }

    async fn update_outcome(
        &self,
        return_id: &str,
        outcome: &FilingOutcome,
    ) -> Result<(), PersistError> {
        let endpoint = format!("{}/rest/v1/returns", self.base_url);
        let request = self
            .client
            .patch(&endpoint)
            .query(&[("id", format!("eq.{}", return_id))])
            .json(&json!({
                "status": outcome.status,
                "receipt_url": outcome.receipt_url,
                "filed_at": outcome.timestamp,
            }));
        self.send(endpoint, request).await
    }
}

/// 状态回写服务
pub struct StatusReporter {
    store: Arc<dyn StatusStore>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// 回写结果和审计记录，两步互不影响，失败只告警
    pub async fn report(&self, outcome: &FilingOutcome, record: &HistoryRecord) {
        if record.return_id.is_empty() {
            debug!("请求没有 return_id，跳过结果回写");
        } else if let Err(e) = self.store.update_outcome(&record.return_id, outcome).await {
            warn!("⚠️ 结果回写失败（不影响返回结果）: {}", e);
        }

        match self.store.insert_history(record).await {
            Ok(()) => info!("✓ 审计记录已写入 ({})", outcome.status),
            Err(e) => warn!("⚠️ 审计记录写入失败: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(status: FilingStatus) -> HistoryRecord {
        let now = Utc::now();
        HistoryRecord {
            request_id: "req-1".to_string(),
            session_id: "sess-1".to_string(),
            return_id: "ret-1".to_string(),
            pin: "A123456789B".to_string(),
            taxpayer_name: "Jane Doe".to_string(),
            status,
            receipt_url: None,
            login_cycles: 1,
            captcha_attempts: 1,
            detail: None,
            started_at: now,
            finished_at: now,
        }
    }

    #[tokio::test]
    async fn test_report_writes_outcome_and_history() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/returns"))
            .and(query_param("id", "eq.ret-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/filing_history"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpStatusStore::with_endpoint(&server.uri(), "k");
        let reporter = StatusReporter::new(Arc::new(store));
        let outcome = FilingOutcome::new(FilingStatus::Valid, Some("https://x/r.pdf".to_string()));
        reporter.report(&outcome, &record(FilingStatus::Valid)).await;
    }

    #[tokio::test]
    async fn test_persist_failure_leaves_outcome_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = HttpStatusStore::with_endpoint(&server.uri(), "k");
        assert!(matches!(
            store.insert_history(&record(FilingStatus::Valid)).await,
            Err(PersistError::BadResponse { status: 503, .. })
        ));

        let reporter = StatusReporter::new(Arc::new(store));
        let outcome = FilingOutcome::new(FilingStatus::Valid, None);
        let before = outcome.clone();
        reporter.report(&outcome, &record(FilingStatus::Valid)).await;
        assert_eq!(outcome, before);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_request_failure() {
        let store = HttpStatusStore::with_endpoint("http://127.0.0.1:9", "k");
        let outcome = FilingOutcome::new(FilingStatus::Failed, None);
        assert!(matches!(
            store.update_outcome("ret-1", &outcome).await,
            Err(PersistError::RequestFailed { .. })
        ));
    }
}
