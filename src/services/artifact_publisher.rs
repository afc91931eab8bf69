//! 回执上传服务 - 业务能力层
//!
//! 把本地回执复制到持久存储并返回公开链接。上传失败只记录日志：
//! 门户上的申报已经成功，结果仍然是成功，只是没有链接。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PublishError;
use crate::models::{remote_receipt_key, FilingArtifact};

/// 持久存储：同一个键重复写入会覆盖，不会产生副本
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// 写入对象并返回公开 URL
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, PublishError>;
}

/// 基于 HTTP 的对象存储（Supabase Storage 风格的接口）
pub struct HttpArtifactStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    api_key: String,
}

impl HttpArtifactStore {
    pub fn new(config: &Config) -> Self {
        Self::with_endpoint(
            &config.storage_base_url,
            &config.storage_bucket,
            &config.storage_api_key,
        )
    }

    pub fn with_endpoint(base_url: &str, bucket: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// `{base}/storage/v1/object/[public/]{bucket}/{key}`
    fn object_url(&self, key: &str, public: bool) -> Result<Url, PublishError> {
        let invalid = || PublishError::InvalidKey {
            key: key.to_string(),
        };
        if key.is_empty() || key.split('/').any(|s| s.is_empty() || s == "..") {
            return Err(invalid());
        }

        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| invalid())?;
            segments.pop_if_empty().extend(["storage", "v1", "object"]);
            if public {
                segments.push("public");
            }
            segments.push(&self.bucket).extend(key.split('/'));
        }
        Ok(url)
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, PublishError> {
        let upload_url = self.object_url(key, false)?;

        let response = self
            .client
            .post(upload_url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|source| PublishError::RequestFailed {
                key: key.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::BadResponse {
                key: key.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(self.object_url(key, true)?.to_string())
    }
}

/// 回执上传服务
pub struct ArtifactPublisher {
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// 上传回执；任何失败都返回 `None`
    pub async fn publish(
        &self,
        artifact: &FilingArtifact,
        pin: &str,
        date: NaiveDate,
    ) -> Option<String> {
        let key = remote_receipt_key(pin, date);
        match self.try_publish(artifact, &key).await {
            Ok(url) => {
                info!("✓ 回执已上传: {}", url);
                Some(url)
            }
            Err(e) => {
                warn!("⚠️ 回执上传失败（不影响申报结果）: {}", e);
                None
            }
        }
    }

    async fn try_publish(
        &self,
        artifact: &FilingArtifact,
        key: &str,
    ) -> Result<String, PublishError> {
        let bytes = tokio::fs::read(&artifact.path)
            .await
            .map_err(|source| PublishError::ReadArtifact {
                path: artifact.path.display().to_string(),
                source,
            })?;
        self.store.put(key, bytes, &artifact.content_type).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
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
            Ok(format!("memory://{}", key))
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 11).unwrap()
    }

    fn artifact_in(dir: &std::path::Path) -> FilingArtifact {
        let path = dir.join("receipt.pdf");
        std::fs::write(&path, b"%PDF-1.4 receipt").unwrap();
        FilingArtifact {
            path,
            file_name: "receipt.pdf".to_string(),
            size_bytes: 16,
            content_type: "application/pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn test_republish_same_day_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path());
        let store = Arc::new(MemoryStore::default());
        let publisher = ArtifactPublisher::new(store.clone());

        let first = publisher.publish(&artifact, "A123456789B", date()).await;
        let second = publisher.publish(&artifact, "A123456789B", date()).await;

        assert_eq!(first, second);
        assert_eq!(first.as_deref(), Some("memory://A123456789B/2025-04-11.pdf"));
        assert_eq!(store.objects.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_local_file_yields_none() {
        let publisher = ArtifactPublisher::new(Arc::new(MemoryStore::default()));
        let artifact = FilingArtifact {
            path: "/nonexistent/receipt.pdf".into(),
            file_name: "receipt.pdf".to_string(),
            size_bytes: 0,
            content_type: "application/pdf".to_string(),
        };
        assert!(publisher.publish(&artifact, "A1", date()).await.is_none());
    }

    #[tokio::test]
    async fn test_http_store_upserts_and_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/receipts/A123456789B/2025-04-11.pdf"))
            .and(header("x-upsert", "true"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path());
        let store = HttpArtifactStore::with_endpoint(&server.uri(), "receipts", "service-key");
        let publisher = ArtifactPublisher::new(Arc::new(store));

        let first = publisher.publish(&artifact, "A123456789B", date()).await.unwrap();
        let second = publisher.publish(&artifact, "A123456789B", date()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first,
            format!(
                "{}/storage/v1/object/public/receipts/A123456789B/2025-04-11.pdf",
                server.uri()
            )
        );
    }

    #[tokio::test]
    async fn test_http_store_error_is_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path());
        let store = HttpArtifactStore::with_endpoint(&server.uri(), "receipts", "k");
        assert!(matches!(
            store.put("A1/2025-04-11.pdf", b"x".to_vec(), "application/pdf").await,
            Err(PublishError::BadResponse { status: 500, .. })
        ));

        let publisher = ArtifactPublisher::new(Arc::new(store));
        assert!(publisher.publish(&artifact, "A1", date()).await.is_none());
    }

    #[test]
    fn test_rejects_traversal_keys() {
        let store = HttpArtifactStore::with_endpoint("http://localhost:1", "receipts", "k");
        assert!(store.object_url("../etc/passwd", false).is_err());
        assert!(store.object_url("", false).is_err());
    }
}
