//! 申报请求
//!
//! 每个请求在整个流程中只读，由一条流水线独占

use std::fmt;

use serde::{Deserialize, Serialize};

/// 申报人类别（门户下拉框的取值由 `portal::markup` 决定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationType {
    /// 个人
    Individual,
    /// 企业
    Corporate,
}

impl RegistrationType {
    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            RegistrationType::Individual => "Individual",
            RegistrationType::Corporate => "Corporate",
        }
    }
}

impl Default for RegistrationType {
    fn default() -> Self {
        RegistrationType::Individual
    }
}

/// 门户密码，Debug 输出时隐藏，不参与序列化
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// 只在填表时使用
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// 关联标识，用于回写状态和审计记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationIds {
    pub session_id: String,
    pub return_id: String,
}

/// 一次自动申报请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingRequest {
    taxpayer_name: String,
    pin: String,
    #[serde(skip_serializing)]
    password: Credential,
    #[serde(default)]
    registration_type: RegistrationType,
    #[serde(default)]
    correlation: CorrelationIds,
}

impl FilingRequest {
    pub fn new(
        taxpayer_name: impl Into<String>,
        pin: impl Into<String>,
        password: Credential,
        registration_type: RegistrationType,
        correlation: CorrelationIds,
    ) -> Self {
        Self {
            taxpayer_name: taxpayer_name.into(),
            pin: pin.into(),
            password,
            registration_type,
            correlation,
        }
    }

    /// 纳税人显示名称
    pub fn taxpayer_name(&self) -> &str {
        &self.taxpayer_name
    }

    /// 门户身份（PIN）
    pub fn pin(&self) -> &str {
        &self.pin
    }

    pub fn password(&self) -> &Credential {
        &self.password
    }

    pub fn registration_type(&self) -> RegistrationType {
        self.registration_type
    }

    pub fn correlation(&self) -> &CorrelationIds {
        &self.correlation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_is_redacted_in_debug() {
        let request = FilingRequest::new(
            "Jane Doe",
            "A123456789B",
            Credential::new("hunter2"),
            RegistrationType::Individual,
            CorrelationIds::default(),
        );
        let debug = format!("{:?}", request);
        assert!(debug.contains("A123456789B"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_password_is_never_serialized() {
        let request = FilingRequest::new(
            "Jane Doe",
            "A123456789B",
            Credential::new("hunter2"),
            RegistrationType::Individual,
            CorrelationIds::default(),
        );
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("A123456789B"));
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let request: FilingRequest = toml::from_str(
            r#"
            taxpayer_name = "Jane Doe"
            pin = "A123456789B"
            password = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(request.registration_type(), RegistrationType::Individual);
        assert_eq!(request.password().expose(), "secret");
        assert!(request.correlation().return_id.is_empty());
    }
}
