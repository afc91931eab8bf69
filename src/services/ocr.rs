//! OCR 服务 - 业务能力层
//!
//! 只负责"图片 → 文本"，不关心验证码的含义
//!
//! ## 后端
//! - `TesseractOcr`: 调用本地 `tesseract` 命令行，单行模式
//! - `VisionOcr`: 使用 `async-openai` 调用兼容 OpenAI API 的视觉模型

use std::process::Stdio;

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::Engine;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::{Config, OcrBackend};

/// 图片文字识别
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// 识别 PNG 图片中的文字，返回原始文本
    async fn recognize(&self, image: &[u8]) -> Result<String>;

    /// 后端名称，用于日志
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// 按配置创建 OCR 引擎
pub fn build_ocr_engine(config: &Config) -> Box<dyn OcrEngine> {
    match config.ocr_backend {
        OcrBackend::Tesseract => Box::new(TesseractOcr::new(&config.tesseract_bin)),
        OcrBackend::Vision => Box::new(VisionOcr::new(config)),
    }
}

/// 本地 tesseract
pub struct TesseractOcr {
    binary: String,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        // --psm 7: 整张图当作一行文字
        let mut child = Command::new(&self.binary)
            .args([
                "stdin",
                "stdout",
                "--psm",
                "7",
                "-c",
                "tessedit_char_whitelist=0123456789+-=?",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("无法启动 {}", self.binary))?;

        let mut stdin = child.stdin.take().context("tesseract stdin 不可用")?;
        stdin.write_all(image).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            anyhow::bail!(
                "tesseract 退出码 {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        debug!("tesseract 输出: {:?}", text);
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

/// 视觉模型 OCR
pub struct VisionOcr {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl VisionOcr {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        debug!("调用视觉模型识别验证码，模型: {}", self.model_name);

        let data_url = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(image)
        );

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(
                "You transcribe images of short arithmetic puzzles. \
                 Reply with the characters exactly as they appear, including any trailing symbol, \
                 with no explanation.",
            )
            .build()?;

        let content_parts = vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: "Transcribe this image.".to_string(),
                },
            ),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: data_url,
                        detail: Some(ImageDetail::High),
                    },
                },
            ),
        ];
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.0)
            .max_tokens(32u32)
            .build()?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| anyhow::anyhow!("视觉模型调用失败: {}", e))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("视觉模型返回内容为空"))?;

        Ok(content.trim().to_string())
    }

    fn name(&self) -> &'static str {
        "vision"
    }
}
