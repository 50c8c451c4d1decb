//! 文本生成 - 基础设施层
//!
//! 持有唯一的 LLM 客户端，只暴露"按 schema 生成 JSON"的能力
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务均可通过 `llm_api_base_url` 接入

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, LlmError};

/// 一次结构化生成请求
#[derive(Debug, Clone, Copy)]
pub struct StructuredPrompt<'a> {
    pub system: &'a str,
    pub user: &'a str,
    /// schema 名称，服务端用于标识输出格式
    pub schema_name: &'a str,
    pub schema: &'a serde_json::Value,
}

/// 文本生成能力
///
/// 职责：
/// - 以确定性采样（temperature = 0）发送一次请求
/// - 返回第一条候选消息的原始内容
/// - 不重试、不解析业务结构
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: StructuredPrompt<'_>) -> Result<String>;
}

/// 生成并反序列化为指定类型
///
/// 输出格式由服务端强制，这里只做一次 JSON 解析。
pub async fn generate_json<T: DeserializeOwned>(
    generator: &dyn TextGenerator,
    prompt: StructuredPrompt<'_>,
) -> Result<T> {
    let raw = generator.generate(prompt).await?;
    let value = serde_json::from_str(raw.trim())
        .map_err(|source| AppError::Llm(LlmError::InvalidJson { source }))?;
    Ok(value)
}

/// 基于 OpenAI Chat Completions 的实现
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl OpenAiGenerator {
    /// 创建新的生成器
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
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: StructuredPrompt<'_>) -> Result<String> {
        debug!(
            "调用 LLM API，模型: {}，schema: {}",
            self.model_name, prompt.schema_name
        );
        debug!("用户消息长度: {} 字符", prompt.user.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(prompt.system)
            .build()?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.user)
            .build()?;

        let messages = vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.0)
            .response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: prompt.schema_name.to_string(),
                    schema: Some(prompt.schema.clone()),
                    strict: None,
                },
            })
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model_name, e.to_string())
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AppError::Llm(LlmError::EmptyContent {
                    model: self.model_name.clone(),
                })
            })?;

        Ok(content.trim().to_string())
    }
}
