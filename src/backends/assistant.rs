//! 云端文件助手后端
//!
//! 上传 PDF，创建临时助手和会话，等待运行结束后读取回复。
//! 通过 `async-openai` 的 Files / Assistants / Threads 接口完成。

// Assistants 接口在 async-openai 中已标记弃用，但仍是上传 PDF 直接问答的唯一方式
#![allow(deprecated)]

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_openai::{
    config::{OpenAIConfig, OPENAI_BETA_HEADER},
    error::OpenAIError,
    traits::RequestOptionsBuilder,
    types::assistants::{
        AssistantTools, AssistantToolsFileSearch, CreateAssistantRequestArgs,
        CreateMessageRequestArgs, CreateRunRequestArgs, CreateThreadRequestArgs, MessageAttachment,
        MessageAttachmentTool, MessageContent, MessageRole, RunStatus,
    },
    types::files::{CreateFileRequestArgs, FilePurpose},
    Client,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{join_non_empty, ExtractionBackend};
use crate::config::Config;
use crate::error::{ApiError, AppError, BackendError};
use crate::models::record::file_name_of;
use crate::models::{ExtractionRecord, PaperContent};

const SERVICE_NAME: &str = "OpenAI";
const ASSISTANT_NAME: &str = "PDF Extractor";
const ASSISTANT_INSTRUCTIONS: &str = "You extract structured information from academic PDFs.";

const EXTRACTION_PROMPT: &str = "Extract the following information from this PDF:
1. Title
2. Authors (semicolon-separated)
3. Abstract
4. Full text content
5. All figure captions (each separated by double newlines)
6. All table captions (each separated by double newlines)

Return as json with keys: title, authors, abstract, full_text, figure_captions, table_captions
Return nothing else.";

/// 单次抽取中创建的远端资源，按获取顺序记录
#[derive(Debug, Default)]
struct RemoteResources {
    file_id: Option<String>,
    assistant_id: Option<String>,
    thread_id: Option<String>,
}

/// 云端文件助手后端
///
/// 职责：
/// - 每个文件使用独立的上传文件、助手和会话
/// - 无论成功与否，结束时删除本次创建的所有远端资源
pub struct AssistantBackend {
    client: Client<OpenAIConfig>,
    model: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl AssistantBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(config.llm_api_base_url.trim_end_matches('/'))
            .with_header(OPENAI_BETA_HEADER, "assistants=v2")?;

        Ok(Self {
            client: Client::with_config(openai_config),
            model: config.llm_model_name.clone(),
            poll_interval: Duration::from_millis(config.assistant_poll_interval_ms),
            max_wait: Duration::from_secs(config.assistant_max_wait_secs),
        })
    }

    fn api_failed(&self, e: OpenAIError) -> anyhow::Error {
        AppError::llm_api_failed(&self.model, e.to_string()).into()
    }

    async fn upload(&self, path: &Path) -> Result<String> {
        let request = CreateFileRequestArgs::default()
            .file(path)
            .purpose(FilePurpose::Assistants)
            .build()?;
        let file = self
            .client
            .files()
            .create(request)
            .await
            .map_err(|e| self.api_failed(e))?;
        Ok(file.id)
    }

    async fn create_assistant(&self) -> Result<String> {
        let request = CreateAssistantRequestArgs::default()
            .name(ASSISTANT_NAME)
            .instructions(ASSISTANT_INSTRUCTIONS)
            .model(&self.model)
            .tools(vec![AssistantTools::FileSearch(
                AssistantToolsFileSearch::default(),
            )])
            .build()?;
        let assistant = self
            .client
            .assistants()
            .create(request)
            .await
            .map_err(|e| self.api_failed(e))?;
        Ok(assistant.id)
    }

    /// 创建带提示词和附件的会话
    async fn create_thread(&self, file_id: &str) -> Result<String> {
        let message = CreateMessageRequestArgs::default()
            .role(MessageRole::User)
            .content(EXTRACTION_PROMPT)
            .attachments(vec![MessageAttachment {
                file_id: file_id.to_string(),
                tools: vec![MessageAttachmentTool::FileSearch],
            }])
            .build()?;
        let request = CreateThreadRequestArgs::default()
            .messages(vec![message])
            .build()?;
        let thread = self
            .client
            .threads()
            .create(request)
            .await
            .map_err(|e| self.api_failed(e))?;
        Ok(thread.id)
    }

    async fn start_run(&self, thread_id: &str, assistant_id: &str) -> Result<String> {
        let request = CreateRunRequestArgs::default()
            .assistant_id(assistant_id)
            .build()?;
        let run = self
            .client
            .threads()
            .runs(thread_id)
            .create(request)
            .await
            .map_err(|e| self.api_failed(e))?;
        Ok(run.id)
    }

    /// 轮询运行状态直到结束；超过最长等待时间视为失败
    async fn wait_for_run(&self, thread_id: &str, run_id: &str) -> Result<()> {
        let started = Instant::now();

        loop {
            let run = self
                .client
                .threads()
                .runs(thread_id)
                .retrieve(run_id)
                .await
                .map_err(|e| self.api_failed(e))?;

            match &run.status {
                RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling => {
                    debug!("运行状态: {}", status_label(&run.status));
                }
                RunStatus::Completed => return Ok(()),
                other => {
                    return Err(BackendError::RunFailed {
                        status: status_label(other),
                    }
                    .into())
                }
            }

            if started.elapsed() >= self.max_wait {
                return Err(BackendError::RunTimedOut {
                    seconds: self.max_wait.as_secs(),
                }
                .into());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// 最新一条消息中的第一段文本
    async fn latest_reply(&self, thread_id: &str) -> Result<String> {
        let messages = self
            .client
            .threads()
            .messages(thread_id)
            .query(&[("order", "desc"), ("limit", "1")])?
            .list()
            .await
            .map_err(|e| self.api_failed(e))?;

        messages
            .data
            .into_iter()
            .next()
            .and_then(|message| {
                message.content.into_iter().find_map(|content| match content {
                    MessageContent::Text(text) => Some(text.text.value),
                    _ => None,
                })
            })
            .ok_or_else(|| {
                AppError::Api(ApiError::MissingField {
                    endpoint: format!("/threads/{}/messages", thread_id),
                    field: "content[].text.value".to_string(),
                })
                .into()
            })
    }

    async fn process(&self, path: &Path, resources: &mut RemoteResources) -> Result<PaperContent> {
        let filename = file_name_of(path);

        let file_id = self.upload(path).await?;
        debug!("已上传文件: {}", file_id);
        resources.file_id = Some(file_id.clone());

        let assistant_id = self.create_assistant().await?;
        resources.assistant_id = Some(assistant_id.clone());

        let thread_id = self.create_thread(&file_id).await?;
        resources.thread_id = Some(thread_id.clone());

        let run_id = self.start_run(&thread_id, &assistant_id).await?;
        self.wait_for_run(&thread_id, &run_id).await?;
        let reply = self.latest_reply(&thread_id).await?;

        Ok(parse_reply(&reply, &filename))
    }

    /// 删除已记录的远端资源，失败只记日志
    async fn cleanup(&self, resources: &RemoteResources) {
        if let Some(id) = &resources.file_id {
            if let Err(e) = self.client.files().delete(id).await {
                warn!("⚠️ 清理远端文件 {} 失败: {}", id, e);
            }
        }
        if let Some(id) = &resources.assistant_id {
            if let Err(e) = self.client.assistants().delete(id).await {
                warn!("⚠️ 清理远端助手 {} 失败: {}", id, e);
            }
        }
        if let Some(id) = &resources.thread_id {
            if let Err(e) = self.client.threads().delete(id).await {
                warn!("⚠️ 清理远端会话 {} 失败: {}", id, e);
            }
        }
    }
}

#[async_trait]
impl ExtractionBackend for AssistantBackend {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn extract(&self, path: &Path) -> ExtractionRecord {
        let mut resources = RemoteResources::default();
        let result = self.process(path, &mut resources).await;
        self.cleanup(&resources).await;

        match result {
            Ok(content) => {
                info!("  助手已返回 {}", content.filename);
                ExtractionRecord::Success(content)
            }
            Err(e) => {
                warn!("✗ 助手处理 {} 失败: {:#}", file_name_of(path), e);
                ExtractionRecord::failed(file_name_of(path), format!("{:#}", e))
            }
        }
    }
}

/// 运行状态的接口原文，如 `failed`、`expired`
fn status_label(status: &RunStatus) -> String {
    match serde_json::to_value(status) {
        Ok(Value::String(label)) => label,
        _ => format!("{:?}", status),
    }
}

/// 去掉回复外层的 Markdown 代码块
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = match inner.find('\n') {
        Some(newline) => &inner[newline + 1..],
        None => inner,
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn text_field(map: &Map<String, Value>, key: &str, separator: &str) -> String {
    match map.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => join_non_empty(
            items.iter().map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            separator,
        ),
        Some(other) => other.to_string(),
    }
}

/// 解析助手回复；不是 JSON 对象时整段作为正文
pub fn parse_reply(reply: &str, filename: &str) -> PaperContent {
    match serde_json::from_str::<Value>(strip_code_fence(reply)) {
        Ok(Value::Object(map)) => PaperContent {
            filename: filename.to_string(),
            title: text_field(&map, "title", " "),
            authors: text_field(&map, "authors", "; "),
            abstract_text: text_field(&map, "abstract", "\n\n"),
            full_text: text_field(&map, "full_text", "\n\n"),
            figure_captions: text_field(&map, "figure_captions", "\n\n"),
            table_captions: text_field(&map, "table_captions", "\n\n"),
        },
        _ => PaperContent {
            full_text: reply.to_string(),
            ..PaperContent::empty(filename)
        },
    }
}
