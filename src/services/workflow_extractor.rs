//! 工作流抽取服务 - 业务能力层
//!
//! 只负责"从全文抽取工作流"能力，不关心流程

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::infrastructure::{generate_json, StructuredPrompt, TextGenerator};
use crate::models::workflow::{workflow_schema, WorkflowDescription};

const SYSTEM_MESSAGE: &str = "You are a precise assistant that does not hallucinate or create new information for extracting workflows from scientific papers.";

const INSTRUCTIONS: &str = r#"You are an expert in untargeted metabolomics and workflow design.

Given the full text of a metabolomics paper, extract ONLY the untargeted metabolomics workflow
used in the study. Focus on the main experimental and computational steps, in execution order.
The workflow you extract should be detailed enough for a researcher to read and carry out.
Do not omit any details directly relevant to the workflow. Include any relevant tools/APIs/databases
used in the workflow.

Guidelines:
- Include only steps that are explicitly described or clearly implied from the text.
- Do NOT invent tools, databases, or steps that are not supported by the paper.
- Use concise, technical language suitable for a computational systems biology researcher.
- If something is missing or unclear in the paper, mark it as "unspecified" rather than guessing.

Return your answer as JSON following the provided schema exactly."#;

const SCHEMA_NAME: &str = "metabolomics_workflow_extraction";

/// 工作流抽取服务
///
/// 职责：
/// - 构造抽取请求并调用 LLM
/// - 固定次数重试，每次重试前固定等待
/// - 失败后返回占位结果，从不向上抛错
/// - 不关心文件 / 批次
pub struct WorkflowExtractor {
    generator: Arc<dyn TextGenerator>,
    schema: serde_json::Value,
    max_retries: usize,
    retry_delay: Duration,
}

impl WorkflowExtractor {
    /// 使用配置中的重试参数
    pub fn new(generator: Arc<dyn TextGenerator>, config: &Config) -> Self {
        Self::with_retry(
            generator,
            config.workflow_max_retries,
            config.workflow_retry_delay(),
        )
    }

    /// 自定义重试参数；`max_retries` 为 0 时按 1 次处理
    pub fn with_retry(
        generator: Arc<dyn TextGenerator>,
        max_retries: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            generator,
            schema: workflow_schema(),
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// 从论文全文中抽取工作流
    ///
    /// 全文为空时直接返回占位结果，不调用 LLM。
    pub async fn extract_workflow(&self, full_text: &str) -> WorkflowDescription {
        let full_text = full_text.trim();
        if full_text.is_empty() {
            return WorkflowDescription::no_full_text();
        }

        let user_message = build_user_message(full_text);
        let mut attempt = 1;

        loop {
            match self.request(&user_message).await {
                Ok(workflow) => {
                    if let Err(issue) = workflow.check_step_order() {
                        warn!("⚠️ 工作流步骤编号异常（保留原结果）: {}", issue);
                    }
                    debug!("工作流抽取成功，共 {} 个步骤", workflow.workflow_steps.len());
                    return workflow;
                }
                Err(e) => {
                    warn!("  [第 {} 次尝试] 工作流抽取失败: {}", attempt, e);
                    if attempt >= self.max_retries {
                        return WorkflowDescription::extraction_failed(
                            self.max_retries,
                            &e.to_string(),
                        );
                    }
                    sleep(self.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn request(&self, user_message: &str) -> Result<WorkflowDescription> {
        generate_json(
            self.generator.as_ref(),
            StructuredPrompt {
                system: SYSTEM_MESSAGE,
                user: user_message,
                schema_name: SCHEMA_NAME,
                schema: &self.schema,
            },
        )
        .await
    }
}

fn build_user_message(full_text: &str) -> String {
    format!("{}\n\nFull paper text:\n{}\n", INSTRUCTIONS, full_text)
}
