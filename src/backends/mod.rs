//! 抽取后端
//!
//! 三种后端实现同一个能力：给一个 PDF 路径，返回 [`ExtractionRecord`]。
//! 后端之间互斥，由 [`Config::backend`] 选择。
//!
//! - [`AssistantBackend`] - 云端文件助手
//! - [`LayoutBackend`] - 本地版面解析
//! - [`GrobidBackend`] - 自建 GROBID 服务

pub mod assistant;
pub mod grobid;
pub mod layout;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{BackendKind, Config};
use crate::error::{AppError, ConfigError};
use crate::models::ExtractionRecord;

pub use assistant::AssistantBackend;
pub use grobid::GrobidBackend;
pub use layout::{LayoutBackend, LayoutParser, LopdfLayoutParser, ParsedDocument};

/// 抽取能力
///
/// 职责：
/// - 只处理单个文件
/// - 任何失败都转换成 `ExtractionRecord::Failed`，不向上抛错
/// - 文件之间不共享可变状态
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// 用于日志和 "<name> not available" 错误信息
    fn name(&self) -> &str;

    /// 批处理开始前的一次性可用性检查
    async fn preflight(&self) -> Result<()> {
        Ok(())
    }

    async fn extract(&self, path: &Path) -> ExtractionRecord;
}

/// 根据配置创建后端
pub fn build_backend(config: &Config) -> Result<Arc<dyn ExtractionBackend>> {
    let backend: Arc<dyn ExtractionBackend> = match config.backend {
        BackendKind::Assistant => {
            if config.llm_api_key.is_empty() {
                return Err(AppError::Config(ConfigError::Missing {
                    name: "OPENAI_API_KEY".to_string(),
                })
                .into());
            }
            Arc::new(AssistantBackend::new(config)?)
        }
        BackendKind::Layout => Arc::new(LayoutBackend::new(
            LopdfLayoutParser::default(),
            config.layout_artifact_dir.clone(),
        )),
        BackendKind::Grobid => Arc::new(GrobidBackend::new(config)?),
    };
    Ok(backend)
}

/// 过滤空白片段后用分隔符拼接
pub(crate) fn join_non_empty<I, S>(parts: I, separator: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .map(|part| part.as_ref().trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}
