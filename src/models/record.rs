//! 单个 PDF 的抽取结果

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::workflow::WorkflowDescription;

/// 成功抽取的论文内容
///
/// 所有文本字段都可能为空字符串，但字段本身总是存在。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperContent {
    pub filename: String,
    pub title: String,
    pub authors: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub full_text: String,
    pub figure_captions: String,
    pub table_captions: String,
}

impl PaperContent {
    /// 只含文件名的空内容
    pub fn empty(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Default::default()
        }
    }
}

/// 抽取失败的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub filename: String,
    pub error: String,
}

/// 后端抽取结果：内容与错误互斥
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionRecord {
    Success(PaperContent),
    Failed(FailedRecord),
}

impl ExtractionRecord {
    pub fn failed(filename: impl Into<String>, error: impl ToString) -> Self {
        ExtractionRecord::Failed(FailedRecord {
            filename: filename.into(),
            error: error.to_string(),
        })
    }

    pub fn filename(&self) -> &str {
        match self {
            ExtractionRecord::Success(content) => &content.filename,
            ExtractionRecord::Failed(failed) => &failed.filename,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionRecord::Success(_))
    }
}

/// 批处理中成功的一项：内容 + 可选的工作流
///
/// 未开启工作流抽取时 `workflow` 为 `None`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedPaper {
    pub content: PaperContent,
    pub workflow: Option<WorkflowDescription>,
}

/// 取文件名（含扩展名），用作记录主键
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// 取文件名主干，作为缺失标题时的兜底
pub fn file_stem_of(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
