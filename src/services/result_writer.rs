//! 结果写入服务 - 业务能力层
//!
//! 只负责把记录写成 CSV / JSON，不关心流程

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, FileError};
use crate::models::analysis::{WorkflowAnalysis, ANALYSIS_COLUMNS};
use crate::models::record::{FailedRecord, ProcessedPaper};
use crate::models::workflow::WorkflowDescription;

const CONTENT_COLUMNS: [&str; 7] = [
    "filename",
    "title",
    "authors",
    "abstract",
    "full_text",
    "figure_captions",
    "table_captions",
];

/// `<name>_workflows.json` 中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowEntry<'a> {
    pub filename: &'a str,
    pub title: &'a str,
    pub workflow: &'a WorkflowDescription,
}

/// 读取 `<name>_workflows.json` 时的一项，字段都可能缺失
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SavedWorkflowEntry {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub workflow: Option<serde_json::Value>,
}

/// 结果写入服务
///
/// 职责：
/// - 在输出目录下按 `<name>` 生成各类输出文件
/// - 返回写出的文件路径，便于汇总日志
pub struct ResultWriter {
    output_dir: PathBuf,
    output_name: String,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>, output_name: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            output_name: output_name.into(),
        }
    }

    pub fn content_csv_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.csv", self.output_name))
    }

    pub fn workflows_json_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_workflows.json", self.output_name))
    }

    pub fn failed_csv_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_failed.csv", self.output_name))
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).map_err(|source| {
            AppError::File(FileError::WriteFailed {
                path: self.output_dir.display().to_string(),
                source,
            })
        })?;
        Ok(())
    }

    /// 写 `<name>.csv`：每个成功文件一行
    ///
    /// `include_workflow` 为 true 时追加 `workflow_json` 列。
    pub fn write_contents(&self, papers: &[ProcessedPaper], include_workflow: bool) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.content_csv_path();
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("无法创建文件: {}", path.display()))?;

        let mut header: Vec<&str> = CONTENT_COLUMNS.to_vec();
        if include_workflow {
            header.push("workflow_json");
        }
        writer.write_record(&header)?;

        for paper in papers {
            let c = &paper.content;
            let mut row = vec![
                c.filename.clone(),
                c.title.clone(),
                c.authors.clone(),
                c.abstract_text.clone(),
                c.full_text.clone(),
                c.figure_captions.clone(),
                c.table_captions.clone(),
            ];
            if include_workflow {
                let workflow = match &paper.workflow {
                    Some(workflow) => serde_json::to_string(workflow)?,
                    None => String::new(),
                };
                row.push(workflow);
            }
            writer.write_record(&row)?;
        }

        writer.flush()?;
        debug!("已写入 {} 行: {}", papers.len(), path.display());
        Ok(path)
    }

    /// 写 `<name>_workflows.json`：只含文件名、标题和工作流
    pub fn write_workflows(&self, papers: &[ProcessedPaper]) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.workflows_json_path();

        let entries: Vec<WorkflowEntry<'_>> = papers
            .iter()
            .filter_map(|paper| {
                paper.workflow.as_ref().map(|workflow| WorkflowEntry {
                    filename: &paper.content.filename,
                    title: &paper.content.title,
                    workflow,
                })
            })
            .collect();

        let json = serde_json::to_string_pretty(&entries)?;
        fs::write(&path, json)
            .map_err(|source| AppError::file_write_failed(path.display().to_string(), source))?;
        Ok(path)
    }

    /// 写 `<name>_failed.csv`；没有失败时不生成文件，返回 `None`
    pub fn write_failures(&self, failed: &[FailedRecord]) -> Result<Option<PathBuf>> {
        if failed.is_empty() {
            return Ok(None);
        }
        self.ensure_dir()?;
        let path = self.failed_csv_path();
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("无法创建文件: {}", path.display()))?;
        for record in failed {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(Some(path))
    }
}

/// 写工作流分析 CSV，列顺序固定；任一行带错误时追加 `error` 列
pub fn write_analysis_csv(path: &Path, analyses: &[WorkflowAnalysis]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|source| AppError::file_write_failed(parent.display().to_string(), source))?;
    }

    let with_error = analyses.iter().any(|a| a.error.is_some());
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("无法创建文件: {}", path.display()))?;

    let mut header: Vec<&str> = ANALYSIS_COLUMNS.to_vec();
    if with_error {
        header.push("error");
    }
    writer.write_record(&header)?;

    for analysis in analyses {
        let mut row = analysis.csv_row();
        if with_error {
            row.push(analysis.error.clone().unwrap_or_default());
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// 读取之前保存的 `<name>_workflows.json`
pub fn read_saved_workflows(path: &Path) -> Result<Vec<SavedWorkflowEntry>> {
    let content = fs::read_to_string(path).map_err(|source| {
        AppError::File(FileError::ReadFailed {
            path: path.display().to_string(),
            source,
        })
    })?;
    let entries = serde_json::from_str(&content)
        .with_context(|| format!("无法解析工作流文件: {}", path.display()))?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::AnalysisFields;
    use crate::models::record::PaperContent;

    fn paper(name: &str, workflow: Option<WorkflowDescription>) -> ProcessedPaper {
        ProcessedPaper {
            content: PaperContent {
                title: format!("Title of {}", name),
                full_text: "Line one,\n\"quoted\" line two".to_string(),
                ..PaperContent::empty(name)
            },
            workflow,
        }
    }

    fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let header = reader.headers().unwrap().iter().map(String::from).collect();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        (header, rows)
    }

    #[test]
    fn test_contents_csv_with_workflow_column() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(dir.path().join("out"), "run");
        let papers = vec![
            paper("a.pdf", Some(WorkflowDescription::no_full_text())),
            paper("b.pdf", Some(WorkflowDescription::default())),
        ];

        let path = writer.write_contents(&papers, true).unwrap();
        assert_eq!(path, dir.path().join("out").join("run.csv"));

        let (header, rows) = read_csv(&path);
        assert_eq!(header.last().unwrap(), "workflow_json");
        assert_eq!(header[3], "abstract");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][4], "Line one,\n\"quoted\" line two");

        let workflow: WorkflowDescription = serde_json::from_str(&rows[0][7]).unwrap();
        assert_eq!(workflow, WorkflowDescription::no_full_text());
    }

    #[test]
    fn test_contents_csv_without_workflow_column() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(dir.path(), "plain");
        let path = writer.write_contents(&[paper("a.pdf", None)], false).unwrap();

        let (header, rows) = read_csv(&path);
        assert_eq!(header.len(), 7);
        assert_eq!(rows[0][0], "a.pdf");
    }

    #[test]
    fn test_workflows_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(dir.path(), "run");
        let path = writer
            .write_workflows(&[paper("a.pdf", Some(WorkflowDescription::no_full_text()))])
            .unwrap();

        let saved = read_saved_workflows(&path).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].filename.as_deref(), Some("a.pdf"));
        assert_eq!(saved[0].title.as_deref(), Some("Title of a.pdf"));
        let workflow: WorkflowDescription =
            serde_json::from_value(saved[0].workflow.clone().unwrap()).unwrap();
        assert_eq!(workflow, WorkflowDescription::no_full_text());
    }

    #[test]
    fn test_failures_written_only_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(dir.path(), "run");

        assert!(writer.write_failures(&[]).unwrap().is_none());
        assert!(!writer.failed_csv_path().exists());

        let path = writer
            .write_failures(&[FailedRecord {
                filename: "broken.pdf".to_string(),
                error: "invalid file header".to_string(),
            }])
            .unwrap()
            .unwrap();
        let (header, rows) = read_csv(&path);
        assert_eq!(header, vec!["filename", "error"]);
        assert_eq!(rows[0], vec!["broken.pdf", "invalid file header"]);
    }

    #[test]
    fn test_analysis_csv_error_column_is_conditional() {
        let dir = tempfile::tempdir().unwrap();
        let ok = WorkflowAnalysis {
            filename: "ok.pdf".to_string(),
            fields: AnalysisFields::default(),
            error: None,
        };

        let clean = dir.path().join("clean.csv");
        write_analysis_csv(&clean, &[ok.clone()]).unwrap();
        let (header, _) = read_csv(&clean);
        assert_eq!(header.len(), 21);

        let mixed = dir.path().join("nested").join("mixed.csv");
        write_analysis_csv(&mixed, &[ok, WorkflowAnalysis::failed("bad.pdf", "boom")]).unwrap();
        let (header, rows) = read_csv(&mixed);
        assert_eq!(header.len(), 22);
        assert_eq!(header[21], "error");
        assert_eq!(rows[0][21], "");
        assert_eq!(rows[1][21], "boom");
    }
}
