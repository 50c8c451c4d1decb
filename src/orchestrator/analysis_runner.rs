//! 工作流分析 - 编排层
//!
//! 读取批处理保存的 `<name>_workflows.json`，逐个分类后写出分析 CSV。

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::models::AnalysisSummary;
use crate::services::result_writer::{read_saved_workflows, write_analysis_csv};
use crate::services::WorkflowClassifier;
use crate::utils::logging::print_analysis_stats;

/// 工作流分析流程
pub struct AnalysisRunner {
    classifier: WorkflowClassifier,
}

impl AnalysisRunner {
    pub fn new(classifier: WorkflowClassifier) -> Self {
        Self { classifier }
    }

    /// 分析 `input_json` 中的所有工作流，结果写入 `output_csv`
    pub async fn run(&self, input_json: &Path, output_csv: &Path) -> Result<AnalysisSummary> {
        info!("📂 正在读取工作流: {}", input_json.display());
        let entries = read_saved_workflows(input_json)?;
        let total = entries.len();
        info!("✓ 找到 {} 个工作流待分析", total);

        let mut analyses = Vec::with_capacity(total);
        for (i, entry) in entries.into_iter().enumerate() {
            let filename = entry.filename.unwrap_or_else(|| format!("unknown_{}", i));
            info!("[{}/{}] 🔍 正在分析: {}", i + 1, total, filename);

            // 原样交给分类器，不在本地丢弃未知字段
            let workflow = entry
                .workflow
                .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
            let analysis = self.classifier.classify(&workflow, &filename).await;

            match &analysis.error {
                None => info!("  ✓ 分析完成"),
                Some(error) => warn!("  ✗ 分析失败: {}", error),
            }
            analyses.push(analysis);
        }

        write_analysis_csv(output_csv, &analyses)?;

        let summary = AnalysisSummary::from_analyses(&analyses);
        print_analysis_stats(&summary, output_csv);
        Ok(summary)
    }
}
