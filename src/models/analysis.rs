//! 工作流分类结果

use serde::{Deserialize, Serialize};

/// 分析结果 CSV 的固定列顺序（可能再追加 `error` 列）
pub const ANALYSIS_COLUMNS: [&str; 21] = [
    "filename",
    "has_untargeted_metabolomics",
    "uses_ms",
    "uses_lcms",
    "uses_gcms",
    "uses_msms",
    "main_analytical_platform",
    "sample_type",
    "has_sample_prep",
    "has_extraction",
    "has_normalization",
    "uses_pca",
    "uses_plsda",
    "has_statistical_analysis",
    "has_pathway_analysis",
    "uses_kegg",
    "has_annotation",
    "num_workflow_steps",
    "num_tools_mentioned",
    "num_databases_mentioned",
    "workflow_completeness",
];

/// LLM 按 schema 返回的 20 个字段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFields {
    pub has_untargeted_metabolomics: bool,
    pub uses_ms: bool,
    pub uses_lcms: bool,
    pub uses_gcms: bool,
    pub uses_msms: bool,
    pub sample_type: String,
    pub has_sample_prep: bool,
    pub has_extraction: bool,
    pub has_normalization: bool,
    pub uses_pca: bool,
    pub uses_plsda: bool,
    pub has_statistical_analysis: bool,
    pub has_pathway_analysis: bool,
    pub uses_kegg: bool,
    pub num_workflow_steps: i64,
    pub num_tools_mentioned: i64,
    pub num_databases_mentioned: i64,
    pub has_annotation: bool,
    /// 1-5
    pub workflow_completeness: i64,
    pub main_analytical_platform: String,
}

impl AnalysisFields {
    /// 分类失败时的占位值：布尔全 false，数字全 0，字符串全 "error"
    pub fn error_sentinel() -> Self {
        Self {
            sample_type: "error".to_string(),
            main_analytical_platform: "error".to_string(),
            ..Default::default()
        }
    }
}

/// 一篇论文的工作流分析
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowAnalysis {
    pub filename: String,
    #[serde(flatten)]
    pub fields: AnalysisFields,
    /// 只有分类失败的占位记录才会带上
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl WorkflowAnalysis {
    pub fn failed(filename: impl Into<String>, error: impl ToString) -> Self {
        Self {
            filename: filename.into(),
            fields: AnalysisFields::error_sentinel(),
            error: Some(error.to_string()),
        }
    }

    /// 按 [`ANALYSIS_COLUMNS`] 的顺序输出一行
    pub fn csv_row(&self) -> Vec<String> {
        let f = &self.fields;
        vec![
            self.filename.clone(),
            f.has_untargeted_metabolomics.to_string(),
            f.uses_ms.to_string(),
            f.uses_lcms.to_string(),
            f.uses_gcms.to_string(),
            f.uses_msms.to_string(),
            f.main_analytical_platform.clone(),
            f.sample_type.clone(),
            f.has_sample_prep.to_string(),
            f.has_extraction.to_string(),
            f.has_normalization.to_string(),
            f.uses_pca.to_string(),
            f.uses_plsda.to_string(),
            f.has_statistical_analysis.to_string(),
            f.has_pathway_analysis.to_string(),
            f.uses_kegg.to_string(),
            f.has_annotation.to_string(),
            f.num_workflow_steps.to_string(),
            f.num_tools_mentioned.to_string(),
            f.num_databases_mentioned.to_string(),
            f.workflow_completeness.to_string(),
        ]
    }
}

/// 一次分析的汇总统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisSummary {
    pub total: usize,
    pub failed: usize,
    pub untargeted: usize,
    pub lcms: usize,
    pub gcms: usize,
    pub msms: usize,
    pub pathway: usize,
    pub kegg: usize,
    /// 所有行的平均值（失败行按 0 计）
    pub average_completeness: f64,
}

impl AnalysisSummary {
    pub fn from_analyses(analyses: &[WorkflowAnalysis]) -> Self {
        let count = |pick: fn(&AnalysisFields) -> bool| {
            analyses.iter().filter(|a| pick(&a.fields)).count()
        };
        let average_completeness = if analyses.is_empty() {
            0.0
        } else {
            let sum: i64 = analyses.iter().map(|a| a.fields.workflow_completeness).sum();
            sum as f64 / analyses.len() as f64
        };

        Self {
            total: analyses.len(),
            failed: analyses.iter().filter(|a| a.error.is_some()).count(),
            untargeted: count(|f| f.has_untargeted_metabolomics),
            lcms: count(|f| f.uses_lcms),
            gcms: count(|f| f.uses_gcms),
            msms: count(|f| f.uses_msms),
            pathway: count(|f| f.has_pathway_analysis),
            kegg: count(|f| f.uses_kegg),
            average_completeness,
        }
    }
}

/// 分类请求使用的 `JSON Schema`
pub fn analysis_schema() -> serde_json::Value {
    let boolean = serde_json::json!({ "type": "boolean" });
    let integer = serde_json::json!({ "type": "integer" });
    let string = serde_json::json!({ "type": "string" });

    let mut properties = serde_json::Map::new();
    for column in ANALYSIS_COLUMNS.iter().skip(1) {
        let kind = match *column {
            "sample_type" | "main_analytical_platform" => string.clone(),
            "workflow_completeness" => {
                serde_json::json!({ "type": "integer", "minimum": 1, "maximum": 5 })
            }
            c if c.starts_with("num_") => integer.clone(),
            _ => boolean.clone(),
        };
        properties.insert(column.to_string(), kind);
    }

    let required: Vec<&str> = ANALYSIS_COLUMNS.iter().skip(1).copied().collect();
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
