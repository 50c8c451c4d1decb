//! 工作流分类服务 - 业务能力层
//!
//! 只负责"给一个工作流打标签"能力，不重试

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::infrastructure::{generate_json, StructuredPrompt, TextGenerator};
use crate::models::analysis::{analysis_schema, AnalysisFields, WorkflowAnalysis};

const SYSTEM_MESSAGE: &str = "You are an expert in metabolomics workflows. Analyze the provided workflow data and extract the requested information accurately.";

const ANALYSIS_PROMPT: &str = r#"Analyze this metabolomics workflow and extract the following information:

1. **has_untargeted_metabolomics**: Does the paper have an untargeted metabolomics workflow? (boolean)
2. **uses_ms**: Does the workflow use mass spectrometry (MS)? (boolean)
3. **uses_lcms**: Does the workflow use LC-MS or UPLC-MS? (boolean)
4. **uses_gcms**: Does the workflow use GC-MS? (boolean)
5. **uses_msms**: Does the workflow use MS/MS or tandem MS? (boolean)
6. **sample_type**: What type of samples were analyzed? (e.g., "zebrafish larvae", "mouse liver", "human aqueous humor", "unspecified")
7. **has_sample_prep**: Is sample preparation explicitly described? (boolean)
8. **has_extraction**: Is metabolite/lipid extraction explicitly described? (boolean)
9. **has_normalization**: Is data normalization explicitly described? (boolean)
10. **uses_pca**: Does the workflow use PCA? (boolean)
11. **uses_plsda**: Does the workflow use PLS-DA? (boolean)
12. **has_statistical_analysis**: Does the workflow include statistical analysis? (boolean)
13. **has_pathway_analysis**: Does the workflow include pathway analysis? (boolean)
14. **uses_kegg**: Does the workflow use KEGG database? (boolean)
15. **num_workflow_steps**: How many workflow steps are described? (integer)
16. **num_tools_mentioned**: How many tools/software are explicitly mentioned? (integer)
17. **num_databases_mentioned**: How many databases/APIs are explicitly mentioned? (integer)
18. **has_annotation**: Does the workflow include metabolite identification/annotation? (boolean)
19. **workflow_completeness**: Rate completeness on scale 1-5 (1=very incomplete, 5=very complete)
20. **main_analytical_platform**: Primary analytical platform (e.g., "UPLC-Q Exactive/MS", "LC-MS", "GC-MS", "unspecified")

Return as JSON with these exact keys."#;

const SCHEMA_NAME: &str = "workflow_analysis";

/// 工作流分类服务
pub struct WorkflowClassifier {
    generator: Arc<dyn TextGenerator>,
    schema: serde_json::Value,
}

impl WorkflowClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            schema: analysis_schema(),
        }
    }

    /// 对一个工作流进行分类
    ///
    /// `workflow` 按保存时的原样传入，不做结构校验。
    /// 任何错误都会变成占位记录（带 `error` 字段），不会向上抛出。
    pub async fn classify(&self, workflow: &serde_json::Value, filename: &str) -> WorkflowAnalysis {
        match self.request(workflow).await {
            Ok(fields) => {
                debug!("[{}] 分类完成", filename);
                WorkflowAnalysis {
                    filename: filename.to_string(),
                    fields,
                    error: None,
                }
            }
            Err(e) => {
                warn!("  ✗ 分析 {} 失败: {}", filename, e);
                WorkflowAnalysis::failed(filename, e)
            }
        }
    }

    async fn request(&self, workflow: &serde_json::Value) -> Result<AnalysisFields> {
        let workflow_json = serde_json::to_string_pretty(workflow)?;
        let user_message = format!(
            "{}\n\nWorkflow to analyze:\n{}",
            ANALYSIS_PROMPT, workflow_json
        );

        generate_json(
            self.generator.as_ref(),
            StructuredPrompt {
                system: SYSTEM_MESSAGE,
                user: &user_message,
                schema_name: SCHEMA_NAME,
                schema: &self.schema,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedGenerator {
        reply: Result<String, String>,
        calls: AtomicUsize,
        last_user: Mutex<String>,
    }

    impl FixedGenerator {
        fn new(reply: Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                calls: AtomicUsize::new(0),
                last_user: Mutex::new(String::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, prompt: StructuredPrompt<'_>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_user.lock().unwrap() = prompt.user.to_string();
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    const REPLY: &str = r#"{
        "has_untargeted_metabolomics": true, "uses_ms": true, "uses_lcms": false, "uses_gcms": true,
        "uses_msms": false, "sample_type": "zebrafish larvae", "has_sample_prep": true,
        "has_extraction": true, "has_normalization": true, "uses_pca": true, "uses_plsda": false,
        "has_statistical_analysis": true, "has_pathway_analysis": false, "uses_kegg": false,
        "num_workflow_steps": 5, "num_tools_mentioned": 2, "num_databases_mentioned": 1,
        "has_annotation": true, "workflow_completeness": 3, "main_analytical_platform": "GC-MS"
    }"#;

    #[tokio::test]
    async fn test_classify_success() {
        let generator = FixedGenerator::new(Ok(REPLY));
        let classifier = WorkflowClassifier::new(generator.clone());
        let workflow = serde_json::json!({
            "paper_has_untargeted_metabolomics": true,
            "workflow_steps": [],
            "unspecified_or_omitted_steps": [],
            "notes_on_ambiguity": "derivatization unclear"
        });

        let analysis = classifier.classify(&workflow, "zf.pdf").await;

        assert_eq!(analysis.filename, "zf.pdf");
        assert!(analysis.error.is_none());
        assert!(analysis.fields.uses_gcms);
        assert_eq!(analysis.fields.main_analytical_platform, "GC-MS");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        let user = generator.last_user.lock().unwrap().clone();
        assert!(user.contains("Workflow to analyze:"));
        assert!(user.contains("derivatization unclear"));
    }

    #[tokio::test]
    async fn test_classify_failure_is_not_retried() {
        let generator = FixedGenerator::new(Err("quota exceeded"));
        let classifier = WorkflowClassifier::new(generator.clone());

        let analysis = classifier
            .classify(&serde_json::json!({}), "bad.pdf")
            .await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(analysis.error.as_deref(), Some("quota exceeded"));
        assert_eq!(analysis.fields.sample_type, "error");
        assert_eq!(analysis.fields.num_workflow_steps, 0);
        assert!(!analysis.fields.has_untargeted_metabolomics);
    }

    #[tokio::test]
    async fn test_classify_missing_field_is_error() {
        let generator = FixedGenerator::new(Ok(r#"{"uses_ms": true}"#));
        let classifier = WorkflowClassifier::new(generator);

        let analysis = classifier
            .classify(&serde_json::json!({}), "partial.pdf")
            .await;

        assert!(analysis.error.is_some());
        assert_eq!(analysis.fields.main_analytical_platform, "error");
    }

    #[tokio::test]
    async fn test_off_schema_keys_reach_the_prompt() {
        let generator = FixedGenerator::new(Ok(REPLY));
        let classifier = WorkflowClassifier::new(generator.clone());
        let workflow = serde_json::json!({
            "has_untargeted_metabolomics": true,
            "steps": ["GC-MS after MSTFA derivatization"]
        });

        let analysis = classifier.classify(&workflow, "legacy.pdf").await;

        assert!(analysis.error.is_none());
        let user = generator.last_user.lock().unwrap().clone();
        assert!(user.contains("\"steps\""));
        assert!(user.contains("MSTFA derivatization"));
    }
}
