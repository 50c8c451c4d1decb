//! 论文处理流程 - 流程层
//!
//! 核心职责：定义"一个 PDF"的完整处理流程
//!
//! 流程顺序：
//! 1. 后端抽取内容
//! 2. 抽取成功且开启工作流抽取时，对全文抽取工作流
//! 3. 失败的文件直接返回失败记录

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::backends::ExtractionBackend;
use crate::models::{ExtractionRecord, FailedRecord, ProcessedPaper};
use crate::services::WorkflowExtractor;
use crate::utils::truncate_text;
use crate::workflow::paper_ctx::PaperCtx;

/// 单个文件的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum PaperOutcome {
    Processed(ProcessedPaper),
    Failed(FailedRecord),
}

/// 论文处理流程
///
/// - 决定何时抽取内容、何时抽取工作流
/// - 只依赖后端和业务能力（services）
/// - 不写文件，不做统计
pub struct PaperFlow {
    backend: Arc<dyn ExtractionBackend>,
    extractor: Option<WorkflowExtractor>,
    verbose_logging: bool,
}

impl PaperFlow {
    /// `extractor` 为 `None` 时跳过工作流抽取
    pub fn new(
        backend: Arc<dyn ExtractionBackend>,
        extractor: Option<WorkflowExtractor>,
        verbose_logging: bool,
    ) -> Self {
        Self {
            backend,
            extractor,
            verbose_logging,
        }
    }

    pub fn backend(&self) -> &dyn ExtractionBackend {
        self.backend.as_ref()
    }

    pub fn extracts_workflows(&self) -> bool {
        self.extractor.is_some()
    }

    pub async fn run(&self, path: &Path, ctx: &PaperCtx) -> PaperOutcome {
        info!("{} 📄 正在抽取内容 ({})...", ctx, self.backend.name());

        let content = match self.backend.extract(path).await {
            ExtractionRecord::Success(content) => content,
            ExtractionRecord::Failed(failed) => {
                warn!("{} ❌ 抽取失败: {}", ctx, failed.error);
                return PaperOutcome::Failed(failed);
            }
        };

        info!(
            "{} ✓ 抽取完成: {}",
            ctx,
            truncate_text(&content.title, 60)
        );
        if self.verbose_logging {
            info!(
                "{}   全文 {} 字符, 摘要: {}",
                ctx,
                content.full_text.chars().count(),
                truncate_text(&content.abstract_text, 80)
            );
        }

        let workflow = match &self.extractor {
            Some(extractor) => {
                info!("{} 🧪 正在抽取工作流...", ctx);
                let workflow = extractor.extract_workflow(&content.full_text).await;
                info!(
                    "{} ✓ 工作流包含 {} 个步骤",
                    ctx,
                    workflow.workflow_steps.len()
                );
                Some(workflow)
            }
            None => None,
        };

        PaperOutcome::Processed(ProcessedPaper { content, workflow })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{StructuredPrompt, TextGenerator};
    use crate::models::{PaperContent, WorkflowDescription};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedBackend(ExtractionRecord);

    #[async_trait]
    impl ExtractionBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn extract(&self, _path: &Path) -> ExtractionRecord {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, _prompt: StructuredPrompt<'_>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{
                "paper_has_untargeted_metabolomics": true,
                "workflow_steps": [
                    {"step_number": 1, "step_name": "Extraction", "description": "methanol/water",
                     "category": "sample prep", "tools_software": [], "databases_apis": [],
                     "inputs": ["plasma"], "outputs": ["extract"], "is_explicit_in_paper": true}
                ],
                "unspecified_or_omitted_steps": [],
                "notes_on_ambiguity": ""
            }"#
            .to_string())
        }
    }

    fn flow_with(record: ExtractionRecord, generator: Arc<CountingGenerator>) -> PaperFlow {
        let extractor = WorkflowExtractor::with_retry(generator, 1, Duration::ZERO);
        PaperFlow::new(Arc::new(FixedBackend(record)), Some(extractor), false)
    }

    #[tokio::test]
    async fn test_success_runs_workflow_extraction() {
        let generator = Arc::new(CountingGenerator::default());
        let content = PaperContent {
            full_text: "We extracted plasma metabolites.".to_string(),
            ..PaperContent::empty("a.pdf")
        };
        let flow = flow_with(ExtractionRecord::Success(content), generator.clone());

        let outcome = flow.run(Path::new("a.pdf"), &PaperCtx::new(1, 1, "a.pdf")).await;

        match outcome {
            PaperOutcome::Processed(paper) => {
                let workflow = paper.workflow.unwrap();
                assert!(workflow.paper_has_untargeted_metabolomics);
                assert_eq!(workflow.workflow_steps.len(), 1);
                assert_eq!(workflow.workflow_steps[0].inputs, vec!["plasma"]);
            }
            PaperOutcome::Failed(f) => panic!("unexpected failure: {}", f.error),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_full_text_skips_llm() {
        let generator = Arc::new(CountingGenerator::default());
        let flow = flow_with(
            ExtractionRecord::Success(PaperContent::empty("blank.pdf")),
            generator.clone(),
        );

        let outcome = flow
            .run(Path::new("blank.pdf"), &PaperCtx::new(1, 1, "blank.pdf"))
            .await;

        match outcome {
            PaperOutcome::Processed(paper) => {
                assert_eq!(paper.workflow, Some(WorkflowDescription::no_full_text()));
            }
            PaperOutcome::Failed(f) => panic!("unexpected failure: {}", f.error),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_extraction_skips_workflow() {
        let generator = Arc::new(CountingGenerator::default());
        let flow = flow_with(ExtractionRecord::failed("x.pdf", "boom"), generator.clone());

        let outcome = flow.run(Path::new("x.pdf"), &PaperCtx::new(1, 2, "x.pdf")).await;

        assert_eq!(
            outcome,
            PaperOutcome::Failed(FailedRecord {
                filename: "x.pdf".to_string(),
                error: "boom".to_string(),
            })
        );
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_without_extractor() {
        let flow = PaperFlow::new(
            Arc::new(FixedBackend(ExtractionRecord::Success(PaperContent::empty("a.pdf")))),
            None,
            true,
        );
        assert!(!flow.extracts_workflows());

        let outcome = flow.run(Path::new("a.pdf"), &PaperCtx::new(1, 1, "a.pdf")).await;
        match outcome {
            PaperOutcome::Processed(paper) => assert!(paper.workflow.is_none()),
            PaperOutcome::Failed(f) => panic!("unexpected failure: {}", f.error),
        }
    }
}
