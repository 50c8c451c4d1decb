//! 批量 PDF 处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量文件的处理和输出。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：输出启动信息，根据配置创建后端和抽取服务
//! 2. **批量加载**：按输入布局扫描 PDF，排序后截断到 `max_items`
//! 3. **可用性检查**：批处理开始前对后端做一次预检
//! 4. **顺序处理**：逐个委托 `PaperFlow`，文件之间固定间隔
//! 5. **结果输出**：内容 CSV、工作流 JSON、失败列表
//! 6. **全局统计**：汇总成功 / 失败数量和用时

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::backends::build_backend;
use crate::config::{Config, InputLayout};
use crate::error::{AppError, BackendError, FileError};
use crate::infrastructure::OpenAiGenerator;
use crate::models::record::file_name_of;
use crate::models::{AnalysisSummary, FailedRecord, ProcessedPaper};
use crate::orchestrator::analysis_runner::AnalysisRunner;
use crate::services::{ResultWriter, WorkflowClassifier, WorkflowExtractor};
use crate::utils::logging::{log_files_found, log_startup, print_final_stats};
use crate::workflow::{PaperCtx, PaperFlow, PaperOutcome};

/// 应用主结构
pub struct App {
    config: Config,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);
        if config.llm_api_key.is_empty() && config.extract_workflows {
            warn!("⚠️ 未设置 OPENAI_API_KEY，工作流抽取将全部失败");
        }
        Ok(Self { config })
    }

    /// 运行批量抽取
    pub async fn run(&self) -> Result<BatchSummary> {
        let backend = build_backend(&self.config)?;
        let extractor = if self.config.extract_workflows {
            let generator = Arc::new(OpenAiGenerator::new(&self.config));
            Some(WorkflowExtractor::new(generator, &self.config))
        } else {
            None
        };

        let flow = PaperFlow::new(backend, extractor, self.config.verbose_logging);
        let processor = BatchProcessor::new(flow, &self.config);

        let summary = processor
            .run_batch(
                &self.config.input_root,
                &self.config.output_name,
                &self.config.output_dir,
                self.config.max_items,
            )
            .await?;

        info!("📝 日志已保存至: {}", self.config.log_file.display());
        Ok(summary)
    }

    /// 对已保存的工作流做分类分析
    ///
    /// 未指定路径时使用配置中的默认路径。
    pub async fn analyze(
        &self,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
    ) -> Result<AnalysisSummary> {
        let input = input.unwrap_or_else(|| self.config.analysis_input_json.clone());
        let output = output.unwrap_or_else(|| self.config.analysis_output_csv.clone());

        let generator = Arc::new(OpenAiGenerator::new(&self.config));
        let runner = AnalysisRunner::new(WorkflowClassifier::new(generator));
        runner.run(&input, &output).await
    }
}

/// 一次批处理的结果汇总
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    /// 本次处理的文件数（截断之后）
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// 实际写出的文件
    pub outputs: Vec<PathBuf>,
}

/// 批量处理器
///
/// 职责：
/// - 扫描输入目录
/// - 顺序处理每个文件，不做并发
/// - 写出所有结果文件
pub struct BatchProcessor {
    flow: PaperFlow,
    input_layout: InputLayout,
    item_delay: Duration,
}

impl BatchProcessor {
    pub fn new(flow: PaperFlow, config: &Config) -> Self {
        Self::with_options(flow, config.input_layout, config.item_delay())
    }

    pub fn with_options(flow: PaperFlow, input_layout: InputLayout, item_delay: Duration) -> Self {
        Self {
            flow,
            input_layout,
            item_delay,
        }
    }

    /// 处理输入目录下的 PDF 并写出结果
    ///
    /// 只有输入目录不存在或结果无法写出时返回错误，单个文件的失败计入失败列表。
    pub async fn run_batch(
        &self,
        input_root: &Path,
        output_name: &str,
        output_dir: &Path,
        max_items: usize,
    ) -> Result<BatchSummary> {
        let started = Instant::now();

        info!("\n📁 正在扫描 {} ...", input_root.display());
        let found = discover_pdfs(input_root, self.input_layout)?;
        let total_found = found.len();
        let files: Vec<PathBuf> = found.into_iter().take(max_items).collect();
        log_files_found(total_found, files.len());

        let backend_name = self.flow.backend().name().to_string();
        let available = match self.flow.backend().preflight().await {
            Ok(()) => true,
            Err(e) => {
                warn!("❌ {} 不可用: {:#}", backend_name, e);
                false
            }
        };

        let mut processed: Vec<ProcessedPaper> = Vec::new();
        let mut failed: Vec<FailedRecord> = Vec::new();

        if available {
            for (i, path) in files.iter().enumerate() {
                let ctx = PaperCtx::new(i + 1, files.len(), file_name_of(path));

                match self.flow.run(path, &ctx).await {
                    PaperOutcome::Processed(paper) => processed.push(paper),
                    PaperOutcome::Failed(record) => failed.push(record),
                }

                if i + 1 < files.len() && !self.item_delay.is_zero() {
                    debug!("等待 {:?} 后处理下一个文件", self.item_delay);
                    tokio::time::sleep(self.item_delay).await;
                }
            }
        } else {
            let error = BackendError::Unavailable {
                backend: backend_name,
            }
            .to_string();
            failed.extend(files.iter().map(|path| FailedRecord {
                filename: file_name_of(path),
                error: error.clone(),
            }));
        }

        let writer = ResultWriter::new(output_dir, output_name);
        let include_workflow = self.flow.extracts_workflows();
        let mut outputs = vec![writer.write_contents(&processed, include_workflow)?];
        if include_workflow {
            outputs.push(writer.write_workflows(&processed)?);
        }
        if let Some(path) = writer.write_failures(&failed)? {
            outputs.push(path);
        }

        let summary = BatchSummary {
            total: files.len(),
            succeeded: processed.len(),
            failed: failed.len(),
            elapsed: started.elapsed(),
            outputs,
        };
        print_final_stats(
            summary.succeeded,
            summary.failed,
            summary.elapsed,
            &summary.outputs,
        );
        Ok(summary)
    }
}

/// 按输入布局扫描 PDF，按路径字典序返回
///
/// 扩展名大小写不敏感；输入目录不存在时报错。
pub fn discover_pdfs(root: &Path, layout: InputLayout) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(AppError::File(FileError::DirectoryNotFound {
            path: root.display().to_string(),
        })
        .into());
    }

    let depth = layout.depth();
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(depth)
        .max_depth(depth)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("⚠️ 跳过无法访问的路径: {}", e);
                continue;
            }
        };
        let is_pdf = entry
            .path()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if entry.file_type().is_file() && is_pdf {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ExtractionBackend;
    use crate::models::{ExtractionRecord, PaperContent};
    use async_trait::async_trait;
    use std::fs;

    struct EchoBackend;

    #[async_trait]
    impl ExtractionBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn extract(&self, path: &Path) -> ExtractionRecord {
            ExtractionRecord::Success(PaperContent::empty(file_name_of(path)))
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"%PDF-1.4").unwrap();
    }

    #[test]
    fn test_discover_nested_sorted_and_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b").join("2.pdf"));
        touch(&root.join("a").join("Z.PDF"));
        touch(&root.join("a").join("y.pdf"));
        touch(&root.join("a").join("notes.txt"));
        touch(&root.join("top.pdf"));
        touch(&root.join("a").join("deep").join("x.pdf"));

        let files = discover_pdfs(root, InputLayout::Nested).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a/Z.PDF", "a/y.pdf", "b/2.pdf"]);
    }

    #[test]
    fn test_discover_flat() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.pdf"));
        touch(&dir.path().join("a.pdf"));
        touch(&dir.path().join("sub").join("c.pdf"));

        let files = discover_pdfs(dir.path(), InputLayout::Flat).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name_of(p)).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_discover_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_pdfs(&dir.path().join("nope"), InputLayout::Nested).unwrap_err();
        assert!(err.to_string().contains("目录不存在"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_items() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            touch(&input.join(name));
        }
        let flow = PaperFlow::new(Arc::new(EchoBackend), None, false);
        let processor =
            BatchProcessor::with_options(flow, InputLayout::Flat, Duration::from_secs(1));

        let started = Instant::now();
        let summary = processor
            .run_batch(&input, "run", &dir.path().join("out"), 10)
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.outputs, vec![dir.path().join("out").join("run.csv")]);
    }

    #[tokio::test]
    async fn test_max_items_truncates_after_sorting() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        for name in ["c.pdf", "a.pdf", "b.pdf"] {
            touch(&input.join(name));
        }
        let flow = PaperFlow::new(Arc::new(EchoBackend), None, false);
        let processor = BatchProcessor::with_options(flow, InputLayout::Flat, Duration::ZERO);

        let summary = processor
            .run_batch(&input, "run", dir.path(), 2)
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        let mut reader = csv::Reader::from_path(dir.path().join("run.csv")).unwrap();
        let names: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[0].to_string())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }
}
