//! # Paper Workflow Extract
//!
//! 批量抽取论文 PDF 内容，并从全文中抽取代谢组学工作流
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有 LLM 客户端，只暴露能力
//! - `TextGenerator` - 按 schema 生成 JSON
//!
//! ### ② 业务能力层（Backends / Services）
//! - `backends/` - 三种互斥的内容抽取后端（文件助手 / 版面解析 / GROBID）
//! - `WorkflowExtractor` - 带重试的工作流抽取
//! - `WorkflowClassifier` - 工作流分类，不重试
//! - `ResultWriter` - 写 CSV / JSON
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个 PDF"的完整处理流程
//! - `PaperCtx` - 上下文封装（序号 + 文件名）
//! - `PaperFlow` - 流程编排（抽取内容 → 抽取工作流）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理器，扫描、预检、顺序处理、写出
//! - `orchestrator/analysis_runner` - 对保存的工作流做分类分析
//!
//! ## 模块结构

pub mod backends;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use backends::{build_backend, ExtractionBackend};
pub use config::Config;
pub use error::AppError;
pub use orchestrator::{App, BatchProcessor, BatchSummary};
pub use workflow::{PaperCtx, PaperFlow, PaperOutcome};
