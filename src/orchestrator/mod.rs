//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量 PDF 处理器
//! - 管理应用生命周期（初始化、运行）
//! - 扫描输入目录，排序并截断
//! - 后端预检，顺序处理，固定间隔
//! - 写出结果文件，输出全局统计
//!
//! ### `analysis_runner` - 工作流分析
//! - 读取保存的工作流
//! - 逐个分类，写出分析 CSV 和汇总统计
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<PathBuf>)
//!     ↓
//! workflow::PaperFlow (处理单个 PDF)
//!     ↓
//! backends / services (能力层：抽取 / 工作流 / 写出)
//!     ↓
//! infrastructure (基础设施：TextGenerator)
//! ```

pub mod analysis_runner;
pub mod batch_processor;

pub use analysis_runner::AnalysisRunner;
pub use batch_processor::{discover_pdfs, App, BatchProcessor, BatchSummary};
