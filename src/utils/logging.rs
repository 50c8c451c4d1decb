/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::error::AppError;
use crate::models::AnalysisSummary;

/// 初始化日志
///
/// 终端默认级别为 `info`，可通过 `RUST_LOG` 覆盖。
/// 指定 `log_file` 时同一份日志也写入该文件（不带颜色），
/// 文件先由 [`init_log_file`] 重写标题。重复调用不会报错，只有第一次生效。
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            init_log_file(path)?;
            let file = OpenOptions::new()
                .append(true)
                .open(path)
                .map_err(|source| AppError::file_write_failed(path.display().to_string(), source))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init();
    Ok(())
}

/// 创建日志文件并写入本次运行的标题，覆盖上一次的内容
pub fn init_log_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|source| AppError::file_write_failed(parent.display().to_string(), source))?;
    }

    let log_header = format!(
        "{}\n论文抽取日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(path, log_header)
        .map_err(|source| AppError::file_write_failed(path.display().to_string(), source))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - PDF 批量抽取模式");
    info!("🔧 抽取后端: {}", config.backend);
    info!("📁 输入目录: {}", config.input_root.display());
    info!("🧪 工作流抽取: {}", if config.extract_workflows { "开启" } else { "关闭" });
    info!("{}", "=".repeat(60));
}

/// 记录文件扫描结果
///
/// # 参数
/// - `found`: 找到的 PDF 数量
/// - `selected`: 本次处理的数量（受 `max_items` 限制）
pub fn log_files_found(found: usize, selected: usize) {
    info!("✓ 找到 {} 个 PDF 文件", found);
    if selected < found {
        info!("📋 本次只处理前 {} 个", selected);
    }
}

/// 打印批处理最终统计
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `elapsed`: 总用时
/// - `outputs`: 写出的文件
pub fn print_final_stats(success: usize, failed: usize, elapsed: Duration, outputs: &[PathBuf]) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, success + failed);
    info!("❌ 失败: {}", failed);
    info!("⏱️ 用时: {:.1}s", elapsed.as_secs_f64());
    info!("{}", "=".repeat(60));
    for path in outputs {
        info!("💾 已保存: {}", path.display());
    }
}

/// 打印工作流分析统计
pub fn print_analysis_stats(summary: &AnalysisSummary, output: &Path) {
    let total = summary.total;
    info!("\n{}", "=".repeat(60));
    info!("📊 工作流分析统计 (共 {} 篇)", total);
    info!("{}", "=".repeat(60));
    info!("  - 非靶向代谢组学: {}/{}", summary.untargeted, total);
    info!("  - 使用 LC-MS: {}/{}", summary.lcms, total);
    info!("  - 使用 GC-MS: {}/{}", summary.gcms, total);
    info!("  - 使用 MS/MS: {}/{}", summary.msms, total);
    info!("  - 包含通路分析: {}/{}", summary.pathway, total);
    info!("  - 使用 KEGG: {}/{}", summary.kegg, total);
    info!("  - 分析失败: {}", summary.failed);
    info!("📈 平均完整度: {:.2}/5", summary.average_completeness);
    info!("{}", "=".repeat(60));
    info!("💾 已保存: {}", output.display());
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("代谢组学工作流", 4), "代谢组学...");
        assert_eq!(truncate_text("", 3), "");
    }

    #[test]
    fn test_init_is_idempotent() {
        init(None).unwrap();
        init(None).unwrap();
    }

    #[test]
    fn test_init_log_file_rewrites_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("extraction.log");

        init_log_file(&path).unwrap();
        std::fs::write(&path, "stale line from last run\n").unwrap();
        init_log_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "=".repeat(60));
        assert!(lines[1].starts_with("论文抽取日志 - "));
        assert_eq!(lines[2], "=".repeat(60));
        assert!(!content.contains("stale line"));
    }

    #[test]
    fn test_init_with_file_creates_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");

        init(Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&"=".repeat(60)));
    }
}
