use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use paper_workflow_extract::config::BackendKind;
use paper_workflow_extract::utils::logging;
use paper_workflow_extract::{App, Config};

#[derive(Debug, Parser)]
#[command(name = "paper_workflow_extract", version, about = "批量抽取论文 PDF 内容和代谢组学工作流")]
struct Cli {
    /// TOML 配置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 批量抽取 PDF 内容和工作流（默认）
    Extract {
        /// assistant / layout / grobid
        #[arg(long)]
        backend: Option<BackendKind>,
        /// PDF 输入根目录
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        max_items: Option<usize>,
    },
    /// 对保存的工作流做分类分析
    Analyze {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = Config::load(cli.config.as_deref())?;

    // 初始化日志（终端 + 日志文件）
    logging::init(Some(&config.log_file))?;

    match cli.command.unwrap_or(Command::Extract {
        backend: None,
        input: None,
        max_items: None,
    }) {
        Command::Extract {
            backend,
            input,
            max_items,
        } => {
            if let Some(backend) = backend {
                config.backend = backend;
            }
            if let Some(input) = input {
                config.input_root = input;
            }
            if let Some(max_items) = max_items {
                config.max_items = max_items;
            }
            App::initialize(config).await?.run().await?;
        }
        Command::Analyze { input, output } => {
            App::initialize(config).await?.analyze(input, output).await?;
        }
    }

    Ok(())
}
