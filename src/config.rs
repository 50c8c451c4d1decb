//! 程序配置
//!
//! 优先级：默认值 < TOML 配置文件 < 环境变量（`.env` 会先被加载）

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// 使用哪个后端抽取 PDF 内容
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 云端文件助手（OpenAI Assistants + file_search）
    Assistant,
    /// 本地版面解析
    Layout,
    /// 自建 GROBID 服务
    Grobid,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assistant" | "openai" => Ok(Self::Assistant),
            "layout" | "local" => Ok(Self::Layout),
            "grobid" => Ok(Self::Grobid),
            other => Err(format!("未知的后端类型: {}", other)),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Assistant => "assistant",
            BackendKind::Layout => "layout",
            BackendKind::Grobid => "grobid",
        };
        f.write_str(name)
    }
}

/// 输入目录中 PDF 的组织方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputLayout {
    /// `<root>/*/*.pdf`
    Nested,
    /// `<root>/*.pdf`
    Flat,
}

impl InputLayout {
    /// PDF 相对输入根目录的深度
    pub fn depth(self) -> usize {
        match self {
            InputLayout::Nested => 2,
            InputLayout::Flat => 1,
        }
    }
}

impl FromStr for InputLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nested" => Ok(Self::Nested),
            "flat" => Ok(Self::Flat),
            other => Err(format!("未知的输入布局: {}", other)),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 抽取后端
    pub backend: BackendKind,
    /// PDF 输入根目录
    pub input_root: PathBuf,
    pub input_layout: InputLayout,
    /// 输出文件名（不含扩展名）
    pub output_name: String,
    /// 输出目录
    pub output_dir: PathBuf,
    /// 单次批处理的最大文件数
    pub max_items: usize,
    /// 两个文件之间的固定间隔（毫秒）
    pub item_delay_ms: u64,
    /// 是否在内容抽取后继续抽取工作流
    pub extract_workflows: bool,
    pub workflow_max_retries: usize,
    pub workflow_retry_delay_ms: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 日志文件，每次运行开始时重写
    pub log_file: PathBuf,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- GROBID 配置 ---
    pub grobid_url: String,
    pub grobid_timeout_secs: u64,
    pub grobid_probe_timeout_secs: u64,
    // --- 文件助手配置 ---
    pub assistant_poll_interval_ms: u64,
    pub assistant_max_wait_secs: u64,
    // --- 版面解析配置 ---
    /// 每个 PDF 的完整解析结果写入此目录
    pub layout_artifact_dir: PathBuf,
    // --- 工作流分析 ---
    pub analysis_input_json: PathBuf,
    pub analysis_output_csv: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Assistant,
            input_root: PathBuf::from("PDF"),
            input_layout: InputLayout::Nested,
            output_name: "metabolomics_complete".to_string(),
            output_dir: PathBuf::from("outputs"),
            max_items: 50,
            item_delay_ms: 1000,
            extract_workflows: true,
            workflow_max_retries: 3,
            workflow_retry_delay_ms: 5000,
            verbose_logging: false,
            log_file: PathBuf::from("outputs/extraction.log"),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            grobid_url: "http://localhost:8070".to_string(),
            grobid_timeout_secs: 60,
            grobid_probe_timeout_secs: 5,
            assistant_poll_interval_ms: 1000,
            assistant_max_wait_secs: 600,
            layout_artifact_dir: PathBuf::from("extracted_json"),
            analysis_input_json: PathBuf::from("outputs/metabolomics_complete_workflows.json"),
            analysis_output_csv: PathBuf::from("outputs/workflow_analysis.csv"),
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺失的键使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;
        Ok(config)
    }

    /// 加载完整配置：可选的 TOML 文件，然后应用环境变量
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        let d = self;
        Self {
            backend: env_parse("EXTRACT_BACKEND", d.backend),
            input_root: env_path("INPUT_ROOT", d.input_root),
            input_layout: env_parse("INPUT_LAYOUT", d.input_layout),
            output_name: std::env::var("OUTPUT_NAME").unwrap_or(d.output_name),
            output_dir: env_path("OUTPUT_DIR", d.output_dir),
            max_items: env_parse("MAX_ITEMS", d.max_items),
            item_delay_ms: env_parse("ITEM_DELAY_MS", d.item_delay_ms),
            extract_workflows: env_parse("EXTRACT_WORKFLOWS", d.extract_workflows),
            workflow_max_retries: env_parse("WORKFLOW_MAX_RETRIES", d.workflow_max_retries),
            workflow_retry_delay_ms: env_parse("WORKFLOW_RETRY_DELAY_MS", d.workflow_retry_delay_ms),
            verbose_logging: env_parse("VERBOSE_LOGGING", d.verbose_logging),
            log_file: env_path("LOG_FILE", d.log_file),
            llm_api_key: std::env::var("LLM_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .unwrap_or(d.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(d.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(d.llm_model_name),
            grobid_url: std::env::var("GROBID_URL").unwrap_or(d.grobid_url),
            grobid_timeout_secs: env_parse("GROBID_TIMEOUT_SECS", d.grobid_timeout_secs),
            grobid_probe_timeout_secs: env_parse("GROBID_PROBE_TIMEOUT_SECS", d.grobid_probe_timeout_secs),
            assistant_poll_interval_ms: env_parse("ASSISTANT_POLL_INTERVAL_MS", d.assistant_poll_interval_ms),
            assistant_max_wait_secs: env_parse("ASSISTANT_MAX_WAIT_SECS", d.assistant_max_wait_secs),
            layout_artifact_dir: env_path("LAYOUT_ARTIFACT_DIR", d.layout_artifact_dir),
            analysis_input_json: env_path("ANALYSIS_INPUT_JSON", d.analysis_input_json),
            analysis_output_csv: env_path("ANALYSIS_OUTPUT_CSV", d.analysis_output_csv),
        }
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn workflow_retry_delay(&self) -> Duration {
        Duration::from_millis(self.workflow_retry_delay_ms)
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    std::env::var(name).map(PathBuf::from).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("grobid".parse::<BackendKind>().unwrap(), BackendKind::Grobid);
        assert_eq!("Layout".parse::<BackendKind>().unwrap(), BackendKind::Layout);
        assert_eq!("openai".parse::<BackendKind>().unwrap(), BackendKind::Assistant);
        assert!("papermill".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_input_layout_depth() {
        assert_eq!(InputLayout::Nested.depth(), 2);
        assert_eq!(InputLayout::Flat.depth(), 1);
    }

    #[test]
    fn test_toml_partial_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
backend = "grobid"
max_items = 7
grobid_url = "http://grobid.internal:8070"
log_file = "logs/grobid_run.log"
"#
        )
        .unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        assert_eq!(config.backend, BackendKind::Grobid);
        assert_eq!(config.max_items, 7);
        assert_eq!(config.grobid_url, "http://grobid.internal:8070");
        assert_eq!(config.workflow_max_retries, 3);
        assert_eq!(config.input_layout, InputLayout::Nested);
        assert_eq!(config.item_delay(), Duration::from_secs(1));
        assert_eq!(config.log_file, PathBuf::from("logs/grobid_run.log"));
        assert_eq!(Config::default().log_file, PathBuf::from("outputs/extraction.log"));
    }

    #[test]
    fn test_toml_invalid_backend_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"backend = "nope""#).unwrap();
        assert!(Config::from_toml_file(file.path()).is_err());
    }
}
