//! 本地版面解析后端
//!
//! 解析器只负责"给路径，返回文档对象"，字段抽取统一在这里完成：
//! 每个字段按固定顺序尝试多个来源，全部缺失时为空字符串。

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use lopdf::{Document, Object};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{join_non_empty, ExtractionBackend};
use crate::error::{AppError, BackendError};
use crate::models::record::{file_name_of, file_stem_of};
use crate::models::{ExtractionRecord, PaperContent};

static ABSTRACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^abstract\b[\s:.\-]*").expect("valid regex"));
static ABSTRACT_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(keywords?|key words|introduction|background|(1\.?|i\.)\s+\w)")
        .expect("valid regex")
});
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(\d+(\.\d+)*\.?\s+)?(introduction|background|materials and methods|methods|methodology|experimental|results and discussion|results|discussion|conclusions?|acknowledge?ments?|references)\s*$",
    )
    .expect("valid regex")
});
static REFERENCES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+(\.\d+)*\.?\s+)?(references|bibliography|literature cited)\s*$")
        .expect("valid regex")
});
static REFERENCE_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\[\d+\]|\d+\.\s)").expect("valid regex"));
static FIGURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(fig\.?|figure)\s*\d+").expect("valid regex"));
static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^table\s+\d+").expect("valid regex"));

/// 单页解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLayout {
    pub number: u32,
    pub text: String,
}

/// 版面解析得到的文档
///
/// 所有字段都是可选的，不同解析器填充的程度不同。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedDocument {
    pub title: Option<String>,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub abstracts: Vec<String>,
    pub sections: Vec<String>,
    pub figures: Vec<String>,
    pub tables: Vec<String>,
    /// 参考文献条目，只写入解析结果文件，不进入正文
    pub references: Vec<String>,
    /// 未分段的原始文本
    pub symbols: String,
    pub pages: Vec<PageLayout>,
}

impl ParsedDocument {
    /// 统一的字段抽取策略
    pub fn to_content(&self, path: &Path) -> PaperContent {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| file_stem_of(path));

        let abstract_text = self
            .abstract_text
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| join_non_empty(&self.abstracts, "\n\n"));

        let sections = join_non_empty(&self.sections, "\n\n");
        let full_text = if sections.is_empty() {
            self.symbols.clone()
        } else {
            sections
        };

        PaperContent {
            filename: file_name_of(path),
            title,
            authors: join_non_empty(&self.authors, "; "),
            abstract_text,
            full_text,
            figure_captions: join_non_empty(&self.figures, "\n\n"),
            table_captions: join_non_empty(&self.tables, "\n\n"),
        }
    }
}

/// 版面解析能力：给路径，返回文档对象
///
/// 解析是阻塞操作，会在 `spawn_blocking` 中执行。
pub trait LayoutParser: Send + Sync + 'static {
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;
}

/// 基于 `lopdf` 的纯 Rust 解析器
///
/// 标题和作者优先取 PDF 元数据，其余字段来自逐页文本的启发式切分。
#[derive(Debug, Clone, Default)]
pub struct LopdfLayoutParser;

impl LayoutParser for LopdfLayoutParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let document = Document::load(path).map_err(|e| BackendError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut pages = Vec::new();
        for number in document.get_pages().keys().copied() {
            let text = match document.extract_text(&[number]) {
                Ok(text) => text,
                Err(e) => {
                    debug!("第 {} 页文本抽取失败: {}", number, e);
                    String::new()
                }
            };
            pages.push(PageLayout { number, text });
        }

        let info_title = info_field(&document, b"Title");
        let info_author = info_field(&document, b"Author");
        Ok(analyze_pages(pages, info_title, info_author))
    }
}

fn info_field(document: &Document, key: &[u8]) -> Option<String> {
    let info = match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };
    let bytes = info.as_dict().ok()?.get(key).ok()?.as_str().ok()?;
    let text = decode_pdf_string(bytes);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// PDF 文本字符串：带 BOM 的 UTF-16BE，否则按 UTF-8 宽松解码
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).to_string()
    }
}

fn split_authors(raw: &str) -> Vec<String> {
    raw.split([';', ','])
        .flat_map(|part| part.split(" and "))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// 从逐页文本中切分出标题、摘要、章节和图表标题
pub fn analyze_pages(
    pages: Vec<PageLayout>,
    info_title: Option<String>,
    info_author: Option<String>,
) -> ParsedDocument {
    let symbols = pages
        .iter()
        .map(|page| page.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let lines: Vec<&str> = symbols
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let title = info_title.or_else(|| {
        lines
            .iter()
            .find(|line| line.chars().filter(|c| c.is_alphabetic()).count() >= 3)
            .map(|line| line.to_string())
    });

    let authors = info_author.as_deref().map(split_authors).unwrap_or_default();

    // 摘要：从 "Abstract" 行开始，到关键词 / 引言 / 第一个章节为止
    let mut abstract_text = None;
    if let Some(start) = lines.iter().position(|line| ABSTRACT_RE.is_match(line)) {
        let first = ABSTRACT_RE.replace(lines[start], "").to_string();
        let rest = lines[start + 1..]
            .iter()
            .take_while(|line| !ABSTRACT_END_RE.is_match(line) && !SECTION_RE.is_match(line))
            .map(|line| line.to_string());
        let text = join_non_empty(std::iter::once(first).chain(rest), " ");
        if !text.is_empty() {
            abstract_text = Some(text);
        }
    }

    // 章节：以标题行为界，第一个标题之前的内容不计入；
    // 参考文献标题之后的行单独收集，直到下一个章节标题
    let mut sections: Vec<String> = Vec::new();
    let mut reference_lines: Vec<&str> = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    let mut in_references = false;
    for line in &lines {
        if REFERENCES_RE.is_match(line) {
            if let Some(section) = current.take() {
                sections.push(section.join("\n"));
            }
            in_references = true;
        } else if SECTION_RE.is_match(line) {
            if let Some(section) = current.take() {
                sections.push(section.join("\n"));
            }
            in_references = false;
            current = Some(vec![*line]);
        } else if in_references {
            reference_lines.push(*line);
        } else if let Some(section) = current.as_mut() {
            section.push(*line);
        }
    }
    if let Some(section) = current {
        sections.push(section.join("\n"));
    }

    let figures = lines
        .iter()
        .filter(|line| FIGURE_RE.is_match(line))
        .map(|line| line.to_string())
        .collect();
    let tables = lines
        .iter()
        .filter(|line| TABLE_RE.is_match(line))
        .map(|line| line.to_string())
        .collect();

    ParsedDocument {
        title,
        authors,
        abstract_text,
        abstracts: Vec::new(),
        sections,
        figures,
        tables,
        references: group_references(&reference_lines),
        symbols,
        pages,
    }
}

/// 按编号（`[1]` 或 `1.`）把参考文献行合并成条目；没有编号时每行一条
fn group_references(lines: &[&str]) -> Vec<String> {
    if !lines.iter().any(|line| REFERENCE_START_RE.is_match(line)) {
        return lines.iter().map(|line| line.to_string()).collect();
    }

    let mut entries: Vec<String> = Vec::new();
    for line in lines {
        match entries.last_mut() {
            Some(entry) if !REFERENCE_START_RE.is_match(line) => {
                entry.push(' ');
                entry.push_str(line);
            }
            _ => entries.push(line.to_string()),
        }
    }
    entries
}

/// 本地版面解析后端
///
/// 每个文件的完整解析结果写入 `<artifact_dir>/<stem>.json`。
pub struct LayoutBackend<P: LayoutParser> {
    parser: Arc<P>,
    artifact_dir: PathBuf,
}

impl<P: LayoutParser> LayoutBackend<P> {
    pub fn new(parser: P, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            parser: Arc::new(parser),
            artifact_dir: artifact_dir.into(),
        }
    }

    fn write_artifact(&self, path: &Path, document: &ParsedDocument) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.artifact_dir).map_err(|source| {
            AppError::file_write_failed(self.artifact_dir.display().to_string(), source)
        })?;
        let artifact = self
            .artifact_dir
            .join(format!("{}.json", file_stem_of(path)));
        let json = serde_json::to_string_pretty(document)?;
        std::fs::write(&artifact, json)
            .map_err(|source| AppError::file_write_failed(artifact.display().to_string(), source))?;
        Ok(artifact)
    }

    async fn process(&self, path: &Path) -> Result<PaperContent> {
        let parser = Arc::clone(&self.parser);
        let owned = path.to_path_buf();
        let document = tokio::task::spawn_blocking(move || parser.parse(&owned))
            .await
            .context("版面解析任务异常退出")??;

        let artifact = self.write_artifact(path, &document)?;
        debug!("解析结果已保存: {}", artifact.display());

        Ok(document.to_content(path))
    }
}

#[async_trait]
impl<P: LayoutParser> ExtractionBackend for LayoutBackend<P> {
    fn name(&self) -> &str {
        "layout"
    }

    async fn extract(&self, path: &Path) -> ExtractionRecord {
        match self.process(path).await {
            Ok(content) => ExtractionRecord::Success(content),
            Err(e) => {
                warn!("✗ 解析 {} 失败: {:#}", file_name_of(path), e);
                ExtractionRecord::failed(file_name_of(path), format!("{:#}", e))
            }
        }
    }
}
