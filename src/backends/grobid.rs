//! GROBID 后端
//!
//! 把 PDF 上传到自建的 GROBID 服务，解析返回的 TEI XML。

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use roxmltree::{Document, Node};
use tracing::{info, warn};

use super::{join_non_empty, ExtractionBackend};
use crate::config::Config;
use crate::error::{AppError, BackendError};
use crate::models::record::{file_name_of, file_stem_of};
use crate::models::{ExtractionRecord, PaperContent};

const TEI_NS: &str = "http://www.tei-c.org/ns/1.0";
const SERVICE_NAME: &str = "GROBID";

/// GROBID 后端
pub struct GrobidBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    probe_timeout: Duration,
}

impl GrobidBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("无法创建 HTTP 客户端")?;
        Ok(Self {
            client,
            base_url: config.grobid_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.grobid_timeout_secs),
            probe_timeout: Duration::from_secs(config.grobid_probe_timeout_secs),
        })
    }

    async fn process(&self, path: &Path) -> Result<PaperContent> {
        let filename = file_name_of(path);
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("无法读取文件: {}", path.display()))?;

        let part = Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str("application/pdf")?;
        let form = Form::new().part("input", part);

        let endpoint = format!("{}/api/processFulltextDocument", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::bad_status(SERVICE_NAME, status.as_u16()).into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        parse_tei(&body, &filename, &file_stem_of(path))
    }
}

#[async_trait]
impl ExtractionBackend for GrobidBackend {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn preflight(&self) -> Result<()> {
        let endpoint = format!("{}/api/isalive", self.base_url);
        let response = self
            .client
            .get(&endpoint)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        if response.status().as_u16() != 200 {
            return Err(AppError::bad_status(SERVICE_NAME, response.status().as_u16()).into());
        }
        info!("✓ GROBID 服务运行中");
        Ok(())
    }

    async fn extract(&self, path: &Path) -> ExtractionRecord {
        let started = Instant::now();
        match self.process(path).await {
            Ok(content) => {
                info!(
                    "  GROBID 处理 {} 用时 {:.2}s",
                    content.filename,
                    started.elapsed().as_secs_f64()
                );
                ExtractionRecord::Success(content)
            }
            Err(e) => {
                warn!("✗ GROBID 处理 {} 失败: {:#}", file_name_of(path), e);
                ExtractionRecord::failed(file_name_of(path), format!("{:#}", e))
            }
        }
    }
}

// ========== TEI 解析 ==========

fn is_tei(node: &Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace() == Some(TEI_NS)
}

fn tei_child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| is_tei(n, name))
}

/// `parent/child` 路径在整个子树中的第一个匹配
fn find_path<'a, 'i>(root: Node<'a, 'i>, parent: &str, child: &str) -> Option<Node<'a, 'i>> {
    root.descendants()
        .filter(|n| is_tei(n, parent))
        .find_map(|n| tei_child(n, child))
}

/// 节点内所有文本，空白折叠为单个空格
fn text_of(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn caption_of(figure: Node) -> String {
    let head = tei_child(figure, "head").map(text_of);
    let desc = tei_child(figure, "figDesc").map(text_of);
    join_non_empty(head.into_iter().chain(desc), " ")
}

fn author_name(author: Node) -> Option<String> {
    let pers_name = author.descendants().find(|n| is_tei(n, "persName"))?;
    let forename = tei_child(pers_name, "forename").map(text_of);
    let surname = tei_child(pers_name, "surname").map(text_of);
    let name = join_non_empty(forename.into_iter().chain(surname), " ");
    (!name.is_empty()).then_some(name)
}

/// 解析 GROBID 返回的 TEI 文档
pub fn parse_tei(xml: &str, filename: &str, fallback_title: &str) -> Result<PaperContent> {
    let doc = Document::parse(xml).map_err(|e| BackendError::ParseFailed {
        path: filename.to_string(),
        reason: e.to_string(),
    })?;
    let root = doc.root_element();

    let title = find_path(root, "titleStmt", "title")
        .map(text_of)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_title.to_string());

    let authors: Vec<String> = root
        .descendants()
        .filter(|n| is_tei(n, "sourceDesc"))
        .flat_map(|source| source.descendants().filter(|n| is_tei(n, "author")))
        .filter_map(author_name)
        .collect();

    let abstract_text = find_path(root, "profileDesc", "abstract")
        .map(text_of)
        .unwrap_or_default();

    // 只取最外层 div，避免嵌套 div 的文本重复
    let full_text = match find_path(root, "text", "body") {
        Some(body) => {
            let sections = body.descendants().filter(|n| {
                is_tei(n, "div")
                    && !n
                        .ancestors()
                        .skip(1)
                        .take_while(|a| *a != body)
                        .any(|a| is_tei(&a, "div"))
            });
            join_non_empty(sections.map(text_of), "\n\n")
        }
        None => String::new(),
    };

    let (tables, figures): (Vec<Node>, Vec<Node>) = root
        .descendants()
        .filter(|n| is_tei(n, "figure"))
        .partition(|n| n.attribute("type") == Some("table"));

    Ok(PaperContent {
        filename: filename.to_string(),
        title,
        authors: authors.join("; "),
        abstract_text,
        full_text,
        figure_captions: join_non_empty(figures.into_iter().map(caption_of), "\n\n"),
        table_captions: join_non_empty(tables.into_iter().map(caption_of), "\n\n"),
    })
}
