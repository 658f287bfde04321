//! Web page and local file loaders

use async_trait::async_trait;
use pulldown_cmark::{Event, Parser, TagEnd};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use ragstream_core::{Document, DocumentLoader, Error, Result};

/// CSS classes holding the article body on typical blog pages
pub const DEFAULT_CONTENT_SELECTORS: [&str; 3] = [".post-content", ".post-title", ".post-header"];

static HORIZONTAL_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("Valid regex pattern"));

/// Two or more line breaks, possibly with trailing spaces in between
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(\n[ \t]*)+").expect("Valid regex pattern"));

/// Fetches HTML pages and keeps only the text under the content selectors
pub struct WebLoader {
    urls: Vec<Url>,
    selectors: Vec<String>,
    client: reqwest::Client,
}

impl WebLoader {
    pub fn new<I, S>(urls: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|raw| {
                Url::parse(raw.as_ref()).map_err(|e| {
                    Error::DocumentLoader(format!("Invalid URL '{}': {}", raw.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            urls,
            selectors: DEFAULT_CONTENT_SELECTORS.iter().map(|s| s.to_string()).collect(),
            client,
        })
    }

    /// Replace the content selectors
    pub fn with_selectors(mut self, selectors: Vec<String>) -> Self {
        self.selectors = selectors;
        self
    }

    async fn fetch(&self, url: &Url) -> Result<String> {
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::DocumentLoader(format!(
                "Fetching {} returned status {}",
                url,
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read body of {}: {}", url, e)))
    }
}

#[async_trait]
impl DocumentLoader for WebLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            let html = self.fetch(url).await?;
            let document = parse_html(&html, url.as_str(), &self.selectors)?;
            if document.content.is_empty() {
                warn!("No content matched the selectors on {}", url);
                continue;
            }
            info!("Loaded {} ({} chars)", url, document.content.chars().count());
            documents.push(document);
        }
        Ok(documents)
    }
}

/// Extract the text under `selectors` from an HTML page.
///
/// Matches are taken in document order. A match nested inside another match
/// is skipped so its text is not repeated.
pub fn parse_html(html: &str, source: &str, selectors: &[String]) -> Result<Document> {
    let page = Html::parse_document(html);
    let selector = Selector::parse(&selectors.join(", "))
        .map_err(|e| Error::DocumentLoader(format!("Invalid selector: {}", e)))?;

    let mut matched = HashSet::new();
    let mut sections = Vec::new();
    for element in page.select(&selector) {
        matched.insert(element.id());
        if element.ancestors().any(|node| matched.contains(&node.id())) {
            continue;
        }
        let text = normalize_whitespace(&element.text().collect::<String>());
        if !text.is_empty() {
            sections.push(text);
        }
    }

    let mut document = Document::new(sections.join("\n\n"), source);
    if let Ok(title_selector) = Selector::parse("title")
        && let Some(title) = page
            .select(&title_selector)
            .next()
            .map(|title| title.text().collect::<String>().trim().to_string())
            .filter(|title| !title.is_empty())
    {
        document.metadata.insert("title".to_string(), json!(title));
    }
    Ok(document)
}

/// Collapse runs of spaces and tabs, and runs of blank lines
fn normalize_whitespace(text: &str) -> String {
    let text = text.replace('\r', "");
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Reads local text and markdown files
pub struct FileLoader {
    paths: Vec<PathBuf>,
}

impl FileLoader {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::DocumentLoader(format!("Failed to read {}: {}", path.display(), e))
            })?;

            let content = if is_markdown(path) {
                markdown_to_text(&raw)
            } else {
                raw.trim().to_string()
            };

            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!("Loaded {} ({} chars)", path.display(), content.chars().count());
            documents.push(
                Document::new(content, path.display().to_string())
                    .with_metadata("title", json!(file_name)),
            );
        }
        Ok(documents)
    }
}

fn is_markdown(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("md") | Some("markdown")
    )
}

/// Render markdown to plain text, one blank line between blocks
pub fn markdown_to_text(markdown: &str) -> String {
    let mut text = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::CodeBlock) => {
                if !text.ends_with("\n\n") {
                    text.push_str(if text.ends_with('\n') { "\n" } else { "\n\n" });
                }
            }
            _ => {}
        }
    }
    text.trim().to_string()
}
