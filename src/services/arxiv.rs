//! arXiv search service.
//!
//! A search over-fetches `2 * max_results` candidates from the arXiv API, then
//! downloads and extracts each candidate's PDF concurrently until
//! `max_results` papers have been processed successfully. Papers whose
//! download or extraction fails keep their slot (with the error text) only
//! when the candidate pool runs out before enough successes are found.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ArxivConfig, ConfigError};
use crate::models::{ArxivPaper, ArxivPaperBuilder, ArxivSearchResult};
use crate::utils::{
    finalize_text, is_transient_reqwest, with_retry, FanOut, FanOutOptions, HttpClient,
    RetryConfig, Transient,
};

/// Base URL for arXiv PDFs, used when an entry carries no PDF link
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";

/// Errors from the arXiv backend
#[derive(Debug, thiserror::Error)]
pub enum ArxivError {
    #[error("Search query must not be empty")]
    EmptyQuery,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("failed to parse Atom feed: {0}")]
    Feed(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("{0}")]
    Backend(String),

    #[error("failed to create scratch directory: {0}")]
    ScratchDir(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Transient for ArxivError {
    fn is_transient(&self) -> bool {
        match self {
            ArxivError::Http(e) => is_transient_reqwest(e),
            ArxivError::Unavailable(_) => true,
            _ => false,
        }
    }
}

/// Access to the arXiv API and paper PDFs
#[async_trait]
pub trait ArxivBackend: Send + Sync + Debug {
    /// Return up to `max_results` candidates for `query`, most relevant first
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<ArxivPaper>, ArxivError>;

    /// Download `paper`'s PDF to `dest`
    async fn download_pdf(&self, paper: &ArxivPaper, dest: &Path) -> Result<(), ArxivError>;

    /// Extract the text of a downloaded PDF
    async fn extract_text(&self, path: &Path) -> Result<String, ArxivError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || crate::utils::extract_text(&path))
            .await
            .map_err(|e| ArxivError::Extraction(format!("extraction task failed: {}", e)))?
            .map_err(|e| ArxivError::Extraction(e.to_string()))
    }
}

/// arXiv backend over the public Atom API
#[derive(Debug, Clone)]
pub struct HttpArxivBackend {
    client: HttpClient,
    api_url: String,
}

impl HttpArxivBackend {
    pub fn new(api_url: impl Into<String>) -> Result<Self, ArxivError> {
        Ok(Self {
            client: HttpClient::new()?,
            api_url: api_url.into(),
        })
    }

    fn search_url(&self, query: &str, max_results: usize) -> String {
        format!(
            "{}?search_query={}&start=0&max_results={}&sortBy=relevance&sortOrder=descending",
            self.api_url,
            urlencoding::encode(query),
            max_results
        )
    }

    /// Parse an Atom feed entry into paper metadata
    fn parse_entry(entry: &feed_rs::model::Entry) -> Result<ArxivPaper, ArxivError> {
        let arxiv_id = entry
            .id
            .split("/abs/")
            .last()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ArxivError::Feed("Missing paper ID".to_string()))?
            .to_string();

        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&t.content))
            .unwrap_or_default();

        let summary = entry
            .summary
            .as_ref()
            .map(|s| collapse_whitespace(&s.content))
            .unwrap_or_default();

        let entry_url = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref() == Some("alternate"))
            .map(|l| l.href.clone())
            .unwrap_or_else(|| entry.id.clone());

        let pdf_url = entry
            .links
            .iter()
            .find(|l| {
                l.title.as_deref() == Some("pdf")
                    || l.media_type.as_deref() == Some("application/pdf")
            })
            .map(|l| l.href.clone())
            .unwrap_or_else(|| format!("{}/{}", ARXIV_PDF_URL, arxiv_id));

        let mut builder = ArxivPaperBuilder::new(arxiv_id, title)
            .authors(entry.authors.iter().map(|a| a.name.clone()))
            .summary(summary)
            .entry_url(entry_url)
            .pdf_url(pdf_url);
        let published: Option<DateTime<Utc>> = entry.published;
        if let Some(published) = published {
            builder = builder.published(published.format("%Y-%m-%d").to_string());
        }

        Ok(builder.build())
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl ArxivBackend for HttpArxivBackend {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ArxivPaper>, ArxivError> {
        let url = self.search_url(query, max_results);
        tracing::debug!("Querying arXiv API: {}", url);

        let body = self.client.get_text(&url).await?;

        let feed = parser::parse(body.as_bytes())
            .map_err(|e| ArxivError::Feed(e.to_string()))?;

        feed.entries
            .iter()
            .take(max_results)
            .map(Self::parse_entry)
            .collect()
    }

    async fn download_pdf(&self, paper: &ArxivPaper, dest: &Path) -> Result<(), ArxivError> {
        self.client
            .download_to(&paper.pdf_url, dest)
            .await
            .map(|_| ())
            .map_err(|e| ArxivError::Download(e.to_string()))
    }
}

/// The arXiv search service shared by all `arxiv_search` calls
#[derive(Debug, Clone)]
pub struct ArxivService {
    backend: Arc<dyn ArxivBackend>,
    config: ArxivConfig,
    retry: RetryConfig,
    fan_out: FanOut,
}

impl ArxivService {
    /// Build the service over the real arXiv API
    pub fn new(config: ArxivConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let backend = HttpArxivBackend::new(config.api_url.clone()).map_err(|e| {
            ConfigError::Invalid {
                field: "arxiv.api_url".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Build the service over any backend
    pub fn with_backend(config: ArxivConfig, backend: Arc<dyn ArxivBackend>) -> Self {
        let mut options = FanOutOptions::default().item_timeout(config.item_timeout());
        if let Some(limit) = config.max_concurrency {
            options = options.concurrency_limit(limit);
        }

        Self {
            backend,
            retry: RetryConfig::default().max_attempts(config.search_retries),
            fan_out: FanOut::new(options),
            config,
        }
    }

    /// Replace the retry policy for the search API call
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &ArxivConfig {
        &self.config
    }

    /// Search arXiv and process up to `max_results` papers.
    ///
    /// `None` arguments fall back to the configured defaults.
    pub async fn search(
        &self,
        query: &str,
        max_results: Option<usize>,
        max_text_length: Option<usize>,
    ) -> Result<Vec<ArxivSearchResult>, ArxivError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ArxivError::EmptyQuery);
        }

        let max_results = max_results.unwrap_or(self.config.default_max_results);
        let max_text_length = max_text_length.or(self.config.default_max_text_length);
        let fetch = max_results * 2;

        tracing::info!(
            "Searching arXiv for '{}' (max_results={}, fetching {} candidates)",
            query,
            max_results,
            fetch
        );

        let backend = Arc::clone(&self.backend);
        let candidates = with_retry(self.retry, || {
            let backend = Arc::clone(&backend);
            async move { backend.search(query, fetch).await }
        })
        .await?;

        if candidates.is_empty() {
            tracing::info!("No arXiv candidates for '{}'", query);
            return Ok(Vec::new());
        }
        tracing::debug!("Found {} candidates", candidates.len());

        let scratch = tempfile::Builder::new()
            .prefix("arxiv_pdf_")
            .tempdir()
            .map_err(ArxivError::ScratchDir)?;
        let dir = Arc::new(scratch.path().to_path_buf());
        let backend = Arc::clone(&self.backend);

        let outcomes = self
            .fan_out
            .collect_until(candidates.clone(), max_results, move |paper: ArxivPaper| {
                let backend = Arc::clone(&backend);
                let dir = Arc::clone(&dir);
                async move { process_paper(backend, &dir, paper, max_text_length).await }
            })
            .await;

        let results: Vec<ArxivSearchResult> = outcomes
            .into_iter()
            .map(|outcome| {
                let paper = candidates[outcome.index].clone();
                match outcome.result {
                    Ok(text) => ArxivSearchResult::processed(paper, text),
                    Err(e) => {
                        let reason = e.reason();
                        tracing::warn!("Failed to process paper {}: {}", paper.arxiv_id, reason);
                        ArxivSearchResult::failed(paper, reason)
                    }
                }
            })
            .collect();

        let failed = results.iter().filter(|r| r.is_failed()).count();
        tracing::info!(
            "arXiv search for '{}' returned {} papers ({} failed)",
            query,
            results.len(),
            failed
        );

        Ok(results)
    }
}

/// A downloaded PDF, removed when dropped.
///
/// Dropping also happens when the item is cancelled by its timeout, so the
/// file never outlives its item.
struct ScratchFile {
    path: PathBuf,
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!("Could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Download one paper into `dir`, extract and finalize its text. The PDF is
/// removed once the item finishes, however it finishes.
async fn process_paper(
    backend: Arc<dyn ArxivBackend>,
    dir: &Path,
    paper: ArxivPaper,
    max_text_length: Option<usize>,
) -> Result<String, ArxivError> {
    let pdf = ScratchFile {
        path: dir.join(paper.pdf_file_name()),
    };
    tracing::debug!("Downloading {} to {}", paper.pdf_url, pdf.path.display());

    backend.download_pdf(&paper, &pdf.path).await?;
    let raw = backend.extract_text(&pdf.path).await?;
    Ok(finalize_text(&raw, max_text_length))
}
