//! Mock arXiv backend for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::models::{ArxivPaper, ArxivPaperBuilder};
use crate::services::arxiv::{ArxivBackend, ArxivError};

#[derive(Debug, Default)]
struct MockState {
    search_calls: AtomicUsize,
    transient_failures_left: AtomicUsize,
    last_requested: Mutex<Option<usize>>,
    downloads: Mutex<Vec<String>>,
}

/// An in-memory arXiv backend.
///
/// Candidates are returned in the configured order. Per-paper failures,
/// delays, panics and texts are keyed by arXiv id. Clones share call
/// counters, so a test can keep a handle after moving the backend into a
/// service.
#[derive(Debug, Clone, Default)]
pub struct MockArxivBackend {
    candidates: Vec<ArxivPaper>,
    failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    panics: Vec<String>,
    texts: HashMap<String, String>,
    search_failure: Option<String>,
    state: Arc<MockState>,
}

impl MockArxivBackend {
    /// Create a backend with no candidates
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with `count` candidates with ids "0001", "0002", ...
    pub fn with_candidates(count: usize) -> Self {
        let papers = (1..=count).map(|i| make_paper(&format!("{:04}", i))).collect();
        Self::new().candidates(papers)
    }

    /// Replace the candidate list
    pub fn candidates(mut self, papers: Vec<ArxivPaper>) -> Self {
        self.candidates = papers;
        self
    }

    /// Make processing of `arxiv_id` fail with `message`
    pub fn with_failure(mut self, arxiv_id: &str, message: impl Into<String>) -> Self {
        self.failures.insert(arxiv_id.to_string(), message.into());
        self
    }

    /// Delay the download of `arxiv_id`
    pub fn with_delay(mut self, arxiv_id: &str, delay: Duration) -> Self {
        self.delays.insert(arxiv_id.to_string(), delay);
        self
    }

    /// Panic while downloading `arxiv_id`
    pub fn with_panic(mut self, arxiv_id: &str) -> Self {
        self.panics.push(arxiv_id.to_string());
        self
    }

    /// Set the extracted text for `arxiv_id`
    pub fn with_text(mut self, arxiv_id: &str, text: impl Into<String>) -> Self {
        self.texts.insert(arxiv_id.to_string(), text.into());
        self
    }

    /// Make every search call fail with a permanent backend error
    pub fn with_search_failure(mut self, message: impl Into<String>) -> Self {
        self.search_failure = Some(message.into());
        self
    }

    /// Make the first `count` search calls fail with a transient error
    pub fn with_transient_search_failures(self, count: usize) -> Self {
        self.state
            .transient_failures_left
            .store(count, Ordering::SeqCst);
        self
    }

    /// Number of search calls made so far
    pub fn search_calls(&self) -> usize {
        self.state.search_calls.load(Ordering::SeqCst)
    }

    /// `max_results` of the latest search call
    pub fn last_requested(&self) -> Option<usize> {
        *self.state.last_requested.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ids whose download was started, in start order
    pub fn downloads(&self) -> Vec<String> {
        self.state
            .downloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ArxivBackend for MockArxivBackend {
    async fn search(
        &self,
        _query: &str,
        max_results: usize,
    ) -> Result<Vec<ArxivPaper>, ArxivError> {
        self.state.search_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .state
            .last_requested
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(max_results);

        let remaining = self.state.transient_failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state
                .transient_failures_left
                .store(remaining - 1, Ordering::SeqCst);
            return Err(ArxivError::Unavailable("simulated outage".to_string()));
        }

        if let Some(message) = &self.search_failure {
            return Err(ArxivError::Backend(message.clone()));
        }

        Ok(self.candidates.iter().take(max_results).cloned().collect())
    }

    async fn download_pdf(&self, paper: &ArxivPaper, dest: &Path) -> Result<(), ArxivError> {
        self.state
            .downloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(paper.arxiv_id.clone());

        if let Some(delay) = self.delays.get(&paper.arxiv_id) {
            tokio::time::sleep(*delay).await;
        }
        if self.panics.contains(&paper.arxiv_id) {
            panic!("simulated crash processing {}", paper.arxiv_id);
        }
        if let Some(message) = self.failures.get(&paper.arxiv_id) {
            return Err(ArxivError::Download(message.clone()));
        }

        let text = self
            .texts
            .get(&paper.arxiv_id)
            .cloned()
            .unwrap_or_else(|| format!("Full text of {}", paper.title));
        tokio::fs::write(dest, text).await?;
        Ok(())
    }

    async fn extract_text(&self, path: &Path) -> Result<String, ArxivError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ArxivError::Extraction(e.to_string()))
    }
}

/// Build a paper with predictable metadata for `arxiv_id`
pub fn make_paper(arxiv_id: &str) -> ArxivPaper {
    ArxivPaperBuilder::new(arxiv_id, format!("Paper {}", arxiv_id))
        .author("Test Author")
        .published("2024-01-01")
        .summary(format!("Abstract of {}", arxiv_id))
        .build()
}
