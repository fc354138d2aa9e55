//! arXiv paper metadata and per-paper search results.

use serde::{Deserialize, Serialize};

/// Metadata for one arXiv search candidate, as returned by the search API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArxivPaper {
    /// Short arXiv identifier, version included (e.g. "2301.12345v2")
    pub arxiv_id: String,

    /// Paper title
    pub title: String,

    /// Author names in listed order
    pub authors: Vec<String>,

    /// Publication date (YYYY-MM-DD)
    pub published: Option<String>,

    /// Abstract
    pub summary: String,

    /// Abstract page URL
    pub entry_url: String,

    /// Direct PDF URL
    pub pdf_url: String,
}

impl ArxivPaper {
    /// File name used when the PDF is downloaded to a scratch directory
    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.arxiv_id.replace('/', "_"))
    }
}

/// Builder for [`ArxivPaper`]
#[derive(Debug, Clone)]
pub struct ArxivPaperBuilder {
    paper: ArxivPaper,
}

impl ArxivPaperBuilder {
    pub fn new(arxiv_id: impl Into<String>, title: impl Into<String>) -> Self {
        let arxiv_id = arxiv_id.into();
        Self {
            paper: ArxivPaper {
                entry_url: format!("http://arxiv.org/abs/{}", arxiv_id),
                pdf_url: format!("http://arxiv.org/pdf/{}", arxiv_id),
                arxiv_id,
                title: title.into(),
                authors: Vec::new(),
                published: None,
                summary: String::new(),
            },
        }
    }

    pub fn author(mut self, name: impl Into<String>) -> Self {
        self.paper.authors.push(name.into());
        self
    }

    pub fn authors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.authors = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn published(mut self, date: impl Into<String>) -> Self {
        self.paper.published = Some(date.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.paper.summary = summary.into();
        self
    }

    pub fn entry_url(mut self, url: impl Into<String>) -> Self {
        self.paper.entry_url = url.into();
        self
    }

    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.paper.pdf_url = url.into();
        self
    }

    pub fn build(self) -> ArxivPaper {
        self.paper
    }
}

/// One paper of a processed search: metadata plus extracted text or the
/// reason extraction failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArxivSearchResult {
    #[serde(flatten)]
    pub paper: ArxivPaper,

    /// Extracted (and possibly truncated) full text
    pub full_text: Option<String>,

    /// Why this paper's download or extraction failed
    pub processing_error: Option<String>,
}

impl ArxivSearchResult {
    pub fn processed(paper: ArxivPaper, full_text: String) -> Self {
        Self {
            paper,
            full_text: Some(full_text),
            processing_error: None,
        }
    }

    pub fn failed(paper: ArxivPaper, error: impl Into<String>) -> Self {
        Self {
            paper,
            full_text: None,
            processing_error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.processing_error.is_some()
    }
}

impl std::fmt::Display for ArxivSearchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let paper = &self.paper;
        let authors = if paper.authors.is_empty() {
            "N/A".to_string()
        } else {
            paper.authors.join(", ")
        };
        writeln!(f, "  Title: {}", paper.title)?;
        writeln!(f, "  Authors: {}", authors)?;
        writeln!(f, "  Published: {}", paper.published.as_deref().unwrap_or("N/A"))?;
        writeln!(f, "  Link: {}", paper.entry_url)?;
        writeln!(f, "  PDF Link: {}", paper.pdf_url)?;
        writeln!(f, "  Summary: {}", paper.summary)?;
        write!(f, "  Full Text: {}", self.full_text.as_deref().unwrap_or("N/A"))?;
        if let Some(error) = &self.processing_error {
            write!(f, "\n  Processing Error: {}", error)?;
        }
        Ok(())
    }
}
