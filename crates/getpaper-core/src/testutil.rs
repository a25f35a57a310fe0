//! Fixtures shared by the pipeline tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::bibtex::BibEntry;
use crate::download::PdfRetriever;
use crate::error::{PaperError, Result};
use crate::http::RateLimitedClient;
use crate::identifiers::{ArxivId, Identifier, InspireId};
use crate::inspire::{PaperRecord, RecordSource};
use crate::retrieve::PaperPipeline;

pub const PDF: &[u8] = b"%PDF-1.5\n1 0 obj\n<<>>\nendobj\ntrailer\n%%EOF\n";

pub fn http() -> Arc<RateLimitedClient> {
    Arc::new(
        RateLimitedClient::new(Duration::ZERO, 0, "getpaper-test", Duration::from_secs(5)).unwrap(),
    )
}

/// A record for an arXiv paper whose only PDF is served at `{pdf_base}/pdf/{arxiv}`.
pub fn paper(arxiv: &str, recid: &str, key: &str, author: &str, title: &str, pdf_base: &str) -> PaperRecord {
    let arxiv_id = ArxivId::parse(arxiv).unwrap();
    let year: i32 = key
        .split_once(':')
        .and_then(|(_, rest)| rest.get(..4))
        .and_then(|y| y.parse().ok())
        .unwrap_or(2000);
    let bibtex = format!(
        "@article{{{key},\n    author = \"{author}\",\n    title = \"{{{title}}}\",\n    eprint = \"{arxiv}\",\n    archivePrefix = \"arXiv\",\n    year = \"{year}\"\n}}\n"
    );
    let entry = BibEntry::parse(&bibtex).unwrap();
    PaperRecord {
        requested: Identifier::Arxiv(arxiv_id.clone()),
        inspire_id: InspireId::parse(recid).unwrap(),
        arxiv_pdf_url: Some(arxiv_id.pdf_url(&format!("{pdf_base}/pdf"))),
        arxiv_id: Some(arxiv_id),
        doi: None,
        title: title.to_string(),
        authors: vec![author.to_string()],
        year,
        texkey: Some(key.to_string()),
        published_pdf_url: None,
        bibtex,
        entry,
    }
}

/// In-memory record source keyed by arXiv id.
#[derive(Default)]
pub struct StubSource {
    records: HashMap<String, PaperRecord>,
}

impl StubSource {
    pub fn with(mut self, record: PaperRecord) -> Self {
        let key = record
            .arxiv_id
            .as_ref()
            .map(|id| id.id.clone())
            .unwrap_or_default();
        self.records.insert(key, record);
        self
    }
}

#[async_trait]
impl RecordSource for StubSource {
    async fn resolve(&self, identifier: &Identifier) -> Result<InspireId> {
        let record = match identifier {
            Identifier::Inspire(recid) => self.records.values().find(|r| &r.inspire_id == recid),
            _ => identifier.arxiv_id().and_then(|id| self.records.get(&id.id)),
        };
        record
            .map(|r| r.inspire_id.clone())
            .ok_or_else(|| PaperError::NotFound(identifier.to_string()))
    }

    async fn fetch(&self, identifier: &Identifier, recid: &InspireId) -> Result<PaperRecord> {
        self.records
            .values()
            .find(|r| &r.inspire_id == recid)
            .cloned()
            .map(|mut r| {
                r.requested = identifier.clone();
                r
            })
            .ok_or_else(|| PaperError::NotFound(identifier.to_string()))
    }
}

pub fn pipeline(source: StubSource) -> PaperPipeline {
    PaperPipeline::new(Arc::new(source), PdfRetriever::new(http(), true))
}
