use serde::{Deserialize, Serialize};

use crate::bibtex::BibEntry;
use crate::error::{PaperError, Result};
use crate::identifiers::{ArxivId, Doi, Identifier, InspireId};

// ─── Wire types ──────────────────────────────────────────────────────────────

/// INSPIRE serializes record ids as strings but control numbers as integers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordNumber {
    Text(String),
    Number(u64),
}

impl RecordNumber {
    pub fn to_inspire_id(&self) -> Option<InspireId> {
        match self {
            Self::Text(s) => InspireId::parse(s).ok(),
            Self::Number(n) => InspireId::parse(&n.to_string()).ok(),
        }
    }
}

/// Body of `GET /api/literature/<recid>` (and of the `arxiv/` and `doi/` resolvers).
#[derive(Debug, Clone, Deserialize)]
pub struct InspireRecord {
    pub id: Option<RecordNumber>,
    #[serde(default)]
    pub metadata: InspireMetadata,
    #[serde(default)]
    pub links: InspireLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InspireMetadata {
    pub control_number: Option<RecordNumber>,
    #[serde(default)]
    pub titles: Vec<InspireTitle>,
    #[serde(default)]
    pub authors: Vec<InspireAuthor>,
    #[serde(default)]
    pub texkeys: Vec<String>,
    #[serde(default)]
    pub arxiv_eprints: Vec<InspireEprint>,
    #[serde(default)]
    pub dois: Vec<InspireValue>,
    #[serde(default)]
    pub documents: Vec<InspireDocument>,
    pub earliest_date: Option<String>,
    pub preprint_date: Option<String>,
    #[serde(default)]
    pub publication_info: Vec<InspirePublicationInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspireTitle {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspireAuthor {
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspireEprint {
    pub value: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspireValue {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspireDocument {
    pub url: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub fulltext: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspirePublicationInfo {
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InspireLinks {
    pub bibtex: Option<String>,
}

impl InspireRecord {
    pub fn control_number(&self) -> Option<InspireId> {
        self.metadata
            .control_number
            .as_ref()
            .or(self.id.as_ref())
            .and_then(RecordNumber::to_inspire_id)
    }
}

// ─── PaperRecord ─────────────────────────────────────────────────────────────

/// A resolved paper with everything needed to name, download and cite it.
#[derive(Debug, Clone, Serialize)]
pub struct PaperRecord {
    /// The identifier this record was looked up by.
    pub requested: Identifier,
    pub inspire_id: InspireId,
    pub arxiv_id: Option<ArxivId>,
    pub doi: Option<Doi>,
    pub title: String,
    /// `Surname, Given` as listed by INSPIRE.
    pub authors: Vec<String>,
    /// Year of the first public version.
    pub year: i32,
    pub texkey: Option<String>,
    pub published_pdf_url: Option<String>,
    pub arxiv_pdf_url: Option<String>,
    /// BibTeX exactly as served by INSPIRE.
    pub bibtex: String,
    #[serde(skip)]
    pub entry: BibEntry,
}

impl PaperRecord {
    /// Validates a raw record. Title, authors and year are required.
    pub fn from_inspire(
        requested: Identifier,
        record: InspireRecord,
        bibtex: String,
        arxiv_pdf_base: &str,
    ) -> Result<Self> {
        let malformed = |what: &str| PaperError::MalformedResponse(requested.to_string(), what.to_string());

        let inspire_id = record
            .control_number()
            .ok_or_else(|| malformed("record has no control number"))?;
        let m = record.metadata;

        let title = m
            .titles
            .iter()
            .map(|t| t.title.trim())
            .find(|t| !t.is_empty())
            .ok_or_else(|| malformed("record has no title"))?
            .to_string();

        let authors: Vec<String> = m
            .authors
            .iter()
            .map(|a| a.full_name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if authors.is_empty() {
            return Err(malformed("record has no authors"));
        }

        let texkey = m.texkeys.first().cloned();
        let year = first_version_year(&m, texkey.as_deref())
            .ok_or_else(|| malformed("record has no year"))?;

        let arxiv_id = m
            .arxiv_eprints
            .first()
            .and_then(|e| ArxivId::parse(&e.value).ok());
        let doi = m.dois.first().and_then(|d| Doi::parse(&d.value).ok());

        let visible: Vec<&InspireDocument> = m.documents.iter().filter(|d| !d.hidden).collect();
        let published_pdf_url = visible
            .iter()
            .find(|d| d.fulltext)
            .or(visible.first())
            .map(|d| d.url.clone());
        let arxiv_pdf_url = arxiv_id.as_ref().map(|id| id.pdf_url(arxiv_pdf_base));

        let entry = BibEntry::parse(&bibtex)
            .map_err(|e| PaperError::MalformedResponse(requested.to_string(), format!("BibTeX: {e}")))?;

        Ok(Self {
            requested,
            inspire_id,
            arxiv_id,
            doi,
            title,
            authors,
            year,
            texkey,
            published_pdf_url,
            arxiv_pdf_url,
            bibtex,
            entry,
        })
    }
}

fn year_prefix(date: &str) -> Option<i32> {
    date.get(..4)
        .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
        .and_then(|y| y.parse().ok())
}

/// `Maldacena:1997re` carries the year right after the colon.
fn texkey_year(texkey: &str) -> Option<i32> {
    texkey.split_once(':').and_then(|(_, rest)| year_prefix(rest))
}

fn first_version_year(m: &InspireMetadata, texkey: Option<&str>) -> Option<i32> {
    m.earliest_date
        .as_deref()
        .and_then(year_prefix)
        .or_else(|| m.preprint_date.as_deref().and_then(year_prefix))
        .or_else(|| texkey.and_then(texkey_year))
        .or_else(|| m.publication_info.iter().find_map(|p| p.year))
}
