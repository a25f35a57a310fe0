use serde::Serialize;

use crate::error::{PaperError, Result};
use crate::identifiers::ArxivId;

use super::parser::{parse_blocks, strip_delimiters};

/// One `name = value` pair. `value` keeps its delimiters (`{...}`, `"..."`,
/// bare numbers or `#` concatenations) exactly as written.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BibField {
    pub name: String,
    pub value: String,
}

/// A regular BibTeX entry such as `@article{key, ...}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BibEntry {
    pub entry_type: String,
    pub citation_key: String,
    pub fields: Vec<BibField>,
    /// Entry was written as `@type( ... )` instead of braces.
    #[serde(skip)]
    pub(crate) parens: bool,
    /// A comma followed the last field (or the key when there are no fields).
    #[serde(skip)]
    pub(crate) trailing_comma: bool,
}

/// One top-level item of a `.bib` file, kept in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Entry(BibEntry),
    /// `@comment`, `@preamble` and `@string` blocks, and any text between entries.
    Verbatim(String),
}

impl BibEntry {
    pub fn new(entry_type: impl Into<String>, citation_key: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            citation_key: citation_key.into(),
            fields: Vec::new(),
            parens: false,
            trailing_comma: false,
        }
    }

    /// Add a field; `value` must already carry its BibTeX delimiters.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(BibField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Parse text that must contain exactly one regular entry.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = parse_blocks(text)?.into_iter().filter_map(|block| match block {
            Block::Entry(entry) => Some(entry),
            Block::Verbatim(_) => None,
        });
        match (entries.next(), entries.next()) {
            (Some(entry), None) => Ok(entry),
            (None, _) => Err(PaperError::Parse {
                line: 1,
                message: "no BibTeX entry found".to_string(),
            }),
            (Some(_), Some(_)) => Err(PaperError::Parse {
                line: 1,
                message: "expected a single BibTeX entry".to_string(),
            }),
        }
    }

    /// Raw value of a field, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// Field value with one layer of braces or quotes removed.
    pub fn get_unquoted(&self, name: &str) -> Option<&str> {
        self.get(name).map(strip_delimiters)
    }

    /// The arXiv identifier this entry cites: `eprint` when `archivePrefix`
    /// is missing or `arXiv`, otherwise an `arxiv`/`arxivid` field.
    pub fn arxiv_id(&self) -> Option<ArxivId> {
        let arxiv_prefix = self
            .get_unquoted("archiveprefix")
            .is_none_or(|prefix| prefix.eq_ignore_ascii_case("arxiv"));
        if arxiv_prefix
            && let Some(id) = self
                .get_unquoted("eprint")
                .and_then(|value| ArxivId::parse(value).ok())
        {
            return Some(id);
        }

        ["arxiv", "arxivid"]
            .iter()
            .filter_map(|name| self.get_unquoted(name))
            .find_map(|value| ArxivId::parse(value).ok())
    }

    /// Canonical text: header line, one field per line indented four spaces,
    /// closing delimiter on its own line.
    pub fn to_bibtex(&self) -> String {
        let (open, close) = if self.parens { ('(', ')') } else { ('{', '}') };
        let mut bib = format!("@{}{}{}", self.entry_type, open, self.citation_key);

        if self.fields.is_empty() {
            if self.trailing_comma {
                bib.push_str(",\n");
            }
            bib.push(close);
            return bib;
        }

        bib.push_str(",\n");
        let lines = self
            .fields
            .iter()
            .map(|f| format!("    {} = {}", f.name, f.value))
            .collect::<Vec<_>>();
        bib.push_str(&lines.join(",\n"));
        if self.trailing_comma {
            bib.push(',');
        }
        bib.push('\n');
        bib.push(close);
        bib
    }
}

impl Block {
    pub fn to_bibtex(&self) -> String {
        match self {
            Block::Entry(entry) => entry.to_bibtex(),
            Block::Verbatim(text) => text.clone(),
        }
    }
}
