use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PaperError, Result};

// New format: YYMM.NNNN or YYMM.NNNNN (with optional version)
static NEW_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}\.\d{4,5})(v(\d+))?$").expect("valid arXiv regex"));

// Old format: archive(.SC)/YYMMNNN
static OLD_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z\-]+)(\.[a-zA-Z]{2})?/(\d{7})(v(\d+))?$").expect("valid arXiv regex")
});

/// A validated arXiv identifier. `id` is the canonical, version-less form used
/// both for INSPIRE lookups and for matching BibTeX `eprint` fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ArxivId {
    pub raw: String,
    pub id: String,
    pub version: Option<u32>,
    pub category: Option<String>,
}

impl ArxivId {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        // Strip known prefixes
        let stripped = if let Some(s) = input.strip_prefix("https://arxiv.org/abs/") {
            s
        } else if let Some(s) = input.strip_prefix("http://arxiv.org/abs/") {
            s
        } else if let Some(s) = input.strip_prefix("https://arxiv.org/pdf/") {
            s.trim_end_matches(".pdf")
        } else if let Some(s) = input.strip_prefix("http://arxiv.org/pdf/") {
            s.trim_end_matches(".pdf")
        } else if let Some(s) = input.strip_prefix("arXiv:") {
            s
        } else if let Some(s) = input.strip_prefix("arxiv:") {
            s
        } else {
            input
        };

        if let Some(caps) = NEW_FORMAT.captures(stripped) {
            let id = caps[1].to_string();
            let version = caps.get(3).and_then(|v| v.as_str().parse::<u32>().ok());
            return Ok(Self {
                raw: input.to_string(),
                id,
                version,
                category: None,
            });
        }

        if let Some(caps) = OLD_FORMAT.captures(stripped) {
            let archive = caps[1].to_lowercase();
            let subject = caps
                .get(2)
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_default();
            let category = format!("{archive}{subject}");
            let version = caps.get(5).and_then(|v| v.as_str().parse::<u32>().ok());
            return Ok(Self {
                raw: input.to_string(),
                id: format!("{category}/{}", &caps[3]),
                version,
                category: Some(category),
            });
        }

        Err(PaperError::InvalidArxivId(input.to_string()))
    }

    /// arXiv serves the latest version when no version suffix is given.
    pub fn pdf_url(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.id)
    }
}

impl fmt::Display for ArxivId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
