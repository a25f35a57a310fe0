pub mod arxiv;
pub mod doi;
pub mod inspire;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use arxiv::ArxivId;
pub use doi::Doi;
pub use inspire::InspireId;

/// The identifier a paper was requested by. Exactly one kind drives the lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Identifier {
    Arxiv(ArxivId),
    Doi(Doi),
    Inspire(InspireId),
}

impl Identifier {
    /// Picks one identifier out of the CLI flags. Precedence is
    /// arxiv > doi > inspire; the lower-ranked flags are ignored, not validated.
    pub fn from_flags(
        arxiv: Option<&str>,
        doi: Option<&str>,
        inspire: Option<&str>,
    ) -> crate::Result<Option<Self>> {
        if let Some(value) = arxiv {
            return Ok(Some(Self::Arxiv(ArxivId::parse(value)?)));
        }
        if let Some(value) = doi {
            return Ok(Some(Self::Doi(Doi::parse(value)?)));
        }
        if let Some(value) = inspire {
            return Ok(Some(Self::Inspire(InspireId::parse(value)?)));
        }
        Ok(None)
    }

    /// Path below the INSPIRE API root that resolves this identifier.
    pub fn api_path(&self) -> String {
        match self {
            Self::Arxiv(id) => format!("arxiv/{}", id.id),
            Self::Doi(doi) => format!("doi/{}", doi.url_path()),
            Self::Inspire(recid) => format!("literature/{recid}"),
        }
    }

    pub fn arxiv_id(&self) -> Option<&ArxivId> {
        match self {
            Self::Arxiv(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arxiv(id) => write!(f, "arXiv:{id}"),
            Self::Doi(doi) => write!(f, "doi:{doi}"),
            Self::Inspire(recid) => write!(f, "inspire:{recid}"),
        }
    }
}

impl From<ArxivId> for Identifier {
    fn from(id: ArxivId) -> Self {
        Self::Arxiv(id)
    }
}
