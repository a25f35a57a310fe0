use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{PaperError, Result};
use crate::http::RateLimitedClient;
use crate::inspire::PaperRecord;
use crate::output::write_atomic;

/// How far into the body the `%PDF` marker may appear.
const MAGIC_WINDOW: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfSource {
    Published,
    Arxiv,
}

impl fmt::Display for PdfSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Published => f.write_str("published"),
            Self::Arxiv => f.write_str("arXiv"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedPdf {
    pub path: PathBuf,
    pub source: PdfSource,
    pub url: String,
    pub size_bytes: u64,
}

fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(MAGIC_WINDOW)]
        .windows(4)
        .any(|w| w == b"%PDF")
}

/// Downloads the published PDF of a record, falling back to the arXiv one.
pub struct PdfRetriever {
    client: Arc<RateLimitedClient>,
    require_pdf_magic: bool,
}

impl PdfRetriever {
    pub fn new(client: Arc<RateLimitedClient>, require_pdf_magic: bool) -> Self {
        Self {
            client,
            require_pdf_magic,
        }
    }

    pub fn from_config(client: Arc<RateLimitedClient>, config: &Config) -> Self {
        Self::new(client, config.require_pdf_magic)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self.client.get_bytes(url).await?;
        if self.require_pdf_magic && !looks_like_pdf(&bytes) {
            return Err(PaperError::MalformedResponse(
                url.to_string(),
                "body is not a PDF".to_string(),
            ));
        }
        Ok(bytes)
    }

    /// Saves the first candidate that downloads cleanly to `dest`. Nothing is
    /// written unless a download succeeds.
    pub async fn retrieve(&self, record: &PaperRecord, dest: &Path) -> Result<SavedPdf> {
        let candidates = [
            (PdfSource::Published, record.published_pdf_url.as_deref()),
            (PdfSource::Arxiv, record.arxiv_pdf_url.as_deref()),
        ];

        let mut attempts = Vec::new();
        for (source, url) in candidates {
            let Some(url) = url else {
                attempts.push(format!("{source}: no URL"));
                continue;
            };
            match self.download(url).await {
                Ok(bytes) => {
                    write_atomic(dest, &bytes)?;
                    info!(
                        path = %dest.display(),
                        %source,
                        bytes = bytes.len(),
                        "saved PDF"
                    );
                    return Ok(SavedPdf {
                        path: dest.to_path_buf(),
                        source,
                        url: url.to_string(),
                        size_bytes: bytes.len() as u64,
                    });
                }
                Err(e) => {
                    warn!(%source, url, error = %e, "PDF download failed");
                    attempts.push(format!("{source} {url}: {e}"));
                }
            }
        }

        Err(PaperError::Download {
            id: record.requested.to_string(),
            attempts,
        })
    }
}
