use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::bibtex::Bibliography;
use crate::config::Config;
use crate::download::{PdfRetriever, SavedPdf};
use crate::error::Result;
use crate::http::RateLimitedClient;
use crate::identifiers::Identifier;
use crate::inspire::{InspireClient, PaperRecord, RecordSource};
use crate::output::ensure_dir;
use crate::report::{PaperOutcome, RunMode, RunReport};

/// Resolve, fetch and download one paper at a time. Shared by the single
/// paper mode and the batch updater.
pub struct PaperPipeline {
    source: Arc<dyn RecordSource>,
    pdfs: PdfRetriever,
}

impl PaperPipeline {
    pub fn new(source: Arc<dyn RecordSource>, pdfs: PdfRetriever) -> Self {
        Self { source, pdfs }
    }

    /// One HTTP client for the whole invocation, shared by INSPIRE and PDF requests.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Arc::new(RateLimitedClient::from_config(config)?);
        Ok(Self::new(
            Arc::new(InspireClient::from_config(http.clone(), config)),
            PdfRetriever::from_config(http, config),
        ))
    }

    pub async fn lookup(&self, identifier: &Identifier) -> Result<PaperRecord> {
        self.source.lookup(identifier).await
    }

    /// Saves the record's PDF into `directory` under its derived file name.
    pub async fn download(&self, record: &PaperRecord, directory: &Path) -> Result<SavedPdf> {
        let dest = directory.join(record.pdf_filename());
        self.pdfs.retrieve(record, &dest).await
    }

    /// Looks the paper up and saves its PDF into `directory`.
    pub async fn fetch_paper(
        &self,
        identifier: &Identifier,
        directory: &Path,
    ) -> Result<(PaperRecord, SavedPdf)> {
        let record = self.lookup(identifier).await?;
        let pdf = self.download(&record, directory).await?;
        Ok((record, pdf))
    }

    /// Single paper mode: download into `directory` and, unless `bib_path` is
    /// `None`, merge the entry into that bibliography. The bibliography is
    /// read before any network access, so a malformed file fails fast.
    pub async fn get_paper(
        &self,
        identifier: &Identifier,
        directory: &Path,
        bib_path: Option<&Path>,
    ) -> Result<RunReport> {
        ensure_dir(directory)?;
        let bibliography = match bib_path {
            Some(path) => Some((path, Bibliography::load(path)?)),
            None => None,
        };

        let (record, pdf) = self.fetch_paper(identifier, directory).await?;

        let merge = match bibliography {
            Some((path, mut bib)) => {
                let outcome = bib.merge(record.entry.clone());
                bib.save(path)?;
                info!(
                    path = %path.display(),
                    key = %record.entry.citation_key,
                    ?outcome,
                    "bibliography updated"
                );
                Some(outcome)
            }
            None => None,
        };

        let mut report = RunReport::new(RunMode::Single, bib_path.map(Path::to_path_buf));
        report.push(PaperOutcome::ok(&record, pdf, merge));
        Ok(report)
    }
}
