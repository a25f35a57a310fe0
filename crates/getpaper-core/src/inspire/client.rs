use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{PaperError, Result};
use crate::http::RateLimitedClient;
use crate::identifiers::{Identifier, InspireId};
use crate::inspire::RecordSource;
use crate::inspire::types::{InspireRecord, PaperRecord, RecordNumber};

/// Just enough of a record to learn its control number.
#[derive(Debug, Deserialize)]
struct ResolvedRecord {
    id: Option<RecordNumber>,
    #[serde(default)]
    metadata: ResolvedMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ResolvedMetadata {
    control_number: Option<RecordNumber>,
}

pub struct InspireClient {
    client: Arc<RateLimitedClient>,
    base_url: String,
    arxiv_pdf_url: String,
}

impl InspireClient {
    pub fn new(client: Arc<RateLimitedClient>, base_url: &str, arxiv_pdf_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            arxiv_pdf_url: arxiv_pdf_url.to_string(),
        }
    }

    pub fn from_config(client: Arc<RateLimitedClient>, config: &Config) -> Self {
        Self::new(client, &config.inspire_api_url, &config.arxiv_pdf_url)
    }

    fn literature_url(&self, recid: &InspireId) -> String {
        format!("{}/literature/{recid}", self.base_url)
    }

    async fn fetch_bibtex(&self, record: &InspireRecord, recid: &InspireId) -> Result<String> {
        let url = record
            .links
            .bibtex
            .clone()
            .unwrap_or_else(|| format!("{}?format=bibtex", self.literature_url(recid)));
        self.client.get(&url).await
    }
}

#[async_trait]
impl RecordSource for InspireClient {
    async fn resolve(&self, identifier: &Identifier) -> Result<InspireId> {
        let url = format!(
            "{}/{}?fields=control_number",
            self.base_url,
            identifier.api_path()
        );
        let resolved: ResolvedRecord = self.client.get_json(&url).await.map_err(|e| match e {
            PaperError::NotFound(_) => PaperError::NotFound(identifier.to_string()),
            other => other,
        })?;

        let recid = resolved
            .metadata
            .control_number
            .or(resolved.id)
            .as_ref()
            .and_then(RecordNumber::to_inspire_id)
            .ok_or_else(|| {
                PaperError::MalformedResponse(
                    identifier.to_string(),
                    "response carries no control number".to_string(),
                )
            })?;
        debug!(%identifier, %recid, "resolved");
        Ok(recid)
    }

    async fn fetch(&self, identifier: &Identifier, recid: &InspireId) -> Result<PaperRecord> {
        let record: InspireRecord = self
            .client
            .get_json(&self.literature_url(recid))
            .await
            .map_err(|e| match e {
                PaperError::NotFound(_) => PaperError::NotFound(identifier.to_string()),
                other => other,
            })?;
        let bibtex = self.fetch_bibtex(&record, recid).await?;

        let paper =
            PaperRecord::from_inspire(identifier.clone(), record, bibtex, &self.arxiv_pdf_url)?;
        info!(
            %identifier,
            recid = %paper.inspire_id,
            title = %paper.title,
            "fetched INSPIRE record"
        );
        Ok(paper)
    }
}
