pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::identifiers::{Identifier, InspireId};

pub use client::InspireClient;
pub use types::PaperRecord;

/// Somewhere paper records come from. Implemented by [`InspireClient`];
/// the pipelines only see this trait.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Map an identifier to the INSPIRE control number of its record.
    async fn resolve(&self, identifier: &Identifier) -> Result<InspireId>;

    /// Fetch and validate the record with control number `recid`.
    async fn fetch(&self, identifier: &Identifier, recid: &InspireId) -> Result<PaperRecord>;

    async fn lookup(&self, identifier: &Identifier) -> Result<PaperRecord> {
        let recid = self.resolve(identifier).await?;
        self.fetch(identifier, &recid).await
    }
}
