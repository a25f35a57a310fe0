//! getpaper: fetch papers from INSPIRE, save their PDFs under descriptive
//! names and keep a BibTeX file in sync.

pub mod bibtex;
pub mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod identifiers;
pub mod inspire;
pub mod naming;
pub mod output;
pub mod report;
pub mod retrieve;
pub mod update;

#[cfg(test)]
pub(crate) mod testutil;

pub use bibtex::{BibEntry, Bibliography, MergeOutcome};
pub use config::Config;
pub use error::{ExitCode, PaperError, Result};
pub use identifiers::Identifier;
pub use inspire::{InspireClient, PaperRecord, RecordSource};
pub use report::{PaperOutcome, RunMode, RunReport};
pub use retrieve::PaperPipeline;
pub use update::{BatchUpdater, UpdateOptions};
