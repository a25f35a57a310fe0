use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bibtex::MergeOutcome;
use crate::download::SavedPdf;
use crate::error::{ExitCode, PaperError};
use crate::identifiers::{Identifier, InspireId};
use crate::inspire::PaperRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Single,
    Update,
}

/// What happened to one requested paper.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PaperOutcome {
    Ok {
        identifier: String,
        inspire_id: InspireId,
        title: String,
        pdf: SavedPdf,
        /// `None` when the bibliography was not written.
        bibliography: Option<MergeOutcome>,
    },
    Failed {
        identifier: String,
        error: String,
        #[serde(skip)]
        exit_code: ExitCode,
    },
}

impl PaperOutcome {
    pub fn ok(record: &PaperRecord, pdf: SavedPdf, merge: Option<MergeOutcome>) -> Self {
        Self::Ok {
            identifier: record.requested.to_string(),
            inspire_id: record.inspire_id.clone(),
            title: record.title.clone(),
            pdf,
            bibliography: merge,
        }
    }

    pub fn failed(identifier: &Identifier, err: &PaperError) -> Self {
        Self::Failed {
            identifier: identifier.to_string(),
            error: err.to_string(),
            exit_code: err.exit_code(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// Summary of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub bibliography: Option<PathBuf>,
    pub papers: Vec<PaperOutcome>,
}

impl RunReport {
    pub fn new(mode: RunMode, bibliography: Option<PathBuf>) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            bibliography,
            papers: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: PaperOutcome) {
        self.papers.push(outcome);
    }

    pub fn succeeded(&self) -> usize {
        self.papers.iter().filter(|p| p.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.papers.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Success only when every paper went through. A lone failure keeps its
    /// own code; several failures report a general error.
    pub fn exit_code(&self) -> ExitCode {
        let mut codes = self.papers.iter().filter_map(|p| match p {
            PaperOutcome::Failed { exit_code, .. } => Some(*exit_code),
            PaperOutcome::Ok { .. } => None,
        });
        match (codes.next(), codes.next()) {
            (None, _) => ExitCode::Success,
            (Some(code), None) if self.succeeded() == 0 => code,
            _ => ExitCode::GeneralError,
        }
    }
}
