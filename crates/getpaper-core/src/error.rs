use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaperError {
    #[error("invalid arXiv ID: {0}")]
    InvalidArxivId(String),

    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("invalid INSPIRE literature ID: {0}")]
    InvalidInspireId(String),

    #[error("no paper given: use --arxiv, --doi or --inspire, or --update")]
    MissingIdentifier,

    #[error("no INSPIRE record found for {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote error from {0}: {1}")]
    Remote(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("malformed response for {0}: {1}")]
    MalformedResponse(String, String),

    #[error("could not download a PDF for {id}: {}", attempts.join("; "))]
    Download { id: String, attempts: Vec<String> },

    #[error("BibTeX parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl PaperError {
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidArxivId(_)
            | Self::InvalidDoi(_)
            | Self::InvalidInspireId(_)
            | Self::MissingIdentifier => ExitCode::InvalidArgs,
            Self::NotFound(_) => ExitCode::NotFound,
            Self::Http(_) | Self::Remote(..) | Self::RateLimit(..) | Self::Download { .. } => {
                ExitCode::NetworkError
            }
            Self::Filesystem { .. } => ExitCode::FileSystemError,
            Self::MalformedResponse(..) | Self::Parse { .. } | Self::Config(_) => {
                ExitCode::GeneralError
            }
        }
    }
}

/// Process exit codes used by the `getpaper` binary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    FileSystemError = 4,
    NetworkError = 6,
}

pub type Result<T> = std::result::Result<T, PaperError>;
