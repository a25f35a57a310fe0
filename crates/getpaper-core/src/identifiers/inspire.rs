use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PaperError, Result};

/// INSPIRE literature control number (`recid`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct InspireId(String);

impl InspireId {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let stripped = input
            .rsplit_once("/literature/")
            .map(|(_, rest)| rest)
            .or_else(|| input.strip_prefix("inspire:"))
            .unwrap_or(input)
            .trim_end_matches('/');

        if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaperError::InvalidInspireId(input.to_string()));
        }
        Ok(Self(stripped.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InspireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
