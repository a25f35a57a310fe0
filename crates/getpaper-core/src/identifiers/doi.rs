use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PaperError, Result};

const PREFIXES: [&str; 6] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
    "DOI:",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Doi {
    pub raw: String,
    pub normalized: String,
}

impl Doi {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let stripped = PREFIXES
            .iter()
            .find_map(|prefix| input.strip_prefix(prefix))
            .map(str::trim_start)
            .unwrap_or(input);

        // Must start with "10.", contain "/", and have a non-empty suffix
        if !stripped.starts_with("10.") {
            return Err(PaperError::InvalidDoi(input.to_string()));
        }
        let slash_pos = stripped
            .find('/')
            .ok_or_else(|| PaperError::InvalidDoi(input.to_string()))?;
        if stripped[slash_pos + 1..].is_empty() {
            return Err(PaperError::InvalidDoi(input.to_string()));
        }

        Ok(Self {
            raw: input.to_string(),
            normalized: stripped.to_lowercase(),
        })
    }

    /// Percent-encodes everything except the `/` separators so the DOI can be
    /// used as a URL path.
    pub fn url_path(&self) -> String {
        urlencoding::encode(&self.normalized).replace("%2F", "/")
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}
