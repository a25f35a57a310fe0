use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use super::entry::{BibEntry, Block};
use super::parser::parse_blocks;
use crate::error::{PaperError, Result};
use crate::identifiers::ArxivId;
use crate::output::write_atomic;

/// What [`Bibliography::merge`] did with the new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeOutcome {
    Appended,
    /// Number of stale entries removed before appending.
    Replaced(usize),
}

/// Blocks of one `.bib` file in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bibliography {
    blocks: Vec<Block>,
}

impl Bibliography {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse file contents. When a citation key appears more than once only
    /// the last occurrence is kept. Keys compare case-insensitively.
    pub fn parse(text: &str) -> Result<Self> {
        let mut bib = Self {
            blocks: parse_blocks(text)?,
        };
        bib.drop_duplicate_keys();
        Ok(bib)
    }

    /// Load from disk; a missing file is an empty bibliography.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "bibliography does not exist yet");
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path).map_err(|e| PaperError::fs(path, e))?;
        Self::parse(&text)
    }

    fn drop_duplicate_keys(&mut self) {
        let mut seen = HashSet::new();
        let mut keep = vec![true; self.blocks.len()];
        for (i, block) in self.blocks.iter().enumerate().rev() {
            if let Block::Entry(entry) = block
                && !seen.insert(entry.citation_key.to_ascii_lowercase())
            {
                warn!(key = %entry.citation_key, "dropping duplicate BibTeX entry");
                keep[i] = false;
            }
        }
        let mut flags = keep.into_iter();
        self.blocks.retain(|_| flags.next().unwrap_or(true));
    }

    pub fn entries(&self) -> impl Iterator<Item = &BibEntry> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Entry(entry) => Some(entry),
            Block::Verbatim(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    pub fn get(&self, citation_key: &str) -> Option<&BibEntry> {
        self.entries()
            .find(|e| e.citation_key.eq_ignore_ascii_case(citation_key))
    }

    /// Distinct arXiv identifiers in order of first appearance.
    pub fn arxiv_ids(&self) -> Vec<ArxivId> {
        let mut seen = HashSet::new();
        self.entries()
            .filter_map(BibEntry::arxiv_id)
            .filter(|id| seen.insert(id.id.clone()))
            .collect()
    }

    /// Insert `entry` at the end, first removing every entry that cites the
    /// same arXiv paper or uses the same citation key.
    pub fn merge(&mut self, entry: BibEntry) -> MergeOutcome {
        let new_arxiv = entry.arxiv_id().map(|id| id.id);
        let stale = self
            .blocks
            .iter()
            .enumerate()
            .filter_map(|(i, block)| match block {
                Block::Entry(old)
                    if old.citation_key.eq_ignore_ascii_case(&entry.citation_key)
                        || (new_arxiv.is_some()
                            && old.arxiv_id().map(|id| id.id) == new_arxiv) =>
                {
                    Some(i)
                }
                _ => None,
            })
            .collect::<Vec<_>>();

        for &i in stale.iter().rev() {
            self.blocks.remove(i);
        }
        self.blocks.push(Block::Entry(entry));

        if stale.is_empty() {
            MergeOutcome::Appended
        } else {
            MergeOutcome::Replaced(stale.len())
        }
    }

    /// Normalized file contents: one blank line between blocks, trailing newline.
    pub fn to_bibtex(&self) -> String {
        if self.blocks.is_empty() {
            return String::new();
        }
        let mut out = self
            .blocks
            .iter()
            .map(Block::to_bibtex)
            .collect::<Vec<_>>()
            .join("\n\n");
        out.push('\n');
        out
    }

    /// Write atomically; a failed save leaves the previous file in place.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.to_bibtex().as_bytes())?;
        debug!(path = %path.display(), entries = self.len(), "bibliography saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WELL_FORMED: &str = r#"@article{Maldacena:1997re,
    author = "Maldacena, Juan Martin",
    title = "{The Large $N$ limit of superconformal field theories and supergravity}",
    eprint = "hep-th/9711200",
    archivePrefix = "arXiv",
    year = "1998"
}

@book{Weinberg:1995mt,
    author = "Weinberg, Steven",
    title = "{The Quantum theory of fields. Vol. 1: Foundations}",
    publisher = "Cambridge University Press",
    year = "2005"
}

@article{ATLAS:2012yve,
    author = "Aad, Georges and others",
    collaboration = "ATLAS",
    title = "{Observation of a new particle in the search for the Standard Model Higgs boson with the ATLAS detector at the LHC}",
    eprint = "1207.7214",
    archivePrefix = "arXiv",
    primaryClass = "hep-ex",
    year = "2012"
}
"#;

    fn fresh_maldacena() -> BibEntry {
        BibEntry::parse(
            r#"@article{Maldacena:1997re,
    author = "Maldacena, Juan Martin",
    title = "{The Large N limit of superconformal field theories and supergravity}",
    eprint = "hep-th/9711200",
    archivePrefix = "arXiv",
    doi = "10.1023/A:1026654312961",
    journal = "Adv. Theor. Math. Phys.",
    volume = "2",
    pages = "231--252",
    year = "1998"
}"#,
        )
        .unwrap()
    }

    #[test]
    fn roundtrip_of_well_formed_file_is_identical() {
        let bib = Bibliography::parse(WELL_FORMED).unwrap();
        assert_eq!(bib.len(), 3);
        assert_eq!(bib.to_bibtex(), WELL_FORMED);
    }

    #[test]
    fn roundtrip_only_touches_whitespace() {
        let messy = "\n\n@misc{a,\n  title={x},\n        year = 1}\n\n\n\n@misc{b, note = {keep   inner   spacing}}   \n";
        let bib = Bibliography::parse(messy).unwrap();
        let out = bib.to_bibtex();
        assert_eq!(
            out,
            "@misc{a,\n    title = {x},\n    year = 1\n}\n\n@misc{b,\n    note = {keep   inner   spacing}\n}\n"
        );
        let squash = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        assert_eq!(squash(&out), squash(messy));
    }

    #[test]
    fn merge_replaces_entry_with_same_arxiv_id_and_moves_it_last() {
        let mut bib = Bibliography::parse(WELL_FORMED).unwrap();
        let outcome = bib.merge(fresh_maldacena());
        assert_eq!(outcome, MergeOutcome::Replaced(1));

        let keys: Vec<_> = bib.entries().map(|e| e.citation_key.as_str()).collect();
        assert_eq!(keys, ["Weinberg:1995mt", "ATLAS:2012yve", "Maldacena:1997re"]);
        assert_eq!(
            bib.get("Maldacena:1997re").unwrap().get("doi"),
            Some("\"10.1023/A:1026654312961\"")
        );
    }

    #[test]
    fn merge_matches_arxiv_id_under_a_different_key() {
        let mut bib = Bibliography::parse(
            "@article{mykey, eprint = {arXiv:hep-th/9711200v3}, title = {old}}\n",
        )
        .unwrap();
        assert_eq!(bib.merge(fresh_maldacena()), MergeOutcome::Replaced(1));
        assert_eq!(bib.len(), 1);
        assert!(bib.get("mykey").is_none());
    }

    #[test]
    fn merge_replaces_same_key_without_arxiv() {
        let mut bib = Bibliography::parse(WELL_FORMED).unwrap();
        let newer = BibEntry::new("book", "Weinberg:1995mt").with_field("year", "\"1995\"");
        assert_eq!(bib.merge(newer), MergeOutcome::Replaced(1));
        assert_eq!(bib.len(), 3);
        assert_eq!(bib.get("Weinberg:1995mt").unwrap().get("year"), Some("\"1995\""));
    }

    #[test]
    fn merge_appends_unknown_paper() {
        let mut bib = Bibliography::parse(WELL_FORMED).unwrap();
        let entry = BibEntry::new("article", "Witten:1998qj")
            .with_field("eprint", "\"hep-th/9802150\"")
            .with_field("archivePrefix", "\"arXiv\"");
        assert_eq!(bib.merge(entry), MergeOutcome::Appended);
        assert_eq!(bib.len(), 4);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut once = Bibliography::parse(WELL_FORMED).unwrap();
        once.merge(fresh_maldacena());

        let mut twice = Bibliography::parse(WELL_FORMED).unwrap();
        twice.merge(fresh_maldacena());
        let reloaded = Bibliography::parse(&twice.to_bibtex()).unwrap();
        let mut twice = reloaded;
        twice.merge(fresh_maldacena());

        assert_eq!(once.to_bibtex(), twice.to_bibtex());
    }

    #[test]
    fn merge_into_empty_bibliography() {
        let mut bib = Bibliography::new();
        assert_eq!(bib.to_bibtex(), "");
        bib.merge(fresh_maldacena());
        assert!(bib.to_bibtex().ends_with("}\n"));
        assert!(!bib.to_bibtex().ends_with("\n\n"));
    }

    #[test]
    fn duplicate_keys_collapse_to_last() {
        let bib = Bibliography::parse(
            "@misc{a, year = 1}\n\n@misc{b, year = 2}\n\n@misc{a, year = 3}\n",
        )
        .unwrap();
        let keys: Vec<_> = bib.entries().map(|e| e.citation_key.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(bib.get("a").unwrap().get("year"), Some("3"));
    }

    #[test]
    fn citation_keys_ignore_case() {
        let mut bib = Bibliography::parse(
            "@misc{Smith2001, year = 1}\n\n@misc{b, year = 2}\n\n@misc{smith2001, year = 3}\n",
        )
        .unwrap();
        let keys: Vec<_> = bib.entries().map(|e| e.citation_key.as_str()).collect();
        assert_eq!(keys, ["b", "smith2001"]);

        let newer = BibEntry::new("misc", "SMITH2001").with_field("year", "4");
        assert_eq!(bib.merge(newer), MergeOutcome::Replaced(1));
        assert_eq!(bib.len(), 2);
        assert_eq!(bib.get("Smith2001").unwrap().get("year"), Some("4"));
    }

    #[test]
    fn arxiv_ids_are_distinct_and_ordered() {
        let mut bib = Bibliography::parse(WELL_FORMED).unwrap();
        bib.merge(
            BibEntry::new("misc", "copy")
                .with_field("eprint", "{1207.7214v1}"),
        );
        let ids: Vec<_> = bib.arxiv_ids().into_iter().map(|id| id.id).collect();
        assert_eq!(ids, ["hep-th/9711200", "1207.7214"]);
    }

    #[test]
    fn verbatim_blocks_survive_merge() {
        let mut bib =
            Bibliography::parse("@string{prl = \"Phys. Rev. Lett.\"}\n\n@misc{a, year = 1}\n")
                .unwrap();
        bib.merge(fresh_maldacena());
        assert!(bib.to_bibtex().starts_with("@string{prl = \"Phys. Rev. Lett.\"}\n\n@misc{a,"));
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("refs").join("refs.bib");

        let bib = Bibliography::parse(WELL_FORMED).unwrap();
        bib.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), WELL_FORMED);
        assert_eq!(Bibliography::load(&path).unwrap(), bib);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let bib = Bibliography::load(&dir.path().join("none.bib")).unwrap();
        assert!(bib.is_empty());
    }

    #[test]
    fn malformed_file_fails_and_is_left_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.bib");
        let broken = "@article{k,\n  title = {never closed\n";
        std::fs::write(&path, broken).unwrap();

        let err = Bibliography::load(&path).unwrap_err();
        assert!(matches!(err, PaperError::Parse { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), broken);
    }
}
