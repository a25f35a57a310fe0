//! Reading, merging and writing `.bib` files.

pub mod bibliography;
pub mod entry;
pub mod parser;

pub use bibliography::{Bibliography, MergeOutcome};
pub use entry::{BibEntry, BibField, Block};
pub use parser::{parse_blocks, strip_delimiters};
