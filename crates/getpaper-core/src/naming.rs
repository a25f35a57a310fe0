//! PDF filenames of the form `{Surname}{Year}_{PascalTitle}.pdf`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::inspire::PaperRecord;

/// Longest filename most filesystems accept, in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

const PDF_EXTENSION: &str = ".pdf";
const UNKNOWN_SURNAME: &str = "Anonymous";
const UNKNOWN_TITLE: &str = "Untitled";

// `\alpha`, `\textit`, `\section*`
static CONTROL_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[A-Za-z]+\*?").expect("valid control word regex"));

// `\"`, `\'`, `\&`: accents and escaped symbols
static CONTROL_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[^A-Za-z\s]").expect("valid control symbol regex"));

/// Removes LaTeX markup from `text`. Control words become word breaks;
/// accents, braces and math shifts vanish so `Schr\"{o}dinger` stays one word.
fn strip_latex(text: &str) -> String {
    let text = CONTROL_WORD.replace_all(text, " ");
    let text = CONTROL_SYMBOL.replace_all(&text, "");
    text.chars()
        .filter(|c| !matches!(c, '{' | '}' | '$'))
        .collect()
}

/// Family name of an author, reduced to alphanumerics. INSPIRE lists authors
/// as `Surname, Given`; other names use their last word.
pub fn surname(author: &str) -> String {
    let author = strip_latex(author);
    let family = match author.split_once(',') {
        Some((family, _)) => family,
        None => author.split_whitespace().last().unwrap_or_default(),
    };
    let cleaned: String = family.chars().filter(|c| c.is_alphanumeric()).collect();
    if cleaned.is_empty() {
        UNKNOWN_SURNAME.to_string()
    } else {
        cleaned
    }
}

/// Title in PascalCase: split on runs of non-alphanumeric characters, first
/// letter of every token upper-cased, the rest kept as written.
pub fn pascal_title(title: &str) -> String {
    strip_latex(title)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn truncate_to_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Builds the PDF filename for a paper.
pub fn pdf_filename(authors: &[String], year: i32, title: &str) -> String {
    let family = authors
        .first()
        .map(|a| surname(a))
        .unwrap_or_else(|| UNKNOWN_SURNAME.to_string());
    let stem = format!("{family}{year}_");

    let mut title = pascal_title(title);
    if title.is_empty() {
        title = UNKNOWN_TITLE.to_string();
    }
    let room = MAX_FILENAME_BYTES.saturating_sub(stem.len() + PDF_EXTENSION.len());
    let title = truncate_to_bytes(&title, room);

    format!("{stem}{title}{PDF_EXTENSION}")
}

impl PaperRecord {
    pub fn pdf_filename(&self) -> String {
        pdf_filename(&self.authors, self.year, &self.title)
    }
}
