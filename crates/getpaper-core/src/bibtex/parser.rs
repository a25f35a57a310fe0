//! Brace-aware BibTeX scanner.
//!
//! An entry starts at `@type{` (or `@type(`) and runs to the matching closing
//! delimiter. Field values may nest braces and may be quoted, so the scanner
//! tracks brace depth and, at depth zero, whether it is inside a `"..."` value.
//! Anything between entries is kept as verbatim text.

use super::entry::{BibEntry, BibField, Block};
use crate::error::{PaperError, Result};

/// Entry types whose bodies are not `key, field = value` lists.
const VERBATIM_TYPES: [&str; 3] = ["comment", "preamble", "string"];

#[derive(Debug, Clone, Copy)]
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, line: 1 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }
}

struct EntryHead<'a> {
    kind: &'a str,
    open: char,
    /// Positioned just after the opening delimiter.
    body: Cursor<'a>,
}

/// Recognizes `@ident{` / `@ident(` at the cursor. A lone `@` (an e-mail
/// address in a comment, say) is not an entry.
fn scan_head(at: Cursor<'_>) -> Option<EntryHead<'_>> {
    let mut cur = at;
    if cur.bump()? != '@' {
        return None;
    }
    cur.skip_whitespace();
    let kind_start = cur.pos;
    while cur
        .peek()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        cur.bump();
    }
    let kind = &cur.src[kind_start..cur.pos];
    if kind.is_empty() {
        return None;
    }
    cur.skip_whitespace();
    let open = cur.peek().filter(|c| *c == '{' || *c == '(')?;
    cur.bump();
    Some(EntryHead {
        kind,
        open,
        body: cur,
    })
}

fn parse_error(line: usize, message: impl Into<String>) -> PaperError {
    PaperError::Parse {
        line,
        message: message.into(),
    }
}

/// Advances past the delimiter that closes the entry and returns the byte
/// offset of that delimiter. Quotes are ignored when `track_quotes` is off,
/// as in `@comment` bodies.
fn scan_body(
    cur: &mut Cursor<'_>,
    open: char,
    track_quotes: bool,
    start_line: usize,
) -> Result<usize> {
    let mut depth = 0usize;
    let mut in_quote = false;
    while let Some(c) = cur.peek() {
        match c {
            '{' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            '}' if open == '{' && !in_quote => {
                let end = cur.pos;
                cur.bump();
                return Ok(end);
            }
            '}' => return Err(parse_error(cur.line, "unbalanced braces: unexpected '}'")),
            ')' if open == '(' && depth == 0 && !in_quote => {
                let end = cur.pos;
                cur.bump();
                return Ok(end);
            }
            '"' if depth == 0 && track_quotes => in_quote = !in_quote,
            _ => {}
        }
        cur.bump();
    }
    Err(parse_error(
        start_line,
        if in_quote {
            "unterminated quoted value"
        } else {
            "unbalanced braces: entry is never closed"
        },
    ))
}

/// Splits on `sep` where it occurs outside braces and quotes.
fn split_top_level(body: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '"' if depth == 0 => in_quote = !in_quote,
            c if c == sep && depth == 0 && !in_quote => {
                parts.push(&body[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '{' | '}' | '"' | '(' | ')' | ',' | '='))
}

fn parse_entry(kind: &str, open: char, body: &str, line: usize) -> Result<BibEntry> {
    let parts = split_top_level(body, ',');
    let citation_key = parts[0].trim();
    if citation_key.is_empty() || citation_key.contains('=') {
        return Err(parse_error(line, format!("@{kind} entry has no citation key")));
    }

    let rest = &parts[1..];
    let trailing_comma = rest.last().is_some_and(|p| p.trim().is_empty());
    let field_parts = if trailing_comma {
        &rest[..rest.len() - 1]
    } else {
        rest
    };

    let mut fields = Vec::with_capacity(field_parts.len());
    for part in field_parts {
        let (name, value) = part.split_once('=').ok_or_else(|| {
            parse_error(
                line,
                format!("field without '=' in entry {citation_key}: {}", part.trim()),
            )
        })?;
        let (name, value) = (name.trim(), value.trim());
        if !is_field_name(name) || value.is_empty() {
            return Err(parse_error(
                line,
                format!("malformed field in entry {citation_key}: {}", part.trim()),
            ));
        }
        fields.push(BibField {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    Ok(BibEntry {
        entry_type: kind.to_string(),
        citation_key: citation_key.to_string(),
        fields,
        parens: open == '(',
        trailing_comma,
    })
}

fn push_text(blocks: &mut Vec<Block>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        blocks.push(Block::Verbatim(text.to_string()));
    }
}

/// Parse a whole `.bib` file into blocks, preserving order.
pub fn parse_blocks(input: &str) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    let mut cur = Cursor::new(input);
    let mut text_start = 0;

    while let Some(c) = cur.peek() {
        if c == '@'
            && let Some(head) = scan_head(cur)
        {
            push_text(&mut blocks, &input[text_start..cur.pos]);
            let (start, start_line) = (cur.pos, cur.line);

            let kind = head.kind.to_ascii_lowercase();
            let mut body_cur = head.body;
            let body_end = scan_body(&mut body_cur, head.open, kind != "comment", start_line)?;
            let body = &input[head.body.pos..body_end];

            if VERBATIM_TYPES.contains(&kind.as_str()) {
                blocks.push(Block::Verbatim(input[start..body_cur.pos].to_string()));
            } else {
                blocks.push(Block::Entry(parse_entry(
                    head.kind, head.open, body, start_line,
                )?));
            }

            cur = body_cur;
            text_start = cur.pos;
            continue;
        }
        cur.bump();
    }
    push_text(&mut blocks, &input[text_start..]);

    Ok(blocks)
}

/// Removes one layer of `{...}` or `"..."` when it encloses the whole value.
pub fn strip_delimiters(value: &str) -> &str {
    let value = value.trim();
    let enclosed = if value.len() >= 2 && value.starts_with('{') && value.ends_with('}') {
        // `{a} # {b}` starts and ends with braces without being one group
        let mut depth = 0usize;
        value.char_indices().all(|(i, c)| {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            depth > 0 || i == value.len() - 1
        })
    } else {
        value.len() >= 2
            && value.starts_with('"')
            && value.ends_with('"')
            && !value[1..value.len() - 1].contains('"')
    };

    if enclosed {
        value[1..value.len() - 1].trim()
    } else {
        value
    }
}
