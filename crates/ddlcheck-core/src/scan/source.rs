//! Source text with comments masked out and a line index

use crate::error::Span;

/// A piece of the script: a whole line, or text that starts on line `number`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine<'s> {
    /// Line number (1-indexed)
    pub number: usize,
    /// Byte offset of `text` from start of source
    pub offset: usize,
    pub text: &'s str,
}

/// A `;`-terminated statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement<'s> {
    pub offset: usize,
    pub text: &'s str,
}

/// DDL text prepared for scanning.
///
/// Comments are replaced by spaces so patterns never match inside them, while
/// every byte offset and line break stays where it was in the input.
#[derive(Debug, Clone)]
pub struct SourceText {
    text: String,
    /// (start, end) byte range of each line, excluding the terminator
    lines: Vec<(usize, usize)>,
}

impl SourceText {
    pub fn new(sql: &str) -> Self {
        let text = mask_comments(sql);
        let lines = line_ranges(&text);
        Self { text, lines }
    }

    /// The comment-free text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Iterate over all lines
    pub fn lines(&self) -> impl Iterator<Item = SourceLine<'_>> {
        self.lines
            .iter()
            .enumerate()
            .map(move |(i, &(start, end))| SourceLine {
                number: i + 1,
                offset: start,
                text: &self.text[start..end],
            })
    }

    /// Line number (1-indexed) containing the byte offset
    pub fn line_of(&self, offset: usize) -> usize {
        match self.lines.binary_search_by(|&(start, _)| start.cmp(&offset)) {
            Ok(i) => i + 1,
            Err(0) => 1,
            Err(i) => i,
        }
    }

    /// Build a span for `length` bytes starting at `offset`
    pub fn span_at(&self, offset: usize, length: usize) -> Span {
        let line = self.line_of(offset);
        let line_start = self
            .lines
            .get(line.saturating_sub(1))
            .map(|&(start, _)| start)
            .unwrap_or(0);
        let column = self.text[line_start..offset.min(self.text.len())]
            .chars()
            .count()
            + 1;
        Span {
            offset,
            length,
            line,
            column,
        }
    }

    /// Span covering a line or line fragment
    pub fn span_of(&self, line: &SourceLine<'_>) -> Span {
        self.span_at(line.offset, line.text.len())
    }

    /// Split into `;`-separated statements
    pub fn statements(&self) -> Vec<Statement<'_>> {
        split_sql_statements(&self.text)
    }
}

/// Byte ranges of lines; accepts `\n`, `\r\n` and a lone `\r` as terminators
fn line_ranges(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                ranges.push((start, i));
                i += 1;
                start = i;
            }
            b'\r' => {
                ranges.push((start, i));
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }

    if start < bytes.len() {
        ranges.push((start, bytes.len()));
    }

    ranges
}

/// Replace `--` and `/* */` comments with spaces, keeping line breaks and
/// byte offsets intact. Quoted text is left alone.
fn mask_comments(sql: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        SingleQuote,
        DoubleQuote,
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(sql.len());
    let mut state = State::Code;
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            State::Code => match ch {
                '\'' => {
                    state = State::SingleQuote;
                    out.push(ch);
                }
                '"' => {
                    state = State::DoubleQuote;
                    out.push(ch);
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    state = State::LineComment;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                _ => out.push(ch),
            },
            State::SingleQuote => {
                if ch == '\'' {
                    state = State::Code;
                }
                out.push(ch);
            }
            State::DoubleQuote => {
                if ch == '"' {
                    state = State::Code;
                }
                out.push(ch);
            }
            State::LineComment => {
                if ch == '\n' || ch == '\r' {
                    state = State::Code;
                    out.push(ch);
                } else {
                    blank(&mut out, ch);
                }
            }
            State::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else if ch == '\n' || ch == '\r' {
                    out.push(ch);
                } else {
                    blank(&mut out, ch);
                }
            }
        }
    }

    out
}

/// Push as many spaces as `ch` occupies in UTF-8
fn blank(out: &mut String, ch: char) {
    for _ in 0..ch.len_utf8() {
        out.push(' ');
    }
}

/// Split SQL text into statements on `;`, respecting quoted strings and
/// dollar-quoted bodies. Expects comments to be masked already.
fn split_sql_statements(sql: &str) -> Vec<Statement<'_>> {
    let mut statements = Vec::new();
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut start = 0;
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'\'' | b'"' => {
                // Skip quoted text; a doubled quote is an escape and just
                // re-enters the same loop
                let quote = bytes[i];
                i += 1;
                while i < len && bytes[i] != quote {
                    i += 1;
                }
                i += 1;
            }
            b'$' => {
                if let Some(tag_end) = find_dollar_tag_end(sql, i) {
                    let tag = &sql[i..=tag_end];
                    i = tag_end + 1;
                    if let Some(close_pos) = sql[i..].find(tag) {
                        i += close_pos + tag.len();
                    } else {
                        i = len;
                    }
                } else {
                    i += 1;
                }
            }
            b';' => {
                push_statement(sql, start, i, &mut statements);
                start = i + 1;
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    if start < len {
        push_statement(sql, start, len, &mut statements);
    }

    statements
}

fn push_statement<'s>(sql: &'s str, from: usize, to: usize, statements: &mut Vec<Statement<'s>>) {
    let text = &sql[from..to];
    if !text.trim().is_empty() {
        statements.push(Statement { offset: from, text });
    }
}

/// Find the end of a dollar-quote tag starting at position `start`.
/// Returns the index of the closing `$` if a valid tag is found.
fn find_dollar_tag_end(sql: &str, start: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut i = start + 1;
    if i < len && bytes[i] == b'$' {
        return Some(i);
    }
    while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    if i < len && bytes[i] == b'$' && i > start + 1 {
        Some(i)
    } else {
        None
    }
}
