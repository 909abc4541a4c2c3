//! Canonical line/page addressable view of a document.
//!
//! A [`LineIndex`] is built once per document from raw text carrying
//! `[PAGE:N]` markers, and is read-only thereafter. Marker lines and blank
//! lines are stripped from the addressable sequence; every remaining line
//! receives a dense 1-indexed line number and the page most recently seen.

use serde::{Deserialize, Serialize};

use crate::error::{LegisError, Result};
use crate::types::Citation;

/// Maximum length of a citation snippet, in characters.
const SNIPPET_MAX_CHARS: usize = 100;

/// One addressable line of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    /// 1-indexed, dense, sequential line number.
    pub line_num: u32,
    /// Source page the line appeared on (1-indexed).
    pub page: u32,
    /// Line text, without the trailing newline.
    pub text: String,
}

/// Immutable line/page index over a whole document.
///
/// All range queries are inclusive on both ends and fail with
/// [`LegisError::OutOfRange`] if `start > end` or either bound exceeds the
/// indexed extent. The index is safe for unlimited concurrent readers.
///
/// # Examples
///
/// ```rust
/// use legis_core::LineIndex;
///
/// let index = LineIndex::build("[PAGE:1]\nCHAPTER I\n\nPRELIMINARY").unwrap();
/// assert_eq!(index.len(), 2); // blank line never receives a number
/// assert_eq!(index.raw_text(1, 2).unwrap(), "CHAPTER I\nPRELIMINARY");
/// ```
#[derive(Debug, Clone)]
pub struct LineIndex {
    lines: Vec<LineRecord>,
    /// Digit count of the maximum line number; fixes the numbered-text gutter.
    width: usize,
}

impl LineIndex {
    /// Build an index from raw text with `[PAGE:N]` markers.
    ///
    /// The current page defaults to 1 until the first marker. Blank lines
    /// and marker lines are skipped and never receive a line number.
    ///
    /// # Errors
    ///
    /// Returns [`LegisError::MalformedPageMarker`] if a line starting with
    /// `[PAGE:` cannot be parsed as `[PAGE:<number>]`. Indexing errors are
    /// fatal; no partial index is produced.
    pub fn build(raw: &str) -> Result<Self> {
        let mut lines = Vec::new();
        let mut current_page: u32 = 1;
        let mut line_num: u32 = 0;

        for line in raw.split('\n') {
            let trimmed = line.trim();

            if trimmed.starts_with("[PAGE:") {
                current_page = parse_page_marker(trimmed)?;
                continue;
            }

            if trimmed.is_empty() {
                continue;
            }

            line_num += 1;
            lines.push(LineRecord {
                line_num,
                page: current_page,
                text: line.to_string(),
            });
        }

        let width = digits(lines.len() as u32);
        Ok(Self { lines, width })
    }

    /// Number of addressable lines.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if the document had no addressable lines.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The full inclusive extent `(first_line, last_line)`, or `None` for an
    /// empty index.
    #[must_use]
    pub fn bounds(&self) -> Option<(u32, u32)> {
        if self.lines.is_empty() {
            None
        } else {
            Some((1, self.lines.len() as u32))
        }
    }

    /// Ordered records for the inclusive range `start..=end`.
    pub fn slice(&self, start: u32, end: u32) -> Result<&[LineRecord]> {
        self.check_range(start, end)?;
        Ok(&self.lines[(start - 1) as usize..end as usize])
    }

    /// Render a range as right-aligned `line_num| text`, one record per
    /// line. The gutter width is the digit count of the index's maximum
    /// line number, so slices from the same document align identically.
    ///
    /// ```text
    ///   1| CHAPTER I
    ///   2| PRELIMINARY
    /// 456| (b) any other matter...
    /// ```
    pub fn numbered_text(&self, start: u32, end: u32) -> Result<String> {
        let records = self.slice(start, end)?;
        let width = self.width;
        let rendered: Vec<String> = records
            .iter()
            .map(|r| format!("{:>width$}| {}", r.line_num, r.text))
            .collect();
        Ok(rendered.join("\n"))
    }

    /// Raw text for a range, joined by newlines, without numbering.
    pub fn raw_text(&self, start: u32, end: u32) -> Result<String> {
        let records = self.slice(start, end)?;
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        Ok(texts.join("\n"))
    }

    /// Source page of a single line.
    pub fn page_of(&self, line_num: u32) -> Result<u32> {
        self.check_range(line_num, line_num)?;
        Ok(self.lines[(line_num - 1) as usize].page)
    }

    /// `(first_page, last_page)` for a range.
    pub fn page_range(&self, start: u32, end: u32) -> Result<(u32, u32)> {
        self.check_range(start, end)?;
        Ok((self.page_of(start)?, self.page_of(end)?))
    }

    /// Build a [`Citation`] for a range: start page plus a bounded snippet
    /// of the first line, for human review only.
    pub fn citation_for(&self, start: u32, end: u32) -> Result<Citation> {
        let records = self.slice(start, end)?;
        let first = records[0].text.trim();
        let mut snippet: String = first.chars().take(SNIPPET_MAX_CHARS).collect();
        if first.chars().count() > SNIPPET_MAX_CHARS {
            snippet.push_str("...");
        }
        Ok(Citation {
            page: records[0].page,
            start_line: start,
            end_line: end,
            snippet,
        })
    }

    fn check_range(&self, start: u32, end: u32) -> Result<()> {
        let max = self.lines.len() as u32;
        if start == 0 || end == 0 || start > end || end > max {
            return Err(LegisError::OutOfRange { start, end, max });
        }
        Ok(())
    }
}

/// Parse a `[PAGE:N]` marker line into its page number.
fn parse_page_marker(line: &str) -> Result<u32> {
    let malformed = || LegisError::MalformedPageMarker(line.to_string());
    let inner = line
        .strip_prefix("[PAGE:")
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(malformed)?;
    inner.parse::<u32>().map_err(|_| malformed())
}

fn digits(mut n: u32) -> usize {
    if n == 0 {
        return 1;
    }
    let mut count = 0;
    while n > 0 {
        n /= 10;
        count += 1;
    }
    count
}
