//! Reversible line encoding for table rows.
//!
//! A row is written as one line of tab-separated tokens. Backslash,
//! newline, tab, carriage return and single quote inside a value are
//! escaped so a line never contains a raw delimiter or line break that
//! came from the data.
//!
//! Encoding joins the values with a two-character sentinel first and then
//! escapes the joined string in a single pass, turning each sentinel into
//! the real tab on the way. One pass per row instead of one per cell.
//! A value that itself contains the sentinel, or ends in its first
//! character, does not survive the round trip.
//!
//! Values are bytes. Bytes that do not form valid UTF-8 (binary columns)
//! are written as `\xHH`, so every line is text and every value comes
//! back bit for bit.

use crate::models::NULL_SENTINEL;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

/// Default join sentinel.
pub const DEFAULT_SENTINEL: &str = "||";

/// Field delimiter in encoded lines.
pub const DELIMITER: char = '\t';

/// Lines starting with this character are comments on read.
pub const COMMENT_PREFIX: char = '#';

/// Stateless encoder/decoder for TSV lines.
///
/// Built once per run and shared by reference between exporters and
/// restorers.
#[derive(Debug, Clone)]
pub struct LineCodec {
    sentinel: String,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }
}

impl LineCodec {
    /// Creates a codec with a custom join sentinel.
    ///
    /// # Errors
    /// The sentinel must be non-empty and must not contain a character the
    /// escaper rewrites.
    pub fn with_sentinel(sentinel: impl Into<String>) -> crate::Result<Self> {
        let sentinel = sentinel.into();
        if sentinel.is_empty() {
            return Err(crate::DbTsvError::configuration("sentinel cannot be empty"));
        }
        if sentinel.chars().any(needs_escape) {
            return Err(crate::DbTsvError::configuration(
                "sentinel cannot contain backslash, quote, tab or line breaks",
            ));
        }
        Ok(Self { sentinel })
    }

    /// The join sentinel in use.
    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Encodes a row of values into one line (without terminator).
    pub fn encode<S: AsRef<[u8]>>(&self, values: &[S]) -> String {
        let capacity = values
            .iter()
            .map(|v| v.as_ref().len().saturating_add(self.sentinel.len()))
            .sum::<usize>();
        let mut joined = Vec::with_capacity(capacity);
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                joined.extend_from_slice(self.sentinel.as_bytes());
            }
            joined.extend_from_slice(value.as_ref());
        }
        self.escape_joined(&joined)
    }

    /// Escapes a sentinel-joined row, replacing sentinels with tabs.
    fn escape_joined(&self, joined: &[u8]) -> String {
        let mut out = String::with_capacity(joined.len().saturating_add(joined.len() / 8));
        if joined.first().is_some_and(|b| char::from(*b) == COMMENT_PREFIX) {
            out.push('\\');
        }
        // the sentinel is valid UTF-8, so it never straddles a chunk
        for chunk in joined.utf8_chunks() {
            self.escape_text(chunk.valid(), &mut out);
            for byte in chunk.invalid() {
                let _ = write!(out, "\\x{:02x}", byte);
            }
        }
        out
    }

    fn escape_text(&self, text: &str, out: &mut String) {
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            if rest.starts_with(self.sentinel.as_str()) {
                out.push(DELIMITER);
                rest = &rest[self.sentinel.len()..];
                continue;
            }
            match c {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                '\r' => out.push_str("\\r"),
                '\'' => out.push_str("\\'"),
                other => out.push(other),
            }
            rest = &rest[c.len_utf8()..];
        }
    }

    /// Decodes one line into its values.
    pub fn decode(&self, line: &str) -> Vec<Vec<u8>> {
        line.split(DELIMITER).map(unescape).collect()
    }

    /// Builds the header line for a column list.
    ///
    /// Names are written as they are, except that a leading `#` is
    /// escaped so the reader does not take the header for a comment.
    /// [`header_names`] undoes that on read.
    pub fn header<S: AsRef<str>>(&self, columns: &[S]) -> String {
        let line = columns
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(&DELIMITER.to_string());
        if line.starts_with(COMMENT_PREFIX) {
            format!("\\{}", line)
        } else {
            line
        }
    }
}

/// Column names from a header record read back from a file.
pub fn header_names(mut record: Vec<String>) -> Vec<String> {
    if let Some(first) = record.first_mut()
        && first.starts_with("\\#")
    {
        first.remove(0);
    }
    record
}

fn needs_escape(c: char) -> bool {
    matches!(c, '\\' | '\n' | '\t' | '\r' | '\'')
}

/// Reverses the escaping of a single token.
///
/// `\xHH` yields the raw byte, so the result may be binary. Unknown
/// escape sequences are kept verbatim so hand-edited files load.
pub fn unescape(token: &str) -> Vec<u8> {
    let bytes = token.as_bytes();
    if !bytes.contains(&b'\\') {
        return bytes.to_vec();
    }
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        i = i.saturating_add(1);
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let Some(&next) = bytes.get(i) else {
            out.push(b'\\');
            break;
        };
        let simple = match next {
            b'\\' => Some(b'\\'),
            b'n' => Some(b'\n'),
            b't' => Some(b'\t'),
            b'r' => Some(b'\r'),
            b'\'' => Some(b'\''),
            b'#' => Some(b'#'),
            _ => None,
        };
        if let Some(decoded) = simple {
            out.push(decoded);
            i = i.saturating_add(1);
            continue;
        }
        let hex = bytes.get(i.saturating_add(1)..i.saturating_add(3));
        if next == b'x'
            && let Some(byte) = hex.and_then(hex_byte)
        {
            out.push(byte);
            i = i.saturating_add(3);
            continue;
        }
        // unknown sequence: keep the backslash, the next byte follows as is
        out.push(b'\\');
    }
    out
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    if !pair.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    u8::from_str_radix(std::str::from_utf8(pair).ok()?, 16).ok()
}

/// True when a decoded field is the null sentinel.
pub fn is_null_token(value: &str) -> bool {
    value == NULL_SENTINEL
}

/// Permissive reader over a table file.
///
/// Yields records split on tabs. Blank lines and lines starting with `#`
/// are skipped, a trailing carriage return is dropped and quotes carry no
/// meaning.
pub struct TsvReader {
    path: PathBuf,
    lines: Lines<BufReader<tokio::fs::File>>,
    line_number: u64,
}

impl TsvReader {
    /// Opens a table file for reading.
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_number: 0,
        })
    }

    /// The file being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line number of the most recently read line (1-based).
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Returns the next raw record, still escaped, split into tokens.
    ///
    /// `Ok(None)` at end of file. An I/O error (including invalid UTF-8)
    /// is returned for the offending line; reading may continue after it.
    pub async fn next_record(&mut self) -> std::io::Result<Option<Vec<String>>> {
        loop {
            let next = self.lines.next_line().await;
            self.line_number = self.line_number.saturating_add(1);
            let Some(line) = next? else {
                return Ok(None);
            };
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
                continue;
            }
            return Ok(Some(line.split(DELIMITER).map(str::to_string).collect()));
        }
    }
}
