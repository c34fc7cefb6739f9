//! Canonical, syntax-aware content hashing.
//!
//! Produces stable fingerprints of file regions for optimistic locking and
//! trace records. Parseable source is reduced to a canonical token rendering
//! (comments stripped, whitespace collapsed) so that comment-only and
//! whitespace-only edits do not change the digest; anything else falls back
//! to a normalized-string hash.
//!
//! The canonicalizer is a language-agnostic lexer, not a real grammar: it
//! understands C-family tokens, `//`, `/* */`, and `#` comments, quoted
//! strings with escapes, and builds a span tree from balanced `{}`/`[]`/`()`
//! pairs. Digests are stable only within this canonicalizer.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 1-indexed, inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start_line: usize,
    pub end_line: usize,
}

impl LineRange {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }
}

/// Hashing strategy that produced a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashStrategy {
    /// Canonical token rendering of a parsed subtree.
    AstCanonical,
    /// Whitespace-normalized raw text.
    NormalizedString,
}

/// A content digest plus the canonical text it was computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHash {
    /// `sha256:` followed by lowercase hex.
    pub digest: String,
    pub strategy: HashStrategy,
    /// Retained for debugging and diff emission.
    pub canonical: String,
}

/// Hash a region of a file.
///
/// `source` is a label (typically the relative path) used only for trace
/// logging. `content` is the full current file text. When `range` is given,
/// the smallest parsed subtree enclosing it is hashed; otherwise the whole
/// file. `inserted` is the caller's proposed content, used as a fallback
/// locator when the range cannot be resolved against the parse tree.
pub fn hash_region(
    source: &str,
    content: &str,
    range: Option<LineRange>,
    inserted: Option<&str>,
) -> ContentHash {
    let hash = hash_region_inner(content, range, inserted);
    tracing::trace!(
        source,
        strategy = ?hash.strategy,
        digest = %hash.digest,
        "content hash computed"
    );
    hash
}

fn hash_region_inner(
    content: &str,
    range: Option<LineRange>,
    inserted: Option<&str>,
) -> ContentHash {
    match parse_source(content) {
        Some(parsed) => {
            let span = match range {
                None => Some((0, content.len())),
                Some(r) => byte_span_of_range(content, r)
                    .map(|(lo, hi)| smallest_enclosing_span(&parsed, content.len(), lo, hi)),
            };
            match span {
                Some((lo, hi)) => {
                    let rendered = render_canonical(content, &parsed.tokens, lo, hi);
                    let canonical = whitespace_sentinel(rendered, content);
                    finish(canonical, HashStrategy::AstCanonical)
                }
                None => {
                    // Range fell outside the parsed file. If the proposed
                    // content is verbatim-present (modulo whitespace), hash
                    // that; otherwise hash the whole file.
                    if let Some(ins) = inserted.filter(|s| !s.is_empty())
                        && collapse_whitespace(content).contains(&collapse_whitespace(ins))
                    {
                        normalized_hash(ins)
                    } else {
                        normalized_hash(content)
                    }
                }
            }
        }
        None => {
            let basis = inserted.filter(|s| !s.is_empty()).unwrap_or(content);
            normalized_hash(basis)
        }
    }
}

fn finish(canonical: String, strategy: HashStrategy) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = format!("sha256:{:x}", hasher.finalize());
    ContentHash {
        digest,
        strategy,
        canonical,
    }
}

fn normalized_hash(basis: &str) -> ContentHash {
    let canonical = whitespace_sentinel(normalize_text(basis), basis);
    finish(canonical, HashStrategy::NormalizedString)
}

/// CRLF to LF, per-line trailing whitespace trimmed, overall trim.
fn normalize_text(s: &str) -> String {
    let unix = s.replace("\r\n", "\n");
    unix.split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Whitespace-only (non-empty) input canonicalizes to a single newline so it
/// stays distinguishable from empty input while remaining invariant across
/// whitespace-only edits.
fn whitespace_sentinel(canonical: String, original: &str) -> String {
    if canonical.is_empty() && !original.is_empty() && original.trim().is_empty() {
        "\n".to_string()
    } else {
        canonical
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── lexical canonicalizer ──

#[derive(Debug, Clone, Copy)]
struct Token {
    start: usize,
    end: usize,
}

struct Parsed {
    tokens: Vec<Token>,
    /// Byte spans of balanced delimiter pairs, open byte to close byte + 1.
    spans: Vec<(usize, usize)>,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn closes(open: u8, close: u8) -> bool {
    matches!(
        (open, close),
        (b'(', b')') | (b'[', b']') | (b'{', b'}')
    )
}

/// Lex `content`; `None` means the input is not parseable as structured
/// source (unbalanced delimiters or an unterminated string/comment).
fn parse_source(content: &str) -> Option<Parsed> {
    let b = content.as_bytes();
    let len = b.len();
    let mut tokens = Vec::new();
    let mut spans = Vec::new();
    let mut stack: Vec<(u8, usize)> = Vec::new();
    let mut i = 0;

    while i < len {
        let c = b[i];
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'/' if b.get(i + 1) == Some(&b'/') => {
                while i < len && b[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if b.get(i + 1) == Some(&b'*') => {
                let close = content[i + 2..].find("*/")?;
                i = i + 2 + close + 2;
            }
            b'#' => {
                while i < len && b[i] != b'\n' {
                    i += 1;
                }
            }
            b'"' | b'\'' | b'`' => {
                let quote = c;
                let start = i;
                i += 1;
                loop {
                    if i >= len {
                        return None;
                    }
                    if b[i] == b'\\' {
                        i += 2;
                    } else if b[i] == quote {
                        i += 1;
                        break;
                    } else {
                        i += 1;
                    }
                }
                tokens.push(Token { start, end: i.min(len) });
            }
            b'(' | b'[' | b'{' => {
                stack.push((c, i));
                tokens.push(Token { start: i, end: i + 1 });
                i += 1;
            }
            b')' | b']' | b'}' => {
                let (open, open_at) = stack.pop()?;
                if !closes(open, c) {
                    return None;
                }
                spans.push((open_at, i + 1));
                tokens.push(Token { start: i, end: i + 1 });
                i += 1;
            }
            _ if is_word_byte(c) => {
                let start = i;
                while i < len && is_word_byte(b[i]) {
                    i += 1;
                }
                tokens.push(Token { start, end: i });
            }
            _ => {
                tokens.push(Token { start: i, end: i + 1 });
                i += 1;
            }
        }
    }

    if stack.is_empty() { Some(Parsed { tokens, spans }) } else { None }
}

/// Byte span of a 1-indexed inclusive line range, or `None` when the range
/// lies outside the content.
fn byte_span_of_range(content: &str, range: LineRange) -> Option<(usize, usize)> {
    if range.start_line == 0 || range.end_line < range.start_line {
        return None;
    }
    let mut starts = vec![0usize];
    for (i, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(i + 1);
        }
    }
    if range.start_line > starts.len() {
        return None;
    }
    let lo = starts[range.start_line - 1];
    let hi = if range.end_line >= starts.len() {
        content.len()
    } else {
        starts[range.end_line] - 1
    };
    Some((lo, hi))
}

/// The smallest delimiter span enclosing `[lo, hi]`, with the whole file as
/// the implicit root.
fn smallest_enclosing_span(
    parsed: &Parsed,
    content_len: usize,
    lo: usize,
    hi: usize,
) -> (usize, usize) {
    parsed
        .spans
        .iter()
        .filter(|(s, e)| *s <= lo && hi <= *e)
        .min_by_key(|(s, e)| e - s)
        .copied()
        .unwrap_or((0, content_len))
}

/// Render the tokens inside a span, separated by single spaces.
fn render_canonical(content: &str, tokens: &[Token], lo: usize, hi: usize) -> String {
    let mut out = String::new();
    for token in tokens {
        if token.start >= lo && token.end <= hi {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&content[token.start..token.end]);
        }
    }
    normalize_text(&out)
}
