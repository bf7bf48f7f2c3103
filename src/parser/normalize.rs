//! Markup → candidate lines.
//!
//! Script and style regions go first (their bodies can contain stray `<`
//! characters that would corrupt tag removal), then every remaining tag
//! becomes a newline so text nodes separated by removed tags never merge
//! into one line. Entities are decoded, whitespace collapsed, and short
//! lines dropped as noise.

use std::sync::LazyLock;

use html_escape::decode_html_entities;
use regex::Regex;

/// Trimmed lines shorter than this are bare punctuation or single words.
const MIN_LINE_LEN: usize = 8;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script.*?>.*?</script>").unwrap());
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style.*?>.*?</style>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

pub fn html_to_lines(html: &str) -> Vec<String> {
    let cleaned = SCRIPT_RE.replace_all(html, " ");
    let cleaned = STYLE_RE.replace_all(&cleaned, " ");
    let cleaned = TAG_RE.replace_all(&cleaned, "\n");
    let decoded = decode_html_entities(cleaned.as_ref());

    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| line.len() >= MIN_LINE_LEN)
        .collect()
}
