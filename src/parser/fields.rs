//! Per-line field matchers.
//!
//! Five independent patterns, first match per pattern wins. A line becomes
//! a record only when money, bedrooms, bathrooms, or area matched; an
//! address alone is too common a false positive. The patterns are
//! deliberately permissive — unrelated prices do get through and are only
//! reduced by the compile stage's dedup.

use std::sync::LazyLock;

use regex::Regex;

static MONEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\s?([\d,]{3,})").unwrap());
static BED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:bed|br)\b").unwrap());
static BATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:bath|ba)\b").unwrap());
static SQFT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([\d,]{3,5})\s*(?:sq\.?\s?ft|square\s*feet|sf)\b").unwrap());
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b\d{1,5}\s+[\w\s.]+\s(?:st|street|ave|avenue|rd|road|dr|drive|ln|lane|ct|court|pl|place|way|blvd|boulevard)\b",
    )
    .unwrap()
});

/// Fields matched on one candidate line. Unmatched fields are `""`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineFields {
    pub monthly_rent: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub sqft: String,
    pub address: String,
}

/// Run every matcher over the line; `None` when the emit gate fails.
pub fn extract_line(line: &str) -> Option<LineFields> {
    let money = MONEY_RE.captures(line);
    let bed = BED_RE.captures(line);
    let bath = BATH_RE.captures(line);
    let sqft = SQFT_RE.captures(line);
    let addr = ADDRESS_RE.find(line);

    if money.is_none() && bed.is_none() && bath.is_none() && sqft.is_none() {
        return None;
    }

    Some(LineFields {
        monthly_rent: money
            .map(|c| c[1].replace(',', ""))
            .unwrap_or_default(),
        bedrooms: bed.map(|c| c[1].to_string()).unwrap_or_default(),
        bathrooms: bath.map(|c| c[1].to_string()).unwrap_or_default(),
        sqft: sqft.map(|c| c[1].replace(',', "")).unwrap_or_default(),
        address: addr.map(|m| m.as_str().to_string()).unwrap_or_default(),
    })
}
