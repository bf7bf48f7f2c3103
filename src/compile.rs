//! Corpus compilation: the full extracted-record set becomes the canonical
//! deduplicated, chronologically ordered dataset.
//!
//! Three passes, in this order on purpose:
//! 1. stable sort descending on the full tuple (timestamp, source_url,
//!    rent, sqft), which puts the most information-complete variant of a
//!    repeated line first within its snapshot/URL group;
//! 2. first-wins dedup on the identity key (timestamp, source_url,
//!    address, listing_text), so that variant is the one retained;
//! 3. stable sort ascending on (timestamp, source_url) for the persisted
//!    chronological output.

use std::collections::HashSet;

use anyhow::{bail, Result};
use tracing::info;

use crate::store::ExtractedListing;

/// Stands in for an unparsable or absent numeric so every comparison in
/// the provisional sort stays total. Lower than any real rent or area.
pub const SENTINEL: f64 = -1.0;

/// Numeric derivation for `monthly_rent`/`sqft`. Empty, malformed, and
/// non-finite input all fold into the sentinel; a parsed `0` stays `0.0`.
pub fn numeric_or_sentinel(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => SENTINEL,
    }
}

struct Ranked {
    rent: f64,
    sqft: f64,
    row: ExtractedListing,
}

fn identity_key(row: &ExtractedListing) -> (String, String, String, String) {
    (
        row.snapshot_timestamp.clone(),
        row.source_url.clone(),
        row.address.clone(),
        row.listing_text.clone(),
    )
}

pub fn compile(rows: Vec<ExtractedListing>) -> Result<Vec<ExtractedListing>> {
    if rows.is_empty() {
        bail!("no extracted listings to compile; run the extract step first");
    }
    let input_len = rows.len();

    let mut ranked: Vec<Ranked> = rows
        .into_iter()
        .map(|row| Ranked {
            rent: numeric_or_sentinel(&row.monthly_rent),
            sqft: numeric_or_sentinel(&row.sqft),
            row,
        })
        .collect();

    ranked.sort_by(|a, b| {
        (b.row.snapshot_timestamp.as_str(), b.row.source_url.as_str())
            .cmp(&(a.row.snapshot_timestamp.as_str(), a.row.source_url.as_str()))
            .then(b.rent.total_cmp(&a.rent))
            .then(b.sqft.total_cmp(&a.sqft))
    });

    let mut seen: HashSet<(String, String, String, String)> = HashSet::with_capacity(input_len);
    let mut deduped: Vec<ExtractedListing> = Vec::with_capacity(input_len);
    for ranked_row in ranked {
        if seen.insert(identity_key(&ranked_row.row)) {
            deduped.push(ranked_row.row);
        }
    }

    deduped.sort_by(|a, b| {
        (a.snapshot_timestamp.as_str(), a.source_url.as_str())
            .cmp(&(b.snapshot_timestamp.as_str(), b.source_url.as_str()))
    });

    info!(
        "Compiled {} canonical records from {} extracted rows",
        deduped.len(),
        input_len
    );
    Ok(deduped)
}
