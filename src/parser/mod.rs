pub mod fields;
pub mod normalize;

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::store::{ExtractedListing, ManifestEntry};

/// Calendar date derived from a 14-digit archive timestamp.
///
/// A timestamp that is not strict `YYYYMMDDhhmmss` is a contract violation
/// by the discovery stage and aborts the run.
pub fn snapshot_date(timestamp: &str) -> Result<String> {
    let dt = NaiveDateTime::parse_from_str(timestamp, "%Y%m%d%H%M%S")
        .with_context(|| format!("malformed snapshot timestamp {:?}", timestamp))?;
    Ok(dt.date().to_string())
}

/// Two-pass pipeline for one retrieved page: markup → candidate lines →
/// listing records with provenance attached.
///
/// Repeated lines within the page collapse to one record keyed on the
/// normalized text; the last-seen match wins. Output order carries no
/// meaning.
pub fn parse_snapshot(entry: &ManifestEntry, html: &str) -> Result<Vec<ExtractedListing>> {
    let date = snapshot_date(&entry.timestamp)?;

    let mut by_text: HashMap<String, ExtractedListing> = HashMap::new();
    for line in normalize::html_to_lines(html) {
        let Some(f) = fields::extract_line(&line) else {
            continue;
        };
        by_text.insert(
            line.clone(),
            ExtractedListing {
                snapshot_timestamp: entry.timestamp.clone(),
                snapshot_date: date.clone(),
                source_url: entry.original.clone(),
                snapshot_url: entry.snapshot_url.clone(),
                address: f.address,
                bedrooms: f.bedrooms,
                bathrooms: f.bathrooms,
                sqft: f.sqft,
                monthly_rent: f.monthly_rent,
                listing_text: line,
            },
        );
    }

    Ok(by_text.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: &str) -> ManifestEntry {
        ManifestEntry {
            timestamp: timestamp.to_string(),
            original: "http://rentnoho.com/availability".into(),
            snapshot_url: format!(
                "https://web.archive.org/web/{}id_/http://rentnoho.com/availability",
                timestamp
            ),
            local_file: String::new(),
            status: "ok".into(),
            error: String::new(),
            bytes: 0,
        }
    }

    #[test]
    fn snapshot_date_from_timestamp() {
        assert_eq!(snapshot_date("20161103094217").unwrap(), "2016-11-03");
    }

    #[test]
    fn malformed_timestamp_is_fatal() {
        assert!(snapshot_date("2016-11-03").is_err());
        assert!(snapshot_date("2016110309421").is_err()); // 13 digits
        assert!(snapshot_date("20161399094217").is_err()); // month 13
        assert!(parse_snapshot(&entry("not-a-timestamp"), "<p>Studio $900 now</p>").is_err());
    }

    #[test]
    fn attaches_provenance_to_every_record() {
        let e = entry("20200101120000");
        let rows =
            parse_snapshot(&e, "<li>Unit 4: 1 bed 1 bath $1,350</li><li>Studio $900 ready</li>")
                .unwrap();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.snapshot_timestamp, "20200101120000");
            assert_eq!(row.snapshot_date, "2020-01-01");
            assert_eq!(row.source_url, e.original);
            assert_eq!(row.snapshot_url, e.snapshot_url);
        }
    }

    #[test]
    fn repeated_lines_collapse_within_page() {
        let html = "<li>Studio $900 ready</li><p>filler text here</p><li>Studio $900 ready</li>";
        let rows = parse_snapshot(&entry("20200101120000"), html).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].listing_text, "Studio $900 ready");
    }

    #[test]
    fn unmatched_lines_emit_nothing() {
        let html = "<p>About the neighborhood</p><p>Contact our office anytime</p>";
        let rows = parse_snapshot(&entry("20200101120000"), html).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn availability_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/availability.html").unwrap();
        let rows = parse_snapshot(&entry("20161103094217"), &html).unwrap();

        // Three listing lines survive; nav, script, and style junk do not.
        assert_eq!(rows.len(), 3, "got: {:#?}", rows);
        let unit_a = rows
            .iter()
            .find(|r| r.listing_text.contains("Unit A"))
            .unwrap();
        assert_eq!(unit_a.bedrooms, "2");
        assert_eq!(unit_a.bathrooms, "1");
        assert_eq!(unit_a.monthly_rent, "1500");
        assert_eq!(unit_a.sqft, "850");
        let studio = rows
            .iter()
            .find(|r| r.listing_text.contains("Studio"))
            .unwrap();
        assert_eq!(studio.monthly_rent, "995");
        assert!(rows.iter().all(|r| r.snapshot_date == "2016-11-03"));
    }
}
