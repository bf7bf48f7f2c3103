//! On-disk artifact layout and I/O for every pipeline stage.
//!
//! All paths resolve under one data directory (`NOHO_DATA_DIR` overrides the
//! default `data/`). Stages hand records to each other only through these
//! files: checkpoint tables from discovery, the retrieval manifest from the
//! fetcher, and the two listing CSVs from extraction and compilation.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub fn data_dir() -> PathBuf {
    match env::var("NOHO_DATA_DIR") {
        Ok(p) => PathBuf::from(p),
        Err(_) => PathBuf::from("data"),
    }
}

pub fn default_checkpoints_csv() -> PathBuf {
    data_dir().join("raw/cdx/checkpoints.csv")
}

pub fn default_checkpoints_json() -> PathBuf {
    data_dir().join("raw/cdx/checkpoints.json")
}

pub fn default_html_dir() -> PathBuf {
    data_dir().join("raw/html")
}

pub fn default_index_json() -> PathBuf {
    data_dir().join("raw/html/index.json")
}

pub fn default_extracted_csv() -> PathBuf {
    data_dir().join("intermediate/extracted_listings.csv")
}

pub fn default_final_csv() -> PathBuf {
    data_dir().join("final/historical_rentnoho_listings.csv")
}

/// One archived capture of a page, as reported by the CDX index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp: String,
    pub original: String,
    pub mimetype: String,
    pub statuscode: String,
    pub digest: String,
    pub length: String,
}

/// One fetch attempt recorded in the retrieval manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub timestamp: String,
    pub original: String,
    pub snapshot_url: String,
    pub local_file: String,
    pub status: String,
    pub error: String,
    pub bytes: u64,
}

/// One listing-like record pulled from a snapshot line.
///
/// Field order here is the column order of both listing CSVs. Optional
/// fields hold `""` when their pattern did not match, never an absent
/// column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedListing {
    pub snapshot_timestamp: String,
    pub snapshot_date: String,
    pub source_url: String,
    pub snapshot_url: String,
    pub address: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub sqft: String,
    pub monthly_rent: String,
    pub listing_text: String,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

pub fn write_checkpoints(
    csv_path: &Path,
    json_path: &Path,
    checkpoints: &[Checkpoint],
) -> Result<()> {
    ensure_parent(csv_path)?;
    let mut writer = csv::Writer::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    for cp in checkpoints {
        writer.serialize(cp)?;
    }
    writer.flush()?;

    ensure_parent(json_path)?;
    let json = serde_json::to_string_pretty(checkpoints)?;
    fs::write(json_path, json)
        .with_context(|| format!("failed to write {}", json_path.display()))?;
    Ok(())
}

pub fn read_checkpoints(csv_path: &Path) -> Result<Vec<Checkpoint>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut checkpoints = Vec::new();
    for row in reader.deserialize() {
        checkpoints.push(row.with_context(|| format!("bad row in {}", csv_path.display()))?);
    }
    Ok(checkpoints)
}

pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(entries)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("bad manifest JSON in {}", path.display()))
}

pub fn write_listings(path: &Path, rows: &[ExtractedListing]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_listings(path: &Path) -> Result<Vec<ExtractedListing>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.with_context(|| format!("bad row in {}", path.display()))?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("noho_store_{}_{}", std::process::id(), name))
    }

    fn sample_listing() -> ExtractedListing {
        ExtractedListing {
            snapshot_timestamp: "20200101120000".into(),
            snapshot_date: "2020-01-01".into(),
            source_url: "http://rentnoho.com/units".into(),
            snapshot_url: "https://web.archive.org/web/20200101120000id_/http://rentnoho.com/units".into(),
            address: "123 Main St".into(),
            bedrooms: "2".into(),
            bathrooms: "1".into(),
            sqft: "".into(),
            monthly_rent: "1500".into(),
            listing_text: "2 Bed / 1 Bath $1,500 123 Main St".into(),
        }
    }

    #[test]
    fn listings_roundtrip() {
        let path = temp_path("listings.csv");
        let rows = vec![sample_listing()];
        write_listings(&path, &rows).unwrap();
        let read = read_listings(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(read, rows);
    }

    #[test]
    fn listings_keep_empty_optional_fields() {
        let path = temp_path("empty_fields.csv");
        let mut row = sample_listing();
        row.address = String::new();
        row.bedrooms = String::new();
        write_listings(&path, &[row.clone()]).unwrap();
        let read = read_listings(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(read[0].address, "");
        assert_eq!(read[0].bedrooms, "");
        assert_eq!(read[0].monthly_rent, "1500");
    }

    #[test]
    fn manifest_roundtrip() {
        let path = temp_path("index.json");
        let entries = vec![ManifestEntry {
            timestamp: "20200101120000".into(),
            original: "http://rentnoho.com/".into(),
            snapshot_url: "https://web.archive.org/web/20200101120000id_/http://rentnoho.com/"
                .into(),
            local_file: "data/raw/html/20200101120000_abcdef0123.html".into(),
            status: "ok".into(),
            error: "".into(),
            bytes: 4096,
        }];
        write_manifest(&path, &entries).unwrap();
        let read = read_manifest(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].status, "ok");
        assert_eq!(read[0].bytes, 4096);
    }

    #[test]
    fn data_dir_env_override() {
        // Serialized by the test name; no other test touches NOHO_DATA_DIR.
        env::set_var("NOHO_DATA_DIR", "/tmp/noho_custom");
        assert_eq!(data_dir(), PathBuf::from("/tmp/noho_custom"));
        assert_eq!(
            default_extracted_csv(),
            PathBuf::from("/tmp/noho_custom/intermediate/extracted_listings.csv")
        );
        env::remove_var("NOHO_DATA_DIR");
        assert_eq!(data_dir(), PathBuf::from("data"));
    }
}
