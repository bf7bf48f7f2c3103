//! Snapshot retrieval: raw captures from web.archive.org into the local
//! content store, every attempt recorded in the manifest.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::store::{Checkpoint, ManifestEntry};

// archive.org rate-limits aggressively; keep the request footprint small.
const CONCURRENCY: usize = 4;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const REQUEST_TIMEOUT_SECS: u64 = 60;

pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub cached: usize,
    pub errors: usize,
}

/// Archived-page URL with the `id_` flag, which serves the raw capture
/// without the Wayback toolbar markup.
pub fn snapshot_url(timestamp: &str, original: &str) -> String {
    format!("https://web.archive.org/web/{}id_/{}", timestamp, original)
}

/// Stable local filename: timestamp plus a short digest of the original URL.
pub fn local_name(timestamp: &str, original: &str) -> String {
    let digest = format!("{:x}", md5::compute(original.as_bytes()));
    format!("{}_{}.html", timestamp, &digest[..10])
}

/// Download every checkpoint's capture, skipping files already present in
/// the content store. Fetch failures become `error` manifest entries and
/// never abort the run.
pub async fn fetch_snapshots(
    mut checkpoints: Vec<Checkpoint>,
    out_dir: &Path,
    delay_ms: u64,
    max: Option<usize>,
) -> Result<(Vec<ManifestEntry>, FetchStats)> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create directory {}", out_dir.display()))?;
    if let Some(cap) = max {
        checkpoints.truncate(cap);
    }
    let total = checkpoints.len();

    let client = reqwest::Client::builder()
        .user_agent(crate::USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send results, main loop accounts and collects.
    let (tx, mut rx) = tokio::sync::mpsc::channel::<(ManifestEntry, bool)>(CONCURRENCY * 2);

    for cp in checkpoints {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let target = out_dir.join(local_name(&cp.timestamp, &cp.original));

        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let result = fetch_one(&client, &cp, &target, delay_ms).await;
            let _ = tx.send(result).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut manifest = Vec::with_capacity(total);
    let mut ok = 0usize;
    let mut cached = 0usize;
    let mut errors = 0usize;

    while let Some((entry, was_cached)) = rx.recv().await {
        if entry.status != "ok" {
            errors += 1;
        } else if was_cached {
            cached += 1;
        } else {
            ok += 1;
        }
        manifest.push(entry);
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Fetched {} snapshots ({} ok, {} cached, {} errors)",
        total, ok, cached, errors
    );

    // Completion order is arbitrary; keep the manifest deterministic.
    manifest.sort_by(|a, b| {
        (a.timestamp.as_str(), a.original.as_str()).cmp(&(b.timestamp.as_str(), b.original.as_str()))
    });

    Ok((
        manifest,
        FetchStats {
            total,
            ok,
            cached,
            errors,
        },
    ))
}

/// Second element is true when the file came from the local cache.
async fn fetch_one(
    client: &reqwest::Client,
    cp: &Checkpoint,
    target: &Path,
    delay_ms: u64,
) -> (ManifestEntry, bool) {
    let url = snapshot_url(&cp.timestamp, &cp.original);

    // Already downloaded on a previous run.
    if let Ok(meta) = std::fs::metadata(target) {
        if meta.len() > 0 {
            return (entry_ok(cp, &url, target, meta.len()), true);
        }
    }

    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    match fetch_with_retry(client, &url).await {
        Ok(body) => match std::fs::write(target, &body) {
            Ok(()) => (entry_ok(cp, &url, target, body.len() as u64), false),
            Err(e) => (
                entry_err(cp, &url, target, format!("write failed: {}", e)),
                false,
            ),
        },
        Err(e) => {
            warn!("Fetch failed for {}: {:#}", url, e);
            (entry_err(cp, &url, target, format!("{:#}", e)), false)
        }
    }
}

async fn fetch_with_retry(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let mut attempt = 0u32;
    loop {
        let err = match client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp
                        .bytes()
                        .await
                        .context("failed to read response body")?
                        .to_vec());
                }
                let transient = status.as_u16() == 429 || status.is_server_error();
                if !transient {
                    bail!("HTTP {}", status);
                }
                anyhow::anyhow!("HTTP {}", status)
            }
            Err(e) => anyhow::Error::new(e),
        };

        if attempt >= MAX_RETRIES {
            return Err(err);
        }
        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Transient failure on {} (attempt {}/{}), backing off {:.1}s: {}",
            url,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64(),
            err
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

fn entry_ok(cp: &Checkpoint, url: &str, target: &Path, bytes: u64) -> ManifestEntry {
    ManifestEntry {
        timestamp: cp.timestamp.clone(),
        original: cp.original.clone(),
        snapshot_url: url.to_string(),
        local_file: target.display().to_string(),
        status: "ok".to_string(),
        error: String::new(),
        bytes,
    }
}

fn entry_err(cp: &Checkpoint, url: &str, target: &Path, error: String) -> ManifestEntry {
    ManifestEntry {
        timestamp: cp.timestamp.clone(),
        original: cp.original.clone(),
        snapshot_url: url.to_string(),
        local_file: target.display().to_string(),
        status: "error".to_string(),
        error,
        bytes: 0,
    }
}
