//! Checkpoint discovery against the Wayback CDX index.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::store::Checkpoint;

const CDX_URL: &str = "https://web.archive.org/cdx/search/cdx";

pub struct DiscoverOptions {
    pub domain: String,
    pub from_year: Option<String>,
    pub to_year: Option<String>,
    pub limit: Option<usize>,
}

/// Query the CDX index for every distinct-content HTML capture of the
/// domain and return the checkpoint rows.
pub async fn discover(opts: &DiscoverOptions) -> Result<Vec<Checkpoint>> {
    let client = reqwest::Client::builder()
        .user_agent(crate::USER_AGENT)
        .build()?;

    let mut query: Vec<(&str, String)> = vec![
        ("url", format!("{}/*", opts.domain)),
        ("output", "json".to_string()),
        (
            "fl",
            "timestamp,original,mimetype,statuscode,digest,length".to_string(),
        ),
        ("filter", "statuscode:200".to_string()),
        ("filter", "mimetype:text/html".to_string()),
        ("collapse", "digest".to_string()),
    ];
    if let Some(from) = &opts.from_year {
        query.push(("from", from.clone()));
    }
    if let Some(to) = &opts.to_year {
        query.push(("to", to.clone()));
    }
    if let Some(limit) = opts.limit {
        query.push(("limit", limit.to_string()));
    }

    info!("Querying CDX index for {}", opts.domain);
    let payload: Value = client
        .get(CDX_URL)
        .query(&query)
        .send()
        .await
        .context("CDX request failed")?
        .error_for_status()
        .context("CDX request rejected")?
        .json()
        .await
        .context("failed to decode CDX response as JSON")?;

    let checkpoints = rows_from_payload(&payload)?;
    info!("CDX returned {} checkpoints", checkpoints.len());
    Ok(checkpoints)
}

/// Convert a CDX JSON payload (array of arrays, first row is the column
/// header) into checkpoint rows.
fn rows_from_payload(payload: &Value) -> Result<Vec<Checkpoint>> {
    let rows = payload
        .as_array()
        .context("CDX response is not a JSON array")?;

    rows.iter()
        .skip(1)
        .map(|row| {
            let field = |i: usize| -> Result<String> {
                Ok(row
                    .get(i)
                    .and_then(Value::as_str)
                    .with_context(|| format!("malformed CDX row: {}", row))?
                    .to_string())
            };
            Ok(Checkpoint {
                timestamp: field(0)?,
                original: field(1)?,
                mimetype: field(2)?,
                statuscode: field(3)?,
                digest: field(4)?,
                length: field(5)?,
            })
        })
        .collect()
}
