//! Download of the static dataset snapshot.
//!
//! Only the `fetch` subcommand touches the network; analysis always reads a
//! local file.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Our World in Data's published COVID-19 table.
pub const DEFAULT_DATASET_URL: &str = "https://covid.ourworldindata.org/data/owid-covid-data.csv";

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Fetches `url` and writes the body to `output`, creating parent directories.
///
/// Returns the number of bytes written.
#[tracing::instrument(skip(client, output), fields(output = %output.display()))]
pub async fn download_dataset<C: HttpClient>(
    client: &C,
    url: &str,
    output: &Path,
) -> Result<usize> {
    let bytes = fetch_bytes(client, url)
        .await
        .with_context(|| format!("downloading {}", url))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, &bytes)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(bytes = bytes.len(), "Dataset saved");
    Ok(bytes.len())
}
