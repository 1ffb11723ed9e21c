use tracing::debug;

use crate::error::{Error, Result};

/// Returns true for sources that should be fetched over HTTP.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Reads a dataset from a local path or, with the `remote` feature, a URL.
pub fn read_source(source: &str) -> Result<String> {
    if is_remote(source) {
        return fetch(source);
    }
    std::fs::read_to_string(source).map_err(|e| Error::DatasetIo {
        path: source.to_string(),
        source: e,
    })
}

#[cfg(feature = "remote")]
fn fetch(url: &str) -> Result<String> {
    debug!(url, "fetching dataset");
    let resp = reqwest::blocking::get(url)
        .map_err(|e| Error::DatasetFetch(format!("HTTP request failed: {e}")))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::DatasetFetch(format!("{url} answered {status}")));
    }
    resp.text()
        .map_err(|e| Error::DatasetFetch(format!("failed to read response body: {e}")))
}

#[cfg(not(feature = "remote"))]
fn fetch(url: &str) -> Result<String> {
    debug!(url, "remote source without the remote feature");
    Err(Error::DatasetFetch(format!(
        "fetching {url} requires the 'remote' feature; pass a local path instead"
    )))
}
