// rivet-net/src/validation.rs
use rivet_common::error::{Result, RivetError};
use tracing::debug;
use url::Url;

const SUPPORTED_SCHEMES: &[&str] = &["file", "http", "https"];

/// Parses a locator and checks it uses a scheme the transport can open.
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str).inspect_err(|e| debug!("Failed to parse URL '{url_str}': {e}"))?;
    check_scheme(&url)?;
    Ok(url)
}

pub fn check_scheme(url: &Url) -> Result<()> {
    if SUPPORTED_SCHEMES.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(RivetError::ValidationError(format!(
            "Invalid URL scheme for '{}': must be one of {:?}, but got '{}'",
            url,
            SUPPORTED_SCHEMES,
            url.scheme()
        )))
    }
}
