use anyhow::{bail, Context, Result};
use url::Url;

use super::BaseMediaValidator;
use crate::common::MediaReference;

/// Accepts media references whose video and thumbnail are absolute
/// http(s) URLs. Whether the upload actually exists is the media service's
/// concern.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlMediaValidator;

impl UrlMediaValidator {
    fn check(field: &str, raw: &str) -> Result<()> {
        if raw.trim().is_empty() {
            bail!("{} is missing", field);
        }
        let url = Url::parse(raw).with_context(|| format!("{} is not a valid URL", field))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => bail!("{} uses unsupported scheme {}", field, other),
        }
    }
}

impl BaseMediaValidator for UrlMediaValidator {
    fn validate(&self, media: &MediaReference) -> Result<()> {
        Self::check("video_url", &media.video_url)?;
        Self::check("thumbnail_url", &media.thumbnail_url)
    }
}
