use serde::{Deserialize, Serialize};

/// Reference to an uploaded identity/verification video.
///
/// The ledger only stores the URLs; upload and storage live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    pub video_url: String,
    pub thumbnail_url: String,
}

impl MediaReference {
    pub fn new(video_url: impl Into<String>, thumbnail_url: impl Into<String>) -> Self {
        Self {
            video_url: video_url.into(),
            thumbnail_url: thumbnail_url.into(),
        }
    }
}
