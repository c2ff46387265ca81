//! Per-post image selection.
//!
//! The post text, the current time and a random salt are hashed; slices of
//! the digest choose a category, an image within it and a URL signature.
//! Candidates are probed in order and the first reachable one wins. There is
//! no guarantee an image is never repeated: the optional recency history only
//! keeps the last few picks out of rotation.

use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};

use crate::history::ImageHistory;
use crate::models::{ImageCandidate, ImageCategory};
use crate::tables::{ImageGroup, FALLBACK_IMAGES, IMAGE_CATALOG, PLACEHOLDER_TEMPLATE};

/// Probes per post before falling back to the static list
pub const MAX_ATTEMPTS: usize = 3;

#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn is_reachable(&self, url: &str) -> bool;
}

pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> crate::error::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageProbe for HttpProbe {
    async fn is_reachable(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(url, error = %e, "Image probe failed");
                false
            }
        }
    }
}

/// Hex digest of the post plus time and salt, and two integers taken from
/// separate slices of it
#[derive(Debug, Clone)]
pub struct ContentDigest {
    hex: String,
    value: u64,
    index_value: u64,
}

impl ContentDigest {
    pub fn new(text: &str, timestamp_nanos: i64, salt: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(timestamp_nanos.to_le_bytes());
        hasher.update(salt.to_le_bytes());
        Self::from_bytes(&hasher.finalize())
    }

    /// Digest for the current moment with a fresh random salt
    pub fn fresh(text: &str) -> Self {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Self::new(text, nanos, rand::random())
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let word = |range: std::ops::Range<usize>| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[range]);
            u64::from_be_bytes(buf)
        };
        Self {
            hex: hex::encode(bytes),
            value: word(0..8),
            index_value: word(8..16),
        }
    }

    /// Chooses the category and the fallback image
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Chooses the starting image within the category
    pub fn index_value(&self) -> u64 {
        self.index_value
    }

    /// Short slice of the hex digest used to make URLs distinct
    pub fn signature(&self) -> &str {
        &self.hex[..12]
    }

    pub fn seed(&self) -> &str {
        &self.hex[12..28]
    }
}

/// Bounded walk through one category, starting at the digest-chosen image
pub struct Candidates<'a> {
    group: &'a ImageGroup,
    start: usize,
    offset: usize,
    limit: usize,
    signature: String,
}

impl<'a> Candidates<'a> {
    pub fn new(catalog: &'a [ImageGroup], digest: &ContentDigest, limit: usize) -> Option<Self> {
        let groups: Vec<&ImageGroup> = catalog.iter().filter(|g| !g.templates.is_empty()).collect();
        if groups.is_empty() {
            return None;
        }
        let group = groups[(digest.value() % groups.len() as u64) as usize];
        let start = (digest.index_value() % group.templates.len() as u64) as usize;

        Some(Self {
            group,
            start,
            offset: 0,
            limit: limit.min(group.templates.len()),
            signature: digest.signature().to_string(),
        })
    }
}

impl Iterator for Candidates<'_> {
    type Item = ImageCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.limit {
            return None;
        }
        let index = (self.start + self.offset) % self.group.templates.len();
        self.offset += 1;

        Some(ImageCandidate {
            url: self.group.templates[index].replace("{sig}", &self.signature),
            source_category: self.group.category,
            key: format!("{}/{}", self.group.category.label(), index),
        })
    }
}

pub struct ImageSelector {
    probe: Box<dyn ImageProbe>,
    catalog: &'static [ImageGroup],
    fallbacks: &'static [&'static str],
}

impl ImageSelector {
    pub fn new(probe: Box<dyn ImageProbe>) -> Self {
        Self {
            probe,
            catalog: IMAGE_CATALOG,
            fallbacks: FALLBACK_IMAGES,
        }
    }

    pub fn with_tables(
        probe: Box<dyn ImageProbe>,
        catalog: &'static [ImageGroup],
        fallbacks: &'static [&'static str],
    ) -> Self {
        Self {
            probe,
            catalog,
            fallbacks,
        }
    }

    /// Picks an image for `rendered_text`. Never fails.
    pub async fn select(
        &self,
        rendered_text: &str,
        history: Option<&mut ImageHistory>,
    ) -> ImageCandidate {
        self.select_with_digest(&ContentDigest::fresh(rendered_text), history)
            .await
    }

    pub async fn select_with_digest(
        &self,
        digest: &ContentDigest,
        mut history: Option<&mut ImageHistory>,
    ) -> ImageCandidate {
        let chosen = match self.probe_candidates(digest, history.as_deref()).await {
            Some(candidate) => candidate,
            None => self.fallback(digest),
        };

        if let Some(history) = history.as_deref_mut() {
            history.remember(&chosen.key);
        }
        tracing::info!(
            category = chosen.source_category.label(),
            url = %chosen.url,
            "🖼️ Selected image"
        );
        chosen
    }

    async fn probe_candidates(
        &self,
        digest: &ContentDigest,
        history: Option<&ImageHistory>,
    ) -> Option<ImageCandidate> {
        let candidates = Candidates::new(self.catalog, digest, usize::MAX)?;
        let mut attempts = 0;

        for candidate in candidates {
            if attempts >= MAX_ATTEMPTS {
                break;
            }
            if history.is_some_and(|h| h.contains(&candidate.key)) {
                tracing::debug!(key = %candidate.key, "Skipping recently used image");
                continue;
            }
            attempts += 1;
            if self.probe.is_reachable(&candidate.url).await {
                return Some(candidate);
            }
            tracing::warn!(url = %candidate.url, "Image not reachable, trying next");
        }
        None
    }

    fn fallback(&self, digest: &ContentDigest) -> ImageCandidate {
        if self.fallbacks.is_empty() {
            return placeholder(digest);
        }
        let index = (digest.value() % self.fallbacks.len() as u64) as usize;
        ImageCandidate {
            url: self.fallbacks[index].to_string(),
            source_category: ImageCategory::Fallback,
            key: format!("{}/{}", ImageCategory::Fallback.label(), index),
        }
    }
}

fn placeholder(digest: &ContentDigest) -> ImageCandidate {
    ImageCandidate {
        url: PLACEHOLDER_TEMPLATE.replace("{sig}", digest.seed()),
        source_category: ImageCategory::Placeholder,
        key: format!("{}/{}", ImageCategory::Placeholder.label(), digest.seed()),
    }
}
