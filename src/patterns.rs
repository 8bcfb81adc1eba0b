//! Pattern discovery from the bucket's `textures/` folder.

use std::sync::Arc;

use tracing::{debug, info};

use crate::contract::ObjectStore;
use crate::error::ScanError;
use crate::model::{numeric_aware_cmp, title_case_slug, Pattern};

/// Extensions accepted as pattern swatches.
pub const PATTERN_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

pub const DEFAULT_PATTERNS_FOLDER: &str = "textures";

pub struct PatternScanner<S: ?Sized> {
    store: Arc<S>,
    folder: String,
}

impl<S> PatternScanner<S>
where
    S: ObjectStore + ?Sized,
{
    pub fn new(store: Arc<S>, folder: impl Into<String>) -> Self {
        Self {
            store,
            folder: folder.into(),
        }
    }

    /// List all swatches, ordered by slug (numeric slugs by value).
    pub async fn scan(&self) -> Result<Vec<Pattern>, ScanError> {
        let entries = self
            .store
            .list(&self.folder)
            .await
            .map_err(|source| ScanError::Listing {
                prefix: self.folder.clone(),
                source,
            })?;

        let mut patterns: Vec<Pattern> = entries
            .into_iter()
            .filter(|e| !e.is_folder())
            .filter_map(|e| {
                let slug = pattern_slug(&e.name)?;
                Some(Pattern {
                    id: slug.to_string(),
                    slug: slug.to_string(),
                    name: title_case_slug(slug),
                    url: self.store.public_url(&format!("{}/{}", self.folder, e.name)),
                })
            })
            .collect();

        patterns.sort_by(|a, b| numeric_aware_cmp(&a.slug, &b.slug));
        info!(folder = %self.folder, patterns = patterns.len(), "Scanned patterns");
        Ok(patterns)
    }

    pub async fn find(&self, slug: &str) -> Result<Option<Pattern>, ScanError> {
        let found = self.scan().await?.into_iter().find(|p| p.slug == slug);
        debug!(slug, found = found.is_some(), "Pattern lookup");
        Ok(found)
    }
}

/// File stem when the extension is on the allow-list.
fn pattern_slug(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let ext = ext.to_ascii_lowercase();
    PATTERN_EXTENSIONS
        .contains(&ext.as_str())
        .then_some(stem)
}
