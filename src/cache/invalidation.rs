//! Tagged invalidation.
//!
//! Stores with native tag support flush tags themselves. Otherwise the tag
//! index supplies the member keys and each one is forgotten individually.
//! That path is best-effort: a failed forget is logged and skipped, and a
//! writer racing the loop may repopulate a tag after its members were read.

use std::collections::BTreeSet;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, warn};

use super::error::CacheError;
use super::service::CacheService;
use super::tags::Tag;

pub const METRIC_INVALIDATED_KEYS: &str = "tenancy_cache_invalidated_keys_total";

/// A non-empty set of tags to purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRequest {
    tags: BTreeSet<Tag>,
}

impl InvalidationRequest {
    pub fn new(tags: impl IntoIterator<Item = Tag>) -> Result<Self, CacheError> {
        let tags: BTreeSet<Tag> = tags.into_iter().collect();
        if tags.is_empty() {
            return Err(CacheError::EmptyInvalidation);
        }
        Ok(Self { tags })
    }

    pub fn single(tag: Tag) -> Self {
        Self {
            tags: BTreeSet::from([tag]),
        }
    }

    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }
}

/// Outcome of one invalidation. Callers are free to ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    pub tags: usize,
    /// Keys removed through the tag index. Always zero on the native path,
    /// where the store does not report what it dropped.
    pub keys_removed: usize,
    pub failures: usize,
    pub native: bool,
}

impl InvalidationReport {
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

pub struct TagInvalidator {
    service: Arc<CacheService>,
}

impl TagInvalidator {
    pub fn new(service: Arc<CacheService>) -> Self {
        Self { service }
    }

    pub async fn invalidate(&self, request: &InvalidationRequest) -> InvalidationReport {
        let mut report = InvalidationReport {
            tags: request.tags.len(),
            ..Default::default()
        };

        if self.service.store().supports_native_tags() {
            report.native = true;
            let tags: Vec<Tag> = request.tags.iter().cloned().collect();
            let store = self.service.store();
            if let Err(err) = self
                .service
                .guarded("flush_tags", store.flush_tags(&tags))
                .await
            {
                report.failures += 1;
                warn!(tags = ?tags, error = %err, "Native tag flush failed");
            }
            debug!(tags = report.tags, native = true, "Tags invalidated");
            return report;
        }

        let index = self.service.index();
        for tag in &request.tags {
            for key in index.keys_for_tag(tag) {
                match self
                    .service
                    .guarded("forget", self.service.store().forget(&key))
                    .await
                {
                    Ok(_) => {
                        index.unregister(&key);
                        report.keys_removed += 1;
                    }
                    Err(err) => {
                        report.failures += 1;
                        warn!(%tag, key = %key, error = %err, "Skipping key that could not be forgotten");
                    }
                }
            }
            index.take_tag(tag);
        }

        counter!(METRIC_INVALIDATED_KEYS).increment(report.keys_removed as u64);
        info!(
            tags = report.tags,
            keys_removed = report.keys_removed,
            failures = report.failures,
            "Tags invalidated"
        );
        report
    }
}
