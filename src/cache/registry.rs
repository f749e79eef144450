//! Bidirectional tag index.
//!
//! Stores without native tag support cannot answer "which keys carry tag X".
//! The index tracks tag → keys and key → tags so tag invalidation can find
//! its targets and forgotten keys can be dropped from every tag they carried.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::lock::{rw_read, rw_write};
use super::tags::Tag;

const SOURCE: &str = "cache::registry";

#[derive(Default)]
struct IndexMaps {
    tag_to_keys: HashMap<Tag, HashSet<String>>,
    key_to_tags: HashMap<String, HashSet<Tag>>,
}

impl IndexMaps {
    fn detach_key(&mut self, key: &str) -> Option<HashSet<Tag>> {
        let tags = self.key_to_tags.remove(key)?;
        for tag in &tags {
            if let Some(keys) = self.tag_to_keys.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_to_keys.remove(tag);
                }
            }
        }
        Some(tags)
    }
}

/// Tracks which cache keys carry which tags.
///
/// Stale members (keys whose entry already expired in the store) are
/// tolerated: forgetting an absent key is a no-op. They are dropped when the
/// key is rewritten, forgotten, or pruned.
pub struct TagIndex {
    maps: RwLock<IndexMaps>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(IndexMaps::default()),
        }
    }

    /// Record `key` under every tag in `tags`, replacing any tag set the key
    /// was registered with before.
    pub fn register(&self, key: &str, tags: impl IntoIterator<Item = Tag>) {
        let tags: HashSet<Tag> = tags.into_iter().collect();
        let mut maps = rw_write(&self.maps, SOURCE, "register");
        maps.detach_key(key);
        if tags.is_empty() {
            return;
        }

        for tag in &tags {
            maps.tag_to_keys
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        maps.key_to_tags.insert(key.to_string(), tags);
    }

    pub fn keys_for_tag(&self, tag: &Tag) -> HashSet<String> {
        rw_read(&self.maps, SOURCE, "keys_for_tag")
            .tag_to_keys
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    pub fn tags_for_key(&self, key: &str) -> HashSet<Tag> {
        rw_read(&self.maps, SOURCE, "tags_for_key")
            .key_to_tags
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop a key from every tag it carries.
    ///
    /// Returns true if the key was indexed.
    pub fn unregister(&self, key: &str) -> bool {
        rw_write(&self.maps, SOURCE, "unregister")
            .detach_key(key)
            .is_some()
    }

    /// Remove a tag and return the keys that carried it.
    ///
    /// Keys left without any tag are dropped from the index entirely; keys
    /// that still carry other tags keep those memberships.
    pub fn take_tag(&self, tag: &Tag) -> HashSet<String> {
        let mut maps = rw_write(&self.maps, SOURCE, "take_tag");
        let keys = maps.tag_to_keys.remove(tag).unwrap_or_default();

        for key in &keys {
            if let Some(tags) = maps.key_to_tags.get_mut(key) {
                tags.remove(tag);
                if tags.is_empty() {
                    maps.key_to_tags.remove(key);
                }
            }
        }

        keys
    }

    /// Snapshot of every indexed key.
    pub fn keys(&self) -> Vec<String> {
        rw_read(&self.maps, SOURCE, "keys")
            .key_to_tags
            .keys()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        let mut maps = rw_write(&self.maps, SOURCE, "clear");
        maps.tag_to_keys.clear();
        maps.key_to_tags.clear();
    }

    pub fn tag_count(&self) -> usize {
        rw_read(&self.maps, SOURCE, "tag_count").tag_to_keys.len()
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.maps, SOURCE, "key_count").key_to_tags.len()
    }
}

impl Default for TagIndex {
    fn default() -> Self {
        Self::new()
    }
}
