use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::markup::MarkupParseResult;

struct CacheEntry {
    hash: String,
    source: String,
    result: Rc<MarkupParseResult>,
}

/// Least-recently-used cache of corrected markup trees, keyed by exact
/// source text. Hits hand out the same `Rc`, so repeated parses of one
/// source share a single markup tree.
pub struct MarkupCache {
    capacity: usize,
    /// Most recently used first.
    entries: VecDeque<CacheEntry>,
}

impl Default for MarkupCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupCache {
    pub const DEFAULT_CAPACITY: usize = 5;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn compute_hash(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, hash: &str, source: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.hash == hash && entry.source == source)
    }

    pub fn get(&mut self, source: &str) -> Option<Rc<MarkupParseResult>> {
        let hash = Self::compute_hash(source);
        let idx = self.position(&hash, source)?;
        let entry = self.entries.remove(idx)?;
        let result = Rc::clone(&entry.result);
        self.entries.push_front(entry);
        log::trace!("markup cache hit ({})", &hash[..12]);
        Some(result)
    }

    pub fn insert(&mut self, source: &str, result: MarkupParseResult) -> Rc<MarkupParseResult> {
        let hash = Self::compute_hash(source);
        if let Some(idx) = self.position(&hash, source) {
            self.entries.remove(idx);
        }
        let result = Rc::new(result);
        self.entries.push_front(CacheEntry {
            hash,
            source: source.to_string(),
            result: Rc::clone(&result),
        });
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_back() {
                log::trace!("markup cache evicted ({})", &evicted.hash[..12]);
            }
        }
        result
    }

    /// Returns the cached tree for `source`, or builds, stores and returns it.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        source: &str,
        build: impl FnOnce() -> Result<MarkupParseResult, E>,
    ) -> Result<Rc<MarkupParseResult>, E> {
        if let Some(hit) = self.get(source) {
            return Ok(hit);
        }
        log::trace!("markup cache miss");
        let result = build()?;
        Ok(self.insert(source, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{MarkupNode, ParentNode};

    fn empty_result() -> MarkupParseResult {
        MarkupParseResult {
            ast: MarkupNode::Root(ParentNode::default()),
            diagnostics: vec![],
        }
    }

    #[test]
    fn test_hit_returns_same_allocation() {
        let mut cache = MarkupCache::new();
        let first = cache.insert("<p/>", empty_result());
        let second = cache.get("<p/>").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(cache.get("<p />").is_none());
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let mut cache = MarkupCache::with_capacity(2);
        cache.insert("a", empty_result());
        cache.insert("b", empty_result());
        cache.get("a");
        cache.insert("c", empty_result());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_get_or_try_insert_with_builds_once() {
        let mut cache = MarkupCache::new();
        let mut builds = 0;
        for _ in 0..3 {
            cache
                .get_or_try_insert_with("x", || {
                    builds += 1;
                    Ok::<_, ()>(empty_result())
                })
                .unwrap();
        }
        assert_eq!(builds, 1);
    }
}
