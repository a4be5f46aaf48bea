use std::num::NonZeroUsize;

use lru::LruCache;

/// Number of segment URIs remembered between playlist polls.
pub const DEDUP_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// Bounded set of segment URIs that have already been queued.
///
/// Live playlists slide: most segments of one poll reappear in the next. A URI seen
/// within the last [`DEDUP_CAPACITY`] distinct URIs is never queued twice. Looking up a
/// URI refreshes it, so segments still present in the playlist are not evicted.
pub struct DedupWindow {
    seen: LruCache<String, ()>,
}

impl DedupWindow {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            seen: LruCache::new(capacity),
        }
    }

    /// Records `uri` and returns `true` if it was not present yet.
    pub fn insert(&mut self, uri: &str) -> bool {
        if self.seen.get(uri).is_some() {
            return false;
        }
        self.seen.put(uri.to_string(), ());
        true
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.seen.contains(uri)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEDUP_CAPACITY)
    }
}
