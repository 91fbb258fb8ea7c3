use parking_lot::Mutex;
use std::collections::VecDeque;
use std::hash::Hash as StdHash;
use std::collections::HashMap;

/// A bounded FIFO-eviction cache, mirroring the teacher's
/// `cache_max_size_`/`cache_delete_step_` pattern for `seen_blocks_`: once
/// the map exceeds `max_size`, the oldest `delete_step` entries are evicted
/// in one batch rather than evicting one-in-one-out, which keeps eviction
/// amortized cheap under steady insert load.
pub struct ExpirationCacheMap<K, V> {
    inner: Mutex<Inner<K, V>>,
    max_size: usize,
    delete_step: usize,
}

struct Inner<K, V> {
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K, V> ExpirationCacheMap<K, V>
where
    K: Eq + StdHash + Clone,
{
    pub fn new(max_size: usize, delete_step: usize) -> Self {
        Self {
            inner: Mutex::new(Inner { map: HashMap::new(), order: VecDeque::new() }),
            max_size,
            delete_step: delete_step.max(1),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().map.contains_key(key)
    }

    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        if !inner.map.contains_key(&key) {
            inner.order.push_back(key.clone());
        }
        inner.map.insert(key, value);
        if inner.map.len() > self.max_size {
            for _ in 0..self.delete_step {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.map.remove(&oldest);
                } else {
                    break;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
