use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::marker::PhantomData;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{invariant_violation, CollectionError, Result};
use crate::list::RawList;
use crate::node::NodeHandle;

/// The core trait that defines the behavior of a cache implementation.
///
/// # Type Parameters
///
/// * `K` - The type of keys used in the cache. Must implement `Clone + Debug + Hash + Eq + Send + Sync + 'static`
/// * `V` - The type of values stored in the cache. Must implement `Clone + Debug + Send + Sync + 'static`
pub trait Cache<K, V>: Send + Sync
where
    K: Clone + Debug + Hash + Eq + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
{
    /// Retrieves a value from the cache by its key.
    ///
    /// If the key exists, the value is cloned and returned, and the entry
    /// is marked as most recently used.
    ///
    /// # Errors
    ///
    /// * [`CollectionError::IsEmpty`] if the cache holds no entries
    /// * [`CollectionError::NotFound`] if the key doesn't exist
    fn get(&self, key: &K) -> Result<V>;

    /// Inserts a key-value pair into the cache.
    ///
    /// The entry becomes the most recently used one. If the key already
    /// exists, the value is replaced and the old value is returned. If the
    /// cache grows past its capacity, one entry is evicted according to the
    /// cache's policy.
    ///
    /// # Returns
    ///
    /// * `Some(V)` if the key already existed (returns the old value)
    /// * `None` if the key didn't exist
    fn put(&self, key: K, value: V) -> Option<V>;

    /// Returns the number of entries in the cache.
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of entries the cache holds.
    fn capacity(&self) -> usize;
}

mod private {
    pub trait Sealed {}
}

/// Which entry a policy gives up when the cache overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Victim {
    /// The entry touched longest ago, at the tail of the recency order.
    LeastRecentlyUsed,
    /// The entry that was most recently used before the operation that
    /// overflowed the cache, right behind the new head.
    PreviousMostRecentlyUsed,
}

/// Eviction policy of a [`RecencyCache`], chosen at the type level.
pub trait EvictionPolicy: private::Sealed + Send + Sync + 'static {
    /// Short policy name used in log events.
    const NAME: &'static str;
    const VICTIM: Victim;
}

/// Least Recently Used eviction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lru;

/// Most Recently Used eviction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mru;

impl private::Sealed for Lru {}
impl private::Sealed for Mru {}

impl EvictionPolicy for Lru {
    const NAME: &'static str = "lru";
    const VICTIM: Victim = Victim::LeastRecentlyUsed;
}

impl EvictionPolicy for Mru {
    const NAME: &'static str = "mru";
    const VICTIM: Victim = Victim::PreviousMostRecentlyUsed;
}

// Payload of every node in a cache's recency list
#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    key: K,
    value: V,
}

// Key -> node lookup. Never consulted for ordering.
#[derive(Debug)]
pub(crate) struct EntryIndex<K> {
    nodes: HashMap<K, NodeHandle>,
}

impl<K: Hash + Eq> EntryIndex<K> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: HashMap::with_capacity(capacity),
        }
    }

    fn get(&self, key: &K) -> Option<NodeHandle> {
        self.nodes.get(key).copied()
    }

    fn insert(&mut self, key: K, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes.insert(key, node)
    }

    fn remove(&mut self, key: &K) -> Option<NodeHandle> {
        self.nodes.remove(key)
    }

    fn contains(&self, key: &K) -> bool {
        self.nodes.contains_key(key)
    }
}

impl<K> EntryIndex<K> {
    fn len(&self) -> usize {
        self.nodes.len()
    }
}

// Everything the cache lock protects: list order and index change together
struct Inner<K, V> {
    // Ordered from most recently used (head) to least recently used (tail)
    recency: RawList<Entry<K, V>>,
    entries: EntryIndex<K>,
}

/// A thread-safe cache with recency-based eviction.
///
/// Entries are kept in a doubly linked list ordered from most to least
/// recently used, with a `HashMap` from key to list node for O(1) lookups.
/// A single mutex guards both, so no caller ever sees one updated without
/// the other. Use the [`LruCache`] and [`MruCache`] aliases.
///
/// # Examples
///
/// ```rust
/// use recency_cache::{CollectionError, LruCache};
///
/// let cache = LruCache::new(2).unwrap();
/// cache.put(1, "A");
/// cache.put(2, "B");
/// cache.put(3, "C");
/// assert_eq!(cache.get(&1), Err(CollectionError::NotFound));
/// assert_eq!(cache.get(&3), Ok("C"));
/// ```
pub struct RecencyCache<K, V, P> {
    cap: usize,
    inner: Mutex<Inner<K, V>>,
    _policy: PhantomData<fn() -> P>,
}

/// Cache evicting the least recently used entry.
pub type LruCache<K, V> = RecencyCache<K, V, Lru>;

/// Cache evicting the entry used most recently before the overflowing `put`.
pub type MruCache<K, V> = RecencyCache<K, V, Mru>;

impl<K, V, P> RecencyCache<K, V, P>
where
    K: Clone + Hash + Eq,
    V: Clone,
    P: EvictionPolicy,
{
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// [`CollectionError::InvalidConfiguration`] if `capacity` is 0. Callers
    /// that treat a bad capacity as fatal unwrap at the call site:
    ///
    /// ```rust,should_panic
    /// use recency_cache::LruCache;
    ///
    /// let _cache: LruCache<u32, u32> = LruCache::new(0).expect("cache capacity");
    /// ```
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 1 {
            return Err(CollectionError::InvalidConfiguration(format!(
                "{} capacity must be at least 1, got {}",
                P::NAME,
                capacity
            )));
        }
        debug!(policy = P::NAME, capacity, "created recency cache");

        Ok(Self {
            cap: capacity,
            inner: Mutex::new(Inner {
                // One spare slot: the list briefly holds capacity + 1 entries
                recency: RawList::with_capacity(capacity + 1),
                entries: EntryIndex::with_capacity(capacity + 1),
            }),
            _policy: PhantomData,
        })
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.inner.lock().recency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().recency.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().entries.contains(key)
    }

    /// Inserts or replaces the value for `key` and marks it most recently
    /// used. Returns the replaced value, if any.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        let mut inner = self.inner.lock();
        let Inner { recency, entries } = &mut *inner;

        match entries.get(&key) {
            Some(old) => {
                // The new node goes in first so the index is repointed
                // before the old node leaves the list
                let node = recency.push_front(Entry {
                    key: key.clone(),
                    value,
                });
                entries.insert(key, node);

                let replaced = if recency.tail() == Some(old) {
                    match recency.pop_back() {
                        Some(entry) => entry,
                        None => invariant_violation(format_args!(
                            "{} recency list lost its tail during update",
                            P::NAME
                        )),
                    }
                } else {
                    recency.unlink(old)
                };
                Some(replaced.value)
            }
            None => {
                let node = recency.push_front(Entry {
                    key: key.clone(),
                    value,
                });
                entries.insert(key, node);

                if recency.len() > self.cap {
                    self.evict(recency, entries);
                }
                None
            }
        }
    }

    fn evict(&self, recency: &mut RawList<Entry<K, V>>, entries: &mut EntryIndex<K>) {
        if recency.len() <= self.cap {
            invariant_violation(format_args!(
                "{} eviction with {} entries and capacity {}",
                P::NAME,
                recency.len(),
                self.cap
            ));
        }

        let victim = match P::VICTIM {
            Victim::LeastRecentlyUsed => recency.tail(),
            Victim::PreviousMostRecentlyUsed => {
                recency.head().and_then(|head| recency.right_of(head))
            }
        };
        let victim = match victim {
            Some(victim) => victim,
            None => invariant_violation(format_args!(
                "{} found no entry to evict with {} entries and capacity {}",
                P::NAME,
                recency.len(),
                self.cap
            )),
        };

        let entry = recency.unlink(victim);
        if entries.remove(&entry.key) != Some(victim) {
            invariant_violation(format_args!(
                "{} evicted a node the index did not point at",
                P::NAME
            ));
        }
        trace!(policy = P::NAME, len = recency.len(), "evicted entry");
    }

    /// Returns the value for `key` and marks it most recently used.
    ///
    /// # Errors
    ///
    /// [`CollectionError::IsEmpty`] if the cache holds nothing,
    /// [`CollectionError::NotFound`] if `key` is absent.
    pub fn get(&self, key: &K) -> Result<V> {
        let mut inner = self.inner.lock();
        if inner.recency.is_empty() {
            return Err(CollectionError::IsEmpty);
        }
        let node = inner.entries.get(key).ok_or(CollectionError::NotFound)?;

        inner.recency.move_to_front(node);
        Ok(inner.recency.get(node).value.clone())
    }

    /// Like [`get`](Self::get) but leaves the recency order untouched.
    pub fn peek(&self, key: &K) -> Result<V> {
        let inner = self.inner.lock();
        if inner.recency.is_empty() {
            return Err(CollectionError::IsEmpty);
        }
        let node = inner.entries.get(key).ok_or(CollectionError::NotFound)?;
        Ok(inner.recency.get(node).value.clone())
    }

    /// Returns the keys from most to least recently used.
    ///
    /// Taken by walking the recency list, not the index.
    pub fn keys(&self) -> Vec<K> {
        self.inner
            .lock()
            .recency
            .iter()
            .map(|(_, entry)| entry.key.clone())
            .collect()
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let inner = self.inner.lock();
        assert_eq!(inner.recency.len(), inner.entries.len());
        assert!(inner.recency.len() <= self.cap);
        for (node, entry) in inner.recency.iter() {
            assert_eq!(inner.entries.get(&entry.key), Some(node));
        }
    }
}

impl<K, V, P> Cache<K, V> for RecencyCache<K, V, P>
where
    K: Clone + Debug + Hash + Eq + Send + Sync + 'static,
    V: Clone + Debug + Send + Sync + 'static,
    P: EvictionPolicy,
{
    fn get(&self, key: &K) -> Result<V> {
        self.get(key)
    }

    fn put(&self, key: K, value: V) -> Option<V> {
        self.put(key, value)
    }

    fn len(&self) -> usize {
        self.len()
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }

    fn capacity(&self) -> usize {
        self.capacity()
    }
}

impl<K, V, P> Debug for RecencyCache<K, V, P>
where
    K: Debug,
    V: Debug,
    P: EvictionPolicy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RecencyCache")
            .field("policy", &P::NAME)
            .field("capacity", &self.cap)
            .field("len", &inner.entries.len())
            .field(
                "entries",
                &inner
                    .recency
                    .iter()
                    .map(|(_, entry)| (&entry.key, &entry.value))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_rejects_zero_capacity() {
        assert!(matches!(
            LruCache::<i32, i32>::new(0),
            Err(CollectionError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            MruCache::<i32, i32>::new(0),
            Err(CollectionError::InvalidConfiguration(_))
        ));

        let cache = LruCache::<i32, i32>::new(1).unwrap();
        assert_eq!(cache.capacity(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn test_new_unwrapped_at_call_site_panics() {
        let _cache = MruCache::<i32, i32>::new(0).expect("mru capacity");
    }

    #[test]
    fn test_lru() {
        let cache = LruCache::new(2).unwrap();
        assert_eq!(cache.get(&1), Err(CollectionError::IsEmpty));

        assert_eq!(cache.put(1, "A"), None);
        assert_eq!(cache.get(&1), Ok("A"));

        // A is the least recently used entry once C arrives
        cache.put(2, "B");
        cache.put(3, "C");
        assert_eq!(cache.get(&1), Err(CollectionError::NotFound));
        assert_eq!(cache.get(&2), Ok("B"));
        assert_eq!(cache.get(&3), Ok("C"));
        cache.assert_consistent();

        // Refreshing 2 leaves 3 as the least recently used
        assert_eq!(cache.put(2, "BB"), Some("B"));
        cache.put(1, "A");
        assert_eq!(cache.get(&3), Err(CollectionError::NotFound));
        assert_eq!(cache.get(&2), Ok("BB"));
        assert_eq!(cache.get(&1), Ok("A"));
        assert_eq!(cache.len(), 2);
        cache.assert_consistent();
    }

    #[test]
    fn test_mru() {
        let cache = MruCache::new(2).unwrap();
        assert_eq!(cache.get(&1), Err(CollectionError::IsEmpty));

        cache.put(1, "A");
        assert_eq!(cache.get(&1), Ok("A"));

        // B was used right before C arrived, so B goes
        cache.put(2, "B");
        cache.put(3, "C");
        assert_eq!(cache.get(&2), Err(CollectionError::NotFound));
        assert_eq!(cache.get(&1), Ok("A"));
        assert_eq!(cache.get(&3), Ok("C"));
        cache.assert_consistent();

        // Updating 1 makes it the most recently used entry
        assert_eq!(cache.put(1, "AA"), Some("A"));
        assert_eq!(cache.get(&1), Ok("AA"));

        // Putting B back evicts AA, not C
        cache.put(2, "B");
        assert_eq!(cache.get(&1), Err(CollectionError::NotFound));
        assert_eq!(cache.get(&2), Ok("B"));
        assert_eq!(cache.get(&3), Ok("C"));
        cache.assert_consistent();
    }

    #[test]
    fn test_mru_capacity_one() {
        let cache = MruCache::new(1).unwrap();
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.get(&"a"), Err(CollectionError::NotFound));
        assert_eq!(cache.get(&"b"), Ok(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_promotes_entry() {
        let lru = LruCache::new(2).unwrap();
        lru.put(1, "A");
        lru.put(2, "B");
        // Touching 1 makes 2 the least recently used
        assert_eq!(lru.get(&1), Ok("A"));
        lru.put(3, "C");
        assert_eq!(lru.keys(), vec![3, 1]);

        let mru = MruCache::new(2).unwrap();
        mru.put(1, "A");
        mru.put(2, "B");
        // Touching 1 makes it the most recently used, so it goes next
        assert_eq!(mru.get(&1), Ok("A"));
        mru.put(3, "C");
        assert_eq!(mru.keys(), vec![3, 2]);
    }

    #[test]
    fn test_peek_does_not_promote() {
        let cache = LruCache::new(2).unwrap();
        assert_eq!(cache.peek(&1), Err(CollectionError::IsEmpty));
        cache.put(1, "A");
        cache.put(2, "B");
        assert_eq!(cache.peek(&1), Ok("A"));
        assert_eq!(cache.peek(&9), Err(CollectionError::NotFound));
        cache.put(3, "C");
        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
    }

    #[test]
    fn test_update_tail_entry() {
        let cache = LruCache::new(3).unwrap();
        cache.put(1, 10);
        cache.put(2, 20);
        cache.put(3, 30);
        assert_eq!(cache.keys(), vec![3, 2, 1]);

        // 1 sits at the tail
        assert_eq!(cache.put(1, 11), Some(10));
        assert_eq!(cache.keys(), vec![1, 3, 2]);

        // 3 sits in the middle
        assert_eq!(cache.put(3, 33), Some(30));
        assert_eq!(cache.keys(), vec![3, 1, 2]);
        assert_eq!(cache.len(), 3);
        cache.assert_consistent();
    }

    #[test]
    fn test_trait_object() {
        let caches: Vec<Box<dyn Cache<String, u32>>> = vec![
            Box::new(LruCache::new(4).unwrap()),
            Box::new(MruCache::new(4).unwrap()),
        ];
        for cache in &caches {
            for i in 0..10 {
                cache.put(format!("key_{}", i), i);
            }
            assert_eq!(cache.len(), cache.capacity());
            assert_eq!(cache.get(&"key_9".to_string()), Ok(9));
        }
    }

    #[test]
    fn test_debug_lists_recency_order() {
        let cache = LruCache::new(2).unwrap();
        cache.put(1, "A");
        cache.put(2, "B");
        let rendered = format!("{:?}", cache);
        assert!(rendered.contains("policy: \"lru\""));
        assert!(rendered.contains("[(2, \"B\"), (1, \"A\")]"));
    }

    fn run_concurrent_workload<P: EvictionPolicy>() {
        let capacity = rand::thread_rng().gen_range(10..50);
        let cache = Arc::new(RecencyCache::<u32, u64, P>::new(capacity).unwrap());
        let mut handles = vec![];

        // Writer threads
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..rng.gen_range(10..1000) {
                    cache.put(rng.gen_range(0..100), rng.gen());
                    assert!(cache.len() <= cache.capacity());
                }
            }));
        }

        // Reader threads
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..rng.gen_range(10..1000) {
                    match cache.get(&rng.gen_range(0..100)) {
                        Ok(_) | Err(CollectionError::NotFound) | Err(CollectionError::IsEmpty) => {}
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= cache.capacity());
        cache.assert_consistent();

        // Every key the index answers for is also found by walking the list
        let listed: HashSet<u32> = cache.keys().into_iter().collect();
        assert_eq!(listed.len(), cache.len());
        for key in 0..100 {
            if cache.peek(&key).is_ok() {
                assert!(listed.contains(&key));
            }
        }
    }

    #[test]
    fn test_concurrent_lru() {
        run_concurrent_workload::<Lru>();
    }

    #[test]
    fn test_concurrent_mru() {
        run_concurrent_workload::<Mru>();
    }
}
