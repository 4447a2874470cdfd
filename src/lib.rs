//! Thread-safe LRU and MRU caches built on an arena-backed doubly linked list.
//!
//! This crate provides:
//!
//! 1. [`RecencyList`] - A thread-safe doubly linked list with O(1) push, pop
//!    and unlink, positional insert/remove, and lock-holding traversal
//! 2. [`LruCache`] - A cache evicting the least recently used entry
//! 3. [`MruCache`] - A cache evicting the entry used most recently before the
//!    overflowing `put`
//!
//! # Features
//!
//! - Nodes live in an arena and link to each other by generation-checked
//!   handles, so the list is free of `unsafe`
//! - The cache index maps keys straight to list nodes for O(1) relocation
//! - Index and list are updated under one lock
//! - `get` counts as a use and promotes the entry
//!
//! # Examples
//!
//! ```rust
//! use recency_cache::{CollectionError, LruCache, MruCache, RecencyList};
//!
//! let lru: LruCache<u64, String> = LruCache::new(2).unwrap();
//! lru.put(1, "A".to_string());
//! lru.put(2, "B".to_string());
//! lru.put(3, "C".to_string());
//! assert_eq!(lru.get(&1), Err(CollectionError::NotFound));
//!
//! let mru: MruCache<u64, String> = MruCache::new(2).unwrap();
//! mru.put(1, "A".to_string());
//! mru.put(2, "B".to_string());
//! mru.put(3, "C".to_string());
//! assert_eq!(mru.get(&2), Err(CollectionError::NotFound));
//! assert_eq!(mru.get(&1), Ok("A".to_string()));
//!
//! let list = RecencyList::from_values([1, 2, 3]);
//! assert_eq!(list.backward().map(|(_, v)| v).collect::<Vec<_>>(), vec![3, 2, 1]);
//! ```

pub mod cache;
pub mod error;
pub mod list;
mod node;

pub use cache::{Cache, EvictionPolicy, Lru, LruCache, Mru, MruCache, RecencyCache, Victim};
pub use error::{CollectionError, Result};
pub use list::{Iter, RecencyList};
