//! hookt Vars
//!
//! A concurrent key/value store whose readers block until a value is present.
//!
//! Steps run concurrently and may hand values to each other through templates
//! (`setvar` in one step, `var` in another). A reader that arrives before the
//! writer parks on the key's condition variable instead of polling.
//!
//! Each key owns its own entry (a mutex plus a condvar), so loads and stores on
//! independent keys never contend beyond the shard lookup in the map. The
//! existence check and the wait happen under the entry's mutex, so a store that
//! lands between them cannot be missed.

use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use dashmap::DashMap;

struct Entry<V> {
  value: Mutex<Option<V>>,
  ready: Condvar,
}

impl<V> Entry<V> {
  fn empty() -> Self {
    Self {
      value: Mutex::new(None),
      ready: Condvar::new(),
    }
  }
}

/// Blocking variable store.
///
/// Cloning is cheap and every clone shares the same underlying map.
pub struct VarStore<K, V> {
  entries: Arc<DashMap<K, Arc<Entry<V>>>>,
}

impl<K, V> Clone for VarStore<K, V> {
  fn clone(&self) -> Self {
    Self {
      entries: Arc::clone(&self.entries),
    }
  }
}

impl<K, V> Default for VarStore<K, V>
where
  K: Eq + Hash,
{
  fn default() -> Self {
    Self {
      entries: Arc::new(DashMap::new()),
    }
  }
}

impl<K, V> VarStore<K, V>
where
  K: Eq + Hash + Clone,
  V: Clone,
{
  pub fn new() -> Self {
    Self::default()
  }

  fn entry(&self, key: &K) -> Arc<Entry<V>> {
    if let Some(entry) = self.entries.get(key) {
      return Arc::clone(entry.value());
    }
    // The shard guard is released before the caller waits on the entry.
    let entry = self
      .entries
      .entry(key.clone())
      .or_insert_with(|| Arc::new(Entry::empty()));
    Arc::clone(entry.value())
  }

  /// Stores `value` under `key` and wakes every reader waiting on it.
  ///
  /// Later stores overwrite the value and wake readers again.
  pub fn store(&self, key: K, value: V) {
    let entry = self.entry(&key);
    let mut slot = entry.value.lock().unwrap_or_else(PoisonError::into_inner);
    *slot = Some(value);
    entry.ready.notify_all();
  }

  /// Returns the value stored under `key`, blocking until one is stored.
  pub fn load(&self, key: &K) -> V {
    let entry = self.entry(key);
    let mut slot = entry.value.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
      if let Some(value) = slot.as_ref() {
        return value.clone();
      }
      slot = entry.ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
    }
  }

  /// Returns the value stored under `key` without blocking.
  pub fn try_load(&self, key: &K) -> Option<V> {
    let entry = self.entries.get(key).map(|e| Arc::clone(e.value()))?;
    let slot = entry.value.lock().unwrap_or_else(PoisonError::into_inner);
    slot.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Barrier;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn test_load_after_store() {
    let vars = VarStore::new();
    vars.store("k".to_string(), 7);
    assert_eq!(vars.load(&"k".to_string()), 7);
  }

  #[test]
  fn test_store_overwrites() {
    let vars = VarStore::new();
    vars.store("k", "a");
    vars.store("k", "b");
    assert_eq!(vars.load(&"k"), "b");
  }

  #[test]
  fn test_readers_block_until_store() {
    let vars: VarStore<&'static str, u32> = VarStore::new();
    let barrier = Arc::new(Barrier::new(5));

    let readers: Vec<_> = (0..4)
      .map(|_| {
        let vars = vars.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
          barrier.wait();
          vars.load(&"late")
        })
      })
      .collect();

    barrier.wait();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(vars.try_load(&"late"), None);
    vars.store("late", 42);

    for reader in readers {
      assert_eq!(reader.join().unwrap(), 42);
    }
  }

  #[test]
  fn test_readers_started_after_store() {
    let vars: VarStore<String, String> = VarStore::new();
    vars.store("k".into(), "v".into());

    let readers: Vec<_> = (0..4)
      .map(|_| {
        let vars = vars.clone();
        thread::spawn(move || vars.load(&"k".to_string()))
      })
      .collect();

    for reader in readers {
      assert_eq!(reader.join().unwrap(), "v");
    }
  }

  #[test]
  fn test_independent_keys() {
    let vars: VarStore<u32, u32> = VarStore::new();
    let writer = {
      let vars = vars.clone();
      thread::spawn(move || {
        for i in 0..100 {
          vars.store(i, i * 2);
        }
      })
    };
    for i in (0..100).rev() {
      assert_eq!(vars.load(&i), i * 2);
    }
    writer.join().unwrap();
  }
}
