//! The three-tier singleton cache.
//!
//! - `finished`: fully built singletons. Entries are never replaced or removed.
//! - `early`: slots of singletons under construction, handed out as early
//!   references to break cycles.
//! - `pending`: the definition of each singleton under construction, so a
//!   re-entrant request does not go back to the registry.
//!
//! A thread that finds a singleton claimed by another thread waits for it,
//! unless the owner is itself (transitively) waiting on this thread. Only that
//! cross-thread cycle is broken with an early reference.
//!
//! Every handle injected into a singleton is remembered against its target. If a
//! singleton fails after its early reference was handed out, the finished
//! singletons that (transitively) hold it are evicted with it, so no finished
//! singleton keeps a handle to a construction that never completed.

use crate::bean::{BeanSlot, BeanState};
use crate::definition::BeanDefinition;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Outcome of trying to claim a singleton for construction.
pub(crate) enum Claim {
  /// Already built.
  Finished(Arc<BeanSlot>),
  /// Claimed: the caller must construct the bean and then `complete` or `discard`.
  Owned(Arc<BeanSlot>),
  /// Another thread is constructing it.
  InCreation(Arc<BeanSlot>),
}

#[derive(Default)]
pub(crate) struct SingletonCache {
  finished: DashMap<String, Arc<BeanSlot>>,
  early: DashMap<String, Arc<BeanSlot>>,
  pending: DashMap<String, Arc<BeanDefinition>>,
  dependents: DashMap<String, Vec<String>>,
  /// Wait-for graph: the slot each blocked thread is waiting on.
  waiting: Mutex<HashMap<ThreadId, Arc<BeanSlot>>>,
}

impl SingletonCache {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn finished(&self, name: &str) -> Option<Arc<BeanSlot>> {
    self.finished.get(name).map(|slot| slot.value().clone())
  }

  pub(crate) fn early(&self, name: &str) -> Option<Arc<BeanSlot>> {
    self.early.get(name).map(|slot| slot.value().clone())
  }

  pub(crate) fn pending(&self, name: &str) -> Option<Arc<BeanDefinition>> {
    self.pending.get(name).map(|definition| definition.value().clone())
  }

  pub(crate) fn finished_count(&self) -> usize {
    self.finished.len()
  }

  /// Atomically checks the tiers and, if the singleton is neither finished nor
  /// being built, publishes a fresh slot as its early reference.
  ///
  /// The early map's shard lock for `name` is held only for this check and
  /// publish; it is released before the caller populates the bean.
  pub(crate) fn claim(&self, definition: &Arc<BeanDefinition>) -> Claim {
    let name = definition.name();
    match self.early.entry(name.to_owned()) {
      Entry::Occupied(entry) => Claim::InCreation(entry.get().clone()),
      Entry::Vacant(entry) => {
        // `complete` inserts into `finished` before it removes from `early`, so
        // a vacant early entry plus a finished one means we lost a race.
        if let Some(done) = self.finished(name) {
          return Claim::Finished(done);
        }
        let slot = BeanSlot::new(name);
        self.pending.insert(name.to_owned(), definition.clone());
        entry.insert(slot.clone());
        Claim::Owned(slot)
      }
    }
  }

  /// Registers the current thread as waiting on `slot`.
  ///
  /// Returns `false`, registering nothing, when the slot's owner is already
  /// waiting (directly or through other threads) on this thread: blocking
  /// would deadlock, so the caller takes the early reference instead. The
  /// check and the registration happen under one lock.
  pub(crate) fn begin_wait(&self, slot: &Arc<BeanSlot>) -> bool {
    let me = thread::current().id();
    let mut waiting = self.waiting.lock();
    let mut owner = slot.owner();
    for _ in 0..=waiting.len() {
      if owner == me {
        return false;
      }
      match waiting.get(&owner) {
        Some(next) => owner = next.owner(),
        None => break,
      }
    }
    waiting.insert(me, slot.clone());
    true
  }

  pub(crate) fn end_wait(&self) {
    self.waiting.lock().remove(&thread::current().id());
  }

  /// Records that singleton `dependent` holds a handle to `target`.
  pub(crate) fn record_dependent(&self, target: &str, dependent: &str) {
    self
      .dependents
      .entry(target.to_owned())
      .or_default()
      .push(dependent.to_owned());
  }

  /// Promotes a filled slot from early to finished.
  pub(crate) fn complete(&self, name: &str, slot: &Arc<BeanSlot>) {
    debug_assert_eq!(slot.state(), BeanState::Finished);
    self.finished.insert(name.to_owned(), slot.clone());
    self.early.remove_if(name, |_, early| Arc::ptr_eq(early, slot));
    self.pending.remove(name);
  }

  /// Drops every trace of a failed construction and wakes any waiters.
  /// Returns the finished singletons evicted because they depended on it.
  pub(crate) fn discard(&self, name: &str, slot: &Arc<BeanSlot>) -> Vec<String> {
    self.early.remove_if(name, |_, early| Arc::ptr_eq(early, slot));
    self.pending.remove(name);

    let mut evicted = Vec::new();
    let mut queue = vec![name.to_owned()];
    while let Some(target) = queue.pop() {
      let Some((_, dependents)) = self.dependents.remove(&target) else {
        continue;
      };
      for dependent in dependents {
        if self.finished.remove(&dependent).is_some() {
          evicted.push(dependent.clone());
          queue.push(dependent);
        }
      }
    }

    slot.abandon();
    evicted
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Default)]
  struct Service;

  fn definition(name: &str) -> Arc<BeanDefinition> {
    Arc::new(BeanDefinition::singleton::<Service>(name).build())
  }

  #[test]
  fn claim_publishes_early_then_complete_promotes() {
    let cache = SingletonCache::new();
    let def = definition("service");

    let slot = match cache.claim(&def) {
      Claim::Owned(slot) => slot,
      _ => panic!("first claim must own the bean"),
    };
    assert!(cache.early("service").is_some());
    assert!(cache.pending("service").is_some());
    assert!(matches!(cache.claim(&def), Claim::InCreation(s) if Arc::ptr_eq(&s, &slot)));

    slot.fill(Arc::new(Service));
    cache.complete("service", &slot);

    assert!(cache.early("service").is_none());
    assert!(cache.pending("service").is_none());
    assert_eq!(cache.finished_count(), 1);
    assert!(matches!(cache.claim(&def), Claim::Finished(s) if Arc::ptr_eq(&s, &slot)));
  }

  #[test]
  fn discard_clears_partial_state_and_allows_retry() {
    let cache = SingletonCache::new();
    let def = definition("service");

    let Claim::Owned(slot) = cache.claim(&def) else {
      panic!("first claim must own the bean");
    };
    cache.discard("service", &slot);

    assert!(cache.early("service").is_none());
    assert!(cache.pending("service").is_none());
    assert!(cache.finished("service").is_none());
    assert!(!slot.wait_settled());
    assert!(matches!(cache.claim(&def), Claim::Owned(_)));
  }

  #[test]
  fn wait_is_refused_only_when_it_closes_a_cycle() {
    let cache = SingletonCache::new();
    let Claim::Owned(mine) = cache.claim(&definition("mine")) else {
      panic!("mine must be owned");
    };

    // Another thread claims "theirs", then blocks on our "mine".
    let theirs = thread::scope(|s| {
      s.spawn(|| {
        let Claim::Owned(theirs) = cache.claim(&definition("theirs")) else {
          panic!("theirs must be owned");
        };
        assert!(cache.begin_wait(&mine));
        theirs
      })
      .join()
      .unwrap()
    });

    // Waiting on "theirs" would deadlock; the wait is refused.
    assert!(!cache.begin_wait(&theirs));

    // Once the other thread stops waiting, blocking is safe again.
    cache.waiting.lock().clear();
    assert!(cache.begin_wait(&theirs));
    cache.end_wait();
    assert!(cache.waiting.lock().is_empty());
  }

  fn finish(cache: &SingletonCache, name: &str) {
    let Claim::Owned(slot) = cache.claim(&definition(name)) else {
      panic!("{name} must be owned");
    };
    slot.fill(Arc::new(Service));
    cache.complete(name, &slot);
  }

  #[test]
  fn discard_evicts_transitive_holders_of_the_early_reference() {
    let cache = SingletonCache::new();

    let Claim::Owned(outer) = cache.claim(&definition("outer")) else {
      panic!("outer must be owned");
    };
    // inner holds outer's early reference; holder holds inner; bystander is unrelated.
    finish(&cache, "inner");
    cache.record_dependent("outer", "inner");
    finish(&cache, "holder");
    cache.record_dependent("inner", "holder");
    finish(&cache, "bystander");

    let mut evicted = cache.discard("outer", &outer);
    evicted.sort();

    assert_eq!(evicted, vec!["holder".to_string(), "inner".to_string()]);
    assert!(cache.finished("inner").is_none());
    assert!(cache.finished("holder").is_none());
    assert!(cache.finished("bystander").is_some());
  }
}
