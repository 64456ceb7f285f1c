//! Core, non-public data structures for the container: container identity and
//! the per-thread resolution path used for cycle detection.

use crate::bean::BeanSlot;
use crate::definition::Scope;
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Distinguishes containers on the shared thread-local resolution path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ContainerId(u64);

impl ContainerId {
  pub(crate) fn next() -> Self {
    Self(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
  }
}

struct PathEntry {
  container: ContainerId,
  name: String,
  scope: Scope,
}

thread_local! {
  // The beans currently being constructed on this thread, outermost first.
  // This is the in-progress set: a name present here is being built by a frame
  // further up this thread's stack.
  static RESOLUTION_PATH: RefCell<Vec<PathEntry>> = const { RefCell::new(Vec::new()) };

  // Early references taken from other threads' unfinished singletons during the
  // current top-level request.
  static BORROWED: RefCell<Vec<(ContainerId, Arc<BeanSlot>)>> = const { RefCell::new(Vec::new()) };
}

/// A cycle found on the current thread's resolution path.
#[derive(Debug)]
pub(crate) struct Cycle {
  /// Names from the first occurrence of the bean to the current frame, closed
  /// with the bean's name again.
  pub(crate) path: Vec<String>,
  /// Whether any prototype-scoped bean takes part in the cycle.
  pub(crate) through_prototype: bool,
}

/// Looks for `name` on this thread's resolution path for `container`.
pub(crate) fn find_cycle(container: ContainerId, name: &str) -> Option<Cycle> {
  RESOLUTION_PATH.with(|path| {
    let path = path.borrow();
    let start = path
      .iter()
      .position(|entry| entry.container == container && entry.name == name)?;
    let members: Vec<&PathEntry> = path[start..]
      .iter()
      .filter(|entry| entry.container == container)
      .collect();
    let mut names: Vec<String> = members.iter().map(|entry| entry.name.clone()).collect();
    names.push(name.to_owned());
    Some(Cycle {
      path: names,
      through_prototype: members.iter().any(|entry| entry.scope == Scope::Prototype),
    })
  })
}

/// Number of beans `container` is currently constructing on this thread.
pub(crate) fn depth(container: ContainerId) -> usize {
  RESOLUTION_PATH.with(|path| {
    path
      .borrow()
      .iter()
      .filter(|entry| entry.container == container)
      .count()
  })
}

/// The innermost bean `container` is constructing on this thread.
pub(crate) fn current(container: ContainerId) -> Option<String> {
  RESOLUTION_PATH.with(|path| {
    path
      .borrow()
      .iter()
      .rev()
      .find(|entry| entry.container == container)
      .map(|entry| entry.name.clone())
  })
}

/// This thread's resolution path for `container`, outermost first.
pub(crate) fn path(container: ContainerId) -> Vec<String> {
  RESOLUTION_PATH.with(|path| {
    path
      .borrow()
      .iter()
      .filter(|entry| entry.container == container)
      .map(|entry| entry.name.clone())
      .collect()
  })
}

/// Remembers an early reference taken from a slot another thread is building.
pub(crate) fn note_borrowed(container: ContainerId, slot: &Arc<BeanSlot>) {
  BORROWED.with(|borrowed| borrowed.borrow_mut().push((container, slot.clone())));
}

/// Drains the early references `container` borrowed on this thread.
pub(crate) fn take_borrowed(container: ContainerId) -> Vec<Arc<BeanSlot>> {
  BORROWED.with(|borrowed| {
    let mut borrowed = borrowed.borrow_mut();
    let (mine, others): (Vec<_>, Vec<_>) = borrowed.drain(..).partition(|(id, _)| *id == container);
    *borrowed = others;
    mine.into_iter().map(|(_, slot)| slot).collect()
  })
}

/// An RAII guard marking a bean as in progress on this thread.
///
/// Entering pushes the bean onto the thread-local resolution path; dropping the
/// guard removes it again, on success and on every error path alike.
pub(crate) struct ResolutionGuard {
  index: usize,
}

impl ResolutionGuard {
  pub(crate) fn enter(
    container: ContainerId,
    name: &str,
    scope: Scope,
    max_depth: usize,
  ) -> Result<Self> {
    if depth(container) >= max_depth {
      return Err(Error::ResolutionDepthExceeded {
        name: name.to_owned(),
        max_depth,
      });
    }
    RESOLUTION_PATH.with(|path| {
      let mut path = path.borrow_mut();
      let index = path.len();
      path.push(PathEntry {
        container,
        name: name.to_owned(),
        scope,
      });
      Ok(Self { index })
    })
  }
}

impl Drop for ResolutionGuard {
  fn drop(&mut self) {
    RESOLUTION_PATH.with(|path| {
      path.borrow_mut().truncate(self.index);
    });
  }
}
