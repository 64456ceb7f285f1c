//! Handles into the container's bean arena.
//!
//! Every bean under construction or finished lives in a [`BeanSlot`]. Dependents
//! never own each other directly: they hold a [`BeanRef`], a handle to a slot.
//! Handing out an early reference is therefore just sharing the handle before
//! the slot is filled, and whatever the lifecycle pipeline produces last is what
//! every holder of the handle eventually sees.

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

/// A finished, shared bean instance.
pub type SharedBean = Arc<dyn Any + Send + Sync>;

/// Construction progress of a bean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum BeanState {
  NotRequested = 0,
  InProgress = 1,
  EarlyExposed = 2,
  Populated = 3,
  Finished = 4,
}

impl BeanState {
  fn from_u8(raw: u8) -> Self {
    match raw {
      1 => BeanState::InProgress,
      2 => BeanState::EarlyExposed,
      3 => BeanState::Populated,
      4 => BeanState::Finished,
      _ => BeanState::NotRequested,
    }
  }
}

pub(crate) struct BeanSlot {
  name: Arc<str>,
  /// The thread that claimed the slot and constructs its bean.
  owner: ThreadId,
  instance: once_cell::sync::OnceCell<SharedBean>,
  state: AtomicU8,
  abandoned: AtomicBool,
  lock: Mutex<()>,
  settled: Condvar,
}

impl BeanSlot {
  pub(crate) fn new(name: &str) -> Arc<Self> {
    Arc::new(Self {
      name: Arc::from(name),
      owner: thread::current().id(),
      instance: once_cell::sync::OnceCell::new(),
      state: AtomicU8::new(BeanState::InProgress as u8),
      abandoned: AtomicBool::new(false),
      lock: Mutex::new(()),
      settled: Condvar::new(),
    })
  }

  pub(crate) fn owner(&self) -> ThreadId {
    self.owner
  }

  pub(crate) fn state(&self) -> BeanState {
    BeanState::from_u8(self.state.load(Ordering::Acquire))
  }

  pub(crate) fn advance(&self, state: BeanState) {
    self.state.store(state as u8, Ordering::Release);
  }

  /// Stores the final instance and wakes every thread waiting on this slot.
  pub(crate) fn fill(&self, bean: SharedBean) {
    // A slot is filled exactly once by the thread that claimed it.
    let _ = self.instance.set(bean);
    self.advance(BeanState::Finished);
    let _guard = self.lock.lock();
    self.settled.notify_all();
  }

  /// Marks a failed construction and wakes every waiter.
  pub(crate) fn abandon(&self) {
    self.abandoned.store(true, Ordering::Release);
    self.advance(BeanState::NotRequested);
    let _guard = self.lock.lock();
    self.settled.notify_all();
  }

  /// Blocks until the slot is filled or abandoned. Returns `true` when filled.
  pub(crate) fn wait_settled(&self) -> bool {
    let mut guard = self.lock.lock();
    loop {
      if self.instance.get().is_some() {
        return true;
      }
      if self.abandoned.load(Ordering::Acquire) {
        return false;
      }
      self.settled.wait(&mut guard);
    }
  }
}

#[derive(Clone)]
enum SlotLink {
  /// Prototype beans: the handle is the only owner of the slot.
  Owned(Arc<BeanSlot>),
  /// Singleton beans: the container's cache owns the slot.
  Shared(Weak<BeanSlot>),
}

/// A handle to a bean in the container.
///
/// Handles to the same singleton compare equal with [`BeanRef::ptr_eq`]. A handle
/// received as an early reference (while its bean was still being built) becomes
/// readable once the bean is finished. Singleton handles do not keep the container's
/// beans alive; reading one after the container is dropped yields `None`.
#[derive(Clone)]
pub struct BeanRef {
  name: Arc<str>,
  link: SlotLink,
}

impl BeanRef {
  pub(crate) fn shared(slot: &Arc<BeanSlot>) -> Self {
    Self {
      name: slot.name.clone(),
      link: SlotLink::Shared(Arc::downgrade(slot)),
    }
  }

  pub(crate) fn owned(slot: Arc<BeanSlot>) -> Self {
    Self {
      name: slot.name.clone(),
      link: SlotLink::Owned(slot),
    }
  }

  fn slot(&self) -> Option<Arc<BeanSlot>> {
    match &self.link {
      SlotLink::Owned(slot) => Some(slot.clone()),
      SlotLink::Shared(weak) => weak.upgrade(),
    }
  }

  fn as_ptr(&self) -> *const BeanSlot {
    match &self.link {
      SlotLink::Owned(slot) => Arc::as_ptr(slot),
      SlotLink::Shared(weak) => weak.as_ptr(),
    }
  }

  /// The name of the bean this handle points to.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Whether the bean has finished construction.
  pub fn is_ready(&self) -> bool {
    self.slot().map_or(false, |slot| slot.instance.get().is_some())
  }

  pub fn state(&self) -> BeanState {
    self.slot().map_or(BeanState::NotRequested, |slot| slot.state())
  }

  /// The finished instance, type-erased.
  pub fn instance(&self) -> Option<SharedBean> {
    self.slot().and_then(|slot| slot.instance.get().cloned())
  }

  /// The finished instance as `T`. `None` if the bean is not finished yet or is
  /// of another type.
  pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self.instance().and_then(|bean| bean.downcast::<T>().ok())
  }

  /// Returns `true` if both handles point to the same bean instance.
  pub fn ptr_eq(this: &BeanRef, other: &BeanRef) -> bool {
    std::ptr::eq(this.as_ptr(), other.as_ptr())
  }
}

impl fmt::Debug for BeanRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BeanRef")
      .field("name", &self.name)
      .field("state", &self.state())
      .finish()
  }
}

/// A typed dependency field, filled in by the container during population.
///
/// ```
/// use sprig_ioc::Autowired;
///
/// #[derive(Default)]
/// struct Repository;
///
/// #[derive(Default)]
/// struct Service {
///   repository: Autowired<Repository>,
/// }
///
/// let service = Service::default();
/// assert!(!service.repository.is_wired());
/// ```
pub struct Autowired<T> {
  handle: Option<BeanRef>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Autowired<T> {
  /// The dependency, once both this field is wired and the target is finished.
  pub fn get(&self) -> Option<Arc<T>> {
    self.handle.as_ref().and_then(BeanRef::get::<T>)
  }

  pub fn handle(&self) -> Option<&BeanRef> {
    self.handle.as_ref()
  }

  pub fn is_wired(&self) -> bool {
    self.handle.is_some()
  }

  pub(crate) fn wire(&mut self, handle: BeanRef) {
    self.handle = Some(handle);
  }
}

impl<T> Default for Autowired<T> {
  fn default() -> Self {
    Self {
      handle: None,
      _marker: PhantomData,
    }
  }
}

impl<T> Clone for Autowired<T> {
  fn clone(&self) -> Self {
    Self {
      handle: self.handle.clone(),
      _marker: PhantomData,
    }
  }
}

impl<T> fmt::Debug for Autowired<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Autowired").field(&self.handle).finish()
  }
}
