use sprig_ioc::{resolve, BeanDefinition, Container};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

// A simple service that gets a unique ID upon creation.
struct RequestTracker {
  id: usize,
}

// A global, thread-safe counter to generate unique IDs.
static ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

impl Default for RequestTracker {
  fn default() -> Self {
    RequestTracker {
      id: ID_COUNTER.fetch_add(1, Ordering::SeqCst),
    }
  }
}

fn main() {
  // --- Registration ---
  // The singleton is built once, at startup.
  // The prototype is built again on EVERY request.
  let container = Container::builder()
    .definition(BeanDefinition::singleton::<RequestTracker>("singleton_tracker"))
    .definition(BeanDefinition::prototype::<RequestTracker>("prototype_tracker"))
    .build()
    .expect("container should start");

  println!("--- Resolving Singletons ---");
  let s1 = resolve!(container, RequestTracker, "singleton_tracker");
  let s2 = resolve!(container, RequestTracker, "singleton_tracker");
  println!("Singleton 1 ID: {}, Singleton 2 ID: {}", s1.id, s2.id);
  assert_eq!(s1.id, 0);
  assert!(
    Arc::ptr_eq(&s1, &s2),
    "Singleton instances should be identical"
  );
  println!("Singleton instances are the same pointer, as expected.\n");

  println!("--- Resolving Prototypes ---");
  let p1 = resolve!(container, RequestTracker, "prototype_tracker");
  let p2 = resolve!(container, RequestTracker, "prototype_tracker");
  println!("Prototype 1 ID: {}, Prototype 2 ID: {}", p1.id, p2.id);
  assert_ne!(p1.id, p2.id);
  assert!(
    !Arc::ptr_eq(&p1, &p2),
    "Prototype instances should be different"
  );
  println!("Prototype instances are different pointers, as expected.");

  println!(
    "\n{} definitions, {} singletons built",
    container.definition_count(),
    container.singleton_count()
  );
}
