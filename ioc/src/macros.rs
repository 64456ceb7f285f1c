//! Public macros for ergonomic bean resolution.

/// Resolves a bean from a container, panicking if it cannot be resolved.
///
/// Use it where a missing bean is a programming error, such as wiring code in
/// `main`. For a fallible lookup use [`Container::get`](crate::Container::get) or
/// [`maybe_resolve!`].
///
/// # Panics
///
/// Panics with the resolution error if the bean is not registered, fails to
/// construct, or is not of the requested type.
///
/// # Examples
///
/// ```
/// use sprig_ioc::{resolve, BeanDefinition, Container};
///
/// #[derive(Default)]
/// struct Clock;
///
/// let container = Container::builder()
///   .definition(BeanDefinition::singleton::<Clock>("clock"))
///   .build()
///   .unwrap();
///
/// // By name
/// let clock = resolve!(container, Clock, "clock");
/// // By type
/// let same = resolve!(container, Clock);
/// assert!(std::sync::Arc::ptr_eq(&clock, &same));
/// ```
#[macro_export]
macro_rules! resolve {
  // Arm for resolving by type: resolve!(container, MyBean)
  ($container:expr, $type:ty) => {
    $container
      .get_bean_by_type::<$type>()
      .unwrap_or_else(|err| {
        panic!(
          "Failed to resolve required bean of type {}: {}",
          std::any::type_name::<$type>(),
          err
        )
      })
  };

  // Arm for resolving by name: resolve!(container, MyBean, "name")
  ($container:expr, $type:ty, $name:expr) => {
    $container
      .get::<$type>($name)
      .unwrap_or_else(|err| {
        panic!(
          "Failed to resolve required bean '{}' ({}): {}",
          $name,
          std::any::type_name::<$type>(),
          err
        )
      })
  };
}

/// Resolves a bean from a container, returning `None` on any resolution error.
///
/// ```
/// use sprig_ioc::{maybe_resolve, Container};
///
/// let container = Container::default();
/// assert!(maybe_resolve!(container, String, "missing").is_none());
/// ```
#[macro_export]
macro_rules! maybe_resolve {
  ($container:expr, $type:ty) => {
    $container.get_bean_by_type::<$type>().ok()
  };

  ($container:expr, $type:ty, $name:expr) => {
    $container.get::<$type>($name).ok()
  };
}
