//! Bean metadata: names, scopes, dependency edges and the hooks a definition carries.

use crate::bean::{Autowired, BeanRef};
use crate::error::BoxError;
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A bean instance while it is still owned by the container (before it is finished).
pub type BeanObject = Box<dyn Any + Send + Sync>;

pub(crate) type ConstructorFn = Arc<dyn Fn() -> BeanObject + Send + Sync>;
pub(crate) type SetterFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync), BeanRef) + Send + Sync>;
pub(crate) type InitFn =
  Arc<dyn Fn(&mut (dyn Any + Send + Sync)) -> Option<Result<(), BoxError>> + Send + Sync>;

/// How long a bean lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
  /// One shared instance per name for the container's lifetime.
  #[default]
  Singleton,
  /// A fresh instance for every request.
  Prototype,
}

/// How the instantiator obtains a bare instance.
#[derive(Clone)]
pub(crate) enum Construction {
  Default(ConstructorFn),
  /// The type exists but offers no default construction path.
  NoDefaultConstructor,
  /// An interface (`dyn Trait`) or otherwise abstract type.
  Abstract,
}

/// Derives a bean name from a type: the last path segment with generics stripped
/// and its first character lower-cased (`app::UserService` -> `userService`).
pub fn bean_name_for<T: ?Sized + Any>() -> String {
  derive_bean_name(std::any::type_name::<T>())
}

/// Bean names must contain something other than whitespace.
pub(crate) fn is_valid_bean_name(name: &str) -> bool {
  !name.trim().is_empty()
}

pub(crate) fn derive_bean_name(type_name: &str) -> String {
  let base = type_name.split('<').next().unwrap_or(type_name);
  let base = base.trim_start_matches("dyn ");
  let simple = base.rsplit("::").next().unwrap_or(base);
  let mut chars = simple.chars();
  match chars.next() {
    Some(first) => first.to_lowercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// One declared dependency of a bean on another bean.
#[derive(Clone)]
pub struct DependencyEdge {
  owner: String,
  target: String,
  required: bool,
  setter: SetterFn,
}

impl DependencyEdge {
  pub fn owner(&self) -> &str {
    &self.owner
  }

  pub fn target(&self) -> &str {
    &self.target
  }

  pub fn is_required(&self) -> bool {
    self.required
  }

  pub(crate) fn inject(&self, bean: &mut (dyn Any + Send + Sync), handle: BeanRef) {
    (self.setter)(bean, handle)
  }
}

impl fmt::Debug for DependencyEdge {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DependencyEdge")
      .field("owner", &self.owner)
      .field("target", &self.target)
      .field("required", &self.required)
      .finish()
  }
}

/// Immutable metadata describing how and when to construct a bean.
///
/// Definitions are built with [`BeanDefinition::singleton`],
/// [`BeanDefinition::prototype`] and friends, then handed to the container.
/// Once registered a definition never changes.
#[derive(Clone)]
pub struct BeanDefinition {
  name: String,
  type_id: TypeId,
  type_name: &'static str,
  scope: Scope,
  lazy: bool,
  dependencies: Vec<DependencyEdge>,
  construction: Construction,
  init: Option<InitFn>,
}

impl BeanDefinition {
  /// Starts a singleton definition for a default-constructible type.
  pub fn singleton<T>(name: impl Into<String>) -> DefinitionBuilder<T>
  where
    T: Default + Any + Send + Sync,
  {
    DefinitionBuilder::new(
      name.into(),
      Scope::Singleton,
      Construction::Default(Arc::new(|| Box::new(T::default()) as BeanObject)),
    )
  }

  /// Starts a prototype definition for a default-constructible type.
  pub fn prototype<T>(name: impl Into<String>) -> DefinitionBuilder<T>
  where
    T: Default + Any + Send + Sync,
  {
    Self::singleton::<T>(name).scope(Scope::Prototype)
  }

  /// Starts a singleton definition named after the type (see [`bean_name_for`]).
  pub fn of<T>() -> DefinitionBuilder<T>
  where
    T: Default + Any + Send + Sync,
  {
    Self::singleton::<T>(bean_name_for::<T>())
  }

  /// Describes a concrete type that has no default construction path.
  /// Resolving it fails with `InstantiationFailure`.
  pub fn without_constructor<T>(name: impl Into<String>) -> DefinitionBuilder<T>
  where
    T: Any + Send + Sync,
  {
    DefinitionBuilder::new(name.into(), Scope::Singleton, Construction::NoDefaultConstructor)
  }

  /// Describes an interface such as `dyn Trait`. It can never be instantiated.
  pub fn interface<I: ?Sized + Any>(name: impl Into<String>) -> BeanDefinition {
    BeanDefinition {
      name: name.into(),
      type_id: TypeId::of::<I>(),
      type_name: std::any::type_name::<I>(),
      scope: Scope::Singleton,
      lazy: false,
      dependencies: Vec::new(),
      construction: Construction::Abstract,
      init: None,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn type_id(&self) -> TypeId {
    self.type_id
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  pub fn scope(&self) -> Scope {
    self.scope
  }

  pub fn is_singleton(&self) -> bool {
    self.scope == Scope::Singleton
  }

  pub fn is_lazy(&self) -> bool {
    self.lazy
  }

  pub fn dependencies(&self) -> &[DependencyEdge] {
    &self.dependencies
  }

  pub fn has_init_callback(&self) -> bool {
    self.init.is_some()
  }

  pub(crate) fn construction(&self) -> &Construction {
    &self.construction
  }

  /// Runs the init callback. `None` when there is none, or when the instance is
  /// no longer of the definition's type because a processor replaced it.
  pub(crate) fn run_init(&self, bean: &mut (dyn Any + Send + Sync)) -> Option<Result<(), BoxError>> {
    self.init.as_ref().and_then(|init| init(bean))
  }
}

impl fmt::Debug for BeanDefinition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let construction = match self.construction {
      Construction::Default(_) => "default",
      Construction::NoDefaultConstructor => "none",
      Construction::Abstract => "abstract",
    };
    f.debug_struct("BeanDefinition")
      .field("name", &self.name)
      .field("type_name", &self.type_name)
      .field("scope", &self.scope)
      .field("lazy", &self.lazy)
      .field("dependencies", &self.dependencies)
      .field("construction", &construction)
      .field("init", &self.init.is_some())
      .finish()
  }
}

/// Typed builder for a [`BeanDefinition`] of implementation type `T`.
pub struct DefinitionBuilder<T> {
  definition: BeanDefinition,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> DefinitionBuilder<T> {
  fn new(name: String, scope: Scope, construction: Construction) -> Self {
    Self {
      definition: BeanDefinition {
        name,
        type_id: TypeId::of::<T>(),
        type_name: std::any::type_name::<T>(),
        scope,
        lazy: false,
        dependencies: Vec::new(),
        construction,
        init: None,
      },
      _marker: PhantomData,
    }
  }

  pub fn scope(mut self, scope: Scope) -> Self {
    self.definition.scope = scope;
    self
  }

  /// Lazy singletons are skipped by startup pre-instantiation.
  pub fn lazy(mut self, lazy: bool) -> Self {
    self.definition.lazy = lazy;
    self
  }

  /// Declares a required dependency on `target`, stored into the field that
  /// `field` selects.
  pub fn autowire<D>(self, target: impl Into<String>, field: fn(&mut T) -> &mut Autowired<D>) -> Self
  where
    D: Any + Send + Sync,
  {
    self.edge(target.into(), true, field)
  }

  /// Like [`autowire`](Self::autowire), but a missing `target` leaves the field unwired.
  pub fn autowire_optional<D>(
    self,
    target: impl Into<String>,
    field: fn(&mut T) -> &mut Autowired<D>,
  ) -> Self
  where
    D: Any + Send + Sync,
  {
    self.edge(target.into(), false, field)
  }

  /// Declares a required dependency whose target name is derived from `D`.
  pub fn autowire_by_type<D>(self, field: fn(&mut T) -> &mut Autowired<D>) -> Self
  where
    D: Any + Send + Sync,
  {
    self.edge(bean_name_for::<D>(), true, field)
  }

  /// Declares a dependency with a hand-written injection function.
  pub fn inject_with<F>(mut self, target: impl Into<String>, required: bool, setter: F) -> Self
  where
    F: Fn(&mut T, BeanRef) + Send + Sync + 'static,
  {
    let setter: SetterFn = Arc::new(move |bean: &mut (dyn Any + Send + Sync), handle: BeanRef| {
      if let Some(bean) = bean.downcast_mut::<T>() {
        setter(bean, handle);
      }
    });
    self.definition.dependencies.push(DependencyEdge {
      owner: self.definition.name.clone(),
      target: target.into(),
      required,
      setter,
    });
    self
  }

  /// Registers the init callback, run once after population and the
  /// before-initialization stages.
  pub fn init_method<F>(mut self, init: F) -> Self
  where
    F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    self.definition.init = Some(Arc::new(move |bean: &mut (dyn Any + Send + Sync)| {
      bean.downcast_mut::<T>().map(&init)
    }));
    self
  }

  pub fn build(self) -> BeanDefinition {
    self.definition
  }

  fn edge<D>(self, target: String, required: bool, field: fn(&mut T) -> &mut Autowired<D>) -> Self
  where
    D: Any + Send + Sync,
  {
    self.inject_with(target, required, move |bean: &mut T, handle| field(bean).wire(handle))
  }
}

impl<T: Any + Send + Sync> From<DefinitionBuilder<T>> for BeanDefinition {
  fn from(builder: DefinitionBuilder<T>) -> Self {
    builder.build()
  }
}
