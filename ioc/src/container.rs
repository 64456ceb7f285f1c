//! The main `Container` struct and its associated methods.

use crate::bean::{BeanRef, BeanSlot, BeanState, SharedBean};
use crate::cache::{Claim, SingletonCache};
use crate::config::ContainerConfig;
use crate::core::{self, ContainerId, Cycle, ResolutionGuard};
use crate::definition::{bean_name_for, is_valid_bean_name, BeanDefinition, BeanObject, Scope};
use crate::error::{Error, Result};
use crate::instantiator;
use crate::lifecycle::{BeanPostProcessor, LifecyclePipeline};
use crate::populate::{self, DependencyResolver};
use crate::registry::DefinitionRegistry;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// The bean container.
///
/// It owns the definition registry, the singleton cache tiers and the lifecycle
/// pipeline. It is thread-safe: any number of threads may call
/// [`get_bean`](Container::get_bean) concurrently, and every singleton is still
/// constructed exactly once.
pub struct Container {
  id: ContainerId,
  config: ContainerConfig,
  registry: DefinitionRegistry,
  singletons: SingletonCache,
  pipeline: LifecyclePipeline,
}

impl Default for Container {
  fn default() -> Self {
    Self::new(ContainerConfig::default(), LifecyclePipeline::new())
  }
}

impl Container {
  /// Creates an empty container. Most applications use [`Container::builder`].
  pub fn new(config: ContainerConfig, pipeline: LifecyclePipeline) -> Self {
    Self {
      id: ContainerId::next(),
      config,
      registry: DefinitionRegistry::new(),
      singletons: SingletonCache::new(),
      pipeline,
    }
  }

  pub fn builder() -> ContainerBuilder {
    ContainerBuilder::default()
  }

  pub fn config(&self) -> &ContainerConfig {
    &self.config
  }

  // --- Registration ---

  /// Registers a batch of definitions. Either all of them are added or, on a
  /// duplicate or invalid name, none are.
  pub fn register_definitions<I>(&self, definitions: I) -> Result<()>
  where
    I: IntoIterator,
    I::Item: Into<BeanDefinition>,
  {
    let definitions: Vec<BeanDefinition> = definitions.into_iter().map(Into::into).collect();
    let count = self.registry.register(definitions)?;
    debug!(count, total = self.registry.len(), "registered bean definitions");
    Ok(())
  }

  /// Eagerly constructs every non-lazy singleton, in registration order.
  pub fn pre_instantiate_singletons(&self) -> Result<()> {
    let mut created = 0usize;
    for definition in self.registry.definitions() {
      if !definition.is_singleton() || definition.is_lazy() {
        continue;
      }
      self.get_bean(definition.name())?;
      created += 1;
    }
    info!(created, "pre-instantiated singletons");
    Ok(())
  }

  // --- Resolution ---

  /// Resolves a bean by name, constructing it if needed.
  ///
  /// A top-level request returns only once every bean it depends on is
  /// finished, including beans that another thread was building.
  pub fn get_bean(&self, name: &str) -> Result<BeanRef> {
    if !is_valid_bean_name(name) {
      return Err(Error::InvalidBeanName(format!("blank bean name '{name}'")));
    }
    if core::depth(self.id) > 0 {
      return self.resolve(name);
    }

    loop {
      let resolved = self.resolve(name);
      let borrowed = core::take_borrowed(self.id);
      let handle = resolved?;
      // A borrowed bean that failed took every singleton holding it down with
      // it, possibly including `handle`. Resolve again from scratch.
      if borrowed.iter().all(|slot| slot.wait_settled()) {
        return Ok(handle);
      }
      debug!(bean = name, "a bean borrowed from another thread failed; retrying");
    }
  }

  fn resolve(&self, name: &str) -> Result<BeanRef> {
    if let Some(slot) = self.singletons.finished(name) {
      return Ok(BeanRef::shared(&slot));
    }

    if let Some(cycle) = core::find_cycle(self.id, name) {
      return self.resolve_cycle(name, cycle);
    }

    let definition = self.registry.lookup(name)?;
    match definition.scope() {
      Scope::Singleton => self.resolve_singleton(definition),
      Scope::Prototype => self.create_prototype(&definition),
    }
  }

  /// Resolves a bean by name as a concrete type.
  pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
    self
      .get_bean(name)?
      .get::<T>()
      .ok_or_else(|| Error::BeanTypeMismatch {
        name: name.to_owned(),
        requested: std::any::type_name::<T>(),
      })
  }

  /// Resolves the single bean whose definition declares implementation type `T`.
  pub fn get_bean_by_type<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
    let mut names = self.registry.find_by_type(TypeId::of::<T>());
    match names.len() {
      0 => Err(Error::DefinitionNotFound(bean_name_for::<T>())),
      1 => self.get::<T>(&names.remove(0)),
      _ => Err(Error::AmbiguousBeanType {
        type_name: std::any::type_name::<T>(),
        candidates: names,
      }),
    }
  }

  // --- Introspection ---

  pub fn definition_count(&self) -> usize {
    self.registry.len()
  }

  /// Registered names in registration order.
  pub fn definition_names(&self) -> Vec<String> {
    self.registry.names()
  }

  pub fn contains_definition(&self, name: &str) -> bool {
    self.registry.contains(name)
  }

  /// Construction state of a singleton. Prototypes always report `NotRequested`.
  pub fn bean_state(&self, name: &str) -> BeanState {
    if self.singletons.finished(name).is_some() {
      return BeanState::Finished;
    }
    self
      .singletons
      .early(name)
      .map_or(BeanState::NotRequested, |slot| slot.state())
  }

  pub fn singleton_count(&self) -> usize {
    self.singletons.finished_count()
  }

  // --- PRIVATE HELPERS ---

  /// `name` is already being built further up this thread's stack.
  fn resolve_cycle(&self, name: &str, cycle: Cycle) -> Result<BeanRef> {
    if cycle.through_prototype {
      warn!(bean = name, path = ?cycle.path, "circular dependency through a prototype bean");
      return Err(Error::CircularPrototypeDependency {
        name: name.to_owned(),
        path: cycle.path,
      });
    }
    if !self.config.allow_circular_references {
      return Err(Error::CircularReference {
        name: name.to_owned(),
        path: cycle.path,
      });
    }

    let early = self.singletons.early(name);
    match early {
      Some(slot) => {
        let scope = self.singletons.pending(name).map(|definition| definition.scope());
        debug!(bean = name, ?scope, path = ?cycle.path, "breaking cycle with early reference");
        Ok(BeanRef::shared(&slot))
      }
      None => Err(Error::CircularReference {
        name: name.to_owned(),
        path: cycle.path,
      }),
    }
  }

  fn resolve_singleton(&self, definition: Arc<BeanDefinition>) -> Result<BeanRef> {
    loop {
      match self.singletons.claim(&definition) {
        Claim::Finished(slot) => return Ok(BeanRef::shared(&slot)),
        Claim::Owned(slot) => return self.create_singleton(&definition, slot),
        Claim::InCreation(slot) => {
          if !self.singletons.begin_wait(&slot) {
            return self.borrow_early(definition.name(), &slot);
          }
          let settled = slot.wait_settled();
          self.singletons.end_wait();
          if settled {
            return Ok(BeanRef::shared(&slot));
          }
          debug!(bean = definition.name(), "concurrent construction failed; retrying");
        }
      }
    }
  }

  /// The thread building `name` is waiting on a bean this thread is building.
  fn borrow_early(&self, name: &str, slot: &Arc<BeanSlot>) -> Result<BeanRef> {
    let mut path = core::path(self.id);
    path.push(name.to_owned());
    if !self.config.allow_circular_references {
      return Err(Error::CircularReference {
        name: name.to_owned(),
        path,
      });
    }
    debug!(bean = name, ?path, "breaking cross-thread cycle with early reference");
    core::note_borrowed(self.id, slot);
    Ok(BeanRef::shared(slot))
  }

  fn create_singleton(&self, definition: &BeanDefinition, slot: Arc<BeanSlot>) -> Result<BeanRef> {
    let name = definition.name();
    match self.construct(definition, &slot) {
      Ok(bean) => {
        slot.fill(bean);
        self.singletons.complete(name, &slot);
        debug!(bean = name, "singleton finished");
        Ok(BeanRef::shared(&slot))
      }
      Err(err) => {
        let evicted = self.singletons.discard(name, &slot);
        if !evicted.is_empty() {
          warn!(bean = name, ?evicted, "evicted singletons that depended on a failed bean");
        }
        warn!(bean = name, error = %err, "singleton construction failed");
        Err(err)
      }
    }
  }

  fn create_prototype(&self, definition: &BeanDefinition) -> Result<BeanRef> {
    let slot = BeanSlot::new(definition.name());
    let bean = self.construct(definition, &slot)?;
    slot.fill(bean);
    trace!(bean = definition.name(), "prototype created");
    Ok(BeanRef::owned(slot))
  }

  /// Allocate, populate and run the lifecycle pipeline, with `definition`
  /// marked in progress on this thread for the duration.
  fn construct(&self, definition: &BeanDefinition, slot: &BeanSlot) -> Result<SharedBean> {
    let _guard = ResolutionGuard::enter(
      self.id,
      definition.name(),
      definition.scope(),
      self.config.max_resolution_depth,
    )?;

    let mut raw: BeanObject = instantiator::instantiate(definition)?;
    if definition.is_singleton() {
      slot.advance(BeanState::EarlyExposed);
    }

    populate::populate(self, definition, &mut raw)?;
    slot.advance(BeanState::Populated);

    let bean = self.pipeline.run(definition, raw)?;
    Ok(Arc::from(bean))
  }
}

impl DependencyResolver for Container {
  fn resolve_dependency(&self, name: &str) -> Result<BeanRef> {
    let handle = self.get_bean(name)?;
    // Only singletons under construction have a pending record.
    if let Some(owner) = core::current(self.id) {
      if self.singletons.pending(&owner).is_some() {
        self.singletons.record_dependent(name, &owner);
      }
    }
    Ok(handle)
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("config", &self.config)
      .field("definitions", &self.registry.len())
      .field("singletons", &self.singletons.finished_count())
      .field("pipeline", &self.pipeline)
      .finish()
  }
}

/// Assembles a [`Container`] and runs its startup.
///
/// ```
/// use sprig_ioc::{Autowired, BeanDefinition, Container};
///
/// #[derive(Default)]
/// struct Repository;
///
/// #[derive(Default)]
/// struct Service {
///   repository: Autowired<Repository>,
/// }
///
/// let container = Container::builder()
///   .definition(BeanDefinition::singleton::<Repository>("repository"))
///   .definition(
///     BeanDefinition::singleton::<Service>("service")
///       .autowire("repository", |s: &mut Service| &mut s.repository),
///   )
///   .build()
///   .unwrap();
///
/// let service = container.get::<Service>("service").unwrap();
/// assert!(service.repository.get().is_some());
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
  config: ContainerConfig,
  pipeline: LifecyclePipeline,
  definitions: Vec<BeanDefinition>,
}

impl ContainerBuilder {
  pub fn config(mut self, config: ContainerConfig) -> Self {
    self.config = config;
    self
  }

  /// Appends a post-processor; processors run in the order they are added.
  pub fn processor(mut self, processor: impl BeanPostProcessor + 'static) -> Self {
    self.pipeline.push(processor);
    self
  }

  /// Appends a processor that is also held elsewhere, such as a shared registry
  /// of hooks reused across containers.
  pub fn processor_shared(mut self, processor: Arc<dyn BeanPostProcessor>) -> Self {
    self.pipeline.push_shared(processor);
    self
  }

  pub fn definition(mut self, definition: impl Into<BeanDefinition>) -> Self {
    self.definitions.push(definition.into());
    self
  }

  pub fn definitions<I>(mut self, definitions: I) -> Self
  where
    I: IntoIterator,
    I::Item: Into<BeanDefinition>,
  {
    self
      .definitions
      .extend(definitions.into_iter().map(Into::into));
    self
  }

  /// Registers every definition and pre-instantiates the non-lazy singletons.
  /// Any failure aborts the build; no partially started container is returned.
  pub fn build(self) -> Result<Container> {
    if self.pipeline.is_empty() {
      debug!("building container without post-processors");
    }
    let processors = self.pipeline.len();
    let container = Container::new(self.config, self.pipeline);
    container.register_definitions(self.definitions)?;
    if let Err(err) = container.pre_instantiate_singletons() {
      warn!(error = %err, "container startup failed");
      return Err(err);
    }
    info!(
      definitions = container.definition_count(),
      singletons = container.singleton_count(),
      processors,
      "container started"
    );
    Ok(container)
  }
}
