//! The definition registry: bean metadata keyed by unique name.

use crate::definition::{is_valid_bean_name, BeanDefinition};
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
struct Entries {
  by_name: HashMap<String, Arc<BeanDefinition>>,
  // Registration order, for startup and `names()`.
  order: Vec<String>,
}

#[derive(Default)]
pub(crate) struct DefinitionRegistry {
  entries: RwLock<Entries>,
}

impl DefinitionRegistry {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Inserts every definition, or none of them.
  pub(crate) fn register(&self, definitions: Vec<BeanDefinition>) -> Result<usize> {
    let mut entries = self.entries.write();

    let mut batch = HashSet::with_capacity(definitions.len());
    for definition in &definitions {
      let name = definition.name();
      if !is_valid_bean_name(name) {
        return Err(Error::InvalidBeanName(format!(
          "empty bean name for type {}",
          definition.type_name()
        )));
      }
      if entries.by_name.contains_key(name) || !batch.insert(name) {
        return Err(Error::DuplicateDefinition(name.to_owned()));
      }
    }

    let count = definitions.len();
    for definition in definitions {
      let name = definition.name().to_owned();
      tracing::trace!(bean = %name, scope = ?definition.scope(), "registered bean definition");
      entries.order.push(name.clone());
      entries.by_name.insert(name, Arc::new(definition));
    }
    Ok(count)
  }

  pub(crate) fn lookup(&self, name: &str) -> Result<Arc<BeanDefinition>> {
    self
      .entries
      .read()
      .by_name
      .get(name)
      .cloned()
      .ok_or_else(|| Error::DefinitionNotFound(name.to_owned()))
  }

  pub(crate) fn contains(&self, name: &str) -> bool {
    self.entries.read().by_name.contains_key(name)
  }

  pub(crate) fn len(&self) -> usize {
    self.entries.read().order.len()
  }

  pub(crate) fn names(&self) -> Vec<String> {
    self.entries.read().order.clone()
  }

  /// Definitions in registration order.
  pub(crate) fn definitions(&self) -> Vec<Arc<BeanDefinition>> {
    let entries = self.entries.read();
    entries
      .order
      .iter()
      .filter_map(|name| entries.by_name.get(name).cloned())
      .collect()
  }

  /// Names of every definition whose implementation type is `type_id`.
  pub(crate) fn find_by_type(&self, type_id: TypeId) -> Vec<String> {
    let entries = self.entries.read();
    entries
      .order
      .iter()
      .filter(|name| {
        entries
          .by_name
          .get(name.as_str())
          .map_or(false, |definition| definition.type_id() == type_id)
      })
      .cloned()
      .collect()
  }
}
