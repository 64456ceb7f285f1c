//! Allocation of bare bean instances.

use crate::definition::{BeanDefinition, BeanObject, Construction};
use crate::error::{Error, Result};

/// Produces a bare instance through the type's default construction path.
/// Nothing is wired yet; that is the populator's job.
pub(crate) fn instantiate(definition: &BeanDefinition) -> Result<BeanObject> {
  match definition.construction() {
    Construction::Default(construct) => {
      tracing::trace!(bean = definition.name(), type_name = definition.type_name(), "instantiating");
      Ok(construct())
    }
    Construction::NoDefaultConstructor => Err(failure(definition, "type has no default constructor")),
    Construction::Abstract => Err(failure(definition, "type is abstract or an interface")),
  }
}

fn failure(definition: &BeanDefinition, reason: &str) -> Error {
  Error::InstantiationFailure {
    name: definition.name().to_owned(),
    type_name: definition.type_name(),
    reason: reason.to_owned(),
  }
}
