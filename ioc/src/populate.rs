//! Dependency population: wiring a raw instance's declared edges.

use crate::bean::BeanRef;
use crate::definition::{BeanDefinition, BeanObject};
use crate::error::{Error, Result};

/// Resolves a bean by name on behalf of the populator.
///
/// The container implements this by re-entering its own `get_bean`, which is
/// where singleton cycles are detected and broken.
pub(crate) trait DependencyResolver {
  fn resolve_dependency(&self, name: &str) -> Result<BeanRef>;
}

/// Resolves every edge of `definition` in declaration order and injects the
/// resulting handles into `bean`.
pub(crate) fn populate<R>(resolver: &R, definition: &BeanDefinition, bean: &mut BeanObject) -> Result<()>
where
  R: DependencyResolver + ?Sized,
{
  for edge in definition.dependencies() {
    let handle = match resolver.resolve_dependency(edge.target()) {
      Ok(handle) => handle,
      Err(Error::DefinitionNotFound(missing)) if missing == edge.target() => {
        if edge.is_required() {
          return Err(Error::RequiredDependencyMissing {
            owner: edge.owner().to_owned(),
            target: missing,
          });
        }
        tracing::debug!(
          bean = edge.owner(),
          dependency = edge.target(),
          "optional dependency is not registered; leaving it unwired"
        );
        continue;
      }
      Err(err) => return Err(err),
    };
    edge.inject(&mut **bean, handle);
  }
  Ok(())
}
