//! The lifecycle pipeline run around a bean's init callback.

use crate::definition::{BeanDefinition, BeanObject};
use crate::error::{BoxError, Error, ProcessorStage, Result};
use std::fmt;
use std::sync::Arc;

/// A hook that observes, wraps or replaces beans around initialization.
///
/// Both stages receive the current instance and return the instance that the
/// rest of the pipeline (and finally every dependent) sees. The defaults pass
/// the bean through unchanged.
///
/// ```
/// use sprig_ioc::{BeanObject, BeanPostProcessor, BoxError};
///
/// struct Audit;
///
/// impl BeanPostProcessor for Audit {
///   fn after_initialization(&self, bean: BeanObject, bean_name: &str) -> Result<BeanObject, BoxError> {
///     println!("{bean_name} is ready");
///     Ok(bean)
///   }
/// }
/// ```
pub trait BeanPostProcessor: Send + Sync {
  fn before_initialization(&self, bean: BeanObject, bean_name: &str) -> Result<BeanObject, BoxError> {
    let _ = bean_name;
    Ok(bean)
  }

  fn after_initialization(&self, bean: BeanObject, bean_name: &str) -> Result<BeanObject, BoxError> {
    let _ = bean_name;
    Ok(bean)
  }
}

/// Processors in registration order.
#[derive(Clone, Default)]
pub struct LifecyclePipeline {
  processors: Vec<Arc<dyn BeanPostProcessor>>,
}

impl LifecyclePipeline {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, processor: impl BeanPostProcessor + 'static) {
    self.processors.push(Arc::new(processor));
  }

  pub fn push_shared(&mut self, processor: Arc<dyn BeanPostProcessor>) {
    self.processors.push(processor);
  }

  pub fn len(&self) -> usize {
    self.processors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.processors.is_empty()
  }

  /// Before-stages, the definition's init callback, then after-stages.
  pub(crate) fn run(&self, definition: &BeanDefinition, bean: BeanObject) -> Result<BeanObject> {
    let name = definition.name();
    let mut bean = self.apply(ProcessorStage::BeforeInitialization, bean, name)?;

    match definition.run_init(&mut *bean) {
      Some(Ok(())) => tracing::trace!(bean = name, "init callback completed"),
      Some(Err(source)) => {
        return Err(Error::InitializationFailure {
          name: name.to_owned(),
          source,
        })
      }
      None if definition.has_init_callback() => {
        tracing::debug!(
          bean = name,
          "instance was replaced by a post-processor; skipping init callback"
        );
      }
      None => {}
    }

    self.apply(ProcessorStage::AfterInitialization, bean, name)
  }

  fn apply(&self, stage: ProcessorStage, mut bean: BeanObject, name: &str) -> Result<BeanObject> {
    for processor in &self.processors {
      let result = match stage {
        ProcessorStage::BeforeInitialization => processor.before_initialization(bean, name),
        ProcessorStage::AfterInitialization => processor.after_initialization(bean, name),
      };
      bean = result.map_err(|source| Error::PostProcessorFailure {
        name: name.to_owned(),
        stage,
        source,
      })?;
    }
    Ok(bean)
  }
}

impl fmt::Debug for LifecyclePipeline {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LifecyclePipeline")
      .field("processors", &self.processors.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use parking_lot::Mutex;
  use pretty_assertions::assert_eq;

  #[derive(Default)]
  struct Widget {
    log: Vec<String>,
  }

  struct Recorder {
    label: &'static str,
  }

  impl BeanPostProcessor for Recorder {
    fn before_initialization(&self, mut bean: BeanObject, _: &str) -> Result<BeanObject, BoxError> {
      if let Some(widget) = bean.downcast_mut::<Widget>() {
        widget.log.push(format!("before:{}", self.label));
      }
      Ok(bean)
    }

    fn after_initialization(&self, mut bean: BeanObject, _: &str) -> Result<BeanObject, BoxError> {
      if let Some(widget) = bean.downcast_mut::<Widget>() {
        widget.log.push(format!("after:{}", self.label));
      }
      Ok(bean)
    }
  }

  fn widget_definition() -> BeanDefinition {
    BeanDefinition::singleton::<Widget>("widget")
      .init_method(|w: &mut Widget| {
        w.log.push("init".to_string());
        Ok(())
      })
      .build()
  }

  #[test]
  fn stages_run_in_registration_order_around_init() {
    let mut pipeline = LifecyclePipeline::new();
    pipeline.push(Recorder { label: "first" });
    pipeline.push(Recorder { label: "second" });

    let bean = pipeline
      .run(&widget_definition(), Box::new(Widget::default()))
      .unwrap();

    assert_eq!(
      bean.downcast_ref::<Widget>().unwrap().log,
      vec!["before:first", "before:second", "init", "after:first", "after:second"]
    );
  }

  #[test]
  fn substituted_instance_carries_forward() {
    struct Replace;
    impl BeanPostProcessor for Replace {
      fn after_initialization(&self, _: BeanObject, name: &str) -> Result<BeanObject, BoxError> {
        Ok(Box::new(format!("replacement for {name}")))
      }
    }

    let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
    struct Observe(std::sync::Arc<Mutex<Vec<String>>>);
    impl BeanPostProcessor for Observe {
      fn after_initialization(&self, bean: BeanObject, _: &str) -> Result<BeanObject, BoxError> {
        if let Some(text) = bean.downcast_ref::<String>() {
          self.0.lock().push(text.clone());
        }
        Ok(bean)
      }
    }

    let mut pipeline = LifecyclePipeline::new();
    pipeline.push(Replace);
    pipeline.push(Observe(seen.clone()));

    let bean = pipeline
      .run(&widget_definition(), Box::new(Widget::default()))
      .unwrap();

    assert_eq!(bean.downcast_ref::<String>().unwrap(), "replacement for widget");
    assert_eq!(*seen.lock(), vec!["replacement for widget"]);
  }

  #[test]
  fn failing_stage_reports_bean_and_stage() {
    struct Reject;
    impl BeanPostProcessor for Reject {
      fn before_initialization(&self, _: BeanObject, _: &str) -> Result<BeanObject, BoxError> {
        Err("rejected".into())
      }
    }

    let mut pipeline = LifecyclePipeline::new();
    pipeline.push(Reject);

    let err = pipeline
      .run(&widget_definition(), Box::new(Widget::default()))
      .unwrap_err();

    assert!(matches!(
      err,
      Error::PostProcessorFailure { ref name, stage: ProcessorStage::BeforeInitialization, .. } if name == "widget"
    ));
  }

  #[test]
  fn failing_init_callback_is_reported() {
    let definition = BeanDefinition::singleton::<Widget>("widget")
      .init_method(|_| Err("not ready".into()))
      .build();

    let err = LifecyclePipeline::new()
      .run(&definition, Box::new(Widget::default()))
      .unwrap_err();

    assert!(matches!(err, Error::InitializationFailure { ref name, .. } if name == "widget"));
    assert!(err.to_string().contains("not ready"));
  }
}
