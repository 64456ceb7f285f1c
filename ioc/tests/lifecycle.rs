use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use sprig_ioc::{
  Autowired, BeanDefinition, BeanObject, BeanPostProcessor, BoxError, Container, ContainerConfig, Error,
  LifecyclePipeline, ProcessorStage,
};
use std::sync::Arc;

// --- Lifecycle Test Fixtures ---

#[derive(Default)]
struct Ledger {
  tagged: bool,
  audit: Autowired<Audit>,
}

#[derive(Default)]
struct Audit {
  tagged: bool,
  ledger: Autowired<Ledger>,
}

/// Marks every bean it knows about, and records each name it sees.
#[derive(Default)]
struct Tagger {
  seen: Arc<Mutex<Vec<String>>>,
}

impl BeanPostProcessor for Tagger {
  fn after_initialization(&self, mut bean: BeanObject, bean_name: &str) -> Result<BeanObject, BoxError> {
    if let Some(ledger) = bean.downcast_mut::<Ledger>() {
      ledger.tagged = true;
    }
    if let Some(audit) = bean.downcast_mut::<Audit>() {
      audit.tagged = true;
    }
    self.seen.lock().push(bean_name.to_owned());
    Ok(bean)
  }
}

/// Appends a line per stage to a shared log.
struct Recorder {
  log: Arc<Mutex<Vec<String>>>,
}

impl BeanPostProcessor for Recorder {
  fn before_initialization(&self, bean: BeanObject, bean_name: &str) -> Result<BeanObject, BoxError> {
    self.log.lock().push(format!("before:{bean_name}"));
    Ok(bean)
  }

  fn after_initialization(&self, bean: BeanObject, bean_name: &str) -> Result<BeanObject, BoxError> {
    self.log.lock().push(format!("after:{bean_name}"));
    Ok(bean)
  }
}

fn ledger() -> BeanDefinition {
  BeanDefinition::singleton::<Ledger>("ledger")
    .autowire("audit", |l: &mut Ledger| &mut l.audit)
    .build()
}

fn audit() -> BeanDefinition {
  BeanDefinition::singleton::<Audit>("audit")
    .autowire("ledger", |a: &mut Audit| &mut a.ledger)
    .build()
}

// --- Lifecycle Tests ---

#[test]
fn test_processor_sees_every_singleton_at_startup() {
  // Arrange
  let seen = Arc::new(Mutex::new(Vec::new()));

  // Act
  let container = Container::builder()
    .processor(Tagger { seen: seen.clone() })
    .definition(ledger())
    .definition(audit())
    .build()
    .unwrap();

  // Assert
  // "audit" finishes first because "ledger" is still waiting on it.
  assert_eq!(*seen.lock(), vec!["audit", "ledger"]);
  assert!(container.get::<Ledger>("ledger").unwrap().tagged);
  assert!(container.get::<Audit>("audit").unwrap().tagged);
}

#[test]
fn test_early_reference_holders_see_the_processed_instance() {
  // Arrange
  let container = Container::builder()
    .processor(Tagger::default())
    .definition(ledger())
    .definition(audit())
    .build()
    .unwrap();

  // Act
  let audit = container.get::<Audit>("audit").unwrap();

  // Assert
  // "audit" received "ledger" as an early reference before it was tagged.
  let ledger = audit.ledger.get().unwrap();
  assert!(ledger.tagged);
  assert!(Arc::ptr_eq(&ledger, &container.get::<Ledger>("ledger").unwrap()));
}

#[test]
fn test_stages_wrap_the_init_callback_in_order() {
  // Arrange
  let log = Arc::new(Mutex::new(Vec::new()));
  let init_log = log.clone();

  // Act
  let _container = Container::builder()
    .processor(Recorder { log: log.clone() })
    .definition(
      BeanDefinition::singleton::<Audit>("audit").init_method(move |_| {
        init_log.lock().push("init:audit".to_string());
        Ok(())
      }),
    )
    .build()
    .unwrap();

  // Assert
  assert_eq!(*log.lock(), vec!["before:audit", "init:audit", "after:audit"]);
}

#[test]
fn test_prototype_runs_the_pipeline_per_request() {
  // Arrange
  let log = Arc::new(Mutex::new(Vec::new()));
  let container = Container::builder()
    .processor(Recorder { log: log.clone() })
    .definition(BeanDefinition::prototype::<Audit>("audit"))
    .build()
    .unwrap();
  assert!(log.lock().is_empty());

  // Act
  container.get_bean("audit").unwrap();
  container.get_bean("audit").unwrap();

  // Assert
  assert_eq!(log.lock().len(), 4);
}

#[test]
fn test_processor_can_replace_the_instance() {
  struct Proxy {
    target: &'static str,
  }

  struct Proxying;

  impl BeanPostProcessor for Proxying {
    fn after_initialization(&self, bean: BeanObject, _: &str) -> Result<BeanObject, BoxError> {
      if bean.is::<Ledger>() {
        return Ok(Box::new(Proxy { target: "ledger" }));
      }
      Ok(bean)
    }
  }

  // Arrange
  let container = Container::builder()
    .processor(Proxying)
    .definition(BeanDefinition::singleton::<Ledger>("ledger"))
    .build()
    .unwrap();

  // Act
  let proxy = container.get::<Proxy>("ledger").unwrap();

  // Assert
  assert_eq!(proxy.target, "ledger");
  assert!(matches!(
    container.get::<Ledger>("ledger"),
    Err(Error::BeanTypeMismatch { .. })
  ));
}

#[test]
fn test_processor_failure_aborts_the_build() {
  struct Rejecting;

  impl BeanPostProcessor for Rejecting {
    fn after_initialization(&self, _: BeanObject, bean_name: &str) -> Result<BeanObject, BoxError> {
      Err(format!("{bean_name} is not allowed").into())
    }
  }

  // Act
  let result = Container::builder()
    .processor(Rejecting)
    .definition(BeanDefinition::singleton::<Audit>("audit"))
    .build();

  // Assert
  match result {
    Err(err @ Error::PostProcessorFailure { .. }) => {
      assert!(err.to_string().contains("audit is not allowed"));
      assert!(matches!(
        err,
        Error::PostProcessorFailure { stage: ProcessorStage::AfterInitialization, .. }
      ));
    }
    Err(other) => panic!("expected a post-processor failure, got {other}"),
    Ok(_) => panic!("expected the build to fail"),
  }
}

#[test]
fn test_init_failure_is_reported() {
  let result = Container::builder()
    .definition(
      BeanDefinition::singleton::<Audit>("audit").init_method(|_| Err("missing license".into())),
    )
    .build();

  assert!(matches!(
    result,
    Err(Error::InitializationFailure { name, .. }) if name == "audit"
  ));
}

#[test]
fn test_shared_processor_serves_several_containers() {
  // Arrange
  let seen = Arc::new(Mutex::new(Vec::new()));
  let tagger: Arc<dyn BeanPostProcessor> = Arc::new(Tagger { seen: seen.clone() });

  // Act
  let first = Container::builder()
    .processor_shared(tagger.clone())
    .definition(BeanDefinition::singleton::<Audit>("first"))
    .build()
    .unwrap();
  let second = Container::builder()
    .processor_shared(tagger)
    .definition(BeanDefinition::singleton::<Audit>("second"))
    .build()
    .unwrap();

  // Assert
  assert_eq!(*seen.lock(), vec!["first", "second"]);
  assert!(first.get::<Audit>("first").unwrap().tagged);
  assert!(second.get::<Audit>("second").unwrap().tagged);
}

#[test]
fn test_container_from_an_assembled_pipeline() {
  // Arrange
  let log = Arc::new(Mutex::new(Vec::new()));
  let mut pipeline = LifecyclePipeline::new();
  assert!(pipeline.is_empty());
  pipeline.push(Recorder { log: log.clone() });
  pipeline.push_shared(Arc::new(Tagger::default()));
  assert_eq!(pipeline.len(), 2);

  let container = Container::new(ContainerConfig::default(), pipeline);
  container
    .register_definitions([BeanDefinition::singleton::<Ledger>("ledger")])
    .unwrap();

  // Act
  let ledger = container.get::<Ledger>("ledger").unwrap();

  // Assert
  assert!(ledger.tagged);
  assert_eq!(*log.lock(), vec!["before:ledger", "after:ledger"]);
}
