use sprig_ioc::{BeanDefinition, BeanObject, BeanPostProcessor, BoxError, Container, ContainerConfig};
use std::time::Instant;

#[derive(Default)]
struct Cache {
  warmed: bool,
}

// Logs every bean as it passes through the pipeline.
struct Timing {
  started: Instant,
}

impl BeanPostProcessor for Timing {
  fn before_initialization(&self, bean: BeanObject, bean_name: &str) -> Result<BeanObject, BoxError> {
    println!("[{:?}] initializing '{bean_name}'", self.started.elapsed());
    Ok(bean)
  }

  fn after_initialization(&self, bean: BeanObject, bean_name: &str) -> Result<BeanObject, BoxError> {
    println!("[{:?}] '{bean_name}' is ready", self.started.elapsed());
    Ok(bean)
  }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let config = ContainerConfig::from_yaml_str(
    "max_resolution_depth: 16\nallow_circular_references: false\n",
  )?;

  let container = Container::builder()
    .config(config)
    .processor(Timing {
      started: Instant::now(),
    })
    .definition(BeanDefinition::singleton::<Cache>("cache").init_method(|cache| {
      cache.warmed = true;
      Ok(())
    }))
    .build()?;

  let cache = container.get::<Cache>("cache")?;
  println!("cache warmed: {}", cache.warmed);
  Ok(())
}
