use thiserror::Error;

/// Boxed error returned by user supplied hooks (init callbacks, post-processors).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The lifecycle stage a post-processor failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorStage {
  BeforeInitialization,
  AfterInitialization,
}

impl std::fmt::Display for ProcessorStage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ProcessorStage::BeforeInitialization => f.write_str("before-initialization"),
      ProcessorStage::AfterInitialization => f.write_str("after-initialization"),
    }
  }
}

/// The main error type for `sprig_ioc`.
#[derive(Debug, Error)]
pub enum Error {
  #[error("Bean definition '{0}' is already registered")]
  DuplicateDefinition(String),

  #[error("No bean definition named '{0}'")]
  DefinitionNotFound(String),

  #[error("Invalid bean name: {0}")]
  InvalidBeanName(String),

  #[error("Failed to instantiate bean '{name}' of type {type_name}: {reason}")]
  InstantiationFailure {
    name: String,
    type_name: &'static str,
    reason: String,
  },

  #[error("Bean '{owner}' requires '{target}', which is not registered")]
  RequiredDependencyMissing { owner: String, target: String },

  #[error("Circular dependency through prototype-scoped bean(s): {}", path.join(" -> "))]
  CircularPrototypeDependency { name: String, path: Vec<String> },

  #[error("Circular reference to singleton '{name}' is not allowed: {}", path.join(" -> "))]
  CircularReference { name: String, path: Vec<String> },

  #[error("Resolution of '{name}' exceeded the maximum depth of {max_depth}")]
  ResolutionDepthExceeded { name: String, max_depth: usize },

  #[error("Post-processor failed for bean '{name}' during {stage}: {source}")]
  PostProcessorFailure {
    name: String,
    stage: ProcessorStage,
    #[source]
    source: BoxError,
  },

  #[error("Init callback failed for bean '{name}': {source}")]
  InitializationFailure {
    name: String,
    #[source]
    source: BoxError,
  },

  #[error("Bean '{name}' is not of the requested type {requested}")]
  BeanTypeMismatch {
    name: String,
    requested: &'static str,
  },

  #[error("Type {type_name} matches more than one bean: {}", candidates.join(", "))]
  AmbiguousBeanType {
    type_name: &'static str,
    candidates: Vec<String>,
  },

  #[error("Failed to read configuration file: {0}")]
  ConfigRead(#[from] std::io::Error),

  #[error("Failed to parse configuration: {0}")]
  ConfigParse(String),
}

/// A specialized `Result` type for `sprig_ioc` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
