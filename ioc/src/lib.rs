//! # Sprig IoC
//!
//! A thread-safe bean container: it instantiates managed types from declarative
//! [`BeanDefinition`]s, wires their declared dependencies, and runs a lifecycle
//! pipeline around construction.
//!
//! ## Core Concepts
//!
//! - **Bean definitions**: immutable metadata naming a type, its scope
//!   (singleton or prototype), whether it is lazy, and its dependency edges.
//! - **Container**: owns the definition registry, the singleton cache and the
//!   lifecycle pipeline. Non-lazy singletons are built at startup; a failure there
//!   aborts the whole build.
//! - **Handles**: dependents hold [`BeanRef`]s (or typed [`Autowired`] fields), not
//!   the beans themselves. This is what lets two singletons refer to each other: the
//!   second one receives an *early reference* to the first, which becomes readable
//!   as soon as the first finishes.
//! - **Post-processors**: [`BeanPostProcessor`]s run before and after each bean's
//!   init callback and may wrap or replace the instance.
//!
//! ## Quick Start
//!
//! ```
//! use sprig_ioc::{Autowired, BeanDefinition, Container};
//!
//! #[derive(Default)]
//! struct OrderService {
//!   payments: Autowired<PaymentService>,
//! }
//!
//! #[derive(Default)]
//! struct PaymentService {
//!   orders: Autowired<OrderService>,
//! }
//!
//! let container = Container::builder()
//!   .definition(
//!     BeanDefinition::singleton::<OrderService>("orders")
//!       .autowire("payments", |o: &mut OrderService| &mut o.payments),
//!   )
//!   .definition(
//!     BeanDefinition::singleton::<PaymentService>("payments")
//!       .autowire("orders", |p: &mut PaymentService| &mut p.orders),
//!   )
//!   .build()
//!   .expect("container should start");
//!
//! let orders = container.get::<OrderService>("orders").unwrap();
//! let payments = orders.payments.get().unwrap();
//! let back = payments.orders.get().unwrap();
//! assert!(std::sync::Arc::ptr_eq(&orders, &back));
//! ```

mod bean;
mod cache;
mod config;
mod container;
mod core;
mod definition;
mod error;
mod instantiator;
mod lifecycle;
mod macros;
mod populate;
mod registry;

pub use bean::{Autowired, BeanRef, BeanState, SharedBean};
pub use config::ContainerConfig;
pub use container::{Container, ContainerBuilder};
pub use definition::{bean_name_for, BeanDefinition, BeanObject, DefinitionBuilder, DependencyEdge, Scope};
pub use error::{BoxError, Error, ProcessorStage, Result};
pub use lifecycle::{BeanPostProcessor, LifecyclePipeline};
