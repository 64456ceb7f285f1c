use sprig_ioc::{Autowired, BeanDefinition, Container};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// Two services that need each other.
#[derive(Default)]
struct OrderService {
  payments: Autowired<PaymentService>,
}

#[derive(Default)]
struct PaymentService {
  orders: Autowired<OrderService>,
}

impl OrderService {
  fn place(&self, item: &str) -> String {
    let payments = self.payments.get().expect("payments is wired at startup");
    format!("order for {item}, {}", payments.charge(10))
  }
}

impl PaymentService {
  fn charge(&self, amount: u32) -> String {
    format!("charged {amount}")
  }
}

fn main() {
  // RUST_LOG=sprig_ioc=debug shows the early reference being handed out.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let container = Container::builder()
    .definition(
      BeanDefinition::of::<OrderService>().autowire("paymentService", |o: &mut OrderService| {
        &mut o.payments
      }),
    )
    .definition(
      BeanDefinition::of::<PaymentService>()
        .autowire_by_type(|p: &mut PaymentService| &mut p.orders),
    )
    .build()
    .expect("container should start");

  println!("Registered: {:?}", container.definition_names());

  let orders = container.get::<OrderService>("orderService").unwrap();
  println!("{}", orders.place("book"));

  // Both sides of the cycle see the same, finished instances.
  let payments = container.get::<PaymentService>("paymentService").unwrap();
  assert!(Arc::ptr_eq(&payments.orders.get().unwrap(), &orders));
  assert!(Arc::ptr_eq(&orders.payments.get().unwrap(), &payments));
  println!("The cycle was resolved with shared instances.");
}
