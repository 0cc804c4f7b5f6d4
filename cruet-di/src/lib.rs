//! Dependency injection container with explicit, programmatic
//! configuration.
//!
//! Beans are declared as [BeanDescriptor](scanner::BeanDescriptor)s -
//! constructors paired with metadata such as scope, qualifiers, lifecycle
//! hooks and registration conditions. A
//! [BeanContainerBuilder](factory::BeanContainerBuilder) scans the declared
//! sources and imports, registers surviving definitions and produces a
//! [BeanContainer](factory::BeanContainer) serving shared, lazily or eagerly
//! constructed instances by name or type.
//!
//! ```
//! use cruet_di::factory::BeanContainerBuilder;
//! use cruet_di::instance_provider::{BeanInstancePtr, TypedBeanInstanceProvider};
//! use cruet_di::scanner::BeanDescriptor;
//!
//! struct Repository;
//!
//! struct Service {
//!     repository: BeanInstancePtr<Repository>,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let container = BeanContainerBuilder::new()
//!     .register(BeanDescriptor::new::<Repository, _, _>("repository", |_| Ok(Repository)))
//!     .register(BeanDescriptor::new::<Service, _, _>("service", |provider| {
//!         Ok(Service {
//!             repository: provider.primary_instance_typed::<Repository>()?,
//!         })
//!     }))
//!     .build()?;
//!
//! let service = container.get_bean::<Service>("service")?;
//! assert!(BeanInstancePtr::ptr_eq(
//!     &service.repository,
//!     &container.get_bean::<Repository>("repository")?,
//! ));
//! # Ok(())
//! # }
//! ```
//!
//! Containers are thread-safe and cheap to clone; singleton construction is
//! serialized per bean name, so unrelated beans can be built concurrently.

pub mod bean_registry;
pub mod environment;
pub mod error;
pub mod factory;
pub mod instance_provider;
pub mod lifecycle;
pub mod proxy;
pub mod scanner;
pub mod scope;

mod resolver;
