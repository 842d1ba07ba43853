//! # Dependency population.
//!
//! Explicit, eagerly resolved dependency injection:
//! - services declare slots with [`Dependency::of`] / [`Dependency::named`];
//! - the entry point provides root singletons to the [`Populator`];
//! - the populator resolves every declared slot against roots and registered services,
//!   rejects unresolved, ambiguous and cyclic bindings, then calls
//!   [`Service::populate`](crate::Service::populate) with an [`Injector`];
//! - services keep what they receive in [`Slot`]s.
//!
//! ```text
//! roots: Settings ──┐
//! services: [Pool, Controller, Worker] ──► Populator::populate(snapshot)
//!                                          ├─ resolve all slots (type [+ name])
//!                                          ├─ detect cycles between services
//!                                          └─ populate(&Injector) for each service
//! ```

mod dependency;
mod populator;
mod slot;

pub use dependency::{Dependency, Injector};
pub use populator::Populator;
pub use slot::Slot;
