//! # Event subscribers for the svcvisor runtime.
//!
//! ```text
//! Server ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet
//!                                                        ┌─────────┼─────────┐
//!                                                        ▼         ▼         ▼
//!                                                    LogWriter  Metrics   Custom
//! ```
//!
//! - [`Subscribe`]: the handler trait
//! - [`SubscriberSet`]: per-subscriber queues and workers
//! - [`LogWriter`]: writes lifecycle events through `tracing`

mod log;
mod subscriber;
mod subscriber_set;

pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
pub(crate) use subscriber_set::panic_info;
