//! Runtime events: types and broadcast bus.
//!
//! The [`Server`](crate::Server) publishes one event per lifecycle step of every
//! service and per shutdown step; the subscriber listener fans them out to
//! [`Subscribe`](crate::Subscribe) implementations (e.g. [`LogWriter`](crate::LogWriter)).
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
