//! dbcloud Core
//!
//! Resource model, attribute schemas and the readiness poller shared by the
//! dbcloud provider and CLI.

pub mod differ;
pub mod duration;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod waiter;
