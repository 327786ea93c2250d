//! Relay Core
//!
//! The subscriber registry and the supervisor that ties the registry, the
//! archive writer, and the feed session task into one lifecycle.

pub mod registry;
pub mod supervisor;

pub use registry::{SubscriberId, SubscriberRegistry};
pub use supervisor::{RelayHandle, RelaySupervisor};
