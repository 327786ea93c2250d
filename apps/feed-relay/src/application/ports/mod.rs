//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FeedArchive`: fire-and-forget persistence of accepted feed messages

pub mod archive_port;

pub use archive_port::{ArchiveError, FeedArchive};
