//! Application Layer - Port definitions.
//!
//! Contracts between the relay core and its external collaborators,
//! following the Hexagonal Architecture pattern.

/// Port interfaces implemented by infrastructure adapters.
pub mod ports;
