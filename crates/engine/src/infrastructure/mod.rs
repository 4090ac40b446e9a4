//! External dependency implementations (ports + adapters).

pub mod binary;
pub mod ports;
pub mod scheduler;

/// Test doubles for the port traits.
#[cfg(test)]
pub mod testing;
