//! Cloud account linking: per-provider credential validation and storage.

pub mod credentials;
pub mod linker;
