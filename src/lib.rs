//! Workspace facade crate.
//!
//! Exposes feature flags that map to the individual workspace crates
//! (`bridge-traits`, `core-catalog`, `core-runtime`, `core-sync`) so a host
//! scheduler can depend on `metasync-workspace` and get the whole metadata
//! synchronization stack without wiring each crate individually.

#[cfg(feature = "sync")]
pub use bridge_traits as connector;
#[cfg(any(feature = "sync", feature = "sqlite"))]
pub use core_catalog as catalog;
#[cfg(feature = "sync")]
pub use core_runtime as runtime;
#[cfg(feature = "sync")]
pub use core_sync as sync;
