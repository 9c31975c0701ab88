//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the catalog synchronization core:
//! - Logging and tracing infrastructure
//! - Synchronization configuration
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on. It
//! establishes the logging conventions, the validated configuration types and
//! the event broadcasting mechanism used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
