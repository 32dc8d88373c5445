//! ciclomap-cli library: Exposes the local client's modules for testing.
//!
//! This is a thin layer over ciclomap-core that persists one client's view
//! of the shared collection to a JSON file between invocations.

pub mod commands;
pub mod config;
pub mod session;
pub mod state;

pub use commands::Command;
pub use config::Config;
pub use session::{OutputFormat, Session};
pub use state::LocalState;
