//! Per-connection session information

pub mod context;

pub use context::{Role, SessionContext};
