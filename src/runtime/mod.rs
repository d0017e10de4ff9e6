//! # Runtime
//!
//! Process wiring: startup, the controller watch loop, and its error policy.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
