//! Accessibility tree acquisition and indexed action dispatch for desktop agents.

pub mod api;
pub mod config;
pub mod desktop;
pub mod error;
pub mod runs;
pub mod tools;
