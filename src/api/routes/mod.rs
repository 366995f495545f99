//! API route modules.

pub mod config;
pub mod debug;
pub mod email;
pub mod service;
