pub mod access;
pub mod config;
pub mod error;
pub mod extract;
pub mod licensing;
pub mod telemetry;
