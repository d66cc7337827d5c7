//! Application Layer - Use Cases

pub mod config;
pub mod deactivate_instance;
pub mod manage_license;
pub mod request_guard;
pub mod validate_license;
