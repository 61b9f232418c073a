//! Core types: errors, configuration, resource identifiers.

pub mod config;
pub mod errors;
pub mod resource_id;
