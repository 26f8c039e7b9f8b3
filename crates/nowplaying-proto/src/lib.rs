//! Shared data model, wire payloads and configuration for the now-playing display.

pub mod config;
pub mod platform;
pub mod protocol;
pub mod wire;
