//! Offload client configuration.

pub mod config;

pub use config::{MAX_OFFLOAD_MESSAGE_BYTES, MAX_PROVIDER_MESSAGE_BYTES, OffloadConfig};
