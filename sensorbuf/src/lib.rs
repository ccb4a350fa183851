//! # SensorBuf Simulator Library
//!
//! Application layer of the `sensorbuf` binary: the TOML application config
//! and a deterministic multi-device producer that feeds a
//! [`BufferCoordinator`](sensorbuf_store::BufferCoordinator).
//!
//! # Module Structure
//!
//! - [`app_config`] - `AppConfig` (shared + buffer + simulation sections)
//! - [`simulator`] - Synthetic sample generation and producer loop state

#![deny(missing_docs)]

pub mod app_config;
pub mod simulator;
