//! SensorBuf Common Library
//!
//! This crate provides the sample value type, channel layout constants and
//! configuration loading utilities shared by all SensorBuf workspace crates.
//!
//! # Module Structure
//!
//! - [`sample`] - Timestamped multi-channel sample type
//! - [`consts`] - Channel layout and buffer sizing constants
//! - [`config`] - Configuration loading traits and types
//!
//! # Usage
//!
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! sensorbuf_common = { path = "../sensorbuf_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use sensorbuf_common::consts::CHANNEL_COUNT;
//! use sensorbuf_common::config::{BufferConfig, ConfigLoader};
//! ```

pub mod config;
pub mod consts;
pub mod sample;
