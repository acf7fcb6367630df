//! PetFeeder firmware library.
//!
//! Exposes the dispensing controllers, the command gateway and the adapters
//! for integration testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; host builds run on
//! simulation backends.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod scheduler;

pub mod adapters;
pub mod drivers;
pub mod sensors;

mod pins;
