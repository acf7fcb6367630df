//! Sensor subsystem: the raw drivers and the filtering [`SensorSampler`].
//!
//! The drivers only know how to talk to their chip. Everything that decides
//! whether a reading can be trusted lives in [`sampler`].

pub mod load_cell;
pub mod sampler;
pub mod ultrasonic;

pub use sampler::{SamplerConfig, SensorSampler, StableWeight, WeightSample};
