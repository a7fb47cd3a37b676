//! # Quad Particles
//!
//! High-throughput rendering of very large counts of textured quads ("particles").
//!
//! ## Features
//!
//! - **Static/Dynamic Split**: attributes that change every frame are packed into their own
//!   buffer; the rest are repacked only after structural changes
//! - **Fused Packing**: one specialized loop per attribute subset, with a precompiled
//!   per-attribute fallback that produces byte-identical output
//! - **Capacity Management**: growth and floor-bounded shrink with hysteresis
//! - **Quad Indices**: 16/32-bit index generation chosen by vertex count
//!
//! ## Modules
//!
//! - [`core`]: Errors and shared macros
//! - [`config`]: Configuration and logging setup
//! - [`render`]: Particle container, buffers and packing

/// Errors and shared macros
pub mod core;
/// Configuration system
pub mod config;
/// Particle rendering data path
pub mod render;

pub use crate::core::{ParticleError, ParticleResult};
