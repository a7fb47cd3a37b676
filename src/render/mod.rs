pub mod particles;

// Re-export Quad Particle components
pub use particles::{
    DeviceBuffers, Particle, ParticleBuffer, ParticleBufferOptions, ParticleContainer,
    ParticleTexture, PackingStrategy, Texture,
};
