//! GPU resource management, the point-sprite renderer and post-processing.
//!
//! Provides wgpu device/surface initialization, growable vertex buffers,
//! the [`point_renderer::PointRenderer`] that implements
//! [`crate::frame::TileRenderer`], and the bloom and tone-mapping passes
//! that turn its HDR output into the displayed frame.

/// Threshold extraction and the blurred bloom levels.
pub mod bloom;
/// Growable GPU buffers with automatic reallocation.
pub mod dynamic_buffer;
/// Shared bind group layout entries and full-screen pipeline setup.
pub mod pipeline_helpers;
/// Instanced point sprites, one draw per tile.
pub mod point_renderer;
/// HDR tile target, bloom composite and ACES tone mapping.
pub mod post_process;
/// wgpu device, surface, and queue initialization.
pub mod render_context;
