//! Glow around bright sprites.
//!
//! Texels above a luminance threshold are extracted from the HDR tile image
//! at half resolution, then pushed down a chain of [`MIP_LEVELS`] targets,
//! each half the size of the previous one. Every level is blurred with a
//! separable Gaussian whose kernel widens with depth. The composite pass
//! sums the levels with [`level_weights`].

use wgpu::util::DeviceExt;

use super::pipeline_helpers::{
    create_screen_space_pipeline, create_shader, draw_fullscreen,
    filtering_sampler, linear_sampler, render_target, texture_2d,
    uniform_buffer,
};
use super::post_process::HDR_FORMAT;

/// Number of blur levels.
pub const MIP_LEVELS: usize = 5;
/// Gaussian kernel radius per level, in texels of that level.
pub const KERNEL_RADII: [u32; MIP_LEVELS] = [3, 5, 7, 9, 11];
/// Per-level contribution before the radius is applied; level 0 is the
/// sharpest.
const LEVEL_FACTORS: [f32; MIP_LEVELS] = [1.0, 0.8, 0.6, 0.4, 0.2];
/// Kernel taps the blur uniform holds (center plus the widest radius).
const MAX_TAPS: usize = 12;
/// Luminance range over which the threshold fades in.
const THRESHOLD_SOFTNESS: f32 = 0.01;

/// Threshold uniform. Must match the WGSL `Threshold` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ThresholdParams {
    /// Luminance at which texels start to glow.
    pub threshold: f32,
    /// Width of the fade-in above `threshold`.
    pub softness: f32,
    _pad: [f32; 2],
}

impl ThresholdParams {
    /// Params for a luminance `threshold`.
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self {
            threshold,
            softness: THRESHOLD_SOFTNESS,
            _pad: [0.0; 2],
        }
    }
}

/// Blur uniform for one direction at one level. Must match the WGSL `Blur`
/// struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlurParams {
    /// Size of one texel of the target level in UV units.
    pub texel_size: [f32; 2],
    /// `[1, 0]` for the horizontal pass, `[0, 1]` for the vertical one.
    pub direction: [f32; 2],
    /// Tap weights, center first, packed four to a vector.
    pub weights: [[f32; 4]; MAX_TAPS / 4],
    /// Taps on each side of the center.
    pub radius: u32,
    _pad: [u32; 3],
}

impl BlurParams {
    /// Params for a level of `size` pixels blurred with `radius`.
    #[must_use]
    pub fn new(size: (u32, u32), horizontal: bool, radius: u32) -> Self {
        let taps = gaussian_weights(radius);
        let mut weights = [[0.0; 4]; MAX_TAPS / 4];
        for (i, w) in taps.iter().enumerate() {
            weights[i / 4][i % 4] = *w;
        }
        Self {
            texel_size: [
                1.0 / size.0.max(1) as f32,
                1.0 / size.1.max(1) as f32,
            ],
            direction: if horizontal { [1.0, 0.0] } else { [0.0, 1.0] },
            weights,
            radius: radius.min(MAX_TAPS as u32 - 1),
            _pad: [0; 3],
        }
    }
}

/// One-sided Gaussian tap weights with sigma equal to `radius`, normalized
/// so the full symmetric kernel sums to one. Radii past the uniform's
/// capacity are clamped.
#[must_use]
pub fn gaussian_weights(radius: u32) -> [f32; MAX_TAPS] {
    let radius = (radius as usize).min(MAX_TAPS - 1);
    let mut weights = [0.0; MAX_TAPS];
    if radius == 0 {
        weights[0] = 1.0;
        return weights;
    }
    let sigma = radius as f32;
    for (i, w) in weights.iter_mut().enumerate().take(radius + 1) {
        let x = i as f32;
        *w = (-0.5 * x * x / (sigma * sigma)).exp() / sigma;
    }
    let total = weights[0] + 2.0 * weights[1..=radius].iter().sum::<f32>();
    for w in &mut weights {
        *w /= total;
    }
    weights
}

/// Composite weight of each level. `radius` 0 favors the sharp levels, 1
/// the wide ones.
#[must_use]
pub fn level_weights(radius: f32) -> [f32; MIP_LEVELS] {
    let radius = radius.clamp(0.0, 1.0);
    LEVEL_FACTORS.map(|f| (1.2 - f).mul_add(radius, f * (1.0 - radius)))
}

/// Pixel size of blur level `level` for an image of `size`.
#[must_use]
pub fn level_size(size: (u32, u32), level: usize) -> (u32, u32) {
    let shift = level as u32 + 1;
    ((size.0 >> shift).max(1), (size.1 >> shift).max(1))
}

/// Threshold extraction and the blurred level chain.
pub struct BloomPass {
    threshold_pipeline: wgpu::RenderPipeline,
    threshold_layout: wgpu::BindGroupLayout,
    threshold_bind_group: wgpu::BindGroup,
    threshold_buffer: wgpu::Buffer,
    blur_pipeline: wgpu::RenderPipeline,
    blur_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// Thresholded image at level-0 size.
    extract_view: wgpu::TextureView,
    /// Horizontal blur results.
    ping_views: Vec<wgpu::TextureView>,
    /// Finished levels, read by the composite pass.
    level_views: Vec<wgpu::TextureView>,
    /// `[horizontal, vertical]` per level.
    blur_bind_groups: Vec<[wgpu::BindGroup; 2]>,
}

impl BloomPass {
    /// Build the pass reading from `scene` (an [`HDR_FORMAT`] view of
    /// `size` pixels).
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        scene: &wgpu::TextureView,
        size: (u32, u32),
        threshold: f32,
    ) -> Self {
        let sampler = linear_sampler(device, "Bloom Sampler");
        let threshold_buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Bloom Threshold Buffer"),
                contents: bytemuck::bytes_of(&ThresholdParams::new(threshold)),
                usage: wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_DST,
            });

        let threshold_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Bloom Threshold Layout"),
                entries: &[
                    texture_2d(0),
                    filtering_sampler(1),
                    uniform_buffer(2),
                ],
            });
        let threshold_shader = create_shader(
            device,
            "Bloom Threshold Shader",
            include_str!("../../assets/shaders/bloom_threshold.wgsl"),
        );
        let threshold_pipeline = create_screen_space_pipeline(
            device,
            "Bloom Threshold",
            &threshold_shader,
            HDR_FORMAT,
            &[&threshold_layout],
        );

        // Same shape as the threshold layout; the uniform is `BlurParams`.
        let blur_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Bloom Blur Layout"),
                entries: &[
                    texture_2d(0),
                    filtering_sampler(1),
                    uniform_buffer(2),
                ],
            });
        let blur_shader = create_shader(
            device,
            "Bloom Blur Shader",
            include_str!("../../assets/shaders/bloom_blur.wgsl"),
        );
        let blur_pipeline = create_screen_space_pipeline(
            device,
            "Bloom Blur",
            &blur_shader,
            HDR_FORMAT,
            &[&blur_layout],
        );

        let threshold_bind_group = Self::threshold_bind_group(
            device,
            &threshold_layout,
            scene,
            &sampler,
            &threshold_buffer,
        );
        let targets = Targets::new(device, size);
        let blur_bind_groups = Self::blur_bind_groups(
            device,
            &blur_layout,
            &sampler,
            &targets,
            size,
        );

        Self {
            threshold_pipeline,
            threshold_layout,
            threshold_bind_group,
            threshold_buffer,
            blur_pipeline,
            blur_layout,
            sampler,
            extract_view: targets.extract,
            ping_views: targets.ping,
            level_views: targets.levels,
            blur_bind_groups,
        }
    }

    /// The finished levels, sharpest first.
    #[must_use]
    pub fn level_views(&self) -> &[wgpu::TextureView] {
        &self.level_views
    }

    /// Upload a new luminance threshold.
    pub fn set_threshold(&self, queue: &wgpu::Queue, threshold: f32) {
        queue.write_buffer(
            &self.threshold_buffer,
            0,
            bytemuck::bytes_of(&ThresholdParams::new(threshold)),
        );
    }

    /// Recreate every level for a new `scene` view of `size` pixels.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        scene: &wgpu::TextureView,
        size: (u32, u32),
    ) {
        self.threshold_bind_group = Self::threshold_bind_group(
            device,
            &self.threshold_layout,
            scene,
            &self.sampler,
            &self.threshold_buffer,
        );
        let targets = Targets::new(device, size);
        self.blur_bind_groups = Self::blur_bind_groups(
            device,
            &self.blur_layout,
            &self.sampler,
            &targets,
            size,
        );
        self.extract_view = targets.extract;
        self.ping_views = targets.ping;
        self.level_views = targets.levels;
    }

    /// Record threshold, then downsample and blur every level in order.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder) {
        draw_fullscreen(
            encoder,
            "Bloom Threshold",
            &self.threshold_pipeline,
            &self.threshold_bind_group,
            &self.extract_view,
        );
        for (level, [horizontal, vertical]) in
            self.blur_bind_groups.iter().enumerate()
        {
            draw_fullscreen(
                encoder,
                "Bloom Blur H",
                &self.blur_pipeline,
                horizontal,
                &self.ping_views[level],
            );
            draw_fullscreen(
                encoder,
                "Bloom Blur V",
                &self.blur_pipeline,
                vertical,
                &self.level_views[level],
            );
        }
    }

    fn threshold_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        scene: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Threshold Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(scene),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer.as_entire_binding(),
                },
            ],
        })
    }

    /// The horizontal pass of level `i` reads the previous level (the
    /// extract for level 0), so sampling at the smaller target size also
    /// downsamples. The vertical pass reads the horizontal result.
    fn blur_bind_groups(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        targets: &Targets,
        size: (u32, u32),
    ) -> Vec<[wgpu::BindGroup; 2]> {
        let bind = |label: &str,
                    input: &wgpu::TextureView,
                    params: BlurParams| {
            let buffer =
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{label} Params")),
                    contents: bytemuck::bytes_of(&params),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(input),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: buffer.as_entire_binding(),
                    },
                ],
            })
        };

        (0..MIP_LEVELS)
            .map(|level| {
                let level_px = level_size(size, level);
                let radius = KERNEL_RADII[level];
                let input = if level == 0 {
                    &targets.extract
                } else {
                    &targets.levels[level - 1]
                };
                [
                    bind(
                        &format!("Bloom Blur H {level}"),
                        input,
                        BlurParams::new(level_px, true, radius),
                    ),
                    bind(
                        &format!("Bloom Blur V {level}"),
                        &targets.ping[level],
                        BlurParams::new(level_px, false, radius),
                    ),
                ]
            })
            .collect()
    }
}

/// Size-dependent textures of the chain.
struct Targets {
    extract: wgpu::TextureView,
    ping: Vec<wgpu::TextureView>,
    levels: Vec<wgpu::TextureView>,
}

impl Targets {
    fn new(device: &wgpu::Device, size: (u32, u32)) -> Self {
        let level = |label: &str, i: usize| {
            render_target(
                device,
                &format!("{label} {i}"),
                HDR_FORMAT,
                level_size(size, i),
            )
        };
        Self {
            extract: render_target(
                device,
                "Bloom Extract",
                HDR_FORMAT,
                level_size(size, 0),
            ),
            ping: (0..MIP_LEVELS).map(|i| level("Bloom Ping", i)).collect(),
            levels: (0..MIP_LEVELS).map(|i| level("Bloom Level", i)).collect(),
        }
    }
}
