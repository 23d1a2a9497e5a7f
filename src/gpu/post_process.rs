//! HDR tile target, bloom and tone mapping.
//!
//! Tiles are drawn into an [`HDR_FORMAT`] texture so overlapping additive
//! sprites can exceed 1.0. [`PostProcess::render`] then runs the bloom
//! chain and a composite pass that adds the weighted bloom levels to the
//! tile image, applies ACES filmic tone mapping at the configured exposure
//! and writes the result to the surface.

use wgpu::util::DeviceExt;

use super::bloom::{level_weights, BloomPass, MIP_LEVELS};
use super::pipeline_helpers::{
    create_screen_space_pipeline, create_shader, draw_fullscreen,
    filtering_sampler, linear_sampler, render_target, texture_2d,
    uniform_buffer,
};
use super::render_context::RenderContext;
use crate::options::PostProcessingOptions;

/// Format of the tile image and every bloom level.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Composite uniform. Must match the WGSL `Composite` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CompositeParams {
    /// Per-level bloom weights, level 0 first; trailing slots are unused.
    pub bloom_weights: [[f32; 4]; 2],
    /// Overall bloom multiplier; zero when bloom is off.
    pub bloom_strength: f32,
    /// Linear scale applied before tone mapping.
    pub exposure: f32,
    /// Output exponent: 1.0 for sRGB surfaces (the hardware encodes),
    /// 1/2.2 for linear ones.
    pub gamma: f32,
    _pad: f32,
}

impl CompositeParams {
    /// Params for `options` on a surface that does (`srgb_surface`) or does
    /// not encode sRGB itself.
    #[must_use]
    pub fn new(options: &PostProcessingOptions, srgb_surface: bool) -> Self {
        let mut bloom_weights = [[0.0; 4]; 2];
        for (i, w) in level_weights(options.bloom_radius).iter().enumerate() {
            bloom_weights[i / 4][i % 4] = *w;
        }
        Self {
            bloom_weights,
            bloom_strength: if options.bloom_enabled {
                options.bloom_strength.max(0.0)
            } else {
                0.0
            },
            exposure: options.exposure.max(0.0),
            gamma: if srgb_surface { 1.0 } else { 1.0 / 2.2 },
            _pad: 0.0,
        }
    }
}

/// Owns the HDR tile target and the passes that turn it into the frame.
pub struct PostProcess {
    scene_view: wgpu::TextureView,
    size: (u32, u32),
    bloom: BloomPass,
    bloom_enabled: bool,
    composite_pipeline: wgpu::RenderPipeline,
    composite_layout: wgpu::BindGroupLayout,
    composite_bind_group: wgpu::BindGroup,
    params_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    srgb_surface: bool,
}

impl PostProcess {
    /// Build the stack for `context`'s surface size and format.
    #[must_use]
    pub fn new(
        context: &RenderContext,
        options: &PostProcessingOptions,
    ) -> Self {
        let device = &context.device;
        let size = context.size();
        let srgb_surface = context.format().is_srgb();

        let scene_view =
            render_target(device, "HDR Tile Target", HDR_FORMAT, size);
        let bloom =
            BloomPass::new(device, &scene_view, size, options.bloom_threshold);
        let sampler = linear_sampler(device, "Composite Sampler");

        let params = CompositeParams::new(options, srgb_surface);
        let params_buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Composite Params Buffer"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_DST,
            });

        // Scene, one texture per bloom level, sampler, params.
        let mut entries = vec![texture_2d(0)];
        entries.extend((1..=MIP_LEVELS as u32).map(texture_2d));
        entries.push(filtering_sampler(MIP_LEVELS as u32 + 1));
        entries.push(uniform_buffer(MIP_LEVELS as u32 + 2));
        let composite_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Composite Layout"),
                entries: &entries,
            });
        let shader = create_shader(
            device,
            "Composite Shader",
            include_str!("../../assets/shaders/composite.wgsl"),
        );
        let composite_pipeline = create_screen_space_pipeline(
            device,
            "Composite",
            &shader,
            context.format(),
            &[&composite_layout],
        );
        let composite_bind_group = Self::composite_bind_group(
            device,
            &composite_layout,
            &scene_view,
            &bloom,
            &sampler,
            &params_buffer,
        );

        log::debug!(
            "post-process: bloom {}, exposure {}, {} surface",
            if options.bloom_enabled { "on" } else { "off" },
            options.exposure,
            if srgb_surface { "sRGB" } else { "linear" },
        );

        Self {
            scene_view,
            size,
            bloom,
            bloom_enabled: options.bloom_enabled,
            composite_pipeline,
            composite_layout,
            composite_bind_group,
            params_buffer,
            sampler,
            srgb_surface,
        }
    }

    /// The texture the tile pass draws into.
    #[must_use]
    pub fn scene_view(&self) -> &wgpu::TextureView {
        &self.scene_view
    }

    /// Push new option values to the GPU.
    pub fn apply_options(
        &mut self,
        queue: &wgpu::Queue,
        options: &PostProcessingOptions,
    ) {
        self.bloom_enabled = options.bloom_enabled;
        self.bloom.set_threshold(queue, options.bloom_threshold);
        let params = CompositeParams::new(options, self.srgb_surface);
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    /// Recreate the size-dependent targets. Zero or unchanged sizes are
    /// ignored.
    pub fn resize(&mut self, device: &wgpu::Device, size: (u32, u32)) {
        if size.0 == 0 || size.1 == 0 || size == self.size {
            return;
        }
        self.size = size;
        self.scene_view =
            render_target(device, "HDR Tile Target", HDR_FORMAT, size);
        self.bloom.resize(device, &self.scene_view, size);
        self.composite_bind_group = Self::composite_bind_group(
            device,
            &self.composite_layout,
            &self.scene_view,
            &self.bloom,
            &self.sampler,
            &self.params_buffer,
        );
    }

    /// Record bloom (when enabled) and the tone-mapped composite into
    /// `target`.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
    ) {
        if self.bloom_enabled {
            self.bloom.render(encoder);
        }
        draw_fullscreen(
            encoder,
            "Composite",
            &self.composite_pipeline,
            &self.composite_bind_group,
            target,
        );
    }

    fn composite_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        scene: &wgpu::TextureView,
        bloom: &BloomPass,
        sampler: &wgpu::Sampler,
        params: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::TextureView(scene),
        }];
        entries.extend(bloom.level_views().iter().enumerate().map(
            |(i, view)| wgpu::BindGroupEntry {
                binding: i as u32 + 1,
                resource: wgpu::BindingResource::TextureView(view),
            },
        ));
        entries.push(wgpu::BindGroupEntry {
            binding: MIP_LEVELS as u32 + 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: MIP_LEVELS as u32 + 2,
            resource: params.as_entire_binding(),
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Bind Group"),
            layout,
            entries: &entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_uniform_matches_shader() {
        assert_eq!(size_of::<CompositeParams>(), 48);
    }

    #[test]
    fn defaults_give_full_bloom_and_exposure() {
        let options = PostProcessingOptions::default();
        let params = CompositeParams::new(&options, true);
        assert_eq!(params.bloom_strength, 1.0);
        assert_eq!(params.exposure, 1.2);
        assert_eq!(params.gamma, 1.0);
        let weights = level_weights(options.bloom_radius);
        assert_eq!(
            params.bloom_weights[0],
            [weights[0], weights[1], weights[2], weights[3]]
        );
        assert_eq!(params.bloom_weights[1], [weights[4], 0.0, 0.0, 0.0]);
    }

    #[test]
    fn disabled_bloom_zeroes_strength_only() {
        let options = PostProcessingOptions {
            bloom_enabled: false,
            exposure: 0.8,
            ..PostProcessingOptions::default()
        };
        let params = CompositeParams::new(&options, false);
        assert_eq!(params.bloom_strength, 0.0);
        assert_eq!(params.exposure, 0.8);
        assert!((params.gamma - 1.0 / 2.2).abs() < 1e-6);
    }
}
