//! Instanced point-sprite renderer for tiled point sets.
//!
//! Every loaded point set owns a position buffer, a color buffer and a tile
//! uniform. [`TileRenderer`] calls made by the frame driver are recorded as
//! pass commands and replayed into one render pass by
//! [`PointRenderer::encode`], which targets the HDR image owned by
//! [`super::post_process::PostProcess`].

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use web_time::Instant;

use super::dynamic_buffer::DynamicBuffer;
use super::post_process::HDR_FORMAT;
use super::render_context::RenderContext;
use crate::frame::TileRenderer;
use crate::layout::{Rect, Stacking, TileLayout, WindowSize};
use crate::options::{CameraOptions, Options};
use crate::point_set::{PointSet, PointSetId};

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![0 => Float32x3];
const COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![1 => Float32x3];

/// Per-tile uniform. Must match the WGSL `Tile` struct layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileUniform {
    /// World to view.
    pub view: [[f32; 4]; 4],
    /// View to clip.
    pub proj: [[f32; 4]; 4],
    /// x = world-space sprite size; yzw unused.
    pub params: [f32; 4],
}

impl TileUniform {
    /// Uniform for a tile whose camera has turned by `angle` radians around
    /// the vertical axis.
    #[must_use]
    pub fn new(camera: &CameraOptions, angle: f32, sprite_size: f32) -> Self {
        let eye = Vec3::new(angle.sin(), 0.0, angle.cos()) * camera.distance;
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        // Viewports are square.
        let proj = Mat4::perspective_rh(
            camera.fovy.to_radians(),
            1.0,
            camera.znear,
            camera.zfar,
        );
        Self {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            params: [sprite_size, 0.0, 0.0, 0.0],
        }
    }
}

struct SceneBuffers {
    positions: DynamicBuffer<[f32; 3]>,
    colors: DynamicBuffer<[f32; 3]>,
    colors_version: Option<u64>,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Clone)]
enum PassCommand {
    Scissor(Option<Rect>),
    Viewport(Rect),
    Draw(PointSetId),
}

/// Draws each tile's point set as additive soft sprites.
pub struct PointRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    tile_layout: wgpu::BindGroupLayout,
    scenes: FxHashMap<PointSetId, SceneBuffers>,
    /// Tile order; only tile 0 turns.
    tiles: Vec<PointSetId>,
    camera: CameraOptions,
    point_size: f32,
    background: wgpu::Color,
    clear_pending: bool,
    commands: Vec<PassCommand>,
    started: Instant,
}

impl PointRenderer {
    /// Build the sprite pipeline. It draws into [`HDR_FORMAT`] targets.
    #[must_use]
    pub fn new(
        context: &RenderContext,
        options: &Options,
        tiles: Vec<PointSetId>,
    ) -> Self {
        let device = &context.device;
        let tile_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Tile Uniform Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let shader =
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Point Sprite Shader"),
                source: wgpu::ShaderSource::Wgsl(
                    include_str!("../../assets/shaders/points.wgsl").into(),
                ),
            });

        let pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Point Sprite Pipeline Layout"),
                bind_group_layouts: &[&tile_layout],
                push_constant_ranges: &[],
            });

        let stride = size_of::<[f32; 3]>() as wgpu::BufferAddress;
        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };
        let pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Point Sprite Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[
                        wgpu::VertexBufferLayout {
                            array_stride: stride,
                            step_mode: wgpu::VertexStepMode::Instance,
                            attributes: &POSITION_ATTRIBUTES,
                        },
                        wgpu::VertexBufferLayout {
                            array_stride: stride,
                            step_mode: wgpu::VertexStepMode::Instance,
                            attributes: &COLOR_ATTRIBUTES,
                        },
                    ],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: HDR_FORMAT,
                        blend: Some(wgpu::BlendState {
                            color: additive,
                            alpha: additive,
                        }),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let [r, g, b] = options.colors.background;
        Self {
            device: context.device.clone(),
            queue: context.queue.clone(),
            pipeline,
            tile_layout,
            scenes: FxHashMap::default(),
            tiles,
            camera: options.camera.clone(),
            point_size: options.layout.point_size,
            background: wgpu::Color {
                r: f64::from(r),
                g: f64::from(g),
                b: f64::from(b),
                a: 1.0,
            },
            clear_pending: true,
            commands: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Upload a loaded point set's positions. Colors start black until
    /// [`Self::sync_colors`] supplies them.
    pub fn upload_point_set(&mut self, set: &PointSet) {
        let label = format!("Points {}", set.id());
        let positions: Vec<[f32; 3]> =
            set.positions().iter().map(|p| p.to_array()).collect();
        let black = vec![[0.0; 3]; positions.len()];

        let positions = DynamicBuffer::new_with_data(
            &self.device,
            &label,
            &positions,
            wgpu::BufferUsages::VERTEX,
        );
        let colors = DynamicBuffer::new_with_data(
            &self.device,
            &format!("{label} Colors"),
            &black,
            wgpu::BufferUsages::VERTEX,
        );
        let uniform = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} Uniform")),
            size: size_of::<TileUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group =
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{label} Bind Group")),
                layout: &self.tile_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                }],
            });

        log::debug!("uploaded {} points for '{}'", set.len(), set.id());
        drop(self.scenes.insert(
            set.id().clone(),
            SceneBuffers {
                positions,
                colors,
                colors_version: None,
                uniform,
                bind_group,
            },
        ));
    }

    /// Whether `id`'s positions are on the GPU.
    #[must_use]
    pub fn has_point_set(&self, id: &PointSetId) -> bool {
        self.scenes.contains_key(id)
    }

    /// Upload `colors` for `id` unless `version` is already resident.
    pub fn sync_colors(
        &mut self,
        id: &PointSetId,
        colors: &[[f32; 3]],
        version: u64,
    ) {
        let Some(scene) = self.scenes.get_mut(id) else {
            return;
        };
        if scene.colors_version == Some(version) {
            return;
        }
        if colors.len() != scene.positions.count() {
            log::warn!(
                "color buffer for '{id}' has {} entries, expected {}",
                colors.len(),
                scene.positions.count()
            );
            return;
        }
        let _ = scene.colors.write(&self.device, &self.queue, colors);
        scene.colors_version = Some(version);
    }

    /// Replay this frame's recorded commands into one render pass on
    /// `target` (of `size` pixels).
    pub fn encode(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        size: (u32, u32),
    ) {
        let load = if self.clear_pending {
            wgpu::LoadOp::Clear(self.background)
        } else {
            wgpu::LoadOp::Load
        };
        self.clear_pending = false;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Tile Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);

        // Degenerate rects cannot be applied; draws wait for a valid one.
        let mut drawable = true;
        for command in self.commands.drain(..) {
            match command {
                PassCommand::Scissor(rect) => {
                    let (x, y, w, h) = rect.map_or((0, 0, size.0, size.1), |r| {
                        r.to_pixels(size)
                    });
                    drawable = w > 0 && h > 0;
                    if drawable {
                        pass.set_scissor_rect(x, y, w, h);
                    }
                }
                PassCommand::Viewport(rect) => {
                    let (x, y, w, h) = rect.to_pixels(size);
                    drawable = w > 0 && h > 0;
                    if drawable {
                        pass.set_viewport(
                            x as f32, y as f32, w as f32, h as f32, 0.0, 1.0,
                        );
                    }
                }
                PassCommand::Draw(id) => {
                    let Some(scene) = self.scenes.get(&id) else {
                        continue;
                    };
                    if !drawable || scene.positions.is_empty() {
                        continue;
                    }
                    pass.set_bind_group(0, &scene.bind_group, &[]);
                    pass.set_vertex_buffer(0, scene.positions.slice());
                    pass.set_vertex_buffer(1, scene.colors.slice());
                    pass.draw(0..6, 0..scene.positions.count() as u32);
                }
            }
        }
    }

    fn turntable_angle(&self, id: &PointSetId) -> f32 {
        if self.tiles.first() == Some(id) {
            self.started.elapsed().as_secs_f32()
                * self.camera.auto_rotate_speed
        } else {
            0.0
        }
    }
}

impl TileRenderer for PointRenderer {
    fn configure(
        &mut self,
        window: WindowSize,
        stacking: Stacking,
        tiles: &[TileLayout],
    ) {
        log::debug!(
            "tile geometry {}x{} {stacking:?}: {:?}",
            window.width,
            window.height,
            tiles.iter().map(|t| t.side).collect::<Vec<_>>()
        );
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.clear_pending = true;
    }

    fn set_scissor(&mut self, rect: Option<Rect>) {
        self.commands.push(PassCommand::Scissor(rect));
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.commands.push(PassCommand::Viewport(rect));
    }

    fn render_tile(&mut self, scene: &PointSetId, tile: &TileLayout) {
        let Some(buffers) = self.scenes.get(scene) else {
            return;
        };
        let uniform = TileUniform::new(
            &self.camera,
            self.turntable_angle(scene),
            self.point_size * tile.point_scale,
        );
        self.queue
            .write_buffer(&buffers.uniform, 0, bytemuck::bytes_of(&uniform));
        self.commands.push(PassCommand::Draw(scene.clone()));
    }
}
