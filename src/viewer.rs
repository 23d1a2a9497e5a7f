//! Standalone tiled viewer window backed by winit.
//!
//! Keys:
//! - `1`–`9` toggle the catalogue entries on the current page
//! - `PageUp` / `PageDown` move between pages of nine
//! - arrow keys move the tile band along the non-stacking axis
//! - `B` turns bloom on and off
//! - `S` writes the current options (anchor and bloom included) to the
//!   options file
//!
//! ```no_run
//! # use embedview::Viewer;
//! Viewer::builder()
//!     .with_root("data")
//!     .build()
//!     .run()
//!     .unwrap();
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::colormap::Slot;
use crate::error::EmbedError;
use crate::frame::{FrameDriver, FrameOutcome};
use crate::gpu::point_renderer::PointRenderer;
use crate::gpu::post_process::PostProcess;
use crate::gpu::render_context::RenderContext;
use crate::layout::WindowSize;
use crate::options::Options;
use crate::selection::ToggleOutcome;
use crate::session::Session;
use crate::source::{DataSource, FsSource};

/// Catalogue entries reachable from the digit keys at once.
const PAGE_SIZE: usize = 9;
/// Anchor change per arrow key press.
const ANCHOR_STEP: f32 = 0.05;

// ── Builder ──────────────────────────────────────────────────────────────

/// Fluent builder for [`Viewer`].
pub struct ViewerBuilder {
    source: Option<Arc<dyn DataSource>>,
    root: PathBuf,
    options: Option<Options>,
    options_path: Option<PathBuf>,
    title: String,
}

impl ViewerBuilder {
    fn new() -> Self {
        Self {
            source: None,
            root: PathBuf::from("."),
            options: None,
            options_path: None,
            title: "Embedview".into(),
        }
    }

    /// Read data files from this local directory.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Read data files from a custom source (overrides the root).
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Override the default options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// File the `S` key saves the current options to.
    #[must_use]
    pub fn with_options_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options_path = Some(path.into());
        self
    }

    /// Set the window title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Consume the builder and produce a [`Viewer`].
    #[must_use]
    pub fn build(self) -> Viewer {
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(FsSource::new(self.root)));
        Viewer {
            source,
            options: self.options.unwrap_or_default(),
            options_path: self.options_path,
            title: self.title,
        }
    }
}

// ── Viewer ───────────────────────────────────────────────────────────────

/// A window showing every configured point set side by side.
pub struct Viewer {
    source: Arc<dyn DataSource>,
    options: Options,
    options_path: Option<PathBuf>,
    title: String,
}

impl Viewer {
    /// Start a new builder.
    #[must_use]
    pub fn builder() -> ViewerBuilder {
        ViewerBuilder::new()
    }

    /// Start loading, open the window and run the event loop. Blocks until
    /// the window is closed.
    ///
    /// # Errors
    ///
    /// [`EmbedError::ThreadSpawn`] if the loader cannot start,
    /// [`EmbedError::Gpu`] if no GPU context can be created, and
    /// [`EmbedError::Viewer`] for event-loop failures.
    pub fn run(self) -> Result<(), EmbedError> {
        let session = Session::new(&self.options, self.source)?;
        let driver = FrameDriver::new(
            session.tile_ids(),
            WindowSize::new(0, 0),
            &self.options.layout,
        );

        let event_loop =
            EventLoop::new().map_err(|e| EmbedError::Viewer(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = ViewerApp {
            anchor: self.options.layout.anchor,
            options: self.options,
            options_path: self.options_path,
            title: self.title,
            session,
            driver,
            window: None,
            gpu: None,
            page: 0,
            failure: None,
        };

        event_loop
            .run_app(&mut app)
            .map_err(|e| EmbedError::Viewer(e.to_string()))?;
        app.failure.map_or(Ok(()), Err)
    }
}

// ── Winit app ────────────────────────────────────────────────────────────

struct Gpu {
    context: RenderContext,
    renderer: PointRenderer,
    post: PostProcess,
}

struct ViewerApp {
    options: Options,
    options_path: Option<PathBuf>,
    title: String,
    session: Session,
    driver: FrameDriver,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    /// First catalogue index reachable from the digit keys.
    page: usize,
    anchor: f32,
    failure: Option<EmbedError>,
}

/// Surface size for a window, never zero.
fn surface_size(inner: winit::dpi::PhysicalSize<u32>) -> (u32, u32) {
    (inner.width.max(1), inner.height.max(1))
}

fn digit_index(code: KeyCode) -> Option<usize> {
    let index = match code {
        KeyCode::Digit1 => 0,
        KeyCode::Digit2 => 1,
        KeyCode::Digit3 => 2,
        KeyCode::Digit4 => 3,
        KeyCode::Digit5 => 4,
        KeyCode::Digit6 => 5,
        KeyCode::Digit7 => 6,
        KeyCode::Digit8 => 7,
        KeyCode::Digit9 => 8,
        _ => return None,
    };
    Some(index)
}

impl ViewerApp {
    fn handle_key(&mut self, code: KeyCode) {
        if let Some(index) = digit_index(code) {
            self.toggle(self.page + index);
            return;
        }
        match code {
            KeyCode::PageDown => {
                if self.page + PAGE_SIZE < self.session.catalogue().len() {
                    self.page += PAGE_SIZE;
                }
                log::info!("catalogue page starts at {}", self.page);
            }
            KeyCode::PageUp => {
                self.page = self.page.saturating_sub(PAGE_SIZE);
                log::info!("catalogue page starts at {}", self.page);
            }
            KeyCode::ArrowUp | KeyCode::ArrowRight => {
                self.shift_anchor(ANCHOR_STEP);
            }
            KeyCode::ArrowDown | KeyCode::ArrowLeft => {
                self.shift_anchor(-ANCHOR_STEP);
            }
            KeyCode::KeyB => self.toggle_bloom(),
            KeyCode::KeyS => self.save_options(),
            _ => {}
        }
    }

    fn toggle(&mut self, index: usize) {
        let Some(id) = self.session.catalogue().get(index).cloned() else {
            return;
        };
        match self.session.toggle(&id) {
            ToggleOutcome::Activated(slot) => {
                log::info!("'{id}' on in slot {}", slot.index());
            }
            ToggleOutcome::Deactivated(slot) => {
                log::info!("'{id}' off, slot {} released", slot.index());
            }
            ToggleOutcome::Rejected => {
                log::info!("'{id}' ignored: all {} slots in use", Slot::COUNT);
            }
        }
        self.refresh_title();
    }

    fn shift_anchor(&mut self, delta: f32) {
        self.anchor = (self.anchor + delta).clamp(0.0, 1.0);
        self.driver.set_anchor(self.anchor);
    }

    fn toggle_bloom(&mut self) {
        let effects = &mut self.options.post_processing;
        effects.bloom_enabled = !effects.bloom_enabled;
        let state = if effects.bloom_enabled { "on" } else { "off" };
        log::info!("bloom {state}");
        if let Some(gpu) = &mut self.gpu {
            gpu.post.apply_options(&gpu.context.queue, effects);
        }
    }

    /// Write the options, with the live anchor, back to the options file.
    fn save_options(&self) {
        let Some(path) = &self.options_path else {
            log::info!("no options file to save to");
            return;
        };
        let mut options = self.options.clone();
        options.layout.anchor = self.anchor;
        match options.save(path) {
            Ok(()) => log::info!("options saved to {}", path.display()),
            Err(e) => log::warn!("could not save options: {e}"),
        }
    }

    /// Show the active fields and their border colors in the title bar.
    fn refresh_title(&self) {
        let Some(window) = &self.window else {
            return;
        };
        let active: Vec<String> = self
            .session
            .indicators()
            .iter()
            .filter_map(|ind| {
                ind.border_hex().map(|hex| format!("{} {hex}", ind.id))
            })
            .collect();
        if active.is_empty() {
            window.set_title(&self.title);
        } else {
            let title = format!("{} [{}]", self.title, active.join(", "));
            window.set_title(&title);
        }
    }

    fn resize(&mut self, inner: winit::dpi::PhysicalSize<u32>) {
        let (width, height) = surface_size(inner);
        if let Some(gpu) = &mut self.gpu {
            gpu.context.resize(width, height);
            gpu.post.resize(&gpu.context.device, gpu.context.size());
        }
        // Minimized windows report zero; the driver skips those frames.
        self.driver.resize(WindowSize::new(inner.width, inner.height));
    }

    fn redraw(&mut self) {
        if self.session.poll().changed() {
            self.refresh_title();
        }
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        for id in self.session.tile_ids() {
            if !gpu.renderer.has_point_set(&id) {
                if let Some(set) = self.session.store().get(&id) {
                    gpu.renderer.upload_point_set(set);
                }
            }
            if let (Some(colors), Some(version)) =
                (self.session.colors(&id), self.session.colors_version(&id))
            {
                gpu.renderer.sync_colors(&id, colors, version);
            }
        }

        if self.driver.frame(self.session.store(), &mut gpu.renderer)
            == FrameOutcome::Skipped
        {
            return;
        }

        let frame = match gpu.context.get_next_frame() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                gpu.context.reconfigure();
                return;
            }
            Err(e) => {
                log::error!("render error: {e}");
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu.context.create_encoder();
        gpu.renderer.encode(
            &mut encoder,
            gpu.post.scene_view(),
            gpu.context.size(),
        );
        gpu.post.render(&mut encoder, &view);
        gpu.context.submit(encoder);
        frame.present();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(&self.title)
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 640));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.failure = Some(EmbedError::Viewer(e.to_string()));
                event_loop.exit();
                return;
            }
        };

        let inner = window.inner_size();
        let context = match pollster::block_on(RenderContext::new(
            window.clone(),
            surface_size(inner),
        )) {
            Ok(context) => context,
            Err(e) => {
                log::error!("failed to initialize GPU: {e}");
                self.failure = Some(e.into());
                event_loop.exit();
                return;
            }
        };
        let renderer = PointRenderer::new(
            &context,
            &self.options,
            self.session.tile_ids(),
        );
        let post = PostProcess::new(&context, &self.options.post_processing);

        self.driver.resize(WindowSize::new(inner.width, inner.height));
        self.gpu = Some(Gpu {
            context,
            renderer,
            post,
        });
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(size) => self.resize(size),

            WindowEvent::ScaleFactorChanged { .. } => {
                let inner = self.window.as_ref().map(|w| w.inner_size());
                if let Some(inner) = inner {
                    self.resize(inner);
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        self.handle_key(code);
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                self.redraw();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => (),
        }
    }
}
