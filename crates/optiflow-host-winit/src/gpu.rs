use std::ffi::CString;
use std::num::NonZeroU32;

use glutin::config::ConfigTemplateBuilder;
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContextSurfaceAccessor,
    PossiblyCurrentContext, Version,
};
use glutin::display::GetGlDisplay;
use glutin::prelude::{GlConfig, GlDisplay, GlSurface};
use glutin::surface::{Surface, SurfaceAttributesBuilder, WindowSurface};
use glutin_winit::DisplayBuilder;
use raw_window_handle::HasRawWindowHandle;
use winit::dpi::PhysicalSize;
use winit::event_loop::EventLoop;
use winit::window::{Window, WindowBuilder};

use optiflow_core::EngineError;

/// Window, surface and current GL 3.3 core context.
pub struct GpuContext {
    pub window: Window,
    pub surface: Surface<WindowSurface>,
    pub context: PossiblyCurrentContext,
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("size", &self.window.inner_size())
            .finish_non_exhaustive()
    }
}

fn init_err(what: &str) -> impl Fn(Box<dyn std::error::Error>) -> EngineError + '_ {
    move |e| EngineError::Initialization(format!("{what}: {e}"))
}

impl GpuContext {
    /// Opens a fixed-size window of `width` x `height` with `samples` MSAA and
    /// makes a core-profile 3.3 context current on it.
    pub fn create(
        event_loop: &EventLoop<()>,
        width: u32,
        height: u32,
        samples: u8,
    ) -> Result<(Self, glow::Context), EngineError> {
        let mut template = ConfigTemplateBuilder::new()
            .with_alpha_size(8)
            .with_depth_size(24);
        if samples > 1 {
            template = template.with_multisampling(samples);
        }

        let display_builder = DisplayBuilder::new().with_window_builder(Some(
            WindowBuilder::new()
                .with_title("optiflow")
                .with_inner_size(PhysicalSize::new(width, height))
                .with_resizable(false),
        ));

        let (window, gl_config) = display_builder
            .build(event_loop, template, |configs| {
                configs
                    .reduce(|a, b| if a.num_samples() >= b.num_samples() { a } else { b })
                    .expect("glutin offers at least one config")
            })
            .map_err(init_err("no usable GL config"))?;
        let window = window
            .ok_or_else(|| EngineError::Initialization("window was not created".into()))?;
        tracing::info!(samples = gl_config.num_samples(), "selected GL config");

        let raw_window_handle = window.raw_window_handle();
        let gl_display = gl_config.display();

        let context_attributes = ContextAttributesBuilder::new()
            .with_profile(GlProfile::Core)
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .build(Some(raw_window_handle));
        let not_current = unsafe { gl_display.create_context(&gl_config, &context_attributes) }
            .map_err(|e| EngineError::Initialization(format!("create_context: {e}")))?;

        let size = window.inner_size();
        let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
            raw_window_handle,
            NonZeroU32::new(size.width.max(1)).unwrap_or(NonZeroU32::MIN),
            NonZeroU32::new(size.height.max(1)).unwrap_or(NonZeroU32::MIN),
        );
        let surface = unsafe { gl_display.create_window_surface(&gl_config, &attrs) }
            .map_err(|e| EngineError::Initialization(format!("create_window_surface: {e}")))?;

        let context = not_current
            .make_current(&surface)
            .map_err(|e| EngineError::Initialization(format!("make_current: {e}")))?;

        let gl = unsafe {
            glow::Context::from_loader_function(|s| match CString::new(s) {
                Ok(name) => gl_display.get_proc_address(&name) as *const _,
                Err(_) => std::ptr::null(),
            })
        };

        Ok((
            Self {
                window,
                surface,
                context,
            },
            gl,
        ))
    }

    pub fn swap_buffers(&self) -> Result<(), EngineError> {
        self.surface
            .swap_buffers(&self.context)
            .map_err(|e| EngineError::other(format!("swap_buffers: {e}")))
    }
}
