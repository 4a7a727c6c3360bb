// optiflow: optical flow over an image sequence.
//
// Opens the sequence, sizes a fixed window to its frames, and runs the pass
// chain once per frame. Right arrow advances; closing the window quits.

mod cli;
mod gpu;
mod headless;

use std::path::Path;

use anyhow::Context as _;
use winit::event::{ElementState, Event, KeyboardInput, StartCause, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};

use optiflow_core::{EngineError, FrameSource, PipelineConfig};
use optiflow_input_images::ImageSequence;
use optiflow_mesh::IndexedMesh;
use optiflow_runtime::{FrameStatus, Pipeline, ShaderSet};
use optiflow_runtime_glow::GlDevice;

use crate::gpu::GpuContext;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn load_config(args: &cli::CliArgs) -> Result<PipelineConfig, EngineError> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_path(path)?,
        None => PipelineConfig::default(),
    };
    args.apply(&mut cfg);
    cfg.validate(args.config.as_deref().unwrap_or(Path::new("<cli>")))?;
    Ok(cfg)
}

fn load_shaders(cfg: &PipelineConfig) -> Result<ShaderSet, EngineError> {
    match &cfg.shader_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "loading shaders");
            ShaderSet::from_dir(dir)
        }
        None => Ok(ShaderSet::builtin()),
    }
}

fn load_quad(cfg: &PipelineConfig) -> Result<IndexedMesh, EngineError> {
    match &cfg.mesh {
        Some(path) => Ok(optiflow_mesh::load_geometry(path)?.index()),
        None => optiflow_mesh::quad(),
    }
}

fn main() -> anyhow::Result<()> {
    let args = cli::parse_args();
    init_logging();

    let config = load_config(&args).context("loading configuration")?;
    let mut sequence = ImageSequence::open(&config.images)
        .with_context(|| format!("opening image sequence {}", config.images.display()))?;
    if sequence.is_empty() {
        tracing::info!(dir = %config.images.display(), "no frames, nothing to do");
        return Ok(());
    }

    let shaders = load_shaders(&config).context("loading shaders")?;
    let quad = load_quad(&config).context("loading quad geometry")?;

    if args.headless {
        let frames = headless::run(&mut sequence, &shaders, &quad, config)?;
        tracing::info!(frames, "headless run complete");
        return Ok(());
    }

    run_windowed(sequence, &shaders, &quad, config)
}

fn run_windowed(
    mut sequence: ImageSequence,
    shaders: &ShaderSet,
    quad: &IndexedMesh,
    config: PipelineConfig,
) -> anyhow::Result<()> {
    let (width, height) = sequence.dimensions();
    let autoplay = config.autoplay;

    let event_loop = EventLoop::new();
    let (gpu, gl) = GpuContext::create(&event_loop, width, height, config.samples)
        .context("creating window")?;
    let mut device = unsafe { GlDevice::new(gl) }.context("creating GL device")?;
    let pipeline = Pipeline::new(&mut device, width, height, shaders, quad, config)
        .context("building pipeline")?;

    let mut pipeline = Some(pipeline);
    let mut advance = true;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = if autoplay {
            ControlFlow::Poll
        } else {
            ControlFlow::Wait
        };

        match event {
            Event::NewEvents(StartCause::Init) => gpu.window.request_redraw(),
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(VirtualKeyCode::Right),
                            ..
                        },
                    ..
                } => {
                    tracing::debug!("next frame");
                    advance = true;
                    gpu.window.request_redraw();
                }
                _ => {}
            },
            Event::MainEventsCleared => {
                if autoplay {
                    advance = true;
                    gpu.window.request_redraw();
                }
            }
            Event::RedrawRequested(_) => {
                let Some(p) = pipeline.as_mut() else {
                    return;
                };
                let result = if advance {
                    advance = false;
                    p.render(&mut device, &mut sequence)
                } else {
                    p.composite(&mut device).map(|_| FrameStatus::Done)
                };

                match result {
                    Ok(FrameStatus::Exhausted) => {
                        tracing::info!(frames = p.frames_rendered(), "sequence complete");
                        *control_flow = ControlFlow::Exit;
                    }
                    Ok(_) => {
                        if let Err(e) = gpu.swap_buffers() {
                            tracing::error!("{e}");
                            *control_flow = ControlFlow::ExitWithCode(1);
                        }
                    }
                    Err(e) => {
                        tracing::error!("{e}");
                        *control_flow = ControlFlow::ExitWithCode(1);
                    }
                }
            }
            Event::LoopDestroyed => {
                if let Some(p) = pipeline.take() {
                    p.destroy(&mut device);
                }
            }
            _ => {}
        }
    })
}
