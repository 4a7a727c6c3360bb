//! Fixed optical-flow pass chain.
//!
//! Per frame: capture previous → upload current → blur → temporal gradient →
//! spatial gradient → flow estimate → flow smoothing → composite to display.
//! Pass N+1 reads what pass N wrote; there is no scheduling beyond program order.

use std::collections::HashMap;

use optiflow_core::{EngineError, FrameSource, PipelineConfig};
use optiflow_mesh::IndexedMesh;

use crate::device::{Device, PrimitiveMode, TextureId};
use crate::framebuffer::{FrameBuffer, Pass, PassOptions};
use crate::mesh::Mesh;
use crate::program::{ProgramKind, ShaderProgram, ShaderSet};
use crate::texture::Texture;
use crate::transform::Transform;

/// Offscreen destinations owned by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassTarget {
    /// Blurred previous frame.
    ScenePrevious,
    /// Current frame, copied from the source texture.
    Scene,
    /// Blurred current frame.
    Gaussian,
    /// Ping-pong partner of [`PassTarget::Gaussian`].
    GaussianSwap,
    GradientTemporal,
    /// Attachment 0 = x, 1 = y.
    GradientSpatial,
    /// Attachment 0 = u, 1 = v.
    OpticalFlow,
    OpticalFlowSmooth,
}

impl PassTarget {
    pub const ALL: [PassTarget; 8] = [
        PassTarget::ScenePrevious,
        PassTarget::Scene,
        PassTarget::Gaussian,
        PassTarget::GaussianSwap,
        PassTarget::GradientTemporal,
        PassTarget::GradientSpatial,
        PassTarget::OpticalFlow,
        PassTarget::OpticalFlowSmooth,
    ];

    pub fn attachments(self) -> usize {
        match self {
            PassTarget::GradientSpatial | PassTarget::OpticalFlow | PassTarget::OpticalFlowSmooth => 2,
            _ => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PassTarget::ScenePrevious => "scene_previous",
            PassTarget::Scene => "scene",
            PassTarget::Gaussian => "gaussian",
            PassTarget::GaussianSwap => "gaussian_swap",
            PassTarget::GradientTemporal => "gradient_t",
            PassTarget::GradientSpatial => "gradient_s",
            PassTarget::OpticalFlow => "optical_flow",
            PassTarget::OpticalFlowSmooth => "optical_flow_smooth",
        }
    }
}

/// Thumbnails drawn by the composite, top to bottom.
pub const THUMBNAILS: [(PassTarget, usize); 5] = [
    (PassTarget::GradientSpatial, 0),
    (PassTarget::GradientSpatial, 1),
    (PassTarget::GradientTemporal, 0),
    (PassTarget::OpticalFlowSmooth, 0),
    (PassTarget::OpticalFlowSmooth, 1),
];

/// Outcome of [`Pipeline::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Frame `frame` (zero-based) ran through every pass and was composited.
    Rendered { frame: u64 },
    /// The source ran dry on this call. Reported once.
    Exhausted,
    /// Every later call after exhaustion; the device is not touched.
    Done,
}

impl FrameStatus {
    pub fn is_rendered(self) -> bool {
        matches!(self, FrameStatus::Rendered { .. })
    }
}

#[derive(Debug)]
pub struct Pipeline {
    width: u32,
    height: u32,
    config: PipelineConfig,
    source: Texture,
    quad: Mesh,
    display: FrameBuffer,
    targets: HashMap<PassTarget, FrameBuffer>,
    programs: HashMap<ProgramKind, ShaderProgram>,
    frames_rendered: u64,
    exhausted: bool,
}

impl Pipeline {
    /// Allocates every pass target, the source texture and the quad, and
    /// compiles the programs with their sampler and size uniforms set.
    pub fn new(
        device: &mut dyn Device,
        width: u32,
        height: u32,
        shaders: &ShaderSet,
        quad: &IndexedMesh,
        config: PipelineConfig,
    ) -> Result<Self, EngineError> {
        let source = Texture::create(device, width, height, None)?;
        let quad = Mesh::new(device, quad)?;

        let mut targets = HashMap::new();
        for target in PassTarget::ALL {
            let fb = FrameBuffer::create(
                device,
                width,
                height,
                target.attachments(),
                config.clear_color,
            )?;
            tracing::debug!(
                target = target.name(),
                attachments = target.attachments(),
                width,
                height,
                "created pass target"
            );
            // Frame 0 reads `gaussian` before any pass has written it.
            fb.begin_pass(device, &[], PassOptions::default())?;
            targets.insert(target, fb);
        }

        let mut programs = HashMap::new();
        for kind in ProgramKind::ALL {
            let program = ShaderProgram::compile(device, shaders.get(kind)?, kind.bindings())?;
            if kind.takes_size() {
                program.set_i32(device, "width", width as i32);
                program.set_i32(device, "height", height as i32);
            }
            program.set_transform(device, &Transform::identity());
            programs.insert(kind, program);
        }

        tracing::info!(
            width,
            height,
            blur_passes = config.blur_passes,
            "pipeline ready"
        );

        Ok(Self {
            width,
            height,
            display: FrameBuffer::display(width, height, config.clear_color),
            config,
            source,
            quad,
            targets,
            programs,
            frames_rendered: 0,
            exhausted: false,
        })
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn target(&self, target: PassTarget) -> Result<&FrameBuffer, EngineError> {
        self.targets
            .get(&target)
            .ok_or_else(|| EngineError::other(format!("pass target `{}` missing", target.name())))
    }

    /// Color attachment `index` of `target`.
    pub fn output(&self, target: PassTarget, index: usize) -> Result<&Texture, EngineError> {
        self.target(target)?.attachment(index)
    }

    /// Pulls the next frame from `source` and runs the whole chain on it.
    pub fn render(
        &mut self,
        device: &mut dyn Device,
        source: &mut dyn FrameSource,
    ) -> Result<FrameStatus, EngineError> {
        if self.exhausted {
            return Ok(FrameStatus::Done);
        }

        let Some(frame) = source.next_frame()? else {
            self.exhausted = true;
            tracing::info!(frames = self.frames_rendered, "sequence exhausted");
            return Ok(FrameStatus::Exhausted);
        };
        if (frame.width, frame.height) != (self.width, self.height) {
            return Err(EngineError::Input(format!(
                "frame is {}x{}, pipeline expects {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        self.source.set_data(device, &frame.data)?;
        self.run_passes(device)?;
        self.composite(device)?;

        let index = self.frames_rendered;
        self.frames_rendered += 1;
        tracing::info!(frame = index, "rendered frame");
        Ok(FrameStatus::Rendered { frame: index })
    }

    fn run_passes(&self, device: &mut dyn Device) -> Result<(), EngineError> {
        use PassTarget as T;
        let tex = |target: PassTarget, i: usize| -> Result<TextureId, EngineError> {
            Ok(self.output(target, i)?.id())
        };

        // Read before this frame's blur overwrites it.
        self.pass(
            device,
            T::ScenePrevious,
            ProgramKind::Passthrough,
            &[("scene", tex(T::Gaussian, 0)?)],
            PassOptions::default(),
        )?;
        self.pass(
            device,
            T::Scene,
            ProgramKind::Passthrough,
            &[("scene", self.source.id())],
            PassOptions::default(),
        )?;

        self.pass(
            device,
            T::Gaussian,
            ProgramKind::Gaussian,
            &[("scene", tex(T::Scene, 0)?)],
            PassOptions::default(),
        )?;
        for _ in 0..self.config.blur_passes {
            self.pass(
                device,
                T::GaussianSwap,
                ProgramKind::Gaussian,
                &[("scene", tex(T::Gaussian, 0)?)],
                PassOptions::default(),
            )?;
            self.pass(
                device,
                T::Gaussian,
                ProgramKind::Gaussian,
                &[("scene", tex(T::GaussianSwap, 0)?)],
                PassOptions::default(),
            )?;
        }

        self.pass(
            device,
            T::GradientTemporal,
            ProgramKind::GradientTemporal,
            &[
                ("scene", tex(T::Gaussian, 0)?),
                ("scene_previous", tex(T::ScenePrevious, 0)?),
            ],
            PassOptions::default(),
        )?;
        self.pass(
            device,
            T::GradientSpatial,
            ProgramKind::GradientSpatial,
            &[("scene", tex(T::Gaussian, 0)?)],
            PassOptions::default(),
        )?;
        self.pass(
            device,
            T::OpticalFlow,
            ProgramKind::OpticalFlow,
            &[
                ("gradient_t", tex(T::GradientTemporal, 0)?),
                ("gradient_s_x", tex(T::GradientSpatial, 0)?),
                ("gradient_s_y", tex(T::GradientSpatial, 1)?),
            ],
            PassOptions::default(),
        )?;
        self.pass(
            device,
            T::OpticalFlowSmooth,
            ProgramKind::FlowPassthrough,
            &[
                ("color_in", tex(T::OpticalFlow, 0)?),
                ("data_in", tex(T::OpticalFlow, 1)?),
            ],
            PassOptions::default().with_mipmaps(),
        )
    }

    fn program(&self, kind: ProgramKind) -> Result<&ShaderProgram, EngineError> {
        self.programs
            .get(&kind)
            .ok_or_else(|| EngineError::other(format!("program `{}` missing", kind.label())))
    }

    /// One full-screen pass: bind destination, place the quad, bind inputs, draw.
    fn pass(
        &self,
        device: &mut dyn Device,
        target: PassTarget,
        kind: ProgramKind,
        inputs: &[(&str, TextureId)],
        options: PassOptions,
    ) -> Result<(), EngineError> {
        let program = self.program(kind)?;
        let units = program.bindings().resolve(inputs)?;
        program.set_transform(device, &Transform::identity());

        let pass = self.target(target)?.begin_pass(device, &units, options)?;
        self.draw(device, &pass, program)
    }

    fn draw(
        &self,
        device: &mut dyn Device,
        pass: &Pass<'_>,
        program: &ShaderProgram,
    ) -> Result<(), EngineError> {
        self.quad.draw(device, pass, program, PrimitiveMode::Triangles)
    }

    /// Draws the current frame full-screen plus the thumbnail column onto the
    /// display. Does not advance the sequence.
    pub fn composite(&self, device: &mut dyn Device) -> Result<(), EngineError> {
        let program = self.program(ProgramKind::Passthrough)?;
        let bindings = program.bindings();

        program.set_transform(device, &Transform::identity());
        let units = bindings.resolve(&[("scene", self.source.id())])?;
        let mut pass = self.display.begin_pass(device, &units, PassOptions::default())?;
        self.draw(device, &pass, program)?;

        let layout = &self.config.thumbnails;
        for (slot, (target, index)) in THUMBNAILS.iter().enumerate() {
            let texture = self.output(*target, *index)?;
            program.set_transform(device, &Transform::new(layout.offset(slot), layout.scale));
            pass.bind_inputs(device, &bindings.resolve(&[("scene", texture.id())])?, false)?;
            self.draw(device, &pass, program)?;
        }

        program.set_transform(device, &Transform::identity());
        Ok(())
    }

    pub fn destroy(self, device: &mut dyn Device) {
        for (_, fb) in self.targets {
            fb.destroy(device);
        }
        for (_, program) in self.programs {
            program.destroy(device);
        }
        self.display.destroy(device);
        self.quad.destroy(device);
        self.source.destroy(device);
    }
}
