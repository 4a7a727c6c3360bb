use optiflow_core::{EngineError, FrameSource, PipelineConfig};
use optiflow_mesh::IndexedMesh;
use optiflow_runtime::software::SoftwareDevice;
use optiflow_runtime::{FrameStatus, PassTarget, Pipeline, ShaderSet, TexelBuffer};

/// Mean and peak magnitude of the smoothed flow field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowStats {
    pub mean: f32,
    pub peak: f32,
}

impl FlowStats {
    pub fn measure(u: &TexelBuffer, v: &TexelBuffer) -> Self {
        let mut sum = 0.0f32;
        let mut peak = 0.0f32;
        let mut n = 0usize;
        for (a, b) in u.data.chunks_exact(4).zip(v.data.chunks_exact(4)) {
            let m = (a[0] * a[0] + b[0] * b[0]).sqrt();
            sum += m;
            peak = peak.max(m);
            n += 1;
        }
        Self {
            mean: if n == 0 { 0.0 } else { sum / n as f32 },
            peak,
        }
    }
}

/// Runs the whole sequence on the CPU reference device.
pub fn run(
    source: &mut dyn FrameSource,
    shaders: &ShaderSet,
    quad: &IndexedMesh,
    config: PipelineConfig,
) -> Result<u64, EngineError> {
    if let Some(dir) = &config.shader_dir {
        tracing::warn!(dir = %dir.display(), "shader_dir is ignored by the CPU device");
    }
    let (width, height) = source.dimensions();
    let mut device = SoftwareDevice::new(width, height);
    let mut pipeline = Pipeline::new(&mut device, width, height, shaders, quad, config)?;

    loop {
        match pipeline.render(&mut device, source)? {
            FrameStatus::Rendered { frame } => {
                let u = pipeline
                    .output(PassTarget::OpticalFlowSmooth, 0)?
                    .read_back(&mut device)?;
                let v = pipeline
                    .output(PassTarget::OpticalFlowSmooth, 1)?
                    .read_back(&mut device)?;
                let stats = FlowStats::measure(&u, &v);
                tracing::info!(frame, mean = stats.mean, peak = stats.peak, "flow");
            }
            FrameStatus::Exhausted | FrameStatus::Done => break,
        }
    }

    let frames = pipeline.frames_rendered();
    pipeline.destroy(&mut device);
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiflow_core::{Frame, FrameQueue};

    #[test]
    fn stats_of_a_known_field() {
        let u = TexelBuffer::from_rgb(2, 1, &[3.0, 3.0, 3.0, 0.0, 0.0, 0.0]);
        let v = TexelBuffer::from_rgb(2, 1, &[4.0, 4.0, 4.0, 0.0, 0.0, 0.0]);
        let s = FlowStats::measure(&u, &v);
        assert_eq!(s.peak, 5.0);
        assert_eq!(s.mean, 2.5);
    }

    #[test]
    fn runs_every_frame() {
        let mut frames = FrameQueue::new(vec![
            Frame::filled(6, 4, 0.1),
            Frame::filled(6, 4, 0.3),
            Frame::filled(6, 4, 0.6),
        ])
        .unwrap();
        let quad = optiflow_mesh::quad().unwrap();
        let n = run(&mut frames, &ShaderSet::builtin(), &quad, PipelineConfig::default()).unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn configured_shader_dir_does_not_stop_a_cpu_run() {
        let mut frames = FrameQueue::new(vec![Frame::filled(4, 4, 0.2)]).unwrap();
        let config = PipelineConfig {
            shader_dir: Some("missing-glsl".into()),
            ..PipelineConfig::default()
        };
        let quad = optiflow_mesh::quad().unwrap();
        let n = run(&mut frames, &ShaderSet::builtin(), &quad, config).unwrap();
        assert_eq!(n, 1);
    }
}
