#![forbid(unsafe_code)]

#[cfg(test)]
pub(crate) mod tests {
    use optiflow_core::{Frame, FrameQueue, PipelineConfig};
    use optiflow_runtime::software::SoftwareDevice;
    use optiflow_runtime::{FrameStatus, PassTarget, Pipeline, ShaderSet, TexelBuffer};

    const EPS: f32 = 1e-4;

    /// Gray frame where each texel is `f(x, y)`.
    pub(crate) fn frame_from(w: u32, h: u32, f: impl Fn(u32, u32) -> f32) -> Frame {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                let v = f(x, y);
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Frame::new(w, h, data).expect("frame size")
    }

    /// Black left half, white from column `edge` on.
    fn step_edge(w: u32, h: u32, edge: u32) -> Frame {
        frame_from(w, h, |x, _| if x < edge { 0.0 } else { 1.0 })
    }

    /// White square covering `[x0, x0 + side) x [y0, y0 + side)` on black.
    pub(crate) fn square(w: u32, h: u32, x0: u32, y0: u32, side: u32) -> Frame {
        frame_from(w, h, |x, y| {
            let inside = (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y);
            if inside {
                1.0
            } else {
                0.0
            }
        })
    }

    pub(crate) fn start(dev: &mut SoftwareDevice, frames: &FrameQueue) -> Pipeline {
        use optiflow_core::FrameSource;
        let (w, h) = frames.dimensions();
        let quad = optiflow_mesh::quad().expect("builtin quad");
        Pipeline::new(dev, w, h, &ShaderSet::builtin(), &quad, PipelineConfig::default())
            .expect("pipeline")
    }

    pub(crate) fn read(
        dev: &mut SoftwareDevice,
        pipeline: &Pipeline,
        target: PassTarget,
        index: usize,
    ) -> TexelBuffer {
        pipeline
            .output(target, index)
            .expect("attachment")
            .read_back(dev)
            .expect("read back")
    }

    fn channel_sum(buf: &TexelBuffer) -> f32 {
        buf.data.chunks_exact(4).map(|t| t[0]).sum()
    }

    #[test]
    fn first_frame_is_compared_against_the_default_clear_color() {
        let mut frames = FrameQueue::new(vec![step_edge(32, 8, 16)]).expect("queue");
        let mut dev = SoftwareDevice::new(32, 8);
        let mut pipeline = start(&mut dev, &frames);

        assert_eq!(
            pipeline.render(&mut dev, &mut frames).expect("frame 0"),
            FrameStatus::Rendered { frame: 0 }
        );

        let temporal = read(&mut dev, &pipeline, PassTarget::GradientTemporal, 0);
        assert!(temporal.max_abs(0, 0, 12, 0, 8) < EPS);
        for x in 22..32 {
            assert!((temporal.texel(x, 4)[0] - 1.0).abs() < EPS, "x = {x}");
        }
    }

    #[test]
    fn moving_vertical_edge_contracts() {
        let mut frames =
            FrameQueue::new(vec![step_edge(32, 8, 16), step_edge(32, 8, 18)]).expect("queue");
        let mut dev = SoftwareDevice::new(32, 8);
        let mut pipeline = start(&mut dev, &frames);

        pipeline.render(&mut dev, &mut frames).expect("frame 0");
        assert_eq!(
            pipeline.render(&mut dev, &mut frames).expect("frame 1"),
            FrameStatus::Rendered { frame: 1 }
        );

        // Temporal change stays within reach of the blur around both edges.
        let temporal = read(&mut dev, &pipeline, PassTarget::GradientTemporal, 0);
        assert!(temporal.max_abs(0, 0, 12, 0, 8) < EPS);
        assert!(temporal.max_abs(0, 22, 32, 0, 8) < EPS);
        assert!(temporal.max_abs(0, 15, 19, 0, 8) > 0.1);

        // Horizontal gradient only; the y attachment is untouched by x structure.
        let gx = read(&mut dev, &pipeline, PassTarget::GradientSpatial, 0);
        let gy = read(&mut dev, &pipeline, PassTarget::GradientSpatial, 1);
        assert!(gx.max_abs(0, 16, 21, 0, 8) > 0.05);
        assert!(gx.max_abs(0, 0, 13, 0, 8) < EPS);
        assert!(gy.max_abs(0, 0, 32, 0, 8) < EPS);

        // A straight edge has no vertical structure, so the system is singular.
        let u = read(&mut dev, &pipeline, PassTarget::OpticalFlowSmooth, 0);
        let v = read(&mut dev, &pipeline, PassTarget::OpticalFlowSmooth, 1);
        assert!(u.max_abs(0, 0, 32, 0, 8) < 1e-6);
        assert!(v.max_abs(0, 0, 32, 0, 8) < 1e-6);

        assert_eq!(
            pipeline.render(&mut dev, &mut frames).expect("end"),
            FrameStatus::Exhausted
        );
        let draws = dev.draw_calls();
        assert_eq!(
            pipeline.render(&mut dev, &mut frames).expect("after end"),
            FrameStatus::Done
        );
        assert_eq!(dev.draw_calls(), draws);
        assert_eq!(pipeline.frames_rendered(), 2);
    }

    #[test]
    fn square_moving_right_yields_positive_horizontal_flow() {
        let mut frames = FrameQueue::new(vec![
            square(32, 32, 10, 10, 10),
            square(32, 32, 11, 10, 10),
        ])
        .expect("queue");
        let mut dev = SoftwareDevice::new(32, 32);
        let mut pipeline = start(&mut dev, &frames);

        pipeline.render(&mut dev, &mut frames).expect("frame 0");
        pipeline.render(&mut dev, &mut frames).expect("frame 1");

        let u = read(&mut dev, &pipeline, PassTarget::OpticalFlowSmooth, 0);
        let v = read(&mut dev, &pipeline, PassTarget::OpticalFlowSmooth, 1);
        let (su, sv) = (channel_sum(&u), channel_sum(&v));
        assert!(su > 1.0, "sum u = {su}");
        assert!(sv.abs() < 0.05 * su, "sum v = {sv}, sum u = {su}");

        // Far from the square nothing moves.
        assert!(u.max_abs(0, 0, 4, 0, 32) < EPS);
        assert!(v.max_abs(0, 0, 4, 0, 32) < EPS);
    }

    #[test]
    fn smoothed_flow_matches_the_raw_estimate() {
        let mut frames = FrameQueue::new(vec![
            square(32, 32, 10, 10, 10),
            square(32, 32, 11, 11, 10),
        ])
        .expect("queue");
        let mut dev = SoftwareDevice::new(32, 32);
        let mut pipeline = start(&mut dev, &frames);
        pipeline.render(&mut dev, &mut frames).expect("frame 0");
        pipeline.render(&mut dev, &mut frames).expect("frame 1");

        for index in 0..2 {
            let raw = read(&mut dev, &pipeline, PassTarget::OpticalFlow, index);
            let smooth = read(&mut dev, &pipeline, PassTarget::OpticalFlowSmooth, index);
            let magnitude: f32 = raw.data.chunks_exact(4).map(|t| t[0].abs()).sum();
            let drift = (channel_sum(&raw) - channel_sum(&smooth)).abs();
            assert!(drift < 1e-3 * (1.0 + magnitude), "attachment {index}: drift {drift}");
        }
    }
}
