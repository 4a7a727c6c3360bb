#![forbid(unsafe_code)]

#[cfg(test)]
mod tests {
    use optiflow_core::FrameQueue;
    use optiflow_runtime::software::SoftwareDevice;
    use optiflow_runtime::{PassTarget, TexelBuffer};

    use crate::flow::tests::{read, square, start};

    fn run_once() -> (Vec<TexelBuffer>, TexelBuffer) {
        let mut frames = FrameQueue::new(vec![
            square(24, 24, 6, 8, 8),
            square(24, 24, 7, 8, 8),
            square(24, 24, 8, 9, 8),
        ])
        .expect("queue");
        let mut dev = SoftwareDevice::new(24, 24);
        let mut pipeline = start(&mut dev, &frames);
        while pipeline.render(&mut dev, &mut frames).expect("render").is_rendered() {}

        let mut outputs = Vec::new();
        for target in PassTarget::ALL {
            for index in 0..target.attachments() {
                outputs.push(read(&mut dev, &pipeline, target, index));
            }
        }
        (outputs, dev.display())
    }

    /// Determinism contract:
    /// the same sequence on fresh devices produces identical targets and display.
    #[test]
    fn same_sequence_renders_identically() {
        let (a, display_a) = run_once();
        let (b, display_b) = run_once();

        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(&b).enumerate() {
            assert_eq!(x, y, "output {i} differs between runs");
        }
        assert_eq!(display_a, display_b, "display differs between runs");
    }
}
