//! CPU mirrors of the builtin GLSL programs in `shaders/`.

use super::{Fragment, SoftwareDevice};
use crate::program::ProgramKind;

const LUMA: [f32; 3] = [0.299, 0.587, 0.114];
const BINOMIAL: [f32; 5] = [1.0, 4.0, 6.0, 4.0, 1.0];
const DET_EPSILON: f32 = 1e-8;

pub(super) fn register_builtin(dev: &mut SoftwareDevice) {
    dev.register_kernel(ProgramKind::Passthrough.label(), passthrough);
    dev.register_kernel(ProgramKind::Gaussian.label(), gaussian);
    dev.register_kernel(ProgramKind::GradientTemporal.label(), gradient_temporal);
    dev.register_kernel(ProgramKind::GradientSpatial.label(), gradient_spatial);
    dev.register_kernel(ProgramKind::OpticalFlow.label(), optical_flow);
    dev.register_kernel(ProgramKind::FlowPassthrough.label(), flow_passthrough);
}

pub fn luma(c: [f32; 4]) -> f32 {
    c[0] * LUMA[0] + c[1] * LUMA[1] + c[2] * LUMA[2]
}

fn gray(v: f32) -> [f32; 4] {
    [v, v, v, 1.0]
}

fn opaque(c: [f32; 4]) -> [f32; 4] {
    [c[0], c[1], c[2], 1.0]
}

fn emit(out: &mut [[f32; 4]], slot: usize, value: [f32; 4]) {
    if let Some(o) = out.get_mut(slot) {
        *o = value;
    }
}

/// `1 / (width, height)` from the program's size uniforms.
fn texel(frag: &Fragment<'_>) -> [f32; 2] {
    [
        1.0 / frag.uniform_i32("width") as f32,
        1.0 / frag.uniform_i32("height") as f32,
    ]
}

fn offset(uv: [f32; 2], texel: [f32; 2], i: i32, j: i32) -> [f32; 2] {
    [uv[0] + i as f32 * texel[0], uv[1] + j as f32 * texel[1]]
}

pub fn passthrough(frag: &Fragment<'_>, out: &mut [[f32; 4]]) {
    emit(out, 0, opaque(frag.texture("scene", frag.uv)));
}

pub fn gaussian(frag: &Fragment<'_>, out: &mut [[f32; 4]]) {
    let t = texel(frag);
    let mut acc = [0.0f32; 3];
    for j in -2..=2 {
        for i in -2..=2 {
            let w = BINOMIAL[(i + 2) as usize] * BINOMIAL[(j + 2) as usize] / 256.0;
            let s = frag.texture("scene", offset(frag.uv, t, i, j));
            for c in 0..3 {
                acc[c] += w * s[c];
            }
        }
    }
    emit(out, 0, [acc[0], acc[1], acc[2], 1.0]);
}

pub fn gradient_temporal(frag: &Fragment<'_>, out: &mut [[f32; 4]]) {
    let now = luma(frag.texture("scene", frag.uv));
    let before = luma(frag.texture("scene_previous", frag.uv));
    emit(out, 0, gray(now - before));
}

pub fn gradient_spatial(frag: &Fragment<'_>, out: &mut [[f32; 4]]) {
    let t = texel(frag);
    let at = |i, j| luma(frag.texture("scene", offset(frag.uv, t, i, j)));
    let gx = 0.5 * (at(1, 0) - at(-1, 0));
    let gy = 0.5 * (at(0, 1) - at(0, -1));
    emit(out, 0, gray(gx));
    emit(out, 1, gray(gy));
}

/// Lucas-Kanade over a 5x5 window; singular systems yield zero flow.
pub fn optical_flow(frag: &Fragment<'_>, out: &mut [[f32; 4]]) {
    let t = texel(frag);
    let (mut sxx, mut sxy, mut syy, mut sxt, mut syt) = (0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32);
    for j in -2..=2 {
        for i in -2..=2 {
            let uv = offset(frag.uv, t, i, j);
            let ix = frag.texture("gradient_s_x", uv)[0];
            let iy = frag.texture("gradient_s_y", uv)[0];
            let it = frag.texture("gradient_t", uv)[0];
            sxx += ix * ix;
            sxy += ix * iy;
            syy += iy * iy;
            sxt += ix * it;
            syt += iy * it;
        }
    }

    let det = sxx * syy - sxy * sxy;
    let (u, v) = if det.abs() > DET_EPSILON {
        ((-syy * sxt + sxy * syt) / det, (sxy * sxt - sxx * syt) / det)
    } else {
        (0.0, 0.0)
    };
    emit(out, 0, gray(u));
    emit(out, 1, gray(v));
}

pub fn flow_passthrough(frag: &Fragment<'_>, out: &mut [[f32; 4]]) {
    emit(out, 0, opaque(frag.texture("color_in", frag.uv)));
    emit(out, 1, opaque(frag.texture("data_in", frag.uv)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_weights_sum_to_one() {
        assert!((luma([1.0, 1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn binomial_kernel_is_normalised() {
        let total: f32 = BINOMIAL
            .iter()
            .flat_map(|a| BINOMIAL.iter().map(move |b| a * b))
            .sum();
        assert_eq!(total, 256.0);
    }

    #[test]
    fn emit_ignores_missing_slots() {
        let mut out = [[0.0; 4]];
        emit(&mut out, 1, gray(3.0));
        emit(&mut out, 0, gray(2.0));
        assert_eq!(out[0], [2.0, 2.0, 2.0, 1.0]);
    }
}
