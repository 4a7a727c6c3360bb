/// Per-pass placement of the quad: uniform scale, then translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: [f32; 3],
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: [0.0; 3],
            scale: 1.0,
        }
    }

    pub fn new(translation: [f32; 3], scale: f32) -> Self {
        Self { translation, scale }
    }

    /// Column-major model matrix, as uploaded to `modelMatrix`.
    pub fn to_matrix(&self) -> [f32; 16] {
        let s = self.scale;
        let [tx, ty, tz] = self.translation;
        [
            s, 0.0, 0.0, 0.0, //
            0.0, s, 0.0, 0.0, //
            0.0, 0.0, s, 0.0, //
            tx, ty, tz, 1.0,
        ]
    }
}

/// Applies a column-major 4x4 matrix to a point (w = 1).
pub fn transform_point(m: &[f32; 16], p: [f32; 3]) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    for (row, o) in out.iter_mut().enumerate() {
        *o = m[row] * p[0] + m[4 + row] * p[1] + m[8 + row] * p[2] + m[12 + row];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_scales_then_translates() {
        let t = Transform::new([0.8, -0.4, 0.0], 0.19);
        let m = transform_point(&t.to_matrix(), [1.0, -1.0, 0.0]);
        let want = [0.99, -0.59, 0.0, 1.0];
        for i in 0..4 {
            assert!((m[i] - want[i]).abs() < 1e-6, "{i}: {}", m[i]);
        }
    }

    #[test]
    fn identity_leaves_points_alone() {
        let p = [0.3, 0.7, -0.2];
        let m = transform_point(&Transform::identity().to_matrix(), p);
        assert_eq!(m, [0.3, 0.7, -0.2, 1.0]);
    }
}
