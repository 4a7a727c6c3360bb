//! The device contract every backend implements.
//!
//! Every notion of "currently bound X" is explicit here: resources are named by
//! `Copy` ids issued by the device, destinations by [`RenderTarget`], and the
//! device is threaded through calls as `&mut dyn Device`.

use optiflow_core::EngineError;

use crate::program::ShaderSource;

/// Texture units available to a pass.
pub const MAX_TEXTURE_UNITS: usize = 16;

/// Color attachments a single framebuffer may carry.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// Channels stored by color textures.
pub const COLOR_CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Three float32 channels.
    Rgb32F,
    /// 32-bit depth, linear filter, no mipmaps.
    Depth32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl TextureDesc {
    pub fn color(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgb32F,
        }
    }

    pub fn depth(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Depth32,
        }
    }

    /// Float count of a full color upload.
    pub fn color_len(&self) -> usize {
        self.width as usize * self.height as usize * COLOR_CHANNELS
    }
}

/// Draw destination: the display surface or an offscreen framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    Display,
    Offscreen(FramebufferId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveMode {
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
    Lines,
    Points,
}

/// Dense RGBA readback, row-major, row 0 = bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct TexelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl TexelBuffer {
    /// Builds a buffer from RGB texels, forcing alpha to 1.0.
    pub fn from_rgb(width: u32, height: u32, rgb: &[f32]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for px in rgb.chunks_exact(COLOR_CHANNELS) {
            data.extend_from_slice(&[px[0], px[1], px[2], 1.0]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Largest absolute value of channel `c` over the rectangle `[x0, x1) x [y0, y1)`.
    pub fn max_abs(&self, c: usize, x0: u32, x1: u32, y0: u32, y1: u32) -> f32 {
        let mut m = 0.0f32;
        for y in y0..y1 {
            for x in x0..x1 {
                m = m.max(self.texel(x, y)[c].abs());
            }
        }
        m
    }
}

/// A GPU backend.
///
/// Implementations: `optiflow_runtime_glow::GlDevice` (OpenGL 3.3 core) and
/// [`crate::software::SoftwareDevice`] (CPU reference).
pub trait Device {
    /// Allocates a texture. With `data`, uploads it and builds the mip chain;
    /// without, contents are undefined until a pass writes them.
    fn create_texture(
        &mut self,
        desc: TextureDesc,
        data: Option<&[f32]>,
    ) -> Result<TextureId, EngineError>;

    /// Re-uploads a full RGB image and regenerates mipmaps.
    fn upload_texture(&mut self, texture: TextureId, data: &[f32]) -> Result<(), EngineError>;

    fn generate_mipmaps(&mut self, texture: TextureId);

    /// Reads level 0 back as RGBA with alpha forced to 1.0.
    fn read_texture(&mut self, texture: TextureId) -> Result<TexelBuffer, EngineError>;

    fn delete_texture(&mut self, texture: TextureId);

    /// Attaches `color[i]` to output slot i and `depth` as the depth attachment.
    fn create_framebuffer(
        &mut self,
        color: &[TextureId],
        depth: TextureId,
    ) -> Result<FramebufferId, EngineError>;

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Makes `target` the draw destination and sets the viewport.
    fn bind_target(&mut self, target: RenderTarget, width: u32, height: u32);

    fn active_target(&self) -> Option<RenderTarget>;

    /// Clears color and depth of the active target.
    fn clear(&mut self, color: [f32; 4]);

    fn bind_texture_unit(&mut self, unit: u32, texture: Option<TextureId>);

    fn compile_program(&mut self, source: &ShaderSource) -> Result<ProgramId, EngineError>;

    fn set_uniform_i32(&mut self, program: ProgramId, name: &str, value: i32);

    /// Column-major 4x4 matrix.
    fn set_uniform_mat4(&mut self, program: ProgramId, name: &str, value: &[f32; 16]);

    fn delete_program(&mut self, program: ProgramId);

    /// Uploads an interleaved (position3, uv2, normal3) vertex buffer and its indices.
    fn create_mesh(&mut self, vertices: &[f32], indices: &[u32]) -> Result<MeshId, EngineError>;

    /// Binds program and mesh, draws `index_count` indices, then unbinds both.
    fn draw_mesh(
        &mut self,
        program: ProgramId,
        mesh: MeshId,
        mode: PrimitiveMode,
        index_count: u32,
    ) -> Result<(), EngineError>;

    fn delete_mesh(&mut self, mesh: MeshId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_readback_forces_alpha() {
        let buf = TexelBuffer::from_rgb(2, 1, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(buf.texel(0, 0), [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(buf.texel(1, 0), [0.4, 0.5, 0.6, 1.0]);
    }

    #[test]
    fn max_abs_scans_the_rectangle() {
        let buf = TexelBuffer::from_rgb(2, 1, &[0.1, 0.0, 0.0, -0.7, 0.0, 0.0]);
        assert_eq!(buf.max_abs(0, 0, 1, 0, 1), 0.1);
        assert_eq!(buf.max_abs(0, 0, 2, 0, 1), 0.7);
    }
}
