//! CPU reference backend.
//!
//! `SoftwareDevice` implements [`Device`] without a GPU: textures are `Vec<f32>`,
//! programs resolve by label to Rust fragment kernels, and draws rasterize
//! triangles with back-face culling (counter-clockwise is front). Depth testing
//! is never enabled by the engine, so the depth attachment is only cleared.
//!
//! Sampling is bilinear with clamp-to-edge at level 0; an unbound unit reads
//! as opaque black.

pub mod kernels;

use std::collections::HashMap;

use optiflow_core::EngineError;
use optiflow_mesh::FLOATS_PER_VERTEX;

use crate::device::{
    Device, FramebufferId, MeshId, PrimitiveMode, ProgramId, RenderTarget, TexelBuffer,
    TextureDesc, TextureFormat, TextureId, COLOR_CHANNELS, MAX_TEXTURE_UNITS,
};
use crate::program::{ShaderSource, MODEL_MATRIX};
use crate::transform::transform_point;

/// A fragment kernel: reads through [`Fragment`], writes one RGBA value per
/// color attachment of the destination (`out[i]` ↔ output slot i).
pub type Kernel = fn(&Fragment<'_>, &mut [[f32; 4]]);

#[derive(Debug)]
struct SoftTexture {
    desc: TextureDesc,
    data: Vec<f32>,
    mipmap_generations: u32,
}

impl SoftTexture {
    fn channels(&self) -> usize {
        match self.desc.format {
            TextureFormat::Rgb32F => COLOR_CHANNELS,
            TextureFormat::Depth32 => 1,
        }
    }

    fn sample(&self, uv: [f32; 2]) -> [f32; 4] {
        let w = self.desc.width as usize;
        let h = self.desc.height as usize;
        let ch = self.channels();

        let fx = uv[0] * w as f32 - 0.5;
        let fy = uv[1] * h as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;

        let clamp = |v: f32, n: usize| -> usize { (v.max(0.0) as usize).min(n - 1) };
        let xs = [clamp(x0, w), clamp(x0 + 1.0, w)];
        let ys = [clamp(y0, h), clamp(y0 + 1.0, h)];

        let mut out = [0.0, 0.0, 0.0, 1.0];
        for (c, o) in out.iter_mut().enumerate().take(ch) {
            let at = |x: usize, y: usize| self.data[(y * w + x) * ch + c];
            let bottom = at(xs[0], ys[0]) * (1.0 - tx) + at(xs[1], ys[0]) * tx;
            let top = at(xs[0], ys[1]) * (1.0 - tx) + at(xs[1], ys[1]) * tx;
            *o = bottom * (1.0 - ty) + top * ty;
        }
        out
    }
}

#[derive(Debug)]
struct SoftFramebuffer {
    color: Vec<TextureId>,
    depth: TextureId,
}

struct SoftProgram {
    label: String,
    kernel: Kernel,
    ints: HashMap<String, i32>,
    mats: HashMap<String, [f32; 16]>,
}

impl std::fmt::Debug for SoftProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftProgram")
            .field("label", &self.label)
            .field("ints", &self.ints)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct SoftMesh {
    vertices: Vec<f32>,
    indices: Vec<u32>,
}

/// What a kernel can see while shading one pixel.
pub struct Fragment<'a> {
    /// Interpolated texture coordinate.
    pub uv: [f32; 2],
    program: &'a SoftProgram,
    units: &'a [Option<TextureId>; MAX_TEXTURE_UNITS],
    textures: &'a HashMap<TextureId, SoftTexture>,
}

impl std::fmt::Debug for Fragment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fragment")
            .field("uv", &self.uv)
            .field("program", &self.program.label)
            .finish()
    }
}

impl Fragment<'_> {
    /// Integer uniform; unset uniforms read as 0, like a fresh GL program.
    pub fn uniform_i32(&self, name: &str) -> i32 {
        self.program.ints.get(name).copied().unwrap_or(0)
    }

    /// Samples the texture bound to the unit named by sampler uniform `sampler`.
    pub fn texture(&self, sampler: &str, uv: [f32; 2]) -> [f32; 4] {
        let unit = self.uniform_i32(sampler);
        self.units
            .get(unit as usize)
            .copied()
            .flatten()
            .and_then(|id| self.textures.get(&id))
            .map(|t| t.sample(uv))
            .unwrap_or([0.0, 0.0, 0.0, 1.0])
    }
}

/// Destination pixels while a draw is in flight.
struct Canvas {
    width: u32,
    height: u32,
    planes: Vec<Vec<f32>>,
}

pub struct SoftwareDevice {
    display_size: (u32, u32),
    display: Vec<f32>,
    textures: HashMap<TextureId, SoftTexture>,
    framebuffers: HashMap<FramebufferId, SoftFramebuffer>,
    programs: HashMap<ProgramId, SoftProgram>,
    meshes: HashMap<MeshId, SoftMesh>,
    kernels: HashMap<String, Kernel>,
    units: [Option<TextureId>; MAX_TEXTURE_UNITS],
    active: Option<RenderTarget>,
    viewport: (u32, u32),
    next_id: u32,
    draws: u64,
}

impl std::fmt::Debug for SoftwareDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareDevice")
            .field("display_size", &self.display_size)
            .field("textures", &self.textures.len())
            .field("framebuffers", &self.framebuffers.len())
            .field("programs", &self.programs)
            .field("kernels", &self.kernels.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl SoftwareDevice {
    /// A device whose display surface is `width` x `height`, with the
    /// reference kernels for every builtin program registered.
    pub fn new(width: u32, height: u32) -> Self {
        let mut dev = Self {
            display_size: (width, height),
            display: vec![0.0; width as usize * height as usize * COLOR_CHANNELS],
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            meshes: HashMap::new(),
            kernels: HashMap::new(),
            units: [None; MAX_TEXTURE_UNITS],
            active: None,
            viewport: (width, height),
            next_id: 1,
            draws: 0,
        };
        kernels::register_builtin(&mut dev);
        dev
    }

    /// Programs compiled with this label afterwards run `kernel`.
    pub fn register_kernel(&mut self, label: impl Into<String>, kernel: Kernel) {
        self.kernels.insert(label.into(), kernel);
    }

    pub fn bound_unit(&self, unit: usize) -> Option<TextureId> {
        self.units.get(unit).copied().flatten()
    }

    /// How many times the mip chain of `texture` was rebuilt.
    pub fn mipmap_generations(&self, texture: TextureId) -> u32 {
        self.textures
            .get(&texture)
            .map(|t| t.mipmap_generations)
            .unwrap_or(0)
    }

    /// The display surface as last drawn.
    pub fn display(&self) -> TexelBuffer {
        let (w, h) = self.display_size;
        TexelBuffer::from_rgb(w, h, &self.display)
    }

    pub fn draw_calls(&self) -> u64 {
        self.draws
    }

    /// Live texture count, for leak checks.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn issue(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Copies the active target's color planes out so a draw can read every
    /// texture while writing its own buffers.
    fn take_canvas(&self) -> Result<(Canvas, Vec<Option<TextureId>>), EngineError> {
        match self.active {
            None => Err(EngineError::InactivePass),
            Some(RenderTarget::Display) => {
                let (width, height) = self.display_size;
                Ok((
                    Canvas {
                        width,
                        height,
                        planes: vec![self.display.clone()],
                    },
                    vec![None],
                ))
            }
            Some(RenderTarget::Offscreen(fb)) => {
                let fb = self
                    .framebuffers
                    .get(&fb)
                    .ok_or_else(|| EngineError::other(format!("unknown framebuffer {}", fb.0)))?;
                let depth = self.texture(fb.depth)?;
                let mut planes = Vec::with_capacity(fb.color.len());
                for id in &fb.color {
                    planes.push(self.texture(*id)?.data.clone());
                }
                Ok((
                    Canvas {
                        width: depth.desc.width,
                        height: depth.desc.height,
                        planes,
                    },
                    fb.color.iter().copied().map(Some).collect(),
                ))
            }
        }
    }

    fn put_canvas(&mut self, canvas: Canvas, owners: Vec<Option<TextureId>>) {
        for (plane, owner) in canvas.planes.into_iter().zip(owners) {
            match owner {
                None => self.display = plane,
                Some(id) => {
                    if let Some(t) = self.textures.get_mut(&id) {
                        t.data = plane;
                    }
                }
            }
        }
    }

    fn texture(&self, id: TextureId) -> Result<&SoftTexture, EngineError> {
        self.textures
            .get(&id)
            .ok_or_else(|| EngineError::other(format!("unknown texture {}", id.0)))
    }

    fn texture_mut(&mut self, id: TextureId) -> Result<&mut SoftTexture, EngineError> {
        self.textures
            .get_mut(&id)
            .ok_or_else(|| EngineError::other(format!("unknown texture {}", id.0)))
    }
}

fn triangles(mode: PrimitiveMode, indices: &[u32]) -> Result<Vec<[u32; 3]>, EngineError> {
    let tris = match mode {
        PrimitiveMode::Triangles => indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect(),
        PrimitiveMode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, t)| {
                if i % 2 == 0 {
                    [t[0], t[1], t[2]]
                } else {
                    [t[1], t[0], t[2]]
                }
            })
            .collect(),
        PrimitiveMode::TriangleFan => match indices.split_first() {
            Some((&hub, rest)) => rest.windows(2).map(|t| [hub, t[0], t[1]]).collect(),
            None => Vec::new(),
        },
        PrimitiveMode::Lines | PrimitiveMode::Points => {
            return Err(EngineError::other(format!(
                "software device rasterizes triangles only, got {mode:?}"
            )))
        }
    };
    Ok(tris)
}

fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

impl Device for SoftwareDevice {
    fn create_texture(
        &mut self,
        desc: TextureDesc,
        data: Option<&[f32]>,
    ) -> Result<TextureId, EngineError> {
        let texels = desc.width as usize * desc.height as usize;
        let (contents, mipmap_generations) = match (desc.format, data) {
            (TextureFormat::Rgb32F, Some(d)) => (d.to_vec(), 1),
            (TextureFormat::Rgb32F, None) => (vec![0.0; texels * COLOR_CHANNELS], 0),
            (TextureFormat::Depth32, _) => (vec![1.0; texels], 0),
        };
        let id = TextureId(self.issue());
        self.textures.insert(
            id,
            SoftTexture {
                desc,
                data: contents,
                mipmap_generations,
            },
        );
        Ok(id)
    }

    fn upload_texture(&mut self, texture: TextureId, data: &[f32]) -> Result<(), EngineError> {
        let tex = self.texture_mut(texture)?;
        if tex.data.len() != data.len() {
            return Err(EngineError::bounds(format!(
                "upload of {} floats into a texture of {}",
                data.len(),
                tex.data.len()
            )));
        }
        tex.data.copy_from_slice(data);
        tex.mipmap_generations += 1;
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: TextureId) {
        if let Some(t) = self.textures.get_mut(&texture) {
            t.mipmap_generations += 1;
        }
    }

    fn read_texture(&mut self, texture: TextureId) -> Result<TexelBuffer, EngineError> {
        let tex = self.texture(texture)?;
        if tex.desc.format != TextureFormat::Rgb32F {
            return Err(EngineError::other("depth textures cannot be read back"));
        }
        Ok(TexelBuffer::from_rgb(tex.desc.width, tex.desc.height, &tex.data))
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        for unit in self.units.iter_mut() {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
    }

    fn create_framebuffer(
        &mut self,
        color: &[TextureId],
        depth: TextureId,
    ) -> Result<FramebufferId, EngineError> {
        let size = {
            let d = self.texture(depth)?;
            (d.desc.width, d.desc.height)
        };
        for id in color {
            let t = self.texture(*id)?;
            if (t.desc.width, t.desc.height) != size || t.desc.format != TextureFormat::Rgb32F {
                return Err(EngineError::GlCreate(format!(
                    "framebuffer incomplete: attachment {} does not match {}x{} depth",
                    id.0, size.0, size.1
                )));
            }
        }
        let id = FramebufferId(self.issue());
        self.framebuffers.insert(
            id,
            SoftFramebuffer {
                color: color.to_vec(),
                depth,
            },
        );
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
        if self.active == Some(RenderTarget::Offscreen(framebuffer)) {
            self.active = None;
        }
    }

    fn bind_target(&mut self, target: RenderTarget, width: u32, height: u32) {
        self.active = Some(target);
        self.viewport = (width, height);
    }

    fn active_target(&self) -> Option<RenderTarget> {
        self.active
    }

    fn clear(&mut self, color: [f32; 4]) {
        let rgb = [color[0], color[1], color[2]];
        let fill = |plane: &mut Vec<f32>| {
            for px in plane.chunks_exact_mut(COLOR_CHANNELS) {
                px.copy_from_slice(&rgb);
            }
        };
        match self.active {
            None => {}
            Some(RenderTarget::Display) => fill(&mut self.display),
            Some(RenderTarget::Offscreen(fb)) => {
                let Some(fb) = self.framebuffers.get(&fb) else {
                    return;
                };
                for id in &fb.color {
                    if let Some(t) = self.textures.get_mut(id) {
                        fill(&mut t.data);
                    }
                }
                if let Some(d) = self.textures.get_mut(&fb.depth) {
                    d.data.iter_mut().for_each(|z| *z = 1.0);
                }
            }
        }
    }

    fn bind_texture_unit(&mut self, unit: u32, texture: Option<TextureId>) {
        if let Some(slot) = self.units.get_mut(unit as usize) {
            *slot = texture;
        }
    }

    fn compile_program(&mut self, source: &ShaderSource) -> Result<ProgramId, EngineError> {
        if source.vert.trim().is_empty() {
            return Err(EngineError::VertexCompile(format!(
                "`{}`: empty vertex source",
                source.label
            )));
        }
        if source.frag.trim().is_empty() {
            return Err(EngineError::FragmentCompile(format!(
                "`{}`: empty fragment source",
                source.label
            )));
        }
        let kernel = *self.kernels.get(&source.label).ok_or_else(|| {
            EngineError::FragmentCompile(format!(
                "no reference kernel registered for `{}`",
                source.label
            ))
        })?;
        let id = ProgramId(self.issue());
        self.programs.insert(
            id,
            SoftProgram {
                label: source.label.clone(),
                kernel,
                ints: HashMap::new(),
                mats: HashMap::new(),
            },
        );
        Ok(id)
    }

    fn set_uniform_i32(&mut self, program: ProgramId, name: &str, value: i32) {
        if let Some(p) = self.programs.get_mut(&program) {
            p.ints.insert(name.to_string(), value);
        }
    }

    fn set_uniform_mat4(&mut self, program: ProgramId, name: &str, value: &[f32; 16]) {
        if let Some(p) = self.programs.get_mut(&program) {
            p.mats.insert(name.to_string(), *value);
        }
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
    }

    fn create_mesh(&mut self, vertices: &[f32], indices: &[u32]) -> Result<MeshId, EngineError> {
        let slots = vertices.len() / FLOATS_PER_VERTEX;
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= slots) {
            return Err(EngineError::bounds(format!(
                "index {bad} out of range for {slots} vertices"
            )));
        }
        let id = MeshId(self.issue());
        self.meshes.insert(
            id,
            SoftMesh {
                vertices: vertices.to_vec(),
                indices: indices.to_vec(),
            },
        );
        Ok(id)
    }

    fn draw_mesh(
        &mut self,
        program: ProgramId,
        mesh: MeshId,
        mode: PrimitiveMode,
        index_count: u32,
    ) -> Result<(), EngineError> {
        let (mut canvas, owners) = self.take_canvas()?;
        let prog = self
            .programs
            .get(&program)
            .ok_or_else(|| EngineError::other(format!("unknown program {}", program.0)))?;
        let geo = self
            .meshes
            .get(&mesh)
            .ok_or_else(|| EngineError::other(format!("unknown mesh {}", mesh.0)))?;

        let count = (index_count as usize).min(geo.indices.len());
        let model = prog
            .mats
            .get(MODEL_MATRIX)
            .copied()
            .unwrap_or(crate::transform::Transform::identity().to_matrix());
        let (vw, vh) = self.viewport;
        let width = vw.min(canvas.width);
        let height = vh.min(canvas.height);

        let project = |slot: u32| -> ([f32; 2], [f32; 2]) {
            let base = slot as usize * FLOATS_PER_VERTEX;
            let v = &geo.vertices[base..base + FLOATS_PER_VERTEX];
            let clip = transform_point(&model, [v[0], v[1], v[2]]);
            let ndc = [clip[0] / clip[3], clip[1] / clip[3]];
            let screen = [
                (ndc[0] + 1.0) * 0.5 * vw as f32,
                (ndc[1] + 1.0) * 0.5 * vh as f32,
            ];
            (screen, [v[3], v[4]])
        };

        let mut outs = vec![[0.0f32; 4]; canvas.planes.len()];
        for tri in triangles(mode, &geo.indices[..count])? {
            let (p0, t0) = project(tri[0]);
            let (p1, t1) = project(tri[1]);
            let (p2, t2) = project(tri[2]);
            let area = edge(p0, p1, p2);
            if area <= 0.0 {
                continue;
            }

            let min_x = p0[0].min(p1[0]).min(p2[0]).floor().max(0.0) as u32;
            let min_y = p0[1].min(p1[1]).min(p2[1]).floor().max(0.0) as u32;
            let max_x = (p0[0].max(p1[0]).max(p2[0]).ceil().max(0.0) as u32).min(width);
            let max_y = (p0[1].max(p1[1]).max(p2[1]).ceil().max(0.0) as u32).min(height);

            for y in min_y..max_y {
                for x in min_x..max_x {
                    let p = [x as f32 + 0.5, y as f32 + 0.5];
                    let w0 = edge(p1, p2, p) / area;
                    let w1 = edge(p2, p0, p) / area;
                    let w2 = edge(p0, p1, p) / area;
                    if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                        continue;
                    }
                    let frag = Fragment {
                        uv: [
                            w0 * t0[0] + w1 * t1[0] + w2 * t2[0],
                            w0 * t0[1] + w1 * t1[1] + w2 * t2[1],
                        ],
                        program: prog,
                        units: &self.units,
                        textures: &self.textures,
                    };
                    outs.iter_mut().for_each(|o| *o = [0.0, 0.0, 0.0, 1.0]);
                    (prog.kernel)(&frag, &mut outs);

                    let i = (y as usize * canvas.width as usize + x as usize) * COLOR_CHANNELS;
                    for (plane, o) in canvas.planes.iter_mut().zip(&outs) {
                        plane[i..i + COLOR_CHANNELS].copy_from_slice(&o[..COLOR_CHANNELS]);
                    }
                }
            }
        }

        self.put_canvas(canvas, owners);
        self.draws += 1;
        Ok(())
    }

    fn delete_mesh(&mut self, mesh: MeshId) {
        self.meshes.remove(&mesh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{ProgramKind, ShaderSet};

    fn passthrough(dev: &mut SoftwareDevice) -> ProgramId {
        let set = ShaderSet::builtin();
        let id = dev.compile_program(set.get(ProgramKind::Passthrough).unwrap()).unwrap();
        dev.set_uniform_i32(id, "scene", 0);
        id
    }

    fn quad(dev: &mut SoftwareDevice) -> MeshId {
        let q = optiflow_mesh::quad().unwrap();
        dev.create_mesh(&q.vertices, &q.indices).unwrap()
    }

    #[test]
    fn bilinear_sampling_clamps_to_edge() {
        let tex = SoftTexture {
            desc: TextureDesc::color(2, 1),
            data: vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            mipmap_generations: 0,
        };
        assert_eq!(tex.sample([0.25, 0.5])[0], 0.0);
        assert_eq!(tex.sample([0.75, 0.5])[0], 1.0);
        assert!((tex.sample([0.5, 0.5])[0] - 0.5).abs() < 1e-6);
        assert_eq!(tex.sample([-3.0, 0.5])[0], 0.0);
        assert_eq!(tex.sample([4.0, 0.5])[0], 1.0);
    }

    #[test]
    fn unknown_label_fails_to_compile() {
        let mut dev = SoftwareDevice::new(1, 1);
        let src = ShaderSource {
            label: "mystery".into(),
            vert: "void main() {}".into(),
            frag: "void main() {}".into(),
            origin: None,
        };
        assert!(dev.compile_program(&src).unwrap_err().is_compile_error());
    }

    #[test]
    fn full_screen_quad_copies_its_input() {
        let mut dev = SoftwareDevice::new(4, 2);
        let data: Vec<f32> = (0..24).map(|i| i as f32).collect();
        let input = dev.create_texture(TextureDesc::color(4, 2), Some(&data)).unwrap();
        let prog = passthrough(&mut dev);
        let mesh = quad(&mut dev);

        dev.bind_target(RenderTarget::Display, 4, 2);
        dev.bind_texture_unit(0, Some(input));
        dev.draw_mesh(prog, mesh, PrimitiveMode::Triangles, 6).unwrap();

        let shown = dev.display();
        let expected = TexelBuffer::from_rgb(4, 2, &data);
        for (a, b) in shown.data.iter().zip(&expected.data) {
            assert!((a - b).abs() < 1e-4, "{a} != {b}");
        }
    }

    #[test]
    fn clockwise_triangles_are_culled() {
        let mut dev = SoftwareDevice::new(2, 2);
        let input = dev.create_texture(TextureDesc::color(2, 2), Some(&[1.0; 12])).unwrap();
        let prog = passthrough(&mut dev);
        let q = optiflow_mesh::quad().unwrap();
        let reversed: Vec<u32> = q.indices.iter().rev().copied().collect();
        let mesh = dev.create_mesh(&q.vertices, &reversed).unwrap();

        dev.bind_target(RenderTarget::Display, 2, 2);
        dev.bind_texture_unit(0, Some(input));
        dev.draw_mesh(prog, mesh, PrimitiveMode::Triangles, 6).unwrap();

        assert_eq!(dev.display().max_abs(0, 0, 2, 0, 2), 0.0);
    }

    #[test]
    fn unbound_unit_samples_black() {
        let mut dev = SoftwareDevice::new(2, 2);
        let prog = passthrough(&mut dev);
        let mesh = quad(&mut dev);
        dev.bind_target(RenderTarget::Display, 2, 2);
        dev.clear([0.5, 0.5, 0.5, 1.0]);
        dev.draw_mesh(prog, mesh, PrimitiveMode::Triangles, 6).unwrap();
        assert_eq!(dev.display().texel(1, 1), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn lines_are_not_rasterized() {
        let mut dev = SoftwareDevice::new(2, 2);
        let prog = passthrough(&mut dev);
        let mesh = quad(&mut dev);
        dev.bind_target(RenderTarget::Display, 2, 2);
        assert!(dev.draw_mesh(prog, mesh, PrimitiveMode::Lines, 6).is_err());
    }

    #[test]
    fn mismatched_attachments_make_an_incomplete_framebuffer() {
        let mut dev = SoftwareDevice::new(1, 1);
        let color = dev.create_texture(TextureDesc::color(2, 2), None).unwrap();
        let depth = dev.create_texture(TextureDesc::depth(3, 3), None).unwrap();
        assert!(matches!(
            dev.create_framebuffer(&[color], depth),
            Err(EngineError::GlCreate(_))
        ));
    }

    #[test]
    fn deleting_a_texture_releases_its_units() {
        let mut dev = SoftwareDevice::new(1, 1);
        let t = dev.create_texture(TextureDesc::color(1, 1), None).unwrap();
        dev.bind_texture_unit(3, Some(t));
        dev.delete_texture(t);
        assert_eq!(dev.bound_unit(3), None);
        assert_eq!(dev.texture_count(), 0);
    }
}
