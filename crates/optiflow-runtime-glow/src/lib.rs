//! optiflow runtime (glow/OpenGL backend)
//
// This crate contains only the OpenGL side of the `Device` contract:
// - texture / framebuffer / program / mesh objects keyed by engine ids
// - compile/link shaders
// - draw indexed meshes into the active target
//
// It does NOT contain windowing, file IO or the pass chain itself.
#![allow(clippy::missing_safety_doc)]

use glow::HasContext;
use std::collections::HashMap;

use optiflow_runtime::device::{
    Device, FramebufferId, MeshId, PrimitiveMode, ProgramId, RenderTarget, TexelBuffer,
    TextureDesc, TextureFormat, TextureId, MAX_COLOR_ATTACHMENTS, MAX_TEXTURE_UNITS,
};
use optiflow_runtime::ShaderSource;

pub use optiflow_core::EngineError;

/// Unit used for uploads and mipmap generation, outside the pass range so
/// pass bindings survive resource updates.
const SCRATCH_UNIT: u32 = MAX_TEXTURE_UNITS as u32;

/// Interleaved position3 + uv2 + normal3.
const VERTEX_STRIDE: i32 = 8 * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn gl_kind(self) -> u32 {
        match self {
            Stage::Vertex => glow::VERTEX_SHADER,
            Stage::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        }
    }

    /// Compile failure of this stage for program `label`.
    fn error(self, label: &str, log: &str) -> EngineError {
        let msg = format!("`{label}` {} stage: {}", self.name(), log.trim_end());
        match self {
            Stage::Vertex => EngineError::VertexCompile(msg),
            Stage::Fragment => EngineError::FragmentCompile(msg),
        }
    }
}

unsafe fn compile_stage(
    gl: &glow::Context,
    label: &str,
    stage: Stage,
    src: &str,
) -> Result<glow::NativeShader, EngineError> {
    let shader = gl.create_shader(stage.gl_kind()).map_err(|e| {
        EngineError::GlCreate(format!("`{label}` {} shader: {e:?}", stage.name()))
    })?;
    gl.shader_source(shader, src);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(stage.error(label, &log));
    }
    Ok(shader)
}

/// Compiles and links both stages of `source`. No partial program survives
/// a failure.
pub unsafe fn compile_program(
    gl: &glow::Context,
    source: &ShaderSource,
) -> Result<glow::NativeProgram, EngineError> {
    let label = source.label.as_str();
    let vs = compile_stage(gl, label, Stage::Vertex, &source.vert)?;
    let fs = match compile_stage(gl, label, Stage::Fragment, &source.frag) {
        Ok(fs) => fs,
        Err(e) => {
            gl.delete_shader(vs);
            return Err(e);
        }
    };

    let program = match gl.create_program() {
        Ok(p) => p,
        Err(e) => {
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(EngineError::GlCreate(format!("`{label}` program: {e:?}")));
        }
    };
    for shader in [vs, fs] {
        gl.attach_shader(program, shader);
    }
    gl.link_program(program);
    for shader in [vs, fs] {
        gl.detach_shader(program, shader);
        gl.delete_shader(shader);
    }

    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(EngineError::Link(format!("`{label}`: {}", log.trim_end())));
    }

    tracing::debug!(program = label, "linked");
    Ok(program)
}

#[derive(Debug)]
struct GlTexture {
    tex: glow::NativeTexture,
    desc: TextureDesc,
}

#[derive(Debug)]
struct GlMesh {
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
    ebo: glow::NativeBuffer,
}

fn gl_mode(mode: PrimitiveMode) -> u32 {
    match mode {
        PrimitiveMode::Triangles => glow::TRIANGLES,
        PrimitiveMode::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveMode::TriangleFan => glow::TRIANGLE_FAN,
        PrimitiveMode::Lines => glow::LINES,
        PrimitiveMode::Points => glow::POINTS,
    }
}

/// [`Device`] on an OpenGL 3.3 core context.
pub struct GlDevice {
    gl: glow::Context,
    textures: HashMap<TextureId, GlTexture>,
    framebuffers: HashMap<FramebufferId, glow::NativeFramebuffer>,
    programs: HashMap<ProgramId, glow::NativeProgram>,
    meshes: HashMap<MeshId, GlMesh>,
    readback: glow::NativeFramebuffer,
    active: Option<RenderTarget>,
    next_id: u32,
}

impl std::fmt::Debug for GlDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlDevice")
            .field("textures", &self.textures.len())
            .field("framebuffers", &self.framebuffers.len())
            .field("programs", &self.programs.len())
            .field("meshes", &self.meshes.len())
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl GlDevice {
    /// Wraps a context that is current on this thread and applies the fixed
    /// global state: back-face culling, depth func LESS, depth test off.
    pub unsafe fn new(gl: glow::Context) -> Result<Self, EngineError> {
        gl.enable(glow::CULL_FACE);
        gl.cull_face(glow::BACK);
        gl.front_face(glow::CCW);
        gl.depth_func(glow::LESS);
        gl.disable(glow::DEPTH_TEST);

        let readback = gl
            .create_framebuffer()
            .map_err(|e| EngineError::GlCreate(format!("create_framebuffer failed: {e:?}")))?;

        tracing::debug!(
            version = %gl.get_parameter_string(glow::VERSION),
            renderer = %gl.get_parameter_string(glow::RENDERER),
            "GL device ready"
        );

        Ok(Self {
            gl,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            meshes: HashMap::new(),
            readback,
            active: None,
            next_id: 1,
        })
    }

    fn issue(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn texture(&self, id: TextureId) -> Result<&GlTexture, EngineError> {
        self.textures
            .get(&id)
            .ok_or_else(|| EngineError::other(format!("unknown texture {}", id.0)))
    }

    fn native_target(&self, target: Option<RenderTarget>) -> Option<glow::NativeFramebuffer> {
        match target {
            Some(RenderTarget::Offscreen(id)) => self.framebuffers.get(&id).copied(),
            _ => None,
        }
    }

    /// Rebinds the active destination after a helper touched FRAMEBUFFER.
    unsafe fn restore_target(&self) {
        self.gl
            .bind_framebuffer(glow::FRAMEBUFFER, self.native_target(self.active));
    }

    unsafe fn bind_scratch(&self, tex: Option<glow::NativeTexture>) {
        self.gl.active_texture(glow::TEXTURE0 + SCRATCH_UNIT);
        self.gl.bind_texture(glow::TEXTURE_2D, tex);
    }

    unsafe fn uniform_location(
        &self,
        program: ProgramId,
        name: &str,
    ) -> Option<(glow::NativeProgram, glow::NativeUniformLocation)> {
        let p = *self.programs.get(&program)?;
        let loc = self.gl.get_uniform_location(p, name)?;
        Some((p, loc))
    }
}

impl Device for GlDevice {
    fn create_texture(
        &mut self,
        desc: TextureDesc,
        data: Option<&[f32]>,
    ) -> Result<TextureId, EngineError> {
        let w = desc.width as i32;
        let h = desc.height as i32;
        let tex = unsafe {
            let gl = &self.gl;
            let tex = gl
                .create_texture()
                .map_err(|e| EngineError::GlCreate(format!("create_texture failed: {e:?}")))?;
            self.bind_scratch(Some(tex));

            let (internal, format, min_filter) = match desc.format {
                // RGBA storage: RGB32F is not required to be color-renderable.
                TextureFormat::Rgb32F if data.is_some() => {
                    (glow::RGBA32F, glow::RGB, glow::LINEAR_MIPMAP_LINEAR)
                }
                TextureFormat::Rgb32F => (glow::RGBA32F, glow::RGB, glow::LINEAR),
                TextureFormat::Depth32 => {
                    (glow::DEPTH_COMPONENT32F, glow::DEPTH_COMPONENT, glow::LINEAR)
                }
            };
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, min_filter as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal as i32,
                w,
                h,
                0,
                format,
                glow::FLOAT,
                data.map(bytemuck::cast_slice::<f32, u8>),
            );
            if data.is_some() {
                gl.generate_mipmap(glow::TEXTURE_2D);
            }
            self.bind_scratch(None);
            tex
        };

        let id = TextureId(self.issue());
        self.textures.insert(id, GlTexture { tex, desc });
        Ok(id)
    }

    fn upload_texture(&mut self, texture: TextureId, data: &[f32]) -> Result<(), EngineError> {
        let t = self.texture(texture)?;
        if data.len() != t.desc.color_len() {
            return Err(EngineError::bounds(format!(
                "upload of {} floats into a {}x{} texture",
                data.len(),
                t.desc.width,
                t.desc.height
            )));
        }
        let (tex, w, h) = (t.tex, t.desc.width as i32, t.desc.height as i32);
        unsafe {
            self.bind_scratch(Some(tex));
            self.gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                w,
                h,
                glow::RGB,
                glow::FLOAT,
                glow::PixelUnpackData::Slice(bytemuck::cast_slice(data)),
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR_MIPMAP_LINEAR as i32,
            );
            self.gl.generate_mipmap(glow::TEXTURE_2D);
            self.bind_scratch(None);
        }
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: TextureId) {
        let Some(t) = self.textures.get(&texture) else {
            return;
        };
        if t.desc.format != TextureFormat::Rgb32F {
            return;
        }
        let tex = t.tex;
        unsafe {
            self.bind_scratch(Some(tex));
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR_MIPMAP_LINEAR as i32,
            );
            self.gl.generate_mipmap(glow::TEXTURE_2D);
            self.bind_scratch(None);
        }
    }

    fn read_texture(&mut self, texture: TextureId) -> Result<TexelBuffer, EngineError> {
        let t = self.texture(texture)?;
        if t.desc.format != TextureFormat::Rgb32F {
            return Err(EngineError::other("depth textures cannot be read back"));
        }
        let (tex, w, h) = (t.tex, t.desc.width, t.desc.height);

        let mut rgba = vec![0.0f32; w as usize * h as usize * 4];
        unsafe {
            let gl = &self.gl;
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(self.readback));
            gl.framebuffer_texture_2d(
                glow::READ_FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(tex),
                0,
            );
            gl.read_buffer(glow::COLOR_ATTACHMENT0);
            gl.read_pixels(
                0,
                0,
                w as i32,
                h as i32,
                glow::RGBA,
                glow::FLOAT,
                glow::PixelPackData::Slice(bytemuck::cast_slice_mut::<f32, u8>(&mut rgba)),
            );
            gl.framebuffer_texture_2d(
                glow::READ_FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                None,
                0,
            );
            self.restore_target();
        }

        for px in rgba.chunks_exact_mut(4) {
            px[3] = 1.0;
        }
        Ok(TexelBuffer {
            width: w,
            height: h,
            data: rgba,
        })
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(t) = self.textures.remove(&texture) {
            unsafe { self.gl.delete_texture(t.tex) };
        }
    }

    fn create_framebuffer(
        &mut self,
        color: &[TextureId],
        depth: TextureId,
    ) -> Result<FramebufferId, EngineError> {
        if color.len() > MAX_COLOR_ATTACHMENTS {
            return Err(EngineError::bounds(format!(
                "{} color attachments, at most {MAX_COLOR_ATTACHMENTS}",
                color.len()
            )));
        }
        let mut natives = Vec::with_capacity(color.len());
        for id in color {
            natives.push(self.texture(*id)?.tex);
        }
        let depth_tex = self.texture(depth)?.tex;

        let fbo = unsafe {
            let gl = &self.gl;
            let fbo = gl
                .create_framebuffer()
                .map_err(|e| EngineError::GlCreate(format!("create_framebuffer failed: {e:?}")))?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));

            let mut buffers = Vec::with_capacity(natives.len());
            for (i, tex) in natives.iter().enumerate() {
                let slot = glow::COLOR_ATTACHMENT0 + i as u32;
                gl.framebuffer_texture_2d(glow::FRAMEBUFFER, slot, glow::TEXTURE_2D, Some(*tex), 0);
                buffers.push(slot);
            }
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::TEXTURE_2D,
                Some(depth_tex),
                0,
            );
            if buffers.is_empty() {
                gl.draw_buffers(&[glow::NONE]);
            } else {
                gl.draw_buffers(&buffers);
            }

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(fbo);
                self.restore_target();
                return Err(EngineError::GlCreate(format!(
                    "framebuffer incomplete: 0x{status:x}"
                )));
            }
            self.restore_target();
            fbo
        };

        let id = FramebufferId(self.issue());
        self.framebuffers.insert(id, fbo);
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if let Some(fbo) = self.framebuffers.remove(&framebuffer) {
            if self.active == Some(RenderTarget::Offscreen(framebuffer)) {
                self.active = None;
                unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, None) };
            }
            unsafe { self.gl.delete_framebuffer(fbo) };
        }
    }

    fn bind_target(&mut self, target: RenderTarget, width: u32, height: u32) {
        self.active = Some(target);
        unsafe {
            self.gl
                .bind_framebuffer(glow::FRAMEBUFFER, self.native_target(self.active));
            self.gl.viewport(0, 0, width as i32, height as i32);
        }
    }

    fn active_target(&self) -> Option<RenderTarget> {
        self.active
    }

    fn clear(&mut self, color: [f32; 4]) {
        unsafe {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn bind_texture_unit(&mut self, unit: u32, texture: Option<TextureId>) {
        if unit as usize >= MAX_TEXTURE_UNITS {
            return;
        }
        let native = texture.and_then(|id| self.textures.get(&id)).map(|t| t.tex);
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, native);
        }
    }

    fn compile_program(&mut self, source: &ShaderSource) -> Result<ProgramId, EngineError> {
        let program = unsafe { compile_program(&self.gl, source) }.map_err(
            |e| {
                tracing::error!(
                    program = %source.label,
                    origin = source.origin.as_deref().unwrap_or("-"),
                    "{e}"
                );
                e
            },
        )?;
        let id = ProgramId(self.issue());
        self.programs.insert(id, program);
        Ok(id)
    }

    fn set_uniform_i32(&mut self, program: ProgramId, name: &str, value: i32) {
        unsafe {
            if let Some((p, loc)) = self.uniform_location(program, name) {
                self.gl.use_program(Some(p));
                self.gl.uniform_1_i32(Some(&loc), value);
                self.gl.use_program(None);
            }
        }
    }

    fn set_uniform_mat4(&mut self, program: ProgramId, name: &str, value: &[f32; 16]) {
        unsafe {
            if let Some((p, loc)) = self.uniform_location(program, name) {
                self.gl.use_program(Some(p));
                self.gl.uniform_matrix_4_f32_slice(Some(&loc), false, value);
                self.gl.use_program(None);
            }
        }
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(p) = self.programs.remove(&program) {
            unsafe { self.gl.delete_program(p) };
        }
    }

    fn create_mesh(&mut self, vertices: &[f32], indices: &[u32]) -> Result<MeshId, EngineError> {
        let mesh = unsafe {
            let gl = &self.gl;
            let vao = gl
                .create_vertex_array()
                .map_err(|e| EngineError::GlCreate(format!("create_vertex_array: {e}")))?;
            let vbo = gl
                .create_buffer()
                .map_err(|e| EngineError::GlCreate(format!("create_buffer: {e}")))?;
            let ebo = gl
                .create_buffer()
                .map_err(|e| EngineError::GlCreate(format!("create_buffer: {e}")))?;

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(vertices),
                glow::STATIC_DRAW,
            );
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STATIC_DRAW,
            );

            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, VERTEX_STRIDE, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, VERTEX_STRIDE, 3 * 4);
            gl.enable_vertex_attrib_array(2);
            gl.vertex_attrib_pointer_f32(2, 3, glow::FLOAT, false, VERTEX_STRIDE, 5 * 4);

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
            GlMesh { vao, vbo, ebo }
        };

        let id = MeshId(self.issue());
        self.meshes.insert(id, mesh);
        Ok(id)
    }

    fn draw_mesh(
        &mut self,
        program: ProgramId,
        mesh: MeshId,
        mode: PrimitiveMode,
        index_count: u32,
    ) -> Result<(), EngineError> {
        let p = *self
            .programs
            .get(&program)
            .ok_or_else(|| EngineError::other(format!("unknown program {}", program.0)))?;
        let vao = self
            .meshes
            .get(&mesh)
            .ok_or_else(|| EngineError::other(format!("unknown mesh {}", mesh.0)))?
            .vao;
        unsafe {
            let gl = &self.gl;
            gl.use_program(Some(p));
            gl.bind_vertex_array(Some(vao));
            gl.draw_elements(gl_mode(mode), index_count as i32, glow::UNSIGNED_INT, 0);
            gl.bind_vertex_array(None);
            gl.use_program(None);
        }
        Ok(())
    }

    fn delete_mesh(&mut self, mesh: MeshId) {
        if let Some(m) = self.meshes.remove(&mesh) {
            unsafe {
                self.gl.delete_vertex_array(m.vao);
                self.gl.delete_buffer(m.vbo);
                self.gl.delete_buffer(m.ebo);
            }
        }
    }
}

impl Drop for GlDevice {
    fn drop(&mut self) {
        unsafe { self.gl.delete_framebuffer(self.readback) };
    }
}
