use optiflow_core::EngineError;
use optiflow_mesh::{IndexedMesh, FLOATS_PER_VERTEX};

use crate::device::{Device, MeshId, PrimitiveMode};
use crate::framebuffer::Pass;
use crate::program::ShaderProgram;

/// Immutable GPU vertex/index buffer pair.
#[derive(Debug)]
pub struct Mesh {
    id: MeshId,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh {
    /// Uploads `mesh`. Every index must address an existing vertex.
    pub fn new(device: &mut dyn Device, mesh: &IndexedMesh) -> Result<Self, EngineError> {
        if mesh.vertices.len() % FLOATS_PER_VERTEX != 0 {
            return Err(EngineError::bounds(format!(
                "vertex buffer length {} is not a multiple of {FLOATS_PER_VERTEX}",
                mesh.vertices.len()
            )));
        }
        let vertex_count = mesh.vertex_count();
        if let Some(bad) = mesh.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(EngineError::bounds(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }

        let id = device.create_mesh(&mesh.vertices, &mesh.indices)?;
        tracing::debug!(
            vertices = vertex_count,
            indices = mesh.index_count(),
            "uploaded mesh"
        );
        Ok(Self {
            id,
            vertex_count: vertex_count as u32,
            index_count: mesh.index_count() as u32,
        })
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Draws every index into the pass destination.
    pub fn draw(
        &self,
        device: &mut dyn Device,
        pass: &Pass<'_>,
        program: &ShaderProgram,
        mode: PrimitiveMode,
    ) -> Result<(), EngineError> {
        if device.active_target() != Some(pass.target()) {
            return Err(EngineError::InactivePass);
        }
        device.draw_mesh(program.id(), self.id, mode, self.index_count)
    }

    pub fn destroy(self, device: &mut dyn Device) {
        device.delete_mesh(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::{FrameBuffer, PassOptions};
    use crate::program::{ProgramKind, ShaderSet};
    use crate::software::SoftwareDevice;
    use crate::texture::Texture;

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut dev = SoftwareDevice::new(1, 1);
        let mut quad = optiflow_mesh::quad().unwrap();
        quad.indices.push(4);
        assert!(matches!(
            Mesh::new(&mut dev, &quad),
            Err(EngineError::ResourceBounds(_))
        ));
    }

    #[test]
    fn drawing_into_a_superseded_pass_fails() {
        let mut dev = SoftwareDevice::new(2, 2);
        let shaders = ShaderSet::builtin();
        let program = ShaderProgram::compile(
            &mut dev,
            shaders.get(ProgramKind::Passthrough).unwrap(),
            ProgramKind::Passthrough.bindings(),
        )
        .unwrap();
        let mesh = Mesh::new(&mut dev, &optiflow_mesh::quad().unwrap()).unwrap();
        let input = Texture::create(&mut dev, 2, 2, Some(&[1.0; 12])).unwrap();
        let a = FrameBuffer::create(&mut dev, 2, 2, 1, [0.0; 4]).unwrap();
        let b = FrameBuffer::create(&mut dev, 2, 2, 1, [0.0; 4]).unwrap();

        let first = a.begin_pass(&mut dev, &[input.id()], PassOptions::default()).unwrap();
        let second = b.begin_pass(&mut dev, &[input.id()], PassOptions::default()).unwrap();

        let err = mesh
            .draw(&mut dev, &first, &program, PrimitiveMode::Triangles)
            .unwrap_err();
        assert!(matches!(err, EngineError::InactivePass));
        mesh.draw(&mut dev, &second, &program, PrimitiveMode::Triangles)
            .unwrap();

        let out = b.attachment(0).unwrap().read_back(&mut dev).unwrap();
        assert!(out.texel(0, 0).iter().all(|c| (c - 1.0).abs() < 1e-5));
        let untouched = a.attachment(0).unwrap().read_back(&mut dev).unwrap();
        assert_eq!(untouched.texel(0, 0), [0.0, 0.0, 0.0, 1.0]);
    }
}
