#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

//! Backend-agnostic frame-graph engine.
//!
//! Resources ([`Texture`], [`FrameBuffer`], [`Mesh`], [`ShaderProgram`]) are thin
//! owners of ids issued by a [`Device`]. The [`Pipeline`] wires them into the
//! fixed optical-flow pass chain. [`software::SoftwareDevice`] is the CPU
//! reference backend; the OpenGL backend lives in `optiflow-runtime-glow`.

pub mod device;
pub mod framebuffer;
pub mod mesh;
pub mod pipeline;
pub mod program;
pub mod software;
pub mod texture;
pub mod transform;

pub use device::{
    Device, FramebufferId, MeshId, PrimitiveMode, ProgramId, RenderTarget, TexelBuffer,
    TextureDesc, TextureFormat, TextureId, COLOR_CHANNELS, MAX_COLOR_ATTACHMENTS,
    MAX_TEXTURE_UNITS,
};
pub use framebuffer::{FrameBuffer, Pass, PassOptions};
pub use mesh::Mesh;
pub use optiflow_core::EngineError;
pub use pipeline::{FrameStatus, PassTarget, Pipeline, THUMBNAILS};
pub use program::{BindingTable, ProgramKind, ShaderProgram, ShaderSet, ShaderSource};
pub use texture::{DepthTexture, Texture};
pub use transform::Transform;
