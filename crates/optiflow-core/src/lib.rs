//! optiflow core vocabulary: the engine error, pipeline configuration and the
//! frame/source contract shared by inputs and runtimes.
#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod frame;

pub use config::{PipelineConfig, ThumbnailLayout};
pub use error::EngineError;
pub use frame::{Frame, FrameQueue, FrameSource, FRAME_CHANNELS};
