use crate::EngineError;

/// Number of color channels carried by a decoded frame.
pub const FRAME_CHANNELS: usize = 3;

/// A decoded source image: RGB f32 in [0, 1], row-major, row 0 = bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, EngineError> {
        let expected = width as usize * height as usize * FRAME_CHANNELS;
        if data.len() != expected {
            return Err(EngineError::bounds(format!(
                "frame {width}x{height} needs {expected} floats, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with a single gray level.
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize * FRAME_CHANNELS],
        }
    }

    pub fn rgb(&self, x: u32, y: u32) -> [f32; 3] {
        let i = (y as usize * self.width as usize + x as usize) * FRAME_CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// Pull-based source of frames.
///
/// `Ok(None)` means the sequence is exhausted; that is the normal end state.
pub trait FrameSource {
    /// Dimensions shared by every frame of the sequence.
    fn dimensions(&self) -> (u32, u32);

    fn next_frame(&mut self) -> Result<Option<Frame>, EngineError>;
}

/// In-memory frame source, used by tests and synthetic sequences.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    width: u32,
    height: u32,
    frames: std::collections::VecDeque<Frame>,
}

impl FrameQueue {
    pub fn new(frames: Vec<Frame>) -> Result<Self, EngineError> {
        let (width, height) = frames
            .first()
            .map(|f| (f.width, f.height))
            .ok_or_else(|| EngineError::Input("frame queue is empty".into()))?;
        if let Some(bad) = frames.iter().find(|f| f.width != width || f.height != height) {
            return Err(EngineError::Input(format!(
                "frame size {}x{} differs from sequence size {width}x{height}",
                bad.width, bad.height
            )));
        }
        Ok(Self {
            width,
            height,
            frames: frames.into(),
        })
    }
}

impl FrameSource for FrameQueue {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, EngineError> {
        Ok(self.frames.pop_front())
    }
}
