use std::{
    fs, io,
    path::{Path, PathBuf},
};

use optiflow_core::{EngineError, Frame, FrameSource};

/// Directory of still images played back as a frame sequence.
///
/// Frames are the directory's regular files in sorted filename order, decoded
/// to RGB f32 in [0, 1] with row 0 at the bottom. Every frame must match the
/// size of the first.
#[derive(Debug)]
pub struct ImageSequence {
    files: Vec<PathBuf>,
    cursor: usize,
    size: (u32, u32),
}

#[derive(thiserror::Error, Debug)]
pub enum SequenceError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{path} is {found:?}, sequence frames are {expected:?}")]
    SizeMismatch {
        path: PathBuf,
        expected: (u32, u32),
        found: (u32, u32),
    },
}

impl From<SequenceError> for EngineError {
    fn from(e: SequenceError) -> Self {
        EngineError::Input(e.to_string())
    }
}

impl ImageSequence {
    /// Lists `dir` and reads the first frame's header for the sequence size.
    /// An empty directory is a valid sequence of length 0.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SequenceError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(SequenceError::NotADirectory(dir));
        }

        let io_err = |source| SequenceError::Io {
            path: dir.clone(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if entry.file_type().map_err(io_err)?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let size = match files.first() {
            Some(first) => image::image_dimensions(first).map_err(|source| {
                SequenceError::Decode {
                    path: first.clone(),
                    source,
                }
            })?,
            None => (0, 0),
        };

        tracing::info!(
            dir = %dir.display(),
            frames = files.len(),
            width = size.0,
            height = size.1,
            "opened image sequence"
        );

        Ok(Self {
            files,
            cursor: 0,
            size,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Frames already handed out.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Decodes the next file, or `None` once every file was returned.
    pub fn next_decoded(&mut self) -> Result<Option<Frame>, SequenceError> {
        let Some(path) = self.files.get(self.cursor).cloned() else {
            return Ok(None);
        };
        self.cursor += 1;

        let img = image::open(&path).map_err(|source| SequenceError::Decode {
            path: path.clone(),
            source,
        })?;
        let found = (img.width(), img.height());
        if found != self.size {
            return Err(SequenceError::SizeMismatch {
                path,
                expected: self.size,
                found,
            });
        }

        let rgb = img.flipv().to_rgb32f();
        tracing::debug!(file = %path.display(), index = self.cursor - 1, "decoded frame");
        Ok(Some(Frame {
            width: found.0,
            height: found.1,
            data: rgb.into_raw(),
        }))
    }
}

impl FrameSource for ImageSequence {
    fn dimensions(&self) -> (u32, u32) {
        self.size
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, EngineError> {
        Ok(self.next_decoded()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "optiflow-input-images-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn solid(dir: &Path, file: &str, w: u32, h: u32, px: [u8; 3]) {
        RgbImage::from_pixel(w, h, Rgb(px))
            .save(dir.join(file))
            .unwrap();
    }

    #[test]
    fn empty_directory_is_a_zero_length_sequence() {
        let dir = scratch_dir("empty");
        let mut seq = ImageSequence::open(&dir).unwrap();
        assert!(seq.is_empty());
        assert_eq!(seq.dimensions(), (0, 0));
        assert!(seq.next_frame().unwrap().is_none());
    }

    #[test]
    fn frames_come_in_filename_order_and_skip_subdirectories() {
        let dir = scratch_dir("order");
        solid(&dir, "b.png", 2, 2, [0, 0, 255]);
        solid(&dir, "a.png", 2, 2, [255, 0, 0]);
        fs::create_dir_all(dir.join("c_subdir")).unwrap();

        let mut seq = ImageSequence::open(&dir).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.dimensions(), (2, 2));

        let first = seq.next_frame().unwrap().unwrap();
        assert_eq!(first.rgb(0, 0), [1.0, 0.0, 0.0]);
        let second = seq.next_frame().unwrap().unwrap();
        assert_eq!(second.rgb(1, 1), [0.0, 0.0, 1.0]);
        assert!(seq.next_frame().unwrap().is_none());
        assert_eq!(seq.position(), 2);
    }

    #[test]
    fn rows_are_flipped_so_row_zero_is_the_bottom() {
        let dir = scratch_dir("flip");
        let mut img = RgbImage::new(1, 2);
        img.put_pixel(0, 0, Rgb([255, 255, 255])); // top row in file order
        img.put_pixel(0, 1, Rgb([0, 0, 0]));
        img.save(dir.join("frame.png")).unwrap();

        let mut seq = ImageSequence::open(&dir).unwrap();
        let frame = seq.next_frame().unwrap().unwrap();
        assert_eq!(frame.rgb(0, 0), [0.0, 0.0, 0.0]);
        assert_eq!(frame.rgb(0, 1), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn size_mismatch_is_an_input_error() {
        let dir = scratch_dir("mismatch");
        solid(&dir, "0.png", 2, 2, [10, 10, 10]);
        solid(&dir, "1.png", 3, 2, [10, 10, 10]);

        let mut seq = ImageSequence::open(&dir).unwrap();
        seq.next_frame().unwrap().unwrap();
        match seq.next_frame() {
            Err(EngineError::Input(msg)) => assert!(msg.contains("1.png"), "{msg}"),
            other => panic!("expected Input error, got {other:?}"),
        }
    }

    #[test]
    fn missing_directory_is_rejected() {
        let dir = scratch_dir("missing").join("nope");
        assert!(matches!(
            ImageSequence::open(&dir),
            Err(SequenceError::NotADirectory(_))
        ));
    }
}
