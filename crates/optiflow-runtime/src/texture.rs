use optiflow_core::EngineError;

use crate::device::{Device, TexelBuffer, TextureDesc, TextureId};

/// RGB float32 texture. Size and format are fixed at creation.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
}

impl Texture {
    /// Allocates a color texture; `data`, when given, must be a full RGB image.
    pub fn create(
        device: &mut dyn Device,
        width: u32,
        height: u32,
        data: Option<&[f32]>,
    ) -> Result<Self, EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::bounds(format!(
                "texture size must be non-zero, got {width}x{height}"
            )));
        }
        let desc = TextureDesc::color(width, height);
        if let Some(d) = data {
            check_len(&desc, d)?;
        }
        let id = device.create_texture(desc, data)?;
        Ok(Self { id, width, height })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Re-uploads the whole image in place and regenerates mipmaps.
    pub fn set_data(&self, device: &mut dyn Device, data: &[f32]) -> Result<(), EngineError> {
        check_len(&TextureDesc::color(self.width, self.height), data)?;
        device.upload_texture(self.id, data)
    }

    pub fn generate_mipmaps(&self, device: &mut dyn Device) {
        device.generate_mipmaps(self.id);
    }

    /// Level 0 as a (height, width, 4) buffer with alpha = 1.0.
    pub fn read_back(&self, device: &mut dyn Device) -> Result<TexelBuffer, EngineError> {
        device.read_texture(self.id)
    }

    pub fn destroy(self, device: &mut dyn Device) {
        device.delete_texture(self.id);
    }
}

fn check_len(desc: &TextureDesc, data: &[f32]) -> Result<(), EngineError> {
    let expected = desc.color_len();
    if data.len() != expected {
        return Err(EngineError::bounds(format!(
            "upload for {}x{} texture needs {expected} floats, got {}",
            desc.width,
            desc.height,
            data.len()
        )));
    }
    Ok(())
}

/// 32-bit depth attachment. Never sampled or read back by the engine.
#[derive(Debug)]
pub struct DepthTexture {
    id: TextureId,
}

impl DepthTexture {
    pub fn create(device: &mut dyn Device, width: u32, height: u32) -> Result<Self, EngineError> {
        let id = device.create_texture(TextureDesc::depth(width, height), None)?;
        Ok(Self { id })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn destroy(self, device: &mut dyn Device) {
        device.delete_texture(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareDevice;

    fn ramp(width: u32, height: u32) -> Vec<f32> {
        (0..width * height * 3).map(|i| i as f32 / 100.0).collect()
    }

    #[test]
    fn upload_then_read_back_round_trips() {
        let mut dev = SoftwareDevice::new(4, 3);
        let data = ramp(4, 3);
        let tex = Texture::create(&mut dev, 4, 3, Some(&data)).unwrap();

        let back = tex.read_back(&mut dev).unwrap();
        assert_eq!((back.width, back.height), (4, 3));
        for y in 0..3 {
            for x in 0..4 {
                let i = ((y * 4 + x) * 3) as usize;
                let t = back.texel(x, y);
                for c in 0..3 {
                    assert!((t[c] - data[i + c]).abs() < 1e-6);
                }
                assert_eq!(t[3], 1.0);
            }
        }
    }

    #[test]
    fn set_data_overwrites_in_place() {
        let mut dev = SoftwareDevice::new(2, 2);
        let tex = Texture::create(&mut dev, 2, 2, None).unwrap();
        let id = tex.id();

        tex.set_data(&mut dev, &[0.5; 12]).unwrap();
        assert_eq!(tex.id(), id);
        assert_eq!(tex.read_back(&mut dev).unwrap().texel(1, 1), [0.5, 0.5, 0.5, 1.0]);
        assert!(dev.mipmap_generations(id) >= 1);
    }

    #[test]
    fn wrong_upload_size_is_a_bounds_violation() {
        let mut dev = SoftwareDevice::new(2, 2);
        let tex = Texture::create(&mut dev, 2, 2, None).unwrap();
        let err = tex.set_data(&mut dev, &[0.0; 11]).unwrap_err();
        assert!(matches!(err, EngineError::ResourceBounds(_)));

        let err = Texture::create(&mut dev, 2, 2, Some(&[0.0; 13])).unwrap_err();
        assert!(matches!(err, EngineError::ResourceBounds(_)));
    }
}
