use optiflow_core::EngineError;

use crate::device::{
    Device, FramebufferId, RenderTarget, TextureId, MAX_COLOR_ATTACHMENTS, MAX_TEXTURE_UNITS,
};
use crate::texture::{DepthTexture, Texture};

/// Options for [`FrameBuffer::begin_pass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOptions {
    /// Clear color and depth before drawing.
    pub clear: bool,
    /// Regenerate mipmaps of every bound input after binding.
    pub generate_mipmaps: bool,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            clear: true,
            generate_mipmaps: false,
        }
    }
}

impl PassOptions {
    pub fn with_mipmaps(mut self) -> Self {
        self.generate_mipmaps = true;
        self
    }
}

/// A render destination: N color attachments plus depth, or the display surface.
///
/// Attachment i is permanently bound to output slot i of any program drawn
/// while this framebuffer is the active destination.
#[derive(Debug)]
pub struct FrameBuffer {
    handle: Option<FramebufferId>,
    width: u32,
    height: u32,
    color: Vec<Texture>,
    depth: Option<DepthTexture>,
    clear_color: [f32; 4],
}

impl FrameBuffer {
    /// Allocates an offscreen framebuffer with `attachments` color textures and a depth texture.
    pub fn create(
        device: &mut dyn Device,
        width: u32,
        height: u32,
        attachments: usize,
        clear_color: [f32; 4],
    ) -> Result<Self, EngineError> {
        if attachments > MAX_COLOR_ATTACHMENTS {
            return Err(EngineError::bounds(format!(
                "{attachments} color attachments requested, at most {MAX_COLOR_ATTACHMENTS} supported"
            )));
        }

        let mut color = Vec::with_capacity(attachments);
        for _ in 0..attachments {
            color.push(Texture::create(device, width, height, None)?);
        }
        let depth = DepthTexture::create(device, width, height)?;

        let ids: Vec<TextureId> = color.iter().map(Texture::id).collect();
        let handle = device.create_framebuffer(&ids, depth.id())?;

        Ok(Self {
            handle: Some(handle),
            width,
            height,
            color,
            depth: Some(depth),
            clear_color,
        })
    }

    /// Wraps the display surface. Owns no attachments.
    pub fn display(width: u32, height: u32, clear_color: [f32; 4]) -> Self {
        Self {
            handle: None,
            width,
            height,
            color: Vec::new(),
            depth: None,
            clear_color,
        }
    }

    pub fn is_display(&self) -> bool {
        self.handle.is_none()
    }

    pub fn target(&self) -> RenderTarget {
        match self.handle {
            Some(id) => RenderTarget::Offscreen(id),
            None => RenderTarget::Display,
        }
    }

    pub fn attachment_count(&self) -> usize {
        self.color.len()
    }

    /// Color attachment `i`.
    pub fn attachment(&self, i: usize) -> Result<&Texture, EngineError> {
        self.color.get(i).ok_or_else(|| {
            EngineError::bounds(format!(
                "attachment {i} requested from a framebuffer with {}",
                self.color.len()
            ))
        })
    }

    /// Makes this framebuffer the draw destination and binds `inputs[i]` to unit i.
    ///
    /// The returned [`Pass`] is the only way to issue draws into it.
    pub fn begin_pass<'fb>(
        &'fb self,
        device: &mut dyn Device,
        inputs: &[TextureId],
        options: PassOptions,
    ) -> Result<Pass<'fb>, EngineError> {
        check_units(inputs)?;
        device.bind_target(self.target(), self.width, self.height);
        if options.clear {
            device.clear(self.clear_color);
        }

        let mut pass = Pass {
            framebuffer: self,
            bound_units: 0,
        };
        pass.bind_units(device, inputs, options.generate_mipmaps);
        Ok(pass)
    }

    pub fn destroy(self, device: &mut dyn Device) {
        if let Some(id) = self.handle {
            device.delete_framebuffer(id);
        }
        for tex in self.color {
            tex.destroy(device);
        }
        if let Some(depth) = self.depth {
            depth.destroy(device);
        }
    }
}

fn check_units(inputs: &[TextureId]) -> Result<(), EngineError> {
    if inputs.len() > MAX_TEXTURE_UNITS {
        return Err(EngineError::bounds(format!(
            "{} inputs bound, at most {MAX_TEXTURE_UNITS} texture units",
            inputs.len()
        )));
    }
    Ok(())
}

/// Proof that a framebuffer is the active destination.
#[derive(Debug)]
pub struct Pass<'fb> {
    framebuffer: &'fb FrameBuffer,
    bound_units: usize,
}

impl<'fb> Pass<'fb> {
    pub fn target(&self) -> RenderTarget {
        self.framebuffer.target()
    }

    /// Rebinds inputs without clearing; units left over from the previous
    /// binding are released.
    pub fn bind_inputs(
        &mut self,
        device: &mut dyn Device,
        inputs: &[TextureId],
        generate_mipmaps: bool,
    ) -> Result<(), EngineError> {
        check_units(inputs)?;
        self.bind_units(device, inputs, generate_mipmaps);
        Ok(())
    }

    fn bind_units(&mut self, device: &mut dyn Device, inputs: &[TextureId], mipmaps: bool) {
        for (unit, tex) in inputs.iter().enumerate() {
            device.bind_texture_unit(unit as u32, Some(*tex));
            if mipmaps {
                device.generate_mipmaps(*tex);
            }
        }
        for unit in inputs.len()..self.bound_units {
            device.bind_texture_unit(unit as u32, None);
        }
        self.bound_units = inputs.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareDevice;

    #[test]
    fn offscreen_allocates_attachments_and_depth() {
        let mut dev = SoftwareDevice::new(4, 4);
        let fb = FrameBuffer::create(&mut dev, 4, 4, 2, [0.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(!fb.is_display());
        assert_eq!(fb.attachment_count(), 2);
        assert!(fb.attachment(1).is_ok());
        assert!(matches!(
            fb.attachment(2),
            Err(EngineError::ResourceBounds(_))
        ));
    }

    #[test]
    fn display_has_no_attachments() {
        let fb = FrameBuffer::display(4, 4, [0.0; 4]);
        assert!(fb.is_display());
        assert_eq!(fb.target(), RenderTarget::Display);
        assert!(fb.attachment(0).is_err());
    }

    #[test]
    fn begin_pass_clears_to_clear_color() {
        let mut dev = SoftwareDevice::new(2, 2);
        let fb = FrameBuffer::create(&mut dev, 2, 2, 1, [0.25, 0.5, 0.75, 1.0]).unwrap();
        let pass = fb.begin_pass(&mut dev, &[], PassOptions::default()).unwrap();
        assert_eq!(dev.active_target(), Some(pass.target()));

        let back = fb.attachment(0).unwrap().read_back(&mut dev).unwrap();
        assert_eq!(back.texel(1, 0), [0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn inputs_bind_in_order_and_leftovers_are_released() {
        let mut dev = SoftwareDevice::new(2, 2);
        let a = Texture::create(&mut dev, 2, 2, None).unwrap();
        let b = Texture::create(&mut dev, 2, 2, None).unwrap();
        let fb = FrameBuffer::create(&mut dev, 2, 2, 1, [0.0; 4]).unwrap();

        let mut pass = fb
            .begin_pass(&mut dev, &[a.id(), b.id()], PassOptions::default())
            .unwrap();
        assert_eq!(dev.bound_unit(0), Some(a.id()));
        assert_eq!(dev.bound_unit(1), Some(b.id()));

        pass.bind_inputs(&mut dev, &[b.id()], false).unwrap();
        assert_eq!(dev.bound_unit(0), Some(b.id()));
        assert_eq!(dev.bound_unit(1), None);
    }

    #[test]
    fn mipmap_option_regenerates_inputs() {
        let mut dev = SoftwareDevice::new(2, 2);
        let a = Texture::create(&mut dev, 2, 2, None).unwrap();
        let fb = FrameBuffer::create(&mut dev, 2, 2, 1, [0.0; 4]).unwrap();
        let before = dev.mipmap_generations(a.id());
        fb.begin_pass(&mut dev, &[a.id()], PassOptions::default().with_mipmaps())
            .unwrap();
        assert_eq!(dev.mipmap_generations(a.id()), before + 1);
    }

    #[test]
    fn too_many_inputs_are_rejected() {
        let mut dev = SoftwareDevice::new(1, 1);
        let t = Texture::create(&mut dev, 1, 1, None).unwrap();
        let fb = FrameBuffer::create(&mut dev, 1, 1, 1, [0.0; 4]).unwrap();
        let inputs = vec![t.id(); MAX_TEXTURE_UNITS + 1];
        assert!(fb.begin_pass(&mut dev, &inputs, PassOptions::default()).is_err());
    }
}
