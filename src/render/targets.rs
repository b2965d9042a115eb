use super::helpers;

/// Offscreen targets for the ball scene: an HDR color buffer in the
/// negotiated RGBA format plus a depth buffer, both at backing resolution.
pub(crate) struct RenderTargets {
    pub(crate) format: wgpu::TextureFormat,
    pub(crate) hdr_tex: wgpu::Texture,
    pub(crate) hdr_view: wgpu::TextureView,
    pub(crate) depth_tex: wgpu::Texture,
    pub(crate) depth_view: wgpu::TextureView,
}

impl RenderTargets {
    pub(crate) fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let (hdr_tex, hdr_view) = Self::color(device, format, width, height);
        let (depth_tex, depth_view) = Self::depth(device, width, height);
        Self {
            format,
            hdr_tex,
            hdr_view,
            depth_tex,
            depth_view,
        }
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        (self.hdr_tex.width(), self.hdr_tex.height())
    }

    pub(crate) fn recreate(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        (self.hdr_tex, self.hdr_view) = Self::color(device, self.format, width, height);
        (self.depth_tex, self.depth_view) = Self::depth(device, width, height);
    }

    fn color(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        helpers::create_color_texture(
            device,
            "hdr_tex",
            width,
            height,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    fn depth(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
        helpers::create_color_texture(
            device,
            "depth_tex",
            width,
            height,
            helpers::DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        )
    }
}
