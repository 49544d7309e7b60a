//! Preview textures for the picked image.

use eframe::egui;
use flora_core::{ImagePayload, PreviewFactory};

const PREVIEW_MAX_SIDE: u32 = 768;

/// Uploads a downscaled copy of the picked image as an egui texture. The
/// texture is freed when its handle is released.
pub(crate) struct TexturePreviews {
    ctx: egui::Context,
    created: u64,
}

impl TexturePreviews {
    pub(crate) fn new(ctx: &egui::Context) -> Self {
        Self {
            ctx: ctx.clone(),
            created: 0,
        }
    }
}

impl PreviewFactory for TexturePreviews {
    /// `None` when the bytes could not be decoded; the image is still selected.
    type Handle = Option<egui::TextureHandle>;

    fn create(&mut self, image: &ImagePayload) -> Self::Handle {
        let color = decode_preview(&image.bytes)?;
        self.created += 1;
        let name = format!("preview:{}:{}", self.created, image.file_name);
        Some(self.ctx.load_texture(name, color, egui::TextureOptions::LINEAR))
    }

    fn release(&mut self, handle: Self::Handle) {
        if let Some(texture) = handle {
            tracing::debug!("releasing preview texture {:?}", texture.id());
        }
    }
}

pub(crate) fn decode_preview(bytes: &[u8]) -> Option<egui::ColorImage> {
    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!("Failed to decode preview: {e}");
            return None;
        }
    };
    let img = if img.width() > PREVIEW_MAX_SIDE || img.height() > PREVIEW_MAX_SIDE {
        img.thumbnail(PREVIEW_MAX_SIDE, PREVIEW_MAX_SIDE)
    } else {
        img
    };
    let rgba = img.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let pixels = rgba.into_raw();
    Some(egui::ColorImage::from_rgba_unmultiplied(size, &pixels))
}
