use anyhow::{anyhow, Context, Result};
use arboard::Clipboard;
use image::RgbaImage;

/// Reads an image off the clipboard, if one is there. A clipboard holding
/// text or nothing returns `Ok(None)`.
pub fn read_image_from_clipboard() -> Result<Option<RgbaImage>> {
    let mut clipboard = Clipboard::new().context("cannot initialize clipboard")?;
    let image = match clipboard.get_image() {
        Ok(data) => data,
        Err(_) => return Ok(None),
    };

    let width = image.width as u32;
    let height = image.height as u32;
    let bytes = image.bytes.into_owned();

    let rgba = RgbaImage::from_raw(width, height, bytes)
        .ok_or_else(|| anyhow!("clipboard image has invalid shape"))?;
    Ok(Some(rgba))
}

pub fn write_png_to_clipboard(png_bytes: &[u8]) -> Result<()> {
    let mut clipboard = Clipboard::new().context("cannot initialize clipboard")?;
    let img = image::load_from_memory(png_bytes).context("cannot decode png for clipboard")?;
    let rgba = img.to_rgba8();
    let width = rgba.width() as usize;
    let height = rgba.height() as usize;
    clipboard
        .set_image(arboard::ImageData {
            width,
            height,
            bytes: std::borrow::Cow::Owned(rgba.into_raw()),
        })
        .context("cannot write image to clipboard")
}
