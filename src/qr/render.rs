use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use qrcode::QrCode;

use crate::models::QrOptions;

/// Encode `text` as a square PNG of roughly `options.size` pixels.
///
/// Module size is the largest whole pixel count that keeps the code plus
/// its `margin`-module quiet zone within `size`, never less than one.
pub fn render_png(text: &str, options: &QrOptions) -> Result<Vec<u8>, QrError> {
    let code = QrCode::with_error_correction_level(text.as_bytes(), options.ec_level)?;

    let modules = code.width() as u32 + 2 * options.margin;
    let module_px = (options.size / modules).max(1);

    let symbol = code
        .render::<Rgb<u8>>()
        .quiet_zone(false)
        .module_dimensions(module_px, module_px)
        .dark_color(Rgb(options.dark))
        .light_color(Rgb(options.light))
        .build();

    let side = modules * module_px;
    let offset = i64::from(options.margin * module_px);
    let mut canvas: RgbImage = ImageBuffer::from_pixel(side, side, Rgb(options.light));
    image::imageops::replace(&mut canvas, &symbol, offset, offset);

    let mut png = Vec::new();
    canvas.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("QR task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
