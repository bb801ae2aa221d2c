//! Login code rendering: token → QR matrix → PNG → `data:` URL.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

use hm_domain::error::{Error, Result};

/// Render `token` as a square PNG of exactly `size` pixels and return it as
/// a `data:image/png;base64,...` URL ready for an `<img src>`.
pub fn render_data_url(token: &str, size: u32) -> Result<String> {
    let png = render_png(token, size)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

pub fn render_png(token: &str, size: u32) -> Result<Vec<u8>> {
    if size == 0 {
        return Err(Error::Config("qr size must be positive".into()));
    }
    let code = QrCode::with_error_correction_level(token.as_bytes(), EcLevel::L)
        .map_err(|e| Error::Other(format!("encoding login code: {e}")))?;

    let rendered = code
        .render::<Luma<u8>>()
        .min_dimensions(size, size)
        .build();
    // Module size is an integer, so the renderer may overshoot.
    let image = if rendered.width() == size && rendered.height() == size {
        rendered
    } else {
        imageops::resize(&rendered, size, size, FilterType::Nearest)
    };

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| Error::Other(format!("writing login code PNG: {e}")))?;
    Ok(png)
}
